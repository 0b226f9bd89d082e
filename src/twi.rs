use crate::bitops::{bit, is_set};
use crate::regs::{Reg, RegisterBank};
use core::convert::Infallible;
use embedded_hal::i2c::{ErrorKind, ErrorType, I2c, NoAcknowledgeSource, Operation, SevenBitAddress};

// TWCR bits
pub const TWINT: u8 = 7;
pub const TWEA: u8 = 6;
pub const TWSTA: u8 = 5;
pub const TWSTO: u8 = 4;
pub const TWEN: u8 = 2;

/// TWSR status codes (upper five bits, prescaler masked off).
pub mod status {
    pub const START: u8 = 0x08;
    pub const REP_START: u8 = 0x10;
    pub const MT_SLA_ACK: u8 = 0x18;
    pub const MT_SLA_NACK: u8 = 0x20;
    pub const MT_DATA_ACK: u8 = 0x28;
    pub const MT_DATA_NACK: u8 = 0x30;
    pub const ARB_LOST: u8 = 0x38;
    pub const MR_SLA_ACK: u8 = 0x40;
    pub const MR_SLA_NACK: u8 = 0x48;
    pub const MR_DATA_ACK: u8 = 0x50;
    pub const MR_DATA_NACK: u8 = 0x58;
    pub const NO_INFO: u8 = 0xF8;
}

pub const DEFAULT_CPU_HZ: u32 = 16_000_000;
pub const DEFAULT_SCL_HZ: u32 = 100_000;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct TwiConfig {
    pub cpu_hz: u32,
    pub scl_hz: u32,
    /// TWCR reads before a wait gives up. At 16 MHz one read is well under a µs,
    /// so the default covers roughly ten byte times at 100 kHz.
    pub poll_limit: u32,
}

impl Default for TwiConfig {
    fn default() -> Self {
        Self {
            cpu_hz: DEFAULT_CPU_HZ,
            scl_hz: DEFAULT_SCL_HZ,
            poll_limit: 10_000,
        }
    }
}

impl TwiConfig {
    #[must_use]
    pub fn with_clock(mut self, cpu_hz: u32, scl_hz: u32) -> Self {
        self.cpu_hz = cpu_hz;
        self.scl_hz = scl_hz;
        self
    }

    #[must_use]
    pub fn with_poll_limit(mut self, poll_limit: u32) -> Self {
        self.poll_limit = poll_limit;
        self
    }

    /// TWBR for a prescaler of 1: `((cpu / scl) - 16) / 2`.
    pub fn bit_rate(&self) -> Result<u8, TwiError> {
        let ratio = self
            .cpu_hz
            .checked_div(self.scl_hz)
            .ok_or(TwiError::InvalidClock)?;
        let twbr = ratio.checked_sub(16).ok_or(TwiError::InvalidClock)? / 2;
        u8::try_from(twbr).map_err(|_| TwiError::InvalidClock)
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum NackSource {
    Address,
    Data,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum TwiError {
    /// TWINT did not come back within `poll_limit` reads.
    Timeout,
    /// The requested SCL rate does not fit TWBR.
    InvalidClock,
    Nack(NackSource),
    ArbitrationLost,
}

impl embedded_hal::i2c::Error for TwiError {
    fn kind(&self) -> ErrorKind {
        match self {
            TwiError::Nack(NackSource::Address) => {
                ErrorKind::NoAcknowledge(NoAcknowledgeSource::Address)
            }
            TwiError::Nack(NackSource::Data) => ErrorKind::NoAcknowledge(NoAcknowledgeSource::Data),
            TwiError::ArbitrationLost => ErrorKind::ArbitrationLoss,
            TwiError::Timeout | TwiError::InvalidClock => ErrorKind::Other,
        }
    }
}

impl ufmt::uDisplay for TwiError {
    fn fmt<W>(&self, f: &mut ufmt::Formatter<'_, W>) -> Result<(), W::Error>
    where
        W: ufmt::uWrite + ?Sized,
    {
        f.write_str(match self {
            TwiError::Timeout => "bus timeout",
            TwiError::InvalidClock => "scl rate out of range",
            TwiError::Nack(NackSource::Address) => "address nack",
            TwiError::Nack(NackSource::Data) => "data nack",
            TwiError::ArbitrationLost => "arbitration lost",
        })
    }
}

pub struct Twi<R: RegisterBank> {
    regs: R,
    config: TwiConfig,
}

impl<R: RegisterBank> Twi<R> {
    pub fn new(regs: R, config: TwiConfig) -> Self {
        Self { regs, config }
    }

    pub fn free(self) -> R {
        self.regs
    }

    /// Prescaler 1, TWBR from the configured clocks, controller enabled.
    pub fn init(&mut self) -> Result<(), TwiError> {
        let twbr = self.config.bit_rate()?;
        self.regs.write(Reg::Twsr, 0x00);
        self.regs.write(Reg::Twbr, twbr);
        self.regs.write(Reg::Twcr, bit(TWEN));
        Ok(())
    }

    /// One look at TWINT.
    pub fn poll_complete(&mut self) -> nb::Result<(), Infallible> {
        if is_set(self.regs.read(Reg::Twcr), TWINT) {
            Ok(())
        } else {
            Err(nb::Error::WouldBlock)
        }
    }

    fn wait(&mut self) -> Result<(), TwiError> {
        for _ in 0..self.config.poll_limit.max(1) {
            match self.poll_complete() {
                Ok(()) => return Ok(()),
                Err(nb::Error::WouldBlock) => {}
                Err(nb::Error::Other(never)) => match never {},
            }
        }
        Err(TwiError::Timeout)
    }

    // kick: TWCR with TWINT set, then poll TWINT until the hardware sets it again
    pub fn start(&mut self) -> Result<(), TwiError> {
        self.regs
            .write(Reg::Twcr, bit(TWSTA) | bit(TWEN) | bit(TWINT));
        self.wait()
    }

    /// Queues a STOP. Returns immediately: the controller clears TWSTO by itself
    /// and the next `start` waits on TWINT anyway.
    pub fn stop(&mut self) {
        self.regs
            .write(Reg::Twcr, bit(TWSTO) | bit(TWINT) | bit(TWEN));
    }

    /// Shifts one byte out. ACK/NACK is not checked here, see [`Twi::status`].
    pub fn write_byte(&mut self, data: u8) -> Result<(), TwiError> {
        self.regs.write(Reg::Twdr, data);
        self.regs.write(Reg::Twcr, bit(TWINT) | bit(TWEN));
        self.wait()
    }

    /// Clocks one byte in, answering with ACK if `ack` (more to come) or NACK.
    pub fn read_byte(&mut self, ack: bool) -> Result<u8, TwiError> {
        let ea = if ack { bit(TWEA) } else { 0 };
        self.regs.write(Reg::Twcr, bit(TWINT) | bit(TWEN) | ea);
        self.wait()?;
        Ok(self.regs.read(Reg::Twdr))
    }

    /// TWSR with the prescaler bits masked off.
    pub fn status(&mut self) -> u8 {
        self.regs.read(Reg::Twsr) & 0xF8
    }

    fn expect(&mut self, code: u8, source: NackSource) -> Result<(), TwiError> {
        match self.status() {
            s if s == code => Ok(()),
            status::ARB_LOST => Err(TwiError::ArbitrationLost),
            _ => Err(TwiError::Nack(source)),
        }
    }

    fn address(&mut self, address: SevenBitAddress, read: bool) -> Result<(), TwiError> {
        self.start()?;
        self.write_byte((address << 1) | u8::from(read))?;
        let code = if read {
            status::MR_SLA_ACK
        } else {
            status::MT_SLA_ACK
        };
        self.expect(code, NackSource::Address)
    }

    fn run(
        &mut self,
        address: SevenBitAddress,
        operations: &mut [Operation<'_>],
    ) -> Result<(), TwiError> {
        let mut direction: Option<bool> = None;

        for i in 0..operations.len() {
            let next_is_read = matches!(operations.get(i + 1), Some(Operation::Read(_)));
            let Some(op) = operations.get_mut(i) else {
                break;
            };
            let read = matches!(op, Operation::Read(_));

            // (Repeated) START only when the direction changes.
            if direction != Some(read) {
                self.address(address, read)?;
                direction = Some(read);
            }

            match op {
                Operation::Write(bytes) => {
                    for &b in bytes.iter() {
                        self.write_byte(b)?;
                        self.expect(status::MT_DATA_ACK, NackSource::Data)?;
                    }
                }
                Operation::Read(buffer) => {
                    let len = buffer.len();
                    for (n, slot) in buffer.iter_mut().enumerate() {
                        // NACK only the very last byte before a direction change or STOP.
                        let last = n + 1 == len && !next_is_read;
                        *slot = self.read_byte(!last)?;
                    }
                }
            }
        }

        Ok(())
    }
}

impl<R: RegisterBank> ErrorType for Twi<R> {
    type Error = TwiError;
}

/// Transactions check TWSR after the address and every written byte, so unlike
/// the raw primitives a NACK surfaces as `NoAcknowledge`.
impl<R: RegisterBank> I2c for Twi<R> {
    fn transaction(
        &mut self,
        address: SevenBitAddress,
        operations: &mut [Operation<'_>],
    ) -> Result<(), Self::Error> {
        if operations.is_empty() {
            return Ok(());
        }
        let result = self.run(address, operations);
        self.stop();
        result
    }
}
