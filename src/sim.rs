use crate::bitops::{bit, is_set};
use crate::regs::{Reg, RegisterBank};
use crate::twi::{status, TWEA, TWEN, TWINT, TWSTA, TWSTO};
use heapless::{Deque, Vec};

pub const EVENT_CAPACITY: usize = 128;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum BusEvent {
    Start,
    Stop,
    Write(u8),
    /// `ack` mirrors TWEA in the command that clocked the byte in.
    Read { data: u8, ack: bool },
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum Phase {
    Idle,
    Address,
    Transmit,
    Receive,
}

/// Array-backed bank. Plain registers store what was written; a TWCR write with
/// TWINT set steps a master transmitter/receiver state machine.
pub struct SimRegisters {
    regs: [u8; Reg::ALL.len()],
    events: Vec<BusEvent, EVENT_CAPACITY>,
    rx: Deque<u8, 16>,
    phase: Phase,
    stalled: bool,
    nack: bool,
    twcr_reads: u32,
}

impl Default for SimRegisters {
    fn default() -> Self {
        Self::new()
    }
}

impl SimRegisters {
    pub fn new() -> Self {
        Self {
            regs: [0; Reg::ALL.len()],
            events: Vec::new(),
            rx: Deque::new(),
            phase: Phase::Idle,
            stalled: false,
            nack: false,
            twcr_reads: 0,
        }
    }

    /// When stalled, bus commands are accepted but TWINT never comes back.
    pub fn stall(&mut self, stalled: bool) {
        self.stalled = stalled;
    }

    /// Makes the (imaginary) slave NACK every address and data byte.
    pub fn nack(&mut self, nack: bool) {
        self.nack = nack;
    }

    /// Queues a byte for the next master-receive step; 0xFF when the queue is empty.
    pub fn queue_rx(&mut self, byte: u8) {
        let _ = self.rx.push_back(byte);
    }

    pub fn events(&self) -> &[BusEvent] {
        &self.events
    }

    pub fn clear_events(&mut self) {
        self.events.clear();
    }

    /// Number of TWCR reads so far; used to check that polls are bounded.
    pub fn twcr_reads(&self) -> u32 {
        self.twcr_reads
    }

    /// Raw peek that bypasses TWI side effects.
    pub fn peek(&self, reg: Reg) -> u8 {
        self.regs[reg.index()]
    }

    /// Raw poke, e.g. to drive an input pin level.
    pub fn poke(&mut self, reg: Reg, value: u8) {
        self.regs[reg.index()] = value;
    }

    fn log(&mut self, event: BusEvent) {
        let _ = self.events.push(event);
    }

    fn set_status(&mut self, code: u8) {
        let prescaler = self.regs[Reg::Twsr.index()] & 0x03;
        self.regs[Reg::Twsr.index()] = code | prescaler;
    }

    fn command(&mut self, cr: u8) {
        if is_set(cr, TWSTO) {
            self.log(BusEvent::Stop);
            self.phase = Phase::Idle;
            self.set_status(status::NO_INFO);
            // TWSTO self-clears and no TWINT follows a STOP.
            self.regs[Reg::Twcr.index()] = cr & !(bit(TWSTO) | bit(TWINT));
            return;
        }

        if is_set(cr, TWSTA) {
            self.log(BusEvent::Start);
            let code = if self.phase == Phase::Idle {
                status::START
            } else {
                status::REP_START
            };
            self.set_status(code);
            self.phase = Phase::Address;
        } else {
            match self.phase {
                Phase::Address => {
                    let sla = self.regs[Reg::Twdr.index()];
                    self.log(BusEvent::Write(sla));
                    let read = sla & 0x01 != 0;
                    let code = match (read, self.nack) {
                        (false, false) => status::MT_SLA_ACK,
                        (false, true) => status::MT_SLA_NACK,
                        (true, false) => status::MR_SLA_ACK,
                        (true, true) => status::MR_SLA_NACK,
                    };
                    self.set_status(code);
                    self.phase = if read { Phase::Receive } else { Phase::Transmit };
                }
                Phase::Transmit | Phase::Idle => {
                    let data = self.regs[Reg::Twdr.index()];
                    self.log(BusEvent::Write(data));
                    let code = if self.nack {
                        status::MT_DATA_NACK
                    } else {
                        status::MT_DATA_ACK
                    };
                    self.set_status(code);
                }
                Phase::Receive => {
                    let data = self.rx.pop_front().unwrap_or(0xFF);
                    self.regs[Reg::Twdr.index()] = data;
                    let ack = is_set(cr, TWEA);
                    self.log(BusEvent::Read { data, ack });
                    let code = if ack {
                        status::MR_DATA_ACK
                    } else {
                        status::MR_DATA_NACK
                    };
                    self.set_status(code);
                }
            }
        }

        self.regs[Reg::Twcr.index()] = if self.stalled {
            cr & !bit(TWINT)
        } else {
            cr | bit(TWINT)
        };
    }
}

impl RegisterBank for SimRegisters {
    fn read(&mut self, reg: Reg) -> u8 {
        if reg == Reg::Twcr {
            self.twcr_reads = self.twcr_reads.saturating_add(1);
        }
        self.regs[reg.index()]
    }

    fn write(&mut self, reg: Reg, value: u8) {
        match reg {
            Reg::Twcr if is_set(value, TWINT) && is_set(value, TWEN) => self.command(value),
            // Status bits are read-only; only the prescaler is writable.
            Reg::Twsr => {
                let code = self.regs[Reg::Twsr.index()] & 0xF8;
                self.regs[Reg::Twsr.index()] = code | (value & 0x03);
            }
            _ => self.regs[reg.index()] = value,
        }
    }
}
