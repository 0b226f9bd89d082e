/// 8-bit I/O registers used by the drivers, tagged with their ATmega328P
/// data-space address (I/O address + 0x20 for the port block).
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum Reg {
    Pinb = 0x23,
    Ddrb = 0x24,
    Portb = 0x25,
    Pinc = 0x26,
    Ddrc = 0x27,
    Portc = 0x28,
    Pind = 0x29,
    Ddrd = 0x2A,
    Portd = 0x2B,
    Twbr = 0xB8,
    Twsr = 0xB9,
    Twdr = 0xBB,
    Twcr = 0xBC,
}

impl Reg {
    pub const ALL: [Reg; 13] = [
        Reg::Pinb,
        Reg::Ddrb,
        Reg::Portb,
        Reg::Pinc,
        Reg::Ddrc,
        Reg::Portc,
        Reg::Pind,
        Reg::Ddrd,
        Reg::Portd,
        Reg::Twbr,
        Reg::Twsr,
        Reg::Twdr,
        Reg::Twcr,
    ];

    pub const fn addr(self) -> usize {
        self as u8 as usize
    }

    /// Dense index into [`Reg::ALL`], for array-backed banks.
    pub const fn index(self) -> usize {
        match self {
            Reg::Pinb => 0,
            Reg::Ddrb => 1,
            Reg::Portb => 2,
            Reg::Pinc => 3,
            Reg::Ddrc => 4,
            Reg::Portc => 5,
            Reg::Pind => 6,
            Reg::Ddrd => 7,
            Reg::Portd => 8,
            Reg::Twbr => 9,
            Reg::Twsr => 10,
            Reg::Twdr => 11,
            Reg::Twcr => 12,
        }
    }
}

/// Get/set access to the register file. Drivers only ever go through this.
pub trait RegisterBank {
    fn read(&mut self, reg: Reg) -> u8;

    fn write(&mut self, reg: Reg, value: u8);

    fn modify<F>(&mut self, reg: Reg, f: F)
    where
        F: FnOnce(u8) -> u8,
    {
        let v = self.read(reg);
        self.write(reg, f(v));
    }

    fn set_bits(&mut self, reg: Reg, mask: u8) {
        self.modify(reg, |v| v | mask);
    }

    fn clear_bits(&mut self, reg: Reg, mask: u8) {
        self.modify(reg, |v| v & !mask);
    }
}

impl<R: RegisterBank + ?Sized> RegisterBank for &mut R {
    fn read(&mut self, reg: Reg) -> u8 {
        (**self).read(reg)
    }

    fn write(&mut self, reg: Reg, value: u8) {
        (**self).write(reg, value);
    }
}

/// The real register file, accessed with volatile loads/stores.
pub struct Mmio {
    _private: (),
}

impl Mmio {
    /// # Safety
    ///
    /// Only sound on an ATmega328P. Every register this bank is used on must not be
    /// written by anything else (HAL pin types, other banks) while it is alive;
    /// two banks are fine if the drivers owning them touch disjoint registers.
    pub const unsafe fn new() -> Self {
        Self { _private: () }
    }
}

impl RegisterBank for Mmio {
    fn read(&mut self, reg: Reg) -> u8 {
        // SAFETY: `reg.addr()` is a valid, aligned I/O register address on the target.
        unsafe { core::ptr::read_volatile(reg.addr() as *const u8) }
    }

    fn write(&mut self, reg: Reg, value: u8) {
        // SAFETY: see `read`; exclusivity is the contract of `Mmio::new`.
        unsafe { core::ptr::write_volatile(reg.addr() as *mut u8, value) }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn index_matches_table_order() {
        for (i, reg) in Reg::ALL.iter().enumerate() {
            assert_eq!(reg.index(), i);
        }
    }

    #[test]
    fn twi_block_addresses() {
        assert_eq!(Reg::Twbr.addr(), 0xB8);
        assert_eq!(Reg::Twcr.addr(), 0xBC);
        assert_eq!(Reg::Portd.addr(), 0x2B);
    }
}
