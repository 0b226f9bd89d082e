
use crate::bitops::{bit, is_set};
use crate::regs::{Reg, RegisterBank};

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum PinMode {
    Input,
    Output,
    InputPullup,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Level {
    Low,
    High,
}

impl Level {
    pub fn is_low(self) -> bool {
        self == Level::Low
    }
}

impl From<bool> for Level {
    fn from(high: bool) -> Self {
        if high {
            Level::High
        } else {
            Level::Low
        }
    }
}

/// One register group: output latch, direction and input registers.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Port {
    pub port: Reg,
    pub ddr: Reg,
    pub pin: Reg,
}

pub const PORTB: Port = Port { port: Reg::Portb, ddr: Reg::Ddrb, pin: Reg::Pinb };
pub const PORTC: Port = Port { port: Reg::Portc, ddr: Reg::Ddrc, pin: Reg::Pinc };
pub const PORTD: Port = Port { port: Reg::Portd, ddr: Reg::Ddrd, pin: Reg::Pind };

/// Uno header pin → port and bit: 0-7 PD, 8-13 PB, 14-19 PC (A0-A5), else `None`.
pub fn locate(pin: u8) -> Option<(Port, u8)> {
    match pin {
        0..=7 => Some((PORTD, pin)),
        8..=13 => Some((PORTB, pin - 8)),
        14..=19 => Some((PORTC, pin - 14)),
        _ => None,
    }
}

pub struct Gpio<R: RegisterBank> {
    regs: R,
}

impl<R: RegisterBank> Gpio<R> {
    pub fn new(regs: R) -> Self {
        Self { regs }
    }

    pub fn free(self) -> R {
        self.regs
    }

    pub fn pin_mode(&mut self, pin: u8, mode: PinMode) {
        let Some((port, n)) = locate(pin) else {
            return;
        };
        match mode {
            PinMode::Input => {
                self.regs.clear_bits(port.ddr, bit(n));
                self.regs.clear_bits(port.port, bit(n)); // ← pull-up off
            }
            PinMode::Output => self.regs.set_bits(port.ddr, bit(n)),
            PinMode::InputPullup => {
                self.regs.clear_bits(port.ddr, bit(n));
                self.regs.set_bits(port.port, bit(n));
            }
        }
    }

    pub fn digital_write(&mut self, pin: u8, level: Level) {
        if let Some((port, n)) = locate(pin) {
            match level {
                Level::Low => self.regs.clear_bits(port.port, bit(n)),
                Level::High => self.regs.set_bits(port.port, bit(n)),
            }
        }
    }

    pub fn digital_read(&mut self, pin: u8) -> Level {
        match locate(pin) {
            Some((port, n)) => Level::from(is_set(self.regs.read(port.pin), n)),
            None => Level::Low,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::SimRegisters;

    #[test]
    fn pin_ranges_map_to_ports() {
        assert_eq!(locate(0), Some((PORTD, 0)));
        assert_eq!(locate(7), Some((PORTD, 7)));
        assert_eq!(locate(8), Some((PORTB, 0)));
        assert_eq!(locate(13), Some((PORTB, 5)));
        assert_eq!(locate(14), Some((PORTC, 0)));
        assert_eq!(locate(19), Some((PORTC, 5)));
        assert_eq!(locate(20), None);
        assert_eq!(locate(255), None);
    }

    #[test]
    fn write_hits_the_right_group() {
        let mut sim = SimRegisters::new();
        let mut gpio = Gpio::new(&mut sim);
        gpio.digital_write(3, Level::High);
        gpio.digital_write(9, Level::High);
        gpio.digital_write(16, Level::High);
        gpio.digital_write(9, Level::Low);

        assert_eq!(sim.peek(Reg::Portd), 0b0000_1000);
        assert_eq!(sim.peek(Reg::Portb), 0);
        assert_eq!(sim.peek(Reg::Portc), 0b0000_0100);
    }

    #[test]
    fn out_of_range_is_a_no_op() {
        let mut sim = SimRegisters::new();
        sim.poke(Reg::Pind, 0xFF);
        sim.poke(Reg::Pinb, 0xFF);
        sim.poke(Reg::Pinc, 0xFF);
        let mut gpio = Gpio::new(&mut sim);
        gpio.digital_write(20, Level::High);
        gpio.pin_mode(42, PinMode::Output);
        assert_eq!(gpio.digital_read(20), Level::Low);
        assert_eq!(gpio.digital_read(13), Level::High);

        for reg in [Reg::Portb, Reg::Portc, Reg::Portd, Reg::Ddrb, Reg::Ddrc, Reg::Ddrd] {
            assert_eq!(sim.peek(reg), 0);
        }
    }

    #[test]
    fn modes_set_direction_and_pullup() {
        let mut sim = SimRegisters::new();
        let mut gpio = Gpio::new(&mut sim);
        gpio.pin_mode(8, PinMode::Output);
        gpio.pin_mode(4, PinMode::InputPullup);
        gpio.pin_mode(2, PinMode::Output);
        gpio.digital_write(2, Level::High);
        gpio.pin_mode(2, PinMode::Input);

        assert_eq!(sim.peek(Reg::Ddrb), 0b0000_0001);
        assert_eq!(sim.peek(Reg::Ddrd), 0);
        assert_eq!(sim.peek(Reg::Portd), 0b0001_0000);
    }

    #[test]
    fn read_reports_pin_register() {
        let mut sim = SimRegisters::new();
        sim.poke(Reg::Pinc, 0b0010_0000);
        let mut gpio = Gpio::new(&mut sim);
        assert_eq!(gpio.digital_read(19), Level::High);
        assert_eq!(gpio.digital_read(18), Level::Low);
    }
}
