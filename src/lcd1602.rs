// Adapted from https://cdn.sparkfun.com/assets/9/5/f/7/b/HD44780.pdf (4-bit init, fig. 24)

use crate::bitops::split_nibbles;
use embedded_hal::delay::DelayNs;
use embedded_hal::i2c::{I2c, SevenBitAddress};

pub const LCD_ADDR: SevenBitAddress = 0x27;

// PCF8574: P0 RS, P1 RW, P2 E, P3 backlight, P4..P7 DB4..DB7
const RS: u8 = 0x01;
const ENABLE: u8 = 0x04;
const BACKLIGHT: u8 = 0x08;

/// DDRAM offset of the second line.
pub const ROW1_OFFSET: u8 = 0x40;

pub mod cmd {
    pub const CLEAR: u8 = 0x01;
    pub const HOME: u8 = 0x02;
    pub const ENTRY_MODE: u8 = 0x04;
    pub const DISPLAY_CONTROL: u8 = 0x08;
    pub const FUNCTION_SET: u8 = 0x20;
    pub const SET_DDRAM: u8 = 0x80;

    /// Function set, 8-bit interface; sent thrice to get a known state.
    pub const RESET: u8 = 0x03;
    /// Function set, 4-bit interface.
    pub const FOUR_BIT: u8 = 0x02;
    /// 4-bit, 2 lines, 5x8 font.
    pub const FUNCTION_4BIT_2LINE: u8 = FUNCTION_SET | 0x08;
    /// Display on, cursor off, blink off.
    pub const DISPLAY_ON: u8 = DISPLAY_CONTROL | 0x04;
    /// Increment, no shift.
    pub const ENTRY_INCREMENT: u8 = ENTRY_MODE | 0x02;
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum Mode {
    Command = 0x00,
    Data = RS,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct LcdConfig {
    pub address: SevenBitAddress,
    pub backlight: bool,
}

impl Default for LcdConfig {
    fn default() -> Self {
        Self {
            address: LCD_ADDR,
            backlight: true,
        }
    }
}

impl LcdConfig {
    #[must_use]
    pub fn with_address(mut self, address: SevenBitAddress) -> Self {
        self.address = address;
        self
    }
}

/// DDRAM address for (col, row). Row 0 starts at 0, every other row at 0x40.
pub const fn ddram_address(col: u8, row: u8) -> u8 {
    if row == 0 {
        col
    } else {
        col.wrapping_add(ROW1_OFFSET)
    }
}

pub struct Lcd1602<I: I2c, D: DelayNs> {
    i2c: I,
    delay: D,
    config: LcdConfig,
}

impl<I: I2c, D: DelayNs> Lcd1602<I, D> {
    pub fn new(i2c: I, delay: D, config: LcdConfig) -> Self {
        Self { i2c, delay, config }
    }

    pub fn free(self) -> (I, D) {
        (self.i2c, self.delay)
    }

    fn backlight_bit(&self) -> u8 {
        if self.config.backlight {
            BACKLIGHT
        } else {
            0
        }
    }

    /// Upper four bits are the data nibble, lower four RS/RW/E/BL.
    pub fn send_nibble(&mut self, nibble: u8) -> Result<(), I::Error> {
        let data = nibble | self.backlight_bit();
        self.i2c
            .write(self.config.address, &[data | ENABLE, data & !ENABLE])?; // ← E pulse
        self.delay.delay_us(50);
        Ok(())
    }

    pub fn send_byte(&mut self, data: u8, mode: Mode) -> Result<(), I::Error> {
        for nibble in split_nibbles(data) {
            self.send_nibble(nibble | mode as u8)?;
        }
        Ok(())
    }

    /// Most instructions need ~40 µs; 2 ms also covers clear/home.
    pub fn send_command(&mut self, command: u8) -> Result<(), I::Error> {
        self.send_byte(command, Mode::Command)?;
        self.delay.delay_ms(2);
        Ok(())
    }

    pub fn send_data(&mut self, data: u8) -> Result<(), I::Error> {
        self.send_byte(data, Mode::Data)
    }

    /// Power-up sequence for 4-bit operation. Order and delays matter.
    pub fn init(&mut self) -> Result<(), I::Error> {
        self.delay.delay_ms(50); // ← Vcc rise
        self.send_command(cmd::RESET)?;
        self.delay.delay_ms(5);
        self.send_command(cmd::RESET)?;
        self.delay.delay_us(150);
        self.send_command(cmd::RESET)?;
        self.send_command(cmd::FOUR_BIT)?;
        self.send_command(cmd::FUNCTION_4BIT_2LINE)?;
        self.send_command(cmd::DISPLAY_ON)?;
        self.send_command(cmd::CLEAR)?;
        self.delay.delay_ms(2);
        self.send_command(cmd::ENTRY_INCREMENT)
    }

    /// No bounds checks; addresses past the visible area land in off-screen DDRAM.
    pub fn set_cursor(&mut self, col: u8, row: u8) -> Result<(), I::Error> {
        self.send_command(cmd::SET_DDRAM | ddram_address(col, row))
    }

    pub fn clear(&mut self) -> Result<(), I::Error> {
        self.send_command(cmd::CLEAR)?;
        self.delay.delay_ms(2);
        Ok(())
    }

    pub fn home(&mut self) -> Result<(), I::Error> {
        self.send_command(cmd::HOME)?;
        self.delay.delay_ms(2);
        Ok(())
    }

    pub fn display_control(&mut self, display: bool, cursor: bool, blink: bool) -> Result<(), I::Error> {
        let flags = (u8::from(display) << 2) | (u8::from(cursor) << 1) | u8::from(blink);
        self.send_command(cmd::DISPLAY_CONTROL | flags)
    }

    /// Takes effect right away and sticks for every later transfer.
    pub fn set_backlight(&mut self, on: bool) -> Result<(), I::Error> {
        self.config.backlight = on;
        let bits = self.backlight_bit();
        self.i2c.write(self.config.address, &[bits])
    }

    /// Raw bytes to DDRAM. No wrapping; the controller drops what doesn't fit.
    pub fn print(&mut self, s: &str) -> Result<(), I::Error> {
        for b in s.bytes() {
            self.send_data(b)?;
        }
        Ok(())
    }
}

impl<I: I2c, D: DelayNs> ufmt::uWrite for Lcd1602<I, D> {
    type Error = I::Error;

    fn write_str(&mut self, s: &str) -> Result<(), Self::Error> {
        self.print(s)
    }
}
