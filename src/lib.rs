//! ATmega328P keypad + I2C LCD drivers, all behind [`regs::RegisterBank`].
#![cfg_attr(not(test), no_std)]

pub mod bitops;
pub mod gpio;
pub mod keypad;
pub mod lcd1602;
pub mod regs;
#[cfg(any(test, feature = "sim"))]
pub mod sim;
pub mod twi;

pub use gpio::{Gpio, Level, PinMode};
pub use keypad::{Keypad, KeypadConfig, KeypadError};
pub use lcd1602::{Lcd1602, LcdConfig};
pub use regs::{Mmio, Reg, RegisterBank};
pub use twi::{Twi, TwiConfig, TwiError};
