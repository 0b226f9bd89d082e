#![cfg_attr(target_arch = "avr", no_std)]
#![cfg_attr(target_arch = "avr", no_main)]

// Firmware for an Uno-class board: keypad on D2-D8, LCD backpack on A4/A5 (TWI),
// log on the USB serial port. Keys echo to the panel; S clears, E jumps to the
// second line.

#[cfg(target_arch = "avr")]
use arduino_hal::prelude::*;
#[cfg(target_arch = "avr")]
use avr_keylcd::{Keypad, KeypadConfig, Lcd1602, LcdConfig, Mmio, Twi, TwiConfig};
#[cfg(target_arch = "avr")]
use panic_halt as _;

#[cfg(target_arch = "avr")]
const COLUMNS: u8 = 16;

#[cfg(target_arch = "avr")]
#[arduino_hal::entry]
fn main() -> ! {
    let dp = arduino_hal::Peripherals::take().unwrap();
    let pins = arduino_hal::pins!(dp);
    let mut serial = arduino_hal::default_serial!(dp, pins, 57600);

    // SAFETY: the HAL is only handed D0/D1 (serial). TWI and D2-D8 are driven
    // exclusively through these two banks, which touch disjoint registers.
    let (bus_regs, pad_regs) = unsafe { (Mmio::new(), Mmio::new()) };

    let mut twi = Twi::new(bus_regs, TwiConfig::default());
    match twi.init() {
        Ok(()) => ufmt::uwriteln!(&mut serial, "OK: twi up\r").unwrap_infallible(),
        Err(e) => ufmt::uwriteln!(&mut serial, "ERR: twi init: {}\r", e).unwrap_infallible(),
    }

    let mut lcd = Lcd1602::new(twi, arduino_hal::Delay::new(), LcdConfig::default());
    match lcd.init() {
        Ok(()) => ufmt::uwriteln!(&mut serial, "OK: lcd up\r").unwrap_infallible(),
        Err(e) => ufmt::uwriteln!(&mut serial, "ERR: lcd init: {}\r", e).unwrap_infallible(),
    }
    if let Err(e) = lcd.print("Ready") {
        ufmt::uwriteln!(&mut serial, "WARN: lcd print: {}\r", e).unwrap_infallible();
    }

    let config = KeypadConfig::default().with_release_timeout(5_000);
    let mut keypad = Keypad::new(pad_regs, arduino_hal::Delay::new(), config);
    keypad.init();

    let mut col = COLUMNS; // ← forces a clear on the first key
    let mut row = 0u8;

    loop {
        let key = match nb::block!(keypad.poll()) {
            Ok(key) => key,
            Err(e) => {
                ufmt::uwriteln!(&mut serial, "WARN: {}\r", e).unwrap_infallible();
                continue;
            }
        };

        let mut buf = [0u8; 4];
        ufmt::uwriteln!(&mut serial, "key {}\r", &*key.encode_utf8(&mut buf)).unwrap_infallible();

        let shown = match key {
            'S' => {
                col = 0;
                row = 0;
                lcd.clear()
            }
            'E' => {
                col = 0;
                row ^= 1;
                lcd.set_cursor(col, row)
            }
            _ => {
                let wrapped = if col >= COLUMNS {
                    col = 0;
                    row = 0;
                    lcd.clear()
                } else {
                    Ok(())
                };
                col += 1;
                wrapped.and_then(|()| lcd.send_data(key as u8))
            }
        };

        if let Err(e) = shown {
            ufmt::uwriteln!(&mut serial, "ERR: lcd: {}\r", e).unwrap_infallible();
        }
    }
}

#[cfg(not(target_arch = "avr"))]
fn main() {}
