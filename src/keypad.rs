use crate::gpio::{Gpio, Level, PinMode};
use crate::regs::RegisterBank;
use embedded_hal::delay::DelayNs;

pub const ROWS: usize = 4;
pub const COLS: usize = 3;

pub const KEYS: [[char; COLS]; ROWS] = [
    ['1', '2', '3'],
    ['4', '5', '6'],
    ['7', '8', '9'],
    ['S', '0', 'E'],
];

/// What `get_key_or_nul` reports when nothing is pressed.
pub const NO_KEY: char = '\0';

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct KeypadConfig {
    pub rows: [u8; ROWS],
    pub cols: [u8; COLS],
    pub keys: [[char; COLS]; ROWS],
    pub settle_us: u32,
    pub debounce_ms: u32,
    /// `None` waits for release forever.
    pub release_timeout_ms: Option<u32>,
}

impl Default for KeypadConfig {
    fn default() -> Self {
        Self {
            rows: [8, 7, 6, 5],
            cols: [4, 3, 2],
            keys: KEYS,
            settle_us: 1,
            debounce_ms: 50,
            release_timeout_ms: None,
        }
    }
}

impl KeypadConfig {
    #[must_use]
    pub fn with_pins(mut self, rows: [u8; ROWS], cols: [u8; COLS]) -> Self {
        self.rows = rows;
        self.cols = cols;
        self
    }

    #[must_use]
    pub fn with_keys(mut self, keys: [[char; COLS]; ROWS]) -> Self {
        self.keys = keys;
        self
    }

    #[must_use]
    pub fn with_release_timeout(mut self, ms: u32) -> Self {
        self.release_timeout_ms = Some(ms);
        self
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum KeypadError {
    /// Column never went high again after the debounce delay.
    StuckKey { row: u8, col: u8 },
}

impl ufmt::uDisplay for KeypadError {
    fn fmt<W>(&self, f: &mut ufmt::Formatter<'_, W>) -> Result<(), W::Error>
    where
        W: ufmt::uWrite + ?Sized,
    {
        match self {
            KeypadError::StuckKey { row, col } => {
                ufmt::uwrite!(f, "stuck key at row {} col {}", row, col)
            }
        }
    }
}

// rows: outputs idling high; cols: pulled-up inputs
pub struct Keypad<R: RegisterBank, D: DelayNs> {
    gpio: Gpio<R>,
    delay: D,
    config: KeypadConfig,
}

impl<R: RegisterBank, D: DelayNs> Keypad<R, D> {
    pub fn new(regs: R, delay: D, config: KeypadConfig) -> Self {
        Self {
            gpio: Gpio::new(regs),
            delay,
            config,
        }
    }

    pub fn free(self) -> (R, D) {
        (self.gpio.free(), self.delay)
    }

    pub fn init(&mut self) {
        for &row in &self.config.rows {
            self.gpio.pin_mode(row, PinMode::Output);
            self.gpio.digital_write(row, Level::High);
        }
        for &col in &self.config.cols {
            self.gpio.pin_mode(col, PinMode::InputPullup);
        }
    }

    /// One sweep over the matrix. `WouldBlock` if nothing is down, otherwise
    /// debounces, waits for release and yields the first key in row-major order.
    pub fn poll(&mut self) -> nb::Result<char, KeypadError> {
        let KeypadConfig {
            rows, cols, keys, ..
        } = self.config;

        for (r, (&row, row_keys)) in rows.iter().zip(keys.iter()).enumerate() {
            // ← all rows high first, a previous press may have left one low
            for &other in &rows {
                self.gpio.digital_write(other, Level::High);
            }
            self.gpio.digital_write(row, Level::Low);
            self.delay.delay_us(self.config.settle_us);

            for (c, (&col, &key)) in cols.iter().zip(row_keys.iter()).enumerate() {
                if self.gpio.digital_read(col).is_low() {
                    self.delay.delay_ms(self.config.debounce_ms);
                    if !self.wait_release(col) {
                        return Err(nb::Error::Other(KeypadError::StuckKey {
                            row: r as u8,
                            col: c as u8,
                        }));
                    }
                    return Ok(key);
                }
            }
        }

        Err(nb::Error::WouldBlock)
    }

    pub fn get_key(&mut self) -> Result<Option<char>, KeypadError> {
        match self.poll() {
            Ok(key) => Ok(Some(key)),
            Err(nb::Error::WouldBlock) => Ok(None),
            Err(nb::Error::Other(e)) => Err(e),
        }
    }

    /// Same as `get_key` but reports "nothing pressed" as [`NO_KEY`].
    pub fn get_key_or_nul(&mut self) -> Result<char, KeypadError> {
        Ok(self.get_key()?.unwrap_or(NO_KEY))
    }

    /// False if the column is still low once the release timeout runs out.
    fn wait_release(&mut self, col: u8) -> bool {
        match self.config.release_timeout_ms {
            None => {
                while self.gpio.digital_read(col).is_low() {}
                true
            }
            Some(limit) => {
                for _ in 0..limit {
                    if !self.gpio.digital_read(col).is_low() {
                        return true;
                    }
                    self.delay.delay_ms(1);
                }
                !self.gpio.digital_read(col).is_low()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gpio::locate;
    use crate::regs::Reg;
    use crate::sim::SimRegisters;
    use std::vec::Vec;

    /// Adds up requested delays instead of sleeping.
    #[derive(Default)]
    struct Tally {
        ns: u64,
    }

    impl DelayNs for Tally {
        fn delay_ns(&mut self, ns: u32) {
            self.ns += u64::from(ns);
        }
    }

    struct Held {
        row: usize,
        col: usize,
        /// PIN reads (while its row is low) that still see the key down;
        /// `None` never lets go.
        low_reads: Option<u32>,
    }

    /// Register bank that wires the default pin layout through a key matrix.
    struct Matrix {
        sim: SimRegisters,
        cfg: KeypadConfig,
        held: Vec<Held>,
    }

    impl Matrix {
        fn new(held: Vec<Held>) -> Self {
            Self {
                sim: SimRegisters::new(),
                cfg: KeypadConfig::default(),
                held,
            }
        }

        fn row_is_low(&self, row: usize) -> bool {
            let (port, n) = locate(self.cfg.rows[row]).unwrap();
            self.sim.peek(port.port) & (1 << n) == 0
        }
    }

    impl RegisterBank for Matrix {
        fn read(&mut self, reg: Reg) -> u8 {
            let mut v = self.sim.read(reg);
            for c in 0..COLS {
                let (port, n) = locate(self.cfg.cols[c]).unwrap();
                if port.pin != reg {
                    continue;
                }
                let mut low = false;
                for i in 0..self.held.len() {
                    let (row, col, left) = (self.held[i].row, self.held[i].col, self.held[i].low_reads);
                    if col != c || !self.row_is_low(row) || left == Some(0) {
                        continue;
                    }
                    low = true;
                    if let Some(left) = left {
                        self.held[i].low_reads = Some(left - 1);
                    }
                }
                if low {
                    v &= !(1 << n);
                } else {
                    v |= 1 << n;
                }
            }
            v
        }

        fn write(&mut self, reg: Reg, value: u8) {
            self.sim.write(reg, value);
        }
    }

    fn keypad(matrix: &mut Matrix, config: KeypadConfig) -> Keypad<&mut Matrix, Tally> {
        let mut pad = Keypad::new(matrix, Tally::default(), config);
        pad.init();
        pad
    }

    #[test]
    fn init_drives_rows_high_and_pulls_up_columns() {
        let mut m = Matrix::new(Vec::new());
        let _ = keypad(&mut m, KeypadConfig::default());

        // rows 8 (PB0) and 7,6,5 (PD7..PD5); cols 4,3,2 (PD4..PD2)
        assert_eq!(m.sim.peek(Reg::Ddrb), 0b0000_0001);
        assert_eq!(m.sim.peek(Reg::Portb), 0b0000_0001);
        assert_eq!(m.sim.peek(Reg::Ddrd), 0b1110_0000);
        assert_eq!(m.sim.peek(Reg::Portd), 0b1111_1100);
    }

    #[test]
    fn no_key_after_full_sweep() {
        let mut m = Matrix::new(Vec::new());
        let mut pad = keypad(&mut m, KeypadConfig::default());

        assert_eq!(pad.get_key(), Ok(None));
        assert_eq!(pad.get_key_or_nul(), Ok(NO_KEY));
        assert_eq!(pad.poll(), Err(nb::Error::WouldBlock));

        // Three sweeps, one settle delay per row, nothing else.
        let (_, delay) = pad.free();
        assert_eq!(delay.ns, 3 * 4 * 1_000);
    }

    #[test]
    fn every_position_maps_to_its_key() {
        for row in 0..ROWS {
            for col in 0..COLS {
                let mut m = Matrix::new(std::vec![Held { row, col, low_reads: Some(10) }]);
                let mut pad = keypad(&mut m, KeypadConfig::default());
                assert_eq!(pad.get_key(), Ok(Some(KEYS[row][col])));
            }
        }
    }

    #[test]
    fn press_is_debounced_and_waits_for_release() {
        let mut m = Matrix::new(std::vec![Held { row: 3, col: 0, low_reads: Some(10) }]);
        let mut pad = keypad(&mut m, KeypadConfig::default());

        assert_eq!(pad.get_key(), Ok(Some('S')));
        let (_, delay) = pad.free();
        // Rows 0..=3 settle, then the 50 ms debounce.
        assert_eq!(delay.ns, 4 * 1_000 + 50_000_000);
        assert_eq!(m.held[0].low_reads, Some(0));
    }

    #[test]
    fn first_key_in_row_major_order_wins() {
        let mut m = Matrix::new(std::vec![
            Held { row: 2, col: 0, low_reads: Some(10) },
            Held { row: 1, col: 2, low_reads: Some(10) },
        ]);
        let mut pad = keypad(&mut m, KeypadConfig::default());
        assert_eq!(pad.get_key(), Ok(Some('6')));
    }

    #[test]
    fn stuck_key_times_out_when_bounded() {
        let mut m = Matrix::new(std::vec![Held { row: 0, col: 1, low_reads: None }]);
        let mut pad = keypad(&mut m, KeypadConfig::default().with_release_timeout(20));

        assert_eq!(
            pad.get_key(),
            Err(KeypadError::StuckKey { row: 0, col: 1 })
        );
        let (_, delay) = pad.free();
        assert_eq!(delay.ns, 1_000 + 50_000_000 + 20 * 1_000_000);
    }

    #[test]
    fn row_left_low_by_previous_press_is_raised() {
        let mut m = Matrix::new(std::vec![Held { row: 1, col: 0, low_reads: None }]);
        let mut pad = keypad(&mut m, KeypadConfig::default().with_release_timeout(1));

        let stuck = Err(KeypadError::StuckKey { row: 1, col: 0 });
        assert_eq!(pad.get_key(), stuck);
        // Row 1 is still low here; the next sweep must not see '4' as '1'.
        assert_eq!(pad.get_key(), stuck);
        drop(pad);
        assert!(m.row_is_low(1));
        assert!(!m.row_is_low(0));
    }

    #[test]
    fn custom_keys_are_used() {
        let mut keys = KEYS;
        keys[0][0] = 'A';
        let mut m = Matrix::new(std::vec![Held { row: 0, col: 0, low_reads: Some(5) }]);
        let mut pad = keypad(&mut m, KeypadConfig::default().with_keys(keys));
        assert_eq!(pad.get_key(), Ok(Some('A')));
    }
}
