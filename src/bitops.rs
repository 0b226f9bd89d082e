/// Single-bit mask for bit `n` of a byte register.
pub const fn bit(n: u8) -> u8 {
    1 << n
}

pub const fn is_set(byte: u8, n: u8) -> bool {
    byte & bit(n) != 0
}

/// Splits a byte into [high, low] nibbles, each left in the upper half (0xX0).
pub const fn split_nibbles(byte: u8) -> [u8; 2] {
    [byte & 0xF0, (byte << 4) & 0xF0]
}

/// Inverse of `split_nibbles`; anything in the lower half of either input is ignored.
pub const fn join_nibbles(nibbles: [u8; 2]) -> u8 {
    (nibbles[0] & 0xF0) | ((nibbles[1] & 0xF0) >> 4)
}
