// 2.4 GHz O-QPSK direct-sequence spreading: each 4-bit symbol maps to 32
// chips, carried here as 16 two-bit pairs. Bit 1 of a pair is the even-index
// chip (I rail), bit 0 the odd-index chip (Q rail).

use crate::utils::consts::PAIRS_PER_SYMBOL;

pub const CHIP_PAIRS: [[u8; PAIRS_PER_SYMBOL]; 16] = [
    [
        0b11, 0b01, 0b10, 0b01, 0b11, 0b00, 0b00, 0b11,
        0b01, 0b01, 0b00, 0b10, 0b00, 0b10, 0b11, 0b10,
    ],
    [
        0b11, 0b10, 0b11, 0b01, 0b10, 0b01, 0b11, 0b00,
        0b00, 0b11, 0b01, 0b01, 0b00, 0b10, 0b00, 0b10,
    ],
    [
        0b00, 0b10, 0b11, 0b10, 0b11, 0b01, 0b10, 0b01,
        0b11, 0b00, 0b00, 0b11, 0b01, 0b01, 0b00, 0b10,
    ],
    [
        0b00, 0b10, 0b00, 0b10, 0b11, 0b10, 0b11, 0b01,
        0b10, 0b01, 0b11, 0b00, 0b00, 0b11, 0b01, 0b01,
    ],
    [
        0b01, 0b01, 0b00, 0b10, 0b00, 0b10, 0b11, 0b10,
        0b11, 0b01, 0b10, 0b01, 0b11, 0b00, 0b00, 0b11,
    ],
    [
        0b00, 0b11, 0b01, 0b01, 0b00, 0b10, 0b00, 0b10,
        0b11, 0b10, 0b11, 0b01, 0b10, 0b01, 0b11, 0b00,
    ],
    [
        0b11, 0b00, 0b00, 0b11, 0b01, 0b01, 0b00, 0b10,
        0b00, 0b10, 0b11, 0b10, 0b11, 0b01, 0b10, 0b01,
    ],
    [
        0b10, 0b01, 0b11, 0b00, 0b00, 0b11, 0b01, 0b01,
        0b00, 0b10, 0b00, 0b10, 0b11, 0b10, 0b11, 0b01,
    ],
    [
        0b10, 0b00, 0b11, 0b00, 0b10, 0b01, 0b01, 0b10,
        0b00, 0b00, 0b01, 0b11, 0b01, 0b11, 0b10, 0b11,
    ],
    [
        0b10, 0b11, 0b10, 0b00, 0b11, 0b00, 0b10, 0b01,
        0b01, 0b10, 0b00, 0b00, 0b01, 0b11, 0b01, 0b11,
    ],
    [
        0b01, 0b11, 0b10, 0b11, 0b10, 0b00, 0b11, 0b00,
        0b10, 0b01, 0b01, 0b10, 0b00, 0b00, 0b01, 0b11,
    ],
    [
        0b01, 0b11, 0b01, 0b11, 0b10, 0b11, 0b10, 0b00,
        0b11, 0b00, 0b10, 0b01, 0b01, 0b10, 0b00, 0b00,
    ],
    [
        0b00, 0b00, 0b01, 0b11, 0b01, 0b11, 0b10, 0b11,
        0b10, 0b00, 0b11, 0b00, 0b10, 0b01, 0b01, 0b10,
    ],
    [
        0b01, 0b10, 0b00, 0b00, 0b01, 0b11, 0b01, 0b11,
        0b10, 0b11, 0b10, 0b00, 0b11, 0b00, 0b10, 0b01,
    ],
    [
        0b10, 0b01, 0b01, 0b10, 0b00, 0b00, 0b01, 0b11,
        0b01, 0b11, 0b10, 0b11, 0b10, 0b00, 0b11, 0b00,
    ],
    [
        0b11, 0b00, 0b10, 0b01, 0b01, 0b10, 0b00, 0b00,
        0b01, 0b11, 0b01, 0b11, 0b10, 0b11, 0b10, 0b00,
    ],
];

/// Split bytes into 4-bit symbols, low nibble first (802.15.4 symbol order)
pub fn bytes_to_symbols(bytes: &[u8]) -> Vec<u8> {
    let mut symbols = Vec::with_capacity(bytes.len() * 2);
    for &byte in bytes {
        symbols.push(byte & 0x0F);
        symbols.push(byte >> 4);
    }
    symbols
}

/// Spread bytes into their chip-pair stream
pub fn spread(bytes: &[u8]) -> Vec<u8> {
    let mut pairs = Vec::with_capacity(bytes.len() * 2 * PAIRS_PER_SYMBOL);
    for symbol in bytes_to_symbols(bytes) {
        pairs.extend_from_slice(&CHIP_PAIRS[symbol as usize]);
    }
    pairs
}

/// Insert the O-QPSK half-chip transition between consecutive pairs: Q holds
/// from the previous pair while I already takes the next pair's value. The
/// output interleaves originals and transitions, `2n - 1` pairs total.
pub fn insert_transitions(pairs: &[u8]) -> Vec<u8> {
    if pairs.is_empty() {
        return Vec::new();
    }

    let mut out = Vec::with_capacity(pairs.len() * 2 - 1);
    out.push(pairs[0]);
    for window in pairs.windows(2) {
        out.push((window[0] & 0b01) | (window[1] & 0b10));
        out.push(window[1]);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rotate_right(row: &[u8; PAIRS_PER_SYMBOL], by: usize) -> [u8; PAIRS_PER_SYMBOL] {
        let mut rotated = *row;
        rotated.rotate_right(by);
        rotated
    }

    #[test]
    fn test_table_rotation_structure() {
        // Symbols 1..7 are successive 4-chip (2-pair) rotations of symbol 0
        for symbol in 1..8 {
            assert_eq!(
                CHIP_PAIRS[symbol],
                rotate_right(&CHIP_PAIRS[symbol - 1], 2),
                "symbol {symbol} is not a rotation of its predecessor"
            );
        }
    }

    #[test]
    fn test_table_conjugate_structure() {
        // Symbols 8..15 invert the Q rail of symbols 0..7
        for symbol in 0..8 {
            let conjugated: Vec<u8> = CHIP_PAIRS[symbol]
                .iter()
                .map(|pair| pair ^ 0b01)
                .collect();
            assert_eq!(CHIP_PAIRS[symbol + 8].to_vec(), conjugated);
        }
    }

    #[test]
    fn test_symbol_order_low_nibble_first() {
        assert_eq!(bytes_to_symbols(&[0x1D]), vec![0x0D, 0x01]);
        assert_eq!(bytes_to_symbols(&[0xAB, 0xCD]), vec![0x0B, 0x0A, 0x0D, 0x0C]);
    }

    #[test]
    fn test_spread_one_byte() {
        let pairs = spread(&[0x10]);
        assert_eq!(pairs.len(), 2 * PAIRS_PER_SYMBOL);
        assert_eq!(&pairs[..PAIRS_PER_SYMBOL], &CHIP_PAIRS[0]);
        assert_eq!(&pairs[PAIRS_PER_SYMBOL..], &CHIP_PAIRS[1]);
    }

    #[test]
    fn test_transitions_interleave() {
        // Q from the left neighbour, I from the right
        assert_eq!(insert_transitions(&[0b11, 0b00]), vec![0b11, 0b01, 0b00]);
        assert_eq!(insert_transitions(&[0b00, 0b11]), vec![0b00, 0b10, 0b11]);
        assert_eq!(insert_transitions(&[0b10]), vec![0b10]);
        assert!(insert_transitions(&[]).is_empty());
    }

    #[test]
    fn test_transitions_length() {
        let pairs = spread(&[0xA7]);
        assert_eq!(insert_transitions(&pairs).len(), 2 * pairs.len() - 1);
    }
}
