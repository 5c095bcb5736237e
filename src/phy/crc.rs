// CRC-16/CCITT as used for the 802.15.4 frame check sequence
// Polynomial: x^16 + x^12 + x^5 + 1 (0x1021), initial value 0x0000

const CRC16_POLYNOMIAL: u16 = 0x1021;

/// Calculate the CRC-16 frame check sequence for the given data
pub fn calculate_fcs(data: &[u8]) -> u16 {
    let mut crc: u16 = 0x0000;

    for &byte in data {
        crc ^= (byte as u16) << 8;
        for _ in 0..8 {
            if (crc & 0x8000) != 0 {
                crc = (crc << 1) ^ CRC16_POLYNOMIAL;
            } else {
                crc <<= 1;
            }
        }
    }

    crc
}

/// Verify a frame check sequence
pub fn verify_fcs(data: &[u8], expected_fcs: u16) -> bool {
    calculate_fcs(data) == expected_fcs
}
