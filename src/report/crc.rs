//! # CRC32 Implementation
//!
//! CRC-32 checksum appended to the Bluetooth output report.
//!
//! **Polynomial**: 0xEDB88320 (reflected IEEE 802.3)
//! **Initial Value**: 0xFFFFFFFF
//! **Final XOR**: none

/// Reflected IEEE 802.3 polynomial
const CRC32_POLY: u32 = 0xEDB8_8320;

/// Initial register value
const CRC32_INIT: u32 = 0xFFFF_FFFF;

/// Precomputed CRC32 lookup table for fast calculation
const CRC32_TABLE: [u32; 256] = generate_crc32_table();

/// Generate CRC32 lookup table at compile time
const fn generate_crc32_table() -> [u32; 256] {
    let mut table = [0u32; 256];
    let mut i = 0;

    while i < 256 {
        let mut crc = i as u32;
        let mut j = 0;

        while j < 8 {
            if (crc & 1) != 0 {
                crc = (crc >> 1) ^ CRC32_POLY;
            } else {
                crc >>= 1;
            }
            j += 1;
        }

        table[i] = crc;
        i += 1;
    }

    table
}

/// Calculate the Bluetooth report CRC32 using the lookup table
///
/// # Arguments
///
/// * `data` - Bytes covered by the checksum (report bytes 0-73)
///
/// # Examples
///
/// ```
/// use ds4_lightbar::report::crc::crc32;
///
/// // Standard check value 0xCBF43926 without the final inversion
/// assert_eq!(crc32(b"123456789"), 0x340B_C6D9);
/// ```
pub fn crc32(data: &[u8]) -> u32 {
    let mut crc = CRC32_INIT;

    for &byte in data {
        crc = CRC32_TABLE[((crc ^ byte as u32) & 0xFF) as usize] ^ (crc >> 8);
    }

    crc
}

/// Bit-by-bit CRC32, used to cross-check the table
#[allow(dead_code)]
fn crc32_slow(data: &[u8]) -> u32 {
    let mut crc = CRC32_INIT;

    for &byte in data {
        crc ^= byte as u32;

        for _ in 0..8 {
            if (crc & 1) != 0 {
                crc = (crc >> 1) ^ CRC32_POLY;
            } else {
                crc >>= 1;
            }
        }
    }

    crc
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_crc32_empty_is_initial_value() {
        assert_eq!(crc32(&[]), 0xFFFF_FFFF);
    }

    #[test]
    fn test_crc32_check_value() {
        // IEEE check value is 0xCBF43926 after the final XOR we do not apply
        assert_eq!(crc32(b"123456789"), !0xCBF4_3926u32);
    }

    #[test]
    fn test_crc32_lookup_table_matches_slow() {
        let test_data = [
            vec![0x11, 0xC0, 0x20, 0xF3, 0x04],
            vec![0x00; 74],
            vec![0xFF; 74],
            (0..74).map(|i| i as u8).collect::<Vec<_>>(),
        ];

        for data in test_data.iter() {
            assert_eq!(crc32(data), crc32_slow(data), "CRC mismatch for data: {:?}", data);
        }
    }

    #[test]
    fn test_crc32_is_deterministic() {
        let prefix: Vec<u8> = (0..74).map(|i| (i * 7) as u8).collect();
        assert_eq!(crc32(&prefix), crc32(&prefix));
    }

    #[test]
    fn test_crc32_changes_with_data() {
        let mut data = [0u8; 74];
        let before = crc32(&data);
        data[8] = 0xFF;
        assert_ne!(before, crc32(&data), "CRC should change when data changes");
    }
}
