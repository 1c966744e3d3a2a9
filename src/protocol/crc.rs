//! # CRC-16/CCITT Implementation
//!
//! CRC-16/CCITT checksum used by the adapter to count I2C payload bytes.
//!
//! **Polynomial**: 0x1021 (x^16 + x^12 + x^5 + 1), MSB first
//! **Initial Value**: whatever the device reports at connect time

/// CRC-16/CCITT polynomial
const CRC16_POLY: u16 = 0x1021;

/// Precomputed CRC16 lookup table, identical to the adapter firmware's table
const CRC16_TABLE: [u16; 256] = generate_crc16_table();

/// Generate CRC16 lookup table at compile time
const fn generate_crc16_table() -> [u16; 256] {
    let mut table = [0u16; 256];
    let mut i = 0;

    while i < 256 {
        let mut crc = (i as u16) << 8;
        let mut j = 0;

        while j < 8 {
            if (crc & 0x8000) != 0 {
                crc = (crc << 1) ^ CRC16_POLY;
            } else {
                crc <<= 1;
            }
            j += 1;
        }

        table[i] = crc;
        i += 1;
    }

    table
}

/// Continue a CRC-16/CCITT computation over `data`
///
/// # Arguments
///
/// * `seed` - CRC value to continue from
/// * `data` - Bytes to fold in
///
/// # Returns
///
/// * `u16` - Updated CRC
///
/// # Examples
///
/// ```
/// use i2c_bridge::protocol::crc::crc16_ccitt;
///
/// assert_eq!(crc16_ccitt(0x0000, b"123456789"), 0x31C3);
/// ```
pub fn crc16_ccitt(seed: u16, data: &[u8]) -> u16 {
    let mut crc = seed;

    for &byte in data {
        let idx = ((crc >> 8) ^ byte as u16) & 0xFF;
        crc = CRC16_TABLE[idx as usize] ^ (crc << 8);
    }

    crc
}

/// Bitwise CRC-16/CCITT (slow, for verification)
#[allow(dead_code)]
fn crc16_ccitt_slow(seed: u16, data: &[u8]) -> u16 {
    let mut crc = seed;

    for &byte in data {
        crc ^= (byte as u16) << 8;

        for _ in 0..8 {
            if (crc & 0x8000) != 0 {
                crc = (crc << 1) ^ CRC16_POLY;
            } else {
                crc <<= 1;
            }
        }
    }

    crc
}

/// Host-side mirror of the adapter's running payload checksum
///
/// Seeded from the device-reported value, so it verifies continuity from the
/// moment of connection rather than an absolute count since power-on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChecksumTracker {
    value: u16,
}

impl ChecksumTracker {
    /// Start tracking from `seed`
    pub fn new(seed: u16) -> Self {
        Self { value: seed }
    }

    /// Fold payload bytes into the running checksum
    pub fn update(&mut self, data: &[u8]) {
        self.value = crc16_ccitt(self.value, data);
    }

    /// Current checksum value
    pub fn value(&self) -> u16 {
        self.value
    }

    /// Whether the tracker agrees with a device-reported value
    pub fn matches(&self, device: u16) -> bool {
        self.value == device
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_crc16_empty_keeps_seed() {
        assert_eq!(crc16_ccitt(0x0000, &[]), 0x0000);
        assert_eq!(crc16_ccitt(0xBEEF, &[]), 0xBEEF);
    }

    #[test]
    fn test_crc16_known_vectors() {
        // CRC-16/XMODEM check value
        assert_eq!(crc16_ccitt(0x0000, b"123456789"), 0x31C3);
        // CRC-16/CCITT-FALSE check value
        assert_eq!(crc16_ccitt(0xFFFF, b"123456789"), 0x29B1);
    }

    #[test]
    fn test_crc16_table_matches_firmware_entries() {
        assert_eq!(CRC16_TABLE[0], 0x0000);
        assert_eq!(CRC16_TABLE[1], 0x1021);
        assert_eq!(CRC16_TABLE[2], 0x2042);
        assert_eq!(CRC16_TABLE[16], 0x1231);
        assert_eq!(CRC16_TABLE[128], 0x9188);
        assert_eq!(CRC16_TABLE[254], 0x0ED1);
        assert_eq!(CRC16_TABLE[255], 0x1EF0);
    }

    #[test]
    fn test_crc16_lookup_table_matches_slow() {
        let test_data = [
            vec![0x01, 0x02, 0x03],
            vec![0xFF, 0xFE, 0xFD],
            vec![0x73, 0xA1, 0xC0, 0x03],
            vec![0x00; 64],
            vec![0xFF; 65],
        ];

        for seed in [0x0000, 0xFFFF, 0x1A2B] {
            for data in test_data.iter() {
                assert_eq!(
                    crc16_ccitt(seed, data),
                    crc16_ccitt_slow(seed, data),
                    "CRC mismatch for seed 0x{:04X}, data: {:?}",
                    seed,
                    data
                );
            }
        }
    }

    #[test]
    fn test_incremental_equals_one_shot() {
        let data: Vec<u8> = (0..=255u8).chain(0..=100u8).collect();
        let one_shot = crc16_ccitt(0x1A2B, &data);

        let mut tracker = ChecksumTracker::new(0x1A2B);
        for byte in &data {
            tracker.update(std::slice::from_ref(byte));
        }
        assert_eq!(tracker.value(), one_shot);

        // Any split point gives the same result
        for split in [0, 1, 63, 64, 65, 200, data.len()] {
            let (head, tail) = data.split_at(split);
            assert_eq!(crc16_ccitt(crc16_ccitt(0x1A2B, head), tail), one_shot);
        }
    }

    #[test]
    fn test_tracker_matches() {
        let mut tracker = ChecksumTracker::new(0x0000);
        tracker.update(b"123456789");
        assert!(tracker.matches(0x31C3));
        assert!(!tracker.matches(0x31C4));
    }
}
