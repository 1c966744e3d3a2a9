//! # Adapter Command Set
//!
//! Command bytes and wire-level types for the I2C bridge protocol.

use serde::Serialize;

use crate::error::TransferError;

/// Echo command (`'e', byte` -> `byte`)
pub const CMD_ECHO: u8 = b'e';

/// Status request (`'?'` -> 80 ASCII bytes)
pub const CMD_STATUS: u8 = b'?';

/// Bus reset (`'x'` -> 1 line-state byte)
pub const CMD_RESET: u8 = b'x';

/// I2C START with address byte (`'s', addr` -> 1 ack byte)
pub const CMD_START: u8 = b's';

/// I2C STOP (`'p'`, no response)
pub const CMD_STOP: u8 = b'p';

/// Register read (`'r', dev, reg, count` -> count bytes)
pub const CMD_READ_REGISTER: u8 = b'r';

/// Bus scan (`'d'` -> one byte per address)
pub const CMD_SCAN: u8 = b'd';

/// Enter monitor mode
pub const CMD_MONITOR_ON: u8 = b'm';

/// Leave monitor mode
pub const CMD_MONITOR_OFF: u8 = b' ';

/// Enter capture mode (`'c'` -> continuous symbol stream)
pub const CMD_CAPTURE: u8 = b'c';

/// Leave capture mode
///
/// The adapter drops out of capture on any received byte and discards it;
/// the monitor-off no-op is used so nothing else changes.
pub const CMD_EXIT_CAPTURE: u8 = CMD_MONITOR_OFF;

/// Write chunk header base (`0xC0 | (n - 1)`)
pub const WRITE_CHUNK_BASE: u8 = 0xC0;

/// Read chunk header base (`0x80 | (n - 1)`)
pub const READ_CHUNK_BASE: u8 = 0x80;

/// Maximum payload bytes per chunk (device protocol limit)
pub const MAX_CHUNK_SIZE: usize = 64;

/// Largest count a register read can request
pub const MAX_REGISTER_READ: usize = 255;

/// Status line length in bytes
pub const STATUS_RESPONSE_LEN: usize = 80;

/// First address reported by a scan
pub const SCAN_FIRST_ADDRESS: u8 = 0x08;

/// Number of addresses reported by a scan (0x08..=0x77)
pub const SCAN_ADDRESS_COUNT: usize = 112;

/// Largest 7-bit device address
pub const MAX_DEVICE_ADDRESS: u8 = 0x7F;

/// Transfer direction encoded in the low bit of the address byte
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    /// Master writes to the device (bit 0 clear)
    Write,
    /// Master reads from the device (bit 0 set)
    Read,
}

impl Direction {
    /// Direction bit value
    pub fn bit(self) -> u8 {
        match self {
            Direction::Write => 0,
            Direction::Read => 1,
        }
    }

    /// Direction from the low bit of an address byte
    pub fn from_bit(byte: u8) -> Self {
        if byte & 1 == 1 {
            Direction::Read
        } else {
            Direction::Write
        }
    }
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Direction::Write => f.write_str("WRITE"),
            Direction::Read => f.write_str("READ"),
        }
    }
}

/// Bus clock selection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BusSpeed {
    /// Standard mode
    Khz100,
    /// Fast mode
    Khz400,
}

impl BusSpeed {
    /// Command byte selecting this speed
    pub fn command(self) -> u8 {
        match self {
            BusSpeed::Khz100 => b'1',
            BusSpeed::Khz400 => b'4',
        }
    }

    /// Speed in kHz
    pub fn khz(self) -> u16 {
        match self {
            BusSpeed::Khz100 => 100,
            BusSpeed::Khz400 => 400,
        }
    }

    /// Speed from a kHz value, if supported
    pub fn from_khz(khz: u16) -> Option<Self> {
        match khz {
            100 => Some(BusSpeed::Khz100),
            400 => Some(BusSpeed::Khz400),
            _ => None,
        }
    }
}

/// Check that `address` fits in 7 bits
pub fn check_address(address: u8) -> Result<u8, TransferError> {
    if address > MAX_DEVICE_ADDRESS {
        return Err(TransferError::InvalidAddress(address));
    }
    Ok(address)
}

/// Whether an ack byte acknowledges (only bit 0 is meaningful)
pub fn is_ack(byte: u8) -> bool {
    byte & 1 == 1
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_constants() {
        assert_eq!(CMD_ECHO, 0x65);
        assert_eq!(CMD_STATUS, 0x3F);
        assert_eq!(CMD_START, 0x73);
        assert_eq!(CMD_STOP, 0x70);
        assert_eq!(CMD_MONITOR_OFF, 0x20);
        assert_eq!(CMD_EXIT_CAPTURE, 0x20);
        assert_eq!(MAX_CHUNK_SIZE, 64);
        assert_eq!(STATUS_RESPONSE_LEN, 80);
    }

    #[test]
    fn test_direction_bits() {
        assert_eq!(Direction::Write.bit(), 0);
        assert_eq!(Direction::Read.bit(), 1);
        assert_eq!(Direction::from_bit(0xA1), Direction::Read);
        assert_eq!(Direction::from_bit(0xA0), Direction::Write);
        assert_eq!(Direction::Read.to_string(), "READ");
    }

    #[test]
    fn test_bus_speed() {
        assert_eq!(BusSpeed::Khz100.command(), 0x31);
        assert_eq!(BusSpeed::Khz400.command(), 0x34);
        assert_eq!(BusSpeed::from_khz(400), Some(BusSpeed::Khz400));
        assert_eq!(BusSpeed::from_khz(1000), None);
    }

    #[test]
    fn test_check_address() {
        assert_eq!(check_address(0x50), Ok(0x50));
        assert_eq!(check_address(0x7F), Ok(0x7F));
        assert_eq!(check_address(0x80), Err(TransferError::InvalidAddress(0x80)));
    }

    #[test]
    fn test_is_ack_ignores_upper_bits() {
        assert!(is_ack(0x01));
        assert!(is_ack(0xFF));
        assert!(!is_ack(0x00));
        assert!(!is_ack(0xFE));
    }
}
