//! # Error Types
//!
//! Custom error types for I2C Bridge using `thiserror`.
//!
//! Each protocol failure class has its own enum so callers can match on the
//! exact outcome; [`BridgeError`] wraps them all for `?` propagation.

use thiserror::Error;

/// Connection establishment errors
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConnectError {
    /// Liveness probe (echo) got no matching answer
    #[error("device did not answer echo probe 0x{sent:02X} (received {received:02X?})")]
    NoResponse {
        /// Probe byte sent to the device
        sent: u8,
        /// Byte echoed back, if any arrived
        received: Option<u8>,
    },
}

/// Errors raised by data-carrying I2C operations
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TransferError {
    /// Device cleared the ack bit for a chunk or START
    #[error("not acknowledged (chunk {chunk}, offset {offset})")]
    NotAcknowledged {
        /// Zero-based chunk index within the call
        chunk: usize,
        /// Byte offset of the chunk within the caller's buffer
        offset: usize,
    },

    /// Transport could not deliver the requested byte count
    #[error("short read: expected {expected} bytes")]
    ShortRead {
        /// Length of the single transport read that failed; for chunked
        /// reads this is the failing chunk, not the caller's total
        expected: usize,
    },

    /// Device address does not fit in 7 bits
    #[error("invalid 7-bit device address 0x{0:02X}")]
    InvalidAddress(u8),

    /// Requested count exceeds what the command can encode
    #[error("count {count} out of range (max {max})")]
    CountOutOfRange {
        /// Requested count
        count: usize,
        /// Largest count the command accepts
        max: usize,
    },
}

/// Status line parse errors
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ParseError {
    /// Status line did not scan
    #[error("malformed status line: {0}")]
    Malformed(String),
}

/// Host/device checksum cross-check errors
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum IntegrityError {
    /// Host-tracked and device-reported checksums diverged
    #[error("checksum mismatch: host 0x{host:04X}, device 0x{device:04X}")]
    ChecksumMismatch {
        /// Host tracker value
        host: u16,
        /// Device-reported value
        device: u16,
    },
}

/// Main error type for I2C Bridge
#[derive(Debug, Error)]
pub enum BridgeError {
    /// Connection errors
    #[error(transparent)]
    Connect(#[from] ConnectError),

    /// Transfer errors
    #[error(transparent)]
    Transfer(#[from] TransferError),

    /// Status parse errors
    #[error(transparent)]
    Parse(#[from] ParseError),

    /// Checksum cross-check errors
    #[error(transparent)]
    Integrity(#[from] IntegrityError),

    /// Serial port errors
    #[error("Serial port error: {0}")]
    Serial(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] toml::de::Error),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for I2C Bridge
pub type Result<T> = std::result::Result<T, BridgeError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = ConnectError::NoResponse {
            sent: 0x5A,
            received: Some(0x00),
        };
        assert!(err.to_string().contains("0x5A"));

        let err = IntegrityError::ChecksumMismatch {
            host: 0x1A2B,
            device: 0xFFFF,
        };
        assert_eq!(
            err.to_string(),
            "checksum mismatch: host 0x1A2B, device 0xFFFF"
        );
    }

    #[test]
    fn test_bridge_error_from_variants() {
        let err: BridgeError = TransferError::ShortRead { expected: 4 }.into();
        assert!(matches!(
            err,
            BridgeError::Transfer(TransferError::ShortRead { expected: 4 })
        ));

        let err: BridgeError = ParseError::Malformed("uptime".into()).into();
        assert_eq!(err.to_string(), "malformed status line: uptime");
    }
}
