//! # Command Frame Encoder
//!
//! Builds the request bytes for each adapter command.

use bytes::{BufMut, Bytes, BytesMut};

use super::commands::*;

/// Encode an echo probe
pub fn encode_echo(byte: u8) -> [u8; 2] {
    [CMD_ECHO, byte]
}

/// Encode a START frame
///
/// # Arguments
///
/// * `address` - 7-bit device address (caller validates)
/// * `direction` - Transfer direction
///
/// # Returns
///
/// * `[u8; 2]` - `['s', (address << 1) | direction_bit]`
///
/// # Examples
///
/// ```
/// use i2c_bridge::protocol::commands::Direction;
/// use i2c_bridge::protocol::encoder::encode_start;
///
/// assert_eq!(encode_start(0x50, Direction::Read), [b's', 0xA1]);
/// ```
pub fn encode_start(address: u8, direction: Direction) -> [u8; 2] {
    [CMD_START, (address << 1) | direction.bit()]
}

/// Encode one write chunk: header followed by payload
///
/// # Arguments
///
/// * `chunk` - Payload of 1..=64 bytes
///
/// # Returns
///
/// * `Bytes` - `0xC0 | (len - 1)` followed by the payload
pub fn encode_write_chunk(chunk: &[u8]) -> Bytes {
    debug_assert!(!chunk.is_empty() && chunk.len() <= MAX_CHUNK_SIZE);

    let mut frame = BytesMut::with_capacity(1 + chunk.len());
    frame.put_u8(WRITE_CHUNK_BASE | (chunk.len() - 1) as u8);
    frame.put_slice(chunk);
    frame.freeze()
}

/// Encode a read chunk header for `len` bytes (1..=64)
pub fn encode_read_chunk(len: usize) -> u8 {
    debug_assert!(len >= 1 && len <= MAX_CHUNK_SIZE);

    READ_CHUNK_BASE | (len - 1) as u8
}

/// Encode a register read request
///
/// The command byte and the 3-byte request go out as one frame.
pub fn encode_read_register(device: u8, register: u8, count: u8) -> [u8; 4] {
    [CMD_READ_REGISTER, device, register, count]
}

/// Encode a monitor mode toggle
pub fn encode_monitor(enable: bool) -> u8 {
    if enable {
        CMD_MONITOR_ON
    } else {
        CMD_MONITOR_OFF
    }
}
