//! # I2C Bridge Protocol Module
//!
//! Wire protocol of the USB-to-serial I2C adapter.
//!
//! This module handles:
//! - Command bytes and chunk framing (64-byte chunks, per-chunk ack)
//! - CRC-16/CCITT payload checksum tracking
//! - Status line parsing
//! - Bus capture symbol decoding

pub mod commands;
pub mod encoder;
pub mod status;
pub mod capture;
pub mod crc;
