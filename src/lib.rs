//! # I2C Bridge Library
//!
//! Host-side driver for USB-to-serial I2C bridge adapters.
//!
//! This library speaks the adapter's single-byte command protocol over a serial
//! link: bus transactions (START, chunked writes and reads, STOP), status
//! queries, bus scans, and a capture mode that decodes live bus traffic. A
//! CRC-16/CCITT tracker mirrors the device's running checksum so the host can
//! detect lost or corrupted bytes.

pub mod config;
pub mod error;
pub mod protocol;
pub mod relay;
pub mod serial;
pub mod session;
pub mod telemetry;
