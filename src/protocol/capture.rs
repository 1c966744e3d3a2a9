//! # Bus Capture Decoder
//!
//! Reconstructs I2C bus events from the adapter's capture symbol stream.
//!
//! In capture mode every byte from the device carries two 4-bit symbols,
//! high nibble first:
//!
//! | Symbol | Meaning |
//! |---|---|
//! | `0` | idle |
//! | `1` | START condition |
//! | `2` | STOP condition |
//! | `8..=15` | three data bits in the low 3 bits |
//!
//! Three data symbols make one 9-bit group: 8 data bits followed by the ACK
//! bit (low = acknowledged).

use std::fmt;

use serde::Serialize;

use super::commands::Direction;

/// Idle symbol
pub const SYMBOL_IDLE: u8 = 0;

/// START marker symbol
pub const SYMBOL_START: u8 = 1;

/// STOP marker symbol
pub const SYMBOL_STOP: u8 = 2;

/// Bits carried by one 9-bit group (8 data + ACK)
const GROUP_BITS: u8 = 9;

/// Decoded bus event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum CaptureEvent {
    /// START condition followed by the address byte
    Start {
        /// 7-bit device address
        address: u8,
        /// Transfer direction
        direction: Direction,
        /// Address byte acknowledged by the target
        acknowledged: bool,
    },

    /// Data byte
    Byte {
        /// Transferred byte
        value: u8,
        /// Byte acknowledged by the receiver
        acknowledged: bool,
    },

    /// STOP condition
    Stop,
}

impl fmt::Display for CaptureEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let ack = |acknowledged: bool| if acknowledged { "ACK" } else { "NAK" };

        match *self {
            CaptureEvent::Start {
                address,
                direction,
                acknowledged,
            } => write!(f, "START {:02x} {} {}", address, direction, ack(acknowledged)),
            CaptureEvent::Byte {
                value,
                acknowledged,
            } => write!(f, "BYTE {:02x} {}", value, ack(acknowledged)),
            CaptureEvent::Stop => f.write_str("STOP"),
        }
    }
}

/// Symbol-stream state machine
///
/// Pure: performs no I/O. Feed it symbols (or raw capture bytes) and collect
/// the events it returns.
#[derive(Debug, Clone)]
pub struct CaptureDecoder {
    /// Next completed group is an address byte
    starting: bool,
    /// Pending data bits, oldest in the high positions
    bits: u16,
    /// Number of pending bits (0, 3, 6)
    nbits: u8,
}

impl Default for CaptureDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl CaptureDecoder {
    /// Decoder expecting an address group first
    pub fn new() -> Self {
        Self {
            starting: true,
            bits: 0,
            nbits: 0,
        }
    }

    /// Feed one 4-bit symbol
    ///
    /// Returns the event completed by this symbol, if any.
    ///
    /// A STOP seen mid-group leaves the pending bits in place; they combine
    /// with the following data symbols.
    pub fn feed(&mut self, symbol: u8) -> Option<CaptureEvent> {
        match symbol {
            SYMBOL_IDLE => None,
            SYMBOL_START => {
                self.starting = true;
                None
            }
            SYMBOL_STOP => {
                self.starting = true;
                Some(CaptureEvent::Stop)
            }
            8..=15 => {
                self.bits = (self.bits << 3) | (symbol & 0x07) as u16;
                self.nbits += 3;

                if self.nbits < GROUP_BITS {
                    return None;
                }

                let byte = (self.bits >> 1) as u8;
                let acknowledged = self.bits & 1 == 0;
                self.bits = 0;
                self.nbits = 0;

                if self.starting {
                    self.starting = false;
                    Some(CaptureEvent::Start {
                        address: byte >> 1,
                        direction: Direction::from_bit(byte),
                        acknowledged,
                    })
                } else {
                    Some(CaptureEvent::Byte {
                        value: byte,
                        acknowledged,
                    })
                }
            }
            _ => None,
        }
    }

    /// Feed one raw capture byte (high nibble, then low nibble)
    ///
    /// # Returns
    ///
    /// * Iterator over the zero, one or two events completed by this byte
    pub fn feed_byte(&mut self, byte: u8) -> impl Iterator<Item = CaptureEvent> + '_ {
        [byte >> 4, byte & 0x0F]
            .into_iter()
            .filter_map(move |symbol| self.feed(symbol))
    }

    /// Number of data bits waiting for their group to complete
    pub fn pending_bits(&self) -> u8 {
        self.nbits
    }

    /// Whether the next completed group will be decoded as an address
    pub fn expecting_address(&self) -> bool {
        self.starting
    }
}

/// Encode a 9-bit group (byte + ACK) as three data symbols
///
/// Inverse of the decoder's grouping, used to synthesize capture streams.
pub fn encode_group(byte: u8, acknowledged: bool) -> [u8; 3] {
    let bits = ((byte as u16) << 1) | if acknowledged { 0 } else { 1 };
    [
        0x08 | ((bits >> 6) & 0x07) as u8,
        0x08 | ((bits >> 3) & 0x07) as u8,
        0x08 | (bits & 0x07) as u8,
    ]
}
