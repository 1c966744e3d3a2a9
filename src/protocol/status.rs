//! # Status Line Parser
//!
//! Decodes the adapter's fixed-layout ASCII status line:
//!
//! ```text
//! [model serial uptime voltage current temperature mode sda scl speed pullups crc]
//! ```
//!
//! The device pads the line to 80 bytes; anything after `]` is ignored.

use std::fmt;
use std::str::FromStr;

use crate::error::ParseError;

/// Longest model identifier the device reports
pub const MAX_MODEL_LEN: usize = 15;

/// Longest serial number the device reports
pub const MAX_SERIAL_LEN: usize = 8;

/// Adapter operating mode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperatingMode {
    /// Hardware I2C master (`I`)
    I2c,
    /// Bit-bang mode (`B`)
    BitBang,
}

impl OperatingMode {
    /// Mode from its status-line character
    pub fn from_char(c: char) -> Option<Self> {
        match c {
            'I' => Some(OperatingMode::I2c),
            'B' => Some(OperatingMode::BitBang),
            _ => None,
        }
    }

    /// Status-line character for this mode
    pub fn as_char(self) -> char {
        match self {
            OperatingMode::I2c => 'I',
            OperatingMode::BitBang => 'B',
        }
    }
}

/// Snapshot of the adapter's status line
#[derive(Debug, Clone, PartialEq)]
pub struct StatusRecord {
    /// Model identifier (e.g. "I2CDriver1")
    pub model: String,

    /// USB serial number
    pub serial: String,

    /// Time since boot in seconds
    pub uptime: u64,

    /// USB bus voltage in volts
    pub voltage: f32,

    /// Device current in mA
    pub current: f32,

    /// Temperature in °C
    pub temperature: f32,

    /// Operating mode
    pub mode: OperatingMode,

    /// SDA line level
    pub sda: bool,

    /// SCL line level
    pub scl: bool,

    /// Configured bus speed in kHz
    pub speed: u16,

    /// Pull-up configuration bitmask
    pub pullups: u8,

    /// Device-reported CRC-16/CCITT over I2C payload bytes
    pub checksum: u16,
}

impl StatusRecord {
    /// Both lines idle high
    pub fn bus_free(&self) -> bool {
        self.sda && self.scl
    }
}

impl fmt::Display for StatusRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "model:        {}", self.model)?;
        writeln!(f, "serial:       {}", self.serial)?;
        writeln!(f, "uptime:       {} seconds", self.uptime)?;
        writeln!(f, "voltage:      {:.3}V", self.voltage)?;
        writeln!(f, "current:      {:.1}mA", self.current)?;
        writeln!(f, "temperature:  {:.1}°C", self.temperature)?;
        writeln!(
            f,
            "mode:         {}",
            match self.mode {
                OperatingMode::I2c => "I2C",
                OperatingMode::BitBang => "BitBang",
            }
        )?;
        writeln!(f, "sda:          {}", self.sda as u8)?;
        writeln!(f, "scl:          {}", self.scl as u8)?;
        writeln!(f, "i2c bus free: {}", self.bus_free())?;
        writeln!(f, "speed:        {}kHz", self.speed)?;
        writeln!(f, "pullups:      0x{:02x}", self.pullups)?;
        write!(f, "hardware crc: 0x{:04x}", self.checksum)
    }
}

fn malformed(reason: impl Into<String>) -> ParseError {
    ParseError::Malformed(reason.into())
}

/// Positional field scanner over the bracketed body
struct Fields<'a> {
    inner: std::str::SplitAsciiWhitespace<'a>,
}

impl<'a> Fields<'a> {
    fn next(&mut self, name: &str) -> Result<&'a str, ParseError> {
        self.inner
            .next()
            .ok_or_else(|| malformed(format!("missing {}", name)))
    }

    fn parse<T: FromStr>(&mut self, name: &str) -> Result<T, ParseError> {
        let token = self.next(name)?;
        token
            .parse()
            .map_err(|_| malformed(format!("bad {}: {:?}", name, token)))
    }

    fn text(&mut self, name: &str, max_len: usize) -> Result<String, ParseError> {
        let token = self.next(name)?;
        if token.len() > max_len {
            return Err(malformed(format!(
                "{} longer than {} chars: {:?}",
                name, max_len, token
            )));
        }
        Ok(token.to_string())
    }

    fn level(&mut self, name: &str) -> Result<bool, ParseError> {
        match self.next(name)? {
            "0" => Ok(false),
            "1" => Ok(true),
            other => Err(malformed(format!("bad {}: {:?}", name, other))),
        }
    }

    fn hex(&mut self, name: &str, max_digits: usize) -> Result<u16, ParseError> {
        let token = self.next(name)?;
        if token.is_empty() || token.len() > max_digits {
            return Err(malformed(format!("bad {}: {:?}", name, token)));
        }
        u16::from_str_radix(token, 16).map_err(|_| malformed(format!("bad {}: {:?}", name, token)))
    }
}

/// Parse the adapter status line
///
/// # Arguments
///
/// * `raw` - Status response (80 bytes from the device, padding allowed)
///
/// # Returns
///
/// * `Result<StatusRecord, ParseError>` - Parsed record
///
/// # Errors
///
/// Returns [`ParseError::Malformed`] if the brackets are missing, any field is
/// missing, out of place, or fails to scan as its type, or extra fields follow.
///
/// # Examples
///
/// ```
/// use i2c_bridge::protocol::status::parse_status;
///
/// let status = parse_status(b"[I2CDriver1 AB12CD34 12345 5.020 123.4 25.3 I 1 1 64 3f 1a2b]")?;
/// assert_eq!(status.checksum, 0x1a2b);
/// # Ok::<(), i2c_bridge::error::ParseError>(())
/// ```
pub fn parse_status(raw: &[u8]) -> Result<StatusRecord, ParseError> {
    if raw.first() != Some(&b'[') {
        return Err(malformed("missing '['"));
    }

    let end = raw
        .iter()
        .position(|&b| b == b']')
        .ok_or_else(|| malformed("missing ']'"))?;

    let body = std::str::from_utf8(&raw[1..end]).map_err(|_| malformed("non-ASCII content"))?;
    let mut fields = Fields {
        inner: body.split_ascii_whitespace(),
    };

    let model = fields.text("model", MAX_MODEL_LEN)?;
    let serial = fields.text("serial", MAX_SERIAL_LEN)?;
    let uptime = fields.parse::<u64>("uptime")?;
    let voltage = fields.parse::<f32>("voltage")?;
    let current = fields.parse::<f32>("current")?;
    let temperature = fields.parse::<f32>("temperature")?;

    let mode_token = fields.next("mode")?;
    let mut mode_chars = mode_token.chars();
    let mode = match (mode_chars.next(), mode_chars.next()) {
        (Some(c), None) => OperatingMode::from_char(c),
        _ => None,
    }
    .ok_or_else(|| malformed(format!("bad mode: {:?}", mode_token)))?;

    let sda = fields.level("sda")?;
    let scl = fields.level("scl")?;
    let speed = fields.parse::<u16>("speed")?;
    let pullups = fields.hex("pullups", 2)? as u8;
    let checksum = fields.hex("checksum", 4)?;

    if let Some(extra) = fields.inner.next() {
        return Err(malformed(format!("unexpected field: {:?}", extra)));
    }

    Ok(StatusRecord {
        model,
        serial,
        uptime,
        voltage,
        current,
        temperature,
        mode,
        sda,
        scl,
        speed,
        pullups,
        checksum,
    })
}
