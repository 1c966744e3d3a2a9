//! # Configuration Module
//!
//! Handles loading and validating configuration from TOML files.

use serde::de::Error;
use serde::Deserialize;
use std::fs;
use std::path::Path;
use std::time::Duration;

use crate::error::{BridgeError, Result};
use crate::protocol::commands::{BusSpeed, MAX_DEVICE_ADDRESS};

/// Main configuration structure
#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub serial: SerialConfig,
    #[serde(default)]
    pub bus: BusConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub capture: CaptureConfig,
    #[serde(default)]
    pub relay: RelayConfig,
}

/// Serial port configuration
#[derive(Debug, Deserialize, Clone)]
pub struct SerialConfig {
    #[serde(default = "default_serial_port")]
    pub port: String,

    #[serde(default = "default_baud_rate")]
    pub baud_rate: u32,

    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

/// I2C bus configuration
#[derive(Debug, Deserialize, Clone)]
pub struct BusConfig {
    #[serde(default = "default_speed_khz")]
    pub speed_khz: u16,

    #[serde(default)]
    pub reset_on_connect: bool,
}

/// Logging configuration
#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Directory for daily rolling log files (empty = console only)
    #[serde(default)]
    pub dir: String,
}

/// Capture configuration
#[derive(Debug, Deserialize, Clone, Default)]
pub struct CaptureConfig {
    /// JSONL event log path (empty = no log)
    #[serde(default)]
    pub log_path: String,
}

/// Relay board configuration
#[derive(Debug, Deserialize, Clone)]
pub struct RelayConfig {
    #[serde(default = "default_relay_address")]
    pub address: u8,

    #[serde(default = "default_step_ms")]
    pub step_ms: u64,
}

// Default value functions
fn default_serial_port() -> String { "/dev/ttyUSB0".to_string() }
fn default_baud_rate() -> u32 { 1_000_000 }
fn default_timeout_ms() -> u64 { 1000 }

fn default_speed_khz() -> u16 { 100 }

fn default_log_level() -> String { "info".to_string() }

fn default_relay_address() -> u8 { 0x20 }
fn default_step_ms() -> u64 { 1000 }

impl Default for SerialConfig {
    fn default() -> Self {
        Self {
            port: default_serial_port(),
            baud_rate: default_baud_rate(),
            timeout_ms: default_timeout_ms(),
        }
    }
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            speed_khz: default_speed_khz(),
            reset_on_connect: false,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            dir: String::new(),
        }
    }
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            address: default_relay_address(),
            step_ms: default_step_ms(),
        }
    }
}

const VALID_BAUD_RATES: [u32; 4] = [115_200, 460_800, 921_600, 1_000_000];
const VALID_LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

fn invalid(msg: impl std::fmt::Display) -> BridgeError {
    BridgeError::Config(toml::de::Error::custom(msg))
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the configuration file
    ///
    /// # Returns
    ///
    /// * `Result<Config>` - Loaded and validated configuration
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - File cannot be read
    /// - TOML parsing fails
    /// - Validation fails
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use i2c_bridge::config::Config;
    ///
    /// let config = Config::load("config/default.toml")?;
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Per-read transport timeout
    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.serial.timeout_ms)
    }

    /// Configured bus speed
    pub fn bus_speed(&self) -> Option<BusSpeed> {
        BusSpeed::from_khz(self.bus.speed_khz)
    }

    /// Relay demo step
    pub fn relay_step(&self) -> Duration {
        Duration::from_millis(self.relay.step_ms)
    }

    /// Validate configuration values
    ///
    /// # Errors
    ///
    /// Returns error if any configuration value is out of valid range
    pub fn validate(&self) -> Result<()> {
        if self.serial.port.is_empty() {
            return Err(invalid("serial port cannot be empty"));
        }

        if !VALID_BAUD_RATES.contains(&self.serial.baud_rate) {
            return Err(invalid(
                "baud_rate must be one of: 115200, 460800, 921600, 1000000",
            ));
        }

        if self.serial.timeout_ms == 0 || self.serial.timeout_ms > 10000 {
            return Err(invalid("timeout_ms must be between 1 and 10000"));
        }

        if self.bus_speed().is_none() {
            return Err(invalid("speed_khz must be one of: 100, 400"));
        }

        if !VALID_LOG_LEVELS.contains(&self.logging.level.as_str()) {
            return Err(invalid(format!(
                "log level must be one of: {}",
                VALID_LOG_LEVELS.join(", ")
            )));
        }

        if self.relay.address > MAX_DEVICE_ADDRESS {
            return Err(invalid(format!(
                "relay address 0x{:02x} is not a 7-bit address",
                self.relay.address
            )));
        }

        if self.relay.step_ms == 0 || self.relay.step_ms > 60000 {
            return Err(invalid("step_ms must be between 1 and 60000"));
        }

        Ok(())
    }
}
