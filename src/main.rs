//! # I2C Bridge
//!
//! Command-line front end for USB-to-serial I2C bridge adapters.
//!
//! Every command opens the configured serial port, connects (echo probe and
//! checksum seeding), runs one operation and disconnects.
//!
//! # Examples
//!
//! ```bash
//! i2c-bridge info
//! i2c-bridge --port /dev/ttyUSB1 scan
//! i2c-bridge read 0x50 0x00 16
//! i2c-bridge write 0x20 0x02 0xff 0x00
//! i2c-bridge --config config/default.toml capture --log capture.jsonl
//! ```

use std::io::{self, BufWriter};
use std::fs::File;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

use i2c_bridge::config::{Config, LoggingConfig};
use i2c_bridge::protocol::capture::CaptureEvent;
use i2c_bridge::protocol::commands::{BusSpeed, SCAN_ADDRESS_COUNT, SCAN_FIRST_ADDRESS};
use i2c_bridge::relay::RelayBoard;
use i2c_bridge::serial::SerialTransport;
use i2c_bridge::session::{CancelToken, CaptureSink, Session};
use i2c_bridge::telemetry::JsonlCaptureLog;

/// Log file name prefix inside the logging directory
const LOG_FILE_PREFIX: &str = "i2c-bridge.log";

/// Poll period while waiting for Ctrl+C
const WAIT_POLL: Duration = Duration::from_millis(50);

#[derive(Parser)]
#[command(name = "i2c-bridge")]
#[command(about = "Host-side driver for USB-to-serial I2C bridge adapters")]
#[command(version)]
struct Cli {
    /// Configuration file (TOML)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Serial device, overrides the configured port
    #[arg(short, long)]
    port: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show adapter status
    Info,

    /// List devices that acknowledge their address
    Scan,

    /// Reset the I2C bus
    Reset,

    /// Set the bus clock (100 or 400 kHz)
    Speed {
        #[arg(value_parser = parse_speed)]
        khz: BusSpeed,
    },

    /// Read registers from a device
    Read {
        /// 7-bit device address
        #[arg(value_parser = parse_number::<u8>)]
        device: u8,

        /// First register
        #[arg(value_parser = parse_number::<u8>)]
        register: u8,

        /// Number of bytes
        #[arg(value_parser = parse_number::<usize>)]
        count: usize,
    },

    /// Write registers on a device
    Write {
        /// 7-bit device address
        #[arg(value_parser = parse_number::<u8>)]
        device: u8,

        /// First register
        #[arg(value_parser = parse_number::<u8>)]
        register: u8,

        /// Bytes to write
        #[arg(required = true, value_parser = parse_number::<u8>)]
        data: Vec<u8>,
    },

    /// Turn on the adapter's monitor display until Ctrl+C
    Monitor,

    /// Decode bus traffic until Ctrl+C
    Capture {
        /// Append events to a JSONL log
        #[arg(short, long)]
        log: Option<PathBuf>,
    },

    /// Cycle the relay board through its demo sequence
    RelayDemo,
}

/// Parse a decimal or `0x`-prefixed hex number
fn parse_number<T: TryFrom<u64>>(s: &str) -> std::result::Result<T, String> {
    let value = match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some(hex) => u64::from_str_radix(hex, 16),
        None => s.parse::<u64>(),
    }
    .map_err(|e| format!("invalid number '{}': {}", s, e))?;

    T::try_from(value).map_err(|_| format!("{} is out of range", s))
}

fn parse_speed(s: &str) -> std::result::Result<BusSpeed, String> {
    let khz = parse_number::<u16>(s)?;
    BusSpeed::from_khz(khz).ok_or_else(|| format!("unsupported speed {}kHz (use 100 or 400)", khz))
}

/// Scan results as an 8-column address grid, `--` for silent addresses
fn format_scan(found: &[u8]) -> String {
    let mut out = String::new();
    let addresses = SCAN_FIRST_ADDRESS..SCAN_FIRST_ADDRESS + SCAN_ADDRESS_COUNT as u8;

    for (i, address) in addresses.enumerate() {
        if found.contains(&address) {
            out.push_str(&format!("{:02x}", address));
        } else {
            out.push_str("--");
        }
        out.push(if i % 8 == 7 { '\n' } else { ' ' });
    }
    out
}

fn format_bytes(data: &[u8]) -> String {
    data.iter()
        .map(|b| format!("{:02x}", b))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Install the console subscriber and, with a log directory, a daily
/// rolling file
///
/// `RUST_LOG` takes precedence over the configured level. The returned guard
/// must live until exit so buffered file lines are flushed.
fn init_logging(config: &LoggingConfig) -> Result<Option<WorkerGuard>> {
    let filter = || {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level))
    };

    if config.dir.is_empty() {
        tracing_subscriber::registry()
            .with(fmt::layer().with_writer(io::stderr).with_filter(filter()))
            .init();
        return Ok(None);
    }

    std::fs::create_dir_all(&config.dir)
        .with_context(|| format!("Failed to create log directory {}", config.dir))?;
    let appender = tracing_appender::rolling::daily(&config.dir, LOG_FILE_PREFIX);
    let (non_blocking, guard) = tracing_appender::non_blocking(appender);

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr).with_filter(filter()))
        .with(
            fmt::layer()
                .with_writer(non_blocking)
                .with_ansi(false)
                .with_filter(filter()),
        )
        .init();
    Ok(Some(guard))
}

/// Prints capture events and optionally appends them to a JSONL log
struct CapturePrinter {
    log: Option<JsonlCaptureLog<BufWriter<File>>>,
}

impl CaptureSink for CapturePrinter {
    fn on_event(&mut self, event: CaptureEvent) -> io::Result<()> {
        println!("{}", event);
        match self.log.as_mut() {
            Some(log) => log.record(&event),
            None => Ok(()),
        }
    }
}

fn wait_for_cancel(cancel: &CancelToken) {
    while !cancel.is_cancelled() {
        std::thread::sleep(WAIT_POLL);
    }
}

/// Connect and run one command on a blocking thread
fn run(command: Commands, config: &Config, cancel: &CancelToken) -> Result<()> {
    let transport = SerialTransport::open(
        &config.serial.port,
        config.serial.baud_rate,
        config.read_timeout(),
    )?;
    let mut session = Session::connect(transport)
        .with_context(|| format!("No adapter answering on {}", config.serial.port))?;

    if config.bus.reset_on_connect && !session.reset_bus()? {
        warn!("Bus not free after reset");
    }
    if let Some(speed) = config.bus_speed() {
        session.set_speed(speed)?;
    }

    match command {
        Commands::Info => {
            let status = session.status()?;
            println!("connected:    true");
            println!("{}", status);
            println!("host crc:     0x{:04x}", session.checksum());
        }

        Commands::Scan => {
            let found = session.scan()?;
            print!("{}", format_scan(&found));
            info!("Scan found {} device(s)", found.len());
        }

        Commands::Reset => {
            let free = session.reset_bus()?;
            println!("bus {}", if free { "free" } else { "busy" });
        }

        Commands::Speed { khz } => {
            session.set_speed(khz)?;
            println!("speed {}kHz", khz.khz());
        }

        Commands::Read {
            device,
            register,
            count,
        } => {
            let data = session.read_register(device, register, count)?;
            println!("{}", format_bytes(&data));
            session.verify_checksum()?;
        }

        Commands::Write {
            device,
            register,
            data,
        } => {
            session.write_register(device, register, &data)?;
            session.verify_checksum()?;
        }

        Commands::Monitor => {
            session.monitor(true)?;
            println!("Monitor on, press Ctrl+C to exit");
            wait_for_cancel(cancel);
            session.monitor(false)?;
        }

        Commands::Capture { log } => {
            let path = log.or_else(|| {
                (!config.capture.log_path.is_empty())
                    .then(|| PathBuf::from(&config.capture.log_path))
            });
            let log = match path {
                Some(path) => Some(
                    JsonlCaptureLog::create(&path)
                        .with_context(|| format!("Failed to open {}", path.display()))?,
                ),
                None => None,
            };

            println!("Capturing, press Ctrl+C to exit");
            let mut printer = CapturePrinter { log };
            let result = session.capture(cancel, &mut printer);
            if let Some(log) = printer.log.as_mut() {
                log.flush()?;
                info!("Wrote {} capture records", log.records());
            }
            result?;
        }

        Commands::RelayDemo => {
            let mut board = RelayBoard::new(&mut session, config.relay.address);
            board.init()?;
            let completed = board.run_demo(config.relay_step(), cancel)?;
            board.switch_off_all()?;
            board.shutdown()?;
            if !completed {
                info!("Relay demo interrupted");
            }
        }
    }

    session.disconnect();
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => Config::load(path)
            .with_context(|| format!("Failed to load {}", path.display()))?,
        None => Config::default(),
    };
    if let Some(port) = cli.port {
        config.serial.port = port;
        config.validate()?;
    }

    let _guard = init_logging(&config.logging)?;
    info!("I2C Bridge v{} starting...", env!("CARGO_PKG_VERSION"));

    let cancel = CancelToken::new();
    let signal_token = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Received Ctrl+C, shutting down...");
            signal_token.cancel();
        }
    });

    let command = cli.command;
    tokio::task::spawn_blocking(move || run(command, &config, &cancel)).await?
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_number_decimal_and_hex() {
        assert_eq!(parse_number::<u8>("80"), Ok(80));
        assert_eq!(parse_number::<u8>("0x50"), Ok(0x50));
        assert_eq!(parse_number::<u8>("0XfF"), Ok(0xFF));
        assert_eq!(parse_number::<usize>("300"), Ok(300));
    }

    #[test]
    fn test_parse_number_rejects_bad_input() {
        assert!(parse_number::<u8>("256").is_err());
        assert!(parse_number::<u8>("0x1ff").is_err());
        assert!(parse_number::<u8>("abc").is_err());
        assert!(parse_number::<u8>("0x").is_err());
        assert!(parse_number::<u8>("-1").is_err());
    }

    #[test]
    fn test_parse_speed() {
        assert_eq!(parse_speed("100"), Ok(BusSpeed::Khz100));
        assert_eq!(parse_speed("400"), Ok(BusSpeed::Khz400));
        assert!(parse_speed("1000").is_err());
    }

    #[test]
    fn test_format_scan_grid() {
        let grid = format_scan(&[0x08, 0x50, 0x77]);
        let rows: Vec<&str> = grid.lines().collect();

        assert_eq!(rows.len(), SCAN_ADDRESS_COUNT / 8);
        assert_eq!(rows[0], "08 -- -- -- -- -- -- --");
        assert_eq!(rows[9], "50 -- -- -- -- -- -- --");
        assert_eq!(rows[13], "-- -- -- -- -- -- -- 77");
    }

    #[test]
    fn test_format_bytes() {
        assert_eq!(format_bytes(&[0x00, 0xAB, 0x10]), "00 ab 10");
        assert_eq!(format_bytes(&[]), "");
    }

    #[test]
    fn test_cli_parses_commands() {
        let cli = Cli::try_parse_from(["i2c-bridge", "--port", "/dev/ttyUSB1", "read", "0x50", "0", "16"])
            .unwrap();
        assert_eq!(cli.port.as_deref(), Some("/dev/ttyUSB1"));
        assert!(matches!(
            cli.command,
            Commands::Read {
                device: 0x50,
                register: 0,
                count: 16
            }
        ));

        let cli = Cli::try_parse_from(["i2c-bridge", "write", "0x20", "2", "0xff", "0"]).unwrap();
        match cli.command {
            Commands::Write { data, .. } => assert_eq!(data, vec![0xFF, 0x00]),
            _ => panic!("expected write"),
        }

        assert!(Cli::try_parse_from(["i2c-bridge", "write", "0x20", "2"]).is_err());
        assert!(Cli::try_parse_from(["i2c-bridge", "speed", "250"]).is_err());
    }

    #[test]
    fn test_cli_verifies() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }
}
