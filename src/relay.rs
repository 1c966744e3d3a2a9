//! # Relay Board
//!
//! 16-channel relay board driven by an XL9535 I/O expander on the I2C bus.
//!
//! Each 16-bit expander port spans two consecutive registers, low byte first.

use std::time::{Duration, Instant};

use tracing::{debug, info};

use crate::error::Result;
use crate::serial::Transport;
use crate::session::{CancelToken, Session};

/// Default expander address
pub const RELAY_BOARD_ADDRESS: u8 = 0x20;

/// Input port register
pub const XL9535_INPUT_PORT: u8 = 0x00;

/// Output port register
pub const XL9535_OUTPUT_PORT: u8 = 0x02;

/// Polarity inversion register
pub const XL9535_INVERSION_PORT: u8 = 0x04;

/// Direction register (bit set = input / relay circuit disabled)
pub const XL9535_CONFIG_PORT: u8 = 0x06;

/// Number of relays on the board
pub const RELAY_COUNT: usize = 16;

/// Every relay
pub const ALL_RELAYS: u16 = 0xFFFF;

/// Relays 0, 2, 4, ... 14
pub const EVEN_RELAYS: u16 = 0x5555;

/// Relays 1, 3, 5, ... 15
pub const ODD_RELAYS: u16 = 0xAAAA;

/// Granularity of cancellable waits
const PAUSE_SLICE: Duration = Duration::from_millis(50);

/// Mask for relay `index` (0..16)
pub fn relay_mask(index: usize) -> u16 {
    debug_assert!(index < RELAY_COUNT);
    1 << index
}

/// Relay board on an open session
pub struct RelayBoard<'a, T: Transport> {
    session: &'a mut Session<T>,
    address: u8,
}

impl<'a, T: Transport> RelayBoard<'a, T> {
    /// Board at `address` on `session`
    pub fn new(session: &'a mut Session<T>, address: u8) -> Self {
        Self { session, address }
    }

    fn write_port(&mut self, register: u8, value: u16) -> Result<()> {
        self.session
            .write_register(self.address, register, &value.to_le_bytes())
    }

    fn read_port(&mut self, register: u8) -> Result<u16> {
        let data = self.session.read_register(self.address, register, 2)?;
        Ok(u16::from_le_bytes([data[0], data[1]]))
    }

    /// Disable polarity inversion and enable every relay circuit
    pub fn init(&mut self) -> Result<()> {
        debug!("Relay board 0x{:02x}: inversion off", self.address);
        self.write_port(XL9535_INVERSION_PORT, 0x0000)?;
        debug!("Relay board 0x{:02x}: enable circuits", self.address);
        self.write_port(XL9535_CONFIG_PORT, 0x0000)
    }

    /// Disable every relay circuit
    pub fn shutdown(&mut self) -> Result<()> {
        debug!("Relay board 0x{:02x}: disable circuits", self.address);
        self.write_port(XL9535_CONFIG_PORT, ALL_RELAYS)
    }

    /// Current output port state
    pub fn outputs(&mut self) -> Result<u16> {
        self.read_port(XL9535_OUTPUT_PORT)
    }

    /// Current input port state
    pub fn inputs(&mut self) -> Result<u16> {
        self.read_port(XL9535_INPUT_PORT)
    }

    /// Energize every relay
    pub fn switch_on_all(&mut self) -> Result<()> {
        self.write_port(XL9535_OUTPUT_PORT, ALL_RELAYS)
    }

    /// Release every relay
    pub fn switch_off_all(&mut self) -> Result<()> {
        self.write_port(XL9535_OUTPUT_PORT, 0x0000)
    }

    /// Energize the relays in `mask`, leaving the others as they are
    pub fn switch_on(&mut self, mask: u16) -> Result<()> {
        let state = self.outputs()? | mask;
        self.write_port(XL9535_OUTPUT_PORT, state)
    }

    /// Release the relays in `mask`, leaving the others as they are
    pub fn switch_off(&mut self, mask: u16) -> Result<()> {
        let state = self.outputs()? & !mask;
        self.write_port(XL9535_OUTPUT_PORT, state)
    }

    /// Run the demo sequence: even/odd alternation, then walk each relay on
    /// and off
    ///
    /// # Returns
    ///
    /// * `Result<bool>` - `false` if `cancel` interrupted the sequence
    pub fn run_demo(&mut self, step: Duration, cancel: &CancelToken) -> Result<bool> {
        info!("Relay demo: alternating banks");
        self.switch_on(EVEN_RELAYS)?;
        if !pause(step, cancel) {
            return Ok(false);
        }
        self.switch_on(ODD_RELAYS)?;
        if !pause(step, cancel) {
            return Ok(false);
        }
        self.switch_off_all()?;
        if !pause(step, cancel) {
            return Ok(false);
        }

        info!("Relay demo: walking relays");
        for index in 0..RELAY_COUNT {
            self.switch_on(relay_mask(index))?;
            if !pause(step, cancel) {
                return Ok(false);
            }
        }
        for index in 0..RELAY_COUNT {
            self.switch_off(relay_mask(index))?;
            if !pause(step, cancel) {
                return Ok(false);
            }
        }

        Ok(true)
    }
}

/// Sleep for `duration` in short slices; `false` if cancelled meanwhile
fn pause(duration: Duration, cancel: &CancelToken) -> bool {
    let deadline = Instant::now() + duration;

    loop {
        if cancel.is_cancelled() {
            return false;
        }
        let now = Instant::now();
        if now >= deadline {
            return true;
        }
        std::thread::sleep((deadline - now).min(PAUSE_SLICE));
    }
}
