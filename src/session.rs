//! # Adapter Session
//!
//! Command protocol engine for one connected adapter.
//!
//! A [`Session`] owns the transport and the host-side checksum tracker. It is
//! driven by a single thread: the type can be moved between threads but must
//! not be shared, and no operation may interleave with another on the same
//! transport.

use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::error::{BridgeError, ConnectError, IntegrityError, Result, TransferError};
use crate::protocol::capture::{CaptureDecoder, CaptureEvent};
use crate::protocol::commands::*;
use crate::protocol::crc::ChecksumTracker;
use crate::protocol::encoder::*;
use crate::protocol::status::{parse_status, StatusRecord};
use crate::serial::Transport;

/// Cooperative cancellation flag shared between a capture loop and whoever
/// wants to stop it
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
}

impl CancelToken {
    /// New, not yet cancelled token
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    /// Whether cancellation has been requested
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

/// Consumer of decoded capture events
pub trait CaptureSink {
    /// Handle one event
    fn on_event(&mut self, event: CaptureEvent) -> io::Result<()>;
}

impl<F: FnMut(CaptureEvent)> CaptureSink for F {
    fn on_event(&mut self, event: CaptureEvent) -> io::Result<()> {
        self(event);
        Ok(())
    }
}

/// Upper bound on stale capture bytes discarded when leaving capture mode
const MAX_CAPTURE_DRAIN: usize = 4096;

/// Map a failed exact read onto the transfer error taxonomy
fn read_error(err: io::Error, expected: usize) -> BridgeError {
    match err.kind() {
        io::ErrorKind::UnexpectedEof | io::ErrorKind::TimedOut => {
            TransferError::ShortRead { expected }.into()
        }
        _ => err.into(),
    }
}

/// Send an echo probe, returning the byte that came back
fn probe<T: Transport>(transport: &mut T, byte: u8) -> Option<u8> {
    transport.write_all(&encode_echo(byte)).ok()?;
    let mut reply = [0u8; 1];
    transport.read_exact(&mut reply).ok()?;
    Some(reply[0])
}

/// Connected adapter
pub struct Session<T: Transport> {
    transport: T,
    checksum: ChecksumTracker,
}

impl<T: Transport> std::fmt::Debug for Session<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("checksum", &format_args!("0x{:04x}", self.checksum.value()))
            .finish_non_exhaustive()
    }
}

impl<T: Transport> Session<T> {
    /// Connect to an adapter over `transport`
    ///
    /// Sends an echo probe with a random byte, then fetches status and seeds
    /// the checksum tracker from the device-reported checksum.
    ///
    /// # Errors
    ///
    /// * [`ConnectError::NoResponse`] if the probe fails or echoes a
    ///   different byte
    /// * Status read/parse errors from the initial status fetch
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use i2c_bridge::serial::{SerialTransport, DEFAULT_BAUD_RATE, DEFAULT_TIMEOUT};
    /// use i2c_bridge::session::Session;
    ///
    /// let transport = SerialTransport::open("/dev/ttyUSB0", DEFAULT_BAUD_RATE, DEFAULT_TIMEOUT)?;
    /// let mut session = Session::connect(transport)?;
    /// println!("{}", session.status()?);
    /// # Ok::<(), i2c_bridge::error::BridgeError>(())
    /// ```
    pub fn connect(transport: T) -> Result<Self> {
        Self::connect_with_probe(transport, rand::random::<u8>())
    }

    /// Connect using a caller-chosen probe byte
    pub fn connect_with_probe(mut transport: T, probe_byte: u8) -> Result<Self> {
        match probe(&mut transport, probe_byte) {
            Some(reply) if reply == probe_byte => {}
            received => {
                warn!(
                    "Echo probe 0x{:02x} failed (received {:02x?})",
                    probe_byte, received
                );
                return Err(ConnectError::NoResponse {
                    sent: probe_byte,
                    received,
                }
                .into());
            }
        }

        let mut session = Self {
            transport,
            checksum: ChecksumTracker::new(0),
        };
        let status = session.status()?;
        session.checksum = ChecksumTracker::new(status.checksum);

        info!(
            "Connected to {} (serial {}), checksum 0x{:04x}",
            status.model, status.serial, status.checksum
        );
        Ok(session)
    }

    /// End the session and hand back the transport
    pub fn disconnect(self) -> T {
        debug!("Disconnecting (host checksum 0x{:04x})", self.checksum.value());
        self.transport
    }

    /// Underlying transport
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Underlying transport, mutably
    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    /// Host-tracked checksum
    pub fn checksum(&self) -> u16 {
        self.checksum.value()
    }

    fn send(&mut self, data: &[u8]) -> Result<()> {
        self.transport.write_all(data)?;
        Ok(())
    }

    fn receive(&mut self, buf: &mut [u8]) -> Result<()> {
        let expected = buf.len();
        self.transport
            .read_exact(buf)
            .map_err(|e| read_error(e, expected))
    }

    fn read_ack(&mut self) -> Result<bool> {
        let mut byte = [0u8; 1];
        self.receive(&mut byte)?;
        Ok(is_ack(byte[0]))
    }

    /// Fetch and parse the adapter status line
    pub fn status(&mut self) -> Result<StatusRecord> {
        self.send(&[CMD_STATUS])?;
        let mut line = [0u8; STATUS_RESPONSE_LEN];
        self.receive(&mut line)?;
        Ok(parse_status(&line)?)
    }

    /// Issue a START with the address byte
    ///
    /// # Returns
    ///
    /// * `Result<bool>` - Whether the target acknowledged its address
    pub fn start(&mut self, address: u8, direction: Direction) -> Result<bool> {
        let address = check_address(address)?;
        self.send(&encode_start(address, direction))?;
        let ack = self.read_ack()?;
        debug!("START 0x{:02x} {} -> {}", address, direction, if ack { "ACK" } else { "NAK" });
        Ok(ack)
    }

    /// Issue a STOP
    pub fn stop(&mut self) -> Result<()> {
        self.send(&[CMD_STOP])
    }

    /// Write `data` to the addressed device in chunks of up to 64 bytes
    ///
    /// The checksum tracker is only updated once every chunk has been
    /// acknowledged.
    ///
    /// # Errors
    ///
    /// * [`TransferError::NotAcknowledged`] for the first NAKed chunk; later
    ///   chunks are not sent and earlier ones are not rolled back
    pub fn write_buffer(&mut self, data: &[u8]) -> Result<()> {
        for (index, chunk) in data.chunks(MAX_CHUNK_SIZE).enumerate() {
            self.send(&encode_write_chunk(chunk))?;

            if !self.read_ack()? {
                warn!("Write chunk {} ({} bytes) not acknowledged", index, chunk.len());
                return Err(TransferError::NotAcknowledged {
                    chunk: index,
                    offset: index * MAX_CHUNK_SIZE,
                }
                .into());
            }
        }

        self.checksum.update(data);
        Ok(())
    }

    /// Read `count` bytes from the addressed device in chunks of up to 64
    ///
    /// Each completed chunk is folded into the checksum as it arrives.
    ///
    /// # Errors
    ///
    /// * [`TransferError::ShortRead`] if the adapter does not deliver a full
    ///   chunk; `expected` is that chunk's length and the whole read is
    ///   invalid
    pub fn read_buffer(&mut self, count: usize) -> Result<Vec<u8>> {
        let mut buffer = vec![0u8; count];

        for chunk in buffer.chunks_mut(MAX_CHUNK_SIZE) {
            self.send(&[encode_read_chunk(chunk.len())])?;
            self.receive(chunk)?;
            self.checksum.update(chunk);
        }

        Ok(buffer)
    }

    /// Read `count` bytes starting at `register` in one adapter transaction
    ///
    /// # Errors
    ///
    /// * [`TransferError::InvalidAddress`] for addresses above 0x7F
    /// * [`TransferError::CountOutOfRange`] for counts above 255
    /// * [`TransferError::ShortRead`] if fewer bytes arrive
    pub fn read_register(&mut self, device: u8, register: u8, count: usize) -> Result<Vec<u8>> {
        let device = check_address(device)?;
        if count > MAX_REGISTER_READ {
            return Err(TransferError::CountOutOfRange {
                count,
                max: MAX_REGISTER_READ,
            }
            .into());
        }

        self.send(&encode_read_register(device, register, count as u8))?;

        let mut buffer = vec![0u8; count];
        self.receive(&mut buffer)?;
        self.checksum.update(&buffer);

        debug!(
            "Read register 0x{:02x}:0x{:02x} -> {:02x?}",
            device, register, buffer
        );
        Ok(buffer)
    }

    /// Write `data` starting at `register`: START(write), register, data, STOP
    ///
    /// # Errors
    ///
    /// * [`TransferError::NotAcknowledged`] if the device NAKs its address or
    ///   any chunk; STOP is still issued
    pub fn write_register(&mut self, device: u8, register: u8, data: &[u8]) -> Result<()> {
        if !self.start(device, Direction::Write)? {
            self.stop()?;
            return Err(TransferError::NotAcknowledged { chunk: 0, offset: 0 }.into());
        }

        let mut payload = Vec::with_capacity(1 + data.len());
        payload.push(register);
        payload.extend_from_slice(data);

        let result = self.write_buffer(&payload);
        self.stop()?;

        debug!(
            "Write register 0x{:02x}:0x{:02x} <- {:02x?}",
            device, register, data
        );
        result
    }

    /// Reset the bus
    ///
    /// # Returns
    ///
    /// * `Result<bool>` - Whether both SDA and SCL read high afterwards
    pub fn reset_bus(&mut self) -> Result<bool> {
        self.send(&[CMD_RESET])?;
        let mut lines = [0u8; 1];
        self.receive(&mut lines)?;

        let free = lines[0] & 0x03 == 0x03;
        if !free {
            warn!("Bus still busy after reset (lines 0x{:02x})", lines[0]);
        }
        Ok(free)
    }

    /// Probe every address in 0x08..=0x77
    ///
    /// # Returns
    ///
    /// * `Result<Vec<u8>>` - Addresses that acknowledged
    pub fn scan(&mut self) -> Result<Vec<u8>> {
        self.send(&[CMD_SCAN])?;
        let mut results = [0u8; SCAN_ADDRESS_COUNT];
        self.receive(&mut results)?;

        Ok(results
            .iter()
            .enumerate()
            .filter(|(_, &byte)| is_ack(byte))
            .map(|(i, _)| SCAN_FIRST_ADDRESS + i as u8)
            .collect())
    }

    /// Select the bus clock
    pub fn set_speed(&mut self, speed: BusSpeed) -> Result<()> {
        debug!("Setting bus speed to {}kHz", speed.khz());
        self.send(&[speed.command()])
    }

    /// Switch the adapter's on-board monitor display on or off
    pub fn monitor(&mut self, enable: bool) -> Result<()> {
        self.send(&[encode_monitor(enable)])
    }

    /// Compare the device-reported checksum with the host tracker
    pub fn checksums_match(&mut self) -> Result<bool> {
        let device = self.status()?.checksum;
        let matched = self.checksum.matches(device);
        if !matched {
            warn!(
                "Checksum divergence: host 0x{:04x}, device 0x{:04x}",
                self.checksum.value(),
                device
            );
        }
        Ok(matched)
    }

    /// Like [`Session::checksums_match`], failing on divergence
    ///
    /// # Errors
    ///
    /// * [`IntegrityError::ChecksumMismatch`] if the values differ
    pub fn verify_checksum(&mut self) -> Result<()> {
        let device = self.status()?.checksum;
        if !self.checksum.matches(device) {
            return Err(IntegrityError::ChecksumMismatch {
                host: self.checksum.value(),
                device,
            }
            .into());
        }
        Ok(())
    }

    /// Enter capture mode and decode bus traffic into `sink` until `cancel`
    /// is set
    ///
    /// The token is checked before every byte read. Transport timeouts count
    /// as "no traffic yet". On the way out, whether cancelled or failed, the
    /// adapter is taken out of capture mode and the symbols it already
    /// streamed are drained, so the next command sees a clean line.
    ///
    /// # Returns
    ///
    /// * `Result<u64>` - Number of events delivered
    pub fn capture<S: CaptureSink>(&mut self, cancel: &CancelToken, sink: &mut S) -> Result<u64> {
        info!("Capture started");
        self.send(&[CMD_CAPTURE])?;

        let result = self.decode_capture(cancel, sink);
        let left = self.leave_capture();

        let delivered = result?;
        left?;
        info!("Capture stopped after {} events", delivered);
        Ok(delivered)
    }

    fn decode_capture<S: CaptureSink>(&mut self, cancel: &CancelToken, sink: &mut S) -> Result<u64> {
        let mut decoder = CaptureDecoder::new();
        let mut byte = [0u8; 1];
        let mut delivered = 0u64;

        while !cancel.is_cancelled() {
            match self.transport.read_exact(&mut byte) {
                Ok(()) => {}
                Err(e) if e.kind() == io::ErrorKind::TimedOut => continue,
                Err(e) => return Err(e.into()),
            }

            for event in decoder.feed_byte(byte[0]) {
                sink.on_event(event)?;
                delivered += 1;
            }
        }

        Ok(delivered)
    }

    /// Send the leave-capture byte and discard input until the line goes quiet
    fn leave_capture(&mut self) -> Result<()> {
        self.send(&[CMD_EXIT_CAPTURE])?;

        let mut byte = [0u8; 1];
        for drained in 0..MAX_CAPTURE_DRAIN {
            match self.transport.read_exact(&mut byte) {
                Ok(()) => {}
                Err(e)
                    if matches!(
                        e.kind(),
                        io::ErrorKind::TimedOut | io::ErrorKind::UnexpectedEof
                    ) =>
                {
                    debug!("Left capture mode, drained {} bytes", drained);
                    return Ok(());
                }
                Err(e) => return Err(e.into()),
            }
        }

        warn!(
            "Adapter still streaming after {} drained bytes",
            MAX_CAPTURE_DRAIN
        );
        Ok(())
    }
}
