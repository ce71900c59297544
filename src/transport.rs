use serialport::SerialPort;
use std::io::{self, Write};
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, trace, warn};

use crate::config::PanelConfig;
use crate::error::TransportError;

/// Transfer size used when the link cannot report one
pub const DEFAULT_MAX_TRANSFER: usize = 512;

/// Raw write primitive of one panel.
pub trait Link: Send {
    /// Write one chunk without waiting for an acknowledgment
    fn write(&mut self, chunk: &[u8]) -> io::Result<()>;

    /// Largest chunk the link accepts in one write
    fn max_transfer_size(&self) -> io::Result<usize>;

    fn close(&mut self);
}

/// Panel reached through a serial port
pub struct SerialLink {
    name: String,
    port: Option<Box<dyn SerialPort>>,
    max_transfer: Option<usize>,
}

impl SerialLink {
    /// Open the port 8N1 without flow control
    pub fn open(config: &PanelConfig) -> io::Result<Self> {
        let mut port = serialport::new(&config.port, config.baud_rate)
            .data_bits(serialport::DataBits::Eight)
            .parity(serialport::Parity::None)
            .stop_bits(serialport::StopBits::One)
            .flow_control(serialport::FlowControl::None)
            .open()?;

        // Bound every write so a stalled panel cannot block an upload forever
        port.set_timeout(Duration::from_millis(1000))?;

        if let Err(e) = port.write_data_terminal_ready(true) {
            warn!(port = %config.port, "Failed to set DTR: {}", e);
        }

        // Allow device to initialize
        thread::sleep(Duration::from_millis(100));

        debug!(port = %config.port, baud = config.baud_rate, "Opened serial link");

        Ok(SerialLink {
            name: config.port.clone(),
            port: Some(port),
            max_transfer: config.max_transfer,
        })
    }
}

impl Link for SerialLink {
    fn write(&mut self, chunk: &[u8]) -> io::Result<()> {
        let port = self.port.as_mut().ok_or_else(|| {
            io::Error::new(io::ErrorKind::NotConnected, format!("{} is closed", self.name))
        })?;
        port.write_all(chunk)?;
        port.flush()
    }

    fn max_transfer_size(&self) -> io::Result<usize> {
        self.max_transfer.ok_or_else(|| {
            io::Error::new(io::ErrorKind::Unsupported, "serial link has no negotiated transfer size")
        })
    }

    fn close(&mut self) {
        if self.port.take().is_some() {
            debug!(port = %self.name, "Closed serial link");
        }
    }
}

/// Split a buffer into chunks of at most `max_transfer` bytes.
pub fn chunk_payload(bytes: &[u8], max_transfer: usize) -> std::slice::Chunks<'_, u8> {
    bytes.chunks(max_transfer.max(1))
}

pub(crate) fn pause(delay: Duration) {
    if !delay.is_zero() {
        thread::sleep(delay);
    }
}

/// Chunked, paced writer on top of one panel's link
pub struct TransportChannel {
    panel: usize,
    link: Box<dyn Link>,
    max_transfer: usize,
    pacing: Duration,
    deadline: Option<(Instant, Duration)>,
    closed: bool,
}

impl TransportChannel {
    pub fn new(panel: usize, link: Box<dyn Link>, pacing: Duration) -> Self {
        let max_transfer = match link.max_transfer_size() {
            Ok(size) if size > 0 => size,
            Ok(_) => DEFAULT_MAX_TRANSFER,
            Err(e) => {
                debug!(panel, "Could not get transfer size ({}), using default {}", e, DEFAULT_MAX_TRANSFER);
                DEFAULT_MAX_TRANSFER
            }
        };

        TransportChannel { panel, link, max_transfer, pacing, deadline: None, closed: false }
    }

    pub fn panel(&self) -> usize {
        self.panel
    }

    pub fn max_transfer(&self) -> usize {
        self.max_transfer
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Start (or clear) the deadline of the upload in progress
    pub fn set_deadline(&mut self, timeout: Option<Duration>) {
        self.deadline = timeout.map(|timeout| (Instant::now() + timeout, timeout));
    }

    fn check_deadline(&self) -> Result<(), TransportError> {
        match self.deadline {
            Some((at, timeout)) if Instant::now() >= at => {
                Err(TransportError::DeadlineExceeded { panel: self.panel, timeout })
            }
            _ => Ok(()),
        }
    }

    /// Write `bytes` chunk by chunk, then pause.
    ///
    /// The first failed write aborts the rest of the buffer.
    pub fn send(&mut self, bytes: &[u8]) -> Result<(), TransportError> {
        if self.closed {
            return Err(TransportError::Closed { panel: self.panel });
        }

        let mut sent = 0;
        for chunk in chunk_payload(bytes, self.max_transfer) {
            self.check_deadline()?;
            self.link.write(chunk).map_err(|source| TransportError::Write {
                panel: self.panel,
                sent,
                total: bytes.len(),
                source,
            })?;
            sent += chunk.len();
        }

        trace!(
            panel = self.panel,
            "Sent {} bytes in {} chunks",
            sent,
            sent.div_ceil(self.max_transfer)
        );

        pause(self.pacing);
        Ok(())
    }

    /// Stream a large message as `piece`-sized sends separated by `delay`
    pub fn send_windowed(
        &mut self,
        message: &[u8],
        piece: usize,
        delay: Duration,
    ) -> Result<(), TransportError> {
        for part in message.chunks(piece.max(1)) {
            self.send(part)?;
            pause(delay);
        }
        Ok(())
    }

    pub fn close(&mut self) {
        if !self.closed {
            self.link.close();
            self.closed = true;
        }
    }
}

impl Drop for TransportChannel {
    fn drop(&mut self) {
        self.close();
    }
}
