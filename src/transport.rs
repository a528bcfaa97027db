//! Serial transport and connection ownership.
//!
//! A [`Connection`] exclusively owns its transport; no other component
//! writes to the device. Frame sequences are transmitted strictly in order
//! and concurrent print requests serialize on the connection, so at most one
//! sequence is in flight per device.

use std::io::Write;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use log::{debug, info};

use crate::error::Error;
use crate::protocol::FrameSequence;

/// Byte-oriented channel to the device.
///
/// `send` returns once the underlying channel has accepted the whole frame;
/// back-pressure blocks the caller until the channel drains. No
/// application-level acknowledgement exists in the Phomemo protocol.
pub trait Transport: Send {
    fn send(&mut self, frame: &[u8]) -> std::io::Result<()>;
}

/// [`Transport`] over a serial port (USB CDC or RFCOMM device node).
pub struct SerialTransport {
    port: Box<dyn serialport::SerialPort>,
}

impl SerialTransport {
    /// Open `path` at 9600 8N1 with a 10 second write timeout.
    pub fn open(path: &str) -> Result<Self, Error> {
        let port = serialport::new(path, 9600)
            .timeout(Duration::from_secs(10))
            .open()
            .map_err(Error::Connection)?;
        info!("opened serial connection to {}", path);
        Ok(SerialTransport { port })
    }
}

impl Transport for SerialTransport {
    fn send(&mut self, frame: &[u8]) -> std::io::Result<()> {
        self.port.write_all(frame)?;
        self.port.flush()
    }
}

/// Exclusive owner of one device connection.
///
/// Disconnection is dropping the value. A second print request may render
/// and encode while another transmits; its own transmission waits here.
pub struct Connection<T: Transport> {
    transport: Mutex<T>,
}

impl<T: Transport> Connection<T> {
    pub fn new(transport: T) -> Self {
        Connection {
            transport: Mutex::new(transport),
        }
    }

    /// Write every frame of `frames`, in order, each completing before the
    /// next begins.
    ///
    /// On failure the error reports how many frames were fully written;
    /// partial jobs are not resumable and a retry must restart from the
    /// init frame.
    pub fn transmit(&self, frames: &FrameSequence) -> Result<usize, Error> {
        let mut transport = self
            .transport
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        for (sent, frame) in frames.iter().enumerate() {
            transport
                .send(&frame.bytes)
                .map_err(|source| Error::Write {
                    frames_sent: sent,
                    source,
                })?;
            debug!(
                "frame {}/{} ({:?}, {} bytes) written",
                sent + 1,
                frames.len(),
                frame.kind,
                frame.bytes.len()
            );
        }
        Ok(frames.len())
    }

    pub fn into_inner(self) -> T {
        self.transport
            .into_inner()
            .unwrap_or_else(PoisonError::into_inner)
    }
}
