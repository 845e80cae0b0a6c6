//! Transport layer
//!
//! The session talks to devices through the [`Transport`] trait and creates
//! them through a [`Connector`]. Two backends are provided:
//! - Serial ports via the `serialport` crate
//! - An in-memory scripted transport for tests and benchmarks

mod memory;
mod serial;

pub use memory::{MemoryConnector, MemoryTransport, ReadEvent};
pub use serial::{list_ports, SerialConnector, SerialTransport};

use super::interrupt::Interrupt;
use super::port_config::{ConfigError, Parity, PortConfig};
use std::time::Duration;
use thiserror::Error;

/// Transport error types
#[derive(Error, Debug)]
pub enum TransportError {
    /// Connection failed
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// Port not found
    #[error("Port not found: {0}")]
    PortNotFound(String),

    /// Permission denied
    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// I/O error
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// Transport already closed
    #[error("Disconnected")]
    Disconnected,
}

impl From<ConfigError> for TransportError {
    fn from(err: ConfigError) -> Self {
        Self::InvalidConfiguration(err.to_string())
    }
}

/// An open line-oriented connection to a device
#[cfg_attr(test, mockall::automock)]
pub trait Transport {
    /// Whether the underlying handle is still open
    fn is_open(&self) -> bool;

    /// Release the handle
    fn close(&mut self) -> Result<(), TransportError>;

    /// Read one line, without its terminator.
    ///
    /// Returns an empty string when nothing arrived before the timeout, or
    /// when `interrupt` was raised while waiting. The flag is left set.
    fn read_line(&mut self, interrupt: &Interrupt) -> Result<String, TransportError>;

    /// Write raw bytes, returning how many were accepted
    fn write(&mut self, data: &[u8]) -> Result<usize, TransportError>;

    /// Device path
    fn port_name(&self) -> String;

    /// Current baud rate
    fn baud_rate(&self) -> Result<u32, TransportError>;

    /// Change the baud rate of the open handle
    fn set_baud_rate(&mut self, baud_rate: u32) -> Result<(), TransportError>;

    /// Change the data bits of the open handle
    fn set_byte_size(&mut self, bits: u8) -> Result<(), TransportError>;

    /// Change the parity of the open handle
    fn set_parity(&mut self, parity: Parity) -> Result<(), TransportError>;

    /// Change the stop bits of the open handle
    fn set_stop_bits(&mut self, bits: u8) -> Result<(), TransportError>;

    /// Change the per-read timeout, `None` meaning no timeout
    fn set_timeout(&mut self, timeout: Option<Duration>) -> Result<(), TransportError>;

    /// Human readable description of the connection
    fn info(&self) -> String;
}

/// Creates transports from a port configuration
#[cfg_attr(test, mockall::automock)]
pub trait Connector {
    /// Open a transport with exactly the given parameters
    fn open(&self, config: &PortConfig) -> Result<Box<dyn Transport>, TransportError>;
}
