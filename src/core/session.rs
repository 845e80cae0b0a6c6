//! Serial session
//!
//! A `SerialSession` owns at most one open transport together with the
//! parameters it was opened with. Writing marks a read as owed; the read loop
//! drains the device's reply, dropping its echo of the sent line and the bare
//! `OK` acknowledgements that carry no information.

use super::interrupt::Interrupt;
use super::output::OutputSink;
use super::port_config::{
    parse_baud_rate, parse_byte_size, parse_parity, parse_stop_bits, parse_timeout, ConfigError,
    PortConfig, PortField,
};
use super::transport::{Connector, Transport, TransportError};
use thiserror::Error;

/// Prompt shown while no connection is open
pub const PROMPT_DISCONNECTED: &str = "(no-conn) ";

/// Default line ending appended by [`SerialSession::write`]
pub const DEFAULT_LINE_ENDING: &str = "\r";

/// Consecutive empty reads that end a normal read pass
pub const ZERO_READ_BUDGET: u32 = 3;

/// Session errors
#[derive(Error, Debug)]
pub enum SessionError {
    /// A value typed by the user was rejected
    #[error(transparent)]
    InvalidArgument(#[from] ConfigError),

    /// The transport could not be opened
    #[error("cannot open connection: {0}")]
    ConnectionFailure(TransportError),

    /// No connection is open
    #[error("No serial connection established yet")]
    NotConnected,

    /// The open transport failed
    #[error(transparent)]
    Transport(#[from] TransportError),
}

/// How long a read pass keeps going
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReadMode {
    /// Stop after [`ZERO_READ_BUDGET`] empty reads
    #[default]
    Normal,
    /// Keep reading until interrupted or the transport keeps failing
    NoStop,
}

impl ReadMode {
    /// `nostop` anywhere in the argument selects [`ReadMode::NoStop`]
    pub fn from_args(args: &str) -> Self {
        if args.contains("nostop") {
            Self::NoStop
        } else {
            Self::Normal
        }
    }
}

/// Why a read pass ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadOutcome {
    /// The device went quiet
    Drained,
    /// The user interrupted the read
    Cancelled,
    /// Transport errors used up the budget
    Failed,
}

/// Result of one read pass
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadSummary {
    /// Why the pass ended
    pub outcome: ReadOutcome,
    /// Lines shown to the user
    pub displayed: usize,
}

/// One serial connection and its bookkeeping
pub struct SerialSession {
    connector: Box<dyn Connector>,
    config: PortConfig,
    connection: Option<Box<dyn Transport>>,
    last_written: Option<String>,
    last_read: Option<String>,
    pending_read: bool,
}

impl SerialSession {
    /// Disconnected session with default parameters
    pub fn new(connector: Box<dyn Connector>) -> Self {
        Self {
            connector,
            config: PortConfig::default(),
            connection: None,
            last_written: None,
            last_read: None,
            pending_read: false,
        }
    }

    /// Open a connection with `config`, replacing any open one
    pub fn open(&mut self, config: PortConfig) -> Result<(), SessionError> {
        if self.connection.is_some() {
            tracing::debug!("Closing current connection before reopening");
            self.release();
        }

        tracing::debug!("Connecting with the following params {:?}", config);
        self.config = config;
        match self.connector.open(&self.config) {
            Ok(transport) => {
                self.connection = Some(transport);
                tracing::info!("Connected to {}", self.config.port);
                Ok(())
            }
            Err(e) => Err(SessionError::ConnectionFailure(e)),
        }
    }

    /// Apply `serial_open` style positional arguments, then open
    pub fn open_positional(&mut self, args: &str) -> Result<(), SessionError> {
        let mut config = self.config.clone();
        config.apply_positional(args)?;
        self.open(config)
    }

    /// Whether a transport is present and open
    pub fn is_connected(&self) -> bool {
        self.connection.as_ref().is_some_and(|c| c.is_open())
    }

    /// Close the connection and restore default parameters.
    ///
    /// Returns `false` when there was nothing to close.
    pub fn close(&mut self) -> bool {
        if !self.is_connected() {
            return false;
        }
        self.release();
        self.config.reset();
        tracing::info!("connection closed");
        true
    }

    /// Send `message` followed by `line_ending`
    pub fn write(&mut self, message: &str, line_ending: &str) -> Result<usize, SessionError> {
        let transport = self.live_transport()?;
        let framed = format!("{message}{line_ending}");
        tracing::debug!("sending: {:?}", framed);

        let written = transport.write(framed.as_bytes())?;
        if written == 0 {
            tracing::debug!("Wrote 0 bytes");
        } else {
            tracing::debug!("wrote {} bytes", written);
            self.last_written = Some(message.to_string());
            self.pending_read = true;
        }
        Ok(written)
    }

    /// Drain device output into `sink`.
    ///
    /// Lines are indented by `indent` columns so they line up under the
    /// prompt. The pass ends after [`ZERO_READ_BUDGET`] empty reads (never in
    /// [`ReadMode::NoStop`]), when `interrupt` is raised, or once transport
    /// errors have used up the same budget.
    pub fn read(
        &mut self,
        mode: ReadMode,
        interrupt: &Interrupt,
        sink: &mut dyn OutputSink,
        indent: usize,
    ) -> Result<ReadSummary, SessionError> {
        self.pending_read = false;
        if !self.is_connected() {
            return Err(SessionError::NotConnected);
        }

        let nostop = mode == ReadMode::NoStop;
        let padding = " ".repeat(indent);
        let mut budget = ZERO_READ_BUDGET;
        let mut displayed = 0;

        while budget > 0 || nostop {
            if interrupt.take() {
                tracing::warn!("Keyboard interrupt");
                return Ok(ReadSummary {
                    outcome: ReadOutcome::Cancelled,
                    displayed,
                });
            }

            let Some(transport) = self.connection.as_mut() else {
                return Err(SessionError::NotConnected);
            };
            let line = match transport.read_line(interrupt) {
                Ok(line) => line,
                Err(e) => {
                    budget = budget.saturating_sub(1);
                    tracing::error!("Read failed ({} attempts left): {}", budget, e);
                    if budget == 0 {
                        return Ok(ReadSummary {
                            outcome: ReadOutcome::Failed,
                            displayed,
                        });
                    }
                    continue;
                }
            };
            tracing::debug!("got {:?}", line);
            if line.is_empty() && interrupt.is_set() {
                continue;
            }

            if !line.is_empty() {
                if self.is_echo(&line) {
                    tracing::debug!("Got echo ({})", line);
                    continue;
                }
                if self.is_spurious_ack(&line) {
                    tracing::debug!("Dropping OK to {:?}", self.last_written);
                    continue;
                }
                sink.emit(&format!("{padding}{line}"));
                self.last_read = Some(line);
                displayed += 1;
            } else if !nostop {
                tracing::debug!("stop read counter {}", budget);
                budget -= 1;
            }
        }

        tracing::debug!("Nothing to read, exiting");
        Ok(ReadSummary {
            outcome: ReadOutcome::Drained,
            displayed,
        })
    }

    /// Return and clear the "read owed" flag
    pub fn take_pending_read(&mut self) -> bool {
        std::mem::take(&mut self.pending_read)
    }

    /// Whether a write is waiting for its read pass
    pub fn pending_read(&self) -> bool {
        self.pending_read
    }

    /// Prompt reflecting the connection state
    pub fn prompt(&self) -> String {
        match self.connection.as_ref().filter(|c| c.is_open()) {
            Some(transport) => match transport.baud_rate() {
                Ok(baud) => format!("({}@{}) ", transport.port_name(), baud),
                Err(_) => format!("({}@{}) ", transport.port_name(), self.config.baud_rate),
            },
            None => PROMPT_DISCONNECTED.to_string(),
        }
    }

    /// Description of the live connection
    pub fn info(&self) -> Option<String> {
        self.connection
            .as_ref()
            .filter(|c| c.is_open())
            .map(|c| c.info())
    }

    /// Parameters of the current (or next) connection
    pub fn config(&self) -> &PortConfig {
        &self.config
    }

    /// Last line sent
    pub fn last_written(&self) -> Option<&str> {
        self.last_written.as_deref()
    }

    /// Last line accepted as device output
    pub fn last_read(&self) -> Option<&str> {
        self.last_read.as_deref()
    }

    /// Move the live connection to another device
    pub fn set_port(&mut self, port: &str) -> Result<(), SessionError> {
        self.live_transport()?;
        let mut config = self.config.clone();
        config.set_field(PortField::Port, port)?;
        self.open(config)
    }

    /// Change the baud rate of the live connection
    pub fn set_baud_rate(&mut self, raw: &str) -> Result<(), SessionError> {
        let baud = parse_baud_rate(raw)?;
        self.live_transport()?.set_baud_rate(baud)?;
        self.config.set_field(PortField::BaudRate, raw.trim())?;
        Ok(())
    }

    /// Change the data bits of the live connection
    pub fn set_byte_size(&mut self, raw: &str) -> Result<(), SessionError> {
        let bits = parse_byte_size(raw)?;
        self.live_transport()?.set_byte_size(bits)?;
        self.config.byte_size = bits;
        Ok(())
    }

    /// Change the parity of the live connection
    pub fn set_parity(&mut self, raw: &str) -> Result<(), SessionError> {
        let parity = parse_parity(raw)?;
        self.live_transport()?.set_parity(parity)?;
        self.config.parity = parity.letter().to_string();
        Ok(())
    }

    /// Change the stop bits of the live connection
    pub fn set_stop_bits(&mut self, raw: &str) -> Result<(), SessionError> {
        let bits = parse_stop_bits(raw)?;
        self.live_transport()?.set_stop_bits(bits)?;
        self.config.stop_bits = bits;
        Ok(())
    }

    /// Change the read timeout of the live connection
    pub fn set_timeout(&mut self, raw: &str) -> Result<(), SessionError> {
        let timeout = parse_timeout(raw)?;
        self.live_transport()?
            .set_timeout(timeout.map(std::time::Duration::from_secs))?;
        self.config.timeout = timeout;
        Ok(())
    }

    fn live_transport(&mut self) -> Result<&mut Box<dyn Transport>, SessionError> {
        match self.connection.as_mut() {
            Some(transport) if transport.is_open() => Ok(transport),
            _ => Err(SessionError::NotConnected),
        }
    }

    fn release(&mut self) {
        if let Some(mut transport) = self.connection.take() {
            if let Err(e) = transport.close() {
                tracing::warn!("Error while closing {}: {}", transport.port_name(), e);
            }
        }
    }

    fn is_echo(&self, line: &str) -> bool {
        self.last_written.as_deref() == Some(line)
    }

    fn is_spurious_ack(&self, line: &str) -> bool {
        line == "OK"
            && self
                .last_written
                .as_deref()
                .is_some_and(|sent| !sent.eq_ignore_ascii_case("at"))
    }
}

impl Drop for SerialSession {
    fn drop(&mut self) {
        self.release();
    }
}
