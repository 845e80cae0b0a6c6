//! In-memory transport
//!
//! Replays a script of read events and records everything written, so the
//! session can be driven without a device. Clones share state: keep one
//! handle to inspect what the session did with the other.

use super::{Connector, Transport, TransportError};
use crate::core::interrupt::Interrupt;
use crate::core::port_config::{Parity, PortConfig};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

/// One scripted outcome of `read_line`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadEvent {
    /// A line arrives
    Line(String),
    /// The read times out with nothing
    Silence,
    /// The read fails
    Error(String),
    /// The user presses Ctrl-C while the read is blocked
    Interrupt,
}

impl ReadEvent {
    /// Shorthand for [`ReadEvent::Line`]
    pub fn line(text: &str) -> Self {
        Self::Line(text.to_string())
    }
}

#[derive(Debug)]
struct MemoryState {
    port: String,
    baud_rate: u32,
    byte_size: u8,
    parity: Parity,
    stop_bits: u8,
    timeout: Option<Duration>,
    open: bool,
    accept_writes: bool,
    script: VecDeque<ReadEvent>,
    written: Vec<String>,
    reads: usize,
}

/// Scripted transport
#[derive(Debug, Clone)]
pub struct MemoryTransport {
    state: Arc<Mutex<MemoryState>>,
}

impl Default for MemoryTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryTransport {
    /// Create an open transport with an empty script
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(MemoryState {
                port: "mem0".to_string(),
                baud_rate: 115_200,
                byte_size: 8,
                parity: Parity::None,
                stop_bits: 1,
                timeout: Some(Duration::from_secs(1)),
                open: true,
                accept_writes: true,
                script: VecDeque::new(),
                written: Vec::new(),
                reads: 0,
            })),
        }
    }

    /// Append events to the read script
    pub fn push_reads<I>(&self, events: I)
    where
        I: IntoIterator<Item = ReadEvent>,
    {
        self.state.lock().script.extend(events);
    }

    /// Queue plain lines
    pub fn push_lines(&self, lines: &[&str]) {
        self.push_reads(lines.iter().map(|l| ReadEvent::line(l)));
    }

    /// Make writes report zero accepted bytes
    pub fn set_accept_writes(&self, accept: bool) {
        self.state.lock().accept_writes = accept;
    }

    /// Everything written so far, one entry per write call
    pub fn written(&self) -> Vec<String> {
        self.state.lock().written.clone()
    }

    /// Number of `read_line` calls served
    pub fn reads(&self) -> usize {
        self.state.lock().reads
    }

    /// Events not consumed yet
    pub fn remaining_reads(&self) -> usize {
        self.state.lock().script.len()
    }

    /// Current parity of the handle
    pub fn parity(&self) -> Parity {
        self.state.lock().parity
    }

    /// Current data bits of the handle
    pub fn byte_size(&self) -> u8 {
        self.state.lock().byte_size
    }

    /// Current stop bits of the handle
    pub fn stop_bits(&self) -> u8 {
        self.state.lock().stop_bits
    }

    /// Current timeout of the handle
    pub fn timeout(&self) -> Option<Duration> {
        self.state.lock().timeout
    }

    fn reopen(&self, config: &PortConfig, baud_rate: u32, parity: Parity) {
        let mut state = self.state.lock();
        state.port = config.port.clone();
        state.baud_rate = baud_rate;
        state.byte_size = config.byte_size;
        state.parity = parity;
        state.stop_bits = config.stop_bits;
        state.timeout = config.timeout_duration();
        state.open = true;
    }

    fn ensure_open(state: &MemoryState) -> Result<(), TransportError> {
        if state.open {
            Ok(())
        } else {
            Err(TransportError::Disconnected)
        }
    }
}

impl Transport for MemoryTransport {
    fn is_open(&self) -> bool {
        self.state.lock().open
    }

    fn close(&mut self) -> Result<(), TransportError> {
        self.state.lock().open = false;
        Ok(())
    }

    fn read_line(&mut self, interrupt: &Interrupt) -> Result<String, TransportError> {
        let mut state = self.state.lock();
        Self::ensure_open(&state)?;
        state.reads += 1;

        match state.script.pop_front() {
            Some(ReadEvent::Line(line)) => Ok(line),
            Some(ReadEvent::Error(message)) => Err(TransportError::IoError(
                std::io::Error::new(std::io::ErrorKind::Other, message),
            )),
            Some(ReadEvent::Interrupt) => {
                interrupt.trigger();
                Ok(String::new())
            }
            Some(ReadEvent::Silence) | None => Ok(String::new()),
        }
    }

    fn write(&mut self, data: &[u8]) -> Result<usize, TransportError> {
        let mut state = self.state.lock();
        Self::ensure_open(&state)?;
        if !state.accept_writes {
            return Ok(0);
        }
        state.written.push(String::from_utf8_lossy(data).into_owned());
        Ok(data.len())
    }

    fn port_name(&self) -> String {
        self.state.lock().port.clone()
    }

    fn baud_rate(&self) -> Result<u32, TransportError> {
        Ok(self.state.lock().baud_rate)
    }

    fn set_baud_rate(&mut self, baud_rate: u32) -> Result<(), TransportError> {
        self.state.lock().baud_rate = baud_rate;
        Ok(())
    }

    fn set_byte_size(&mut self, bits: u8) -> Result<(), TransportError> {
        self.state.lock().byte_size = bits;
        Ok(())
    }

    fn set_parity(&mut self, parity: Parity) -> Result<(), TransportError> {
        self.state.lock().parity = parity;
        Ok(())
    }

    fn set_stop_bits(&mut self, bits: u8) -> Result<(), TransportError> {
        self.state.lock().stop_bits = bits;
        Ok(())
    }

    fn set_timeout(&mut self, timeout: Option<Duration>) -> Result<(), TransportError> {
        self.state.lock().timeout = timeout;
        Ok(())
    }

    fn info(&self) -> String {
        let state = self.state.lock();
        format!(
            "{} @ {} baud ({}{}{}, in-memory)",
            state.port,
            state.baud_rate,
            state.byte_size,
            state.parity.letter(),
            state.stop_bits
        )
    }
}

/// Hands out a shared [`MemoryTransport`]
#[derive(Debug, Clone, Default)]
pub struct MemoryConnector {
    transport: MemoryTransport,
    opened: Arc<Mutex<Vec<PortConfig>>>,
    unavailable: Arc<Mutex<Option<String>>>,
}

impl MemoryConnector {
    /// Connector serving `transport` on every open
    pub fn new(transport: MemoryTransport) -> Self {
        Self {
            transport,
            opened: Arc::new(Mutex::new(Vec::new())),
            unavailable: Arc::new(Mutex::new(None)),
        }
    }

    /// Make subsequent opens fail as if the device were busy or missing
    pub fn set_unavailable(&self, reason: Option<&str>) {
        *self.unavailable.lock() = reason.map(str::to_string);
    }

    /// Configurations of every successful open
    pub fn opened(&self) -> Vec<PortConfig> {
        self.opened.lock().clone()
    }
}

impl Connector for MemoryConnector {
    fn open(&self, config: &PortConfig) -> Result<Box<dyn Transport>, TransportError> {
        let baud_rate = config.baud_rate_value()?;
        let parity = config.parity_value()?;
        if let Some(reason) = self.unavailable.lock().clone() {
            return Err(TransportError::ConnectionFailed(reason));
        }

        self.transport.reopen(config, baud_rate, parity);
        self.opened.lock().push(config.clone());
        Ok(Box::new(self.transport.clone()))
    }
}
