//! # atshell Core Library
//!
//! An interactive shell for devices speaking AT commands or NMEA over a
//! serial port:
//! - Serial ports (RS-232, USB-Serial adapters) through `serialport`
//! - Budgeted read loop that hides command echo and bare `OK` replies
//! - Command dictionary turned into invocable shell commands
//! - NMEA sentences with automatic checksum
//! - History, output highlighting, TOML settings
//!
//! ## Example
//!
//! ```rust,no_run
//! use atshell_core::{CommandDictionary, SerialConnector, Shell, StdoutSink};
//!
//! let mut shell = Shell::new(
//!     Box::new(SerialConnector),
//!     CommandDictionary::parse(["ATI # identification"]),
//!     Box::new(StdoutSink::new()),
//! );
//! shell.handle_line("serial_open /dev/ttyUSB0 115200");
//! shell.handle_line("ATI");
//! shell.shutdown();
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod cli;
pub mod config;
pub mod core;

// Re-exports for convenience
pub use crate::cli::{CliResult, ExitCodes, LineInput, PipeMode, StdinLineReader};
pub use crate::config::{AppConfig, SettingsError};
pub use crate::core::dictionary::CommandDictionary;
pub use crate::core::highlight::{Colour, HighlightRule, Highlights};
pub use crate::core::history::History;
pub use crate::core::interrupt::Interrupt;
pub use crate::core::output::{OutputSink, SharedSink, StdoutSink};
pub use crate::core::port_config::{ConfigError, Parity, PortConfig, PortField};
pub use crate::core::session::{ReadMode, ReadOutcome, ReadSummary, SerialSession, SessionError};
pub use crate::core::shell::{Flow, Shell, ShellError};
pub use crate::core::transport::{
    Connector, MemoryConnector, MemoryTransport, ReadEvent, SerialConnector, Transport,
    TransportError,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");
