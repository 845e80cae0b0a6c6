//! Core of the AT command shell
//!
//! This module provides:
//! - Port configuration with positional parsing and strict validation
//! - Transport layer over real serial ports and an in-memory script
//! - Serial session with the budgeted read loop and echo/ACK filtering
//! - Command dictionary loading and the command registry
//! - The line-oriented shell dispatching built-ins, dictionary stubs and raw text
//! - NMEA sentence framing
//! - History, output highlighting and the user interrupt flag

pub mod dictionary;
pub mod highlight;
pub mod history;
pub mod interrupt;
pub mod output;
pub mod port_config;
pub mod protocol;
pub mod registry;
pub mod session;
pub mod shell;
pub mod transport;
