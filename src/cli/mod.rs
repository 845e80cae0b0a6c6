//! CLI Module
//!
//! Provides command-line interface functionality including:
//! - Exit codes for automation
//! - Terminal detection and a threaded stdin line reader
//! - Log subscriber setup with a runtime debug switch

pub mod exit_codes;
pub mod logging;
pub mod pipe;

pub use exit_codes::{exit_code_description, CliResult, ExitCodes};
pub use logging::LogControl;
pub use pipe::{LineInput, PipeMode, StdinLineReader};
