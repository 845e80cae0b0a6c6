//! CLI Pipe Support
//!
//! Detects whether the shell talks to a terminal and reads stdin on a helper
//! thread, so the main thread can keep polling the interrupt flag.

use std::io::{self, BufRead};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::thread;
use std::time::Duration;

/// Pipe mode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipeMode {
    /// No piping, interactive mode
    Interactive,
    /// Read from stdin
    StdinOnly,
    /// Write to stdout
    StdoutOnly,
    /// Full pipe mode (stdin -> process -> stdout)
    Full,
}

impl PipeMode {
    /// Detect pipe mode from environment
    pub fn detect() -> Self {
        let stdin_is_tty = atty::is(atty::Stream::Stdin);
        let stdout_is_tty = atty::is(atty::Stream::Stdout);
        Self::from_ttys(stdin_is_tty, stdout_is_tty)
    }

    fn from_ttys(stdin_is_tty: bool, stdout_is_tty: bool) -> Self {
        match (stdin_is_tty, stdout_is_tty) {
            (true, true) => Self::Interactive,
            (false, true) => Self::StdinOnly,
            (true, false) => Self::StdoutOnly,
            (false, false) => Self::Full,
        }
    }

    /// Is receiving from stdin?
    pub fn has_stdin(&self) -> bool {
        matches!(self, Self::StdinOnly | Self::Full)
    }

    /// Is interactive?
    pub fn is_interactive(&self) -> bool {
        matches!(self, Self::Interactive)
    }
}

/// Outcome of waiting for a line
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LineInput {
    /// A complete line
    Line(String),
    /// Nothing arrived in time
    Timeout,
    /// Stdin reached end of file or failed
    Closed,
}

/// Line-based stdin reader
pub struct StdinLineReader {
    receiver: Receiver<String>,
    _thread: thread::JoinHandle<()>,
}

impl StdinLineReader {
    /// Create new line reader
    pub fn new() -> Self {
        let (sender, receiver) = mpsc::channel();

        let thread = thread::spawn(move || {
            Self::reader_thread(io::stdin().lock(), sender);
        });

        Self {
            receiver,
            _thread: thread,
        }
    }

    fn reader_thread<R: BufRead>(input: R, sender: Sender<String>) {
        for line in input.lines() {
            match line {
                Ok(l) => {
                    if sender.send(l).is_err() {
                        break;
                    }
                }
                Err(e) => {
                    tracing::error!("stdin: {}", e);
                    break;
                }
            }
        }
    }

    /// Wait up to `timeout` for the next line
    pub fn recv_line_timeout(&self, timeout: Duration) -> LineInput {
        match self.receiver.recv_timeout(timeout) {
            Ok(line) => LineInput::Line(line),
            Err(RecvTimeoutError::Timeout) => LineInput::Timeout,
            Err(RecvTimeoutError::Disconnected) => LineInput::Closed,
        }
    }
}

impl Default for StdinLineReader {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pipe_mode_detection() {
        assert!(PipeMode::from_ttys(true, true).is_interactive());
        assert!(PipeMode::from_ttys(false, true).has_stdin());
        assert!(!PipeMode::from_ttys(true, false).has_stdin());
        assert_eq!(PipeMode::from_ttys(false, false), PipeMode::Full);
    }

    #[test]
    fn test_reader_thread_forwards_lines_then_closes() {
        let (sender, receiver) = mpsc::channel();
        let input = io::Cursor::new("ATI\nserial_close\n");
        StdinLineReader::reader_thread(input, sender);

        let reader = StdinLineReader {
            receiver,
            _thread: thread::spawn(|| {}),
        };
        let wait = Duration::from_millis(10);
        assert_eq!(reader.recv_line_timeout(wait), LineInput::Line("ATI".into()));
        assert_eq!(
            reader.recv_line_timeout(wait),
            LineInput::Line("serial_close".into())
        );
        assert_eq!(reader.recv_line_timeout(wait), LineInput::Closed);
    }
}
