//! Output sinks for lines shown to the operator

use super::highlight::Highlights;
use parking_lot::Mutex;
use std::io::{self, Write};
use std::sync::Arc;

/// Receives lines for display
pub trait OutputSink {
    /// Show one line
    fn emit(&mut self, line: &str);

    /// Whether ANSI colour codes render on this sink
    fn supports_colour(&self) -> bool {
        false
    }
}

/// Collects lines in memory
impl OutputSink for Vec<String> {
    fn emit(&mut self, line: &str) {
        self.push(line.to_string());
    }
}

/// Collects lines behind a shared handle.
///
/// Clones see the same buffer, so one clone can be handed to the shell while
/// another is kept to inspect what was shown.
#[derive(Debug, Clone, Default)]
pub struct SharedSink {
    lines: Arc<Mutex<Vec<String>>>,
}

impl SharedSink {
    /// Empty buffer
    pub fn new() -> Self {
        Self::default()
    }

    /// Lines emitted so far
    pub fn lines(&self) -> Vec<String> {
        self.lines.lock().clone()
    }

    /// Remove and return the lines emitted so far
    pub fn drain(&self) -> Vec<String> {
        std::mem::take(&mut *self.lines.lock())
    }
}

impl OutputSink for SharedSink {
    fn emit(&mut self, line: &str) {
        self.lines.lock().push(line.to_string());
    }
}

/// Prints to stdout, one line per call
#[derive(Debug, Clone, Copy)]
pub struct StdoutSink {
    colour: bool,
}

impl StdoutSink {
    /// Colour is enabled when stdout is a terminal
    pub fn new() -> Self {
        Self {
            colour: atty::is(atty::Stream::Stdout),
        }
    }
}

impl Default for StdoutSink {
    fn default() -> Self {
        Self::new()
    }
}

impl OutputSink for StdoutSink {
    fn emit(&mut self, line: &str) {
        let mut stdout = io::stdout().lock();
        // A closed stdout is not worth aborting the session for
        let _ = writeln!(stdout, "{line}");
        let _ = stdout.flush();
    }

    fn supports_colour(&self) -> bool {
        self.colour
    }
}

/// Applies highlight rules before forwarding to another sink
pub struct Painted<'a> {
    sink: &'a mut dyn OutputSink,
    highlights: &'a Highlights,
}

impl<'a> Painted<'a> {
    /// Wrap `sink`
    pub fn new(sink: &'a mut dyn OutputSink, highlights: &'a Highlights) -> Self {
        Self { sink, highlights }
    }
}

impl OutputSink for Painted<'_> {
    fn emit(&mut self, line: &str) {
        if self.sink.supports_colour() && !self.highlights.is_empty() {
            let painted = self.highlights.paint(line);
            self.sink.emit(&painted);
        } else {
            self.sink.emit(line);
        }
    }

    fn supports_colour(&self) -> bool {
        self.sink.supports_colour()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct ColourSink(Vec<String>);

    impl OutputSink for ColourSink {
        fn emit(&mut self, line: &str) {
            self.0.push(line.to_string());
        }

        fn supports_colour(&self) -> bool {
            true
        }
    }

    #[test]
    fn test_painted_only_colours_capable_sinks() {
        let mut highlights = Highlights::new();
        highlights.insert("OK=>green".parse().unwrap());

        let mut plain: Vec<String> = Vec::new();
        Painted::new(&mut plain, &highlights).emit("OK");
        assert_eq!(plain, vec!["OK".to_string()]);

        let mut coloured = ColourSink(Vec::new());
        Painted::new(&mut coloured, &highlights).emit("OK");
        assert_eq!(coloured.0, vec!["\x1b[32mOK\x1b[0m".to_string()]);
    }

    #[test]
    fn test_shared_sink_clones_share_buffer() {
        let sink = SharedSink::new();
        let mut handed_out = sink.clone();
        handed_out.emit("+CSQ: 20,99");
        assert_eq!(sink.lines(), vec!["+CSQ: 20,99".to_string()]);
        assert_eq!(sink.drain().len(), 1);
        assert!(sink.lines().is_empty());
    }
}
