//! Command history
//!
//! Lines entered at the prompt, oldest first. The history is read from a
//! plain text file at start-up and written back when the shell ends.

use std::collections::VecDeque;
use std::fs::{self, File};
use std::io::{self, BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

/// History file name inside the data directory
pub const HISTORY_FILE_NAME: &str = "history";

/// Entered lines with an optional length limit
#[derive(Debug, Clone, Default)]
pub struct History {
    path: Option<PathBuf>,
    entries: VecDeque<String>,
    max_length: Option<usize>,
}

impl History {
    /// History that is never persisted
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// History backed by `path`, not loaded yet
    pub fn with_path(path: PathBuf) -> Self {
        Self {
            path: Some(path),
            ..Self::default()
        }
    }

    /// Read the backing file; a missing file leaves the history empty
    pub fn load(&mut self) -> io::Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        if !path.exists() {
            tracing::debug!("No history at {}", path.display());
            return Ok(());
        }

        tracing::debug!("Reading history");
        let reader = BufReader::new(File::open(path)?);
        self.entries.clear();
        for line in reader.lines() {
            let line = line?;
            if !line.trim().is_empty() {
                self.entries.push_back(line);
            }
        }
        self.truncate();
        Ok(())
    }

    /// Write the history to the backing file
    pub fn save(&self) -> io::Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };

        tracing::debug!("Saving history...");
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let mut file = File::create(path)?;
        for entry in &self.entries {
            writeln!(file, "{entry}")?;
        }
        file.flush()
    }

    /// Record a line; blank lines are skipped
    pub fn push(&mut self, line: &str) {
        let line = line.trim();
        if line.is_empty() {
            return;
        }
        self.entries.push_back(line.to_string());
        self.truncate();
    }

    /// Forget every entry
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Entries, oldest first
    pub fn entries(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(String::as_str)
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no line has been recorded
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Keep at most `max` entries, `None` for no limit
    pub fn set_max_length(&mut self, max: Option<usize>) {
        self.max_length = max;
        self.truncate();
    }

    /// Current limit
    pub fn max_length(&self) -> Option<usize> {
        self.max_length
    }

    /// Backing file, if any
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    fn truncate(&mut self) {
        if let Some(max) = self.max_length {
            while self.entries.len() > max {
                self.entries.pop_front();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_push_skips_blank() {
        let mut history = History::in_memory();
        history.push("ATI");
        history.push("   ");
        history.push(" serial_close ");
        assert_eq!(history.entries().collect::<Vec<_>>(), vec!["ATI", "serial_close"]);
    }

    #[test]
    fn test_max_length_drops_oldest() {
        let mut history = History::in_memory();
        for line in ["a", "b", "c", "d"] {
            history.push(line);
        }
        history.set_max_length(Some(2));
        assert_eq!(history.entries().collect::<Vec<_>>(), vec!["c", "d"]);

        history.push("e");
        assert_eq!(history.entries().collect::<Vec<_>>(), vec!["d", "e"]);

        history.set_max_length(None);
        history.push("f");
        assert_eq!(history.len(), 3);
    }

    #[test]
    fn test_save_and_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join(HISTORY_FILE_NAME);

        let mut history = History::with_path(path.clone());
        history.push("serial_open /dev/ttyUSB0");
        history.push("ATI");
        history.save().unwrap();

        let mut restored = History::with_path(path);
        restored.load().unwrap();
        assert_eq!(
            restored.entries().collect::<Vec<_>>(),
            vec!["serial_open /dev/ttyUSB0", "ATI"]
        );
    }

    #[test]
    fn test_missing_file_is_empty() {
        let dir = TempDir::new().unwrap();
        let mut history = History::with_path(dir.path().join("absent"));
        history.load().unwrap();
        assert!(history.is_empty());
    }

    #[test]
    fn test_clear() {
        let mut history = History::in_memory();
        history.push("ATZ");
        history.clear();
        assert!(history.is_empty());
        history.save().unwrap();
    }
}
