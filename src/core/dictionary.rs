//! Known device command dictionary
//!
//! The dictionary file is plain text. A line starting with `AT` (any case)
//! defines a command, optionally followed by an inline ` # short help`.
//! Lines starting with `#` right after a definition form its help text:
//!
//! ```text
//! ATI # identification
//! AT+CGMM
//! #request model
//! # identification
//! ```

use std::collections::HashMap;
use std::io;
use std::path::Path;

/// Help text for definitions without any
pub const NO_HELP: &str = "no help found";

/// Command name → help text, in definition order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandDictionary {
    entries: Vec<(String, String)>,
    index: HashMap<String, usize>,
}

impl CommandDictionary {
    /// Empty dictionary
    pub fn new() -> Self {
        Self::default()
    }

    /// Read and parse a dictionary file
    pub fn load(path: &Path) -> io::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let dictionary = Self::parse(content.lines());
        tracing::debug!("Loaded {} command(s) from {}", dictionary.len(), path.display());
        Ok(dictionary)
    }

    /// Parse definition lines
    pub fn parse<I, S>(lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut dictionary = Self::new();
        let mut current: Option<String> = None;
        let mut doc = String::new();
        let mut seen_any = false;

        for raw in lines {
            seen_any = true;
            let line = raw.as_ref().trim_end_matches(['\r', '\n']);
            if line.trim().is_empty() {
                continue;
            }

            if starts_with_at(line) {
                if let Some(name) = current.take() {
                    dictionary.flush_doc(name, &mut doc);
                }

                let (name, help) = split_inline_help(line);
                tracing::debug!("Adding {}", name);
                dictionary.insert(name.clone(), help);
                current = Some(name);
            } else if let Some(text) = line.strip_prefix('#') {
                if current.is_some() {
                    doc.push_str(text);
                } else {
                    tracing::debug!("Ignoring help line before any command: {}", line);
                }
            } else {
                tracing::debug!("Ignoring dictionary line: {}", line);
            }
        }

        if let Some(name) = current.take() {
            dictionary.flush_doc(name, &mut doc);
        }

        if !seen_any {
            tracing::warn!("No data to generate known command list");
        }

        dictionary
    }

    /// Insert or replace an entry, keeping its original position
    pub fn insert(&mut self, name: String, help: String) {
        match self.index.get(&name) {
            Some(&pos) => self.entries[pos].1 = help,
            None => {
                self.index.insert(name.clone(), self.entries.len());
                self.entries.push((name, help));
            }
        }
    }

    /// Help text for an exact name
    pub fn get(&self, name: &str) -> Option<&str> {
        self.index.get(name).map(|&pos| self.entries[pos].1.as_str())
    }

    /// Help text looked up as typed, then upper-cased, then lower-cased
    pub fn help_for(&self, name: &str) -> Option<&str> {
        self.get(name)
            .or_else(|| self.get(&name.to_uppercase()))
            .or_else(|| self.get(&name.to_lowercase()))
    }

    /// Entries whose name or help contains `keyword`, ignoring case
    pub fn search(&self, keyword: &str) -> Vec<(&str, &str)> {
        let keyword = keyword.to_lowercase();
        self.iter()
            .filter(|(name, help)| {
                name.to_lowercase().contains(&keyword) || help.to_lowercase().contains(&keyword)
            })
            .collect()
    }

    /// All entries in definition order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(n, h)| (n.as_str(), h.as_str()))
    }

    /// All names in definition order
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(n, _)| n.as_str())
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether there are no entries
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn flush_doc(&mut self, name: String, doc: &mut String) {
        if !doc.is_empty() {
            tracing::debug!("Adding doc {:?} to {}", doc, name);
            self.insert(name, std::mem::take(doc));
        }
    }
}

fn starts_with_at(line: &str) -> bool {
    line.get(..2).is_some_and(|prefix| prefix.eq_ignore_ascii_case("at"))
}

/// Split `AT+CMD # help` into name and help
fn split_inline_help(line: &str) -> (String, String) {
    match line.find(" #") {
        Some(pos) => {
            let name = line[..pos].trim().to_string();
            let help = line[pos + 2..].trim().to_string();
            let help = if help.is_empty() { NO_HELP.to_string() } else { help };
            (name, help)
        }
        None => (line.trim().to_string(), NO_HELP.to_string()),
    }
}
