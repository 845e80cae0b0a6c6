//! Application settings

use crate::core::highlight::{Colour, HighlightRule, Highlights};
use crate::core::history::HISTORY_FILE_NAME;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Settings file errors
#[derive(Error, Debug)]
pub enum SettingsError {
    /// Reading or writing failed
    #[error("{path}: {source}")]
    Io {
        /// File involved
        path: PathBuf,
        /// Underlying error
        source: std::io::Error,
    },

    /// The file is not valid TOML for these settings
    #[error("{path}: {source}")]
    Parse {
        /// File involved
        path: PathBuf,
        /// Underlying error
        source: toml::de::Error,
    },

    /// Settings could not be serialized
    #[error(transparent)]
    Serialize(#[from] toml::ser::Error),
}

/// Application configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Command dictionary file
    pub dictionary: Option<PathBuf>,
    /// History file
    pub history_file: Option<PathBuf>,
    /// Maximum number of history entries kept
    pub history_length: Option<usize>,
    /// Highlight patterns (pattern -> colour)
    pub highlights: BTreeMap<String, String>,
}

impl AppConfig {
    /// Load config from the default location.
    ///
    /// Without a home directory there is nowhere to look, so the defaults
    /// are used.
    pub fn load() -> Result<Self, SettingsError> {
        Self::load_located(super::config_file().as_deref())
    }

    fn load_located(path: Option<&Path>) -> Result<Self, SettingsError> {
        match path {
            Some(path) => Self::load_from(path),
            None => {
                tracing::warn!("Could not determine config directory, using default settings");
                Ok(Self::default())
            }
        }
    }

    /// Load config from `path`; a missing file yields defaults
    pub fn load_from(path: &Path) -> Result<Self, SettingsError> {
        if !path.exists() {
            tracing::debug!("No settings at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|source| SettingsError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&content).map_err(|source| SettingsError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Save config to `path`
    pub fn save_to(&self, path: &Path) -> Result<(), SettingsError> {
        let content = toml::to_string_pretty(self)?;
        let io_error = |source| SettingsError::Io {
            path: path.to_path_buf(),
            source,
        };
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(io_error)?;
        }
        std::fs::write(path, content).map_err(io_error)
    }

    /// Dictionary file to load, if any location is known
    pub fn dictionary_path(&self) -> Option<PathBuf> {
        self.dictionary
            .clone()
            .or_else(|| super::config_dir().map(|d| d.join(super::DICTIONARY_FILE_NAME)))
    }

    /// History file to use, if any location is known
    pub fn history_path(&self) -> Option<PathBuf> {
        self.history_file
            .clone()
            .or_else(|| super::data_dir().map(|d| d.join(HISTORY_FILE_NAME)))
    }

    /// Compile the highlight table, skipping broken entries
    pub fn highlight_rules(&self) -> Highlights {
        let mut highlights = Highlights::new();
        for (pattern, colour) in &self.highlights {
            let rule = colour
                .parse::<Colour>()
                .and_then(|colour| HighlightRule::new(pattern, colour));
            match rule {
                Ok(rule) => highlights.insert(rule),
                Err(e) => tracing::warn!("Ignoring highlight {:?}: {}", pattern, e),
            }
        }
        highlights
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_no_config_dir_gives_defaults() {
        assert_eq!(AppConfig::load_located(None).unwrap(), AppConfig::default());
    }

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = TempDir::new().unwrap();
        let config = AppConfig::load_from(&dir.path().join("config.toml")).unwrap();
        assert_eq!(config, AppConfig::default());
    }

    #[test]
    fn test_partial_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            "history_length = 500\n\n[highlights]\nERROR = \"red\"\n\"^\\\\+CSQ\" = \"mauve\"\n",
        )
        .unwrap();

        let config = AppConfig::load_from(&path).unwrap();
        assert_eq!(config.history_length, Some(500));
        assert_eq!(config.dictionary, None);

        let highlights = config.highlight_rules();
        assert_eq!(highlights.rules().len(), 1);
        assert_eq!(highlights.rules()[0].pattern(), "ERROR");
    }

    #[test]
    fn test_save_then_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("sub").join("config.toml");
        let mut config = AppConfig {
            dictionary: Some(PathBuf::from("/etc/atshell/modem.txt")),
            ..AppConfig::default()
        };
        config.highlights.insert("OK".into(), "green".into());

        config.save_to(&path).unwrap();
        assert_eq!(AppConfig::load_from(&path).unwrap(), config);
        assert_eq!(
            config.dictionary_path(),
            Some(PathBuf::from("/etc/atshell/modem.txt"))
        );
    }

    #[test]
    fn test_garbage_is_an_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "history_length = \"many\"").unwrap();
        assert!(matches!(
            AppConfig::load_from(&path),
            Err(SettingsError::Parse { .. })
        ));
    }
}
