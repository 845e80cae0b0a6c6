//! Configuration module
//!
//! Locates the settings file, the command dictionary and the history file in
//! the per-user directories.

mod settings;

pub use settings::{AppConfig, SettingsError};

use directories::ProjectDirs;
use std::path::PathBuf;

/// Settings file name inside the config directory
pub const CONFIG_FILE_NAME: &str = "config.toml";

/// Dictionary file name inside the config directory
pub const DICTIONARY_FILE_NAME: &str = "dictionary.txt";

fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("com", "atshell", "atshell")
}

/// Get the application configuration directory
pub fn config_dir() -> Option<PathBuf> {
    project_dirs().map(|dirs| dirs.config_dir().to_path_buf())
}

/// Get the application data directory
pub fn data_dir() -> Option<PathBuf> {
    project_dirs().map(|dirs| dirs.data_dir().to_path_buf())
}

/// Default settings file
pub fn config_file() -> Option<PathBuf> {
    config_dir().map(|d| d.join(CONFIG_FILE_NAME))
}
