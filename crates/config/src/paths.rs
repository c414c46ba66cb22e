//! Path helpers for scout's data directory.

use std::path::PathBuf;

/// Scout's data directory (~/.scout).
pub fn data_dir() -> PathBuf {
    dirs::home_dir()
        .expect("failed to locate home directory")
        .join(".scout")
}

/// Location of the config file.
pub fn config_path() -> PathBuf {
    data_dir().join("config.json")
}
