//! Centralized path utilities
//!
//! All application paths in one place for consistency

use std::path::{Path, PathBuf};

const CONFIG_DIR_NAME: &str = ".conductor";

/// Get the conductor config directory (~/.conductor)
pub fn config_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(CONFIG_DIR_NAME)
}

/// Get the main config file (~/.conductor/config.toml)
pub fn config_file() -> PathBuf {
    config_dir().join("config.toml")
}

/// Get the logs directory (~/.conductor/logs)
pub fn logs_dir() -> PathBuf {
    config_dir().join("logs")
}

/// Claude-style hooks files, project first, then user-wide
pub fn hooks_json_candidates(working_dir: &Path) -> Vec<PathBuf> {
    let mut candidates = vec![working_dir.join(".claude").join("hooks").join("hooks.json")];
    if let Some(home) = dirs::home_dir() {
        candidates.push(home.join(".claude").join("hooks").join("hooks.json"));
    }
    candidates
}
