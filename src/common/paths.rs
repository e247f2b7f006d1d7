//! Configuration, data and session file paths
//!
//! Uses the directories crate for platform-appropriate locations:
//! - Linux: `~/.config/cellbench/` and `~/.local/share/cellbench/`
//! - macOS: `~/Library/Application Support/cellbench/`
//! - Windows: `%APPDATA%\cellbench\`

use std::io;
use std::path::PathBuf;

/// Application directory name
const APP_NAME: &str = "cellbench";

/// Environment variable overriding the session file location
pub const SESSION_ENV: &str = "CELLBENCH_SESSION";

fn project_dirs() -> Option<directories::ProjectDirs> {
    directories::ProjectDirs::from("", "", APP_NAME)
}

/// Get the configuration directory path
pub fn config_dir() -> Option<PathBuf> {
    project_dirs().map(|dirs| dirs.config_dir().to_path_buf())
}

/// Get the path to the configuration file
pub fn config_path() -> Option<PathBuf> {
    config_dir().map(|dir| dir.join("config.toml"))
}

/// Get the data directory path
pub fn data_dir() -> Option<PathBuf> {
    project_dirs().map(|dirs| dirs.data_dir().to_path_buf())
}

/// Get the path to the log directory
pub fn log_dir() -> Option<PathBuf> {
    data_dir().map(|d| d.join("logs"))
}

/// Get the path of the persisted session document
///
/// `CELLBENCH_SESSION` wins over the default `<data_dir>/session.json`.
pub fn session_path() -> Option<PathBuf> {
    if let Ok(path) = std::env::var(SESSION_ENV) {
        if !path.is_empty() {
            return Some(PathBuf::from(path));
        }
    }
    data_dir().map(|d| d.join("session.json"))
}

/// Ensure the parent directory of `path` exists
pub fn ensure_parent_dir(path: &std::path::Path) -> io::Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            std::fs::create_dir_all(parent)?;
        }
    }
    Ok(())
}
