//! Configuration, capability and report paths
//!
//! Uses the directories crate for platform-appropriate locations:
//! - Linux: `~/.config/uitest/`
//! - macOS: `~/Library/Application Support/uitest/`
//! - Windows: `%APPDATA%\uitest\`

use std::path::PathBuf;

/// Application name used for directory lookup
const APP_NAME: &str = "uitest";

/// Get the configuration directory path
pub fn config_dir() -> Option<PathBuf> {
    directories::ProjectDirs::from("", "", APP_NAME).map(|dirs| dirs.config_dir().to_path_buf())
}

/// Get the path to the configuration file
pub fn config_path() -> Option<PathBuf> {
    config_dir().map(|dir| dir.join("config.toml"))
}

/// Get the default path of the session capabilities file
pub fn capabilities_path() -> Option<PathBuf> {
    config_dir().map(|dir| dir.join("capabilities.json"))
}

/// Get the path to the log directory
pub fn log_dir() -> Option<PathBuf> {
    directories::ProjectDirs::from("", "", APP_NAME).map(|dirs| dirs.data_dir().join("logs"))
}

/// Make a user-supplied file name safe to join onto a directory
///
/// Parent references and leading dots are stripped and path separators
/// flattened, so the result names a file inside the target directory or is
/// empty.
pub fn sanitize_file_name(name: &str) -> String {
    name.replace("..", "")
        .replace(['/', '\\'], "_")
        .trim_start_matches('.')
        .to_string()
}
