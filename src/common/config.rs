//! Configuration file handling

use serde::Deserialize;
use std::path::{Path, PathBuf};

use super::paths::{capabilities_path, config_path};
use super::Result;

/// Main configuration structure
#[derive(Debug, Deserialize, Default)]
pub struct Config {
    /// Automation server and capabilities
    #[serde(default)]
    pub session: SessionSettings,

    /// Timeout settings
    #[serde(default)]
    pub timeouts: Timeouts,

    /// Pre-flight environment checks
    #[serde(default)]
    pub preflight: PreflightSettings,

    /// Run policy
    #[serde(default)]
    pub run: RunSettings,

    /// Action pacing and artifacts
    #[serde(default)]
    pub actions: ActionSettings,
}

/// Where the automation server lives and how to describe the target
#[derive(Debug, Deserialize)]
pub struct SessionSettings {
    /// Base URL of the Appium/WebDriver server
    #[serde(default = "default_server_url")]
    pub server_url: String,

    /// JSON capabilities file; defaults to `capabilities.json` in the config dir
    #[serde(default)]
    pub capabilities_file: Option<PathBuf>,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            server_url: default_server_url(),
            capabilities_file: None,
        }
    }
}

fn default_server_url() -> String {
    "http://localhost:4723".to_string()
}

/// Timeout settings
#[derive(Debug, Deserialize)]
pub struct Timeouts {
    /// Timeout for opening the remote session
    #[serde(default = "default_connect")]
    pub connect_secs: u64,

    /// Timeout for individual remote commands
    #[serde(default = "default_request")]
    pub request_secs: u64,

    /// Pause after the session opens, before the first step runs
    #[serde(default = "default_settle")]
    pub settle_ms: u64,

    /// Optional outer limit on a single step
    #[serde(default)]
    pub step_secs: Option<u64>,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            connect_secs: default_connect(),
            request_secs: default_request(),
            settle_ms: default_settle(),
            step_secs: None,
        }
    }
}

fn default_connect() -> u64 {
    60
}
fn default_request() -> u64 {
    30
}
fn default_settle() -> u64 {
    2_000
}

/// Which pre-flight checks run before a session is opened
#[derive(Debug, Deserialize)]
pub struct PreflightSettings {
    #[serde(default = "default_true")]
    pub check_server: bool,

    #[serde(default = "default_true")]
    pub check_device: bool,

    #[serde(default = "default_true")]
    pub check_config: bool,

    /// Explicit adb binary; searched in PATH when unset
    #[serde(default)]
    pub adb_path: Option<PathBuf>,
}

impl Default for PreflightSettings {
    fn default() -> Self {
        Self {
            check_server: true,
            check_device: true,
            check_config: true,
            adb_path: None,
        }
    }
}

fn default_true() -> bool {
    true
}

/// Run policy
#[derive(Debug, Deserialize, Default)]
pub struct RunSettings {
    /// Abort the run after the first step that reports a failure
    #[serde(default)]
    pub stop_on_failure: bool,
}

/// Pacing for polling actions and where artifacts go
#[derive(Debug, Clone, Deserialize)]
pub struct ActionSettings {
    /// Interval between polls while waiting for an element
    #[serde(default = "default_poll_interval")]
    pub poll_interval_ms: u64,

    /// Pause after clicks, typing and key presses
    #[serde(default = "default_interaction_pause")]
    pub interaction_pause_ms: u64,

    /// Directory screenshots are written to
    #[serde(default = "default_reports_dir")]
    pub reports_dir: PathBuf,
}

impl Default for ActionSettings {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval(),
            interaction_pause_ms: default_interaction_pause(),
            reports_dir: default_reports_dir(),
        }
    }
}

fn default_poll_interval() -> u64 {
    500
}
fn default_interaction_pause() -> u64 {
    500
}
fn default_reports_dir() -> PathBuf {
    PathBuf::from("reports")
}

impl Config {
    /// Load configuration from the default config file
    ///
    /// Returns default configuration if file doesn't exist
    pub fn load() -> Result<Self> {
        match config_path() {
            Some(path) if path.exists() => Self::load_from(&path),
            _ => Ok(Self::default()),
        }
    }

    /// Load configuration from an explicit file
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| super::Error::FileRead {
            path: path.display().to_string(),
            error: e.to_string(),
        })?;
        toml::from_str(&content).map_err(|e| super::Error::ConfigParse(e.to_string()))
    }

    /// Resolve the capabilities file to use
    pub fn capabilities_file(&self) -> Option<PathBuf> {
        self.session
            .capabilities_file
            .clone()
            .or_else(capabilities_path)
    }
}
