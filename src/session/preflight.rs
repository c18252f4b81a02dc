//! Pre-flight environment checks
//!
//! Run before a connection is attempted so the operator gets a specific
//! diagnostic ("adb sees no device") instead of a generic connect failure.

use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;

use crate::common::config::PreflightSettings;
use crate::common::{Error, Result};

use super::config::SessionConfig;
use super::device::{find_adb, list_devices, DeviceState};

/// A single environment check
#[async_trait]
pub trait PreflightCheck: Send + Sync {
    /// Short name shown in diagnostics
    fn name(&self) -> &'static str;

    /// Run the check against a session configuration
    async fn check(&self, config: &SessionConfig) -> Result<()>;
}

/// The automation server answers `GET /status`
pub struct ServerStatusCheck {
    pub timeout: Duration,
}

#[async_trait]
impl PreflightCheck for ServerStatusCheck {
    fn name(&self) -> &'static str {
        "automation server"
    }

    async fn check(&self, config: &SessionConfig) -> Result<()> {
        let url = format!("{}/status", config.server_url.trim_end_matches('/'));
        tracing::debug!(%url, "Checking automation server status");

        let response = reqwest::Client::new()
            .get(&url)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| {
                let hint = if e.is_timeout() {
                    format!("no answer from {} within {}s", url, self.timeout.as_secs())
                } else {
                    format!("cannot connect to {}. Start the server with 'appium'", url)
                };
                Error::unreachable("Automation server", hint)
            })?;

        if !response.status().is_success() {
            return Err(Error::unreachable(
                "Automation server",
                format!("{} responded with status {}", url, response.status()),
            ));
        }
        Ok(())
    }
}

/// The target device is attached and has authorized USB debugging
pub struct DeviceCheck {
    pub adb_path: Option<PathBuf>,
}

#[async_trait]
impl PreflightCheck for DeviceCheck {
    fn name(&self) -> &'static str {
        "target device"
    }

    async fn check(&self, config: &SessionConfig) -> Result<()> {
        let adb = find_adb(self.adb_path.as_deref()).ok_or_else(|| {
            Error::unreachable(
                "adb",
                "not found in PATH. Install Android SDK platform-tools and add them to PATH",
            )
        })?;
        let devices = list_devices(&adb).await?;

        match config.device_name() {
            Some(wanted) => match devices.iter().find(|d| d.serial == wanted) {
                Some(d) if d.is_authorized() => Ok(()),
                Some(d) if d.state == DeviceState::Unauthorized => Err(Error::unreachable(
                    &format!("Device {}", wanted),
                    "USB debugging is not authorized. Accept the prompt on the device",
                )),
                Some(d) => Err(Error::unreachable(
                    &format!("Device {}", wanted),
                    format!("adb reports it as {:?}", d.state),
                )),
                None => Err(Error::unreachable(
                    &format!("Device {}", wanted),
                    format!(
                        "not in 'adb devices' ({} device(s) attached)",
                        devices.len()
                    ),
                )),
            },
            None if devices.iter().any(|d| d.is_authorized()) => Ok(()),
            None => Err(Error::unreachable(
                "Android device",
                "no authorized device found. Connect a device and enable USB debugging",
            )),
        }
    }
}

/// The capabilities name a platform and a real device
pub struct CapabilitiesCheck;

#[async_trait]
impl PreflightCheck for CapabilitiesCheck {
    fn name(&self) -> &'static str {
        "capabilities"
    }

    async fn check(&self, config: &SessionConfig) -> Result<()> {
        config.validate()
    }
}

/// Checks enabled by configuration, in the order they must run
pub fn standard_checks(settings: &PreflightSettings) -> Vec<Box<dyn PreflightCheck>> {
    let mut checks: Vec<Box<dyn PreflightCheck>> = Vec::new();
    if settings.check_server {
        checks.push(Box::new(ServerStatusCheck {
            timeout: Duration::from_secs(5),
        }));
    }
    if settings.check_device {
        checks.push(Box::new(DeviceCheck {
            adb_path: settings.adb_path.clone(),
        }));
    }
    if settings.check_config {
        checks.push(Box::new(CapabilitiesCheck));
    }
    checks
}

/// Outcome of one check in a diagnostics report
#[derive(Debug, Clone, Serialize)]
pub struct CheckOutcome {
    pub name: &'static str,
    pub passed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Run every check without stopping at the first failure
pub async fn diagnose(checks: &[Box<dyn PreflightCheck>], config: &SessionConfig) -> Vec<CheckOutcome> {
    let mut outcomes = Vec::with_capacity(checks.len());
    for check in checks {
        let result = check.check(config).await;
        outcomes.push(CheckOutcome {
            name: check.name(),
            passed: result.is_ok(),
            message: result.err().map(|e| e.to_string()),
        });
    }
    outcomes
}
