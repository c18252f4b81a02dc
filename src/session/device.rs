//! Android device discovery through adb

use std::path::{Path, PathBuf};
use std::time::Duration;

use tokio::process::Command;
use tokio::time::timeout;

use crate::common::{Error, Result};

/// Connection state reported by `adb devices`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceState {
    Device,
    Unauthorized,
    Offline,
    Other(String),
}

impl DeviceState {
    fn parse(s: &str) -> Self {
        match s {
            "device" => DeviceState::Device,
            "unauthorized" => DeviceState::Unauthorized,
            "offline" => DeviceState::Offline,
            other => DeviceState::Other(other.to_string()),
        }
    }
}

/// One line of `adb devices`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceEntry {
    pub serial: String,
    pub state: DeviceState,
}

impl DeviceEntry {
    pub fn is_authorized(&self) -> bool {
        self.state == DeviceState::Device
    }
}

/// Locate the adb binary
pub fn find_adb(explicit: Option<&Path>) -> Option<PathBuf> {
    match explicit {
        Some(path) => Some(path.to_path_buf()),
        None => which::which("adb").ok(),
    }
}

/// Parse the output of `adb devices`
///
/// The first line is a banner; daemon start-up chatter starts with `*`.
pub fn parse_devices(output: &str) -> Vec<DeviceEntry> {
    output
        .lines()
        .skip_while(|line| !line.starts_with("List of devices"))
        .skip(1)
        .filter(|line| !line.trim().is_empty() && !line.starts_with('*'))
        .filter_map(|line| {
            let mut cols = line.split_whitespace();
            let serial = cols.next()?;
            let state = cols.next()?;
            Some(DeviceEntry {
                serial: serial.to_string(),
                state: DeviceState::parse(state),
            })
        })
        .collect()
}

/// Run `adb devices` and parse the result
pub async fn list_devices(adb: &Path) -> Result<Vec<DeviceEntry>> {
    let output = timeout(
        Duration::from_secs(10),
        Command::new(adb).arg("devices").output(),
    )
    .await
    .map_err(|_| Error::unreachable("adb", "'adb devices' did not answer within 10 seconds"))?
    .map_err(|e| Error::unreachable("adb", format!("failed to run {}: {}", adb.display(), e)))?;

    if !output.status.success() {
        return Err(Error::unreachable(
            "adb",
            format!(
                "'adb devices' exited with code {}",
                output.status.code().unwrap_or(-1)
            ),
        ));
    }

    Ok(parse_devices(&String::from_utf8_lossy(&output.stdout)))
}

/// First authorized device, used to fill in fresh capability files
pub async fn first_authorized_device(adb: &Path) -> Result<Option<String>> {
    Ok(list_devices(adb)
        .await?
        .into_iter()
        .find(DeviceEntry::is_authorized)
        .map(|d| d.serial))
}
