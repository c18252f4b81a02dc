//! Session configuration: server address plus device capabilities

use std::path::Path;

use serde_json::{json, Map, Value};

use crate::common::{Error, Result};

/// Placeholder written into fresh capability files
pub const DEVICE_PLACEHOLDER: &str = "YOUR_DEVICE_ID";

const DEVICE_NAME_KEYS: [&str; 2] = ["appium:deviceName", "deviceName"];

/// Everything needed to open a remote session
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Base URL of the automation server
    pub server_url: String,
    /// Flat capability map sent with the new-session request
    pub capabilities: Map<String, Value>,
}

impl SessionConfig {
    pub fn new(server_url: impl Into<String>, capabilities: Map<String, Value>) -> Self {
        let mut capabilities = capabilities;
        capabilities
            .entry("platformName")
            .or_insert_with(|| Value::String("Android".to_string()));
        Self {
            server_url: server_url.into(),
            capabilities,
        }
    }

    /// Load capabilities from a JSON file
    pub fn load(server_url: impl Into<String>, path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| Error::FileRead {
            path: path.display().to_string(),
            error: e.to_string(),
        })?;
        let value: Value = serde_json::from_str(&content).map_err(|e| {
            Error::ConfigParse(format!("{} is not valid JSON: {}", path.display(), e))
        })?;
        match value {
            Value::Object(capabilities) => Ok(Self::new(server_url, capabilities)),
            _ => Err(Error::ConfigInvalid(format!(
                "{} must contain a JSON object of capabilities",
                path.display()
            ))),
        }
    }

    /// Configured device identity, if any
    pub fn device_name(&self) -> Option<&str> {
        DEVICE_NAME_KEYS
            .iter()
            .find_map(|key| self.capabilities.get(*key))
            .and_then(|v| v.as_str())
            .map(str::trim)
            .filter(|s| !s.is_empty() && *s != DEVICE_PLACEHOLDER)
    }

    /// Check the identifying fields are present and not placeholders
    pub fn validate(&self) -> Result<()> {
        let platform = self
            .capabilities
            .get("platformName")
            .and_then(|v| v.as_str())
            .unwrap_or_default();
        if platform.trim().is_empty() {
            return Err(Error::ConfigInvalid(
                "capability 'platformName' is missing or empty".to_string(),
            ));
        }

        let raw_device = DEVICE_NAME_KEYS
            .iter()
            .find_map(|key| self.capabilities.get(*key));
        match raw_device.and_then(|v| v.as_str()).map(str::trim) {
            None => Err(Error::ConfigInvalid(
                "capability 'appium:deviceName' is missing".to_string(),
            )),
            Some("") => Err(Error::ConfigInvalid(
                "capability 'appium:deviceName' is empty".to_string(),
            )),
            Some(DEVICE_PLACEHOLDER) => Err(Error::ConfigInvalid(format!(
                "capability 'appium:deviceName' is still the placeholder {}. Run 'uitest init --detect-device' or edit the capabilities file",
                DEVICE_PLACEHOLDER
            ))),
            Some(_) => Ok(()),
        }
    }
}

/// Capabilities written by `uitest init`
pub fn default_capabilities(device: Option<&str>) -> Value {
    json!({
        "platformName": "Android",
        "appium:automationName": "UiAutomator2",
        "appium:deviceName": device.unwrap_or(DEVICE_PLACEHOLDER),
        "appium:appPackage": null,
        "appium:appActivity": null,
        "appium:noReset": true,
        "appium:newCommandTimeout": 3600
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn caps(value: Value) -> Map<String, Value> {
        value.as_object().unwrap().clone()
    }

    #[test]
    fn test_platform_defaults_to_android() {
        let config = SessionConfig::new("http://x", Map::new());
        assert_eq!(config.capabilities["platformName"], "Android");
    }

    #[test]
    fn test_validate_accepts_configured_device() {
        let config = SessionConfig::new("http://x", caps(json!({ "appium:deviceName": "emulator-5554" })));
        assert!(config.validate().is_ok());
        assert_eq!(config.device_name(), Some("emulator-5554"));
    }

    #[test]
    fn test_validate_rejects_placeholder_and_missing() {
        let placeholder = SessionConfig::new("http://x", caps(default_capabilities(None)));
        let err = placeholder.validate().unwrap_err();
        assert!(err.to_string().contains("placeholder"));
        assert_eq!(placeholder.device_name(), None);

        let missing = SessionConfig::new("http://x", Map::new());
        assert!(matches!(missing.validate(), Err(Error::ConfigInvalid(_))));

        let empty = SessionConfig::new("http://x", caps(json!({ "deviceName": "  " })));
        assert!(matches!(empty.validate(), Err(Error::ConfigInvalid(_))));
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("capabilities.json");
        std::fs::write(&path, r#"{"appium:deviceName": "R58M", "appium:noReset": true}"#).unwrap();
        let config = SessionConfig::load("http://localhost:4723", &path).unwrap();
        assert_eq!(config.device_name(), Some("R58M"));
        assert_eq!(config.capabilities["platformName"], "Android");

        std::fs::write(&path, "[1, 2]").unwrap();
        assert!(matches!(
            SessionConfig::load("http://x", &path),
            Err(Error::ConfigInvalid(_))
        ));
    }
}
