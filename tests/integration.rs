//! End-to-end tests for the uitest CLI
//!
//! These tests run the built binary against isolated config directories.
//! No automation server or device is needed: runs are pointed at a closed
//! local port so the session setup path is exercised deterministically.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use serde_json::Value;

/// Closed port on the loopback interface
const DEAD_SERVER: &str = "http://127.0.0.1:9";

/// Test context with an isolated config directory
struct TestContext {
    /// Temporary directory for this test
    temp_dir: tempfile::TempDir,
    /// Config directory (XDG_CONFIG_HOME)
    config_dir: PathBuf,
}

impl TestContext {
    fn new() -> Self {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
        let config_dir = temp_dir.path().join("config");
        fs::create_dir_all(&config_dir).expect("Failed to create config dir");
        Self {
            temp_dir,
            config_dir,
        }
    }

    fn path(&self, name: &str) -> PathBuf {
        self.temp_dir.path().join(name)
    }

    fn capabilities_path(&self) -> PathBuf {
        self.path("capabilities.json")
    }

    /// Write a config file pointing at the dead server
    fn create_config(&self, preflight: &str) -> PathBuf {
        let content = format!(
            r#"
[session]
server_url = "{server}"
capabilities_file = "{caps}"

[timeouts]
connect_secs = 5
request_secs = 5
settle_ms = 0

[preflight]
{preflight}

[actions]
reports_dir = "{reports}"
"#,
            server = DEAD_SERVER,
            caps = self.capabilities_path().display(),
            preflight = preflight,
            reports = self.path("reports").display(),
        );
        let path = self.path("config.toml");
        fs::write(&path, content).expect("Failed to write config");
        path
    }

    fn write_capabilities(&self, device: &str) {
        let caps = serde_json::json!({
            "platformName": "Android",
            "appium:automationName": "UiAutomator2",
            "appium:deviceName": device,
        });
        fs::write(self.capabilities_path(), caps.to_string()).expect("Failed to write capabilities");
    }

    fn write_case(&self, name: &str, content: &str) -> PathBuf {
        let path = self.path(name);
        fs::write(&path, content).expect("Failed to write test case");
        path
    }

    fn run(&self, args: &[&str]) -> CliOutput {
        let output = Command::new(env!("CARGO_BIN_EXE_uitest"))
            .args(args)
            .env("XDG_CONFIG_HOME", &self.config_dir)
            .env("HOME", self.temp_dir.path())
            .env_remove("RUST_LOG")
            .output()
            .expect("Failed to run uitest");

        CliOutput {
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
            success: output.status.success(),
            code: output.status.code(),
        }
    }
}

/// Output from a CLI invocation
#[derive(Debug)]
struct CliOutput {
    stdout: String,
    stderr: String,
    success: bool,
    code: Option<i32>,
}

impl CliOutput {
    fn json(&self) -> Value {
        serde_json::from_str(&self.stdout)
            .unwrap_or_else(|e| panic!("stdout is not JSON ({}):\n{}\nstderr: {}", e, self.stdout, self.stderr))
    }
}

fn path_arg(path: &Path) -> &str {
    path.to_str().expect("temp paths are UTF-8")
}

// ============== Tests ==============

#[test]
fn test_actions_json_lists_catalog() {
    let ctx = TestContext::new();
    let output = ctx.run(&["actions", "--json"]);
    assert!(output.success, "stderr: {}", output.stderr);

    let catalog = output.json();
    let names: Vec<_> = catalog
        .as_array()
        .unwrap()
        .iter()
        .map(|a| a["name"].as_str().unwrap().to_string())
        .collect();
    for expected in [
        "launchApp",
        "click",
        "typeText",
        "waitForElement",
        "assertText",
        "pressKey",
        "screenshot",
        "wait",
    ] {
        assert!(names.iter().any(|n| n == expected), "missing {} in {:?}", expected, names);
    }

    let type_text = catalog
        .as_array()
        .unwrap()
        .iter()
        .find(|a| a["name"] == "typeText")
        .unwrap();
    let required: Vec<_> = type_text["params"]
        .as_array()
        .unwrap()
        .iter()
        .filter(|p| p["required"] == true)
        .map(|p| p["name"].as_str().unwrap())
        .collect();
    assert_eq!(required, ["kind", "value", "text"]);
    assert_eq!(type_text["aliases"], serde_json::json!(["input_text"]));
}

#[test]
fn test_actions_human_output() {
    let ctx = TestContext::new();
    let output = ctx.run(&["actions"]);
    assert!(output.success);
    assert!(output.stdout.contains("waitForElement"));
    assert!(output.stdout.contains("default 10"));
}

#[test]
fn test_missing_case_file() {
    let ctx = TestContext::new();
    let config = ctx.create_config("check_device = false");
    let output = ctx.run(&["run", "/nonexistent/case.json", "--config", path_arg(&config)]);
    assert_eq!(output.code, Some(1));
    assert!(output.stderr.contains("Failed to read file"), "stderr: {}", output.stderr);
}

#[test]
fn test_case_without_steps_is_rejected() {
    let ctx = TestContext::new();
    let config = ctx.create_config("check_device = false");
    let case = ctx.write_case("empty.json", r#"{"name": "Empty", "steps": []}"#);

    let output = ctx.run(&["run", path_arg(&case), "--config", path_arg(&config)]);
    assert_eq!(output.code, Some(1));
    assert!(output.stderr.contains("has no steps"), "stderr: {}", output.stderr);
}

#[test]
fn test_unreachable_server_yields_setup_failure() {
    let ctx = TestContext::new();
    let config = ctx.create_config("check_device = false");
    ctx.write_capabilities("emulator-5554");
    let case = ctx.write_case(
        "login.json",
        r#"{"name": "Login", "steps": [{"action": "click", "params": {"kind": "visible-text", "value": "Log In"}}]}"#,
    );

    let output = ctx.run(&["run", path_arg(&case), "--json", "--config", path_arg(&config)]);
    assert_eq!(output.code, Some(1), "stderr: {}", output.stderr);

    let report = output.json();
    assert_eq!(report["name"], "Login");
    assert_eq!(report["overall_status"], "failure");
    let log = report["log"].as_array().unwrap();
    assert_eq!(log.len(), 1);
    assert_eq!(log[0]["action_name"], "Setup");
    assert!(log[0]["message"]
        .as_str()
        .unwrap()
        .starts_with("EnvironmentUnreachable:"));
}

#[test]
fn test_placeholder_device_fails_validation() {
    let ctx = TestContext::new();
    let config = ctx.create_config("check_server = false\ncheck_device = false");
    ctx.write_capabilities("YOUR_DEVICE_ID");
    let case = ctx.write_case(
        "back.yaml",
        "name: Back\nsteps:\n  - action: pressKey\n    params:\n      key: BACK\n",
    );

    let output = ctx.run(&["run", path_arg(&case), "--json", "--config", path_arg(&config)]);
    assert_eq!(output.code, Some(1));
    let report = output.json();
    let message = report["log"][0]["message"].as_str().unwrap();
    assert!(message.starts_with("ConfigInvalid:"), "message: {}", message);
    assert!(message.contains("placeholder"));
}

#[test]
fn test_missing_capabilities_points_to_init() {
    let ctx = TestContext::new();
    let config = ctx.create_config("check_device = false");
    let case = ctx.write_case("wait.json", r#"{"name": "Wait", "steps": [{"action": "wait", "params": {"seconds": 0}}]}"#);

    let output = ctx.run(&["run", path_arg(&case), "--config", path_arg(&config)]);
    assert_eq!(output.code, Some(1));
    assert!(output.stderr.contains("uitest init"), "stderr: {}", output.stderr);
}

#[test]
fn test_init_writes_capabilities() {
    let ctx = TestContext::new();
    let config = ctx.create_config("");

    let output = ctx.run(&["init", "--device", "R58M123ABC", "--config", path_arg(&config)]);
    assert!(output.success, "stderr: {}", output.stderr);

    let caps: Value = serde_json::from_str(&fs::read_to_string(ctx.capabilities_path()).unwrap()).unwrap();
    assert_eq!(caps["appium:deviceName"], "R58M123ABC");
    assert_eq!(caps["platformName"], "Android");

    let again = ctx.run(&["init", "--config", path_arg(&config)]);
    assert!(!again.success);
    assert!(again.stderr.contains("--force"));

    let forced = ctx.run(&["init", "--force", "--config", path_arg(&config)]);
    assert!(forced.success);
    let caps: Value = serde_json::from_str(&fs::read_to_string(ctx.capabilities_path()).unwrap()).unwrap();
    assert_eq!(caps["appium:deviceName"], "YOUR_DEVICE_ID");
}

#[test]
fn test_doctor_reports_dead_server() {
    let ctx = TestContext::new();
    let config = ctx.create_config("adb_path = \"/nonexistent/adb\"");
    ctx.write_capabilities("emulator-5554");

    let output = ctx.run(&["doctor", "--json", "--config", path_arg(&config)]);
    assert_eq!(output.code, Some(1));

    let report = output.json();
    assert_eq!(report["passed"], false);
    let checks = report["checks"].as_array().unwrap();
    let server = checks.iter().find(|c| c["name"] == "automation server").unwrap();
    assert_eq!(server["passed"], false);
    let caps = checks.iter().find(|c| c["name"] == "capabilities").unwrap();
    assert_eq!(caps["passed"], true);
}

#[test]
fn test_invalid_config_file() {
    let ctx = TestContext::new();
    let config = ctx.path("broken.toml");
    fs::write(&config, "[session\nserver_url = 1").unwrap();

    let output = ctx.run(&["actions", "--config", path_arg(&config)]);
    assert_eq!(output.code, Some(1));
    assert!(output.stderr.contains("Invalid configuration file"));
}
