//! CLI command handling
//!
//! Dispatches CLI commands and formats their output. Every handler returns
//! whether the command succeeded; the binary turns `false` into exit code 1.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use colored::Colorize;
use tokio_util::sync::CancellationToken;

use crate::actions::ActionRegistry;
use crate::commands::Commands;
use crate::common::config::{Config, PreflightSettings};
use crate::common::{Error, Result};
use crate::session::config::default_capabilities;
use crate::session::device::{find_adb, first_authorized_device, list_devices};
use crate::session::preflight::{diagnose, standard_checks};
use crate::session::{SessionConfig, SessionManager};
use crate::testing::{RunOrchestrator, TestCase};

/// Dispatch a CLI command
pub async fn dispatch(command: Commands, config: &Config) -> Result<bool> {
    match command {
        Commands::Run { case, json } => run_case(config, &case, json).await,
        Commands::Actions { json } => list_actions(json),
        Commands::Doctor { json } => doctor(config, json).await,
        Commands::Init {
            device,
            detect_device,
            force,
        } => init(config, device, detect_device, force).await,
    }
}

fn capabilities_file(config: &Config) -> Result<PathBuf> {
    config.capabilities_file().ok_or_else(|| {
        Error::ConfigInvalid(
            "no capabilities file configured and no config directory available".to_string(),
        )
    })
}

fn load_session_config(config: &Config) -> Result<SessionConfig> {
    let path = capabilities_file(config)?;
    if !path.exists() {
        return Err(Error::ConfigInvalid(format!(
            "capabilities file {} not found. Run 'uitest init' to create one",
            path.display()
        )));
    }
    SessionConfig::load(config.session.server_url.clone(), &path)
}

async fn run_case(config: &Config, path: &Path, json: bool) -> Result<bool> {
    let case = TestCase::load(path)?;
    let session_config = load_session_config(config)?;

    let manager = Arc::new(SessionManager::from_config(config));
    let orchestrator = Arc::new(RunOrchestrator::from_config(
        manager,
        session_config,
        config,
    ));

    let cancel = CancellationToken::new();
    let interrupt = {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::warn!("Interrupted, stopping after the current step");
                cancel.cancel();
            }
        })
    };

    let report = orchestrator
        .spawn(case, cancel)
        .await
        .map_err(|e| Error::Internal(format!("run task failed: {}", e)))?;
    interrupt.abort();

    if json {
        println!("{}", report.to_json()?);
    } else {
        report.print();
    }
    Ok(report.passed())
}

fn list_actions(json: bool) -> Result<bool> {
    let catalog = ActionRegistry::builtin().catalog();

    if json {
        println!("{}", serde_json::to_string_pretty(&catalog)?);
        return Ok(true);
    }

    println!("{}", "Actions:".cyan());
    for action in &catalog {
        println!("\n  {} {}", action.name.white().bold(), action.summary.dimmed());
        if !action.aliases.is_empty() {
            println!("    {} {}", "also:".dimmed(), action.aliases.join(", "));
        }
        for param in action.params {
            let qualifier = match (param.required, param.default) {
                (true, _) => "required".to_string(),
                (false, Some(default)) => format!(
                    "default {}",
                    serde_json::to_string(&default).unwrap_or_default()
                ),
                (false, None) => "optional".to_string(),
            };
            println!(
                "    {:12} {:8} {:16} {}",
                param.name,
                param.ty.to_string(),
                qualifier,
                param.description.dimmed()
            );
        }
    }
    Ok(true)
}

async fn doctor(config: &Config, json: bool) -> Result<bool> {
    let session_config = load_session_config(config);

    // Diagnostics run every check, regardless of what a run is configured to skip.
    // Capabilities can only be validated once they load.
    let settings = PreflightSettings {
        check_config: session_config.is_ok(),
        adb_path: config.preflight.adb_path.clone(),
        ..Default::default()
    };
    let (target, capabilities_error) = match session_config {
        Ok(session_config) => (session_config, None),
        Err(e) => (
            SessionConfig::new(config.session.server_url.clone(), Default::default()),
            Some(e.to_string()),
        ),
    };
    let outcomes = diagnose(&standard_checks(&settings), &target).await;

    let devices = match find_adb(settings.adb_path.as_deref()) {
        Some(adb) => list_devices(&adb).await.unwrap_or_default(),
        None => Vec::new(),
    };

    let passed = capabilities_error.is_none() && outcomes.iter().all(|o| o.passed);

    if json {
        let value = serde_json::json!({
            "server_url": config.session.server_url,
            "checks": outcomes,
            "capabilities_error": capabilities_error,
            "devices": devices
                .iter()
                .map(|d| serde_json::json!({
                    "serial": d.serial,
                    "authorized": d.is_authorized(),
                }))
                .collect::<Vec<_>>(),
            "passed": passed,
        });
        println!("{}", serde_json::to_string_pretty(&value)?);
        return Ok(passed);
    }

    println!("{} {}", "Automation server:".cyan(), config.session.server_url);
    for outcome in &outcomes {
        match &outcome.message {
            None => println!("  {} {}", "✓".green(), outcome.name),
            Some(message) => println!("  {} {}: {}", "✗".red(), outcome.name, message),
        }
    }
    if let Some(error) = &capabilities_error {
        println!("  {} capabilities: {}", "✗".red(), error);
    }

    if !devices.is_empty() {
        println!("\n{}", "Devices:".cyan());
        for device in &devices {
            let marker = if device.is_authorized() { "✓".green() } else { "✗".red() };
            println!("  {} {:24} {:?}", marker, device.serial, device.state);
        }
    }

    Ok(passed)
}

async fn init(
    config: &Config,
    device: Option<String>,
    detect_device: bool,
    force: bool,
) -> Result<bool> {
    let path = capabilities_file(config)?;
    if path.exists() && !force {
        return Err(Error::ConfigInvalid(format!(
            "{} already exists. Use --force to overwrite",
            path.display()
        )));
    }

    let device = if detect_device {
        let adb = find_adb(config.preflight.adb_path.as_deref())
            .ok_or_else(|| Error::unreachable("adb", "not found in PATH"))?;
        let detected = first_authorized_device(&adb)
            .await?
            .ok_or_else(|| Error::unreachable("Android device", "no authorized device found"))?;
        println!("Detected device {}", detected.green());
        Some(detected)
    } else {
        device
    };

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let capabilities = default_capabilities(device.as_deref());
    std::fs::write(&path, serde_json::to_string_pretty(&capabilities)?)?;
    tracing::info!(path = %path.display(), "Wrote capabilities file");

    println!("Capabilities written to {}", path.display());
    if device.is_none() {
        println!(
            "Edit 'appium:deviceName' or rerun with {} before running tests.",
            "--detect-device".bold()
        );
    }
    Ok(true)
}
