//! uitest - declarative UI-automation test runner
//!
//! Runs JSON/YAML test cases against an Android device through an
//! Appium/WebDriver server and reports a per-step run log.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use commands::Commands;
use uitest::common::config::Config;
use uitest::common::logging;
use uitest::{cli, commands};

#[derive(Parser)]
#[command(name = "uitest", about = "Declarative UI-automation test runner")]
#[command(version, long_about = None)]
struct Cli {
    /// Configuration file (default: config.toml in the config directory)
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Also write logs to a file; without a path, the default log location is used
    #[arg(long, global = true, value_name = "PATH", num_args = 0..=1)]
    log_file: Option<Option<PathBuf>>,

    #[command(subcommand)]
    command: Commands,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let log_file = match cli.log_file {
        Some(Some(path)) => Some(path),
        Some(None) => logging::default_log_path(),
        None => None,
    };
    let _log_guard = logging::init_cli(log_file.as_deref());

    let config = match &cli.config {
        Some(path) => Config::load_from(path),
        None => Config::load(),
    };

    let result = match config {
        Ok(config) => cli::dispatch(cli.command, &config).await,
        Err(e) => Err(e),
    };

    match result {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}
