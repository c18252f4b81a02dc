//! CLI command definitions
//!
//! Defines the clap commands for the uitest CLI.

use clap::Subcommand;
use std::path::PathBuf;

#[derive(Subcommand)]
pub enum Commands {
    /// Execute a test case (JSON, or YAML by extension)
    Run {
        /// Path to the test case file
        case: PathBuf,

        /// Print the run report as JSON
        #[arg(long)]
        json: bool,
    },

    /// List the available actions and their parameters
    Actions {
        /// Output the catalog as JSON
        #[arg(long)]
        json: bool,
    },

    /// Check the automation environment without opening a session
    Doctor {
        /// Output results as JSON
        #[arg(long)]
        json: bool,
    },

    /// Write a default capabilities file
    Init {
        /// Device serial to put in the capabilities
        #[arg(long, conflicts_with = "detect_device")]
        device: Option<String>,

        /// Use the first authorized device reported by adb
        #[arg(long)]
        detect_device: bool,

        /// Overwrite an existing capabilities file
        #[arg(long)]
        force: bool,
    },
}
