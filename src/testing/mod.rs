//! Test execution
//!
//! Loads test cases, interprets their steps against a live session and
//! aggregates the outcome into a report.

mod config;
mod interpreter;
mod report;
mod runner;

pub use config::{Step, TestCase};
pub use interpreter::StepInterpreter;
pub use report::{OverallStatus, RunLog, RunReport, StepResult, StepStatus};
pub use runner::RunOrchestrator;
