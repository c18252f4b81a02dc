//! uitest - declarative UI-automation test runner
//!
//! Test cases are ordered lists of named actions. The engine resolves
//! symbolic selectors, owns the single automation session, runs each step
//! through the action registry and returns a run report.

pub mod actions;
pub mod cli;
pub mod commands;
pub mod common;
pub mod driver;
pub mod selector;
pub mod session;
pub mod testing;

// Re-export commonly used types for tests
pub use common::{Error, Result};
pub use testing::{RunOrchestrator, RunReport, Step, TestCase};
