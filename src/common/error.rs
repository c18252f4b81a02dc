//! Error types for the test runner
//!
//! Error messages are meant to be actionable: environment problems carry a
//! hint on how the operator can fix them, authoring problems name the step
//! and parameter at fault.

use std::io;
use thiserror::Error;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the test runner
#[derive(Error, Debug)]
pub enum Error {
    // === Configuration Errors ===
    #[error("Invalid configuration: {0}")]
    ConfigInvalid(String),

    #[error("Invalid configuration file: {0}")]
    ConfigParse(String),

    // === Environment Errors ===
    #[error("{target} is not reachable: {hint}")]
    EnvironmentUnreachable { target: String, hint: String },

    #[error("Connection refused by automation server at {0}. Is the server running?")]
    ConnectionRefused(String),

    #[error("Timed out after {secs} seconds connecting to automation server at {url}")]
    ConnectionTimeout { url: String, secs: u64 },

    #[error("Automation server rejected the session: {0}")]
    SessionRejected(String),

    // === Session Errors ===
    #[error("An automation session is already active. Release it before acquiring another")]
    SessionAlreadyActive,

    // === Step Errors ===
    #[error("unknown action '{0}'")]
    ActionNotFound(String),

    #[error("bad parameters for '{action}': {reason}")]
    ParameterMismatch { action: String, reason: String },

    #[error("action '{action}' could not complete: {reason}")]
    ActionRuntimeFailure { action: String, reason: String },

    // === Selector Errors ===
    #[error("invalid selector kind '{0}'")]
    InvalidSelectorKind(String),

    #[error("invalid selector: {0}")]
    InvalidSelector(String),

    // === Remote Errors ===
    #[error("Automation server error: {0}")]
    Driver(String),

    #[error("Operation timed out after {0} seconds")]
    Timeout(u64),

    // === IO Errors ===
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Failed to read file '{path}': {error}")]
    FileRead { path: String, error: String },

    // === Serialization Errors ===
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    // === Internal Errors ===
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Create an environment unreachable error with an operator hint
    pub fn unreachable(target: &str, hint: impl Into<String>) -> Self {
        Self::EnvironmentUnreachable {
            target: target.to_string(),
            hint: hint.into(),
        }
    }

    /// Create a parameter mismatch error
    pub fn parameter_mismatch(action: &str, reason: impl Into<String>) -> Self {
        Self::ParameterMismatch {
            action: action.to_string(),
            reason: reason.into(),
        }
    }

    /// Create an action runtime failure
    pub fn runtime_failure(action: &str, reason: impl Into<String>) -> Self {
        Self::ActionRuntimeFailure {
            action: action.to_string(),
            reason: reason.into(),
        }
    }

    /// Stable machine-readable name of the error kind
    pub fn code(&self) -> &'static str {
        match self {
            Error::ConfigInvalid(_) | Error::ConfigParse(_) => "ConfigInvalid",
            Error::EnvironmentUnreachable { .. } => "EnvironmentUnreachable",
            Error::ConnectionRefused(_) => "ConnectionRefused",
            Error::ConnectionTimeout { .. } => "ConnectionTimeout",
            Error::SessionRejected(_) => "SessionRejected",
            Error::SessionAlreadyActive => "SessionAlreadyActive",
            Error::ActionNotFound(_) => "ActionNotFound",
            Error::ParameterMismatch { .. } => "ParameterMismatch",
            Error::ActionRuntimeFailure { .. } => "ActionRuntimeFailure",
            Error::InvalidSelectorKind(_) => "InvalidSelectorKind",
            Error::InvalidSelector(_) => "InvalidSelector",
            Error::Driver(_) => "DriverError",
            Error::Timeout(_) => "Timeout",
            Error::Io(_) | Error::FileRead { .. } => "IoError",
            Error::Json(_) => "JsonError",
            Error::Internal(_) => "InternalError",
        }
    }

    /// Whether this error aborts the remaining steps of a run
    pub fn is_fatal(&self) -> bool {
        !matches!(self, Error::ActionNotFound(_))
    }

    /// Message prefixed with the error code, as recorded in step results
    pub fn describe(&self) -> String {
        format!("{}: {}", self.code(), self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_describe_carries_code() {
        let e = Error::ActionNotFound("clickk".to_string());
        assert_eq!(e.describe(), "ActionNotFound: unknown action 'clickk'");
    }

    #[test]
    fn test_only_missing_actions_are_step_local() {
        assert!(!Error::ActionNotFound("x".into()).is_fatal());
        assert!(Error::parameter_mismatch("click", "missing 'value'").is_fatal());
        assert!(Error::runtime_failure("click", "lost connection").is_fatal());
    }

    #[test]
    fn test_config_errors_share_code() {
        assert_eq!(Error::ConfigParse("x".into()).code(), "ConfigInvalid");
        assert_eq!(Error::ConfigInvalid("x".into()).code(), "ConfigInvalid");
    }
}
