//! Test case types
//!
//! Defines the data structures for deserializing test cases. JSON is the
//! native format; files ending in `.yaml` or `.yml` are read as YAML.

use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::common::{Error, Result};

/// A named, ordered list of steps
#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct TestCase {
    /// Name of the test case
    pub name: String,
    /// The sequence of steps to execute
    #[serde(default)]
    pub steps: Vec<Step>,
}

/// A single step in the execution flow
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
pub struct Step {
    /// Action name as registered in the catalog
    #[serde(default)]
    pub action: String,
    /// Raw parameters, checked against the action's contract at run time
    #[serde(default)]
    pub params: Map<String, Value>,
    /// Free text for the author; never interpreted
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

impl Step {
    pub fn new(action: impl Into<String>, params: Value) -> Self {
        Self {
            action: action.into(),
            params: match params {
                Value::Object(map) => map,
                _ => Map::new(),
            },
            notes: None,
        }
    }
}

impl TestCase {
    /// Load a test case from a JSON or YAML file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| Error::FileRead {
            path: path.display().to_string(),
            error: e.to_string(),
        })?;

        let is_yaml = matches!(
            path.extension().and_then(|e| e.to_str()),
            Some("yaml" | "yml")
        );
        let case: TestCase = if is_yaml {
            serde_yaml::from_str(&content)
                .map_err(|e| Error::ConfigParse(format!("{}: {}", path.display(), e)))?
        } else {
            serde_json::from_str(&content)
                .map_err(|e| Error::ConfigParse(format!("{}: {}", path.display(), e)))?
        };

        case.validate()?;
        Ok(case)
    }

    /// A case must have at least one step
    pub fn validate(&self) -> Result<()> {
        if self.steps.is_empty() {
            return Err(Error::ConfigInvalid(format!(
                "test case '{}' has no steps",
                self.name
            )));
        }
        Ok(())
    }
}
