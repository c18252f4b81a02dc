//! Action registry
//!
//! Maps action names to definitions. The builtin registry is built once,
//! from the static catalog table, the first time it is requested.

use std::collections::HashMap;
use std::time::Duration;

use futures_util::future::BoxFuture;
use once_cell::sync::Lazy;
use serde::Serialize;

use crate::common::config::ActionSettings;
use crate::common::{Error, Result};
use crate::driver::AutomationDriver;

use super::params::ParamSpec;

/// What an action decided about the step
///
/// `Failed` means the check itself failed (element missing, wrong text);
/// it is an expected outcome. Problems that stop the action from
/// completing at all are returned as `Err` instead.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActionOutcome {
    Passed(String),
    Failed(String),
}

impl ActionOutcome {
    pub fn passed(message: impl Into<String>) -> Self {
        Self::Passed(message.into())
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self::Failed(message.into())
    }

    pub fn is_passed(&self) -> bool {
        matches!(self, Self::Passed(_))
    }

    pub fn message(&self) -> &str {
        match self {
            Self::Passed(m) | Self::Failed(m) => m,
        }
    }
}

/// Everything a handler may use while running
pub struct ActionContext<'a> {
    pub driver: &'a dyn AutomationDriver,
    pub settings: &'a ActionSettings,
}

impl ActionContext<'_> {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.settings.poll_interval_ms.max(1))
    }

    /// Pause after an interaction so the UI can react
    pub async fn pause(&self) {
        if self.settings.interaction_pause_ms > 0 {
            tokio::time::sleep(Duration::from_millis(self.settings.interaction_pause_ms)).await;
        }
    }
}

/// Entry point of an action
pub type Handler = for<'a> fn(
    &'a ActionContext<'a>,
    &'a super::params::Params,
) -> BoxFuture<'a, Result<ActionOutcome>>;

/// A registered action
pub struct ActionDefinition {
    pub name: &'static str,
    /// Other names the action can be looked up by
    pub aliases: &'static [&'static str],
    pub summary: &'static str,
    pub params: &'static [ParamSpec],
    pub handler: Handler,
}

impl std::fmt::Debug for ActionDefinition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActionDefinition")
            .field("name", &self.name)
            .field("params", &self.params.len())
            .finish()
    }
}

/// Read-only description of an action for pickers and docs
#[derive(Debug, Clone, Serialize)]
pub struct ActionInfo {
    pub name: &'static str,
    #[serde(skip_serializing_if = "no_aliases")]
    pub aliases: &'static [&'static str],
    pub summary: &'static str,
    pub params: &'static [ParamSpec],
}

fn no_aliases(aliases: &&'static [&'static str]) -> bool {
    aliases.is_empty()
}

/// Lookup table from action name to definition
#[derive(Debug, Default)]
pub struct ActionRegistry {
    actions: HashMap<&'static str, &'static ActionDefinition>,
    order: Vec<&'static str>,
}

static BUILTIN: Lazy<ActionRegistry> = Lazy::new(|| {
    let mut registry = ActionRegistry::default();
    for definition in super::builtin::CATALOG {
        if let Err(e) = registry.register(definition) {
            // Only reachable if the static table itself is malformed
            tracing::error!(error = %e, "Skipping builtin action");
        }
    }
    registry
});

impl ActionRegistry {
    /// The registry of builtin actions
    pub fn builtin() -> &'static ActionRegistry {
        &BUILTIN
    }

    /// Add a definition; names and aliases must be unique
    pub fn register(&mut self, definition: &'static ActionDefinition) -> Result<()> {
        let names = std::iter::once(definition.name).chain(definition.aliases.iter().copied());
        for name in names.clone() {
            if self.actions.contains_key(name) {
                return Err(Error::Internal(format!("action '{}' registered twice", name)));
            }
        }
        for name in names {
            self.actions.insert(name, definition);
        }
        self.order.push(definition.name);
        Ok(())
    }

    pub fn lookup(&self, name: &str) -> Result<&'static ActionDefinition> {
        self.actions
            .get(name)
            .copied()
            .ok_or_else(|| Error::ActionNotFound(name.to_string()))
    }

    /// Catalog metadata in registration order
    pub fn catalog(&self) -> Vec<ActionInfo> {
        self.order
            .iter()
            .filter_map(|name| self.actions.get(name))
            .map(|def| ActionInfo {
                name: def.name,
                aliases: def.aliases,
                summary: def.summary,
                params: def.params,
            })
            .collect()
    }

    /// Number of registered actions, not counting aliases
    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_lookup() {
        let registry = ActionRegistry::builtin();
        assert!(!registry.is_empty());
        assert_eq!(registry.lookup("click").unwrap().name, "click");
        assert!(matches!(
            registry.lookup("clickk"),
            Err(Error::ActionNotFound(ref n)) if n == "clickk"
        ));
    }

    #[test]
    fn test_aliases_resolve_to_the_same_action() {
        let registry = ActionRegistry::builtin();
        let click = registry.lookup("click").unwrap();
        assert!(std::ptr::eq(registry.lookup("click_element").unwrap(), click));
        assert_eq!(registry.lookup("wait_seconds").unwrap().name, "wait");
        assert_eq!(registry.lookup("press_android_key").unwrap().name, "pressKey");
        assert_eq!(registry.len(), super::super::builtin::CATALOG.len());
    }

    #[test]
    fn test_builtin_is_built_once() {
        assert!(std::ptr::eq(ActionRegistry::builtin(), ActionRegistry::builtin()));
    }

    #[test]
    fn test_duplicate_registration_rejected() {
        let mut registry = ActionRegistry::default();
        let click = ActionRegistry::builtin().lookup("click").unwrap();
        registry.register(click).unwrap();
        assert!(matches!(registry.register(click), Err(Error::Internal(_))));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_catalog_preserves_table_order() {
        let names: Vec<_> = ActionRegistry::builtin()
            .catalog()
            .iter()
            .map(|a| a.name)
            .collect();
        let table: Vec<_> = super::super::builtin::CATALOG.iter().map(|d| d.name).collect();
        assert_eq!(names, table);
    }

    #[test]
    fn test_catalog_serializes_contracts() {
        let catalog = serde_json::to_value(ActionRegistry::builtin().catalog()).unwrap();
        let click = catalog
            .as_array()
            .unwrap()
            .iter()
            .find(|a| a["name"] == "click")
            .unwrap();
        let timeout = click["params"]
            .as_array()
            .unwrap()
            .iter()
            .find(|p| p["name"] == "timeout")
            .unwrap();
        assert_eq!(timeout["type"], "integer");
        assert_eq!(timeout["required"], false);
        assert_eq!(timeout["default"], 10);
    }
}
