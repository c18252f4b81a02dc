//! In-memory driver used by unit tests
//!
//! The "screen" is a fixed list of elements keyed by the exact query that
//! finds them. Every command is appended to a call log so tests can assert
//! on what reached the remote side.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::common::{Error, Result};
use crate::selector::Query;

use super::{AutomationDriver, Connector, ElementId};

#[derive(Debug, Clone)]
pub(crate) struct ScriptedElement {
    pub using: &'static str,
    pub value: String,
    pub text: String,
    pub displayed: bool,
    pub enabled: bool,
}

#[derive(Default)]
pub(crate) struct ScriptedState {
    pub elements: Mutex<Vec<ScriptedElement>>,
    pub calls: Mutex<Vec<String>>,
    pub package: Mutex<String>,
    pub quits: AtomicUsize,
    pub connects: AtomicUsize,
    /// Every command fails as if the connection dropped
    pub broken: std::sync::atomic::AtomicBool,
    pub quit_fails: std::sync::atomic::AtomicBool,
    /// Launching an app leaves the foreground package unchanged
    pub launch_ignored: std::sync::atomic::AtomicBool,
    /// The next command panics instead of answering
    pub panics: std::sync::atomic::AtomicBool,
}

impl ScriptedState {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn add_element(&self, using: &'static str, value: &str, text: &str) {
        self.push(ScriptedElement {
            using,
            value: value.to_string(),
            text: text.to_string(),
            displayed: true,
            enabled: true,
        });
    }

    pub fn push(&self, element: ScriptedElement) {
        self.elements.lock().unwrap().push(element);
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn quits(&self) -> usize {
        self.quits.load(Ordering::SeqCst)
    }

    pub fn set_broken(&self) {
        self.broken.store(true, Ordering::SeqCst);
    }
}

pub(crate) struct ScriptedDriver {
    state: Arc<ScriptedState>,
}

impl ScriptedDriver {
    pub fn new(state: Arc<ScriptedState>) -> Self {
        Self { state }
    }

    fn record(&self, call: String) -> Result<()> {
        if self.state.panics.swap(false, Ordering::SeqCst) {
            panic!("scripted driver blew up on '{}'", call);
        }
        self.state.calls.lock().unwrap().push(call);
        if self.state.broken.load(Ordering::SeqCst) {
            return Err(Error::Driver("connection reset by peer".to_string()));
        }
        Ok(())
    }

    fn element(&self, id: &ElementId) -> Result<ScriptedElement> {
        let index: usize = id
            .0
            .parse()
            .map_err(|_| Error::Driver(format!("stale element {}", id.0)))?;
        self.state
            .elements
            .lock()
            .unwrap()
            .get(index)
            .cloned()
            .ok_or_else(|| Error::Driver(format!("stale element {}", id.0)))
    }
}

#[async_trait]
impl AutomationDriver for ScriptedDriver {
    fn session_id(&self) -> &str {
        "scripted"
    }

    async fn find_element(&self, query: &Query) -> Result<Option<ElementId>> {
        self.record(format!("find {} {}", query.using, query.value))?;
        let elements = self.state.elements.lock().unwrap();
        Ok(elements
            .iter()
            .position(|e| e.using == query.using && e.value == query.value)
            .map(|i| ElementId(i.to_string())))
    }

    async fn is_displayed(&self, element: &ElementId) -> Result<bool> {
        self.record(format!("displayed {}", element.0))?;
        Ok(self.element(element)?.displayed)
    }

    async fn is_enabled(&self, element: &ElementId) -> Result<bool> {
        self.record(format!("enabled {}", element.0))?;
        Ok(self.element(element)?.enabled)
    }

    async fn click(&self, element: &ElementId) -> Result<()> {
        self.record(format!("click {}", element.0))
    }

    async fn send_keys(&self, element: &ElementId, text: &str) -> Result<()> {
        self.record(format!("keys {} {}", element.0, text))
    }

    async fn element_text(&self, element: &ElementId) -> Result<String> {
        self.record(format!("text {}", element.0))?;
        Ok(self.element(element)?.text)
    }

    async fn activate_app(&self, app_id: &str) -> Result<()> {
        self.record(format!("activate {}", app_id))?;
        if !self.state.launch_ignored.load(Ordering::SeqCst) {
            *self.state.package.lock().unwrap() = app_id.to_string();
        }
        Ok(())
    }

    async fn current_package(&self) -> Result<String> {
        self.record("current_package".to_string())?;
        Ok(self.state.package.lock().unwrap().clone())
    }

    async fn press_keycode(&self, keycode: u32) -> Result<()> {
        self.record(format!("keycode {}", keycode))
    }

    async fn screenshot(&self) -> Result<Vec<u8>> {
        self.record("screenshot".to_string())?;
        Ok(vec![0x89, b'P', b'N', b'G'])
    }

    async fn quit(&self) -> Result<()> {
        self.state.quits.fetch_add(1, Ordering::SeqCst);
        if self.state.quit_fails.load(Ordering::SeqCst) {
            return Err(Error::Driver("session already gone".to_string()));
        }
        Ok(())
    }
}

/// Connector handing out drivers over shared scripted state
pub(crate) struct ScriptedConnector {
    pub state: Arc<ScriptedState>,
    /// Error returned by the next connect attempt
    pub fail_with: Mutex<Option<Error>>,
}

impl ScriptedConnector {
    pub fn new(state: Arc<ScriptedState>) -> Self {
        Self {
            state,
            fail_with: Mutex::new(None),
        }
    }
}

#[async_trait]
impl Connector for ScriptedConnector {
    async fn connect(
        &self,
        _server_url: &str,
        _capabilities: &Map<String, Value>,
    ) -> Result<Box<dyn AutomationDriver>> {
        self.state.connects.fetch_add(1, Ordering::SeqCst);
        if let Some(err) = self.fail_with.lock().unwrap().take() {
            return Err(err);
        }
        Ok(Box::new(ScriptedDriver::new(self.state.clone())))
    }
}
