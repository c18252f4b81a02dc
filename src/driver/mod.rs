//! Remote automation capability
//!
//! The engine talks to the device under test only through the
//! [`AutomationDriver`] trait. [`webdriver::WebDriverClient`] implements it
//! against an Appium/W3C WebDriver server over HTTP.

pub mod webdriver;

use async_trait::async_trait;

use crate::common::Result;
use crate::selector::Query;

pub use webdriver::{WebDriverClient, WebDriverConnector};

/// Opaque reference to an element found by the remote side
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ElementId(pub String);

/// Commands an automation session accepts
///
/// Transport or protocol problems are reported as `Err`; an element that
/// simply is not on screen is `Ok(None)` from [`find_element`].
///
/// [`find_element`]: AutomationDriver::find_element
#[async_trait]
pub trait AutomationDriver: Send + Sync {
    /// Remote session identifier
    fn session_id(&self) -> &str;

    /// Locate the first element matching the query
    async fn find_element(&self, query: &Query) -> Result<Option<ElementId>>;

    async fn is_displayed(&self, element: &ElementId) -> Result<bool>;

    async fn is_enabled(&self, element: &ElementId) -> Result<bool>;

    async fn click(&self, element: &ElementId) -> Result<()>;

    async fn send_keys(&self, element: &ElementId, text: &str) -> Result<()>;

    async fn element_text(&self, element: &ElementId) -> Result<String>;

    /// Launch an app or bring it to the foreground
    async fn activate_app(&self, app_id: &str) -> Result<()>;

    /// Package of the app currently in the foreground
    async fn current_package(&self) -> Result<String>;

    async fn press_keycode(&self, keycode: u32) -> Result<()>;

    /// PNG bytes of the current screen
    async fn screenshot(&self) -> Result<Vec<u8>>;

    /// End the remote session
    async fn quit(&self) -> Result<()>;
}

/// Opens remote sessions
#[async_trait]
pub trait Connector: Send + Sync {
    /// Open a session with the given server and capabilities
    async fn connect(
        &self,
        server_url: &str,
        capabilities: &serde_json::Map<String, serde_json::Value>,
    ) -> Result<Box<dyn AutomationDriver>>;
}

#[cfg(test)]
pub(crate) mod scripted;
