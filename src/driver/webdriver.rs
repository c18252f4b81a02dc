//! WebDriver client for Appium servers
//!
//! Speaks the W3C WebDriver HTTP protocol plus the Appium device
//! extensions the builtin actions need. Every reply has the shape
//! `{"value": ...}`; failures carry `{"value": {"error": ..., "message": ...}}`.

use std::time::Duration;

use async_trait::async_trait;
use base64::Engine;
use reqwest::Method;
use serde::Deserialize;
use serde_json::{json, Map, Value};

use crate::common::{Error, Result};
use crate::selector::Query;

use super::{AutomationDriver, Connector, ElementId};

/// W3C element reference key
const ELEMENT_KEY: &str = "element-6066-11e4-a52e-4f735466cecf";
/// Pre-W3C element reference key, still sent by some servers
const LEGACY_ELEMENT_KEY: &str = "ELEMENT";

/// Error payload of a failed WebDriver command
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct RemoteError {
    pub error: String,
    #[serde(default)]
    pub message: String,
}

impl RemoteError {
    fn is_no_such_element(&self) -> bool {
        self.error == "no such element"
    }
}

impl std::fmt::Display for RemoteError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.message.is_empty() {
            write!(f, "{}", self.error)
        } else {
            write!(f, "{}: {}", self.error, self.message)
        }
    }
}

/// Split a reply body into its value or the remote error it describes
pub fn parse_reply(success: bool, body: Value) -> std::result::Result<Value, RemoteError> {
    let value = match body {
        Value::Object(mut obj) => obj.remove("value").unwrap_or(Value::Null),
        other => other,
    };

    let remote_error = value
        .get("error")
        .and_then(|e| e.as_str())
        .map(|_| serde_json::from_value::<RemoteError>(value.clone()));

    match remote_error {
        Some(Ok(err)) => Err(err),
        _ if !success => Err(RemoteError {
            error: "unknown error".to_string(),
            message: value.to_string(),
        }),
        _ => Ok(value),
    }
}

/// Extract an element reference from a find-element reply value
pub fn parse_element(value: &Value) -> Option<ElementId> {
    value
        .get(ELEMENT_KEY)
        .or_else(|| value.get(LEGACY_ELEMENT_KEY))
        .and_then(|v| v.as_str())
        .map(|s| ElementId(s.to_string()))
}

/// Extract the session id from a new-session reply body
///
/// W3C servers nest it under `value`; older servers put it at the top level.
pub fn parse_session_id(body: &Value) -> Option<String> {
    body.get("value")
        .and_then(|v| v.get("sessionId"))
        .or_else(|| body.get("sessionId"))
        .and_then(|v| v.as_str())
        .map(String::from)
}

/// Build the new-session request body from flat capabilities
pub fn new_session_body(capabilities: &Map<String, Value>) -> Value {
    json!({
        "capabilities": {
            "alwaysMatch": capabilities,
            "firstMatch": [{}]
        }
    })
}

/// Opens WebDriver sessions
pub struct WebDriverConnector {
    connect_timeout: Duration,
    request_timeout: Duration,
}

impl WebDriverConnector {
    pub fn new(connect_timeout: Duration, request_timeout: Duration) -> Self {
        Self {
            connect_timeout,
            request_timeout,
        }
    }
}

#[async_trait]
impl Connector for WebDriverConnector {
    #[tracing::instrument(skip(self, capabilities))]
    async fn connect(
        &self,
        server_url: &str,
        capabilities: &Map<String, Value>,
    ) -> Result<Box<dyn AutomationDriver>> {
        let base = server_url.trim_end_matches('/').to_string();
        let http = reqwest::Client::builder()
            .user_agent(concat!("uitest/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| Error::Internal(format!("Failed to build HTTP client: {}", e)))?;

        let url = format!("{}/session", base);
        let body = new_session_body(capabilities);
        tracing::debug!(%url, body = %body, "Creating remote session");

        let response = http
            .post(&url)
            .timeout(self.connect_timeout)
            .json(&body)
            .send()
            .await
            .map_err(|e| classify_connect_error(&base, self.connect_timeout, e))?;

        let success = response.status().is_success();
        let text = response
            .text()
            .await
            .map_err(|e| classify_connect_error(&base, self.connect_timeout, e))?;
        let reply: Value = serde_json::from_str(&text).unwrap_or(Value::String(text));

        if !success {
            let reason = match parse_reply(false, reply) {
                Err(err) => err.to_string(),
                Ok(v) => v.to_string(),
            };
            return Err(Error::SessionRejected(reason));
        }

        let session_id = parse_session_id(&reply).ok_or_else(|| {
            Error::SessionRejected(format!("reply carried no session id: {}", reply))
        })?;

        tracing::info!(session_id = %session_id, "Remote session created");

        Ok(Box::new(WebDriverClient {
            http,
            base,
            session_id,
            request_timeout: self.request_timeout,
        }))
    }
}

fn classify_connect_error(url: &str, timeout: Duration, e: reqwest::Error) -> Error {
    if e.is_timeout() {
        Error::ConnectionTimeout {
            url: url.to_string(),
            secs: timeout.as_secs(),
        }
    } else if e.is_connect() {
        Error::ConnectionRefused(url.to_string())
    } else {
        Error::SessionRejected(e.to_string())
    }
}

/// A live WebDriver session
pub struct WebDriverClient {
    http: reqwest::Client,
    base: String,
    session_id: String,
    request_timeout: Duration,
}

impl WebDriverClient {
    /// Send a session command, returning the reply value or the remote error
    async fn send(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
    ) -> Result<std::result::Result<Value, RemoteError>> {
        let url = format!("{}/session/{}{}", self.base, self.session_id, path);
        tracing::debug!(%method, %url, "WebDriver request");

        let mut request = self
            .http
            .request(method.clone(), &url)
            .timeout(self.request_timeout);
        if let Some(body) = body {
            request = request.json(&body);
        }

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                Error::Timeout(self.request_timeout.as_secs())
            } else {
                Error::Driver(format!("{} {} failed: {}", method, path, e))
            }
        })?;

        let success = response.status().is_success();
        let text = response
            .text()
            .await
            .map_err(|e| Error::Driver(format!("Failed to read reply to {}: {}", path, e)))?;
        let reply: Value = serde_json::from_str(&text).unwrap_or(Value::String(text));
        tracing::debug!(%url, success, "WebDriver reply");

        Ok(parse_reply(success, reply))
    }

    /// Send a command where any remote error is fatal
    async fn command(&self, method: Method, path: &str, body: Option<Value>) -> Result<Value> {
        self.send(method, path, body)
            .await?
            .map_err(|e| Error::Driver(e.to_string()))
    }

    fn element_path(element: &ElementId, suffix: &str) -> String {
        format!("/element/{}/{}", element.0, suffix)
    }
}

#[async_trait]
impl AutomationDriver for WebDriverClient {
    fn session_id(&self) -> &str {
        &self.session_id
    }

    async fn find_element(&self, query: &Query) -> Result<Option<ElementId>> {
        let body = json!({ "using": query.using, "value": query.value });
        match self.send(Method::POST, "/element", Some(body)).await? {
            Ok(value) => parse_element(&value).map(Some).ok_or_else(|| {
                Error::Driver(format!("find element reply has no element reference: {}", value))
            }),
            Err(e) if e.is_no_such_element() => Ok(None),
            Err(e) => Err(Error::Driver(e.to_string())),
        }
    }

    async fn is_displayed(&self, element: &ElementId) -> Result<bool> {
        let value = self
            .command(Method::GET, &Self::element_path(element, "displayed"), None)
            .await?;
        Ok(value.as_bool().unwrap_or(false))
    }

    async fn is_enabled(&self, element: &ElementId) -> Result<bool> {
        let value = self
            .command(Method::GET, &Self::element_path(element, "enabled"), None)
            .await?;
        Ok(value.as_bool().unwrap_or(false))
    }

    async fn click(&self, element: &ElementId) -> Result<()> {
        self.command(Method::POST, &Self::element_path(element, "click"), Some(json!({})))
            .await?;
        Ok(())
    }

    async fn send_keys(&self, element: &ElementId, text: &str) -> Result<()> {
        self.command(
            Method::POST,
            &Self::element_path(element, "value"),
            Some(json!({ "text": text })),
        )
        .await?;
        Ok(())
    }

    async fn element_text(&self, element: &ElementId) -> Result<String> {
        let value = self
            .command(Method::GET, &Self::element_path(element, "text"), None)
            .await?;
        Ok(value.as_str().unwrap_or_default().to_string())
    }

    async fn activate_app(&self, app_id: &str) -> Result<()> {
        self.command(
            Method::POST,
            "/appium/device/activate_app",
            Some(json!({ "appId": app_id })),
        )
        .await?;
        Ok(())
    }

    async fn current_package(&self) -> Result<String> {
        let value = self
            .command(Method::GET, "/appium/device/current_package", None)
            .await?;
        Ok(value.as_str().unwrap_or_default().to_string())
    }

    async fn press_keycode(&self, keycode: u32) -> Result<()> {
        self.command(
            Method::POST,
            "/appium/device/press_keycode",
            Some(json!({ "keycode": keycode })),
        )
        .await?;
        Ok(())
    }

    async fn screenshot(&self) -> Result<Vec<u8>> {
        let value = self.command(Method::GET, "/screenshot", None).await?;
        let encoded: String = value
            .as_str()
            .ok_or_else(|| Error::Driver("screenshot reply is not a string".to_string()))?
            .chars()
            .filter(|c| !c.is_whitespace())
            .collect();
        base64::engine::general_purpose::STANDARD
            .decode(encoded)
            .map_err(|e| Error::Driver(format!("screenshot is not valid base64: {}", e)))
    }

    async fn quit(&self) -> Result<()> {
        let url = format!("{}/session/{}", self.base, self.session_id);
        tracing::debug!(%url, "Deleting remote session");
        let response = self
            .http
            .delete(&url)
            .timeout(self.request_timeout)
            .send()
            .await
            .map_err(|e| Error::Driver(format!("Failed to delete session: {}", e)))?;

        if !response.status().is_success() {
            return Err(Error::Driver(format!(
                "Delete session returned status {}",
                response.status()
            )));
        }
        Ok(())
    }
}
