//! Builtin actions
//!
//! [`CATALOG`] is the fixed table the builtin registry is built from. An
//! element that never shows up, or a check that does not hold, is a
//! `Failed` outcome. Selector and transport errors propagate as `Err`.

use std::time::Duration;

use futures_util::future::BoxFuture;
use tokio::time::Instant;

use crate::common::paths::sanitize_file_name;
use crate::common::Result;
use crate::driver::{AutomationDriver, ElementId};
use crate::selector::{Query, Selector};

use super::params::{Literal, ParamSpec, ParamType, Params};
use super::registry::{ActionContext, ActionDefinition, ActionOutcome};

const DEFAULT_TIMEOUT: Literal = Literal::Int(10);

const SELECTOR_KIND: ParamSpec = ParamSpec::required(
    "kind",
    ParamType::String,
    "Selector kind: accessibility-id, resource-id, xpath-expression, class-name, visible-text or platform-specific-query",
)
.alias("selector_type");
const SELECTOR_VALUE: ParamSpec =
    ParamSpec::required("value", ParamType::String, "Selector value").alias("selector_value");
const TIMEOUT: ParamSpec = ParamSpec::optional(
    "timeout",
    ParamType::Integer,
    Some(DEFAULT_TIMEOUT),
    "Seconds to wait for the element",
);

/// Every builtin action, in the order they are listed to users
///
/// Aliases keep the snake_case action and parameter names of earlier test
/// case files working.
pub static CATALOG: &[ActionDefinition] = &[
    ActionDefinition {
        name: "launchApp",
        aliases: &["launch_app_by_package"],
        summary: "Launch an app or bring it to the foreground",
        params: &[
            ParamSpec::required("package", ParamType::String, "Application package name")
                .alias("package_name"),
            ParamSpec::optional("activity", ParamType::String, None, "Activity to start (informational)")
                .alias("activity_name"),
            ParamSpec::optional(
                "settle_secs",
                ParamType::Float,
                Some(Literal::Float(5.0)),
                "Seconds to wait for the app to load",
            ),
        ],
        handler: launch_app,
    },
    ActionDefinition {
        name: "click",
        aliases: &["click_element"],
        summary: "Wait until an element is displayed and enabled, then click it",
        params: &[SELECTOR_KIND, SELECTOR_VALUE, TIMEOUT],
        handler: click,
    },
    ActionDefinition {
        name: "typeText",
        aliases: &["input_text"],
        summary: "Wait until an element is displayed, then type into it",
        params: &[
            SELECTOR_KIND,
            SELECTOR_VALUE,
            ParamSpec::required("text", ParamType::String, "Text to type").alias("text_to_input"),
            TIMEOUT,
        ],
        handler: type_text,
    },
    ActionDefinition {
        name: "waitForElement",
        aliases: &["wait_for_element"],
        summary: "Wait for an element to be present or visible",
        params: &[
            SELECTOR_KIND,
            SELECTOR_VALUE,
            TIMEOUT,
            ParamSpec::optional(
                "visible",
                ParamType::Boolean,
                Some(Literal::Bool(true)),
                "Require the element to be displayed, not just present",
            ),
        ],
        handler: wait_for_element,
    },
    ActionDefinition {
        name: "assertText",
        aliases: &[],
        summary: "Compare the text of an element with an expected value",
        params: &[
            SELECTOR_KIND,
            SELECTOR_VALUE,
            ParamSpec::required("expected", ParamType::String, "Expected text"),
            ParamSpec::optional(
                "contains",
                ParamType::Boolean,
                Some(Literal::Bool(false)),
                "Accept the expected text as a substring",
            ),
            TIMEOUT,
        ],
        handler: assert_text,
    },
    ActionDefinition {
        name: "pressKey",
        aliases: &["press_android_key"],
        summary: "Press a named Android key",
        params: &[ParamSpec::required(
            "key",
            ParamType::String,
            "BACK, HOME, ENTER, SEARCH, MENU, TAB, DEL, VOLUME_UP, VOLUME_DOWN, POWER or APP_SWITCH",
        )
        .alias("key_code_name")],
        handler: press_key,
    },
    ActionDefinition {
        name: "screenshot",
        aliases: &["take_screenshot"],
        summary: "Save a PNG of the screen to the reports directory",
        params: &[ParamSpec::required("filename", ParamType::String, "File name under the reports directory")],
        handler: screenshot,
    },
    ActionDefinition {
        name: "wait",
        aliases: &["wait_seconds"],
        summary: "Pause for a number of seconds",
        params: &[ParamSpec::required("seconds", ParamType::Float, "Seconds to wait")],
        handler: wait,
    },
];

/// Android key names and their keycodes
pub const KEYCODES: &[(&str, u32)] = &[
    ("BACK", 4),
    ("HOME", 3),
    ("ENTER", 66),
    ("SEARCH", 84),
    ("MENU", 82),
    ("TAB", 61),
    ("DEL", 67),
    ("VOLUME_UP", 24),
    ("VOLUME_DOWN", 25),
    ("POWER", 26),
    ("APP_SWITCH", 187),
];

pub fn keycode(name: &str) -> Option<u32> {
    let name = name.trim().to_ascii_uppercase();
    KEYCODES
        .iter()
        .find(|(key, _)| *key == name)
        .map(|(_, code)| *code)
}

/// What an element must be before an action may use it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Readiness {
    Present,
    Visible,
    Clickable,
}

impl Readiness {
    async fn holds(self, driver: &dyn AutomationDriver, element: &ElementId) -> Result<bool> {
        match self {
            Readiness::Present => Ok(true),
            Readiness::Visible => driver.is_displayed(element).await,
            Readiness::Clickable => {
                Ok(driver.is_displayed(element).await? && driver.is_enabled(element).await?)
            }
        }
    }
}

/// Poll until the query finds an element in the wanted state
///
/// A zero timeout makes exactly one attempt. `Ok(None)` means the deadline
/// passed without a match. A timeout too large to put on the clock polls
/// until the element shows up.
async fn poll_element(
    ctx: &ActionContext<'_>,
    query: &Query,
    timeout: Duration,
    readiness: Readiness,
) -> Result<Option<ElementId>> {
    let deadline = Instant::now().checked_add(timeout);
    loop {
        if let Some(element) = ctx.driver.find_element(query).await? {
            if readiness.holds(ctx.driver, &element).await? {
                return Ok(Some(element));
            }
        }

        let pause = match deadline {
            Some(deadline) => {
                let now = Instant::now();
                if now >= deadline {
                    return Ok(None);
                }
                ctx.poll_interval().min(deadline - now)
            }
            None => ctx.poll_interval(),
        };
        tokio::time::sleep(pause).await;
    }
}

fn selector(params: &Params) -> Result<Selector> {
    Selector::parse(params.str("kind"), params.str("value"))
}

fn timeout_secs(params: &Params) -> u64 {
    params.int("timeout").max(0) as u64
}

/// Negative values count as zero; values past `Duration::MAX` saturate
fn seconds(value: f64) -> Duration {
    Duration::try_from_secs_f64(value.max(0.0)).unwrap_or(Duration::MAX)
}

fn launch_app<'a>(
    ctx: &'a ActionContext<'a>,
    params: &'a Params,
) -> BoxFuture<'a, Result<ActionOutcome>> {
    Box::pin(async move {
        let package = params.str("package");
        tracing::debug!(package, activity = ?params.opt_str("activity"), "Launching app");

        ctx.driver.activate_app(package).await?;
        tokio::time::sleep(seconds(params.float("settle_secs"))).await;

        let current = ctx.driver.current_package().await?;
        if current == package {
            Ok(ActionOutcome::passed(format!("App '{}' launched/activated.", package)))
        } else {
            Ok(ActionOutcome::failed(format!(
                "Launched '{}' but current package is '{}'.",
                package, current
            )))
        }
    })
}

fn click<'a>(ctx: &'a ActionContext<'a>, params: &'a Params) -> BoxFuture<'a, Result<ActionOutcome>> {
    Box::pin(async move {
        let selector = selector(params)?;
        let query = selector.resolve()?;
        let timeout = timeout_secs(params);

        match poll_element(ctx, &query, Duration::from_secs(timeout), Readiness::Clickable).await? {
            Some(element) => {
                ctx.driver.click(&element).await?;
                ctx.pause().await;
                Ok(ActionOutcome::passed(format!("Clicked element ({})", selector)))
            }
            None => Ok(ActionOutcome::failed(format!(
                "Element not found or not clickable within {}s ({})",
                timeout, selector
            ))),
        }
    })
}

fn type_text<'a>(
    ctx: &'a ActionContext<'a>,
    params: &'a Params,
) -> BoxFuture<'a, Result<ActionOutcome>> {
    Box::pin(async move {
        let selector = selector(params)?;
        let query = selector.resolve()?;
        let timeout = timeout_secs(params);
        let text = params.str("text");

        match poll_element(ctx, &query, Duration::from_secs(timeout), Readiness::Visible).await? {
            Some(element) => {
                ctx.driver.send_keys(&element, text).await?;
                ctx.pause().await;
                Ok(ActionOutcome::passed(format!(
                    "Input '{}' into element ({})",
                    text, selector
                )))
            }
            None => Ok(ActionOutcome::failed(format!(
                "Element not found within {}s ({}) for text input",
                timeout, selector
            ))),
        }
    })
}

fn wait_for_element<'a>(
    ctx: &'a ActionContext<'a>,
    params: &'a Params,
) -> BoxFuture<'a, Result<ActionOutcome>> {
    Box::pin(async move {
        let selector = selector(params)?;
        let query = selector.resolve()?;
        let timeout = timeout_secs(params);
        let (readiness, state) = if params.bool("visible") {
            (Readiness::Visible, "visible")
        } else {
            (Readiness::Present, "present")
        };

        match poll_element(ctx, &query, Duration::from_secs(timeout), readiness).await? {
            Some(_) => Ok(ActionOutcome::passed(format!(
                "Element ({}) is {}.",
                selector, state
            ))),
            None => Ok(ActionOutcome::failed(format!(
                "Element not {} within {}s ({})",
                state, timeout, selector
            ))),
        }
    })
}

fn assert_text<'a>(
    ctx: &'a ActionContext<'a>,
    params: &'a Params,
) -> BoxFuture<'a, Result<ActionOutcome>> {
    Box::pin(async move {
        let selector = selector(params)?;
        let query = selector.resolve()?;
        let timeout = timeout_secs(params);
        let expected = params.str("expected");

        let Some(element) =
            poll_element(ctx, &query, Duration::from_secs(timeout), Readiness::Present).await?
        else {
            return Ok(ActionOutcome::failed(format!(
                "Element not found within {}s ({})",
                timeout, selector
            )));
        };

        let actual = ctx.driver.element_text(&element).await?;
        let (matched, relation) = if params.bool("contains") {
            (actual.contains(expected), "contains")
        } else {
            (actual == expected, "equals")
        };

        if matched {
            Ok(ActionOutcome::passed(format!(
                "Text of ({}) {} '{}'",
                selector, relation, expected
            )))
        } else {
            Ok(ActionOutcome::failed(format!(
                "Expected text of ({}) {} '{}', got '{}'",
                selector,
                if relation == "equals" { "to equal" } else { "to contain" },
                expected,
                actual
            )))
        }
    })
}

fn press_key<'a>(
    ctx: &'a ActionContext<'a>,
    params: &'a Params,
) -> BoxFuture<'a, Result<ActionOutcome>> {
    Box::pin(async move {
        let name = params.str("key");
        let Some(code) = keycode(name) else {
            let supported: Vec<_> = KEYCODES.iter().map(|(key, _)| *key).collect();
            return Ok(ActionOutcome::failed(format!(
                "Unsupported key '{}'. Supported: {}",
                name,
                supported.join(", ")
            )));
        };

        ctx.driver.press_keycode(code).await?;
        ctx.pause().await;
        Ok(ActionOutcome::passed(format!(
            "Pressed key '{}'.",
            name.trim().to_ascii_uppercase()
        )))
    })
}

fn screenshot<'a>(
    ctx: &'a ActionContext<'a>,
    params: &'a Params,
) -> BoxFuture<'a, Result<ActionOutcome>> {
    Box::pin(async move {
        let file_name = sanitize_file_name(params.str("filename"));
        if file_name.trim().is_empty() {
            return Ok(ActionOutcome::failed(format!(
                "Unusable screenshot file name '{}'",
                params.str("filename")
            )));
        }

        let dir = &ctx.settings.reports_dir;
        if let Err(e) = tokio::fs::create_dir_all(dir).await {
            return Ok(ActionOutcome::failed(format!(
                "Error creating reports directory {}: {}",
                dir.display(),
                e
            )));
        }

        let png = ctx.driver.screenshot().await?;
        let path = dir.join(&file_name);
        match tokio::fs::write(&path, &png).await {
            Ok(()) => {
                tracing::debug!(path = %path.display(), bytes = png.len(), "Screenshot saved");
                Ok(ActionOutcome::passed(format!("Screenshot saved to {}", path.display())))
            }
            Err(e) => Ok(ActionOutcome::failed(format!(
                "Failed to save screenshot {}: {}",
                file_name, e
            ))),
        }
    })
}

fn wait<'a>(_ctx: &'a ActionContext<'a>, params: &'a Params) -> BoxFuture<'a, Result<ActionOutcome>> {
    Box::pin(async move {
        let secs = params.float("seconds");
        if secs < 0.0 {
            return Ok(ActionOutcome::failed(format!(
                "Invalid number of seconds provided: {}",
                secs
            )));
        }
        tokio::time::sleep(seconds(secs)).await;
        Ok(ActionOutcome::passed(format!("Waited for {} seconds.", secs)))
    })
}
