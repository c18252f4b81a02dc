//! Selector resolution
//!
//! Test steps describe elements symbolically as a `(kind, value)` pair. This
//! module turns that pair into the location strategy and query string the
//! automation server understands, so actions never build queries themselves.

use std::fmt;
use std::str::FromStr;

use serde::Serialize;

use crate::common::{Error, Result};

/// How a selector locates an element
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum SelectorKind {
    AccessibilityId,
    ResourceId,
    XpathExpression,
    ClassName,
    /// Exact visible text; rewritten into an xpath query
    VisibleText,
    /// Native query language of the platform (UiAutomator on Android)
    PlatformSpecificQuery,
}

impl SelectorKind {
    /// All kinds, in catalog order
    pub const ALL: [SelectorKind; 6] = [
        SelectorKind::AccessibilityId,
        SelectorKind::ResourceId,
        SelectorKind::XpathExpression,
        SelectorKind::ClassName,
        SelectorKind::VisibleText,
        SelectorKind::PlatformSpecificQuery,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SelectorKind::AccessibilityId => "accessibility-id",
            SelectorKind::ResourceId => "resource-id",
            SelectorKind::XpathExpression => "xpath-expression",
            SelectorKind::ClassName => "class-name",
            SelectorKind::VisibleText => "visible-text",
            SelectorKind::PlatformSpecificQuery => "platform-specific-query",
        }
    }

    /// Whether an empty value is a meaningful query for this kind
    fn tolerates_empty(&self) -> bool {
        matches!(self, SelectorKind::VisibleText)
    }
}

impl fmt::Display for SelectorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SelectorKind {
    type Err = Error;

    /// Case-insensitive; `_`, `-` and spaces are interchangeable. The short
    /// upper-case names used by older test cases (`ID`, `XPATH`, `TEXT`, ...)
    /// are accepted too.
    fn from_str(s: &str) -> Result<Self> {
        let normalized = s.trim().to_ascii_lowercase().replace(['_', ' '], "-");
        let kind = match normalized.as_str() {
            "accessibility-id" => SelectorKind::AccessibilityId,
            "resource-id" | "id" => SelectorKind::ResourceId,
            "xpath-expression" | "xpath" => SelectorKind::XpathExpression,
            "class-name" | "class" => SelectorKind::ClassName,
            "visible-text" | "text" => SelectorKind::VisibleText,
            "platform-specific-query" | "android-uiautomator" | "-android-uiautomator" => {
                SelectorKind::PlatformSpecificQuery
            }
            _ => return Err(Error::InvalidSelectorKind(s.to_string())),
        };
        Ok(kind)
    }
}

/// A symbolic selector as written in a test step
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selector {
    pub kind: SelectorKind,
    pub value: String,
}

impl Selector {
    /// Parse the kind name and pair it with a value
    pub fn parse(kind: &str, value: &str) -> Result<Self> {
        Ok(Self {
            kind: kind.parse()?,
            value: value.to_string(),
        })
    }

    /// Resolve into a query the session can execute
    pub fn resolve(&self) -> Result<Query> {
        resolve(self.kind, &self.value)
    }
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}='{}'", self.kind, self.value)
    }
}

/// A concrete element query: WebDriver location strategy plus query string
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Query {
    pub using: &'static str,
    pub value: String,
}

/// Resolve a selector kind and value into a concrete query
pub fn resolve(kind: SelectorKind, value: &str) -> Result<Query> {
    if value.is_empty() && !kind.tolerates_empty() {
        return Err(Error::InvalidSelector(format!(
            "{} selector needs a non-empty value",
            kind
        )));
    }

    let query = match kind {
        SelectorKind::AccessibilityId => Query {
            using: "accessibility id",
            value: value.to_string(),
        },
        SelectorKind::ResourceId => Query {
            using: "id",
            value: value.to_string(),
        },
        SelectorKind::XpathExpression => Query {
            using: "xpath",
            value: value.to_string(),
        },
        SelectorKind::ClassName => Query {
            using: "class name",
            value: value.to_string(),
        },
        SelectorKind::VisibleText => Query {
            using: "xpath",
            value: format!("//*[@text={}]", xpath_literal(value)),
        },
        SelectorKind::PlatformSpecificQuery => Query {
            using: "-android uiautomator",
            value: value.to_string(),
        },
    };
    Ok(query)
}

/// Quote a string as an XPath 1.0 literal
///
/// XPath has no escape sequences, so a value holding both quote styles is
/// split into pieces and joined with `concat()`.
pub fn xpath_literal(value: &str) -> String {
    if !value.contains('\'') {
        return format!("'{}'", value);
    }
    if !value.contains('"') {
        return format!("\"{}\"", value);
    }

    let mut parts = Vec::new();
    for (i, piece) in value.split('\'').enumerate() {
        if i > 0 {
            parts.push("\"'\"".to_string());
        }
        if !piece.is_empty() {
            parts.push(format!("'{}'", piece));
        }
    }
    format!("concat({})", parts.join(", "))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_names_and_aliases() {
        assert_eq!("accessibility-id".parse::<SelectorKind>().unwrap(), SelectorKind::AccessibilityId);
        assert_eq!("ACCESSIBILITY_ID".parse::<SelectorKind>().unwrap(), SelectorKind::AccessibilityId);
        assert_eq!("ID".parse::<SelectorKind>().unwrap(), SelectorKind::ResourceId);
        assert_eq!("Visible Text".parse::<SelectorKind>().unwrap(), SelectorKind::VisibleText);
        assert_eq!("TEXT".parse::<SelectorKind>().unwrap(), SelectorKind::VisibleText);
        assert_eq!(
            "android_uiautomator".parse::<SelectorKind>().unwrap(),
            SelectorKind::PlatformSpecificQuery
        );
        for kind in SelectorKind::ALL {
            assert_eq!(kind.as_str().parse::<SelectorKind>().unwrap(), kind);
        }
    }

    #[test]
    fn test_unknown_kind_fails_fast() {
        let err = "css".parse::<SelectorKind>().unwrap_err();
        assert!(matches!(err, Error::InvalidSelectorKind(ref k) if k == "css"));
    }

    #[test]
    fn test_direct_kinds_pass_value_through() {
        let q = resolve(SelectorKind::ResourceId, "com.app:id/user").unwrap();
        assert_eq!(q.using, "id");
        assert_eq!(q.value, "com.app:id/user");

        let q = resolve(SelectorKind::ClassName, "android.widget.Button").unwrap();
        assert_eq!(q.using, "class name");

        let q = resolve(SelectorKind::PlatformSpecificQuery, "new UiSelector().text(\"OK\")").unwrap();
        assert_eq!(q.using, "-android uiautomator");
    }

    #[test]
    fn test_visible_text_becomes_xpath() {
        let q = resolve(SelectorKind::VisibleText, "Log In").unwrap();
        assert_eq!(q.using, "xpath");
        assert_eq!(q.value, "//*[@text='Log In']");
    }

    #[test]
    fn test_visible_text_escapes_quotes() {
        let q = resolve(SelectorKind::VisibleText, "Don't stop").unwrap();
        assert_eq!(q.value, "//*[@text=\"Don't stop\"]");

        let q = resolve(SelectorKind::VisibleText, "it's \"fine\"").unwrap();
        assert_eq!(q.value, "//*[@text=concat('it', \"'\", 's \"fine\"')]");
    }

    #[test]
    fn test_xpath_literal_edge_quotes() {
        assert_eq!(xpath_literal("'\""), "concat(\"'\", '\"')");
        assert_eq!(xpath_literal(""), "''");
    }

    #[test]
    fn test_empty_values() {
        assert!(matches!(
            resolve(SelectorKind::ResourceId, ""),
            Err(Error::InvalidSelector(_))
        ));
        let q = resolve(SelectorKind::VisibleText, "").unwrap();
        assert_eq!(q.value, "//*[@text='']");
    }

    #[test]
    fn test_selector_display() {
        let s = Selector::parse("TEXT", "Log In").unwrap();
        assert_eq!(s.to_string(), "visible-text='Log In'");
    }
}
