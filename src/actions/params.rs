//! Parameter contracts and coercion
//!
//! Step parameters arrive as loosely typed JSON. Each action declares an
//! ordered contract; [`coerce`] checks a step's parameters against it and
//! produces typed [`Params`], or explains why it cannot.

use std::collections::HashMap;
use std::fmt;

use serde::Serialize;
use serde_json::{Map, Value};

/// Declared type of a parameter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ParamType {
    String,
    Integer,
    Float,
    Boolean,
    List,
}

impl fmt::Display for ParamType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ParamType::String => "string",
            ParamType::Integer => "integer",
            ParamType::Float => "float",
            ParamType::Boolean => "boolean",
            ParamType::List => "list",
        };
        f.write_str(name)
    }
}

/// A default value that can live in a static table
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Literal {
    Str(&'static str),
    Int(i64),
    Float(f64),
    Bool(bool),
}

impl From<Literal> for ParamValue {
    fn from(lit: Literal) -> Self {
        match lit {
            Literal::Str(s) => ParamValue::Str(s.to_string()),
            Literal::Int(i) => ParamValue::Int(i),
            Literal::Float(f) => ParamValue::Float(f),
            Literal::Bool(b) => ParamValue::Bool(b),
        }
    }
}

/// One entry of an action's parameter contract
#[derive(Debug, Clone, Serialize)]
pub struct ParamSpec {
    pub name: &'static str,
    #[serde(rename = "type")]
    pub ty: ParamType,
    pub required: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<Literal>,
    pub description: &'static str,
    /// Older name still accepted in step parameters
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alias: Option<&'static str>,
}

impl ParamSpec {
    pub const fn required(name: &'static str, ty: ParamType, description: &'static str) -> Self {
        Self {
            name,
            ty,
            required: true,
            default: None,
            description,
            alias: None,
        }
    }

    pub const fn optional(
        name: &'static str,
        ty: ParamType,
        default: Option<Literal>,
        description: &'static str,
    ) -> Self {
        Self {
            name,
            ty,
            required: false,
            default,
            description,
            alias: None,
        }
    }

    /// Also accept the parameter under `alias`
    pub const fn alias(self, alias: &'static str) -> Self {
        Self {
            alias: Some(alias),
            ..self
        }
    }

    fn accepts(&self, key: &str) -> bool {
        self.name == key || self.alias == Some(key)
    }
}

/// A coerced parameter value
#[derive(Debug, Clone, PartialEq)]
pub enum ParamValue {
    Str(String),
    Int(i64),
    Float(f64),
    Bool(bool),
    List(Vec<Value>),
}

/// Typed parameters of one step, keyed by name
///
/// Accessors fall back to the type's zero value; coercion has already
/// guaranteed every required parameter is present with the declared type.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Params {
    values: HashMap<&'static str, ParamValue>,
}

impl Params {
    pub fn get(&self, name: &str) -> Option<&ParamValue> {
        self.values.get(name)
    }

    pub fn str(&self, name: &str) -> &str {
        match self.values.get(name) {
            Some(ParamValue::Str(s)) => s.as_str(),
            _ => "",
        }
    }

    pub fn opt_str(&self, name: &str) -> Option<&str> {
        match self.values.get(name) {
            Some(ParamValue::Str(s)) => Some(s.as_str()),
            _ => None,
        }
    }

    pub fn int(&self, name: &str) -> i64 {
        match self.values.get(name) {
            Some(ParamValue::Int(i)) => *i,
            _ => 0,
        }
    }

    pub fn float(&self, name: &str) -> f64 {
        match self.values.get(name) {
            Some(ParamValue::Float(f)) => *f,
            Some(ParamValue::Int(i)) => *i as f64,
            _ => 0.0,
        }
    }

    pub fn bool(&self, name: &str) -> bool {
        matches!(self.values.get(name), Some(ParamValue::Bool(true)))
    }

    pub fn list(&self, name: &str) -> &[Value] {
        match self.values.get(name) {
            Some(ParamValue::List(items)) => items.as_slice(),
            _ => &[],
        }
    }
}

/// Check raw step parameters against a contract
///
/// A parameter may be given under its name or its alias, not both.
/// Unknown names, missing required parameters and values that cannot be
/// converted to the declared type are all reported as an error string.
pub fn coerce(contract: &[ParamSpec], raw: &Map<String, Value>) -> Result<Params, String> {
    if let Some(unknown) = raw
        .keys()
        .find(|key| !contract.iter().any(|spec| spec.accepts(key)))
    {
        let expected: Vec<_> = contract.iter().map(|s| s.name).collect();
        return Err(format!(
            "unexpected parameter '{}' (accepted: {})",
            unknown,
            expected.join(", ")
        ));
    }

    let mut values = HashMap::with_capacity(contract.len());
    for spec in contract {
        let aliased = spec.alias.and_then(|alias| raw.get(alias).map(|value| (alias, value)));
        let given = match (raw.get(spec.name), aliased) {
            (Some(_), Some((alias, _))) => {
                return Err(format!(
                    "parameter '{}' given twice (also as '{}')",
                    spec.name, alias
                ));
            }
            (Some(value), None) => Some(value),
            (None, aliased) => aliased.map(|(_, value)| value),
        };
        match given {
            Some(value) if !value.is_null() => {
                let coerced = coerce_value(spec.ty, value).ok_or_else(|| {
                    format!(
                        "parameter '{}' expects {}, got {}",
                        spec.name,
                        spec.ty,
                        describe(value)
                    )
                })?;
                values.insert(spec.name, coerced);
            }
            _ if spec.required => {
                return Err(format!("missing required parameter '{}'", spec.name));
            }
            _ => {
                if let Some(default) = spec.default {
                    values.insert(spec.name, default.into());
                }
            }
        }
    }

    Ok(Params { values })
}

fn coerce_value(ty: ParamType, value: &Value) -> Option<ParamValue> {
    match ty {
        ParamType::String => match value {
            Value::String(s) => Some(ParamValue::Str(s.clone())),
            Value::Number(n) => Some(ParamValue::Str(n.to_string())),
            Value::Bool(b) => Some(ParamValue::Str(b.to_string())),
            _ => None,
        },
        ParamType::Integer => match value {
            Value::Number(n) => n.as_i64().or_else(|| {
                n.as_f64()
                    .filter(|f| f.fract() == 0.0 && f.abs() < i64::MAX as f64)
                    .map(|f| f as i64)
            }),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
        .map(ParamValue::Int),
        ParamType::Float => match value {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => s.trim().parse::<f64>().ok().filter(|f| f.is_finite()),
            _ => None,
        }
        .map(ParamValue::Float),
        ParamType::Boolean => match value {
            Value::Bool(b) => Some(*b),
            Value::Number(n) => match n.as_i64() {
                Some(0) => Some(false),
                Some(1) => Some(true),
                _ => None,
            },
            Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
                "true" | "1" | "yes" | "on" => Some(true),
                "false" | "0" | "no" | "off" => Some(false),
                _ => None,
            },
            _ => None,
        }
        .map(ParamValue::Bool),
        ParamType::List => match value {
            Value::Array(items) => Some(ParamValue::List(items.clone())),
            _ => None,
        },
    }
}

fn describe(value: &Value) -> String {
    match value {
        Value::String(s) => format!("\"{}\"", s),
        Value::Array(_) => "a list".to_string(),
        Value::Object(_) => "an object".to_string(),
        other => other.to_string(),
    }
}
