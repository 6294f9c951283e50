//! Payload and result values.
//!
//! Payloads travel from an action's payload phase to its execute phase and
//! results are stored on the work. Both use this tagged variant so adapters
//! pattern-match on the shape instead of guessing at runtime types.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize, Serializer};

use crate::error::ShapeMismatch;

/// A dynamically shaped payload or result.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum Value {
    #[default]
    None,
    Bool(bool),
    Integer(i64),
    Float(f64),
    Text(String),
    Sequence(Vec<Value>),
    Mapping(BTreeMap<String, Value>),
    /// The description of an error, kept as data (see `combine_payload`).
    Error(String),
}

/// The tag of a [`Value`], used in type mismatch reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Shape {
    None,
    Bool,
    Integer,
    Float,
    Text,
    Sequence,
    Mapping,
    Error,
}

impl fmt::Display for Shape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Shape::None => write!(f, "none"),
            Shape::Bool => write!(f, "bool"),
            Shape::Integer => write!(f, "integer"),
            Shape::Float => write!(f, "float"),
            Shape::Text => write!(f, "text"),
            Shape::Sequence => write!(f, "sequence"),
            Shape::Mapping => write!(f, "mapping"),
            Shape::Error => write!(f, "error"),
        }
    }
}

impl Value {
    pub fn shape(&self) -> Shape {
        match self {
            Value::None => Shape::None,
            Value::Bool(_) => Shape::Bool,
            Value::Integer(_) => Shape::Integer,
            Value::Float(_) => Shape::Float,
            Value::Text(_) => Shape::Text,
            Value::Sequence(_) => Shape::Sequence,
            Value::Mapping(_) => Shape::Mapping,
            Value::Error(_) => Shape::Error,
        }
    }

    pub fn is_none(&self) -> bool {
        matches!(self, Value::None)
    }

    fn mismatch(&self, expected: Shape) -> ShapeMismatch {
        ShapeMismatch {
            expected,
            actual: self.shape(),
        }
    }

    pub fn as_text(&self) -> Result<&str, ShapeMismatch> {
        match self {
            Value::Text(s) => Ok(s),
            other => Err(other.mismatch(Shape::Text)),
        }
    }

    pub fn into_text(self) -> Result<String, ShapeMismatch> {
        match self {
            Value::Text(s) => Ok(s),
            other => Err(other.mismatch(Shape::Text)),
        }
    }

    /// Integer payloads, also accepting decimal text such as scanned input.
    pub fn as_integer(&self) -> Result<i64, ShapeMismatch> {
        match self {
            Value::Integer(i) => Ok(*i),
            Value::Text(s) => s.trim().parse().map_err(|_| self.mismatch(Shape::Integer)),
            other => Err(other.mismatch(Shape::Integer)),
        }
    }

    pub fn as_sequence(&self) -> Result<&[Value], ShapeMismatch> {
        match self {
            Value::Sequence(items) => Ok(items),
            other => Err(other.mismatch(Shape::Sequence)),
        }
    }

    pub fn as_mapping(&self) -> Result<&BTreeMap<String, Value>, ShapeMismatch> {
        match self {
            Value::Mapping(map) => Ok(map),
            other => Err(other.mismatch(Shape::Mapping)),
        }
    }

    pub fn into_sequence(self) -> Result<Vec<Value>, ShapeMismatch> {
        match self {
            Value::Sequence(items) => Ok(items),
            other => Err(other.mismatch(Shape::Sequence)),
        }
    }

    pub fn into_mapping(self) -> Result<BTreeMap<String, Value>, ShapeMismatch> {
        match self {
            Value::Mapping(map) => Ok(map),
            other => Err(other.mismatch(Shape::Mapping)),
        }
    }

    pub fn expect_none(&self) -> Result<(), ShapeMismatch> {
        match self {
            Value::None => Ok(()),
            other => Err(other.mismatch(Shape::None)),
        }
    }

    /// Look up a key of a mapping value.
    pub fn get(&self, key: &str) -> Option<&Value> {
        match self {
            Value::Mapping(map) => map.get(key),
            _ => None,
        }
    }

    /// Convert into JSON. Errors become `{"error": <description>}`.
    pub fn to_json(&self) -> serde_json::Value {
        use serde_json::Value as Json;
        match self {
            Value::None => Json::Null,
            Value::Bool(b) => Json::Bool(*b),
            Value::Integer(i) => Json::from(*i),
            Value::Float(x) => serde_json::Number::from_f64(*x)
                .map(Json::Number)
                .unwrap_or(Json::Null),
            Value::Text(s) => Json::String(s.clone()),
            Value::Sequence(items) => Json::Array(items.iter().map(Value::to_json).collect()),
            Value::Mapping(map) => Json::Object(
                map.iter()
                    .map(|(k, v)| (k.clone(), v.to_json()))
                    .collect(),
            ),
            Value::Error(e) => serde_json::json!({ "error": e }),
        }
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_json().serialize(serializer)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Text(s) => write!(f, "{}", s),
            Value::Error(e) => write!(f, "error: {}", e),
            other => write!(f, "{}", other.to_json()),
        }
    }
}

impl From<serde_json::Value> for Value {
    fn from(json: serde_json::Value) -> Self {
        use serde_json::Value as Json;
        match json {
            Json::Null => Value::None,
            Json::Bool(b) => Value::Bool(b),
            Json::Number(n) => match n.as_i64() {
                Some(i) => Value::Integer(i),
                None => Value::Float(n.as_f64().unwrap_or_default()),
            },
            Json::String(s) => Value::Text(s),
            Json::Array(items) => Value::Sequence(items.into_iter().map(Value::from).collect()),
            Json::Object(map) => {
                Value::Mapping(map.into_iter().map(|(k, v)| (k, Value::from(v))).collect())
            }
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Text(s)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Integer(i)
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Value::Integer(i64::from(i))
    }
}

impl From<f64> for Value {
    fn from(x: f64) -> Self {
        Value::Float(x)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::Sequence(items)
    }
}

impl From<BTreeMap<String, Value>> for Value {
    fn from(map: BTreeMap<String, Value>) -> Self {
        Value::Mapping(map)
    }
}

impl From<()> for Value {
    fn from(_: ()) -> Self {
        Value::None
    }
}
