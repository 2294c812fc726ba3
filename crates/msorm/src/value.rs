//! Scalar value model.
//!
//! Row values, filter operands, and positional arguments are all carried as
//! [`Value`]. The builder treats empty strings, the literal string `NULL`, and
//! [`Value::Null`] uniformly as SQL NULL (the "sentinel NULL" rule), which is
//! how filter maps and INSERT/SET clauses decide between a positional
//! placeholder and an inline `NULL`.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A scalar database value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    DateTime(NaiveDateTime),
    Uuid(Uuid),
}

impl Value {
    /// Test whether this value is treated as SQL NULL by the builder.
    ///
    /// Empty strings and the literal string `NULL` (any case) count, matching
    /// how form-shaped inputs arrive from callers.
    pub fn is_null_sentinel(&self) -> bool {
        match self {
            Value::Null => true,
            Value::Text(s) => s.is_empty() || s.eq_ignore_ascii_case("NULL"),
            _ => false,
        }
    }

    /// Render the value as a bare literal.
    ///
    /// Used for inline filter substitution and for the parameter-substituted
    /// diagnostic text on execution failures. This is straight substitution
    /// with no escaping; callers of raw filter maps must pre-sanitize.
    pub fn literal(&self) -> String {
        match self {
            Value::Null => "NULL".to_string(),
            Value::Bool(b) => if *b { "1" } else { "0" }.to_string(),
            Value::Int(n) => n.to_string(),
            Value::Float(f) => f.to_string(),
            Value::Text(s) => s.clone(),
            Value::DateTime(dt) => dt.format("%Y-%m-%d %H:%M:%S").to_string(),
            Value::Uuid(u) => u.to_string(),
        }
    }

    /// Borrow the inner text, if this is a text value.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s.as_str()),
            _ => None,
        }
    }

    /// Read the value as an integer where the engine may have returned either
    /// a numeric or a text column.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(n) => Some(*n),
            Value::Text(s) => s.parse().ok(),
            _ => None,
        }
    }

    /// Loose truthiness, for bit-typed catalog flags that arrive as 0/1,
    /// true/false, or text.
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Null => false,
            Value::Bool(b) => *b,
            Value::Int(n) => *n != 0,
            Value::Float(f) => *f != 0.0,
            Value::Text(s) => !s.is_empty() && s != "0" && !s.eq_ignore_ascii_case("false"),
            Value::DateTime(_) | Value::Uuid(_) => true,
        }
    }
}

impl std::fmt::Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.literal())
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
    fn from(n: i64) -> Self {
        Value::Int(n)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Int(n as i64)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Float(f)
    }
}

impl From<Uuid> for Value {
    fn from(u: Uuid) -> Self {
        Value::Uuid(u)
    }
}

impl From<NaiveDateTime> for Value {
    fn from(dt: NaiveDateTime) -> Self {
        Value::DateTime(dt)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(opt: Option<T>) -> Self {
        match opt {
            Some(v) => v.into(),
            None => Value::Null,
        }
    }
}

/// Convert from a JSON scalar, for executors that bridge through a
/// JSON-speaking transport. Arrays and objects decay to their JSON text.
impl From<serde_json::Value> for Value {
    fn from(v: serde_json::Value) -> Self {
        match v {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Value::Int(i)
                } else {
                    Value::Float(n.as_f64().unwrap_or(0.0))
                }
            }
            serde_json::Value::String(s) => Value::Text(s),
            other => Value::Text(other.to_string()),
        }
    }
}
