use std::collections::HashMap;
use std::fmt;

/// A dynamically typed record value.
///
/// Records produced by a pipeline run hold one of these per key. Nested
/// maps only appear when a caller seeds structured fields; scripts address
/// them with dotted paths.
///
/// # Type Preservation
///
/// Integers, unsigned integers and floats are kept apart so numeric results
/// keep the type the promotion rules in [`crate::evaluator`] give them, and
/// JSON numbers keep the type they were written with.
///
/// # Examples
///
/// ```
/// use datakit_pipeline::Value;
///
/// assert_eq!(Value::Integer(45).to_string(), "45");
/// assert_eq!(Value::Float(2.0).to_string(), "2");
/// assert_eq!(Value::Null.to_string(), "");
/// ```
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// nil
    Null,

    /// Boolean (true/false)
    Boolean(bool),

    /// Signed 64-bit integer
    Integer(i64),

    /// Unsigned integer too large for `i64`
    Unsigned(u64),

    /// 64-bit float
    Float(f64),

    /// UTF-8 string
    String(String),

    /// Nested map, addressed with dotted paths
    Map(HashMap<String, Value>),
}

impl Value {
    /// Human-readable type name used in error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "nil",
            Value::Boolean(_) => "bool",
            Value::Integer(_) => "int",
            Value::Unsigned(_) => "uint",
            Value::Float(_) => "float",
            Value::String(_) => "string",
            Value::Map(_) => "map",
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Numeric view of the value. Strings are parsed, booleans map to 1/0;
    /// anything else has no numeric value.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Integer(n) => Some(*n as f64),
            Value::Unsigned(n) => Some(*n as f64),
            Value::Float(n) => Some(*n),
            Value::Boolean(b) => Some(if *b { 1.0 } else { 0.0 }),
            Value::String(s) => s.trim().parse::<f64>().ok(),
            Value::Null | Value::Map(_) => None,
        }
    }

    /// String form used wherever a function needs text (grok input, casing,
    /// formatting). `nil` renders as the empty string.
    pub fn as_string(&self) -> String {
        match self {
            Value::String(s) => s.clone(),
            Value::Null => String::new(),
            Value::Boolean(b) => b.to_string(),
            Value::Integer(n) => n.to_string(),
            Value::Unsigned(n) => n.to_string(),
            Value::Float(n) => format_float(*n),
            Value::Map(_) => serde_json::Value::from(self.clone()).to_string(),
        }
    }
}

/// Format a float without exponent, dropping a trailing `.0`.
pub fn format_float(n: f64) -> String {
    if n.is_nan() {
        "NaN".to_string()
    } else if n.is_infinite() {
        if n > 0.0 { "+Inf".to_string() } else { "-Inf".to_string() }
    } else {
        n.to_string()
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.as_string())
    }
}

impl From<serde_json::Value> for Value {
    /// Convert a JSON value. Arrays have no record representation and are
    /// kept as their compact JSON text.
    fn from(v: serde_json::Value) -> Self {
        match v {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Boolean(b),
            serde_json::Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Value::Integer(i)
                } else if let Some(u) = n.as_u64() {
                    Value::Unsigned(u)
                } else {
                    Value::Float(n.as_f64().unwrap_or(f64::NAN))
                }
            }
            serde_json::Value::String(s) => Value::String(s),
            arr @ serde_json::Value::Array(_) => Value::String(arr.to_string()),
            serde_json::Value::Object(obj) => {
                Value::Map(obj.into_iter().map(|(k, v)| (k, Value::from(v))).collect())
            }
        }
    }
}

impl From<Value> for serde_json::Value {
    fn from(v: Value) -> Self {
        match v {
            Value::Null => serde_json::Value::Null,
            Value::Boolean(b) => serde_json::Value::Bool(b),
            Value::Integer(i) => serde_json::Value::Number(i.into()),
            Value::Unsigned(u) => serde_json::Value::Number(u.into()),
            Value::Float(f) => serde_json::Number::from_f64(f)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            Value::String(s) => serde_json::Value::String(s),
            Value::Map(map) => serde_json::Value::Object(
                map.into_iter()
                    .map(|(k, v)| (k, serde_json::Value::from(v)))
                    .collect(),
            ),
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Integer(n)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Float(n)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Boolean(b)
    }
}
