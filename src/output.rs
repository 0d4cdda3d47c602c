//! JSON rendering of records and values.
//!
//! Output is deterministic: map keys are sorted, so the same record always
//! renders to the same text. Compact output has no whitespace; pretty output
//! indents by two spaces.
//!
//! # Examples
//!
//! ```
//! use datakit_pipeline::{Record, Value};
//! use datakit_pipeline::output::{record_to_json, to_json};
//!
//! assert_eq!(to_json(&Value::Integer(42)), "42");
//!
//! let mut record = Record::new("GET /");
//! record.set("status", Value::Integer(200));
//! record.set("method", Value::String("GET".to_string()));
//! assert_eq!(
//!     record_to_json(&record, false),
//!     r#"{"message":"GET /","method":"GET","status":200}"#
//! );
//! ```

use std::collections::HashMap;

use crate::record::Record;
use crate::value::Value;

pub struct JsonPrinter {
    pretty: bool,
}

impl JsonPrinter {
    pub fn new(pretty: bool) -> Self {
        JsonPrinter { pretty }
    }

    pub fn print(&self, value: &Value) -> String {
        self.print_value(value, 0)
    }

    /// Render a set of record fields as a JSON object.
    pub fn print_fields(&self, fields: &HashMap<String, Value>) -> String {
        self.print_map(fields, 0)
    }

    fn print_value(&self, value: &Value, indent: usize) -> String {
        match value {
            Value::Null => "null".to_string(),
            Value::Boolean(b) => b.to_string(),
            Value::Integer(n) => n.to_string(),
            Value::Unsigned(n) => n.to_string(),
            Value::Float(n) => float_literal(*n),
            Value::String(s) => format!("\"{}\"", escape_string(s)),
            Value::Map(map) => self.print_map(map, indent),
        }
    }

    fn print_map(&self, map: &HashMap<String, Value>, indent: usize) -> String {
        if map.is_empty() {
            return "{}".to_string();
        }

        let mut entries: Vec<(&String, &Value)> = map.iter().collect();
        entries.sort_by(|a, b| a.0.cmp(b.0));

        if self.pretty {
            let items: Vec<String> = entries
                .iter()
                .map(|(k, v)| {
                    format!(
                        "{}\"{}\": {}",
                        self.indent(indent + 1),
                        escape_string(k),
                        self.print_value(v, indent + 1)
                    )
                })
                .collect();
            format!("{{\n{}\n{}}}", items.join(",\n"), self.indent(indent))
        } else {
            let items: Vec<String> = entries
                .iter()
                .map(|(k, v)| format!("\"{}\":{}", escape_string(k), self.print_value(v, indent)))
                .collect();
            format!("{{{}}}", items.join(","))
        }
    }

    fn indent(&self, level: usize) -> String {
        "  ".repeat(level)
    }
}

/// JSON has no NaN or infinity; they render as `null`. Integral floats keep
/// a `.0` so they read back as floats.
fn float_literal(n: f64) -> String {
    if !n.is_finite() {
        "null".to_string()
    } else if n.fract() == 0.0 && n.abs() < 1e16 {
        format!("{:.1}", n)
    } else {
        n.to_string()
    }
}

fn escape_string(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if c.is_control() => out.push_str(&format!("\\u{:04x}", c as u32)),
            c => out.push(c),
        }
    }
    out
}

/// Compact JSON for a single value.
pub fn to_json(value: &Value) -> String {
    JsonPrinter::new(false).print(value)
}

/// Two-space indented JSON for a single value.
pub fn to_json_pretty(value: &Value) -> String {
    JsonPrinter::new(true).print(value)
}

/// Render the fields of a record as a JSON object. The raw input text is
/// not part of the output.
pub fn record_to_json(record: &Record, pretty: bool) -> String {
    JsonPrinter::new(pretty).print_fields(record.fields())
}
