//! The mutable per-run record ("Output" map).
//!
//! A record starts as `{"message": <raw input>}` and is mutated by each
//! statement of a script. Keys are addressed by their rendered path text:
//!
//! - `_` is the raw input text and bypasses the map entirely.
//! - [`Record::get`] first looks for the exact key (so `a.b` written by
//!   `json(_, a.b)` or `json_all()` is found as-is), then walks nested maps
//!   segment by segment. A miss at any level is `None`.
//! - [`Record::set`] always writes the literal key; it never creates
//!   intermediate maps. `set("a.b.c", v)` on a flat record writes the key
//!   `"a.b.c"`.
//! - [`Record::delete`] removes the literal top-level key.

use std::collections::HashMap;

use crate::value::Value;

/// Key seeded with the raw input at the start of each run.
pub const MESSAGE_KEY: &str = "message";

/// Reserved key naming the raw input text.
pub const RAW_KEY: &str = "_";

#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    /// Always a `Value::String`; kept as a value so `get("_")` can lend it.
    raw: Value,
    fields: HashMap<String, Value>,
}

impl Record {
    /// Fresh record for one run: `{"message": raw}`.
    pub fn new(raw: impl Into<String>) -> Self {
        let raw = raw.into();
        let mut fields = HashMap::new();
        fields.insert(MESSAGE_KEY.to_string(), Value::String(raw.clone()));
        Record {
            raw: Value::String(raw),
            fields,
        }
    }

    /// Record with caller-provided structured fields. `message` is only
    /// added when the caller did not supply one.
    pub fn with_fields(raw: impl Into<String>, fields: HashMap<String, Value>) -> Self {
        let mut record = Record::new(raw);
        for (k, v) in fields {
            record.fields.insert(k, v);
        }
        record
    }

    /// The raw input text of this run.
    pub fn raw(&self) -> &str {
        match &self.raw {
            Value::String(s) => s,
            _ => "",
        }
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        if key == RAW_KEY {
            return Some(&self.raw);
        }

        if let Some(v) = self.fields.get(key) {
            return Some(v);
        }

        let mut segments = key.split('.');
        let mut current = self.fields.get(segments.next()?)?;
        for segment in segments {
            current = match current {
                Value::Map(map) => map.get(segment)?,
                _ => return None,
            };
        }
        Some(current)
    }

    /// Write `value` under the literal key. Writing `_` replaces the raw
    /// input text with the value's string form.
    pub fn set(&mut self, key: impl Into<String>, value: Value) {
        let key = key.into();
        if key == RAW_KEY {
            self.raw = Value::String(value.as_string());
            return;
        }
        self.fields.insert(key, value);
    }

    pub fn delete(&mut self, key: &str) -> Option<Value> {
        self.fields.remove(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// Replace every field at once (used by full-message flattening).
    pub fn replace_fields(&mut self, fields: HashMap<String, Value>) {
        self.fields = fields;
    }

    pub fn fields(&self) -> &HashMap<String, Value> {
        &self.fields
    }

    pub fn into_fields(self) -> HashMap<String, Value> {
        self.fields
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}
