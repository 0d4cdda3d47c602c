// tests/record_tests.rs

use std::collections::HashMap;

use datakit_pipeline::{record_to_json, to_json, Record, Value};

fn map(pairs: Vec<(&str, Value)>) -> Value {
    Value::Map(pairs.into_iter().map(|(k, v)| (k.to_string(), v)).collect())
}

// ============================================================================
// Record access
// ============================================================================

#[test]
fn test_new_record_holds_message() {
    let record = Record::new("raw text");
    assert_eq!(record.get("message"), Some(&Value::from("raw text")));
    assert_eq!(record.get("_"), Some(&Value::from("raw text")));
    assert_eq!(record.raw(), "raw text");
    assert_eq!(record.len(), 1);
}

#[test]
fn test_set_writes_literal_key() {
    let mut record = Record::new("");
    record.set("a.b.c", Value::Integer(1));

    assert_eq!(record.get("a.b.c"), Some(&Value::Integer(1)));
    assert!(record.get("a").is_none());
    assert!(record.fields().contains_key("a.b.c"));
}

#[test]
fn test_get_walks_nested_maps() {
    let mut record = Record::new("");
    record.set(
        "req",
        map(vec![("headers", map(vec![("host", Value::from("example.com"))]))]),
    );

    assert_eq!(record.get("req.headers.host"), Some(&Value::from("example.com")));
    assert!(record.get("req.headers.agent").is_none());
    assert!(record.get("req.headers.host.more").is_none());
    assert!(record.contains_key("req.headers"));
}

#[test]
fn test_delete_is_top_level_only() {
    let mut record = Record::new("");
    record.set("a", map(vec![("b", Value::Integer(1))]));

    assert!(record.delete("a.b").is_none());
    assert!(record.get("a.b").is_some());
    assert!(record.delete("a").is_some());
    assert!(record.get("a.b").is_none());
}

#[test]
fn test_setting_raw_key_keeps_message() {
    let mut record = Record::new("before");
    record.set("_", Value::Integer(7));

    assert_eq!(record.raw(), "7");
    assert_eq!(record.get("message"), Some(&Value::from("before")));
    assert!(!record.fields().contains_key("_"));
}

#[test]
fn test_with_fields() {
    let mut fields = HashMap::new();
    fields.insert("host".to_string(), Value::from("web-1"));
    let record = Record::with_fields("line", fields);
    assert_eq!(record.get("host"), Some(&Value::from("web-1")));
    assert_eq!(record.get("message"), Some(&Value::from("line")));

    let mut fields = HashMap::new();
    fields.insert("message".to_string(), Value::from("provided"));
    let record = Record::with_fields("line", fields);
    assert_eq!(record.get("message"), Some(&Value::from("provided")));
    assert_eq!(record.raw(), "line");
}

#[test]
fn test_replace_fields() {
    let mut record = Record::new("x");
    let mut fields = HashMap::new();
    fields.insert("only".to_string(), Value::Boolean(true));
    record.replace_fields(fields);

    assert!(record.get("message").is_none());
    assert_eq!(record.raw(), "x");
    assert_eq!(record.into_fields().len(), 1);
}

// ============================================================================
// Values
// ============================================================================

#[test]
fn test_value_from_json() {
    let value = Value::from(serde_json::json!({
        "n": 1,
        "big": 18446744073709551615u64,
        "f": 1.5,
        "list": [1, "a"],
        "none": null
    }));

    let Value::Map(fields) = value else {
        panic!("expected a map");
    };
    assert_eq!(fields["n"], Value::Integer(1));
    assert_eq!(fields["big"], Value::Unsigned(u64::MAX));
    assert_eq!(fields["f"], Value::Float(1.5));
    assert_eq!(fields["list"], Value::from(r#"[1,"a"]"#));
    assert_eq!(fields["none"], Value::Null);
}

#[test]
fn test_value_text_forms() {
    assert_eq!(Value::Null.as_string(), "");
    assert_eq!(Value::Float(2.0).as_string(), "2");
    assert_eq!(Value::Float(2.5).as_string(), "2.5");
    assert_eq!(Value::Boolean(false).to_string(), "false");
    assert_eq!(Value::Unsigned(3).type_name(), "uint");
}

// ============================================================================
// JSON output
// ============================================================================

#[test]
fn test_record_json_is_sorted() {
    let mut record = Record::new("GET /");
    record.set("zeta", Value::Integer(1));
    record.set("alpha", map(vec![("y", Value::Null), ("x", Value::Float(0.5))]));

    assert_eq!(
        record_to_json(&record, false),
        r#"{"alpha":{"x":0.5,"y":null},"message":"GET /","zeta":1}"#
    );
}

#[test]
fn test_json_floats_stay_floats() {
    assert_eq!(to_json(&Value::Float(3.0)), "3.0");
    assert_eq!(to_json(&Value::Float(f64::INFINITY)), "null");
}
