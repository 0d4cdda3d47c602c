// tests/calc_tests.rs

use std::collections::HashMap;

use datakit_pipeline::ast::BinOp;
use datakit_pipeline::lexer::Lexer;
use datakit_pipeline::parser::Parser;
use datakit_pipeline::{EvalError, Evaluator, Record, Value};

fn calc(source: &str, record: &Record) -> Result<Value, EvalError> {
    let node = Parser::new(Lexer::new(source)).unwrap().parse().unwrap();
    Evaluator::new(record).calc(&node)
}

fn calc_empty(source: &str) -> Result<Value, EvalError> {
    calc(source, &Record::new(""))
}

fn record(pairs: Vec<(&str, Value)>) -> Record {
    let mut record = Record::new("");
    for (k, v) in pairs {
        record.set(k, v);
    }
    record
}

// ============================================================================
// Arithmetic
// ============================================================================

#[test]
fn test_dotted_key_expression() {
    let record = record(vec![("a.second", Value::Integer(2))]);
    assert_eq!(calc("a.second*10+(2+3)*5", &record), Ok(Value::Integer(45)));
}

#[test]
fn test_integer_arithmetic() {
    assert_eq!(calc_empty("1 + 2 * 3"), Ok(Value::Integer(7)));
    assert_eq!(calc_empty("7 / 2"), Ok(Value::Integer(3)));
    assert_eq!(calc_empty("-7 / 2"), Ok(Value::Integer(-3)));
    assert_eq!(calc_empty("7 % 3"), Ok(Value::Integer(1)));
    assert_eq!(calc_empty("2 - 5"), Ok(Value::Integer(-3)));
}

#[test]
fn test_float_promotion() {
    assert_eq!(calc_empty("1 + 2.5"), Ok(Value::Float(3.5)));
    assert_eq!(calc_empty("7.0 / 2"), Ok(Value::Float(3.5)));
    assert_eq!(calc_empty("7.5 % 2"), Ok(Value::Float(1.5)));
}

#[test]
fn test_unsigned_arithmetic() {
    let record = record(vec![
        ("a", Value::Unsigned(3)),
        ("b", Value::Unsigned(4)),
        ("big", Value::Unsigned(u64::MAX)),
    ]);
    assert_eq!(calc("a + b", &record), Ok(Value::Unsigned(7)));
    assert_eq!(calc("a * b", &record), Ok(Value::Unsigned(12)));
    assert_eq!(calc("b - a", &record), Ok(Value::Unsigned(1)));
    assert_eq!(calc("a - b", &record), Ok(Value::Integer(-1)));
    assert_eq!(calc("b / a", &record), Ok(Value::Integer(1)));
    assert_eq!(calc("a + 1", &record), Ok(Value::Integer(4)));
    assert!(matches!(calc("big + a", &record), Err(EvalError::Overflow { .. })));
    assert!(matches!(calc("big + 1", &record), Err(EvalError::Overflow { .. })));
}

#[test]
fn test_overflow_is_an_error() {
    let err = calc_empty("9223372036854775807 + 1").unwrap_err();
    assert_eq!(
        err,
        EvalError::Overflow {
            op: BinOp::Add,
            left: "9223372036854775807".into(),
            right: "1".into(),
        }
    );
    assert!(calc_empty("9223372036854775807 * 2").is_err());
}

#[test]
fn test_division_by_zero() {
    assert_eq!(calc_empty("1 / 0"), Err(EvalError::DivisionByZero));
    assert_eq!(calc_empty("1 % 0"), Err(EvalError::DivisionByZero));
    assert_eq!(calc_empty("1.0 / 0"), Ok(Value::Float(f64::INFINITY)));
}

#[test]
fn test_strings_do_not_add() {
    assert_eq!(
        calc_empty("\"a\" + \"b\""),
        Err(EvalError::TypeError {
            op: BinOp::Add,
            left: "string",
            right: "string",
        })
    );
}

#[test]
fn test_missing_key_in_arithmetic() {
    assert_eq!(
        calc_empty("missing + 1"),
        Err(EvalError::TypeError {
            op: BinOp::Add,
            left: "nil",
            right: "int",
        })
    );
}

// ============================================================================
// Comparison
// ============================================================================

#[test]
fn test_numeric_equality_across_types() {
    assert_eq!(calc_empty("1 == 1.0"), Ok(Value::Boolean(true)));
    assert_eq!(calc_empty("2 != 2"), Ok(Value::Boolean(false)));

    let record = record(vec![("u", Value::Unsigned(5))]);
    assert_eq!(calc("u == 5", &record), Ok(Value::Boolean(true)));
}

#[test]
fn test_mixed_kind_equality_is_false() {
    assert_eq!(calc_empty("\"1\" == 1"), Ok(Value::Boolean(false)));
    assert_eq!(calc_empty("true != false"), Ok(Value::Boolean(true)));
    assert_eq!(calc_empty("\"a\" == \"a\""), Ok(Value::Boolean(true)));
}

#[test]
fn test_nil_comparison() {
    let record = record(vec![("present", Value::Integer(1))]);
    assert_eq!(calc("absent == nil", &record), Ok(Value::Boolean(true)));
    assert_eq!(calc("present == nil", &record), Ok(Value::Boolean(false)));
    assert_eq!(calc("present != null", &record), Ok(Value::Boolean(true)));
}

#[test]
fn test_ordering() {
    assert_eq!(calc_empty("3 > 2.5"), Ok(Value::Boolean(true)));
    assert_eq!(calc_empty("2 <= 2"), Ok(Value::Boolean(true)));
    assert_eq!(calc_empty("\"abc\" < \"abd\""), Ok(Value::Boolean(true)));
    assert!(matches!(
        calc_empty("\"a\" < 1"),
        Err(EvalError::TypeError { op: BinOp::LessThan, .. })
    ));
    assert!(calc_empty("nil > 1").is_err());
}

// ============================================================================
// Logic
// ============================================================================

#[test]
fn test_logical_operators() {
    assert_eq!(calc_empty("1 > 0 && 2 > 1"), Ok(Value::Boolean(true)));
    assert_eq!(calc_empty("1 > 2 || 2 > 1"), Ok(Value::Boolean(true)));
    assert_eq!(calc_empty("true && false"), Ok(Value::Boolean(false)));
}

#[test]
fn test_logical_operators_need_bools() {
    assert!(matches!(
        calc_empty("true && 1"),
        Err(EvalError::TypeError { op: BinOp::And, .. })
    ));
}

// ============================================================================
// Record access
// ============================================================================

#[test]
fn test_nested_map_lookup() {
    let mut inner = HashMap::new();
    inner.insert("b".to_string(), Value::Integer(3));
    let record = record(vec![("a", Value::Map(inner))]);

    assert_eq!(calc("a.b * 2", &record), Ok(Value::Integer(6)));
    assert_eq!(calc("a.c == nil", &record), Ok(Value::Boolean(true)));
}

#[test]
fn test_literal_key_shadows_nested_path() {
    let mut inner = HashMap::new();
    inner.insert("b".to_string(), Value::Integer(3));
    let record = record(vec![("a", Value::Map(inner)), ("a.b", Value::Integer(100))]);

    assert_eq!(calc("a.b", &record), Ok(Value::Integer(100)));
}

#[test]
fn test_raw_input_reference() {
    let record = Record::new("hello");
    assert_eq!(calc("_ == \"hello\"", &record), Ok(Value::Boolean(true)));
}

#[test]
fn test_list_has_no_value() {
    assert!(matches!(calc_empty("[1, 2]"), Err(EvalError::Unsupported(_))));
}
