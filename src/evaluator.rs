//! Expression evaluation (`Calc`).
//!
//! Evaluates arithmetic, relational and logical expressions against the
//! current record. Key references resolve through [`Record::get`]; a missing
//! key evaluates to `nil`.
//!
//! # Numeric promotion
//!
//! | operands                  | `+ - *`            | `/ %`        |
//! |---------------------------|--------------------|--------------|
//! | any float                 | float              | float        |
//! | uint, uint                | uint (checked)     | int          |
//! | any other int/uint mix    | int (checked)      | int          |
//!
//! A uint above `i64::MAX` that has to be computed as int is an overflow
//! error, as is any checked operation that overflows. Integer division or
//! modulo by zero is an error; float division follows IEEE 754.

use std::cmp::Ordering;
use std::panic::{self, AssertUnwindSafe};

use thiserror::Error;

use crate::{
    ast::{BinOp, Node},
    record::Record,
    value::Value,
};

/// Errors that can occur during expression evaluation.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EvalError {
    /// Operator applied to operand types it does not support
    #[error("unsupported {left} {op} {right}")]
    TypeError {
        op: BinOp,
        left: &'static str,
        right: &'static str,
    },

    /// Checked integer arithmetic overflowed
    #[error("integer overflow: {left} {op} {right}")]
    Overflow { op: BinOp, left: String, right: String },

    /// Integer division or modulo by zero
    #[error("integer divide by zero")]
    DivisionByZero,

    /// Node kind that has no value in an expression
    #[error("unsupported expression `{0}`")]
    Unsupported(String),

    /// A panic raised while evaluating, converted to an error
    #[error("evaluation panicked: {0}")]
    Panic(String),
}

#[derive(Debug, Clone, Copy)]
enum Num {
    Int(i64),
    Uint(u64),
    Float(f64),
}

impl Num {
    fn of(v: &Value) -> Option<Num> {
        match v {
            Value::Integer(n) => Some(Num::Int(*n)),
            Value::Unsigned(n) => Some(Num::Uint(*n)),
            Value::Float(n) => Some(Num::Float(*n)),
            _ => None,
        }
    }

    fn as_f64(self) -> f64 {
        match self {
            Num::Int(n) => n as f64,
            Num::Uint(n) => n as f64,
            Num::Float(n) => n,
        }
    }

    fn as_i128(self) -> i128 {
        match self {
            Num::Int(n) => n as i128,
            Num::Uint(n) => n as i128,
            Num::Float(n) => n as i128,
        }
    }

    fn as_i64(self) -> Option<i64> {
        match self {
            Num::Int(n) => Some(n),
            Num::Uint(n) => i64::try_from(n).ok(),
            Num::Float(n) => Some(n as i64),
        }
    }

    fn is_float(self) -> bool {
        matches!(self, Num::Float(_))
    }
}

/// The expression evaluator.
///
/// Holds a read-only view of the record; evaluation never mutates it.
pub struct Evaluator<'a> {
    record: &'a Record,
}

impl<'a> Evaluator<'a> {
    pub fn new(record: &'a Record) -> Self {
        Evaluator { record }
    }

    /// Evaluates `node`, converting any panic raised on the way into
    /// [`EvalError::Panic`].
    ///
    /// # Examples
    ///
    /// ```
    /// use datakit_pipeline::{Evaluator, Record, Value};
    /// use datakit_pipeline::parser::Parser;
    /// use datakit_pipeline::lexer::Lexer;
    ///
    /// let mut record = Record::new("");
    /// record.set("a.second", Value::Integer(2));
    ///
    /// let expr = Parser::new(Lexer::new("a.second*10+(2+3)*5")).unwrap().parse().unwrap();
    /// let result = Evaluator::new(&record).calc(&expr).unwrap();
    /// assert_eq!(result, Value::Integer(45));
    /// ```
    pub fn calc(&self, node: &Node) -> Result<Value, EvalError> {
        match panic::catch_unwind(AssertUnwindSafe(|| self.eval(node))) {
            Ok(result) => result,
            Err(payload) => Err(EvalError::Panic(panic_message(payload.as_ref()))),
        }
    }

    fn eval(&self, node: &Node) -> Result<Value, EvalError> {
        match node {
            Node::Integer(n) => Ok(Value::Integer(*n)),
            Node::Float(n) => Ok(Value::Float(*n)),
            Node::String(s) => Ok(Value::String(s.clone())),
            Node::Boolean(b) => Ok(Value::Boolean(*b)),
            Node::Nil => Ok(Value::Null),
            Node::Identifier(_) | Node::Attr { .. } | Node::Index { .. } => {
                let key = node.to_string();
                Ok(self.record.get(&key).cloned().unwrap_or(Value::Null))
            }
            Node::Paren(inner) => self.eval(inner),
            Node::BinaryOp { op, left, right } => {
                let left_val = self.eval(left)?;
                let right_val = self.eval(right)?;
                apply_binop(*op, &left_val, &right_val)
            }
            Node::List(_) | Node::Call(_) | Node::KeywordArg { .. } => {
                Err(EvalError::Unsupported(node.to_string()))
            }
        }
    }
}

/// Apply a binary operator to two already evaluated operands.
pub fn apply_binop(op: BinOp, left: &Value, right: &Value) -> Result<Value, EvalError> {
    match op {
        BinOp::Add | BinOp::Subtract | BinOp::Multiply | BinOp::Divide | BinOp::Modulo => {
            arithmetic(op, left, right)
        }
        BinOp::Equal => Ok(Value::Boolean(values_equal(left, right))),
        BinOp::NotEqual => Ok(Value::Boolean(!values_equal(left, right))),
        BinOp::LessThan | BinOp::GreaterThan | BinOp::LessEqual | BinOp::GreaterEqual => {
            let ordering = compare(op, left, right)?;
            Ok(Value::Boolean(match op {
                BinOp::LessThan => ordering == Ordering::Less,
                BinOp::GreaterThan => ordering == Ordering::Greater,
                BinOp::LessEqual => ordering != Ordering::Greater,
                _ => ordering != Ordering::Less,
            }))
        }
        BinOp::And | BinOp::Or => match (left, right) {
            (Value::Boolean(a), Value::Boolean(b)) => Ok(Value::Boolean(if op == BinOp::And {
                *a && *b
            } else {
                *a || *b
            })),
            (a, b) => Err(type_error(op, a, b)),
        },
    }
}

fn type_error(op: BinOp, left: &Value, right: &Value) -> EvalError {
    EvalError::TypeError {
        op,
        left: left.type_name(),
        right: right.type_name(),
    }
}

fn arithmetic(op: BinOp, left: &Value, right: &Value) -> Result<Value, EvalError> {
    let (Some(a), Some(b)) = (Num::of(left), Num::of(right)) else {
        return Err(type_error(op, left, right));
    };

    let overflow = || EvalError::Overflow {
        op,
        left: left.to_string(),
        right: right.to_string(),
    };

    if a.is_float() || b.is_float() {
        let (x, y) = (a.as_f64(), b.as_f64());
        return Ok(Value::Float(match op {
            BinOp::Add => x + y,
            BinOp::Subtract => x - y,
            BinOp::Multiply => x * y,
            BinOp::Divide => x / y,
            _ => x % y,
        }));
    }

    if let (Num::Uint(x), Num::Uint(y)) = (a, b) {
        match op {
            BinOp::Add => return x.checked_add(y).map(Value::Unsigned).ok_or_else(overflow),
            BinOp::Multiply => return x.checked_mul(y).map(Value::Unsigned).ok_or_else(overflow),
            BinOp::Subtract if x >= y => return Ok(Value::Unsigned(x - y)),
            BinOp::Subtract => {
                let diff = x as i128 - y as i128;
                return i64::try_from(diff).map(Value::Integer).map_err(|_| overflow());
            }
            _ => {}
        }
    }

    let (Some(x), Some(y)) = (a.as_i64(), b.as_i64()) else {
        return Err(overflow());
    };

    let result = match op {
        BinOp::Add => x.checked_add(y),
        BinOp::Subtract => x.checked_sub(y),
        BinOp::Multiply => x.checked_mul(y),
        BinOp::Divide => {
            if y == 0 {
                return Err(EvalError::DivisionByZero);
            }
            x.checked_div(y)
        }
        _ => {
            if y == 0 {
                return Err(EvalError::DivisionByZero);
            }
            x.checked_rem(y)
        }
    };

    result.map(Value::Integer).ok_or_else(overflow)
}

/// Equality used by `==`/`!=`: numbers compare by value across int, uint
/// and float; other kinds compare structurally; mixed kinds are unequal.
pub fn values_equal(left: &Value, right: &Value) -> bool {
    match (Num::of(left), Num::of(right)) {
        (Some(a), Some(b)) => {
            if a.is_float() || b.is_float() {
                a.as_f64() == b.as_f64()
            } else {
                a.as_i128() == b.as_i128()
            }
        }
        _ => left == right,
    }
}

fn compare(op: BinOp, left: &Value, right: &Value) -> Result<Ordering, EvalError> {
    match (Num::of(left), Num::of(right)) {
        (Some(a), Some(b)) => {
            if a.is_float() || b.is_float() {
                a.as_f64()
                    .partial_cmp(&b.as_f64())
                    .ok_or_else(|| type_error(op, left, right))
            } else {
                Ok(a.as_i128().cmp(&b.as_i128()))
            }
        }
        _ => match (left, right) {
            (Value::String(a), Value::String(b)) => Ok(a.cmp(b)),
            (a, b) => Err(type_error(op, a, b)),
        },
    }
}

pub(crate) fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
