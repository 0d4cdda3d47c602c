use super::{Args, CallContext, FuncError, Function, Param};
use crate::value::Value;

const CAST_PARAMS: &[Param] = &[Param::required("key"), Param::required("type")];

/// `cast(key, type)` with `type` one of `int`, `float`, `str`, `bool`.
pub struct Cast;

impl Function for Cast {
    fn name(&self) -> &'static str {
        "cast"
    }

    fn params(&self) -> &'static [Param] {
        CAST_PARAMS
    }

    fn summary(&self) -> &'static str {
        "Convert `key` to int, float, str or bool. Float to int truncates toward zero."
    }

    fn call(&self, args: &Args<'_>, ctx: &mut CallContext<'_>) -> Result<(), FuncError> {
        let key = args.key(0)?;
        let target = args.string(1)?;

        let value = ctx.value(&key)?;
        let converted = cast_value(value, &target)
            .ok_or_else(|| FuncError::invalid("cast", format!("unknown cast type `{}`", target)))?;
        ctx.record.set(key, converted);
        Ok(())
    }
}

/// Convert `value` to the named type. Conversion never fails: text that
/// does not parse becomes the type's zero value. Returns `None` for an
/// unknown type name.
///
/// ```
/// use datakit_pipeline::{functions::cast_value, Value};
///
/// assert_eq!(cast_value(&Value::Float(2.3), "int"), Some(Value::Integer(2)));
/// assert_eq!(cast_value(&Value::from("-7.9"), "int"), Some(Value::Integer(0)));
/// assert_eq!(cast_value(&Value::from("T"), "bool"), Some(Value::Boolean(true)));
/// assert_eq!(cast_value(&Value::Integer(1), "uint"), None);
/// ```
pub fn cast_value(value: &Value, target: &str) -> Option<Value> {
    match target {
        "int" => Some(Value::Integer(to_i64(value))),
        "float" => Some(Value::Float(to_f64(value))),
        "str" | "string" => Some(Value::String(value.as_string())),
        "bool" => Some(Value::Boolean(to_bool(value))),
        _ => None,
    }
}

fn to_i64(value: &Value) -> i64 {
    match value {
        Value::Integer(n) => *n,
        Value::Unsigned(n) => *n as i64,
        Value::Float(n) => n.trunc() as i64,
        Value::Boolean(b) => i64::from(*b),
        Value::String(s) => parse_int(s).unwrap_or(0),
        Value::Null | Value::Map(_) => 0,
    }
}

/// Integer text with optional sign, `0x`/`0o`/`0b` prefix, `_` separators
/// and a trailing all-zero fraction (`"2.00"`).
fn parse_int(s: &str) -> Option<i64> {
    let mut s = s.trim();
    if let Some((int, frac)) = s.split_once('.')
        && !frac.is_empty()
        && frac.bytes().all(|b| b == b'0')
    {
        s = int;
    }

    let (negative, digits) = match s.as_bytes().first() {
        Some(b'-') => (true, &s[1..]),
        Some(b'+') => (false, &s[1..]),
        _ => (false, s),
    };
    let digits = digits.replace('_', "");
    let lower = digits.to_ascii_lowercase();

    let (radix, body) = if let Some(hex) = lower.strip_prefix("0x") {
        (16, hex)
    } else if let Some(oct) = lower.strip_prefix("0o") {
        (8, oct)
    } else if let Some(bin) = lower.strip_prefix("0b") {
        (2, bin)
    } else {
        (10, lower.as_str())
    };

    if body.starts_with(['+', '-']) {
        return None;
    }
    let magnitude = i128::from_str_radix(body, radix).ok()?;
    let signed = if negative { -magnitude } else { magnitude };
    i64::try_from(signed).ok()
}

fn to_f64(value: &Value) -> f64 {
    match value {
        Value::Map(_) | Value::Null => 0.0,
        other => other.as_f64().unwrap_or(0.0),
    }
}

fn to_bool(value: &Value) -> bool {
    match value {
        Value::Boolean(b) => *b,
        Value::Integer(n) => *n != 0,
        Value::Unsigned(n) => *n != 0,
        Value::Float(n) => *n != 0.0,
        Value::String(s) => matches!(s.trim(), "1" | "t" | "T" | "TRUE" | "true" | "True"),
        Value::Null | Value::Map(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_int_forms() {
        assert_eq!(parse_int("42"), Some(42));
        assert_eq!(parse_int(" -0x1f "), Some(-31));
        assert_eq!(parse_int("1_000"), Some(1000));
        assert_eq!(parse_int("2.000"), Some(2));
        assert_eq!(parse_int("2.5"), None);
        assert_eq!(parse_int(""), None);
    }
}
