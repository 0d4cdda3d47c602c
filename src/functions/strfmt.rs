//! `strfmt` and its printf-style formatter.
//!
//! Supported verbs: `%v %d %s %f %F %e %E %g %x %X %o %b %c %q %t %%`, with
//! the flags `- + 0 space`, a width and a `.precision`. Mismatches are
//! rendered inline instead of failing: `%!d(string=abc)` for a wrong type,
//! `%!s(MISSING)` for a missing argument and `%!(EXTRA int64=1)` for
//! unused arguments.

use std::iter::Peekable;
use std::str::Chars;

use super::{literal_value, Args, CallContext, FuncError, Function, Param};
use crate::value::{format_float, Value};

const STRFMT_PARAMS: &[Param] = &[
    Param::required("key"),
    Param::required("fmt"),
    Param::variadic("args"),
];

/// `strfmt(key, fmt, args...)`
pub struct Strfmt;

impl Function for Strfmt {
    fn name(&self) -> &'static str {
        "strfmt"
    }

    fn params(&self) -> &'static [Param] {
        STRFMT_PARAMS
    }

    fn summary(&self) -> &'static str {
        "Format `args` (keys or literals) with a printf-style `fmt` and store the text under `key`."
    }

    fn call(&self, args: &Args<'_>, ctx: &mut CallContext<'_>) -> Result<(), FuncError> {
        let key = args.key(0)?;
        let fmt = args.string(1)?;

        let values: Vec<Value> = args
            .rest()
            .iter()
            .map(|node| match literal_value(node) {
                Some(v) => v,
                None if node.is_key_ref() => ctx
                    .record
                    .get(&node.to_string())
                    .cloned()
                    .unwrap_or(Value::Null),
                None => Value::String(node.to_string()),
            })
            .collect();

        ctx.record.set(key, Value::String(sprintf(&fmt, &values)));
        Ok(())
    }
}

#[derive(Debug, Default, Clone, Copy)]
struct Spec {
    left: bool,
    plus: bool,
    zero: bool,
    space: bool,
    width: Option<usize>,
    precision: Option<usize>,
}

/// Format `args` according to `format`.
///
/// ```
/// use datakit_pipeline::{functions::sprintf, Value};
///
/// let out = sprintf("%s took %.2fms (%d)", &[Value::from("GET"), Value::Float(1.5), Value::Integer(200)]);
/// assert_eq!(out, "GET took 1.50ms (200)");
/// assert_eq!(sprintf("%d", &[]), "%!d(MISSING)");
/// ```
pub fn sprintf(format: &str, args: &[Value]) -> String {
    let mut out = String::with_capacity(format.len());
    let mut chars = format.chars().peekable();
    let mut next_arg = 0;

    while let Some(c) = chars.next() {
        if c != '%' {
            out.push(c);
            continue;
        }

        let spec = parse_spec(&mut chars);
        let Some(verb) = chars.next() else {
            out.push_str("%!(NOVERB)");
            break;
        };

        if verb == '%' {
            out.push('%');
            continue;
        }

        match args.get(next_arg) {
            Some(arg) => {
                next_arg += 1;
                out.push_str(&format_arg(verb, &spec, arg));
            }
            None => {
                out.push_str("%!");
                out.push(verb);
                out.push_str("(MISSING)");
            }
        }
    }

    if next_arg < args.len() {
        let extra: Vec<String> = args[next_arg..]
            .iter()
            .map(|v| match v {
                Value::Null => "<nil>".to_string(),
                v => format!("{}={}", go_type(v), v),
            })
            .collect();
        out.push_str("%!(EXTRA ");
        out.push_str(&extra.join(", "));
        out.push(')');
    }

    out
}

fn parse_spec(chars: &mut Peekable<Chars<'_>>) -> Spec {
    let mut spec = Spec::default();

    while let Some(&c) = chars.peek() {
        match c {
            '-' => spec.left = true,
            '+' => spec.plus = true,
            '0' => spec.zero = true,
            ' ' => spec.space = true,
            _ => break,
        }
        chars.next();
    }

    spec.width = parse_digits(chars);
    if chars.peek() == Some(&'.') {
        chars.next();
        spec.precision = Some(parse_digits(chars).unwrap_or(0));
    }
    spec
}

/// Upper bound for widths and precisions written in a format literal.
const MAX_WIDTH: usize = 4096;

fn parse_digits(chars: &mut Peekable<Chars<'_>>) -> Option<usize> {
    let mut n: Option<usize> = None;
    while let Some(d) = chars.peek().and_then(|c| c.to_digit(10)) {
        n = Some(n.unwrap_or(0).saturating_mul(10).saturating_add(d as usize));
        chars.next();
    }
    n.map(|n| n.min(MAX_WIDTH))
}

fn go_type(v: &Value) -> &'static str {
    match v {
        Value::Null => "<nil>",
        Value::Boolean(_) => "bool",
        Value::Integer(_) => "int64",
        Value::Unsigned(_) => "uint64",
        Value::Float(_) => "float64",
        Value::String(_) => "string",
        Value::Map(_) => "map[string]interface {}",
    }
}

fn bad_verb(verb: char, arg: &Value) -> String {
    match arg {
        Value::Null => format!("%!{}(<nil>)", verb),
        v => format!("%!{}({}={})", verb, go_type(v), v),
    }
}

fn format_arg(verb: char, spec: &Spec, arg: &Value) -> String {
    let (body, numeric) = match (verb, arg) {
        ('v', Value::Null) => ("<nil>".to_string(), false),

        ('v' | 'd', Value::Integer(n)) => (signed(n.to_string(), *n >= 0, spec), true),
        ('v' | 'd', Value::Unsigned(n)) => (signed(n.to_string(), true, spec), true),
        ('x' | 'X' | 'o' | 'b', Value::Integer(n)) => {
            let digits = radix(n.unsigned_abs(), verb);
            let text = if *n < 0 { format!("-{}", digits) } else { digits };
            (signed(text, *n >= 0, spec), true)
        }
        ('x' | 'X' | 'o' | 'b', Value::Unsigned(n)) => (signed(radix(*n, verb), true, spec), true),
        ('c', Value::Integer(n)) => (
            u32::try_from(*n)
                .ok()
                .and_then(char::from_u32)
                .unwrap_or(char::REPLACEMENT_CHARACTER)
                .to_string(),
            false,
        ),

        ('f' | 'F', Value::Float(n)) => (
            signed(format!("{:.*}", spec.precision.unwrap_or(6), n), *n >= 0.0, spec),
            true,
        ),
        ('e' | 'E', Value::Float(n)) => {
            let text = exponent(*n, spec.precision.unwrap_or(6));
            let text = if verb == 'E' { text.to_uppercase() } else { text };
            (signed(text, *n >= 0.0, spec), true)
        }
        ('v' | 'g' | 'G', Value::Float(n)) => {
            let text = match spec.precision {
                Some(p) => format!("{:.*}", p, n),
                None => format_float(*n),
            };
            (signed(text, *n >= 0.0, spec), true)
        }

        ('v' | 's', Value::String(s)) => (truncate(s, spec.precision), false),
        ('q', Value::String(s)) => (quote(s), false),
        ('x' | 'X', Value::String(s)) => {
            let hex: String = s.bytes().map(|b| format!("{:02x}", b)).collect();
            (if verb == 'X' { hex.to_uppercase() } else { hex }, false)
        }

        ('v' | 't', Value::Boolean(b)) => (b.to_string(), false),
        ('v' | 's', Value::Map(_)) => (arg.as_string(), false),

        _ => return bad_verb(verb, arg),
    };

    pad(body, spec, numeric)
}

fn signed(text: String, non_negative: bool, spec: &Spec) -> String {
    if !non_negative {
        text
    } else if spec.plus {
        format!("+{}", text)
    } else if spec.space {
        format!(" {}", text)
    } else {
        text
    }
}

fn radix(n: u64, verb: char) -> String {
    match verb {
        'x' => format!("{:x}", n),
        'X' => format!("{:X}", n),
        'o' => format!("{:o}", n),
        _ => format!("{:b}", n),
    }
}

/// Exponent notation with a signed, at least two-digit exponent
/// (`1.500000e+03`).
fn exponent(n: f64, precision: usize) -> String {
    let text = format!("{:.*e}", precision, n);
    match text.split_once('e') {
        Some((mantissa, exp)) => {
            let (sign, digits) = match exp.strip_prefix('-') {
                Some(d) => ('-', d),
                None => ('+', exp),
            };
            format!("{}e{}{:0>2}", mantissa, sign, digits)
        }
        None => text,
    }
}

fn truncate(s: &str, precision: Option<usize>) -> String {
    match precision {
        Some(p) => s.chars().take(p).collect(),
        None => s.to_string(),
    }
}

fn quote(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if c.is_control() && (c as u32) < 0x80 => {
                out.push_str(&format!("\\x{:02x}", c as u32));
            }
            c if c.is_control() => out.push_str(&format!("\\u{:04x}", c as u32)),
            c => out.push(c),
        }
    }
    out.push('"');
    out
}

fn pad(body: String, spec: &Spec, numeric: bool) -> String {
    let len = body.chars().count();
    let Some(width) = spec.width.filter(|w| *w > len) else {
        return body;
    };
    let fill = width - len;

    if spec.left {
        format!("{}{}", body, " ".repeat(fill))
    } else if spec.zero && numeric {
        let split = body
            .char_indices()
            .find(|(_, c)| !matches!(c, '+' | '-' | ' '))
            .map(|(i, _)| i)
            .unwrap_or(0);
        let (sign, digits) = body.split_at(split);
        format!("{}{}{}", sign, "0".repeat(fill), digits)
    } else {
        format!("{}{}", " ".repeat(fill), body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verbs() {
        assert_eq!(sprintf("%v|%v|%v", &[Value::Integer(1), Value::Float(2.5), Value::Boolean(true)]), "1|2.5|true");
        assert_eq!(sprintf("%05d|%-4d|%+d", &[Value::Integer(-42), Value::Integer(7), Value::Integer(3)]), "-0042|7   |+3");
        assert_eq!(sprintf("%x %X", &[Value::Integer(255), Value::from("hi")]), "ff 6869");
        assert_eq!(sprintf("%e", &[Value::Float(1500.0)]), "1.500000e+03");
        assert_eq!(sprintf("%q", &[Value::from("a\"b")]), "\"a\\\"b\"");
        assert_eq!(sprintf("%.2s", &[Value::from("abcdef")]), "ab");
        assert_eq!(sprintf("100%%", &[]), "100%");
    }

    #[test]
    fn test_mismatches() {
        assert_eq!(sprintf("%d", &[Value::from("abc")]), "%!d(string=abc)");
        assert_eq!(sprintf("%s %s", &[Value::from("a")]), "a %!s(MISSING)");
        assert_eq!(sprintf("%s", &[Value::from("a"), Value::Integer(1)]), "a%!(EXTRA int64=1)");
        assert_eq!(sprintf("%d", &[Value::Null]), "%!d(<nil>)");
        assert_eq!(sprintf("%v", &[Value::Null]), "<nil>");
    }
}
