use std::borrow::Cow;

use percent_encoding::percent_decode_str;
use regex::Regex;

use super::{Args, CallContext, FailurePolicy, FuncError, Function, Param, PrepareContext, Prepared};
use crate::{ast::Node, value::Value};

const KEY_PARAMS: &[Param] = &[Param::required("key")];
const TRIM_PARAMS: &[Param] = &[Param::required("key"), Param::optional("cutset")];
const REPLACE_PARAMS: &[Param] = &[
    Param::required("key"),
    Param::required("pattern"),
    Param::required("replacement"),
];
const COVER_PARAMS: &[Param] = &[Param::required("key"), Param::optional("range")];

/// `uppercase(key)`
pub struct Uppercase;

impl Function for Uppercase {
    fn name(&self) -> &'static str {
        "uppercase"
    }

    fn params(&self) -> &'static [Param] {
        KEY_PARAMS
    }

    fn summary(&self) -> &'static str {
        "Convert the text of `key` to upper case."
    }

    fn call(&self, args: &Args<'_>, ctx: &mut CallContext<'_>) -> Result<(), FuncError> {
        let key = args.key(0)?;
        let text = ctx.text(&key)?;
        ctx.record.set(key, Value::String(text.to_uppercase()));
        Ok(())
    }
}

/// `lowercase(key)`
pub struct Lowercase;

impl Function for Lowercase {
    fn name(&self) -> &'static str {
        "lowercase"
    }

    fn params(&self) -> &'static [Param] {
        KEY_PARAMS
    }

    fn summary(&self) -> &'static str {
        "Convert the text of `key` to lower case."
    }

    fn call(&self, args: &Args<'_>, ctx: &mut CallContext<'_>) -> Result<(), FuncError> {
        let key = args.key(0)?;
        let text = ctx.text(&key)?;
        ctx.record.set(key, Value::String(text.to_lowercase()));
        Ok(())
    }
}

/// `trim(key, [cutset])`
pub struct Trim;

impl Function for Trim {
    fn name(&self) -> &'static str {
        "trim"
    }

    fn params(&self) -> &'static [Param] {
        TRIM_PARAMS
    }

    fn summary(&self) -> &'static str {
        "Strip leading and trailing whitespace, or any character of `cutset`, from `key`."
    }

    fn call(&self, args: &Args<'_>, ctx: &mut CallContext<'_>) -> Result<(), FuncError> {
        let key = args.key(0)?;
        let cutset = args.opt_string(1)?;
        let text = ctx.text(&key)?;

        let trimmed = match cutset {
            Some(cutset) => text.trim_matches(|c| cutset.contains(c)).to_string(),
            None => text.trim().to_string(),
        };
        ctx.record.set(key, Value::String(trimmed));
        Ok(())
    }
}

/// `replace(key, pattern, replacement)`
///
/// `pattern` is compiled once per call site; `replacement` may refer to
/// capture groups as `$1` or `${name}`.
pub struct Replace;

impl Function for Replace {
    fn name(&self) -> &'static str {
        "replace"
    }

    fn params(&self) -> &'static [Param] {
        REPLACE_PARAMS
    }

    fn summary(&self) -> &'static str {
        "Replace every match of the regex `pattern` in `key` with `replacement`."
    }

    fn prepare(
        &self,
        args: &Args<'_>,
        _ctx: &PrepareContext<'_>,
    ) -> Result<Option<Prepared>, FuncError> {
        let Ok(pattern) = args.string(1) else {
            return Ok(None);
        };
        Ok(Some(Prepared::Regex(Regex::new(&pattern)?)))
    }

    fn call(&self, args: &Args<'_>, ctx: &mut CallContext<'_>) -> Result<(), FuncError> {
        let key = args.key(0)?;
        let pattern = args.string(1)?;
        let replacement = args.string(2)?;

        let regex = match ctx.prepared {
            Some(Prepared::Regex(re)) => Cow::Borrowed(re),
            _ => Cow::Owned(Regex::new(&pattern)?),
        };

        let text = ctx.text(&key)?;
        let replaced = regex.replace_all(&text, replacement.as_str()).into_owned();
        ctx.record.set(key, Value::String(replaced));
        Ok(())
    }
}

/// `cover(key, [start, end])`
pub struct Cover;

impl Function for Cover {
    fn name(&self) -> &'static str {
        "cover"
    }

    fn params(&self) -> &'static [Param] {
        COVER_PARAMS
    }

    fn summary(&self) -> &'static str {
        "Mask characters start..=end (1-based, default all) of `key` with `*`."
    }

    fn call(&self, args: &Args<'_>, ctx: &mut CallContext<'_>) -> Result<(), FuncError> {
        let key = args.key(0)?;
        let range = match args.opt_list(1)? {
            Some(items) => Some(cover_range(items)?),
            None => None,
        };

        let text = ctx.text(&key)?;
        ctx.record.set(key, Value::String(mask(&text, range)));
        Ok(())
    }
}

fn cover_range(items: &[Node]) -> Result<(usize, usize), FuncError> {
    let [Node::Integer(start), Node::Integer(end)] = items else {
        return Err(FuncError::invalid(
            "cover",
            format!("range must be two integers, got {}", Node::List(items.to_vec())),
        ));
    };
    if start > end {
        return Err(FuncError::invalid(
            "cover",
            format!("range start {} is greater than end {}", start, end),
        ));
    }
    let clamp = |n: i64| usize::try_from(n.max(1)).unwrap_or(usize::MAX);
    Ok((clamp(*start), clamp(*end)))
}

/// Replace characters `start..=end` (1-based) with `*`. Bounds past the end
/// of the text are clamped.
fn mask(text: &str, range: Option<(usize, usize)>) -> String {
    let (start, end) = range.unwrap_or((1, usize::MAX));
    text.chars()
        .enumerate()
        .map(|(i, c)| if i + 1 >= start && i < end { '*' } else { c })
        .collect()
}

/// `url_decode(key)`
pub struct UrlDecode;

impl Function for UrlDecode {
    fn name(&self) -> &'static str {
        "url_decode"
    }

    fn params(&self) -> &'static [Param] {
        KEY_PARAMS
    }

    fn policy(&self) -> FailurePolicy {
        FailurePolicy::FailFast
    }

    fn summary(&self) -> &'static str {
        "Decode a URL query-encoded `key` (`+` is a space, `%XX` escapes)."
    }

    fn call(&self, args: &Args<'_>, ctx: &mut CallContext<'_>) -> Result<(), FuncError> {
        let key = args.key(0)?;
        let text = ctx.text(&key)?;
        let decoded = query_unescape(&text).map_err(|e| FuncError::runtime("url_decode", e))?;
        ctx.record.set(key, Value::String(decoded));
        Ok(())
    }
}

/// Decode query-string escaping: `+` becomes a space and `%XX` a byte.
/// A `%` not followed by two hex digits, or a result that is not valid
/// UTF-8, is an error.
///
/// ```
/// use datakit_pipeline::functions::query_unescape;
///
/// assert_eq!(query_unescape("a%20b+c%2Fd").unwrap(), "a b c/d");
/// assert!(query_unescape("100%").is_err());
/// ```
pub fn query_unescape(s: &str) -> Result<String, String> {
    let bytes = s.as_bytes();
    let bad_escape = s.match_indices('%').map(|(i, _)| i).find(|&i| {
        !bytes
            .get(i + 1..i + 3)
            .is_some_and(|hex| hex.iter().all(u8::is_ascii_hexdigit))
    });
    if let Some(i) = bad_escape {
        let escape = s.get(i..(i + 3).min(s.len())).unwrap_or("%");
        return Err(format!("invalid URL escape {:?}", escape));
    }

    let spaced = s.replace('+', " ");
    percent_decode_str(&spaced)
        .decode_utf8()
        .map(|decoded| decoded.into_owned())
        .map_err(|_| format!("{:?} does not decode to valid UTF-8", s))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mask() {
        assert_eq!(mask("13800138000", Some((4, 7))), "138****8000");
        assert_eq!(mask("abc", Some((2, 10))), "a**");
        assert_eq!(mask("abc", Some((5, 6))), "abc");
        assert_eq!(mask("密码abc", None), "*****");
    }

    #[test]
    fn test_cover_range() {
        assert_eq!(cover_range(&[Node::Integer(0), Node::Integer(3)]).unwrap(), (1, 3));
        assert!(cover_range(&[Node::Integer(3), Node::Integer(1)]).is_err());
        assert!(cover_range(&[Node::Integer(3)]).is_err());
    }

    #[test]
    fn test_query_unescape_errors() {
        assert!(query_unescape("%zz").is_err());
        assert!(query_unescape("%4").is_err());
        assert_eq!(query_unescape("%E4%BD%A0").unwrap(), "你");
        assert!(query_unescape("%FF%FE").is_err());
    }
}
