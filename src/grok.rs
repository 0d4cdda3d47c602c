//! Grok pattern registry and matcher.
//!
//! A grok pattern is a regular expression that may reference named
//! fragments with `%{NAME}` (match only) or `%{NAME:field}` (match and
//! capture into `field`). An optional third part selects the capture type:
//! `%{NUMBER:bytes:int}`, `%{NUMBER:ratio:float}`.
//!
//! Fragments are looked up in three layers, first hit wins:
//!
//! 1. script-local patterns (`add_pattern` calls of one script),
//! 2. engine-wide patterns (pattern files named in the configuration, or
//!    [`PatternRegistry::add_global`]),
//! 3. the built-in table bundled with the crate.

use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use once_cell::sync::Lazy;
use parking_lot::RwLock;
use regex::Regex;
use thiserror::Error;

use crate::value::Value;

/// Script-local pattern layer: name to fragment source.
pub type PatternSet = HashMap<String, String>;

static BUILTIN_PATTERNS: Lazy<HashMap<String, String>> =
    Lazy::new(|| parse_pattern_text(include_str!("../patterns/grok-patterns")).collect());

#[derive(Debug, Error)]
pub enum GrokError {
    #[error("unknown grok pattern `{0}`")]
    UnknownPattern(String),

    #[error("grok pattern reference cycle: {0}")]
    Cycle(String),

    #[error("malformed pattern reference in `{0}`")]
    Malformed(String),

    #[error("invalid capture type `{0}`, expected int, float or string")]
    CaptureType(String),

    #[error("compiled grok pattern is not a valid regex: {0}")]
    Regex(#[from] regex::Error),

    #[error("failed to read pattern file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Conversion applied to a captured substring.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureType {
    String,
    Int,
    Float,
}

impl CaptureType {
    fn parse(s: &str) -> Result<Self, GrokError> {
        match s {
            "string" | "str" => Ok(CaptureType::String),
            "int" => Ok(CaptureType::Int),
            "float" => Ok(CaptureType::Float),
            other => Err(GrokError::CaptureType(other.to_string())),
        }
    }

    /// Convert a captured substring. Text that does not parse as the
    /// requested number type is kept as a string.
    fn convert(self, text: &str) -> Value {
        match self {
            CaptureType::String => Value::String(text.to_string()),
            CaptureType::Int => text
                .parse::<i64>()
                .map(Value::Integer)
                .unwrap_or_else(|_| Value::String(text.to_string())),
            CaptureType::Float => text
                .parse::<f64>()
                .map(Value::Float)
                .unwrap_or_else(|_| Value::String(text.to_string())),
        }
    }
}

#[derive(Debug, Clone)]
struct Capture {
    group: String,
    field: String,
    kind: CaptureType,
}

/// A fully expanded, compiled grok pattern.
#[derive(Debug, Clone)]
pub struct GrokMatcher {
    source: String,
    regex: Regex,
    captures: Vec<Capture>,
}

impl GrokMatcher {
    /// The pattern text as written in the script.
    pub fn source(&self) -> &str {
        &self.source
    }

    /// The expanded regular expression.
    pub fn expanded(&self) -> &str {
        self.regex.as_str()
    }

    /// Field names this pattern captures, in pattern order.
    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.captures.iter().map(|c| c.field.as_str())
    }

    /// Match `text` (unanchored). On a match, every field yields one
    /// `(field, value)` pair in pattern order. A field whose groups all
    /// failed to participate yields an empty string; a non-participating
    /// group never replaces a value another group bound to the same field,
    /// so `%{IPV4:client}|%{HOSTNAME:client}` keeps whichever branch matched.
    pub fn matches(&self, text: &str) -> Option<Vec<(String, Value)>> {
        let caps = self.regex.captures(text)?;
        let mut out: Vec<(String, Value)> = Vec::with_capacity(self.captures.len());

        for capture in &self.captures {
            let found = caps.name(&capture.group);
            let slot = out.iter().position(|(field, _)| *field == capture.field);
            match (found, slot) {
                (Some(m), Some(i)) => out[i].1 = capture.kind.convert(m.as_str()),
                (Some(m), None) => out.push((capture.field.clone(), capture.kind.convert(m.as_str()))),
                (None, Some(_)) => {}
                (None, None) => out.push((capture.field.clone(), capture.kind.convert(""))),
            }
        }
        Some(out)
    }
}

/// Engine-wide pattern registry.
///
/// Reads happen on every script compile; writes only when pattern files are
/// loaded, so the global layer sits behind a read-write lock.
#[derive(Debug, Default)]
pub struct PatternRegistry {
    global: RwLock<HashMap<String, String>>,
}

impl PatternRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace an engine-wide pattern.
    pub fn add_global(&self, name: impl Into<String>, fragment: impl Into<String>) {
        self.global.write().insert(name.into(), fragment.into());
    }

    /// Load `NAME regex` lines into the engine-wide layer. Returns the number
    /// of patterns added.
    pub fn load_str(&self, text: &str) -> usize {
        let mut global = self.global.write();
        let mut count = 0;
        for (name, fragment) in parse_pattern_text(text) {
            global.insert(name, fragment);
            count += 1;
        }
        count
    }

    pub fn load_file(&self, path: &Path) -> Result<usize, GrokError> {
        let text = fs::read_to_string(path).map_err(|source| GrokError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let count = self.load_str(&text);
        tracing::debug!(path = %path.display(), count, "loaded grok patterns");
        Ok(count)
    }

    /// Resolve a fragment name through the local, global and built-in layers.
    pub fn lookup(&self, name: &str, local: &PatternSet) -> Option<String> {
        if let Some(fragment) = local.get(name) {
            return Some(fragment.clone());
        }
        if let Some(fragment) = self.global.read().get(name) {
            return Some(fragment.clone());
        }
        builtin(name).map(str::to_string)
    }

    /// Expand every reference in `pattern` and compile the result.
    pub fn compile(&self, pattern: &str, local: &PatternSet) -> Result<GrokMatcher, GrokError> {
        let mut expansion = Expansion {
            registry: self,
            local,
            stack: Vec::new(),
            captures: Vec::new(),
        };
        let expanded = expansion.expand(pattern)?;
        let regex = Regex::new(&expanded)?;

        Ok(GrokMatcher {
            source: pattern.to_string(),
            regex,
            captures: expansion.captures,
        })
    }
}

/// Look up a bundled pattern.
pub fn builtin(name: &str) -> Option<&'static str> {
    BUILTIN_PATTERNS.get(name).map(String::as_str)
}

/// Iterate over the `NAME regex` definitions of a pattern file. Blank lines
/// and `#` comments are skipped, as are lines without a regex.
pub fn parse_pattern_text(text: &str) -> impl Iterator<Item = (String, String)> + '_ {
    text.lines().filter_map(|line| {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            return None;
        }
        let (name, fragment) = line.split_once(char::is_whitespace)?;
        let fragment = fragment.trim();
        if fragment.is_empty() {
            return None;
        }
        Some((name.to_string(), fragment.to_string()))
    })
}

struct Expansion<'a> {
    registry: &'a PatternRegistry,
    local: &'a PatternSet,
    stack: Vec<String>,
    captures: Vec<Capture>,
}

impl Expansion<'_> {
    fn expand(&mut self, pattern: &str) -> Result<String, GrokError> {
        let mut out = String::with_capacity(pattern.len());
        let mut rest = pattern;

        while let Some(start) = rest.find("%{") {
            out.push_str(&rest[..start]);
            let after = &rest[start + 2..];
            let end = after
                .find('}')
                .ok_or_else(|| GrokError::Malformed(pattern.to_string()))?;

            let mut parts = after[..end].splitn(3, ':');
            let name = parts.next().unwrap_or_default();
            let field = parts.next().filter(|f| !f.is_empty());
            let kind = parts.next().map(CaptureType::parse).transpose()?;

            if name.is_empty() || !name.chars().all(|c| c.is_alphanumeric() || c == '_') {
                return Err(GrokError::Malformed(pattern.to_string()));
            }

            if self.stack.iter().any(|n| n == name) {
                let mut path = self.stack.clone();
                path.push(name.to_string());
                return Err(GrokError::Cycle(path.join(" -> ")));
            }

            let fragment = self
                .registry
                .lookup(name, self.local)
                .ok_or_else(|| GrokError::UnknownPattern(name.to_string()))?;

            // reserve the group index before expanding nested captures
            let group = field.map(|field| {
                let group = format!("__g{}", self.captures.len());
                self.captures.push(Capture {
                    group: group.clone(),
                    field: field.to_string(),
                    kind: kind.unwrap_or(CaptureType::String),
                });
                group
            });

            self.stack.push(name.to_string());
            let inner = self.expand(&fragment)?;
            self.stack.pop();

            match group {
                Some(group) => {
                    out.push_str("(?P<");
                    out.push_str(&group);
                    out.push('>');
                    out.push_str(&inner);
                    out.push(')');
                }
                None => {
                    out.push_str("(?:");
                    out.push_str(&inner);
                    out.push(')');
                }
            }

            rest = &after[end + 1..];
        }

        out.push_str(rest);
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_table_compiles() {
        let registry = PatternRegistry::new();
        for name in BUILTIN_PATTERNS.keys() {
            let pattern = format!("%{{{}}}", name);
            assert!(
                registry.compile(&pattern, &PatternSet::new()).is_ok(),
                "built-in pattern {} failed to compile",
                name
            );
        }
    }

    #[test]
    fn test_pattern_text_skips_comments() {
        let parsed: Vec<_> = parse_pattern_text("# c\n\nA \\d+\nB\n  C  x y\n").collect();
        assert_eq!(
            parsed,
            vec![
                ("A".to_string(), "\\d+".to_string()),
                ("C".to_string(), "x y".to_string())
            ]
        );
    }
}
