use std::borrow::Cow;

use super::{Args, CallContext, FuncError, Function, Param, PrepareContext, Prepared};
use crate::grok::PatternSet;

const GROK_PARAMS: &[Param] = &[Param::required("input"), Param::required("pattern")];
const ADD_PATTERN_PARAMS: &[Param] = &[Param::required("name"), Param::required("pattern")];

/// `grok(input, pattern)`
///
/// The pattern is compiled when the script is compiled, so unknown pattern
/// names and reference cycles are compile errors. A line that does not match
/// leaves the record unchanged.
pub struct Grok;

impl Function for Grok {
    fn name(&self) -> &'static str {
        "grok"
    }

    fn params(&self) -> &'static [Param] {
        GROK_PARAMS
    }

    fn summary(&self) -> &'static str {
        "Match `input` against a grok pattern and store every named capture."
    }

    fn prepare(
        &self,
        args: &Args<'_>,
        ctx: &PrepareContext<'_>,
    ) -> Result<Option<Prepared>, FuncError> {
        let Ok(pattern) = args.string(1) else {
            return Ok(None);
        };
        let matcher = ctx.patterns.compile(&pattern, ctx.local)?;
        Ok(Some(Prepared::Grok(matcher)))
    }

    fn call(&self, args: &Args<'_>, ctx: &mut CallContext<'_>) -> Result<(), FuncError> {
        let input = args.key(0)?;
        let pattern = args.string(1)?;

        let matcher = match ctx.prepared {
            Some(Prepared::Grok(m)) => Cow::Borrowed(m),
            _ => Cow::Owned(
                ctx.services
                    .patterns
                    .compile(&pattern, ctx.local_patterns)?,
            ),
        };

        let text = ctx.text(&input)?;
        match matcher.matches(&text) {
            Some(captures) => {
                for (field, value) in captures {
                    ctx.record.set(field, value);
                }
            }
            None => tracing::debug!(input = %input, pattern = %pattern, "grok did not match"),
        }
        Ok(())
    }
}

/// `add_pattern(name, pattern)`
///
/// Declarations are collected from the whole script before any grok pattern
/// is compiled; the call itself does nothing at run time.
pub struct AddPattern;

impl Function for AddPattern {
    fn name(&self) -> &'static str {
        "add_pattern"
    }

    fn params(&self) -> &'static [Param] {
        ADD_PATTERN_PARAMS
    }

    fn summary(&self) -> &'static str {
        "Define a script-local grok pattern usable as %{name}."
    }

    fn declare(&self, args: &Args<'_>, patterns: &mut PatternSet) -> Result<(), FuncError> {
        if let (Ok(name), Ok(pattern)) = (args.string(0), args.string(1)) {
            patterns.insert(name, pattern);
        }
        Ok(())
    }

    fn call(&self, args: &Args<'_>, _ctx: &mut CallContext<'_>) -> Result<(), FuncError> {
        args.string(0)?;
        args.string(1)?;
        Ok(())
    }
}
