//! Function dispatch.
//!
//! Every statement of a script is a call into the [`FunctionTable`]. A
//! handler implements [`Function`]: it declares its parameters (used to bind
//! positional and `name=value` arguments), a [`FailurePolicy`], and the call
//! itself, which validates the argument nodes and mutates the record.
//!
//! # Failure policy
//!
//! | error                                   | `FailFast` | `BestEffort` |
//! |-----------------------------------------|------------|--------------|
//! | arity, argument node kind, bad literal  | fatal      | fatal        |
//! | input key missing                       | soft       | soft         |
//! | anything else at run time               | fatal      | soft         |
//!
//! A fatal error stops the run. A soft error is logged (sampled) and the
//! run continues with the next statement.

mod cast;
mod control;
mod enrich;
mod expr;
mod grok;
mod group;
mod json;
mod keys;
mod strfmt;
mod text;
mod time;

use std::collections::HashMap;
use std::sync::Arc;

use regex::Regex;
use thiserror::Error;

use crate::{
    ast::{FuncCall, Node},
    config::Zone,
    enrich::{GeoResolver, RegexUserAgentParser, UserAgentParser},
    evaluator::EvalError,
    grok::{GrokError, GrokMatcher, PatternRegistry, PatternSet},
    logging::SoftErrorSampler,
    record::Record,
    value::Value,
};

pub use cast::cast_value;
pub use strfmt::sprintf;
pub use text::query_unescape;
pub use time::{parse_go_duration, parse_timestamp};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailurePolicy {
    /// Runtime errors abort the run
    FailFast,
    /// Runtime errors are logged and the statement is skipped
    BestEffort,
}

#[derive(Debug, Error)]
pub enum FuncError {
    #[error("{function}() expects {expected} arguments, got {got}")]
    Arity {
        function: &'static str,
        expected: String,
        got: usize,
    },

    #[error("{function}() argument `{param}` expects {expected}, got {found}")]
    ArgType {
        function: &'static str,
        param: &'static str,
        expected: &'static str,
        found: &'static str,
    },

    #[error("{function}() has no parameter named `{name}`")]
    UnknownKeyword { function: &'static str, name: String },

    #[error("{function}() argument `{param}` given more than once")]
    DuplicateArg {
        function: &'static str,
        param: &'static str,
    },

    #[error("{function}(): {message}")]
    InvalidLiteral {
        function: &'static str,
        message: String,
    },

    #[error("key `{0}` not found")]
    MissingKey(String),

    #[error("{function}(): {message}")]
    Runtime {
        function: &'static str,
        message: String,
    },

    #[error(transparent)]
    Eval(#[from] EvalError),

    #[error(transparent)]
    Grok(#[from] GrokError),

    #[error("invalid regex: {0}")]
    Regex(#[from] regex::Error),
}

impl FuncError {
    pub fn runtime(function: &'static str, message: impl Into<String>) -> Self {
        FuncError::Runtime {
            function,
            message: message.into(),
        }
    }

    pub fn invalid(function: &'static str, message: impl Into<String>) -> Self {
        FuncError::InvalidLiteral {
            function,
            message: message.into(),
        }
    }

    /// Whether this error stops the run for a function with `policy`.
    pub fn is_fatal(&self, policy: FailurePolicy) -> bool {
        match self {
            FuncError::Arity { .. }
            | FuncError::ArgType { .. }
            | FuncError::UnknownKeyword { .. }
            | FuncError::DuplicateArg { .. }
            | FuncError::InvalidLiteral { .. } => true,
            FuncError::MissingKey(_) => false,
            _ => policy == FailurePolicy::FailFast,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamKind {
    Required,
    Optional,
    /// Collects every remaining positional argument; must be last
    Variadic,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Param {
    pub name: &'static str,
    pub kind: ParamKind,
}

impl Param {
    pub const fn required(name: &'static str) -> Self {
        Param {
            name,
            kind: ParamKind::Required,
        }
    }

    pub const fn optional(name: &'static str) -> Self {
        Param {
            name,
            kind: ParamKind::Optional,
        }
    }

    pub const fn variadic(name: &'static str) -> Self {
        Param {
            name,
            kind: ParamKind::Variadic,
        }
    }
}

/// Work done once per call site when a script is compiled.
#[derive(Debug, Clone)]
pub enum Prepared {
    Grok(GrokMatcher),
    Regex(Regex),
}

/// Engine services shared by every script compiled from one engine.
#[derive(Clone)]
pub struct Services {
    pub patterns: Arc<PatternRegistry>,
    pub geo: Option<Arc<dyn GeoResolver>>,
    pub user_agent: Arc<dyn UserAgentParser>,
    pub zone: Zone,
    pub soft_errors: Arc<SoftErrorSampler>,
}

impl Default for Services {
    fn default() -> Self {
        Services {
            patterns: Arc::new(PatternRegistry::new()),
            geo: None,
            user_agent: Arc::new(RegexUserAgentParser::new()),
            zone: Zone::Local,
            soft_errors: Arc::new(SoftErrorSampler::default()),
        }
    }
}

/// Flags a handler can raise to steer the runner.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Control {
    /// The record should be discarded by the caller
    pub dropped: bool,
    /// Stop executing the remaining statements
    pub exit: bool,
}

pub struct PrepareContext<'a> {
    pub patterns: &'a PatternRegistry,
    pub local: &'a PatternSet,
}

pub struct CallContext<'a> {
    pub record: &'a mut Record,
    pub services: &'a Services,
    pub local_patterns: &'a PatternSet,
    pub prepared: Option<&'a Prepared>,
    pub control: &'a mut Control,
}

impl CallContext<'_> {
    /// Value stored under `key`, which may be `nil`.
    pub fn value(&self, key: &str) -> Result<&Value, FuncError> {
        self.record
            .get(key)
            .ok_or_else(|| FuncError::MissingKey(key.to_string()))
    }

    /// Text form of the value under `key`. `nil` counts as missing.
    pub fn text(&self, key: &str) -> Result<String, FuncError> {
        match self.value(key)? {
            Value::Null => Err(FuncError::MissingKey(key.to_string())),
            v => Ok(v.as_string()),
        }
    }
}

/// A built-in (or test-substituted) function.
pub trait Function: Send + Sync {
    /// Lowercase name scripts call it by.
    fn name(&self) -> &'static str;

    fn params(&self) -> &'static [Param];

    fn policy(&self) -> FailurePolicy {
        FailurePolicy::BestEffort
    }

    /// One-line description for the function reference.
    fn summary(&self) -> &'static str {
        ""
    }

    /// Compile-time declarations made by this call, visible to every call
    /// of the script regardless of position.
    fn declare(&self, _args: &Args<'_>, _patterns: &mut PatternSet) -> Result<(), FuncError> {
        Ok(())
    }

    /// Compile-time work for one call site. Errors fail the compile.
    fn prepare(
        &self,
        _args: &Args<'_>,
        _ctx: &PrepareContext<'_>,
    ) -> Result<Option<Prepared>, FuncError> {
        Ok(None)
    }

    fn call(&self, args: &Args<'_>, ctx: &mut CallContext<'_>) -> Result<(), FuncError>;
}

/// Call arguments bound to a function's declared parameters.
#[derive(Debug)]
pub struct Args<'a> {
    function: &'static str,
    params: &'static [Param],
    slots: Vec<Option<&'a Node>>,
    rest: Vec<&'a Node>,
}

impl<'a> Args<'a> {
    pub fn bind(function: &dyn Function, call: &'a FuncCall) -> Result<Self, FuncError> {
        let name = function.name();
        let params = function.params();
        let variadic = params.iter().position(|p| p.kind == ParamKind::Variadic);

        let mut slots: Vec<Option<&'a Node>> = vec![None; params.len()];
        let mut rest = Vec::new();
        let mut positional = 0;

        for arg in &call.args {
            match arg {
                Node::KeywordArg { name: kw, value } => {
                    let index = params
                        .iter()
                        .position(|p| p.name == kw.as_str())
                        .ok_or_else(|| FuncError::UnknownKeyword {
                            function: name,
                            name: kw.clone(),
                        })?;
                    if Some(index) == variadic {
                        rest.push(value.as_ref());
                    } else if slots[index].replace(value.as_ref()).is_some() {
                        return Err(FuncError::DuplicateArg {
                            function: name,
                            param: params[index].name,
                        });
                    }
                }
                node => {
                    match variadic {
                        Some(v) if positional >= v => rest.push(node),
                        _ if positional < params.len() => {
                            if slots[positional].replace(node).is_some() {
                                return Err(FuncError::DuplicateArg {
                                    function: name,
                                    param: params[positional].name,
                                });
                            }
                        }
                        _ => {
                            return Err(arity_error(name, params, call.args.len()));
                        }
                    }
                    positional += 1;
                }
            }
        }

        let missing_required = params
            .iter()
            .zip(&slots)
            .any(|(p, slot)| p.kind == ParamKind::Required && slot.is_none());
        if missing_required {
            return Err(arity_error(name, params, call.args.len()));
        }

        Ok(Args {
            function: name,
            params,
            slots,
            rest,
        })
    }

    pub fn function(&self) -> &'static str {
        self.function
    }

    pub fn get(&self, index: usize) -> Option<&'a Node> {
        self.slots.get(index).copied().flatten()
    }

    /// Arguments collected by the variadic parameter.
    pub fn rest(&self) -> &[&'a Node] {
        &self.rest
    }

    fn param_name(&self, index: usize) -> &'static str {
        self.params.get(index).map(|p| p.name).unwrap_or("?")
    }

    fn type_error(&self, index: usize, expected: &'static str, node: &Node) -> FuncError {
        FuncError::ArgType {
            function: self.function,
            param: self.param_name(index),
            expected,
            found: node.kind(),
        }
    }

    fn required(&self, index: usize) -> Result<&'a Node, FuncError> {
        self.get(index).ok_or_else(|| FuncError::Arity {
            function: self.function,
            expected: arity_description(self.params),
            got: self.slots.iter().flatten().count() + self.rest.len(),
        })
    }

    /// Any argument node.
    pub fn node(&self, index: usize) -> Result<&'a Node, FuncError> {
        self.required(index)
    }

    /// A record key: identifier, attribute path, index path or string.
    pub fn key(&self, index: usize) -> Result<String, FuncError> {
        let node = self.required(index)?;
        node.key_name()
            .ok_or_else(|| self.type_error(index, "a key", node))
    }

    pub fn opt_key(&self, index: usize) -> Result<Option<String>, FuncError> {
        match self.get(index) {
            None => Ok(None),
            Some(_) => self.key(index).map(Some),
        }
    }

    /// A string literal.
    pub fn string(&self, index: usize) -> Result<String, FuncError> {
        match self.required(index)? {
            Node::String(s) => Ok(s.clone()),
            other => Err(self.type_error(index, "a string literal", other)),
        }
    }

    pub fn opt_string(&self, index: usize) -> Result<Option<String>, FuncError> {
        match self.get(index) {
            None => Ok(None),
            Some(_) => self.string(index).map(Some),
        }
    }

    /// A string, number, bool or nil literal.
    pub fn literal(&self, index: usize) -> Result<Value, FuncError> {
        let node = self.required(index)?;
        literal_value(node).ok_or_else(|| self.type_error(index, "a literal", node))
    }

    /// A list literal.
    pub fn list(&self, index: usize) -> Result<&'a [Node], FuncError> {
        match self.required(index)? {
            Node::List(items) => Ok(items),
            other => Err(self.type_error(index, "a list", other)),
        }
    }

    pub fn opt_list(&self, index: usize) -> Result<Option<&'a [Node]>, FuncError> {
        match self.get(index) {
            None => Ok(None),
            Some(_) => self.list(index).map(Some),
        }
    }
}

/// Value of a literal node, or `None` for any other node kind.
pub fn literal_value(node: &Node) -> Option<Value> {
    match node {
        Node::String(s) => Some(Value::String(s.clone())),
        Node::Integer(n) => Some(Value::Integer(*n)),
        Node::Float(n) => Some(Value::Float(*n)),
        Node::Boolean(b) => Some(Value::Boolean(*b)),
        Node::Nil => Some(Value::Null),
        _ => None,
    }
}

fn arity_description(params: &[Param]) -> String {
    let required = params
        .iter()
        .filter(|p| p.kind == ParamKind::Required)
        .count();
    let optional = params
        .iter()
        .filter(|p| p.kind == ParamKind::Optional)
        .count();

    if params.iter().any(|p| p.kind == ParamKind::Variadic) {
        format!("at least {}", required)
    } else if optional == 0 {
        required.to_string()
    } else {
        format!("{} to {}", required, required + optional)
    }
}

fn arity_error(function: &'static str, params: &[Param], got: usize) -> FuncError {
    FuncError::Arity {
        function,
        expected: arity_description(params),
        got,
    }
}

/// Name-to-handler table. Lookup is case-insensitive.
#[derive(Clone, Default)]
pub struct FunctionTable {
    functions: HashMap<String, Arc<dyn Function>>,
}

impl FunctionTable {
    /// An empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Table with every built-in function registered.
    pub fn builtin() -> Self {
        let mut table = Self::new();

        table.register(keys::AddKey);
        table.register(keys::DropKey);
        table.register(keys::DropOriginData);
        table.register(keys::Rename);
        table.register(keys::NullIf);
        table.register(grok::Grok);
        table.register(grok::AddPattern);
        table.register(json::Json);
        table.register(json::JsonAll);
        table.register(cast::Cast);
        table.register(group::GroupBetween);
        table.register(group::GroupIn);
        table.register(expr::Expr);
        table.register(strfmt::Strfmt);
        table.register(text::Uppercase);
        table.register(text::Lowercase);
        table.register(text::Trim);
        table.register(text::Replace);
        table.register(text::Cover);
        table.register(text::UrlDecode);
        table.register(time::DefaultTime);
        table.register(time::DefaultTimeWithFmt);
        table.register(time::DateTime);
        table.register(time::ParseDate);
        table.register(time::AdjustTimezone);
        table.register(time::ParseDuration);
        table.register(time::DurationPrecision);
        table.register(enrich::GeoIp);
        table.register(enrich::UserAgent);
        table.register(control::DropRecord);
        table.register(control::Exit);

        table
    }

    /// Register `function`, replacing any handler with the same name.
    pub fn register(&mut self, function: impl Function + 'static) -> Option<Arc<dyn Function>> {
        self.register_arc(Arc::new(function))
    }

    pub fn register_arc(&mut self, function: Arc<dyn Function>) -> Option<Arc<dyn Function>> {
        self.functions
            .insert(function.name().to_lowercase(), function)
    }

    pub fn remove(&mut self, name: &str) -> Option<Arc<dyn Function>> {
        self.functions.remove(&name.to_lowercase())
    }

    pub fn get(&self, name: &str) -> Option<&Arc<dyn Function>> {
        self.functions.get(&name.to_lowercase())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Handlers sorted by name.
    pub fn iter(&self) -> impl Iterator<Item = &Arc<dyn Function>> {
        let mut all: Vec<_> = self.functions.values().collect();
        all.sort_by_key(|f| f.name());
        all.into_iter()
    }

    pub fn len(&self) -> usize {
        self.functions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
    }
}

/// Signature line for the function reference, e.g.
/// `group_between(key, range, value, [new_key])`.
pub fn signature(function: &dyn Function) -> String {
    let params: Vec<String> = function
        .params()
        .iter()
        .map(|p| match p.kind {
            ParamKind::Required => p.name.to_string(),
            ParamKind::Optional => format!("[{}]", p.name),
            ParamKind::Variadic => format!("{}...", p.name),
        })
        .collect();
    format!("{}({})", function.name(), params.join(", "))
}
