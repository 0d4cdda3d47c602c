//! Compiling and running scripts.
//!
//! An [`Engine`] owns the function table and the shared services (pattern
//! registry, geo resolver, user-agent parser, time zone). Compiling a source
//! text yields an immutable [`Script`] that can be run any number of times,
//! from any number of threads; every run starts from a fresh record and
//! returns everything it produced in an [`Outcome`].
//!
//! ```
//! use datakit_pipeline::{Engine, Value};
//!
//! let engine = Engine::new();
//! let script = engine
//!     .compile(r#"
//!         add_pattern("_hour", "(?:2[0123]|[01]?[0-9])")
//!         grok(_, "%{_hour:hour}:%{INT:minute}")
//!         cast(hour, "int")
//!     "#)
//!     .unwrap();
//!
//! let outcome = script.run("12:13");
//! assert!(outcome.error.is_none());
//! assert_eq!(outcome.record.get("hour"), Some(&Value::Integer(12)));
//! assert_eq!(outcome.record.get("minute"), Some(&Value::from("13")));
//! ```

use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::io;
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use thiserror::Error;

use crate::{
    ast::{FuncCall, Node, Stmt},
    config::{ConfigError, EngineConfig, Zone},
    enrich::{CidrGeoTable, GeoError, GeoResolver, UserAgentParser},
    evaluator::{panic_message, Evaluator},
    functions::{
        Args, CallContext, Control, FuncError, FunctionTable, PrepareContext, Prepared, Services,
    },
    grok::{GrokError, PatternRegistry, PatternSet},
    logging::SoftErrorSampler,
    parser::{parse_script, ParseError},
    record::Record,
    value::Value,
};

/// Failure to build an engine from configuration.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Patterns(#[from] GrokError),

    #[error(transparent)]
    Geo(#[from] GeoError),
}

#[derive(Debug, Error)]
pub enum CompileError {
    #[error("syntax error at {0}")]
    Syntax(#[from] ParseError),

    #[error("line {line}: {source}")]
    Prepare {
        function: String,
        line: usize,
        #[source]
        source: FuncError,
    },

    #[error("failed to read script {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("{file}: {source}")]
    InFile {
        file: String,
        #[source]
        source: Box<CompileError>,
    },
}

/// Why a run stopped early.
#[derive(Debug, Error)]
pub enum RunError {
    #[error("line {line}: unknown function `{name}`")]
    UnknownFunction { name: String, line: usize },

    #[error("line {line}: {source}")]
    Function {
        function: String,
        line: usize,
        #[source]
        source: FuncError,
    },

    #[error("run panicked: {0}")]
    Panic(String),
}

/// Result of one run.
#[derive(Debug)]
pub struct Outcome {
    /// The record as the run left it, also when it stopped on an error
    pub record: Record,
    pub error: Option<RunError>,
    /// Set by `drop()`
    pub dropped: bool,
}

impl Outcome {
    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }
}

/// A line-protocol point, run as
/// `{"measurement": .., "tags": {..}, <fields>.., "time": <unix ns>}`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Point {
    pub measurement: String,
    pub tags: BTreeMap<String, String>,
    pub fields: BTreeMap<String, Value>,
    /// Unix nanoseconds
    pub time: i64,
}

impl Point {
    pub fn new(measurement: impl Into<String>) -> Self {
        Point {
            measurement: measurement.into(),
            ..Point::default()
        }
    }

    pub fn tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.tags.insert(key.into(), value.into());
        self
    }

    pub fn field(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(key.into(), value.into());
        self
    }

    pub fn at(mut self, time: i64) -> Self {
        self.time = time;
        self
    }

    /// JSON object text the point is run as. Tags are omitted when empty;
    /// fields sit at the top level.
    pub fn to_json(&self) -> String {
        let mut object = serde_json::Map::new();
        object.insert(
            "measurement".to_string(),
            serde_json::Value::String(self.measurement.clone()),
        );
        if !self.tags.is_empty() {
            let tags = self
                .tags
                .iter()
                .map(|(k, v)| (k.clone(), serde_json::Value::String(v.clone())))
                .collect();
            object.insert("tags".to_string(), serde_json::Value::Object(tags));
        }
        for (key, value) in &self.fields {
            object.insert(key.clone(), serde_json::Value::from(value.clone()));
        }
        object.insert("time".to_string(), serde_json::Value::from(self.time));
        serde_json::Value::Object(object).to_string()
    }
}

/// Compiles scripts against a function table and a set of services.
///
/// Cloning is cheap. Changing a clone's function table or services does not
/// affect the original or any script already compiled; the engine-wide
/// pattern layer is shared between clones.
#[derive(Clone)]
pub struct Engine {
    config: EngineConfig,
    services: Arc<Services>,
    functions: Arc<FunctionTable>,
}

impl Default for Engine {
    fn default() -> Self {
        Engine {
            config: EngineConfig::default(),
            services: Arc::new(Services::default()),
            functions: Arc::new(FunctionTable::builtin()),
        }
    }
}

impl fmt::Debug for Engine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Engine")
            .field("config", &self.config)
            .field("functions", &self.functions.len())
            .finish()
    }
}

impl Engine {
    /// Engine with the built-in functions and default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build an engine from configuration: load pattern files into the
    /// engine-wide layer, load the geo table and set the time zone.
    pub fn from_config(config: EngineConfig) -> Result<Self, EngineError> {
        let zone = config.zone()?;

        let patterns = PatternRegistry::new();
        for file in &config.pattern_files {
            patterns.load_file(file)?;
        }

        let geo = match &config.geo_table {
            Some(path) => Some(Arc::new(CidrGeoTable::load(path)?) as Arc<dyn GeoResolver>),
            None => None,
        };

        let services = Services {
            patterns: Arc::new(patterns),
            geo,
            zone,
            soft_errors: Arc::new(SoftErrorSampler::new(config.soft_error_log)),
            ..Services::default()
        };

        Ok(Engine {
            config,
            services: Arc::new(services),
            functions: Arc::new(FunctionTable::builtin()),
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn services(&self) -> &Services {
        &self.services
    }

    /// Engine-wide grok patterns. Patterns added here are visible to
    /// scripts compiled afterwards.
    pub fn patterns(&self) -> &PatternRegistry {
        &self.services.patterns
    }

    pub fn functions(&self) -> &FunctionTable {
        &self.functions
    }

    /// Mutable access to the function table, e.g. to substitute a handler
    /// in tests.
    pub fn function_table_mut(&mut self) -> &mut FunctionTable {
        Arc::make_mut(&mut self.functions)
    }

    pub fn set_geo_resolver(&mut self, resolver: Arc<dyn GeoResolver>) {
        Arc::make_mut(&mut self.services).geo = Some(resolver);
    }

    pub fn set_user_agent_parser(&mut self, parser: Arc<dyn UserAgentParser>) {
        Arc::make_mut(&mut self.services).user_agent = parser;
    }

    pub fn set_zone(&mut self, zone: Zone) {
        Arc::make_mut(&mut self.services).zone = zone;
    }

    /// Parse `source`, collect its `add_pattern` declarations and do every
    /// call site's compile-time work (grok patterns, regexes).
    ///
    /// Calls to unknown functions and calls with unbindable arguments are
    /// not compile errors; they fail when the run reaches them.
    pub fn compile(&self, source: &str) -> Result<Script, CompileError> {
        let statements = parse_script(source)?;

        let mut local = PatternSet::new();
        let mut calls = Vec::new();
        for stmt in &statements {
            stmt.walk_calls(&mut |call| calls.push(call));
        }
        for call in calls {
            let Some(function) = self.functions.get(&call.name) else {
                continue;
            };
            if let Ok(args) = Args::bind(function.as_ref(), call) {
                function
                    .declare(&args, &mut local)
                    .map_err(|source| prepare_error(call, source))?;
            }
        }

        let ctx = PrepareContext {
            patterns: &self.services.patterns,
            local: &local,
        };
        let compiled = statements
            .into_iter()
            .map(|stmt| self.compile_stmt(stmt, &ctx))
            .collect::<Result<Vec<_>, _>>()?;

        tracing::debug!(
            statements = compiled.len(),
            local_patterns = local.len(),
            "compiled pipeline script"
        );

        Ok(Script {
            statements: Arc::new(compiled),
            local_patterns: Arc::new(local),
            functions: Arc::clone(&self.functions),
            services: Arc::clone(&self.services),
        })
    }

    /// Read and compile a script file. Errors name the file.
    pub fn compile_file(&self, path: impl AsRef<Path>) -> Result<Script, CompileError> {
        let path = path.as_ref();
        let source = fs::read_to_string(path).map_err(|source| CompileError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        self.compile(&source).map_err(|e| CompileError::InFile {
            file: path.display().to_string(),
            source: Box::new(e),
        })
    }

    fn compile_stmt(&self, stmt: Stmt, ctx: &PrepareContext<'_>) -> Result<Compiled, CompileError> {
        match stmt {
            Stmt::Call(call) => {
                let prepared = match self.functions.get(&call.name) {
                    Some(function) => match Args::bind(function.as_ref(), &call) {
                        Ok(args) => function
                            .prepare(&args, ctx)
                            .map_err(|source| prepare_error(&call, source))?,
                        Err(_) => None,
                    },
                    None => None,
                };
                Ok(Compiled::Call { call, prepared })
            }
            Stmt::IfElse {
                branches,
                otherwise,
            } => {
                let branches = branches
                    .into_iter()
                    .map(|branch| {
                        let body = self.compile_block(branch.body, ctx)?;
                        Ok(Branch {
                            condition: branch.condition,
                            line: branch.line,
                            body,
                        })
                    })
                    .collect::<Result<Vec<_>, CompileError>>()?;
                let otherwise = otherwise
                    .map(|body| self.compile_block(body, ctx))
                    .transpose()?;
                Ok(Compiled::IfElse {
                    branches,
                    otherwise,
                })
            }
        }
    }

    fn compile_block(
        &self,
        body: Vec<Stmt>,
        ctx: &PrepareContext<'_>,
    ) -> Result<Vec<Compiled>, CompileError> {
        body.into_iter()
            .map(|stmt| self.compile_stmt(stmt, ctx))
            .collect()
    }
}

fn prepare_error(call: &FuncCall, source: FuncError) -> CompileError {
    CompileError::Prepare {
        function: call.name.clone(),
        line: call.line,
        source,
    }
}

enum Compiled {
    Call {
        call: FuncCall,
        prepared: Option<Prepared>,
    },
    IfElse {
        branches: Vec<Branch>,
        otherwise: Option<Vec<Compiled>>,
    },
}

struct Branch {
    condition: Node,
    line: usize,
    body: Vec<Compiled>,
}

/// A compiled script. Immutable; cheap to clone and safe to share across
/// threads.
#[derive(Clone)]
pub struct Script {
    statements: Arc<Vec<Compiled>>,
    local_patterns: Arc<PatternSet>,
    functions: Arc<FunctionTable>,
    services: Arc<Services>,
}

impl fmt::Debug for Script {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Script")
            .field("statements", &self.statements.len())
            .field("local_patterns", &self.local_patterns)
            .finish()
    }
}

impl Script {
    /// Patterns declared by the script's `add_pattern` calls.
    pub fn local_patterns(&self) -> &PatternSet {
        &self.local_patterns
    }

    /// Run over one raw input line.
    pub fn run(&self, input: &str) -> Outcome {
        self.run_record(Record::new(input))
    }

    /// Run over a prepared record.
    pub fn run_record(&self, record: Record) -> Outcome {
        let mut runner = Runner {
            script: self,
            record,
            control: Control::default(),
        };

        let result = panic::catch_unwind(AssertUnwindSafe(|| runner.exec_block(&self.statements)));
        let error = match result {
            Ok(Ok(())) => None,
            Ok(Err(e)) => Some(e),
            Err(payload) => {
                let message = panic_message(payload.as_ref());
                tracing::error!(panic = %message, "pipeline run panicked");
                Some(RunError::Panic(message))
            }
        };

        Outcome {
            record: runner.record,
            error,
            dropped: runner.control.dropped,
        }
    }

    /// Run over a line-protocol point.
    pub fn run_point(&self, point: &Point) -> Outcome {
        self.run(&point.to_json())
    }
}

struct Runner<'a> {
    script: &'a Script,
    record: Record,
    control: Control,
}

impl Runner<'_> {
    fn exec_block(&mut self, statements: &[Compiled]) -> Result<(), RunError> {
        for stmt in statements {
            if self.control.exit {
                break;
            }
            match stmt {
                Compiled::Call { call, prepared } => self.exec_call(call, prepared.as_ref())?,
                Compiled::IfElse {
                    branches,
                    otherwise,
                } => self.exec_if(branches, otherwise.as_deref())?,
            }
        }
        Ok(())
    }

    fn exec_call(&mut self, call: &FuncCall, prepared: Option<&Prepared>) -> Result<(), RunError> {
        let script = self.script;
        let function = script
            .functions
            .get(&call.name)
            .ok_or_else(|| {
                tracing::error!(function = %call.name, line = call.line, "unknown function");
                RunError::UnknownFunction {
                    name: call.name.clone(),
                    line: call.line,
                }
            })?;

        let result = Args::bind(function.as_ref(), call).and_then(|args| {
            let mut ctx = CallContext {
                record: &mut self.record,
                services: &script.services,
                local_patterns: &script.local_patterns,
                prepared,
                control: &mut self.control,
            };
            function.call(&args, &mut ctx)
        });

        match result {
            Ok(()) => Ok(()),
            Err(e) if e.is_fatal(function.policy()) => {
                tracing::error!(function = %call.name, line = call.line, error = %e, "pipeline run failed");
                Err(RunError::Function {
                    function: call.name.clone(),
                    line: call.line,
                    source: e,
                })
            }
            Err(e) => {
                script.services.soft_errors.report(&call.name, call.line, &e);
                Ok(())
            }
        }
    }

    /// The first branch whose condition is `true` runs; `nil` counts as
    /// false. Any other result skips the whole statement.
    fn exec_if(&mut self, branches: &[Branch], otherwise: Option<&[Compiled]>) -> Result<(), RunError> {
        for branch in branches {
            let result = Evaluator::new(&self.record).calc(&branch.condition);
            let skip = match result {
                Ok(Value::Boolean(true)) => return self.exec_block(&branch.body),
                Ok(Value::Boolean(false)) | Ok(Value::Null) => continue,
                Ok(other) => format!(
                    "condition `{}` is {}, not bool",
                    branch.condition,
                    other.type_name()
                ),
                Err(e) => e.to_string(),
            };
            self.script.services.soft_errors.report("if", branch.line, &skip);
            return Ok(());
        }

        match otherwise {
            Some(body) => self.exec_block(body),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_point_json_layout() {
        let point = Point::new("cpu")
            .tag("host", "a")
            .field("usage", 0.5)
            .at(1_000);
        assert_eq!(
            point.to_json(),
            r#"{"measurement":"cpu","tags":{"host":"a"},"time":1000,"usage":0.5}"#
        );
        assert!(!Point::new("cpu").to_json().contains("tags"));
    }

    #[test]
    fn test_script_is_send_and_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Script>();
        assert_send_sync::<Engine>();
    }
}
