//! Single-script convenience wrapper.
//!
//! [`Pipeline`] pairs a compiled [`Script`] with the outcome of its most
//! recent run, for callers that process one input at a time and inspect the
//! result afterwards. Services that need many concurrent runs should share a
//! [`Script`] directly instead.
//!
//! ```
//! use datakit_pipeline::{Pipeline, Value};
//!
//! let mut pipeline = Pipeline::new(r#"json(_, status) cast(status, "int")"#).unwrap();
//! let (fields, error) = pipeline.run(r#"{"status": "503"}"#).result().unwrap();
//!
//! assert!(error.is_none());
//! assert_eq!(fields.get("status"), Some(&Value::Integer(503)));
//! ```

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use once_cell::sync::Lazy;

use crate::engine::{CompileError, Engine, Outcome, Point, RunError, Script};
use crate::value::Value;

static DEFAULT_ENGINE: Lazy<Engine> = Lazy::new(Engine::new);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    /// Compiled and not yet run
    Compiled,
    /// At least one run has finished
    Completed,
}

#[derive(Debug, Clone)]
pub struct Pipeline {
    script: Script,
    outcome: Option<OutcomeSlot>,
}

// `Outcome` is not `Clone`.
#[derive(Debug, Clone)]
struct OutcomeSlot(Arc<Outcome>);

impl Pipeline {
    /// Compile `source` against the process-wide default engine.
    pub fn new(source: &str) -> Result<Self, CompileError> {
        Self::with_engine(&DEFAULT_ENGINE, source)
    }

    pub fn with_engine(engine: &Engine, source: &str) -> Result<Self, CompileError> {
        Ok(Self::from_script(engine.compile(source)?))
    }

    /// Compile a script file. Relative names resolve against the engine's
    /// configured `pipeline_dir`.
    pub fn from_file(engine: &Engine, name: impl AsRef<Path>) -> Result<Self, CompileError> {
        let path = engine.config().pipeline_dir.join(name);
        Ok(Self::from_script(engine.compile_file(path)?))
    }

    pub fn from_script(script: Script) -> Self {
        Pipeline {
            script,
            outcome: None,
        }
    }

    pub fn script(&self) -> &Script {
        &self.script
    }

    pub fn state(&self) -> State {
        match self.outcome {
            Some(_) => State::Completed,
            None => State::Compiled,
        }
    }

    /// Run over one raw input line, replacing the previous outcome.
    pub fn run(&mut self, input: &str) -> &mut Self {
        let outcome = self.script.run(input);
        self.store(outcome)
    }

    pub fn run_point(&mut self, point: &Point) -> &mut Self {
        let outcome = self.script.run_point(point);
        self.store(outcome)
    }

    fn store(&mut self, outcome: Outcome) -> &mut Self {
        if let Some(err) = &outcome.error {
            tracing::debug!(error = %err, "pipeline run stopped early");
        }
        self.outcome = Some(OutcomeSlot(Arc::new(outcome)));
        self
    }

    /// Fields and error of the last run, or `None` before the first run.
    pub fn result(&self) -> Option<(&HashMap<String, Value>, Option<&RunError>)> {
        self.outcome()
            .map(|outcome| (outcome.record.fields(), outcome.error.as_ref()))
    }

    pub fn outcome(&self) -> Option<&Outcome> {
        self.outcome.as_ref().map(|slot| slot.0.as_ref())
    }

    pub fn last_error(&self) -> Option<&RunError> {
        self.outcome().and_then(|outcome| outcome.error.as_ref())
    }

    /// Whether the last run called `drop()`.
    pub fn is_dropped(&self) -> bool {
        self.outcome().is_some_and(|outcome| outcome.dropped)
    }
}
