//! Run a script file over input lines.

use std::path::{Path, PathBuf};

use super::CliError;
use crate::{output::record_to_json, Engine, EngineConfig};

#[derive(Debug, Clone, Default)]
pub struct CheckOptions {
    /// Script file to compile
    pub script: PathBuf,
    /// Input text; each non-empty line is one record
    pub input: Option<String>,
    pub pretty: bool,
    /// Only compile, don't run
    pub syntax_only: bool,
    /// Engine configuration file (TOML)
    pub config: Option<PathBuf>,
}

#[derive(Debug)]
pub enum CheckResult {
    SyntaxValid,
    Records(Vec<LineResult>),
}

/// Result of running the script over one input line.
#[derive(Debug, Clone, PartialEq)]
pub struct LineResult {
    /// The resulting record as JSON
    pub output: String,
    pub dropped: bool,
    pub error: Option<String>,
}

/// Engine built from `config`, or the default engine.
pub fn load_engine(config: Option<&Path>) -> Result<Engine, CliError> {
    match config {
        Some(path) => Ok(Engine::from_config(EngineConfig::load(path)?)?),
        None => Ok(Engine::new()),
    }
}

pub fn execute_check(options: &CheckOptions) -> Result<CheckResult, CliError> {
    let engine = load_engine(options.config.as_deref())?;
    let script = engine.compile_file(&options.script)?;

    if options.syntax_only {
        return Ok(CheckResult::SyntaxValid);
    }

    let input = options.input.as_ref().ok_or(CliError::NoInput)?;

    let records = input
        .lines()
        .filter(|line| !line.trim().is_empty())
        .map(|line| {
            let outcome = script.run(line);
            LineResult {
                output: record_to_json(&outcome.record, options.pretty),
                dropped: outcome.dropped,
                error: outcome.error.map(|e| e.to_string()),
            }
        })
        .collect();

    Ok(CheckResult::Records(records))
}
