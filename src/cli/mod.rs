//! Command-line support for `datakit-pl`.
//!
//! Kept in the library so the check and reference commands can be driven
//! from tests or embedded in other tools.

mod check;
mod docs;

pub use check::{execute_check, load_engine, CheckOptions, CheckResult, LineResult};
pub use docs::{function_doc, functions_overview};

use std::io;

use thiserror::Error;

use crate::{CompileError, ConfigError, EngineError};

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Compile(#[from] CompileError),

    #[error(transparent)]
    Engine(#[from] EngineError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("No input provided. Use --input or pipe text to stdin.")]
    NoInput,

    #[error("Unknown function: '{0}'\nRun 'datakit-pl funcs' to list functions.")]
    UnknownFunction(String),
}
