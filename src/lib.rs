//! Pipeline scripts for parsing and re-tagging telemetry records.
//!
//! A script is a sequence of flat function calls and `if` chains that turn
//! one raw input line into a map of fields:
//!
//! ```
//! use datakit_pipeline::{Engine, Value};
//!
//! let engine = Engine::new();
//! let script = engine
//!     .compile(r#"
//!         grok(_, "%{IPORHOST:client} %{WORD:method} %{NUMBER:status:int}")
//!         if status >= 500 {
//!             add_key(severity, "error")
//!         }
//!     "#)
//!     .unwrap();
//!
//! let outcome = script.run("10.0.0.1 GET 503");
//! assert!(outcome.is_ok());
//! assert_eq!(outcome.record.get("status"), Some(&Value::Integer(503)));
//! assert_eq!(outcome.record.get("severity"), Some(&Value::String("error".into())));
//! ```
//!
//! An [`Engine`] holds the configuration, the function table and shared
//! services (grok patterns, geo table, user-agent parser, time zone).
//! [`Engine::compile`] produces an immutable [`Script`] that can be run from
//! many threads at once.

pub mod ast;
#[cfg(feature = "cli")]
pub mod cli;
pub mod config;
pub mod engine;
pub mod enrich;
pub mod evaluator;
pub mod functions;
pub mod grok;
pub mod lexer;
pub mod logging;
pub mod output;
pub mod parser;
pub mod path;
pub mod pipeline;
pub mod record;
pub mod value;

pub use ast::{BinOp, FuncCall, IfBranch, Node, Stmt, Token};
pub use config::{ConfigError, EngineConfig, Zone};
pub use engine::{CompileError, Engine, EngineError, Outcome, Point, RunError, Script};
pub use evaluator::{EvalError, Evaluator};
pub use functions::{FailurePolicy, FuncError, Function, FunctionTable};
pub use grok::{GrokError, PatternRegistry};
pub use lexer::{LexError, Lexer, Position};
pub use output::{record_to_json, to_json, to_json_pretty};
pub use parser::{parse_script, ParseError, Parser};
pub use pipeline::Pipeline;
pub use record::Record;
pub use value::Value;
