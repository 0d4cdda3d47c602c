//! # Pipeline Script - Abstract Syntax Tree
//!
//! This module defines the Abstract Syntax Tree (AST) for pipeline scripts,
//! the small language used to parse, transform and re-tag telemetry records
//! before they are forwarded.
//!
//! ## Architecture Overview
//!
//! - **[tokens]** - Lexical tokens produced by the lexer
//! - **[expressions]** - Argument and condition nodes (literals, key paths, operations)
//! - **[operators]** - Binary operators (arithmetic, comparison, logical)
//! - **[statements]** - Function calls and `if`/`elif`/`else` chains
//!
//! ## Quick Start
//!
//! ```text
//! add_pattern("_hour", "(?:2[0123]|[01]?[0-9])")
//! add_pattern("_minute", "(?:[0-5][0-9])")
//! grok(_, "%{_hour:hour}:%{_minute:minute}")
//! cast(hour, "int")
//! rename(new_hour, hour)
//! ```
//!
//! Each line is a function call that reads and mutates the current record.
//! Statements are separated by whitespace; no semicolons or braces are
//! needed outside of `if` blocks.
//!
//! ## Core Concepts
//!
//! ### Key References
//!
//! - `_` is the raw input text of the record
//! - `status` names a top-level key
//! - `a.b.c` names the literal key `"a.b.c"` if present, else walks nested maps
//! - `items[0]` and `.[2].x` index into JSON text when used as a `json()` path
//!
//! ### Flat Calls
//!
//! Function arguments cannot themselves be function calls:
//!
//! ```text
//! f1(g(1))      // parse error
//! ```
//!
//! ### Conditions
//!
//! ```text
//! if status >= 500 && method == "POST" {
//!     add_key(alert, true)
//! }
//! ```
pub mod expressions;
pub mod operators;
pub mod statements;
pub mod tokens;

pub use expressions::{FuncCall, Node};
pub use operators::BinOp;
pub use statements::{IfBranch, Stmt};
pub use tokens::Token;
