use std::fmt;

use crate::ast::{FuncCall, Node};

/// Top-level script statement.
///
/// A script is an ordered sequence of statements executed against one record.
#[derive(Debug, Clone, PartialEq)]
pub enum Stmt {
    /// Function call
    ///
    /// # Example
    /// ```text
    /// grok(_, "%{IPORHOST:client} %{GREEDYDATA:rest}")
    /// ```
    Call(FuncCall),

    /// Conditional chain
    ///
    /// # Example
    /// ```text
    /// if status >= 500 {
    ///     add_key(level, "error")
    /// } elif status >= 400 {
    ///     add_key(level, "warn")
    /// } else {
    ///     add_key(level, "info")
    /// }
    /// ```
    IfElse {
        branches: Vec<IfBranch>,
        otherwise: Option<Vec<Stmt>>,
    },
}

/// One `if`/`elif` arm.
#[derive(Debug, Clone, PartialEq)]
pub struct IfBranch {
    pub condition: Node,
    pub body: Vec<Stmt>,
    /// 1-based source line of the condition
    pub line: usize,
}

impl Stmt {
    /// Visit every function call in this statement, including calls nested
    /// in `if` blocks.
    pub fn walk_calls<'a>(&'a self, visit: &mut dyn FnMut(&'a FuncCall)) {
        match self {
            Stmt::Call(call) => visit(call),
            Stmt::IfElse {
                branches,
                otherwise,
            } => {
                for branch in branches {
                    for stmt in &branch.body {
                        stmt.walk_calls(visit);
                    }
                }
                if let Some(stmts) = otherwise {
                    for stmt in stmts {
                        stmt.walk_calls(visit);
                    }
                }
            }
        }
    }
}

impl fmt::Display for Stmt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stmt::Call(call) => write!(f, "{}", call),
            Stmt::IfElse {
                branches,
                otherwise,
            } => {
                for (i, branch) in branches.iter().enumerate() {
                    let keyword = if i == 0 { "if" } else { " elif" };
                    write!(f, "{} {} {{", keyword, branch.condition)?;
                    for stmt in &branch.body {
                        write!(f, " {}", stmt)?;
                    }
                    f.write_str(" }")?;
                }
                if let Some(stmts) = otherwise {
                    f.write_str(" else {")?;
                    for stmt in stmts {
                        write!(f, " {}", stmt)?;
                    }
                    f.write_str(" }")?;
                }
                Ok(())
            }
        }
    }
}
