use std::fmt;

use crate::ast::BinOp;

/// Abstract Syntax Tree node for everything that can appear as a function
/// argument or an `if` condition.
///
/// Nodes are immutable once parsed and owned by the statement tree that
/// contains them.
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    // Literals
    /// Literal integer
    ///
    /// # Example
    /// ```text
    /// 200
    /// ```
    Integer(i64),

    /// Literal floating point number
    ///
    /// # Example
    /// ```text
    /// 2.5
    /// ```
    Float(f64),

    /// String literal
    ///
    /// # Example
    /// ```text
    /// "%{IP:client_ip}"
    /// ```
    String(String),

    /// Boolean literal
    Boolean(bool),

    /// `nil` / `null`
    Nil,

    // References
    /// Bare name. `_` refers to the raw input text.
    ///
    /// # Example
    /// ```text
    /// status
    /// ```
    Identifier(String),

    /// Dotted attribute path
    ///
    /// `a.b.c` parses left-nested: `Attr(Attr(a, b), c)`.
    Attr {
        object: Box<Node>,
        attr: Box<Node>,
    },

    /// Bracket indexing with integer literals
    ///
    /// # Examples
    /// ```text
    /// items[0]
    /// matrix[1][2]
    /// .[2]          // no object: index into the document root
    /// ```
    Index {
        object: Option<Box<Node>>,
        indices: Vec<i64>,
    },

    // Operations
    /// Binary operation (arithmetic, comparison, logical)
    BinaryOp {
        op: BinOp,
        left: Box<Node>,
        right: Box<Node>,
    },

    /// Parenthesised sub-expression
    Paren(Box<Node>),

    /// List literal
    ///
    /// # Example
    /// ```text
    /// [200, 299]
    /// ```
    List(Vec<Node>),

    /// Function call. Only valid as a statement; the parser rejects calls
    /// nested inside arguments.
    Call(FuncCall),

    /// `name=value` argument
    KeywordArg {
        name: String,
        value: Box<Node>,
    },
}

/// A function call statement.
#[derive(Debug, Clone, PartialEq)]
pub struct FuncCall {
    pub name: String,
    pub args: Vec<Node>,
    /// 1-based source line of the function name
    pub line: usize,
}

impl FuncCall {
    pub fn new(name: impl Into<String>, args: Vec<Node>) -> Self {
        FuncCall {
            name: name.into(),
            args,
            line: 0,
        }
    }
}

impl Node {
    /// Name of the node kind, used in argument type errors.
    pub fn kind(&self) -> &'static str {
        match self {
            Node::Integer(_) | Node::Float(_) => "NumberLiteral",
            Node::String(_) => "StringLiteral",
            Node::Boolean(_) => "BoolLiteral",
            Node::Nil => "NilLiteral",
            Node::Identifier(_) => "Identifier",
            Node::Attr { .. } => "AttrExpr",
            Node::Index { .. } => "IndexExpr",
            Node::BinaryOp { .. } => "BinaryExpr",
            Node::Paren(_) => "ParenExpr",
            Node::List(_) => "ListLiteral",
            Node::Call(_) => "FuncExpr",
            Node::KeywordArg { .. } => "KeywordArg",
        }
    }

    /// True for nodes that name a record key: identifiers, attribute paths
    /// and index expressions.
    pub fn is_key_ref(&self) -> bool {
        matches!(
            self,
            Node::Identifier(_) | Node::Attr { .. } | Node::Index { .. }
        )
    }

    /// Render a key reference the way it is stored in the record.
    ///
    /// String literals render unquoted so `"a.b"` and `a.b` address the same
    /// key. Returns `None` for nodes that cannot name a key.
    pub fn key_name(&self) -> Option<String> {
        match self {
            Node::String(s) => Some(s.clone()),
            Node::Identifier(_) | Node::Attr { .. } | Node::Index { .. } => Some(self.to_string()),
            _ => None,
        }
    }
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Node::Integer(n) => write!(f, "{}", n),
            Node::Float(n) => write!(f, "{:?}", n),
            Node::String(s) => write!(f, "{:?}", s),
            Node::Boolean(b) => write!(f, "{}", b),
            Node::Nil => f.write_str("nil"),
            Node::Identifier(name) => f.write_str(name),
            Node::Attr { object, attr } => write!(f, "{}.{}", object, attr),
            Node::Index { object, indices } => {
                if let Some(object) = object {
                    write!(f, "{}", object)?;
                }
                for idx in indices {
                    write!(f, "[{}]", idx)?;
                }
                Ok(())
            }
            Node::BinaryOp { op, left, right } => write!(f, "{} {} {}", left, op, right),
            Node::Paren(inner) => write!(f, "({})", inner),
            Node::List(items) => {
                f.write_str("[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                f.write_str("]")
            }
            Node::Call(call) => write!(f, "{}", call),
            Node::KeywordArg { name, value } => write!(f, "{}={}", name, value),
        }
    }
}

impl fmt::Display for FuncCall {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}(", self.name)?;
        for (i, arg) in self.args.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{}", arg)?;
        }
        f.write_str(")")
    }
}
