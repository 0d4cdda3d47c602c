#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    // Literals
    /// Floating point number
    ///
    /// # Examples
    /// ```text
    /// 2.5
    /// 1e3
    /// ```
    Float(f64),

    /// Integer
    ///
    /// # Examples
    /// ```text
    /// 42
    /// 200
    /// ```
    Integer(i64),

    /// String literal in single, double or triple quotes
    ///
    /// # Examples
    /// ```text
    /// "ok"
    /// '%{IP:client}'
    /// """
    /// multi-line
    /// """
    /// ```
    String(String),

    /// Boolean values
    Boolean(bool),

    /// `nil` or `null`
    Nil,

    // Identifiers
    /// Field name or function name
    ///
    /// Starts with a letter or underscore, followed by letters, digits or
    /// underscores. Backquoted names may contain any character except a
    /// backquote.
    ///
    /// # Examples
    /// ```text
    /// status
    /// _
    /// `request-id`
    /// ```
    Identifier(String),

    // Keywords
    /// `if`
    If,

    /// `elif`
    Elif,

    /// `else`
    Else,

    // Operators
    /// Keyword argument binding inside a call: `f(name=value)`
    Assign,

    // Comparison
    /// Equality operator
    EqEq,

    /// Inequality operator
    NotEq,

    /// Less than
    Lt,

    /// Greater than
    Gt,

    /// Less than or equal
    LtEq,

    /// Greater than or equal
    GtEq,

    // Arithmetic
    /// Addition
    Plus,

    /// Subtraction or unary minus
    Minus,

    /// Multiplication
    Star,

    /// Division
    Slash,

    /// Modulo
    Percent,

    // Logical
    /// Logical AND (`&&`)
    AndAnd,

    /// Logical OR (`||`)
    OrOr,

    // Delimiters
    /// Left bracket for indexing and list literals
    LBracket,

    /// Right bracket
    RBracket,

    /// Left parenthesis for grouping or function calls
    LParen,

    /// Right parenthesis
    RParen,

    /// Left brace opening an `if` block
    LBrace,

    /// Right brace
    RBrace,

    /// Dot for attribute paths
    Dot,

    /// Comma for separating arguments or list elements
    Comma,

    /// End of file
    Eof,
}

impl Token {
    /// Short human readable description used in parse errors.
    pub fn describe(&self) -> String {
        match self {
            Token::Float(n) => format!("number {}", n),
            Token::Integer(n) => format!("number {}", n),
            Token::String(s) => format!("string {:?}", s),
            Token::Boolean(b) => format!("`{}`", b),
            Token::Nil => "`nil`".to_string(),
            Token::Identifier(name) => format!("identifier `{}`", name),
            Token::If => "`if`".to_string(),
            Token::Elif => "`elif`".to_string(),
            Token::Else => "`else`".to_string(),
            Token::Assign => "`=`".to_string(),
            Token::EqEq => "`==`".to_string(),
            Token::NotEq => "`!=`".to_string(),
            Token::Lt => "`<`".to_string(),
            Token::Gt => "`>`".to_string(),
            Token::LtEq => "`<=`".to_string(),
            Token::GtEq => "`>=`".to_string(),
            Token::Plus => "`+`".to_string(),
            Token::Minus => "`-`".to_string(),
            Token::Star => "`*`".to_string(),
            Token::Slash => "`/`".to_string(),
            Token::Percent => "`%`".to_string(),
            Token::AndAnd => "`&&`".to_string(),
            Token::OrOr => "`||`".to_string(),
            Token::LBracket => "`[`".to_string(),
            Token::RBracket => "`]`".to_string(),
            Token::LParen => "`(`".to_string(),
            Token::RParen => "`)`".to_string(),
            Token::LBrace => "`{`".to_string(),
            Token::RBrace => "`}`".to_string(),
            Token::Dot => "`.`".to_string(),
            Token::Comma => "`,`".to_string(),
            Token::Eof => "end of input".to_string(),
        }
    }
}
