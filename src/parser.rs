use std::mem;

use thiserror::Error;

use crate::{
    ast::{BinOp, FuncCall, IfBranch, Node, Stmt, Token},
    lexer::{LexError, Lexer, Position},
};

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ParseError {
    #[error(transparent)]
    Lex(#[from] LexError),

    #[error("{position}: expected {expected}, got {found}")]
    Unexpected {
        expected: String,
        found: String,
        position: Position,
    },

    #[error("{position}: function arguments cannot be function calls (`{name}(...)`)")]
    NestedCall { name: String, position: Position },

    #[error("{position}: invalid index: {reason}")]
    InvalidIndex { reason: String, position: Position },

    #[error("{position}: positional argument follows keyword argument")]
    PositionalAfterKeyword { position: Position },
}

impl ParseError {
    /// Source position the error points at.
    pub fn position(&self) -> Position {
        match self {
            ParseError::Lex(e) => match e {
                LexError::UnexpectedChar { position, .. }
                | LexError::IncompleteOperator { position, .. }
                | LexError::UnterminatedString { position }
                | LexError::UnterminatedIdentifier { position }
                | LexError::InvalidNumber { position, .. } => *position,
            },
            ParseError::Unexpected { position, .. }
            | ParseError::NestedCall { position, .. }
            | ParseError::InvalidIndex { position, .. }
            | ParseError::PositionalAfterKeyword { position } => *position,
        }
    }
}

pub struct Parser {
    lexer: Lexer,
    current_token: Token,
    current_pos: Position,
    peeked: Option<(Token, Position)>,
}

impl Parser {
    pub fn new(mut lexer: Lexer) -> Result<Self, ParseError> {
        let current_token = lexer.next_token()?;
        let current_pos = lexer.token_start();
        Ok(Parser {
            lexer,
            current_token,
            current_pos,
            peeked: None,
        })
    }

    fn advance(&mut self) -> Result<(), ParseError> {
        match self.peeked.take() {
            Some((token, pos)) => {
                self.current_token = token;
                self.current_pos = pos;
            }
            None => {
                self.current_token = self.lexer.next_token()?;
                self.current_pos = self.lexer.token_start();
            }
        }
        Ok(())
    }

    fn peek(&mut self) -> Result<&Token, ParseError> {
        let next = match self.peeked.take() {
            Some(next) => next,
            None => {
                let token = self.lexer.next_token()?;
                (token, self.lexer.token_start())
            }
        };
        Ok(&self.peeked.insert(next).0)
    }

    fn check(&self, token: &Token) -> bool {
        mem::discriminant(&self.current_token) == mem::discriminant(token)
    }

    fn unexpected<T>(&self, expected: &str) -> Result<T, ParseError> {
        Err(ParseError::Unexpected {
            expected: expected.to_string(),
            found: self.current_token.describe(),
            position: self.current_pos,
        })
    }

    fn expect(&mut self, expected: Token) -> Result<(), ParseError> {
        if !self.check(&expected) {
            return self.unexpected(&expected.describe());
        }
        self.advance()
    }

    /// Parse a complete script.
    pub fn parse_script(&mut self) -> Result<Vec<Stmt>, ParseError> {
        let mut stmts = Vec::new();
        while !self.check(&Token::Eof) {
            stmts.push(self.parse_statement()?);
        }
        Ok(stmts)
    }

    /// Parse a single standalone expression (used for `if` conditions and tests).
    pub fn parse(&mut self) -> Result<Node, ParseError> {
        let expr = self.parse_expression()?;
        self.expect(Token::Eof)?;
        Ok(expr)
    }

    fn parse_statement(&mut self) -> Result<Stmt, ParseError> {
        match &self.current_token {
            Token::If => self.parse_if(),
            Token::Identifier(_) => self.parse_call().map(Stmt::Call),
            _ => self.unexpected("function call or `if`"),
        }
    }

    fn parse_call(&mut self) -> Result<FuncCall, ParseError> {
        let line = self.current_pos.line;
        let name = match mem::replace(&mut self.current_token, Token::Eof) {
            Token::Identifier(name) => name,
            _ => unreachable!(),
        };
        self.advance()?;

        if !self.check(&Token::LParen) {
            return self.unexpected(&format!("`(` after function name `{}`", name));
        }
        self.advance()?;

        let mut args = Vec::new();
        let mut seen_keyword = false;

        while !self.check(&Token::RParen) {
            let arg_pos = self.current_pos;
            let arg = self.parse_argument()?;

            match arg {
                Node::KeywordArg { .. } => seen_keyword = true,
                _ if seen_keyword => {
                    return Err(ParseError::PositionalAfterKeyword { position: arg_pos });
                }
                _ => {}
            }
            args.push(arg);

            if !self.check(&Token::RParen) {
                self.expect(Token::Comma)?;
            }
        }
        self.expect(Token::RParen)?;

        Ok(FuncCall { name, args, line })
    }

    fn parse_argument(&mut self) -> Result<Node, ParseError> {
        if matches!(self.current_token, Token::Identifier(_)) && matches!(self.peek()?, Token::Assign) {
            let name = match mem::replace(&mut self.current_token, Token::Eof) {
                Token::Identifier(name) => name,
                _ => unreachable!(),
            };
            self.advance()?; // name
            self.advance()?; // '='
            let value = self.parse_expression()?;
            return Ok(Node::KeywordArg {
                name,
                value: Box::new(value),
            });
        }
        self.parse_expression()
    }

    fn parse_if(&mut self) -> Result<Stmt, ParseError> {
        let mut branches = Vec::new();

        self.advance()?; // if
        branches.push(self.parse_branch()?);

        while self.check(&Token::Elif) {
            self.advance()?;
            branches.push(self.parse_branch()?);
        }

        let otherwise = if self.check(&Token::Else) {
            self.advance()?;
            Some(self.parse_block()?)
        } else {
            None
        };

        Ok(Stmt::IfElse {
            branches,
            otherwise,
        })
    }

    fn parse_branch(&mut self) -> Result<IfBranch, ParseError> {
        if self.check(&Token::LBrace) {
            return self.unexpected("condition");
        }
        let line = self.current_pos.line;
        let condition = self.parse_expression()?;
        let body = self.parse_block()?;
        Ok(IfBranch {
            condition,
            body,
            line,
        })
    }

    fn parse_block(&mut self) -> Result<Vec<Stmt>, ParseError> {
        self.expect(Token::LBrace)?;
        let mut stmts = Vec::new();
        while !self.check(&Token::RBrace) {
            if self.check(&Token::Eof) {
                return self.unexpected("`}`");
            }
            stmts.push(self.parse_statement()?);
        }
        self.expect(Token::RBrace)?;
        Ok(stmts)
    }

    pub fn parse_expression(&mut self) -> Result<Node, ParseError> {
        self.parse_or()
    }

    fn parse_or(&mut self) -> Result<Node, ParseError> {
        let mut left = self.parse_and()?;

        while self.check(&Token::OrOr) {
            self.advance()?;
            let right = self.parse_and()?;

            left = Node::BinaryOp {
                op: BinOp::Or,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
        Ok(left)
    }

    fn parse_and(&mut self) -> Result<Node, ParseError> {
        let mut left = self.parse_comparison()?;

        while self.check(&Token::AndAnd) {
            self.advance()?;
            let right = self.parse_comparison()?;

            left = Node::BinaryOp {
                op: BinOp::And,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
        Ok(left)
    }

    fn parse_comparison(&mut self) -> Result<Node, ParseError> {
        let mut left = self.parse_additive()?;

        if let Some(op) = match &self.current_token {
            Token::EqEq => Some(BinOp::Equal),
            Token::NotEq => Some(BinOp::NotEqual),
            Token::Lt => Some(BinOp::LessThan),
            Token::Gt => Some(BinOp::GreaterThan),
            Token::LtEq => Some(BinOp::LessEqual),
            Token::GtEq => Some(BinOp::GreaterEqual),
            _ => None,
        } {
            self.advance()?;
            let right = self.parse_additive()?;

            left = Node::BinaryOp {
                op,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
        Ok(left)
    }

    fn parse_additive(&mut self) -> Result<Node, ParseError> {
        let mut left = self.parse_multiplicative()?;

        loop {
            let op = match &self.current_token {
                Token::Plus => BinOp::Add,
                Token::Minus => BinOp::Subtract,
                _ => break,
            };

            self.advance()?;
            let right = self.parse_multiplicative()?;

            left = Node::BinaryOp {
                op,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
        Ok(left)
    }

    fn parse_multiplicative(&mut self) -> Result<Node, ParseError> {
        let mut left = self.parse_unary()?;

        loop {
            let op = match &self.current_token {
                Token::Star => BinOp::Multiply,
                Token::Slash => BinOp::Divide,
                Token::Percent => BinOp::Modulo,
                _ => break,
            };

            self.advance()?;
            let right = self.parse_unary()?;

            left = Node::BinaryOp {
                op,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
        Ok(left)
    }

    fn parse_unary(&mut self) -> Result<Node, ParseError> {
        if !self.check(&Token::Minus) {
            return self.parse_primary();
        }
        self.advance()?;

        Ok(match self.parse_unary()? {
            Node::Integer(n) => Node::Integer(-n),
            Node::Float(n) => Node::Float(-n),
            // Represent as 0 - operand
            operand => Node::BinaryOp {
                op: BinOp::Subtract,
                left: Box::new(Node::Integer(0)),
                right: Box::new(operand),
            },
        })
    }

    /// Parse primary expressions: literals, key paths, lists and groups.
    fn parse_primary(&mut self) -> Result<Node, ParseError> {
        match &self.current_token {
            Token::Identifier(_) | Token::Dot => return self.parse_path(),
            Token::LParen => {
                self.advance()?;
                let inner = self.parse_expression()?;
                self.expect(Token::RParen)?;
                return Ok(Node::Paren(Box::new(inner)));
            }
            Token::LBracket => {
                self.advance()?;
                return self.parse_list_literal();
            }
            _ => {}
        }

        let node = match mem::replace(&mut self.current_token, Token::Eof) {
            Token::Integer(n) => Node::Integer(n),
            Token::Float(n) => Node::Float(n),
            Token::String(s) => Node::String(s),
            Token::Boolean(b) => Node::Boolean(b),
            Token::Nil => Node::Nil,
            token => {
                self.current_token = token;
                return self.unexpected("expression");
            }
        };
        self.advance()?;
        Ok(node)
    }

    fn parse_list_literal(&mut self) -> Result<Node, ParseError> {
        let mut elements = vec![];

        while !self.check(&Token::RBracket) {
            elements.push(self.parse_expression()?);

            if !self.check(&Token::RBracket) {
                self.expect(Token::Comma)?;
            }
        }

        self.expect(Token::RBracket)?;
        Ok(Node::List(elements))
    }

    /// Parse a key path: `name`, `a.b.c`, `items[0]`, `x.y[1][2].z`, `.[2].x`
    fn parse_path(&mut self) -> Result<Node, ParseError> {
        let mut node = if self.check(&Token::Dot) {
            self.advance()?;
            if !self.check(&Token::LBracket) {
                return self.unexpected("`[` after leading `.`");
            }
            let indices = self.parse_indices()?;
            Node::Index {
                object: None,
                indices,
            }
        } else {
            self.parse_path_segment()?
        };

        while self.check(&Token::Dot) {
            self.advance()?;
            let attr = self.parse_path_segment()?;
            node = Node::Attr {
                object: Box::new(node),
                attr: Box::new(attr),
            };
        }

        Ok(node)
    }

    fn parse_path_segment(&mut self) -> Result<Node, ParseError> {
        let position = self.current_pos;
        let name = match mem::replace(&mut self.current_token, Token::Eof) {
            Token::Identifier(name) => name,
            token => {
                self.current_token = token;
                return self.unexpected("identifier");
            }
        };
        self.advance()?;

        if self.check(&Token::LParen) {
            return Err(ParseError::NestedCall { name, position });
        }

        let ident = Node::Identifier(name);
        if self.check(&Token::LBracket) {
            let indices = self.parse_indices()?;
            return Ok(Node::Index {
                object: Some(Box::new(ident)),
                indices,
            });
        }
        Ok(ident)
    }

    fn parse_indices(&mut self) -> Result<Vec<i64>, ParseError> {
        let mut indices = Vec::new();

        while self.check(&Token::LBracket) {
            self.advance()?;

            let negative = if self.check(&Token::Minus) {
                self.advance()?;
                true
            } else {
                false
            };

            let index = match &self.current_token {
                Token::Integer(n) => {
                    if negative {
                        -*n
                    } else {
                        *n
                    }
                }
                other => {
                    return Err(ParseError::InvalidIndex {
                        reason: format!("expected integer, got {}", other.describe()),
                        position: self.current_pos,
                    });
                }
            };
            self.advance()?;
            self.expect(Token::RBracket)?;
            indices.push(index);
        }

        Ok(indices)
    }
}

/// Parse script source into its statement list.
pub fn parse_script(source: &str) -> Result<Vec<Stmt>, ParseError> {
    Parser::new(Lexer::new(source))?.parse_script()
}
