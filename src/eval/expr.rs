//! Embedded expression syntax
//!
//! Grammar, loosest binding first:
//!
//! ```text
//! expr     := term (('+' | '-') term)*
//! term     := unary (('*' | '/' | '%') unary)*
//! unary    := '-' unary | postfix
//! postfix  := primary ('.' IDENT call_args? | '[' expr ']')*
//! primary  := NUMBER | STRING | IDENT call_args? | '(' expr ')'
//! call_args:= '(' (expr (',' expr)*)? ')'
//! ```

use strata_value::Value;

use super::engine::ExpressionError;

/// Identifiers naming the configuration root.
pub const ROOT_HANDLES: &[&str] = &["c", "cfg", "conf", "config"];

/// Identifier naming the current context.
pub const SELF_HANDLE: &str = "self";

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Literal(Value),
    /// The configuration root.
    Root,
    /// The current context (`self`).
    Current,
    /// Bare identifier, looked up in the current context.
    Name(String),
    Call {
        name: String,
        args: Vec<Expr>,
    },
    Member {
        target: Box<Expr>,
        name: String,
        args: Option<Vec<Expr>>,
    },
    Index {
        target: Box<Expr>,
        index: Box<Expr>,
    },
    Neg(Box<Expr>),
    Binary {
        op: BinaryOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Integer(i64),
    Float(f64),
    Str(String),
    Ident(String),
    Dot,
    Comma,
    LParen,
    RParen,
    LBracket,
    RBracket,
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
}

/// Parse one expression.
pub fn parse(source: &str) -> Result<Expr, ExpressionError> {
    let tokens = lex(source)?;
    let mut parser = Parser { tokens, pos: 0 };
    let expr = parser.expr()?;
    match parser.peek() {
        None => Ok(expr),
        Some(token) => Err(ExpressionError::Syntax(format!(
            "unexpected {:?} in `{}`",
            token, source
        ))),
    }
}

fn lex(source: &str) -> Result<Vec<Token>, ExpressionError> {
    let chars: Vec<char> = source.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let ch = chars[i];
        match ch {
            c if c.is_whitespace() => i += 1,
            '.' => {
                tokens.push(Token::Dot);
                i += 1;
            }
            ',' => {
                tokens.push(Token::Comma);
                i += 1;
            }
            '(' => {
                tokens.push(Token::LParen);
                i += 1;
            }
            ')' => {
                tokens.push(Token::RParen);
                i += 1;
            }
            '[' => {
                tokens.push(Token::LBracket);
                i += 1;
            }
            ']' => {
                tokens.push(Token::RBracket);
                i += 1;
            }
            '+' => {
                tokens.push(Token::Plus);
                i += 1;
            }
            '-' => {
                tokens.push(Token::Minus);
                i += 1;
            }
            '*' => {
                tokens.push(Token::Star);
                i += 1;
            }
            '/' => {
                tokens.push(Token::Slash);
                i += 1;
            }
            '%' => {
                tokens.push(Token::Percent);
                i += 1;
            }
            '\'' | '"' => {
                let (text, next) = lex_string(&chars, i)?;
                tokens.push(Token::Str(text));
                i = next;
            }
            c if c.is_ascii_digit() => {
                let start = i;
                while i < chars.len() && chars[i].is_ascii_digit() {
                    i += 1;
                }
                // `1.5` is a float, but in `list.0.1` each part is an index
                let after_dot = tokens.last() == Some(&Token::Dot);
                let is_float = !after_dot
                    && i + 1 < chars.len()
                    && chars[i] == '.'
                    && chars[i + 1].is_ascii_digit();
                if is_float {
                    i += 1;
                    while i < chars.len() && chars[i].is_ascii_digit() {
                        i += 1;
                    }
                }
                let text: String = chars[start..i].iter().collect();
                let token = if is_float {
                    text.parse().map(Token::Float).map_err(|_| bad_number(&text))?
                } else {
                    text.parse().map(Token::Integer).map_err(|_| bad_number(&text))?
                };
                tokens.push(token);
            }
            c if c.is_alphabetic() || c == '_' => {
                let start = i;
                while i < chars.len() && (chars[i].is_alphanumeric() || chars[i] == '_') {
                    i += 1;
                }
                // Ruby-style predicates and bang methods
                if i < chars.len() && (chars[i] == '?' || chars[i] == '!') {
                    i += 1;
                }
                tokens.push(Token::Ident(chars[start..i].iter().collect()));
            }
            other => {
                return Err(ExpressionError::Syntax(format!(
                    "unexpected character `{}`",
                    other
                )))
            }
        }
    }
    Ok(tokens)
}

fn bad_number(text: &str) -> ExpressionError {
    ExpressionError::Syntax(format!("invalid number `{}`", text))
}

/// Lex a quoted string starting at `start`, returning it and the index past
/// the closing quote.
fn lex_string(chars: &[char], start: usize) -> Result<(String, usize), ExpressionError> {
    let quote = chars[start];
    let mut out = String::new();
    let mut i = start + 1;
    while i < chars.len() {
        match chars[i] {
            '\\' if i + 1 < chars.len() => {
                out.push(match chars[i + 1] {
                    'n' => '\n',
                    't' => '\t',
                    other => other,
                });
                i += 2;
            }
            c if c == quote => return Ok((out, i + 1)),
            c => {
                out.push(c);
                i += 1;
            }
        }
    }
    Err(ExpressionError::Syntax("unterminated string literal".to_string()))
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn eat(&mut self, expected: &Token) -> bool {
        if self.peek() == Some(expected) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, expected: &Token) -> Result<(), ExpressionError> {
        if self.eat(expected) {
            Ok(())
        } else {
            Err(ExpressionError::Syntax(format!(
                "expected {:?}, found {:?}",
                expected,
                self.peek()
            )))
        }
    }

    fn expr(&mut self) -> Result<Expr, ExpressionError> {
        let mut lhs = self.term()?;
        loop {
            let op = match self.peek() {
                Some(Token::Plus) => BinaryOp::Add,
                Some(Token::Minus) => BinaryOp::Sub,
                _ => return Ok(lhs),
            };
            self.pos += 1;
            let rhs = self.term()?;
            lhs = Expr::Binary {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            };
        }
    }

    fn term(&mut self) -> Result<Expr, ExpressionError> {
        let mut lhs = self.unary()?;
        loop {
            let op = match self.peek() {
                Some(Token::Star) => BinaryOp::Mul,
                Some(Token::Slash) => BinaryOp::Div,
                Some(Token::Percent) => BinaryOp::Rem,
                _ => return Ok(lhs),
            };
            self.pos += 1;
            let rhs = self.unary()?;
            lhs = Expr::Binary {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            };
        }
    }

    fn unary(&mut self) -> Result<Expr, ExpressionError> {
        if self.eat(&Token::Minus) {
            return Ok(Expr::Neg(Box::new(self.unary()?)));
        }
        self.postfix()
    }

    fn postfix(&mut self) -> Result<Expr, ExpressionError> {
        let mut expr = self.primary()?;
        loop {
            if self.eat(&Token::Dot) {
                let name = match self.next() {
                    Some(Token::Ident(name)) => name,
                    // `list.0` reads as an index
                    Some(Token::Integer(i)) => {
                        expr = Expr::Index {
                            target: Box::new(expr),
                            index: Box::new(Expr::Literal(Value::Integer(i))),
                        };
                        continue;
                    }
                    other => {
                        return Err(ExpressionError::Syntax(format!(
                            "expected a name after `.`, found {:?}",
                            other
                        )))
                    }
                };
                let args = if self.peek() == Some(&Token::LParen) {
                    Some(self.call_args()?)
                } else {
                    None
                };
                expr = Expr::Member {
                    target: Box::new(expr),
                    name,
                    args,
                };
            } else if self.eat(&Token::LBracket) {
                let index = self.expr()?;
                self.expect(&Token::RBracket)?;
                expr = Expr::Index {
                    target: Box::new(expr),
                    index: Box::new(index),
                };
            } else {
                return Ok(expr);
            }
        }
    }

    fn primary(&mut self) -> Result<Expr, ExpressionError> {
        match self.next() {
            Some(Token::Integer(i)) => Ok(Expr::Literal(Value::Integer(i))),
            Some(Token::Float(f)) => Ok(Expr::Literal(Value::Float(f))),
            Some(Token::Str(s)) => Ok(Expr::Literal(Value::String(s))),
            Some(Token::LParen) => {
                let expr = self.expr()?;
                self.expect(&Token::RParen)?;
                Ok(expr)
            }
            Some(Token::Ident(name)) => {
                if self.peek() == Some(&Token::LParen) {
                    let args = self.call_args()?;
                    return Ok(Expr::Call { name, args });
                }
                Ok(match name.as_str() {
                    "true" => Expr::Literal(Value::Bool(true)),
                    "false" => Expr::Literal(Value::Bool(false)),
                    "nil" | "null" => Expr::Literal(Value::Null),
                    SELF_HANDLE => Expr::Current,
                    n if ROOT_HANDLES.contains(&n) => Expr::Root,
                    _ => Expr::Name(name),
                })
            }
            other => Err(ExpressionError::Syntax(format!(
                "unexpected {:?}",
                other
            ))),
        }
    }

    fn call_args(&mut self) -> Result<Vec<Expr>, ExpressionError> {
        self.expect(&Token::LParen)?;
        let mut args = Vec::new();
        if self.eat(&Token::RParen) {
            return Ok(args);
        }
        loop {
            args.push(self.expr()?);
            if self.eat(&Token::RParen) {
                return Ok(args);
            }
            self.expect(&Token::Comma)?;
        }
    }
}
