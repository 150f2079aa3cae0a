//! Non-backtracking recursive-descent parser for predicate expressions.
//!
//! Grammar:
//!
//! ```text
//! expr    := call | literal
//! call    := '(' name (ws arg)* ')'
//! arg     := expr
//! literal := 'null' | number | string | list
//! list    := '[' (literal (ws literal)*)? ']'
//! ```
//!
//! Token separators are ASCII spaces. Call names are resolved against a
//! [`CallFactory`] while parsing; an unregistered name is a parse-time error.
//! Errors carry the byte offset, a ±10 character excerpt window around it,
//! and the caller-supplied origin tag.

pub mod ast;
pub mod lexer;

#[cfg(test)]
mod parser_tests;

use crate::calls::CallFactory;
use crate::escape::unescape_bytes;
use crate::value::Value;
use crate::{Error, Result};

use ast::Expr;
use lexer::{Token, TokenKind, lex, token_text};

/// Parses a complete top-level expression.
///
/// The expression must start at byte 0 (no leading whitespace) and consume
/// the whole input; at most one trailing byte is tolerated, matching the
/// historic acceptance of a single byte past the closing parenthesis.
pub fn parse_expression(source: &str, factory: &CallFactory, origin: &str) -> Result<Expr> {
    if source.starts_with(' ') {
        return Err(parse_error(source, 0, origin, "leading whitespace"));
    }
    let (expr, consumed) = parse_at(source, 0, factory, origin)?;
    if source.len() - consumed > 1 {
        return Err(parse_error(
            source,
            consumed,
            origin,
            "trailing input after expression",
        ));
    }
    Ok(expr)
}

/// Parses one expression starting at `offset`, returning it together with
/// the byte length it consumed. Input past the expression is left alone.
pub fn parse_at(
    source: &str,
    offset: usize,
    factory: &CallFactory,
    origin: &str,
) -> Result<(Expr, usize)> {
    let rest = &source[offset..];
    let mut parser = Parser {
        source,
        base: offset,
        tokens: lex(rest),
        pos: 0,
        factory,
        origin,
    };
    let expr = parser.parse_expr()?;
    Ok((expr, parser.consumed()))
}

fn parse_error(source: &str, offset: usize, origin: &str, message: impl Into<String>) -> Error {
    Error::Parse {
        offset,
        message: message.into(),
        excerpt: excerpt(source, offset),
        origin: origin.to_string(),
    }
}

/// Builds the `before --ERROR-- after` excerpt window (10 chars each side).
fn excerpt(source: &str, offset: usize) -> String {
    let offset = offset.min(source.len());
    let mut start = offset.saturating_sub(10);
    while !source.is_char_boundary(start) {
        start -= 1;
    }
    let mut end = (offset + 10).min(source.len());
    while !source.is_char_boundary(end) {
        end += 1;
    }
    format!("{} --ERROR-- {}", &source[start..offset], &source[offset..end])
}

struct Parser<'src, 'f> {
    source: &'src str,
    /// Offset of the lexed slice within `source`; all reported offsets and
    /// excerpts are relative to the full source.
    base: usize,
    tokens: Vec<Token>,
    pos: usize,
    factory: &'f CallFactory,
    origin: &'src str,
}

impl Parser<'_, '_> {
    fn current(&self) -> Option<Token> {
        self.tokens.get(self.pos).copied()
    }

    fn bump(&mut self) -> Token {
        let token = self.tokens[self.pos];
        self.pos += 1;
        token
    }

    /// Absolute byte offset of the current token (end of input at EOF).
    fn offset(&self) -> usize {
        match self.current() {
            Some(token) => self.base + token.start,
            None => self.source.len(),
        }
    }

    /// Bytes consumed so far, measured from the slice start.
    fn consumed(&self) -> usize {
        self.tokens[..self.pos].last().map_or(0, |t| t.end)
    }

    fn error(&self, message: impl Into<String>) -> Error {
        parse_error(self.source, self.offset(), self.origin, message)
    }

    fn text(&self, token: &Token) -> &str {
        token_text(&self.source[self.base..], token)
    }

    fn parse_expr(&mut self) -> Result<Expr> {
        match self.current().map(|t| t.kind) {
            Some(TokenKind::LParen) => self.parse_call(),
            Some(_) => Ok(Expr::Literal(self.parse_literal()?)),
            None => Err(self.error("unexpected end of input")),
        }
    }

    fn parse_call(&mut self) -> Result<Expr> {
        self.bump(); // '('

        let name = match self.current() {
            Some(token) if token.kind == TokenKind::Word => {
                let token = self.bump();
                self.text(&token).to_string()
            }
            Some(_) => return Err(self.error("expected call name")),
            None => return Err(self.error("unexpected end of input")),
        };
        if !self.factory.contains(&name) {
            return Err(Error::UnknownCall {
                name,
                origin: self.origin.to_string(),
            });
        }

        let mut args = Vec::new();
        loop {
            match self.current().map(|t| t.kind) {
                Some(TokenKind::RParen) => {
                    self.bump();
                    return Ok(Expr::call(name, args));
                }
                Some(TokenKind::Space) => {
                    self.bump();
                    args.push(self.parse_expr()?);
                }
                Some(_) => return Err(self.error("expected space or `)`")),
                None => return Err(self.error("unexpected end of input")),
            }
        }
    }

    fn parse_literal(&mut self) -> Result<Value> {
        let token = match self.current() {
            Some(token) => token,
            None => return Err(self.error("unexpected end of input")),
        };
        match token.kind {
            TokenKind::Number => {
                let text = self.text(&token).to_string();
                let value = text
                    .parse::<i64>()
                    .map_err(|_| self.error("number out of range"))?;
                self.bump();
                Ok(Value::Number(value))
            }
            TokenKind::Float => {
                let text = self.text(&token).to_string();
                let value = text
                    .parse::<f64>()
                    .map_err(|_| self.error("malformed number"))?;
                self.bump();
                Ok(Value::Float(value))
            }
            TokenKind::String => {
                let token = self.bump();
                let text = self.text(&token);
                Ok(Value::Bytes(unescape_bytes(&text[1..text.len() - 1])))
            }
            TokenKind::Word if self.text(&token) == "null" => {
                self.bump();
                Ok(Value::Null)
            }
            TokenKind::LBracket => self.parse_list(),
            TokenKind::LParen => Err(self.error("lists may contain only literals")),
            _ => Err(self.error("expected literal")),
        }
    }

    fn parse_list(&mut self) -> Result<Value> {
        self.bump(); // '['

        let mut items = Vec::new();
        if self.current().map(|t| t.kind) == Some(TokenKind::RBracket) {
            self.bump();
            return Ok(Value::List(items));
        }
        items.push(self.parse_literal()?);
        loop {
            match self.current().map(|t| t.kind) {
                Some(TokenKind::RBracket) => {
                    self.bump();
                    return Ok(Value::List(items));
                }
                Some(TokenKind::Space) => {
                    self.bump();
                    items.push(self.parse_literal()?);
                }
                Some(_) => return Err(self.error("expected space or `]`")),
                None => return Err(self.error("unexpected end of input")),
            }
        }
    }
}
