//! Lexer for the S-expression surface syntax.
//!
//! Produces span-based tokens; text is sliced from the source only when
//! needed. Consecutive unlexable characters are coalesced into single
//! `Garbage` tokens so malformed input yields one error, not one per byte.

use std::ops::Range;

use logos::Logos;

/// Token kinds. Whitespace between tokens is ASCII space only.
#[derive(Logos, Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    #[token("(")]
    LParen,
    #[token(")")]
    RParen,
    #[token("[")]
    LBracket,
    #[token("]")]
    RBracket,
    #[regex(r"[-+]?[0-9]+\.[0-9]+")]
    Float,
    #[regex(r"[-+]?[0-9]+")]
    Number,
    #[regex(r"'(?:[^'\\]|\\.)*'")]
    String,
    #[regex(r"[A-Za-z_][A-Za-z0-9_\-]*")]
    Word,
    #[regex(r" +")]
    Space,
    /// Coalesced run of unlexable input (never produced by logos itself).
    Garbage,
}

/// Zero-copy token: kind + byte span into the source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub start: usize,
    pub end: usize,
}

impl Token {
    fn new(kind: TokenKind, span: Range<usize>) -> Self {
        Self {
            kind,
            start: span.start,
            end: span.end,
        }
    }
}

/// Tokenizes source, coalescing lexer errors into `Garbage` tokens.
pub fn lex(source: &str) -> Vec<Token> {
    let mut tokens = Vec::new();
    let mut lexer = TokenKind::lexer(source);
    let mut error_start: Option<usize> = None;

    loop {
        match lexer.next() {
            Some(Ok(kind)) => {
                if let Some(start) = error_start.take() {
                    tokens.push(Token::new(TokenKind::Garbage, start..lexer.span().start));
                }
                tokens.push(Token::new(kind, lexer.span()));
            }
            Some(Err(())) => {
                if error_start.is_none() {
                    error_start = Some(lexer.span().start);
                }
            }
            None => {
                if let Some(start) = error_start.take() {
                    tokens.push(Token::new(TokenKind::Garbage, start..source.len()));
                }
                break;
            }
        }
    }

    tokens
}

/// Retrieves the text slice for a token. O(1) slice into source.
#[inline]
pub fn token_text<'src>(source: &'src str, token: &Token) -> &'src str {
    &source[token.start..token.end]
}
