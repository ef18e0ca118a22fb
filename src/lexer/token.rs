//! Token definitions for the Jolt lexer.

use std::fmt;

use rust_decimal::Decimal;

use crate::span::Span;

/// All token types of the reader syntax.
#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    // Literals
    Int(i64),
    /// Unreduced `numerator/denominator` literal.
    Ratio(i64, i64),
    Double(f64),
    Decimal(Decimal),
    Str(String),
    Char(char),
    Nil,
    True,
    False,

    // Names
    Symbol(String),
    Keyword(String),

    // Delimiters
    LeftParen,
    RightParen,
    LeftBracket,
    RightBracket,
    LeftBrace,
    RightBrace,
    /// `#{`
    HashBrace,

    // Reader macros
    /// `'`
    Quote,
    /// `@`
    At,
    /// `^`
    Caret,
    /// `#_`
    Discard,

    Eof,
}

impl TokenKind {
    /// True for `)`, `]` and `}`.
    pub fn is_closing(&self) -> bool {
        matches!(
            self,
            TokenKind::RightParen | TokenKind::RightBracket | TokenKind::RightBrace
        )
    }
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenKind::Int(n) => write!(f, "{}", n),
            TokenKind::Ratio(n, d) => write!(f, "{}/{}", n, d),
            TokenKind::Double(d) => write!(f, "{}", d),
            TokenKind::Decimal(d) => write!(f, "{}M", d),
            TokenKind::Str(s) => write!(f, "{:?}", s),
            TokenKind::Char(c) => write!(f, "\\{}", c),
            TokenKind::Nil => write!(f, "nil"),
            TokenKind::True => write!(f, "true"),
            TokenKind::False => write!(f, "false"),
            TokenKind::Symbol(s) => write!(f, "{}", s),
            TokenKind::Keyword(s) => write!(f, ":{}", s),
            TokenKind::LeftParen => write!(f, "("),
            TokenKind::RightParen => write!(f, ")"),
            TokenKind::LeftBracket => write!(f, "["),
            TokenKind::RightBracket => write!(f, "]"),
            TokenKind::LeftBrace => write!(f, "{{"),
            TokenKind::RightBrace => write!(f, "}}"),
            TokenKind::HashBrace => write!(f, "#{{"),
            TokenKind::Quote => write!(f, "'"),
            TokenKind::At => write!(f, "@"),
            TokenKind::Caret => write!(f, "^"),
            TokenKind::Discard => write!(f, "#_"),
            TokenKind::Eof => write!(f, "EOF"),
        }
    }
}

/// A token with its kind and source location.
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub span: Span,
}

impl Token {
    pub fn new(kind: TokenKind, span: Span) -> Self {
        Self { kind, span }
    }

    pub fn eof(position: usize, line: usize, column: usize) -> Self {
        Self {
            kind: TokenKind::Eof,
            span: Span::new(position, position, line, column),
        }
    }
}
