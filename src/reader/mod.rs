//! Reader: turns tokens into positioned forms.

pub mod form;

pub use form::{Form, FormKind};

use crate::error::ReaderError;
use crate::interpreter::value::Value;
use crate::lexer::{Scanner, Token, TokenKind};
use crate::span::Span;

pub type ReadResult<T> = Result<T, ReaderError>;

/// Reads forms from a token stream.
pub struct Reader {
    tokens: Vec<Token>,
    current: usize,
}

impl Reader {
    pub fn new(tokens: Vec<Token>) -> Self {
        Self { tokens, current: 0 }
    }

    /// Scan and read every top-level form in `source`.
    pub fn read_str(source: &str) -> ReadResult<Vec<Form>> {
        let tokens = Scanner::new(source).scan_tokens()?;
        Reader::new(tokens).read_all()
    }

    pub fn read_all(&mut self) -> ReadResult<Vec<Form>> {
        let mut forms = Vec::new();
        while !self.is_at_end() {
            if let Some(form) = self.read_form()? {
                forms.push(form);
            }
        }
        Ok(forms)
    }

    /// Read the next form. `None` means a `#_` discard consumed the rest of the input.
    fn read_form(&mut self) -> ReadResult<Option<Form>> {
        loop {
            let token = self.advance();
            let span = token.span;
            let kind = match token.kind {
                TokenKind::Eof => return Err(ReaderError::unexpected_eof(span)),
                TokenKind::Discard => {
                    self.expect_form(span)?;
                    if self.is_at_end() || self.peek().kind.is_closing() {
                        return Ok(None);
                    }
                    continue;
                }
                TokenKind::Caret => {
                    // Metadata is read and dropped.
                    self.expect_form(span)?;
                    return self.expect_form(span).map(Some);
                }
                TokenKind::Quote => return self.wrap("quote", span).map(Some),
                TokenKind::At => return self.wrap("deref", span).map(Some),
                TokenKind::LeftParen => FormKind::List(self.read_seq(TokenKind::RightParen, span)?),
                TokenKind::LeftBracket => {
                    FormKind::Vector(self.read_seq(TokenKind::RightBracket, span)?)
                }
                TokenKind::HashBrace => FormKind::Set(self.read_seq(TokenKind::RightBrace, span)?),
                TokenKind::LeftBrace => {
                    let items = self.read_seq(TokenKind::RightBrace, span)?;
                    if items.len() % 2 != 0 {
                        return Err(ReaderError::OddMapForms(span));
                    }
                    FormKind::Map(items)
                }
                TokenKind::RightParen | TokenKind::RightBracket | TokenKind::RightBrace => {
                    return Err(ReaderError::unmatched(token.kind.to_string(), span))
                }
                TokenKind::Symbol(name) => FormKind::Symbol(name.into()),
                TokenKind::Keyword(name) => FormKind::Atom(Value::keyword(&name)),
                TokenKind::Str(s) => FormKind::Atom(Value::string(&s)),
                TokenKind::Char(c) => FormKind::Atom(Value::Char(c)),
                TokenKind::Int(n) => FormKind::Atom(Value::Int(n)),
                TokenKind::Ratio(num, den) => FormKind::Atom(
                    crate::interpreter::numbers::Ratio::make(num as i128, den as i128)
                        .map_err(|e| ReaderError::unsupported(e.to_string(), span))?,
                ),
                TokenKind::Double(d) => FormKind::Atom(Value::Double(d)),
                TokenKind::Decimal(d) => FormKind::Atom(Value::Decimal(d)),
                TokenKind::Nil => FormKind::Atom(Value::Nil),
                TokenKind::True => FormKind::Atom(Value::Bool(true)),
                TokenKind::False => FormKind::Atom(Value::Bool(false)),
            };
            return Ok(Some(Form::new(kind, span)));
        }
    }

    /// Read one form where one is required.
    fn expect_form(&mut self, span: Span) -> ReadResult<Form> {
        loop {
            if self.is_at_end() {
                return Err(ReaderError::unexpected_eof(span));
            }
            if let Some(form) = self.read_form()? {
                return Ok(form);
            }
        }
    }

    fn wrap(&mut self, head: &str, span: Span) -> ReadResult<Form> {
        let inner = self.expect_form(span)?;
        let full = span.merge(inner.span);
        Ok(Form::list(vec![Form::symbol(head, span), inner], full))
    }

    fn read_seq(&mut self, close: TokenKind, open: Span) -> ReadResult<Vec<Form>> {
        let mut items = Vec::new();
        loop {
            let next = self.peek().kind.clone();
            if next == close {
                self.advance();
                return Ok(items);
            }
            if next == TokenKind::Eof {
                return Err(ReaderError::unexpected_eof(open));
            }
            if next.is_closing() {
                let token = self.advance();
                return Err(ReaderError::unmatched(token.kind.to_string(), token.span));
            }
            if let Some(form) = self.read_form()? {
                items.push(form);
            }
        }
    }

    fn advance(&mut self) -> Token {
        let token = self.tokens[self.current].clone();
        if token.kind != TokenKind::Eof {
            self.current += 1;
        }
        token
    }

    fn peek(&self) -> &Token {
        &self.tokens[self.current]
    }

    fn is_at_end(&self) -> bool {
        self.peek().kind == TokenKind::Eof
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn read(source: &str) -> Vec<String> {
        Reader::read_str(source)
            .unwrap()
            .iter()
            .map(|f| f.to_string())
            .collect()
    }

    #[test]
    fn test_read_nested() {
        assert_eq!(read("(+ 1 [2 3] {:a \"s\"})"), vec!["(+ 1 [2 3] {:a \"s\"})"]);
    }

    #[test]
    fn test_reader_macros() {
        assert_eq!(read("'x @v"), vec!["(quote x)", "(deref v)"]);
        assert_eq!(read("(a #_ b c)"), vec!["(a c)"]);
        assert_eq!(read("^:private x"), vec!["x"]);
        assert_eq!(read("#{1 2}"), vec!["#{1 2}"]);
    }

    #[test]
    fn test_discard_at_end() {
        assert_eq!(read("1 #_ 2"), vec!["1"]);
        assert_eq!(read("[1 #_ 2]"), vec!["[1]"]);
    }

    #[test]
    fn test_ratio_literal_normalized() {
        assert_eq!(read("2/4 4/2"), vec!["1/2", "2"]);
    }

    #[test]
    fn test_errors() {
        assert!(matches!(
            Reader::read_str("(1 2"),
            Err(ReaderError::UnexpectedEof(_))
        ));
        assert!(matches!(
            Reader::read_str("(1 2]"),
            Err(ReaderError::UnmatchedDelimiter(_, _))
        ));
        assert!(matches!(
            Reader::read_str("{:a}"),
            Err(ReaderError::OddMapForms(_))
        ));
    }

    #[test]
    fn test_form_value_conversion() {
        let form = &Reader::read_str("(f [x] {:k 1})").unwrap()[0];
        let value = form.to_value();
        let back = Form::from_value(&value, form.span).unwrap();
        assert_eq!(back.to_string(), "(f [x] {:k 1})");
    }
}
