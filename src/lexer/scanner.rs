//! Lexer/Scanner for Jolt source code.

use std::str::FromStr;

use rust_decimal::Decimal;

use crate::error::LexerError;
use crate::lexer::token::{Token, TokenKind};
use crate::span::Span;

/// The lexer transforms source code into a stream of tokens.
pub struct Scanner<'a> {
    source: &'a str,
    chars: std::iter::Peekable<std::str::CharIndices<'a>>,
    current_pos: usize,
    line: usize,
    column: usize,
    start_pos: usize,
    start_line: usize,
    start_column: usize,
}

/// Characters that end an atom (symbol, keyword, number or character literal).
fn is_delimiter(c: char) -> bool {
    c.is_whitespace() || matches!(c, ',' | '(' | ')' | '[' | ']' | '{' | '}' | '"' | ';')
}

impl<'a> Scanner<'a> {
    pub fn new(source: &'a str) -> Self {
        Self {
            source,
            chars: source.char_indices().peekable(),
            current_pos: 0,
            line: 1,
            column: 1,
            start_pos: 0,
            start_line: 1,
            start_column: 1,
        }
    }

    /// Scan all tokens from the source.
    pub fn scan_tokens(&mut self) -> Result<Vec<Token>, LexerError> {
        let mut tokens = Vec::new();

        loop {
            let token = self.scan_token()?;
            let is_eof = token.kind == TokenKind::Eof;
            tokens.push(token);
            if is_eof {
                break;
            }
        }

        Ok(tokens)
    }

    /// Scan the next token.
    pub fn scan_token(&mut self) -> Result<Token, LexerError> {
        self.skip_whitespace_and_comments();
        self.mark_start();

        let Some((_, c)) = self.advance() else {
            return Ok(Token::eof(self.current_pos, self.line, self.column));
        };

        match c {
            '(' => Ok(self.make_token(TokenKind::LeftParen)),
            ')' => Ok(self.make_token(TokenKind::RightParen)),
            '[' => Ok(self.make_token(TokenKind::LeftBracket)),
            ']' => Ok(self.make_token(TokenKind::RightBracket)),
            '{' => Ok(self.make_token(TokenKind::LeftBrace)),
            '}' => Ok(self.make_token(TokenKind::RightBrace)),
            '\'' => Ok(self.make_token(TokenKind::Quote)),
            '@' => Ok(self.make_token(TokenKind::At)),
            '^' => Ok(self.make_token(TokenKind::Caret)),
            '#' => match self.peek() {
                Some('{') => {
                    self.advance();
                    Ok(self.make_token(TokenKind::HashBrace))
                }
                Some('_') => {
                    self.advance();
                    Ok(self.make_token(TokenKind::Discard))
                }
                _ => Err(LexerError::unexpected_char('#', self.current_span())),
            },
            '"' => self.scan_string(),
            '\\' => self.scan_character(),
            ':' => self.scan_keyword(),
            c if c.is_ascii_digit() => self.scan_number(c),
            '+' | '-' if self.peek().is_some_and(|n| n.is_ascii_digit()) => self.scan_number(c),
            c => self.scan_symbol(c),
        }
    }

    fn skip_whitespace_and_comments(&mut self) {
        loop {
            match self.peek() {
                Some('\n') => {
                    self.advance();
                    self.line += 1;
                    self.column = 1;
                }
                Some(c) if c.is_whitespace() || c == ',' => {
                    self.advance();
                }
                Some(';') => {
                    while self.peek().is_some() && self.peek() != Some('\n') {
                        self.advance();
                    }
                }
                _ => break,
            }
        }
    }

    /// Collect the rest of an atom starting with `first`.
    fn take_atom(&mut self, first: Option<char>) -> String {
        let mut value = String::new();
        if let Some(c) = first {
            value.push(c);
        }
        while let Some(c) = self.peek() {
            if is_delimiter(c) {
                break;
            }
            value.push(c);
            self.advance();
        }
        value
    }

    fn scan_string(&mut self) -> Result<Token, LexerError> {
        let mut value = String::new();

        loop {
            match self.peek() {
                None => return Err(LexerError::unterminated_string(self.current_span())),
                Some('"') => {
                    self.advance();
                    break;
                }
                Some('\n') => {
                    self.advance();
                    self.line += 1;
                    self.column = 1;
                    value.push('\n');
                }
                Some('\\') => {
                    self.advance();
                    match self.advance().map(|(_, c)| c) {
                        Some('n') => value.push('\n'),
                        Some('t') => value.push('\t'),
                        Some('r') => value.push('\r'),
                        Some('0') => value.push('\0'),
                        Some('\\') => value.push('\\'),
                        Some('"') => value.push('"'),
                        Some('u') => {
                            let hex: String = (0..4).filter_map(|_| self.advance()).map(|(_, c)| c).collect();
                            let decoded = u32::from_str_radix(&hex, 16)
                                .ok()
                                .and_then(char::from_u32)
                                .ok_or_else(|| LexerError::invalid_escape('u', self.current_span()))?;
                            value.push(decoded);
                        }
                        Some(c) => return Err(LexerError::invalid_escape(c, self.current_span())),
                        None => return Err(LexerError::unterminated_string(self.current_span())),
                    }
                }
                Some(c) => {
                    self.advance();
                    value.push(c);
                }
            }
        }

        Ok(self.make_token(TokenKind::Str(value)))
    }

    fn scan_character(&mut self) -> Result<Token, LexerError> {
        // The first character is always part of the literal, even a delimiter: `\(`.
        let first = match self.advance() {
            Some((_, c)) => c,
            None => return Err(LexerError::invalid_character("", self.current_span())),
        };
        let name = self.take_atom(Some(first));
        let mut chars = name.chars();
        let c = match (chars.next(), chars.next()) {
            (Some(c), None) => c,
            _ => match name.as_str() {
                "newline" => '\n',
                "space" => ' ',
                "tab" => '\t',
                "return" => '\r',
                "backspace" => '\u{8}',
                "formfeed" => '\u{c}',
                _ if name.starts_with('u') && name.len() == 5 => u32::from_str_radix(&name[1..], 16)
                    .ok()
                    .and_then(char::from_u32)
                    .ok_or_else(|| LexerError::invalid_character(name.clone(), self.current_span()))?,
                _ => return Err(LexerError::invalid_character(name, self.current_span())),
            },
        };
        Ok(self.make_token(TokenKind::Char(c)))
    }

    fn scan_keyword(&mut self) -> Result<Token, LexerError> {
        let raw = self.take_atom(None);
        let name = raw.trim_start_matches(':');
        if name.is_empty() {
            return Err(LexerError::unexpected_char(':', self.current_span()));
        }
        Ok(self.make_token(TokenKind::Keyword(name.to_string())))
    }

    fn scan_number(&mut self, first: char) -> Result<Token, LexerError> {
        let text = self.take_atom(Some(first));
        match parse_number(&text) {
            Some(kind) => Ok(self.make_token(kind)),
            None => Err(LexerError::invalid_number(text, self.current_span())),
        }
    }

    fn scan_symbol(&mut self, first: char) -> Result<Token, LexerError> {
        if is_delimiter(first) {
            return Err(LexerError::unexpected_char(first, self.current_span()));
        }
        let name = self.take_atom(Some(first));
        let kind = match name.as_str() {
            "nil" => TokenKind::Nil,
            "true" => TokenKind::True,
            "false" => TokenKind::False,
            _ => TokenKind::Symbol(name),
        };
        Ok(self.make_token(kind))
    }

    fn advance(&mut self) -> Option<(usize, char)> {
        if let Some((pos, c)) = self.chars.next() {
            self.current_pos = pos + c.len_utf8();
            self.column += 1;
            Some((pos, c))
        } else {
            None
        }
    }

    fn peek(&mut self) -> Option<char> {
        self.chars.peek().map(|(_, c)| *c)
    }

    fn mark_start(&mut self) {
        self.start_pos = self.current_pos;
        self.start_line = self.line;
        self.start_column = self.column;
    }

    fn current_span(&self) -> Span {
        Span::new(
            self.start_pos,
            self.current_pos,
            self.start_line,
            self.start_column,
        )
    }

    fn make_token(&self, kind: TokenKind) -> Token {
        Token::new(kind, self.current_span())
    }

    /// The source text this scanner reads.
    pub fn source(&self) -> &'a str {
        self.source
    }
}

/// Parse the text of a numeric literal: `42`, `-7`, `0xff`, `3N`, `1/3`, `2.5`, `1e3`, `1.5M`.
fn parse_number(text: &str) -> Option<TokenKind> {
    let (negative, body) = match text.as_bytes().first() {
        Some(b'-') => (true, &text[1..]),
        Some(b'+') => (false, &text[1..]),
        _ => (false, text),
    };
    let sign = if negative { "-" } else { "" };

    if let Some(digits) = body.strip_suffix('M') {
        let literal = format!("{}{}", sign, digits);
        return Decimal::from_str(&literal)
            .or_else(|_| Decimal::from_scientific(&literal))
            .ok()
            .map(TokenKind::Decimal);
    }
    if let Some(digits) = body.strip_suffix('N') {
        return format!("{}{}", sign, digits).parse::<i64>().ok().map(TokenKind::Int);
    }
    if let Some((num, den)) = body.split_once('/') {
        let num = format!("{}{}", sign, num).parse::<i64>().ok()?;
        let den = den.parse::<i64>().ok()?;
        if den == 0 {
            return None;
        }
        return Some(TokenKind::Ratio(num, den));
    }
    if let Some(hex) = body.strip_prefix("0x").or_else(|| body.strip_prefix("0X")) {
        let n = i64::from_str_radix(hex, 16).ok()?;
        return Some(TokenKind::Int(if negative { n.wrapping_neg() } else { n }));
    }
    if body.contains(['.', 'e', 'E']) {
        return format!("{}{}", sign, body).parse::<f64>().ok().map(TokenKind::Double);
    }
    format!("{}{}", sign, body).parse::<i64>().ok().map(TokenKind::Int)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scan(source: &str) -> Vec<TokenKind> {
        Scanner::new(source)
            .scan_tokens()
            .unwrap()
            .into_iter()
            .map(|t| t.kind)
            .collect()
    }

    #[test]
    fn test_delimiters() {
        assert_eq!(
            scan("( [ { #{ } ] )"),
            vec![
                TokenKind::LeftParen,
                TokenKind::LeftBracket,
                TokenKind::LeftBrace,
                TokenKind::HashBrace,
                TokenKind::RightBrace,
                TokenKind::RightBracket,
                TokenKind::RightParen,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_numbers() {
        assert_eq!(
            scan("42 -7 3.5 1/3 0x10 2N 1e2"),
            vec![
                TokenKind::Int(42),
                TokenKind::Int(-7),
                TokenKind::Double(3.5),
                TokenKind::Ratio(1, 3),
                TokenKind::Int(16),
                TokenKind::Int(2),
                TokenKind::Double(100.0),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_decimal_literal() {
        assert_eq!(
            scan("1.25M"),
            vec![
                TokenKind::Decimal(Decimal::from_str("1.25").unwrap()),
                TokenKind::Eof
            ]
        );
    }

    #[test]
    fn test_symbols_and_keywords() {
        assert_eq!(
            scan("+ -> foo/bar :k nil true false"),
            vec![
                TokenKind::Symbol("+".to_string()),
                TokenKind::Symbol("->".to_string()),
                TokenKind::Symbol("foo/bar".to_string()),
                TokenKind::Keyword("k".to_string()),
                TokenKind::Nil,
                TokenKind::True,
                TokenKind::False,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_strings_and_chars() {
        assert_eq!(
            scan(r#""a\"b\n" \x \newline \("#),
            vec![
                TokenKind::Str("a\"b\n".to_string()),
                TokenKind::Char('x'),
                TokenKind::Char('\n'),
                TokenKind::Char('('),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_comments_and_commas() {
        assert_eq!(
            scan("1, 2 ; ignored\n3"),
            vec![
                TokenKind::Int(1),
                TokenKind::Int(2),
                TokenKind::Int(3),
                TokenKind::Eof
            ]
        );
    }

    #[test]
    fn test_line_tracking() {
        let tokens = Scanner::new("a\n  b").scan_tokens().unwrap();
        assert_eq!(tokens[1].span.line, 2);
        assert_eq!(tokens[1].span.column, 3);
    }

    #[test]
    fn test_invalid_number() {
        assert!(Scanner::new("12abc").scan_tokens().is_err());
        assert!(Scanner::new("1/0").scan_tokens().is_err());
    }

    #[test]
    fn test_unterminated_string() {
        assert!(matches!(
            Scanner::new("\"abc").scan_tokens(),
            Err(LexerError::UnterminatedString(_))
        ));
    }
}
