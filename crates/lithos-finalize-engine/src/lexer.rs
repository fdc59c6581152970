// SPDX-License-Identifier: Apache-2.0 OR MIT
use std::iter::Peekable;
use std::str::CharIndices;

use serde_json::Value;

use crate::ast::Span;
use crate::error::Error;
use crate::runtime::parse_number;

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    /// Bare identifiers and `$`-prefixed variables.
    Identifier(String),
    StringLiteral(String),
    NumberLiteral(String),
    Dot,
    Pipe,
    Assign,
    Declare,
    Comma,
    LeftParen,
    RightParen,
    Keyword(Keyword),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Keyword {
    If,
    Else,
    End,
    Range,
    Nil,
    True,
    False,
}

impl Keyword {
    pub fn as_str(&self) -> &'static str {
        match self {
            Keyword::If => "if",
            Keyword::Else => "else",
            Keyword::End => "end",
            Keyword::Range => "range",
            Keyword::Nil => "nil",
            Keyword::True => "true",
            Keyword::False => "false",
        }
    }

    fn from_ident(ident: &str) -> Option<Self> {
        Some(match ident {
            "if" => Keyword::If,
            "else" => Keyword::Else,
            "end" => Keyword::End,
            "range" => Keyword::Range,
            "nil" => Keyword::Nil,
            "true" => Keyword::True,
            "false" => Keyword::False,
            _ => return None,
        })
    }
}

/// Splits the body of one action into tokens. `offset` is the byte position of
/// the body inside the full template, so spans point into the original source.
pub fn lex_action(input: &str, offset: usize) -> Result<Vec<Token>, Error> {
    let mut lexer = Lexer::new(input, offset);
    let mut tokens = Vec::new();
    while let Some(token) = lexer.next_token()? {
        tokens.push(token);
    }
    Ok(tokens)
}

/// Parses a single Go literal (`"text"`, `` `raw` ``, `-1.5e3`, `true`, `nil`)
/// into a JSON value. Literals emitted by code generators read back through
/// the same lexer the templates use.
pub fn literal_value(text: &str) -> Result<Value, Error> {
    let tokens = lex_action(text.trim(), 0)?;
    let [token] = tokens.as_slice() else {
        return Err(Error::parse(
            format!("expected a single literal, found {} tokens", tokens.len()),
            None,
        ));
    };
    match &token.kind {
        TokenKind::StringLiteral(value) => Ok(Value::String(value.clone())),
        TokenKind::NumberLiteral(value) => parse_number(value)
            .map(Value::Number)
            .ok_or_else(|| Error::parse_with_span(format!("invalid number {value}"), token.span)),
        TokenKind::Keyword(Keyword::True) => Ok(Value::Bool(true)),
        TokenKind::Keyword(Keyword::False) => Ok(Value::Bool(false)),
        TokenKind::Keyword(Keyword::Nil) => Ok(Value::Null),
        other => Err(Error::parse_with_span(
            format!("expected literal, found {other:?}"),
            token.span,
        )),
    }
}

struct Lexer<'a> {
    input: &'a str,
    chars: Peekable<CharIndices<'a>>,
    offset: usize,
}

impl<'a> Lexer<'a> {
    fn new(input: &'a str, offset: usize) -> Self {
        Self {
            input,
            chars: input.char_indices().peekable(),
            offset,
        }
    }

    fn next_token(&mut self) -> Result<Option<Token>, Error> {
        while self.chars.next_if(|(_, ch)| ch.is_whitespace()).is_some() {}

        let Some((start, chr)) = self.chars.next() else {
            return Ok(None);
        };

        let kind = match chr {
            '.' => TokenKind::Dot,
            '|' => TokenKind::Pipe,
            ',' => TokenKind::Comma,
            '(' => TokenKind::LeftParen,
            ')' => TokenKind::RightParen,
            '=' => TokenKind::Assign,
            ':' => {
                if self.chars.next_if(|(_, ch)| *ch == '=').is_none() {
                    return Err(Error::parse_with_span(
                        "expected ':=' after ':'",
                        self.span_from(start),
                    ));
                }
                TokenKind::Declare
            }
            '"' => TokenKind::StringLiteral(self.read_string(start)?),
            '`' => TokenKind::StringLiteral(self.read_raw_string(start)?),
            '-' if self.peek_is(|ch| ch.is_ascii_digit()) => {
                TokenKind::NumberLiteral(self.read_number(start))
            }
            c if c.is_ascii_digit() => TokenKind::NumberLiteral(self.read_number(start)),
            c if is_identifier_start(c) => {
                let ident = self.read_identifier(start);
                match Keyword::from_ident(ident) {
                    Some(keyword) => TokenKind::Keyword(keyword),
                    None => TokenKind::Identifier(ident.to_string()),
                }
            }
            other => {
                return Err(Error::parse_with_span(
                    format!("unexpected character '{other}'"),
                    self.span_from(start),
                ));
            }
        };

        Ok(Some(Token {
            kind,
            span: self.span_from(start),
        }))
    }

    fn read_identifier(&mut self, start: usize) -> &'a str {
        while self.chars.next_if(|(_, ch)| is_identifier_part(*ch)).is_some() {}
        let end = self.position();
        let input = self.input;
        &input[start..end]
    }

    fn read_number(&mut self, start: usize) -> String {
        let mut previous = '\0';
        while let Some((_, ch)) = self.chars.next_if(|(_, ch)| {
            ch.is_ascii_digit()
                || matches!(ch, '.' | 'e' | 'E')
                || (matches!(ch, '+' | '-') && matches!(previous, 'e' | 'E'))
        }) {
            previous = ch;
        }
        let end = self.position();
        self.input[start..end].to_string()
    }

    fn read_string(&mut self, start: usize) -> Result<String, Error> {
        let mut literal = String::new();
        while let Some((_, ch)) = self.chars.next() {
            match ch {
                '"' => return Ok(literal),
                '\\' => literal.push(self.read_escape(start)?),
                '\n' => break,
                other => literal.push(other),
            }
        }
        Err(Error::parse_with_span(
            "unterminated string literal",
            self.span_from(start),
        ))
    }

    fn read_escape(&mut self, start: usize) -> Result<char, Error> {
        let Some((_, next)) = self.chars.next() else {
            return Err(Error::parse_with_span(
                "unterminated escape sequence",
                self.span_from(start),
            ));
        };
        let escaped = match next {
            'a' => '\u{07}',
            'b' => '\u{08}',
            'f' => '\u{0C}',
            'n' => '\n',
            'r' => '\r',
            't' => '\t',
            'v' => '\u{0B}',
            '\\' => '\\',
            '"' => '"',
            '\'' => '\'',
            'x' => self.read_hex_escape(start, 2)?,
            'u' => self.read_hex_escape(start, 4)?,
            'U' => self.read_hex_escape(start, 8)?,
            other => {
                return Err(Error::parse_with_span(
                    format!("unknown escape sequence \\{other}"),
                    self.span_from(start),
                ));
            }
        };
        Ok(escaped)
    }

    fn read_hex_escape(&mut self, start: usize, digits: usize) -> Result<char, Error> {
        let mut code = 0u32;
        for _ in 0..digits {
            let digit = self
                .chars
                .next()
                .and_then(|(_, ch)| ch.to_digit(16))
                .ok_or_else(|| {
                    Error::parse_with_span("malformed hex escape", self.span_from(start))
                })?;
            code = code * 16 + digit;
        }
        char::from_u32(code).ok_or_else(|| {
            Error::parse_with_span(
                format!("escape \\u{code:x} is not a valid character"),
                self.span_from(start),
            )
        })
    }

    fn read_raw_string(&mut self, start: usize) -> Result<String, Error> {
        let body_start = self.position();
        for (idx, ch) in self.chars.by_ref() {
            if ch == '`' {
                return Ok(self.input[body_start..idx].to_string());
            }
        }
        Err(Error::parse_with_span(
            "unterminated raw string literal",
            self.span_from(start),
        ))
    }

    fn peek_is(&mut self, pred: impl Fn(char) -> bool) -> bool {
        self.chars.peek().map(|(_, ch)| pred(*ch)).unwrap_or(false)
    }

    fn position(&mut self) -> usize {
        self.chars
            .peek()
            .map(|(idx, _)| *idx)
            .unwrap_or(self.input.len())
    }

    fn span_from(&mut self, start: usize) -> Span {
        let end = self.position();
        Span::new(self.offset + start, self.offset + end)
    }
}

fn is_identifier_start(ch: char) -> bool {
    ch.is_ascii_alphabetic() || ch == '_' || ch == '$'
}

fn is_identifier_part(ch: char) -> bool {
    ch.is_ascii_alphanumeric() || ch == '_'
}
