/*
 * lexer.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Expression tokenizer.
//!
//! The lexer is pull-based and works directly on the template source from a
//! starting offset. The template parser hands control to the expression
//! parser at the start of a placeholder and takes it back at the first token
//! the expression grammar cannot consume (usually `}`, `,` or `:`), so
//! tokens are produced one at a time rather than up front.

use crate::error::{TemplateError, TemplateResult};

#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    Integer(i64),
    Float(f64),
    /// Single-quoted string with `''` escapes collapsed.
    String(String),
    Identifier(String),
    /// `@name`, without the `@`.
    Builtin(String),
    LParen,
    RParen,
    LBracket,
    RBracket,
    LBrace,
    RBrace,
    Comma,
    Colon,
    Dot,
    DotDot,
    Question,
    Star,
    Plus,
    Minus,
    Slash,
    Percent,
    Caret,
    Equal,
    NotEqual,
    Less,
    LessOrEqual,
    Greater,
    GreaterOrEqual,
    Eof,
}

impl TokenKind {
    pub fn describe(&self) -> String {
        match self {
            TokenKind::Integer(n) => format!("number `{}`", n),
            TokenKind::Float(n) => format!("number `{}`", n),
            TokenKind::String(_) => "string literal".to_string(),
            TokenKind::Identifier(name) => format!("`{}`", name),
            TokenKind::Builtin(name) => format!("`@{}`", name),
            TokenKind::Eof => "end of template".to_string(),
            other => format!("`{}`", other.symbol()),
        }
    }

    fn symbol(&self) -> &'static str {
        match self {
            TokenKind::LParen => "(",
            TokenKind::RParen => ")",
            TokenKind::LBracket => "[",
            TokenKind::RBracket => "]",
            TokenKind::LBrace => "{",
            TokenKind::RBrace => "}",
            TokenKind::Comma => ",",
            TokenKind::Colon => ":",
            TokenKind::Dot => ".",
            TokenKind::DotDot => "..",
            TokenKind::Question => "?",
            TokenKind::Star => "*",
            TokenKind::Plus => "+",
            TokenKind::Minus => "-",
            TokenKind::Slash => "/",
            TokenKind::Percent => "%",
            TokenKind::Caret => "^",
            TokenKind::Equal => "=",
            TokenKind::NotEqual => "<>",
            TokenKind::Less => "<",
            TokenKind::LessOrEqual => "<=",
            TokenKind::Greater => ">",
            TokenKind::GreaterOrEqual => ">=",
            _ => "",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    /// Byte offset of the first character.
    pub start: usize,
    /// Byte offset one past the last character.
    pub end: usize,
}

impl Token {
    /// Case-insensitive keyword test for identifier tokens.
    pub fn is_keyword(&self, keyword: &str) -> bool {
        matches!(&self.kind, TokenKind::Identifier(name) if name.eq_ignore_ascii_case(keyword))
    }
}

pub struct Lexer<'s> {
    source: &'s str,
    pos: usize,
}

impl<'s> Lexer<'s> {
    pub fn new(source: &'s str, start: usize) -> Self {
        Self { source, pos: start }
    }

    pub fn source(&self) -> &'s str {
        self.source
    }

    fn peek_byte(&self, offset: usize) -> Option<u8> {
        self.source.as_bytes().get(self.pos + offset).copied()
    }

    fn skip_whitespace(&mut self) {
        while let Some(c) = self.source[self.pos..].chars().next() {
            if !c.is_whitespace() {
                break;
            }
            self.pos += c.len_utf8();
        }
    }

    pub fn next_token(&mut self) -> TemplateResult<Token> {
        self.skip_whitespace();
        let start = self.pos;
        let Some(c) = self.source[start..].chars().next() else {
            return Ok(Token {
                kind: TokenKind::Eof,
                start,
                end: start,
            });
        };

        let kind = match c {
            '0'..='9' => return self.number(start),
            '\'' => return self.string(start),
            '@' => {
                self.pos += 1;
                let name = self.identifier_text();
                if name.is_empty() {
                    return Err(TemplateError::parse(
                        "expected a built-in property name after `@`",
                        start,
                    ));
                }
                TokenKind::Builtin(name.to_string())
            }
            c if c.is_alphabetic() || c == '_' => {
                TokenKind::Identifier(self.identifier_text().to_string())
            }
            _ => {
                let (kind, len) = match (c, self.peek_byte(1)) {
                    ('.', Some(b'.')) => (TokenKind::DotDot, 2),
                    ('<', Some(b'>')) => (TokenKind::NotEqual, 2),
                    ('<', Some(b'=')) => (TokenKind::LessOrEqual, 2),
                    ('>', Some(b'=')) => (TokenKind::GreaterOrEqual, 2),
                    ('(', _) => (TokenKind::LParen, 1),
                    (')', _) => (TokenKind::RParen, 1),
                    ('[', _) => (TokenKind::LBracket, 1),
                    (']', _) => (TokenKind::RBracket, 1),
                    ('{', _) => (TokenKind::LBrace, 1),
                    ('}', _) => (TokenKind::RBrace, 1),
                    (',', _) => (TokenKind::Comma, 1),
                    (':', _) => (TokenKind::Colon, 1),
                    ('.', _) => (TokenKind::Dot, 1),
                    ('?', _) => (TokenKind::Question, 1),
                    ('*', _) => (TokenKind::Star, 1),
                    ('+', _) => (TokenKind::Plus, 1),
                    ('-', _) => (TokenKind::Minus, 1),
                    ('/', _) => (TokenKind::Slash, 1),
                    ('%', _) => (TokenKind::Percent, 1),
                    ('^', _) => (TokenKind::Caret, 1),
                    ('=', _) => (TokenKind::Equal, 1),
                    ('<', _) => (TokenKind::Less, 1),
                    ('>', _) => (TokenKind::Greater, 1),
                    _ => {
                        return Err(TemplateError::parse(
                            format!("unexpected character `{}`", c),
                            start,
                        ));
                    }
                };
                self.pos += len;
                kind
            }
        };

        Ok(Token {
            kind,
            start,
            end: self.pos,
        })
    }

    fn identifier_text(&mut self) -> &'s str {
        let start = self.pos;
        while let Some(c) = self.source[self.pos..].chars().next() {
            if !(c.is_alphanumeric() || c == '_') {
                break;
            }
            self.pos += c.len_utf8();
        }
        &self.source[start..self.pos]
    }

    fn number(&mut self, start: usize) -> TemplateResult<Token> {
        let bytes = self.source.as_bytes();

        if bytes[start] == b'0' && matches!(bytes.get(start + 1), Some(b'x' | b'X')) {
            self.pos = start + 2;
            while self.peek_byte(0).is_some_and(|b| b.is_ascii_hexdigit()) {
                self.pos += 1;
            }
            let digits = &self.source[start + 2..self.pos];
            let value = u64::from_str_radix(digits, 16)
                .map_err(|_| TemplateError::parse("invalid hexadecimal literal", start))?;
            let kind = match i64::try_from(value) {
                Ok(n) => TokenKind::Integer(n),
                Err(_) => TokenKind::Float(value as f64),
            };
            return Ok(Token {
                kind,
                start,
                end: self.pos,
            });
        }

        while self.peek_byte(0).is_some_and(|b| b.is_ascii_digit()) {
            self.pos += 1;
        }
        let mut is_float = false;
        if self.peek_byte(0) == Some(b'.') && self.peek_byte(1).is_some_and(|b| b.is_ascii_digit())
        {
            is_float = true;
            self.pos += 1;
            while self.peek_byte(0).is_some_and(|b| b.is_ascii_digit()) {
                self.pos += 1;
            }
        }

        let text = &self.source[start..self.pos];
        let kind = if is_float {
            TokenKind::Float(
                text.parse()
                    .map_err(|_| TemplateError::parse("invalid number", start))?,
            )
        } else {
            match text.parse::<i64>() {
                Ok(n) => TokenKind::Integer(n),
                Err(_) => TokenKind::Float(
                    text.parse()
                        .map_err(|_| TemplateError::parse("invalid number", start))?,
                ),
            }
        };
        Ok(Token {
            kind,
            start,
            end: self.pos,
        })
    }

    fn string(&mut self, start: usize) -> TemplateResult<Token> {
        let mut value = String::new();
        self.pos = start + 1;
        loop {
            let Some(c) = self.source[self.pos..].chars().next() else {
                return Err(TemplateError::parse("unterminated string literal", start));
            };
            self.pos += c.len_utf8();
            if c == '\'' {
                if self.peek_byte(0) == Some(b'\'') {
                    value.push('\'');
                    self.pos += 1;
                } else {
                    break;
                }
            } else {
                value.push(c);
            }
        }
        Ok(Token {
            kind: TokenKind::String(value),
            start,
            end: self.pos,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn kinds(source: &str) -> Vec<TokenKind> {
        let mut lexer = Lexer::new(source, 0);
        let mut out = Vec::new();
        loop {
            let token = lexer.next_token().unwrap();
            if token.kind == TokenKind::Eof {
                return out;
            }
            out.push(token.kind);
        }
    }

    #[test]
    fn test_operators() {
        assert_eq!(
            kinds("a <> b <= c >= d .. e.f"),
            vec![
                TokenKind::Identifier("a".into()),
                TokenKind::NotEqual,
                TokenKind::Identifier("b".into()),
                TokenKind::LessOrEqual,
                TokenKind::Identifier("c".into()),
                TokenKind::GreaterOrEqual,
                TokenKind::Identifier("d".into()),
                TokenKind::DotDot,
                TokenKind::Identifier("e".into()),
                TokenKind::Dot,
                TokenKind::Identifier("f".into()),
            ]
        );
    }

    #[test]
    fn test_numbers() {
        assert_eq!(
            kinds("42 3.25 0x1F 7.x"),
            vec![
                TokenKind::Integer(42),
                TokenKind::Float(3.25),
                TokenKind::Integer(31),
                TokenKind::Integer(7),
                TokenKind::Dot,
                TokenKind::Identifier("x".into()),
            ]
        );
    }

    #[test]
    fn test_strings_and_builtins() {
        assert_eq!(
            kinds("'it''s' @mt"),
            vec![
                TokenKind::String("it's".into()),
                TokenKind::Builtin("mt".into()),
            ]
        );
    }

    #[test]
    fn test_unterminated_string() {
        let err = Lexer::new("x 'abc", 0).next_token().and_then(|_| {
            let mut lexer = Lexer::new("x 'abc", 2);
            lexer.next_token()
        });
        assert_eq!(
            err,
            Err(TemplateError::parse("unterminated string literal", 2))
        );
    }

    #[test]
    fn test_unexpected_character() {
        let err = Lexer::new("  !", 0).next_token().unwrap_err();
        assert_eq!(err.position(), 2);
    }

    #[test]
    fn test_token_spans() {
        let mut lexer = Lexer::new("{Name,-5}", 1);
        let name = lexer.next_token().unwrap();
        assert_eq!((name.start, name.end), (1, 5));
        let comma = lexer.next_token().unwrap();
        assert_eq!(comma.kind, TokenKind::Comma);
        assert_eq!(comma.end, 6);
    }
}
