/*
 * parser.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Template parser.
//!
//! Splits template source into literal text, `{expr}` placeholders and
//! `{#...}` directive markers. Expressions inside holes are handed to the
//! [`ExpressionParser`]; directive nesting is left to [`crate::binder`].
//!
//! Placeholder syntax is `{expr}`, `{expr,alignment}`, `{expr:format}` or
//! `{expr,alignment:format}`. The alignment may also trail the format
//! (`{expr:format,alignment}`). Literal braces are written `{{` and `}}`.

use crate::ast::{Alignment, Directive, DirectiveKind, ParsedTemplate, Placeholder, TemplateElement};
use crate::error::{TemplateError, TemplateResult};
use crate::expression_parser::ExpressionParser;
use crate::lexer::TokenKind;

/// Parse template source into a flat element list.
pub fn parse(source: &str) -> TemplateResult<ParsedTemplate> {
    let bytes = source.as_bytes();
    let mut elements = Vec::new();
    let mut text = String::new();
    let mut pos = 0;

    while pos < bytes.len() {
        match (bytes[pos], bytes.get(pos + 1)) {
            (b'{', Some(b'{')) => {
                text.push('{');
                pos += 2;
            }
            (b'}', Some(b'}')) => {
                text.push('}');
                pos += 2;
            }
            (b'}', _) => {
                return Err(TemplateError::parse(
                    "unexpected `}` in literal text; write `}}` for a literal brace",
                    pos,
                ));
            }
            (b'{', _) => {
                if !text.is_empty() {
                    elements.push(TemplateElement::Text(std::mem::take(&mut text)));
                }
                let (element, next) = parse_hole(source, pos)?;
                elements.push(element);
                pos = next;
            }
            _ => {
                let next = source[pos..]
                    .find(['{', '}'])
                    .map_or(source.len(), |i| pos + i);
                text.push_str(&source[pos..next]);
                pos = next;
            }
        }
    }

    if !text.is_empty() {
        elements.push(TemplateElement::Text(text));
    }

    Ok(ParsedTemplate { elements })
}

/// Parse a hole starting at the `{` at `open`. Returns the element and the
/// offset just past the closing `}`.
fn parse_hole(source: &str, open: usize) -> TemplateResult<(TemplateElement, usize)> {
    let inner = open + 1;
    let first = source[inner..]
        .char_indices()
        .find(|(_, c)| !c.is_whitespace())
        .map(|(i, c)| (inner + i, c));

    match first {
        Some((hash, '#')) => parse_directive(source, open, hash + 1),
        _ => parse_placeholder(source, open),
    }
}

fn parse_directive(
    source: &str,
    open: usize,
    keyword_start: usize,
) -> TemplateResult<(TemplateElement, usize)> {
    let mut parser = ExpressionParser::new(source, keyword_start)?;
    let keyword = match &parser.current().kind {
        TokenKind::Identifier(name) => name.to_ascii_lowercase(),
        other => {
            return Err(TemplateError::parse(
                format!("expected a directive name after `#`, found {}", other.describe()),
                parser.current().start,
            ));
        }
    };
    let keyword_position = parser.current().start;
    parser.advance()?;

    let kind = match keyword.as_str() {
        "if" => DirectiveKind::If(parser.parse_expression()?),
        "else" => {
            if parser.accept_keyword("if")? {
                DirectiveKind::ElseIf(parser.parse_expression()?)
            } else {
                DirectiveKind::Else
            }
        }
        "each" => {
            let mut names = vec![expect_name(&mut parser)?];
            if parser.current().kind == TokenKind::Comma {
                parser.advance()?;
                names.push(expect_name(&mut parser)?);
            }
            parser.expect_keyword("in")?;
            let collection = parser.parse_expression()?;
            DirectiveKind::Each { names, collection }
        }
        "delimit" => DirectiveKind::Delimit,
        "end" => DirectiveKind::End,
        other => {
            return Err(TemplateError::parse(
                format!("unknown directive `#{}`", other),
                keyword_position,
            ));
        }
    };

    // The closing brace stays as the lookahead; lexing past it would read
    // literal text as expression tokens.
    let close = parser.current();
    if close.kind != TokenKind::RBrace {
        return Err(TemplateError::parse(
            format!("expected `}}` to close the directive, found {}", close.kind.describe()),
            close.start,
        ));
    }
    Ok((
        TemplateElement::Directive(Directive {
            kind,
            position: open,
        }),
        close.end,
    ))
}

fn expect_name(parser: &mut ExpressionParser<'_>) -> TemplateResult<String> {
    let token = parser.advance()?;
    match token.kind {
        TokenKind::Identifier(name) => Ok(name),
        other => Err(TemplateError::parse(
            format!("expected an iteration variable name, found {}", other.describe()),
            token.start,
        )),
    }
}

fn parse_placeholder(source: &str, open: usize) -> TemplateResult<(TemplateElement, usize)> {
    let mut parser = ExpressionParser::new(source, open + 1)?;
    if parser.current().kind == TokenKind::RBrace {
        return Err(TemplateError::parse("empty placeholder", open));
    }
    let expression = parser.parse_expression()?;

    let token = parser.current().clone();
    let (alignment, format, end) = match token.kind {
        TokenKind::RBrace => (None, None, token.end),
        TokenKind::Comma => {
            let (alignment_text, stop) = scan_until(source, token.end, &[':', '}'], open)?;
            let alignment = Alignment::parse(alignment_text).ok_or_else(|| {
                TemplateError::parse(
                    format!("invalid alignment `{}`", alignment_text.trim()),
                    token.end,
                )
            })?;
            if source.as_bytes()[stop] == b':' {
                let (format, close) = scan_until(source, stop + 1, &['}'], open)?;
                (Some(alignment), non_empty(format), close + 1)
            } else {
                (Some(alignment), None, stop + 1)
            }
        }
        TokenKind::Colon => {
            let (format, close) = scan_until(source, token.end, &['}'], open)?;
            let (format, alignment) = split_trailing_alignment(format);
            (alignment, non_empty(format), close + 1)
        }
        other => {
            return Err(TemplateError::parse(
                format!(
                    "expected `}}`, `,` or `:` after the expression, found {}",
                    other.describe()
                ),
                token.start,
            ));
        }
    };

    Ok((
        TemplateElement::Placeholder(Placeholder {
            expression,
            format,
            alignment,
            position: open,
        }),
        end,
    ))
}

/// Scan raw text from `from` up to the first of `stops`. Returns the text and
/// the offset of the stop character.
fn scan_until<'s>(
    source: &'s str,
    from: usize,
    stops: &[char],
    open: usize,
) -> TemplateResult<(&'s str, usize)> {
    match source[from..].find(stops) {
        Some(i) => Ok((&source[from..from + i], from + i)),
        None => Err(TemplateError::parse(
            "unterminated placeholder; expected `}`",
            open,
        )),
    }
}

/// `HH:mm,-10` carries its alignment after the format.
///
/// An unsigned run of zeros after the last comma is a digit group of a
/// numeric pattern (`0,000`, `#,0`), not a width.
fn split_trailing_alignment(format: &str) -> (&str, Option<Alignment>) {
    let Some(comma) = format.rfind(',') else {
        return (format, None);
    };
    let candidate = format[comma + 1..].trim();
    let signed = candidate.starts_with(['-', '+']);
    if !signed && candidate.bytes().all(|b| b == b'0') {
        return (format, None);
    }
    match Alignment::parse(candidate) {
        Some(alignment) => (&format[..comma], Some(alignment)),
        None => (format, None),
    }
}

fn non_empty(text: &str) -> Option<String> {
    if text.is_empty() {
        None
    } else {
        Some(text.to_string())
    }
}
