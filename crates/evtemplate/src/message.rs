/*
 * message.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Message templates: the `{Name}` holes inside an event's message.
//!
//! Message templates are a much smaller language than output templates:
//! a token is a property name with an optional `@`/`$` hint, alignment and
//! format. Anything that does not parse as a token is kept as text, so
//! parsing never fails.
//!
//! Parsed templates are shared through a process-wide, append-only cache
//! keyed by template text.

use evtemplate_events::{LogEvent, Scalar, Value};
use indexmap::IndexMap;
use once_cell::sync::Lazy;
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use crate::ast::Alignment;
use crate::format::{FormatProvider, write_scalar};
use crate::json::JsonValueFormatter;
use crate::padding;
use crate::theme::{Style, TemplateTheme, ThemeStyle};
use crate::writer::Utf8Writer;

/// A `{Name,align:format}` hole in a message template.
#[derive(Debug, Clone, PartialEq)]
pub struct PropertyToken {
    pub name: String,
    pub format: Option<String>,
    pub alignment: Option<Alignment>,
    /// The token's source text, braces included.
    pub raw: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum MessageToken {
    Text(String),
    Property(PropertyToken),
}

#[derive(Debug, Clone, PartialEq)]
pub struct MessageTemplate {
    pub text: String,
    pub tokens: Vec<MessageToken>,
}

static PARSED_TEMPLATES: Lazy<RwLock<HashMap<String, Arc<MessageTemplate>>>> =
    Lazy::new(|| RwLock::new(HashMap::new()));

impl MessageTemplate {
    pub fn parse(text: &str) -> Self {
        let mut tokens = Vec::new();
        let mut literal = String::new();
        let mut rest = text;

        while let Some(c) = rest.chars().next() {
            match c {
                '{' if rest[1..].starts_with('{') => {
                    literal.push('{');
                    rest = &rest[2..];
                }
                '{' => {
                    let body = &rest[1..];
                    let close = body.find(['{', '}']).filter(|&i| body.as_bytes()[i] == b'}');
                    let token = close.and_then(|i| parse_property_token(&rest[..i + 2]));
                    match (close, token) {
                        (Some(i), Some(token)) => {
                            if !literal.is_empty() {
                                tokens.push(MessageToken::Text(std::mem::take(&mut literal)));
                            }
                            tokens.push(MessageToken::Property(token));
                            rest = &rest[i + 2..];
                        }
                        _ => {
                            literal.push('{');
                            rest = body;
                        }
                    }
                }
                '}' => {
                    literal.push('}');
                    rest = rest.strip_prefix("}}").unwrap_or(&rest[1..]);
                }
                _ => {
                    literal.push(c);
                    rest = &rest[c.len_utf8()..];
                }
            }
        }
        if !literal.is_empty() {
            tokens.push(MessageToken::Text(literal));
        }

        Self {
            text: text.to_string(),
            tokens,
        }
    }

    /// Parse through the shared cache.
    pub fn cached(text: &str) -> Arc<MessageTemplate> {
        if let Some(parsed) = PARSED_TEMPLATES
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(text)
        {
            return Arc::clone(parsed);
        }

        let parsed = Arc::new(MessageTemplate::parse(text));
        tracing::debug!(
            template = text,
            tokens = parsed.tokens.len(),
            "parsed message template"
        );
        let mut cache = PARSED_TEMPLATES
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        Arc::clone(cache.entry(text.to_string()).or_insert(parsed))
    }

    pub fn property_tokens(&self) -> impl Iterator<Item = &PropertyToken> {
        self.tokens.iter().filter_map(|token| match token {
            MessageToken::Property(p) => Some(p),
            MessageToken::Text(_) => None,
        })
    }
}

/// Parse `{...}` (braces included) as a property token.
fn parse_property_token(raw: &str) -> Option<PropertyToken> {
    let inner = &raw[1..raw.len() - 1];
    let inner = inner
        .strip_prefix('@')
        .or_else(|| inner.strip_prefix('$'))
        .unwrap_or(inner);

    let (head, format) = match inner.split_once(':') {
        Some((head, format)) => (head, Some(format)),
        None => (inner, None),
    };
    let (name, alignment) = match head.split_once(',') {
        Some((name, alignment)) => (name, Some(Alignment::parse(alignment)?)),
        None => (head, None),
    };

    let valid_name =
        !name.is_empty() && name.chars().all(|c| c.is_alphanumeric() || c == '_');
    if !valid_name || format.is_some_and(str::is_empty) {
        return None;
    }

    Some(PropertyToken {
        name: name.to_string(),
        format: format.map(str::to_string),
        alignment,
        raw: raw.to_string(),
    })
}

/// Renders message templates against event properties.
#[derive(Debug, Clone)]
pub struct MessageRenderer {
    text: Style,
    invalid: Style,
    null: Style,
    boolean: Style,
    number: Style,
    string: Style,
    scalar: Style,
    json: JsonValueFormatter,
    provider: FormatProvider,
}

impl MessageRenderer {
    pub fn new(theme: &TemplateTheme, provider: FormatProvider) -> Self {
        Self {
            text: theme.style(ThemeStyle::Text),
            invalid: theme.style(ThemeStyle::Invalid),
            null: theme.style(ThemeStyle::Null),
            boolean: theme.style(ThemeStyle::Boolean),
            number: theme.style(ThemeStyle::Number),
            string: theme.style(ThemeStyle::String),
            scalar: theme.style(ThemeStyle::Scalar),
            json: JsonValueFormatter::new(theme),
            provider,
        }
    }

    /// An unstyled renderer using the invariant provider.
    pub fn plain() -> Self {
        Self::new(&TemplateTheme::none(), FormatProvider::invariant())
    }

    /// Write the rendered message; returns the invisible byte count.
    pub fn render(
        &self,
        template: &MessageTemplate,
        properties: &IndexMap<String, Value>,
        out: &mut Utf8Writer<'_>,
    ) -> usize {
        let mut invisible = 0;
        for token in &template.tokens {
            match token {
                MessageToken::Text(text) => {
                    self.text.set(out, &mut invisible);
                    out.write_text(text);
                    self.text.reset(out);
                }
                MessageToken::Property(token) => {
                    invisible += self.render_property(token, properties, out);
                }
            }
        }
        invisible
    }

    fn render_property(
        &self,
        token: &PropertyToken,
        properties: &IndexMap<String, Value>,
        out: &mut Utf8Writer<'_>,
    ) -> usize {
        let mut invisible = 0;
        let Some(value) = properties.get(&token.name) else {
            self.invalid.set(out, &mut invisible);
            out.write_text(&token.raw);
            self.invalid.reset(out);
            return invisible;
        };

        let start = out.position();
        invisible += self.render_value(value, token.format.as_deref(), out);
        if let Some(alignment) = token.alignment {
            padding::apply(out, start, invisible, alignment);
        }
        invisible
    }

    fn render_value(&self, value: &Value, format: Option<&str>, out: &mut Utf8Writer<'_>) -> usize {
        let Value::Scalar(scalar) = value else {
            return self.json.format(value, out);
        };

        let style = match scalar {
            Scalar::Null => &self.null,
            Scalar::String(_) => &self.string,
            Scalar::Bool(_) => &self.boolean,
            Scalar::Int(_) | Scalar::UInt(_) | Scalar::Float(_) => &self.number,
            Scalar::Char(_) | Scalar::DateTime(_) => &self.scalar,
        };
        let mut invisible = 0;
        style.set(out, &mut invisible);
        write_scalar(out, scalar, format, &self.provider);
        style.reset(out);
        invisible
    }

    /// The plain text of each formatted property token, in order.
    pub fn renderings(&self, template: &MessageTemplate, properties: &IndexMap<String, Value>) -> Vec<String> {
        template
            .property_tokens()
            .filter(|token| token.format.is_some())
            .map(|token| {
                let mut buf = Vec::new();
                {
                    let mut out = Utf8Writer::new(&mut buf);
                    self.render_property(token, properties, &mut out);
                }
                String::from_utf8_lossy(&buf).into_owned()
            })
            .collect()
    }
}

/// The event's message as plain text.
pub fn render_message(event: &LogEvent) -> String {
    let template = MessageTemplate::cached(&event.message_template);
    let mut buf = Vec::with_capacity(event.message_template.len());
    {
        let mut out = Utf8Writer::new(&mut buf);
        MessageRenderer::plain().render(&template, &event.properties, &mut out);
    }
    String::from_utf8_lossy(&buf).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::AlignmentDirection;
    use evtemplate_events::{Level, Structure, Property};
    use pretty_assertions::assert_eq;

    fn text(s: &str) -> MessageToken {
        MessageToken::Text(s.to_string())
    }

    fn render(message: &str, properties: &[(&str, Value)]) -> String {
        let mut event = LogEvent::now(Level::Information, message);
        for (name, value) in properties {
            event = event.with_property(*name, value.clone());
        }
        render_message(&event)
    }

    // ========================================================================
    // Parsing
    // ========================================================================

    #[test]
    fn test_parse_tokens() {
        let parsed = MessageTemplate::parse("Hello, {Name}!");
        assert_eq!(parsed.tokens.len(), 3);
        assert_eq!(parsed.tokens[0], text("Hello, "));
        let MessageToken::Property(token) = &parsed.tokens[1] else {
            panic!("expected a property token");
        };
        assert_eq!(token.name, "Name");
        assert_eq!(token.raw, "{Name}");
        assert_eq!(parsed.tokens[2], text("!"));
    }

    #[test]
    fn test_parse_format_alignment_and_hints() {
        let parsed = MessageTemplate::parse("{@Count,-5:000}{$Obj}");
        let tokens: Vec<_> = parsed.property_tokens().collect();
        assert_eq!(tokens[0].name, "Count");
        assert_eq!(tokens[0].format.as_deref(), Some("000"));
        assert_eq!(
            tokens[0].alignment.map(|a| (a.direction, a.width)),
            Some((AlignmentDirection::Left, 5))
        );
        assert_eq!(tokens[1].name, "Obj");
    }

    #[test]
    fn test_escapes_and_invalid_tokens_are_text() {
        let parsed = MessageTemplate::parse("{{x}} {not valid} {a{b} }");
        assert_eq!(parsed.property_tokens().map(|t| t.name.as_str()).collect::<Vec<_>>(), vec!["b"]);
        assert_eq!(parsed.tokens[0], text("{x} {not valid} {a"));
    }

    #[test]
    fn test_unclosed_token_is_text() {
        assert_eq!(MessageTemplate::parse("a {b").tokens, vec![text("a {b")]);
    }

    #[test]
    fn test_cache_returns_shared_template() {
        let a = MessageTemplate::cached("cache {Probe}");
        let b = MessageTemplate::cached("cache {Probe}");
        assert!(Arc::ptr_eq(&a, &b));
    }

    // ========================================================================
    // Rendering
    // ========================================================================

    #[test]
    fn test_render_scalars() {
        assert_eq!(
            render("Hello, {Name}!", &[("Name", Value::from("World"))]),
            "Hello, World!"
        );
        assert_eq!(
            render("{A} {B} {C}", &[
                ("A", Value::null()),
                ("B", Value::from(true)),
                ("C", Value::from(1.5)),
            ]),
            "null true 1.5"
        );
    }

    #[test]
    fn test_render_missing_property_as_source_text() {
        assert_eq!(render("Hi {Missing:000}", &[]), "Hi {Missing:000}");
    }

    #[test]
    fn test_render_format_and_alignment() {
        assert_eq!(
            render("[{N,5:000}] [{S,-4}]", &[("N", Value::from(7)), ("S", Value::from("ab"))]),
            "[  007] [ab  ]"
        );
    }

    #[test]
    fn test_render_structures_as_json() {
        let value = Value::Structure(Structure::new(vec![Property::new("X", Value::from(1))]));
        assert_eq!(render("P={P}", &[("P", value)]), r#"P={"X":1}"#);
    }

    #[test]
    fn test_renderings_only_for_formatted_tokens() {
        let template = MessageTemplate::parse("{A:000} {B} {C:F1}");
        let mut properties = IndexMap::new();
        properties.insert("A".to_string(), Value::from(5));
        properties.insert("B".to_string(), Value::from(6));
        properties.insert("C".to_string(), Value::from(2));
        assert_eq!(
            MessageRenderer::plain().renderings(&template, &properties),
            vec!["005".to_string(), "2.0".to_string()]
        );
    }

    #[test]
    fn test_themed_text_is_styled() {
        let theme = TemplateTheme::new([(ThemeStyle::Text, "\x1b[1m")]);
        let renderer = MessageRenderer::new(&theme, FormatProvider::invariant());
        let mut buf = Vec::new();
        let invisible = {
            let mut out = Utf8Writer::new(&mut buf);
            renderer.render(&MessageTemplate::parse("hi"), &IndexMap::new(), &mut out)
        };
        assert_eq!(buf, b"\x1b[1mhi\x1b[0m");
        assert_eq!(invisible, 8);
    }
}
