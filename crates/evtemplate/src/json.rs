/*
 * json.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Themed JSON rendering of property values.
//!
//! Non-scalar values, and scalars inside them, are written as JSON with each
//! token wrapped in the theme style for its role. Every `format` call returns
//! the number of invisible (escape sequence) bytes it emitted so callers can
//! align the result.

use evtemplate_events::{Scalar, Structure, Value, ValueVisitor};
use std::fmt::Write as _;

use crate::string_cache::write_json_name;
use crate::theme::{Style, TemplateTheme, ThemeStyle};
use crate::writer::Utf8Writer;

/// Member name carrying a structure's type tag. Written last.
pub const TYPE_TAG_PROPERTY: &str = "$type";

/// Write `text` as a quoted JSON string.
///
/// `"` and `\` are backslash-escaped, `\n`, `\r`, `\t` and `\f` use their
/// short escapes, and other control characters below U+0020 become
/// `\u00XX`. Everything else, including non-ASCII text, is copied as-is.
pub fn write_quoted_json_string(text: &str, out: &mut Utf8Writer<'_>) {
    out.write_byte(b'"');
    let bytes = text.as_bytes();
    let mut clean_start = 0;
    for (i, &b) in bytes.iter().enumerate() {
        let escape: &[u8] = match b {
            b'"' => b"\\\"",
            b'\\' => b"\\\\",
            b'\n' => b"\\n",
            b'\r' => b"\\r",
            b'\t' => b"\\t",
            0x0C => b"\\f",
            0..=0x1F => b"",
            _ => continue,
        };
        out.write(&bytes[clean_start..i]);
        clean_start = i + 1;
        if escape.is_empty() {
            let _ = write!(out, "\\u{:04X}", b);
        } else {
            out.write(escape);
        }
    }
    out.write(&bytes[clean_start..]);
    out.write_byte(b'"');
}

/// Renders [`Value`]s as themed JSON.
#[derive(Debug, Clone, Default)]
pub struct JsonValueFormatter {
    null: Style,
    boolean: Style,
    number: Style,
    string: Style,
    scalar: Style,
    tertiary: Style,
    name: Style,
}

impl JsonValueFormatter {
    pub fn new(theme: &TemplateTheme) -> Self {
        Self {
            null: theme.style(ThemeStyle::Null),
            boolean: theme.style(ThemeStyle::Boolean),
            number: theme.style(ThemeStyle::Number),
            string: theme.style(ThemeStyle::String),
            scalar: theme.style(ThemeStyle::Scalar),
            tertiary: theme.style(ThemeStyle::TertiaryText),
            name: theme.style(ThemeStyle::Name),
        }
    }

    /// Write `value`; returns the invisible byte count.
    pub fn format(&self, value: &Value, out: &mut Utf8Writer<'_>) -> usize {
        value.accept(self, out)
    }

    /// Render `value` to an unstyled JSON string.
    pub fn to_json_string(value: &Value) -> String {
        let mut buf = Vec::new();
        {
            let mut out = Utf8Writer::new(&mut buf);
            JsonValueFormatter::default().format(value, &mut out);
        }
        String::from_utf8_lossy(&buf).into_owned()
    }

    fn punctuation(&self, out: &mut Utf8Writer<'_>, byte: u8, invisible: &mut usize) {
        self.tertiary.set(out, invisible);
        out.write_byte(byte);
        self.tertiary.reset(out);
    }

    fn quoted(&self, style: &Style, text: &str, out: &mut Utf8Writer<'_>, invisible: &mut usize) {
        style.set(out, invisible);
        write_quoted_json_string(text, out);
        style.reset(out);
    }

    fn member_name(&self, name: &str, out: &mut Utf8Writer<'_>, invisible: &mut usize) {
        self.name.set(out, invisible);
        write_json_name(name, out);
        self.name.reset(out);
    }

    fn scalar_value(&self, scalar: &Scalar, out: &mut Utf8Writer<'_>) -> usize {
        let mut invisible = 0;
        match scalar {
            Scalar::Null => {
                self.null.set(out, &mut invisible);
                out.write(b"null");
                self.null.reset(out);
            }
            Scalar::String(s) => self.quoted(&self.string, s, out, &mut invisible),
            Scalar::Char(c) => {
                let mut encoded = [0u8; 4];
                self.quoted(&self.scalar, c.encode_utf8(&mut encoded), out, &mut invisible);
            }
            Scalar::Bool(b) => {
                self.boolean.set(out, &mut invisible);
                out.write(if *b { b"true" } else { b"false" });
                self.boolean.reset(out);
            }
            Scalar::Int(_) | Scalar::UInt(_) => {
                self.number.set(out, &mut invisible);
                let _ = write!(out, "{}", scalar);
                self.number.reset(out);
            }
            Scalar::Float(f) if f.is_finite() => {
                self.number.set(out, &mut invisible);
                let _ = write!(out, "{}", f);
                self.number.reset(out);
            }
            Scalar::Float(f) => {
                let text = if f.is_nan() {
                    "NaN"
                } else if *f > 0.0 {
                    "Infinity"
                } else {
                    "-Infinity"
                };
                self.quoted(&self.scalar, text, out, &mut invisible);
            }
            Scalar::DateTime(_) => {
                self.quoted(&self.scalar, &scalar.to_string(), out, &mut invisible);
            }
        }
        invisible
    }
}

impl ValueVisitor<Utf8Writer<'_>> for JsonValueFormatter {
    type Output = usize;

    fn visit_scalar(&self, out: &mut Utf8Writer<'_>, scalar: &Scalar) -> usize {
        self.scalar_value(scalar, out)
    }

    fn visit_sequence(&self, out: &mut Utf8Writer<'_>, items: &[Value]) -> usize {
        let mut invisible = 0;
        self.punctuation(out, b'[', &mut invisible);
        for (i, item) in items.iter().enumerate() {
            if i > 0 {
                self.punctuation(out, b',', &mut invisible);
            }
            invisible += item.accept(self, out);
        }
        self.punctuation(out, b']', &mut invisible);
        invisible
    }

    fn visit_structure(&self, out: &mut Utf8Writer<'_>, structure: &Structure) -> usize {
        let mut invisible = 0;
        self.punctuation(out, b'{', &mut invisible);
        for (i, property) in structure.properties.iter().enumerate() {
            if i > 0 {
                self.punctuation(out, b',', &mut invisible);
            }
            self.member_name(&property.name, out, &mut invisible);
            self.punctuation(out, b':', &mut invisible);
            invisible += property.value.accept(self, out);
        }
        if let Some(tag) = &structure.type_tag {
            if !structure.properties.is_empty() {
                self.punctuation(out, b',', &mut invisible);
            }
            self.member_name(TYPE_TAG_PROPERTY, out, &mut invisible);
            self.punctuation(out, b':', &mut invisible);
            self.quoted(&self.string, tag, out, &mut invisible);
        }
        self.punctuation(out, b'}', &mut invisible);
        invisible
    }

    fn visit_dictionary(&self, out: &mut Utf8Writer<'_>, entries: &[(Scalar, Value)]) -> usize {
        let mut invisible = 0;
        self.punctuation(out, b'{', &mut invisible);
        for (i, (key, value)) in entries.iter().enumerate() {
            if i > 0 {
                self.punctuation(out, b',', &mut invisible);
            }
            let style = match key {
                Scalar::Null => &self.null,
                Scalar::String(_) => &self.string,
                _ => &self.scalar,
            };
            self.quoted(style, &key.to_string(), out, &mut invisible);
            self.punctuation(out, b':', &mut invisible);
            invisible += value.accept(self, out);
        }
        self.punctuation(out, b'}', &mut invisible);
        invisible
    }
}
