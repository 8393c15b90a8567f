/*
 * theme.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! ANSI themes.
//!
//! A [`TemplateTheme`] maps each [`ThemeStyle`] role to an optional ANSI
//! escape sequence. Compiled templates capture the [`Style`]s they need up
//! front, so a theme is read once at construction and never consulted while
//! rendering.
//!
//! Styled output is bracketed by [`Style::set`] and [`Style::reset`]. Both
//! sequences are invisible on a terminal, and `set` reports their combined
//! length so that alignment can discount them.

use evtemplate_events::Level;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

use crate::writer::Utf8Writer;

/// Sequence that restores default terminal attributes.
pub const RESET: &[u8] = b"\x1b[0m";

/// Style roles used by the renderers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ThemeStyle {
    /// Prominent text, generally content within an event's message.
    Text,
    /// Boilerplate text, for example items specified in an output template.
    SecondaryText,
    /// De-emphasized text, for example literal text in output templates and
    /// punctuation used when writing structured data.
    TertiaryText,
    /// Output demonstrating some kind of configuration issue, e.g. an
    /// invalid message template token.
    Invalid,
    Null,
    /// Property and type names.
    Name,
    String,
    Number,
    Boolean,
    /// Scalars not covered by the other value roles.
    Scalar,
    LevelVerbose,
    LevelDebug,
    LevelInformation,
    LevelWarning,
    LevelError,
    LevelFatal,
}

const STYLE_COUNT: usize = 16;

impl ThemeStyle {
    pub const ALL: [ThemeStyle; STYLE_COUNT] = [
        ThemeStyle::Text,
        ThemeStyle::SecondaryText,
        ThemeStyle::TertiaryText,
        ThemeStyle::Invalid,
        ThemeStyle::Null,
        ThemeStyle::Name,
        ThemeStyle::String,
        ThemeStyle::Number,
        ThemeStyle::Boolean,
        ThemeStyle::Scalar,
        ThemeStyle::LevelVerbose,
        ThemeStyle::LevelDebug,
        ThemeStyle::LevelInformation,
        ThemeStyle::LevelWarning,
        ThemeStyle::LevelError,
        ThemeStyle::LevelFatal,
    ];

    pub fn for_level(level: Level) -> Self {
        match level {
            Level::Verbose => ThemeStyle::LevelVerbose,
            Level::Debug => ThemeStyle::LevelDebug,
            Level::Information => ThemeStyle::LevelInformation,
            Level::Warning => ThemeStyle::LevelWarning,
            Level::Error => ThemeStyle::LevelError,
            Level::Fatal => ThemeStyle::LevelFatal,
        }
    }
}

/// One resolved role: an ANSI sequence, or nothing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Style {
    ansi: Option<Arc<[u8]>>,
}

impl Style {
    pub fn none() -> Self {
        Self { ansi: None }
    }

    pub fn is_none(&self) -> bool {
        self.ansi.is_none()
    }

    /// Write the opening sequence and add the invisible byte count of the
    /// opening and the matching [`Self::reset`] to `invisible`.
    pub fn set(&self, out: &mut Utf8Writer<'_>, invisible: &mut usize) {
        if let Some(ansi) = &self.ansi {
            out.write(ansi);
            *invisible += ansi.len() + RESET.len();
        }
    }

    pub fn reset(&self, out: &mut Utf8Writer<'_>) {
        if self.ansi.is_some() {
            out.write(RESET);
        }
    }
}

/// An immutable set of styles.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TemplateTheme {
    styles: [Option<Arc<[u8]>>; STYLE_COUNT],
}

impl TemplateTheme {
    /// Build a theme from role/sequence pairs. Unlisted roles are unstyled.
    pub fn new<I, B>(styles: I) -> Self
    where
        I: IntoIterator<Item = (ThemeStyle, B)>,
        B: AsRef<[u8]>,
    {
        Self::none().with_overrides(styles)
    }

    /// No styling at all.
    pub fn none() -> Self {
        Self::default()
    }

    /// Copy this theme, replacing the listed roles.
    pub fn with_overrides<I, B>(&self, overrides: I) -> Self
    where
        I: IntoIterator<Item = (ThemeStyle, B)>,
        B: AsRef<[u8]>,
    {
        let mut theme = self.clone();
        for (role, ansi) in overrides {
            theme.styles[role as usize] = Some(Arc::from(ansi.as_ref()));
        }
        theme
    }

    pub fn style(&self, role: ThemeStyle) -> Style {
        Style {
            ansi: self.styles[role as usize].clone(),
        }
    }

    /// In the style of the Literate console sink.
    pub fn literate() -> Self {
        Self::new([
            (ThemeStyle::Text, "\x1b[38;5;0015m"),
            (ThemeStyle::SecondaryText, "\x1b[38;5;0007m"),
            (ThemeStyle::TertiaryText, "\x1b[38;5;0008m"),
            (ThemeStyle::Invalid, "\x1b[38;5;0011m"),
            (ThemeStyle::Null, "\x1b[38;5;0027m"),
            (ThemeStyle::Name, "\x1b[38;5;0007m"),
            (ThemeStyle::String, "\x1b[38;5;0045m"),
            (ThemeStyle::Number, "\x1b[38;5;0200m"),
            (ThemeStyle::Boolean, "\x1b[38;5;0027m"),
            (ThemeStyle::Scalar, "\x1b[38;5;0085m"),
            (ThemeStyle::LevelVerbose, "\x1b[38;5;0007m"),
            (ThemeStyle::LevelDebug, "\x1b[38;5;0007m"),
            (ThemeStyle::LevelInformation, "\x1b[38;5;0015m"),
            (ThemeStyle::LevelWarning, "\x1b[38;5;0011m"),
            (ThemeStyle::LevelError, "\x1b[38;5;0015m\x1b[48;5;0196m"),
            (ThemeStyle::LevelFatal, "\x1b[38;5;0015m\x1b[48;5;0196m"),
        ])
    }

    /// Gray, black and white only.
    pub fn grayscale() -> Self {
        Self::new([
            (ThemeStyle::Text, "\x1b[37;1m"),
            (ThemeStyle::SecondaryText, "\x1b[37m"),
            (ThemeStyle::TertiaryText, "\x1b[30;1m"),
            (ThemeStyle::Invalid, "\x1b[37;1m\x1b[47m"),
            (ThemeStyle::Null, "\x1b[1m\x1b[37;1m"),
            (ThemeStyle::Name, "\x1b[37m"),
            (ThemeStyle::String, "\x1b[1m\x1b[37;1m"),
            (ThemeStyle::Number, "\x1b[1m\x1b[37;1m"),
            (ThemeStyle::Boolean, "\x1b[1m\x1b[37;1m"),
            (ThemeStyle::Scalar, "\x1b[1m\x1b[37;1m"),
            (ThemeStyle::LevelVerbose, "\x1b[30;1m"),
            (ThemeStyle::LevelDebug, "\x1b[30;1m"),
            (ThemeStyle::LevelInformation, "\x1b[37;1m"),
            (ThemeStyle::LevelWarning, "\x1b[37;1m\x1b[47m"),
            (ThemeStyle::LevelError, "\x1b[30m\x1b[47m"),
            (ThemeStyle::LevelFatal, "\x1b[30m\x1b[47m"),
        ])
    }

    /// A 256-color theme along the lines of common code editors.
    pub fn code() -> Self {
        Self::new([
            (ThemeStyle::Text, "\x1b[38;5;0253m"),
            (ThemeStyle::SecondaryText, "\x1b[38;5;0246m"),
            (ThemeStyle::TertiaryText, "\x1b[38;5;0242m"),
            (ThemeStyle::Invalid, "\x1b[33;1m"),
            (ThemeStyle::Null, "\x1b[38;5;0038m"),
            (ThemeStyle::Name, "\x1b[38;5;0081m"),
            (ThemeStyle::String, "\x1b[38;5;0216m"),
            (ThemeStyle::Number, "\x1b[38;5;151m"),
            (ThemeStyle::Boolean, "\x1b[38;5;0038m"),
            (ThemeStyle::Scalar, "\x1b[38;5;0079m"),
            (ThemeStyle::LevelVerbose, "\x1b[37m"),
            (ThemeStyle::LevelDebug, "\x1b[37m"),
            (ThemeStyle::LevelInformation, "\x1b[37;1m"),
            (ThemeStyle::LevelWarning, "\x1b[38;5;0229m"),
            (ThemeStyle::LevelError, "\x1b[38;5;0197m\x1b[48;5;0238m"),
            (ThemeStyle::LevelFatal, "\x1b[38;5;0197m\x1b[48;5;0238m"),
        ])
    }

    pub fn from_base(base: BaseTheme) -> Self {
        match base {
            BaseTheme::None => Self::none(),
            BaseTheme::Code => Self::code(),
            BaseTheme::Literate => Self::literate(),
            BaseTheme::Grayscale => Self::grayscale(),
        }
    }

    pub fn from_config(config: &ThemeConfig) -> Self {
        Self::from_base(config.base)
            .with_overrides(config.styles.iter().map(|(role, ansi)| (*role, ansi.as_bytes())))
    }
}

/// Named built-in themes, for configuration files.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BaseTheme {
    #[default]
    None,
    Code,
    Literate,
    Grayscale,
}

/// Serializable theme description: a base theme plus per-role overrides.
///
/// ```json
/// { "base": "code", "styles": { "Name": "\u001b[36m" } }
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ThemeConfig {
    pub base: BaseTheme,
    pub styles: HashMap<ThemeStyle, String>,
}
