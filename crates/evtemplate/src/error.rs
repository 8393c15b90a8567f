/*
 * error.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Error types for template construction.
//!
//! Every error here is detected while building a template, before any event
//! is rendered. Rendering itself never fails: missing values render as empty
//! output, and buffer exhaustion is an internal fault (see
//! [`crate::writer::buffer_exhausted`]).

use thiserror::Error;

/// Errors that can occur while constructing a template.
///
/// Positions are byte offsets into the template source.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TemplateError {
    /// Malformed template or expression syntax.
    #[error("Parse error at offset {position}: {message}")]
    ParseError { message: String, position: usize },

    /// Unbalanced or illegal directive nesting, or an ambiguous local name.
    #[error("Bind error at offset {position}: {message}")]
    BindError { message: String, position: usize },

    /// A function name could not be matched to exactly one implementation.
    #[error("Resolution error at offset {position}: {message}")]
    ResolutionError {
        name: String,
        arity: usize,
        message: String,
        position: usize,
    },
}

impl TemplateError {
    pub(crate) fn parse(message: impl Into<String>, position: usize) -> Self {
        TemplateError::ParseError {
            message: message.into(),
            position,
        }
    }

    pub(crate) fn bind(message: impl Into<String>, position: usize) -> Self {
        TemplateError::BindError {
            message: message.into(),
            position,
        }
    }

    pub(crate) fn resolution(
        name: impl Into<String>,
        arity: usize,
        message: impl Into<String>,
        position: usize,
    ) -> Self {
        TemplateError::ResolutionError {
            name: name.into(),
            arity,
            message: message.into(),
            position,
        }
    }

    /// The byte offset in the template source where the problem was found.
    pub fn position(&self) -> usize {
        match self {
            TemplateError::ParseError { position, .. }
            | TemplateError::BindError { position, .. }
            | TemplateError::ResolutionError { position, .. } => *position,
        }
    }

    /// The human-readable description, without position information.
    pub fn message(&self) -> &str {
        match self {
            TemplateError::ParseError { message, .. }
            | TemplateError::BindError { message, .. }
            | TemplateError::ResolutionError { message, .. } => message,
        }
    }

    /// Render a source-annotated report of this error.
    ///
    /// `name` labels the template in the report header (a file name, or
    /// something like `"<template>"`). The output contains no color codes.
    pub fn to_report(&self, source: &str, name: &str) -> String {
        use ariadne::{Config, Label, Report, ReportKind, Source};

        // ariadne spans count characters, not bytes.
        let byte_offset = self.position().min(source.len());
        let start = source
            .char_indices()
            .take_while(|(i, _)| *i < byte_offset)
            .count();
        let end = (start + 1).min(source.chars().count()).max(start);

        let title = match self {
            TemplateError::ParseError { .. } => "Invalid template syntax",
            TemplateError::BindError { .. } => "Invalid directive structure",
            TemplateError::ResolutionError { .. } => "Unknown function",
        };

        let report = Report::build(ReportKind::Error, name.to_string(), start)
            .with_config(Config::default().with_color(false))
            .with_message(title)
            .with_label(Label::new((name.to_string(), start..end)).with_message(self.message()))
            .finish();

        let mut output = Vec::new();
        match report.write((name.to_string(), Source::from(source)), &mut output) {
            Ok(()) => String::from_utf8_lossy(&output).into_owned(),
            Err(_) => self.to_string(),
        }
    }
}

/// Result type for template construction.
pub type TemplateResult<T> = Result<T, TemplateError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_includes_position() {
        let err = TemplateError::parse("unexpected `}`", 7);
        assert_eq!(err.to_string(), "Parse error at offset 7: unexpected `}`");
        assert_eq!(err.position(), 7);
        assert_eq!(err.message(), "unexpected `}`");
    }

    #[test]
    fn test_report_mentions_message_and_name() {
        let err = TemplateError::bind("`#end` without a matching `#if` or `#each`", 6);
        let report = err.to_report("Hello {#end}", "greeting.template");
        assert!(report.contains("Invalid directive structure"));
        assert!(report.contains("greeting.template"));
        assert!(report.contains("without a matching"));
    }

    #[test]
    fn test_report_handles_offset_past_end() {
        let err = TemplateError::parse("unexpected end of template", 100);
        let report = err.to_report("{abc", "t");
        assert!(report.contains("unexpected end of template"));
    }
}
