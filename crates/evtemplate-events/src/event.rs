/*
 * event.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! The event record rendered by templates.

use crate::level::Level;
use crate::value::Value;
use chrono::{DateTime, FixedOffset, Utc};
use indexmap::IndexMap;

/// A single structured event.
///
/// Events are read-only inputs to the template engine. The property bag
/// preserves insertion order so that rendering `@p` is deterministic.
#[derive(Debug, Clone, PartialEq)]
pub struct LogEvent {
    pub timestamp: DateTime<FixedOffset>,
    pub level: Level,
    /// The raw message template, e.g. `"Hello, {Name}!"`.
    pub message_template: String,
    pub properties: IndexMap<String, Value>,
    /// Pre-rendered exception text, including any stack frames.
    pub exception: Option<String>,
}

impl LogEvent {
    pub fn new(
        timestamp: DateTime<FixedOffset>,
        level: Level,
        message_template: impl Into<String>,
    ) -> Self {
        Self {
            timestamp,
            level,
            message_template: message_template.into(),
            properties: IndexMap::new(),
            exception: None,
        }
    }

    /// Create an event stamped with the current UTC time.
    pub fn now(level: Level, message_template: impl Into<String>) -> Self {
        Self::new(Utc::now().into(), level, message_template)
    }

    /// Add or replace a property.
    pub fn with_property(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.properties.insert(name.into(), value.into());
        self
    }

    pub fn with_exception(mut self, exception: impl Into<String>) -> Self {
        self.exception = Some(exception.into());
        self
    }

    pub fn property(&self, name: &str) -> Option<&Value> {
        self.properties.get(name)
    }
}
