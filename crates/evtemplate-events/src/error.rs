/*
 * error.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Error types for event construction.

use thiserror::Error;

/// Errors that can occur when building events from external data.
#[derive(Debug, Error)]
pub enum EventError {
    /// The level name is not one of the six known levels.
    #[error("Unknown level: {name}")]
    UnknownLevel { name: String },

    /// A compact JSON event was missing a required member.
    #[error("Missing required member '{member}'")]
    MissingMember { member: &'static str },

    /// A compact JSON event member had the wrong shape.
    #[error("Invalid value for member '{member}': {message}")]
    InvalidMember {
        member: &'static str,
        message: String,
    },

    /// The input was not valid JSON.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type for event operations.
pub type EventResult<T> = Result<T, EventError>;
