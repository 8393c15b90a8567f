/*
 * lib.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Event records and structured property values.
//!
//! This crate defines the input side of the `evtemplate` engine:
//!
//! - [`Value`]: the tagged union carried by event properties (scalar,
//!   sequence, structure, dictionary)
//! - [`Level`]: the fixed six-step severity enumeration
//! - [`LogEvent`]: a timestamped, levelled message template with a property
//!   bag and optional exception text
//!
//! The types are pure data. The only behavior offered is visitation
//! ([`ValueVisitor`]) and conversion from JSON (`serde_json::Value` and
//! compact JSON event records).
//!
//! # Example
//!
//! ```rust
//! use evtemplate_events::{Level, LogEvent, Value};
//!
//! let event = LogEvent::now(Level::Information, "Hello, {Name}!")
//!     .with_property("Name", Value::from("World"));
//!
//! assert_eq!(event.property("Name"), Some(&Value::from("World")));
//! ```

pub mod error;
pub mod event;
pub mod json;
pub mod level;
pub mod value;

pub use error::{EventError, EventResult};
pub use event::LogEvent;
pub use level::Level;
pub use value::{Property, Scalar, Structure, Value, ValueVisitor};
