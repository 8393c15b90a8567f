/*
 * lib.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Expression-driven output templates for structured events.
//!
//! A template mixes literal text with `{…}` placeholders holding
//! expressions, and `{#if}`/`{#each}` directives for control flow:
//!
//! - Event fields: `{@t}`, `{@l:u3}`, `{@m}`, `{@x}`, plus `@mt`, `@p`,
//!   `@i` and `@r` inside expressions
//! - Properties and paths: `{RequestId}`, `{User.Name}`, `{Items[0]}`
//! - Operators and functions: `{if Elapsed > 1000 then 'slow' else 'ok'}`,
//!   `{Substring(Path, 0, 8)}`, `{Tags[?] = 'db' ci}`
//! - Alignment and formats: `{Elapsed,8:0.00}`, `{@t:HH:mm:ss}`
//! - Structured output: `{ {@t, @l, @m, ..rest()} }` renders JSON
//! - Iteration: `{#each k, v in @p}{k}={v}{#delimit} {#end}`
//!
//! # Architecture
//!
//! Source text goes through four stages, all at construction time:
//!
//! 1. [`parser`] (with [`lexer`] and [`expression_parser`]) produces a flat
//!    list of text, placeholders and directives
//! 2. [`binder`] nests directives and assigns local slots to `#each` names
//! 3. [`compiler`] resolves functions and lowers everything to a
//!    [`evaluator::CompiledNode`] tree
//! 4. [`template::ExpressionTemplate`] holds the tree and renders events
//!    into a caller-owned buffer
//!
//! # Example
//!
//! ```ignore
//! use evtemplate::ExpressionTemplate;
//! use evtemplate_events::{Level, LogEvent};
//!
//! let template = ExpressionTemplate::new("{@l:u3}: {@m}")?;
//! let event = LogEvent::now(Level::Information, "Hello, {Name}!").with_property("Name", "World");
//! assert_eq!(template.render_to_string(&event), "INF: Hello, World!");
//! ```

pub mod ast;
pub mod binder;
pub mod compiler;
pub mod error;
pub mod eval_context;
pub mod evaluator;
pub mod expression;
pub mod expression_parser;
pub mod format;
pub mod functions;
pub mod json;
pub mod level;
pub mod lexer;
pub mod message;
pub mod operators;
pub mod padding;
pub mod parser;
pub mod resolver;
pub mod string_cache;
pub mod template;
pub mod theme;
pub mod timestamp;
pub mod writer;

// Re-export main types at crate root
pub use ast::{Alignment, AlignmentDirection};
pub use error::{TemplateError, TemplateResult};
pub use eval_context::{EvalContext, Evaluated};
pub use expression::Expression;
pub use format::FormatProvider;
pub use json::JsonValueFormatter;
pub use message::MessageTemplate;
pub use resolver::{NameResolver, StaticNameResolver, TemplateFunction};
pub use template::{ExpressionTemplate, TemplateOptions};
pub use theme::{BaseTheme, TemplateTheme, ThemeConfig, ThemeStyle};
pub use writer::Utf8Writer;
