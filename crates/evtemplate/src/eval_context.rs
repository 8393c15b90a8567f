/*
 * eval_context.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Evaluation context for template rendering.
//!
//! This module provides:
//!
//! 1. [`Evaluated`], the result of evaluating an expression. It distinguishes
//!    *undefined* (no value at all) from an explicit null, and borrows from
//!    the event wherever it can.
//! 2. [`EvalContext`], threaded through evaluation. It carries the event and
//!    a chain of local bindings introduced by `#each` and wildcard
//!    comprehensions.
//!
//! Locals live on the Rust stack: each iteration pushes one [`Local`] frame
//! that points at its parent, so binding a name never allocates.

use evtemplate_events::{LogEvent, Scalar, Value};
use std::borrow::Cow;

/// The result of evaluating an expression.
///
/// Invariant: a `Value` never holds `Scalar::Null`; explicit nulls are
/// always represented as [`Evaluated::Null`].
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Evaluated<'a> {
    /// No value: a missing property, failed conversion, or operator type
    /// mismatch. Renders as nothing.
    #[default]
    Undefined,
    /// An explicit null.
    Null,
    Value(Cow<'a, Value>),
}

impl<'a> Evaluated<'a> {
    pub fn borrowed(value: &'a Value) -> Self {
        if value.is_null() {
            Evaluated::Null
        } else {
            Evaluated::Value(Cow::Borrowed(value))
        }
    }

    pub fn owned(value: Value) -> Self {
        if value.is_null() {
            Evaluated::Null
        } else {
            Evaluated::Value(Cow::Owned(value))
        }
    }

    pub fn scalar(scalar: Scalar) -> Self {
        Self::owned(Value::Scalar(scalar))
    }

    pub fn bool(b: bool) -> Self {
        Self::scalar(Scalar::Bool(b))
    }

    pub fn string(s: impl Into<String>) -> Self {
        Self::scalar(Scalar::String(s.into()))
    }

    pub fn int(n: i64) -> Self {
        Self::scalar(Scalar::Int(n))
    }

    /// Map an optional borrowed value, treating `None` as undefined.
    pub fn from_option(value: Option<&'a Value>) -> Self {
        value.map_or(Evaluated::Undefined, Evaluated::borrowed)
    }

    pub fn is_undefined(&self) -> bool {
        matches!(self, Evaluated::Undefined)
    }

    /// True for both null and undefined.
    pub fn is_null_or_undefined(&self) -> bool {
        matches!(self, Evaluated::Undefined | Evaluated::Null)
    }

    /// Only the boolean `true` is true; every other value, including
    /// undefined, is false.
    pub fn is_true(&self) -> bool {
        matches!(self.as_scalar(), Some(Scalar::Bool(true)))
    }

    pub fn as_value(&self) -> Option<&Value> {
        match self {
            Evaluated::Value(v) => Some(v.as_ref()),
            _ => None,
        }
    }

    pub fn as_scalar(&self) -> Option<&Scalar> {
        self.as_value().and_then(Value::as_scalar)
    }

    pub fn as_str(&self) -> Option<&str> {
        self.as_scalar().and_then(Scalar::as_str)
    }

    pub fn as_bool(&self) -> Option<bool> {
        self.as_value().and_then(Value::as_bool)
    }

    /// Convert to an owned value. Null becomes `Value::null()`; undefined
    /// becomes `None`.
    pub fn into_value(self) -> Option<Value> {
        match self {
            Evaluated::Undefined => None,
            Evaluated::Null => Some(Value::null()),
            Evaluated::Value(v) => Some(v.into_owned()),
        }
    }

    /// Re-borrow with the lifetime of `self`.
    pub fn reborrow(&self) -> Evaluated<'_> {
        match self {
            Evaluated::Undefined => Evaluated::Undefined,
            Evaluated::Null => Evaluated::Null,
            Evaluated::Value(v) => Evaluated::Value(Cow::Borrowed(v.as_ref())),
        }
    }

    /// Project into a child value, e.g. a structure member.
    ///
    /// Borrowed inputs produce borrowed outputs; owned inputs clone only the
    /// selected child.
    pub fn project(self, select: impl for<'v> Fn(&'v Value) -> Option<&'v Value>) -> Self {
        match self {
            Evaluated::Value(Cow::Borrowed(v)) => Evaluated::from_option(select(v)),
            Evaluated::Value(Cow::Owned(v)) => select(&v)
                .cloned()
                .map_or(Evaluated::Undefined, Evaluated::owned),
            _ => Evaluated::Undefined,
        }
    }
}

/// One local binding: a slot number and its value, linked to the enclosing
/// binding.
#[derive(Debug)]
pub struct Local<'a> {
    pub slot: usize,
    pub value: Evaluated<'a>,
    pub parent: Option<&'a Local<'a>>,
}

/// Context for evaluating compiled expressions and template nodes.
#[derive(Debug, Clone, Copy)]
pub struct EvalContext<'a> {
    pub event: &'a LogEvent,
    pub locals: Option<&'a Local<'a>>,
}

impl<'a> EvalContext<'a> {
    pub fn new(event: &'a LogEvent) -> Self {
        Self {
            event,
            locals: None,
        }
    }

    /// A child context with `local` as the innermost binding.
    pub fn with_local(&self, local: &'a Local<'a>) -> Self {
        Self {
            event: self.event,
            locals: Some(local),
        }
    }

    /// Look up a local slot. Unbound slots are undefined.
    pub fn local(&self, slot: usize) -> Evaluated<'a> {
        let mut current = self.locals;
        while let Some(local) = current {
            if local.slot == slot {
                return local.value.reborrow();
            }
            current = local.parent;
        }
        Evaluated::Undefined
    }
}
