/*
 * value.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Structured property values.
//!
//! A [`Value`] is an immutable tree: every node is owned by exactly one
//! container, so values are acyclic and cloning produces an independent copy.

use chrono::{DateTime, FixedOffset};
use std::fmt;

/// A primitive value at the leaves of a [`Value`] tree.
#[derive(Debug, Clone, PartialEq)]
pub enum Scalar {
    /// An explicit null.
    Null,
    Bool(bool),
    Int(i64),
    UInt(u64),
    Float(f64),
    Char(char),
    String(String),
    DateTime(DateTime<FixedOffset>),
}

impl Scalar {
    pub fn is_null(&self) -> bool {
        matches!(self, Scalar::Null)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Scalar::String(s) => Some(s),
            _ => None,
        }
    }

    /// Whether this scalar is one of the numeric variants.
    pub fn is_number(&self) -> bool {
        matches!(self, Scalar::Int(_) | Scalar::UInt(_) | Scalar::Float(_))
    }

    /// Widen a numeric scalar to `f64`.
    pub fn as_f64(&self) -> Option<f64> {
        match *self {
            Scalar::Int(n) => Some(n as f64),
            Scalar::UInt(n) => Some(n as f64),
            Scalar::Float(n) => Some(n),
            _ => None,
        }
    }

    /// Name of the runtime type, as reported by the `TypeOf()` function.
    pub fn type_name(&self) -> &'static str {
        match self {
            Scalar::Null => "null",
            Scalar::Bool(_) => "Boolean",
            Scalar::Int(_) => "Int64",
            Scalar::UInt(_) => "UInt64",
            Scalar::Float(_) => "Double",
            Scalar::Char(_) => "Char",
            Scalar::String(_) => "String",
            Scalar::DateTime(_) => "DateTimeOffset",
        }
    }
}

/// Plain text form of a scalar, used for dictionary keys and `ToString()`.
///
/// Timestamps use the round-trip `O` layout.
impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scalar::Null => f.write_str("null"),
            Scalar::Bool(true) => f.write_str("true"),
            Scalar::Bool(false) => f.write_str("false"),
            Scalar::Int(n) => write!(f, "{}", n),
            Scalar::UInt(n) => write!(f, "{}", n),
            Scalar::Float(n) => write!(f, "{}", n),
            Scalar::Char(c) => write!(f, "{}", c),
            Scalar::String(s) => f.write_str(s),
            Scalar::DateTime(dt) => write!(
                f,
                "{}.{:07}{}",
                dt.format("%Y-%m-%dT%H:%M:%S"),
                dt.timestamp_subsec_nanos() / 100,
                dt.format("%:z")
            ),
        }
    }
}

/// A named member of a [`Structure`].
#[derive(Debug, Clone, PartialEq)]
pub struct Property {
    pub name: String,
    pub value: Value,
}

impl Property {
    pub fn new(name: impl Into<String>, value: Value) -> Self {
        Self {
            name: name.into(),
            value,
        }
    }
}

/// An ordered list of named members with an optional type tag.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Structure {
    pub properties: Vec<Property>,
    pub type_tag: Option<String>,
}

impl Structure {
    pub fn new(properties: Vec<Property>) -> Self {
        Self {
            properties,
            type_tag: None,
        }
    }

    pub fn with_type_tag(properties: Vec<Property>, type_tag: impl Into<String>) -> Self {
        Self {
            properties,
            type_tag: Some(type_tag.into()),
        }
    }

    /// Look up a member by exact name. The first match wins.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.properties
            .iter()
            .find(|p| p.name == name)
            .map(|p| &p.value)
    }
}

/// A runtime property value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Scalar(Scalar),
    Sequence(Vec<Value>),
    Structure(Structure),
    /// Entries keep their insertion order; keys are always scalars.
    Dictionary(Vec<(Scalar, Value)>),
}

impl Value {
    pub fn null() -> Self {
        Value::Scalar(Scalar::Null)
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Scalar(Scalar::Null))
    }

    pub fn as_scalar(&self) -> Option<&Scalar> {
        match self {
            Value::Scalar(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        self.as_scalar().and_then(Scalar::as_str)
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Scalar(Scalar::Bool(b)) => Some(*b),
            _ => None,
        }
    }

    /// Dispatch to the matching method of `visitor`.
    pub fn accept<S: ?Sized, V: ValueVisitor<S> + ?Sized>(
        &self,
        visitor: &V,
        state: &mut S,
    ) -> V::Output {
        match self {
            Value::Scalar(scalar) => visitor.visit_scalar(state, scalar),
            Value::Sequence(items) => visitor.visit_sequence(state, items),
            Value::Structure(structure) => visitor.visit_structure(state, structure),
            Value::Dictionary(entries) => visitor.visit_dictionary(state, entries),
        }
    }
}

/// Recursive visitation over [`Value`] trees.
///
/// `S` is threaded mutably through every call so that visitors can write
/// into a shared sink while staying immutable themselves.
pub trait ValueVisitor<S: ?Sized> {
    type Output;

    fn visit_scalar(&self, state: &mut S, scalar: &Scalar) -> Self::Output;
    fn visit_sequence(&self, state: &mut S, items: &[Value]) -> Self::Output;
    fn visit_structure(&self, state: &mut S, structure: &Structure) -> Self::Output;
    fn visit_dictionary(&self, state: &mut S, entries: &[(Scalar, Value)]) -> Self::Output;
}

impl From<Scalar> for Value {
    fn from(scalar: Scalar) -> Self {
        Value::Scalar(scalar)
    }
}

impl From<Structure> for Value {
    fn from(structure: Structure) -> Self {
        Value::Structure(structure)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::Sequence(items)
    }
}

macro_rules! scalar_from {
    ($($ty:ty => $variant:ident as $conv:ty),* $(,)?) => {
        $(
            impl From<$ty> for Value {
                fn from(v: $ty) -> Self {
                    Value::Scalar(Scalar::$variant(v as $conv))
                }
            }
        )*
    };
}

scalar_from! {
    i8 => Int as i64,
    i16 => Int as i64,
    i32 => Int as i64,
    i64 => Int as i64,
    u8 => UInt as u64,
    u16 => UInt as u64,
    u32 => UInt as u64,
    u64 => UInt as u64,
    f32 => Float as f64,
    f64 => Float as f64,
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Scalar(Scalar::Bool(b))
    }
}

impl From<char> for Value {
    fn from(c: char) -> Self {
        Value::Scalar(Scalar::Char(c))
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Scalar(Scalar::String(s.to_string()))
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Scalar(Scalar::String(s))
    }
}

impl From<DateTime<FixedOffset>> for Value {
    fn from(dt: DateTime<FixedOffset>) -> Self {
        Value::Scalar(Scalar::DateTime(dt))
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or_else(Value::null)
    }
}
