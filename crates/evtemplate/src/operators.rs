/*
 * operators.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Runtime semantics of the expression operators.
//!
//! Operators are total: operand types they do not understand produce
//! undefined rather than an error. Arithmetic stays in `i64` while it can
//! and widens to `f64` on overflow or when either side is a float.

use evtemplate_events::{Scalar, Structure, Value};
use std::cmp::Ordering;

use crate::ast::{BinaryOp, UnaryOp};
use crate::eval_context::Evaluated;

#[derive(Debug, Clone, Copy)]
enum Num {
    Int(i64),
    Float(f64),
}

impl Num {
    fn of(value: &Evaluated<'_>) -> Option<Num> {
        match value.as_scalar()? {
            Scalar::Int(n) => Some(Num::Int(*n)),
            Scalar::UInt(n) => Some(i64::try_from(*n).map_or(Num::Float(*n as f64), Num::Int)),
            Scalar::Float(f) => Some(Num::Float(*f)),
            _ => None,
        }
    }

    fn as_f64(self) -> f64 {
        match self {
            Num::Int(n) => n as f64,
            Num::Float(f) => f,
        }
    }

    fn into_evaluated(self) -> Evaluated<'static> {
        match self {
            Num::Int(n) => Evaluated::int(n),
            Num::Float(f) => Evaluated::scalar(Scalar::Float(f)),
        }
    }
}

pub fn unary(op: UnaryOp, operand: &Evaluated<'_>) -> Evaluated<'static> {
    match op {
        UnaryOp::Not => operand
            .as_bool()
            .map_or(Evaluated::Undefined, |b| Evaluated::bool(!b)),
        UnaryOp::Negate => match Num::of(operand) {
            Some(Num::Int(n)) => n
                .checked_neg()
                .map_or(Num::Float(-(n as f64)), Num::Int)
                .into_evaluated(),
            Some(Num::Float(f)) => Num::Float(-f).into_evaluated(),
            None => Evaluated::Undefined,
        },
        UnaryOp::IsNull => Evaluated::bool(operand.is_null_or_undefined()),
        UnaryOp::IsNotNull => Evaluated::bool(!operand.is_null_or_undefined()),
    }
}

/// Strict binary operators. `and`/`or` short-circuit and are evaluated by
/// the caller.
pub fn binary(
    op: BinaryOp,
    left: &Evaluated<'_>,
    right: &Evaluated<'_>,
    case_insensitive: bool,
) -> Evaluated<'static> {
    match op {
        BinaryOp::Or => Evaluated::bool(left.is_true() || right.is_true()),
        BinaryOp::And => Evaluated::bool(left.is_true() && right.is_true()),
        BinaryOp::Equal => equal(left, right, case_insensitive),
        BinaryOp::NotEqual => negate(equal(left, right, case_insensitive)),
        BinaryOp::Less => compare(left, right, Ordering::is_lt),
        BinaryOp::LessOrEqual => compare(left, right, Ordering::is_le),
        BinaryOp::Greater => compare(left, right, Ordering::is_gt),
        BinaryOp::GreaterOrEqual => compare(left, right, Ordering::is_ge),
        BinaryOp::Like => like(left, right, case_insensitive),
        BinaryOp::NotLike => negate(like(left, right, case_insensitive)),
        BinaryOp::In => contained_in(left, right, case_insensitive),
        BinaryOp::NotIn => negate(contained_in(left, right, case_insensitive)),
        BinaryOp::Add
        | BinaryOp::Subtract
        | BinaryOp::Multiply
        | BinaryOp::Divide
        | BinaryOp::Modulo
        | BinaryOp::Power => arithmetic(op, left, right),
    }
}

fn negate(result: Evaluated<'static>) -> Evaluated<'static> {
    unary(UnaryOp::Not, &result)
}

fn arithmetic(op: BinaryOp, left: &Evaluated<'_>, right: &Evaluated<'_>) -> Evaluated<'static> {
    if op == BinaryOp::Add {
        if let (Some(l), Some(r)) = (left.as_str(), right.as_str()) {
            return Evaluated::string(format!("{}{}", l, r));
        }
    }

    let (Some(l), Some(r)) = (Num::of(left), Num::of(right)) else {
        return Evaluated::Undefined;
    };

    let result = match (l, r) {
        (Num::Int(a), Num::Int(b)) => integer_arithmetic(op, a, b),
        _ => float_arithmetic(op, l.as_f64(), r.as_f64()),
    };
    result.map_or(Evaluated::Undefined, Num::into_evaluated)
}

fn integer_arithmetic(op: BinaryOp, a: i64, b: i64) -> Option<Num> {
    let exact = match op {
        BinaryOp::Add => a.checked_add(b),
        BinaryOp::Subtract => a.checked_sub(b),
        BinaryOp::Multiply => a.checked_mul(b),
        BinaryOp::Divide if b == 0 => return None,
        BinaryOp::Divide if a.checked_rem(b) != Some(0) => None,
        BinaryOp::Divide => a.checked_div(b),
        BinaryOp::Modulo if b == 0 => return None,
        BinaryOp::Modulo => a.checked_rem(b),
        BinaryOp::Power => u32::try_from(b).ok().and_then(|e| a.checked_pow(e)),
        _ => return None,
    };
    match exact {
        Some(n) => Some(Num::Int(n)),
        None => float_arithmetic(op, a as f64, b as f64),
    }
}

fn float_arithmetic(op: BinaryOp, a: f64, b: f64) -> Option<Num> {
    let result = match op {
        BinaryOp::Add => a + b,
        BinaryOp::Subtract => a - b,
        BinaryOp::Multiply => a * b,
        BinaryOp::Divide | BinaryOp::Modulo if b == 0.0 => return None,
        BinaryOp::Divide => a / b,
        BinaryOp::Modulo => a % b,
        BinaryOp::Power => a.powf(b),
        _ => return None,
    };
    Some(Num::Float(result))
}

fn compare(
    left: &Evaluated<'_>,
    right: &Evaluated<'_>,
    test: fn(Ordering) -> bool,
) -> Evaluated<'static> {
    let ordering = match (left.as_scalar(), right.as_scalar()) {
        (Some(Scalar::DateTime(a)), Some(Scalar::DateTime(b))) => Some(a.cmp(b)),
        _ => match (Num::of(left), Num::of(right)) {
            (Some(Num::Int(a)), Some(Num::Int(b))) => Some(a.cmp(&b)),
            (Some(a), Some(b)) => a.as_f64().partial_cmp(&b.as_f64()),
            _ => None,
        },
    };
    ordering.map_or(Evaluated::Undefined, |o| Evaluated::bool(test(o)))
}

fn equal(left: &Evaluated<'_>, right: &Evaluated<'_>, case_insensitive: bool) -> Evaluated<'static> {
    match (left, right) {
        (Evaluated::Undefined, _) | (_, Evaluated::Undefined) => Evaluated::Undefined,
        (Evaluated::Null, Evaluated::Null) => Evaluated::bool(true),
        (Evaluated::Null, _) | (_, Evaluated::Null) => Evaluated::bool(false),
        (Evaluated::Value(l), Evaluated::Value(r)) => {
            Evaluated::bool(values_equal(l, r, case_insensitive))
        }
    }
}

/// Structural equality. Numbers compare by value across representations.
pub fn values_equal(left: &Value, right: &Value, case_insensitive: bool) -> bool {
    match (left, right) {
        (Value::Scalar(l), Value::Scalar(r)) => scalars_equal(l, r, case_insensitive),
        (Value::Sequence(l), Value::Sequence(r)) => {
            l.len() == r.len()
                && l
                    .iter()
                    .zip(r)
                    .all(|(a, b)| values_equal(a, b, case_insensitive))
        }
        (Value::Structure(l), Value::Structure(r)) => structures_equal(l, r, case_insensitive),
        (Value::Dictionary(l), Value::Dictionary(r)) => {
            l.len() == r.len()
                && l.iter().all(|(key, value)| {
                    r.iter().any(|(k, v)| {
                        scalars_equal(key, k, case_insensitive)
                            && values_equal(value, v, case_insensitive)
                    })
                })
        }
        _ => false,
    }
}

fn structures_equal(left: &Structure, right: &Structure, case_insensitive: bool) -> bool {
    left.type_tag == right.type_tag
        && left.properties.len() == right.properties.len()
        && left.properties.iter().all(|p| {
            right
                .get(&p.name)
                .is_some_and(|v| values_equal(&p.value, v, case_insensitive))
        })
}

pub fn scalars_equal(left: &Scalar, right: &Scalar, case_insensitive: bool) -> bool {
    match (left, right) {
        (Scalar::String(l), Scalar::String(r)) if case_insensitive => {
            l.to_lowercase() == r.to_lowercase()
        }
        (Scalar::Int(a), Scalar::Int(b)) => a == b,
        (Scalar::UInt(a), Scalar::UInt(b)) => a == b,
        (Scalar::Int(a), Scalar::UInt(b)) | (Scalar::UInt(b), Scalar::Int(a)) => {
            u64::try_from(*a).is_ok_and(|a| a == *b)
        }
        _ if left.is_number() && right.is_number() => left.as_f64() == right.as_f64(),
        _ => left == right,
    }
}

fn contained_in(
    item: &Evaluated<'_>,
    collection: &Evaluated<'_>,
    case_insensitive: bool,
) -> Evaluated<'static> {
    let Some(Value::Sequence(elements)) = collection.as_value() else {
        return Evaluated::Undefined;
    };
    match item {
        Evaluated::Undefined => Evaluated::Undefined,
        Evaluated::Null => Evaluated::bool(elements.iter().any(Value::is_null)),
        Evaluated::Value(value) => Evaluated::bool(
            elements
                .iter()
                .any(|element| values_equal(value, element, case_insensitive)),
        ),
    }
}

fn like(text: &Evaluated<'_>, pattern: &Evaluated<'_>, case_insensitive: bool) -> Evaluated<'static> {
    let (Some(text), Some(pattern)) = (text.as_str(), pattern.as_str()) else {
        return Evaluated::Undefined;
    };
    let matched = if case_insensitive {
        like_match(&text.to_lowercase(), &pattern.to_lowercase())
    } else {
        like_match(text, pattern)
    };
    Evaluated::bool(matched)
}

/// SQL-style matching: `%` matches any run of characters, `_` exactly one.
pub fn like_match(text: &str, pattern: &str) -> bool {
    let text: Vec<char> = text.chars().collect();
    let pattern: Vec<char> = pattern.chars().collect();

    // matches[j]: pattern[..i] matches text[..j]
    let mut matches = vec![false; text.len() + 1];
    matches[0] = true;
    for &p in &pattern {
        let mut next = vec![false; text.len() + 1];
        if p == '%' {
            let mut any = false;
            for j in 0..=text.len() {
                any |= matches[j];
                next[j] = any;
            }
        } else {
            for j in 1..=text.len() {
                next[j] = matches[j - 1] && (p == '_' || p == text[j - 1]);
            }
        }
        matches = next;
    }
    matches[text.len()]
}

#[cfg(test)]
mod tests {
    use super::*;
    use evtemplate_events::Property;

    fn int(n: i64) -> Evaluated<'static> {
        Evaluated::int(n)
    }

    fn float(f: f64) -> Evaluated<'static> {
        Evaluated::scalar(Scalar::Float(f))
    }

    fn s(text: &str) -> Evaluated<'static> {
        Evaluated::string(text)
    }

    fn bin(op: BinaryOp, l: &Evaluated<'_>, r: &Evaluated<'_>) -> Evaluated<'static> {
        binary(op, l, r, false)
    }

    // ========================================================================
    // Arithmetic
    // ========================================================================

    #[test]
    fn test_integer_arithmetic() {
        assert_eq!(bin(BinaryOp::Add, &int(2), &int(3)), int(5));
        assert_eq!(bin(BinaryOp::Subtract, &int(2), &int(3)), int(-1));
        assert_eq!(bin(BinaryOp::Multiply, &int(4), &int(3)), int(12));
        assert_eq!(bin(BinaryOp::Divide, &int(6), &int(3)), int(2));
        assert_eq!(bin(BinaryOp::Divide, &int(5), &int(2)), float(2.5));
        assert_eq!(bin(BinaryOp::Modulo, &int(7), &int(3)), int(1));
        assert_eq!(bin(BinaryOp::Power, &int(2), &int(10)), int(1024));
    }

    #[test]
    fn test_overflow_widens_to_float() {
        assert_eq!(
            bin(BinaryOp::Add, &int(i64::MAX), &int(1)),
            float(i64::MAX as f64 + 1.0)
        );
    }

    #[test]
    fn test_divide_by_zero_is_undefined() {
        assert_eq!(bin(BinaryOp::Divide, &int(1), &int(0)), Evaluated::Undefined);
        assert_eq!(bin(BinaryOp::Modulo, &float(1.0), &float(0.0)), Evaluated::Undefined);
    }

    #[test]
    fn test_string_concatenation_and_mismatch() {
        assert_eq!(bin(BinaryOp::Add, &s("a"), &s("b")), s("ab"));
        assert_eq!(bin(BinaryOp::Add, &s("a"), &int(1)), Evaluated::Undefined);
        assert_eq!(bin(BinaryOp::Multiply, &Evaluated::Null, &int(1)), Evaluated::Undefined);
    }

    #[test]
    fn test_unary() {
        assert_eq!(unary(UnaryOp::Negate, &int(3)), int(-3));
        assert_eq!(unary(UnaryOp::Not, &Evaluated::bool(false)), Evaluated::bool(true));
        assert_eq!(unary(UnaryOp::Not, &int(0)), Evaluated::Undefined);
        assert_eq!(unary(UnaryOp::IsNull, &Evaluated::Undefined), Evaluated::bool(true));
        assert_eq!(unary(UnaryOp::IsNotNull, &int(0)), Evaluated::bool(true));
    }

    // ========================================================================
    // Comparison
    // ========================================================================

    #[test]
    fn test_equality_is_structural() {
        let a = Evaluated::owned(Value::Structure(Structure::new(vec![
            Property::new("X", Value::from(1)),
            Property::new("Y", Value::from("b")),
        ])));
        let b = Evaluated::owned(Value::Structure(Structure::new(vec![
            Property::new("Y", Value::from("b")),
            Property::new("X", Value::from(1.0)),
        ])));
        assert_eq!(bin(BinaryOp::Equal, &a, &b), Evaluated::bool(true));
        assert_eq!(bin(BinaryOp::NotEqual, &a, &b), Evaluated::bool(false));
    }

    #[test]
    fn test_equality_with_null_and_undefined() {
        assert_eq!(bin(BinaryOp::Equal, &Evaluated::Null, &Evaluated::Null), Evaluated::bool(true));
        assert_eq!(bin(BinaryOp::Equal, &Evaluated::Null, &int(1)), Evaluated::bool(false));
        assert_eq!(bin(BinaryOp::Equal, &Evaluated::Undefined, &int(1)), Evaluated::Undefined);
        assert_eq!(bin(BinaryOp::NotEqual, &Evaluated::Undefined, &int(1)), Evaluated::Undefined);
    }

    #[test]
    fn test_case_insensitive_equality() {
        assert_eq!(binary(BinaryOp::Equal, &s("ABC"), &s("abc"), true), Evaluated::bool(true));
        assert_eq!(bin(BinaryOp::Equal, &s("ABC"), &s("abc")), Evaluated::bool(false));
    }

    #[test]
    fn test_ordering() {
        assert_eq!(bin(BinaryOp::Less, &int(1), &float(1.5)), Evaluated::bool(true));
        assert_eq!(bin(BinaryOp::GreaterOrEqual, &int(2), &int(2)), Evaluated::bool(true));
        assert_eq!(bin(BinaryOp::Less, &s("a"), &s("b")), Evaluated::Undefined);
    }

    // ========================================================================
    // like / in
    // ========================================================================

    #[test]
    fn test_like_patterns() {
        assert!(like_match("Hello", "H%o"));
        assert!(like_match("Hello", "_ello"));
        assert!(like_match("", "%"));
        assert!(!like_match("Hello", "H_o"));
        assert!(like_match("a%b", "a%b"));
        assert_eq!(binary(BinaryOp::Like, &s("HELLO"), &s("h%"), true), Evaluated::bool(true));
        assert_eq!(bin(BinaryOp::NotLike, &s("HELLO"), &s("h%")), Evaluated::bool(true));
        assert_eq!(bin(BinaryOp::Like, &int(1), &s("%")), Evaluated::Undefined);
    }

    #[test]
    fn test_in_sequence() {
        let seq = Evaluated::owned(Value::Sequence(vec![Value::from(1), Value::from("a")]));
        assert_eq!(bin(BinaryOp::In, &int(1), &seq), Evaluated::bool(true));
        assert_eq!(bin(BinaryOp::NotIn, &s("b"), &seq), Evaluated::bool(true));
        assert_eq!(binary(BinaryOp::In, &s("A"), &seq, true), Evaluated::bool(true));
        assert_eq!(bin(BinaryOp::In, &int(1), &int(1)), Evaluated::Undefined);
    }
}
