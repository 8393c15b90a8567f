/*
 * functions.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Built-in functions.
//!
//! Names match case-insensitively. Like operators, functions never fail:
//! arguments of the wrong type yield undefined. Functions marked case-aware
//! accept the `ci` modifier, e.g. `StartsWith(Name, 'a') ci`.

use chrono::{DateTime, Utc};
use evtemplate_events::{Scalar, Value};
use once_cell::sync::Lazy;
use regex::Regex;
use std::borrow::Cow;
use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

use crate::eval_context::Evaluated;
use crate::format::{FormatProvider, format_scalar};
use crate::json::JsonValueFormatter;
use crate::operators::scalars_equal;

pub type BuiltinImpl = for<'a> fn(Vec<Evaluated<'a>>, bool) -> Evaluated<'a>;

/// A built-in function and the argument counts it accepts.
pub struct BuiltinFunction {
    pub name: &'static str,
    pub min_arity: usize,
    pub max_arity: usize,
    /// Whether the function honors the `ci` modifier.
    pub case_aware: bool,
    pub call: BuiltinImpl,
}

impl BuiltinFunction {
    pub fn accepts(&self, arity: usize) -> bool {
        (self.min_arity..=self.max_arity).contains(&arity)
    }
}

impl std::fmt::Debug for BuiltinFunction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}..{}", self.name, self.min_arity, self.max_arity)
    }
}

const VARIADIC: usize = usize::MAX;

macro_rules! builtin {
    ($name:literal, $min:expr, $max:expr, $ci:expr, $call:path) => {
        BuiltinFunction {
            name: $name,
            min_arity: $min,
            max_arity: $max,
            case_aware: $ci,
            call: $call,
        }
    };
}

static BUILTINS: &[BuiltinFunction] = &[
    builtin!("Coalesce", 1, VARIADIC, false, coalesce),
    builtin!("Concat", 1, VARIADIC, false, concat),
    builtin!("Contains", 2, 2, true, contains),
    builtin!("ElementAt", 2, 2, false, element_at_fn),
    builtin!("EndsWith", 2, 2, true, ends_with),
    builtin!("IndexOf", 2, 2, true, index_of),
    builtin!("IndexOfMatch", 2, 2, false, index_of_match),
    builtin!("IsDefined", 1, 1, false, is_defined),
    builtin!("IsMatch", 2, 2, false, is_match),
    builtin!("LastIndexOf", 2, 2, true, last_index_of),
    builtin!("Length", 1, 1, false, length),
    builtin!("Now", 0, 0, false, now),
    builtin!("Round", 2, 2, false, round),
    builtin!("StartsWith", 2, 2, true, starts_with),
    builtin!("Substring", 2, 3, false, substring),
    builtin!("TagOf", 1, 1, false, tag_of),
    builtin!("ToString", 1, 2, false, to_string),
    builtin!("TypeOf", 1, 1, false, type_of),
    builtin!("Undefined", 0, 0, false, undefined),
    builtin!("UtcDateTime", 1, 1, false, utc_date_time),
];

/// Look up a built-in by name, ignoring case.
pub fn builtin(name: &str) -> Option<&'static BuiltinFunction> {
    BUILTINS.iter().find(|f| f.name.eq_ignore_ascii_case(name))
}

pub fn builtins() -> impl Iterator<Item = &'static BuiltinFunction> {
    BUILTINS.iter()
}

// ============================================================================
// Argument helpers
// ============================================================================

fn scalar_int(scalar: &Scalar) -> Option<i64> {
    match *scalar {
        Scalar::Int(n) => Some(n),
        Scalar::UInt(n) => i64::try_from(n).ok(),
        Scalar::Float(f) if f.fract() == 0.0 && f.abs() < 9.0e15 => Some(f as i64),
        _ => None,
    }
}

fn int_arg(arg: &Evaluated<'_>) -> Option<i64> {
    arg.as_scalar().and_then(scalar_int)
}

/// Both arguments as strings, lowercased under `ci`.
fn text_pair<'b>(args: &'b [Evaluated<'_>], ci: bool) -> Option<(Cow<'b, str>, Cow<'b, str>)> {
    let text = args.first()?.as_str()?;
    let needle = args.get(1)?.as_str()?;
    Some(if ci {
        (
            Cow::Owned(text.to_lowercase()),
            Cow::Owned(needle.to_lowercase()),
        )
    } else {
        (Cow::Borrowed(text), Cow::Borrowed(needle))
    })
}

fn char_index(text: &str, byte_index: Option<usize>) -> Evaluated<'static> {
    let index = byte_index.map_or(-1, |i| text[..i].chars().count() as i64);
    Evaluated::int(index)
}

static REGEX_CACHE: Lazy<RwLock<HashMap<String, Option<Regex>>>> =
    Lazy::new(|| RwLock::new(HashMap::new()));

/// Compile `pattern` once per process. Invalid patterns are remembered too.
fn cached_regex(pattern: &str) -> Option<Regex> {
    if let Some(compiled) = REGEX_CACHE
        .read()
        .unwrap_or_else(PoisonError::into_inner)
        .get(pattern)
    {
        return compiled.clone();
    }
    let compiled = Regex::new(pattern).ok();
    REGEX_CACHE
        .write()
        .unwrap_or_else(PoisonError::into_inner)
        .insert(pattern.to_string(), compiled.clone());
    compiled
}

// ============================================================================
// Collections
// ============================================================================

/// Index into a sequence, structure or dictionary.
pub fn element_at<'a>(target: Evaluated<'a>, index: &Evaluated<'_>) -> Evaluated<'a> {
    let Some(key) = index.as_scalar() else {
        return Evaluated::Undefined;
    };
    target.project(|value| element(value, key))
}

fn element<'v>(value: &'v Value, key: &Scalar) -> Option<&'v Value> {
    match (value, key) {
        (Value::Sequence(items), _) => items.get(usize::try_from(scalar_int(key)?).ok()?),
        (Value::Structure(structure), Scalar::String(name)) => structure.get(name),
        (Value::Dictionary(entries), _) => entries
            .iter()
            .find(|(k, _)| scalars_equal(k, key, false))
            .map(|(_, v)| v),
        _ => None,
    }
}

fn element_at_fn<'a>(mut args: Vec<Evaluated<'a>>, _ci: bool) -> Evaluated<'a> {
    let index = args.pop().unwrap_or_default();
    let target = args.pop().unwrap_or_default();
    element_at(target, &index)
}

fn length<'a>(args: Vec<Evaluated<'a>>, _ci: bool) -> Evaluated<'a> {
    match args.first().and_then(Evaluated::as_value) {
        Some(Value::Scalar(Scalar::String(s))) => Evaluated::int(s.chars().count() as i64),
        Some(Value::Sequence(items)) => Evaluated::int(items.len() as i64),
        _ => Evaluated::Undefined,
    }
}

fn coalesce<'a>(args: Vec<Evaluated<'a>>, _ci: bool) -> Evaluated<'a> {
    let mut fallback = Evaluated::Undefined;
    for arg in args {
        match arg {
            Evaluated::Value(_) => return arg,
            Evaluated::Null => fallback = Evaluated::Null,
            Evaluated::Undefined => {}
        }
    }
    fallback
}

// ============================================================================
// Strings
// ============================================================================

fn concat<'a>(args: Vec<Evaluated<'a>>, _ci: bool) -> Evaluated<'a> {
    let mut result = String::new();
    for arg in &args {
        match arg.as_str() {
            Some(s) => result.push_str(s),
            None => return Evaluated::Undefined,
        }
    }
    Evaluated::string(result)
}

fn contains<'a>(args: Vec<Evaluated<'a>>, ci: bool) -> Evaluated<'a> {
    text_pair(&args, ci).map_or(Evaluated::Undefined, |(text, needle)| {
        Evaluated::bool(text.contains(needle.as_ref()))
    })
}

fn starts_with<'a>(args: Vec<Evaluated<'a>>, ci: bool) -> Evaluated<'a> {
    text_pair(&args, ci).map_or(Evaluated::Undefined, |(text, prefix)| {
        Evaluated::bool(text.starts_with(prefix.as_ref()))
    })
}

fn ends_with<'a>(args: Vec<Evaluated<'a>>, ci: bool) -> Evaluated<'a> {
    text_pair(&args, ci).map_or(Evaluated::Undefined, |(text, suffix)| {
        Evaluated::bool(text.ends_with(suffix.as_ref()))
    })
}

fn index_of<'a>(args: Vec<Evaluated<'a>>, ci: bool) -> Evaluated<'a> {
    text_pair(&args, ci).map_or(Evaluated::Undefined, |(text, needle)| {
        char_index(&text, text.find(needle.as_ref()))
    })
}

fn last_index_of<'a>(args: Vec<Evaluated<'a>>, ci: bool) -> Evaluated<'a> {
    text_pair(&args, ci).map_or(Evaluated::Undefined, |(text, needle)| {
        char_index(&text, text.rfind(needle.as_ref()))
    })
}

fn is_match<'a>(args: Vec<Evaluated<'a>>, _ci: bool) -> Evaluated<'a> {
    let Some((text, pattern)) = text_pair(&args, false) else {
        return Evaluated::Undefined;
    };
    cached_regex(&pattern).map_or(Evaluated::Undefined, |re| {
        Evaluated::bool(re.is_match(&text))
    })
}

fn index_of_match<'a>(args: Vec<Evaluated<'a>>, _ci: bool) -> Evaluated<'a> {
    let Some((text, pattern)) = text_pair(&args, false) else {
        return Evaluated::Undefined;
    };
    cached_regex(&pattern).map_or(Evaluated::Undefined, |re| {
        char_index(&text, re.find(&text).map(|m| m.start()))
    })
}

fn substring<'a>(args: Vec<Evaluated<'a>>, _ci: bool) -> Evaluated<'a> {
    let (Some(text), Some(start)) = (args[0].as_str(), int_arg(&args[1])) else {
        return Evaluated::Undefined;
    };
    let chars = text.chars().count();
    let Some(start) = usize::try_from(start).ok().filter(|&s| s <= chars) else {
        return Evaluated::Undefined;
    };
    let take = match args.get(2) {
        None => chars - start,
        Some(length) => match int_arg(length).and_then(|n| usize::try_from(n).ok()) {
            Some(n) if start + n <= chars => n,
            _ => return Evaluated::Undefined,
        },
    };
    Evaluated::string(text.chars().skip(start).take(take).collect::<String>())
}

fn to_string<'a>(args: Vec<Evaluated<'a>>, _ci: bool) -> Evaluated<'a> {
    let format = match args.get(1) {
        None => None,
        Some(format) => match format.as_str() {
            Some(f) => Some(f),
            None => return Evaluated::Undefined,
        },
    };
    match args[0].as_value() {
        Some(Value::Scalar(scalar)) => Evaluated::string(
            format_scalar(scalar, format, &FormatProvider::invariant()).into_owned(),
        ),
        Some(value) => Evaluated::string(JsonValueFormatter::to_json_string(value)),
        None => Evaluated::Undefined,
    }
}

// ============================================================================
// Types and values
// ============================================================================

fn is_defined<'a>(args: Vec<Evaluated<'a>>, _ci: bool) -> Evaluated<'a> {
    Evaluated::bool(!args[0].is_undefined())
}

fn undefined<'a>(_args: Vec<Evaluated<'a>>, _ci: bool) -> Evaluated<'a> {
    Evaluated::Undefined
}

fn type_of<'a>(args: Vec<Evaluated<'a>>, _ci: bool) -> Evaluated<'a> {
    let name = match &args[0] {
        Evaluated::Undefined => "undefined",
        Evaluated::Null => "null",
        Evaluated::Value(value) => match value.as_ref() {
            Value::Scalar(scalar) => scalar.type_name(),
            Value::Sequence(_) => "array",
            Value::Structure(_) => "object",
            Value::Dictionary(_) => "dictionary",
        },
    };
    Evaluated::string(name)
}

fn tag_of<'a>(args: Vec<Evaluated<'a>>, _ci: bool) -> Evaluated<'a> {
    match args[0].as_value() {
        Some(Value::Structure(structure)) => structure
            .type_tag
            .as_deref()
            .map_or(Evaluated::Undefined, Evaluated::string),
        _ => Evaluated::Undefined,
    }
}

fn round<'a>(args: Vec<Evaluated<'a>>, _ci: bool) -> Evaluated<'a> {
    let Some(digits) = int_arg(&args[1]).filter(|d| (0..=15).contains(d)) else {
        return Evaluated::Undefined;
    };
    match args[0].as_scalar() {
        Some(Scalar::Int(n)) => Evaluated::int(*n),
        Some(Scalar::UInt(n)) => Evaluated::scalar(Scalar::UInt(*n)),
        Some(Scalar::Float(f)) => {
            let scale = 10f64.powi(digits as i32);
            Evaluated::scalar(Scalar::Float((f * scale).round() / scale))
        }
        _ => Evaluated::Undefined,
    }
}

// ============================================================================
// Time
// ============================================================================

fn now<'a>(_args: Vec<Evaluated<'a>>, _ci: bool) -> Evaluated<'a> {
    Evaluated::scalar(Scalar::DateTime(chrono::Local::now().fixed_offset()))
}

fn utc_date_time<'a>(args: Vec<Evaluated<'a>>, _ci: bool) -> Evaluated<'a> {
    let timestamp = match args[0].as_scalar() {
        Some(Scalar::DateTime(dt)) => *dt,
        Some(Scalar::String(s)) => match DateTime::parse_from_rfc3339(s) {
            Ok(dt) => dt,
            Err(_) => return Evaluated::Undefined,
        },
        _ => return Evaluated::Undefined,
    };
    Evaluated::scalar(Scalar::DateTime(timestamp.with_timezone(&Utc).fixed_offset()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{FixedOffset, TimeZone};
    use evtemplate_events::{Property, Structure};
    use pretty_assertions::assert_eq;

    fn call(name: &str, args: Vec<Evaluated<'static>>) -> Evaluated<'static> {
        call_ci(name, args, false)
    }

    fn call_ci(name: &str, args: Vec<Evaluated<'static>>, ci: bool) -> Evaluated<'static> {
        let function = builtin(name).unwrap();
        assert!(function.accepts(args.len()), "{} arity", name);
        (function.call)(args, ci)
    }

    fn s(text: &str) -> Evaluated<'static> {
        Evaluated::string(text)
    }

    // ========================================================================
    // Lookup
    // ========================================================================

    #[test]
    fn test_lookup_ignores_case() {
        assert_eq!(builtin("startswith").map(|f| f.name), Some("StartsWith"));
        assert!(builtin("NoSuchFunction").is_none());
        assert!(builtin("Substring").unwrap().accepts(3));
        assert!(!builtin("Substring").unwrap().accepts(1));
    }

    #[test]
    fn test_builtin_names_are_unique() {
        let mut names: Vec<_> = builtins().map(|f| f.name.to_lowercase()).collect();
        names.sort();
        names.dedup();
        assert_eq!(names.len(), builtins().count());
    }

    // ========================================================================
    // Strings
    // ========================================================================

    #[test]
    fn test_string_predicates() {
        assert_eq!(call("Contains", vec![s("Hello"), s("ell")]), Evaluated::bool(true));
        assert_eq!(call("StartsWith", vec![s("Hello"), s("he")]), Evaluated::bool(false));
        assert_eq!(
            call_ci("StartsWith", vec![s("Hello"), s("he")], true),
            Evaluated::bool(true)
        );
        assert_eq!(call("EndsWith", vec![s("Hello"), s("lo")]), Evaluated::bool(true));
        assert_eq!(call("Contains", vec![s("Hello"), Evaluated::int(1)]), Evaluated::Undefined);
    }

    #[test]
    fn test_index_functions_count_characters() {
        assert_eq!(call("IndexOf", vec![s("żółw"), s("w")]), Evaluated::int(3));
        assert_eq!(call("IndexOf", vec![s("abc"), s("x")]), Evaluated::int(-1));
        assert_eq!(call("LastIndexOf", vec![s("abab"), s("b")]), Evaluated::int(3));
        assert_eq!(call("IndexOfMatch", vec![s("ab12"), s("[0-9]+")]), Evaluated::int(2));
    }

    #[test]
    fn test_regex_functions() {
        assert_eq!(call("IsMatch", vec![s("abc123"), s("^[a-z]+[0-9]+$")]), Evaluated::bool(true));
        assert_eq!(call("IsMatch", vec![s("abc"), s("(")]), Evaluated::Undefined);
    }

    #[test]
    fn test_substring() {
        assert_eq!(call("Substring", vec![s("Hello"), Evaluated::int(1)]), s("ello"));
        assert_eq!(
            call("Substring", vec![s("Hello"), Evaluated::int(1), Evaluated::int(3)]),
            s("ell")
        );
        assert_eq!(
            call("Substring", vec![s("Hello"), Evaluated::int(4), Evaluated::int(3)]),
            Evaluated::Undefined
        );
        assert_eq!(call("Substring", vec![s("Hi"), Evaluated::int(-1)]), Evaluated::Undefined);
    }

    #[test]
    fn test_concat_and_length() {
        assert_eq!(call("Concat", vec![s("a"), s("b"), s("c")]), s("abc"));
        assert_eq!(call("Concat", vec![s("a"), Evaluated::Null]), Evaluated::Undefined);
        assert_eq!(call("Length", vec![s("żółw")]), Evaluated::int(4));
        assert_eq!(
            call("Length", vec![Evaluated::owned(Value::Sequence(vec![Value::from(1)]))]),
            Evaluated::int(1)
        );
        assert_eq!(call("Length", vec![Evaluated::int(5)]), Evaluated::Undefined);
    }

    #[test]
    fn test_to_string() {
        assert_eq!(call("ToString", vec![Evaluated::int(42)]), s("42"));
        assert_eq!(call("ToString", vec![Evaluated::int(42), s("000")]), s("042"));
        assert_eq!(call("ToString", vec![Evaluated::bool(true)]), s("true"));
        assert_eq!(
            call("ToString", vec![Evaluated::owned(Value::Sequence(vec![Value::from(1)]))]),
            s("[1]")
        );
        assert_eq!(call("ToString", vec![Evaluated::Undefined]), Evaluated::Undefined);
    }

    // ========================================================================
    // Values
    // ========================================================================

    #[test]
    fn test_coalesce() {
        assert_eq!(
            call("Coalesce", vec![Evaluated::Undefined, Evaluated::Null, s("x")]),
            s("x")
        );
        assert_eq!(
            call("Coalesce", vec![Evaluated::Undefined, Evaluated::Null]),
            Evaluated::Null
        );
        assert_eq!(call("Coalesce", vec![Evaluated::Undefined]), Evaluated::Undefined);
    }

    #[test]
    fn test_type_of_and_is_defined() {
        assert_eq!(call("TypeOf", vec![Evaluated::Undefined]), s("undefined"));
        assert_eq!(call("TypeOf", vec![Evaluated::Null]), s("null"));
        assert_eq!(call("TypeOf", vec![s("x")]), s("String"));
        assert_eq!(
            call("TypeOf", vec![Evaluated::owned(Value::Dictionary(vec![]))]),
            s("dictionary")
        );
        assert_eq!(call("IsDefined", vec![Evaluated::Null]), Evaluated::bool(true));
        assert_eq!(call("IsDefined", vec![Evaluated::Undefined]), Evaluated::bool(false));
        assert_eq!(call("Undefined", vec![]), Evaluated::Undefined);
    }

    #[test]
    fn test_tag_of_and_element_at() {
        let point = Value::Structure(Structure::with_type_tag(
            vec![Property::new("X", Value::from(3))],
            "Point",
        ));
        assert_eq!(call("TagOf", vec![Evaluated::owned(point.clone())]), s("Point"));
        assert_eq!(
            call("ElementAt", vec![Evaluated::owned(point), s("X")]),
            Evaluated::int(3)
        );
        let seq = Value::Sequence(vec![Value::from("a"), Value::from("b")]);
        assert_eq!(
            call("ElementAt", vec![Evaluated::owned(seq.clone()), Evaluated::int(1)]),
            s("b")
        );
        assert_eq!(
            call("ElementAt", vec![Evaluated::owned(seq), Evaluated::int(2)]),
            Evaluated::Undefined
        );
    }

    #[test]
    fn test_element_at_borrows_from_source() {
        let seq = Value::Sequence(vec![Value::from("a")]);
        let element = element_at(Evaluated::borrowed(&seq), &Evaluated::int(0));
        assert!(matches!(element, Evaluated::Value(Cow::Borrowed(_))));
    }

    #[test]
    fn test_round() {
        assert_eq!(
            call("Round", vec![Evaluated::scalar(Scalar::Float(2.345)), Evaluated::int(1)]),
            Evaluated::scalar(Scalar::Float(2.3))
        );
        assert_eq!(call("Round", vec![Evaluated::int(7), Evaluated::int(2)]), Evaluated::int(7));
    }

    // ========================================================================
    // Time
    // ========================================================================

    #[test]
    fn test_utc_date_time() {
        let local = FixedOffset::east_opt(3600)
            .unwrap()
            .with_ymd_and_hms(2024, 1, 1, 10, 0, 0)
            .unwrap();
        let Evaluated::Value(value) = call("UtcDateTime", vec![Evaluated::scalar(Scalar::DateTime(local))]) else {
            panic!("expected a timestamp");
        };
        assert_eq!(
            value.as_scalar().map(ToString::to_string).as_deref(),
            Some("2024-01-01T09:00:00.0000000+00:00")
        );
        assert_eq!(
            call("UtcDateTime", vec![s("not a date")]),
            Evaluated::Undefined
        );
    }
}
