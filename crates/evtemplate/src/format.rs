/*
 * format.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Culture-style formatting of numbers.
//!
//! Supports the standard single-letter formats with an optional precision
//! (`D`, `E`, `F`, `N`, `P`, `X`, `G`, `R`), and custom patterns built from
//! `0`, `#`, `.` and `,` with literal prefix and suffix text. Separators come
//! from the [`FormatProvider`].

use evtemplate_events::Scalar;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::fmt::Write;

use crate::timestamp::TimestampFormatter;

/// Separators used when formatting numbers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FormatProvider {
    pub decimal_separator: String,
    pub group_separator: String,
}

impl FormatProvider {
    /// `.` for decimals, `,` for thousands.
    pub fn invariant() -> Self {
        Self {
            decimal_separator: ".".to_string(),
            group_separator: ",".to_string(),
        }
    }

    pub fn new(decimal_separator: impl Into<String>, group_separator: impl Into<String>) -> Self {
        Self {
            decimal_separator: decimal_separator.into(),
            group_separator: group_separator.into(),
        }
    }
}

impl Default for FormatProvider {
    fn default() -> Self {
        Self::invariant()
    }
}

/// A number to format.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Number {
    Int(i64),
    UInt(u64),
    Float(f64),
}

impl Number {
    pub fn from_scalar(scalar: &Scalar) -> Option<Self> {
        match *scalar {
            Scalar::Int(n) => Some(Number::Int(n)),
            Scalar::UInt(n) => Some(Number::UInt(n)),
            Scalar::Float(n) => Some(Number::Float(n)),
            _ => None,
        }
    }

    fn as_f64(self) -> f64 {
        match self {
            Number::Int(n) => n as f64,
            Number::UInt(n) => n as f64,
            Number::Float(n) => n,
        }
    }

    fn is_negative(self) -> bool {
        match self {
            Number::Int(n) => n < 0,
            Number::UInt(_) => false,
            Number::Float(n) => n.is_sign_negative() && n != 0.0,
        }
    }

    /// Magnitude as an unsigned integer, for integral values.
    fn integral_magnitude(self) -> Option<u64> {
        match self {
            Number::Int(n) => Some(n.unsigned_abs()),
            Number::UInt(n) => Some(n),
            Number::Float(_) => None,
        }
    }
}

/// Format `number` according to `format`.
///
/// Returns `None` when the format is not understood; callers then fall back
/// to the default rendering.
pub fn format_number(number: Number, format: &str, provider: &FormatProvider) -> Option<String> {
    if let Number::Float(f) = number {
        if !f.is_finite() {
            return Some(default_float(f));
        }
    }

    let mut chars = format.chars();
    let letter = chars.next()?;
    let precision_text = chars.as_str();
    if letter.is_ascii_alphabetic()
        && (precision_text.is_empty() || precision_text.bytes().all(|b| b.is_ascii_digit()))
    {
        let precision = if precision_text.is_empty() {
            None
        } else {
            Some(precision_text.parse::<usize>().ok()?.min(99))
        };
        return format_standard(number, letter, precision, provider);
    }

    format_custom(number, format, provider)
}

/// Text form of `scalar` under an optional format.
///
/// Strings are returned as-is. Numbers that do not understand `format` fall
/// back to the general format; timestamps default to the round-trip layout.
pub fn format_scalar<'s>(
    scalar: &'s Scalar,
    format: Option<&str>,
    provider: &FormatProvider,
) -> Cow<'s, str> {
    match scalar {
        Scalar::String(s) => Cow::Borrowed(s),
        Scalar::Null => Cow::Borrowed("null"),
        Scalar::Bool(true) => Cow::Borrowed("true"),
        Scalar::Bool(false) => Cow::Borrowed("false"),
        Scalar::Char(c) => Cow::Owned(c.to_string()),
        Scalar::DateTime(dt) => match format {
            Some(pattern) => Cow::Owned(TimestampFormatter::new(pattern).format(dt)),
            None => Cow::Owned(scalar.to_string()),
        },
        Scalar::Int(_) | Scalar::UInt(_) | Scalar::Float(_) => {
            let number = match Number::from_scalar(scalar) {
                Some(number) => number,
                None => return Cow::Owned(scalar.to_string()),
            };
            format
                .and_then(|f| format_number(number, f, provider))
                .or_else(|| format_number(number, "G", provider))
                .map_or_else(|| Cow::Owned(scalar.to_string()), Cow::Owned)
        }
    }
}

/// Write the text form of `scalar` into `out`.
///
/// Unformatted integers, and unformatted finite floats under a `.` decimal
/// separator, are written in place; everything else goes through
/// [`format_scalar`].
pub fn write_scalar<W: Write>(
    out: &mut W,
    scalar: &Scalar,
    format: Option<&str>,
    provider: &FormatProvider,
) {
    let _ = match (scalar, format) {
        (Scalar::Int(n), None) => write!(out, "{}", n),
        (Scalar::UInt(n), None) => write!(out, "{}", n),
        (Scalar::Float(f), None) if f.is_finite() && provider.decimal_separator == "." => {
            write!(out, "{}", f)
        }
        _ => out.write_str(&format_scalar(scalar, format, provider)),
    };
}

fn default_float(f: f64) -> String {
    if f.is_nan() {
        "NaN".to_string()
    } else if f > 0.0 {
        "Infinity".to_string()
    } else if f < 0.0 {
        "-Infinity".to_string()
    } else {
        f.to_string()
    }
}

fn format_standard(
    number: Number,
    letter: char,
    precision: Option<usize>,
    provider: &FormatProvider,
) -> Option<String> {
    let sign = if number.is_negative() { "-" } else { "" };
    match letter {
        'D' | 'd' => {
            let magnitude = number.integral_magnitude()?;
            Some(format!(
                "{}{:0width$}",
                sign,
                magnitude,
                width = precision.unwrap_or(1)
            ))
        }
        'F' | 'f' => Some(fixed(number, precision.unwrap_or(2), false, provider)),
        'N' | 'n' => Some(fixed(number, precision.unwrap_or(2), true, provider)),
        'P' | 'p' => {
            let scaled = Number::Float(number.as_f64() * 100.0);
            Some(format!(
                "{} %",
                fixed(scaled, precision.unwrap_or(2), true, provider)
            ))
        }
        'E' | 'e' => Some(exponential(number, precision.unwrap_or(6), letter, provider)),
        'X' | 'x' => {
            let bits = match number {
                Number::Int(n) => n as u64,
                Number::UInt(n) => n,
                Number::Float(_) => return None,
            };
            let width = precision.unwrap_or(1);
            Some(if letter == 'X' {
                format!("{:0width$X}", bits)
            } else {
                format!("{:0width$x}", bits)
            })
        }
        'G' | 'g' | 'R' | 'r' => Some(match number {
            Number::Int(n) => n.to_string(),
            Number::UInt(n) => n.to_string(),
            Number::Float(f) => f.to_string().replacen('.', &provider.decimal_separator, 1),
        }),
        _ => None,
    }
}

/// Fixed-point rendering with `decimals` fraction digits.
fn fixed(number: Number, decimals: usize, grouped: bool, provider: &FormatProvider) -> String {
    let (integer, fraction) = Decimal::of(number).fixed(decimals);

    let mut out = String::new();
    let is_zero = integer.bytes().chain(fraction.bytes()).all(|b| b == b'0');
    if number.is_negative() && !is_zero {
        out.push('-');
    }
    if grouped {
        push_grouped(&mut out, &integer, &provider.group_separator);
    } else {
        out.push_str(&integer);
    }
    if !fraction.is_empty() {
        out.push_str(&provider.decimal_separator);
        out.push_str(&fraction);
    }
    out
}

fn exponential(number: Number, decimals: usize, letter: char, provider: &FormatProvider) -> String {
    let mut decimal = Decimal::of(number);
    decimal.round_to(decimals as i64 + 1);
    let is_zero = decimal.digits.iter().all(|&d| d == 0);
    let exponent = if is_zero { 0 } else { decimal.point - 1 };

    let mut out = String::new();
    if number.is_negative() && !is_zero {
        out.push('-');
    }
    out.push(char::from(b'0' + decimal.digit(0)));
    if decimals > 0 {
        out.push_str(&provider.decimal_separator);
        for i in 1..=decimals {
            out.push(char::from(b'0' + decimal.digit(i as i64)));
        }
    }
    let _ = write!(
        out,
        "{}{}{:03}",
        if letter == 'E' { 'E' } else { 'e' },
        if exponent < 0 { '-' } else { '+' },
        exponent.unsigned_abs()
    );
    out
}

/// Unsigned decimal digits with the position of the decimal point.
///
/// Floats start from their shortest round-trip digits. Rounding is half away
/// from zero on those digits, so `2.5` becomes `3` and `1.25` becomes `1.3`.
struct Decimal {
    digits: Vec<u8>,
    /// Number of digits before the decimal point; may be zero or negative.
    point: i64,
}

impl Decimal {
    fn of(number: Number) -> Self {
        let text = match number {
            Number::Int(n) => return Self::integral(n.unsigned_abs()),
            Number::UInt(n) => return Self::integral(n),
            Number::Float(f) => format!("{:e}", f.abs()),
        };
        let (mantissa, exponent) = text.split_once('e').unwrap_or((&text, "0"));
        let exponent: i64 = exponent.parse().unwrap_or(0);
        Self {
            digits: mantissa
                .bytes()
                .filter(u8::is_ascii_digit)
                .map(|b| b - b'0')
                .collect(),
            point: exponent + 1,
        }
    }

    fn integral(n: u64) -> Self {
        let digits: Vec<u8> = n.to_string().bytes().map(|b| b - b'0').collect();
        Self {
            point: digits.len() as i64,
            digits,
        }
    }

    /// Digit at `index` counted from the first stored digit; zero outside.
    fn digit(&self, index: i64) -> u8 {
        usize::try_from(index)
            .ok()
            .and_then(|i| self.digits.get(i).copied())
            .unwrap_or(0)
    }

    /// Keep the first `count` digits, rounding half away from zero.
    fn round_to(&mut self, count: i64) {
        let Ok(count) = usize::try_from(count) else {
            self.digits.clear();
            return;
        };
        let round_up = self.digits.get(count).is_some_and(|&d| d >= 5);
        self.digits.truncate(count);
        if !round_up {
            return;
        }
        for i in (0..self.digits.len()).rev() {
            if self.digits[i] == 9 {
                self.digits[i] = 0;
            } else {
                self.digits[i] += 1;
                return;
            }
        }
        self.digits.insert(0, 1);
        self.point += 1;
    }

    /// Integer and fraction digit strings, rounded to `decimals` places.
    fn fixed(mut self, decimals: usize) -> (String, String) {
        self.round_to(self.point + decimals as i64);
        let to_char = |d: u8| char::from(b'0' + d);
        let integer: String = if self.point <= 0 {
            "0".to_string()
        } else {
            (0..self.point).map(|i| to_char(self.digit(i))).collect()
        };
        let fraction = (0..decimals as i64)
            .map(|i| to_char(self.digit(self.point + i)))
            .collect();
        (integer, fraction)
    }
}

fn push_grouped(out: &mut String, integer: &str, separator: &str) {
    let len = integer.len();
    for (i, c) in integer.chars().enumerate() {
        if i > 0 && (len - i) % 3 == 0 {
            out.push_str(separator);
        }
        out.push(c);
    }
}

/// Custom patterns such as `000`, `#,##0.00` or `0.0#` with optional literal
/// text around the digit placeholders.
fn format_custom(number: Number, format: &str, provider: &FormatProvider) -> Option<String> {
    let is_placeholder = |c: char| matches!(c, '0' | '#' | '.' | ',');
    let first = format.find(is_placeholder)?;
    let last = format.rfind(is_placeholder)?;
    let prefix = &format[..first];
    let suffix = &format[last + 1..];
    let pattern = &format[first..=last];
    if !pattern.chars().all(is_placeholder) {
        return None;
    }

    let (integer_pattern, fraction_pattern) = match pattern.split_once('.') {
        Some((i, f)) => (i, f.trim_end_matches(',')),
        None => (pattern, ""),
    };
    let grouped = integer_pattern.trim_matches(',').contains(',');
    let min_integer = integer_pattern.matches('0').count();
    let min_fraction = fraction_pattern.matches('0').count();
    let max_fraction = min_fraction + fraction_pattern.matches('#').count();

    let (integer, fraction) = Decimal::of(number).fixed(max_fraction);
    let integer = integer.trim_start_matches('0');
    let fraction = {
        let mut f = fraction.as_str();
        while f.len() > min_fraction && f.ends_with('0') {
            f = &f[..f.len() - 1];
        }
        f
    };

    let mut integer_digits = String::new();
    for _ in integer.len()..min_integer {
        integer_digits.push('0');
    }
    integer_digits.push_str(integer);

    let mut out = String::from(prefix);
    let is_zero = integer_digits.bytes().all(|b| b == b'0') && fraction.bytes().all(|b| b == b'0');
    if number.is_negative() && !is_zero {
        out.push('-');
    }
    if grouped {
        push_grouped(&mut out, &integer_digits, &provider.group_separator);
    } else {
        out.push_str(&integer_digits);
    }
    if !fraction.is_empty() {
        out.push_str(&provider.decimal_separator);
        out.push_str(fraction);
    }
    out.push_str(suffix);
    Some(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn fmt(number: Number, format: &str) -> Option<String> {
        format_number(number, format, &FormatProvider::invariant())
    }

    // ========================================================================
    // Standard formats
    // ========================================================================

    #[test]
    fn test_decimal() {
        assert_eq!(fmt(Number::Int(42), "D5").as_deref(), Some("00042"));
        assert_eq!(fmt(Number::Int(-42), "D"), Some("-42".into()));
        assert_eq!(fmt(Number::Float(1.5), "D"), None);
    }

    #[test]
    fn test_fixed_and_number() {
        assert_eq!(fmt(Number::Float(3.14159), "F2").as_deref(), Some("3.14"));
        assert_eq!(fmt(Number::Int(7), "F"), Some("7.00".into()));
        assert_eq!(fmt(Number::Int(1234567), "N0").as_deref(), Some("1,234,567"));
        assert_eq!(
            fmt(Number::Float(-1234.5), "N1").as_deref(),
            Some("-1,234.5")
        );
    }

    #[test]
    fn test_hex_and_exponential() {
        assert_eq!(fmt(Number::Int(255), "X4").as_deref(), Some("00FF"));
        assert_eq!(fmt(Number::UInt(255), "x").as_deref(), Some("ff"));
        assert_eq!(
            fmt(Number::Float(1234.5), "E2").as_deref(),
            Some("1.23E+003")
        );
        assert_eq!(
            fmt(Number::Float(0.00012), "e1").as_deref(),
            Some("1.2e-004")
        );
    }

    #[test]
    fn test_percent() {
        assert_eq!(fmt(Number::Float(0.1234), "P1").as_deref(), Some("12.3 %"));
    }

    #[test]
    fn test_provider_separators() {
        let provider = FormatProvider::new(",", ".");
        assert_eq!(
            format_number(Number::Float(1234.5), "N2", &provider).as_deref(),
            Some("1.234,50")
        );
    }

    // ========================================================================
    // Custom patterns
    // ========================================================================

    #[test]
    fn test_custom_zero_padding() {
        assert_eq!(fmt(Number::Int(42), "000").as_deref(), Some("042"));
        assert_eq!(fmt(Number::Int(1234), "00").as_deref(), Some("1234"));
    }

    #[test]
    fn test_custom_fraction() {
        assert_eq!(fmt(Number::Float(3.1), "#.00").as_deref(), Some("3.10"));
        assert_eq!(fmt(Number::Float(0.5), "#.00").as_deref(), Some(".50"));
        assert_eq!(fmt(Number::Float(2.0), "0.##").as_deref(), Some("2"));
        assert_eq!(fmt(Number::Float(2.345), "0.0#").as_deref(), Some("2.35"));
    }

    #[test]
    fn test_custom_grouping_and_literals() {
        assert_eq!(
            fmt(Number::Int(1234567), "#,##0").as_deref(),
            Some("1,234,567")
        );
        assert_eq!(
            fmt(Number::Float(12.5), "$0.00 USD").as_deref(),
            Some("$12.50 USD")
        );
    }

    #[test]
    fn test_custom_grouping_without_hash() {
        assert_eq!(fmt(Number::Float(1234.0), "0,000").as_deref(), Some("1,234"));
        assert_eq!(fmt(Number::Float(1234.0), "#,0").as_deref(), Some("1,234"));
        assert_eq!(fmt(Number::Int(12), "0,000").as_deref(), Some("0,012"));
    }

    // ========================================================================
    // Rounding
    // ========================================================================

    #[test]
    fn test_halves_round_away_from_zero() {
        assert_eq!(fmt(Number::Float(2.5), "F0").as_deref(), Some("3"));
        assert_eq!(fmt(Number::Float(-2.5), "F0").as_deref(), Some("-3"));
        assert_eq!(fmt(Number::Float(1.25), "0.0").as_deref(), Some("1.3"));
        assert_eq!(fmt(Number::Float(0.125), "0.00").as_deref(), Some("0.13"));
        assert_eq!(fmt(Number::Float(0.125), "N2").as_deref(), Some("0.13"));
        assert_eq!(fmt(Number::Float(1.25), "E1").as_deref(), Some("1.3E+000"));
    }

    #[test]
    fn test_rounding_carries_into_new_digit() {
        assert_eq!(fmt(Number::Float(9.995), "F2").as_deref(), Some("10.00"));
        assert_eq!(fmt(Number::Float(999.5), "#,##0").as_deref(), Some("1,000"));
        assert_eq!(fmt(Number::Float(0.096), "0.00").as_deref(), Some("0.10"));
        assert_eq!(fmt(Number::Float(9.96), "E1").as_deref(), Some("1.0E+001"));
    }

    #[test]
    fn test_tiny_values_round_to_zero() {
        assert_eq!(fmt(Number::Float(0.001), "F1").as_deref(), Some("0.0"));
        assert_eq!(fmt(Number::Float(-0.001), "F1").as_deref(), Some("0.0"));
        assert_eq!(fmt(Number::Float(0.0), "E2").as_deref(), Some("0.00E+000"));
    }

    #[test]
    fn test_unknown_format() {
        assert_eq!(fmt(Number::Int(1), "Q"), None);
        assert_eq!(fmt(Number::Int(1), "abc"), None);
    }

    #[test]
    fn test_format_scalar() {
        let provider = FormatProvider::new(",", " ");
        assert_eq!(
            format_scalar(&Scalar::Float(1.5), None, &provider),
            "1,5"
        );
        assert_eq!(
            format_scalar(&Scalar::Int(12), Some("000"), &provider),
            "012"
        );
        assert_eq!(
            format_scalar(&Scalar::Int(12), Some("Q?"), &provider),
            "12"
        );
        assert_eq!(
            format_scalar(&Scalar::String("s".into()), Some("000"), &provider),
            "s"
        );
        assert_eq!(format_scalar(&Scalar::Bool(true), None, &provider), "true");
    }

    #[test]
    fn test_write_scalar_matches_format_scalar() {
        let invariant = FormatProvider::invariant();
        let comma = FormatProvider::new(",", ".");
        let cases = [
            (Scalar::Int(-42), None),
            (Scalar::UInt(u64::MAX), None),
            (Scalar::Float(1.5), None),
            (Scalar::Float(f64::INFINITY), None),
            (Scalar::Int(7), Some("000")),
            (Scalar::String("text".into()), None),
        ];
        for provider in [&invariant, &comma] {
            for (scalar, format) in &cases {
                let mut written = String::new();
                write_scalar(&mut written, scalar, *format, provider);
                assert_eq!(written, format_scalar(scalar, *format, provider));
            }
        }
    }

    #[test]
    fn test_non_finite() {
        assert_eq!(fmt(Number::Float(f64::NAN), "F2").as_deref(), Some("NaN"));
    }
}
