/*
 * timestamp.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Timestamp formatting.
//!
//! Patterns use the conventional date-time mini-language: `yyyy`, `MM`,
//! `dd`, `HH`, `hh`, `mm`, `ss`, `f`..`fffffff`, `F`..`FFFFFFF`, `tt`, `z`,
//! `zz`, `zzz`, `K`, quoted literals (`'T'`, `"at"`) and `\`-escapes. The
//! single-letter standard patterns `O`, `s`, `u`, `d`, `D`, `t`, `T`, `g`,
//! `G` and `R` expand to their usual layouts.
//!
//! A parsed [`TimestampFormatter`] knows the maximum length of its output, so
//! callers can reserve an output window once and format straight into it.

use chrono::{DateTime, Datelike, FixedOffset, Timelike};
use std::io::{Cursor, Write};

/// The round-trip layout, e.g. `2000-12-31T23:59:58.1230000+10:00`.
pub const ROUND_TRIP: &str = "O";

const MONTH_NAMES: [&str; 12] = [
    "January",
    "February",
    "March",
    "April",
    "May",
    "June",
    "July",
    "August",
    "September",
    "October",
    "November",
    "December",
];

const DAY_NAMES: [&str; 7] = [
    "Sunday",
    "Monday",
    "Tuesday",
    "Wednesday",
    "Thursday",
    "Friday",
    "Saturday",
];

#[derive(Debug, Clone, PartialEq)]
enum Segment {
    Literal(String),
    /// `y` with the number of pattern letters.
    Year(usize),
    Month(usize),
    Day(usize),
    Hour24(usize),
    Hour12(usize),
    Minute(usize),
    Second(usize),
    /// `f`: fixed number of fraction digits.
    Fraction(usize),
    /// `F`: up to this many digits, trailing zeros removed. When `dot` is
    /// set the preceding `.` is emitted only if any digits remain.
    TrimmedFraction { digits: usize, dot: bool },
    AmPm(usize),
    Offset(usize),
    /// `K`: `+hh:mm`.
    OffsetK,
}

impl Segment {
    fn max_len(&self) -> usize {
        match self {
            Segment::Literal(text) => text.len(),
            Segment::Year(n) => (*n).max(7),
            Segment::Month(n) | Segment::Day(n) if *n >= 4 => 9,
            Segment::Month(3) | Segment::Day(3) => 3,
            Segment::Fraction(n) => *n,
            Segment::TrimmedFraction { digits, dot } => digits + usize::from(*dot),
            Segment::AmPm(_) => 2,
            Segment::Offset(_) | Segment::OffsetK => 6,
            _ => 2,
        }
    }
}

/// A compiled timestamp pattern.
#[derive(Debug, Clone, PartialEq)]
pub struct TimestampFormatter {
    segments: Vec<Segment>,
    /// Render in UTC rather than the timestamp's own offset.
    utc: bool,
    max_len: usize,
}

impl Default for TimestampFormatter {
    fn default() -> Self {
        Self::new(ROUND_TRIP)
    }
}

impl TimestampFormatter {
    pub fn new(pattern: &str) -> Self {
        let (expanded, utc) = match pattern {
            "O" | "o" => ("yyyy'-'MM'-'dd'T'HH':'mm':'ss'.'fffffffK", false),
            "s" => ("yyyy'-'MM'-'dd'T'HH':'mm':'ss", false),
            "u" => ("yyyy'-'MM'-'dd HH':'mm':'ss'Z'", true),
            "R" | "r" => ("ddd, dd MMM yyyy HH':'mm':'ss 'GMT'", true),
            "d" => ("MM/dd/yyyy", false),
            "D" => ("dddd, dd MMMM yyyy", false),
            "t" => ("HH:mm", false),
            "T" => ("HH:mm:ss", false),
            "g" => ("MM/dd/yyyy HH:mm", false),
            "G" => ("MM/dd/yyyy HH:mm:ss", false),
            other => (other, false),
        };
        let segments = parse_pattern(expanded);
        let max_len = segments.iter().map(Segment::max_len).sum();
        Self {
            segments,
            utc,
            max_len,
        }
    }

    /// Upper bound on the bytes [`Self::try_format`] writes.
    pub fn max_len(&self) -> usize {
        self.max_len
    }

    /// Format into `span`. Returns the number of bytes written, or `None` if
    /// `span` is too small.
    pub fn try_format(&self, timestamp: &DateTime<FixedOffset>, span: &mut [u8]) -> Option<usize> {
        let mut cursor = Cursor::new(span);
        self.write_to(timestamp, &mut cursor).ok()?;
        usize::try_from(cursor.position()).ok()
    }

    pub fn format(&self, timestamp: &DateTime<FixedOffset>) -> String {
        let mut out = Vec::with_capacity(self.max_len);
        // Writing into a Vec cannot fail.
        let _ = self.write_to(timestamp, &mut out);
        String::from_utf8_lossy(&out).into_owned()
    }

    fn write_to(&self, timestamp: &DateTime<FixedOffset>, out: &mut impl Write) -> std::io::Result<()> {
        let utc_offset = FixedOffset::east_opt(0);
        let ts = match (self.utc, utc_offset) {
            (true, Some(utc)) => timestamp.with_timezone(&utc),
            _ => *timestamp,
        };
        let nanos = ts.nanosecond().min(999_999_999);

        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => out.write_all(text.as_bytes())?,
                Segment::Year(2) => write!(out, "{:02}", ts.year().rem_euclid(100))?,
                Segment::Year(n) => write!(out, "{:0width$}", ts.year(), width = *n)?,
                Segment::Month(n) => match n {
                    1 => write!(out, "{}", ts.month())?,
                    2 => write!(out, "{:02}", ts.month())?,
                    3 => out.write_all(&MONTH_NAMES[ts.month0() as usize].as_bytes()[..3])?,
                    _ => out.write_all(MONTH_NAMES[ts.month0() as usize].as_bytes())?,
                },
                Segment::Day(n) => match n {
                    1 => write!(out, "{}", ts.day())?,
                    2 => write!(out, "{:02}", ts.day())?,
                    3 => out.write_all(
                        &DAY_NAMES[ts.weekday().num_days_from_sunday() as usize].as_bytes()[..3],
                    )?,
                    _ => out.write_all(
                        DAY_NAMES[ts.weekday().num_days_from_sunday() as usize].as_bytes(),
                    )?,
                },
                Segment::Hour24(1) => write!(out, "{}", ts.hour())?,
                Segment::Hour24(_) => write!(out, "{:02}", ts.hour())?,
                Segment::Hour12(n) => {
                    let hour = match ts.hour() % 12 {
                        0 => 12,
                        h => h,
                    };
                    if *n == 1 {
                        write!(out, "{}", hour)?
                    } else {
                        write!(out, "{:02}", hour)?
                    }
                }
                Segment::Minute(1) => write!(out, "{}", ts.minute())?,
                Segment::Minute(_) => write!(out, "{:02}", ts.minute())?,
                Segment::Second(1) => write!(out, "{}", ts.second())?,
                Segment::Second(_) => write!(out, "{:02}", ts.second())?,
                Segment::Fraction(n) => {
                    write!(out, "{:0width$}", nanos / 10u32.pow(9 - *n as u32), width = *n)?
                }
                Segment::TrimmedFraction { digits, dot } => {
                    let value = nanos / 10u32.pow(9 - *digits as u32);
                    let text = format!("{:0width$}", value, width = *digits);
                    let trimmed = text.trim_end_matches('0');
                    if !trimmed.is_empty() {
                        if *dot {
                            out.write_all(b".")?;
                        }
                        out.write_all(trimmed.as_bytes())?;
                    }
                }
                Segment::AmPm(n) => {
                    let marker = if ts.hour() < 12 { "AM" } else { "PM" };
                    out.write_all(&marker.as_bytes()[..(*n).min(2)])?;
                }
                Segment::Offset(1) => {
                    let seconds = ts.offset().local_minus_utc();
                    let sign = if seconds < 0 { '-' } else { '+' };
                    write!(out, "{}{}", sign, seconds.unsigned_abs() / 3600)?
                }
                Segment::Offset(2) => write_offset(out, ts.offset().local_minus_utc(), false)?,
                Segment::Offset(_) => write_offset(out, ts.offset().local_minus_utc(), true)?,
                Segment::OffsetK => write_offset(out, ts.offset().local_minus_utc(), true)?,
            }
        }
        Ok(())
    }
}

fn write_offset(out: &mut impl Write, seconds: i32, with_minutes: bool) -> std::io::Result<()> {
    let sign = if seconds < 0 { '-' } else { '+' };
    let magnitude = seconds.unsigned_abs();
    if with_minutes {
        write!(out, "{}{:02}:{:02}", sign, magnitude / 3600, (magnitude % 3600) / 60)
    } else {
        write!(out, "{}{:02}", sign, magnitude / 3600)
    }
}

fn parse_pattern(pattern: &str) -> Vec<Segment> {
    let chars: Vec<char> = pattern.chars().collect();
    let mut segments: Vec<Segment> = Vec::new();
    let mut literal = String::new();
    let mut i = 0;

    let flush = |literal: &mut String, segments: &mut Vec<Segment>| {
        if !literal.is_empty() {
            segments.push(Segment::Literal(std::mem::take(literal)));
        }
    };

    while i < chars.len() {
        let c = chars[i];
        let run = chars[i..].iter().take_while(|&&x| x == c).count();
        let segment = match c {
            'y' => Some(Segment::Year(run)),
            'M' => Some(Segment::Month(run)),
            'd' => Some(Segment::Day(run)),
            'H' => Some(Segment::Hour24(run)),
            'h' => Some(Segment::Hour12(run)),
            'm' => Some(Segment::Minute(run)),
            's' => Some(Segment::Second(run)),
            'f' => Some(Segment::Fraction(run.min(9))),
            'F' => {
                let dot = literal.ends_with('.');
                if dot {
                    literal.pop();
                }
                Some(Segment::TrimmedFraction {
                    digits: run.min(9),
                    dot,
                })
            }
            't' => Some(Segment::AmPm(run)),
            'z' => Some(Segment::Offset(run)),
            'K' => Some(Segment::OffsetK),
            _ => None,
        };

        if let Some(segment) = segment {
            flush(&mut literal, &mut segments);
            segments.push(segment);
            i += if c == 'K' { 1 } else { run };
            continue;
        }

        match c {
            '\'' | '"' => {
                let close = chars[i + 1..].iter().position(|&x| x == c);
                let end = close.map_or(chars.len(), |p| i + 1 + p);
                literal.extend(&chars[i + 1..end]);
                i = end + 1;
            }
            '\\' => {
                if let Some(&next) = chars.get(i + 1) {
                    literal.push(next);
                }
                i += 2;
            }
            '%' => i += 1,
            _ => {
                literal.push(c);
                i += 1;
            }
        }
    }
    flush(&mut literal, &mut segments);
    segments
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;

    fn timestamp() -> DateTime<FixedOffset> {
        FixedOffset::east_opt(10 * 3600)
            .unwrap()
            .with_ymd_and_hms(2000, 12, 31, 23, 59, 58)
            .unwrap()
            + chrono::Duration::milliseconds(123)
    }

    fn fmt(pattern: &str) -> String {
        TimestampFormatter::new(pattern).format(&timestamp())
    }

    #[test]
    fn test_round_trip_default() {
        assert_eq!(
            TimestampFormatter::default().format(&timestamp()),
            "2000-12-31T23:59:58.1230000+10:00"
        );
    }

    #[test]
    fn test_standard_layouts() {
        assert_eq!(fmt("s"), "2000-12-31T23:59:58");
        assert_eq!(fmt("u"), "2000-12-31 13:59:58Z");
        assert_eq!(fmt("R"), "Sun, 31 Dec 2000 13:59:58 GMT");
        assert_eq!(fmt("D"), "Sunday, 31 December 2000");
    }

    #[test]
    fn test_custom_patterns() {
        assert_eq!(fmt("HH:mm:ss.fff"), "23:59:58.123");
        assert_eq!(fmt("yyyy-MM-dd HH:mm:ss zzz"), "2000-12-31 23:59:58 +10:00");
        assert_eq!(fmt("hh:mm tt"), "11:59 PM");
        assert_eq!(fmt("yy/M/d"), "00/12/31");
        assert_eq!(fmt("'Day' d 'of' MMM"), "Day 31 of Dec");
        assert_eq!(fmt("z|zz"), "+10|+10");
    }

    #[test]
    fn test_trimmed_fraction() {
        assert_eq!(fmt("ss.FFFFFF"), "58.123");
        let whole = FixedOffset::east_opt(0)
            .unwrap()
            .with_ymd_and_hms(2020, 1, 1, 0, 0, 5)
            .unwrap();
        assert_eq!(TimestampFormatter::new("ss.FFF").format(&whole), "05");
    }

    #[test]
    fn test_try_format_respects_span() {
        let formatter = TimestampFormatter::default();
        let mut small = [0u8; 8];
        assert_eq!(formatter.try_format(&timestamp(), &mut small), None);

        let mut span = vec![0u8; formatter.max_len()];
        let n = formatter.try_format(&timestamp(), &mut span).unwrap();
        assert_eq!(&span[..n], b"2000-12-31T23:59:58.1230000+10:00");
    }

    #[test]
    fn test_max_len_bounds_output() {
        for pattern in ["O", "s", "u", "R", "D", "dddd MMMM yyyy hh tt", "HH:mm:ss.fffffff zzz"] {
            let formatter = TimestampFormatter::new(pattern);
            assert!(formatter.format(&timestamp()).len() <= formatter.max_len(), "{}", pattern);
        }
    }
}
