/*
 * level.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Level monikers for the `{@l}` token.
//!
//! The format is a casing letter followed by an optional width: `u3` renders
//! `INF`, `w1` renders `i`, `t4` renders `Info`. Widths 1 through 5 use fixed
//! abbreviation tables so that columns line up; wider widths truncate the
//! cased full name. Without a format the full name is rendered.

use evtemplate_events::Level;
use std::borrow::Cow;

const TITLE_CASE: [[&str; 5]; 6] = [
    ["V", "Vb", "Vrb", "Verb", "Verb "],
    ["D", "De", "Dbg", "Dbug", "Debug"],
    ["I", "In", "Inf", "Info", "Info "],
    ["W", "Wn", "Wrn", "Warn", "Warn "],
    ["E", "Er", "Err", "Eror", "Error"],
    ["F", "Fa", "Ftl", "Fatl", "Fatal"],
];

const LOWERCASE: [[&str; 5]; 6] = [
    ["v", "vb", "vrb", "verb", "verb "],
    ["d", "de", "dbg", "dbug", "debug"],
    ["i", "in", "inf", "info", "info "],
    ["w", "wn", "wrn", "warn", "warn "],
    ["e", "er", "err", "eror", "error"],
    ["f", "fa", "ftl", "fatl", "fatal"],
];

const UPPERCASE: [[&str; 5]; 6] = [
    ["V", "VB", "VRB", "VERB", "VERB "],
    ["D", "DE", "DBG", "DBUG", "DEBUG"],
    ["I", "IN", "INF", "INFO", "INFO "],
    ["W", "WN", "WRN", "WARN", "WARN "],
    ["E", "ER", "ERR", "EROR", "ERROR"],
    ["F", "FA", "FTL", "FATL", "FATAL"],
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Casing {
    Lower,
    Upper,
    Title,
}

impl Casing {
    fn from_format(format: &str) -> Self {
        match format.chars().next() {
            Some('w') => Casing::Lower,
            Some('u') => Casing::Upper,
            _ => Casing::Title,
        }
    }

    fn table(self) -> &'static [[&'static str; 5]; 6] {
        match self {
            Casing::Lower => &LOWERCASE,
            Casing::Upper => &UPPERCASE,
            Casing::Title => &TITLE_CASE,
        }
    }

    fn apply(self, name: &str) -> String {
        match self {
            Casing::Lower => name.to_lowercase(),
            Casing::Upper => name.to_uppercase(),
            Casing::Title => name.to_string(),
        }
    }
}

/// Render the moniker for `level` under `format`.
pub fn level_moniker(level: Level, format: Option<&str>) -> Cow<'static, str> {
    let Some(format) = format.filter(|f| !f.is_empty()) else {
        return Cow::Borrowed(level.name());
    };

    let casing = Casing::from_format(format);
    let width = match format.get(1..) {
        None | Some("") => None,
        Some(digits) => match digits.parse::<usize>() {
            Ok(0) | Err(_) => None,
            Ok(width) => Some(width),
        },
    };

    match width {
        Some(width @ 1..=5) => Cow::Borrowed(casing.table()[level.ordinal()][width - 1]),
        Some(width) => Cow::Owned(casing.apply(level.name()).chars().take(width).collect()),
        None => Cow::Owned(casing.apply(level.name())),
    }
}

/// Pre-render the monikers for every level.
pub fn level_monikers(format: Option<&str>) -> [Box<[u8]>; 6] {
    Level::ALL.map(|level| level_moniker(level, format).as_bytes().into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn moniker(level: Level, format: &str) -> String {
        level_moniker(level, Some(format)).into_owned()
    }

    #[test]
    fn test_no_format_is_full_name() {
        assert_eq!(level_moniker(Level::Information, None), "Information");
        assert_eq!(level_moniker(Level::Warning, Some("")), "Warning");
    }

    #[test]
    fn test_table_widths() {
        assert_eq!(moniker(Level::Information, "u3"), "INF");
        assert_eq!(moniker(Level::Warning, "w1"), "w");
        assert_eq!(moniker(Level::Debug, "t4"), "Dbug");
        assert_eq!(moniker(Level::Information, "t5"), "Info ");
        assert_eq!(moniker(Level::Error, "u5"), "ERROR");
        assert_eq!(moniker(Level::Fatal, "w2"), "fa");
        assert_eq!(moniker(Level::Verbose, "u3"), "VRB");
    }

    #[test]
    fn test_every_table_entry_has_its_width() {
        for table in [&TITLE_CASE, &LOWERCASE, &UPPERCASE] {
            for row in table {
                for (i, entry) in row.iter().enumerate() {
                    assert_eq!(entry.len(), i + 1);
                }
            }
        }
    }

    #[test]
    fn test_casing_without_width() {
        assert_eq!(moniker(Level::Information, "u"), "INFORMATION");
        assert_eq!(moniker(Level::Information, "w"), "information");
        assert_eq!(moniker(Level::Information, "t"), "Information");
        assert_eq!(moniker(Level::Information, "u0"), "INFORMATION");
    }

    #[test]
    fn test_wide_widths_truncate_full_name() {
        assert_eq!(moniker(Level::Information, "u6"), "INFORM");
        assert_eq!(moniker(Level::Debug, "w10"), "debug");
    }

    #[test]
    fn test_junk_width_degrades_to_full_name() {
        assert_eq!(moniker(Level::Warning, "uxy"), "WARNING");
    }

    #[test]
    fn test_monikers_for_all_levels() {
        let monikers = level_monikers(Some("u3"));
        assert_eq!(&*monikers[2], b"INF");
        assert_eq!(&*monikers[5], b"FTL");
    }
}
