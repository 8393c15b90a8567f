/*
 * padding.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Alignment of rendered values.
//!
//! Width is measured in printable characters: UTF-8 bytes that do not
//! continue a multi-byte sequence, minus any invisible bytes (ANSI escape
//! sequences) the caller reports. Values are padded with spaces but never
//! truncated.

use crate::ast::{Alignment, AlignmentDirection};
use crate::writer::Utf8Writer;

/// Count characters in UTF-8 `bytes`.
pub fn printable_width(bytes: &[u8]) -> usize {
    bytes.iter().filter(|&&b| (b & 0xC0) != 0x80).count()
}

/// Pad the output written since `start` to `alignment.width`.
///
/// `invisible` is the number of bytes in that output that occupy no space
/// on screen.
pub fn apply(out: &mut Utf8Writer<'_>, start: usize, invisible: usize, alignment: Alignment) {
    let printable = printable_width(out.written_since(start)).saturating_sub(invisible);
    if printable >= alignment.width {
        return;
    }
    let padding = alignment.width - printable;
    match alignment.direction {
        AlignmentDirection::Left => out.fill(b' ', padding),
        AlignmentDirection::Right => out.insert_padding(start, padding),
    }
}

/// Write a value known to be pure ASCII, padded to `alignment`.
pub fn apply_ascii(out: &mut Utf8Writer<'_>, value: &[u8], alignment: Option<Alignment>) {
    let Some(alignment) = alignment else {
        out.write(value);
        return;
    };
    let padding = alignment.width.saturating_sub(value.len());
    match alignment.direction {
        AlignmentDirection::Left => {
            out.write(value);
            out.fill(b' ', padding);
        }
        AlignmentDirection::Right => {
            out.fill(b' ', padding);
            out.write(value);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn aligned(text: &str, invisible: usize, alignment: Alignment) -> String {
        let mut buf = b"|".to_vec();
        {
            let mut out = Utf8Writer::new(&mut buf);
            let start = out.position();
            out.write_text(text);
            apply(&mut out, start, invisible, alignment);
            out.write_text("|");
        }
        String::from_utf8(buf).unwrap()
    }

    #[test]
    fn test_right_and_left() {
        assert_eq!(aligned("ab", 0, Alignment::right(5)), "|   ab|");
        assert_eq!(aligned("ab", 0, Alignment::left(5)), "|ab   |");
    }

    #[test]
    fn test_never_truncates() {
        assert_eq!(aligned("abcdef", 0, Alignment::right(3)), "|abcdef|");
    }

    #[test]
    fn test_counts_characters_not_bytes() {
        assert_eq!(aligned("żółw", 0, Alignment::left(6)), "|żółw  |");
    }

    #[test]
    fn test_discounts_invisible_bytes() {
        let styled = "\x1b[1mab\x1b[0m";
        assert_eq!(
            aligned(styled, 8, Alignment::right(4)),
            "|  \x1b[1mab\x1b[0m|"
        );
    }

    #[test]
    fn test_apply_ascii() {
        let mut buf = Vec::new();
        {
            let mut out = Utf8Writer::new(&mut buf);
            apply_ascii(&mut out, b"INF", Some(Alignment::right(5)));
            apply_ascii(&mut out, b"x", None);
            apply_ascii(&mut out, b"WRN", Some(Alignment::left(4)));
        }
        assert_eq!(buf, b"  INFxWRN ");
    }
}
