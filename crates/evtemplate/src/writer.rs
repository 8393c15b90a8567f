/*
 * writer.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Append-only UTF-8 output buffer.
//!
//! [`Utf8Writer`] wraps a caller-owned `Vec<u8>` and tracks how much of it
//! holds committed output. Writers that know an upper bound for their output
//! can [`reserve`](Utf8Writer::reserve) a window, format directly into
//! [`span`](Utf8Writer::span), then [`advance`](Utf8Writer::advance) past the
//! bytes actually produced. Anything reserved but not committed is dropped
//! when the writer is flushed or goes out of scope.

use std::fmt;

pub struct Utf8Writer<'b> {
    buf: &'b mut Vec<u8>,
    written: usize,
}

impl<'b> Utf8Writer<'b> {
    /// Start writing after any bytes already in `buf`.
    pub fn new(buf: &'b mut Vec<u8>) -> Self {
        let written = buf.len();
        Self { buf, written }
    }

    /// Offset of the next byte to be written.
    pub fn position(&self) -> usize {
        self.written
    }

    /// Committed bytes from `start` to the current position.
    pub fn written_since(&self, start: usize) -> &[u8] {
        &self.buf[start..self.written]
    }

    /// Ensure at least `n` writable bytes are available in [`Self::span`].
    pub fn reserve(&mut self, n: usize) {
        let needed = self.written + n;
        if self.buf.len() < needed {
            self.buf.resize(needed, 0);
        }
    }

    /// The writable window after the committed bytes.
    pub fn span(&mut self) -> &mut [u8] {
        &mut self.buf[self.written..]
    }

    /// Commit `n` bytes previously written into [`Self::span`].
    pub fn advance(&mut self, n: usize) {
        debug_assert!(self.written + n <= self.buf.len());
        self.written += n;
    }

    pub fn write(&mut self, bytes: &[u8]) {
        self.reserve(bytes.len());
        let end = self.written + bytes.len();
        self.buf[self.written..end].copy_from_slice(bytes);
        self.written = end;
    }

    pub fn write_text(&mut self, text: &str) {
        self.write(text.as_bytes());
    }

    pub fn write_char(&mut self, c: char) {
        let mut encoded = [0u8; 4];
        self.write(c.encode_utf8(&mut encoded).as_bytes());
    }

    pub fn write_byte(&mut self, byte: u8) {
        self.reserve(1);
        self.buf[self.written] = byte;
        self.written += 1;
    }

    /// Append `count` copies of `byte`.
    pub fn fill(&mut self, byte: u8, count: usize) {
        self.reserve(count);
        let end = self.written + count;
        self.buf[self.written..end].fill(byte);
        self.written = end;
    }

    /// Shift the bytes written since `start` right by `count` and fill the
    /// gap with spaces.
    pub fn insert_padding(&mut self, start: usize, count: usize) {
        self.reserve(count);
        self.buf.copy_within(start..self.written, start + count);
        self.buf[start..start + count].fill(b' ');
        self.written += count;
    }

    /// Drop reserved-but-uncommitted bytes from the underlying buffer.
    pub fn flush(&mut self) {
        self.buf.truncate(self.written);
    }
}

impl Drop for Utf8Writer<'_> {
    fn drop(&mut self) {
        self.flush();
    }
}

impl fmt::Write for Utf8Writer<'_> {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        self.write_text(s);
        Ok(())
    }

    fn write_char(&mut self, c: char) -> fmt::Result {
        Utf8Writer::write_char(self, c);
        Ok(())
    }
}

/// Internal fault: a formatter produced more output than its own bound.
#[cold]
#[inline(never)]
pub fn buffer_exhausted(what: &str, reserved: usize) -> ! {
    panic!(
        "output buffer exhausted while formatting {}: {} bytes reserved were not enough",
        what, reserved
    )
}
