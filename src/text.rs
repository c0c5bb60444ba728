//! UTF-8 sanitizing and byte-safe truncation.

use std::borrow::Cow;

use crate::diagnostics::{DiagnosticSink, Subject, Warning};

/// Decode `bytes` as UTF-8, replacing each run of invalid bytes with a single
/// U+FFFD. Returns the text and the number of replacements made.
///
/// Valid input is borrowed unchanged.
pub fn sanitize_utf8(bytes: &[u8]) -> (Cow<'_, str>, usize) {
    if let Ok(text) = std::str::from_utf8(bytes) {
        return (Cow::Borrowed(text), 0);
    }

    let mut out = String::with_capacity(bytes.len() + 3);
    let mut replacements = 0;
    let mut in_invalid_run = false;

    for chunk in bytes.utf8_chunks() {
        let valid = chunk.valid();
        if !valid.is_empty() {
            out.push_str(valid);
            in_invalid_run = false;
        }
        if !chunk.invalid().is_empty() {
            if !in_invalid_run {
                out.push(char::REPLACEMENT_CHARACTER);
                replacements += 1;
            }
            in_invalid_run = true;
        }
    }

    (Cow::Owned(out), replacements)
}

/// Incremental form of [`sanitize_utf8`] for input that arrives in pieces.
///
/// A character split between two pieces is held back until the rest of it
/// arrives, and an invalid run that spans pieces still becomes one U+FFFD.
#[derive(Debug, Default)]
pub struct Utf8Decoder {
    text: String,
    pending: Vec<u8>,
    in_invalid_run: bool,
    replacements: usize,
}

impl Utf8Decoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode the next piece of input.
    pub fn push(&mut self, bytes: &[u8]) {
        self.pending.extend_from_slice(bytes);
        let complete = self.pending.len() - incomplete_tail(&self.pending);

        for chunk in self.pending[..complete].utf8_chunks() {
            let valid = chunk.valid();
            if !valid.is_empty() {
                self.text.push_str(valid);
                self.in_invalid_run = false;
            }
            if !chunk.invalid().is_empty() {
                if !self.in_invalid_run {
                    self.text.push(char::REPLACEMENT_CHARACTER);
                    self.replacements += 1;
                }
                self.in_invalid_run = true;
            }
        }
        self.pending.drain(..complete);
    }

    /// Byte length of the text decoded so far.
    pub fn len(&self) -> usize {
        self.text.len()
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty() && self.pending.is_empty()
    }

    /// End of input. A character still waiting for its remaining bytes is
    /// replaced. Returns the text and the number of replacements made.
    pub fn finish(mut self) -> (String, usize) {
        if !self.pending.is_empty() && !self.in_invalid_run {
            self.text.push(char::REPLACEMENT_CHARACTER);
            self.replacements += 1;
        }
        (self.text, self.replacements)
    }
}

/// Length of the trailing bytes that start a character but do not finish it.
fn incomplete_tail(bytes: &[u8]) -> usize {
    (1..=bytes.len().min(3))
        .find(|&k| {
            matches!(
                std::str::from_utf8(&bytes[bytes.len() - k..]),
                Err(e) if e.valid_up_to() == 0 && e.error_len().is_none()
            )
        })
        .unwrap_or(0)
}

/// Sanitize `bytes`, reporting a warning when anything had to be replaced.
pub fn sanitize<'a>(
    bytes: &'a [u8],
    subject: Subject,
    diagnostics: &dyn DiagnosticSink,
) -> Cow<'a, str> {
    let (text, replacements) = sanitize_utf8(bytes);
    if replacements > 0 {
        diagnostics.warn(Warning::InvalidUtf8 {
            subject,
            replacements,
        });
    }
    text
}

/// Longest prefix of `s` that is at most `max_bytes` long and ends on a
/// character boundary.
pub fn truncate_to_bytes(s: &str, max_bytes: usize) -> &str {
    if s.len() <= max_bytes {
        return s;
    }
    let mut end = max_bytes;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}
