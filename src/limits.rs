//! Byte-ceiling decisions for prompts and responses.
//!
//! All sizes are byte counts of sanitized UTF-8 text, never character counts.

use crate::diagnostics::{DiagnosticSink, Subject, Warning};
use crate::error::LimitKind;
use crate::text::truncate_to_bytes;
use crate::{Error, LimitMode};

/// Outcome of checking one increment against a ceiling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LimitDecision {
    /// How many bytes of the increment may be emitted.
    pub allowed: u64,
    /// The ceiling was crossed by this increment.
    pub exceeded: bool,
    /// The caller must abort and emit nothing from this increment.
    pub must_stop: bool,
}

/// Decide how much of `increment` fits on top of `current` under `ceiling`.
pub fn check_and_apply(
    current: u64,
    increment: u64,
    ceiling: u64,
    enabled: bool,
    mode: LimitMode,
) -> LimitDecision {
    if !enabled || current.saturating_add(increment) <= ceiling {
        return LimitDecision {
            allowed: increment,
            exceeded: false,
            must_stop: false,
        };
    }

    match mode {
        LimitMode::Stop => LimitDecision {
            allowed: 0,
            exceeded: true,
            must_stop: true,
        },
        LimitMode::Warn => LimitDecision {
            allowed: ceiling.saturating_sub(current).min(increment),
            exceeded: true,
            must_stop: false,
        },
    }
}

/// One ceiling together with its switch and mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LimitPolicy {
    pub kind: LimitKind,
    pub enabled: bool,
    pub ceiling: u64,
    pub mode: LimitMode,
}

impl LimitPolicy {
    pub fn check(&self, current: u64, increment: u64) -> LimitDecision {
        check_and_apply(current, increment, self.ceiling, self.enabled, self.mode)
    }

    /// The error reported when `size` bytes overran this policy.
    pub fn exceeded(&self, size: u64) -> Error {
        Error::limit_exceeded(self.kind, size, self.ceiling)
    }

    /// Apply the policy once to a complete, already sanitized text.
    ///
    /// `stop` mode yields an error and drops the text; `warn` mode returns the
    /// byte-safe prefix and reports a truncation warning.
    pub fn enforce(
        &self,
        text: String,
        subject: Subject,
        diagnostics: &dyn DiagnosticSink,
    ) -> Result<String, Error> {
        let size = text.len() as u64;
        let decision = self.check(0, size);
        if decision.must_stop {
            return Err(self.exceeded(size));
        }
        if !decision.exceeded {
            return Ok(text);
        }

        let kept = truncate_to_bytes(&text, byte_budget(decision.allowed)).to_string();
        diagnostics.warn(Warning::Truncated {
            subject,
            limit: self.ceiling,
            kept: kept.len() as u64,
        });
        Ok(kept)
    }
}

/// Convert a byte allowance into an in-memory length.
pub(crate) fn byte_budget(allowed: u64) -> usize {
    usize::try_from(allowed).unwrap_or(usize::MAX)
}
