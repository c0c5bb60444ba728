//! Side channel for non-fatal notices (replacement characters, truncation).

use std::fmt;
use std::sync::Mutex;

/// The piece of text a warning is about.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Subject {
    SystemPrompt,
    UserPrompt,
    Response,
}

impl fmt::Display for Subject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Subject::SystemPrompt => f.write_str("system prompt"),
            Subject::UserPrompt => f.write_str("user prompt"),
            Subject::Response => f.write_str("response"),
        }
    }
}

/// A non-fatal notice. The operation that raised it carried on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Warning {
    /// Invalid UTF-8 was replaced with U+FFFD.
    InvalidUtf8 { subject: Subject, replacements: usize },
    /// Text was cut to fit its byte ceiling.
    Truncated {
        subject: Subject,
        limit: u64,
        kept: u64,
    },
}

impl fmt::Display for Warning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Warning::InvalidUtf8 {
                subject,
                replacements,
            } => write!(
                f,
                "{subject} contained invalid UTF-8; {replacements} sequence(s) replaced with U+FFFD"
            ),
            Warning::Truncated {
                subject,
                limit,
                kept,
            } => write!(
                f,
                "{subject} exceeded the {limit} byte limit and was truncated to {kept} bytes"
            ),
        }
    }
}

/// Write-only destination for warnings, distinct from the error path.
pub trait DiagnosticSink: Send + Sync {
    fn warn(&self, warning: Warning);
}

/// Emits every warning as a `tracing` event.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingDiagnostics;

impl DiagnosticSink for TracingDiagnostics {
    fn warn(&self, warning: Warning) {
        tracing::warn!("{warning}");
    }
}

/// Keeps warnings in memory so the caller can inspect or print them later.
#[derive(Debug, Default)]
pub struct MemoryDiagnostics {
    warnings: Mutex<Vec<Warning>>,
}

impl MemoryDiagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the warnings recorded so far.
    pub fn warnings(&self) -> Vec<Warning> {
        self.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<Warning>> {
        // A poisoned lock still holds a usable list.
        self.warnings
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl DiagnosticSink for MemoryDiagnostics {
    fn warn(&self, warning: Warning) {
        self.lock().push(warning);
    }
}
