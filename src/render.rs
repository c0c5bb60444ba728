//! Final shaping of a buffered (non-streaming) response.

use crate::diagnostics::{DiagnosticSink, Subject};
use crate::text::sanitize;
use crate::{Error, Limits};

/// Sanitize a complete response and apply the response ceiling to it once.
///
/// Under `stop` an oversized response is discarded in full.
pub fn render_response(
    raw: impl AsRef<[u8]>,
    limits: &Limits,
    diagnostics: &dyn DiagnosticSink,
) -> Result<String, Error> {
    let text = sanitize(raw.as_ref(), Subject::Response, diagnostics).into_owned();
    limits
        .output_policy()
        .enforce(text, Subject::Response, diagnostics)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::{MemoryDiagnostics, Warning};
    use crate::error::LimitKind;
    use crate::LimitMode;

    fn limits(max: u64, mode: LimitMode) -> Limits {
        Limits {
            enabled: true,
            on_output_exceeded: mode,
            max_response_size_bytes: max,
            ..Limits::default()
        }
    }

    #[test]
    fn test_fits() {
        let diagnostics = MemoryDiagnostics::new();
        let text = render_response("héllo", &limits(6, LimitMode::Stop), &diagnostics).unwrap();
        assert_eq!(text, "héllo");
        assert!(diagnostics.is_empty());
    }

    #[test]
    fn test_warn_cuts_on_character_boundary() {
        let diagnostics = MemoryDiagnostics::new();

        let text = render_response("héllo", &limits(3, LimitMode::Warn), &diagnostics).unwrap();
        assert_eq!(text, "hé");

        // 2 bytes would split 'é', so only 'h' survives.
        let text = render_response("héllo", &limits(2, LimitMode::Warn), &diagnostics).unwrap();
        assert_eq!(text, "h");

        assert_eq!(
            diagnostics.warnings(),
            vec![
                Warning::Truncated { subject: Subject::Response, limit: 3, kept: 3 },
                Warning::Truncated { subject: Subject::Response, limit: 2, kept: 1 },
            ]
        );
    }

    #[test]
    fn test_stop_discards_whole_response() {
        let diagnostics = MemoryDiagnostics::new();
        let error = render_response("héllo", &limits(5, LimitMode::Stop), &diagnostics).unwrap_err();
        assert!(matches!(
            error,
            Error::LimitExceeded { kind: LimitKind::Response, size: 6, limit: 5 }
        ));
    }

    #[test]
    fn test_sanitizes_before_measuring() {
        // One invalid byte becomes a 3 byte replacement character.
        let diagnostics = MemoryDiagnostics::new();
        let error = render_response(b"ab\xFF", &limits(4, LimitMode::Stop), &diagnostics).unwrap_err();
        assert!(matches!(error, Error::LimitExceeded { size: 5, .. }));
        assert!(matches!(diagnostics.warnings()[0], Warning::InvalidUtf8 { .. }));
    }

    #[test]
    fn test_disabled() {
        let diagnostics = MemoryDiagnostics::new();
        let disabled = Limits { max_response_size_bytes: 1, ..Limits::disabled() };
        assert_eq!(render_response("héllo", &disabled, &diagnostics).unwrap(), "héllo");
    }
}
