//! Types for streaming responses.

use bytes::Bytes;

use crate::Error;

/// One chunk of streamed response text as produced by a backend.
///
/// Tokens are raw bytes: a backend may split a multi-byte character across
/// chunks or forward invalid data, and the consumer sanitizes each token
/// before it is counted or shown.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token(Bytes);

impl Token {
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<String> for Token {
    fn from(text: String) -> Self {
        Token(Bytes::from(text))
    }
}

impl From<&'static str> for Token {
    fn from(text: &'static str) -> Self {
        Token(Bytes::from_static(text.as_bytes()))
    }
}

impl From<Vec<u8>> for Token {
    fn from(bytes: Vec<u8>) -> Self {
        Token(Bytes::from(bytes))
    }
}

impl From<Bytes> for Token {
    fn from(bytes: Bytes) -> Self {
        Token(bytes)
    }
}

/// Terminal state of a streaming call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamOutcome {
    /// The backend finished and every token was forwarded.
    Completed,
    /// Output was cut at the response ceiling under `warn` mode.
    Truncated,
    /// The call ended with an error other than cancellation.
    StoppedByError,
    /// The call was cancelled.
    Cancelled,
}

impl StreamOutcome {
    /// Classify the result of a finished call.
    pub fn of<T>(result: &Result<T, Error>, truncated: impl FnOnce(&T) -> bool) -> Self {
        match result {
            Ok(value) if truncated(value) => StreamOutcome::Truncated,
            Ok(_) => StreamOutcome::Completed,
            Err(Error::Cancelled) => StreamOutcome::Cancelled,
            Err(_) => StreamOutcome::StoppedByError,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_keeps_raw_bytes() {
        let token = Token::from(vec![b'a', 0xFF]);
        assert_eq!(token.as_bytes(), &[b'a', 0xFF]);
        assert_eq!(token.len(), 2);
        assert!(!Token::from("x").is_empty());
    }

    #[test]
    fn test_outcome_classification() {
        let ok: Result<bool, Error> = Ok(false);
        assert_eq!(StreamOutcome::of(&ok, |t| *t), StreamOutcome::Completed);

        let cut: Result<bool, Error> = Ok(true);
        assert_eq!(StreamOutcome::of(&cut, |t| *t), StreamOutcome::Truncated);

        let cancelled: Result<bool, Error> = Err(Error::Cancelled);
        assert_eq!(
            StreamOutcome::of(&cancelled, |t| *t),
            StreamOutcome::Cancelled
        );

        let failed: Result<bool, Error> = Err(Error::provider("ollama", "down"));
        assert_eq!(
            StreamOutcome::of(&failed, |t| *t),
            StreamOutcome::StoppedByError
        );
    }
}
