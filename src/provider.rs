use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::{Error, Token};

/// A backend that turns a system prompt and a user prompt into text.
///
/// `system` may be empty, in which case no system message is sent.
#[async_trait::async_trait]
pub trait Provider: Send + Sync + 'static {
    /// Short backend name used in logs and errors.
    fn name(&self) -> &str;

    /// Produce the whole response in one piece.
    async fn chat(&self, system: &str, user: &str) -> Result<String, Error>;

    /// Produce the response as a sequence of tokens pushed into `sink`.
    ///
    /// Returning `Ok(())` means the backend finished normally. Implementations
    /// must stop promptly once the sink reports cancellation.
    async fn chat_stream(&self, system: &str, user: &str, sink: TokenSink) -> Result<(), Error>;
}

/// Producer half of the token channel handed to [`Provider::chat_stream`].
///
/// The channel holds a single token, so a producer is suspended until the
/// consumer has taken the previous one.
#[derive(Debug, Clone)]
pub struct TokenSink {
    tx: mpsc::Sender<Token>,
    cancel: CancellationToken,
}

impl TokenSink {
    /// Create a sink and the receiver that drains it.
    pub fn channel(cancel: CancellationToken) -> (Self, mpsc::Receiver<Token>) {
        let (tx, rx) = mpsc::channel(1);
        (Self { tx, cancel }, rx)
    }

    /// Hand one token to the consumer, waiting for room.
    ///
    /// Fails with [`Error::Cancelled`] when the run was cancelled or the
    /// consumer went away.
    pub async fn send(&self, token: impl Into<Token>) -> Result<(), Error> {
        let token = token.into();
        if token.is_empty() {
            return Ok(());
        }
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(Error::Cancelled),
            sent = self.tx.send(token) => sent.map_err(|_| Error::Cancelled),
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled() || self.tx.is_closed()
    }

    /// Resolves once the run is cancelled.
    pub async fn cancelled(&self) {
        self.cancel.cancelled().await
    }
}
