//! Offline providers: an echoing mock and a scripted test double.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::provider::{Provider, TokenSink};
use crate::text::sanitize_utf8;
use crate::{Error, Token};

/// Echoes both prompts back inside a fixed frame. Needs no network.
#[derive(Debug, Default, Clone)]
pub struct MockProvider;

impl MockProvider {
    pub const BACKEND: &'static str = "mock";

    pub fn new() -> Self {
        Self
    }

    pub fn render(system: &str, user: &str) -> String {
        format!(
            "\n--- Mock Response ---\nSystem Prompt: {system}\nUser Prompt: {user}\n---------------------\n"
        )
    }
}

#[async_trait::async_trait]
impl Provider for MockProvider {
    fn name(&self) -> &str {
        Self::BACKEND
    }

    async fn chat(&self, system: &str, user: &str) -> Result<String, Error> {
        Ok(Self::render(system, user))
    }

    async fn chat_stream(&self, system: &str, user: &str, sink: TokenSink) -> Result<(), Error> {
        sink.send(Self::render(system, user)).await
    }
}

/// Replays a fixed list of tokens, optionally ending with an error.
///
/// Counts every token the consumer accepted, which makes it handy for
/// checking backpressure and cancellation.
#[derive(Debug, Clone)]
pub struct ScriptedProvider {
    tokens: Vec<Token>,
    failure: Option<String>,
    delay: Option<Duration>,
    repeat: bool,
    sent: Arc<AtomicUsize>,
}

impl ScriptedProvider {
    pub const BACKEND: &'static str = "scripted";

    pub fn new<I, T>(tokens: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<Token>,
    {
        Self {
            tokens: tokens.into_iter().map(Into::into).collect(),
            failure: None,
            delay: None,
            repeat: false,
            sent: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Return a provider error once the script has been sent.
    pub fn failing_with(mut self, message: impl Into<String>) -> Self {
        self.failure = Some(message.into());
        self
    }

    /// Pause before each token.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Cycle through the script until cancelled.
    pub fn repeating(mut self) -> Self {
        self.repeat = true;
        self
    }

    /// Shared count of tokens handed to the consumer.
    pub fn sent(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.sent)
    }

    fn finish(&self) -> Result<(), Error> {
        match &self.failure {
            Some(message) => Err(Error::provider(Self::BACKEND, message.clone())),
            None => Ok(()),
        }
    }
}

#[async_trait::async_trait]
impl Provider for ScriptedProvider {
    fn name(&self) -> &str {
        Self::BACKEND
    }

    async fn chat(&self, _system: &str, _user: &str) -> Result<String, Error> {
        self.finish()?;
        let bytes: Vec<u8> = self
            .tokens
            .iter()
            .flat_map(|token| token.as_bytes().iter().copied())
            .collect();
        Ok(sanitize_utf8(&bytes).0.into_owned())
    }

    async fn chat_stream(&self, _system: &str, _user: &str, sink: TokenSink) -> Result<(), Error> {
        if self.tokens.is_empty() {
            return self.finish();
        }

        loop {
            for token in &self.tokens {
                if let Some(delay) = self.delay {
                    tokio::select! {
                        _ = sink.cancelled() => return Err(Error::Cancelled),
                        _ = tokio::time::sleep(delay) => {}
                    }
                }
                sink.send(token.clone()).await?;
                self.sent.fetch_add(1, Ordering::SeqCst);
            }
            if !self.repeat {
                break;
            }
        }

        self.finish()
    }
}
