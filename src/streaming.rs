//! Runs a provider's streaming call in the background and relays its tokens
//! to an async writer under the response ceiling.

use std::sync::Arc;

use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::diagnostics::{DiagnosticSink, Subject, Warning};
use crate::limits::{byte_budget, LimitPolicy};
use crate::prompt::ResolvedPrompts;
use crate::provider::{Provider, TokenSink};
use crate::text::{sanitize, truncate_to_bytes};
use crate::{Error, Limits};

/// What a finished stream produced.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StreamSummary {
    /// Bytes written to the output, including the trailing newline.
    pub bytes_written: u64,
    /// Output was cut at the response ceiling.
    pub truncated: bool,
}

/// How the foreground loop ended.
enum LoopEnd {
    /// The provider closed its side.
    Drained,
    /// The caller cancelled the run.
    Interrupted,
    /// Output reached the ceiling under `warn`.
    Truncated,
    /// A limit or write failure ended the run.
    Stopped(Error),
}

/// Relays streamed responses from a provider task to a writer, checking the
/// response ceiling token by token.
pub struct StreamCoordinator {
    policy: LimitPolicy,
    diagnostics: Arc<dyn DiagnosticSink>,
    cancel: CancellationToken,
}

impl StreamCoordinator {
    pub fn new(limits: &Limits, diagnostics: Arc<dyn DiagnosticSink>) -> Self {
        Self {
            policy: limits.output_policy(),
            diagnostics,
            cancel: CancellationToken::new(),
        }
    }

    /// Tie runs to `parent`; cancelling it cancels any run in progress.
    pub fn with_cancellation(mut self, parent: &CancellationToken) -> Self {
        self.cancel = parent.child_token();
        self
    }

    /// Stream one response from `provider` into `out`.
    ///
    /// The provider runs as a separate task and hands tokens over one at a
    /// time. The task is always joined before the result is reported.
    pub async fn run<W>(
        &self,
        provider: Arc<dyn Provider>,
        prompts: ResolvedPrompts,
        out: &mut W,
    ) -> Result<StreamSummary, Error>
    where
        W: AsyncWrite + Unpin + ?Sized,
    {
        let cancel = self.cancel.child_token();
        let (sink, mut rx) = TokenSink::channel(cancel.clone());
        let backend = provider.name().to_string();

        debug!(%backend, limit = self.policy.ceiling, "starting stream");
        let task = tokio::spawn(async move {
            provider
                .chat_stream(&prompts.system, &prompts.user, sink)
                .await
        });

        let mut written = 0u64;
        let end = loop {
            let token = tokio::select! {
                biased;
                _ = cancel.cancelled() => break LoopEnd::Interrupted,
                token = rx.recv() => match token {
                    Some(token) => token,
                    None => break LoopEnd::Drained,
                },
            };

            let text = sanitize(token.as_bytes(), Subject::Response, &*self.diagnostics);
            let decision = self.policy.check(written, text.len() as u64);
            if decision.must_stop {
                break LoopEnd::Stopped(self.policy.exceeded(written + text.len() as u64));
            }

            let emit: &str = if decision.exceeded {
                truncate_to_bytes(&text, byte_budget(decision.allowed))
            } else {
                &*text
            };
            if let Err(e) = write_flushed(out, emit.as_bytes()).await {
                break LoopEnd::Stopped(Error::io("response output", e));
            }
            written += emit.len() as u64;

            if decision.exceeded {
                self.diagnostics.warn(Warning::Truncated {
                    subject: Subject::Response,
                    limit: self.policy.ceiling,
                    kept: written,
                });
                break LoopEnd::Truncated;
            }
        };

        if !matches!(end, LoopEnd::Drained) {
            cancel.cancel();
        }
        drop(rx);

        let task_result = task
            .await
            .unwrap_or_else(|e| Err(Error::streaming(format!("{backend} stream task failed: {e}"))));
        debug!(%backend, written, ok = task_result.is_ok(), "stream task joined");

        match end {
            LoopEnd::Stopped(error) => Err(error),
            LoopEnd::Truncated => Ok(StreamSummary {
                bytes_written: written,
                truncated: true,
            }),
            LoopEnd::Interrupted => Err(task_result.err().unwrap_or(Error::Cancelled)),
            LoopEnd::Drained => {
                task_result?;
                write_flushed(out, b"\n")
                    .await
                    .map_err(|e| Error::io("response output", e))?;
                Ok(StreamSummary {
                    bytes_written: written + 1,
                    truncated: false,
                })
            }
        }
    }
}

async fn write_flushed<W>(out: &mut W, bytes: &[u8]) -> std::io::Result<()>
where
    W: AsyncWrite + Unpin + ?Sized,
{
    if bytes.is_empty() {
        return Ok(());
    }
    out.write_all(bytes).await?;
    out.flush().await
}
