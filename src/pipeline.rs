//! One invocation end to end: limits, prompts, provider, output.

use std::io::Read;
use std::sync::Arc;

use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::diagnostics::{DiagnosticSink, TracingDiagnostics};
use crate::prompt::{PromptResolver, PromptSources, ResolvedPrompts, Stdin};
use crate::registry::ProviderRegistry;
use crate::render::render_response;
use crate::streaming::StreamCoordinator;
use crate::{Error, LimitOverrides, Limits, Profile, Provider, StreamOutcome};

/// Everything the caller decided for one run.
#[derive(Debug, Clone, Default)]
pub struct Invocation {
    pub profile: Profile,
    pub overrides: LimitOverrides,
    pub system: PromptSources,
    pub user: PromptSources,
    pub stream: bool,
}

impl Invocation {
    pub fn new(profile: Profile) -> Self {
        Self {
            profile,
            ..Self::default()
        }
    }

    pub fn with_system(mut self, sources: PromptSources) -> Self {
        self.system = sources;
        self
    }

    pub fn with_user(mut self, sources: PromptSources) -> Self {
        self.user = sources;
        self
    }

    pub fn with_overrides(mut self, overrides: LimitOverrides) -> Self {
        self.overrides = overrides;
        self
    }

    pub fn streaming(mut self, stream: bool) -> Self {
        self.stream = stream;
        self
    }
}

/// A run whose inputs are settled and whose provider is built, but which has
/// not touched the network yet.
pub struct PreparedCall {
    provider: Arc<dyn Provider>,
    prompts: ResolvedPrompts,
    limits: Limits,
    stream: bool,
}

impl PreparedCall {
    pub fn prompts(&self) -> &ResolvedPrompts {
        &self.prompts
    }

    /// Limits in force, after defaults and overrides.
    pub fn limits(&self) -> &Limits {
        &self.limits
    }

    pub fn backend(&self) -> &str {
        self.provider.name()
    }
}

/// Result of a successful run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunSummary {
    pub outcome: StreamOutcome,
    pub bytes_written: u64,
}

/// Resolves prompts and a provider for each invocation, then runs the call.
pub struct Pipeline {
    registry: Arc<ProviderRegistry>,
    diagnostics: Arc<dyn DiagnosticSink>,
}

impl Pipeline {
    /// A pipeline reporting warnings through `tracing`.
    pub fn new(registry: ProviderRegistry) -> Self {
        Self {
            registry: Arc::new(registry),
            diagnostics: Arc::new(TracingDiagnostics),
        }
    }

    pub fn with_diagnostics(mut self, diagnostics: Arc<dyn DiagnosticSink>) -> Self {
        self.diagnostics = diagnostics;
        self
    }

    /// Settle limits and prompts and build the provider. No network I/O.
    pub fn prepare<R: Read>(
        &self,
        invocation: Invocation,
        stdin: Stdin<R>,
    ) -> Result<PreparedCall, Error> {
        let limits = invocation
            .profile
            .limits
            .or_default()
            .with_overrides(&invocation.overrides);
        limits.validate()?;

        let mut resolver = PromptResolver::new(stdin, &limits, &*self.diagnostics);
        let prompts = resolver.resolve_pair(&invocation.system, &invocation.user)?;
        let provider = self.registry.resolve(&invocation.profile)?;

        debug!(
            backend = provider.name(),
            system_bytes = prompts.system.len(),
            user_bytes = prompts.user.len(),
            stream = invocation.stream,
            "prepared call"
        );
        Ok(PreparedCall {
            provider,
            prompts,
            limits,
            stream: invocation.stream,
        })
    }

    /// Send the prepared call and write the answer to `out`.
    pub async fn execute<W>(
        &self,
        call: PreparedCall,
        out: &mut W,
        cancel: &CancellationToken,
    ) -> Result<RunSummary, Error>
    where
        W: AsyncWrite + Unpin + ?Sized,
    {
        let backend = call.provider.name().to_string();
        let result = if call.stream {
            self.execute_streaming(call, out, cancel).await
        } else {
            self.execute_buffered(call, out, cancel).await
        };

        let outcome = StreamOutcome::of(&result, |summary| {
            summary.outcome == StreamOutcome::Truncated
        });
        debug!(%backend, ?outcome, "call finished");
        result
    }

    /// [`prepare`](Self::prepare) then [`execute`](Self::execute).
    pub async fn run<R, W>(
        &self,
        invocation: Invocation,
        stdin: Stdin<R>,
        out: &mut W,
        cancel: &CancellationToken,
    ) -> Result<RunSummary, Error>
    where
        R: Read,
        W: AsyncWrite + Unpin + ?Sized,
    {
        let call = self.prepare(invocation, stdin)?;
        self.execute(call, out, cancel).await
    }

    async fn execute_streaming<W>(
        &self,
        call: PreparedCall,
        out: &mut W,
        cancel: &CancellationToken,
    ) -> Result<RunSummary, Error>
    where
        W: AsyncWrite + Unpin + ?Sized,
    {
        let coordinator = StreamCoordinator::new(&call.limits, Arc::clone(&self.diagnostics))
            .with_cancellation(cancel);
        let summary = coordinator.run(call.provider, call.prompts, out).await?;
        Ok(RunSummary {
            outcome: if summary.truncated {
                StreamOutcome::Truncated
            } else {
                StreamOutcome::Completed
            },
            bytes_written: summary.bytes_written,
        })
    }

    async fn execute_buffered<W>(
        &self,
        call: PreparedCall,
        out: &mut W,
        cancel: &CancellationToken,
    ) -> Result<RunSummary, Error>
    where
        W: AsyncWrite + Unpin + ?Sized,
    {
        let prompts = &call.prompts;
        let response = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(Error::Cancelled),
            response = call.provider.chat(&prompts.system, &prompts.user) => response?,
        };

        let text = render_response(&response, &call.limits, &*self.diagnostics)?;
        let truncated = text.len() < response.len();

        let mut bytes = text.into_bytes();
        if !truncated {
            bytes.push(b'\n');
        }
        out.write_all(&bytes)
            .await
            .map_err(|e| Error::io("response output", e))?;
        out.flush()
            .await
            .map_err(|e| Error::io("response output", e))?;

        Ok(RunSummary {
            outcome: if truncated {
                StreamOutcome::Truncated
            } else {
                StreamOutcome::Completed
            },
            bytes_written: bytes.len() as u64,
        })
    }
}
