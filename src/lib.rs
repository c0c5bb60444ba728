//! Size-bounded prompt/response pipeline over interchangeable LLM backends.
//!
//! Prompts are resolved from inline values, files or standard input, checked
//! against byte ceilings, and sent to a backend chosen by name from a
//! [`ProviderRegistry`]. Answers come back either in one piece or as a
//! backpressured, cancellable token stream that is cut or rejected at the
//! response ceiling.

pub mod diagnostics;
pub mod error;
pub mod limits;
pub mod ndjson;
pub mod pipeline;
pub mod prompt;
pub mod provider;
pub mod providers;
pub mod registry;
pub mod render;
pub mod sse_stream;
pub mod streaming;
pub mod text;
pub mod types;

// Re-export core types for easy usage
pub use diagnostics::{DiagnosticSink, MemoryDiagnostics, Subject, TracingDiagnostics, Warning};
pub use error::{Error, ErrorKind, LimitKind};
pub use limits::{check_and_apply, LimitDecision, LimitPolicy};
pub use pipeline::{Invocation, Pipeline, PreparedCall, RunSummary};
pub use prompt::{PromptResolver, PromptRole, PromptSource, PromptSources, ResolvedPrompts, Stdin};
pub use provider::{Provider, TokenSink};
pub use providers::*;
pub use registry::ProviderRegistry;
pub use render::render_response;
pub use sse_stream::SseEvent;
pub use streaming::{StreamCoordinator, StreamSummary};
pub use text::{sanitize_utf8, truncate_to_bytes, Utf8Decoder};
pub use types::*;
