//! Backend bindings implementing [`Provider`](crate::Provider).

pub mod bedrock;
pub mod mock;
pub mod ollama;
pub mod openai;
pub mod vertex;

pub use bedrock::{BedrockAuth, NovaProvider};
pub use mock::{MockProvider, ScriptedProvider};
pub use ollama::OllamaProvider;
pub use openai::OpenAIProvider;
pub use vertex::{VertexAuth, VertexProvider};

use std::future::Future;
use std::time::Duration;

use reqwest::Client;

use crate::provider::TokenSink;
use crate::Error;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// HTTP client shared by the network bindings.
///
/// Only connecting is bounded; a long stream may legitimately run for minutes.
pub(crate) fn http_client() -> Result<Client, Error> {
    Ok(Client::builder().connect_timeout(CONNECT_TIMEOUT).build()?)
}

/// Turn a non-success status into a provider error carrying the body.
pub(crate) async fn check_status(
    provider: &str,
    response: reqwest::Response,
) -> Result<reqwest::Response, Error> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(Error::provider(
        provider,
        format!("API request failed with status {status}: {body}"),
    ))
}

/// Await `future` unless the sink's run is cancelled first.
pub(crate) async fn cancellable<F: Future>(sink: &TokenSink, future: F) -> Result<F::Output, Error> {
    tokio::select! {
        biased;
        _ = sink.cancelled() => Err(Error::Cancelled),
        output = future => Ok(output),
    }
}
