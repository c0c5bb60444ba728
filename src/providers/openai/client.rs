use std::path::{Path, PathBuf};

use futures_util::StreamExt;
use reqwest::Client;
use tokio::sync::OnceCell;
use tracing::{debug, warn};

use super::types::{
    ChatCompletionChunk, ChatCompletionRequest, ChatCompletionResponse, CredentialsFile, ModelList,
};
use crate::provider::{Provider, TokenSink};
use crate::providers::{cancellable, check_status, http_client};
use crate::sse_stream::SseStreamExt;
use crate::{Error, Message, Profile};

/// Provider for OpenAI and OpenAI-compatible Chat Completions endpoints.
pub struct OpenAIProvider {
    client: Client,
    endpoint: String,
    model: String,
    api_key: Option<String>,
    credentials_file: Option<PathBuf>,
    /// Set when `model` is a comma separated priority list to be matched
    /// against the server's `/v1/models`; holds the pick once made.
    discovered_model: Option<OnceCell<String>>,
}

impl OpenAIProvider {
    pub const BACKEND: &'static str = "openai";
    /// The same binding with model discovery turned on.
    pub const DISCOVERY_BACKEND: &'static str = "openai2";
    pub const DEFAULT_ENDPOINT: &'static str = "https://api.openai.com/v1/chat/completions";
    /// Priority list entry that accepts the first model the server offers.
    pub const AUTO_MODEL: &'static str = "auto";

    /// Create a provider against the public OpenAI endpoint.
    pub fn new(model: impl Into<String>, api_key: Option<String>) -> Result<Self, Error> {
        Self::new_with_endpoint(model, api_key, Self::DEFAULT_ENDPOINT)
    }

    /// Create a provider against a compatible server.
    pub fn new_with_endpoint(
        model: impl Into<String>,
        api_key: Option<String>,
        endpoint: impl Into<String>,
    ) -> Result<Self, Error> {
        Ok(Self {
            client: http_client()?,
            endpoint: endpoint.into(),
            model: model.into(),
            api_key,
            credentials_file: None,
            discovered_model: None,
        })
    }

    /// Build from a profile. The public endpoint needs a key from either the
    /// profile or a credentials file; compatible servers may run without one.
    pub fn from_profile(profile: &Profile) -> Result<Self, Error> {
        if profile.model.trim().is_empty() {
            return Err(Error::config("Model required for OpenAI provider"));
        }
        let endpoint = profile.endpoint_or(Self::DEFAULT_ENDPOINT);
        let credentials_file = profile.credentials.credentials_path()?;
        let api_key = profile
            .credentials
            .api_key
            .clone()
            .filter(|key| !key.trim().is_empty());

        if endpoint == Self::DEFAULT_ENDPOINT && api_key.is_none() && credentials_file.is_none() {
            return Err(Error::config(
                "OpenAI provider requires either api_key or credentials_file when using the default endpoint",
            ));
        }

        let mut provider = Self::new_with_endpoint(profile.model.clone(), api_key, endpoint)?;
        provider.credentials_file = credentials_file;
        Ok(provider)
    }

    /// Treat the model setting as a priority list such as `gpt-4o,auto` and
    /// pick the first entry the server lists. `auto` takes the server's first
    /// model.
    pub fn with_model_discovery(mut self) -> Self {
        self.discovered_model = Some(OnceCell::new());
        self
    }

    /// Read the API key from a JSON credentials file on each request.
    pub fn with_credentials_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.credentials_file = Some(path.into());
        self
    }

    /// The bearer key to send, if any. A credentials file wins over an inline key.
    async fn api_key(&self) -> Result<Option<String>, Error> {
        match &self.credentials_file {
            Some(path) => load_api_key(path).await.map(Some),
            None => Ok(self.api_key.clone()),
        }
    }

    /// The model to request, resolving the priority list on first use.
    async fn model(&self) -> Result<&str, Error> {
        let Some(cell) = &self.discovered_model else {
            return Ok(self.model.as_str());
        };
        let model = cell
            .get_or_try_init(|| async {
                let available = match self.available_models().await {
                    Ok(models) => Some(models),
                    Err(e) => {
                        warn!(error = %e, "model list unavailable, using the first named model");
                        None
                    }
                };
                pick_model(&self.model, available.as_deref())
            })
            .await?;
        Ok(model.as_str())
    }

    /// `/v1/models` on the same server as the chat endpoint.
    fn models_endpoint(&self) -> String {
        let base = self.endpoint.trim_end_matches('/');
        let base = base.strip_suffix("/v1/chat/completions").unwrap_or(base);
        let base = base.strip_suffix("/v1").unwrap_or(base);
        format!("{base}/v1/models")
    }

    async fn available_models(&self) -> Result<Vec<String>, Error> {
        let endpoint = self.models_endpoint();
        debug!(%endpoint, "listing models");

        let mut request = self.client.get(&endpoint);
        if let Some(key) = self.api_key().await? {
            request = request.bearer_auth(key);
        }
        let response = check_status(self.name(), request.send().await?).await?;
        let list: ModelList = serde_json::from_slice(&response.bytes().await?)?;
        Ok(list.data.into_iter().map(|model| model.id).collect())
    }

    async fn post(&self, system: &str, user: &str, stream: bool) -> Result<reqwest::Response, Error> {
        let model = self.model().await?;
        let body = ChatCompletionRequest {
            model,
            messages: Message::conversation(system, user),
            stream,
        };
        debug!(endpoint = %self.endpoint, model, stream, "sending OpenAI request");

        let mut request = self.client.post(&self.endpoint).json(&body);
        if let Some(key) = self.api_key().await? {
            request = request.bearer_auth(key);
        }
        let response = request.send().await?;
        check_status(self.name(), response).await
    }

    /// Text carried by one streamed payload, or the error it reports.
    fn delta(data: &str) -> Result<Option<String>, Error> {
        let chunk: ChatCompletionChunk = match serde_json::from_str(data) {
            Ok(chunk) => chunk,
            Err(e) => {
                debug!(error = %e, "skipping unparseable stream payload");
                return Ok(None);
            }
        };
        if let Some(error) = chunk.error {
            let message = error
                .get("message")
                .and_then(|message| message.as_str())
                .map(str::to_string)
                .unwrap_or_else(|| error.to_string());
            return Err(Error::provider(Self::BACKEND, message));
        }
        Ok(chunk
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.delta.content))
    }
}

/// First entry of `priority` (comma separated) found in `available`; `auto`
/// matches the first available model. Without a model list the first named
/// entry is used as is.
fn pick_model(priority: &str, available: Option<&[String]>) -> Result<String, Error> {
    let candidates = || {
        priority
            .split(',')
            .map(str::trim)
            .filter(|candidate| !candidate.is_empty())
    };

    let picked = match available {
        Some(available) => candidates().find_map(|candidate| {
            if candidate == OpenAIProvider::AUTO_MODEL {
                available.first().cloned()
            } else {
                available
                    .iter()
                    .any(|model| model == candidate)
                    .then(|| candidate.to_string())
            }
        }),
        None => candidates()
            .find(|candidate| *candidate != OpenAIProvider::AUTO_MODEL)
            .map(str::to_string),
    };

    picked.ok_or_else(|| {
        Error::config(format!(
            "could not resolve a valid model from the priority list: [{priority}]"
        ))
    })
}

async fn load_api_key(path: &Path) -> Result<String, Error> {
    let what = format!("credentials file {}", path.display());
    let bytes = tokio::fs::read(path)
        .await
        .map_err(|e| Error::auth(format!("failed to read {what}: {e}")))?;
    let credentials: CredentialsFile = serde_json::from_slice(&bytes)
        .map_err(|e| Error::auth(format!("failed to parse {what}: {e}")))?;
    if credentials.openai_api_key.is_empty() {
        return Err(Error::auth(format!("openai_api_key is missing in {what}")));
    }
    Ok(credentials.openai_api_key)
}

#[async_trait::async_trait]
impl Provider for OpenAIProvider {
    fn name(&self) -> &str {
        if self.discovered_model.is_some() {
            Self::DISCOVERY_BACKEND
        } else {
            Self::BACKEND
        }
    }

    async fn chat(&self, system: &str, user: &str) -> Result<String, Error> {
        let response = self.post(system, user, false).await?;
        let bytes = response.bytes().await?;
        let completion: ChatCompletionResponse = serde_json::from_slice(&bytes)?;
        let choice = completion
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| Error::provider(self.name(), "no choices returned"))?;
        Ok(choice.message.content.unwrap_or_default())
    }

    async fn chat_stream(&self, system: &str, user: &str, sink: TokenSink) -> Result<(), Error> {
        let response = cancellable(&sink, self.post(system, user, true)).await??;
        let mut events = response.bytes_stream().sse_events();

        while let Some(event) = cancellable(&sink, events.next()).await? {
            let event = event?;
            if event.is_done() {
                break;
            }
            if let Some(text) = Self::delta(&event.data)? {
                sink.send(text).await?;
            }
        }
        Ok(())
    }
}
