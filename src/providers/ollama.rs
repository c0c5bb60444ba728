use futures_util::StreamExt;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{cancellable, check_status, http_client};
use crate::ndjson::NdjsonStreamExt;
use crate::provider::{Provider, TokenSink};
use crate::{Error, Message, Profile};

/// Request body for the Ollama chat API.
#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<Message>,
    stream: bool,
}

/// One response object; streaming sends one per line.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ChatChunk {
    message: Option<ChunkMessage>,
    done: bool,
    error: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ChunkMessage {
    content: String,
}

/// Provider for a local Ollama server.
pub struct OllamaProvider {
    client: Client,
    endpoint: String,
    model: String,
}

impl OllamaProvider {
    pub const BACKEND: &'static str = "ollama";
    pub const DEFAULT_ENDPOINT: &'static str = "http://localhost:11434/api/chat";

    pub fn new(model: impl Into<String>, endpoint: impl Into<String>) -> Result<Self, Error> {
        Ok(Self {
            client: http_client()?,
            endpoint: endpoint.into(),
            model: model.into(),
        })
    }

    pub fn from_profile(profile: &Profile) -> Result<Self, Error> {
        if profile.model.trim().is_empty() {
            return Err(Error::config("Model required for Ollama provider"));
        }
        Self::new(
            profile.model.clone(),
            profile.endpoint_or(Self::DEFAULT_ENDPOINT),
        )
    }

    async fn post(&self, system: &str, user: &str, stream: bool) -> Result<reqwest::Response, Error> {
        let body = ChatRequest {
            model: &self.model,
            messages: Message::conversation(system, user),
            stream,
        };
        debug!(endpoint = %self.endpoint, model = %self.model, stream, "sending Ollama request");

        let response = self.client.post(&self.endpoint).json(&body).send().await?;
        check_status(Self::BACKEND, response).await
    }

    fn decode(bytes: &[u8]) -> Result<ChatChunk, Error> {
        let chunk: ChatChunk = serde_json::from_slice(bytes).map_err(|e| {
            Error::provider(Self::BACKEND, format!("Failed to decode response: {e}"))
        })?;
        match chunk.error {
            Some(message) => Err(Error::provider(Self::BACKEND, message)),
            None => Ok(chunk),
        }
    }
}

#[async_trait::async_trait]
impl Provider for OllamaProvider {
    fn name(&self) -> &str {
        Self::BACKEND
    }

    async fn chat(&self, system: &str, user: &str) -> Result<String, Error> {
        let response = self.post(system, user, false).await?;
        let bytes = response.bytes().await?;
        let chunk = Self::decode(&bytes)?;
        Ok(chunk.message.map(|message| message.content).unwrap_or_default())
    }

    async fn chat_stream(&self, system: &str, user: &str, sink: TokenSink) -> Result<(), Error> {
        let response = cancellable(&sink, self.post(system, user, true)).await??;
        let mut lines = response.bytes_stream().ndjson_lines();

        while let Some(line) = cancellable(&sink, lines.next()).await? {
            let chunk = Self::decode(&line?)?;
            if let Some(message) = chunk.message {
                sink.send(message.content).await?;
            }
            if chunk.done {
                break;
            }
        }
        Ok(())
    }
}
