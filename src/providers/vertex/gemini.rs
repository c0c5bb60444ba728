use std::path::PathBuf;
use std::sync::Arc;

use futures_util::StreamExt;
use gcp_auth::{CustomServiceAccount, TokenProvider};
use reqwest::Client;
use tokio::sync::OnceCell;
use tracing::debug;

use super::gemini_types::{GeminiRequest, GeminiResponse};
use crate::provider::{Provider, TokenSink};
use crate::providers::{cancellable, check_status, http_client};
use crate::sse_stream::SseStreamExt;
use crate::{Error, Message, Profile};

const CLOUD_PLATFORM_SCOPE: &str = "https://www.googleapis.com/auth/cloud-platform";

/// How requests to Vertex AI are authorized.
#[derive(Debug, Clone)]
pub enum VertexAuth {
    /// Use access token (passed as Bearer header)
    AccessToken(String),
    /// Service account key file, loaded on first request
    ServiceAccount(PathBuf),
    /// Use Application Default Credentials, discovered on first request
    ApplicationDefault,
}

/// Gemini models on Vertex AI.
pub struct VertexProvider {
    client: Client,
    project_id: String,
    location: String,
    model: String,
    auth: VertexAuth,
    token_provider: OnceCell<Arc<dyn TokenProvider>>,
    base_url: Option<String>,
}

impl VertexProvider {
    pub const BACKEND: &'static str = "vertexai";

    /// Create a provider. Performs no I/O; loading credentials is deferred.
    pub fn new(
        project_id: impl Into<String>,
        location: impl Into<String>,
        model: impl Into<String>,
        auth: VertexAuth,
    ) -> Result<Self, Error> {
        let model = model.into();
        if !model.starts_with("gemini") {
            return Err(Error::unsupported_model(Self::BACKEND, model));
        }

        Ok(Self {
            client: http_client()?,
            project_id: project_id.into(),
            location: location.into(),
            model,
            auth,
            token_provider: OnceCell::new(),
            base_url: None,
        })
    }

    /// Send requests to `base_url` instead of the regional Vertex endpoint.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    pub fn from_profile(profile: &Profile) -> Result<Self, Error> {
        let credentials = &profile.credentials;
        if profile.model.trim().is_empty() {
            return Err(Error::config("Model required for Vertex AI provider"));
        }
        let project_id = credentials
            .project_id
            .as_ref()
            .ok_or_else(|| Error::config("Project ID required for Vertex AI provider"))?;
        let location = credentials
            .location
            .as_ref()
            .ok_or_else(|| Error::config("Location required for Vertex AI provider"))?;
        let auth = match (&credentials.access_token, credentials.credentials_path()?) {
            (Some(token), _) => VertexAuth::AccessToken(token.clone()),
            (None, Some(path)) => VertexAuth::ServiceAccount(path),
            (None, None) => VertexAuth::ApplicationDefault,
        };

        let provider = Self::new(project_id.clone(), location.clone(), profile.model.clone(), auth)?;
        Ok(match profile.endpoint.as_deref().filter(|url| !url.trim().is_empty()) {
            Some(base_url) => provider.with_base_url(base_url),
            None => provider,
        })
    }

    fn endpoint(&self, stream: bool) -> String {
        let method = if stream {
            "streamGenerateContent?alt=sse"
        } else {
            "generateContent"
        };
        let base_url = match &self.base_url {
            Some(base_url) => base_url.trim_end_matches('/').to_string(),
            None => format!("https://{}-aiplatform.googleapis.com", self.location),
        };
        format!(
            "{}/v1/projects/{}/locations/{}/publishers/google/models/{}:{}",
            base_url, self.project_id, self.location, self.model, method
        )
    }

    async fn token_provider(&self) -> Result<&Arc<dyn TokenProvider>, Error> {
        self.token_provider
            .get_or_try_init(|| async {
                match &self.auth {
                    VertexAuth::ServiceAccount(path) => {
                        let account = CustomServiceAccount::from_file(path).map_err(|e| {
                            Error::auth(format!(
                                "Failed to load service account key {}: {e}",
                                path.display()
                            ))
                        })?;
                        Ok(Arc::new(account) as Arc<dyn TokenProvider>)
                    }
                    _ => gcp_auth::provider().await.map_err(|e| {
                        Error::auth(format!("Failed to find application default credentials: {e}"))
                    }),
                }
            })
            .await
    }

    async fn bearer_token(&self) -> Result<String, Error> {
        if let VertexAuth::AccessToken(token) = &self.auth {
            return Ok(token.clone());
        }
        let token = self
            .token_provider()
            .await?
            .token(&[CLOUD_PLATFORM_SCOPE])
            .await
            .map_err(|e| Error::auth(format!("Failed to get access token: {e}")))?;
        Ok(token.as_str().to_string())
    }

    async fn post(&self, system: &str, user: &str, stream: bool) -> Result<reqwest::Response, Error> {
        let body = GeminiRequest::from_messages(Message::conversation(system, user));
        let endpoint = self.endpoint(stream);
        debug!(%endpoint, stream, "sending Vertex AI request");

        let token = self.bearer_token().await?;
        let response = self
            .client
            .post(&endpoint)
            .bearer_auth(token)
            .json(&body)
            .send()
            .await?;
        check_status(Self::BACKEND, response).await
    }

    fn blocked(response: &GeminiResponse) -> Result<(), Error> {
        match response.block_reason() {
            Some(reason) => Err(Error::provider(
                Self::BACKEND,
                format!("prompt blocked: {reason}"),
            )),
            None => Ok(()),
        }
    }
}

#[async_trait::async_trait]
impl Provider for VertexProvider {
    fn name(&self) -> &str {
        Self::BACKEND
    }

    async fn chat(&self, system: &str, user: &str) -> Result<String, Error> {
        let response = self.post(system, user, false).await?;
        let bytes = response.bytes().await?;
        let response: GeminiResponse = serde_json::from_slice(&bytes)?;
        Self::blocked(&response)?;
        Ok(response.text())
    }

    async fn chat_stream(&self, system: &str, user: &str, sink: TokenSink) -> Result<(), Error> {
        let response = cancellable(&sink, self.post(system, user, true)).await??;
        let mut events = response.bytes_stream().sse_events();

        while let Some(event) = cancellable(&sink, events.next()).await? {
            let event = event?;
            let data = event.data.trim();
            if data.is_empty() || event.is_done() {
                continue;
            }
            let response: GeminiResponse = serde_json::from_str(data).map_err(|e| {
                Error::provider(Self::BACKEND, format!("Failed to parse SSE event: {e}"))
            })?;
            Self::blocked(&response)?;
            sink.send(response.text()).await?;
        }
        Ok(())
    }
}
