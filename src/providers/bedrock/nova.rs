use std::fmt;
use std::path::{Path, PathBuf};

use aws_config::BehaviorVersion;
use aws_sdk_bedrockruntime::config::{Credentials as AwsCredentials, Region};
use aws_sdk_bedrockruntime::error::DisplayErrorContext;
use aws_sdk_bedrockruntime::primitives::Blob;
use aws_sdk_bedrockruntime::types::ResponseStream;
use aws_sdk_bedrockruntime::Client;
use tokio::sync::OnceCell;
use tracing::debug;

use super::nova_types::{AwsCredentialsFile, NovaRequest, NovaResponse, NovaStreamChunk};
use super::BACKEND;
use crate::provider::{Provider, TokenSink};
use crate::providers::cancellable;
use crate::{Error, Message, Profile};

const CREDENTIALS_SOURCE: &str = "promptline";

/// Where Bedrock request signing keys come from.
#[derive(Clone)]
pub enum BedrockAuth {
    /// Keys given directly in the profile.
    StaticKeys {
        access_key_id: String,
        secret_access_key: String,
    },
    /// JSON file holding `aws_access_key_id` and `aws_secret_access_key`,
    /// read on first request.
    CredentialsFile(PathBuf),
    /// The AWS SDK's own lookup: environment, shared config, instance role.
    DefaultChain,
}

impl fmt::Debug for BedrockAuth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BedrockAuth::StaticKeys { access_key_id, .. } => f
                .debug_struct("StaticKeys")
                .field("access_key_id", access_key_id)
                .field("secret_access_key", &"<redacted>")
                .finish(),
            BedrockAuth::CredentialsFile(path) => {
                f.debug_tuple("CredentialsFile").field(path).finish()
            }
            BedrockAuth::DefaultChain => f.write_str("DefaultChain"),
        }
    }
}

/// Amazon Nova models on Bedrock.
pub struct NovaProvider {
    model: String,
    region: Option<String>,
    auth: BedrockAuth,
    endpoint_url: Option<String>,
    client: OnceCell<Client>,
}

impl NovaProvider {
    pub const MODEL_PREFIX: &'static str = "amazon.nova";

    /// Create a provider. Performs no I/O; the SDK client is built on first use.
    pub fn new(model: impl Into<String>, region: Option<String>, auth: BedrockAuth) -> Result<Self, Error> {
        let model = model.into();
        if !model.starts_with(Self::MODEL_PREFIX) {
            return Err(Error::unsupported_model(BACKEND, model));
        }
        Ok(Self {
            model,
            region,
            auth,
            endpoint_url: None,
            client: OnceCell::new(),
        })
    }

    /// Send requests to `url` instead of the regional Bedrock endpoint.
    pub fn with_endpoint_url(mut self, url: impl Into<String>) -> Self {
        self.endpoint_url = Some(url.into());
        self
    }

    /// A credentials file wins over keys in the profile; with neither, the
    /// SDK's default chain applies.
    pub fn from_profile(profile: &Profile) -> Result<Self, Error> {
        let credentials = &profile.credentials;
        let non_empty = |value: &Option<String>| value.clone().filter(|value| !value.trim().is_empty());

        let auth = match (
            credentials.credentials_path()?,
            non_empty(&credentials.aws_access_key_id),
            non_empty(&credentials.aws_secret_access_key),
        ) {
            (Some(path), _, _) => BedrockAuth::CredentialsFile(path),
            (None, Some(access_key_id), Some(secret_access_key)) => BedrockAuth::StaticKeys {
                access_key_id,
                secret_access_key,
            },
            _ => BedrockAuth::DefaultChain,
        };

        let provider = Self::new(profile.model.clone(), non_empty(&credentials.aws_region), auth)?;
        Ok(match profile.endpoint.as_deref().filter(|url| !url.trim().is_empty()) {
            Some(url) => provider.with_endpoint_url(url),
            None => provider,
        })
    }

    async fn client(&self) -> Result<&Client, Error> {
        self.client
            .get_or_try_init(|| async {
                let mut loader = aws_config::defaults(BehaviorVersion::latest());
                if let Some(region) = &self.region {
                    loader = loader.region(Region::new(region.clone()));
                }
                let keys = match &self.auth {
                    BedrockAuth::StaticKeys {
                        access_key_id,
                        secret_access_key,
                    } => Some((access_key_id.clone(), secret_access_key.clone())),
                    BedrockAuth::CredentialsFile(path) => Some(load_aws_keys(path).await?),
                    BedrockAuth::DefaultChain => None,
                };
                if let Some((access_key_id, secret_access_key)) = keys {
                    loader = loader.credentials_provider(AwsCredentials::new(
                        access_key_id,
                        secret_access_key,
                        None,
                        None,
                        CREDENTIALS_SOURCE,
                    ));
                }
                if let Some(url) = &self.endpoint_url {
                    loader = loader.endpoint_url(url.clone());
                }

                let config = loader.load().await;
                debug!(model = %self.model, region = ?config.region(), "created Bedrock client");
                Ok(Client::new(&config))
            })
            .await
    }

    fn body(system: &str, user: &str) -> Result<Blob, Error> {
        let request = NovaRequest::from_messages(Message::conversation(system, user));
        Ok(Blob::new(serde_json::to_vec(&request)?))
    }

    /// Text of a complete response, or the model error it reports.
    fn response_text(body: &[u8]) -> Result<String, Error> {
        let response: NovaResponse = serde_json::from_slice(body).map_err(|_| {
            Error::provider(
                BACKEND,
                format!("failed to parse response body: {}", String::from_utf8_lossy(body)),
            )
        })?;

        if let Some(output) = response.output {
            return output
                .message
                .content
                .into_iter()
                .next()
                .map(|content| content.text)
                .ok_or_else(|| Error::provider(BACKEND, "no content found in response"));
        }
        match response.message {
            Some(message) => Err(Error::provider(
                BACKEND,
                format!(
                    "model error ({}): {message}",
                    response.error_type.unwrap_or_default()
                ),
            )),
            None => Err(Error::provider(BACKEND, "no content found in response")),
        }
    }

    /// Text carried by one streamed chunk. Malformed chunks are skipped.
    fn delta(bytes: &[u8]) -> Option<String> {
        match serde_json::from_slice::<NovaStreamChunk>(bytes) {
            Ok(chunk) => chunk.content_block_delta.map(|block| block.delta.text),
            Err(e) => {
                debug!(error = %e, "skipping unparseable stream chunk");
                None
            }
        }
    }
}

fn sdk_error<E: std::error::Error>(context: &str, error: E) -> Error {
    Error::provider(BACKEND, format!("{context}: {}", DisplayErrorContext(&error)))
}

async fn load_aws_keys(path: &Path) -> Result<(String, String), Error> {
    let what = format!("AWS credentials file {}", path.display());
    let bytes = tokio::fs::read(path)
        .await
        .map_err(|e| Error::auth(format!("failed to read {what}: {e}")))?;
    let keys: AwsCredentialsFile = serde_json::from_slice(&bytes)
        .map_err(|e| Error::auth(format!("failed to parse {what}: {e}")))?;
    if keys.aws_access_key_id.is_empty() || keys.aws_secret_access_key.is_empty() {
        return Err(Error::auth(format!(
            "aws_access_key_id and aws_secret_access_key are required in {what}"
        )));
    }
    Ok((keys.aws_access_key_id, keys.aws_secret_access_key))
}

#[async_trait::async_trait]
impl Provider for NovaProvider {
    fn name(&self) -> &str {
        BACKEND
    }

    async fn chat(&self, system: &str, user: &str) -> Result<String, Error> {
        debug!(model = %self.model, "invoking Bedrock model");
        let output = self
            .client()
            .await?
            .invoke_model()
            .model_id(&self.model)
            .content_type("application/json")
            .body(Self::body(system, user)?)
            .send()
            .await
            .map_err(|e| sdk_error("failed to invoke model", e))?;
        Self::response_text(output.body().as_ref())
    }

    async fn chat_stream(&self, system: &str, user: &str, sink: TokenSink) -> Result<(), Error> {
        debug!(model = %self.model, "invoking Bedrock model with response stream");
        let client = cancellable(&sink, self.client()).await??;
        let request = client
            .invoke_model_with_response_stream()
            .model_id(&self.model)
            .content_type("application/json")
            .body(Self::body(system, user)?)
            .send();
        let output = cancellable(&sink, request)
            .await?
            .map_err(|e| sdk_error("failed to invoke model with stream", e))?;

        let mut events = output.body;
        while let Some(event) = cancellable(&sink, events.recv())
            .await?
            .map_err(|e| sdk_error("streaming error", e))?
        {
            if let ResponseStream::Chunk(part) = event {
                if let Some(text) = part.bytes().and_then(|blob| Self::delta(blob.as_ref())) {
                    sink.send(text).await?;
                }
            }
        }
        Ok(())
    }
}
