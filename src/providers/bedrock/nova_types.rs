use serde::{Deserialize, Serialize};

use crate::{Message, Role};

/// Amazon Nova `messages-v1` request body.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NovaRequest {
    pub schema_version: &'static str,
    pub messages: Vec<NovaMessage>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub system: Vec<NovaText>,
    pub inference_config: InferenceConfig,
}

impl NovaRequest {
    pub const SCHEMA_VERSION: &'static str = "messages-v1";

    /// System messages go to `system`; the rest become `user` turns.
    pub fn from_messages(messages: Vec<Message>) -> Self {
        let mut turns = Vec::new();
        let mut system = Vec::new();

        for message in messages {
            let text = NovaText {
                text: message.content,
            };
            match message.role {
                Role::System => system.push(text),
                Role::User => turns.push(NovaMessage {
                    role: "user",
                    content: vec![text],
                }),
            }
        }

        Self {
            schema_version: Self::SCHEMA_VERSION,
            messages: turns,
            system,
            inference_config: InferenceConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct NovaMessage {
    pub role: &'static str,
    pub content: Vec<NovaText>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NovaText {
    #[serde(default)]
    pub text: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InferenceConfig {
    pub max_tokens: u32,
    pub temperature: f64,
    pub top_p: f64,
    pub top_k: u32,
}

impl Default for InferenceConfig {
    fn default() -> Self {
        Self {
            max_tokens: 500,
            temperature: 0.7,
            top_p: 0.9,
            top_k: 20,
        }
    }
}

/// `InvokeModel` response body. Failures carry `message` and `type` instead
/// of `output`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct NovaResponse {
    pub output: Option<NovaOutput>,
    pub stop_reason: Option<String>,
    pub message: Option<String>,
    #[serde(rename = "type")]
    pub error_type: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct NovaOutput {
    pub message: NovaOutputMessage,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct NovaOutputMessage {
    pub content: Vec<NovaText>,
}

/// Payload of one streamed chunk. Only `contentBlockDelta` events carry text.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct NovaStreamChunk {
    pub content_block_delta: Option<ContentBlockDelta>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ContentBlockDelta {
    pub delta: NovaText,
}

/// Contents of an AWS credentials file.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AwsCredentialsFile {
    pub aws_access_key_id: String,
    pub aws_secret_access_key: String,
}
