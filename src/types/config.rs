use std::env;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::LimitKind;
use crate::limits::LimitPolicy;
use crate::Error;

/// Default prompt ceiling applied when a profile carries no limits (10 MiB).
pub const DEFAULT_MAX_PROMPT_SIZE_BYTES: u64 = 10 * 1024 * 1024;
/// Default response ceiling applied when a profile carries no limits (20 MiB).
pub const DEFAULT_MAX_RESPONSE_SIZE_BYTES: u64 = 20 * 1024 * 1024;

/// What to do when data exceeds its byte ceiling.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LimitMode {
    /// Abort the operation with a limit error.
    #[default]
    Stop,
    /// Truncate to the ceiling and report a warning.
    Warn,
}

impl FromStr for LimitMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "stop" => Ok(LimitMode::Stop),
            "warn" => Ok(LimitMode::Warn),
            other => Err(Error::config(format!(
                "Invalid limit mode '{other}'. Valid values are: stop, warn"
            ))),
        }
    }
}

impl fmt::Display for LimitMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LimitMode::Stop => f.write_str("stop"),
            LimitMode::Warn => f.write_str("warn"),
        }
    }
}

/// Byte ceilings for prompts and responses.
///
/// When `enabled` is false no check or truncation happens, whatever the
/// other fields say.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Limits {
    pub enabled: bool,
    pub on_input_exceeded: LimitMode,
    pub on_output_exceeded: LimitMode,
    pub max_prompt_size_bytes: u64,
    pub max_response_size_bytes: u64,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            enabled: true,
            on_input_exceeded: LimitMode::Stop,
            on_output_exceeded: LimitMode::Stop,
            max_prompt_size_bytes: DEFAULT_MAX_PROMPT_SIZE_BYTES,
            max_response_size_bytes: DEFAULT_MAX_RESPONSE_SIZE_BYTES,
        }
    }
}

impl Limits {
    /// Limits that never reject or truncate anything.
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Self::default()
        }
    }

    /// True for the all-zero value, which stands for "not configured".
    pub fn is_unset(&self) -> bool {
        !self.enabled && self.max_prompt_size_bytes == 0 && self.max_response_size_bytes == 0
    }

    /// Replace an unset value with the standard defaults.
    pub fn or_default(self) -> Self {
        if self.is_unset() {
            Self::default()
        } else {
            self
        }
    }

    /// Apply per-invocation mode overrides without touching `self`.
    pub fn with_overrides(&self, overrides: &LimitOverrides) -> Self {
        Self {
            on_input_exceeded: overrides.on_input_exceeded.unwrap_or(self.on_input_exceeded),
            on_output_exceeded: overrides
                .on_output_exceeded
                .unwrap_or(self.on_output_exceeded),
            ..*self
        }
    }

    pub fn validate(&self) -> Result<(), Error> {
        if !self.enabled {
            return Ok(());
        }
        if self.max_prompt_size_bytes == 0 {
            return Err(Error::config(
                "max_prompt_size_bytes must be greater than zero when limits are enabled",
            ));
        }
        if self.max_response_size_bytes == 0 {
            return Err(Error::config(
                "max_response_size_bytes must be greater than zero when limits are enabled",
            ));
        }
        Ok(())
    }

    /// Policy governing prompt text.
    pub fn input_policy(&self) -> LimitPolicy {
        LimitPolicy {
            kind: LimitKind::Prompt,
            enabled: self.enabled,
            ceiling: self.max_prompt_size_bytes,
            mode: self.on_input_exceeded,
        }
    }

    /// Policy governing response text.
    pub fn output_policy(&self) -> LimitPolicy {
        LimitPolicy {
            kind: LimitKind::Response,
            enabled: self.enabled,
            ceiling: self.max_response_size_bytes,
            mode: self.on_output_exceeded,
        }
    }
}

/// Invocation-time replacements for the stored limit modes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LimitOverrides {
    pub on_input_exceeded: Option<LimitMode>,
    pub on_output_exceeded: Option<LimitMode>,
}

/// Backend credentials. Only the backend bindings look inside.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Credentials {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub access_token: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub project_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub credentials_file: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub aws_region: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub aws_access_key_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub aws_secret_access_key: Option<String>,
}

impl Credentials {
    /// The configured credentials file with `~` expanded. A configured file
    /// that does not exist is a configuration error.
    pub fn credentials_path(&self) -> Result<Option<PathBuf>, Error> {
        let Some(path) = self
            .credentials_file
            .as_ref()
            .filter(|path| !path.as_os_str().is_empty())
        else {
            return Ok(None);
        };
        let path = expand_home(path)?;
        if !path.exists() {
            return Err(Error::config(format!(
                "credentials file not found at {}",
                path.display()
            )));
        }
        Ok(Some(path))
    }
}

/// `path` with a leading `~` replaced by the user's home directory.
pub fn expand_home(path: &Path) -> Result<PathBuf, Error> {
    let Ok(rest) = path.strip_prefix("~") else {
        return Ok(path.to_path_buf());
    };
    let home = dirs::home_dir()
        .ok_or_else(|| Error::config("failed to get user home directory"))?;
    Ok(home.join(rest))
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let redact = |value: &Option<String>| value.as_ref().map(|_| "<redacted>");
        f.debug_struct("Credentials")
            .field("api_key", &redact(&self.api_key))
            .field("access_token", &redact(&self.access_token))
            .field("project_id", &self.project_id)
            .field("location", &self.location)
            .field("credentials_file", &self.credentials_file)
            .field("aws_region", &self.aws_region)
            .field("aws_access_key_id", &self.aws_access_key_id)
            .field("aws_secret_access_key", &redact(&self.aws_secret_access_key))
            .finish()
    }
}

/// A named bundle of backend identity, model, endpoint, credentials and limits.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    #[serde(alias = "provider")]
    pub backend: String,
    pub model: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
    #[serde(default)]
    pub credentials: Credentials,
    #[serde(default)]
    pub limits: Limits,
}

impl Profile {
    pub fn new(backend: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            backend: backend.into(),
            model: model.into(),
            ..Self::default()
        }
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = Some(endpoint.into());
        self
    }

    pub fn with_credentials(mut self, credentials: Credentials) -> Self {
        self.credentials = credentials;
        self
    }

    pub fn with_limits(mut self, limits: Limits) -> Self {
        self.limits = limits;
        self
    }

    /// Endpoint from the profile, or `default` when none is configured.
    pub fn endpoint_or<'a>(&'a self, default: &'a str) -> &'a str {
        match self.endpoint.as_deref() {
            Some(endpoint) if !endpoint.trim().is_empty() => endpoint,
            _ => default,
        }
    }

    /// Create a profile from environment variables.
    pub fn from_env() -> Result<Self, Error> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Create a profile from an arbitrary key lookup (environment-shaped).
    pub fn from_lookup<F>(lookup: F) -> Result<Self, Error>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        let backend = get("LLM_BACKEND").ok_or_else(|| {
            Error::config("LLM_BACKEND environment variable is required (ollama, openai, openai2, vertexai, bedrock, mock)")
        })?;
        let model = get("LLM_MODEL").unwrap_or_default();

        let credentials = Credentials {
            api_key: get("OPENAI_API_KEY"),
            access_token: get("VERTEX_ACCESS_TOKEN"),
            project_id: get("GOOGLE_CLOUD_PROJECT"),
            location: get("GOOGLE_CLOUD_REGION"),
            credentials_file: get("LLM_CREDENTIALS_FILE").map(PathBuf::from),
            aws_region: get("AWS_REGION"),
            aws_access_key_id: get("AWS_ACCESS_KEY_ID"),
            aws_secret_access_key: get("AWS_SECRET_ACCESS_KEY"),
        };

        let mut limits = Limits::default();
        if let Some(enabled) = get("LLM_LIMITS_ENABLED") {
            limits.enabled = parse_bool("LLM_LIMITS_ENABLED", &enabled)?;
        }
        if let Some(value) = get("LLM_MAX_PROMPT_BYTES") {
            limits.max_prompt_size_bytes = parse_bytes("LLM_MAX_PROMPT_BYTES", &value)?;
        }
        if let Some(value) = get("LLM_MAX_RESPONSE_BYTES") {
            limits.max_response_size_bytes = parse_bytes("LLM_MAX_RESPONSE_BYTES", &value)?;
        }
        if let Some(value) = get("LLM_ON_INPUT_EXCEEDED") {
            limits.on_input_exceeded = value.parse()?;
        }
        if let Some(value) = get("LLM_ON_OUTPUT_EXCEEDED") {
            limits.on_output_exceeded = value.parse()?;
        }

        Ok(Self {
            backend: backend.trim().to_lowercase(),
            model,
            endpoint: get("LLM_ENDPOINT"),
            credentials,
            limits,
        })
    }
}

fn parse_bool(key: &str, value: &str) -> Result<bool, Error> {
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(Error::config(format!("{key} must be a boolean, got '{value}'"))),
    }
}

fn parse_bytes(key: &str, value: &str) -> Result<u64, Error> {
    value
        .trim()
        .parse()
        .map_err(|_| Error::config(format!("{key} must be a byte count, got '{value}'")))
}
