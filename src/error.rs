use std::fmt;
use thiserror::Error;

/// Which of the two byte ceilings a size check was made against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LimitKind {
    Prompt,
    Response,
}

impl fmt::Display for LimitKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LimitKind::Prompt => f.write_str("prompt"),
            LimitKind::Response => f.write_str("response"),
        }
    }
}

/// Coarse classification of an [`Error`], used by callers to pick an exit path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Unknown backend, unsupported model, missing or invalid profile field.
    Configuration,
    /// Input or output exceeded its ceiling under `stop` mode.
    LimitExceeded,
    /// Network, authentication or backend-reported failure.
    Provider,
    /// The operation was cancelled before it finished.
    Cancellation,
    /// A prompt source could not be used.
    Input,
}

/// Errors that can occur while resolving prompts or talking to a backend.
#[derive(Error, Debug)]
pub enum Error {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Authentication failed: {0}")]
    Auth(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Provider error: {provider} - {message}")]
    Provider { provider: String, message: String },

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Backend '{0}' is not recognized")]
    UnknownBackend(String),

    #[error("Model '{model}' is not supported by the '{backend}' backend")]
    UnsupportedModel { backend: String, model: String },

    #[error("{kind} size limit exceeded: {size} bytes is over the maximum of {limit} bytes")]
    LimitExceeded {
        kind: LimitKind,
        size: u64,
        limit: u64,
    },

    #[error("Invalid prompt source: {0}")]
    PromptSource(String),

    #[error("Failed to read {what}: {source}")]
    Io {
        what: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Streaming error: {0}")]
    Streaming(String),

    #[error("Operation cancelled")]
    Cancelled,
}

impl Error {
    pub fn provider(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Provider {
            provider: provider.into(),
            message: message.into(),
        }
    }

    pub fn config(message: impl Into<String>) -> Self {
        Error::Config(message.into())
    }

    pub fn auth(message: impl Into<String>) -> Self {
        Error::Auth(message.into())
    }

    pub fn streaming(message: impl Into<String>) -> Self {
        Error::Streaming(message.into())
    }

    pub fn prompt_source(message: impl Into<String>) -> Self {
        Error::PromptSource(message.into())
    }

    pub fn unsupported_model(backend: impl Into<String>, model: impl Into<String>) -> Self {
        Error::UnsupportedModel {
            backend: backend.into(),
            model: model.into(),
        }
    }

    pub fn limit_exceeded(kind: LimitKind, size: u64, limit: u64) -> Self {
        Error::LimitExceeded { kind, size, limit }
    }

    pub fn io(what: impl Into<String>, source: std::io::Error) -> Self {
        Error::Io {
            what: what.into(),
            source,
        }
    }

    /// Classify this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Config(_) | Error::UnknownBackend(_) | Error::UnsupportedModel { .. } => {
                ErrorKind::Configuration
            }
            Error::LimitExceeded { .. } => ErrorKind::LimitExceeded,
            Error::Cancelled => ErrorKind::Cancellation,
            Error::PromptSource(_) | Error::Io { .. } => ErrorKind::Input,
            Error::Http(_)
            | Error::Auth(_)
            | Error::Serialization(_)
            | Error::Provider { .. }
            | Error::Streaming(_) => ErrorKind::Provider,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, Error::Cancelled)
    }
}
