//! Plain data shared by the pipeline and the backend bindings: profiles and
//! limits, messages, and stream tokens.

pub mod config;
pub mod message;
pub mod streaming;

pub use config::{
    expand_home, Credentials, LimitMode, LimitOverrides, Limits, Profile, DEFAULT_MAX_PROMPT_SIZE_BYTES,
    DEFAULT_MAX_RESPONSE_SIZE_BYTES,
};
pub use message::{Message, Role};
pub use streaming::{StreamOutcome, Token};
