//! Amazon Bedrock. Each model family has its own request format, so the
//! backend picks a binding from the model id.

pub mod nova;
pub mod nova_types;

pub use nova::{BedrockAuth, NovaProvider};

use std::sync::Arc;

use crate::{Error, Profile, Provider};

pub const BACKEND: &str = "bedrock";

/// Build the binding for the profile's model family.
pub fn from_profile(profile: &Profile) -> Result<Arc<dyn Provider>, Error> {
    if profile.model.trim().is_empty() {
        return Err(Error::config("Model required for Bedrock provider"));
    }
    if profile.model.starts_with(NovaProvider::MODEL_PREFIX) {
        return Ok(Arc::new(NovaProvider::from_profile(profile)?));
    }
    Err(Error::unsupported_model(BACKEND, profile.model.clone()))
}
