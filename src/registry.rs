use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use tracing::debug;

use crate::providers::{bedrock, MockProvider, OllamaProvider, OpenAIProvider, VertexProvider};
use crate::{Error, Profile, Provider};

/// Builds a provider bound to one profile. Must not perform network I/O.
pub type ProviderConstructor =
    dyn Fn(&Profile) -> Result<Arc<dyn Provider>, Error> + Send + Sync;

/// Table from backend name to provider constructor.
///
/// Built once with [`ProviderRegistry::register`] calls and read-only
/// afterwards.
#[derive(Clone, Default)]
pub struct ProviderRegistry {
    constructors: HashMap<String, Arc<ProviderConstructor>>,
}

impl ProviderRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry holding every backend shipped with this crate.
    pub fn with_builtin() -> Self {
        Self::new()
            .register(OllamaProvider::BACKEND, |profile| {
                Ok(Arc::new(OllamaProvider::from_profile(profile)?))
            })
            .register(OpenAIProvider::BACKEND, |profile| {
                Ok(Arc::new(OpenAIProvider::from_profile(profile)?))
            })
            .register(OpenAIProvider::DISCOVERY_BACKEND, |profile| {
                Ok(Arc::new(
                    OpenAIProvider::from_profile(profile)?.with_model_discovery(),
                ))
            })
            .register(VertexProvider::BACKEND, |profile| {
                Ok(Arc::new(VertexProvider::from_profile(profile)?))
            })
            .register(bedrock::BACKEND, bedrock::from_profile)
            .register(MockProvider::BACKEND, |_| Ok(Arc::new(MockProvider::new())))
    }

    /// Add or replace the constructor for `name`.
    pub fn register<F>(mut self, name: impl Into<String>, constructor: F) -> Self
    where
        F: Fn(&Profile) -> Result<Arc<dyn Provider>, Error> + Send + Sync + 'static,
    {
        self.constructors
            .insert(name.into().to_lowercase(), Arc::new(constructor));
        self
    }

    pub fn contains(&self, name: &str) -> bool {
        self.constructors.contains_key(&name.trim().to_lowercase())
    }

    /// Registered backend names, sorted.
    pub fn backends(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.constructors.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Build the provider named by `profile.backend`.
    pub fn resolve(&self, profile: &Profile) -> Result<Arc<dyn Provider>, Error> {
        let name = profile.backend.trim().to_lowercase();
        let constructor = self
            .constructors
            .get(&name)
            .ok_or_else(|| Error::UnknownBackend(profile.backend.clone()))?;

        let provider = constructor(profile)?;
        debug!(backend = %name, model = %profile.model, "resolved provider");
        Ok(provider)
    }
}

impl fmt::Debug for ProviderRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderRegistry")
            .field("backends", &self.backends())
            .finish()
    }
}
