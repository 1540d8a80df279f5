//! Provider registry for runtime selection of CI providers

use super::error::MonitorError;
use super::github::GitHubActionsProvider;
use super::provider::ErasedCiProvider;
use super::teamcity::TeamCityProvider;
use std::collections::HashMap;
use std::sync::Arc;

/// A factory function that creates a CI provider instance
pub type CiFactoryFn = Arc<
    dyn Fn(Option<&toml::Table>) -> Result<Box<dyn ErasedCiProvider>, MonitorError> + Send + Sync,
>;

/// A factory that can create a CI provider instance
#[derive(Clone)]
pub struct CiProviderFactory {
    /// Provider name (e.g., "teamcity", "github")
    pub name: String,
    /// Human-readable description
    pub description: String,
    /// Factory function: takes the `[providers.<name>]` table, returns a provider
    pub create: CiFactoryFn,
}

impl std::fmt::Debug for CiProviderFactory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CiProviderFactory")
            .field("name", &self.name)
            .field("description", &self.description)
            .field("create", &"<factory_fn>")
            .finish()
    }
}

/// Registry for CI providers
#[derive(Debug, Clone)]
pub struct CiProviderRegistry {
    factories: HashMap<String, CiProviderFactory>,
}

impl CiProviderRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self {
            factories: HashMap::new(),
        }
    }

    /// Registry pre-populated with the built-in `teamcity` and `github` providers
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register(CiProviderFactory {
            name: "teamcity".to_string(),
            description: "TeamCity REST API".to_string(),
            create: Arc::new(|config| {
                let provider = TeamCityProvider::from_config(config)?;
                Ok(Box::new(provider) as Box<dyn ErasedCiProvider>)
            }),
        });
        registry.register(CiProviderFactory {
            name: "github".to_string(),
            description: "GitHub Actions via the gh CLI".to_string(),
            create: Arc::new(|config| {
                let provider = GitHubActionsProvider::from_config(config)?;
                Ok(Box::new(provider) as Box<dyn ErasedCiProvider>)
            }),
        });
        registry
    }

    /// Register a CI provider factory
    ///
    /// If a factory with the same name already exists, it will be replaced.
    pub fn register(&mut self, factory: CiProviderFactory) {
        self.factories.insert(factory.name.clone(), factory);
    }

    /// Create a provider by name with optional config
    ///
    /// # Errors
    ///
    /// Returns `MonitorError::Provider` if the provider is not registered,
    /// or whatever the factory returns if creation fails.
    pub fn create_provider(
        &self,
        name: &str,
        config: Option<&toml::Table>,
    ) -> Result<Box<dyn ErasedCiProvider>, MonitorError> {
        let factory = self.factories.get(name).ok_or_else(|| {
            MonitorError::provider(format!(
                "CI provider '{name}' not registered (available: {})",
                self.list_providers().join(", ")
            ))
        })?;

        (factory.create)(config)
    }

    /// List registered provider names, sorted
    pub fn list_providers(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.factories.keys().map(|s| s.as_str()).collect();
        names.sort_unstable();
        names
    }

    pub fn has_provider(&self, name: &str) -> bool {
        self.factories.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.factories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.factories.is_empty()
    }
}

impl Default for CiProviderRegistry {
    fn default() -> Self {
        Self::new()
    }
}
