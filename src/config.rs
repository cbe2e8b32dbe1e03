use std::collections::HashSet;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::content::collections::{default_collections, CollectionConfig};
use crate::content::hierarchy::HierarchyConfig;
use crate::content::slug::{SlugConfig, MIN_MAX_LENGTH};
use crate::error::AppError;

/// Prefix of environment overrides, e.g. `QUIRE__SLUG__MAX_LENGTH=80`.
pub const ENV_PREFIX: &str = "QUIRE";

/// Server configuration: defaults, then an optional TOML file, then environment.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub store: StoreConfig,
    pub slug: SlugConfig,
    pub hierarchy: HierarchyConfig,
    pub collections: Vec<CollectionConfig>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            store: StoreConfig::default(),
            slug: SlugConfig::default(),
            hierarchy: HierarchyConfig::default(),
            collections: default_collections(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Address the HTTP server binds to.
    pub addr: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            addr: "127.0.0.1:3000".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    #[default]
    Memory,
    Mongo,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub backend: StoreBackend,
    pub mongodb_uri: String,
    pub database: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::Memory,
            mongodb_uri: "mongodb://localhost:27017".to_string(),
            database: "quire".to_string(),
        }
    }
}

impl AppConfig {
    /// Load configuration from an optional file and `QUIRE__*` environment variables.
    pub fn load(path: Option<&Path>) -> Result<Self, AppError> {
        Self::load_with_env(
            path,
            config::Environment::with_prefix(ENV_PREFIX)
                .separator("__")
                .try_parsing(true),
        )
    }

    fn load_with_env(path: Option<&Path>, env: config::Environment) -> Result<Self, AppError> {
        let mut builder = config::Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path).required(true));
        }

        let settings = builder
            .add_source(env)
            .build()
            .map_err(|e| AppError::Config(e.to_string()))?;

        let config: AppConfig = settings
            .try_deserialize()
            .map_err(|e| AppError::Config(e.to_string()))?;

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), AppError> {
        if self.slug.max_length < MIN_MAX_LENGTH {
            return Err(AppError::Config(format!(
                "slug.max_length must be at least {}",
                MIN_MAX_LENGTH
            )));
        }
        if self.slug.max_attempts == 0 {
            return Err(AppError::Config("slug.max_attempts must be at least 1".into()));
        }
        if self.hierarchy.max_depth == 0 {
            return Err(AppError::Config("hierarchy.max_depth must be at least 1".into()));
        }

        let mut seen = HashSet::new();
        for collection in &self.collections {
            if collection.name.trim().is_empty() {
                return Err(AppError::Config("collection names cannot be empty".into()));
            }
            if !seen.insert(collection.name.as_str()) {
                return Err(AppError::Config(format!(
                    "collection '{}' is declared twice",
                    collection.name
                )));
            }
        }

        Ok(())
    }
}
