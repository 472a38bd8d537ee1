//! Repository configuration.
//!
//! Loaded from `feature_store.json` in the repo directory when present;
//! store backends are selected by string tags so unsupported combinations
//! fail at construction, not mid-operation.

use crate::error::{FeatureStoreError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

pub const CONFIG_FILE_NAME: &str = "feature_store.json";

const SUPPORTED_ONLINE_STORES: [&str; 1] = ["memory"];
const SUPPORTED_OFFLINE_STORES: [&str; 1] = ["parquet"];
const SUPPORTED_REGISTRIES: [&str; 1] = ["sqlite"];

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FeatureStoreConfig {
    pub project: String,
    pub registry_type: String,
    pub registry_path: String,
    pub online_store_type: String,
    pub offline_store_type: String,
}

impl Default for FeatureStoreConfig {
    fn default() -> Self {
        Self {
            project: "default_project".to_string(),
            registry_type: "sqlite".to_string(),
            registry_path: "registry.db".to_string(),
            online_store_type: "memory".to_string(),
            offline_store_type: "parquet".to_string(),
        }
    }
}

impl FeatureStoreConfig {
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|e| {
            FeatureStoreError::Config(format!("Failed to read {}: {}", path.display(), e))
        })?;
        let config: Self = serde_json::from_str(&contents)
            .map_err(|e| FeatureStoreError::Config(format!("Invalid {}: {}", path.display(), e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Load the repo's config file, falling back to defaults when absent.
    pub fn load_or_default(repo_path: impl AsRef<Path>) -> Result<Self> {
        let path = repo_path.as_ref().join(CONFIG_FILE_NAME);
        if path.exists() {
            Self::from_json_file(path)
        } else {
            Ok(Self::default())
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.project.is_empty() {
            return Err(FeatureStoreError::Config("Project name cannot be empty".to_string()));
        }
        if self.registry_path.is_empty() {
            return Err(FeatureStoreError::Config("Registry path cannot be empty".to_string()));
        }
        if !SUPPORTED_REGISTRIES.contains(&self.registry_type.as_str()) {
            return Err(FeatureStoreError::Config(format!(
                "Unsupported registry type: {}",
                self.registry_type
            )));
        }
        if !SUPPORTED_ONLINE_STORES.contains(&self.online_store_type.as_str()) {
            return Err(FeatureStoreError::Config(format!(
                "Unsupported online store type: {}",
                self.online_store_type
            )));
        }
        if !SUPPORTED_OFFLINE_STORES.contains(&self.offline_store_type.as_str()) {
            return Err(FeatureStoreError::Config(format!(
                "Unsupported offline store type: {}",
                self.offline_store_type
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = FeatureStoreConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.online_store_type, "memory");
        assert_eq!(config.offline_store_type, "parquet");
    }

    #[test]
    fn unsupported_store_type_is_a_config_error() {
        let config = FeatureStoreConfig {
            online_store_type: "redis".to_string(),
            ..Default::default()
        };
        let err = config.validate().unwrap_err();
        assert!(matches!(err, FeatureStoreError::Config(_)));
    }

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let config = FeatureStoreConfig::load_or_default("/definitely/not/a/repo").unwrap();
        assert_eq!(config.project, "default_project");
    }
}
