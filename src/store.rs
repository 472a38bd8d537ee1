//! Feature store facade.
//!
//! Resolves string feature references through the registry and routes calls
//! to the online and offline stores. Pure composition; the stores own the
//! actual semantics.

use crate::config::FeatureStoreConfig;
use crate::convert::rows_to_dataframe;
use crate::entity::Entity;
use crate::error::{FeatureStoreError, Result};
use crate::feature_service::FeatureService;
use crate::feature_view::FeatureView;
use crate::materialize::MaterializationCoordinator;
use crate::offline::{OfflineStore, ParquetOfflineStore};
use crate::online::{EntityRow, MemoryOnlineStore, OnlineStore};
use crate::registry::{Registry, SqliteRegistry};
use crate::types::FeatureReference;
use crate::validation::not_found_message;
use chrono::{DateTime, Utc};
use itertools::Itertools;
use polars::prelude::DataFrame;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;

/// A definition that can be applied to the registry.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RegistryObject {
    Entity(Entity),
    FeatureView(FeatureView),
    FeatureService(FeatureService),
}

pub struct FeatureStore {
    repo_path: PathBuf,
    config: FeatureStoreConfig,
    registry: Arc<dyn Registry>,
    online: Arc<dyn OnlineStore>,
    offline: Arc<dyn OfflineStore>,
    coordinator: MaterializationCoordinator,
}

impl std::fmt::Debug for FeatureStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FeatureStore")
            .field("repo_path", &self.repo_path)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl FeatureStore {
    /// Open the feature store rooted at `repo_path`, reading
    /// `feature_store.json` when present.
    pub fn new(repo_path: impl AsRef<Path>) -> Result<Self> {
        let config = FeatureStoreConfig::load_or_default(&repo_path)?;
        Self::with_config(repo_path, config)
    }

    pub fn with_config(repo_path: impl AsRef<Path>, config: FeatureStoreConfig) -> Result<Self> {
        config.validate()?;
        let repo_path = repo_path.as_ref().to_path_buf();

        let registry: Arc<dyn Registry> = match config.registry_type.as_str() {
            "sqlite" => Arc::new(SqliteRegistry::new(repo_path.join(&config.registry_path))?),
            other => {
                return Err(FeatureStoreError::Config(format!(
                    "Unsupported registry type: {}",
                    other
                )))
            }
        };

        let online: Arc<dyn OnlineStore> = match config.online_store_type.as_str() {
            "memory" => Arc::new(MemoryOnlineStore::new()),
            other => {
                return Err(FeatureStoreError::Config(format!(
                    "Unsupported online store type: {}",
                    other
                )))
            }
        };

        let offline: Arc<dyn OfflineStore> = match config.offline_store_type.as_str() {
            "parquet" => Arc::new(ParquetOfflineStore::new(&repo_path)),
            other => {
                return Err(FeatureStoreError::Config(format!(
                    "Unsupported offline store type: {}",
                    other
                )))
            }
        };

        let coordinator =
            MaterializationCoordinator::new(registry.clone(), offline.clone(), online.clone());

        info!(project = %config.project, repo = %repo_path.display(), "opened feature store");
        Ok(Self {
            repo_path,
            config,
            registry,
            online,
            offline,
            coordinator,
        })
    }

    pub fn repo_path(&self) -> &Path {
        &self.repo_path
    }

    pub fn config(&self) -> &FeatureStoreConfig {
        &self.config
    }

    pub fn online_store(&self) -> Arc<dyn OnlineStore> {
        self.online.clone()
    }

    pub fn offline_store(&self) -> Arc<dyn OfflineStore> {
        self.offline.clone()
    }

    /// Validate and persist definitions, replacing by name.
    pub fn apply(&self, objects: Vec<RegistryObject>) -> Result<()> {
        for object in objects {
            match object {
                RegistryObject::Entity(entity) => self.registry.apply_entity(&entity)?,
                RegistryObject::FeatureView(view) => self.registry.apply_feature_view(&view)?,
                RegistryObject::FeatureService(service) => {
                    self.registry.apply_feature_service(&service)?
                }
            }
        }
        Ok(())
    }

    /// Serving-time reads: current values for each entity row.
    pub fn get_online_features(
        &self,
        features: &[String],
        entity_rows: &[EntityRow],
        service: Option<&FeatureService>,
    ) -> Result<DataFrame> {
        let references = self.resolve_references(features, service)?;

        let mut order: Vec<String> = Vec::new();
        let mut grouped: HashMap<String, Vec<String>> = HashMap::new();
        let mut seen: HashSet<String> = HashSet::new();
        for reference in &references {
            if !seen.insert(reference.feature_name.clone()) {
                return Err(FeatureStoreError::Validation(format!(
                    "Duplicate output column '{}' in online feature request",
                    reference.feature_name
                )));
            }
            if !grouped.contains_key(&reference.feature_view_name) {
                order.push(reference.feature_view_name.clone());
            }
            grouped
                .entry(reference.feature_view_name.clone())
                .or_default()
                .push(reference.feature_name.clone());
        }

        let entity_columns: Vec<String> = entity_rows
            .iter()
            .flat_map(|row| row.keys().cloned())
            .unique()
            .sorted()
            .collect();
        let mut result = rows_to_dataframe(entity_rows, &entity_columns)?;

        for view_name in order {
            let view = self.feature_view(&view_name)?;
            let requested = &grouped[&view_name];
            let df = self.online.read_features(&view, entity_rows, Some(requested))?;
            for feature_name in requested {
                let series = df
                    .column(feature_name)
                    .map_err(|e| {
                        FeatureStoreError::Polars(format!(
                            "Failed to read feature column '{}': {}",
                            feature_name, e
                        ))
                    })?
                    .clone();
                result.with_column(series).map_err(|e| {
                    FeatureStoreError::Polars(format!(
                        "Failed to attach feature column '{}': {}",
                        feature_name, e
                    ))
                })?;
            }
        }

        Ok(result)
    }

    /// Training-time reads: point-in-time-correct values joined against the
    /// caller's entity frame.
    pub async fn get_historical_features(
        &self,
        entity_df: &DataFrame,
        features: &[String],
        service: Option<&FeatureService>,
    ) -> Result<DataFrame> {
        let references = self.resolve_references(features, service)?;

        let view_names: Vec<String> = references
            .iter()
            .map(|r| r.feature_view_name.clone())
            .unique()
            .collect();
        let mut views = Vec::with_capacity(view_names.len());
        for name in &view_names {
            views.push(self.feature_view(name)?);
        }

        self.offline
            .get_historical_features(entity_df, &views, &references)
            .await
    }

    pub async fn materialize_incremental(
        &self,
        end_date: DateTime<Utc>,
        view_names: Option<&[String]>,
    ) -> Result<()> {
        self.coordinator
            .materialize_incremental(end_date, view_names)
            .await
    }

    pub async fn materialize(
        &self,
        start_date: DateTime<Utc>,
        end_date: DateTime<Utc>,
        view_names: Option<&[String]>,
    ) -> Result<()> {
        self.coordinator
            .materialize(start_date, end_date, view_names)
            .await
    }

    pub fn get_entity(&self, name: &str) -> Result<Option<Entity>> {
        self.registry.get_entity(name)
    }

    pub fn get_feature_view(&self, name: &str) -> Result<Option<FeatureView>> {
        self.registry.get_feature_view(name)
    }

    pub fn get_feature_service(&self, name: &str) -> Result<Option<FeatureService>> {
        self.registry.get_feature_service(name)
    }

    pub fn list_entities(&self) -> Result<Vec<Entity>> {
        self.registry.list_entities()
    }

    pub fn list_feature_views(&self) -> Result<Vec<FeatureView>> {
        self.registry.list_feature_views()
    }

    pub fn list_feature_services(&self) -> Result<Vec<FeatureService>> {
        self.registry.list_feature_services()
    }

    pub fn teardown(&self) -> Result<()> {
        self.registry.teardown()?;
        self.online.teardown()
    }

    fn resolve_references(
        &self,
        features: &[String],
        service: Option<&FeatureService>,
    ) -> Result<Vec<FeatureReference>> {
        match service {
            Some(service) => service.feature_references(),
            None => features.iter().map(|f| f.parse()).collect(),
        }
    }

    fn feature_view(&self, name: &str) -> Result<FeatureView> {
        match self.registry.get_feature_view(name)? {
            Some(view) => Ok(view),
            None => {
                let known = self.registry.list_feature_views()?;
                Err(FeatureStoreError::NotFound(not_found_message(
                    "Feature view",
                    name,
                    known.iter().map(|v| v.name.as_str()),
                )))
            }
        }
    }
}
