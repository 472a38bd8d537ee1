//! Feature views: a named schema binding features and entities to one data
//! source.

use crate::entity::Entity;
use crate::error::{FeatureStoreError, Result};
use crate::feature::Feature;
use crate::source::SourceSpec;
use crate::validation::validate_name;
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeatureView {
    pub name: String,
    pub entities: Vec<Entity>,
    pub features: Vec<Feature>,
    pub source: SourceSpec,

    /// Advisory freshness horizon. Stored and listed, never enforced.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ttl: Option<Duration>,

    /// Whether this view participates in materialization and online serving.
    #[serde(default = "default_online")]
    pub online: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(default)]
    pub tags: HashMap<String, String>,
}

fn default_online() -> bool {
    true
}

impl FeatureView {
    pub fn new(
        name: impl Into<String>,
        entities: Vec<Entity>,
        features: Vec<Feature>,
        source: SourceSpec,
    ) -> Self {
        Self {
            name: name.into(),
            entities,
            features,
            source,
            ttl: None,
            online: true,
            description: None,
            tags: HashMap::new(),
        }
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = Some(ttl);
        self
    }

    pub fn offline_only(mut self) -> Self {
        self.online = false;
        self
    }

    pub fn feature_names(&self) -> Vec<String> {
        self.features.iter().map(|f| f.name.clone()).collect()
    }

    pub fn entity_names(&self) -> Vec<String> {
        self.entities.iter().map(|e| e.name.clone()).collect()
    }

    /// Union of all member entities' join keys, deduplicated, first-seen
    /// order.
    pub fn join_keys(&self) -> Vec<String> {
        self.entities
            .iter()
            .flat_map(|e| e.join_keys.iter().cloned())
            .unique()
            .collect()
    }

    pub fn feature(&self, name: &str) -> Option<&Feature> {
        self.features.iter().find(|f| f.name == name)
    }

    pub fn entity(&self, name: &str) -> Option<&Entity> {
        self.entities.iter().find(|e| e.name == name)
    }

    pub fn validate(&self) -> Result<()> {
        validate_name(&self.name, "FeatureView")?;
        if self.entities.is_empty() {
            return Err(FeatureStoreError::Validation(format!(
                "FeatureView '{}' must have at least one entity",
                self.name
            )));
        }
        if self.features.is_empty() {
            return Err(FeatureStoreError::Validation(format!(
                "FeatureView '{}' must have at least one feature",
                self.name
            )));
        }

        for entity in &self.entities {
            entity.validate()?;
        }
        for feature in &self.features {
            feature.validate()?;
        }

        let feature_names = self.feature_names();
        if feature_names.iter().unique().count() != feature_names.len() {
            return Err(FeatureStoreError::Validation(format!(
                "Feature names must be unique within FeatureView '{}'",
                self.name
            )));
        }

        let entity_names = self.entity_names();
        if entity_names.iter().unique().count() != entity_names.len() {
            return Err(FeatureStoreError::Validation(format!(
                "Entity names must be unique within FeatureView '{}'",
                self.name
            )));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::file::{FileFormat, FileSource};
    use crate::types::ValueType;

    fn sample_source() -> SourceSpec {
        SourceSpec::File(FileSource::new(
            "driver_stats_source",
            "data/driver_stats.parquet",
            FileFormat::Parquet,
        ))
    }

    #[test]
    fn join_keys_are_deduplicated_in_first_seen_order() {
        let a = Entity::with_join_keys(
            "trip",
            ValueType::Int64,
            vec!["driver_id".into(), "trip_id".into()],
        );
        let b = Entity::with_join_keys(
            "driver",
            ValueType::Int64,
            vec!["driver_id".into()],
        );
        let view = FeatureView::new(
            "trip_stats",
            vec![a, b],
            vec![Feature::new("duration", ValueType::Double)],
            sample_source(),
        );
        assert_eq!(view.join_keys(), vec!["driver_id".to_string(), "trip_id".to_string()]);
    }

    #[test]
    fn duplicate_feature_names_fail_validation() {
        let view = FeatureView::new(
            "driver_stats",
            vec![Entity::new("driver_id", ValueType::Int64)],
            vec![
                Feature::new("conv_rate", ValueType::Double),
                Feature::new("conv_rate", ValueType::Double),
            ],
            sample_source(),
        );
        assert!(view.validate().is_err());
    }

    #[test]
    fn view_requires_entities_and_features() {
        let no_entities = FeatureView::new(
            "v",
            vec![],
            vec![Feature::new("f", ValueType::Double)],
            sample_source(),
        );
        assert!(no_entities.validate().is_err());

        let no_features = FeatureView::new(
            "v",
            vec![Entity::new("driver_id", ValueType::Int64)],
            vec![],
            sample_source(),
        );
        assert!(no_features.validate().is_err());
    }
}
