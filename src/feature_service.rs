//! Feature services: reusable, named bundles of feature references.

use crate::error::{FeatureStoreError, Result};
use crate::feature_view::FeatureView;
use crate::types::FeatureReference;
use crate::validation::validate_name;
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A member of a feature service. Each variant carries exactly what is
/// needed to resolve to one or more feature references.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum ServiceFeature {
    /// Every feature of the view.
    #[serde(rename = "feature_view")]
    View(FeatureView),

    /// One explicit reference.
    #[serde(rename = "feature_reference")]
    Reference(FeatureReference),

    /// A raw `"<view>:<feature>"` string, parsed at resolution time.
    #[serde(rename = "string")]
    Raw(String),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeatureService {
    pub name: String,
    pub features: Vec<ServiceFeature>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(default)]
    pub tags: HashMap<String, String>,
}

impl FeatureService {
    pub fn new(name: impl Into<String>, features: Vec<ServiceFeature>) -> Self {
        Self {
            name: name.into(),
            features,
            description: None,
            tags: HashMap::new(),
        }
    }

    /// Resolve every member to feature references, in member order.
    pub fn feature_references(&self) -> Result<Vec<FeatureReference>> {
        let mut references = Vec::new();
        for member in &self.features {
            match member {
                ServiceFeature::View(view) => {
                    for feature_name in view.feature_names() {
                        references.push(FeatureReference::new(view.name.clone(), feature_name));
                    }
                }
                ServiceFeature::Reference(reference) => references.push(reference.clone()),
                ServiceFeature::Raw(raw) => references.push(raw.parse()?),
            }
        }
        Ok(references)
    }

    /// Names of the distinct feature views this service touches.
    pub fn feature_view_names(&self) -> Result<Vec<String>> {
        Ok(self
            .feature_references()?
            .into_iter()
            .map(|r| r.feature_view_name)
            .unique()
            .collect())
    }

    pub fn validate(&self) -> Result<()> {
        validate_name(&self.name, "FeatureService")?;
        if self.features.is_empty() {
            return Err(FeatureStoreError::Validation(format!(
                "FeatureService '{}' must have at least one feature",
                self.name
            )));
        }

        for member in &self.features {
            match member {
                ServiceFeature::View(view) => view.validate()?,
                ServiceFeature::Reference(reference) => {
                    if reference.feature_view_name.is_empty() || reference.feature_name.is_empty() {
                        return Err(FeatureStoreError::Validation(format!(
                            "FeatureService '{}' contains an incomplete feature reference",
                            self.name
                        )));
                    }
                }
                ServiceFeature::Raw(raw) => {
                    raw.parse::<FeatureReference>()?;
                }
            }
        }

        let references = self.feature_references()?;
        let mut seen = std::collections::HashSet::new();
        for reference in &references {
            if !seen.insert(reference.to_string()) {
                return Err(FeatureStoreError::Validation(format!(
                    "Duplicate feature reference '{}' in FeatureService '{}'",
                    reference, self.name
                )));
            }
        }

        Ok(())
    }
}
