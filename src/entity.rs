//! Entity definitions.
//!
//! An entity is an identity dimension (for example a driver) whose join keys
//! locate feature rows across feature views.

use crate::error::{FeatureStoreError, Result};
use crate::types::ValueType;
use crate::validation::validate_name;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    pub name: String,

    #[serde(default = "default_value_type")]
    pub value_type: ValueType,

    /// Columns identifying an instance of this entity. Defaults to `[name]`.
    pub join_keys: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(default)]
    pub tags: HashMap<String, String>,
}

fn default_value_type() -> ValueType {
    ValueType::String
}

impl Entity {
    /// Create an entity whose single join key is its own name.
    pub fn new(name: impl Into<String>, value_type: ValueType) -> Self {
        let name = name.into();
        Self {
            join_keys: vec![name.clone()],
            name,
            value_type,
            description: None,
            tags: HashMap::new(),
        }
    }

    pub fn with_join_keys(
        name: impl Into<String>,
        value_type: ValueType,
        join_keys: Vec<String>,
    ) -> Self {
        Self {
            name: name.into(),
            value_type,
            join_keys,
            description: None,
            tags: HashMap::new(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn validate(&self) -> Result<()> {
        validate_name(&self.name, "Entity")?;
        if self.join_keys.is_empty() {
            return Err(FeatureStoreError::Validation(format!(
                "Entity '{}' must have at least one join key",
                self.name
            )));
        }
        for key in &self.join_keys {
            if key.is_empty() {
                return Err(FeatureStoreError::Validation(format!(
                    "Entity '{}' has an empty join key",
                    self.name
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_join_keys_to_name() {
        let e = Entity::new("driver_id", ValueType::Int64);
        assert_eq!(e.join_keys, vec!["driver_id".to_string()]);
        assert!(e.validate().is_ok());
    }

    #[test]
    fn rejects_empty_join_keys() {
        let e = Entity::with_join_keys("driver", ValueType::Int64, vec![]);
        assert!(e.validate().is_err());
    }
}
