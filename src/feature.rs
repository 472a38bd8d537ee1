//! Feature definitions.

use crate::error::Result;
use crate::types::ValueType;
use crate::validation::validate_name;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A named, typed attribute of an entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Feature {
    pub name: String,
    pub dtype: ValueType,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(default)]
    pub tags: HashMap<String, String>,
}

impl Feature {
    pub fn new(name: impl Into<String>, dtype: ValueType) -> Self {
        Self {
            name: name.into(),
            dtype,
            description: None,
            tags: HashMap::new(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn validate(&self) -> Result<()> {
        validate_name(&self.name, "Feature")
    }
}
