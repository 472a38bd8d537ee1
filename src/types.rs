//! Core value types and feature references.

use crate::error::{FeatureStoreError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Value types for features and entity join keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueType {
    Unknown,
    Bytes,
    String,
    Int32,
    Int64,
    Double,
    Float,
    Bool,
    UnixTimestamp,
    BytesList,
    StringList,
    Int32List,
    Int64List,
    DoubleList,
    FloatList,
    BoolList,
    UnixTimestampList,
}

impl ValueType {
    pub fn is_list(self) -> bool {
        matches!(
            self,
            Self::BytesList
                | Self::StringList
                | Self::Int32List
                | Self::Int64List
                | Self::DoubleList
                | Self::FloatList
                | Self::BoolList
                | Self::UnixTimestampList
        )
    }
}

/// Reference to a single feature inside a feature view.
///
/// Canonical string form is `<feature_view>:<feature>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FeatureReference {
    pub feature_view_name: String,
    pub feature_name: String,
}

impl FeatureReference {
    pub fn new(feature_view_name: impl Into<String>, feature_name: impl Into<String>) -> Self {
        Self {
            feature_view_name: feature_view_name.into(),
            feature_name: feature_name.into(),
        }
    }
}

impl fmt::Display for FeatureReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.feature_view_name, self.feature_name)
    }
}

impl FromStr for FeatureReference {
    type Err = FeatureStoreError;

    fn from_str(s: &str) -> Result<Self> {
        match s.split_once(':') {
            Some((view, feature)) if !view.is_empty() && !feature.is_empty() => {
                Ok(Self::new(view, feature))
            }
            _ => Err(FeatureStoreError::Validation(format!(
                "Invalid feature reference '{}': expected '<feature_view>:<feature>'",
                s
            ))),
        }
    }
}
