//! Online store: low-latency storage of current feature values keyed by
//! entity identity.

pub mod memory;

use crate::error::Result;
use crate::feature_view::FeatureView;
use chrono::{DateTime, Utc};
use polars::prelude::DataFrame;
use std::collections::HashMap;

pub use memory::MemoryOnlineStore;

/// One entity row on the serving path: join-key values (plus any extra
/// caller columns) as dynamic JSON values.
pub type EntityRow = HashMap<String, serde_json::Value>;

pub trait OnlineStore: Send + Sync {
    /// Write one record per row, replacing the stored record for that entity
    /// key entirely. Rows must carry every join key, the declared timestamp
    /// field (if any) and every declared feature. `timestamp` defaults to
    /// now and is stamped per record.
    fn write_features(
        &self,
        view: &FeatureView,
        df: &DataFrame,
        timestamp: Option<DateTime<Utc>>,
    ) -> Result<()>;

    /// Read requested features for each entity row, one aligned output row
    /// per input row. An absent view, entity or feature reads as null,
    /// never as an error.
    fn read_features(
        &self,
        view: &FeatureView,
        entity_rows: &[EntityRow],
        feature_names: Option<&[String]>,
    ) -> Result<DataFrame>;

    /// Drop every record of the view, atomically with respect to readers.
    fn delete_features(&self, view: &FeatureView) -> Result<()>;

    /// Clear all state across all feature views. Idempotent.
    fn teardown(&self) -> Result<()>;
}
