//! In-memory online store.
//!
//! A concurrent map keyed by feature-view name; each view entry owns its
//! entity records. Writes take the view entry exclusively, so a concurrent
//! reader observes a record either before or after a write, never mixed, and
//! a view delete removes the whole entry at once.

use crate::convert::{dataframe_to_rows, rows_to_dataframe};
use crate::error::{FeatureStoreError, Result};
use crate::feature_view::FeatureView;
use crate::key::entity_key;
use crate::online::{EntityRow, OnlineStore};
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use polars::prelude::DataFrame;
use std::collections::HashMap;
use tracing::debug;

#[derive(Debug, Clone)]
struct StoredRecord {
    values: HashMap<String, serde_json::Value>,
    updated_at: DateTime<Utc>,
}

#[derive(Debug, Default)]
struct ViewRecords {
    rows: HashMap<String, StoredRecord>,
}

#[derive(Debug, Default)]
pub struct MemoryOnlineStore {
    views: DashMap<String, ViewRecords>,
}

impl MemoryOnlineStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entity_count(&self, view_name: &str) -> usize {
        self.views.get(view_name).map(|v| v.rows.len()).unwrap_or(0)
    }

    pub fn view_names(&self) -> Vec<String> {
        self.views.iter().map(|entry| entry.key().clone()).collect()
    }

    /// Last write timestamp for one entity key, if the record exists.
    pub fn record_timestamp(&self, view_name: &str, key: &str) -> Option<DateTime<Utc>> {
        self.views
            .get(view_name)
            .and_then(|v| v.rows.get(key).map(|r| r.updated_at))
    }

    fn validate_write(&self, view: &FeatureView, df: &DataFrame) -> Result<()> {
        let mut required = view.join_keys();
        if let Some(field) = view.source.timestamp_field() {
            required.push(field.to_string());
        }
        required.extend(view.feature_names());
        crate::validation::require_columns(df, &required, &format!("feature data for '{}'", view.name))
    }
}

impl OnlineStore for MemoryOnlineStore {
    fn write_features(
        &self,
        view: &FeatureView,
        df: &DataFrame,
        timestamp: Option<DateTime<Utc>>,
    ) -> Result<()> {
        self.validate_write(view, df)?;

        let timestamp = timestamp.unwrap_or_else(Utc::now);
        let join_keys = view.join_keys();
        let feature_names = view.feature_names();
        let rows = dataframe_to_rows(df)?;

        let mut records = self.views.entry(view.name.clone()).or_default();
        for row in &rows {
            let key = entity_key(row, &join_keys)?;

            let mut values = HashMap::with_capacity(feature_names.len());
            for feature_name in &feature_names {
                if let Some(value) = row.get(feature_name) {
                    values.insert(feature_name.clone(), value.clone());
                }
            }

            records.rows.insert(
                key,
                StoredRecord {
                    values,
                    updated_at: timestamp,
                },
            );
        }

        debug!(view = %view.name, rows = rows.len(), "wrote online records");
        Ok(())
    }

    fn read_features(
        &self,
        view: &FeatureView,
        entity_rows: &[EntityRow],
        feature_names: Option<&[String]>,
    ) -> Result<DataFrame> {
        let join_keys = view.join_keys();
        for (idx, row) in entity_rows.iter().enumerate() {
            for key in &join_keys {
                if !row.contains_key(key) {
                    return Err(FeatureStoreError::Validation(format!(
                        "Entity row {} missing join key '{}'",
                        idx, key
                    )));
                }
            }
        }

        let requested: Vec<String> = match feature_names {
            Some(names) => names.to_vec(),
            None => view.feature_names(),
        };

        // Output columns: join keys in view order, extra caller columns in
        // sorted order, then the requested features.
        let mut columns: Vec<String> = join_keys.clone();
        let mut extra: Vec<String> = entity_rows
            .iter()
            .flat_map(|row| row.keys().cloned())
            .filter(|name| !join_keys.contains(name) && !requested.contains(name))
            .collect();
        extra.sort();
        extra.dedup();
        columns.extend(extra);
        columns.extend(requested.iter().cloned());

        let records = self.views.get(&view.name);
        let mut output_rows = Vec::with_capacity(entity_rows.len());
        for row in entity_rows {
            let key = entity_key(row, &join_keys)?;
            let mut output = row.clone();

            let stored = records.as_ref().and_then(|v| v.rows.get(&key));
            for feature_name in &requested {
                let value = stored
                    .and_then(|record| record.values.get(feature_name).cloned())
                    .unwrap_or(serde_json::Value::Null);
                output.insert(feature_name.clone(), value);
            }
            output_rows.push(output);
        }
        drop(records);

        rows_to_dataframe(&output_rows, &columns)
    }

    fn delete_features(&self, view: &FeatureView) -> Result<()> {
        self.views.remove(&view.name);
        debug!(view = %view.name, "deleted online records");
        Ok(())
    }

    fn teardown(&self) -> Result<()> {
        self.views.clear();
        Ok(())
    }
}
