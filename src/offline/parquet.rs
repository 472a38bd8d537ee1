//! Parquet-backed offline store.
//!
//! Historical retrieval joins feature-view sources against a caller
//! entity frame with point-in-time semantics; logged and batch writes land
//! as parquet files under the store root.

use crate::error::{FeatureStoreError, Result};
use crate::feature_view::FeatureView;
use crate::offline::join::{latest_per_entity, point_in_time_join, ROW_INDEX_COLUMN};
use crate::offline::{OfflineStore, ProgressCallback};
use crate::types::FeatureReference;
use crate::validation::require_columns;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use polars::prelude::*;
use std::collections::{HashMap, HashSet};
use std::fs::File;
use std::path::PathBuf;
use tracing::{debug, info};
use uuid::Uuid;

/// Rows per parquet chunk in batch writes.
const BATCH_CHUNK_ROWS: usize = 10_000;

pub struct ParquetOfflineStore {
    root: PathBuf,
}

impl ParquetOfflineStore {
    /// `root` anchors the `logs/` and `batch/` output trees.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Validate references against the supplied views and group feature
    /// names by view, preserving first-reference order.
    fn group_references<'a>(
        feature_views: &'a [FeatureView],
        feature_refs: &[FeatureReference],
    ) -> Result<Vec<(&'a FeatureView, Vec<String>)>> {
        let mut order: Vec<&str> = Vec::new();
        let mut grouped: HashMap<&str, Vec<String>> = HashMap::new();

        for reference in feature_refs {
            let view = feature_views
                .iter()
                .find(|v| v.name == reference.feature_view_name)
                .ok_or_else(|| {
                    FeatureStoreError::Validation(format!(
                        "Feature view '{}' not found among the supplied views",
                        reference.feature_view_name
                    ))
                })?;
            if view.feature(&reference.feature_name).is_none() {
                return Err(FeatureStoreError::Validation(format!(
                    "Feature '{}' not found in feature view '{}'",
                    reference.feature_name, reference.feature_view_name
                )));
            }

            if !grouped.contains_key(view.name.as_str()) {
                order.push(view.name.as_str());
            }
            grouped
                .entry(view.name.as_str())
                .or_default()
                .push(reference.feature_name.clone());
        }

        Ok(order
            .into_iter()
            .map(|name| {
                let view = feature_views.iter().find(|v| v.name == name).unwrap();
                (view, grouped.remove(name).unwrap())
            })
            .collect())
    }

    /// Attach one view's features to the accumulated (row-indexed) frame.
    fn attach_view_features(
        &self,
        acc: DataFrame,
        view: &FeatureView,
        features: &[String],
    ) -> Result<DataFrame> {
        let join_keys = view.join_keys();
        require_columns(&acc, &join_keys, "entity frame")?;

        let mut wanted: Vec<String> = join_keys.clone();
        wanted.extend(features.iter().cloned());
        if let Some(field) = view.source.timestamp_field() {
            wanted.push(field.to_string());
        }
        if let Some(column) = view.source.created_timestamp_column() {
            wanted.push(column.to_string());
        }

        let source_df = view.source.as_source().read(None, None, Some(&wanted))?;
        require_columns(
            &source_df,
            &join_keys,
            &format!("source data for feature view '{}'", view.name),
        )?;
        require_columns(
            &source_df,
            features,
            &format!("source data for feature view '{}'", view.name),
        )?;

        match view.source.timestamp_field() {
            Some(field) => {
                if acc.column(field).is_err() {
                    return Err(FeatureStoreError::Validation(format!(
                        "Entity frame is missing the as-of timestamp column '{}' required by feature view '{}'",
                        field, view.name
                    )));
                }
                let created = view
                    .source
                    .created_timestamp_column()
                    .filter(|c| source_df.column(c).is_ok());
                point_in_time_join(&acc, source_df, &join_keys, field, created, features)
            }
            None => {
                // No event time declared: all rows are equally current.
                let mut keep: Vec<Expr> = join_keys.iter().map(|k| col(k)).collect();
                keep.extend(features.iter().map(|f| col(f)));
                let on: Vec<Expr> = join_keys.iter().map(|k| col(k)).collect();

                acc.lazy()
                    .join(
                        source_df.lazy().select(keep),
                        on.clone(),
                        on,
                        JoinArgs::new(JoinType::Left),
                    )
                    .sort_by_exprs(
                        [col(ROW_INDEX_COLUMN)],
                        SortMultipleOptions::default().with_maintain_order(true),
                    )
                    .collect()
                    .map_err(|e| {
                        FeatureStoreError::Polars(format!(
                            "Join against feature view '{}' failed: {}",
                            view.name, e
                        ))
                    })
            }
        }
    }
}

#[async_trait]
impl OfflineStore for ParquetOfflineStore {
    async fn get_historical_features(
        &self,
        entity_df: &DataFrame,
        feature_views: &[FeatureView],
        feature_refs: &[FeatureReference],
    ) -> Result<DataFrame> {
        if entity_df.height() == 0 {
            return Err(FeatureStoreError::Validation(
                "Entity frame cannot be empty".to_string(),
            ));
        }

        let grouped = Self::group_references(feature_views, feature_refs)?;

        // Requested feature names become output columns; collisions with the
        // entity frame or each other would be ambiguous, so fail early.
        let mut seen: HashSet<String> = entity_df
            .get_column_names()
            .iter()
            .map(|s| s.to_string())
            .collect();
        for reference in feature_refs {
            if !seen.insert(reference.feature_name.clone()) {
                return Err(FeatureStoreError::Validation(format!(
                    "Duplicate output column '{}' in historical feature request",
                    reference.feature_name
                )));
            }
        }

        let mut acc = entity_df
            .with_row_index(ROW_INDEX_COLUMN, None)
            .map_err(|e| FeatureStoreError::Polars(format!("Failed to index entity frame: {}", e)))?;

        for (view, features) in &grouped {
            debug!(view = %view.name, features = features.len(), "joining historical features");
            acc = self.attach_view_features(acc, view, features)?;
        }

        acc.drop(ROW_INDEX_COLUMN)
            .map_err(|e| FeatureStoreError::Polars(format!("Failed to drop index column: {}", e)))
    }

    async fn pull_latest_from_source(
        &self,
        view: &FeatureView,
        start_date: Option<DateTime<Utc>>,
        end_date: Option<DateTime<Utc>>,
    ) -> Result<DataFrame> {
        let source = view.source.as_source();
        let df = source.read(start_date, end_date, None)?;

        match source.timestamp_field() {
            Some(field) if df.height() > 0 => {
                let join_keys = view.join_keys();
                require_columns(
                    &df,
                    &join_keys,
                    &format!("source data for feature view '{}'", view.name),
                )?;
                if df.column(field).is_err() {
                    return Err(FeatureStoreError::Validation(format!(
                        "Timestamp field '{}' not found in source data for feature view '{}'",
                        field, view.name
                    )));
                }
                let created = source
                    .created_timestamp_column()
                    .filter(|c| df.column(c).is_ok());
                latest_per_entity(df, &join_keys, field, created)
            }
            _ => Ok(df),
        }
    }

    async fn write_logged_features(&self, view: &FeatureView, df: &DataFrame) -> Result<()> {
        let dir = self.root.join("logs").join(&view.name);
        std::fs::create_dir_all(&dir)?;

        let stamp = Utc::now().format("%Y%m%dT%H%M%S");
        let suffix = Uuid::new_v4().simple().to_string();
        let path = dir.join(format!("logged_{}_{}.parquet", stamp, &suffix[..8]));

        let mut file = File::create(&path)?;
        let mut out = df.clone();
        ParquetWriter::new(&mut file)
            .finish(&mut out)
            .map_err(|e| FeatureStoreError::Polars(format!("Failed to write {}: {}", path.display(), e)))?;

        info!(view = %view.name, rows = df.height(), path = %path.display(), "logged features");
        Ok(())
    }

    async fn write_batch(
        &self,
        view: &FeatureView,
        df: &DataFrame,
        progress: Option<ProgressCallback>,
    ) -> Result<()> {
        let dir = self
            .root
            .join("batch")
            .join(&view.name)
            .join(Utc::now().format("%Y%m%d").to_string());
        std::fs::create_dir_all(&dir)?;

        let total = df.height();
        let mut written = 0usize;
        let mut offset = 0usize;

        while offset < total {
            let length = BATCH_CHUNK_ROWS.min(total - offset);
            let mut chunk = df.slice(offset as i64, length);

            // Chunk paths are a pure function of the row offset, so a failed
            // batch can be resubmitted and overwrite its own prefix.
            let path = dir.join(format!("part-{:08}.parquet", offset));
            let mut file = File::create(&path)?;
            ParquetWriter::new(&mut file)
                .finish(&mut chunk)
                .map_err(|e| {
                    FeatureStoreError::Polars(format!("Failed to write {}: {}", path.display(), e))
                })?;

            written += length;
            if let Some(callback) = &progress {
                callback(written, total);
            }
            offset += length;
        }

        info!(view = %view.name, rows = total, chunks = total.div_ceil(BATCH_CHUNK_ROWS), "wrote batch");
        Ok(())
    }
}
