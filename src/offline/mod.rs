//! Offline store: point-in-time-correct historical retrieval and
//! latest-snapshot extraction over a feature view's data source.

pub mod join;
pub mod parquet;

use crate::error::Result;
use crate::feature_view::FeatureView;
use crate::types::FeatureReference;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use polars::prelude::DataFrame;

pub use parquet::ParquetOfflineStore;

/// Reports cumulative rows written after each committed chunk.
pub type ProgressCallback = Box<dyn Fn(usize, usize) + Send + Sync>;

#[async_trait]
pub trait OfflineStore: Send + Sync {
    /// Join historical feature values onto the entity frame, returning for
    /// every entity row exactly the values valid at that row's as-of
    /// timestamp. Entity-frame columns come first, then features in request
    /// order grouped by first-referenced view.
    async fn get_historical_features(
        &self,
        entity_df: &DataFrame,
        feature_views: &[FeatureView],
        feature_refs: &[FeatureReference],
    ) -> Result<DataFrame>;

    /// Read the view's source restricted to `[start_date, end_date]`, then
    /// keep the most recent row per join-key combination. A view without a
    /// timestamp field returns the filtered rows unchanged.
    async fn pull_latest_from_source(
        &self,
        view: &FeatureView,
        start_date: Option<DateTime<Utc>>,
        end_date: Option<DateTime<Utc>>,
    ) -> Result<DataFrame>;

    /// Append observed feature rows, partitioned by view and write time.
    async fn write_logged_features(&self, view: &FeatureView, df: &DataFrame) -> Result<()>;

    /// Append bulk-computed rows in fixed-size chunks with deterministic
    /// per-offset paths, reporting progress as chunks commit.
    async fn write_batch(
        &self,
        view: &FeatureView,
        df: &DataFrame,
        progress: Option<ProgressCallback>,
    ) -> Result<()>;
}
