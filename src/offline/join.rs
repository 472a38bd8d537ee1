//! Columnar temporal-join primitives.
//!
//! Both operations here work on fixed-schema frames with lazy plans: order
//! by timestamp, then stable-dedup on the grouping columns. Ties beyond the
//! created column resolve by input order, which keeps repeated runs over the
//! same input deterministic.

use crate::convert::datetime_expr;
use crate::error::{FeatureStoreError, Result};
use polars::prelude::*;

/// Name of the row-index column threaded through historical retrieval so
/// picked feature rows can be joined back to their entity row.
pub const ROW_INDEX_COLUMN: &str = "__entity_row";

const ASOF_COLUMN: &str = "__asof_ts";

/// For every indexed entity row, select the single source row whose event
/// time is the latest not exceeding that row's as-of timestamp, and attach
/// its feature columns. Entity rows without a match get nulls.
///
/// `indexed_entity_df` must carry [`ROW_INDEX_COLUMN`], the join keys and an
/// as-of column named like `timestamp_field`.
pub fn point_in_time_join(
    indexed_entity_df: &DataFrame,
    source_df: DataFrame,
    join_keys: &[String],
    timestamp_field: &str,
    created_column: Option<&str>,
    features: &[String],
) -> Result<DataFrame> {
    let entity_time = datetime_expr(indexed_entity_df, timestamp_field)?;
    let source_time = datetime_expr(&source_df, timestamp_field)?;

    // Entity side: row index, join keys and the as-of timestamp under a
    // reserved name, so the source's event-time column keeps its own.
    let mut left_columns: Vec<Expr> = vec![col(ROW_INDEX_COLUMN)];
    left_columns.extend(join_keys.iter().map(|k| col(k)));
    left_columns.push(entity_time.alias(ASOF_COLUMN));
    let left = indexed_entity_df.clone().lazy().select(left_columns);

    let source = source_df
        .lazy()
        .with_columns([source_time.alias(timestamp_field)]);

    let on: Vec<Expr> = join_keys.iter().map(|k| col(k)).collect();
    let candidates = left
        .join(source, on.clone(), on, JoinArgs::new(JoinType::Inner))
        .filter(col(timestamp_field).lt_eq(col(ASOF_COLUMN)));

    let mut sort_columns = vec![col(ROW_INDEX_COLUMN), col(timestamp_field)];
    let mut descending = vec![false, true];
    if let Some(created) = created_column {
        sort_columns.push(col(created));
        descending.push(true);
    }

    let mut picked_columns: Vec<Expr> = vec![col(ROW_INDEX_COLUMN)];
    picked_columns.extend(features.iter().map(|f| col(f)));

    let picked = candidates
        .sort_by_exprs(
            sort_columns,
            SortMultipleOptions::default()
                .with_order_descendings(descending)
                .with_maintain_order(true),
        )
        .unique_stable(
            Some(vec![ROW_INDEX_COLUMN.to_string()]),
            UniqueKeepStrategy::First,
        )
        .select(picked_columns);

    // Joins do not promise to keep row order; restore entity-frame order
    // explicitly.
    indexed_entity_df
        .clone()
        .lazy()
        .join(
            picked,
            [col(ROW_INDEX_COLUMN)],
            [col(ROW_INDEX_COLUMN)],
            JoinArgs::new(JoinType::Left),
        )
        .sort_by_exprs(
            [col(ROW_INDEX_COLUMN)],
            SortMultipleOptions::default().with_maintain_order(true),
        )
        .collect()
        .map_err(|e| FeatureStoreError::Polars(format!("Point-in-time join failed: {}", e)))
}

/// Keep, per distinct join-key combination, only the row with the maximum
/// event time (created column breaking ties).
pub fn latest_per_entity(
    df: DataFrame,
    join_keys: &[String],
    timestamp_field: &str,
    created_column: Option<&str>,
) -> Result<DataFrame> {
    if df.height() == 0 {
        return Ok(df);
    }

    let event_time = datetime_expr(&df, timestamp_field)?;

    let mut sort_columns: Vec<Expr> = join_keys.iter().map(|k| col(k)).collect();
    let mut descending = vec![false; join_keys.len()];
    sort_columns.push(event_time);
    descending.push(true);
    if let Some(created) = created_column {
        sort_columns.push(col(created));
        descending.push(true);
    }

    df.lazy()
        .sort_by_exprs(
            sort_columns,
            SortMultipleOptions::default()
                .with_order_descendings(descending)
                .with_maintain_order(true),
        )
        .unique_stable(Some(join_keys.to_vec()), UniqueKeepStrategy::First)
        .collect()
        .map_err(|e| FeatureStoreError::Polars(format!("Latest-snapshot extraction failed: {}", e)))
}
