use featherstore::entity::Entity;
use featherstore::error::FeatureStoreError;
use featherstore::feature::Feature;
use featherstore::feature_view::FeatureView;
use featherstore::offline::{OfflineStore, ParquetOfflineStore};
use featherstore::source::{FileFormat, FileSource, SourceSpec};
use featherstore::types::{FeatureReference, ValueType};
use polars::prelude::*;
use std::fs;
use std::path::{Path, PathBuf};

fn test_dir(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!(
        "featherstore_{}_{}",
        name,
        uuid::Uuid::new_v4().simple()
    ));
    fs::create_dir_all(&dir).unwrap();
    dir
}

fn write_parquet(path: &Path, mut df: DataFrame) {
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    let mut file = fs::File::create(path).unwrap();
    ParquetWriter::new(&mut file).finish(&mut df).unwrap();
}

/// Driver 1001: conv_rate 0.80 at t0, 0.85 at t1 > t0. Driver 1002 has a
/// single early row.
fn driver_stats_fixture(dir: &Path) -> FeatureView {
    let source_path = dir.join("data/driver_stats.parquet");
    write_parquet(
        &source_path,
        df![
            "driver_id" => [1001i64, 1001, 1002],
            "event_timestamp" => [
                "2025-03-01 10:00:00",
                "2025-03-02 10:00:00",
                "2025-03-01 08:00:00"
            ],
            "created" => [
                "2025-03-01 10:01:00",
                "2025-03-02 10:01:00",
                "2025-03-01 08:01:00"
            ],
            "conv_rate" => [0.80f64, 0.85, 0.70],
            "acc_rate" => [0.95f64, 0.96, 0.90]
        ]
        .unwrap(),
    );

    FeatureView::new(
        "driver_stats",
        vec![Entity::new("driver_id", ValueType::Int64)],
        vec![
            Feature::new("conv_rate", ValueType::Double),
            Feature::new("acc_rate", ValueType::Double),
        ],
        SourceSpec::File(
            FileSource::new("driver_stats_source", &source_path, FileFormat::Parquet)
                .with_timestamp_field("event_timestamp")
                .with_created_timestamp_column("created"),
        ),
    )
}

fn f64_column(df: &DataFrame, name: &str) -> Vec<Option<f64>> {
    df.column(name).unwrap().f64().unwrap().into_iter().collect()
}

#[tokio::test]
async fn returns_value_in_effect_at_each_asof_timestamp() {
    let dir = test_dir("asof");
    let view = driver_stats_fixture(&dir);
    let store = ParquetOfflineStore::new(&dir);

    let entity_df = df![
        "driver_id" => [1001i64, 1001],
        "event_timestamp" => ["2025-03-01 12:00:00", "2025-03-02 12:00:00"]
    ]
    .unwrap();

    let result = store
        .get_historical_features(
            &entity_df,
            &[view],
            &[FeatureReference::new("driver_stats", "conv_rate")],
        )
        .await
        .unwrap();

    assert_eq!(f64_column(&result, "conv_rate"), vec![Some(0.80), Some(0.85)]);

    // Entity columns first, then the requested feature.
    assert_eq!(
        result.get_column_names(),
        vec!["driver_id", "event_timestamp", "conv_rate"]
    );
}

#[tokio::test]
async fn never_leaks_values_from_after_the_asof_timestamp() {
    let dir = test_dir("no_lookahead");
    let view = driver_stats_fixture(&dir);
    let store = ParquetOfflineStore::new(&dir);

    // As of just before t0 nothing is known yet for driver 1001.
    let entity_df = df![
        "driver_id" => [1001i64],
        "event_timestamp" => ["2025-03-01 09:59:59"]
    ]
    .unwrap();

    let result = store
        .get_historical_features(
            &entity_df,
            &[view],
            &[FeatureReference::new("driver_stats", "conv_rate")],
        )
        .await
        .unwrap();

    assert_eq!(result.column("conv_rate").unwrap().null_count(), 1);
}

#[tokio::test]
async fn unmatched_entities_get_nulls_for_every_feature() {
    let dir = test_dir("unmatched");
    let view = driver_stats_fixture(&dir);
    let store = ParquetOfflineStore::new(&dir);

    let entity_df = df![
        "driver_id" => [9999i64],
        "event_timestamp" => ["2025-03-05 00:00:00"]
    ]
    .unwrap();

    let result = store
        .get_historical_features(
            &entity_df,
            &[view],
            &[
                FeatureReference::new("driver_stats", "conv_rate"),
                FeatureReference::new("driver_stats", "acc_rate"),
            ],
        )
        .await
        .unwrap();

    assert_eq!(result.height(), 1);
    assert_eq!(result.column("conv_rate").unwrap().null_count(), 1);
    assert_eq!(result.column("acc_rate").unwrap().null_count(), 1);
}

#[tokio::test]
async fn features_from_multiple_views_keep_request_order() {
    let dir = test_dir("multi_view");
    let driver_view = driver_stats_fixture(&dir);

    let orders_path = dir.join("data/driver_orders.parquet");
    write_parquet(
        &orders_path,
        df![
            "driver_id" => [1001i64],
            "event_timestamp" => ["2025-03-01 06:00:00"],
            "order_count" => [42i64]
        ]
        .unwrap(),
    );
    let orders_view = FeatureView::new(
        "driver_orders",
        vec![Entity::new("driver_id", ValueType::Int64)],
        vec![Feature::new("order_count", ValueType::Int64)],
        SourceSpec::File(
            FileSource::new("driver_orders_source", &orders_path, FileFormat::Parquet)
                .with_timestamp_field("event_timestamp"),
        ),
    );

    let store = ParquetOfflineStore::new(&dir);
    let entity_df = df![
        "driver_id" => [1001i64],
        "event_timestamp" => ["2025-03-01 12:00:00"]
    ]
    .unwrap();

    let result = store
        .get_historical_features(
            &entity_df,
            &[driver_view, orders_view],
            &[
                FeatureReference::new("driver_stats", "acc_rate"),
                FeatureReference::new("driver_orders", "order_count"),
                FeatureReference::new("driver_stats", "conv_rate"),
            ],
        )
        .await
        .unwrap();

    // Views grouped by first reference, features in request order within
    // each view.
    assert_eq!(
        result.get_column_names(),
        vec!["driver_id", "event_timestamp", "acc_rate", "conv_rate", "order_count"]
    );
    assert_eq!(f64_column(&result, "acc_rate"), vec![Some(0.95)]);
    let orders: Vec<Option<i64>> = result
        .column("order_count")
        .unwrap()
        .i64()
        .unwrap()
        .into_iter()
        .collect();
    assert_eq!(orders, vec![Some(42)]);
}

#[tokio::test]
async fn rejects_empty_entity_frames_and_bad_references() {
    let dir = test_dir("validation");
    let view = driver_stats_fixture(&dir);
    let store = ParquetOfflineStore::new(&dir);

    let empty = DataFrame::empty();
    let err = store
        .get_historical_features(
            &empty,
            std::slice::from_ref(&view),
            &[FeatureReference::new("driver_stats", "conv_rate")],
        )
        .await
        .unwrap_err();
    assert!(matches!(err, FeatureStoreError::Validation(_)));

    let entity_df = df![
        "driver_id" => [1001i64],
        "event_timestamp" => ["2025-03-01 12:00:00"]
    ]
    .unwrap();

    let unknown_view = store
        .get_historical_features(
            &entity_df,
            std::slice::from_ref(&view),
            &[FeatureReference::new("customer_stats", "conv_rate")],
        )
        .await
        .unwrap_err();
    assert!(unknown_view.to_string().contains("customer_stats"));

    let unknown_feature = store
        .get_historical_features(
            &entity_df,
            std::slice::from_ref(&view),
            &[FeatureReference::new("driver_stats", "no_such_feature")],
        )
        .await
        .unwrap_err();
    assert!(unknown_feature.to_string().contains("no_such_feature"));

    // Entity frame lacking the view's join key.
    let missing_key = df![
        "customer_id" => [1i64],
        "event_timestamp" => ["2025-03-01 12:00:00"]
    ]
    .unwrap();
    let err = store
        .get_historical_features(
            &missing_key,
            std::slice::from_ref(&view),
            &[FeatureReference::new("driver_stats", "conv_rate")],
        )
        .await
        .unwrap_err();
    assert!(matches!(err, FeatureStoreError::Validation(_)));

    // Entity frame lacking the as-of timestamp column.
    let missing_asof = df!["driver_id" => [1001i64]].unwrap();
    let err = store
        .get_historical_features(
            &missing_asof,
            std::slice::from_ref(&view),
            &[FeatureReference::new("driver_stats", "conv_rate")],
        )
        .await
        .unwrap_err();
    assert!(err.to_string().contains("event_timestamp"));
}

#[tokio::test]
async fn pull_latest_keeps_newest_row_per_entity_within_window() {
    let dir = test_dir("pull_latest");
    let view = driver_stats_fixture(&dir);
    let store = ParquetOfflineStore::new(&dir);

    let end = "2025-03-01T23:59:59Z".parse().unwrap();
    let snapshot = store
        .pull_latest_from_source(&view, None, Some(end))
        .await
        .unwrap();

    // Driver 1001's second row (t1) is outside the window; one row per
    // driver survives.
    assert_eq!(snapshot.height(), 2);
    let mut pairs: Vec<(Option<i64>, Option<f64>)> = snapshot
        .column("driver_id")
        .unwrap()
        .i64()
        .unwrap()
        .into_iter()
        .zip(snapshot.column("conv_rate").unwrap().f64().unwrap())
        .collect();
    pairs.sort_by_key(|(id, _)| *id);
    assert_eq!(pairs, vec![(Some(1001), Some(0.80)), (Some(1002), Some(0.70))]);
}

#[tokio::test]
async fn pull_latest_without_timestamp_field_returns_rows_unchanged() {
    let dir = test_dir("no_timestamp");
    let source_path = dir.join("data/static_stats.parquet");
    write_parquet(
        &source_path,
        df![
            "driver_id" => [1001i64, 1001],
            "tier" => ["gold", "silver"]
        ]
        .unwrap(),
    );

    let view = FeatureView::new(
        "static_stats",
        vec![Entity::new("driver_id", ValueType::Int64)],
        vec![Feature::new("tier", ValueType::String)],
        SourceSpec::File(FileSource::new("static_source", &source_path, FileFormat::Parquet)),
    );

    let store = ParquetOfflineStore::new(&dir);
    let snapshot = store.pull_latest_from_source(&view, None, None).await.unwrap();
    assert_eq!(snapshot.height(), 2);
}
