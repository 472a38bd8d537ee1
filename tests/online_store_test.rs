use featherstore::entity::Entity;
use featherstore::error::FeatureStoreError;
use featherstore::feature::Feature;
use featherstore::feature_view::FeatureView;
use featherstore::online::{EntityRow, MemoryOnlineStore, OnlineStore};
use featherstore::source::{FileFormat, FileSource, SourceSpec};
use featherstore::types::ValueType;
use polars::prelude::*;
use serde_json::json;
use std::collections::HashMap;

fn driver_view() -> FeatureView {
    FeatureView::new(
        "driver_stats",
        vec![Entity::new("driver_id", ValueType::Int64)],
        vec![
            Feature::new("conv_rate", ValueType::Double),
            Feature::new("acc_rate", ValueType::Double),
        ],
        SourceSpec::File(
            FileSource::new("driver_stats_source", "data/driver_stats.parquet", FileFormat::Parquet)
                .with_timestamp_field("event_timestamp"),
        ),
    )
}

fn feature_df() -> DataFrame {
    df![
        "driver_id" => [1001i64, 1002],
        "event_timestamp" => ["2025-03-01 10:00:00", "2025-03-01 11:00:00"],
        "conv_rate" => [0.80f64, 0.70],
        "acc_rate" => [0.95f64, 0.90]
    ]
    .unwrap()
}

fn entity_row(driver_id: i64) -> EntityRow {
    HashMap::from([("driver_id".to_string(), json!(driver_id))])
}

fn f64_at(df: &DataFrame, name: &str, idx: usize) -> Option<f64> {
    df.column(name).unwrap().f64().unwrap().get(idx)
}

#[test]
fn read_returns_exactly_what_was_written() {
    let store = MemoryOnlineStore::new();
    let view = driver_view();
    store.write_features(&view, &feature_df(), None).unwrap();

    let result = store
        .read_features(&view, &[entity_row(1001), entity_row(1002)], None)
        .unwrap();

    assert_eq!(result.height(), 2);
    assert_eq!(f64_at(&result, "conv_rate", 0), Some(0.80));
    assert_eq!(f64_at(&result, "acc_rate", 0), Some(0.95));
    assert_eq!(f64_at(&result, "conv_rate", 1), Some(0.70));
}

#[test]
fn absent_entities_are_null_rows_not_errors() {
    let store = MemoryOnlineStore::new();
    let view = driver_view();
    store.write_features(&view, &feature_df(), None).unwrap();

    let result = store
        .read_features(&view, &[entity_row(1001), entity_row(9999)], None)
        .unwrap();

    assert_eq!(result.height(), 2);
    assert_eq!(f64_at(&result, "conv_rate", 0), Some(0.80));
    assert_eq!(f64_at(&result, "conv_rate", 1), None);
    assert_eq!(f64_at(&result, "acc_rate", 1), None);
}

#[test]
fn reading_an_unmaterialized_view_yields_all_nulls() {
    let store = MemoryOnlineStore::new();
    let view = driver_view();

    let result = store.read_features(&view, &[entity_row(1001)], None).unwrap();
    assert_eq!(result.height(), 1);
    assert_eq!(result.column("conv_rate").unwrap().null_count(), 1);
}

#[test]
fn writing_twice_is_idempotent() {
    let store = MemoryOnlineStore::new();
    let view = driver_view();
    let timestamp = "2025-03-01T12:00:00Z".parse().unwrap();

    store.write_features(&view, &feature_df(), Some(timestamp)).unwrap();
    store.write_features(&view, &feature_df(), Some(timestamp)).unwrap();

    assert_eq!(store.entity_count("driver_stats"), 2);
    let result = store.read_features(&view, &[entity_row(1001)], None).unwrap();
    assert_eq!(f64_at(&result, "conv_rate", 0), Some(0.80));
}

#[test]
fn a_later_write_replaces_the_whole_record() {
    let store = MemoryOnlineStore::new();
    let view = driver_view();
    store.write_features(&view, &feature_df(), None).unwrap();

    let update = df![
        "driver_id" => [1001i64],
        "event_timestamp" => ["2025-03-02 10:00:00"],
        "conv_rate" => [0.85f64],
        "acc_rate" => [0.97f64]
    ]
    .unwrap();
    store.write_features(&view, &update, None).unwrap();

    let result = store.read_features(&view, &[entity_row(1001)], None).unwrap();
    assert_eq!(f64_at(&result, "conv_rate", 0), Some(0.85));
    assert_eq!(f64_at(&result, "acc_rate", 0), Some(0.97));
}

#[test]
fn delete_removes_all_records_for_the_view() {
    let store = MemoryOnlineStore::new();
    let view = driver_view();
    store.write_features(&view, &feature_df(), None).unwrap();

    store.delete_features(&view).unwrap();

    let result = store
        .read_features(&view, &[entity_row(1001), entity_row(1002)], None)
        .unwrap();
    assert_eq!(result.column("conv_rate").unwrap().null_count(), 2);
}

#[test]
fn teardown_clears_every_view_and_is_idempotent() {
    let store = MemoryOnlineStore::new();
    let view = driver_view();
    store.write_features(&view, &feature_df(), None).unwrap();

    store.teardown().unwrap();
    store.teardown().unwrap();

    assert!(store.view_names().is_empty());
}

#[test]
fn key_construction_is_column_order_independent() {
    let location = Entity::with_join_keys(
        "location",
        ValueType::Int64,
        vec!["region_id".to_string(), "zone_id".to_string()],
    );
    let view = FeatureView::new(
        "zone_stats",
        vec![location],
        vec![Feature::new("demand", ValueType::Double)],
        SourceSpec::File(FileSource::new("zone_source", "data/zones.parquet", FileFormat::Parquet)),
    );

    let store = MemoryOnlineStore::new();
    let rows = df![
        "region_id" => [7i64],
        "zone_id" => [3i64],
        "demand" => [0.5f64]
    ]
    .unwrap();
    store.write_features(&view, &rows, None).unwrap();

    // Same join-key values, opposite insertion order.
    let reversed: EntityRow = HashMap::from([
        ("zone_id".to_string(), json!(3)),
        ("region_id".to_string(), json!(7)),
    ]);
    let result = store.read_features(&view, &[reversed], None).unwrap();
    assert_eq!(f64_at(&result, "demand", 0), Some(0.5));
}

#[test]
fn write_rejects_frames_missing_declared_columns() {
    let store = MemoryOnlineStore::new();
    let view = driver_view();

    let missing_feature = df![
        "driver_id" => [1001i64],
        "event_timestamp" => ["2025-03-01 10:00:00"],
        "conv_rate" => [0.80f64]
    ]
    .unwrap();
    let err = store.write_features(&view, &missing_feature, None).unwrap_err();
    assert!(matches!(err, FeatureStoreError::Validation(_)));
    assert!(err.to_string().contains("acc_rate"));
}

#[test]
fn read_rejects_entity_rows_missing_a_join_key() {
    let store = MemoryOnlineStore::new();
    let view = driver_view();

    let bad_row: EntityRow = HashMap::from([("customer_id".to_string(), json!(1))]);
    let err = store.read_features(&view, &[bad_row], None).unwrap_err();
    assert!(matches!(err, FeatureStoreError::Validation(_)));
}

#[test]
fn requested_feature_absent_from_record_reads_as_null() {
    let store = MemoryOnlineStore::new();
    let view = driver_view();
    store.write_features(&view, &feature_df(), None).unwrap();

    let requested = vec!["conv_rate".to_string(), "not_a_feature".to_string()];
    let result = store
        .read_features(&view, &[entity_row(1001)], Some(&requested))
        .unwrap();
    assert_eq!(f64_at(&result, "conv_rate", 0), Some(0.80));
    assert_eq!(result.column("not_a_feature").unwrap().null_count(), 1);
}
