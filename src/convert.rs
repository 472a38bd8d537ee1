//! Conversions between polars frames and dynamic JSON-valued rows.
//!
//! The online store holds one JSON value per feature cell; these helpers are
//! the single place where cell values cross between the columnar and the
//! key-value representations, so renderings (and therefore entity keys) stay
//! consistent.

use crate::error::{FeatureStoreError, Result};
use chrono::DateTime;
use polars::prelude::*;
use std::collections::HashMap;

/// Convert one cell to a JSON value.
pub fn any_value_to_json(value: &AnyValue) -> Result<serde_json::Value> {
    use serde_json::Value;

    let converted = match value {
        AnyValue::Null => Value::Null,
        AnyValue::Boolean(b) => Value::Bool(*b),
        AnyValue::Int8(v) => Value::Number((*v as i64).into()),
        AnyValue::Int16(v) => Value::Number((*v as i64).into()),
        AnyValue::Int32(v) => Value::Number((*v as i64).into()),
        AnyValue::Int64(v) => Value::Number((*v).into()),
        AnyValue::UInt8(v) => Value::Number((*v as u64).into()),
        AnyValue::UInt16(v) => Value::Number((*v as u64).into()),
        AnyValue::UInt32(v) => Value::Number((*v as u64).into()),
        AnyValue::UInt64(v) => Value::Number((*v).into()),
        AnyValue::Float32(v) => float_to_json(*v as f64),
        AnyValue::Float64(v) => float_to_json(*v),
        AnyValue::String(s) => Value::String((*s).to_string()),
        AnyValue::StringOwned(s) => Value::String(s.to_string()),
        AnyValue::Date(days) => Value::String(render_date(*days)),
        AnyValue::Datetime(v, time_unit, _) => Value::String(render_datetime(*v, *time_unit)),
        AnyValue::List(series) => {
            let mut items = Vec::with_capacity(series.len());
            for item in series.iter() {
                items.push(any_value_to_json(&item)?);
            }
            Value::Array(items)
        }
        other => Value::String(other.to_string()),
    };
    Ok(converted)
}

fn float_to_json(v: f64) -> serde_json::Value {
    serde_json::Number::from_f64(v)
        .map(serde_json::Value::Number)
        .unwrap_or(serde_json::Value::Null)
}

fn render_date(days_since_epoch: i32) -> String {
    // 1970-01-01 is day 719_163 of the common era.
    chrono::NaiveDate::from_num_days_from_ce_opt(days_since_epoch + 719_163)
        .map(|d| d.to_string())
        .unwrap_or_else(|| days_since_epoch.to_string())
}

fn render_datetime(value: i64, time_unit: TimeUnit) -> String {
    let datetime = match time_unit {
        TimeUnit::Nanoseconds => Some(DateTime::from_timestamp_nanos(value)),
        TimeUnit::Microseconds => DateTime::from_timestamp_micros(value),
        TimeUnit::Milliseconds => DateTime::from_timestamp_millis(value),
    };
    datetime
        .map(|d| d.naive_utc().format("%Y-%m-%dT%H:%M:%S%.6f").to_string())
        .unwrap_or_else(|| value.to_string())
}

/// Convert one JSON value to a polars cell, borrowing strings where
/// possible.
pub fn json_to_any_value(value: &serde_json::Value) -> Result<AnyValue<'_>> {
    use serde_json::Value;

    let converted = match value {
        Value::Null => AnyValue::Null,
        Value::Bool(b) => AnyValue::Boolean(*b),
        Value::Number(n) => {
            if let Some(v) = n.as_i64() {
                AnyValue::Int64(v)
            } else if let Some(v) = n.as_f64() {
                AnyValue::Float64(v)
            } else {
                AnyValue::Null
            }
        }
        Value::String(s) => AnyValue::String(s.as_str()),
        Value::Array(items) => {
            let mut inner = Vec::with_capacity(items.len());
            for item in items {
                inner.push(json_to_any_value(item)?);
            }
            let series = Series::from_any_values("", &inner, false)
                .map_err(|e| FeatureStoreError::Polars(format!("Failed to build list value: {}", e)))?;
            AnyValue::List(series)
        }
        Value::Object(_) => {
            return Err(FeatureStoreError::Validation(
                "Nested objects are not supported as feature values".to_string(),
            ))
        }
    };
    Ok(converted)
}

/// Convert a frame to row maps, one JSON value per cell.
pub fn dataframe_to_rows(df: &DataFrame) -> Result<Vec<HashMap<String, serde_json::Value>>> {
    let column_names: Vec<String> = df.get_column_names().iter().map(|s| s.to_string()).collect();
    let mut rows = Vec::with_capacity(df.height());

    for row_idx in 0..df.height() {
        let mut row = HashMap::with_capacity(column_names.len());
        for name in &column_names {
            let series = df
                .column(name)
                .map_err(|e| FeatureStoreError::Polars(format!("Failed to read column '{}': {}", name, e)))?;
            let cell = series
                .get(row_idx)
                .map_err(|e| FeatureStoreError::Polars(format!("Failed to read row {}: {}", row_idx, e)))?;
            row.insert(name.clone(), any_value_to_json(&cell)?);
        }
        rows.push(row);
    }

    Ok(rows)
}

/// Expression normalizing a column to datetime, whatever temporal encoding
/// the file delivered it in. String columns are parsed, date columns widened.
pub fn datetime_expr(df: &DataFrame, name: &str) -> Result<Expr> {
    let dtype = df
        .column(name)
        .map_err(|e| FeatureStoreError::Polars(format!("Failed to read column '{}': {}", name, e)))?
        .dtype()
        .clone();

    let expr = match dtype {
        DataType::Datetime(_, _) => col(name),
        DataType::Date => col(name).cast(DataType::Datetime(TimeUnit::Microseconds, None)),
        DataType::String => col(name).str().to_datetime(
            Some(TimeUnit::Microseconds),
            None,
            StrptimeOptions::default(),
            lit("raise"),
        ),
        other => {
            return Err(FeatureStoreError::Validation(format!(
                "Column '{}' is not a temporal column (found {})",
                name, other
            )))
        }
    };
    Ok(expr)
}

/// Build a frame from row maps with an explicit column order. Cells missing
/// from a row become nulls.
pub fn rows_to_dataframe(
    rows: &[HashMap<String, serde_json::Value>],
    columns: &[String],
) -> Result<DataFrame> {
    let mut series_vec = Vec::with_capacity(columns.len());

    for name in columns {
        let mut values = Vec::with_capacity(rows.len());
        for row in rows {
            match row.get(name) {
                Some(value) => values.push(json_to_any_value(value)?),
                None => values.push(AnyValue::Null),
            }
        }
        let series = Series::from_any_values(name, &values, false)
            .map_err(|e| FeatureStoreError::Polars(format!("Failed to build column '{}': {}", name, e)))?;
        series_vec.push(series);
    }

    DataFrame::new(series_vec)
        .map_err(|e| FeatureStoreError::Polars(format!("Failed to assemble frame: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn roundtrips_scalar_rows() {
        let df = df![
            "driver_id" => [1001i64, 1002],
            "conv_rate" => [0.8f64, 0.75],
            "city" => ["blr", "del"]
        ]
        .unwrap();

        let rows = dataframe_to_rows(&df).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0]["driver_id"], json!(1001));
        assert_eq!(rows[0]["conv_rate"], json!(0.8));
        assert_eq!(rows[1]["city"], json!("del"));

        let columns = vec!["driver_id".to_string(), "conv_rate".to_string(), "city".to_string()];
        let rebuilt = rows_to_dataframe(&rows, &columns).unwrap();
        assert_eq!(rebuilt.height(), 2);
        assert_eq!(rebuilt.get_column_names(), vec!["driver_id", "conv_rate", "city"]);
    }

    #[test]
    fn missing_cells_become_nulls() {
        let rows = vec![HashMap::from([("a".to_string(), json!(1))])];
        let columns = vec!["a".to_string(), "b".to_string()];
        let df = rows_to_dataframe(&rows, &columns).unwrap();
        assert_eq!(df.column("b").unwrap().null_count(), 1);
    }
}
