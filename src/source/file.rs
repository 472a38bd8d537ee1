//! File-backed data source reading parquet, CSV or JSON into a frame.

use crate::convert::datetime_expr;
use crate::error::{FeatureStoreError, Result};
use crate::source::DataSource;
use chrono::{DateTime, Utc};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fs::File;
use std::path::PathBuf;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileFormat {
    Parquet,
    Csv,
    Json,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileSource {
    pub name: String,
    pub path: PathBuf,
    pub format: FileFormat,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp_field: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_timestamp_column: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(default)]
    pub tags: HashMap<String, String>,
}

impl FileSource {
    pub fn new(name: impl Into<String>, path: impl Into<PathBuf>, format: FileFormat) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
            format,
            timestamp_field: None,
            created_timestamp_column: None,
            description: None,
            tags: HashMap::new(),
        }
    }

    pub fn with_timestamp_field(mut self, field: impl Into<String>) -> Self {
        self.timestamp_field = Some(field.into());
        self
    }

    pub fn with_created_timestamp_column(mut self, column: impl Into<String>) -> Self {
        self.created_timestamp_column = Some(column.into());
        self
    }

    fn load(&self) -> Result<DataFrame> {
        match self.format {
            FileFormat::Parquet => LazyFrame::scan_parquet(&self.path, ScanArgsParquet::default())
                .map_err(|e| {
                    FeatureStoreError::Polars(format!(
                        "Failed to scan {}: {}",
                        self.path.display(),
                        e
                    ))
                })?
                .collect()
                .map_err(|e| {
                    FeatureStoreError::Polars(format!(
                        "Failed to collect {}: {}",
                        self.path.display(),
                        e
                    ))
                }),
            FileFormat::Csv => LazyCsvReader::new(&self.path)
                .with_try_parse_dates(true)
                .with_infer_schema_length(Some(1000))
                .finish()
                .map_err(|e| {
                    FeatureStoreError::Polars(format!(
                        "Failed to read CSV {}: {}",
                        self.path.display(),
                        e
                    ))
                })?
                .collect()
                .map_err(|e| {
                    FeatureStoreError::Polars(format!(
                        "Failed to collect {}: {}",
                        self.path.display(),
                        e
                    ))
                }),
            FileFormat::Json => {
                let file = File::open(&self.path)?;
                JsonReader::new(file).finish().map_err(|e| {
                    FeatureStoreError::Polars(format!(
                        "Failed to read JSON {}: {}",
                        self.path.display(),
                        e
                    ))
                })
            }
        }
    }
}

impl DataSource for FileSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn timestamp_field(&self) -> Option<&str> {
        self.timestamp_field.as_deref()
    }

    fn created_timestamp_column(&self) -> Option<&str> {
        self.created_timestamp_column.as_deref()
    }

    fn read(
        &self,
        start_date: Option<DateTime<Utc>>,
        end_date: Option<DateTime<Utc>>,
        columns: Option<&[String]>,
    ) -> Result<DataFrame> {
        let mut df = self.load()?;
        debug!(source = %self.name, rows = df.height(), "read data source");

        if let Some(requested) = columns {
            let present: Vec<&str> = df.get_column_names();
            let keep: Vec<String> = requested
                .iter()
                .filter(|c| present.contains(&c.as_str()))
                .cloned()
                .collect();
            if !keep.is_empty() {
                df = df.select(&keep).map_err(|e| {
                    FeatureStoreError::Polars(format!(
                        "Failed to project columns on '{}': {}",
                        self.name, e
                    ))
                })?;
            }
        }

        if start_date.is_none() && end_date.is_none() {
            return Ok(df);
        }

        let timestamp_field = self.timestamp_field.as_deref().ok_or_else(|| {
            FeatureStoreError::Validation(format!(
                "Data source '{}' has no timestamp field, cannot filter by date range",
                self.name
            ))
        })?;
        if df.column(timestamp_field).is_err() {
            return Err(FeatureStoreError::Validation(format!(
                "Timestamp field '{}' not found in data source '{}'",
                timestamp_field, self.name
            )));
        }

        let event_time = datetime_expr(&df, timestamp_field)?;
        let mut lazy = df.lazy();
        if let Some(start) = start_date {
            lazy = lazy.filter(event_time.clone().gt_eq(lit(start.naive_utc())));
        }
        if let Some(end) = end_date {
            lazy = lazy.filter(event_time.lt_eq(lit(end.naive_utc())));
        }

        lazy.collect().map_err(|e| {
            FeatureStoreError::Polars(format!("Failed to filter '{}' by date: {}", self.name, e))
        })
    }

    fn schema(&self) -> Result<BTreeMap<String, String>> {
        let df = match self.format {
            FileFormat::Parquet => LazyFrame::scan_parquet(&self.path, ScanArgsParquet::default())
                .map_err(|e| {
                    FeatureStoreError::Polars(format!(
                        "Failed to scan {}: {}",
                        self.path.display(),
                        e
                    ))
                })?
                .limit(1)
                .collect()
                .map_err(|e| {
                    FeatureStoreError::Polars(format!(
                        "Failed to read schema of {}: {}",
                        self.path.display(),
                        e
                    ))
                })?,
            _ => self.load()?,
        };

        Ok(df
            .schema()
            .iter()
            .map(|(name, dtype)| (name.to_string(), dtype.to_string()))
            .collect())
    }

    fn validate(&self) -> Result<()> {
        if self.path.as_os_str().is_empty() {
            return Err(FeatureStoreError::Config(format!(
                "Data source '{}' has an empty path",
                self.name
            )));
        }
        if !self.path.exists() {
            return Err(FeatureStoreError::Config(format!(
                "Data source '{}' points to a missing file: {}",
                self.name,
                self.path.display()
            )));
        }
        Ok(())
    }
}
