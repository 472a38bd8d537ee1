//! Data sources: the read-side boundary of the system.
//!
//! A data source exposes a uniform tabular read (optionally restricted by an
//! inclusive date range and a best-effort column projection) plus schema
//! introspection. Concrete backends are selected by a serde-tagged spec so
//! feature views stay serializable.

pub mod file;

use crate::error::Result;
use chrono::{DateTime, Utc};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub use file::{FileFormat, FileSource};

pub trait DataSource: Send + Sync {
    fn name(&self) -> &str;

    /// Column holding the event time of each row, when the source is
    /// temporal.
    fn timestamp_field(&self) -> Option<&str>;

    /// Secondary creation-time column used to break event-time ties.
    fn created_timestamp_column(&self) -> Option<&str>;

    /// Read rows, restricted to the inclusive `[start_date, end_date]` range
    /// on the timestamp field when dates are given. Unknown projected
    /// columns are silently dropped.
    fn read(
        &self,
        start_date: Option<DateTime<Utc>>,
        end_date: Option<DateTime<Utc>>,
        columns: Option<&[String]>,
    ) -> Result<DataFrame>;

    fn schema(&self) -> Result<BTreeMap<String, String>>;

    /// Fails when the underlying location is unreachable or the declared
    /// format is unsupported.
    fn validate(&self) -> Result<()>;
}

/// Serializable selector for a concrete data source implementation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum SourceSpec {
    #[serde(rename = "file")]
    File(FileSource),
}

impl SourceSpec {
    pub fn as_source(&self) -> &dyn DataSource {
        match self {
            Self::File(source) => source,
        }
    }

    pub fn name(&self) -> &str {
        self.as_source().name()
    }

    pub fn timestamp_field(&self) -> Option<&str> {
        self.as_source().timestamp_field()
    }

    pub fn created_timestamp_column(&self) -> Option<&str> {
        self.as_source().created_timestamp_column()
    }

    pub fn validate(&self) -> Result<()> {
        self.as_source().validate()
    }
}
