//! Shared validation helpers: name rules, column presence checks and
//! closest-match suggestions for not-found errors.

use crate::error::{FeatureStoreError, Result};
use lazy_static::lazy_static;
use polars::prelude::*;
use regex::Regex;

lazy_static! {
    static ref NAME_PATTERN: Regex = Regex::new(r"^[A-Za-z0-9_-]+$").unwrap();
}

/// Check that a metadata object name is non-empty and restricted to
/// alphanumeric characters, hyphens and underscores.
pub fn validate_name(name: &str, kind: &str) -> Result<()> {
    if name.is_empty() {
        return Err(FeatureStoreError::Validation(format!(
            "{} name cannot be empty",
            kind
        )));
    }
    if !NAME_PATTERN.is_match(name) {
        return Err(FeatureStoreError::Validation(format!(
            "{} name '{}' must contain only alphanumeric characters, hyphens, and underscores",
            kind, name
        )));
    }
    Ok(())
}

/// Check that every required column is present in the frame, reporting all
/// missing columns at once.
pub fn require_columns(df: &DataFrame, required: &[String], context: &str) -> Result<()> {
    let present: Vec<&str> = df.get_column_names();
    let missing: Vec<&str> = required
        .iter()
        .map(String::as_str)
        .filter(|c| !present.contains(c))
        .collect();

    if missing.is_empty() {
        Ok(())
    } else {
        Err(FeatureStoreError::Validation(format!(
            "Missing columns in {}: [{}]",
            context,
            missing.join(", ")
        )))
    }
}

/// Pick the closest candidate to a misspelled name, if any is close enough
/// to be a plausible typo.
pub fn closest_match<'a>(target: &str, candidates: impl IntoIterator<Item = &'a str>) -> Option<&'a str> {
    candidates
        .into_iter()
        .map(|c| (c, strsim::jaro_winkler(target, c)))
        .filter(|(_, score)| *score >= 0.85)
        .max_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal))
        .map(|(c, _)| c)
}

/// Format a not-found message, appending a suggestion when one exists.
pub fn not_found_message<'a>(
    kind: &str,
    name: &str,
    candidates: impl IntoIterator<Item = &'a str>,
) -> String {
    match closest_match(name, candidates) {
        Some(suggestion) => format!("{} '{}' not found. Did you mean '{}'?", kind, name, suggestion),
        None => format!("{} '{}' not found", kind, name),
    }
}
