//! `KEY : value` experiment metadata files

use crate::error::{IngestError, Result};
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use indexmap::IndexMap;
use regex::Regex;
use serde::Serialize;
use std::collections::HashSet;
use tracing::debug;

/// Values treated as missing: na, nan, n/a, n/an in any case
const NAN_PATTERN: &str = r"(?i)^n/?an?$";

/// Keys whose values are calendar dates
const DATE_KEY_PATTERN: &str = r"_?DATE$";

const DATE_FORMATS: &[&str] = &[
    "%Y-%m-%d", "%Y/%m/%d", "%m/%d/%Y", "%m-%d-%Y", "%d.%m.%Y", "%Y%m%d", "%d-%b-%Y", "%d %b %Y",
    "%d %B %Y", "%b %d, %Y", "%B %d, %Y", "%b %d %Y", "%B %d %Y",
];

const DATETIME_FORMATS: &[&str] = &["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%m/%d/%Y %H:%M"];

/// Normalised metadata keys with import-time meaning
pub mod keys {
    pub const TRANSCRIPTION_FACTOR_ID: &str = "TRANSCRIPTION_FACTOR_ID";
    pub const EDGE_TYPE: &str = "EDGE_TYPE";
    pub const EXPERIMENT_TYPE: &str = "EXPERIMENT_TYPE";
    pub const EXPERIMENT_ID: &str = "EXPERIMENT_ID";
    pub const ANALYSIS_ID: &str = "ANALYSIS_ID";

    /// Keys whose values may contain spaces
    pub const FREE_TEXT: &[&str] =
        &["ANALYSIS_COMMAND", "ANALYSIS_NOTES", "METADATA_NOTES", "TF_HISTORY"];

    /// Keys exposed as query filters
    pub const SEARCHABLE: &[&str] = &[
        "TRANSCRIPTION_FACTOR_ID",
        "EXPERIMENT_TYPE",
        "EXPERIMENTER",
        "DATE",
        "TECHNOLOGY",
        "ANALYSIS_METHOD",
        "ANALYSIS_CUTOFF",
        "EDGE_TYPE",
        "GENOTYPE",
        "DATA_SOURCE",
        "TREATMENTS",
        "CONTROL",
        "TISSUE/SAMPLE",
    ];

    pub fn is_searchable(key: &str) -> bool {
        SEARCHABLE.contains(&key)
    }
}

/// Normalised metadata of one experiment, in file order
///
/// Read-only once parsed: there are no mutating accessors.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct MetadataRecord {
    entries: IndexMap<String, String>,
}

impl MetadataRecord {
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }

    /// Fetch a key the import cannot proceed without
    pub fn require(&self, key: &str) -> Result<&str> {
        self.get(key)
            .ok_or_else(|| IngestError::MissingMetadataKey(key.to_string()))
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Parse a metadata file
///
/// Each non-empty line is split on its first `:`. Keys are upper-cased with
/// spaces turned into underscores; values are trimmed. Rows whose value is
/// empty or a NaN spelling are dropped. A key that repeats after
/// normalisation is an error, even if one of the repeats would be dropped.
pub fn parse_metadata(text: &str) -> Result<MetadataRecord> {
    let nan_pattern = Regex::new(NAN_PATTERN)?;
    let date_key = Regex::new(DATE_KEY_PATTERN)?;

    let mut seen = HashSet::new();
    let mut entries = IndexMap::new();

    for (line_idx, line) in text.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }

        let (raw_key, raw_value) = line.split_once(':').unwrap_or((line, ""));
        let key = normalize_key(raw_key);
        if key.is_empty() {
            debug!(line = line_idx + 1, "Skipping metadata row without a key");
            continue;
        }

        if !seen.insert(key.clone()) {
            return Err(IngestError::MalformedMetadata(format!(
                "key {key} repeats on line {}",
                line_idx + 1
            )));
        }

        let value = raw_value.trim();
        if value.is_empty() || nan_pattern.is_match(value) {
            debug!(key = %key, "Dropping metadata row with missing value");
            continue;
        }

        let value = if date_key.is_match(&key) {
            normalize_date(value).ok_or_else(|| {
                IngestError::MalformedMetadata(format!("{key} has unrecognised date {value:?}"))
            })?
        } else {
            value.to_string()
        };

        entries.insert(key, value);
    }

    Ok(MetadataRecord { entries })
}

fn normalize_key(raw: &str) -> String {
    raw.trim().to_uppercase().replace(' ', "_")
}

/// Re-emit a date in `YYYY-MM-DD` form
pub fn normalize_date(value: &str) -> Option<String> {
    let value = value.trim();

    let date = DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(value, fmt).ok())
        .or_else(|| {
            DATETIME_FORMATS
                .iter()
                .find_map(|fmt| NaiveDateTime::parse_from_str(value, fmt).ok())
                .map(|dt| dt.date())
        })
        .or_else(|| {
            DateTime::parse_from_rfc3339(value)
                .ok()
                .map(|dt| dt.date_naive())
        })?;

    Some(date.format("%Y-%m-%d").to_string())
}
