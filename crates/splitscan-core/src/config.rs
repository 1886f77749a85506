//! Scan configuration.
//!
//! The property map handed to the engine is parsed exactly once into a
//! `ScanConfig`. The config is immutable afterwards and shared between the
//! planner, the coercion layer and every engine instance of a scan.
//!
//! Recognized keys:
//!
//! | key | required | meaning |
//! |---|---|---|
//! | `database-name` | yes | database of the scanned table |
//! | `table-name` | yes | the scanned table |
//! | `snapshot-timestamp` | no | ISO-8601 read point shared by all splits |
//! | `timestamp-format.<field>` | no | date-time pattern for one field |
//!
//! Every other key is passed through to the store client untouched.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use splitscan_common::constants::{
    DATABASE_NAME_KEY, SNAPSHOT_TIMESTAMP_KEY, TABLE_NAME_KEY, TIMESTAMP_FORMAT_PREFIX,
};
use splitscan_common::error::{ScanError, ScanResult};
use splitscan_common::types::{SnapshotTimestamp, TableRef};

use crate::snapshot;

/// Parsed, immutable scan configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanConfig {
    /// The scanned table.
    table: TableRef,
    /// Shared read point; `None` reads the latest data.
    snapshot: Option<SnapshotTimestamp>,
    /// Date-time patterns by field name.
    timestamp_formats: BTreeMap<String, String>,
    /// All properties, as given.
    properties: BTreeMap<String, String>,
}

impl ScanConfig {
    /// Parses a property map.
    ///
    /// Fails with a configuration error if a required key is missing or
    /// blank, the snapshot timestamp is malformed, or a
    /// `timestamp-format.` key names no field.
    pub fn from_properties(properties: BTreeMap<String, String>) -> ScanResult<Self> {
        let database = required(&properties, DATABASE_NAME_KEY)?;
        let table = required(&properties, TABLE_NAME_KEY)?;
        let snapshot =
            snapshot::resolve(properties.get(SNAPSHOT_TIMESTAMP_KEY).map(String::as_str))?;

        let prefix = format!("{}.", TIMESTAMP_FORMAT_PREFIX);
        let mut timestamp_formats = BTreeMap::new();
        for (key, pattern) in &properties {
            let Some(field) = key.strip_prefix(&prefix) else {
                continue;
            };
            if field.is_empty() {
                return Err(ScanError::InvalidProperty {
                    key: key.clone(),
                    value: pattern.clone(),
                    reason: "missing field name".into(),
                });
            }
            timestamp_formats.insert(field.to_string(), pattern.clone());
        }

        Ok(Self {
            table: TableRef::new(database, table),
            snapshot,
            timestamp_formats,
            properties,
        })
    }

    /// Parses key/value pairs. Later pairs override earlier ones.
    pub fn from_pairs<I, K, V>(pairs: I) -> ScanResult<Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self::from_properties(
            pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }

    /// Returns the scanned table.
    pub fn table(&self) -> &TableRef {
        &self.table
    }

    /// Returns the shared read point.
    pub fn snapshot(&self) -> Option<SnapshotTimestamp> {
        self.snapshot
    }

    /// Returns the configured pattern for a field.
    pub fn timestamp_format(&self, field: &str) -> Option<&str> {
        self.timestamp_formats.get(field).map(String::as_str)
    }

    /// Returns all configured patterns by field name.
    pub fn timestamp_formats(&self) -> &BTreeMap<String, String> {
        &self.timestamp_formats
    }

    /// Returns the raw property map.
    pub fn properties(&self) -> &BTreeMap<String, String> {
        &self.properties
    }
}

fn required<'a>(properties: &'a BTreeMap<String, String>, key: &str) -> ScanResult<&'a str> {
    match properties.get(key).map(|v| v.trim()) {
        Some(value) if !value.is_empty() => Ok(value),
        _ => Err(ScanError::MissingProperty { key: key.into() }),
    }
}
