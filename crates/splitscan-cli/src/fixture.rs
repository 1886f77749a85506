//! Table fixtures.
//!
//! A fixture is a JSON document describing one table and its rows:
//!
//! ```json
//! {
//!   "database": "shop",
//!   "table": "orders",
//!   "rows_per_region": 2,
//!   "columns": [
//!     { "name": "id", "type": "BIGINT", "nullable": false },
//!     { "name": "created_at", "type": "TIMESTAMP" }
//!   ],
//!   "rows": [[1, "2021-05-01 08:00:00"], [2, null]]
//! }
//! ```
//!
//! JSON values are stored as the closest raw store value; typed conversion
//! happens in the scan, like for any other store.

use std::fs;
use std::path::Path;

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use serde_json::Value as JsonValue;
use splitscan_common::types::TableRef;
use splitscan_store::{ColumnDescriptor, DataType, MemoryStore, RawValue};

/// One column of a fixture.
#[derive(Debug, Clone, Deserialize)]
pub struct FixtureColumn {
    /// Column name.
    pub name: String,
    /// SQL type name, e.g. `VARCHAR(20)`.
    #[serde(rename = "type")]
    pub data_type: String,
    /// Whether the column admits NULL.
    #[serde(default = "default_nullable")]
    pub nullable: bool,
}

fn default_nullable() -> bool {
    true
}

/// A table fixture.
#[derive(Debug, Clone, Deserialize)]
pub struct Fixture {
    /// Database name.
    pub database: String,
    /// Table name.
    pub table: String,
    /// Rows per region; the store default when absent.
    #[serde(default)]
    pub rows_per_region: Option<usize>,
    /// Columns in physical order.
    pub columns: Vec<FixtureColumn>,
    /// Rows, one JSON array per row.
    #[serde(default)]
    pub rows: Vec<Vec<JsonValue>>,
}

impl Fixture {
    /// Reads a fixture file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read fixture {}", path.display()))?;
        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse fixture {}", path.display()))
    }

    /// Returns the fixture's table.
    pub fn table_ref(&self) -> TableRef {
        TableRef::new(self.database.clone(), self.table.clone())
    }

    /// Loads the fixture into a new in-memory store.
    pub fn into_store(self) -> Result<MemoryStore> {
        let mut store = MemoryStore::new();
        if let Some(rows_per_region) = self.rows_per_region {
            store = store.with_rows_per_region(rows_per_region);
        }

        let columns = self
            .columns
            .iter()
            .enumerate()
            .map(|(ordinal, column)| {
                let data_type: DataType = column
                    .data_type
                    .parse()
                    .map_err(anyhow::Error::msg)
                    .with_context(|| format!("Invalid type for column {}", column.name))?;
                let descriptor = ColumnDescriptor::new(column.name.clone(), data_type, ordinal);
                Ok(if column.nullable {
                    descriptor
                } else {
                    descriptor.not_null()
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let table = self.table_ref();
        store
            .create_table(&table, columns)
            .with_context(|| format!("Failed to create table {}", table))?;

        let width = self.columns.len();
        let rows = self
            .rows
            .iter()
            .enumerate()
            .map(|(i, row)| {
                if row.len() != width {
                    bail!("row {} has {} values, expected {}", i, row.len(), width);
                }
                Ok(row.iter().map(raw_value).collect())
            })
            .collect::<Result<Vec<Vec<RawValue>>>>()?;
        store
            .insert_rows(&table, rows)
            .with_context(|| format!("Failed to load rows into {}", table))?;

        Ok(store)
    }
}

/// Converts a JSON value to the closest raw store value.
fn raw_value(value: &JsonValue) -> RawValue {
    match value {
        JsonValue::Null => RawValue::Null,
        JsonValue::Bool(b) => RawValue::Int(i64::from(*b)),
        JsonValue::Number(n) => n
            .as_i64()
            .map(RawValue::Int)
            .or_else(|| n.as_u64().map(RawValue::UInt))
            .unwrap_or_else(|| RawValue::Double(n.as_f64().unwrap_or(f64::NAN))),
        JsonValue::String(s) => RawValue::String(s.clone()),
        other => RawValue::String(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;
    use std::io::Write;

    use super::*;
    use splitscan_store::{StoreClient, StoreConnection};

    const FIXTURE: &str = r#"{
        "database": "shop",
        "table": "orders",
        "rows_per_region": 2,
        "columns": [
            { "name": "id", "type": "BIGINT", "nullable": false },
            { "name": "note", "type": "VARCHAR(20)" },
            { "name": "paid", "type": "BOOLEAN" }
        ],
        "rows": [
            [1, "first", true],
            [2, null, false],
            [3, "third", true]
        ]
    }"#;

    #[test]
    fn test_load_fixture_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(FIXTURE.as_bytes()).unwrap();

        let fixture = Fixture::from_file(file.path()).unwrap();
        assert_eq!(fixture.table_ref().to_string(), "shop.orders");
        assert_eq!(fixture.columns.len(), 3);

        let store = fixture.into_store().unwrap();
        let conn = store.connect(&BTreeMap::new()).unwrap();
        let table = TableRef::new("shop", "orders");
        let columns = conn.list_columns(&table).unwrap();
        assert_eq!(columns[1].data_type, DataType::Varchar(Some(20)));
        assert!(!columns[0].nullable);
        assert_eq!(conn.plan_splits(&table).unwrap().len(), 2);
        assert_eq!(store.row_count(&table).unwrap(), 3);
    }

    #[test]
    fn test_rejects_bad_fixtures() {
        let mut bad_type: Fixture = serde_json::from_str(FIXTURE).unwrap();
        bad_type.columns[0].data_type = "UUID".into();
        assert!(bad_type.into_store().is_err());

        let mut short_row: Fixture = serde_json::from_str(FIXTURE).unwrap();
        short_row.rows[1].pop();
        let err = short_row.into_store().unwrap_err();
        assert!(err.to_string().contains("row 1"));

        let dir = tempfile::tempdir().unwrap();
        assert!(Fixture::from_file(&dir.path().join("missing.json")).is_err());
    }

    #[test]
    fn test_raw_values() {
        assert_eq!(raw_value(&serde_json::json!(null)), RawValue::Null);
        assert_eq!(raw_value(&serde_json::json!(true)), RawValue::Int(1));
        assert_eq!(raw_value(&serde_json::json!(-4)), RawValue::Int(-4));
        assert_eq!(raw_value(&serde_json::json!(u64::MAX)), RawValue::UInt(u64::MAX));
        assert_eq!(raw_value(&serde_json::json!(1.5)), RawValue::Double(1.5));
        assert_eq!(
            raw_value(&serde_json::json!({"a": 1})),
            RawValue::String(r#"{"a":1}"#.into())
        );
    }
}
