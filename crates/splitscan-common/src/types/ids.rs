//! Identifier types for SplitScan.
//!
//! These types provide type-safe wrappers around store identifiers,
//! preventing accidental misuse of different ID types.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Region identifier - names one contiguous key range owned by the store.
///
/// # Example
///
/// ```rust
/// use splitscan_common::types::RegionId;
///
/// let region = RegionId::new(42);
/// assert_eq!(region.as_u64(), 42);
/// ```
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[repr(transparent)]
pub struct RegionId(u64);

impl RegionId {
    /// Creates a new `RegionId` from a raw u64 value.
    #[inline]
    #[must_use]
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    /// Returns the raw u64 value.
    #[inline]
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }

    /// Returns the next region ID.
    #[inline]
    #[must_use]
    pub const fn next(self) -> Self {
        Self(self.0.saturating_add(1))
    }
}

impl fmt::Debug for RegionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RegionId({})", self.0)
    }
}

impl fmt::Display for RegionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for RegionId {
    #[inline]
    fn from(id: u64) -> Self {
        Self::new(id)
    }
}

/// Fully-qualified table identifier (`database.table`).
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TableRef {
    database: String,
    table: String,
}

impl TableRef {
    /// Creates a table reference.
    pub fn new(database: impl Into<String>, table: impl Into<String>) -> Self {
        Self {
            database: database.into(),
            table: table.into(),
        }
    }

    /// Returns the database name.
    #[inline]
    #[must_use]
    pub fn database(&self) -> &str {
        &self.database
    }

    /// Returns the table name.
    #[inline]
    #[must_use]
    pub fn table(&self) -> &str {
        &self.table
    }
}

impl fmt::Debug for TableRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TableRef({}.{})", self.database, self.table)
    }
}

impl fmt::Display for TableRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.database, self.table)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_region_id() {
        let region = RegionId::new(7);
        assert_eq!(region.as_u64(), 7);
        assert_eq!(region.next().as_u64(), 8);
        assert_eq!(RegionId::new(u64::MAX).next().as_u64(), u64::MAX);
        assert_eq!(format!("{region:?}"), "RegionId(7)");
    }

    #[test]
    fn test_table_ref() {
        let table = TableRef::new("db", "t");
        assert_eq!(table.database(), "db");
        assert_eq!(table.table(), "t");
        assert_eq!(table.to_string(), "db.t");
    }

    #[test]
    fn test_table_ref_serde() {
        let table = TableRef::new("shop", "orders");
        let json = serde_json::to_string(&table).unwrap();
        let back: TableRef = serde_json::from_str(&json).unwrap();
        assert_eq!(back, table);
    }
}
