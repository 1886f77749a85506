//! System-wide constants for SplitScan.
//!
//! Configuration keys recognized by the scan engine and the limits it
//! negotiates with the store.

// =============================================================================
// Configuration Keys
// =============================================================================

/// Name of the database that owns the scanned table. Required.
pub const DATABASE_NAME_KEY: &str = "database-name";

/// Name of the scanned table. Required.
pub const TABLE_NAME_KEY: &str = "table-name";

/// Optional ISO-8601 date-time (with offset) pinning every split to one
/// consistent read point.
pub const SNAPSHOT_TIMESTAMP_KEY: &str = "snapshot-timestamp";

/// Prefix of the per-field date-time pattern keys, `timestamp-format.<field>`.
pub const TIMESTAMP_FORMAT_PREFIX: &str = "timestamp-format";

// =============================================================================
// Timestamp Layout
// =============================================================================

/// Number of low bits reserved for the logical counter in a packed
/// store timestamp (`physical << 18 | logical`).
pub const PHYSICAL_SHIFT_BITS: u32 = 18;

/// Largest logical counter representable in a packed store timestamp.
pub const MAX_LOGICAL: u32 = (1 << PHYSICAL_SHIFT_BITS) - 1;

/// Largest physical time (ms) representable in a packed store timestamp.
pub const MAX_PHYSICAL: u64 = (1 << (64 - PHYSICAL_SHIFT_BITS)) - 1;

// =============================================================================
// Scan Limits
// =============================================================================

/// Largest row budget a single cursor can be asked for.
///
/// The store counts rows with a signed 32-bit integer.
pub const MAX_CURSOR_ROWS: u64 = i32::MAX as u64;

/// Row limit used when the host never calls `set_limit`.
pub const UNLIMITED_ROWS: u64 = u64::MAX;

/// Default number of rows per region for in-memory stores.
pub const DEFAULT_ROWS_PER_REGION: usize = 1024;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timestamp_layout() {
        assert_eq!(MAX_LOGICAL, 262_143);
        assert_eq!(1u64 << PHYSICAL_SHIFT_BITS, MAX_LOGICAL as u64 + 1);
        assert_eq!(MAX_PHYSICAL, 70_368_744_177_663);
    }

    #[test]
    fn test_cursor_row_cap() {
        assert_eq!(MAX_CURSOR_ROWS, 2_147_483_647);
        assert!(UNLIMITED_ROWS > MAX_CURSOR_ROWS);
    }
}
