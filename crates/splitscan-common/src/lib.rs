//! # splitscan-common
//!
//! Common types, errors, and constants for SplitScan.
//!
//! This crate provides the foundational types shared by the store interface
//! and the scan engine. It includes:
//!
//! - **Types**: Snapshot timestamps, region and table identifiers, byte keys
//! - **Errors**: The scan error taxonomy (`ScanError`) and store faults (`StoreError`)
//! - **Constants**: Configuration keys and system-wide limits
//!
//! ## Example
//!
//! ```rust
//! use splitscan_common::types::{SnapshotTimestamp, TableRef};
//! use splitscan_common::error::ScanResult;
//!
//! fn example() -> ScanResult<()> {
//!     let table = TableRef::new("db", "orders");
//!     let ts = SnapshotTimestamp::new(1_600_000_000_000, 0);
//!     assert_eq!(table.to_string(), "db.orders");
//!     assert_eq!(ts.physical(), 1_600_000_000_000);
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod constants;
pub mod error;
pub mod types;

// Re-export commonly used items at the crate root
pub use constants::*;
pub use error::{ErrorCode, ScanError, ScanResult, StoreError, StoreResult};
pub use types::{Key, RegionId, SnapshotTimestamp, TableRef};
