//! Type definitions for SplitScan.
//!
//! This module contains the core value types shared across the workspace.

mod ids;
mod keys;
mod timestamps;

pub use ids::{RegionId, TableRef};
pub use keys::Key;
pub use timestamps::SnapshotTimestamp;
