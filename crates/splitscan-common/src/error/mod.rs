//! Error handling for SplitScan.
//!
//! This module provides the scan error taxonomy used by the engine and the
//! store fault type produced by store client implementations.

mod scan;
mod store;

pub use scan::{ErrorCode, ScanError};
pub use store::StoreError;

/// Result type alias for scan engine operations.
pub type ScanResult<T> = std::result::Result<T, ScanError>;

/// Result type alias for store client operations.
pub type StoreResult<T> = std::result::Result<T, StoreError>;
