//! Store client faults.

use thiserror::Error;

use crate::types::{RegionId, TableRef};

/// Error raised by a store client, connection, or cursor.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Connection could not be established.
    #[error("connection failed: {0}")]
    ConnectionFailed(String),

    /// The connection was already closed.
    #[error("connection closed")]
    ConnectionClosed,

    /// The cursor was already closed.
    #[error("cursor closed")]
    CursorClosed,

    /// The table does not exist.
    #[error("table {0} does not exist")]
    TableNotFound(TableRef),

    /// The region is unknown to the store.
    #[error("region {0} not found")]
    RegionNotFound(RegionId),

    /// Column index out of range for the open cursor.
    #[error("column index {index} out of range for {width} columns")]
    ColumnOutOfRange {
        /// Requested column index.
        index: usize,
        /// Number of columns the cursor materializes.
        width: usize,
    },

    /// The cursor is not positioned on a row.
    #[error("cursor is not positioned on a row")]
    NotPositioned,

    /// Filter expression could not be evaluated.
    #[error("invalid filter: {0}")]
    InvalidFilter(String),

    /// Request rejected by the store.
    #[error("request failed: {0}")]
    RequestFailed(String),

    /// Internal store error.
    #[error("internal store error: {0}")]
    Internal(String),
}

impl StoreError {
    /// Returns true if retrying the whole request may succeed.
    ///
    /// The scan engine never retries; the flag is for outer orchestration.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            StoreError::ConnectionFailed(_) | StoreError::RequestFailed(_)
        )
    }
}
