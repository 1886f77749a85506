//! Store client traits.
//!
//! These traits abstract the storage client, allowing different
//! implementations for production (remote clusters) and testing
//! (in-memory). Calls may block on network I/O; none of them is async.

use std::collections::BTreeMap;

use splitscan_common::error::StoreResult;
use splitscan_common::types::{SnapshotTimestamp, TableRef};

use crate::filter::FilterExpr;
use crate::types::{ColumnDescriptor, RawValue, SplitDescriptor};

/// Parameters of one split cursor.
#[derive(Debug, Clone, Copy)]
pub struct ScanRequest<'a> {
    /// The split to read.
    pub split: &'a SplitDescriptor,
    /// Columns to materialize, in output order.
    pub columns: &'a [ColumnDescriptor],
    /// Optional pushed-down predicate over physical column ordinals.
    pub filter: Option<&'a FilterExpr>,
    /// Read point; `None` reads the latest committed data.
    pub snapshot: Option<SnapshotTimestamp>,
    /// Maximum number of rows the cursor may yield.
    pub limit: u32,
}

/// Factory for store connections.
pub trait StoreClient: Send + Sync {
    /// Connection type produced by this client.
    type Connection: StoreConnection;

    /// Opens a connection configured from the scan properties.
    fn connect(&self, properties: &BTreeMap<String, String>) -> StoreResult<Self::Connection>;
}

/// An open connection to the store.
pub trait StoreConnection: Send {
    /// Cursor type produced by this connection.
    type Cursor: RecordCursor;

    /// Returns whether the table exists.
    fn table_exists(&self, table: &TableRef) -> StoreResult<bool>;

    /// Lists the table's columns in physical order.
    fn list_columns(&self, table: &TableRef) -> StoreResult<Vec<ColumnDescriptor>>;

    /// Computes the table's physical splits in key order.
    fn plan_splits(&self, table: &TableRef) -> StoreResult<Vec<SplitDescriptor>>;

    /// Opens a forward-only cursor over one split.
    fn open_cursor(&self, request: ScanRequest<'_>) -> StoreResult<Self::Cursor>;

    /// Closes the connection.
    fn close(&mut self) -> StoreResult<()>;
}

/// A forward-only iterator over one split's rows.
pub trait RecordCursor: Send {
    /// Moves to the next row. Returns `false` once the split is exhausted.
    fn advance(&mut self) -> StoreResult<bool>;

    /// Returns the value of the `index`-th requested column of the current row.
    fn value(&self, index: usize) -> StoreResult<&RawValue>;

    /// Releases the cursor's store resources.
    fn close(&mut self) -> StoreResult<()>;
}
