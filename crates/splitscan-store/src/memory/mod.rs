//! In-memory multi-version store.
//!
//! `MemoryStore` implements the store client interface over tables held in
//! process memory. Every write commits at a fresh packed timestamp, so reads
//! at an older snapshot keep seeing the data as of that snapshot. Tables are
//! partitioned into regions of a fixed number of rows.
//!
//! The store also counts connections and cursors and can inject faults at
//! each interface call, which makes resource discipline observable in tests.
//!
//! # Example
//!
//! ```rust
//! use splitscan_common::types::TableRef;
//! use splitscan_store::{ColumnDescriptor, DataType, MemoryStore, RawValue};
//!
//! let store = MemoryStore::new().with_rows_per_region(2);
//! let table = TableRef::new("db", "t");
//! store
//!     .create_table(&table, vec![ColumnDescriptor::new("id", DataType::BigInt, 0)])
//!     .unwrap();
//! store
//!     .insert_rows(&table, (0..5).map(|i| vec![RawValue::Int(i)]))
//!     .unwrap();
//! ```

mod connection;
mod cursor;
mod table;

pub use connection::MemoryConnection;
pub use cursor::MemoryCursor;

use std::collections::{BTreeMap, HashSet};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use parking_lot::{Mutex, RwLock};
use splitscan_common::constants::{DEFAULT_ROWS_PER_REGION, MAX_LOGICAL};
use splitscan_common::error::{StoreError, StoreResult};
use splitscan_common::types::{SnapshotTimestamp, TableRef};

use crate::client::StoreClient;
use crate::types::{ColumnDescriptor, RawValue};

use table::MemoryTable;

/// A failure the store can be told to produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Fault {
    /// `connect` fails.
    Connect,
    /// `list_columns` fails.
    ListColumns,
    /// `plan_splits` fails.
    PlanSplits,
    /// `open_cursor` fails.
    OpenCursor,
    /// `advance` fails once the cursor has yielded this many rows.
    AdvanceAfter(usize),
    /// Closing a cursor fails (the cursor is released anyway).
    CloseCursor,
    /// Closing a connection fails (the connection is released anyway).
    CloseConnection,
}

/// Resource counters of a store.
#[derive(Debug, Default)]
pub struct StoreStats {
    connections_opened: AtomicUsize,
    connections_closed: AtomicUsize,
    cursors_opened: AtomicUsize,
    cursors_closed: AtomicUsize,
}

impl StoreStats {
    /// Number of connections opened.
    pub fn connections_opened(&self) -> usize {
        self.connections_opened.load(Ordering::SeqCst)
    }

    /// Number of connections closed.
    pub fn connections_closed(&self) -> usize {
        self.connections_closed.load(Ordering::SeqCst)
    }

    /// Number of cursors opened.
    pub fn cursors_opened(&self) -> usize {
        self.cursors_opened.load(Ordering::SeqCst)
    }

    /// Number of cursors closed.
    pub fn cursors_closed(&self) -> usize {
        self.cursors_closed.load(Ordering::SeqCst)
    }

    /// Number of connections currently open.
    pub fn open_connections(&self) -> usize {
        self.connections_opened()
            .saturating_sub(self.connections_closed())
    }

    /// Number of cursors currently open.
    pub fn open_cursors(&self) -> usize {
        self.cursors_opened().saturating_sub(self.cursors_closed())
    }
}

/// Shared state behind every handle of one store.
#[derive(Debug)]
struct StoreInner {
    /// Tables by name.
    tables: RwLock<BTreeMap<TableRef, Arc<RwLock<MemoryTable>>>>,
    /// Next table ID.
    next_table_id: AtomicU64,
    /// Rows per region when planning splits.
    rows_per_region: AtomicUsize,
    /// Manual clock in milliseconds; the system clock is used when unset.
    manual_clock: Option<AtomicU64>,
    /// Last allocated commit timestamp.
    last_commit: Mutex<SnapshotTimestamp>,
    /// Armed faults.
    faults: Mutex<HashSet<Fault>>,
    /// Resource counters.
    stats: StoreStats,
}

/// In-memory implementation of [`StoreClient`].
///
/// Cloning a `MemoryStore` yields another handle to the same data.
#[derive(Debug, Clone)]
pub struct MemoryStore {
    inner: Arc<StoreInner>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    /// Creates an empty store driven by the system clock.
    pub fn new() -> Self {
        Self::build(DEFAULT_ROWS_PER_REGION, None)
    }

    /// Creates an empty store whose commit clock only moves when told to.
    pub fn with_manual_clock(start_millis: u64) -> Self {
        Self::build(DEFAULT_ROWS_PER_REGION, Some(AtomicU64::new(start_millis)))
    }

    fn build(rows_per_region: usize, manual_clock: Option<AtomicU64>) -> Self {
        Self {
            inner: Arc::new(StoreInner {
                tables: RwLock::new(BTreeMap::new()),
                next_table_id: AtomicU64::new(1),
                rows_per_region: AtomicUsize::new(rows_per_region),
                manual_clock,
                last_commit: Mutex::new(SnapshotTimestamp::ZERO),
                faults: Mutex::new(HashSet::new()),
                stats: StoreStats::default(),
            }),
        }
    }

    /// Sets the number of rows per region used by later split planning.
    pub fn with_rows_per_region(self, rows_per_region: usize) -> Self {
        self.inner
            .rows_per_region
            .store(rows_per_region.max(1), Ordering::SeqCst);
        self
    }

    fn rows_per_region(&self) -> usize {
        self.inner.rows_per_region.load(Ordering::SeqCst)
    }

    /// Returns the resource counters.
    pub fn stats(&self) -> &StoreStats {
        &self.inner.stats
    }

    /// Advances the manual clock. No-op on system-clock stores.
    pub fn advance_clock(&self, by: Duration) {
        if let Some(clock) = &self.inner.manual_clock {
            clock.fetch_add(by.as_millis() as u64, Ordering::SeqCst);
        }
    }

    /// Returns the current physical time in milliseconds.
    pub fn now_millis(&self) -> u64 {
        match &self.inner.manual_clock {
            Some(clock) => clock.load(Ordering::SeqCst),
            None => SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .unwrap_or(Duration::ZERO)
                .as_millis() as u64,
        }
    }

    /// Arms a fault.
    pub fn inject(&self, fault: Fault) {
        self.inner.faults.lock().insert(fault);
    }

    /// Disarms all faults.
    pub fn clear_faults(&self) {
        self.inner.faults.lock().clear();
    }

    fn fault_armed(&self, fault: Fault) -> bool {
        self.inner.faults.lock().contains(&fault)
    }

    fn advance_fault(&self) -> Option<usize> {
        self.inner.faults.lock().iter().find_map(|fault| match fault {
            Fault::AdvanceAfter(rows) => Some(*rows),
            _ => None,
        })
    }

    /// Allocates a commit timestamp strictly greater than every earlier one.
    fn next_commit_ts(&self) -> SnapshotTimestamp {
        let now = self.now_millis();
        let mut last = self.inner.last_commit.lock();
        let next = if now > last.physical() {
            SnapshotTimestamp::new(now, 0)
        } else if last.logical() == MAX_LOGICAL {
            SnapshotTimestamp::new(last.physical() + 1, 0)
        } else {
            SnapshotTimestamp::new(last.physical(), last.logical() + 1)
        };
        *last = next;
        next
    }

    // =========================================================================
    // Schema and data
    // =========================================================================

    /// Creates a table. Column ordinals are reassigned from the column order.
    pub fn create_table(
        &self,
        table: &TableRef,
        columns: Vec<ColumnDescriptor>,
    ) -> StoreResult<()> {
        let mut tables = self.inner.tables.write();
        if tables.contains_key(table) {
            return Err(StoreError::RequestFailed(format!(
                "table {} already exists",
                table
            )));
        }

        let columns = columns
            .into_iter()
            .enumerate()
            .map(|(ordinal, column)| ColumnDescriptor { ordinal, ..column })
            .collect();
        let id = self.inner.next_table_id.fetch_add(1, Ordering::SeqCst);
        tables.insert(
            table.clone(),
            Arc::new(RwLock::new(MemoryTable::new(id, columns))),
        );
        Ok(())
    }

    /// Appends rows with handles following the current maximum handle.
    ///
    /// All rows commit at one timestamp, which is returned.
    pub fn insert_rows<I>(&self, table: &TableRef, rows: I) -> StoreResult<SnapshotTimestamp>
    where
        I: IntoIterator<Item = Vec<RawValue>>,
    {
        let table = self.table(table)?;
        let mut table = table.write();
        let commit_ts = self.next_commit_ts();
        let mut handle = table.max_handle().map_or(1, |h| h.saturating_add(1));
        for values in rows {
            table.put(handle, commit_ts.to_version(), values)?;
            handle = handle.saturating_add(1);
        }
        Ok(commit_ts)
    }

    /// Writes one row under an explicit handle, replacing any previous version.
    pub fn upsert(
        &self,
        table: &TableRef,
        handle: i64,
        values: Vec<RawValue>,
    ) -> StoreResult<SnapshotTimestamp> {
        let table = self.table(table)?;
        let mut table = table.write();
        let commit_ts = self.next_commit_ts();
        table.put(handle, commit_ts.to_version(), values)?;
        Ok(commit_ts)
    }

    /// Deletes one row. Returns `None` if no live row had that handle.
    pub fn delete(&self, table: &TableRef, handle: i64) -> StoreResult<Option<SnapshotTimestamp>> {
        let table = self.table(table)?;
        let mut table = table.write();
        if !table.is_live(handle) {
            return Ok(None);
        }
        let commit_ts = self.next_commit_ts();
        table.delete(handle, commit_ts.to_version());
        Ok(Some(commit_ts))
    }

    /// Returns the number of live rows at the latest version.
    pub fn row_count(&self, table: &TableRef) -> StoreResult<usize> {
        Ok(self.table(table)?.read().live_rows(u64::MAX))
    }

    fn table(&self, table: &TableRef) -> StoreResult<Arc<RwLock<MemoryTable>>> {
        self.inner
            .tables
            .read()
            .get(table)
            .cloned()
            .ok_or_else(|| StoreError::TableNotFound(table.clone()))
    }
}

impl StoreClient for MemoryStore {
    type Connection = MemoryConnection;

    fn connect(&self, _properties: &BTreeMap<String, String>) -> StoreResult<MemoryConnection> {
        if self.fault_armed(Fault::Connect) {
            return Err(StoreError::ConnectionFailed("injected fault".into()));
        }
        self.inner
            .stats
            .connections_opened
            .fetch_add(1, Ordering::SeqCst);
        Ok(MemoryConnection::new(self.clone()))
    }
}
