//! Connection handle of the in-memory store.

use std::sync::atomic::Ordering;

use splitscan_common::error::{StoreError, StoreResult};
use splitscan_common::types::TableRef;

use crate::client::{ScanRequest, StoreConnection};
use crate::types::{ColumnDescriptor, SplitDescriptor};

use super::{Fault, MemoryCursor, MemoryStore};

/// Connection returned by [`MemoryStore`].
#[derive(Debug)]
pub struct MemoryConnection {
    store: MemoryStore,
    closed: bool,
}

impl MemoryConnection {
    pub(super) fn new(store: MemoryStore) -> Self {
        Self {
            store,
            closed: false,
        }
    }

    /// Returns whether the connection has been closed.
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    fn ensure_open(&self) -> StoreResult<()> {
        if self.closed {
            Err(StoreError::ConnectionClosed)
        } else {
            Ok(())
        }
    }
}

impl StoreConnection for MemoryConnection {
    type Cursor = MemoryCursor;

    fn table_exists(&self, table: &TableRef) -> StoreResult<bool> {
        self.ensure_open()?;
        Ok(self.store.inner.tables.read().contains_key(table))
    }

    fn list_columns(&self, table: &TableRef) -> StoreResult<Vec<ColumnDescriptor>> {
        self.ensure_open()?;
        if self.store.fault_armed(Fault::ListColumns) {
            return Err(StoreError::RequestFailed("injected fault listing columns".into()));
        }
        Ok(self.store.table(table)?.read().columns().to_vec())
    }

    fn plan_splits(&self, table: &TableRef) -> StoreResult<Vec<SplitDescriptor>> {
        self.ensure_open()?;
        if self.store.fault_armed(Fault::PlanSplits) {
            return Err(StoreError::RequestFailed("injected fault planning splits".into()));
        }
        let rows_per_region = self.store.rows_per_region();
        Ok(self.store.table(table)?.read().regions(table, rows_per_region))
    }

    fn open_cursor(&self, request: ScanRequest<'_>) -> StoreResult<MemoryCursor> {
        self.ensure_open()?;
        if self.store.fault_armed(Fault::OpenCursor) {
            return Err(StoreError::RequestFailed("injected fault opening cursor".into()));
        }

        let table = self.store.table(&request.split.table)?;
        let table = table.read();
        let width = table.columns().len();
        if let Some(column) = request.columns.iter().find(|c| c.ordinal >= width) {
            return Err(StoreError::ColumnOutOfRange {
                index: column.ordinal,
                width,
            });
        }

        let read_version = request
            .snapshot
            .map_or(u64::MAX, |snapshot| snapshot.to_version());
        let mut rows = Vec::new();
        for row in table.visible_rows(request.split, read_version) {
            if rows.len() >= request.limit as usize {
                break;
            }
            if let Some(filter) = request.filter {
                if !filter.matches(row)? {
                    continue;
                }
            }
            rows.push(
                request
                    .columns
                    .iter()
                    .map(|column| row[column.ordinal].clone())
                    .collect(),
            );
        }

        Ok(MemoryCursor::new(
            self.store.clone(),
            request.split.region_id,
            rows,
        ))
    }

    fn close(&mut self) -> StoreResult<()> {
        self.ensure_open()?;
        self.closed = true;
        self.store
            .inner
            .stats
            .connections_closed
            .fetch_add(1, Ordering::SeqCst);

        if self.store.fault_armed(Fault::CloseConnection) {
            return Err(StoreError::RequestFailed("injected fault closing connection".into()));
        }
        Ok(())
    }
}
