//! Buffered cursor over one region of an in-memory table.

use std::sync::atomic::Ordering;

use splitscan_common::error::{StoreError, StoreResult};
use splitscan_common::types::RegionId;
use tracing::debug;

use crate::client::RecordCursor;
use crate::types::RawValue;

use super::{Fault, MemoryStore};

/// Cursor returned by [`MemoryConnection`](super::MemoryConnection).
///
/// Rows are materialized when the cursor opens, so later writes to the
/// table never leak into an open cursor.
#[derive(Debug)]
pub struct MemoryCursor {
    store: MemoryStore,
    region: RegionId,
    rows: Vec<Vec<RawValue>>,
    /// Index of the current row; `None` before the first advance.
    position: Option<usize>,
    yielded: usize,
    closed: bool,
}

impl MemoryCursor {
    pub(super) fn new(store: MemoryStore, region: RegionId, rows: Vec<Vec<RawValue>>) -> Self {
        store
            .inner
            .stats
            .cursors_opened
            .fetch_add(1, Ordering::SeqCst);
        debug!(region = %region, rows = rows.len(), "Opened memory cursor");
        Self {
            store,
            region,
            rows,
            position: None,
            yielded: 0,
            closed: false,
        }
    }

    /// Returns the number of rows buffered at open.
    pub fn buffered_rows(&self) -> usize {
        self.rows.len()
    }

    /// Returns whether the cursor has been closed.
    pub fn is_closed(&self) -> bool {
        self.closed
    }
}

impl RecordCursor for MemoryCursor {
    fn advance(&mut self) -> StoreResult<bool> {
        if self.closed {
            return Err(StoreError::CursorClosed);
        }
        if self.store.advance_fault() == Some(self.yielded) {
            return Err(StoreError::RequestFailed(format!(
                "injected fault in region {} after {} rows",
                self.region, self.yielded
            )));
        }

        let next = self.position.map_or(0, |p| p + 1);
        if next < self.rows.len() {
            self.position = Some(next);
            self.yielded += 1;
            Ok(true)
        } else {
            self.position = Some(self.rows.len());
            Ok(false)
        }
    }

    fn value(&self, index: usize) -> StoreResult<&RawValue> {
        if self.closed {
            return Err(StoreError::CursorClosed);
        }
        let row = self
            .position
            .and_then(|p| self.rows.get(p))
            .ok_or(StoreError::NotPositioned)?;
        row.get(index).ok_or(StoreError::ColumnOutOfRange {
            index,
            width: row.len(),
        })
    }

    fn close(&mut self) -> StoreResult<()> {
        if self.closed {
            return Err(StoreError::CursorClosed);
        }
        self.closed = true;
        self.rows.clear();
        self.store
            .inner
            .stats
            .cursors_closed
            .fetch_add(1, Ordering::SeqCst);

        if self.store.fault_armed(Fault::CloseCursor) {
            return Err(StoreError::RequestFailed(format!(
                "injected fault closing cursor on region {}",
                self.region
            )));
        }
        Ok(())
    }
}
