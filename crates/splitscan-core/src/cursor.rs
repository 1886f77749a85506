//! Split cursor.
//!
//! A `SplitCursor` owns the store cursor of one split and guarantees it is
//! closed exactly once: explicitly through [`SplitCursor::close`], or on drop
//! if the owner unwinds before closing.

use splitscan_common::error::{ScanError, ScanResult};
use splitscan_store::{RawValue, RecordCursor, ScanRequest, StoreConnection};
use tracing::{debug, warn};

/// Scoped store cursor over one split.
#[derive(Debug)]
pub struct SplitCursor<C: RecordCursor> {
    split: usize,
    inner: Option<C>,
    rows: u64,
}

impl<C: RecordCursor> SplitCursor<C> {
    /// Opens a cursor for split number `split`.
    pub fn open<Conn>(conn: &Conn, split: usize, request: ScanRequest<'_>) -> ScanResult<Self>
    where
        Conn: StoreConnection<Cursor = C>,
    {
        let inner = conn
            .open_cursor(request)
            .map_err(|source| ScanError::Cursor { split, source })?;
        debug!(
            split,
            region = %request.split.region_id,
            columns = request.columns.len(),
            budget = request.limit,
            "Opened split cursor"
        );
        Ok(Self {
            split,
            inner: Some(inner),
            rows: 0,
        })
    }

    /// Returns the split number.
    pub fn split(&self) -> usize {
        self.split
    }

    /// Returns the number of rows advanced over.
    pub fn rows(&self) -> u64 {
        self.rows
    }

    /// Returns whether the cursor is still open.
    pub fn is_open(&self) -> bool {
        self.inner.is_some()
    }

    /// Moves to the next row. A closed cursor is exhausted.
    pub fn advance(&mut self) -> ScanResult<bool> {
        let Some(inner) = self.inner.as_mut() else {
            return Ok(false);
        };
        let advanced = inner.advance().map_err(|source| ScanError::Cursor {
            split: self.split,
            source,
        })?;
        if advanced {
            self.rows += 1;
        }
        Ok(advanced)
    }

    /// Returns the `index`-th projected value of the current row.
    pub fn value(&self, index: usize) -> ScanResult<&RawValue> {
        let inner = self.inner.as_ref().ok_or(ScanError::NoMoreRows { split: self.split })?;
        inner.value(index).map_err(|source| ScanError::Cursor {
            split: self.split,
            source,
        })
    }

    /// Closes the store cursor. Later calls do nothing.
    ///
    /// Close failures are logged, not returned.
    pub fn close(&mut self) {
        if let Some(mut inner) = self.inner.take() {
            match inner.close() {
                Ok(()) => debug!(split = self.split, rows = self.rows, "Closed split cursor"),
                Err(e) => warn!(split = self.split, error = %e, "Failed to close split cursor"),
            }
        }
    }
}

impl<C: RecordCursor> Drop for SplitCursor<C> {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;
    use splitscan_common::types::TableRef;
    use splitscan_store::{
        ColumnDescriptor, DataType, Fault, MemoryConnection, MemoryStore, StoreClient,
    };

    fn setup() -> (MemoryStore, MemoryConnection) {
        let store = MemoryStore::new();
        let table = TableRef::new("db", "t");
        store
            .create_table(&table, vec![ColumnDescriptor::new("id", DataType::Int, 0)])
            .unwrap();
        store
            .insert_rows(&table, (0..3).map(|i| vec![RawValue::Int(i)]))
            .unwrap();
        let conn = store.connect(&BTreeMap::new()).unwrap();
        (store, conn)
    }

    fn open(conn: &MemoryConnection) -> ScanResult<SplitCursor<splitscan_store::MemoryCursor>> {
        let table = TableRef::new("db", "t");
        let split = conn.plan_splits(&table).unwrap().remove(0);
        let columns = conn.list_columns(&table).unwrap();
        SplitCursor::open(
            conn,
            4,
            ScanRequest {
                split: &split,
                columns: &columns,
                filter: None,
                snapshot: None,
                limit: 2,
            },
        )
    }

    #[test]
    fn test_cursor_reads_within_budget() {
        let (store, conn) = setup();
        let mut cursor = open(&conn).unwrap();
        assert!(cursor.advance().unwrap());
        assert_eq!(cursor.value(0).unwrap(), &RawValue::Int(0));
        assert!(cursor.advance().unwrap());
        assert!(!cursor.advance().unwrap());
        assert_eq!(cursor.rows(), 2);

        cursor.close();
        cursor.close();
        assert!(!cursor.is_open());
        assert!(!cursor.advance().unwrap());
        assert_eq!(store.stats().cursors_closed(), 1);
    }

    #[test]
    fn test_drop_releases_cursor() {
        let (store, conn) = setup();
        {
            let mut cursor = open(&conn).unwrap();
            assert!(cursor.advance().unwrap());
        }
        assert_eq!(store.stats().open_cursors(), 0);
    }

    #[test]
    fn test_faults_surface_as_cursor_errors() {
        let (store, conn) = setup();
        store.inject(Fault::OpenCursor);
        assert!(matches!(open(&conn), Err(ScanError::Cursor { split: 4, .. })));
        store.clear_faults();

        store.inject(Fault::AdvanceAfter(1));
        let mut cursor = open(&conn).unwrap();
        assert!(cursor.advance().unwrap());
        assert!(matches!(cursor.advance(), Err(ScanError::Cursor { .. })));
        store.clear_faults();

        store.inject(Fault::CloseCursor);
        cursor.close();
        assert_eq!(store.stats().open_cursors(), 0);
    }
}
