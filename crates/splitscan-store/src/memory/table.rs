//! Versioned row storage of one in-memory table.

use std::collections::BTreeMap;
use std::sync::Arc;

use splitscan_common::error::{StoreError, StoreResult};
use splitscan_common::types::{Key, RegionId, TableRef};

use crate::types::{ColumnDescriptor, RawValue, SplitDescriptor};

/// One committed version of a row. `None` values mark a delete.
#[derive(Debug, Clone)]
struct RowVersion {
    version: u64,
    values: Option<Arc<[RawValue]>>,
}

/// A table: schema plus per-handle version chains ordered oldest first.
#[derive(Debug)]
pub(super) struct MemoryTable {
    id: u64,
    columns: Vec<ColumnDescriptor>,
    rows: BTreeMap<i64, Vec<RowVersion>>,
}

impl MemoryTable {
    pub(super) fn new(id: u64, columns: Vec<ColumnDescriptor>) -> Self {
        Self {
            id,
            columns,
            rows: BTreeMap::new(),
        }
    }

    pub(super) fn columns(&self) -> &[ColumnDescriptor] {
        &self.columns
    }

    pub(super) fn max_handle(&self) -> Option<i64> {
        self.rows.keys().next_back().copied()
    }

    pub(super) fn put(&mut self, handle: i64, version: u64, values: Vec<RawValue>) -> StoreResult<()> {
        if values.len() != self.columns.len() {
            return Err(StoreError::RequestFailed(format!(
                "row has {} values, table has {} columns",
                values.len(),
                self.columns.len()
            )));
        }
        self.rows.entry(handle).or_default().push(RowVersion {
            version,
            values: Some(values.into()),
        });
        Ok(())
    }

    pub(super) fn delete(&mut self, handle: i64, version: u64) {
        self.rows.entry(handle).or_default().push(RowVersion {
            version,
            values: None,
        });
    }

    pub(super) fn is_live(&self, handle: i64) -> bool {
        self.rows
            .get(&handle)
            .and_then(|chain| chain.last())
            .is_some_and(|latest| latest.values.is_some())
    }

    pub(super) fn live_rows(&self, read_version: u64) -> usize {
        self.rows
            .values()
            .filter(|chain| visible(chain, read_version).is_some())
            .count()
    }

    /// Splits the handle space into regions of at most `rows_per_region` handles.
    ///
    /// The first region starts at the table prefix and the last one ends at
    /// the prefix successor, so the regions tile the whole table key space.
    pub(super) fn regions(&self, table: &TableRef, rows_per_region: usize) -> Vec<SplitDescriptor> {
        let prefix = Key::table_prefix(self.id);
        let end = prefix.successor();
        let handles: Vec<i64> = self.rows.keys().copied().collect();

        let mut boundaries = vec![prefix];
        boundaries.extend(
            handles
                .chunks(rows_per_region)
                .skip(1)
                .map(|chunk| Key::record(self.id, chunk[0])),
        );
        boundaries.push(end);

        boundaries
            .windows(2)
            .enumerate()
            .map(|(idx, range)| {
                SplitDescriptor::new(
                    table.clone(),
                    RegionId::new((self.id << 32) | idx as u64),
                    range[0].clone(),
                    range[1].clone(),
                )
            })
            .collect()
    }

    /// Returns the rows of `split` visible at `read_version`, in handle order.
    pub(super) fn visible_rows(
        &self,
        split: &SplitDescriptor,
        read_version: u64,
    ) -> impl Iterator<Item = &Arc<[RawValue]>> + '_ {
        let split = split.clone();
        let table_id = self.id;
        self.rows
            .iter()
            .filter(move |(handle, _)| split.contains(&Key::record(table_id, **handle)))
            .filter_map(move |(_, chain)| visible(chain, read_version))
    }
}

fn visible(chain: &[RowVersion], read_version: u64) -> Option<&Arc<[RawValue]>> {
    chain
        .iter()
        .rev()
        .find(|v| v.version <= read_version)
        .and_then(|v| v.values.as_ref())
}
