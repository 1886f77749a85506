//! Split planning.
//!
//! Planning runs once per scan, when the engine is constructed. It opens a
//! dedicated connection, checks that the table exists, lists its columns and
//! asks the store for the table's splits. The connection is closed before
//! returning on every path.

use serde::Serialize;
use splitscan_common::error::{ScanError, ScanResult};
use splitscan_common::types::TableRef;
use splitscan_store::{ColumnDescriptor, SplitDescriptor, StoreClient, StoreConnection};
use tracing::{info, warn};

use crate::config::ScanConfig;

/// The fixed plan of a scan: its splits and its columns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScanPlan {
    table: TableRef,
    columns: Vec<ColumnDescriptor>,
    splits: Vec<SplitDescriptor>,
}

impl ScanPlan {
    /// Returns the planned table.
    pub fn table(&self) -> &TableRef {
        &self.table
    }

    /// Returns the table's columns in physical order.
    pub fn columns(&self) -> &[ColumnDescriptor] {
        &self.columns
    }

    /// Returns the table's splits in key order.
    pub fn splits(&self) -> &[SplitDescriptor] {
        &self.splits
    }

    /// Returns the split at `index`.
    pub fn split(&self, index: usize) -> Option<&SplitDescriptor> {
        self.splits.get(index)
    }
}

/// Computes a [`ScanPlan`] against a store.
pub struct SplitPlanner<'a, S> {
    client: &'a S,
    config: &'a ScanConfig,
}

impl<'a, S: StoreClient> SplitPlanner<'a, S> {
    /// Creates a planner.
    pub fn new(client: &'a S, config: &'a ScanConfig) -> Self {
        Self { client, config }
    }

    /// Plans the configured table.
    pub fn plan(&self) -> ScanResult<ScanPlan> {
        let table = self.config.table();
        let mut conn = self
            .client
            .connect(self.config.properties())
            .map_err(|source| ScanError::Planning {
                table: table.clone(),
                source,
            })?;

        let result = Self::plan_with(&conn, table);

        if let Err(e) = conn.close() {
            warn!(table = %table, error = %e, "Failed to close planning connection");
        }

        let plan = result?;
        info!(
            table = %table,
            splits = plan.splits.len(),
            columns = plan.columns.len(),
            "Planned table scan"
        );
        Ok(plan)
    }

    fn plan_with(conn: &S::Connection, table: &TableRef) -> ScanResult<ScanPlan> {
        let planning = |source| ScanError::Planning {
            table: table.clone(),
            source,
        };

        if !conn.table_exists(table).map_err(planning)? {
            return Err(ScanError::TableNotFound {
                table: table.clone(),
            });
        }

        let columns = conn.list_columns(table).map_err(planning)?;
        if columns.is_empty() {
            return Err(ScanError::NoColumns {
                table: table.clone(),
            });
        }

        let splits = conn.plan_splits(table).map_err(planning)?;

        Ok(ScanPlan {
            table: table.clone(),
            columns,
            splits,
        })
    }
}
