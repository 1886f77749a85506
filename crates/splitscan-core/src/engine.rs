//! Scan engine.
//!
//! The engine drives one scan instance through its lifecycle:
//!
//! ```text
//!   new() ──plan + snapshot──▶ Unconfigured
//!                                   │ configure_runtime()
//!                                   ▼
//!              ┌──────────────▶   Ready  ◀──────────────┐
//!              │                    │ open_split(i)     │ close_split()
//!              │                    ▼                   │
//!              │                Scanning ───────────────┘
//!              │                    │ has_more() / produce_next()
//!              │                    ▼
//!              └──────────────── exhausted
//!
//!   close() from any state ──▶ Closed
//! ```
//!
//! Planning and snapshot resolution happen once in the constructor; a failed
//! construction never yields an engine. `configure_runtime` compiles the
//! per-field patterns and opens the connection every split of this instance
//! reuses. The row limit is global to the instance: no split is opened once
//! it is reached, and a split in progress stops producing at the limit.
//!
//! Parallel scans use one engine per worker, created with
//! [`ScanEngine::duplicate`]. Duplicates share the plan and configuration and
//! own their connection and row counter.

use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::mem;
use std::sync::Arc;

use splitscan_common::constants::{MAX_CURSOR_ROWS, UNLIMITED_ROWS};
use splitscan_common::error::{ScanError, ScanResult};
use splitscan_store::{
    ColumnDescriptor, FilterExpr, ScanRequest, SplitDescriptor, StoreClient, StoreConnection,
};
use tracing::{debug, info, warn};

use crate::coercion::Coercer;
use crate::config::ScanConfig;
use crate::cursor::SplitCursor;
use crate::planner::{ScanPlan, SplitPlanner};
use crate::row::{Field, Row};

type CursorOf<S> = SplitCursor<<<S as StoreClient>::Connection as StoreConnection>::Cursor>;

/// Lifecycle state of a [`ScanEngine`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    /// Planned; runtime not configured yet.
    Unconfigured,
    /// Connection open; no split cursor.
    Ready,
    /// A split cursor is open.
    Scanning,
    /// Torn down.
    Closed,
}

impl fmt::Display for EngineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EngineState::Unconfigured => "unconfigured",
            EngineState::Ready => "ready",
            EngineState::Scanning => "scanning",
            EngineState::Closed => "closed",
        };
        f.write_str(name)
    }
}

/// Per-instance runtime resources.
enum Runtime<C> {
    Unconfigured,
    Ready { connection: C, coercer: Coercer },
    Closed,
}

/// A bounded, splittable table scan over a store.
pub struct ScanEngine<S: StoreClient> {
    client: Arc<S>,
    config: Arc<ScanConfig>,
    plan: Arc<ScanPlan>,
    /// Output fields, one per store column.
    fields: Arc<[Field]>,
    limit: Option<u64>,
    projection: Vec<usize>,
    filter: Option<FilterExpr>,
    record_count: u64,
    scan_started: bool,
    runtime: Runtime<S::Connection>,
    cursor: Option<CursorOf<S>>,
    current_split: Option<usize>,
    /// The cursor is positioned on a row that has not been produced yet.
    pending: bool,
}

impl<S: StoreClient> ScanEngine<S> {
    /// Plans a scan of the configured table.
    pub fn new(client: S, config: ScanConfig) -> ScanResult<Self> {
        Self::with_shared(Arc::new(client), Arc::new(config))
    }

    /// Parses `properties` and plans a scan.
    pub fn from_properties(client: S, properties: BTreeMap<String, String>) -> ScanResult<Self> {
        Self::new(client, ScanConfig::from_properties(properties)?)
    }

    /// Plans a scan with a shared client and configuration.
    pub fn with_shared(client: Arc<S>, config: Arc<ScanConfig>) -> ScanResult<Self> {
        let plan = SplitPlanner::new(client.as_ref(), &config).plan()?;
        let fields: Arc<[Field]> = plan.columns().iter().map(Field::from).collect();
        let projection = (0..fields.len()).collect();

        Ok(Self {
            client,
            config,
            plan: Arc::new(plan),
            fields,
            limit: None,
            projection,
            filter: None,
            record_count: 0,
            scan_started: false,
            runtime: Runtime::Unconfigured,
            cursor: None,
            current_split: None,
            pending: false,
        })
    }

    /// Replaces the output field names and target types.
    ///
    /// `fields` must hold one entry per store column, in column order.
    pub fn with_output_fields(mut self, fields: Vec<Field>) -> ScanResult<Self> {
        if self.state() != EngineState::Unconfigured {
            return Err(self.invalid_state("set output fields"));
        }
        if fields.len() != self.plan.columns().len() {
            return Err(ScanError::projection(format!(
                "expected {} output fields, got {}",
                self.plan.columns().len(),
                fields.len()
            )));
        }
        self.fields = fields.into();
        Ok(self)
    }

    /// Creates a fresh instance over the same plan, configuration and
    /// snapshot, with its own connection and row counter.
    ///
    /// Limit, projection and filter are carried over.
    pub fn duplicate(&self) -> Self {
        Self {
            client: Arc::clone(&self.client),
            config: Arc::clone(&self.config),
            plan: Arc::clone(&self.plan),
            fields: Arc::clone(&self.fields),
            limit: self.limit,
            projection: self.projection.clone(),
            filter: self.filter.clone(),
            record_count: 0,
            scan_started: false,
            runtime: Runtime::Unconfigured,
            cursor: None,
            current_split: None,
            pending: false,
        }
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    /// Returns the configuration.
    pub fn config(&self) -> &ScanConfig {
        &self.config
    }

    /// Returns the plan.
    pub fn plan(&self) -> &ScanPlan {
        &self.plan
    }

    /// Returns the planned splits.
    pub fn splits(&self) -> &[SplitDescriptor] {
        self.plan.splits()
    }

    /// Returns the store columns.
    pub fn columns(&self) -> &[ColumnDescriptor] {
        self.plan.columns()
    }

    /// Returns the output fields, one per store column.
    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    /// Returns the projected output fields, in output order.
    pub fn produced_fields(&self) -> Vec<Field> {
        self.projection
            .iter()
            .map(|&ordinal| self.fields[ordinal].clone())
            .collect()
    }

    /// Returns the projection as column ordinals.
    pub fn projection(&self) -> &[usize] {
        &self.projection
    }

    /// Returns the row limit.
    pub fn limit(&self) -> Option<u64> {
        self.limit
    }

    /// Returns the filter pushed to the store.
    pub fn filter(&self) -> Option<&FilterExpr> {
        self.filter.as_ref()
    }

    /// Returns the number of rows produced so far.
    pub fn record_count(&self) -> u64 {
        self.record_count
    }

    /// Returns the split currently or last opened.
    pub fn current_split(&self) -> Option<usize> {
        self.current_split
    }

    /// Returns the lifecycle state.
    pub fn state(&self) -> EngineState {
        match (&self.runtime, &self.cursor) {
            (Runtime::Unconfigured, _) => EngineState::Unconfigured,
            (Runtime::Closed, _) => EngineState::Closed,
            (Runtime::Ready { .. }, Some(_)) => EngineState::Scanning,
            (Runtime::Ready { .. }, None) => EngineState::Ready,
        }
    }

    fn invalid_state(&self, operation: &'static str) -> ScanError {
        ScanError::InvalidState {
            operation,
            state: self.state().to_string(),
        }
    }

    fn ensure_not_started(&self, operation: &'static str) -> ScanResult<()> {
        if self.scan_started || self.state() == EngineState::Closed {
            return Err(ScanError::InvalidState {
                operation,
                state: format!("{} (scan already started)", self.state()),
            });
        }
        Ok(())
    }

    fn limit_reached(&self) -> bool {
        self.limit.is_some_and(|limit| self.record_count >= limit)
    }

    fn remaining(&self) -> u64 {
        self.limit
            .map_or(UNLIMITED_ROWS, |limit| limit.saturating_sub(self.record_count))
    }

    // =========================================================================
    // Pre-scan configuration
    // =========================================================================

    /// Caps the number of rows produced by this instance.
    pub fn set_limit(&mut self, limit: u64) -> ScanResult<()> {
        self.ensure_not_started("set limit")?;
        self.limit = Some(limit);
        Ok(())
    }

    /// Sets the projection. Each entry must hold exactly one column ordinal.
    pub fn set_projected_fields(&mut self, fields: &[Vec<usize>]) -> ScanResult<()> {
        self.ensure_not_started("set projected fields")?;

        let width = self.plan.columns().len();
        let mut seen = HashSet::with_capacity(fields.len());
        let mut projection = Vec::with_capacity(fields.len());
        for (i, path) in fields.iter().enumerate() {
            let &[ordinal] = path.as_slice() else {
                return Err(ScanError::projection(format!(
                    "projected field {} has {} indexes, expected exactly 1",
                    i,
                    path.len()
                )));
            };
            if ordinal >= width {
                return Err(ScanError::projection(format!(
                    "column ordinal {} out of range for {} columns",
                    ordinal, width
                )));
            }
            if !seen.insert(ordinal) {
                return Err(ScanError::projection(format!(
                    "column ordinal {} projected twice",
                    ordinal
                )));
            }
            projection.push(ordinal);
        }

        self.projection = projection;
        Ok(())
    }

    /// Sets the filter pushed down to the store. Can be set once.
    pub fn set_filter(&mut self, filter: FilterExpr) -> ScanResult<()> {
        self.ensure_not_started("set filter")?;
        if self.filter.is_some() {
            return Err(ScanError::InvalidState {
                operation: "set filter",
                state: "already filtered".into(),
            });
        }
        let width = self.plan.columns().len();
        if let Some(column) = filter.max_column().filter(|&c| c >= width) {
            return Err(ScanError::InvalidProperty {
                key: "filter".into(),
                value: filter.to_string(),
                reason: format!("column {} out of range for {} columns", column, width),
            });
        }
        self.filter = Some(filter);
        Ok(())
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// Compiles field patterns and opens the connection shared by every split
    /// of this instance. Runs exactly once.
    pub fn configure_runtime(&mut self) -> ScanResult<()> {
        if self.state() != EngineState::Unconfigured {
            return Err(self.invalid_state("configure runtime"));
        }

        let coercer = Coercer::new(&self.fields, &self.config)?;
        let connection = self
            .client
            .connect(self.config.properties())
            .map_err(|source| ScanError::Connection { source })?;

        info!(
            table = %self.plan.table(),
            snapshot = ?self.config.snapshot(),
            limit = ?self.limit,
            projected = self.projection.len(),
            "Scan runtime configured"
        );
        self.runtime = Runtime::Ready {
            connection,
            coercer,
        };
        Ok(())
    }

    /// Opens split `split`. Does nothing if the row limit is already reached.
    pub fn open_split(&mut self, split: usize) -> ScanResult<()> {
        match self.state() {
            EngineState::Ready => {}
            EngineState::Scanning => self.close_split(),
            _ => return Err(self.invalid_state("open split")),
        }
        let Some(descriptor) = self.plan.split(split) else {
            return Err(ScanError::InvalidState {
                operation: "open split",
                state: format!("holding {} splits, got index {}", self.plan.splits().len(), split),
            });
        };

        self.scan_started = true;
        self.current_split = Some(split);
        if self.limit_reached() {
            debug!(split, count = self.record_count, "Row limit reached, skipping split");
            return Ok(());
        }

        let Runtime::Ready { connection, .. } = &self.runtime else {
            return Err(self.invalid_state("open split"));
        };
        let columns: Vec<ColumnDescriptor> = self
            .projection
            .iter()
            .map(|&ordinal| self.plan.columns()[ordinal].clone())
            .collect();
        let budget = self.remaining().min(MAX_CURSOR_ROWS) as u32;

        let cursor = SplitCursor::open(
            connection,
            split,
            ScanRequest {
                split: descriptor,
                columns: &columns,
                filter: self.filter.as_ref(),
                snapshot: self.config.snapshot(),
                limit: budget,
            },
        )?;
        self.cursor = Some(cursor);
        self.pending = false;
        Ok(())
    }

    /// Returns whether another row is available on the current split.
    pub fn has_more(&mut self) -> ScanResult<bool> {
        if self.limit_reached() {
            return Ok(false);
        }
        if self.pending {
            return Ok(true);
        }
        let Some(cursor) = self.cursor.as_mut() else {
            return Ok(false);
        };
        self.pending = cursor.advance()?;
        Ok(self.pending)
    }

    /// Produces the next row of the current split.
    pub fn produce_next(&mut self) -> ScanResult<Row> {
        if !self.has_more()? {
            return Err(ScanError::NoMoreRows {
                split: self.current_split.unwrap_or_default(),
            });
        }
        self.pending = false;

        let (Some(cursor), Runtime::Ready { coercer, .. }) = (&self.cursor, &self.runtime) else {
            return Err(self.invalid_state("produce row"));
        };
        let values = self
            .projection
            .iter()
            .enumerate()
            .map(|(index, &ordinal)| coercer.coerce(ordinal, cursor.value(index)?))
            .collect::<ScanResult<Vec<_>>>()?;

        self.record_count += 1;
        Ok(Row::new(values))
    }

    /// Closes the current split cursor, if any.
    pub fn close_split(&mut self) {
        if let Some(mut cursor) = self.cursor.take() {
            cursor.close();
        }
        self.pending = false;
    }

    /// Tears down the instance. Idempotent; failures are logged.
    pub fn close(&mut self) {
        self.close_split();
        if let Runtime::Ready { mut connection, .. } =
            mem::replace(&mut self.runtime, Runtime::Closed)
        {
            match connection.close() {
                Ok(()) => debug!(rows = self.record_count, "Closed scan connection"),
                Err(e) => warn!(error = %e, "Failed to close scan connection"),
            }
        }
    }
}

impl<S: StoreClient> Drop for ScanEngine<S> {
    fn drop(&mut self) {
        self.close();
    }
}

impl<S: StoreClient> fmt::Debug for ScanEngine<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScanEngine")
            .field("table", self.plan.table())
            .field("splits", &self.plan.splits().len())
            .field("state", &self.state())
            .field("limit", &self.limit)
            .field("projection", &self.projection)
            .field("record_count", &self.record_count)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use splitscan_common::types::TableRef;
    use splitscan_store::{DataType, Fault, MemoryStore, RawValue};

    use crate::value::Value;

    fn store(rows: i64) -> MemoryStore {
        let store = MemoryStore::new().with_rows_per_region(4);
        let table = TableRef::new("db", "t");
        store
            .create_table(
                &table,
                vec![
                    ColumnDescriptor::new("id", DataType::BigInt, 0),
                    ColumnDescriptor::new("name", DataType::Text, 0),
                    ColumnDescriptor::new("day", DataType::Date, 0),
                ],
            )
            .unwrap();
        store
            .insert_rows(
                &table,
                (0..rows).map(|i| {
                    vec![
                        RawValue::Int(i),
                        RawValue::String(format!("n{i}")),
                        RawValue::Date(i as i32),
                    ]
                }),
            )
            .unwrap();
        store
    }

    fn engine(store: &MemoryStore) -> ScanEngine<MemoryStore> {
        ScanEngine::new(
            store.clone(),
            ScanConfig::from_pairs([("database-name", "db"), ("table-name", "t")]).unwrap(),
        )
        .unwrap()
    }

    #[test]
    fn test_open_requires_runtime() {
        let store = store(2);
        let mut engine = engine(&store);
        assert_eq!(engine.state(), EngineState::Unconfigured);
        assert!(matches!(
            engine.open_split(0),
            Err(ScanError::InvalidState { .. })
        ));

        engine.configure_runtime().unwrap();
        assert!(engine.configure_runtime().is_err());
        assert!(engine.open_split(9).is_err());
        engine.open_split(0).unwrap();
        assert_eq!(engine.state(), EngineState::Scanning);
    }

    #[test]
    fn test_runtime_connect_failure_can_be_retried() {
        let store = store(3);
        let mut engine = engine(&store);

        store.inject(Fault::Connect);
        assert!(matches!(
            engine.configure_runtime(),
            Err(ScanError::Connection { .. })
        ));
        assert_eq!(engine.state(), EngineState::Unconfigured);
        assert_eq!(store.stats().open_connections(), 0);
        assert!(matches!(
            engine.open_split(0),
            Err(ScanError::InvalidState { .. })
        ));

        store.clear_faults();
        engine.configure_runtime().unwrap();
        assert_eq!(engine.state(), EngineState::Ready);
        engine.open_split(0).unwrap();
        assert!(engine.produce_next().is_ok());
        engine.close();
        assert_eq!(store.stats().open_connections(), 0);
    }

    #[test]
    fn test_produce_after_exhaustion_fails() {
        let store = store(2);
        let mut engine = engine(&store);
        engine.configure_runtime().unwrap();
        engine.open_split(0).unwrap();

        assert!(engine.has_more().unwrap());
        assert!(engine.has_more().unwrap());
        let row = engine.produce_next().unwrap();
        assert_eq!(row.get(0), Some(&Value::BigInt(0)));
        engine.produce_next().unwrap();
        assert!(!engine.has_more().unwrap());
        assert!(matches!(
            engine.produce_next(),
            Err(ScanError::NoMoreRows { split: 0 })
        ));
        assert_eq!(engine.record_count(), 2);
    }

    #[test]
    fn test_mutators_rejected_after_scan_started() {
        let store = store(2);
        let mut engine = engine(&store);
        engine.set_limit(10).unwrap();
        engine.configure_runtime().unwrap();
        engine.set_projected_fields(&[vec![1]]).unwrap();
        engine.open_split(0).unwrap();
        engine.close_split();

        assert!(matches!(engine.set_limit(1), Err(ScanError::InvalidState { .. })));
        assert!(engine.set_projected_fields(&[vec![0]]).is_err());
        assert!(engine.set_filter(FilterExpr::eq(0, RawValue::Int(1))).is_err());
    }

    #[test]
    fn test_projection_validation() {
        let store = store(1);
        let mut engine = engine(&store);

        for bad in [vec![vec![0, 1]], vec![vec![]], vec![vec![3]], vec![vec![1], vec![1]]] {
            let err = engine.set_projected_fields(&bad).unwrap_err();
            assert!(matches!(err, ScanError::InvalidProjection { .. }), "{bad:?}");
        }
        engine.set_projected_fields(&[vec![2], vec![0]]).unwrap();
        let produced: Vec<_> = engine.produced_fields().into_iter().map(|f| f.name).collect();
        assert_eq!(produced, vec!["day", "id"]);
    }

    #[test]
    fn test_filter_validation() {
        let store = store(1);
        let mut engine = engine(&store);
        assert!(matches!(
            engine.set_filter(FilterExpr::eq(5, RawValue::Int(1))),
            Err(ScanError::InvalidProperty { .. })
        ));
        engine.set_filter(FilterExpr::eq(0, RawValue::Int(1))).unwrap();
        assert!(engine.set_filter(FilterExpr::eq(0, RawValue::Int(2))).is_err());
    }

    #[test]
    fn test_output_fields_override() {
        let store = store(1);
        let engine = engine(&store)
            .with_output_fields(vec![
                Field::new("id", DataType::Text),
                Field::new("name", DataType::Text),
                Field::new("day", DataType::Timestamp),
            ])
            .unwrap();
        let mut engine = engine;
        engine.configure_runtime().unwrap();
        engine.open_split(0).unwrap();
        let row = engine.produce_next().unwrap();
        assert_eq!(row.get(0), Some(&Value::string("0")));
        assert!(matches!(row.get(2), Some(Value::Timestamp(_))));

        let err = self::engine(&store)
            .with_output_fields(vec![Field::new("id", DataType::Int)])
            .unwrap_err();
        assert!(matches!(err, ScanError::InvalidProjection { .. }));
    }

    #[test]
    fn test_close_is_idempotent() {
        let store = store(3);
        let mut engine = engine(&store);
        engine.close();
        engine.close();
        assert_eq!(engine.state(), EngineState::Closed);
        assert!(engine.configure_runtime().is_err());

        let mut engine = self::engine(&store);
        engine.configure_runtime().unwrap();
        engine.open_split(0).unwrap();
        store.inject(Fault::CloseCursor);
        store.inject(Fault::CloseConnection);
        engine.close();
        engine.close();
        assert_eq!(store.stats().open_connections(), 0);
        assert_eq!(store.stats().open_cursors(), 0);
    }

    #[test]
    fn test_duplicate_is_fresh() {
        let store = store(3);
        let mut engine = engine(&store);
        engine.set_limit(2).unwrap();
        engine.configure_runtime().unwrap();
        engine.open_split(0).unwrap();
        engine.produce_next().unwrap();

        let copy = engine.duplicate();
        assert_eq!(copy.state(), EngineState::Unconfigured);
        assert_eq!(copy.record_count(), 0);
        assert_eq!(copy.limit(), Some(2));
        assert_eq!(copy.splits(), engine.splits());
        assert_eq!(store.stats().connections_opened(), 2);
    }

    #[test]
    fn test_drop_releases_resources() {
        let store = store(3);
        {
            let mut engine = engine(&store);
            engine.configure_runtime().unwrap();
            engine.open_split(0).unwrap();
            assert!(engine.has_more().unwrap());
        }
        assert_eq!(store.stats().open_connections(), 0);
        assert_eq!(store.stats().open_cursors(), 0);
    }
}
