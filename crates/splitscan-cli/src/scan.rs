//! Scan execution across worker threads.
//!
//! Each worker owns a duplicate of the planned engine, so every worker has
//! its own connection and row counter. Splits are pulled from a shared
//! assigner until none are left.

use std::thread;

use anyhow::{anyhow, Context, Result};
use splitscan_core::{Field, InputFormat, InputSplit, Row, ScanEngine, SplitAssigner};
use splitscan_store::StoreClient;
use tracing::{debug, info};

/// Rows of one split.
type SplitRows = (usize, Vec<Row>);

/// Result of a complete scan.
#[derive(Debug)]
pub struct ScanOutput {
    /// Projected output fields.
    pub fields: Vec<Field>,
    /// Rows in split order.
    pub rows: Vec<Row>,
}

/// Scans every split of `engine` with `workers` threads.
///
/// The engine's limit applies per worker; the combined output is truncated
/// to it as well.
pub fn run<S: StoreClient>(engine: &ScanEngine<S>, workers: usize) -> Result<ScanOutput> {
    let workers = workers.max(1);
    let splits = engine.create_input_splits(workers);
    let assigner = SplitAssigner::new(splits);
    info!(splits = engine.splits().len(), workers, "Starting scan");

    let mut per_split: Vec<SplitRows> = thread::scope(|scope| {
        let handles: Vec<_> = (0..workers)
            .map(|worker| {
                let mut instance = engine.duplicate();
                let assigner = &assigner;
                scope.spawn(move || scan_worker(&mut instance, assigner, worker))
            })
            .collect();

        handles
            .into_iter()
            .map(|handle| {
                handle
                    .join()
                    .map_err(|_| anyhow!("scan worker panicked"))?
            })
            .collect::<Result<Vec<Vec<SplitRows>>>>()
            .map(|all| all.into_iter().flatten().collect())
    })?;

    per_split.sort_by_key(|(split, _)| *split);
    let mut rows: Vec<Row> = per_split.into_iter().flat_map(|(_, rows)| rows).collect();
    if let Some(limit) = engine.limit() {
        rows.truncate(usize::try_from(limit).unwrap_or(usize::MAX));
    }

    info!(rows = rows.len(), "Scan complete");
    Ok(ScanOutput {
        fields: engine.produced_fields(),
        rows,
    })
}

fn scan_worker<F>(format: &mut F, assigner: &SplitAssigner, worker: usize) -> Result<Vec<SplitRows>>
where
    F: InputFormat<Record = Row>,
{
    format
        .open_input_format()
        .with_context(|| format!("Worker {} failed to configure its scan", worker))?;

    let result = drain_assigned(format, assigner, worker);
    format.close_input_format();
    result
}

fn drain_assigned<F>(format: &mut F, assigner: &SplitAssigner, worker: usize) -> Result<Vec<SplitRows>>
where
    F: InputFormat<Record = Row>,
{
    let mut out = Vec::new();
    while let Some(split) = assigner.next_split(worker) {
        let rows = read_split(format, &split)?;
        debug!(worker, split = split.number(), rows = rows.len(), "Split finished");
        out.push((split.number(), rows));
    }
    Ok(out)
}

fn read_split<F>(format: &mut F, split: &InputSplit) -> Result<Vec<Row>>
where
    F: InputFormat<Record = Row>,
{
    format
        .open(split)
        .with_context(|| format!("Failed to open {}", split))?;

    let mut rows = Vec::new();
    let read = (|| {
        while !format.reached_end()? {
            rows.push(format.next_record()?);
        }
        Ok::<_, splitscan_common::error::ScanError>(())
    })();
    let closed = format.close();
    read.with_context(|| format!("Failed to read {}", split))?;
    closed?;
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use splitscan_common::types::TableRef;
    use splitscan_core::{ScanConfig, Value};
    use splitscan_store::{ColumnDescriptor, DataType, Fault, MemoryStore, RawValue};

    fn engine(rows: i64) -> (MemoryStore, ScanEngine<MemoryStore>) {
        let store = MemoryStore::new().with_rows_per_region(3);
        let table = TableRef::new("db", "t");
        store
            .create_table(&table, vec![ColumnDescriptor::new("id", DataType::Int, 0)])
            .unwrap();
        store
            .insert_rows(&table, (0..rows).map(|i| vec![RawValue::Int(i)]))
            .unwrap();
        let config = ScanConfig::from_pairs([("database-name", "db"), ("table-name", "t")]).unwrap();
        let engine = ScanEngine::new(store.clone(), config).unwrap();
        (store, engine)
    }

    #[test]
    fn test_parallel_scan_keeps_split_order() {
        let (store, engine) = engine(20);
        let output = run(&engine, 3).unwrap();
        let ids: Vec<Value> = output.rows.iter().map(|r| r.values()[0].clone()).collect();
        assert_eq!(ids, (0..20).map(Value::Int).collect::<Vec<_>>());
        assert_eq!(output.fields.len(), 1);
        assert_eq!(store.stats().open_connections(), 0);
    }

    #[test]
    fn test_limit_truncates_output() {
        let (_store, mut engine) = engine(20);
        engine.set_limit(4).unwrap();
        let output = run(&engine, 4).unwrap();
        assert_eq!(output.rows.len(), 4);
    }

    #[test]
    fn test_worker_failure_is_reported() {
        let (store, engine) = engine(20);
        store.inject(Fault::OpenCursor);
        let err = run(&engine, 2).unwrap_err();
        assert!(format!("{:#}", err).contains("Failed to open split"));
        assert_eq!(store.stats().open_connections(), 0);
    }
}
