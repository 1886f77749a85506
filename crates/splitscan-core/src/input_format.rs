//! Host framework surface.
//!
//! An execution host schedules a scan as a set of input splits handed out
//! to workers. Each worker owns one [`ScanEngine`] instance and drives it
//! through the [`InputFormat`] lifecycle:
//!
//! ```text
//! create_input_splits ──▶ SplitAssigner ──next_split──▶ worker
//!                                                        │
//!   open_input_format ─▶ { open ─▶ reached_end/next_record* ─▶ close }* ─▶ close_input_format
//! ```

use std::collections::VecDeque;
use std::fmt;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use splitscan_common::error::{ScanError, ScanResult};
use splitscan_store::{FilterExpr, StoreClient};
use tracing::debug;

use crate::engine::ScanEngine;
use crate::row::Row;

/// Handle of one planned split, as seen by the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct InputSplit {
    number: usize,
    total: usize,
}

impl InputSplit {
    /// Creates the handle of split `number` out of `total`.
    pub const fn new(number: usize, total: usize) -> Self {
        Self { number, total }
    }

    /// Returns the split number.
    pub const fn number(&self) -> usize {
        self.number
    }

    /// Returns the number of splits of the scan.
    pub const fn total(&self) -> usize {
        self.total
    }
}

impl fmt::Display for InputSplit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "split {}/{}", self.number, self.total)
    }
}

/// Size statistics a host may cache between runs.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScanStatistics {
    /// Total input size in bytes, if known.
    pub total_input_size: Option<u64>,
    /// Number of records, if known.
    pub number_of_records: Option<u64>,
    /// Average record width in bytes, if known.
    pub average_record_width: Option<f32>,
}

/// Hands out unassigned splits to requesting workers.
///
/// Assignment ignores locality: any worker receives the next split in
/// plan order.
#[derive(Debug)]
pub struct SplitAssigner {
    pending: Mutex<VecDeque<InputSplit>>,
}

impl SplitAssigner {
    /// Creates an assigner over `splits`.
    pub fn new(splits: impl IntoIterator<Item = InputSplit>) -> Self {
        Self {
            pending: Mutex::new(splits.into_iter().collect()),
        }
    }

    /// Returns the next unassigned split for `worker`, if any.
    pub fn next_split(&self, worker: usize) -> Option<InputSplit> {
        let split = self.pending.lock().pop_front();
        if let Some(split) = split {
            debug!(worker, split = split.number(), "Assigned input split");
        }
        split
    }

    /// Puts splits back, e.g. after a worker failed.
    pub fn return_splits(&self, splits: impl IntoIterator<Item = InputSplit>, worker: usize) {
        let mut pending = self.pending.lock();
        for split in splits {
            debug!(worker, split = split.number(), "Returned input split");
            pending.push_back(split);
        }
    }

    /// Returns the number of unassigned splits.
    pub fn remaining(&self) -> usize {
        self.pending.lock().len()
    }
}

/// Lifecycle a host uses to drive a splittable source.
pub trait InputFormat {
    /// Record type produced.
    type Record;

    /// Returns the statistics of the source, given the cached ones.
    fn statistics(&self, cached: Option<ScanStatistics>) -> Option<ScanStatistics>;

    /// Returns one handle per planned split.
    fn create_input_splits(&self, min_splits: usize) -> Vec<InputSplit>;

    /// Returns the assigner for `splits`.
    fn input_split_assigner(&self, splits: Vec<InputSplit>) -> SplitAssigner {
        SplitAssigner::new(splits)
    }

    /// Engine-wide setup before the first split.
    fn open_input_format(&mut self) -> ScanResult<()>;

    /// Engine-wide teardown. Never fails.
    fn close_input_format(&mut self);

    /// Opens one split.
    fn open(&mut self, split: &InputSplit) -> ScanResult<()>;

    /// Returns true once the current split has no more records.
    fn reached_end(&mut self) -> ScanResult<bool>;

    /// Returns the next record of the current split.
    fn next_record(&mut self) -> ScanResult<Self::Record>;

    /// Closes the current split.
    fn close(&mut self) -> ScanResult<()>;

    /// Caps the number of records.
    fn set_limit(&mut self, limit: u64) -> ScanResult<()>;

    /// Sets the projection; each entry is a path of exactly one index.
    fn set_projected_fields(&mut self, fields: &[Vec<usize>]) -> ScanResult<()>;

    /// Sets the filter pushed down to the store.
    fn set_expression(&mut self, filter: FilterExpr) -> ScanResult<()>;
}

impl<S: StoreClient> InputFormat for ScanEngine<S> {
    type Record = Row;

    fn statistics(&self, cached: Option<ScanStatistics>) -> Option<ScanStatistics> {
        cached
    }

    fn create_input_splits(&self, min_splits: usize) -> Vec<InputSplit> {
        let total = self.splits().len();
        if total < min_splits {
            debug!(total, min_splits, "Fewer splits than requested");
        }
        (0..total).map(|number| InputSplit::new(number, total)).collect()
    }

    fn open_input_format(&mut self) -> ScanResult<()> {
        self.configure_runtime()
    }

    fn close_input_format(&mut self) {
        ScanEngine::close(self);
    }

    fn open(&mut self, split: &InputSplit) -> ScanResult<()> {
        if split.total() != self.splits().len() {
            return Err(ScanError::InvalidState {
                operation: "open split",
                state: format!(
                    "planned with {} splits, handle is {}",
                    self.splits().len(),
                    split
                ),
            });
        }
        self.open_split(split.number())
    }

    fn reached_end(&mut self) -> ScanResult<bool> {
        Ok(!self.has_more()?)
    }

    fn next_record(&mut self) -> ScanResult<Row> {
        self.produce_next()
    }

    fn close(&mut self) -> ScanResult<()> {
        self.close_split();
        Ok(())
    }

    fn set_limit(&mut self, limit: u64) -> ScanResult<()> {
        ScanEngine::set_limit(self, limit)
    }

    fn set_projected_fields(&mut self, fields: &[Vec<usize>]) -> ScanResult<()> {
        ScanEngine::set_projected_fields(self, fields)
    }

    fn set_expression(&mut self, filter: FilterExpr) -> ScanResult<()> {
        self.set_filter(filter)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::thread;

    use super::*;

    #[test]
    fn test_assigner_hands_out_each_split_once() {
        let assigner = Arc::new(SplitAssigner::new((0..32).map(|n| InputSplit::new(n, 32))));

        let handles: Vec<_> = (0..4)
            .map(|worker| {
                let assigner = Arc::clone(&assigner);
                thread::spawn(move || {
                    let mut mine = Vec::new();
                    while let Some(split) = assigner.next_split(worker) {
                        mine.push(split.number());
                    }
                    mine
                })
            })
            .collect();

        let mut all: Vec<usize> = handles
            .into_iter()
            .flat_map(|h| h.join().unwrap())
            .collect();
        all.sort_unstable();
        assert_eq!(all, (0..32).collect::<Vec<_>>());
        assert_eq!(assigner.remaining(), 0);
    }

    #[test]
    fn test_returned_splits_are_reassigned() {
        let assigner = SplitAssigner::new([InputSplit::new(0, 2), InputSplit::new(1, 2)]);
        let first = assigner.next_split(0).unwrap();
        assigner.return_splits([first], 0);
        assert_eq!(assigner.next_split(1).map(|s| s.number()), Some(1));
        assert_eq!(assigner.next_split(1), Some(first));
        assert_eq!(assigner.next_split(1), None);
    }

    #[test]
    fn test_input_split_display() {
        assert_eq!(InputSplit::new(2, 5).to_string(), "split 2/5");
    }
}
