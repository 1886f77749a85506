//! # splitscan-core
//!
//! Bounded, splittable table scans over a partitioned key-value SQL store.
//!
//! A scan discovers the physical splits of one table, then streams each
//! split's rows through a cursor pinned to a single snapshot timestamp. Rows
//! are projected, optionally filtered by the store, coerced to typed output
//! values, and capped by a global row limit.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                 InputFormat (host lifecycle)                 │
//! └─────────────────────────────────────────────────────────────┘
//!                               │
//! ┌─────────────────────────────────────────────────────────────┐
//! │                        ScanEngine                            │
//! │  ScanConfig · ScanPlan · projection · filter · limit         │
//! └─────────────────────────────────────────────────────────────┘
//!          │                    │                      │
//!          ▼                    ▼                      ▼
//! ┌────────────────┐  ┌──────────────────┐  ┌──────────────────┐
//! │  SplitPlanner  │  │   SplitCursor    │  │     Coercer      │
//! │  (once)        │  │   (per split)    │  │  (per field)     │
//! └────────────────┘  └──────────────────┘  └──────────────────┘
//!          │                    │
//!          ▼                    ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                 StoreClient / StoreConnection                │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Example
//!
//! ```rust
//! use splitscan_common::types::TableRef;
//! use splitscan_core::{ScanConfig, ScanEngine};
//! use splitscan_store::{ColumnDescriptor, DataType, MemoryStore, RawValue};
//!
//! let store = MemoryStore::new().with_rows_per_region(2);
//! let table = TableRef::new("db", "t");
//! store
//!     .create_table(&table, vec![ColumnDescriptor::new("id", DataType::Int, 0)])
//!     .unwrap();
//! store
//!     .insert_rows(&table, (0..5).map(|i| vec![RawValue::Int(i)]))
//!     .unwrap();
//!
//! let config = ScanConfig::from_pairs([("database-name", "db"), ("table-name", "t")]).unwrap();
//! let mut engine = ScanEngine::new(store, config).unwrap();
//! engine.configure_runtime().unwrap();
//!
//! let mut rows = 0;
//! for split in 0..engine.splits().len() {
//!     engine.open_split(split).unwrap();
//!     while engine.has_more().unwrap() {
//!         engine.produce_next().unwrap();
//!         rows += 1;
//!     }
//!     engine.close_split();
//! }
//! engine.close();
//! assert_eq!(rows, 5);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod coercion;
pub mod config;
pub mod cursor;
pub mod engine;
pub mod input_format;
pub mod planner;
pub mod row;
pub mod snapshot;
pub mod value;

// Re-exports
pub use coercion::{coerce, Coercer, TimestampFormat};
pub use config::ScanConfig;
pub use cursor::SplitCursor;
pub use engine::{EngineState, ScanEngine};
pub use input_format::{InputFormat, InputSplit, ScanStatistics, SplitAssigner};
pub use planner::{ScanPlan, SplitPlanner};
pub use row::{Field, Row};
pub use value::Value;
