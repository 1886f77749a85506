//! # splitscan-store
//!
//! The store client interface consumed by the scan engine, and an
//! in-process implementation of it.
//!
//! The engine only needs a narrow slice of a distributed key-value SQL
//! store: connect, check that a table exists, list its columns, plan its
//! splits, and open a filtered, projected, snapshot-pinned cursor over one
//! split. Those operations are the [`StoreClient`], [`StoreConnection`] and
//! [`RecordCursor`] traits.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      Scan Engine                             │
//! └─────────────────────────────────────────────────────────────┘
//!                               │
//!                               ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │  StoreClient ──connect──▶ StoreConnection ──open──▶ Cursor  │
//! └─────────────────────────────────────────────────────────────┘
//!                               │
//!               ┌───────────────┴───────────────┐
//!               ▼                               ▼
//!     ┌──────────────────┐            ┌──────────────────┐
//!     │   MemoryStore    │            │  remote clients  │
//!     │ (tests, CLI)     │            │                  │
//!     └──────────────────┘            └──────────────────┘
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

/// Store client traits.
pub mod client;

/// Pushed-down filter expressions.
pub mod filter;

/// In-memory multi-version store.
pub mod memory;

/// Store data model.
pub mod types;

// Re-exports
pub use client::{RecordCursor, ScanRequest, StoreClient, StoreConnection};
pub use filter::{CompareOp, FilterExpr};
pub use memory::{Fault, MemoryConnection, MemoryCursor, MemoryStore, StoreStats};
pub use types::{ColumnDescriptor, DataType, RawValue, SplitDescriptor};
