//! Scan error taxonomy.
//!
//! Every fatal condition the scan engine surfaces belongs to one category:
//! configuration, planning, cursor, coercion, or lifecycle state. Teardown
//! faults never become a `ScanError`; they are logged where they happen.

use std::fmt;
use thiserror::Error;

use super::store::StoreError;
use crate::types::TableRef;

/// Error codes for categorizing errors.
///
/// These codes can be used for programmatic error handling and
/// are stable across versions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum ErrorCode {
    // Configuration errors (0x0100 - 0x01FF)
    /// A required property is missing or blank.
    MissingProperty = 0x0100,
    /// A property value is malformed.
    InvalidProperty = 0x0101,
    /// The snapshot timestamp is not an ISO-8601 date-time with offset.
    InvalidSnapshotTimestamp = 0x0102,
    /// The projection shape or ordinals are invalid.
    InvalidProjection = 0x0103,
    /// A per-field date-time pattern could not be compiled.
    InvalidTimestampPattern = 0x0104,

    // Planning errors (0x0200 - 0x02FF)
    /// The table does not exist.
    TableNotFound = 0x0200,
    /// The store reported no columns for the table.
    NoColumns = 0x0201,
    /// Split or column enumeration failed in the store.
    PlanningFailed = 0x0202,

    // Cursor errors (0x0300 - 0x03FF)
    /// Opening or advancing a split cursor failed.
    CursorFailed = 0x0300,
    /// The engine's runtime connection could not be opened.
    ConnectionFailed = 0x0301,

    // Coercion errors (0x0400 - 0x04FF)
    /// A raw value could not be converted to its target type.
    CoercionFailed = 0x0400,

    // Lifecycle errors (0x0500 - 0x05FF)
    /// The operation is not allowed in the engine's current state.
    InvalidState = 0x0500,
    /// A row was requested after the split was exhausted.
    NoMoreRows = 0x0501,
}

impl ErrorCode {
    /// Returns the numeric code.
    #[inline]
    #[must_use]
    pub const fn as_u16(self) -> u16 {
        self as u16
    }

    /// Returns the error category name.
    #[must_use]
    pub const fn category(&self) -> &'static str {
        match (*self as u16) >> 8 {
            0x01 => "Configuration",
            0x02 => "Planning",
            0x03 => "Cursor",
            0x04 => "Coercion",
            0x05 => "State",
            _ => "Unknown",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// The main error type for the scan engine.
///
/// # Example
///
/// ```rust
/// use splitscan_common::error::{ErrorCode, ScanError};
///
/// let err = ScanError::MissingProperty { key: "table-name".into() };
/// assert_eq!(err.code(), ErrorCode::MissingProperty);
/// assert_eq!(err.code().category(), "Configuration");
/// ```
#[derive(Debug, Error)]
pub enum ScanError {
    // ==========================================================================
    // Configuration Errors
    // ==========================================================================
    /// A required property is missing or blank.
    #[error("{key} can not be null")]
    MissingProperty {
        /// The property key.
        key: String,
    },

    /// A property value is malformed.
    #[error("invalid value {value:?} for {key}: {reason}")]
    InvalidProperty {
        /// The property key.
        key: String,
        /// The rejected value.
        value: String,
        /// Why it was rejected.
        reason: String,
    },

    /// The snapshot timestamp could not be parsed.
    #[error("invalid snapshot timestamp {value:?}: {reason}")]
    InvalidSnapshotTimestamp {
        /// The rejected value.
        value: String,
        /// Parser message.
        reason: String,
    },

    /// The projection is malformed.
    #[error("invalid projection: {reason}")]
    InvalidProjection {
        /// What was wrong with it.
        reason: String,
    },

    /// A per-field date-time pattern could not be compiled.
    #[error("invalid timestamp pattern {pattern:?} for field {field}: {reason}")]
    InvalidTimestampPattern {
        /// Field the pattern was configured for.
        field: String,
        /// The rejected pattern.
        pattern: String,
        /// Why it was rejected.
        reason: String,
    },

    // ==========================================================================
    // Planning Errors
    // ==========================================================================
    /// The table does not exist.
    #[error("table {table} not found")]
    TableNotFound {
        /// The missing table.
        table: TableRef,
    },

    /// The store reported no columns.
    #[error("table {table} has no columns")]
    NoColumns {
        /// The table.
        table: TableRef,
    },

    /// A store fault while planning splits.
    #[error("failed to plan splits for {table}: {source}")]
    Planning {
        /// The table being planned.
        table: TableRef,
        /// The underlying store fault.
        #[source]
        source: StoreError,
    },

    // ==========================================================================
    // Cursor Errors
    // ==========================================================================
    /// A store fault while opening or advancing a split cursor.
    #[error("cursor on split {split} failed: {source}")]
    Cursor {
        /// Index of the split.
        split: usize,
        /// The underlying store fault.
        #[source]
        source: StoreError,
    },

    /// The runtime connection could not be opened.
    #[error("failed to connect to store: {source}")]
    Connection {
        /// The underlying store fault.
        #[source]
        source: StoreError,
    },

    // ==========================================================================
    // Coercion Errors
    // ==========================================================================
    /// A raw value could not be converted to its declared type.
    #[error("type coercion error on field {field}: cannot convert {from} to {to}: {reason}")]
    Coercion {
        /// Output field name.
        field: String,
        /// Store-side value kind.
        from: String,
        /// Target type.
        to: String,
        /// Details.
        reason: String,
    },

    // ==========================================================================
    // Lifecycle Errors
    // ==========================================================================
    /// The operation is not valid in the current engine state.
    #[error("cannot {operation} while engine is {state}")]
    InvalidState {
        /// The rejected operation.
        operation: &'static str,
        /// The engine state.
        state: String,
    },

    /// No row is available.
    #[error("no more rows available on split {split}")]
    NoMoreRows {
        /// Index of the split.
        split: usize,
    },
}

impl ScanError {
    /// Returns the stable error code for this error.
    #[must_use]
    pub fn code(&self) -> ErrorCode {
        match self {
            ScanError::MissingProperty { .. } => ErrorCode::MissingProperty,
            ScanError::InvalidProperty { .. } => ErrorCode::InvalidProperty,
            ScanError::InvalidSnapshotTimestamp { .. } => ErrorCode::InvalidSnapshotTimestamp,
            ScanError::InvalidProjection { .. } => ErrorCode::InvalidProjection,
            ScanError::InvalidTimestampPattern { .. } => ErrorCode::InvalidTimestampPattern,
            ScanError::TableNotFound { .. } => ErrorCode::TableNotFound,
            ScanError::NoColumns { .. } => ErrorCode::NoColumns,
            ScanError::Planning { .. } => ErrorCode::PlanningFailed,
            ScanError::Cursor { .. } => ErrorCode::CursorFailed,
            ScanError::Connection { .. } => ErrorCode::ConnectionFailed,
            ScanError::Coercion { .. } => ErrorCode::CoercionFailed,
            ScanError::InvalidState { .. } => ErrorCode::InvalidState,
            ScanError::NoMoreRows { .. } => ErrorCode::NoMoreRows,
        }
    }

    /// Creates a coercion error.
    pub fn coercion(
        field: impl Into<String>,
        from: impl Into<String>,
        to: impl fmt::Display,
        reason: impl Into<String>,
    ) -> Self {
        ScanError::Coercion {
            field: field.into(),
            from: from.into(),
            to: to.to_string(),
            reason: reason.into(),
        }
    }

    /// Creates an invalid projection error.
    pub fn projection(reason: impl Into<String>) -> Self {
        ScanError::InvalidProjection {
            reason: reason.into(),
        }
    }

    /// Returns true if this is a configuration error.
    #[must_use]
    pub fn is_configuration(&self) -> bool {
        self.code().category() == "Configuration"
    }

    /// Returns true if this error aborted engine construction during planning.
    #[must_use]
    pub fn is_planning(&self) -> bool {
        self.code().category() == "Planning"
    }
}
