//! Snapshot timestamp type.
//!
//! A snapshot timestamp pins a read to one logical point in time. It pairs
//! a physical clock reading in milliseconds with a logical counter, and packs
//! into the single `u64` version number the store compares MVCC versions with.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

use crate::constants::{MAX_LOGICAL, MAX_PHYSICAL, PHYSICAL_SHIFT_BITS};

/// Logical read timestamp for snapshot-consistent scans.
///
/// Layout when packed (64 bits total):
/// - Physical time: high 46 bits (milliseconds since Unix epoch)
/// - Logical counter: low 18 bits
///
/// # Example
///
/// ```rust
/// use splitscan_common::types::SnapshotTimestamp;
///
/// let ts = SnapshotTimestamp::new(1000, 1);
/// assert_eq!(ts.to_version(), (1000 << 18) | 1);
/// assert_eq!(SnapshotTimestamp::from_version(ts.to_version()), ts);
/// ```
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SnapshotTimestamp {
    /// Physical time in milliseconds since Unix epoch.
    physical: u64,
    /// Logical counter for ordering within the same millisecond.
    logical: u32,
}

impl SnapshotTimestamp {
    /// Zero timestamp (epoch).
    pub const ZERO: Self = Self {
        physical: 0,
        logical: 0,
    };

    /// Creates a timestamp from components.
    ///
    /// The logical counter is truncated to the 18 bits the packed form keeps.
    #[inline]
    #[must_use]
    pub const fn new(physical: u64, logical: u32) -> Self {
        Self {
            physical,
            logical: logical & MAX_LOGICAL,
        }
    }

    /// Creates a timestamp at a wall-clock instant with a zero logical counter.
    #[inline]
    #[must_use]
    pub const fn from_millis(physical: u64) -> Self {
        Self::new(physical, 0)
    }

    /// Like [`from_millis`](Self::from_millis), but returns `None` when the
    /// instant does not fit the packed form's physical bits.
    #[inline]
    #[must_use]
    pub const fn checked_from_millis(physical: u64) -> Option<Self> {
        if physical > MAX_PHYSICAL {
            None
        } else {
            Some(Self::from_millis(physical))
        }
    }

    /// Returns the physical time component (milliseconds since epoch).
    #[inline]
    #[must_use]
    pub const fn physical(self) -> u64 {
        self.physical
    }

    /// Returns the logical counter component.
    #[inline]
    #[must_use]
    pub const fn logical(self) -> u32 {
        self.logical
    }

    /// Packs the timestamp into the store's version number.
    #[inline]
    #[must_use]
    pub const fn to_version(self) -> u64 {
        (self.physical << PHYSICAL_SHIFT_BITS) | self.logical as u64
    }

    /// Unpacks a store version number.
    #[inline]
    #[must_use]
    pub const fn from_version(version: u64) -> Self {
        Self {
            physical: version >> PHYSICAL_SHIFT_BITS,
            logical: (version & MAX_LOGICAL as u64) as u32,
        }
    }

    /// Formats the physical component as an RFC 3339 instant in UTC.
    #[must_use]
    pub fn to_rfc3339(self) -> Option<String> {
        let millis = i64::try_from(self.physical).ok()?;
        chrono::DateTime::from_timestamp_millis(millis)
            .map(|dt| dt.format("%Y-%m-%dT%H:%M:%S%.3fZ").to_string())
    }
}

impl Ord for SnapshotTimestamp {
    fn cmp(&self, other: &Self) -> Ordering {
        match self.physical.cmp(&other.physical) {
            Ordering::Equal => self.logical.cmp(&other.logical),
            ord => ord,
        }
    }
}

impl PartialOrd for SnapshotTimestamp {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Debug for SnapshotTimestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SnapshotTimestamp({}ms.{})", self.physical, self.logical)
    }
}

impl fmt::Display for SnapshotTimestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.physical, self.logical)
    }
}

impl From<SnapshotTimestamp> for u64 {
    #[inline]
    fn from(ts: SnapshotTimestamp) -> Self {
        ts.to_version()
    }
}
