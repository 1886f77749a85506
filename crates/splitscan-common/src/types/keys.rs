//! Byte keys for store key ranges.
//!
//! Record keys follow the `t{table_id}_r{handle}` layout: table id and row
//! handle are big-endian, and the handle has its sign bit flipped so that
//! byte order matches numeric order.

use bytes::{BufMut, Bytes, BytesMut};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::ops::Deref;

const TABLE_PREFIX: u8 = b't';
const RECORD_SEPARATOR: &[u8; 2] = b"_r";
const SIGN_FLIP_MASK: u64 = 1u64 << 63;

/// Length of an encoded record key.
pub const RECORD_KEY_LEN: usize = 1 + 8 + 2 + 8;

/// A store key.
///
/// Keys are variable-length byte sequences compared lexicographically. An
/// empty key stands for an unbounded range edge.
///
/// # Example
///
/// ```rust
/// use splitscan_common::types::Key;
///
/// let a = Key::record(1, -5);
/// let b = Key::record(1, 3);
/// assert!(a < b);
/// assert_eq!(b.record_handle(), Some(3));
/// ```
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Key(Bytes);

impl Key {
    /// Creates an empty key.
    #[inline]
    #[must_use]
    pub const fn empty() -> Self {
        Self(Bytes::new())
    }

    /// Creates a key from a byte slice.
    #[inline]
    #[must_use]
    pub fn from_bytes(bytes: &[u8]) -> Self {
        Self(Bytes::copy_from_slice(bytes))
    }

    /// Encodes the prefix shared by every record of a table.
    #[must_use]
    pub fn table_prefix(table_id: u64) -> Self {
        let mut buf = BytesMut::with_capacity(1 + 8 + 2);
        buf.put_u8(TABLE_PREFIX);
        buf.put_u64(table_id);
        buf.put_slice(RECORD_SEPARATOR);
        Self(buf.freeze())
    }

    /// Encodes the key of one row of a table.
    #[must_use]
    pub fn record(table_id: u64, handle: i64) -> Self {
        let mut buf = BytesMut::with_capacity(RECORD_KEY_LEN);
        buf.put_u8(TABLE_PREFIX);
        buf.put_u64(table_id);
        buf.put_slice(RECORD_SEPARATOR);
        buf.put_u64((handle as u64) ^ SIGN_FLIP_MASK);
        Self(buf.freeze())
    }

    /// Decodes the row handle of a record key.
    #[must_use]
    pub fn record_handle(&self) -> Option<i64> {
        if self.0.len() != RECORD_KEY_LEN || self.0[0] != TABLE_PREFIX {
            return None;
        }
        let mut raw = [0u8; 8];
        raw.copy_from_slice(&self.0[11..19]);
        Some((u64::from_be_bytes(raw) ^ SIGN_FLIP_MASK) as i64)
    }

    /// Returns the length of the key in bytes.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns true if the key is empty.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Returns the key as a byte slice.
    #[inline]
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Returns a successor key (for range scans).
    ///
    /// The successor is the smallest key that is greater than every key
    /// starting with this one.
    #[must_use]
    pub fn successor(&self) -> Self {
        let mut bytes = self.0.to_vec();

        for i in (0..bytes.len()).rev() {
            if bytes[i] < 0xFF {
                bytes[i] += 1;
                bytes.truncate(i + 1);
                return Self(Bytes::from(bytes));
            }
        }

        // All bytes are 0xFF: no finite successor, use the unbounded edge.
        Self::empty()
    }
}

impl Deref for Key {
    type Target = [u8];

    #[inline]
    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl AsRef<[u8]> for Key {
    #[inline]
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl Ord for Key {
    #[inline]
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.cmp(&other.0)
    }
}

impl PartialOrd for Key {
    #[inline]
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Debug for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Key(0x")?;
        for byte in &self.0[..self.0.len().min(32)] {
            write!(f, "{byte:02x}")?;
        }
        if self.0.len() > 32 {
            write!(f, "...")?;
        }
        write!(f, ")")
    }
}

impl From<Vec<u8>> for Key {
    #[inline]
    fn from(vec: Vec<u8>) -> Self {
        Self(Bytes::from(vec))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_key_order() {
        let handles = [i64::MIN, -10, -1, 0, 1, 42, i64::MAX];
        let keys: Vec<Key> = handles.iter().map(|&h| Key::record(9, h)).collect();
        for pair in keys.windows(2) {
            assert!(pair[0] < pair[1]);
        }
    }

    #[test]
    fn test_record_handle_roundtrip() {
        let key = Key::record(3, -77);
        assert_eq!(key.len(), RECORD_KEY_LEN);
        assert_eq!(key.record_handle(), Some(-77));
        assert_eq!(Key::from_bytes(b"short").record_handle(), None);
    }

    #[test]
    fn test_table_prefix_bounds_records() {
        let prefix = Key::table_prefix(5);
        let end = prefix.successor();
        let key = Key::record(5, i64::MAX);
        assert!(key.starts_with(prefix.as_bytes()));
        assert!(key < end);
        assert!(Key::record(6, i64::MIN) >= end);
    }

    #[test]
    fn test_successor() {
        assert_eq!(Key::from_bytes(&[1, 2]).successor(), Key::from_bytes(&[1, 3]));
        assert_eq!(Key::from_bytes(&[1, 0xFF]).successor(), Key::from_bytes(&[2]));
        assert!(Key::from_bytes(&[0xFF, 0xFF]).successor().is_empty());
    }
}
