//! Store data model.
//!
//! Column and split descriptors produced by the store, the SQL types it
//! declares for columns, and the raw values its cursors yield.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use splitscan_common::types::{Key, RegionId, TableRef};

/// SQL data types declared by store columns and requested by scan outputs.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DataType {
    /// Boolean type.
    Boolean,
    /// 8-bit signed integer.
    TinyInt,
    /// 16-bit signed integer.
    SmallInt,
    /// 32-bit signed integer.
    Int,
    /// 64-bit signed integer.
    BigInt,
    /// 32-bit floating point.
    Float,
    /// 64-bit floating point.
    Double,
    /// Fixed-point decimal.
    Decimal {
        /// Total number of digits.
        precision: Option<u8>,
        /// Digits after decimal point.
        scale: Option<u8>,
    },
    /// Fixed-length string.
    Char(Option<u32>),
    /// Variable-length string.
    Varchar(Option<u32>),
    /// Unlimited text.
    Text,
    /// JSON document, carried as text.
    Json,
    /// Binary data.
    Blob,
    /// Date (year, month, day).
    Date,
    /// Time of day.
    Time,
    /// Timestamp without time zone.
    Timestamp,
}

impl DataType {
    /// Returns true if this type is an integer type.
    pub fn is_integer(&self) -> bool {
        matches!(
            self,
            DataType::TinyInt | DataType::SmallInt | DataType::Int | DataType::BigInt
        )
    }

    /// Returns true if this type is numeric.
    pub fn is_numeric(&self) -> bool {
        self.is_integer()
            || matches!(
                self,
                DataType::Float | DataType::Double | DataType::Decimal { .. }
            )
    }

    /// Returns true if this type is a string type.
    pub fn is_string(&self) -> bool {
        matches!(
            self,
            DataType::Char(_) | DataType::Varchar(_) | DataType::Text | DataType::Json
        )
    }

    /// Returns true if this type is a temporal type.
    pub fn is_temporal(&self) -> bool {
        matches!(self, DataType::Date | DataType::Time | DataType::Timestamp)
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataType::Boolean => write!(f, "BOOLEAN"),
            DataType::TinyInt => write!(f, "TINYINT"),
            DataType::SmallInt => write!(f, "SMALLINT"),
            DataType::Int => write!(f, "INT"),
            DataType::BigInt => write!(f, "BIGINT"),
            DataType::Float => write!(f, "FLOAT"),
            DataType::Double => write!(f, "DOUBLE"),
            DataType::Decimal { precision, scale } => match (precision, scale) {
                (Some(p), Some(s)) => write!(f, "DECIMAL({}, {})", p, s),
                (Some(p), None) => write!(f, "DECIMAL({})", p),
                _ => write!(f, "DECIMAL"),
            },
            DataType::Char(len) => match len {
                Some(l) => write!(f, "CHAR({})", l),
                None => write!(f, "CHAR"),
            },
            DataType::Varchar(len) => match len {
                Some(l) => write!(f, "VARCHAR({})", l),
                None => write!(f, "VARCHAR"),
            },
            DataType::Text => write!(f, "TEXT"),
            DataType::Json => write!(f, "JSON"),
            DataType::Blob => write!(f, "BLOB"),
            DataType::Date => write!(f, "DATE"),
            DataType::Time => write!(f, "TIME"),
            DataType::Timestamp => write!(f, "TIMESTAMP"),
        }
    }
}

impl FromStr for DataType {
    type Err = String;

    /// Parses SQL type names such as `INT`, `VARCHAR(20)` or `DECIMAL(10, 2)`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let (name, args) = match s.find('(') {
            Some(open) => {
                let close = s
                    .rfind(')')
                    .filter(|&close| close > open)
                    .ok_or_else(|| format!("unbalanced parentheses in type {s:?}"))?;
                (&s[..open], Some(&s[open + 1..close]))
            }
            None => (s, None),
        };
        let args: Vec<&str> = args
            .map(|a| a.split(',').map(str::trim).collect())
            .unwrap_or_default();
        let number = |i: usize| -> Result<Option<u32>, String> {
            args.get(i)
                .map(|a| a.parse::<u32>().map_err(|e| format!("bad type argument {a:?}: {e}")))
                .transpose()
        };
        let small = |i: usize| -> Result<Option<u8>, String> {
            number(i)?
                .map(|n| u8::try_from(n).map_err(|_| format!("type argument {n} too large")))
                .transpose()
        };

        match name.trim().to_ascii_uppercase().as_str() {
            "BOOLEAN" | "BOOL" => Ok(DataType::Boolean),
            "TINYINT" => Ok(DataType::TinyInt),
            "SMALLINT" => Ok(DataType::SmallInt),
            "INT" | "INTEGER" => Ok(DataType::Int),
            "BIGINT" => Ok(DataType::BigInt),
            "FLOAT" | "REAL" => Ok(DataType::Float),
            "DOUBLE" => Ok(DataType::Double),
            "DECIMAL" | "NUMERIC" => Ok(DataType::Decimal {
                precision: small(0)?,
                scale: small(1)?,
            }),
            "CHAR" => Ok(DataType::Char(number(0)?)),
            "VARCHAR" => Ok(DataType::Varchar(number(0)?)),
            "TEXT" | "STRING" => Ok(DataType::Text),
            "JSON" => Ok(DataType::Json),
            "BLOB" | "BINARY" | "VARBINARY" | "BYTES" => Ok(DataType::Blob),
            "DATE" => Ok(DataType::Date),
            "TIME" => Ok(DataType::Time),
            "TIMESTAMP" | "DATETIME" => Ok(DataType::Timestamp),
            other => Err(format!("unsupported data type {other:?}")),
        }
    }
}

/// One column of a table as reported by the store.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ColumnDescriptor {
    /// Column name.
    pub name: String,
    /// Declared type.
    pub data_type: DataType,
    /// Position in the table's physical layout.
    pub ordinal: usize,
    /// Whether the column admits NULL.
    pub nullable: bool,
}

impl ColumnDescriptor {
    /// Creates a nullable column descriptor.
    pub fn new(name: impl Into<String>, data_type: DataType, ordinal: usize) -> Self {
        Self {
            name: name.into(),
            data_type,
            ordinal,
            nullable: true,
        }
    }

    /// Marks the column as NOT NULL.
    pub fn not_null(mut self) -> Self {
        self.nullable = false;
        self
    }
}

/// One contiguous physical partition (region) of a table.
///
/// The key range is half-open, `[start_key, end_key)`; an empty end key is
/// unbounded.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SplitDescriptor {
    /// Table the region belongs to.
    pub table: TableRef,
    /// Region identifier.
    pub region_id: RegionId,
    /// Inclusive start key.
    pub start_key: Key,
    /// Exclusive end key.
    pub end_key: Key,
}

impl SplitDescriptor {
    /// Creates a split descriptor.
    pub fn new(table: TableRef, region_id: RegionId, start_key: Key, end_key: Key) -> Self {
        Self {
            table,
            region_id,
            start_key,
            end_key,
        }
    }

    /// Returns true if the key falls inside this split's range.
    pub fn contains(&self, key: &Key) -> bool {
        *key >= self.start_key && (self.end_key.is_empty() || *key < self.end_key)
    }
}

/// A column value as returned by a store cursor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum RawValue {
    /// NULL.
    Null,
    /// Signed integer (also booleans, stored as 0/1).
    Int(i64),
    /// Unsigned integer.
    UInt(u64),
    /// Floating point.
    Double(f64),
    /// Decimal stored as a scaled integer.
    Decimal {
        /// Unscaled value.
        value: i128,
        /// Digits after the decimal point.
        scale: u8,
    },
    /// Character data.
    String(String),
    /// Binary data.
    Bytes(Vec<u8>),
    /// Days since 1970-01-01.
    Date(i32),
    /// Microseconds since midnight.
    Time(i64),
    /// Microseconds since 1970-01-01T00:00:00, without zone.
    Timestamp(i64),
}

impl RawValue {
    /// Returns true if this value is NULL.
    pub fn is_null(&self) -> bool {
        matches!(self, RawValue::Null)
    }

    /// Returns the name of this value's kind, used in error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            RawValue::Null => "Null",
            RawValue::Int(_) => "Int",
            RawValue::UInt(_) => "UInt",
            RawValue::Double(_) => "Double",
            RawValue::Decimal { .. } => "Decimal",
            RawValue::String(_) => "String",
            RawValue::Bytes(_) => "Bytes",
            RawValue::Date(_) => "Date",
            RawValue::Time(_) => "Time",
            RawValue::Timestamp(_) => "Timestamp",
        }
    }

    /// Converts numeric values to f64.
    fn to_f64(&self) -> Option<f64> {
        match self {
            RawValue::Int(i) => Some(*i as f64),
            RawValue::UInt(u) => Some(*u as f64),
            RawValue::Double(d) => Some(*d),
            RawValue::Decimal { value, scale } => {
                Some(*value as f64 / 10f64.powi(i32::from(*scale)))
            }
            _ => None,
        }
    }

    /// Compares two values of compatible kinds.
    ///
    /// Returns `None` when either side is NULL or the kinds are not
    /// comparable.
    pub fn compare(&self, other: &RawValue) -> Option<Ordering> {
        match (self, other) {
            (RawValue::Null, _) | (_, RawValue::Null) => None,
            (RawValue::Int(a), RawValue::Int(b)) => Some(a.cmp(b)),
            (RawValue::UInt(a), RawValue::UInt(b)) => Some(a.cmp(b)),
            (RawValue::Int(a), RawValue::UInt(b)) => Some(i128::from(*a).cmp(&i128::from(*b))),
            (RawValue::UInt(a), RawValue::Int(b)) => Some(i128::from(*a).cmp(&i128::from(*b))),
            (RawValue::String(a), RawValue::String(b)) => Some(a.cmp(b)),
            (RawValue::Bytes(a), RawValue::Bytes(b)) => Some(a.cmp(b)),
            (RawValue::Date(a), RawValue::Date(b)) => Some(a.cmp(b)),
            (RawValue::Time(a), RawValue::Time(b)) => Some(a.cmp(b)),
            (RawValue::Timestamp(a), RawValue::Timestamp(b)) => Some(a.cmp(b)),
            (a, b) => match (a.to_f64(), b.to_f64()) {
                (Some(x), Some(y)) => x.partial_cmp(&y),
                _ => None,
            },
        }
    }
}

impl fmt::Display for RawValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RawValue::Null => write!(f, "NULL"),
            RawValue::Int(i) => write!(f, "{}", i),
            RawValue::UInt(u) => write!(f, "{}", u),
            RawValue::Double(d) => write!(f, "{}", d),
            RawValue::Decimal { value, scale } => write!(f, "{}e-{}", value, scale),
            RawValue::String(s) => write!(f, "{:?}", s),
            RawValue::Bytes(b) => write!(f, "<{} bytes>", b.len()),
            RawValue::Date(d) => write!(f, "date:{}", d),
            RawValue::Time(t) => write!(f, "time:{}", t),
            RawValue::Timestamp(t) => write!(f, "ts:{}", t),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_data_type_parse() {
        assert_eq!("int".parse::<DataType>(), Ok(DataType::Int));
        assert_eq!("VARCHAR(20)".parse::<DataType>(), Ok(DataType::Varchar(Some(20))));
        assert_eq!(
            "decimal(10, 2)".parse::<DataType>(),
            Ok(DataType::Decimal {
                precision: Some(10),
                scale: Some(2)
            })
        );
        assert_eq!("datetime".parse::<DataType>(), Ok(DataType::Timestamp));
        assert!("GEOMETRY".parse::<DataType>().is_err());
        assert!("VARCHAR(20".parse::<DataType>().is_err());
    }

    #[test]
    fn test_data_type_display() {
        assert_eq!(DataType::Varchar(Some(8)).to_string(), "VARCHAR(8)");
        assert_eq!(
            DataType::Decimal {
                precision: Some(5),
                scale: Some(1)
            }
            .to_string(),
            "DECIMAL(5, 1)"
        );
        assert!(DataType::Timestamp.is_temporal());
        assert!(DataType::Json.is_string());
        assert!(DataType::SmallInt.is_integer());
    }

    #[test]
    fn test_split_contains() {
        let split = SplitDescriptor::new(
            TableRef::new("db", "t"),
            RegionId::new(1),
            Key::record(1, 10),
            Key::record(1, 20),
        );
        assert!(split.contains(&Key::record(1, 10)));
        assert!(split.contains(&Key::record(1, 19)));
        assert!(!split.contains(&Key::record(1, 20)));
        assert!(!split.contains(&Key::record(1, 9)));

        let open_ended = SplitDescriptor::new(
            TableRef::new("db", "t"),
            RegionId::new(2),
            Key::record(1, 20),
            Key::empty(),
        );
        assert!(open_ended.contains(&Key::record(1, i64::MAX)));
    }

    #[test]
    fn test_raw_value_compare() {
        assert_eq!(RawValue::Int(1).compare(&RawValue::Int(2)), Some(Ordering::Less));
        assert_eq!(
            RawValue::Int(-1).compare(&RawValue::UInt(u64::MAX)),
            Some(Ordering::Less)
        );
        assert_eq!(
            RawValue::Double(2.5).compare(&RawValue::Int(2)),
            Some(Ordering::Greater)
        );
        assert_eq!(
            RawValue::Decimal { value: 150, scale: 2 }.compare(&RawValue::Double(1.5)),
            Some(Ordering::Equal)
        );
        assert_eq!(RawValue::Null.compare(&RawValue::Int(1)), None);
        assert_eq!(RawValue::String("a".into()).compare(&RawValue::Int(1)), None);
    }
}
