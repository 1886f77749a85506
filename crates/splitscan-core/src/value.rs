//! Output values produced by the scan engine.
//!
//! A `Value` is the coerced, typed form of one field of an output row.

use std::fmt;

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde::ser::{Serialize, Serializer};
use splitscan_store::DataType;

/// A typed field value of an output row.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// NULL value.
    Null,
    /// Boolean value.
    Boolean(bool),
    /// 8-bit signed integer.
    TinyInt(i8),
    /// 16-bit signed integer.
    SmallInt(i16),
    /// 32-bit signed integer.
    Int(i32),
    /// 64-bit signed integer.
    BigInt(i64),
    /// 32-bit floating point.
    Float(f32),
    /// 64-bit floating point.
    Double(f64),
    /// Decimal value (stored as scaled integer).
    Decimal { value: i128, scale: u8 },
    /// String value.
    String(String),
    /// Binary data.
    Bytes(Vec<u8>),
    /// Calendar date.
    Date(NaiveDate),
    /// Time of day.
    Time(NaiveTime),
    /// Date and time without zone.
    Timestamp(NaiveDateTime),
}

impl Value {
    /// Creates a string value.
    pub fn string(v: impl Into<String>) -> Self {
        Value::String(v.into())
    }

    /// Returns true if this value is NULL.
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Returns true if this value is NULL or a representation of `data_type`.
    pub fn matches_type(&self, data_type: &DataType) -> bool {
        match (self, data_type) {
            (Value::Null, _) => true,
            (Value::Boolean(_), DataType::Boolean)
            | (Value::TinyInt(_), DataType::TinyInt)
            | (Value::SmallInt(_), DataType::SmallInt)
            | (Value::Int(_), DataType::Int)
            | (Value::BigInt(_), DataType::BigInt)
            | (Value::Float(_), DataType::Float)
            | (Value::Double(_), DataType::Double)
            | (Value::Bytes(_), DataType::Blob)
            | (Value::Date(_), DataType::Date)
            | (Value::Time(_), DataType::Time)
            | (Value::Timestamp(_), DataType::Timestamp) => true,
            (Value::Decimal { scale, .. }, DataType::Decimal { scale: target, .. }) => {
                target.map_or(true, |target| target == *scale)
            }
            (Value::String(_), t) => t.is_string(),
            _ => false,
        }
    }

    /// Returns the value as an i64 if it is an integer.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::TinyInt(i) => Some(i64::from(*i)),
            Value::SmallInt(i) => Some(i64::from(*i)),
            Value::Int(i) => Some(i64::from(*i)),
            Value::BigInt(i) => Some(*i),
            _ => None,
        }
    }

    /// Returns the value as a string slice if it is a string.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }
}

/// Writes a scaled integer as a decimal literal.
fn write_decimal(f: &mut impl fmt::Write, value: i128, scale: u8) -> fmt::Result {
    if scale == 0 {
        return write!(f, "{}", value);
    }
    let divisor = 10i128.pow(u32::from(scale));
    let int_part = value / divisor;
    let frac_part = (value % divisor).abs();
    let sign = if value < 0 && int_part == 0 { "-" } else { "" };
    write!(
        f,
        "{}{}.{:0>width$}",
        sign,
        int_part,
        frac_part,
        width = scale as usize
    )
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "NULL"),
            Value::Boolean(b) => write!(f, "{}", b),
            Value::TinyInt(i) => write!(f, "{}", i),
            Value::SmallInt(i) => write!(f, "{}", i),
            Value::Int(i) => write!(f, "{}", i),
            Value::BigInt(i) => write!(f, "{}", i),
            Value::Float(v) => write!(f, "{}", v),
            Value::Double(v) => write!(f, "{}", v),
            Value::Decimal { value, scale } => write_decimal(f, *value, *scale),
            Value::String(s) => write!(f, "{}", s),
            Value::Bytes(b) => {
                write!(f, "0x")?;
                b.iter().try_for_each(|byte| write!(f, "{:02x}", byte))
            }
            Value::Date(d) => write!(f, "{}", d),
            Value::Time(t) => write!(f, "{}", t),
            Value::Timestamp(ts) => write!(f, "{}", ts.format("%Y-%m-%dT%H:%M:%S%.f")),
        }
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Value::Null => serializer.serialize_none(),
            Value::Boolean(b) => serializer.serialize_bool(*b),
            Value::TinyInt(i) => serializer.serialize_i8(*i),
            Value::SmallInt(i) => serializer.serialize_i16(*i),
            Value::Int(i) => serializer.serialize_i32(*i),
            Value::BigInt(i) => serializer.serialize_i64(*i),
            Value::Float(v) => serializer.serialize_f32(*v),
            Value::Double(v) => serializer.serialize_f64(*v),
            Value::String(s) => serializer.serialize_str(s),
            Value::Bytes(b) => serializer.serialize_bytes(b),
            other => serializer.collect_str(other),
        }
    }
}
