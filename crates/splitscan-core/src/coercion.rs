//! Type coercion from store values to output values.
//!
//! Every projected field is converted from the store's [`RawValue`] to the
//! [`Value`] of its target [`DataType`]. NULL always maps to NULL. Fields
//! with a `timestamp-format.<field>` pattern parse and format date-time
//! strings with that pattern instead of the ISO defaults.
//!
//! ## Patterns
//!
//! Patterns use the familiar letter syntax and are compiled once into a
//! chrono format string:
//!
//! ```text
//! yyyy  year          MM  month        dd  day of month
//! HH    hour (0-23)   hh  hour (1-12)  a   AM/PM
//! mm    minute        ss  second       SSS fraction
//! EEE   weekday       D   day of year  XXX offset
//! 'at'  quoted text   ''  single quote
//! ```

use std::fmt::Write;

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc};
use splitscan_common::error::{ScanError, ScanResult};
use splitscan_store::{DataType, RawValue};
use tracing::warn;

use crate::config::ScanConfig;
use crate::row::Field;
use crate::value::Value;

/// Day number of 1970-01-01 counted from 0001-01-01 (day 1).
const UNIX_EPOCH_DAY_FROM_CE: i32 = 719_163;

const MICROS_PER_SECOND: i64 = 1_000_000;
const MICROS_PER_DAY: i64 = 86_400 * MICROS_PER_SECOND;

const DEFAULT_DATE_FORMAT: &str = "%Y-%m-%d";
const DEFAULT_TIME_FORMAT: &str = "%H:%M:%S%.f";
const DEFAULT_TIMESTAMP_FORMATS: [&str; 2] = ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"];

/// A compiled per-field date-time pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimestampFormat {
    pattern: String,
    strftime: String,
    has_date: bool,
    has_time: bool,
    has_offset: bool,
}

#[derive(Clone, Copy)]
enum Component {
    Date,
    Time,
    Offset,
}

impl TimestampFormat {
    /// Compiles a pattern configured for `field`.
    pub fn compile(field: &str, pattern: &str) -> ScanResult<Self> {
        Self::translate(pattern).map_err(|reason| ScanError::InvalidTimestampPattern {
            field: field.to_string(),
            pattern: pattern.to_string(),
            reason,
        })
    }

    fn translate(pattern: &str) -> Result<Self, String> {
        let mut format = Self {
            pattern: pattern.to_string(),
            strftime: String::with_capacity(pattern.len() * 2),
            has_date: false,
            has_time: false,
            has_offset: false,
        };

        let chars: Vec<char> = pattern.chars().collect();
        let mut i = 0;
        while i < chars.len() {
            let c = chars[i];
            if c == '\'' {
                i = format.quoted(&chars, i)?;
                continue;
            }
            if !c.is_ascii_alphabetic() {
                format.literal(c);
                i += 1;
                continue;
            }

            let run = chars[i..].iter().take_while(|&&x| x == c).count();
            if c == 'S' && run < 3 {
                format.short_fraction(run)?;
                i += run;
                continue;
            }
            let (item, component) = letter(c, run)?;
            format.strftime.push_str(item);
            match component {
                Component::Date => format.has_date = true,
                Component::Time => format.has_time = true,
                Component::Offset => format.has_offset = true,
            }
            i += run;
        }

        if !(format.has_date || format.has_time) {
            return Err("pattern has no date or time fields".into());
        }
        Ok(format)
    }

    /// Consumes a quoted literal starting at `start`; returns the next index.
    fn quoted(&mut self, chars: &[char], start: usize) -> Result<usize, String> {
        if chars.get(start + 1) == Some(&'\'') {
            self.literal('\'');
            return Ok(start + 2);
        }
        let mut i = start + 1;
        loop {
            match chars.get(i) {
                None => return Err("unterminated quoted literal".into()),
                Some('\'') if chars.get(i + 1) == Some(&'\'') => {
                    self.literal('\'');
                    i += 2;
                }
                Some('\'') => return Ok(i + 1),
                Some(&c) => {
                    self.literal(c);
                    i += 1;
                }
            }
        }
    }

    /// `S` and `SS` after a literal dot. chrono has no one or two digit
    /// fraction, so the dot and digits become a variable-width `%.f`.
    fn short_fraction(&mut self, run: usize) -> Result<(), String> {
        if self.strftime.pop() != Some('.') {
            return Err(format!(
                "pattern letter 'S' repeated {} time(s) must follow a '.'",
                run
            ));
        }
        self.strftime.push_str("%.f");
        self.has_time = true;
        Ok(())
    }

    fn literal(&mut self, c: char) {
        if c == '%' {
            self.strftime.push_str("%%");
        } else {
            self.strftime.push(c);
        }
    }

    /// Returns the pattern as configured.
    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    /// Returns the equivalent chrono format string.
    pub fn strftime(&self) -> &str {
        &self.strftime
    }

    /// Parses a date-time. Date-only patterns yield midnight; offsets are
    /// normalized to UTC.
    pub fn parse_timestamp(&self, input: &str) -> Result<NaiveDateTime, String> {
        let input = input.trim();
        if self.has_offset {
            return DateTime::parse_from_str(input, &self.strftime)
                .map(|dt| dt.naive_utc())
                .map_err(|e| self.parse_error(input, e));
        }
        if !self.has_date {
            return Err(format!("pattern {:?} has no date fields", self.pattern));
        }
        if self.has_time {
            NaiveDateTime::parse_from_str(input, &self.strftime)
                .map_err(|e| self.parse_error(input, e))
        } else {
            let date = NaiveDate::parse_from_str(input, &self.strftime)
                .map_err(|e| self.parse_error(input, e))?;
            midnight(date)
        }
    }

    /// Parses a date.
    pub fn parse_date(&self, input: &str) -> Result<NaiveDate, String> {
        if self.has_time || self.has_offset {
            return self.parse_timestamp(input).map(|ts| ts.date());
        }
        NaiveDate::parse_from_str(input.trim(), &self.strftime)
            .map_err(|e| self.parse_error(input, e))
    }

    /// Parses a time of day.
    pub fn parse_time(&self, input: &str) -> Result<NaiveTime, String> {
        if self.has_date || self.has_offset {
            return self.parse_timestamp(input).map(|ts| ts.time());
        }
        NaiveTime::parse_from_str(input.trim(), &self.strftime)
            .map_err(|e| self.parse_error(input, e))
    }

    /// Formats a date-time with this pattern. Offsets are rendered as UTC.
    pub fn format(&self, ts: &NaiveDateTime) -> Result<String, String> {
        let mut out = String::new();
        let written = if self.has_offset {
            write!(out, "{}", Utc.from_utc_datetime(ts).format(&self.strftime))
        } else {
            write!(out, "{}", ts.format(&self.strftime))
        };
        written.map_err(|_| format!("cannot format {} with pattern {:?}", ts, self.pattern))?;
        Ok(out)
    }

    fn parse_error(&self, input: &str, err: chrono::ParseError) -> String {
        format!("{:?} does not match pattern {:?}: {}", input, self.pattern, err)
    }
}

fn letter(c: char, run: usize) -> Result<(&'static str, Component), String> {
    use Component::*;

    let item = match (c, run) {
        ('y' | 'u', 2) => ("%y", Date),
        ('y' | 'u', _) => ("%Y", Date),
        ('M' | 'L', 1) => ("%-m", Date),
        ('M' | 'L', 2) => ("%m", Date),
        ('M' | 'L', 3) => ("%b", Date),
        ('M' | 'L', _) => ("%B", Date),
        ('d', 1) => ("%-d", Date),
        ('d', 2) => ("%d", Date),
        ('D', 1..=3) => ("%j", Date),
        ('E', 1..=3) => ("%a", Date),
        ('E', _) => ("%A", Date),
        ('H', 1) => ("%-H", Time),
        ('H', 2) => ("%H", Time),
        ('h', 1) => ("%-I", Time),
        ('h', 2) => ("%I", Time),
        ('m', 1) => ("%-M", Time),
        ('m', 2) => ("%M", Time),
        ('s', 1) => ("%-S", Time),
        ('s', 2) => ("%S", Time),
        ('S', 3) => ("%3f", Time),
        ('S', 4..=6) => ("%6f", Time),
        ('S', 7..=9) => ("%9f", Time),
        ('a', 1) => ("%p", Time),
        ('X' | 'x', 1 | 2) | ('Z', 1..=3) => ("%z", Offset),
        ('X' | 'x', 3) | ('Z', 5) => ("%:z", Offset),
        _ => {
            return Err(format!(
                "unsupported pattern letter '{}' repeated {} time(s)",
                c, run
            ))
        }
    };
    Ok(item)
}

/// Compiled formats and target fields for every store column.
#[derive(Debug, Clone)]
pub struct Coercer {
    fields: Vec<Field>,
    formats: Vec<Option<TimestampFormat>>,
}

impl Coercer {
    /// Compiles the configured patterns for `fields`.
    ///
    /// Patterns naming no field are ignored with a warning.
    pub fn new(fields: &[Field], config: &ScanConfig) -> ScanResult<Self> {
        let formats = fields
            .iter()
            .map(|field| {
                config
                    .timestamp_format(&field.name)
                    .map(|pattern| TimestampFormat::compile(&field.name, pattern))
                    .transpose()
            })
            .collect::<ScanResult<Vec<_>>>()?;

        for name in config.timestamp_formats().keys() {
            if !fields.iter().any(|field| &field.name == name) {
                warn!(field = %name, "Timestamp format configured for unknown field");
            }
        }

        Ok(Self {
            fields: fields.to_vec(),
            formats,
        })
    }

    /// Returns the compiled pattern of the field at `ordinal`.
    pub fn format(&self, ordinal: usize) -> Option<&TimestampFormat> {
        self.formats.get(ordinal).and_then(Option::as_ref)
    }

    /// Coerces a raw value of the field at `ordinal`.
    pub fn coerce(&self, ordinal: usize, raw: &RawValue) -> ScanResult<Value> {
        let field = self.fields.get(ordinal).ok_or_else(|| {
            ScanError::projection(format!(
                "ordinal {} out of range for {} fields",
                ordinal,
                self.fields.len()
            ))
        })?;
        coerce(raw, &field.data_type, &field.name, self.format(ordinal))
    }
}

/// Converts `raw` to `target`, using `format` for date-time strings.
pub fn coerce(
    raw: &RawValue,
    target: &DataType,
    field: &str,
    format: Option<&TimestampFormat>,
) -> ScanResult<Value> {
    if raw.is_null() {
        return Ok(Value::Null);
    }

    let converted = match target {
        DataType::Boolean => to_bool(raw).map(Value::Boolean),
        DataType::TinyInt => to_i64(raw).and_then(narrow).map(Value::TinyInt),
        DataType::SmallInt => to_i64(raw).and_then(narrow).map(Value::SmallInt),
        DataType::Int => to_i64(raw).and_then(narrow).map(Value::Int),
        DataType::BigInt => to_i64(raw).map(Value::BigInt),
        DataType::Float => to_f64(raw).map(|v| Value::Float(v as f32)),
        DataType::Double => to_f64(raw).map(Value::Double),
        DataType::Decimal { scale, .. } => {
            to_decimal(raw, *scale).map(|(value, scale)| Value::Decimal { value, scale })
        }
        DataType::Char(_) | DataType::Varchar(_) | DataType::Text | DataType::Json => {
            to_text(raw, format).map(Value::String)
        }
        DataType::Blob => match raw {
            RawValue::Bytes(b) => Ok(Value::Bytes(b.clone())),
            RawValue::String(s) => Ok(Value::Bytes(s.as_bytes().to_vec())),
            _ => Err(unsupported()),
        },
        DataType::Date => to_date(raw, format).map(Value::Date),
        DataType::Time => to_time(raw, format).map(Value::Time),
        DataType::Timestamp => to_timestamp(raw, format).map(Value::Timestamp),
    };

    converted.map_err(|reason| ScanError::coercion(field, raw.kind(), target, reason))
}

fn unsupported() -> String {
    "unsupported conversion".to_string()
}

fn pow10(scale: u8) -> Result<i128, String> {
    10i128
        .checked_pow(u32::from(scale))
        .ok_or_else(|| format!("decimal scale {} too large", scale))
}

fn narrow<T: TryFrom<i64>>(v: i64) -> Result<T, String> {
    T::try_from(v).map_err(|_| format!("{} out of range", v))
}

fn to_bool(raw: &RawValue) -> Result<bool, String> {
    match raw {
        RawValue::Int(i) => Ok(*i != 0),
        RawValue::UInt(u) => Ok(*u != 0),
        RawValue::String(s) => match s.trim().to_ascii_lowercase().as_str() {
            "true" | "1" => Ok(true),
            "false" | "0" => Ok(false),
            other => Err(format!("{:?} is not a boolean", other)),
        },
        _ => Err(unsupported()),
    }
}

fn to_i64(raw: &RawValue) -> Result<i64, String> {
    match raw {
        RawValue::Int(i) => Ok(*i),
        RawValue::UInt(u) => i64::try_from(*u).map_err(|_| format!("{} out of range", u)),
        RawValue::Double(d) if d.fract() == 0.0 && d.abs() < 9.2e18 => Ok(*d as i64),
        RawValue::Double(d) => Err(format!("{} is not integral", d)),
        RawValue::Decimal { value, scale } => {
            let divisor = pow10(*scale)?;
            if value % divisor != 0 {
                return Err("decimal has a fractional part".into());
            }
            i64::try_from(value / divisor).map_err(|_| "decimal out of range".to_string())
        }
        RawValue::String(s) => s.trim().parse().map_err(|e| format!("{:?}: {}", s, e)),
        _ => Err(unsupported()),
    }
}

fn to_f64(raw: &RawValue) -> Result<f64, String> {
    match raw {
        RawValue::Int(i) => Ok(*i as f64),
        RawValue::UInt(u) => Ok(*u as f64),
        RawValue::Double(d) => Ok(*d),
        RawValue::Decimal { value, scale } => Ok(*value as f64 / 10f64.powi(i32::from(*scale))),
        RawValue::String(s) => s.trim().parse().map_err(|e| format!("{:?}: {}", s, e)),
        _ => Err(unsupported()),
    }
}

fn to_decimal(raw: &RawValue, target_scale: Option<u8>) -> Result<(i128, u8), String> {
    let (value, scale) = match raw {
        RawValue::Int(i) => (i128::from(*i), 0),
        RawValue::UInt(u) => (i128::from(*u), 0),
        RawValue::Decimal { value, scale } => (*value, *scale),
        RawValue::Double(d) => parse_decimal(&d.to_string())?,
        RawValue::String(s) => parse_decimal(s)?,
        _ => return Err(unsupported()),
    };

    match target_scale {
        None => Ok((value, scale)),
        Some(target) if target >= scale => value
            .checked_mul(pow10(target - scale)?)
            .map(|v| (v, target))
            .ok_or_else(|| "decimal overflow".to_string()),
        Some(target) => {
            let divisor = pow10(scale - target)?;
            if value % divisor != 0 {
                return Err(format!("value does not fit scale {}", target));
            }
            Ok((value / divisor, target))
        }
    }
}

fn parse_decimal(input: &str) -> Result<(i128, u8), String> {
    let trimmed = input.trim();
    let invalid = || format!("{:?} is not a decimal", input);

    let (negative, unsigned) = match trimmed.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, trimmed.strip_prefix('+').unwrap_or(trimmed)),
    };
    let (int_part, frac_part) = unsigned.split_once('.').unwrap_or((unsigned, ""));
    if int_part.is_empty() && frac_part.is_empty() {
        return Err(invalid());
    }
    if !int_part
        .chars()
        .chain(frac_part.chars())
        .all(|c| c.is_ascii_digit())
    {
        return Err(invalid());
    }

    let scale = u8::try_from(frac_part.len()).map_err(|_| invalid())?;
    let digits = format!("{}{}", int_part, frac_part);
    let magnitude: i128 = digits.parse().map_err(|_| invalid())?;
    Ok((if negative { -magnitude } else { magnitude }, scale))
}

fn midnight(date: NaiveDate) -> Result<NaiveDateTime, String> {
    date.and_hms_opt(0, 0, 0)
        .ok_or_else(|| format!("no midnight on {}", date))
}

fn days_to_date(days: i32) -> Result<NaiveDate, String> {
    days.checked_add(UNIX_EPOCH_DAY_FROM_CE)
        .and_then(NaiveDate::from_num_days_from_ce_opt)
        .ok_or_else(|| format!("day {} out of range", days))
}

fn micros_to_time(micros: i64) -> Result<NaiveTime, String> {
    if !(0..MICROS_PER_DAY).contains(&micros) {
        return Err(format!("{} microseconds is not a time of day", micros));
    }
    let secs = (micros / MICROS_PER_SECOND) as u32;
    let nanos = ((micros % MICROS_PER_SECOND) * 1_000) as u32;
    NaiveTime::from_num_seconds_from_midnight_opt(secs, nanos)
        .ok_or_else(|| format!("{} microseconds is not a time of day", micros))
}

fn micros_to_timestamp(micros: i64) -> Result<NaiveDateTime, String> {
    let secs = micros.div_euclid(MICROS_PER_SECOND);
    let nanos = (micros.rem_euclid(MICROS_PER_SECOND) * 1_000) as u32;
    DateTime::from_timestamp(secs, nanos)
        .map(|dt| dt.naive_utc())
        .ok_or_else(|| format!("timestamp {} out of range", micros))
}

fn to_text(raw: &RawValue, format: Option<&TimestampFormat>) -> Result<String, String> {
    let (ts, default) = match raw {
        RawValue::String(s) => return Ok(s.clone()),
        RawValue::Bytes(b) => {
            return String::from_utf8(b.clone()).map_err(|e| format!("invalid UTF-8: {}", e))
        }
        RawValue::Int(i) => return Ok(i.to_string()),
        RawValue::UInt(u) => return Ok(u.to_string()),
        RawValue::Double(d) => return Ok(d.to_string()),
        RawValue::Decimal { value, scale } => {
            return Ok(Value::Decimal {
                value: *value,
                scale: *scale,
            }
            .to_string())
        }
        RawValue::Date(days) => (midnight(days_to_date(*days)?)?, DEFAULT_DATE_FORMAT),
        RawValue::Time(micros) => (
            days_to_date(0)?.and_time(micros_to_time(*micros)?),
            DEFAULT_TIME_FORMAT,
        ),
        RawValue::Timestamp(micros) => (micros_to_timestamp(*micros)?, DEFAULT_TIMESTAMP_FORMATS[0]),
        RawValue::Null => return Err(unsupported()),
    };

    match format {
        Some(format) => format.format(&ts),
        None => Ok(ts.format(default).to_string()),
    }
}

fn to_date(raw: &RawValue, format: Option<&TimestampFormat>) -> Result<NaiveDate, String> {
    match raw {
        RawValue::Date(days) => days_to_date(*days),
        RawValue::Timestamp(micros) => micros_to_timestamp(*micros).map(|ts| ts.date()),
        RawValue::String(s) => match format {
            Some(format) => format.parse_date(s),
            None => NaiveDate::parse_from_str(s.trim(), DEFAULT_DATE_FORMAT)
                .map_err(|e| format!("{:?}: {}", s, e)),
        },
        _ => Err(unsupported()),
    }
}

fn to_time(raw: &RawValue, format: Option<&TimestampFormat>) -> Result<NaiveTime, String> {
    match raw {
        RawValue::Time(micros) => micros_to_time(*micros),
        RawValue::Timestamp(micros) => micros_to_timestamp(*micros).map(|ts| ts.time()),
        RawValue::String(s) => match format {
            Some(format) => format.parse_time(s),
            None => NaiveTime::parse_from_str(s.trim(), DEFAULT_TIME_FORMAT)
                .map_err(|e| format!("{:?}: {}", s, e)),
        },
        _ => Err(unsupported()),
    }
}

fn to_timestamp(raw: &RawValue, format: Option<&TimestampFormat>) -> Result<NaiveDateTime, String> {
    match raw {
        RawValue::Timestamp(micros) => micros_to_timestamp(*micros),
        RawValue::Date(days) => midnight(days_to_date(*days)?),
        RawValue::String(s) => match format {
            Some(format) => format.parse_timestamp(s),
            None => parse_default_timestamp(s),
        },
        _ => Err(unsupported()),
    }
}

fn parse_default_timestamp(input: &str) -> Result<NaiveDateTime, String> {
    let trimmed = input.trim();
    DEFAULT_TIMESTAMP_FORMATS
        .iter()
        .find_map(|layout| NaiveDateTime::parse_from_str(trimmed, layout).ok())
        .map(Ok)
        .unwrap_or_else(|| {
            NaiveDate::parse_from_str(trimmed, DEFAULT_DATE_FORMAT)
                .map_err(|e| format!("{:?}: {}", input, e))
                .and_then(midnight)
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ts(y: i32, m: u32, d: u32, h: u32, min: u32, s: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(h, min, s)
            .unwrap()
    }

    #[test]
    fn test_compile_patterns() {
        let f = TimestampFormat::compile("f", "yyyy/MM/dd").unwrap();
        assert_eq!(f.strftime(), "%Y/%m/%d");

        let f = TimestampFormat::compile("f", "yyyy-MM-dd'T'HH:mm:ss.SSS").unwrap();
        assert_eq!(f.strftime(), "%Y-%m-%dT%H:%M:%S.%3f");

        let f = TimestampFormat::compile("f", "dd MMM yy 'o''clock' h a").unwrap();
        assert_eq!(f.strftime(), "%d %b %y o'clock %-I %p");

        let f = TimestampFormat::compile("f", "HH:mm '100%'").unwrap();
        assert_eq!(f.strftime(), "%H:%M 100%%");
    }

    #[test]
    fn test_compile_rejects_bad_patterns() {
        for bad in ["yyyy-QQ", "'open", "ddd", "G yyyy", "---"] {
            let err = TimestampFormat::compile("created_at", bad).unwrap_err();
            assert!(
                matches!(err, ScanError::InvalidTimestampPattern { ref field, .. } if field == "created_at"),
                "{bad}: {err}"
            );
        }
    }

    #[test]
    fn test_short_fraction_patterns() {
        let tenths = TimestampFormat::compile("t", "HH:mm:ss.S").unwrap();
        assert_eq!(tenths.strftime(), "%H:%M:%S%.f");
        assert_eq!(
            tenths.parse_time("10:00:00.5").unwrap(),
            NaiveTime::from_hms_milli_opt(10, 0, 0, 500).unwrap()
        );

        let hundredths = TimestampFormat::compile("t", "yyyy-MM-dd HH:mm:ss.SS").unwrap();
        assert_eq!(
            hundredths.parse_timestamp("2021-05-01 10:00:00.25").unwrap(),
            ts(2021, 5, 1, 10, 0, 0) + chrono::Duration::milliseconds(250)
        );

        for bad in ["HH:mm:ssS", "HH:mm:ss,SS"] {
            assert!(TimestampFormat::compile("t", bad).is_err(), "{bad}");
        }
    }

    #[test]
    fn test_date_only_pattern_parses_to_midnight() {
        let f = TimestampFormat::compile("created_at", "yyyy/MM/dd").unwrap();
        let value = coerce(
            &RawValue::String("2021/05/01".into()),
            &DataType::Timestamp,
            "created_at",
            Some(&f),
        )
        .unwrap();
        assert_eq!(value, Value::Timestamp(ts(2021, 5, 1, 0, 0, 0)));
    }

    #[test]
    fn test_pattern_with_offset_normalizes_to_utc() {
        let f = TimestampFormat::compile("t", "yyyy-MM-dd HH:mm:ssXXX").unwrap();
        assert_eq!(
            f.parse_timestamp("2021-05-01 08:00:00+08:00").unwrap(),
            ts(2021, 5, 1, 0, 0, 0)
        );
        assert_eq!(
            f.format(&ts(2021, 5, 1, 0, 0, 0)).unwrap(),
            "2021-05-01 00:00:00+00:00"
        );
    }

    #[test]
    fn test_pattern_formats_native_temporal_to_text() {
        let f = TimestampFormat::compile("day", "dd.MM.yyyy").unwrap();
        // 2021-05-01 is 18748 days after the epoch.
        let value = coerce(
            &RawValue::Date(18_748),
            &DataType::Varchar(None),
            "day",
            Some(&f),
        )
        .unwrap();
        assert_eq!(value, Value::string("01.05.2021"));

        let time_only = TimestampFormat::compile("day", "HH:mm").unwrap();
        assert!(coerce(
            &RawValue::String("2021-05-01".into()),
            &DataType::Timestamp,
            "day",
            Some(&time_only)
        )
        .is_err());
    }

    #[test]
    fn test_null_is_never_an_error() {
        let f = TimestampFormat::compile("x", "yyyy").unwrap();
        for target in [
            DataType::Boolean,
            DataType::Int,
            DataType::Decimal {
                precision: None,
                scale: Some(2),
            },
            DataType::Blob,
            DataType::Timestamp,
        ] {
            assert_eq!(coerce(&RawValue::Null, &target, "x", Some(&f)).unwrap(), Value::Null);
        }
    }

    #[test]
    fn test_integer_conversions() {
        assert_eq!(
            coerce(&RawValue::Int(42), &DataType::TinyInt, "n", None).unwrap(),
            Value::TinyInt(42)
        );
        assert_eq!(
            coerce(&RawValue::String(" 7 ".into()), &DataType::BigInt, "n", None).unwrap(),
            Value::BigInt(7)
        );
        assert_eq!(
            coerce(&RawValue::Decimal { value: 300, scale: 2 }, &DataType::Int, "n", None)
                .unwrap(),
            Value::Int(3)
        );

        let err = coerce(&RawValue::Int(300), &DataType::TinyInt, "n", None).unwrap_err();
        assert!(err.to_string().contains("out of range"));
        assert!(coerce(&RawValue::Double(1.5), &DataType::Int, "n", None).is_err());
        assert!(coerce(&RawValue::UInt(u64::MAX), &DataType::BigInt, "n", None).is_err());
    }

    #[test]
    fn test_decimal_rescaling() {
        let target = DataType::Decimal {
            precision: Some(10),
            scale: Some(2),
        };
        assert_eq!(
            coerce(&RawValue::String("12.5".into()), &target, "d", None).unwrap(),
            Value::Decimal {
                value: 1250,
                scale: 2
            }
        );
        assert_eq!(
            coerce(&RawValue::Int(-3), &target, "d", None).unwrap(),
            Value::Decimal {
                value: -300,
                scale: 2
            }
        );
        assert!(coerce(&RawValue::String("1.234".into()), &target, "d", None).is_err());
        assert!(coerce(&RawValue::String("1.2.3".into()), &target, "d", None).is_err());
    }

    #[test]
    fn test_native_temporal_values() {
        assert_eq!(
            coerce(&RawValue::Date(0), &DataType::Date, "d", None).unwrap(),
            Value::Date(NaiveDate::from_ymd_opt(1970, 1, 1).unwrap())
        );
        assert_eq!(
            coerce(&RawValue::Time(3_600_000_000), &DataType::Time, "t", None).unwrap(),
            Value::Time(NaiveTime::from_hms_opt(1, 0, 0).unwrap())
        );
        assert_eq!(
            coerce(&RawValue::Timestamp(-1_000_000), &DataType::Timestamp, "t", None).unwrap(),
            Value::Timestamp(ts(1969, 12, 31, 23, 59, 59))
        );
        assert_eq!(
            coerce(
                &RawValue::String("2021-05-01 08:30:00".into()),
                &DataType::Timestamp,
                "t",
                None
            )
            .unwrap(),
            Value::Timestamp(ts(2021, 5, 1, 8, 30, 0))
        );
        assert!(coerce(&RawValue::Time(-1), &DataType::Time, "t", None).is_err());
    }

    #[test]
    fn test_incompatible_types_fail_with_field_name() {
        let err = coerce(&RawValue::Bytes(vec![1]), &DataType::Timestamp, "created_at", None)
            .unwrap_err();
        match err {
            ScanError::Coercion { field, from, to, .. } => {
                assert_eq!(field, "created_at");
                assert_eq!(from, "Bytes");
                assert_eq!(to, "TIMESTAMP");
            }
            other => panic!("unexpected error {other}"),
        }
    }

    #[test]
    fn test_text_and_boolean() {
        assert_eq!(
            coerce(&RawValue::Int(5), &DataType::Text, "s", None).unwrap(),
            Value::string("5")
        );
        assert_eq!(
            coerce(&RawValue::String("TRUE".into()), &DataType::Boolean, "b", None).unwrap(),
            Value::Boolean(true)
        );
        assert!(coerce(&RawValue::Bytes(vec![0xff]), &DataType::Text, "s", None).is_err());
    }

    #[test]
    fn test_coercer_uses_field_patterns() {
        let config = ScanConfig::from_pairs([
            ("database-name", "db"),
            ("table-name", "t"),
            ("timestamp-format.created_at", "yyyy/MM/dd"),
            ("timestamp-format.ghost", "yyyy"),
        ])
        .unwrap();
        let fields = vec![
            Field::new("id", DataType::BigInt),
            Field::new("created_at", DataType::Timestamp),
        ];
        let coercer = Coercer::new(&fields, &config).unwrap();

        assert!(coercer.format(0).is_none());
        assert_eq!(coercer.format(1).map(TimestampFormat::pattern), Some("yyyy/MM/dd"));
        assert_eq!(
            coercer
                .coerce(1, &RawValue::String("2021/05/01".into()))
                .unwrap(),
            Value::Timestamp(ts(2021, 5, 1, 0, 0, 0))
        );
        assert!(coercer.coerce(2, &RawValue::Int(1)).is_err());
    }
}
