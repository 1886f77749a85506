//! Snapshot resolution.
//!
//! Turns the optional `snapshot-timestamp` property into the read point every
//! split of a scan shares. Accepted input is an ISO-8601 date-time with an
//! offset, optionally followed by a bracketed zone name:
//!
//! ```text
//! 2021-05-01T08:00:00+08:00
//! 2021-05-01T00:00:00.250Z
//! 2021-05-01T08:00+08:00[Asia/Shanghai]
//! ```
//!
//! The instant becomes the physical part of the timestamp; the logical
//! counter is always zero.

use chrono::{DateTime, FixedOffset};
use splitscan_common::error::{ScanError, ScanResult};
use splitscan_common::types::SnapshotTimestamp;

/// Fallback layout for offsets without seconds.
const NO_SECONDS_FORMAT: &str = "%Y-%m-%dT%H:%M%:z";

/// Resolves an optional snapshot property.
///
/// Returns `Ok(None)` for an absent or blank value, meaning "read latest".
pub fn resolve(value: Option<&str>) -> ScanResult<Option<SnapshotTimestamp>> {
    let raw = match value.map(str::trim) {
        None | Some("") => return Ok(None),
        Some(raw) => raw,
    };

    let instant = parse_zoned(raw).map_err(|reason| ScanError::InvalidSnapshotTimestamp {
        value: raw.to_string(),
        reason,
    })?;

    let millis = u64::try_from(instant.timestamp_millis()).map_err(|_| {
        ScanError::InvalidSnapshotTimestamp {
            value: raw.to_string(),
            reason: "instant precedes the Unix epoch".into(),
        }
    })?;

    SnapshotTimestamp::checked_from_millis(millis)
        .map(Some)
        .ok_or_else(|| ScanError::InvalidSnapshotTimestamp {
            value: raw.to_string(),
            reason: "instant exceeds the representable range".into(),
        })
}

fn parse_zoned(raw: &str) -> Result<DateTime<FixedOffset>, String> {
    let without_zone = match raw.find('[') {
        Some(open) if raw.ends_with(']') => &raw[..open],
        Some(_) => return Err("unterminated zone name".into()),
        None => raw,
    };

    DateTime::parse_from_rfc3339(without_zone).or_else(|rfc_err| {
        DateTime::parse_from_str(without_zone, NO_SECONDS_FORMAT).map_err(|_| rfc_err.to_string())
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const MAY_FIRST_UTC: u64 = 1_619_827_200_000;

    #[test]
    fn test_absent_or_blank_reads_latest() {
        assert_eq!(resolve(None).unwrap(), None);
        assert_eq!(resolve(Some("")).unwrap(), None);
        assert_eq!(resolve(Some("   ")).unwrap(), None);
    }

    #[test]
    fn test_offsets_are_normalized() {
        let utc = resolve(Some("2021-05-01T00:00:00Z")).unwrap().unwrap();
        let shanghai = resolve(Some("2021-05-01T08:00:00+08:00")).unwrap().unwrap();
        assert_eq!(utc, shanghai);
        assert_eq!(utc.physical(), MAY_FIRST_UTC);
        assert_eq!(utc.logical(), 0);
    }

    #[test]
    fn test_zone_suffix_and_missing_seconds() {
        let ts = resolve(Some("2021-05-01T08:00+08:00[Asia/Shanghai]"))
            .unwrap()
            .unwrap();
        assert_eq!(ts.physical(), MAY_FIRST_UTC);

        let millis = resolve(Some("2021-05-01T00:00:00.250Z")).unwrap().unwrap();
        assert_eq!(millis.physical(), MAY_FIRST_UTC + 250);
    }

    #[test]
    fn test_last_representable_instant() {
        let ts = resolve(Some("4199-11-24T01:22:57.663Z")).unwrap().unwrap();
        assert_eq!(ts.physical(), splitscan_common::constants::MAX_PHYSICAL);
        assert_eq!(SnapshotTimestamp::from_version(ts.to_version()), ts);
    }

    #[test]
    fn test_malformed_values_fail() {
        for bad in [
            "2021-05-01",
            "2021-05-01T00:00:00",
            "yesterday",
            "2021-05-01T00:00:00Z[UTC",
            "1960-01-01T00:00:00Z",
            "4199-11-24T01:22:57.664Z",
            "4199-11-24T01:22:58.664Z",
        ] {
            let err = resolve(Some(bad)).unwrap_err();
            assert!(
                matches!(err, ScanError::InvalidSnapshotTimestamp { .. }),
                "{bad}: {err}"
            );
        }
    }
}
