//! Query time range and the timestamp renderings macros emit.

use chrono::{DateTime, TimeZone, Timelike, Utc};

/// Inclusive time window a query is evaluated over, normalised to UTC.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct TimeRange {
    pub from: DateTime<Utc>,
    pub to: DateTime<Utc>,
}

impl TimeRange {
    pub fn new<Tz: TimeZone>(from: DateTime<Tz>, to: DateTime<Tz>) -> Self {
        Self {
            from: from.with_timezone(&Utc),
            to: to.with_timezone(&Utc),
        }
    }

    pub fn from_rfc3339(&self) -> String {
        format_rfc3339_nano(&self.from)
    }

    pub fn to_rfc3339(&self) -> String {
        format_rfc3339_nano(&self.to)
    }
}

/// RFC 3339 with up to nanosecond precision, trailing fractional zeros
/// removed and the fraction omitted entirely when zero.
///
/// `2018-04-12T18:00:00Z`, `1960-02-01T07:00:00.5Z`
pub fn format_rfc3339_nano(ts: &DateTime<Utc>) -> String {
    let mut out = ts.format("%Y-%m-%dT%H:%M:%S").to_string();
    // Leap-second representation carries nanos >= 1e9; fold it back.
    let nanos = ts.nanosecond() % 1_000_000_000;
    if nanos != 0 {
        let fraction = format!("{nanos:09}");
        out.push('.');
        out.push_str(fraction.trim_end_matches('0'));
    }
    out.push('Z');
    out
}

/// Whole seconds since the Unix epoch.
pub fn unix_seconds(ts: &DateTime<Utc>) -> i64 {
    ts.timestamp()
}

/// Nanoseconds since the Unix epoch. Widened so ranges far outside
/// 1677..2262 still render exactly.
pub fn unix_nanos(ts: &DateTime<Utc>) -> i128 {
    i128::from(ts.timestamp()) * 1_000_000_000
        + i128::from(ts.timestamp_subsec_nanos() % 1_000_000_000)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, FixedOffset};

    #[test]
    fn formats_whole_seconds_without_fraction() {
        let ts = Utc.with_ymd_and_hms(2018, 4, 12, 18, 0, 0).unwrap();
        assert_eq!(format_rfc3339_nano(&ts), "2018-04-12T18:00:00Z");
    }

    #[test]
    fn trims_trailing_fraction_zeros() {
        let ts = Utc.with_ymd_and_hms(1960, 2, 1, 7, 0, 0).unwrap() + Duration::milliseconds(500);
        assert_eq!(format_rfc3339_nano(&ts), "1960-02-01T07:00:00.5Z");

        let ts = Utc.with_ymd_and_hms(2020, 1, 1, 0, 0, 0).unwrap() + Duration::nanoseconds(1);
        assert_eq!(format_rfc3339_nano(&ts), "2020-01-01T00:00:00.000000001Z");
    }

    #[test]
    fn normalises_offsets_to_utc() {
        let offset = FixedOffset::east_opt(2 * 3600).unwrap();
        let from = offset.with_ymd_and_hms(2018, 4, 12, 20, 0, 0).unwrap();
        let range = TimeRange::new(from, from);
        assert_eq!(range.from_rfc3339(), "2018-04-12T18:00:00Z");
    }

    #[test]
    fn nanos_before_epoch_are_negative() {
        let ts = Utc.with_ymd_and_hms(1960, 2, 1, 7, 0, 0).unwrap() + Duration::milliseconds(500);
        assert_eq!(unix_nanos(&ts), -312_915_599_500_000_000);
        assert_eq!(unix_seconds(&ts), -312_915_600);
    }
}
