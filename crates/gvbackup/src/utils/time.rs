use std::time::Duration;

use anyhow::{Result, bail};
use time::format_description::well_known::{Iso8601, Rfc3339};
use time::{OffsetDateTime, PrimitiveDateTime};

const MILLIS_PER_SECOND: i64 = 1_000;

/// Parses an export timestamp (`2021-06-01T10:15:30.250-04:00`) into epoch
/// milliseconds.
///
/// Whole seconds come from the parsed instant and the millisecond part from
/// the parsed fraction; timestamps without an offset are read as UTC.
pub fn parse_timestamp_ms(raw: &str) -> Result<i64> {
    let candidate = raw.trim();
    if candidate.is_empty() {
        bail!("timestamp input is empty");
    }

    let parsed = match OffsetDateTime::parse(candidate, &Rfc3339) {
        Ok(parsed) => parsed,
        Err(_) => match OffsetDateTime::parse(candidate, &Iso8601::DEFAULT) {
            Ok(parsed) => parsed,
            Err(_) => match PrimitiveDateTime::parse(candidate, &Iso8601::DEFAULT) {
                Ok(parsed) => parsed.assume_utc(),
                Err(_) => bail!("unsupported timestamp format: {candidate}"),
            },
        },
    };

    Ok(to_unix_ms(parsed))
}

fn to_unix_ms(value: OffsetDateTime) -> i64 {
    value.unix_timestamp() * MILLIS_PER_SECOND + i64::from(value.millisecond())
}

/// Renders a run duration as `1 hour, 2 minutes, 5 seconds`, omitting zero
/// hour and minute components.
#[must_use]
pub fn format_elapsed(elapsed: Duration) -> String {
    let total_seconds = elapsed.as_secs();
    let hours = total_seconds / 3600;
    let minutes = (total_seconds % 3600) / 60;
    let seconds = total_seconds % 60;

    let mut parts = Vec::new();
    if hours > 0 {
        parts.push(pluralize(hours, "hour"));
    }
    if minutes > 0 {
        parts.push(pluralize(minutes, "minute"));
    }
    if seconds > 0 || (hours == 0 && minutes == 0) {
        parts.push(pluralize(seconds, "second"));
    }
    parts.join(", ")
}

fn pluralize(count: u64, unit: &str) -> String {
    if count == 1 {
        format!("{count} {unit}")
    } else {
        format!("{count} {unit}s")
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::{format_elapsed, parse_timestamp_ms};

    #[test]
    fn keeps_millisecond_fraction() {
        let ms = parse_timestamp_ms("2021-06-01T10:15:30.250-04:00")
            .expect("timestamp should parse");
        assert_eq!(ms, 1_622_556_930_250);
        assert_eq!(ms % 1000, 250);
    }

    #[test]
    fn parses_timestamps_without_fraction() {
        let ms = parse_timestamp_ms("2021-06-01T14:15:30Z").expect("timestamp should parse");
        assert_eq!(ms, 1_622_556_930_000);
    }

    #[test]
    fn reads_offsetless_timestamps_as_utc() {
        let ms =
            parse_timestamp_ms("2021-06-01T14:15:30.005").expect("timestamp should parse");
        assert_eq!(ms, 1_622_556_930_005);
    }

    #[test]
    fn rejects_empty_and_garbage_input() {
        assert!(parse_timestamp_ms("  ").is_err());
        let err = parse_timestamp_ms("yesterday").expect_err("garbage must fail");
        assert!(err.to_string().contains("unsupported timestamp format"));
    }

    #[test]
    fn formats_elapsed_durations() {
        assert_eq!(format_elapsed(Duration::from_secs(0)), "0 seconds");
        assert_eq!(format_elapsed(Duration::from_secs(1)), "1 second");
        assert_eq!(format_elapsed(Duration::from_secs(61)), "1 minute, 1 second");
        assert_eq!(format_elapsed(Duration::from_secs(7200)), "2 hours");
        assert_eq!(
            format_elapsed(Duration::from_secs(3725)),
            "1 hour, 2 minutes, 5 seconds"
        );
    }
}
