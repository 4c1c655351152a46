//! Kopia timestamp parsing.
//!
//! Kopia prints times as RFC 3339 in UTC with nanosecond precision, e.g.
//! `2023-10-05T09:01:36.265095891Z`. Only microseconds are kept: digits past
//! the sixth are dropped without rounding.

use chrono::{DateTime, NaiveDateTime, Timelike, Utc};

use crate::MalformedRecord;

const MICROS_DIGITS: usize = 6;

/// Parse a kopia timestamp into a UTC instant with microsecond precision.
pub fn parse_timestamp(value: &str) -> Result<DateTime<Utc>, MalformedRecord> {
    let invalid = |reason: &str| MalformedRecord::Timestamp {
        value: value.to_string(),
        reason: reason.to_string(),
    };

    let body = value
        .strip_suffix('Z')
        .ok_or_else(|| invalid("missing trailing `Z`"))?;
    let (whole, fraction) = body.split_once('.').unwrap_or((body, ""));

    if !fraction.bytes().all(|b| b.is_ascii_digit()) {
        return Err(invalid("fractional seconds must be digits"));
    }

    let naive = NaiveDateTime::parse_from_str(whole, "%Y-%m-%dT%H:%M:%S")
        .map_err(|e| invalid(&e.to_string()))?;

    let kept = &fraction[..fraction.len().min(MICROS_DIGITS)];
    let micros: u32 = if kept.is_empty() {
        0
    } else {
        format!("{:0<width$}", kept, width = MICROS_DIGITS)
            .parse()
            .map_err(|_| invalid("fractional seconds out of range"))?
    };

    let naive = naive
        .with_nanosecond(micros * 1_000)
        .ok_or_else(|| invalid("fractional seconds out of range"))?;

    Ok(naive.and_utc())
}

/// Seconds since the Unix epoch, including the fractional part.
pub(crate) fn unix_seconds(time: &DateTime<Utc>) -> f64 {
    time.timestamp() as f64 + f64::from(time.timestamp_subsec_micros()) / 1_000_000.0
}
