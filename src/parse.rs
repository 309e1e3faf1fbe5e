use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use std::time::Duration;

use crate::error::{FindError, Result};

/// Parses a human byte size such as `1024`, `500k`, `1.5M` or `2GiB`.
///
/// Units are binary and case-insensitive; `b`, `k`, `kb` and `kib` are all
/// accepted spellings of the same multiplier.
pub fn parse_byte_size(input: &str) -> Result<u64> {
    let invalid = |reason: &str| FindError::Config(format!("invalid size {:?}: {}", input, reason));

    let s = input.trim().to_ascii_lowercase();
    let split = s
        .find(|c: char| !(c.is_ascii_digit() || c == '.'))
        .unwrap_or(s.len());
    let (number, unit) = s.split_at(split);
    if number.is_empty() {
        return Err(invalid("missing number"));
    }

    let exponent = match unit.trim() {
        "" | "b" => 0,
        "k" | "kb" | "kib" => 1,
        "m" | "mb" | "mib" => 2,
        "g" | "gb" | "gib" => 3,
        "t" | "tb" | "tib" => 4,
        "p" | "pb" | "pib" => 5,
        other => return Err(invalid(&format!("unknown unit {:?}", other))),
    };
    let multiplier = 1024u64.pow(exponent);

    let bytes = match number.parse::<u64>() {
        Ok(whole) => whole
            .checked_mul(multiplier)
            .ok_or_else(|| invalid("too large"))?,
        Err(_) => {
            let value: f64 = number.parse().map_err(|_| invalid("not a number"))?;
            let bytes = value * multiplier as f64;
            if bytes >= u64::MAX as f64 {
                return Err(invalid("too large"));
            }
            bytes as u64
        }
    };

    if bytes == 0 {
        return Err(invalid("must be greater than zero"));
    }
    Ok(bytes)
}

/// Accepts `YYYY-MM-DD`, `YYYY-MM-DD HH:MM:SS` (both UTC) or RFC 3339.
pub fn parse_time(input: &str) -> Result<DateTime<Utc>> {
    let s = input.trim();

    if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        if let Some(midnight) = date.and_hms_opt(0, 0, 0) {
            return Ok(midnight.and_utc());
        }
    }
    if let Ok(datetime) = NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S") {
        return Ok(datetime.and_utc());
    }
    if let Ok(datetime) = DateTime::parse_from_rfc3339(s) {
        return Ok(datetime.with_timezone(&Utc));
    }

    Err(FindError::Config(format!(
        "invalid time {:?}: expected YYYY-MM-DD, \"YYYY-MM-DD HH:MM:SS\" or RFC 3339",
        input
    )))
}

/// `10h`, `2d`, `3weeks`, `30days`.
pub fn parse_duration(input: &str) -> Result<Duration> {
    humantime::parse_duration(input.trim())
        .map_err(|e| FindError::Config(format!("invalid duration {:?}: {}", input, e)))
}
