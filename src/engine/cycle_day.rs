//! Cycle day computation.
//!
//! The operating date is the local date at a fixed UTC offset, moved back
//! one day before the daily cutoff hour.

use anyhow::Result;
use chrono::{DateTime, Duration, FixedOffset, NaiveDate, Timelike, Utc};

use crate::types::EngineError;

/// Cycle day for an instant.
pub fn cycle_day(now: DateTime<Utc>, utc_offset_minutes: i32, cutoff_hour: u32) -> Result<NaiveDate> {
    let offset = FixedOffset::east_opt(utc_offset_minutes * 60).ok_or_else(|| {
        EngineError::Config(format!("utc_offset_minutes out of range: {utc_offset_minutes}"))
    })?;
    if cutoff_hour > 23 {
        return Err(EngineError::Config(format!("cutoff_hour out of range: {cutoff_hour}")).into());
    }

    let local = now.with_timezone(&offset);
    let local = if local.hour() < cutoff_hour { local - Duration::days(1) } else { local };
    Ok(local.date_naive())
}

/// Cycle day for the current instant, as `YYYY-MM-DD`.
pub fn current_cycle_day(utc_offset_minutes: i32, cutoff_hour: u32) -> Result<String> {
    Ok(cycle_day(Utc::now(), utc_offset_minutes, cutoff_hour)?.format("%Y-%m-%d").to_string())
}

/// Validate a `YYYY-MM-DD` day label.
pub fn parse_day(day: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(day, "%Y-%m-%d")
        .map_err(|e| EngineError::Config(format!("Invalid day '{day}': {e}")).into())
}
