//! Timestamp utilities and required-day arithmetic

use crate::{Error, Result};
use chrono::{DateTime, Duration, NaiveDate, TimeZone, Utc};
use chrono_tz::Tz;

/// Get current UTC timestamp
pub fn now() -> DateTime<Utc> {
    Utc::now()
}

/// Source of "now" for a reconciliation run
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall clock
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        now()
    }
}

/// Clock pinned to a single instant (backfills, tests)
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub DateTime<Utc>);

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}

/// Most recent day the table must have fully tiled.
///
/// The lookback is subtracted in absolute time, then the instant is converted
/// into `tz` and only then truncated to a date. Truncating in UTC first gives
/// the wrong day whenever the zone offset moves the instant across midnight.
pub fn required_day(now: DateTime<Utc>, lookback: Duration, tz: Tz) -> NaiveDate {
    (now - lookback).with_timezone(&tz).date_naive()
}

/// First instant of `day` in `tz`.
///
/// Ambiguous local midnight resolves to the earlier instant. Zones that skip
/// midnight on a DST change start the day at the first local time that exists.
pub fn local_day_start(day: NaiveDate, tz: Tz) -> Result<DateTime<Tz>> {
    let midnight = day
        .and_hms_opt(0, 0, 0)
        .ok_or_else(|| Error::Internal(format!("no midnight for {}", day)))?;

    // DST gaps never exceed a few hours; probe in 15 minute steps
    for step in 0..=16 {
        let probe = midnight + Duration::minutes(15 * step);
        if let Some(start) = tz.from_local_datetime(&probe).earliest() {
            return Ok(start);
        }
    }

    Err(Error::Internal(format!(
        "cannot resolve start of {} in timezone {}",
        day,
        tz.name()
    )))
}
