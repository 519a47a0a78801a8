//! Window generation
//!
//! Expands a calendar day into ordered, contiguous, non-overlapping windows
//! `[start, end)` at a fixed granularity and turns them into verified drive
//! records. A day is 86400 s long and starts at local midnight of `day` in
//! the configured timezone, so every day yields `86400 / granularity`
//! windows.

use crate::db::DriveRecord;
use crate::pipeline::PipelineIdentity;
use crate::time::local_day_start;
use crate::{Error, Result};
use chrono::{DateTime, Duration, FixedOffset, NaiveDate};
use chrono_tz::Tz;

const SECONDS_PER_DAY: i64 = 86_400;

/// Half-open interval `[start, end)`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Window {
    pub start: DateTime<FixedOffset>,
    pub end: DateTime<FixedOffset>,
}

impl Window {
    pub fn interval(&self) -> Duration {
        self.end - self.start
    }
}

/// Granularity must be a positive whole number of seconds dividing one day
pub fn validate_granularity(granularity: Duration) -> Result<()> {
    let secs = granularity.num_seconds();
    if secs <= 0 || Duration::seconds(secs) != granularity {
        return Err(Error::InvalidGranularity(format!(
            "{:?} is not a positive whole number of seconds",
            granularity
        )));
    }
    if SECONDS_PER_DAY % secs != 0 {
        return Err(Error::InvalidGranularity(format!(
            "{}s does not evenly divide a day ({}s)",
            secs, SECONDS_PER_DAY
        )));
    }
    Ok(())
}

/// The span a day's windows tile: local midnight of `day` plus 86400 s.
///
/// The length is fixed. On a DST change day the span therefore ends an hour
/// before or after the next local midnight; every other day it ends exactly
/// on it.
pub fn day_span(day: NaiveDate, tz: Tz) -> Result<Window> {
    let start = local_day_start(day, tz)?;
    let end = start + Duration::seconds(SECONDS_PER_DAY);
    Ok(Window {
        start: start.fixed_offset(),
        end: end.fixed_offset(),
    })
}

/// Tile `day` into `86400 / granularity` windows of `granularity`, starting
/// at local midnight. Each bound carries the zone offset in effect at that
/// instant.
pub fn day_windows(day: NaiveDate, granularity: Duration, tz: Tz) -> Result<Vec<Window>> {
    validate_granularity(granularity)?;

    let day_start = local_day_start(day, tz)?;
    let count = (SECONDS_PER_DAY / granularity.num_seconds()) as i32;
    let windows = (0..count)
        .map(|i| {
            let start = day_start + granularity * i;
            Window {
                start: start.fixed_offset(),
                end: (start + granularity).fixed_offset(),
            }
        })
        .collect();

    Ok(windows)
}

/// Everything needed to turn windows into records.
///
/// `stamped_at` is fixed once per run so that generation stays a pure
/// function of `(day, template)`.
#[derive(Debug, Clone)]
pub struct RecordTemplate {
    pub pipeline: PipelineIdentity,
    pub granularity: Duration,
    pub timezone: Tz,
    pub stamped_at: DateTime<FixedOffset>,
}

/// Full verified tiling of `day`, ordered by window start
pub fn generate_day_windows(day: NaiveDate, template: &RecordTemplate) -> Result<Vec<DriveRecord>> {
    let records = day_windows(day, template.granularity, template.timezone)?
        .into_iter()
        .map(|window| {
            DriveRecord::for_window(
                &template.pipeline,
                day,
                window.start,
                window.end,
                template.stamped_at,
            )
        })
        .collect();
    Ok(records)
}

/// Rebuild a single record from its own window bounds.
///
/// Bounds are kept as-is (re-expressed in the configured timezone) and must
/// lie within the target day's span. The id,
/// categories, interval, flag and timestamps are recomputed; pass-through
/// attributes are carried over unchanged.
pub fn rebuild_window_record(record: &DriveRecord, template: &RecordTemplate) -> Result<DriveRecord> {
    let day = record
        .target_date()
        .ok_or_else(|| Error::MissingTargetDay(record.label()))?;
    let (start, end) = match (record.window_start(), record.window_end()) {
        (Some(start), Some(end)) => (start, end),
        _ => {
            return Err(Error::InvalidWindow(format!(
                "{}: window bounds missing or malformed",
                record.label()
            )))
        }
    };
    if start >= end {
        return Err(Error::InvalidWindow(format!(
            "{}: window start {} is not before end {}",
            record.label(),
            start.to_rfc3339(),
            end.to_rfc3339()
        )));
    }

    let span = day_span(day, template.timezone)?;
    if start < span.start || end > span.end {
        return Err(Error::InvalidWindow(format!(
            "{}: window {} to {} lies outside target day {}",
            record.label(),
            start.to_rfc3339(),
            end.to_rfc3339(),
            day
        )));
    }

    let start = start.with_timezone(&template.timezone).fixed_offset();
    let end = end.with_timezone(&template.timezone).fixed_offset();

    let mut rebuilt =
        DriveRecord::for_window(&template.pipeline, day, start, end, template.stamped_at);
    rebuilt.attributes = record.attributes.clone();
    Ok(rebuilt)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn template(granularity: Duration, timezone: Tz) -> RecordTemplate {
        RecordTemplate {
            pipeline: PipelineIdentity::named("orders"),
            granularity,
            timezone,
            stamped_at: DateTime::parse_from_rfc3339("2025-01-16T00:00:00+00:00").unwrap(),
        }
    }

    fn assert_tiles(windows: &[Window], first: DateTime<FixedOffset>, last: DateTime<FixedOffset>) {
        assert_eq!(windows.first().unwrap().start, first);
        assert_eq!(windows.last().unwrap().end, last);
        for pair in windows.windows(2) {
            assert_eq!(pair[0].end, pair[1].start, "windows must be contiguous");
        }
        for w in windows {
            assert!(w.start < w.end);
        }
    }

    #[test]
    fn test_tiling_completeness_for_all_divisors() {
        let d = day(2025, 1, 15);
        let first = DateTime::parse_from_rfc3339("2025-01-15T00:00:00+00:00").unwrap();
        let last = DateTime::parse_from_rfc3339("2025-01-16T00:00:00+00:00").unwrap();

        for secs in [60, 300, 900, 1_800, 3_600, 7_200, 10_800, 21_600, 43_200, 86_400] {
            let windows = day_windows(d, Duration::seconds(secs), Tz::UTC).unwrap();
            assert_eq!(windows.len() as i64, 86_400 / secs, "granularity {}s", secs);
            assert_tiles(&windows, first, last);
            assert!(windows.iter().all(|w| w.interval() == Duration::seconds(secs)));
        }
    }

    #[test]
    fn test_rejects_non_divisors() {
        for secs in [0, -3_600, 7, 25_200, 90_000] {
            assert!(matches!(
                day_windows(day(2025, 1, 15), Duration::seconds(secs), Tz::UTC),
                Err(Error::InvalidGranularity(_))
            ));
        }
        assert!(matches!(
            validate_granularity(Duration::milliseconds(1_500)),
            Err(Error::InvalidGranularity(_))
        ));
    }

    #[test]
    fn test_offset_timezone_day_bounds() {
        let windows = day_windows(day(2025, 1, 15), Duration::hours(1), chrono_tz::Asia::Kolkata).unwrap();
        assert_eq!(windows.len(), 24);
        assert_eq!(windows[0].start.to_rfc3339(), "2025-01-15T00:00:00+05:30");
        assert_eq!(windows[23].end.to_rfc3339(), "2025-01-16T00:00:00+05:30");
    }

    #[test]
    fn test_dst_days_keep_full_window_count() {
        let ny = chrono_tz::America::New_York;

        // Spring forward: span runs past the next local midnight
        let spring = day_windows(day(2025, 3, 9), Duration::hours(1), ny).unwrap();
        assert_eq!(spring.len(), 24);
        assert_tiles(
            &spring,
            DateTime::parse_from_rfc3339("2025-03-09T00:00:00-05:00").unwrap(),
            DateTime::parse_from_rfc3339("2025-03-10T01:00:00-04:00").unwrap(),
        );
        assert_eq!(spring[23].end.to_rfc3339(), "2025-03-10T01:00:00-04:00");

        // Fall back: span stops an hour short of it
        let fall = day_windows(day(2025, 11, 2), Duration::hours(1), ny).unwrap();
        assert_eq!(fall.len(), 24);
        assert_eq!(fall[23].end.to_rfc3339(), "2025-11-02T23:00:00-05:00");

        let two_hourly = day_windows(day(2025, 3, 9), Duration::hours(2), ny).unwrap();
        assert_eq!(two_hourly.len(), 12);
        assert!(two_hourly.iter().all(|w| w.interval() == Duration::hours(2)));

        let span = day_span(day(2025, 3, 9), ny).unwrap();
        assert_eq!(span.interval(), Duration::days(1));
        assert_eq!(span.end, spring[23].end);
    }

    #[test]
    fn test_generated_records_are_verified_and_deterministic() {
        let t = template(Duration::minutes(30), Tz::UTC);
        let records = generate_day_windows(day(2025, 1, 15), &t).unwrap();
        assert_eq!(records.len(), 48);
        assert!(records.iter().all(|r| r.is_verified()));
        assert!(records.iter().all(|r| r.target_day.as_deref() == Some("2025-01-15")));
        assert!(records.iter().all(|r| r.time_interval.as_deref() == Some("30m")));
        for r in &records {
            assert_eq!(r.interval().unwrap(), r.window_end().unwrap() - r.window_start().unwrap());
        }

        let again = generate_day_windows(day(2025, 1, 15), &t).unwrap();
        assert_eq!(records, again);
    }

    #[test]
    fn test_rebuild_keeps_bounds_and_attributes() {
        let t = template(Duration::hours(1), Tz::UTC);
        let mut original = generate_day_windows(day(2025, 1, 10), &t).unwrap().remove(5);
        original.continuity_check_performed = "NO".to_string();
        original.pipeline_id = Some("stale".to_string());
        original.time_interval = Some("7m".to_string());
        original.attributes = Some(r#"{"source_count":12}"#.to_string());

        let rebuilt = rebuild_window_record(&original, &t).unwrap();
        assert_eq!(rebuilt.window_start(), original.window_start());
        assert_eq!(rebuilt.window_end(), original.window_end());
        assert!(rebuilt.is_verified());
        assert_eq!(rebuilt.time_interval.as_deref(), Some("1h"));
        assert_ne!(rebuilt.pipeline_id.as_deref(), Some("stale"));
        assert_eq!(rebuilt.attributes, original.attributes);
        assert_eq!(
            rebuilt.interval().unwrap(),
            rebuilt.window_end().unwrap() - rebuilt.window_start().unwrap()
        );
    }

    #[test]
    fn test_rebuild_rejects_inverted_window() {
        let t = template(Duration::hours(1), Tz::UTC);
        let mut record = generate_day_windows(day(2025, 1, 10), &t).unwrap().remove(0);
        std::mem::swap(&mut record.window_start_time, &mut record.window_end_time);
        assert!(matches!(
            rebuild_window_record(&record, &t),
            Err(Error::InvalidWindow(_))
        ));

        record.window_end_time = record.window_start_time.clone();
        assert!(matches!(
            rebuild_window_record(&record, &t),
            Err(Error::InvalidWindow(_))
        ));
    }

    #[test]
    fn test_rebuild_rejects_window_outside_target_day() {
        let t = template(Duration::hours(1), Tz::UTC);
        let mut record = generate_day_windows(day(2025, 1, 10), &t).unwrap().remove(5);
        record.window_start_time = Some("2025-01-12T05:00:00+00:00".to_string());
        record.window_end_time = Some("2025-01-12T06:00:00+00:00".to_string());
        assert!(matches!(
            rebuild_window_record(&record, &t),
            Err(Error::InvalidWindow(_))
        ));

        // Straddles the next midnight
        record.window_start_time = Some("2025-01-10T23:30:00+00:00".to_string());
        record.window_end_time = Some("2025-01-11T00:30:00+00:00".to_string());
        assert!(matches!(
            rebuild_window_record(&record, &t),
            Err(Error::InvalidWindow(_))
        ));

        // Ending exactly on the next midnight is inside
        record.window_start_time = Some("2025-01-10T23:00:00+00:00".to_string());
        record.window_end_time = Some("2025-01-11T00:00:00+00:00".to_string());
        assert!(rebuild_window_record(&record, &t).is_ok());
    }
}
