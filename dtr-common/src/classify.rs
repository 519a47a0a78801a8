//! Classification of records that have not passed the continuity check

use crate::db::DriveRecord;
use crate::{Error, Result};
use chrono::NaiveDate;
use serde::Serialize;
use std::collections::BTreeSet;
use std::fmt;

/// What to do with an unverified record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Branch {
    /// Day is verified and the record's window is intact: rebuild just this row
    RebuildSingle,
    /// Day is verified but the record's window is unusable: re-tile the day
    RebuildFullDay,
    /// Day has no verified tiling: tile it
    CreateFullDay,
}

impl fmt::Display for Branch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Branch::RebuildSingle => "rebuild_single",
            Branch::RebuildFullDay => "rebuild_full_day",
            Branch::CreateFullDay => "create_full_day",
        };
        f.write_str(name)
    }
}

/// Result of [`classify`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Classification {
    pub target_day: NaiveDate,
    pub branch: Branch,
}

/// Decide how an unverified record is repaired.
///
/// # Errors
/// * [`Error::MissingTargetDay`] - `target_day` absent or unparseable
/// * [`Error::InvalidWindow`] - verified day, both bounds parse, but start >= end
///
/// Callers count both as a failed record and move on. Bounds that fall
/// outside the target day need the zone and are rejected by
/// [`crate::windows::rebuild_window_record`] before anything is deleted.
pub fn classify(record: &DriveRecord, verified_days: &BTreeSet<NaiveDate>) -> Result<Classification> {
    let target_day = record.target_date().ok_or_else(|| {
        Error::MissingTargetDay(format!(
            "record {} has target_day {:?}",
            record.label(),
            record.target_day
        ))
    })?;

    if !verified_days.contains(&target_day) {
        return Ok(Classification {
            target_day,
            branch: Branch::CreateFullDay,
        });
    }

    let branch = match (record.window_start(), record.window_end()) {
        (Some(start), Some(end)) if start < end => Branch::RebuildSingle,
        (Some(start), Some(end)) => {
            return Err(Error::InvalidWindow(format!(
                "record {} on {}: start {} is not before end {}",
                record.label(),
                target_day,
                start.to_rfc3339(),
                end.to_rfc3339()
            )))
        }
        _ => Branch::RebuildFullDay,
    };

    Ok(Classification { target_day, branch })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::PipelineIdentity;
    use chrono::DateTime;

    fn day(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn unverified(target_day: &str, start: Option<&str>, end: Option<&str>) -> DriveRecord {
        let stamp = DateTime::parse_from_rfc3339("2025-01-16T00:00:00+00:00").unwrap();
        let mut record = DriveRecord::for_window(
            &PipelineIdentity::named("orders"),
            day("2025-01-10"),
            DateTime::parse_from_rfc3339("2025-01-10T05:00:00+00:00").unwrap(),
            DateTime::parse_from_rfc3339("2025-01-10T06:00:00+00:00").unwrap(),
            stamp,
        );
        record.continuity_check_performed = "NO".to_string();
        record.target_day = Some(target_day.to_string());
        record.window_start_time = start.map(str::to_string);
        record.window_end_time = end.map(str::to_string);
        record
    }

    fn verified() -> BTreeSet<NaiveDate> {
        [day("2025-01-10")].into_iter().collect()
    }

    #[test]
    fn test_rebuild_single() {
        let record = unverified(
            "2025-01-10",
            Some("2025-01-10T05:00:00+00:00"),
            Some("2025-01-10T06:00:00+00:00"),
        );
        let c = classify(&record, &verified()).unwrap();
        assert_eq!(c.branch, Branch::RebuildSingle);
        assert_eq!(c.target_day, day("2025-01-10"));
    }

    #[test]
    fn test_rebuild_full_day_on_missing_or_malformed_window() {
        let missing_end = unverified("2025-01-10", Some("2025-01-10T05:00:00+00:00"), None);
        assert_eq!(
            classify(&missing_end, &verified()).unwrap().branch,
            Branch::RebuildFullDay
        );

        let missing_both = unverified("2025-01-10", None, None);
        assert_eq!(
            classify(&missing_both, &verified()).unwrap().branch,
            Branch::RebuildFullDay
        );

        let malformed = unverified("2025-01-10", Some("05:00"), Some("2025-01-10T06:00:00+00:00"));
        assert_eq!(
            classify(&malformed, &verified()).unwrap().branch,
            Branch::RebuildFullDay
        );
    }

    #[test]
    fn test_create_full_day_when_day_unverified() {
        let record = unverified(
            "2025-01-11",
            Some("2025-01-11T05:00:00+00:00"),
            Some("2025-01-11T06:00:00+00:00"),
        );
        let c = classify(&record, &verified()).unwrap();
        assert_eq!(c.branch, Branch::CreateFullDay);
        assert_eq!(c.target_day, day("2025-01-11"));

        // Window state is irrelevant for unverified days
        let no_window = unverified("2025-01-11", None, None);
        assert_eq!(
            classify(&no_window, &verified()).unwrap().branch,
            Branch::CreateFullDay
        );
    }

    #[test]
    fn test_missing_target_day() {
        let mut record = unverified("2025-01-10", None, None);
        record.target_day = None;
        assert!(matches!(
            classify(&record, &verified()),
            Err(Error::MissingTargetDay(_))
        ));

        record.target_day = Some("soon".to_string());
        assert!(matches!(
            classify(&record, &verified()),
            Err(Error::MissingTargetDay(_))
        ));
    }

    #[test]
    fn test_inverted_window_is_rejected() {
        let record = unverified(
            "2025-01-10",
            Some("2025-01-10T06:00:00+00:00"),
            Some("2025-01-10T05:00:00+00:00"),
        );
        assert!(matches!(
            classify(&record, &verified()),
            Err(Error::InvalidWindow(_))
        ));

        let empty = unverified(
            "2025-01-10",
            Some("2025-01-10T05:00:00+00:00"),
            Some("2025-01-10T05:00:00+00:00"),
        );
        assert!(matches!(
            classify(&empty, &verified()),
            Err(Error::InvalidWindow(_))
        ));
    }

    #[test]
    fn test_branch_display() {
        assert_eq!(Branch::RebuildSingle.to_string(), "rebuild_single");
        assert_eq!(Branch::CreateFullDay.to_string(), "create_full_day");
    }
}
