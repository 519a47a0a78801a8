//! Gap detection between verified days and the required day

use chrono::NaiveDate;
use std::collections::BTreeSet;

/// Days in `(min(existing), required_day]` that are not in `existing`, ascending.
///
/// An empty `existing` set yields nothing: without a reference point there is
/// no history to fill, and backfilling from an arbitrary origin would be
/// unbounded. `required_day` itself is included when missing.
pub fn find_missing_days(existing: &BTreeSet<NaiveDate>, required_day: NaiveDate) -> Vec<NaiveDate> {
    let Some(&earliest) = existing.first() else {
        return Vec::new();
    };

    earliest
        .iter_days()
        .skip(1)
        .take_while(|day| *day <= required_day)
        .filter(|day| !existing.contains(day))
        .collect()
}
