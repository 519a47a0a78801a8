//! Database models

use crate::human_time::{format_duration, parse_duration};
use crate::pipeline::PipelineIdentity;
use crate::Result;
use chrono::{DateTime, Duration, FixedOffset, NaiveDate};
use serde::{Deserialize, Serialize};
use sqlx::sqlite::SqliteRow;
use sqlx::Row;
use std::fmt;

/// Stored value of `pipeline_status` for freshly generated windows
pub const STATUS_PENDING: &str = "PENDING";

/// Column order shared by every SELECT and INSERT on the drive table
pub const DRIVE_COLUMNS: [&str; 16] = [
    "pipeline_id",
    "pipeline_name",
    "source_complete_category",
    "stage_complete_category",
    "target_complete_category",
    "pipeline_priority",
    "target_day",
    "window_start_time",
    "window_end_time",
    "time_interval",
    "pipeline_status",
    "continuity_check_performed",
    "can_access_historical_data",
    "record_first_created_time",
    "record_last_updated_time",
    "attributes",
];

/// Value of the `continuity_check_performed` column
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ContinuityCheck {
    Yes,
    No,
}

impl ContinuityCheck {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContinuityCheck::Yes => "YES",
            ContinuityCheck::No => "NO",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_uppercase().as_str() {
            "YES" => Some(ContinuityCheck::Yes),
            "NO" => Some(ContinuityCheck::No),
            _ => None,
        }
    }
}

impl fmt::Display for ContinuityCheck {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One row of the drive table.
///
/// Columns keep the exact text read from storage. Rows written by an older
/// job or edited by hand may hold anything, and an exact delete must match
/// them byte for byte. The typed accessors parse on demand and return `None`
/// for absent or malformed values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DriveRecord {
    pub pipeline_id: Option<String>,
    pub pipeline_name: String,
    pub source_complete_category: String,
    pub stage_complete_category: Option<String>,
    pub target_complete_category: Option<String>,
    pub pipeline_priority: f64,
    pub target_day: Option<String>,
    pub window_start_time: Option<String>,
    pub window_end_time: Option<String>,
    pub time_interval: Option<String>,
    pub pipeline_status: Option<String>,
    pub continuity_check_performed: String,
    pub can_access_historical_data: Option<String>,
    pub record_first_created_time: Option<String>,
    pub record_last_updated_time: Option<String>,
    /// Opaque JSON object for downstream consumers
    pub attributes: Option<String>,
}

impl DriveRecord {
    /// Build a verified record for one window of `day`
    pub fn for_window(
        pipeline: &PipelineIdentity,
        day: NaiveDate,
        start: DateTime<FixedOffset>,
        end: DateTime<FixedOffset>,
        stamped_at: DateTime<FixedOffset>,
    ) -> Self {
        let stamp = stamped_at.to_rfc3339();
        Self {
            pipeline_id: Some(pipeline.pipeline_id(&start, &end)),
            pipeline_name: pipeline.name.clone(),
            source_complete_category: pipeline.source_category(),
            stage_complete_category: Some(pipeline.stage_category(&start)),
            target_complete_category: Some(pipeline.target_category(&start)),
            pipeline_priority: pipeline.priority,
            target_day: Some(day.format("%Y-%m-%d").to_string()),
            window_start_time: Some(start.to_rfc3339()),
            window_end_time: Some(end.to_rfc3339()),
            time_interval: Some(format_duration(end - start)),
            pipeline_status: Some(STATUS_PENDING.to_string()),
            continuity_check_performed: ContinuityCheck::Yes.as_str().to_string(),
            can_access_historical_data: Some(
                if pipeline.can_access_historical_data { "YES" } else { "NO" }.to_string(),
            ),
            record_first_created_time: Some(stamp.clone()),
            record_last_updated_time: Some(stamp),
            attributes: None,
        }
    }

    /// Parsed `target_day`
    pub fn target_date(&self) -> Option<NaiveDate> {
        self.target_day.as_deref().and_then(parse_target_day)
    }

    /// Parsed `window_start_time`
    pub fn window_start(&self) -> Option<DateTime<FixedOffset>> {
        self.window_start_time.as_deref().and_then(parse_timestamp)
    }

    /// Parsed `window_end_time`
    pub fn window_end(&self) -> Option<DateTime<FixedOffset>> {
        self.window_end_time.as_deref().and_then(parse_timestamp)
    }

    /// Parsed `time_interval`
    pub fn interval(&self) -> Option<Duration> {
        self.time_interval
            .as_deref()
            .and_then(|raw| parse_duration(raw).ok())
    }

    /// Parsed continuity flag; `None` when the column holds something else
    pub fn continuity_check(&self) -> Option<ContinuityCheck> {
        ContinuityCheck::parse(&self.continuity_check_performed)
    }

    pub fn is_verified(&self) -> bool {
        self.continuity_check() == Some(ContinuityCheck::Yes)
    }

    /// Short label for logs and failure reports
    pub fn label(&self) -> String {
        self.pipeline_id
            .clone()
            .unwrap_or_else(|| "Unknown".to_string())
    }

    /// Decode a row selected with [`DRIVE_COLUMNS`]
    pub fn from_row(row: &SqliteRow) -> Result<Self> {
        Ok(Self {
            pipeline_id: row.try_get("pipeline_id")?,
            pipeline_name: row.try_get("pipeline_name")?,
            source_complete_category: row.try_get("source_complete_category")?,
            stage_complete_category: row.try_get("stage_complete_category")?,
            target_complete_category: row.try_get("target_complete_category")?,
            pipeline_priority: row.try_get("pipeline_priority")?,
            target_day: row.try_get("target_day")?,
            window_start_time: row.try_get("window_start_time")?,
            window_end_time: row.try_get("window_end_time")?,
            time_interval: row.try_get("time_interval")?,
            pipeline_status: row.try_get("pipeline_status")?,
            continuity_check_performed: row.try_get("continuity_check_performed")?,
            can_access_historical_data: row.try_get("can_access_historical_data")?,
            record_first_created_time: row.try_get("record_first_created_time")?,
            record_last_updated_time: row.try_get("record_last_updated_time")?,
            attributes: row.try_get("attributes")?,
        })
    }
}

/// Stored target day as a date; accepts `YYYY-MM-DD` or a full timestamp
pub fn parse_target_day(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .or_else(|| parse_timestamp(raw).map(|ts| ts.date_naive()))
}

/// RFC 3339, or the `YYYY-MM-DD HH:MM:SS+HH:MM` form some exports produce
fn parse_timestamp(raw: &str) -> Option<DateTime<FixedOffset>> {
    let raw = raw.trim();
    DateTime::parse_from_rfc3339(raw)
        .or_else(|_| DateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S%:z"))
        .ok()
}
