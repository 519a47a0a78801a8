//! Test Helper Utilities
//!
//! Shared fixtures and a fault-injecting gateway for reconciler tests

#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, Duration, FixedOffset, NaiveDate, TimeZone, Utc};
use dtr_common::pipeline::PipelineIdentity;
use dtr_common::time::FixedClock;
use dtr_common::windows::{generate_day_windows, RecordTemplate};
use dtr_common::{DriveRecord, Error, ReconciliationConfig, Result};
use dtr_rc::{DriveTableGateway, MemoryGateway, PipelineScope, Reconciler};
use std::collections::{BTreeSet, HashSet};
use std::sync::Arc;

pub const TABLE: &str = "drive_table";

pub fn day(s: &str) -> NaiveDate {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
}

pub fn ts(s: &str) -> DateTime<FixedOffset> {
    DateTime::parse_from_rfc3339(s).unwrap()
}

/// 2025-01-16T00:00:00Z, so the required day is 2025-01-15 with a 1d lookback
pub fn default_now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 1, 16, 0, 0, 0).unwrap()
}

/// Hourly UTC config with a one day lookback
pub fn test_config() -> ReconciliationConfig {
    ReconciliationConfig {
        granularity: Duration::hours(1),
        lookback: Duration::days(1),
        timezone: chrono_tz::UTC,
        table: TABLE.to_string(),
        max_lock_wait_ms: 200,
        pipeline: PipelineIdentity::named("orders_hourly"),
    }
}

pub fn scope() -> PipelineScope {
    PipelineScope::from_identity(&test_config().pipeline)
}

pub fn template(config: &ReconciliationConfig) -> RecordTemplate {
    RecordTemplate {
        pipeline: config.pipeline.clone(),
        granularity: config.granularity,
        timezone: config.timezone,
        stamped_at: ts("2025-01-01T00:00:00+00:00"),
    }
}

/// Verified full tiling of `d` under [`test_config`]
pub fn tiled_day(d: &str) -> Vec<DriveRecord> {
    generate_day_windows(day(d), &template(&test_config())).unwrap()
}

pub fn unverified(mut record: DriveRecord) -> DriveRecord {
    record.continuity_check_performed = "NO".to_string();
    record
}

pub fn reconciler_at<G: DriveTableGateway>(gateway: G, now: DateTime<Utc>) -> Reconciler<G> {
    Reconciler::new(gateway, test_config()).with_clock(Arc::new(FixedClock(now)))
}

pub fn memory_reconciler(records: Vec<DriveRecord>) -> Reconciler<MemoryGateway> {
    reconciler_at(MemoryGateway::with_records(scope(), records), default_now())
}

pub fn records_for(records: &[DriveRecord], d: &str) -> Vec<DriveRecord> {
    records
        .iter()
        .filter(|r| r.target_date() == Some(day(d)))
        .cloned()
        .collect()
}

/// Gateway that delegates to a [`MemoryGateway`] but fails chosen writes
pub struct FaultyGateway {
    pub inner: MemoryGateway,
    fail_insert_days: HashSet<NaiveDate>,
    fail_delete_ids: HashSet<String>,
    fail_reads: bool,
}

impl FaultyGateway {
    pub fn new(records: Vec<DriveRecord>) -> Self {
        Self {
            inner: MemoryGateway::with_records(scope(), records),
            fail_insert_days: HashSet::new(),
            fail_delete_ids: HashSet::new(),
            fail_reads: false,
        }
    }

    /// Fail every insert of records targeting `d`
    pub fn fail_inserts_on(mut self, d: &str) -> Self {
        self.fail_insert_days.insert(day(d));
        self
    }

    /// Fail deleting the record with this pipeline id
    pub fn fail_delete_of(mut self, pipeline_id: &str) -> Self {
        self.fail_delete_ids.insert(pipeline_id.to_string());
        self
    }

    /// Fail every table-wide read
    pub fn fail_reads(mut self) -> Self {
        self.fail_reads = true;
        self
    }

    fn injected(what: &str) -> Error {
        Error::Persistence(format!("injected failure: {}", what))
    }

    fn check_insert(&self, record: &DriveRecord) -> Result<()> {
        match record.target_date() {
            Some(d) if self.fail_insert_days.contains(&d) => Err(Self::injected("insert")),
            _ => Ok(()),
        }
    }

    fn check_read(&self) -> Result<()> {
        if self.fail_reads {
            Err(Self::injected("read"))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl DriveTableGateway for FaultyGateway {
    async fn query_unverified_records(&self) -> Result<Vec<DriveRecord>> {
        self.check_read()?;
        self.inner.query_unverified_records().await
    }

    async fn query_verified_days(&self) -> Result<BTreeSet<NaiveDate>> {
        self.check_read()?;
        self.inner.query_verified_days().await
    }

    async fn query_max_target_day(&self) -> Result<Option<NaiveDate>> {
        self.check_read()?;
        self.inner.query_max_target_day().await
    }

    async fn query_day_records(&self, d: NaiveDate) -> Result<Vec<DriveRecord>> {
        self.inner.query_day_records(d).await
    }

    async fn delete_exact(&self, record: &DriveRecord) -> Result<u64> {
        if let Some(id) = &record.pipeline_id {
            if self.fail_delete_ids.contains(id) {
                return Err(Self::injected("delete"));
            }
        }
        self.inner.delete_exact(record).await
    }

    async fn insert_one(&self, record: &DriveRecord) -> Result<()> {
        self.check_insert(record)?;
        self.inner.insert_one(record).await
    }

    async fn insert_many(&self, records: &[DriveRecord]) -> Result<u64> {
        for record in records {
            self.check_insert(record)?;
        }
        self.inner.insert_many(records).await
    }
}
