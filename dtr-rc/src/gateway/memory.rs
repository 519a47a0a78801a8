//! In-memory drive table gateway
//!
//! Backs dry runs and tests. Holds every row, including rows of other
//! pipelines, so scoping behaves the same as against SQLite.

use super::{DriveTableGateway, PipelineScope};
use async_trait::async_trait;
use chrono::NaiveDate;
use dtr_common::{ContinuityCheck, DriveRecord, Error, Result};
use std::collections::BTreeSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard};

pub struct MemoryGateway {
    scope: PipelineScope,
    records: Mutex<Vec<DriveRecord>>,
    writes: AtomicUsize,
}

impl MemoryGateway {
    pub fn new(scope: PipelineScope) -> Self {
        Self::with_records(scope, Vec::new())
    }

    /// Seed the table with existing rows
    pub fn with_records(scope: PipelineScope, records: Vec<DriveRecord>) -> Self {
        Self {
            scope,
            records: Mutex::new(records),
            writes: AtomicUsize::new(0),
        }
    }

    /// Snapshot of every stored row, in insertion order
    pub fn records(&self) -> Vec<DriveRecord> {
        self.lock().map(|rows| rows.clone()).unwrap_or_default()
    }

    /// Number of delete or insert calls that changed at least one row
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    fn lock(&self) -> Result<MutexGuard<'_, Vec<DriveRecord>>> {
        self.records
            .lock()
            .map_err(|_| Error::Persistence("memory table mutex poisoned".to_string()))
    }

    fn scoped_days<F>(&self, keep: F) -> Result<BTreeSet<NaiveDate>>
    where
        F: Fn(&DriveRecord) -> bool,
    {
        let rows = self.lock()?;
        Ok(rows
            .iter()
            .filter(|&r| self.scope.contains(r) && keep(r))
            .filter_map(DriveRecord::target_date)
            .collect())
    }
}

#[async_trait]
impl DriveTableGateway for MemoryGateway {
    async fn query_unverified_records(&self) -> Result<Vec<DriveRecord>> {
        let rows = self.lock()?;
        Ok(rows
            .iter()
            .filter(|&r| self.scope.contains(r) && r.continuity_check() == Some(ContinuityCheck::No))
            .cloned()
            .collect())
    }

    async fn query_verified_days(&self) -> Result<BTreeSet<NaiveDate>> {
        self.scoped_days(DriveRecord::is_verified)
    }

    async fn query_max_target_day(&self) -> Result<Option<NaiveDate>> {
        Ok(self.scoped_days(|_| true)?.last().copied())
    }

    async fn query_day_records(&self, day: NaiveDate) -> Result<Vec<DriveRecord>> {
        let rows = self.lock()?;
        Ok(rows
            .iter()
            .filter(|&r| self.scope.contains(r) && r.target_date() == Some(day))
            .cloned()
            .collect())
    }

    async fn delete_exact(&self, record: &DriveRecord) -> Result<u64> {
        let mut rows = self.lock()?;
        let before = rows.len();
        rows.retain(|r| r != record);
        let deleted = (before - rows.len()) as u64;
        if deleted > 0 {
            self.writes.fetch_add(1, Ordering::SeqCst);
        }
        Ok(deleted)
    }

    async fn insert_one(&self, record: &DriveRecord) -> Result<()> {
        self.lock()?.push(record.clone());
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn insert_many(&self, records: &[DriveRecord]) -> Result<u64> {
        if records.is_empty() {
            return Ok(0);
        }
        self.lock()?.extend_from_slice(records);
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(records.len() as u64)
    }
}
