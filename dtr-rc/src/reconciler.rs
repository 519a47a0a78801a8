//! Reconciliation run
//!
//! One run executes up to four steps in order:
//!
//! 1. Repair every unverified record, then stop. Continuity problems always
//!    win over forward filling.
//! 2. Compute the required day from the clock, lookback and timezone.
//! 3. Tile every day missing between the earliest verified day and the
//!    required day.
//! 4. Tile the required day when the table has not reached it yet.
//!
//! Failures inside a unit of work (one record in step 1, one day in steps 3
//! and 4) are recorded in the [`RunSummary`] and the run moves on. Failed
//! reads outside those units abort the run, since later decisions would rest
//! on partial data.

use crate::gateway::DriveTableGateway;
use chrono::NaiveDate;
use dtr_common::classify::{classify, Branch};
use dtr_common::time::{required_day, Clock, SystemClock};
use dtr_common::windows::{generate_day_windows, rebuild_window_record, RecordTemplate};
use dtr_common::{find_missing_days, DriveRecord, ReconciliationConfig, Result};
use serde::Serialize;
use std::collections::{BTreeSet, HashSet};
use std::sync::Arc;
use tracing::{debug, info, info_span, warn, Instrument};
use uuid::Uuid;

/// Which half of the decision tree a run took
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunOutcome {
    /// Unverified records existed; only step 1 ran
    ContinuityRepair,
    /// Steps 2 to 4 ran
    ForwardFill,
}

/// An unverified record that could not be repaired
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FailedRecord {
    pub pipeline_id: Option<String>,
    pub target_day: Option<String>,
    pub error: String,
}

/// A day whose tiling could not be written
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FailedDay {
    pub day: NaiveDate,
    pub error: String,
}

/// Report of one run
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub run_id: Uuid,
    pub outcome: RunOutcome,
    /// `None` when the run stopped after continuity repair
    pub required_day: Option<NaiveDate>,
    pub unverified_records: usize,
    pub single_record_rebuilds: usize,
    pub full_day_rebuilds: usize,
    pub full_day_creations: usize,
    pub gap_days_filled: Vec<NaiveDate>,
    pub required_day_created: bool,
    pub records_inserted: u64,
    pub records_deleted: u64,
    pub failed_records: Vec<FailedRecord>,
    pub failed_days: Vec<FailedDay>,
}

impl RunSummary {
    fn new(run_id: Uuid, outcome: RunOutcome) -> Self {
        Self {
            run_id,
            outcome,
            required_day: None,
            unverified_records: 0,
            single_record_rebuilds: 0,
            full_day_rebuilds: 0,
            full_day_creations: 0,
            gap_days_filled: Vec::new(),
            required_day_created: false,
            records_inserted: 0,
            records_deleted: 0,
            failed_records: Vec::new(),
            failed_days: Vec::new(),
        }
    }

    /// True when no record or day failed
    pub fn is_clean(&self) -> bool {
        self.failed_records.is_empty() && self.failed_days.is_empty()
    }

    /// Total inserts and deletes
    pub fn writes(&self) -> u64 {
        self.records_inserted + self.records_deleted
    }
}

struct RepairResult {
    branch: Branch,
    deleted: u64,
    inserted: u64,
}

/// Drives one pipeline's drive table toward a complete verified tiling
pub struct Reconciler<G> {
    gateway: G,
    config: ReconciliationConfig,
    clock: Arc<dyn Clock>,
}

impl<G: DriveTableGateway> Reconciler<G> {
    pub fn new(gateway: G, config: ReconciliationConfig) -> Self {
        Self {
            gateway,
            config,
            clock: Arc::new(SystemClock),
        }
    }

    /// Replace the wall clock (backfills, tests)
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn gateway(&self) -> &G {
        &self.gateway
    }

    pub fn config(&self) -> &ReconciliationConfig {
        &self.config
    }

    /// Execute one reconciliation run
    pub async fn run(&self) -> Result<RunSummary> {
        let run_id = Uuid::new_v4();
        let span = info_span!(
            "reconcile",
            %run_id,
            pipeline = %self.config.pipeline.name
        );
        self.run_steps(run_id).instrument(span).await
    }

    async fn run_steps(&self, run_id: Uuid) -> Result<RunSummary> {
        let now = self.clock.now();
        let template = RecordTemplate {
            pipeline: self.config.pipeline.clone(),
            granularity: self.config.granularity,
            timezone: self.config.timezone,
            stamped_at: now.with_timezone(&self.config.timezone).fixed_offset(),
        };

        // Step 1
        let unverified = self.gateway.query_unverified_records().await?;
        if !unverified.is_empty() {
            let mut summary = RunSummary::new(run_id, RunOutcome::ContinuityRepair);
            summary.unverified_records = unverified.len();
            info!(records = unverified.len(), "Unverified records found, repairing");

            let verified_days = self.gateway.query_verified_days().await?;
            for record in &unverified {
                self.repair_one(record, &verified_days, &template, &mut summary)
                    .await;
            }

            info!(
                single_record_rebuilds = summary.single_record_rebuilds,
                full_day_rebuilds = summary.full_day_rebuilds,
                full_day_creations = summary.full_day_creations,
                failed = summary.failed_records.len(),
                "Continuity repair finished"
            );
            return Ok(summary);
        }

        // Step 2
        let mut summary = RunSummary::new(run_id, RunOutcome::ForwardFill);
        let required = required_day(now, self.config.lookback, self.config.timezone);
        summary.required_day = Some(required);
        debug!(%now, required_day = %required, "Required day computed");

        // Step 3
        let verified_days = self.gateway.query_verified_days().await?;
        let missing = find_missing_days(&verified_days, required);
        if !missing.is_empty() {
            info!(days = missing.len(), "Filling gap days");
        }
        for day in missing {
            match self.tile_day(day, &template).await {
                Ok(inserted) => {
                    summary.records_inserted += inserted;
                    summary.gap_days_filled.push(day);
                    info!(target_day = %day, records = inserted, "Gap day filled");
                }
                Err(e) => {
                    warn!(target_day = %day, error = %e, "Gap day failed");
                    summary.failed_days.push(FailedDay {
                        day,
                        error: e.to_string(),
                    });
                }
            }
        }

        // Step 4
        let max_day = self.gateway.query_max_target_day().await?;
        match max_day {
            Some(max) if max >= required => {
                debug!(max_target_day = %max, required_day = %required, "Table is current");
            }
            _ => match self.tile_day(required, &template).await {
                Ok(inserted) => {
                    summary.records_inserted += inserted;
                    summary.required_day_created = true;
                    info!(target_day = %required, records = inserted, "Required day created");
                }
                Err(e) => {
                    warn!(target_day = %required, error = %e, "Required day creation failed");
                    summary.failed_days.push(FailedDay {
                        day: required,
                        error: e.to_string(),
                    });
                }
            },
        }

        info!(
            required_day = %required,
            gap_days = summary.gap_days_filled.len(),
            records_inserted = summary.records_inserted,
            failed_days = summary.failed_days.len(),
            "Forward fill finished"
        );
        Ok(summary)
    }

    async fn repair_one(
        &self,
        record: &DriveRecord,
        verified_days: &BTreeSet<NaiveDate>,
        template: &RecordTemplate,
        summary: &mut RunSummary,
    ) {
        match self.repair_record(record, verified_days, template).await {
            Ok(result) => {
                summary.records_deleted += result.deleted;
                summary.records_inserted += result.inserted;
                match result.branch {
                    Branch::RebuildSingle => summary.single_record_rebuilds += 1,
                    Branch::RebuildFullDay => summary.full_day_rebuilds += 1,
                    Branch::CreateFullDay => summary.full_day_creations += 1,
                }
            }
            Err(e) => {
                warn!(
                    pipeline_id = %record.label(),
                    target_day = ?record.target_day,
                    error = %e,
                    "Record repair failed"
                );
                summary.failed_records.push(FailedRecord {
                    pipeline_id: record.pipeline_id.clone(),
                    target_day: record.target_day.clone(),
                    error: e.to_string(),
                });
            }
        }
    }

    /// Classify and repair one unverified record.
    ///
    /// Everything that can be validated is validated before the delete, so a
    /// rejected record stays in the table untouched.
    async fn repair_record(
        &self,
        record: &DriveRecord,
        verified_days: &BTreeSet<NaiveDate>,
        template: &RecordTemplate,
    ) -> Result<RepairResult> {
        let classification = classify(record, verified_days)?;
        let day = classification.target_day;
        debug!(
            pipeline_id = %record.label(),
            target_day = %day,
            branch = %classification.branch,
            "Record classified"
        );

        match classification.branch {
            Branch::RebuildSingle => {
                let rebuilt = rebuild_window_record(record, template)?;
                let deleted = self.gateway.delete_exact(record).await?;
                let present = self.present_windows(day).await?;
                let inserted = if window_key(&rebuilt).is_some_and(|key| present.contains(&key)) {
                    debug!(target_day = %day, "Window already verified, not reinserting");
                    0
                } else {
                    self.gateway.insert_one(&rebuilt).await?;
                    1
                };
                Ok(RepairResult {
                    branch: Branch::RebuildSingle,
                    deleted,
                    inserted,
                })
            }
            branch => {
                let deleted = self.gateway.delete_exact(record).await?;
                let inserted = self.tile_day(day, template).await?;
                Ok(RepairResult {
                    branch,
                    deleted,
                    inserted,
                })
            }
        }
    }

    /// Insert the verified tiling of `day`, skipping windows already stored
    /// as verified. Returns the number of rows inserted.
    async fn tile_day(&self, day: NaiveDate, template: &RecordTemplate) -> Result<u64> {
        let generated = generate_day_windows(day, template)?;
        let present = self.present_windows(day).await?;
        let missing: Vec<DriveRecord> = generated
            .into_iter()
            .filter(|r| window_key(r).map_or(true, |key| !present.contains(&key)))
            .collect();

        if missing.is_empty() {
            debug!(target_day = %day, "Day already tiled");
            return Ok(0);
        }
        self.gateway.insert_many(&missing).await
    }

    /// Verified windows stored for `day`, keyed by absolute bounds
    async fn present_windows(&self, day: NaiveDate) -> Result<HashSet<(i64, i64)>> {
        let records = self.gateway.query_day_records(day).await?;
        Ok(records
            .iter()
            .filter(|r| r.is_verified())
            .filter_map(window_key)
            .collect())
    }
}

/// Window bounds as epoch seconds, so offsets don't affect equality
fn window_key(record: &DriveRecord) -> Option<(i64, i64)> {
    Some((
        record.window_start()?.timestamp(),
        record.window_end()?.timestamp(),
    ))
}
