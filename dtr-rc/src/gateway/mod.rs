//! Persistence gateway
//!
//! The reconciler only talks to storage through [`DriveTableGateway`]. Every
//! call is scoped to one pipeline (see [`PipelineScope`]); rows owned by other
//! pipelines sharing the table are never read or written.
//!
//! Delete-then-insert is not atomic across calls. A crash between the two
//! leaves a gap that the next run detects and repairs.

use async_trait::async_trait;
use chrono::NaiveDate;
use dtr_common::pipeline::PipelineIdentity;
use dtr_common::{DriveRecord, Result};
use std::collections::BTreeSet;

pub mod memory;
pub mod sqlite;

pub use memory::MemoryGateway;
pub use sqlite::SqliteGateway;

/// Key triple that partitions a drive table between pipelines
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineScope {
    pub pipeline_name: String,
    pub source_complete_category: String,
    pub pipeline_priority: f64,
}

impl PipelineScope {
    pub fn from_identity(pipeline: &PipelineIdentity) -> Self {
        Self {
            pipeline_name: pipeline.name.clone(),
            source_complete_category: pipeline.source_category(),
            pipeline_priority: pipeline.priority,
        }
    }

    pub fn contains(&self, record: &DriveRecord) -> bool {
        record.pipeline_name == self.pipeline_name
            && record.source_complete_category == self.source_complete_category
            && record.pipeline_priority == self.pipeline_priority
    }
}

/// Storage operations the reconciler relies on
#[async_trait]
pub trait DriveTableGateway: Send + Sync {
    /// All records whose continuity flag is `NO`
    async fn query_unverified_records(&self) -> Result<Vec<DriveRecord>>;

    /// Distinct parseable target days among verified records
    async fn query_verified_days(&self) -> Result<BTreeSet<NaiveDate>>;

    /// Latest parseable target day across all records, `None` if there are none
    async fn query_max_target_day(&self) -> Result<Option<NaiveDate>>;

    /// All records whose target day parses to `day`, whatever form it is stored in
    async fn query_day_records(&self, day: NaiveDate) -> Result<Vec<DriveRecord>>;

    /// Delete rows equal to `record` in every column; zero rows is not an error
    async fn delete_exact(&self, record: &DriveRecord) -> Result<u64>;

    /// Insert one record
    async fn insert_one(&self, record: &DriveRecord) -> Result<()>;

    /// Insert records in order as a single unit
    async fn insert_many(&self, records: &[DriveRecord]) -> Result<u64>;
}
