//! Pipeline identity and derived record columns
//!
//! One drive table may be shared by several pipelines. Every row carries the
//! `(pipeline_name, source_complete_category, pipeline_priority)` triple and
//! all reads are filtered by it. The category columns and the pipeline id are
//! derived from the identity and the window start, so regenerating a window
//! always yields the same values.

use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Static description of the pipeline that owns a slice of the drive table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineIdentity {
    pub name: String,
    pub index_group: String,
    pub index_name: String,
    pub index_id: String,
    pub priority: f64,
    pub can_access_historical_data: bool,
    pub s3_bucket: String,
    pub s3_prefix_list: Vec<String>,
    pub target_database: String,
    pub target_schema: String,
    pub target_table: String,
}

impl PipelineIdentity {
    /// Minimal identity (tests, dry runs)
    pub fn named(name: &str) -> Self {
        Self {
            name: name.to_string(),
            index_group: "default".to_string(),
            index_name: name.to_string(),
            index_id: name.to_string(),
            priority: 1.0,
            can_access_historical_data: true,
            s3_bucket: String::new(),
            s3_prefix_list: Vec::new(),
            target_database: String::new(),
            target_schema: String::new(),
            target_table: String::new(),
        }
    }

    /// `"<index_group>|<index_name>"`
    pub fn source_category(&self) -> String {
        format!("{}|{}", self.index_group, self.index_name)
    }

    /// `"<bucket>|s3://<bucket>/<prefix>/<YYYY-MM-DD>/<HH-mm>/<index_id>_****.json"`
    pub fn stage_category(&self, window_start: &DateTime<FixedOffset>) -> String {
        format!(
            "{bucket}|s3://{bucket}/{prefix}/{date}/{time}/{index_id}_****.json",
            bucket = self.s3_bucket,
            prefix = self.s3_prefix_list.join("/"),
            date = window_start.format("%Y-%m-%d"),
            time = window_start.format("%H-%M"),
            index_id = self.index_id,
        )
    }

    /// `"<database>.<schema>.<table>|<prefix>/<YYYY-MM-DD>/<HH-mm>/"`
    pub fn target_category(&self, window_start: &DateTime<FixedOffset>) -> String {
        format!(
            "{}.{}.{}|{}/{}/{}/",
            self.target_database,
            self.target_schema,
            self.target_table,
            self.s3_prefix_list.join("/"),
            window_start.format("%Y-%m-%d"),
            window_start.format("%H-%M"),
        )
    }

    /// SHA-256 over the identity, categories and window bounds, hex encoded
    pub fn pipeline_id(
        &self,
        window_start: &DateTime<FixedOffset>,
        window_end: &DateTime<FixedOffset>,
    ) -> String {
        let input = [
            self.name.clone(),
            self.source_category(),
            self.stage_category(window_start),
            self.target_category(window_start),
            window_start.to_rfc3339(),
            window_end.to_rfc3339(),
        ]
        .join("|");
        format!("{:x}", Sha256::digest(input.as_bytes()))
    }
}
