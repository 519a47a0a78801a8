//! SQLite drive table gateway

use super::{DriveTableGateway, PipelineScope};
use crate::utils::retry_on_lock;
use async_trait::async_trait;
use chrono::NaiveDate;
use dtr_common::config::validate_table_name;
use dtr_common::db::{parse_target_day, DRIVE_COLUMNS};
use dtr_common::{DriveRecord, Result};
use sqlx::query::Query;
use sqlx::sqlite::{Sqlite, SqliteArguments};
use sqlx::SqlitePool;
use std::collections::BTreeSet;
use tracing::{debug, warn};

const SCOPE_FILTER: &str =
    "pipeline_name = ? AND source_complete_category = ? AND pipeline_priority = ?";

/// Gateway over one drive table in a SQLite database
pub struct SqliteGateway {
    pool: SqlitePool,
    table: String,
    scope: PipelineScope,
    max_lock_wait_ms: u64,
}

impl SqliteGateway {
    pub fn new(
        pool: SqlitePool,
        table: &str,
        scope: PipelineScope,
        max_lock_wait_ms: u64,
    ) -> Result<Self> {
        validate_table_name(table)?;
        Ok(Self {
            pool,
            table: table.to_string(),
            scope,
            max_lock_wait_ms,
        })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    fn bind_scope<'q>(
        &'q self,
        query: Query<'q, Sqlite, SqliteArguments<'q>>,
    ) -> Query<'q, Sqlite, SqliteArguments<'q>> {
        query
            .bind(self.scope.pipeline_name.as_str())
            .bind(self.scope.source_complete_category.as_str())
            .bind(self.scope.pipeline_priority)
    }

    fn select_sql(&self, extra_filter: &str) -> String {
        format!(
            "SELECT {} FROM {} WHERE {} AND {}",
            DRIVE_COLUMNS.join(", "),
            self.table,
            SCOPE_FILTER,
            extra_filter
        )
    }

    fn insert_sql(&self) -> String {
        let placeholders = vec!["?"; DRIVE_COLUMNS.len()].join(", ");
        format!(
            "INSERT INTO {} ({}) VALUES ({})",
            self.table,
            DRIVE_COLUMNS.join(", "),
            placeholders
        )
    }

    fn delete_exact_sql(&self) -> String {
        // IS is SQLite's null-safe equality
        let conditions = DRIVE_COLUMNS
            .iter()
            .map(|column| format!("{} IS ?", column))
            .collect::<Vec<_>>()
            .join(" AND ");
        format!("DELETE FROM {} WHERE {}", self.table, conditions)
    }

    /// Distinct raw target_day values matching `extra_filter`, parsed and
    /// with unparseable values skipped
    async fn fetch_days(&self, extra_filter: &str) -> Result<BTreeSet<NaiveDate>> {
        let sql = format!(
            "SELECT DISTINCT target_day FROM {} WHERE {} AND {} AND target_day IS NOT NULL",
            self.table, SCOPE_FILTER, extra_filter
        );
        let raw_days: Vec<String> = sqlx::query_scalar(&sql)
            .bind(self.scope.pipeline_name.as_str())
            .bind(self.scope.source_complete_category.as_str())
            .bind(self.scope.pipeline_priority)
            .fetch_all(&self.pool)
            .await?;

        let mut days = BTreeSet::new();
        for raw in raw_days {
            match parse_target_day(&raw) {
                Some(day) => {
                    days.insert(day);
                }
                None => warn!(target_day = %raw, "Ignoring unparseable target_day"),
            }
        }
        Ok(days)
    }
}

/// Bind every column of `record` in [`DRIVE_COLUMNS`] order
fn bind_record<'q>(
    query: Query<'q, Sqlite, SqliteArguments<'q>>,
    record: &'q DriveRecord,
) -> Query<'q, Sqlite, SqliteArguments<'q>> {
    query
        .bind(record.pipeline_id.as_deref())
        .bind(record.pipeline_name.as_str())
        .bind(record.source_complete_category.as_str())
        .bind(record.stage_complete_category.as_deref())
        .bind(record.target_complete_category.as_deref())
        .bind(record.pipeline_priority)
        .bind(record.target_day.as_deref())
        .bind(record.window_start_time.as_deref())
        .bind(record.window_end_time.as_deref())
        .bind(record.time_interval.as_deref())
        .bind(record.pipeline_status.as_deref())
        .bind(record.continuity_check_performed.as_str())
        .bind(record.can_access_historical_data.as_deref())
        .bind(record.record_first_created_time.as_deref())
        .bind(record.record_last_updated_time.as_deref())
        .bind(record.attributes.as_deref())
}

#[async_trait]
impl DriveTableGateway for SqliteGateway {
    async fn query_unverified_records(&self) -> Result<Vec<DriveRecord>> {
        let sql = self.select_sql(
            "UPPER(TRIM(continuity_check_performed)) = 'NO' ORDER BY target_day, window_start_time",
        );
        let rows = self.bind_scope(sqlx::query(&sql)).fetch_all(&self.pool).await?;
        let records = rows
            .iter()
            .map(DriveRecord::from_row)
            .collect::<Result<Vec<_>>>()?;
        debug!(count = records.len(), "Fetched unverified records");
        Ok(records)
    }

    async fn query_verified_days(&self) -> Result<BTreeSet<NaiveDate>> {
        self.fetch_days("UPPER(TRIM(continuity_check_performed)) = 'YES'")
            .await
    }

    async fn query_max_target_day(&self) -> Result<Option<NaiveDate>> {
        Ok(self.fetch_days("1 = 1").await?.last().copied())
    }

    async fn query_day_records(&self, day: NaiveDate) -> Result<Vec<DriveRecord>> {
        // Both stored forms ("2025-01-15" and timestamps) start with the date;
        // the prefix match narrows the scan and parse_target_day decides
        let sql = self.select_sql("TRIM(target_day) LIKE ? ORDER BY window_start_time");
        let prefix = format!("{}%", day.format("%Y-%m-%d"));
        let rows = self
            .bind_scope(sqlx::query(&sql))
            .bind(prefix.as_str())
            .fetch_all(&self.pool)
            .await?;

        let mut records = Vec::with_capacity(rows.len());
        for row in &rows {
            let record = DriveRecord::from_row(row)?;
            if record.target_date() == Some(day) {
                records.push(record);
            }
        }
        Ok(records)
    }

    async fn delete_exact(&self, record: &DriveRecord) -> Result<u64> {
        let sql = self.delete_exact_sql();
        let pool = &self.pool;
        let deleted = retry_on_lock("delete_exact", self.max_lock_wait_ms, || {
            let sql = sql.as_str();
            async move {
                let result = bind_record(sqlx::query(sql), record).execute(pool).await?;
                Ok(result.rows_affected())
            }
        })
        .await?;
        debug!(pipeline_id = %record.label(), deleted, "Exact delete");
        Ok(deleted)
    }

    async fn insert_one(&self, record: &DriveRecord) -> Result<()> {
        let sql = self.insert_sql();
        let pool = &self.pool;
        retry_on_lock("insert_one", self.max_lock_wait_ms, || {
            let sql = sql.as_str();
            async move {
                bind_record(sqlx::query(sql), record).execute(pool).await?;
                Ok(())
            }
        })
        .await
    }

    async fn insert_many(&self, records: &[DriveRecord]) -> Result<u64> {
        if records.is_empty() {
            return Ok(0);
        }

        let sql = self.insert_sql();
        let pool = &self.pool;
        let inserted = retry_on_lock("insert_many", self.max_lock_wait_ms, || {
            let sql = sql.as_str();
            async move {
                let mut tx = pool.begin().await?;
                let mut inserted = 0u64;
                for record in records {
                    inserted += bind_record(sqlx::query(sql), record)
                        .execute(&mut *tx)
                        .await?
                        .rows_affected();
                }
                tx.commit().await?;
                Ok(inserted)
            }
        })
        .await?;
        debug!(inserted, "Bulk insert committed");
        Ok(inserted)
    }
}
