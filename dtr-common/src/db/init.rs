//! Database initialization
//!
//! Opens (or creates) the SQLite file holding the drive table and makes sure
//! the table and its scope index exist. Safe to call on every run.

use crate::config::validate_table_name;
use crate::Result;
use sqlx::{sqlite::SqlitePoolOptions, SqlitePool};
use std::path::Path;
use tracing::info;

/// Open the database file, creating it and the drive table if needed
pub async fn init_database(db_path: &Path, table: &str) -> Result<SqlitePool> {
    let newly_created = !db_path.exists();

    // Create parent directory if it doesn't exist
    if let Some(parent) = db_path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let db_url = format!("sqlite://{}?mode=rwc", db_path.display());
    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect(&db_url)
        .await?;

    if newly_created {
        info!("Initialized new database: {}", db_path.display());
    } else {
        info!("Opened existing database: {}", db_path.display());
    }

    // WAL lets readers (downstream jobs) proceed while a run writes
    sqlx::query("PRAGMA journal_mode = WAL")
        .execute(&pool)
        .await?;

    // Short busy timeout; longer waits are handled by retry_on_lock
    sqlx::query("PRAGMA busy_timeout = 250")
        .execute(&pool)
        .await?;

    create_drive_table(&pool, table).await?;

    Ok(pool)
}

/// Private in-memory database with the drive table (tests, dry runs).
///
/// Single connection: every `:memory:` connection is a separate database.
pub async fn init_memory_database(table: &str) -> Result<SqlitePool> {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await?;
    create_drive_table(&pool, table).await?;
    Ok(pool)
}

/// Create the drive table and its scope index
///
/// No primary key: an interrupted rebuild may leave duplicate rows that a
/// later run repairs via exact deletes.
pub async fn create_drive_table(pool: &SqlitePool, table: &str) -> Result<()> {
    validate_table_name(table)?;

    sqlx::query(&format!(
        r#"
        CREATE TABLE IF NOT EXISTS {table} (
            pipeline_id TEXT,
            pipeline_name TEXT NOT NULL,
            source_complete_category TEXT NOT NULL,
            stage_complete_category TEXT,
            target_complete_category TEXT,
            pipeline_priority REAL NOT NULL,
            target_day TEXT,
            window_start_time TEXT,
            window_end_time TEXT,
            time_interval TEXT,
            pipeline_status TEXT,
            continuity_check_performed TEXT NOT NULL DEFAULT 'NO',
            can_access_historical_data TEXT,
            record_first_created_time TEXT,
            record_last_updated_time TEXT,
            attributes TEXT
        )
        "#,
        table = table
    ))
    .execute(pool)
    .await?;

    sqlx::query(&format!(
        r#"
        CREATE INDEX IF NOT EXISTS idx_{table}_scope_day
        ON {table} (pipeline_name, source_complete_category, pipeline_priority, target_day)
        "#,
        table = table
    ))
    .execute(pool)
    .await?;

    Ok(())
}
