//! Configuration loading and validation
//!
//! Two layers:
//! 1. [`TomlConfig`]: raw file contents, strings as written by the operator
//! 2. [`ReconciliationConfig`]: validated values the reconciler runs on
//!
//! Validation happens before any database access. A bad duration string or a
//! granularity that does not divide a day aborts the run up front.
//!
//! Config file resolution order:
//! 1. Command-line argument (highest priority)
//! 2. `DTR_CONFIG` environment variable
//! 3. User config dir (`~/.config/dtr/dtr.toml` on Linux)
//! 4. `/etc/dtr/dtr.toml` (Linux only)

use crate::human_time::parse_duration;
use crate::pipeline::PipelineIdentity;
use crate::windows::validate_granularity;
use crate::{Error, Result};
use chrono::Duration;
use chrono_tz::Tz;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Environment variable naming the config file
pub const CONFIG_ENV_VAR: &str = "DTR_CONFIG";

/// Raw configuration file
#[derive(Debug, Clone, Deserialize)]
pub struct TomlConfig {
    /// SQLite database holding the drive table
    #[serde(default)]
    pub database_path: Option<PathBuf>,

    #[serde(default)]
    pub logging: LoggingConfig,

    #[serde(default)]
    pub reconcile: ReconcileSection,

    pub pipeline: PipelineSection,
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

/// `[reconcile]` table
#[derive(Debug, Clone, Deserialize)]
pub struct ReconcileSection {
    #[serde(default = "default_granularity")]
    pub granularity: String,

    #[serde(default = "default_lookback")]
    pub lookback: String,

    /// IANA timezone name
    #[serde(default = "default_timezone")]
    pub timezone: String,

    #[serde(default = "default_table")]
    pub table: String,

    /// Upper bound for retrying "database is locked" errors
    #[serde(default = "default_max_lock_wait_ms")]
    pub max_lock_wait_ms: u64,
}

impl Default for ReconcileSection {
    fn default() -> Self {
        Self {
            granularity: default_granularity(),
            lookback: default_lookback(),
            timezone: default_timezone(),
            table: default_table(),
            max_lock_wait_ms: default_max_lock_wait_ms(),
        }
    }
}

/// `[pipeline]` table
#[derive(Debug, Clone, Deserialize)]
pub struct PipelineSection {
    pub name: String,
    pub index_group: String,
    pub index_name: String,
    #[serde(default)]
    pub index_id: String,
    #[serde(default = "default_priority")]
    pub priority: f64,
    #[serde(default = "default_historical_access")]
    pub can_access_historical_data: String,
    #[serde(default)]
    pub s3_bucket: String,
    #[serde(default)]
    pub s3_prefix_list: Vec<String>,
    #[serde(default)]
    pub target_database: String,
    #[serde(default)]
    pub target_schema: String,
    #[serde(default)]
    pub target_table: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_granularity() -> String {
    "1h".to_string()
}

fn default_lookback() -> String {
    "1d".to_string()
}

fn default_timezone() -> String {
    "UTC".to_string()
}

fn default_table() -> String {
    "drive_table".to_string()
}

fn default_max_lock_wait_ms() -> u64 {
    5000
}

fn default_priority() -> f64 {
    1.0
}

fn default_historical_access() -> String {
    "YES".to_string()
}

/// Validated reconciliation settings
#[derive(Debug, Clone)]
pub struct ReconciliationConfig {
    pub granularity: Duration,
    pub lookback: Duration,
    pub timezone: Tz,
    pub table: String,
    pub max_lock_wait_ms: u64,
    pub pipeline: PipelineIdentity,
}

impl ReconciliationConfig {
    /// Validate a raw config file
    pub fn from_toml(config: &TomlConfig) -> Result<Self> {
        let granularity = parse_duration(&config.reconcile.granularity)?;
        validate_granularity(granularity)?;
        let lookback = parse_duration(&config.reconcile.lookback)?;

        let timezone: Tz = config.reconcile.timezone.trim().parse().map_err(|e| {
            Error::Config(format!(
                "unknown timezone '{}': {}",
                config.reconcile.timezone, e
            ))
        })?;

        validate_table_name(&config.reconcile.table)?;

        let section = &config.pipeline;
        if section.name.trim().is_empty() {
            return Err(Error::Config("pipeline.name must not be empty".to_string()));
        }
        let can_access_historical_data =
            match section.can_access_historical_data.trim().to_ascii_uppercase().as_str() {
                "YES" => true,
                "NO" => false,
                other => {
                    return Err(Error::Config(format!(
                        "pipeline.can_access_historical_data must be YES or NO, got '{}'",
                        other
                    )))
                }
            };

        let pipeline = PipelineIdentity {
            name: section.name.clone(),
            index_group: section.index_group.clone(),
            index_name: section.index_name.clone(),
            index_id: section.index_id.clone(),
            priority: section.priority,
            can_access_historical_data,
            s3_bucket: section.s3_bucket.clone(),
            s3_prefix_list: section.s3_prefix_list.clone(),
            target_database: section.target_database.clone(),
            target_schema: section.target_schema.clone(),
            target_table: section.target_table.clone(),
        };

        debug!(
            granularity = %config.reconcile.granularity,
            lookback = %config.reconcile.lookback,
            timezone = %timezone.name(),
            table = %config.reconcile.table,
            "Reconciliation config validated"
        );

        Ok(Self {
            granularity,
            lookback,
            timezone,
            table: config.reconcile.table.clone(),
            max_lock_wait_ms: config.reconcile.max_lock_wait_ms,
            pipeline,
        })
    }
}

/// Table names are interpolated into SQL, so only plain identifiers pass
pub fn validate_table_name(table: &str) -> Result<()> {
    let mut chars = table.chars();
    let valid = match chars.next() {
        Some(first) if first.is_ascii_alphabetic() || first == '_' => {
            chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        }
        _ => false,
    };

    if valid {
        Ok(())
    } else {
        Err(Error::Config(format!(
            "table name '{}' is not a plain SQL identifier",
            table
        )))
    }
}

/// Parse a TOML config from a string
pub fn parse_toml_config(content: &str) -> Result<TomlConfig> {
    toml::from_str(content).map_err(|e| Error::Config(format!("Parse TOML failed: {}", e)))
}

/// Read and parse a TOML config file
pub fn load_toml_config(path: &Path) -> Result<TomlConfig> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("Read {} failed: {}", path.display(), e)))?;
    parse_toml_config(&content)
}

/// Resolve which config file to read
pub fn resolve_config_path(cli_arg: Option<&Path>) -> Result<PathBuf> {
    // Priority 1: Command-line argument
    if let Some(path) = cli_arg {
        return Ok(path.to_path_buf());
    }

    // Priority 2: Environment variable
    if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
        if !path.trim().is_empty() {
            return Ok(PathBuf::from(path));
        }
    }

    // Priority 3: User config directory
    if let Some(path) = dirs::config_dir().map(|d| d.join("dtr").join("dtr.toml")) {
        if path.exists() {
            return Ok(path);
        }
    }

    // Priority 4: System-wide config
    if cfg!(target_os = "linux") {
        let system_config = PathBuf::from("/etc/dtr/dtr.toml");
        if system_config.exists() {
            return Ok(system_config);
        }
    }

    Err(Error::Config(format!(
        "No config file found (pass --config or set {})",
        CONFIG_ENV_VAR
    )))
}
