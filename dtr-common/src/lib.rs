//! # DTR Common Library
//!
//! Shared code for the drive table reconciliation crates:
//! - Error type and result alias
//! - Compact duration strings ("1h", "1d2h30m")
//! - Clock and required-day arithmetic
//! - Configuration loading and validation
//! - Drive table row model and schema
//! - Window generation, gap detection, record classification

pub mod classify;
pub mod config;
pub mod db;
pub mod error;
pub mod gaps;
pub mod human_time;
pub mod pipeline;
pub mod time;
pub mod windows;

pub use classify::{classify, Branch, Classification};
pub use config::ReconciliationConfig;
pub use db::{ContinuityCheck, DriveRecord};
pub use error::{Error, Result};
pub use gaps::find_missing_days;
pub use windows::{generate_day_windows, RecordTemplate, Window};
