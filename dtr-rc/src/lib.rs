//! dtr-rc (Drive Table Reconciler)
//!
//! Keeps a pipeline's drive table continuously tiled with verified time
//! windows: repairs records that failed the continuity check, fills missing
//! days, and creates the most recent required day.

pub mod gateway;
pub mod reconciler;
pub mod utils;

pub use gateway::{DriveTableGateway, MemoryGateway, PipelineScope, SqliteGateway};
pub use reconciler::{FailedDay, FailedRecord, Reconciler, RunOutcome, RunSummary};
