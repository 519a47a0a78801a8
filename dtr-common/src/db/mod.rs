//! Drive table schema and row model

pub mod init;
pub mod models;

pub use init::*;
pub use models::*;
