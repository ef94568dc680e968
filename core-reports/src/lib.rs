//! # Pending Report Store
//!
//! Durable queue of off-site task reports whose delivery failed transiently.
//!
//! ## Overview
//!
//! - One SQLite table, `pending_reports`, keyed by an auto-assigned local id
//! - `(destination, description, address)` is unique, so the same logical
//!   report is never queued twice
//! - Deleting a report removes its image file first, then the row. A row
//!   whose file is gone is a recoverable state; the sync drain drops it.
//! - A per-row in-flight marker keeps two drains from uploading the same
//!   report at once
//!
//! ## Usage
//!
//! ```rust,ignore
//! use core_reports::{create_pool, DatabaseConfig, ReportStore, SqliteReportStore};
//!
//! let pool = create_pool(DatabaseConfig::new("tugas_luar.db")).await?;
//! let store = SqliteReportStore::new(pool);
//! let pending = store.list_all().await?;
//! ```

pub mod db;
pub mod error;
pub mod models;
pub mod store;

pub use db::{create_pool, create_test_pool, health_check, DatabaseConfig};
pub use error::{ReportError, Result};
pub use models::{Report, ReportFields};
pub use store::{ReportStore, SqliteReportStore};
