//! # Report Submission & Sync
//!
//! Offline-first delivery of off-site task reports.
//!
//! ## Overview
//!
//! - [`SubmissionClient`]: remote boundary with a closed [`UploadError`] union
//! - [`ReportSubmitter`]: deliver now, or queue on transient failure
//! - [`DrainEngine`]: one pass over the queue with per-item classification
//! - [`SyncWorker`]: scheduled drain returning [`BatchResult`]
//! - [`ManualSyncTrigger`]: "sync now" with a human-readable count
//! - [`SyncScheduler`]: unique deferred work with network constraint and
//!   exponential backoff
//! - [`OrphanSweeper`]: image cache clearing that spares queued reports
//!
//! ## Workflow
//!
//! ```text
//! submit ─> prepare image ─> upload ─┬─ delivered ─────────> Success
//!                                    ├─ terminal ──────────> Rejected
//!                                    └─ transient ─> queue ─> QueuedOffline
//!                                                      │
//!                      scheduler / "sync now" ─> drain ┘
//! ```

pub mod cleanup;
pub mod client;
pub mod drain;
pub mod error;
pub mod manual;
pub mod scheduler;
pub mod submitter;
pub mod worker;

pub use cleanup::{OrphanSweeper, SweepReport};
pub use client::{
    HttpSubmissionClient, ImagePayload, SubmissionClient, SubmittedReport, TokenProvider,
    UploadError, UploadReceipt,
};
pub use drain::{DrainEngine, SyncOutcome};
pub use error::{Result, SyncError};
pub use manual::{ManualSyncReport, ManualSyncTrigger};
pub use scheduler::SyncScheduler;
pub use submitter::{ReportSubmitter, SubmitResult, PHOTO_REQUIRED};
pub use worker::{BatchResult, SyncWorker};
