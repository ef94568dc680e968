//! # Drain Engine
//!
//! One pass over every queued report, shared by the scheduled
//! [`SyncWorker`](crate::worker::SyncWorker) and the user-invoked
//! [`ManualSyncTrigger`](crate::manual::ManualSyncTrigger).
//!
//! ## Per-item handling
//!
//! 1. Claim the row. A row claimed by a concurrent drain is skipped.
//! 2. Photo gone from disk: drop the row, no network call.
//! 3. Upload.
//!    - Delivered: drop file and row.
//!    - Terminal rejection: drop file and row, count as rejected.
//!    - Network or transient server failure: release the claim and leave the
//!      row untouched; the pass asks for a retry.
//!
//! Items are independent. One item failing never stops the rest of the pass,
//! and items already resolved stay resolved if the process dies mid-pass.

use crate::client::{ImagePayload, SubmissionClient, UploadError};
use crate::error::Result;
use bridge_traits::time::Clock;
use core_reports::{Report, ReportStore};
use core_runtime::events::{CoreEvent, EventBus, SyncEvent};
use core_runtime::logging::strip_path;
use std::io::ErrorKind;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

/// Aggregate result of one drain pass. Not persisted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncOutcome {
    /// Items examined (excludes items skipped because another drain held them)
    pub attempted: u64,
    pub succeeded: u64,
    pub permanently_rejected: u64,
    /// Items dropped because their photo no longer existed
    pub missing_files: u64,
    /// Items left queued after a network or transient server failure
    pub transient_failures: u64,
    /// Items another drain was uploading
    pub skipped_in_flight: u64,
}

impl SyncOutcome {
    pub fn transiently_failed(&self) -> bool {
        self.transient_failures > 0
    }

    /// Whether a later pass could still change something: a transient
    /// failure, or a row held by another drain whose result is unknown here.
    pub fn needs_retry(&self) -> bool {
        self.transient_failures > 0 || self.skipped_in_flight > 0
    }

    /// Whether any item failed, terminally or not.
    pub fn had_failure(&self) -> bool {
        self.permanently_rejected > 0 || self.transient_failures > 0
    }

    /// Something was delivered, nothing failed and nothing was skipped.
    pub fn all_delivered(&self) -> bool {
        self.succeeded > 0 && !self.had_failure() && self.skipped_in_flight == 0
    }
}

enum ItemResult {
    Delivered,
    Rejected,
    MissingFile,
    Transient,
    Skipped,
}

/// Runs drain passes against a store and a submission client.
pub struct DrainEngine {
    store: Arc<dyn ReportStore>,
    client: Arc<dyn SubmissionClient>,
    events: EventBus,
    clock: Arc<dyn Clock>,
    claim_timeout: Duration,
}

impl DrainEngine {
    pub fn new(
        store: Arc<dyn ReportStore>,
        client: Arc<dyn SubmissionClient>,
        events: EventBus,
        clock: Arc<dyn Clock>,
        claim_timeout: Duration,
    ) -> Self {
        Self {
            store,
            client,
            events,
            clock,
            claim_timeout,
        }
    }

    pub async fn pending_count(&self) -> Result<i64> {
        Ok(self.store.count().await?)
    }

    /// Attempt delivery of every queued report once.
    ///
    /// # Errors
    ///
    /// Only when the queue cannot be read at all. Per-item failures are
    /// reflected in the returned [`SyncOutcome`].
    #[instrument(skip(self))]
    pub async fn drain(&self) -> Result<SyncOutcome> {
        let started = Instant::now();
        let run_id = Uuid::new_v4().to_string();
        let reports = self.store.list_all().await?;

        info!(run_id = %run_id, pending = reports.len(), "Draining report queue");
        self.emit(SyncEvent::Started {
            run_id: run_id.clone(),
            pending: reports.len() as u64,
        });

        let mut outcome = SyncOutcome::default();
        for report in &reports {
            match self.drain_item(report).await {
                ItemResult::Skipped => {
                    outcome.skipped_in_flight += 1;
                    continue;
                }
                ItemResult::Delivered => outcome.succeeded += 1,
                ItemResult::Rejected => outcome.permanently_rejected += 1,
                ItemResult::MissingFile => outcome.missing_files += 1,
                ItemResult::Transient => outcome.transient_failures += 1,
            }
            outcome.attempted += 1;
        }

        let duration_ms = started.elapsed().as_millis() as u64;
        info!(
            run_id = %run_id,
            attempted = outcome.attempted,
            succeeded = outcome.succeeded,
            rejected = outcome.permanently_rejected,
            missing_files = outcome.missing_files,
            transient = outcome.transient_failures,
            skipped = outcome.skipped_in_flight,
            duration_ms,
            "Drain finished"
        );
        self.emit(SyncEvent::Completed {
            run_id,
            attempted: outcome.attempted,
            succeeded: outcome.succeeded,
            rejected: outcome.permanently_rejected,
            missing_files: outcome.missing_files,
            transiently_failed: outcome.transient_failures,
            retry: outcome.needs_retry(),
            duration_ms,
        });

        Ok(outcome)
    }

    async fn drain_item(&self, report: &Report) -> ItemResult {
        let local_id = report.local_id;
        let now = self.clock.unix_timestamp_millis();

        match self.store.try_claim(local_id, now, self.claim_timeout).await {
            Ok(true) => {}
            Ok(false) => return ItemResult::Skipped,
            Err(e) => {
                warn!(local_id, error = %e, "Could not claim report");
                return ItemResult::Transient;
            }
        }

        let payload = match ImagePayload::from_path(report.image_path()).await {
            Ok(payload) => payload,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return self.drop_missing(report).await;
            }
            Err(e) => {
                warn!(local_id, file = %strip_path(&report.image_path), error = %e, "Could not read report image");
                self.release(local_id).await;
                return ItemResult::Transient;
            }
        };

        match self.client.upload(&report.fields(), payload).await {
            Ok(receipt) => {
                debug!(local_id, file_url = ?receipt.file_url, "Queued report delivered");
                if !self.remove(report).await {
                    return ItemResult::Transient;
                }
                self.emit(SyncEvent::ItemDelivered { local_id });
                ItemResult::Delivered
            }
            Err(UploadError::ServerTerminal { code, message }) => {
                warn!(local_id, code, message = %message, "Queued report rejected; discarding");
                if !self.remove(report).await {
                    return ItemResult::Transient;
                }
                self.emit(SyncEvent::ItemRejected { local_id, message });
                ItemResult::Rejected
            }
            Err(e @ (UploadError::Network(_) | UploadError::ServerTransient { .. })) => {
                info!(local_id, error = %e, "Queued report kept for retry");
                self.release(local_id).await;
                ItemResult::Transient
            }
        }
    }

    async fn drop_missing(&self, report: &Report) -> ItemResult {
        info!(
            local_id = report.local_id,
            file = %strip_path(&report.image_path),
            "Report image missing; discarding report"
        );
        if !self.remove(report).await {
            return ItemResult::Transient;
        }
        self.emit(SyncEvent::ItemMissingFile {
            local_id: report.local_id,
        });
        ItemResult::MissingFile
    }

    /// Removes file and row. On failure the row stays queued for the next
    /// pass and the item counts as transient; a report already accepted by
    /// the server then comes back as a terminal duplicate rejection.
    async fn remove(&self, report: &Report) -> bool {
        match self.store.delete(report).await {
            Ok(_) => true,
            Err(e) => {
                error!(local_id = report.local_id, error = %e, "Failed to remove resolved report");
                self.release(report.local_id).await;
                false
            }
        }
    }

    async fn release(&self, local_id: i64) {
        if let Err(e) = self.store.release(local_id).await {
            warn!(local_id, error = %e, "Failed to release report claim");
        }
    }

    fn emit(&self, event: SyncEvent) {
        self.events.emit(CoreEvent::Sync(event)).ok();
    }
}
