//! # Report Submitter
//!
//! One user-initiated submission: prepare the photo, try to deliver it right
//! away, and fall back to the local queue when delivery fails transiently.
//!
//! | Upload result                 | Submission result                |
//! |-------------------------------|----------------------------------|
//! | delivered                     | `Success`                        |
//! | network / transient server    | `QueuedOffline` + sync requested |
//! | terminal rejection            | `Rejected(message)`, not queued  |

use crate::client::{ImagePayload, SubmissionClient, UploadError};
use crate::error::Result;
use crate::scheduler::SyncScheduler;
use bridge_traits::time::Clock;
use core_media::{Coordinates, Identity, ImagePreparer, PreparedImage};
use core_reports::{Report, ReportError, ReportFields, ReportStore};
use core_runtime::events::{CoreEvent, EventBus, SubmissionEvent};
use core_runtime::logging::strip_path;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

/// Reason given when no photo was captured.
pub const PHOTO_REQUIRED: &str = "photo required";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitResult {
    Success {
        file_url: Option<String>,
    },
    /// Saved locally; a background sync will deliver it.
    QueuedOffline {
        local_id: i64,
        /// An equivalent report was already waiting. Nothing new was stored.
        already_queued: bool,
    },
    Rejected(String),
}

pub struct ReportSubmitter {
    preparer: Arc<ImagePreparer>,
    client: Arc<dyn SubmissionClient>,
    store: Arc<dyn ReportStore>,
    scheduler: Arc<SyncScheduler>,
    events: EventBus,
    clock: Arc<dyn Clock>,
}

impl ReportSubmitter {
    pub fn new(
        preparer: Arc<ImagePreparer>,
        client: Arc<dyn SubmissionClient>,
        store: Arc<dyn ReportStore>,
        scheduler: Arc<SyncScheduler>,
        events: EventBus,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            preparer,
            client,
            store,
            scheduler,
            events,
            clock,
        }
    }

    /// Submit one report.
    ///
    /// # Errors
    ///
    /// Image decoding failures and local storage failures. A photo that
    /// cannot be decoded will not decode later either, so it is never queued.
    #[instrument(skip_all, fields(destination = %form.destination))]
    pub async fn submit(
        &self,
        form: ReportFields,
        photo: Option<&Path>,
        identity: &Identity,
    ) -> Result<SubmitResult> {
        let Some(photo) = photo else {
            info!("Submission without photo refused");
            return Ok(self.rejected(PHOTO_REQUIRED.to_string()));
        };

        let coords = Coordinates::new(form.latitude.clone(), form.longitude.clone());
        let prepared = self.preparer.prepare(photo, identity, &coords).await?;

        match self
            .client
            .upload(&form, ImagePayload::from_prepared(&prepared))
            .await
        {
            Ok(receipt) => {
                info!("Report delivered");
                discard_file(&prepared).await;
                self.emit(SubmissionEvent::Delivered {
                    file_url: receipt.file_url.clone(),
                });
                Ok(SubmitResult::Success {
                    file_url: receipt.file_url,
                })
            }
            Err(UploadError::ServerTerminal { code, message }) => {
                info!(code, message = %message, "Report rejected by server");
                discard_file(&prepared).await;
                Ok(self.rejected(message))
            }
            Err(e @ (UploadError::Network(_) | UploadError::ServerTransient { .. })) => {
                info!(error = %e, "Delivery failed; queueing report");
                self.queue(form, prepared).await
            }
        }
    }

    async fn queue(&self, form: ReportFields, prepared: PreparedImage) -> Result<SubmitResult> {
        if let Some(existing) = self
            .store
            .find_duplicate(&form.destination, &form.description, &form.address)
            .await?
        {
            debug!(local_id = existing.local_id, "Equivalent report already queued");
            discard_file(&prepared).await;
            return Ok(self.queued(existing.local_id, true).await);
        }

        let report = Report::new(
            form,
            prepared.path.to_string_lossy().into_owned(),
            self.clock.unix_timestamp_millis(),
        );

        match self.store.insert(&report).await {
            Ok(local_id) => Ok(self.queued(local_id, false).await),
            Err(ReportError::Duplicate { .. }) => {
                // Lost a race with a concurrent submission of the same report.
                discard_file(&prepared).await;
                let existing = self
                    .store
                    .find_duplicate(&report.destination, &report.description, &report.address)
                    .await?;
                let local_id = existing.map(|r| r.local_id).unwrap_or(Report::UNSAVED_ID);
                Ok(self.queued(local_id, true).await)
            }
            Err(e) => {
                discard_file(&prepared).await;
                Err(e.into())
            }
        }
    }

    async fn queued(&self, local_id: i64, already_queued: bool) -> SubmitResult {
        if let Err(e) = self.scheduler.request_sync().await {
            // The row is durable; the next startup or periodic sync drains it.
            warn!(local_id, error = %e, "Could not schedule background sync");
        }

        self.emit(SubmissionEvent::QueuedOffline {
            local_id,
            already_queued,
        });
        SubmitResult::QueuedOffline {
            local_id,
            already_queued,
        }
    }

    fn rejected(&self, message: String) -> SubmitResult {
        self.emit(SubmissionEvent::Rejected {
            message: message.clone(),
        });
        SubmitResult::Rejected(message)
    }

    fn emit(&self, event: SubmissionEvent) {
        self.events.emit(CoreEvent::Submission(event)).ok();
    }
}

async fn discard_file(prepared: &PreparedImage) {
    if let Err(e) = tokio::fs::remove_file(&prepared.path).await {
        if e.kind() != std::io::ErrorKind::NotFound {
            warn!(
                file = %strip_path(&prepared.path.to_string_lossy()),
                error = %e,
                "Failed to remove prepared image"
            );
        }
    }
}
