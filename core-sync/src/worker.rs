//! Background drain run by the host scheduler.

use crate::drain::{DrainEngine, SyncOutcome};
use bridge_traits::background::WorkOutcome;
use bridge_traits::notification::{Notification, NotificationSink};
use std::sync::Arc;
use tracing::{info, warn};

pub const DELIVERED_NOTIFICATION_TITLE: &str = "Laporan tugas luar terkirim";
pub const DELIVERED_NOTIFICATION_BODY: &str =
    "Semua laporan tugas luar yang tertunda berhasil dikirim.";

/// Directive returned to the scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchResult {
    /// Nothing left that a retry could fix.
    Success,
    /// Some report failed transiently or was held by another drain; run the
    /// whole batch again later.
    RetryBatch,
}

impl From<BatchResult> for WorkOutcome {
    fn from(result: BatchResult) -> Self {
        match result {
            BatchResult::Success => WorkOutcome::Success,
            BatchResult::RetryBatch => WorkOutcome::Retry,
        }
    }
}

impl BatchResult {
    pub fn from_outcome(outcome: &SyncOutcome) -> Self {
        if outcome.needs_retry() {
            BatchResult::RetryBatch
        } else {
            BatchResult::Success
        }
    }
}

/// Scheduled drain of the pending report queue.
pub struct SyncWorker {
    engine: Arc<DrainEngine>,
    notifications: Arc<dyn NotificationSink>,
}

impl SyncWorker {
    pub fn new(engine: Arc<DrainEngine>, notifications: Arc<dyn NotificationSink>) -> Self {
        Self {
            engine,
            notifications,
        }
    }

    /// Drain once and tell the scheduler whether to retry.
    ///
    /// A queue that cannot be read at all also asks for a retry.
    pub async fn run(&self) -> BatchResult {
        match self.run_with_outcome().await {
            Some((result, _)) => result,
            None => BatchResult::RetryBatch,
        }
    }

    /// Like [`run`](Self::run), also returning the pass counts. `None` when
    /// the queue could not be read.
    pub async fn run_with_outcome(&self) -> Option<(BatchResult, SyncOutcome)> {
        let outcome = match self.engine.drain().await {
            Ok(outcome) => outcome,
            Err(e) => {
                warn!(error = %e, "Background drain could not read the queue");
                return None;
            }
        };

        let result = BatchResult::from_outcome(&outcome);
        if outcome.all_delivered() {
            self.notify_delivered().await;
        }

        info!(?result, "Background drain finished");
        Some((result, outcome))
    }

    async fn notify_delivered(&self) {
        let notification = Notification::new(DELIVERED_NOTIFICATION_TITLE, DELIVERED_NOTIFICATION_BODY);
        if let Err(e) = self.notifications.notify(notification).await {
            warn!(error = %e, "Failed to post delivery notification");
        }
    }
}
