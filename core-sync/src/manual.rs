//! User-invoked "sync now".

use crate::drain::{DrainEngine, SyncOutcome};
use crate::error::Result;
use std::sync::Arc;
use tracing::info;

/// Human-readable result of a manual sync.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManualSyncReport {
    pub synchronized: u64,
    /// Reports still queued after the pass
    pub remaining: i64,
    pub outcome: SyncOutcome,
    pub message: String,
}

/// Runs one drain on demand. Never reschedules; anything left queued waits
/// for the next scheduled or manual attempt.
pub struct ManualSyncTrigger {
    engine: Arc<DrainEngine>,
}

impl ManualSyncTrigger {
    pub fn new(engine: Arc<DrainEngine>) -> Self {
        Self { engine }
    }

    pub async fn sync_now(&self) -> Result<ManualSyncReport> {
        let outcome = self.engine.drain().await?;
        let remaining = self.engine.pending_count().await?;
        let synchronized = outcome.succeeded;

        info!(synchronized, remaining, "Manual sync finished");
        Ok(ManualSyncReport {
            synchronized,
            remaining,
            outcome,
            message: format!("{} reports synchronized", synchronized),
        })
    }
}
