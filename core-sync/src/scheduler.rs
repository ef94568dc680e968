//! Registers the background drain with the host scheduler.

use crate::error::Result;
use crate::worker::SyncWorker;
use bridge_traits::background::{
    BackgroundExecutor, BackoffPolicy, ExistingWorkPolicy, TaskConstraints, TaskId, TaskStatus,
    WorkFuture, WorkHandler, WorkOutcome, WorkRequest,
};
use bridge_traits::error::BridgeError;
use core_runtime::config::SyncConfig;
use std::sync::Arc;
use tracing::{debug, info};

/// Unique-work front end for [`SyncWorker`].
///
/// The drain runs under a single task name with a network precondition and
/// exponential backoff. Requesting a sync while one is pending or running
/// appends to it instead of starting a parallel drain.
pub struct SyncScheduler {
    executor: Arc<dyn BackgroundExecutor>,
    config: SyncConfig,
}

impl SyncScheduler {
    pub fn new(executor: Arc<dyn BackgroundExecutor>, config: SyncConfig) -> Self {
        Self { executor, config }
    }

    pub fn task_id(&self) -> TaskId {
        TaskId::new(self.config.task_name.clone())
    }

    pub fn periodic_task_id(&self) -> TaskId {
        TaskId::new(format!("{}_periodic", self.config.task_name))
    }

    fn constraints() -> TaskConstraints {
        TaskConstraints {
            requires_network: true,
            ..Default::default()
        }
    }

    /// Make `worker` the handler for the sync task names.
    pub async fn register(&self, worker: Arc<SyncWorker>) -> Result<()> {
        let handler: WorkHandler = Arc::new(move || -> WorkFuture {
            let worker = Arc::clone(&worker);
            Box::pin(async move { Ok::<_, BridgeError>(WorkOutcome::from(worker.run().await)) })
        });

        self.executor
            .register_handler(self.task_id().as_str(), Arc::clone(&handler))
            .await?;
        if self.config.periodic_interval.is_some() {
            self.executor
                .register_handler(self.periodic_task_id().as_str(), handler)
                .await?;
        }

        debug!(task = %self.config.task_name, "Registered sync handler");
        Ok(())
    }

    /// Enqueue a drain to run once the network is available.
    pub async fn request_sync(&self) -> Result<TaskId> {
        let request = WorkRequest::new(Self::constraints()).with_backoff(BackoffPolicy::new(
            self.config.initial_backoff,
            self.config.max_backoff,
        ));

        let task_id = self
            .executor
            .enqueue_unique(
                self.task_id().as_str(),
                request,
                ExistingWorkPolicy::Append,
            )
            .await?;

        info!(task_id = %task_id, "Requested report sync");
        Ok(task_id)
    }

    /// Start the recurring safety-net drain, if one is configured.
    pub async fn start_periodic(&self) -> Result<Option<TaskId>> {
        let Some(interval) = self.config.periodic_interval else {
            return Ok(None);
        };

        let task_id = self
            .executor
            .schedule_task(
                self.periodic_task_id().as_str(),
                interval,
                Self::constraints(),
            )
            .await?;

        info!(task_id = %task_id, interval_secs = interval.as_secs(), "Scheduled periodic report sync");
        Ok(Some(task_id))
    }

    /// Status of the on-demand sync task, if it exists.
    pub async fn status(&self) -> Option<TaskStatus> {
        self.executor.get_task_status(&self.task_id()).await.ok()
    }

    /// Cancel on-demand and periodic sync. Tasks that do not exist are
    /// ignored.
    pub async fn cancel_all(&self) {
        for task_id in [self.task_id(), self.periodic_task_id()] {
            if let Err(e) = self.executor.cancel_task(&task_id).await {
                debug!(task_id = %task_id, error = %e, "Nothing to cancel");
            }
        }
    }
}
