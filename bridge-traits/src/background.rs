//! Deferred work owned by the host OS scheduler.
//!
//! Work is enqueued under a unique name, held until its constraints hold and
//! rerun with exponential backoff whenever the handler answers
//! [`WorkOutcome::Retry`].

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::error::Result;

/// Conditions that must hold before work starts.
#[derive(Debug, Clone)]
pub struct TaskConstraints {
    pub requires_wifi: bool,
    pub requires_network: bool,
    pub requires_charging: bool,
}

impl Default for TaskConstraints {
    fn default() -> Self {
        Self {
            requires_wifi: false,
            requires_network: true,
            requires_charging: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TaskId(pub String);

impl TaskId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for TaskId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskStatus {
    Scheduled,
    Running,
    /// Waiting out the backoff delay before retry `attempt`
    Retrying { attempt: u32 },
    Completed,
    /// The handler returned an error; no retry follows
    Failed,
    Cancelled,
}

/// What a unit of background work reports back to the executor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkOutcome {
    /// Done. Nothing to reschedule.
    Success,
    /// Run again later, after the request's backoff delay.
    Retry,
}

/// Future produced by one run of a work handler.
pub type WorkFuture = Pin<Box<dyn Future<Output = Result<WorkOutcome>> + Send>>;

/// Callback the executor invokes each time named work runs.
pub type WorkHandler = Arc<dyn Fn() -> WorkFuture + Send + Sync>;

/// Exponential backoff between retries of the same work request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackoffPolicy {
    pub initial: Duration,
    pub max: Duration,
}

impl BackoffPolicy {
    pub fn new(initial: Duration, max: Duration) -> Self {
        Self { initial, max }
    }

    /// Delay before retry number `attempt` (zero based), capped at `max`.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 2u32.checked_pow(attempt.min(31)).unwrap_or(u32::MAX);
        self.initial
            .checked_mul(factor)
            .map(|delay| delay.min(self.max))
            .unwrap_or(self.max)
    }
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            initial: Duration::from_secs(15 * 60),
            max: Duration::from_secs(5 * 60 * 60),
        }
    }
}

/// A one-time unit of deferred work.
#[derive(Debug, Clone, Default)]
pub struct WorkRequest {
    pub constraints: TaskConstraints,
    pub initial_delay: Duration,
    pub backoff: BackoffPolicy,
}

impl WorkRequest {
    pub fn new(constraints: TaskConstraints) -> Self {
        Self {
            constraints,
            ..Default::default()
        }
    }

    pub fn with_initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    pub fn with_backoff(mut self, backoff: BackoffPolicy) -> Self {
        self.backoff = backoff;
        self
    }
}

/// How to treat an enqueue when work with the same name already exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExistingWorkPolicy {
    /// Leave the existing request untouched and drop the new one.
    Keep,
    /// Cancel the existing request and start the new one.
    Replace,
    /// Keep the existing request and make sure it runs once more after the
    /// current run finishes.
    Append,
}

/// Host scheduler for deferred report delivery.
///
/// Android hosts map this onto WorkManager unique work, iOS hosts onto
/// BGTaskScheduler; the desktop build runs it on tokio. A handler must be
/// registered under a name before work with that name is enqueued, since
/// the OS may wake the process long after the enqueue call.
///
/// ```ignore
/// executor
///     .enqueue_unique("tugas_luar_sync", WorkRequest::default(), ExistingWorkPolicy::Append)
///     .await?;
/// ```
#[async_trait]
pub trait BackgroundExecutor: Send + Sync {
    /// Registering the same name again replaces the handler.
    async fn register_handler(&self, name: &str, handler: WorkHandler) -> Result<()>;

    /// Enqueue one-time work under a unique name
    ///
    /// At most one request per name is active. `policy` decides what happens
    /// when one already is.
    async fn enqueue_unique(
        &self,
        name: &str,
        request: WorkRequest,
        policy: ExistingWorkPolicy,
    ) -> Result<TaskId>;

    /// Run the handler registered as `task_id` every `interval` while
    /// `constraints` hold.
    async fn schedule_task(
        &self,
        task_id: &str,
        interval: Duration,
        constraints: TaskConstraints,
    ) -> Result<TaskId>;

    async fn cancel_task(&self, task_id: &TaskId) -> Result<()>;

    async fn get_task_status(&self, task_id: &TaskId) -> Result<TaskStatus>;

    async fn list_tasks(&self) -> Result<Vec<TaskId>>;

    /// `false` when the user has disabled background refresh.
    async fn is_available(&self) -> bool {
        true
    }

    /// `None` when unknown or when the task is due now.
    async fn next_execution_time(&self, task_id: &TaskId) -> Result<Option<Duration>>;
}
