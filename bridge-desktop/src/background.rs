//! Tokio executor that runs deferred work inside the desktop process.

use async_trait::async_trait;
use bridge_traits::{
    background::{
        BackgroundExecutor, ExistingWorkPolicy, TaskConstraints, TaskId, TaskStatus, WorkHandler,
        WorkOutcome, WorkRequest,
    },
    error::{BridgeError, Result},
    network::{NetworkInfo, NetworkMonitor},
    time::{Clock, SystemClock},
};
use futures_util::FutureExt;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{oneshot, RwLock};
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tracing::{debug, info, warn};

type TaskHandler = WorkHandler;
type TaskTable = Arc<RwLock<HashMap<TaskId, TaskInfo>>>;

const DEFAULT_CONSTRAINT_POLL: Duration = Duration::from_secs(5);

/// Tokio-based background executor for desktop.
///
/// Work lives as long as the process. Durable state belongs to the handlers
/// themselves (the report queue is in SQLite), so a restart only needs to
/// enqueue the work again.
pub struct TokioBackgroundExecutor {
    tasks: TaskTable,
    handlers: Arc<RwLock<HashMap<String, TaskHandler>>>,
    network_monitor: Option<Arc<dyn NetworkMonitor>>,
    clock: Arc<dyn Clock>,
    constraint_poll: Duration,
    generation: AtomicU64,
}

struct TaskInfo {
    /// Distinguishes a replaced run from its successor under the same id.
    generation: u64,
    status: TaskStatus,
    handle: Option<JoinHandle<()>>,
    cancel: Option<oneshot::Sender<()>>,
    last_run: Option<i64>,
    next_run: Option<i64>,
    rerun_requested: bool,
}

impl TaskInfo {
    fn scheduled(generation: u64, cancel: oneshot::Sender<()>, next_run: i64) -> Self {
        Self {
            generation,
            status: TaskStatus::Scheduled,
            handle: None,
            cancel: Some(cancel),
            last_run: None,
            next_run: Some(next_run),
            rerun_requested: false,
        }
    }

    fn is_active(&self) -> bool {
        matches!(
            self.status,
            TaskStatus::Scheduled | TaskStatus::Running | TaskStatus::Retrying { .. }
        )
    }

    fn stop(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            let _ = cancel.send(());
        }
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}

/// Everything a spawned work loop needs, detached from `&self`.
#[derive(Clone)]
struct WorkContext {
    tasks: TaskTable,
    id: TaskId,
    generation: u64,
    handler: TaskHandler,
    monitor: Option<Arc<dyn NetworkMonitor>>,
    clock: Arc<dyn Clock>,
    constraint_poll: Duration,
}

impl WorkContext {
    fn own<'a>(&self, tasks: &'a mut HashMap<TaskId, TaskInfo>) -> Option<&'a mut TaskInfo> {
        tasks
            .get_mut(&self.id)
            .filter(|info| info.generation == self.generation)
    }

    async fn set_status(&self, status: TaskStatus, next_run: Option<i64>) {
        let mut tasks = self.tasks.write().await;
        if let Some(info) = self.own(&mut tasks) {
            info.status = status;
            info.next_run = next_run;
        }
    }

    async fn mark_cancelled(&self) {
        self.set_status(TaskStatus::Cancelled, None).await;
    }

    /// Sleep unless cancelled first. Returns `false` on cancellation.
    async fn wait(&self, cancel_rx: &mut oneshot::Receiver<()>, delay: Duration) -> bool {
        if delay.is_zero() {
            return true;
        }
        tokio::select! {
            _ = cancel_rx => false,
            _ = sleep(delay) => true,
        }
    }

    /// Block until the constraints hold. Returns `false` on cancellation.
    async fn wait_for_constraints(
        &self,
        cancel_rx: &mut oneshot::Receiver<()>,
        constraints: &TaskConstraints,
    ) -> bool {
        loop {
            if TokioBackgroundExecutor::constraints_satisfied(self.monitor.clone(), constraints)
                .await
            {
                return true;
            }
            debug!(task_id = %self.id, "Constraints not satisfied; waiting");
            if !self.wait(cancel_rx, self.constraint_poll).await {
                return false;
            }
        }
    }
}

impl TokioBackgroundExecutor {
    /// Create a new background executor with no network monitoring.
    pub fn new() -> Self {
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);
        Self::with_network_monitor_and_clock(None, clock)
    }

    /// Create a background executor with an optional network monitor.
    pub fn with_network_monitor(monitor: Option<Arc<dyn NetworkMonitor>>) -> Self {
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);
        Self::with_network_monitor_and_clock(monitor, clock)
    }

    /// Create a background executor with an optional network monitor and custom clock.
    pub fn with_network_monitor_and_clock(
        monitor: Option<Arc<dyn NetworkMonitor>>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            tasks: Arc::new(RwLock::new(HashMap::new())),
            handlers: Arc::new(RwLock::new(HashMap::new())),
            network_monitor: monitor,
            clock,
            constraint_poll: DEFAULT_CONSTRAINT_POLL,
            generation: AtomicU64::new(0),
        }
    }

    /// How often unmet constraints are re-checked.
    pub fn with_constraint_poll_interval(mut self, interval: Duration) -> Self {
        self.constraint_poll = interval;
        self
    }

    fn now_millis(clock: &dyn Clock) -> i64 {
        clock.unix_timestamp_millis()
    }

    fn duration_to_millis(duration: Duration) -> i64 {
        duration.as_millis().min(i64::MAX as u128) as i64
    }

    fn schedule_after(clock: &dyn Clock, delay: Duration) -> i64 {
        let now = Self::now_millis(clock);
        now.saturating_add(Self::duration_to_millis(delay))
    }

    fn millis_to_duration(millis: i64) -> Duration {
        if millis <= 0 {
            Duration::from_secs(0)
        } else {
            Duration::from_millis(millis as u64)
        }
    }

    /// Register a handler that will be invoked when the named work executes.
    pub async fn register_task_handler<F, Fut>(&self, task_id: &str, handler: F) -> Result<()>
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<Output = Result<WorkOutcome>> + Send + 'static,
    {
        let mut handlers = self.handlers.write().await;
        handlers.insert(task_id.to_string(), Arc::new(move || handler().boxed()));
        Ok(())
    }

    async fn handler_for(&self, task_id: &str) -> Result<TaskHandler> {
        let handlers = self.handlers.read().await;
        handlers.get(task_id).cloned().ok_or_else(|| {
            BridgeError::OperationFailed(format!("No handler registered for task: {}", task_id))
        })
    }

    fn next_generation(&self) -> u64 {
        self.generation.fetch_add(1, AtomicOrdering::Relaxed)
    }

    fn context(&self, id: TaskId, generation: u64, handler: TaskHandler) -> WorkContext {
        WorkContext {
            tasks: Arc::clone(&self.tasks),
            id,
            generation,
            handler,
            monitor: self.network_monitor.clone(),
            clock: Arc::clone(&self.clock),
            constraint_poll: self.constraint_poll,
        }
    }

    async fn attach_handle(&self, id: &TaskId, generation: u64, handle: JoinHandle<()>) {
        let mut tasks = self.tasks.write().await;
        match tasks.get_mut(id) {
            Some(info) if info.generation == generation => info.handle = Some(handle),
            // Replaced or cancelled before the handle landed.
            _ => handle.abort(),
        }
    }

    async fn constraints_satisfied(
        monitor: Option<Arc<dyn NetworkMonitor>>,
        constraints: &TaskConstraints,
    ) -> bool {
        if !(constraints.requires_network || constraints.requires_wifi) {
            return true;
        }

        if let Some(monitor) = monitor {
            match monitor.get_network_info().await {
                Ok(info) => info.satisfies(constraints),
                Err(err) => {
                    warn!("Network monitor error: {}", err);
                    false
                }
            }
        } else {
            warn!(
                "Network constraints requested but no monitor provided; assuming constraint satisfied"
            );
            true
        }
    }

    async fn run_recurring_task(
        ctx: WorkContext,
        period: Duration,
        constraints: TaskConstraints,
        mut cancel_rx: oneshot::Receiver<()>,
    ) {
        let mut ticker = tokio::time::interval(period);
        let period_millis = Self::duration_to_millis(period);
        loop {
            tokio::select! {
                _ = &mut cancel_rx => {
                    ctx.mark_cancelled().await;
                    break;
                }
                _ = ticker.tick() => {
                    let next = Self::now_millis(ctx.clock.as_ref()).saturating_add(period_millis);
                    if !Self::constraints_satisfied(ctx.monitor.clone(), &constraints).await {
                        debug!(task_id = %ctx.id, "Constraints not satisfied; skipping run");
                        ctx.set_status(TaskStatus::Scheduled, Some(next)).await;
                        continue;
                    }

                    ctx.set_status(TaskStatus::Running, Some(next)).await;
                    let result = (ctx.handler)().await;

                    let mut tasks = ctx.tasks.write().await;
                    if let Some(info) = ctx.own(&mut tasks) {
                        let now = Self::now_millis(ctx.clock.as_ref());
                        info.last_run = Some(now);
                        info.next_run = Some(now.saturating_add(period_millis));
                        info.status = match result {
                            Ok(WorkOutcome::Success) => TaskStatus::Completed,
                            Ok(WorkOutcome::Retry) => {
                                debug!(task_id = %ctx.id, "Recurring task asked for retry; next tick covers it");
                                TaskStatus::Scheduled
                            }
                            Err(err) => {
                                warn!(task_id = %ctx.id, error = %err, "Recurring task failed");
                                TaskStatus::Failed
                            }
                        };
                    }
                }
            }
        }
    }

    async fn run_unique_work(
        ctx: WorkContext,
        request: WorkRequest,
        mut cancel_rx: oneshot::Receiver<()>,
    ) {
        let mut delay = request.initial_delay;
        let mut attempt: u32 = 0;

        loop {
            if !ctx.wait(&mut cancel_rx, delay).await
                || !ctx
                    .wait_for_constraints(&mut cancel_rx, &request.constraints)
                    .await
            {
                ctx.mark_cancelled().await;
                return;
            }

            ctx.set_status(TaskStatus::Running, None).await;
            let result = (ctx.handler)().await;

            let mut tasks = ctx.tasks.write().await;
            let Some(info) = ctx.own(&mut tasks) else {
                return;
            };
            let now = Self::now_millis(ctx.clock.as_ref());
            info.last_run = Some(now);
            let rerun = std::mem::take(&mut info.rerun_requested);

            match result {
                Ok(WorkOutcome::Retry) => {
                    delay = request.backoff.delay_for(attempt);
                    attempt = attempt.saturating_add(1);
                    info.status = TaskStatus::Retrying { attempt };
                    info.next_run = Some(now.saturating_add(Self::duration_to_millis(delay)));
                    info!(
                        task_id = %ctx.id,
                        attempt,
                        delay_secs = delay.as_secs(),
                        "Work requested retry"
                    );
                }
                outcome if rerun => {
                    if let Err(err) = outcome {
                        warn!(task_id = %ctx.id, error = %err, "Work failed; running appended request");
                    }
                    delay = Duration::ZERO;
                    attempt = 0;
                    info.status = TaskStatus::Scheduled;
                    info.next_run = Some(now);
                    debug!(task_id = %ctx.id, "Running appended work request");
                }
                Ok(WorkOutcome::Success) => {
                    info.status = TaskStatus::Completed;
                    info.next_run = None;
                    return;
                }
                Err(err) => {
                    warn!(task_id = %ctx.id, error = %err, "One-time work failed");
                    info.status = TaskStatus::Failed;
                    info.next_run = None;
                    return;
                }
            }
        }
    }
}

impl Default for TokioBackgroundExecutor {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BackgroundExecutor for TokioBackgroundExecutor {
    async fn register_handler(&self, name: &str, handler: WorkHandler) -> Result<()> {
        debug!(task_id = name, "Registering work handler");
        let mut handlers = self.handlers.write().await;
        handlers.insert(name.to_string(), handler);
        Ok(())
    }

    async fn enqueue_unique(
        &self,
        name: &str,
        request: WorkRequest,
        policy: ExistingWorkPolicy,
    ) -> Result<TaskId> {
        let id = TaskId::new(name);
        let handler = self.handler_for(name).await?;
        let (cancel_tx, cancel_rx) = oneshot::channel();
        let generation = self.next_generation();

        {
            let mut tasks = self.tasks.write().await;
            if let Some(existing) = tasks.get_mut(&id).filter(|info| info.is_active()) {
                match policy {
                    ExistingWorkPolicy::Keep => {
                        debug!(task_id = name, "Work already enqueued; keeping existing");
                        return Ok(id);
                    }
                    ExistingWorkPolicy::Append => {
                        if existing.status == TaskStatus::Running {
                            existing.rerun_requested = true;
                        }
                        debug!(task_id = name, status = ?existing.status, "Appended to existing work");
                        return Ok(id);
                    }
                    ExistingWorkPolicy::Replace => {
                        debug!(task_id = name, "Replacing existing work");
                        existing.stop();
                    }
                }
            }

            tasks.insert(
                id.clone(),
                TaskInfo::scheduled(
                    generation,
                    cancel_tx,
                    Self::schedule_after(self.clock.as_ref(), request.initial_delay),
                ),
            );
        }

        debug!(
            task_id = name,
            delay_secs = request.initial_delay.as_secs(),
            requires_network = request.constraints.requires_network,
            "Enqueued unique work"
        );

        let ctx = self.context(id.clone(), generation, handler);
        let handle = tokio::spawn(Self::run_unique_work(ctx, request, cancel_rx));
        self.attach_handle(&id, generation, handle).await;

        Ok(id)
    }

    async fn schedule_task(
        &self,
        task_id: &str,
        interval: Duration,
        constraints: TaskConstraints,
    ) -> Result<TaskId> {
        let id = TaskId::new(task_id);

        debug!(
            task_id = task_id,
            interval_secs = interval.as_secs(),
            "Scheduling recurring task"
        );

        let handler = self.handler_for(task_id).await?;
        let (cancel_tx, cancel_rx) = oneshot::channel();
        let generation = self.next_generation();

        {
            let mut tasks = self.tasks.write().await;
            if let Some(mut previous) = tasks.insert(
                id.clone(),
                TaskInfo::scheduled(
                    generation,
                    cancel_tx,
                    Self::now_millis(self.clock.as_ref()),
                ),
            ) {
                previous.stop();
            }
        }

        let ctx = self.context(id.clone(), generation, handler);
        let handle = tokio::spawn(Self::run_recurring_task(
            ctx,
            interval,
            constraints,
            cancel_rx,
        ));
        self.attach_handle(&id, generation, handle).await;

        Ok(id)
    }

    async fn cancel_task(&self, task_id: &TaskId) -> Result<()> {
        debug!(task_id = %task_id, "Cancelling task");

        let removed = {
            let mut tasks = self.tasks.write().await;
            tasks.remove(task_id)
        };

        match removed {
            Some(mut info) => {
                info.stop();
                Ok(())
            }
            None => Err(BridgeError::OperationFailed(format!(
                "Task not found: {}",
                task_id
            ))),
        }
    }

    async fn get_task_status(&self, task_id: &TaskId) -> Result<TaskStatus> {
        let tasks = self.tasks.read().await;
        tasks
            .get(task_id)
            .map(|info| info.status.clone())
            .ok_or_else(|| BridgeError::OperationFailed(format!("Task not found: {}", task_id)))
    }

    async fn list_tasks(&self) -> Result<Vec<TaskId>> {
        let tasks = self.tasks.read().await;
        Ok(tasks.keys().cloned().collect())
    }

    async fn is_available(&self) -> bool {
        true
    }

    async fn next_execution_time(&self, task_id: &TaskId) -> Result<Option<Duration>> {
        let tasks = self.tasks.read().await;
        let info = tasks
            .get(task_id)
            .ok_or_else(|| BridgeError::OperationFailed(format!("Task not found: {}", task_id)))?;

        Ok(info.next_run.map(|next| {
            let now = Self::now_millis(self.clock.as_ref());
            Self::millis_to_duration(next - now)
        }))
    }
}
