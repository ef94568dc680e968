//! Core service façade and bootstrap.
//!
//! [`AttendanceCore`] wires host-provided bridges (HTTP, background work,
//! notifications, clock) into the report pipeline and owns the lifecycle of
//! the event-bus subscribers. Desktop hosts enable the `desktop-shims`
//! feature to get default bridges from `bridge-desktop`; mobile hosts inject
//! their own through [`CoreConfig`].
//!
//! ```no_run
//! # async fn example() -> core_service::Result<()> {
//! use core_service::{AttendanceCore, CoreConfig};
//!
//! let config = CoreConfig::builder()
//!     .database_path("/data/fieldops/reports.db")
//!     .image_dir("/data/fieldops/images")
//!     .api_base_url("https://absensi.example.go.id")
//!     .build()?;
//!
//! let core = AttendanceCore::bootstrap(config).await?;
//! core.start().await?;
//! let report = core.sync_now().await?;
//! println!("{}", report.message);
//! core.shutdown().await;
//! # Ok(())
//! # }
//! ```

pub mod error;
mod session;

pub use core_runtime::config::CoreConfig;
pub use error::{CoreError, Result};
pub use session::SessionState;

use core_media::{Identity, ImagePreparer};
use core_reports::{create_pool, DatabaseConfig, Report, ReportFields, ReportStore, SqliteReportStore};
use core_runtime::events::{CoreEvent, EventBus, Receiver};
use core_sync::{
    DrainEngine, HttpSubmissionClient, ManualSyncReport, ManualSyncTrigger, OrphanSweeper,
    ReportSubmitter, SubmissionClient, SubmitResult, SubmittedReport, SweepReport, SyncScheduler,
    SyncWorker, TokenProvider,
};
use std::path::Path;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{info, instrument};

/// Primary façade exposed to host applications.
pub struct AttendanceCore {
    events: EventBus,
    store: Arc<dyn ReportStore>,
    client: Arc<dyn SubmissionClient>,
    submitter: ReportSubmitter,
    manual: ManualSyncTrigger,
    sweeper: OrphanSweeper,
    scheduler: Arc<SyncScheduler>,
    session: Arc<SessionState>,
    listener: Mutex<Option<JoinHandle<()>>>,
}

impl AttendanceCore {
    /// Open storage and build every component without an auth token.
    pub async fn bootstrap(config: CoreConfig) -> Result<Self> {
        Self::bootstrap_with_token(config, None).await
    }

    /// Open storage, release claims left by a previous process, build every
    /// component and register the sync handler with the executor.
    ///
    /// Nothing runs in the background until [`start`](Self::start).
    #[instrument(skip_all, fields(database = %config.database_path.display()))]
    pub async fn bootstrap_with_token(
        config: CoreConfig,
        token: Option<TokenProvider>,
    ) -> Result<Self> {
        config.validate()?;

        tokio::fs::create_dir_all(&config.image_dir)
            .await
            .map_err(|e| {
                CoreError::InitializationFailed(format!(
                    "Cannot create image directory {}: {}",
                    config.image_dir.display(),
                    e
                ))
            })?;

        let pool = create_pool(DatabaseConfig::new(&config.database_path)).await?;
        let store: Arc<dyn ReportStore> = Arc::new(SqliteReportStore::new(pool));
        let released = store.release_all_claims().await?;
        if released > 0 {
            info!(released, "Released in-flight claims from a previous run");
        }

        let events = EventBus::default();

        let mut http_client =
            HttpSubmissionClient::new(config.http_client.clone(), config.api.clone(), events.clone());
        if let Some(token) = token {
            http_client = http_client.with_token_provider(token);
        }
        let client: Arc<dyn SubmissionClient> = Arc::new(http_client);

        let engine = Arc::new(DrainEngine::new(
            store.clone(),
            client.clone(),
            events.clone(),
            config.clock.clone(),
            config.sync.claim_timeout,
        ));
        let worker = Arc::new(SyncWorker::new(
            engine.clone(),
            config.notification_sink.clone(),
        ));
        let scheduler = Arc::new(SyncScheduler::new(
            config.background_executor.clone(),
            config.sync.clone(),
        ));
        scheduler.register(worker).await?;

        let preparer = Arc::new(ImagePreparer::new(
            &config.image_dir,
            config.image,
            config.clock.clone(),
        ));
        let submitter = ReportSubmitter::new(
            preparer,
            client.clone(),
            store.clone(),
            scheduler.clone(),
            events.clone(),
            config.clock.clone(),
        );

        info!("Core bootstrapped");
        Ok(Self {
            manual: ManualSyncTrigger::new(engine),
            sweeper: OrphanSweeper::new(&config.image_dir, store.clone()),
            events,
            store,
            client,
            submitter,
            scheduler,
            session: Arc::new(SessionState::default()),
            listener: Mutex::new(None),
        })
    }

    /// Subscribe the session listener and start the periodic safety-net
    /// sync, if configured. Calling it twice replaces the listener.
    pub async fn start(&self) -> Result<()> {
        let handle = session::spawn_listener(
            &self.events,
            self.scheduler.clone(),
            self.session.clone(),
        );
        if let Some(previous) = self.listener.lock().await.replace(handle) {
            previous.abort();
        }

        // Pick up anything queued before the last shutdown
        if self.store.count().await? > 0 {
            self.scheduler.request_sync().await?;
        }
        self.scheduler.start_periodic().await?;

        info!("Core started");
        Ok(())
    }

    /// Stop listening and cancel scheduled sync.
    pub async fn shutdown(&self) {
        if let Some(handle) = self.listener.lock().await.take() {
            handle.abort();
        }
        self.scheduler.cancel_all().await;
        info!("Core shut down");
    }

    /// Submit one report. See [`ReportSubmitter::submit`].
    pub async fn submit(
        &self,
        form: ReportFields,
        photo: Option<&Path>,
        identity: &Identity,
    ) -> Result<SubmitResult> {
        Ok(self.submitter.submit(form, photo, identity).await?)
    }

    /// Drain the queue now and report how many were delivered.
    pub async fn sync_now(&self) -> Result<ManualSyncReport> {
        Ok(self.manual.sync_now().await?)
    }

    /// Reports waiting for delivery, oldest first.
    pub async fn pending_reports(&self) -> Result<Vec<Report>> {
        Ok(self.store.list_all().await?)
    }

    /// Reports the server already holds for this officer.
    pub async fn submitted_reports(&self) -> Result<Vec<SubmittedReport>> {
        Ok(self.client.list_submitted().await?)
    }

    /// Delete prepared images that no queued report needs.
    pub async fn clear_image_cache(&self) -> Result<SweepReport> {
        Ok(self.sweeper.sweep().await?)
    }

    pub fn subscribe(&self) -> Receiver<CoreEvent> {
        self.events.subscribe()
    }

    pub fn session_expired(&self) -> bool {
        self.session.is_expired()
    }

    /// Clear the expired flag after the host signs in again and request a
    /// sync for anything still queued.
    pub async fn resume_session(&self) -> Result<()> {
        self.session.reset();
        if self.store.count().await? > 0 {
            self.scheduler.request_sync().await?;
        }
        Ok(())
    }
}

impl std::fmt::Debug for AttendanceCore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AttendanceCore")
            .field("session_expired", &self.session.is_expired())
            .finish_non_exhaustive()
    }
}
