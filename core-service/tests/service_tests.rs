//! End-to-end flows through the façade with fake bridges.

use async_trait::async_trait;
use bridge_traits::background::{
    BackgroundExecutor, ExistingWorkPolicy, TaskConstraints, TaskId, TaskStatus, WorkHandler,
    WorkRequest,
};
use bridge_traits::error::{BridgeError, Result as BridgeResult};
use bridge_traits::http::{HttpClient, HttpRequest, HttpResponse};
use bridge_traits::notification::{Notification, NotificationSink};
use bridge_traits::time::FixedClock;
use chrono::{FixedOffset, TimeZone, Utc};
use core_media::Identity;
use core_reports::ReportFields;
use core_runtime::events::{CoreEvent, SessionEvent};
use core_service::{AttendanceCore, CoreConfig, CoreError};
use core_sync::SubmitResult;
use image::{Rgb, RgbImage};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU16, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;

fn body(status: u16) -> &'static str {
    match status {
        200..=299 => r#"{"success":true,"message":"Berhasil","fileUrl":"https://cdn.example.go.id/a.jpg"}"#,
        400 => r#"{"success":false,"message":"Data tidak valid"}"#,
        401 => r#"{"message":"Unauthenticated."}"#,
        _ => "Service Unavailable",
    }
}

/// Answers every request with the current status.
struct SwitchableHttp {
    status: AtomicU16,
    requests: Mutex<usize>,
}

impl SwitchableHttp {
    fn new(status: u16) -> Arc<Self> {
        Arc::new(Self {
            status: AtomicU16::new(status),
            requests: Mutex::new(0),
        })
    }

    fn set(&self, status: u16) {
        self.status.store(status, Ordering::SeqCst);
    }
}

#[async_trait]
impl HttpClient for SwitchableHttp {
    async fn execute(&self, _request: HttpRequest) -> BridgeResult<HttpResponse> {
        *self.requests.lock().unwrap() += 1;
        let status = self.status.load(Ordering::SeqCst);
        Ok(HttpResponse {
            status,
            headers: HashMap::new(),
            body: body(status).as_bytes().to_vec().into(),
        })
    }
}

#[derive(Default)]
struct RecordingExecutor {
    handlers: Mutex<Vec<String>>,
    enqueued: Mutex<Vec<String>>,
    cancelled: Mutex<Vec<String>>,
}

#[async_trait]
impl BackgroundExecutor for RecordingExecutor {
    async fn register_handler(&self, name: &str, _handler: WorkHandler) -> BridgeResult<()> {
        self.handlers.lock().unwrap().push(name.to_string());
        Ok(())
    }

    async fn enqueue_unique(
        &self,
        name: &str,
        _request: WorkRequest,
        _policy: ExistingWorkPolicy,
    ) -> BridgeResult<TaskId> {
        self.enqueued.lock().unwrap().push(name.to_string());
        Ok(TaskId::new(name))
    }

    async fn schedule_task(
        &self,
        task_id: &str,
        _interval: Duration,
        _constraints: TaskConstraints,
    ) -> BridgeResult<TaskId> {
        Ok(TaskId::new(task_id))
    }

    async fn cancel_task(&self, task_id: &TaskId) -> BridgeResult<()> {
        self.cancelled
            .lock()
            .unwrap()
            .push(task_id.as_str().to_string());
        Ok(())
    }

    async fn get_task_status(&self, task_id: &TaskId) -> BridgeResult<TaskStatus> {
        Err(BridgeError::OperationFailed(format!(
            "Task not found: {}",
            task_id
        )))
    }

    async fn list_tasks(&self) -> BridgeResult<Vec<TaskId>> {
        Ok(Vec::new())
    }

    async fn next_execution_time(&self, _task_id: &TaskId) -> BridgeResult<Option<Duration>> {
        Ok(None)
    }
}

#[derive(Default)]
struct RecordingNotifier {
    sent: Mutex<Vec<Notification>>,
}

#[async_trait]
impl NotificationSink for RecordingNotifier {
    async fn notify(&self, notification: Notification) -> BridgeResult<()> {
        self.sent.lock().unwrap().push(notification);
        Ok(())
    }
}

struct Fixture {
    dir: TempDir,
    http: Arc<SwitchableHttp>,
    executor: Arc<RecordingExecutor>,
    notifier: Arc<RecordingNotifier>,
}

impl Fixture {
    fn new(status: u16) -> Self {
        Self {
            dir: TempDir::new().unwrap(),
            http: SwitchableHttp::new(status),
            executor: Arc::new(RecordingExecutor::default()),
            notifier: Arc::new(RecordingNotifier::default()),
        }
    }

    fn image_dir(&self) -> PathBuf {
        self.dir.path().join("images")
    }

    fn config(&self) -> CoreConfig {
        let instant = Utc.with_ymd_and_hms(2024, 3, 10, 2, 15, 0).unwrap();
        CoreConfig::builder()
            .database_path(self.dir.path().join("reports.db"))
            .image_dir(self.image_dir())
            .api_base_url("https://absensi.example.go.id/")
            .http_client(self.http.clone())
            .background_executor(self.executor.clone())
            .notification_sink(self.notifier.clone())
            .clock(Arc::new(FixedClock::new(
                instant,
                FixedOffset::east_opt(7 * 3600).unwrap(),
            )))
            .build()
            .unwrap()
    }

    async fn core(&self) -> AttendanceCore {
        AttendanceCore::bootstrap(self.config()).await.unwrap()
    }

    fn photo(&self) -> PathBuf {
        let path = self.dir.path().join("capture.png");
        if !path.exists() {
            RgbImage::from_fn(120, 90, |x, y| Rgb([x as u8, y as u8, 200]))
                .save(&path)
                .unwrap();
        }
        path
    }
}

fn form() -> ReportFields {
    ReportFields::new(
        "Rapat Koordinasi",
        "Diskusi anggaran",
        "Kantor Bupati",
        "-6.595038",
        "106.816635",
    )
}

fn officer() -> Identity {
    Identity::new("Budi Santoso", "3271010101900002")
}

async fn wait_until(mut done: impl FnMut() -> bool) {
    for _ in 0..50 {
        if done() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

fn prepared_images(dir: &Path) -> usize {
    std::fs::read_dir(dir).unwrap().count()
}

#[tokio::test]
async fn test_bootstrap_registers_sync_handler() {
    let fx = Fixture::new(200);
    let _core = fx.core().await;

    assert_eq!(*fx.executor.handlers.lock().unwrap(), vec!["tugas_luar_sync"]);
    assert!(fx.image_dir().is_dir());
}

#[tokio::test]
async fn test_offline_submit_then_manual_sync() {
    let fx = Fixture::new(503);
    let core = fx.core().await;
    let photo = fx.photo();

    let result = core.submit(form(), Some(&photo), &officer()).await.unwrap();
    assert!(matches!(result, SubmitResult::QueuedOffline { .. }));
    assert_eq!(core.pending_reports().await.unwrap().len(), 1);
    assert_eq!(*fx.executor.enqueued.lock().unwrap(), vec!["tugas_luar_sync"]);

    fx.http.set(200);
    let report = core.sync_now().await.unwrap();

    assert_eq!(report.message, "1 reports synchronized");
    assert!(core.pending_reports().await.unwrap().is_empty());
    // Only the background worker notifies
    assert!(fx.notifier.sent.lock().unwrap().is_empty());
    assert_eq!(prepared_images(&fx.image_dir()), 0);
}

#[tokio::test]
async fn test_online_submit_is_delivered() {
    let fx = Fixture::new(200);
    let core = fx.core().await;
    let photo = fx.photo();

    let result = core.submit(form(), Some(&photo), &officer()).await.unwrap();

    assert_eq!(
        result,
        SubmitResult::Success {
            file_url: Some("https://cdn.example.go.id/a.jpg".to_string())
        }
    );
    assert!(core.pending_reports().await.unwrap().is_empty());
    assert_eq!(*fx.http.requests.lock().unwrap(), 1);
}

#[tokio::test]
async fn test_queue_survives_restart() {
    let fx = Fixture::new(503);
    let photo = fx.photo();
    {
        let core = fx.core().await;
        core.submit(form(), Some(&photo), &officer()).await.unwrap();
        core.shutdown().await;
    }

    let core = fx.core().await;
    let pending = core.pending_reports().await.unwrap();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].destination, "Rapat Koordinasi");
    assert!(pending[0].image_path().exists());

    // Starting with a non-empty queue asks for a sync
    fx.executor.enqueued.lock().unwrap().clear();
    core.start().await.unwrap();
    assert_eq!(*fx.executor.enqueued.lock().unwrap(), vec!["tugas_luar_sync"]);
    core.shutdown().await;
}

#[tokio::test]
async fn test_unauthorized_cancels_sync_and_flags_session() {
    let fx = Fixture::new(401);
    let core = fx.core().await;
    core.start().await.unwrap();
    let mut events = core.subscribe();
    let photo = fx.photo();

    let result = core.submit(form(), Some(&photo), &officer()).await.unwrap();
    assert!(matches!(result, SubmitResult::QueuedOffline { .. }));

    assert_eq!(
        events.recv().await.unwrap(),
        CoreEvent::Session(SessionEvent::Unauthorized { status: 401 })
    );
    wait_until(|| fx.executor.cancelled.lock().unwrap().len() >= 2).await;
    assert!(core.session_expired());
    assert!(fx
        .executor
        .cancelled
        .lock()
        .unwrap()
        .contains(&"tugas_luar_sync".to_string()));

    fx.http.set(200);
    core.resume_session().await.unwrap();
    assert!(!core.session_expired());
    core.shutdown().await;
}

#[tokio::test]
async fn test_rejected_submit_is_not_queued() {
    let fx = Fixture::new(400);
    let core = fx.core().await;
    let photo = fx.photo();

    let result = core.submit(form(), Some(&photo), &officer()).await.unwrap();

    assert_eq!(result, SubmitResult::Rejected("Data tidak valid".to_string()));
    assert!(core.pending_reports().await.unwrap().is_empty());
    assert!(fx.executor.enqueued.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_clear_image_cache_keeps_queued_photo() {
    let fx = Fixture::new(503);
    let core = fx.core().await;
    let photo = fx.photo();
    core.submit(form(), Some(&photo), &officer()).await.unwrap();

    let report = core.clear_image_cache().await.unwrap();

    assert_eq!(report.deleted, 0);
    assert_eq!(report.referenced, 1);
    assert_eq!(prepared_images(&fx.image_dir()), 1);
}

#[tokio::test]
async fn test_submitted_reports_surface_remote_errors() {
    let fx = Fixture::new(503);
    let core = fx.core().await;

    let err = core.submitted_reports().await.unwrap_err();
    assert!(matches!(err, CoreError::Remote(_)));
}
