//! Shared fakes for the sync integration suites

#![allow(dead_code)]

use async_trait::async_trait;
use bridge_traits::background::{
    BackgroundExecutor, ExistingWorkPolicy, TaskConstraints, TaskId, TaskStatus, WorkHandler,
    WorkRequest,
};
use bridge_traits::error::{BridgeError, Result as BridgeResult};
use bridge_traits::notification::{Notification, NotificationSink};
use bridge_traits::time::{Clock, FixedClock};
use chrono::{FixedOffset, TimeZone, Utc};
use core_media::ImagePreparer;
use core_reports::{create_test_pool, Report, ReportFields, ReportStore, SqliteReportStore};
use core_runtime::config::{ImageConfig, SyncConfig};
use core_runtime::events::EventBus;
use core_sync::{
    DrainEngine, ImagePayload, SubmissionClient, SubmittedReport, UploadError, UploadReceipt,
};
use image::{Rgb, RgbImage};
use std::collections::{HashMap, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub fn clock() -> Arc<dyn Clock> {
    let instant = Utc.with_ymd_and_hms(2024, 3, 9, 23, 30, 0).unwrap();
    Arc::new(FixedClock::new(
        instant,
        FixedOffset::east_opt(7 * 3600).unwrap(),
    ))
}

pub fn fields(destination: &str) -> ReportFields {
    ReportFields::new(destination, "Diskusi anggaran", "Kantor Bupati", "-6.4817", "106.8540")
}

pub fn write_photo(dir: &Path, name: &str) -> PathBuf {
    let img = RgbImage::from_fn(96, 64, |x, y| Rgb([(x * 2) as u8, (y * 3) as u8, 90]));
    let path = dir.join(name);
    img.save(&path).unwrap();
    path
}

pub async fn store() -> Arc<SqliteReportStore> {
    Arc::new(SqliteReportStore::new(create_test_pool().await.unwrap()))
}

/// Queue a report whose image file exists under `dir`.
pub async fn queue_report(store: &dyn ReportStore, dir: &Path, destination: &str) -> Report {
    let image = dir.join(format!("tugas_{}.jpg", destination.replace(' ', "_")));
    std::fs::write(&image, b"jpeg bytes").unwrap();
    let report = Report::new(fields(destination), image.to_string_lossy(), 1_700_000_000_000);
    let id = store.insert(&report).await.unwrap();
    store.find_by_id(id).await.unwrap().unwrap()
}

pub fn preparer(dir: &Path) -> Arc<ImagePreparer> {
    Arc::new(ImagePreparer::new(dir, ImageConfig::default(), clock()))
}

pub fn engine(
    store: Arc<dyn ReportStore>,
    client: Arc<dyn SubmissionClient>,
    events: EventBus,
) -> Arc<DrainEngine> {
    Arc::new(DrainEngine::new(
        store,
        client,
        events,
        clock(),
        Duration::from_secs(600),
    ))
}

pub fn sync_config() -> SyncConfig {
    SyncConfig::default()
}

/// Upload outcome keyed by destination; anything unscripted succeeds.
pub struct ScriptedClient {
    script: Mutex<HashMap<String, VecDeque<Result<UploadReceipt, UploadError>>>>,
    default: Result<UploadReceipt, UploadError>,
    uploads: Mutex<Vec<(ReportFields, ImagePayload)>>,
}

impl ScriptedClient {
    pub fn succeeding() -> Arc<Self> {
        Arc::new(Self::with_default(Ok(UploadReceipt {
            message: Some("ok".to_string()),
            file_url: Some("https://cdn.example.go.id/tugas.jpg".to_string()),
        })))
    }

    pub fn offline() -> Arc<Self> {
        Arc::new(Self::with_default(Err(UploadError::Network(
            "connection refused".to_string(),
        ))))
    }

    pub fn with_default(default: Result<UploadReceipt, UploadError>) -> Self {
        Self {
            script: Mutex::new(HashMap::new()),
            default,
            uploads: Mutex::new(Vec::new()),
        }
    }

    pub fn script(&self, destination: &str, result: Result<UploadReceipt, UploadError>) {
        self.script
            .lock()
            .unwrap()
            .entry(destination.to_string())
            .or_default()
            .push_back(result);
    }

    pub fn upload_count(&self) -> usize {
        self.uploads.lock().unwrap().len()
    }

    pub fn uploaded_payloads(&self) -> Vec<ImagePayload> {
        self.uploads
            .lock()
            .unwrap()
            .iter()
            .map(|(_, image)| image.clone())
            .collect()
    }

    pub fn uploaded_destinations(&self) -> Vec<String> {
        self.uploads
            .lock()
            .unwrap()
            .iter()
            .map(|(fields, _)| fields.destination.clone())
            .collect()
    }
}

#[async_trait]
impl SubmissionClient for ScriptedClient {
    async fn upload(
        &self,
        fields: &ReportFields,
        image: ImagePayload,
    ) -> Result<UploadReceipt, UploadError> {
        self.uploads.lock().unwrap().push((fields.clone(), image));
        let scripted = self
            .script
            .lock()
            .unwrap()
            .get_mut(&fields.destination)
            .and_then(|queue| queue.pop_front());
        scripted.unwrap_or_else(|| self.default.clone())
    }

    async fn list_submitted(&self) -> Result<Vec<SubmittedReport>, UploadError> {
        Ok(Vec::new())
    }
}

#[derive(Default)]
pub struct RecordingNotifier {
    pub sent: Mutex<Vec<Notification>>,
}

#[async_trait]
impl NotificationSink for RecordingNotifier {
    async fn notify(&self, notification: Notification) -> BridgeResult<()> {
        self.sent.lock().unwrap().push(notification);
        Ok(())
    }
}

/// Records enqueue calls without running anything.
#[derive(Default)]
pub struct RecordingExecutor {
    pub handlers: Mutex<Vec<String>>,
    pub enqueued: Mutex<Vec<(String, WorkRequest, ExistingWorkPolicy)>>,
    pub scheduled: Mutex<Vec<(String, Duration)>>,
    pub cancelled: Mutex<Vec<TaskId>>,
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
        request: WorkRequest,
        policy: ExistingWorkPolicy,
    ) -> BridgeResult<TaskId> {
        self.enqueued
            .lock()
            .unwrap()
            .push((name.to_string(), request, policy));
        Ok(TaskId::new(name))
    }

    async fn schedule_task(
        &self,
        task_id: &str,
        interval: Duration,
        _constraints: TaskConstraints,
    ) -> BridgeResult<TaskId> {
        self.scheduled
            .lock()
            .unwrap()
            .push((task_id.to_string(), interval));
        Ok(TaskId::new(task_id))
    }

    async fn cancel_task(&self, task_id: &TaskId) -> BridgeResult<()> {
        self.cancelled.lock().unwrap().push(task_id.clone());
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
