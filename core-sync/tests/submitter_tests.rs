mod common;

use bridge_traits::background::ExistingWorkPolicy;
use common::*;
use core_media::Identity;
use core_reports::{ReportFields, ReportStore};
use core_runtime::events::{CoreEvent, EventBus, SubmissionEvent};
use core_sync::{
    ReportSubmitter, SubmitResult, SyncError, SyncScheduler, UploadError, PHOTO_REQUIRED,
};
use std::sync::Arc;
use tempfile::TempDir;

struct Harness {
    submitter: ReportSubmitter,
    store: Arc<core_reports::SqliteReportStore>,
    executor: Arc<RecordingExecutor>,
    events: EventBus,
    images: TempDir,
    photos: TempDir,
}

async fn harness(client: Arc<ScriptedClient>) -> Harness {
    let images = TempDir::new().unwrap();
    let photos = TempDir::new().unwrap();
    let store = store().await;
    let executor = Arc::new(RecordingExecutor::default());
    let scheduler = Arc::new(SyncScheduler::new(executor.clone(), sync_config()));
    let events = EventBus::default();

    let submitter = ReportSubmitter::new(
        preparer(images.path()),
        client,
        store.clone(),
        scheduler,
        events.clone(),
        clock(),
    );

    Harness {
        submitter,
        store,
        executor,
        events,
        images,
        photos,
    }
}

fn officer() -> Identity {
    Identity::new("Siti Rahma", "3201234567890001")
}

fn prepared_files(dir: &TempDir) -> usize {
    std::fs::read_dir(dir.path()).unwrap().count()
}

#[tokio::test]
async fn test_offline_submission_is_queued_once() {
    let h = harness(ScriptedClient::offline()).await;
    let photo = write_photo(h.photos.path(), "camera.png");
    let form = fields("Rapat Koordinasi");

    let first = h
        .submitter
        .submit(form.clone(), Some(&photo), &officer())
        .await
        .unwrap();
    let SubmitResult::QueuedOffline {
        local_id,
        already_queued,
    } = first
    else {
        panic!("expected QueuedOffline, got {:?}", first);
    };
    assert!(!already_queued);
    assert_eq!(h.store.count().await.unwrap(), 1);

    let stored = h.store.find_by_id(local_id).await.unwrap().unwrap();
    assert_eq!(stored.destination, "Rapat Koordinasi");
    assert_eq!(stored.description, "Diskusi anggaran");
    assert_eq!(stored.address, "Kantor Bupati");
    assert!(stored.image_path().exists());

    // Same content again: no second row, no second file
    let second = h
        .submitter
        .submit(form, Some(&photo), &officer())
        .await
        .unwrap();
    assert_eq!(
        second,
        SubmitResult::QueuedOffline {
            local_id,
            already_queued: true,
        }
    );
    assert_eq!(h.store.count().await.unwrap(), 1);
    assert_eq!(prepared_files(&h.images), 1);
}

#[tokio::test]
async fn test_offline_submission_with_blank_description_is_queued() {
    let h = harness(ScriptedClient::offline()).await;
    let photo = write_photo(h.photos.path(), "camera.png");
    let form = ReportFields::new("Rapat Koordinasi", "", "Kantor Bupati", "-6.4817", "106.8540");

    let result = h
        .submitter
        .submit(form, Some(&photo), &officer())
        .await
        .unwrap();

    let SubmitResult::QueuedOffline { local_id, .. } = result else {
        panic!("expected QueuedOffline, got {:?}", result);
    };
    let stored = h.store.find_by_id(local_id).await.unwrap().unwrap();
    assert_eq!(stored.description, "");
    assert!(stored.image_path().exists());
    assert_eq!(h.store.count().await.unwrap(), 1);
}

#[tokio::test]
async fn test_queued_submission_requests_network_bound_sync() {
    let h = harness(ScriptedClient::offline()).await;
    let photo = write_photo(h.photos.path(), "camera.png");

    h.submitter
        .submit(fields("Rapat Koordinasi"), Some(&photo), &officer())
        .await
        .unwrap();

    let enqueued = h.executor.enqueued.lock().unwrap();
    assert_eq!(enqueued.len(), 1);
    let (name, request, policy) = &enqueued[0];
    assert_eq!(name, "tugas_luar_sync");
    assert_eq!(*policy, ExistingWorkPolicy::Append);
    assert!(request.constraints.requires_network);
}

#[tokio::test]
async fn test_successful_submission_leaves_nothing_behind() {
    let client = ScriptedClient::succeeding();
    let h = harness(client.clone()).await;
    let photo = write_photo(h.photos.path(), "camera.png");
    let mut rx = h.events.subscribe();

    let result = h
        .submitter
        .submit(fields("Monitoring Posyandu"), Some(&photo), &officer())
        .await
        .unwrap();

    assert!(matches!(result, SubmitResult::Success { file_url: Some(_) }));
    assert_eq!(client.uploaded_destinations(), vec!["Monitoring Posyandu"]);
    assert_eq!(h.store.count().await.unwrap(), 0);
    assert_eq!(prepared_files(&h.images), 0);
    assert!(h.executor.enqueued.lock().unwrap().is_empty());
    assert!(matches!(
        rx.try_recv().unwrap(),
        CoreEvent::Submission(SubmissionEvent::Delivered { .. })
    ));
    // Original capture is untouched
    assert!(photo.exists());
}

#[tokio::test]
async fn test_uploaded_image_is_watermarked_jpeg() {
    let client = ScriptedClient::succeeding();
    let h = harness(client.clone()).await;
    let photo = write_photo(h.photos.path(), "camera.png");

    h.submitter
        .submit(fields("Monitoring Posyandu"), Some(&photo), &officer())
        .await
        .unwrap();

    let payloads = client.uploaded_payloads();
    assert_eq!(payloads.len(), 1);
    let payload = &payloads[0];
    assert_eq!(payload.mime_type, "image/jpeg");
    assert!(payload.file_name.starts_with("tugas_"));
    assert!(payload.file_name.ends_with(".jpg"));

    let decoded = image::load_from_memory(&payload.bytes).unwrap().to_rgb8();
    assert_eq!(decoded.dimensions(), (96, 64));
    // The band at the bottom is dark, unlike the bright gradient it covers
    let corner = decoded.get_pixel(2, 62);
    assert!(corner[0] < 80 && corner[1] < 80);
}

#[tokio::test]
async fn test_terminal_rejection_is_not_queued() {
    let client = ScriptedClient::succeeding();
    client.script(
        "Rapat Koordinasi",
        Err(UploadError::ServerTerminal {
            code: 400,
            message: "Deskripsi wajib diisi".to_string(),
        }),
    );
    let h = harness(client).await;
    let photo = write_photo(h.photos.path(), "camera.png");

    let result = h
        .submitter
        .submit(fields("Rapat Koordinasi"), Some(&photo), &officer())
        .await
        .unwrap();

    assert_eq!(
        result,
        SubmitResult::Rejected("Deskripsi wajib diisi".to_string())
    );
    assert_eq!(h.store.count().await.unwrap(), 0);
    assert_eq!(prepared_files(&h.images), 0);
    assert!(h.executor.enqueued.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_server_error_is_queued() {
    let client = ScriptedClient::succeeding();
    client.script(
        "Rapat Koordinasi",
        Err(UploadError::ServerTransient {
            code: 502,
            message: "Bad Gateway".to_string(),
        }),
    );
    let h = harness(client).await;
    let photo = write_photo(h.photos.path(), "camera.png");

    let result = h
        .submitter
        .submit(fields("Rapat Koordinasi"), Some(&photo), &officer())
        .await
        .unwrap();

    assert!(matches!(
        result,
        SubmitResult::QueuedOffline {
            already_queued: false,
            ..
        }
    ));
    assert_eq!(h.store.count().await.unwrap(), 1);
    assert_eq!(prepared_files(&h.images), 1);
}

#[tokio::test]
async fn test_missing_photo_is_rejected_before_upload() {
    let client = ScriptedClient::succeeding();
    let h = harness(client.clone()).await;

    let result = h
        .submitter
        .submit(fields("Rapat Koordinasi"), None, &officer())
        .await
        .unwrap();

    assert_eq!(result, SubmitResult::Rejected(PHOTO_REQUIRED.to_string()));
    assert_eq!(client.upload_count(), 0);
    assert_eq!(h.store.count().await.unwrap(), 0);
}

#[tokio::test]
async fn test_undecodable_photo_is_an_error() {
    let client = ScriptedClient::succeeding();
    let h = harness(client.clone()).await;
    let photo = h.photos.path().join("broken.jpg");
    std::fs::write(&photo, b"definitely not an image").unwrap();

    let result = h
        .submitter
        .submit(fields("Rapat Koordinasi"), Some(&photo), &officer())
        .await;

    assert!(matches!(result, Err(SyncError::Media(_))));
    assert_eq!(client.upload_count(), 0);
    assert_eq!(h.store.count().await.unwrap(), 0);
}

#[tokio::test]
async fn test_different_reports_queue_separately() {
    let h = harness(ScriptedClient::offline()).await;
    let photo = write_photo(h.photos.path(), "camera.png");

    for destination in ["Rapat Koordinasi", "Kunjungan Sekolah"] {
        h.submitter
            .submit(fields(destination), Some(&photo), &officer())
            .await
            .unwrap();
    }

    assert_eq!(h.store.count().await.unwrap(), 2);
    assert_eq!(prepared_files(&h.images), 2);
}
