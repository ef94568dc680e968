mod common;

use common::*;
use core_sync::{OrphanSweeper, SweepReport};
use std::time::Duration;
use tempfile::TempDir;

#[tokio::test]
async fn test_sweep_spares_queued_images() {
    let tmp = TempDir::new().unwrap();
    let store = store().await;
    let queued = queue_report(store.as_ref(), tmp.path(), "Rapat Koordinasi").await;
    let orphan = tmp.path().join("tugas_orphan.jpg");
    std::fs::write(&orphan, b"left over").unwrap();
    let unrelated = tmp.path().join("profile.jpg");
    std::fs::write(&unrelated, b"not ours").unwrap();

    let report = OrphanSweeper::new(tmp.path(), store.clone())
        .with_grace_period(Duration::ZERO)
        .sweep()
        .await
        .unwrap();

    assert_eq!(
        report,
        SweepReport {
            deleted: 1,
            referenced: 1,
            too_recent: 0,
        }
    );
    assert!(queued.image_path().exists());
    assert!(!orphan.exists());
    assert!(unrelated.exists());
}

#[tokio::test]
async fn test_sweep_keeps_fresh_orphans() {
    let tmp = TempDir::new().unwrap();
    let store = store().await;
    let fresh = tmp.path().join("tugas_in_progress.jpg");
    std::fs::write(&fresh, b"being uploaded").unwrap();

    let report = OrphanSweeper::new(tmp.path(), store)
        .sweep()
        .await
        .unwrap();

    assert_eq!(report.too_recent, 1);
    assert_eq!(report.deleted, 0);
    assert!(fresh.exists());
}

#[tokio::test]
async fn test_sweep_of_missing_directory_is_empty() {
    let tmp = TempDir::new().unwrap();
    let store = store().await;

    let report = OrphanSweeper::new(tmp.path().join("never_created"), store)
        .sweep()
        .await
        .unwrap();

    assert_eq!(report, SweepReport::default());
}
