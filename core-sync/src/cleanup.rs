//! Removal of prepared images that no queued report references.

use crate::error::Result;
use core_media::is_prepared_image_name;
use core_reports::ReportStore;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use tracing::{debug, info, warn};

/// Files younger than this may belong to a submission still in progress.
pub const DEFAULT_SWEEP_GRACE: Duration = Duration::from_secs(5 * 60);

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub deleted: u64,
    /// Prepared images kept because a queued report still needs them
    pub referenced: u64,
    /// Unreferenced images kept because they are too new
    pub too_recent: u64,
}

/// Clears the image cache without touching photos of queued reports.
pub struct OrphanSweeper {
    image_dir: PathBuf,
    store: Arc<dyn ReportStore>,
    grace: Duration,
}

impl OrphanSweeper {
    pub fn new(image_dir: impl Into<PathBuf>, store: Arc<dyn ReportStore>) -> Self {
        Self {
            image_dir: image_dir.into(),
            store,
            grace: DEFAULT_SWEEP_GRACE,
        }
    }

    pub fn with_grace_period(mut self, grace: Duration) -> Self {
        self.grace = grace;
        self
    }

    pub async fn sweep(&self) -> Result<SweepReport> {
        let referenced: HashSet<String> = self
            .store
            .image_paths()
            .await?
            .iter()
            .filter_map(|path| file_name(Path::new(path)))
            .collect();

        let mut report = SweepReport::default();
        let mut entries = match tokio::fs::read_dir(&self.image_dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(report),
            Err(e) => return Err(e.into()),
        };

        let now = SystemTime::now();
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            let Some(name) = file_name(&path) else {
                continue;
            };
            if !is_prepared_image_name(&name) {
                continue;
            }
            if referenced.contains(&name) {
                report.referenced += 1;
                continue;
            }

            let metadata = entry.metadata().await?;
            if !metadata.is_file() {
                continue;
            }
            let age = metadata
                .modified()
                .ok()
                .and_then(|modified| now.duration_since(modified).ok())
                .unwrap_or_default();
            if age < self.grace {
                report.too_recent += 1;
                continue;
            }

            match tokio::fs::remove_file(&path).await {
                Ok(()) => {
                    debug!(file = %name, "Deleted orphaned image");
                    report.deleted += 1;
                }
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => warn!(file = %name, error = %e, "Failed to delete orphaned image"),
            }
        }

        info!(
            deleted = report.deleted,
            referenced = report.referenced,
            too_recent = report.too_recent,
            "Image cache swept"
        );
        Ok(report)
    }
}

fn file_name(path: &Path) -> Option<String> {
    path.file_name().map(|name| name.to_string_lossy().into_owned())
}
