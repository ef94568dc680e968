//! Report store trait and SQLite implementation

use crate::error::{ReportError, Result};
use crate::models::Report;
use async_trait::async_trait;
use core_runtime::logging::strip_path;
use sqlx::SqlitePool;
use std::io::ErrorKind;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, info, instrument, warn};

/// Durable queue of reports not yet confirmed delivered.
///
/// Operations may block on local I/O, never on the network.
#[async_trait]
pub trait ReportStore: Send + Sync {
    /// Insert a report, or replace the row with the same `local_id`
    ///
    /// Returns the row's local id.
    ///
    /// Field contents are stored as given; blank text is not rejected here.
    ///
    /// # Errors
    /// - [`ReportError::Duplicate`] if another row already holds the same
    ///   destination, description and address
    /// - [`ReportError::Database`] when SQLite cannot write the row
    async fn insert(&self, report: &Report) -> Result<i64>;

    /// All queued reports, in no particular order
    async fn list_all(&self) -> Result<Vec<Report>>;

    /// Delete a report and its image file
    ///
    /// The file goes first. A file that is already gone is not an error.
    ///
    /// # Returns
    /// - `Ok(true)` if the row was deleted
    /// - `Ok(false)` if no such row existed
    async fn delete(&self, report: &Report) -> Result<bool>;

    /// Find a queued report with the same content key
    async fn find_duplicate(
        &self,
        destination: &str,
        description: &str,
        address: &str,
    ) -> Result<Option<Report>>;

    async fn find_by_id(&self, local_id: i64) -> Result<Option<Report>>;

    async fn count(&self) -> Result<i64>;

    /// Image paths referenced by queued reports
    async fn image_paths(&self) -> Result<Vec<String>>;

    /// Mark a report as being uploaded
    ///
    /// Succeeds when the row is idle or its previous claim is older than
    /// `stale_after`. Returns `false` if another upload holds it or the row
    /// no longer exists.
    async fn try_claim(&self, local_id: i64, now_millis: i64, stale_after: Duration)
        -> Result<bool>;

    /// Clear the in-flight marker of one report
    async fn release(&self, local_id: i64) -> Result<()>;

    /// Clear every in-flight marker
    ///
    /// Run at startup: no upload survives the process that started it.
    async fn release_all_claims(&self) -> Result<u64>;
}

const REPORT_COLUMNS: &str = "local_id, destination, description, address, latitude, longitude, image_path, created_at";

/// SQLite implementation of [`ReportStore`]
///
/// Mutations are serialized through a single writer lock.
pub struct SqliteReportStore {
    pool: SqlitePool,
    write_lock: Mutex<()>,
}

impl SqliteReportStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self {
            pool,
            write_lock: Mutex::new(()),
        }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

#[async_trait]
impl ReportStore for SqliteReportStore {
    #[instrument(skip(self, report), fields(local_id = report.local_id))]
    async fn insert(&self, report: &Report) -> Result<i64> {
        let _guard = self.write_lock.lock().await;

        let local_id = report.is_saved().then_some(report.local_id);
        let result = sqlx::query(
            r#"
            INSERT INTO pending_reports
                (local_id, destination, description, address, latitude, longitude, image_path, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(local_id) DO UPDATE SET
                destination = excluded.destination,
                description = excluded.description,
                address = excluded.address,
                latitude = excluded.latitude,
                longitude = excluded.longitude,
                image_path = excluded.image_path,
                created_at = excluded.created_at,
                in_flight_since = NULL
            "#,
        )
        .bind(local_id)
        .bind(&report.destination)
        .bind(&report.description)
        .bind(&report.address)
        .bind(&report.latitude)
        .bind(&report.longitude)
        .bind(&report.image_path)
        .bind(report.created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(ref db) if db.is_unique_violation() => ReportError::Duplicate {
                destination: report.destination.clone(),
            },
            other => ReportError::Database(other),
        })?;

        let assigned = local_id.unwrap_or_else(|| result.last_insert_rowid());
        info!(local_id = assigned, "Queued report");
        Ok(assigned)
    }

    async fn list_all(&self) -> Result<Vec<Report>> {
        let reports = sqlx::query_as::<_, Report>(&format!(
            "SELECT {} FROM pending_reports ORDER BY local_id",
            REPORT_COLUMNS
        ))
        .fetch_all(&self.pool)
        .await?;
        Ok(reports)
    }

    #[instrument(skip(self, report), fields(local_id = report.local_id))]
    async fn delete(&self, report: &Report) -> Result<bool> {
        let _guard = self.write_lock.lock().await;

        match tokio::fs::remove_file(&report.image_path).await {
            Ok(()) => debug!(file = %strip_path(&report.image_path), "Deleted report image"),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!(file = %strip_path(&report.image_path), "Report image already gone")
            }
            Err(e) => {
                warn!(file = %strip_path(&report.image_path), error = %e, "Failed to delete report image");
                return Err(e.into());
            }
        }

        let result = sqlx::query("DELETE FROM pending_reports WHERE local_id = ?")
            .bind(report.local_id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn find_duplicate(
        &self,
        destination: &str,
        description: &str,
        address: &str,
    ) -> Result<Option<Report>> {
        let report = sqlx::query_as::<_, Report>(&format!(
            "SELECT {} FROM pending_reports WHERE destination = ? AND description = ? AND address = ? LIMIT 1",
            REPORT_COLUMNS
        ))
        .bind(destination)
        .bind(description)
        .bind(address)
        .fetch_optional(&self.pool)
        .await?;
        Ok(report)
    }

    async fn find_by_id(&self, local_id: i64) -> Result<Option<Report>> {
        let report = sqlx::query_as::<_, Report>(&format!(
            "SELECT {} FROM pending_reports WHERE local_id = ?",
            REPORT_COLUMNS
        ))
        .bind(local_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(report)
    }

    async fn count(&self) -> Result<i64> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM pending_reports")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    async fn image_paths(&self) -> Result<Vec<String>> {
        let rows: Vec<(String,)> = sqlx::query_as("SELECT image_path FROM pending_reports")
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().map(|(path,)| path).collect())
    }

    async fn try_claim(
        &self,
        local_id: i64,
        now_millis: i64,
        stale_after: Duration,
    ) -> Result<bool> {
        let _guard = self.write_lock.lock().await;

        let stale_before =
            now_millis.saturating_sub(i64::try_from(stale_after.as_millis()).unwrap_or(i64::MAX));
        let result = sqlx::query(
            r#"
            UPDATE pending_reports
            SET in_flight_since = ?
            WHERE local_id = ?
              AND (in_flight_since IS NULL OR in_flight_since <= ?)
            "#,
        )
        .bind(now_millis)
        .bind(local_id)
        .bind(stale_before)
        .execute(&self.pool)
        .await?;

        let claimed = result.rows_affected() == 1;
        if !claimed {
            debug!(local_id, "Report already in flight");
        }
        Ok(claimed)
    }

    async fn release(&self, local_id: i64) -> Result<()> {
        let _guard = self.write_lock.lock().await;

        sqlx::query("UPDATE pending_reports SET in_flight_since = NULL WHERE local_id = ?")
            .bind(local_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn release_all_claims(&self) -> Result<u64> {
        let _guard = self.write_lock.lock().await;

        let result = sqlx::query(
            "UPDATE pending_reports SET in_flight_since = NULL WHERE in_flight_since IS NOT NULL",
        )
        .execute(&self.pool)
        .await?;

        let released = result.rows_affected();
        if released > 0 {
            info!(released, "Released stale upload claims");
        }
        Ok(released)
    }
}
