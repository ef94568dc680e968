//! # Core Configuration Module
//!
//! Provides configuration management for the field-operations core.
//!
//! ## Overview
//!
//! The configuration system uses a builder pattern to construct a `CoreConfig`
//! instance that holds all dependencies and settings for the report
//! submission and sync subsystem. It enforces fail-fast validation so that
//! every required bridge is present before initialization.
//!
//! ## Bridges
//!
//! - `HttpClient` - Report uploads (desktop default: reqwest)
//! - `BackgroundExecutor` - Deferred sync work (desktop default: tokio)
//! - `NotificationSink` - "All reports delivered" notice (desktop default: log line)
//! - `NetworkMonitor` - Connectivity constraint for deferred work (optional)
//! - `Clock` - Watermark timestamps and claim ages (default: system clock)
//!
//! When the `desktop-shims` feature is enabled, desktop-ready defaults are
//! injected for any bridge that was not provided. Without it, a missing bridge
//! is reported as [`Error::CapabilityMissing`].
//!
//! ## Usage
//!
//! ```ignore
//! use core_runtime::config::CoreConfig;
//!
//! let config = CoreConfig::builder()
//!     .database_path("/data/app/tugas_luar.db")
//!     .image_dir("/data/app/files")
//!     .api_base_url("https://api.example.go.id")
//!     .build()?;
//! ```

use crate::error::{Error, Result};
use bridge_traits::{
    BackgroundExecutor, Clock, HttpClient, NetworkMonitor, NotificationSink, SystemClock,
};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// Default unique name of the deferred sync work.
pub const DEFAULT_SYNC_TASK_NAME: &str = "tugas_luar_sync";

/// Remote endpoint settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiConfig {
    /// Scheme and host, without trailing slash
    pub base_url: String,
    /// Path that accepts multipart report uploads
    pub upload_path: String,
    /// Path that lists the officer's submitted reports
    pub list_path: String,
    /// Per-request timeout
    pub request_timeout: Duration,
}

impl ApiConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            upload_path: "/api/tugas-luar".to_string(),
            list_path: "/api/tugas-luar".to_string(),
            request_timeout: Duration::from_secs(60),
        }
    }

    pub fn upload_url(&self) -> String {
        format!("{}{}", self.base_url, self.upload_path)
    }

    pub fn list_url(&self) -> String {
        format!("{}{}", self.base_url, self.list_path)
    }

    fn validate(&self) -> Result<()> {
        if !(self.base_url.starts_with("http://") || self.base_url.starts_with("https://")) {
            return Err(Error::Config(format!(
                "API base URL must start with http:// or https://, got '{}'",
                self.base_url
            )));
        }
        for (label, path) in [("upload", &self.upload_path), ("list", &self.list_path)] {
            if !path.starts_with('/') {
                return Err(Error::Config(format!(
                    "API {} path must start with '/', got '{}'",
                    label, path
                )));
            }
        }
        if self.request_timeout.is_zero() {
            return Err(Error::Config(
                "API request timeout must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

/// Encoding limits for prepared report photos.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageConfig {
    /// Target upper bound for the encoded JPEG, in bytes
    pub size_ceiling_bytes: usize,
    /// First quality tried
    pub quality_start: u8,
    /// Lowest quality tried before giving up on the ceiling
    pub quality_floor: u8,
    /// Quality decrement between attempts
    pub quality_step: u8,
}

impl Default for ImageConfig {
    fn default() -> Self {
        Self {
            size_ceiling_bytes: 1_000_000,
            quality_start: 100,
            quality_floor: 5,
            quality_step: 5,
        }
    }
}

impl ImageConfig {
    fn validate(&self) -> Result<()> {
        if self.size_ceiling_bytes == 0 {
            return Err(Error::Config(
                "Image size ceiling must be greater than 0 bytes".to_string(),
            ));
        }
        if self.quality_floor == 0 || self.quality_start > 100 {
            return Err(Error::Config(
                "JPEG quality must stay within 1..=100".to_string(),
            ));
        }
        if self.quality_floor > self.quality_start {
            return Err(Error::Config(format!(
                "JPEG quality floor {} is above the starting quality {}",
                self.quality_floor, self.quality_start
            )));
        }
        if self.quality_step == 0 {
            return Err(Error::Config(
                "JPEG quality step must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }
}

/// Deferred sync settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncConfig {
    /// Unique name of the deferred work
    pub task_name: String,
    /// First retry delay
    pub initial_backoff: Duration,
    /// Retry delay cap
    pub max_backoff: Duration,
    /// Age after which an in-flight claim is considered abandoned
    pub claim_timeout: Duration,
    /// Optional safety-net schedule in addition to on-demand work
    pub periodic_interval: Option<Duration>,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            task_name: DEFAULT_SYNC_TASK_NAME.to_string(),
            initial_backoff: Duration::from_secs(15 * 60),
            max_backoff: Duration::from_secs(5 * 60 * 60),
            claim_timeout: Duration::from_secs(10 * 60),
            periodic_interval: None,
        }
    }
}

impl SyncConfig {
    fn validate(&self) -> Result<()> {
        if self.task_name.trim().is_empty() {
            return Err(Error::Config("Sync task name cannot be empty".to_string()));
        }
        if self.initial_backoff.is_zero() || self.initial_backoff > self.max_backoff {
            return Err(Error::Config(format!(
                "Sync backoff must satisfy 0 < initial ({:?}) <= max ({:?})",
                self.initial_backoff, self.max_backoff
            )));
        }
        if self.claim_timeout.is_zero() {
            return Err(Error::Config(
                "In-flight claim timeout must be greater than zero".to_string(),
            ));
        }
        if matches!(self.periodic_interval, Some(interval) if interval < Duration::from_secs(60)) {
            return Err(Error::Config(
                "Periodic sync interval must be at least one minute".to_string(),
            ));
        }
        Ok(())
    }
}

/// Core configuration for the field-operations core.
///
/// Use [`CoreConfigBuilder`] to construct instances.
#[derive(Clone)]
pub struct CoreConfig {
    /// Path to the SQLite database file
    pub database_path: PathBuf,

    /// Directory where prepared report photos are written
    pub image_dir: PathBuf,

    pub api: ApiConfig,
    pub image: ImageConfig,
    pub sync: SyncConfig,

    /// HTTP client for report uploads
    pub http_client: Arc<dyn HttpClient>,

    /// Deferred work scheduler
    pub background_executor: Arc<dyn BackgroundExecutor>,

    /// User notification sink
    pub notification_sink: Arc<dyn NotificationSink>,

    /// Network connectivity monitor (optional)
    pub network_monitor: Option<Arc<dyn NetworkMonitor>>,

    /// Time source
    pub clock: Arc<dyn Clock>,
}

impl std::fmt::Debug for CoreConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CoreConfig")
            .field("database_path", &self.database_path)
            .field("image_dir", &self.image_dir)
            .field("api", &self.api)
            .field("image", &self.image)
            .field("sync", &self.sync)
            .field("http_client", &"HttpClient { ... }")
            .field("background_executor", &"BackgroundExecutor { ... }")
            .field("notification_sink", &"NotificationSink { ... }")
            .field(
                "network_monitor",
                &self
                    .network_monitor
                    .as_ref()
                    .map(|_| "NetworkMonitor { ... }"),
            )
            .finish()
    }
}

impl CoreConfig {
    /// Creates a new builder for constructing a `CoreConfig`.
    pub fn builder() -> CoreConfigBuilder {
        CoreConfigBuilder::default()
    }

    /// Validates the configuration and returns an error if invalid.
    pub fn validate(&self) -> Result<()> {
        if self.database_path.as_os_str().is_empty() {
            return Err(Error::Config("Database path cannot be empty".to_string()));
        }

        if self.image_dir.as_os_str().is_empty() {
            return Err(Error::Config("Image directory cannot be empty".to_string()));
        }

        self.api.validate()?;
        self.image.validate()?;
        self.sync.validate()?;

        Ok(())
    }
}

fn capability_missing(capability: &str, purpose: &str) -> Error {
    Error::CapabilityMissing {
        capability: capability.to_string(),
        message: format!(
            "{} implementation is required for {}. \
             Desktop: enable the 'desktop-shims' feature to use the default. \
             Mobile: inject the platform-native implementation.",
            capability, purpose
        ),
    }
}

#[cfg(feature = "desktop-shims")]
fn provide_default_http_client(timeout: Duration) -> Result<Arc<dyn HttpClient>> {
    use bridge_desktop::ReqwestHttpClient;

    let client = ReqwestHttpClient::with_timeout(timeout)
        .map_err(|e| Error::Internal(format!("Failed to create default HttpClient: {}", e)))?;
    Ok(Arc::new(client))
}

#[cfg(not(feature = "desktop-shims"))]
fn provide_default_http_client(_timeout: Duration) -> Result<Arc<dyn HttpClient>> {
    Err(capability_missing("HttpClient", "report uploads"))
}

#[cfg(feature = "desktop-shims")]
fn provide_default_network_monitor(api: &ApiConfig) -> Option<Arc<dyn NetworkMonitor>> {
    Some(Arc::new(bridge_desktop::DesktopNetworkMonitor::for_base_url(
        &api.base_url,
    )))
}

#[cfg(not(feature = "desktop-shims"))]
fn provide_default_network_monitor(_api: &ApiConfig) -> Option<Arc<dyn NetworkMonitor>> {
    None
}

#[cfg(feature = "desktop-shims")]
fn provide_default_background_executor(
    monitor: Option<Arc<dyn NetworkMonitor>>,
    clock: Arc<dyn Clock>,
) -> Result<Arc<dyn BackgroundExecutor>> {
    use bridge_desktop::TokioBackgroundExecutor;

    Ok(Arc::new(TokioBackgroundExecutor::with_network_monitor_and_clock(
        monitor, clock,
    )))
}

#[cfg(not(feature = "desktop-shims"))]
fn provide_default_background_executor(
    _monitor: Option<Arc<dyn NetworkMonitor>>,
    _clock: Arc<dyn Clock>,
) -> Result<Arc<dyn BackgroundExecutor>> {
    Err(capability_missing(
        "BackgroundExecutor",
        "deferred report sync",
    ))
}

#[cfg(feature = "desktop-shims")]
fn provide_default_notification_sink() -> Result<Arc<dyn NotificationSink>> {
    Ok(Arc::new(bridge_desktop::LogNotificationSink::new()))
}

#[cfg(not(feature = "desktop-shims"))]
fn provide_default_notification_sink() -> Result<Arc<dyn NotificationSink>> {
    Err(capability_missing(
        "NotificationSink",
        "sync completion notices",
    ))
}

/// Builder for constructing [`CoreConfig`] instances.
///
/// Call [`build()`](CoreConfigBuilder::build) to validate and create the
/// final config.
#[derive(Default)]
pub struct CoreConfigBuilder {
    database_path: Option<PathBuf>,
    image_dir: Option<PathBuf>,
    api_base_url: Option<String>,
    upload_path: Option<String>,
    list_path: Option<String>,
    request_timeout: Option<Duration>,
    image: ImageConfig,
    sync: SyncConfig,
    http_client: Option<Arc<dyn HttpClient>>,
    background_executor: Option<Arc<dyn BackgroundExecutor>>,
    notification_sink: Option<Arc<dyn NotificationSink>>,
    network_monitor: Option<Arc<dyn NetworkMonitor>>,
    clock: Option<Arc<dyn Clock>>,
}

impl CoreConfigBuilder {
    /// Sets the database path.
    pub fn database_path<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.database_path = Some(path.into());
        self
    }

    /// Sets the directory for prepared photos.
    pub fn image_dir<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.image_dir = Some(path.into());
        self
    }

    /// Sets the API base URL (scheme and host).
    pub fn api_base_url(mut self, url: impl Into<String>) -> Self {
        self.api_base_url = Some(url.into());
        self
    }

    /// Overrides the upload endpoint path.
    pub fn upload_path(mut self, path: impl Into<String>) -> Self {
        self.upload_path = Some(path.into());
        self
    }

    /// Overrides the listing endpoint path.
    pub fn list_path(mut self, path: impl Into<String>) -> Self {
        self.list_path = Some(path.into());
        self
    }

    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = Some(timeout);
        self
    }

    /// Sets the encoded photo size ceiling.
    ///
    /// Default: 1,000,000 bytes
    pub fn image_size_ceiling(mut self, bytes: usize) -> Self {
        self.image.size_ceiling_bytes = bytes;
        self
    }

    /// Sets the JPEG quality floor and step.
    ///
    /// Default: floor 5, step 5
    pub fn jpeg_quality(mut self, floor: u8, step: u8) -> Self {
        self.image.quality_floor = floor;
        self.image.quality_step = step;
        self
    }

    /// Sets the unique name of the deferred sync work.
    pub fn sync_task_name(mut self, name: impl Into<String>) -> Self {
        self.sync.task_name = name.into();
        self
    }

    /// Sets the retry backoff bounds.
    ///
    /// Default: 15 minutes initial, 5 hours maximum
    pub fn sync_backoff(mut self, initial: Duration, max: Duration) -> Self {
        self.sync.initial_backoff = initial;
        self.sync.max_backoff = max;
        self
    }

    /// Sets how old an in-flight claim must be before it is considered
    /// abandoned.
    pub fn claim_timeout(mut self, timeout: Duration) -> Self {
        self.sync.claim_timeout = timeout;
        self
    }

    /// Enables a recurring sync in addition to on-demand work.
    pub fn periodic_sync(mut self, interval: Duration) -> Self {
        self.sync.periodic_interval = Some(interval);
        self
    }

    pub fn http_client(mut self, client: Arc<dyn HttpClient>) -> Self {
        self.http_client = Some(client);
        self
    }

    pub fn background_executor(mut self, executor: Arc<dyn BackgroundExecutor>) -> Self {
        self.background_executor = Some(executor);
        self
    }

    pub fn notification_sink(mut self, sink: Arc<dyn NotificationSink>) -> Self {
        self.notification_sink = Some(sink);
        self
    }

    pub fn network_monitor(mut self, monitor: Arc<dyn NetworkMonitor>) -> Self {
        self.network_monitor = Some(monitor);
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Builds the final `CoreConfig` instance.
    ///
    /// # Errors
    ///
    /// - Required paths or the API base URL are missing
    /// - A bridge is missing and no platform default exists
    /// - A value fails validation
    pub fn build(self) -> Result<CoreConfig> {
        let database_path = self.database_path.ok_or_else(|| {
            Error::Config("Database path is required. Use .database_path() to set it.".to_string())
        })?;

        let image_dir = self.image_dir.ok_or_else(|| {
            Error::Config("Image directory is required. Use .image_dir() to set it.".to_string())
        })?;

        let base_url = self.api_base_url.ok_or_else(|| {
            Error::Config("API base URL is required. Use .api_base_url() to set it.".to_string())
        })?;

        let mut api = ApiConfig::new(base_url);
        if let Some(path) = self.upload_path {
            api.upload_path = path;
        }
        if let Some(path) = self.list_path {
            api.list_path = path;
        }
        if let Some(timeout) = self.request_timeout {
            api.request_timeout = timeout;
        }

        let clock = self.clock.unwrap_or_else(|| Arc::new(SystemClock));
        let network_monitor = self
            .network_monitor
            .or_else(|| provide_default_network_monitor(&api));

        let http_client = match self.http_client {
            Some(client) => client,
            None => provide_default_http_client(api.request_timeout)?,
        };

        let background_executor = match self.background_executor {
            Some(executor) => executor,
            None => provide_default_background_executor(network_monitor.clone(), clock.clone())?,
        };

        let notification_sink = match self.notification_sink {
            Some(sink) => sink,
            None => provide_default_notification_sink()?,
        };

        let config = CoreConfig {
            database_path,
            image_dir,
            api,
            image: self.image,
            sync: self.sync,
            http_client,
            background_executor,
            notification_sink,
            network_monitor,
            clock,
        };

        config.validate()?;

        Ok(config)
    }
}
