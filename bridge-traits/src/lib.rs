//! # Host Bridge Traits
//!
//! Platform abstraction traits that must be implemented by each host platform.
//!
//! ## Overview
//!
//! This crate defines the contract between the field-operations core and
//! platform-specific implementations. Each trait represents a capability that
//! the core requires but that must be implemented differently per platform
//! (desktop, Android, iOS).
//!
//! ## Traits
//!
//! ### Networking
//! - [`HttpClient`](http::HttpClient) - Async HTTP operations including multipart uploads
//! - [`NetworkMonitor`](network::NetworkMonitor) - Connectivity and metered network detection
//!
//! ### Platform Integration
//! - [`BackgroundExecutor`](background::BackgroundExecutor) - Deferred work respecting
//!   network constraints, unique names and exponential backoff
//! - [`NotificationSink`](notification::NotificationSink) - Fire-and-forget user notifications
//!
//! ### Utilities
//! - [`Clock`](time::Clock) - Time source for deterministic testing
//! - [`LoggerSink`](logging::LoggerSink) - Forward structured logs to host logging
//!
//! ## Platform Requirements
//!
//! | Platform | Implementation Crate | Status |
//! |----------|---------------------|--------|
//! | Desktop  | `bridge-desktop`    | ✅ Available |
//! | Android  | TBD                 | 📋 Planned |
//! | iOS      | TBD                 | 📋 Planned |
//!
//! ## Error Handling
//!
//! All bridge traits use the [`BridgeError`](error::BridgeError) type. Transport
//! failures where no response was received must be reported as
//! [`BridgeError::Network`](error::BridgeError::Network) so that callers can
//! tell them apart from server responses.
//!
//! ## Thread Safety
//!
//! All bridge traits require `Send + Sync` bounds to support safe concurrent usage
//! across async tasks.

pub mod background;
pub mod error;
pub mod http;
pub mod logging;
pub mod network;
pub mod notification;
pub mod time;

pub use error::BridgeError;

// Re-export commonly used types
pub use background::{
    BackgroundExecutor, BackoffPolicy, ExistingWorkPolicy, TaskConstraints, TaskId, TaskStatus,
    WorkFuture, WorkHandler, WorkOutcome, WorkRequest,
};
pub use http::{FilePart, HttpClient, HttpMethod, HttpRequest, HttpResponse, MultipartForm};
pub use network::{NetworkInfo, NetworkMonitor, NetworkStatus, NetworkType};
pub use notification::{Notification, NotificationSink};
pub use logging::{LogEntry, LogLevel, LoggerSink};
pub use time::{Clock, FixedClock, SystemClock};
