//! # Desktop Bridge Implementations
//!
//! Default implementations of bridge traits for desktop platforms
//! (macOS, Windows, Linux).
//!
//! ## Overview
//!
//! This crate provides implementations of the bridge traits using
//! desktop-appropriate libraries:
//! - `HttpClient` using `reqwest` (multipart uploads, rustls)
//! - `NetworkMonitor` using a TCP reachability probe
//! - `BackgroundExecutor` using the Tokio runtime
//! - `NotificationSink` writing to `tracing`
//!
//! ## Usage
//!
//! ```ignore
//! use bridge_desktop::{DesktopNetworkMonitor, ReqwestHttpClient, TokioBackgroundExecutor};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let http_client = ReqwestHttpClient::new()?;
//!     let monitor = Arc::new(DesktopNetworkMonitor::new());
//!     let executor = TokioBackgroundExecutor::with_network_monitor(Some(monitor));
//!
//!     // Use in core configuration
//!     Ok(())
//! }
//! ```

mod background;
mod http;
mod network;
mod notification;

pub use background::TokioBackgroundExecutor;
pub use http::ReqwestHttpClient;
pub use network::DesktopNetworkMonitor;
pub use notification::LogNotificationSink;
