//! Reachability of the report API host.

use async_trait::async_trait;
use bridge_traits::{
    error::Result,
    network::{NetworkInfo, NetworkMonitor, NetworkStatus, NetworkType},
};
use std::time::Duration;
use tracing::debug;

const FALLBACK_PROBE: &str = "8.8.8.8:53";
const PROBE_TIMEOUT: Duration = Duration::from_secs(5);

/// Desktop connectivity check.
///
/// A TCP connect to the API host stands in for "online". Desktops do not
/// expose link type, so a reachable host reports [`NetworkType::Other`].
pub struct DesktopNetworkMonitor {
    probe_addr: String,
    probe_timeout: Duration,
}

impl DesktopNetworkMonitor {
    pub fn new() -> Self {
        Self::with_probe(FALLBACK_PROBE, PROBE_TIMEOUT)
    }

    /// Probe the host behind `base_url`, falling back to a public resolver
    /// when the URL has no host.
    pub fn for_base_url(base_url: &str) -> Self {
        match probe_addr_for(base_url) {
            Some(addr) => Self::with_probe(addr, PROBE_TIMEOUT),
            None => Self::new(),
        }
    }

    /// Probe a specific `host:port`.
    pub fn with_probe(addr: impl Into<String>, timeout: Duration) -> Self {
        Self {
            probe_addr: addr.into(),
            probe_timeout: timeout,
        }
    }

    pub fn probe_addr(&self) -> &str {
        &self.probe_addr
    }

    async fn probe(&self) -> NetworkStatus {
        let connect = tokio::net::TcpStream::connect(self.probe_addr.as_str());
        match tokio::time::timeout(self.probe_timeout, connect).await {
            Ok(Ok(_)) => NetworkStatus::Connected,
            Ok(Err(_)) | Err(_) => NetworkStatus::Disconnected,
        }
    }
}

impl Default for DesktopNetworkMonitor {
    fn default() -> Self {
        Self::new()
    }
}

/// `https://host[:port]/path` to `host:port`.
fn probe_addr_for(base_url: &str) -> Option<String> {
    let (default_port, rest) = if let Some(rest) = base_url.strip_prefix("https://") {
        (443, rest)
    } else if let Some(rest) = base_url.strip_prefix("http://") {
        (80, rest)
    } else {
        return None;
    };

    let authority = rest.split(['/', '?', '#']).next().unwrap_or_default();
    let host_port = authority.rsplit('@').next().unwrap_or_default();
    if host_port.is_empty() {
        return None;
    }

    let has_port = host_port
        .rsplit_once(':')
        .is_some_and(|(_, port)| !port.is_empty() && port.chars().all(|c| c.is_ascii_digit()));
    if has_port {
        Some(host_port.to_string())
    } else {
        Some(format!("{}:{}", host_port, default_port))
    }
}

#[async_trait]
impl NetworkMonitor for DesktopNetworkMonitor {
    async fn get_network_info(&self) -> Result<NetworkInfo> {
        let status = self.probe().await;
        debug!(status = ?status, probe = %self.probe_addr, "Connectivity probed");

        Ok(match status {
            NetworkStatus::Connected => NetworkInfo::connected(NetworkType::Other),
            _ => NetworkInfo::disconnected(),
        })
    }
}
