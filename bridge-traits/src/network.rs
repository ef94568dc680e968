//! Connectivity checks that hold network-bound work until a link is up.

use async_trait::async_trait;

use crate::background::TaskConstraints;
use crate::error::Result;

/// Link technology, when the platform can tell.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NetworkType {
    Cellular,
    WiFi,
    Ethernet,
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NetworkStatus {
    Connected,
    Disconnected,
    /// The platform could not decide; treated as offline.
    Indeterminate,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkInfo {
    pub status: NetworkStatus,
    pub network_type: Option<NetworkType>,
}

impl NetworkInfo {
    pub fn connected(network_type: NetworkType) -> Self {
        Self {
            status: NetworkStatus::Connected,
            network_type: Some(network_type),
        }
    }

    pub fn disconnected() -> Self {
        Self {
            status: NetworkStatus::Disconnected,
            network_type: None,
        }
    }

    /// Whether work with `constraints` may start on this link.
    pub fn satisfies(&self, constraints: &TaskConstraints) -> bool {
        if !(constraints.requires_network || constraints.requires_wifi) {
            return true;
        }
        if self.status != NetworkStatus::Connected {
            return false;
        }
        !constraints.requires_wifi || self.network_type == Some(NetworkType::WiFi)
    }
}

/// Source of connectivity information for the background executor.
///
/// # Platform Support
///
/// - **Desktop**: TCP reachability probe against the report API host
/// - **Android**: ConnectivityManager
/// - **iOS**: Network framework
#[async_trait]
pub trait NetworkMonitor: Send + Sync {
    async fn get_network_info(&self) -> Result<NetworkInfo>;

    async fn is_connected(&self) -> bool {
        matches!(
            self.get_network_info().await,
            Ok(NetworkInfo {
                status: NetworkStatus::Connected,
                ..
            })
        )
    }
}
