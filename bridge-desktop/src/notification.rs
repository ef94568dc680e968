//! Notification sink that writes to the tracing pipeline.

use async_trait::async_trait;
use bridge_traits::{
    error::Result,
    notification::{Notification, NotificationSink},
};
use tracing::info;

/// Desktop has no notification tray integration; notices become log lines.
#[derive(Debug, Default, Clone)]
pub struct LogNotificationSink;

impl LogNotificationSink {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl NotificationSink for LogNotificationSink {
    async fn notify(&self, notification: Notification) -> Result<()> {
        info!(
            title = %notification.title,
            body = %notification.body,
            "User notification"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_notify_never_fails() {
        let sink = LogNotificationSink::new();
        sink.notify(Notification::new("Tugas Luar", "All pending reports were delivered"))
            .await
            .unwrap();
    }
}
