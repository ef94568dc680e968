//! User Notification Abstraction
//!
//! Fire-and-forget notices shown to the field officer, such as "all pending
//! reports were delivered".

use async_trait::async_trait;

use crate::error::Result;

/// A user-visible notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub title: String,
    pub body: String,
}

impl Notification {
    pub fn new(title: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            body: body.into(),
        }
    }
}

/// Delivers notifications to the host.
///
/// - **Android**: NotificationManager channel
/// - **iOS**: UNUserNotificationCenter
/// - **Desktop**: Log line
///
/// Callers treat failures as non-fatal.
#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn notify(&self, notification: Notification) -> Result<()>;
}
