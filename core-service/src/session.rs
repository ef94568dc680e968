//! Reaction to session events published on the bus.

use core_runtime::events::{CoreEvent, EventBus, EventStream, RecvError, SessionEvent};
use core_sync::SyncScheduler;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Whether the server has refused the current session.
#[derive(Debug, Default)]
pub struct SessionState {
    expired: AtomicBool,
}

impl SessionState {
    pub fn is_expired(&self) -> bool {
        self.expired.load(Ordering::SeqCst)
    }

    pub(crate) fn mark_expired(&self) -> bool {
        !self.expired.swap(true, Ordering::SeqCst)
    }

    pub(crate) fn reset(&self) {
        self.expired.store(false, Ordering::SeqCst);
    }
}

/// Subscribe to `events` and stop background sync once the session is gone.
///
/// The subscription is taken before the task is spawned, so nothing emitted
/// after this call returns is missed.
pub(crate) fn spawn_listener(
    events: &EventBus,
    scheduler: Arc<SyncScheduler>,
    state: Arc<SessionState>,
) -> JoinHandle<()> {
    let mut stream = EventStream::new(events.subscribe())
        .filter(|event| matches!(event, CoreEvent::Session(_)));

    tokio::spawn(async move {
        loop {
            match stream.recv().await {
                Ok(CoreEvent::Session(SessionEvent::Unauthorized { status })) => {
                    if state.mark_expired() {
                        warn!(status, "Session expired; cancelling background sync");
                        scheduler.cancel_all().await;
                    }
                }
                Ok(CoreEvent::Session(SessionEvent::SignedOut)) => {
                    info!("Signed out; cancelling background sync");
                    state.mark_expired();
                    scheduler.cancel_all().await;
                }
                Ok(_) => {}
                Err(RecvError::Lagged(skipped)) => {
                    debug!(skipped, "Session listener lagged");
                }
                Err(RecvError::Closed) => break,
            }
        }
        debug!("Session listener stopped");
    })
}
