//! Events published by the submission and sync paths.
//!
//! An [`EventBus`] is created once at bootstrap and handed to each component
//! that needs it. The HTTP submission client publishes
//! [`SessionEvent::Unauthorized`]; the submitter and drain engine publish
//! [`SubmissionEvent`]s and [`SyncEvent`]s; the session listener and the host
//! UI subscribe.
//!
//! ```rust
//! use core_runtime::events::{CoreEvent, EventBus, SessionEvent};
//!
//! # #[tokio::main]
//! # async fn main() {
//! let bus = EventBus::new(16);
//! let mut rx = bus.subscribe();
//!
//! bus.emit(CoreEvent::Session(SessionEvent::Unauthorized { status: 401 }))
//!     .ok();
//!
//! assert!(matches!(rx.recv().await, Ok(CoreEvent::Session(_))));
//! # }
//! ```
//!
//! A receiver that falls more than the bus capacity behind gets
//! `RecvError::Lagged(n)` once and then resumes with newer events.
//! `RecvError::Closed` means every `EventBus` clone was dropped.
//! Publishers ignore the error returned when nobody is subscribed.

use serde::{Deserialize, Serialize};
use std::fmt;
use tokio::sync::broadcast;

pub use tokio::sync::broadcast::error::{RecvError, SendError};
pub use tokio::sync::broadcast::Receiver;

/// Capacity used by [`EventBus::default`].
pub const DEFAULT_EVENT_BUFFER_SIZE: usize = 100;

/// Everything that travels on the bus.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", content = "payload")]
pub enum CoreEvent {
    /// Session lifecycle events
    Session(SessionEvent),
    /// Outcome of a field officer's submission
    Submission(SubmissionEvent),
    /// Pending-report drain events
    Sync(SyncEvent),
}

impl CoreEvent {
    /// Short English label, suitable for a log line.
    pub fn description(&self) -> &str {
        match self {
            CoreEvent::Session(e) => e.description(),
            CoreEvent::Submission(e) => e.description(),
            CoreEvent::Sync(e) => e.description(),
        }
    }

    pub fn severity(&self) -> EventSeverity {
        match self {
            CoreEvent::Session(SessionEvent::Unauthorized { .. }) => EventSeverity::Warning,
            CoreEvent::Submission(SubmissionEvent::Rejected { .. }) => EventSeverity::Warning,
            CoreEvent::Sync(SyncEvent::ItemRejected { .. }) => EventSeverity::Warning,
            CoreEvent::Submission(SubmissionEvent::Delivered { .. }) => EventSeverity::Info,
            CoreEvent::Submission(SubmissionEvent::QueuedOffline { .. }) => EventSeverity::Info,
            CoreEvent::Sync(SyncEvent::Completed { .. }) => EventSeverity::Info,
            _ => EventSeverity::Debug,
        }
    }
}

/// How loudly a host should surface an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EventSeverity {
    Debug,
    Info,
    Warning,
    Error,
}

/// Events about the officer's authenticated session.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum SessionEvent {
    /// The server refused the session token.
    Unauthorized {
        /// HTTP status that triggered the event.
        status: u16,
    },
    /// The host ended the session.
    SignedOut,
}

impl SessionEvent {
    fn description(&self) -> &str {
        match self {
            SessionEvent::Unauthorized { .. } => "Session no longer authorized",
            SessionEvent::SignedOut => "Signed out",
        }
    }
}

/// Outcome of a single interactive submission.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum SubmissionEvent {
    /// The report reached the server.
    Delivered {
        /// Stored photo URL returned by the server, if any.
        file_url: Option<String>,
    },
    /// The report was stored locally for later delivery.
    QueuedOffline {
        /// Row id in the pending-report store.
        local_id: i64,
        /// An equivalent report was already waiting; nothing new was stored.
        already_queued: bool,
    },
    /// The server refused the report.
    Rejected {
        /// Server-provided reason.
        message: String,
    },
}

impl SubmissionEvent {
    fn description(&self) -> &str {
        match self {
            SubmissionEvent::Delivered { .. } => "Report delivered",
            SubmissionEvent::QueuedOffline { .. } => "Report queued for later delivery",
            SubmissionEvent::Rejected { .. } => "Report rejected by server",
        }
    }
}

/// Events emitted while draining the pending-report queue.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum SyncEvent {
    /// A drain pass began.
    Started {
        /// Identifier for this pass.
        run_id: String,
        /// Reports waiting when the pass began.
        pending: u64,
    },
    /// A queued report reached the server and was removed locally.
    ItemDelivered {
        /// Row id of the delivered report.
        local_id: i64,
    },
    /// The server refused a queued report; it was discarded.
    ItemRejected {
        /// Row id of the discarded report.
        local_id: i64,
        /// Server-provided reason.
        message: String,
    },
    /// A queued report's photo no longer exists; the report was discarded.
    ItemMissingFile {
        /// Row id of the discarded report.
        local_id: i64,
    },
    /// A drain pass finished.
    Completed {
        /// Identifier for this pass.
        run_id: String,
        /// Items examined.
        attempted: u64,
        /// Items delivered.
        succeeded: u64,
        /// Items discarded after a terminal server response.
        rejected: u64,
        /// Items discarded because their photo was gone.
        missing_files: u64,
        /// Items left in the queue after a transient failure.
        transiently_failed: u64,
        /// Whether the pass asked to be retried.
        retry: bool,
        /// Wall time of the pass in milliseconds.
        duration_ms: u64,
    },
}

impl SyncEvent {
    fn description(&self) -> &str {
        match self {
            SyncEvent::Started { .. } => "Sync started",
            SyncEvent::ItemDelivered { .. } => "Queued report delivered",
            SyncEvent::ItemRejected { .. } => "Queued report rejected",
            SyncEvent::ItemMissingFile { .. } => "Queued report photo missing",
            SyncEvent::Completed { .. } => "Sync completed",
        }
    }
}

/// Broadcast channel of [`CoreEvent`]s.
///
/// Clones share one channel. Sending never blocks; each receiver holds its
/// own copy of every event emitted after it subscribed.
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<CoreEvent>,
}

impl EventBus {
    /// `capacity` bounds how far a receiver may fall behind before it lags.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Returns how many receivers got the event, or an error when there
    /// were none.
    pub fn emit(&self, event: CoreEvent) -> Result<usize, SendError<CoreEvent>> {
        self.sender.send(event)
    }

    /// Past events are not replayed.
    pub fn subscribe(&self) -> Receiver<CoreEvent> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_BUFFER_SIZE)
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("subscriber_count", &self.subscriber_count())
            .finish()
    }
}

type EventFilter = Box<dyn Fn(&CoreEvent) -> bool + Send + Sync>;

/// Receiver that silently skips events rejected by a predicate.
///
/// ```rust
/// use core_runtime::events::{CoreEvent, EventBus, EventStream};
///
/// let bus = EventBus::default();
/// let sessions = EventStream::new(bus.subscribe())
///     .filter(|event| matches!(event, CoreEvent::Session(_)));
/// ```
pub struct EventStream {
    receiver: Receiver<CoreEvent>,
    filter: Option<EventFilter>,
}

impl EventStream {
    pub fn new(receiver: Receiver<CoreEvent>) -> Self {
        Self {
            receiver,
            filter: None,
        }
    }

    /// Replaces any previous predicate.
    pub fn filter<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&CoreEvent) -> bool + Send + Sync + 'static,
    {
        self.filter = Some(Box::new(predicate));
        self
    }

    fn accepts(&self, event: &CoreEvent) -> bool {
        self.filter.as_ref().map_or(true, |filter| filter(event))
    }

    /// Waits for the next accepted event. Lag and close errors pass through
    /// unfiltered.
    pub async fn recv(&mut self) -> Result<CoreEvent, RecvError> {
        loop {
            let event = self.receiver.recv().await?;
            if self.accepts(&event) {
                return Ok(event);
            }
        }
    }

    /// `None` once the buffer holds no accepted event.
    pub fn try_recv(&mut self) -> Option<Result<CoreEvent, RecvError>> {
        loop {
            match self.receiver.try_recv() {
                Ok(event) => {
                    if self.accepts(&event) {
                        return Some(Ok(event));
                    }
                }
                Err(broadcast::error::TryRecvError::Empty) => return None,
                Err(broadcast::error::TryRecvError::Lagged(n)) => {
                    return Some(Err(RecvError::Lagged(n)))
                }
                Err(broadcast::error::TryRecvError::Closed) => return Some(Err(RecvError::Closed)),
            }
        }
    }
}

impl fmt::Debug for EventStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventStream")
            .field("has_filter", &self.filter.is_some())
            .finish()
    }
}
