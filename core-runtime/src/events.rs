//! # Event Bus System
//!
//! Typed events published by the download and transcode pipelines through a
//! `tokio::sync::broadcast` channel.
//!
//! ## Overview
//!
//! - **Event Types**: [`CoreEvent`] wraps one enum per domain
//! - **EventBus**: Broadcast channel the pipelines publish into
//! - **EventStream**: Receiver wrapper with optional filtering
//!
//! The pipelines never depend on a subscriber being present. Emitting with no
//! subscribers returns an error that callers ignore with `.ok()`.
//!
//! ## Usage
//!
//! ```rust
//! use core_runtime::events::{CoreEvent, EventBus, EventStream, SyncEvent};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let bus = EventBus::new(16);
//! let mut stream = EventStream::new(bus.subscribe())
//!     .filter(|event| matches!(event, CoreEvent::Sync(_)));
//!
//! bus.emit(CoreEvent::Sync(SyncEvent::RemoteRemoved {
//!     remote_path: "/apps/ipcamera/mdalarm_20230615_143022.avi".to_string(),
//! }))
//! .ok();
//!
//! let event = stream.recv().await.unwrap();
//! assert_eq!(event.description(), "Remote file removed");
//! # }
//! ```
//!
//! ## Error Handling
//!
//! - **`RecvError::Lagged(n)`**: the subscriber missed `n` events and can
//!   keep receiving.
//! - **`RecvError::Closed`**: every sender was dropped.

use serde::{Deserialize, Serialize};
use std::fmt;
use tokio::sync::broadcast;

pub use tokio::sync::broadcast::error::{RecvError, SendError};
pub use tokio::sync::broadcast::Receiver;

/// Default buffer size for the event bus channel.
pub const DEFAULT_EVENT_BUFFER_SIZE: usize = 100;

// ============================================================================
// Core Event Types
// ============================================================================

/// Top-level event enum encompassing all event categories.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", content = "payload")]
pub enum CoreEvent {
    /// Download pipeline events
    Sync(SyncEvent),
    /// Transcode step events
    Transcode(TranscodeEvent),
}

impl CoreEvent {
    /// Returns a human-readable description of the event.
    pub fn description(&self) -> &str {
        match self {
            CoreEvent::Sync(e) => e.description(),
            CoreEvent::Transcode(e) => e.description(),
        }
    }

    /// Returns the severity level of the event.
    pub fn severity(&self) -> EventSeverity {
        match self {
            CoreEvent::Sync(SyncEvent::Failed { .. }) => EventSeverity::Error,
            CoreEvent::Transcode(TranscodeEvent::Failed { .. }) => EventSeverity::Error,
            CoreEvent::Sync(SyncEvent::PartialRemoved { .. }) => EventSeverity::Warning,
            CoreEvent::Sync(SyncEvent::Downloaded { .. })
            | CoreEvent::Sync(SyncEvent::RemoteRemoved { .. })
            | CoreEvent::Sync(SyncEvent::Completed { .. })
            | CoreEvent::Transcode(TranscodeEvent::Completed { .. }) => EventSeverity::Info,
            _ => EventSeverity::Debug,
        }
    }
}

/// Event severity levels for filtering and logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EventSeverity {
    Debug,
    Info,
    Warning,
    Error,
}

// ============================================================================
// Sync Events
// ============================================================================

/// Events emitted while downloading alarm videos.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum SyncEvent {
    /// A run started.
    Started {
        /// Unique identifier for this run.
        run_id: String,
        /// Remote folder being listed.
        remote_folder: String,
        /// Absolute local destination root.
        destination_root: String,
        /// Whether every revision is downloaded instead of the latest content.
        by_revision: bool,
    },
    /// The destination already holds the complete file.
    FileSkipped {
        remote_path: String,
        destination: String,
        size: u64,
    },
    /// A partial local file was deleted before fetching again.
    PartialRemoved {
        destination: String,
        local_size: u64,
        remote_size: u64,
    },
    /// A transfer is starting.
    Downloading {
        remote_path: String,
        rev: Option<String>,
        destination: String,
        size: u64,
    },
    /// A transfer finished and its size was verified.
    Downloaded {
        remote_path: String,
        destination: String,
        bytes: u64,
    },
    /// The remote source was deleted after download.
    RemoteRemoved { remote_path: String },
    /// A run processed every entry.
    Completed {
        run_id: String,
        downloaded: u64,
        skipped: u64,
        repaired: u64,
        removed_remote: u64,
        bytes: u64,
        duration_ms: u64,
    },
    /// A run aborted on a fatal error.
    Failed {
        run_id: String,
        message: String,
        /// Offending path or name, when known.
        path: Option<String>,
    },
}

impl SyncEvent {
    fn description(&self) -> &str {
        match self {
            SyncEvent::Started { .. } => "Download run started",
            SyncEvent::FileSkipped { .. } => "File already downloaded",
            SyncEvent::PartialRemoved { .. } => "Partial download removed",
            SyncEvent::Downloading { .. } => "Downloading file",
            SyncEvent::Downloaded { .. } => "File downloaded",
            SyncEvent::RemoteRemoved { .. } => "Remote file removed",
            SyncEvent::Completed { .. } => "Download run completed",
            SyncEvent::Failed { .. } => "Download run failed",
        }
    }
}

// ============================================================================
// Transcode Events
// ============================================================================

/// Events emitted by the transcode step.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum TranscodeEvent {
    /// The destination is newer than the source.
    Skipped { source: String, destination: String },
    /// The encoder is being invoked.
    Started { source: String, destination: String },
    /// The encoder exited successfully.
    Completed {
        source: String,
        destination: String,
        duration_ms: u64,
    },
    /// The encoder could not be started or exited with an error.
    Failed { source: String, message: String },
}

impl TranscodeEvent {
    fn description(&self) -> &str {
        match self {
            TranscodeEvent::Skipped { .. } => "Transcode skipped, output is up to date",
            TranscodeEvent::Started { .. } => "Transcoding",
            TranscodeEvent::Completed { .. } => "Transcode completed",
            TranscodeEvent::Failed { .. } => "Transcode failed",
        }
    }
}

// ============================================================================
// Event Bus
// ============================================================================

/// Broadcast channel for [`CoreEvent`]s.
///
/// Cloning the bus is cheap; every clone publishes into the same channel.
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<CoreEvent>,
}

impl EventBus {
    /// Creates a bus that buffers up to `capacity` events per subscriber.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publishes an event, returning the number of subscribers that got it.
    ///
    /// Fails only when there are no subscribers.
    pub fn emit(&self, event: CoreEvent) -> Result<usize, SendError<CoreEvent>> {
        self.sender.send(event)
    }

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

// ============================================================================
// Event Stream Wrapper
// ============================================================================

type EventFilter = Box<dyn Fn(&CoreEvent) -> bool + Send + Sync>;

/// Receiver that skips events rejected by an optional predicate.
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

    /// Waits for the next event that passes the filter.
    pub async fn recv(&mut self) -> Result<CoreEvent, RecvError> {
        loop {
            let event = self.receiver.recv().await?;
            if self.accepts(&event) {
                return Ok(event);
            }
        }
    }

    /// Returns the next buffered event that passes the filter, if any.
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

    /// Drains every buffered event that passes the filter.
    pub fn drain(&mut self) -> Vec<CoreEvent> {
        let mut events = Vec::new();
        while let Some(result) = self.try_recv() {
            match result {
                Ok(event) => events.push(event),
                Err(RecvError::Lagged(_)) => continue,
                Err(RecvError::Closed) => break,
            }
        }
        events
    }
}

impl fmt::Debug for EventStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventStream")
            .field("has_filter", &self.filter.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn skipped(name: &str) -> CoreEvent {
        CoreEvent::Sync(SyncEvent::FileSkipped {
            remote_path: format!("/apps/ipcamera/{}", name),
            destination: format!("/videos/{}", name),
            size: 1000,
        })
    }

    #[tokio::test]
    async fn test_event_bus_subscription() {
        let bus = EventBus::new(10);
        assert_eq!(bus.subscriber_count(), 0);

        let _sub1 = bus.subscribe();
        let _sub2 = bus.subscribe();
        assert_eq!(bus.subscriber_count(), 2);
    }

    #[tokio::test]
    async fn test_event_emission_no_subscribers() {
        let bus = EventBus::default();
        assert!(bus.emit(skipped("a.avi")).is_err());
    }

    #[tokio::test]
    async fn test_multiple_subscribers_receive_same_event() {
        let bus = EventBus::new(10);
        let mut sub1 = bus.subscribe();
        let mut sub2 = bus.subscribe();

        let event = CoreEvent::Sync(SyncEvent::Started {
            run_id: "run-1".to_string(),
            remote_folder: "/apps/ipcamera".to_string(),
            destination_root: "/videos".to_string(),
            by_revision: false,
        });

        assert_eq!(bus.emit(event.clone()).unwrap(), 2);
        assert_eq!(sub1.recv().await.unwrap(), event);
        assert_eq!(sub2.recv().await.unwrap(), event);
    }

    #[tokio::test]
    async fn test_event_stream_with_filter() {
        let bus = EventBus::new(10);
        let mut stream = EventStream::new(bus.subscribe())
            .filter(|event| matches!(event, CoreEvent::Transcode(_)));

        bus.emit(skipped("a.avi")).ok();
        let transcode = CoreEvent::Transcode(TranscodeEvent::Started {
            source: "/videos/a.avi".to_string(),
            destination: "/videos/a.mp4".to_string(),
        });
        bus.emit(transcode.clone()).ok();

        assert_eq!(stream.recv().await.unwrap(), transcode);
    }

    #[tokio::test]
    async fn test_drain_collects_buffered_events() {
        let bus = EventBus::new(10);
        let mut stream = EventStream::new(bus.subscribe());

        bus.emit(skipped("a.avi")).ok();
        bus.emit(skipped("b.avi")).ok();

        let events = stream.drain();
        assert_eq!(events, vec![skipped("a.avi"), skipped("b.avi")]);
        assert!(stream.try_recv().is_none());
    }

    #[tokio::test]
    async fn test_lagged_subscriber() {
        let bus = EventBus::new(2);
        let mut sub = bus.subscribe();

        for i in 0..5 {
            bus.emit(skipped(&format!("{}.avi", i))).ok();
        }

        assert!(matches!(sub.recv().await, Err(RecvError::Lagged(_))));
    }

    #[test]
    fn test_event_severity() {
        let failed = CoreEvent::Sync(SyncEvent::Failed {
            run_id: "run-1".to_string(),
            message: "destination is not a regular file".to_string(),
            path: Some("/videos/2023-06-15 14-30-22.avi".to_string()),
        });
        assert_eq!(failed.severity(), EventSeverity::Error);

        let partial = CoreEvent::Sync(SyncEvent::PartialRemoved {
            destination: "/videos/2023-06-15 14-30-22.avi".to_string(),
            local_size: 400,
            remote_size: 1000,
        });
        assert_eq!(partial.severity(), EventSeverity::Warning);

        let completed = CoreEvent::Transcode(TranscodeEvent::Completed {
            source: "/videos/a.avi".to_string(),
            destination: "/videos/a.mp4".to_string(),
            duration_ms: 1200,
        });
        assert_eq!(completed.severity(), EventSeverity::Info);

        assert_eq!(skipped("a.avi").severity(), EventSeverity::Debug);
    }

    #[test]
    fn test_event_description() {
        assert_eq!(skipped("a.avi").description(), "File already downloaded");
    }

    #[test]
    fn test_event_serialization() {
        let event = CoreEvent::Sync(SyncEvent::Downloading {
            remote_path: "/apps/ipcamera/mdalarm_20230615_143022.avi".to_string(),
            rev: Some("0002".to_string()),
            destination: "/videos/2023-06-15 14-30-22 0002.avi".to_string(),
            size: 1000,
        });

        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "Sync");
        assert_eq!(json["payload"]["event"], "Downloading");
        assert_eq!(json["payload"]["rev"], "0002");

        let deserialized: CoreEvent = serde_json::from_value(json).unwrap();
        assert_eq!(deserialized, event);
    }
}
