//! # Lifecycle Event Bus
//!
//! Broadcasts adapter lifecycle transitions (handle registered/destroyed,
//! listener bound/unbound, late completions dropped) over
//! `tokio::sync::broadcast`, re-exported through `core_async::sync`.
//!
//! ## Overview
//!
//! The adapter never depends on anyone listening. Emission with zero
//! subscribers is silently ignored, so tests and hosts opt in by
//! subscribing:
//!
//! ```rust
//! use core_runtime::events::{EventBus, HandleEvent, LifecycleEvent};
//!
//! # #[tokio::main]
//! # async fn main() {
//! let bus = EventBus::new(16);
//! let mut rx = bus.subscribe();
//!
//! bus.emit(LifecycleEvent::Handle(HandleEvent::Registered {
//!     kind: "Bitmap".to_string(),
//!     handle_id: "bitmap_1".to_string(),
//! }));
//!
//! let event = rx.recv().await.unwrap();
//! assert!(matches!(event, LifecycleEvent::Handle(HandleEvent::Registered { .. })));
//! # }
//! ```
//!
//! ## Lagging Subscribers
//!
//! A subscriber that falls more than the buffer size behind receives
//! `RecvError::Lagged(n)` and can keep going; `RecvError::Closed` means the
//! owning context was dropped.

use core_async::sync::broadcast;
use serde::{Deserialize, Serialize};
use std::fmt;

pub use core_async::sync::broadcast::error::RecvError;
pub use core_async::sync::broadcast::Receiver;

/// Default buffer size for the event bus channel.
pub const DEFAULT_EVENT_BUFFER_SIZE: usize = 100;

// ============================================================================
// Event Types
// ============================================================================

/// Top-level lifecycle event.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", content = "payload")]
pub enum LifecycleEvent {
    /// Handle registry transitions
    Handle(HandleEvent),
    /// Listener identity map transitions
    Binding(BindingEvent),
    /// Pending call outcomes worth observing
    Call(CallEvent),
}

impl LifecycleEvent {
    /// Returns a human-readable description of the event.
    pub fn description(&self) -> &str {
        match self {
            LifecycleEvent::Handle(e) => e.description(),
            LifecycleEvent::Binding(e) => e.description(),
            LifecycleEvent::Call(e) => e.description(),
        }
    }

    /// Returns the severity level of the event.
    pub fn severity(&self) -> EventSeverity {
        match self {
            LifecycleEvent::Handle(HandleEvent::TeardownFailed { .. }) => EventSeverity::Warning,
            LifecycleEvent::Call(CallEvent::LateCompletionDropped { .. }) => {
                EventSeverity::Warning
            }
            LifecycleEvent::Handle(_) => EventSeverity::Info,
            _ => EventSeverity::Debug,
        }
    }

    /// Id of the handle this event concerns.
    pub fn handle_id(&self) -> &str {
        match self {
            LifecycleEvent::Handle(HandleEvent::Registered { handle_id, .. })
            | LifecycleEvent::Handle(HandleEvent::Destroyed { handle_id, .. })
            | LifecycleEvent::Handle(HandleEvent::TeardownFailed { handle_id, .. })
            | LifecycleEvent::Binding(BindingEvent::Bound { handle_id, .. })
            | LifecycleEvent::Binding(BindingEvent::Unbound { handle_id, .. })
            | LifecycleEvent::Binding(BindingEvent::Released { handle_id, .. })
            | LifecycleEvent::Call(CallEvent::LateCompletionDropped { handle_id, .. }) => {
                handle_id
            }
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

/// Handle registry transitions.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum HandleEvent {
    /// A native object was registered and is now Active.
    Registered { kind: String, handle_id: String },
    /// A handle reached Destroyed and left the registry.
    Destroyed { kind: String, handle_id: String },
    /// The native teardown failed; the handle was removed anyway.
    TeardownFailed {
        kind: String,
        handle_id: String,
        code: i64,
        message: String,
    },
}

impl HandleEvent {
    fn description(&self) -> &str {
        match self {
            HandleEvent::Registered { .. } => "Handle registered",
            HandleEvent::Destroyed { .. } => "Handle destroyed",
            HandleEvent::TeardownFailed { .. } => "Native teardown failed",
        }
    }
}

/// Listener identity map transitions.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum BindingEvent {
    Bound { handle_id: String, event_type: String },
    Unbound { handle_id: String, event_type: String },
    /// Every binding of a destroyed owner was released at once.
    Released { handle_id: String, count: usize },
}

impl BindingEvent {
    fn description(&self) -> &str {
        match self {
            BindingEvent::Bound { .. } => "Listener bound",
            BindingEvent::Unbound { .. } => "Listener unbound",
            BindingEvent::Released { .. } => "Owner listeners released",
        }
    }
}

/// Pending call outcomes.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum CallEvent {
    /// A native callback arrived after its handle was destroyed.
    LateCompletionDropped { handle_id: String, method: String },
}

impl CallEvent {
    fn description(&self) -> &str {
        match self {
            CallEvent::LateCompletionDropped { .. } => "Late completion dropped",
        }
    }
}

// ============================================================================
// Event Bus
// ============================================================================

/// Broadcast channel for lifecycle events.
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<LifecycleEvent>,
}

impl EventBus {
    /// Creates a new event bus with the specified buffer size.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is zero; `AdapterConfig::validate` rejects that
    /// before a context is built.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publishes an event to all current subscribers.
    ///
    /// Returns the number of subscribers that received it; zero when nobody
    /// is listening.
    pub fn emit(&self, event: LifecycleEvent) -> usize {
        self.sender.send(event).unwrap_or(0)
    }

    /// Creates a new subscriber. Past events are not replayed.
    pub fn subscribe(&self) -> Receiver<LifecycleEvent> {
        self.sender.subscribe()
    }

    /// Returns the number of active subscribers.
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

/// Type alias for event filter functions.
type EventFilter = Box<dyn Fn(&LifecycleEvent) -> bool + Send + Sync>;

/// A `Receiver` with an optional filter.
///
/// ```rust
/// use core_runtime::events::{EventBus, EventStream, LifecycleEvent};
///
/// let bus = EventBus::new(16);
/// let handle_only = EventStream::new(bus.subscribe())
///     .filter(|event| matches!(event, LifecycleEvent::Handle(_)));
/// ```
pub struct EventStream {
    receiver: Receiver<LifecycleEvent>,
    filter: Option<EventFilter>,
}

impl EventStream {
    pub fn new(receiver: Receiver<LifecycleEvent>) -> Self {
        Self {
            receiver,
            filter: None,
        }
    }

    /// Only events matching `predicate` are returned.
    pub fn filter<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&LifecycleEvent) -> bool + Send + Sync + 'static,
    {
        self.filter = Some(Box::new(predicate));
        self
    }

    fn accepts(&self, event: &LifecycleEvent) -> bool {
        self.filter.as_ref().map_or(true, |filter| filter(event))
    }

    /// Receives the next event that passes the filter.
    pub async fn recv(&mut self) -> Result<LifecycleEvent, RecvError> {
        loop {
            let event = self.receiver.recv().await?;
            if self.accepts(&event) {
                return Ok(event);
            }
        }
    }

    /// Drains every buffered event that passes the filter without waiting.
    ///
    /// Lagged notifications are skipped; the events after the gap are
    /// still returned.
    pub fn drain(&mut self) -> Vec<LifecycleEvent> {
        let mut events = Vec::new();
        loop {
            match self.receiver.try_recv() {
                Ok(event) => {
                    if self.accepts(&event) {
                        events.push(event);
                    }
                }
                Err(broadcast::error::TryRecvError::Lagged(_)) => continue,
                Err(_) => return events,
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

#[cfg(test)]
mod tests {
    use super::*;

    fn registered(id: &str) -> LifecycleEvent {
        LifecycleEvent::Handle(HandleEvent::Registered {
            kind: "Bitmap".to_string(),
            handle_id: id.to_string(),
        })
    }

    #[test]
    fn test_emit_without_subscribers_is_ignored() {
        let bus = EventBus::new(4);
        assert_eq!(bus.emit(registered("a")), 0);
    }

    #[tokio::test]
    async fn test_subscribers_receive_events() {
        let bus = EventBus::new(4);
        let mut first = bus.subscribe();
        let mut second = bus.subscribe();
        assert_eq!(bus.subscriber_count(), 2);

        assert_eq!(bus.emit(registered("a")), 2);
        assert_eq!(first.recv().await.unwrap(), registered("a"));
        assert_eq!(second.recv().await.unwrap(), registered("a"));
    }

    #[test]
    fn test_stream_filter_and_drain() {
        let bus = EventBus::new(8);
        let mut stream = EventStream::new(bus.subscribe())
            .filter(|event| matches!(event, LifecycleEvent::Binding(_)));

        bus.emit(registered("a"));
        bus.emit(LifecycleEvent::Binding(BindingEvent::Bound {
            handle_id: "a".to_string(),
            event_type: "play".to_string(),
        }));

        let events = stream.drain();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].handle_id(), "a");
        assert!(stream.drain().is_empty());
    }

    #[test]
    fn test_severity() {
        let failed = LifecycleEvent::Handle(HandleEvent::TeardownFailed {
            kind: "VideoPlayer".to_string(),
            handle_id: "v".to_string(),
            code: 7,
            message: "busy".to_string(),
        });
        assert_eq!(failed.severity(), EventSeverity::Warning);
        assert_eq!(registered("a").severity(), EventSeverity::Info);
        assert_eq!(failed.description(), "Native teardown failed");
    }

    #[test]
    fn test_event_serialization() {
        let event = LifecycleEvent::Call(CallEvent::LateCompletionDropped {
            handle_id: "bitmap_1".to_string(),
            method: "save".to_string(),
        });

        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("LateCompletionDropped"));
        let back: LifecycleEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(back, event);
    }
}
