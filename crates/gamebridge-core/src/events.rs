//! SDK events and the observer registry that delivers them.
//!
//! ## Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │  EventRegistry                                                  │
//! │  ├── listeners: HashMap<EventKind, Vec<(ListenerId, Callback)>> │
//! │  │   └── Notified in registration order                        │
//! │  │                                                              │
//! │  └── event_tx: broadcast::Sender<BridgeEvent>                   │
//! │      └── Async subscribers (lossy when they lag)               │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! A panicking callback is caught and logged; the remaining callbacks for
//! the same event still run.

use std::collections::HashMap;
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use tokio::sync::broadcast;
use tracing::error;

use crate::protocol::ErrorCode;
use crate::session::{Environment, User};

/// Capacity of the async event channel
const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Event names callers can subscribe to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Init,
    Error,
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EventKind::Init => write!(f, "init"),
            EventKind::Error => write!(f, "error"),
        }
    }
}

/// Events emitted by the SDK
#[derive(Debug, Clone, PartialEq)]
pub enum BridgeEvent {
    /// The handshake completed
    Init {
        environment: Environment,
        user: Option<User>,
    },
    /// An operation failed (timeout, host-reported error)
    Error {
        /// Operation name, e.g. `data:get` or `init`
        operation: String,
        code: ErrorCode,
        message: String,
    },
}

impl BridgeEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            BridgeEvent::Init { .. } => EventKind::Init,
            BridgeEvent::Error { .. } => EventKind::Error,
        }
    }
}

/// Handle returned by [`EventRegistry::on`], used to unsubscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

/// Callback invoked for each matching event.
pub type Listener = Arc<dyn Fn(&BridgeEvent) + Send + Sync>;

/// Observer registry: event kind → ordered list of callbacks.
pub struct EventRegistry {
    listeners: RwLock<HashMap<EventKind, Vec<(ListenerId, Listener)>>>,
    next_id: AtomicU64,
    event_tx: broadcast::Sender<BridgeEvent>,
}

impl EventRegistry {
    pub fn new() -> Self {
        let (event_tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            listeners: RwLock::new(HashMap::new()),
            next_id: AtomicU64::new(1),
            event_tx,
        }
    }

    /// Register a callback for `kind`.
    pub fn on<F>(&self, kind: EventKind, callback: F) -> ListenerId
    where
        F: Fn(&BridgeEvent) + Send + Sync + 'static,
    {
        let id = ListenerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.listeners
            .write()
            .entry(kind)
            .or_default()
            .push((id, Arc::new(callback)));
        id
    }

    /// Remove a callback. Returns `false` if it was not registered.
    pub fn off(&self, kind: EventKind, id: ListenerId) -> bool {
        let mut listeners = self.listeners.write();
        let Some(list) = listeners.get_mut(&kind) else {
            return false;
        };
        let before = list.len();
        list.retain(|(lid, _)| *lid != id);
        before != list.len()
    }

    /// Subscribe to every event through a broadcast channel.
    pub fn subscribe(&self) -> broadcast::Receiver<BridgeEvent> {
        self.event_tx.subscribe()
    }

    pub fn listener_count(&self, kind: EventKind) -> usize {
        self.listeners.read().get(&kind).map(Vec::len).unwrap_or(0)
    }

    /// Deliver an event to every callback registered for its kind, then to
    /// broadcast subscribers.
    pub fn emit(&self, event: &BridgeEvent) {
        let kind = event.kind();

        // Snapshot so callbacks may call on()/off() without deadlocking.
        let snapshot: Vec<(ListenerId, Listener)> = self
            .listeners
            .read()
            .get(&kind)
            .cloned()
            .unwrap_or_default();

        for (id, callback) in snapshot {
            if catch_unwind(AssertUnwindSafe(|| callback(event))).is_err() {
                error!(event = %kind, listener = id.0, "Event listener panicked");
            }
        }

        // No subscribers is fine
        let _ = self.event_tx.send(event.clone());
    }
}

impl Default for EventRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    fn error_event() -> BridgeEvent {
        BridgeEvent::Error {
            operation: "data:get".to_string(),
            code: ErrorCode::Timeout,
            message: "Request timed out".to_string(),
        }
    }

    #[test]
    fn test_listeners_notified_in_registration_order() {
        let registry = EventRegistry::new();
        let seen = Arc::new(Mutex::new(Vec::new()));

        for n in 0..3 {
            let seen = seen.clone();
            registry.on(EventKind::Error, move |_| seen.lock().push(n));
        }

        registry.emit(&error_event());
        assert_eq!(*seen.lock(), vec![0, 1, 2]);
    }

    #[test]
    fn test_only_matching_kind_is_notified() {
        let registry = EventRegistry::new();
        let hits = Arc::new(Mutex::new(0));
        let h = hits.clone();
        registry.on(EventKind::Init, move |_| *h.lock() += 1);

        registry.emit(&error_event());
        assert_eq!(*hits.lock(), 0);

        registry.emit(&BridgeEvent::Init {
            environment: Environment::Local,
            user: None,
        });
        assert_eq!(*hits.lock(), 1);
    }

    #[test]
    fn test_off_removes_listener() {
        let registry = EventRegistry::new();
        let hits = Arc::new(Mutex::new(0));
        let h = hits.clone();
        let id = registry.on(EventKind::Error, move |_| *h.lock() += 1);

        assert!(registry.off(EventKind::Error, id));
        assert!(!registry.off(EventKind::Error, id));
        assert!(!registry.off(EventKind::Init, id));

        registry.emit(&error_event());
        assert_eq!(*hits.lock(), 0);
        assert_eq!(registry.listener_count(EventKind::Error), 0);
    }

    #[test]
    fn test_panicking_listener_does_not_stop_others() {
        let registry = EventRegistry::new();
        let hits = Arc::new(Mutex::new(0));

        registry.on(EventKind::Error, |_| panic!("bad observer"));
        let h = hits.clone();
        registry.on(EventKind::Error, move |_| *h.lock() += 1);

        registry.emit(&error_event());
        assert_eq!(*hits.lock(), 1);
    }

    #[tokio::test]
    async fn test_subscribe_receives_events() {
        let registry = EventRegistry::new();
        let mut rx = registry.subscribe();

        registry.emit(&error_event());

        let received = rx.recv().await.expect("Should receive event");
        assert_eq!(received.kind(), EventKind::Error);
    }
}
