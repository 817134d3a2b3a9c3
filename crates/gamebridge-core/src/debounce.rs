//! Debounced persistence queue
//!
//! Rapid writes to the same key collapse into one `data:set`:
//!
//! ```text
//! set_item("x","a") ──┐
//!                     │  (< window)
//! set_item("x","b") ──┼──> "a" resolves Superseded immediately
//!                     │
//!                     └── window elapses ──> data:set {key:"x", value:"b"} ──> "b" resolves Saved
//! ```
//!
//! Each key has at most one open slot. Different keys never interact.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, trace};

use crate::correlator::RequestCorrelator;
use crate::error::{SdkError, SdkResult};
use crate::protocol::{DataRequest, Envelope, MessageType};

/// Quiet period before a write is sent
pub const DEFAULT_DEBOUNCE_WINDOW: Duration = Duration::from_millis(1000);

/// How a debounced write finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SetOutcome {
    /// The value was written by the host
    Saved,
    /// A later write to the same key replaced this one before it was sent
    Superseded,
}

impl SetOutcome {
    pub fn is_superseded(self) -> bool {
        self == SetOutcome::Superseded
    }
}

/// An open debounce window for one key
struct DebounceSlot {
    generation: u64,
    timer: JoinHandle<()>,
    resolver: oneshot::Sender<SdkResult<SetOutcome>>,
}

type Slots = Arc<Mutex<HashMap<String, DebounceSlot>>>;

/// Per-key write coalescing in front of the correlator.
pub struct DebounceQueue {
    slots: Slots,
    correlator: Arc<RequestCorrelator>,
    window: Duration,
    next_generation: AtomicU64,
}

impl DebounceQueue {
    pub fn new(correlator: Arc<RequestCorrelator>, window: Duration) -> Self {
        Self {
            slots: Arc::new(Mutex::new(HashMap::new())),
            correlator,
            window,
            next_generation: AtomicU64::new(0),
        }
    }

    /// Keys with a write waiting for its window to elapse.
    pub fn pending_keys(&self) -> Vec<String> {
        let mut keys: Vec<_> = self.slots.lock().keys().cloned().collect();
        keys.sort();
        keys
    }

    /// Schedule a write of `value` to `key`, superseding any pending write to
    /// the same key.
    pub async fn set_item(&self, key: String, value: String) -> SdkResult<SetOutcome> {
        let (tx, rx) = oneshot::channel();
        let generation = self.next_generation.fetch_add(1, Ordering::Relaxed);

        {
            let mut slots = self.slots.lock();

            if let Some(previous) = slots.remove(&key) {
                previous.timer.abort();
                let _ = previous.resolver.send(Ok(SetOutcome::Superseded));
                debug!(key = %key, "Pending write superseded");
            }

            // The timer can't observe the table before the insert below: it
            // needs this lock first.
            let timer = tokio::spawn(flush_after(
                self.slots.clone(),
                self.correlator.clone(),
                self.window,
                key.clone(),
                value,
                generation,
            ));

            slots.insert(
                key,
                DebounceSlot {
                    generation,
                    timer,
                    resolver: tx,
                },
            );
        }

        rx.await
            .unwrap_or_else(|_| Err(SdkError::network("write was dropped before it was sent")))
    }
}

impl Drop for DebounceQueue {
    fn drop(&mut self) {
        for (_, slot) in self.slots.lock().drain() {
            slot.timer.abort();
        }
    }
}

async fn flush_after(
    slots: Slots,
    correlator: Arc<RequestCorrelator>,
    window: Duration,
    key: String,
    value: String,
    generation: u64,
) {
    tokio::time::sleep(window).await;

    let resolver = {
        let mut slots = slots.lock();
        // Superseded after the timer fired: the newer slot owns the key.
        let owned = slots
            .get(&key)
            .is_some_and(|slot| slot.generation == generation);
        if owned {
            slots.remove(&key).map(|slot| slot.resolver)
        } else {
            None
        }
    };
    let Some(resolver) = resolver else {
        return;
    };

    trace!(key = %key, "Debounce window elapsed, writing");
    let request = DataRequest {
        key: Some(key),
        value: Some(value),
    };
    let result = match Envelope::with_body(MessageType::DataSet, &request) {
        Ok(envelope) => {
            let response = correlator.dispatch(envelope).await;
            match response.error() {
                Some(err) => Err(err),
                None => Ok(SetOutcome::Saved),
            }
        }
        Err(e) => Err(SdkError::from(e)),
    };

    let _ = resolver.send(result);
}
