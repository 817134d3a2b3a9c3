//! Request/response correlation
//!
//! Every correlated request gets a fresh ULID `requestId` and an entry in the
//! pending table. The entry is resolved exactly once, by whichever happens
//! first:
//!
//! - a response with the same `requestId` arrives ([`RequestCorrelator::resolve`])
//! - the deadline passes (synthetic `timeout` response + `error` event)
//!
//! Whoever removes the entry from the table owns the resolution, so a late
//! response after a timeout is simply dropped.

use std::collections::HashMap;
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::oneshot;
use tokio::time::Instant;
use tracing::{debug, warn};
use ulid::Ulid;

use crate::error::SdkError;
use crate::events::{BridgeEvent, EventRegistry};
use crate::protocol::{Envelope, MessageType};
use crate::transport::Transport;

/// Deadline for every correlated request
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_millis(5000);

/// A request waiting for its response
struct PendingRequest {
    operation: String,
    resolver: oneshot::Sender<Envelope>,
    deadline: Instant,
}

type PendingTable = Mutex<HashMap<String, PendingRequest>>;

/// Removes a pending entry if the dispatching future is dropped early.
struct PendingGuard<'a> {
    pending: &'a PendingTable,
    request_id: &'a str,
}

impl Drop for PendingGuard<'_> {
    fn drop(&mut self) {
        self.pending.lock().remove(self.request_id);
    }
}

/// Tracks outstanding requests and matches responses to them.
pub struct RequestCorrelator {
    pending: PendingTable,
    transport: OnceLock<Arc<dyn Transport>>,
    events: Arc<EventRegistry>,
    timeout: Duration,
}

impl RequestCorrelator {
    pub fn new(events: Arc<EventRegistry>, timeout: Duration) -> Self {
        Self {
            pending: Mutex::new(HashMap::new()),
            transport: OnceLock::new(),
            events,
            timeout,
        }
    }

    /// Attach the transport. Only the first call takes effect.
    pub fn attach(&self, transport: Arc<dyn Transport>) -> bool {
        self.transport.set(transport).is_ok()
    }

    pub fn transport(&self) -> Option<&Arc<dyn Transport>> {
        self.transport.get()
    }

    /// Number of requests still waiting for a response.
    pub fn pending_count(&self) -> usize {
        self.pending.lock().len()
    }

    /// Send `request` and wait for its response.
    ///
    /// Never fails out of band: transport failures and timeouts come back as
    /// a response envelope carrying an `error` field.
    pub async fn dispatch(&self, request: Envelope) -> Envelope {
        let operation = request.kind.clone();
        let response_kind = request
            .message_type()
            .and_then(MessageType::response_type)
            .unwrap_or(MessageType::Error);

        let Some(transport) = self.transport.get() else {
            return Envelope::error_response(response_kind, None, &SdkError::not_initialized());
        };

        let request_id = Ulid::new().to_string();
        let (tx, mut rx) = oneshot::channel();
        self.pending.lock().insert(
            request_id.clone(),
            PendingRequest {
                operation: operation.clone(),
                resolver: tx,
                deadline: Instant::now() + self.timeout,
            },
        );
        let _guard = PendingGuard {
            pending: &self.pending,
            request_id: &request_id,
        };

        debug!(operation = %operation, request_id = %request_id, "Dispatching request");

        if let Err(e) = transport.send(request.with_request_id(request_id.clone())) {
            self.pending.lock().remove(&request_id);
            warn!(operation = %operation, error = %e, "Transport failed");
            let err = SdkError::network(e.to_string());
            self.emit_error(&operation, &err);
            return Envelope::error_response(response_kind, Some(request_id.clone()), &err);
        }

        match tokio::time::timeout(self.timeout, &mut rx).await {
            Ok(Ok(response)) => response,
            Ok(Err(_)) => {
                let err = SdkError::network("request was dropped before a response arrived");
                Envelope::error_response(response_kind, Some(request_id.clone()), &err)
            }
            Err(_) => {
                let expired = self.pending.lock().remove(&request_id);
                match expired {
                    Some(entry) => {
                        warn!(
                            operation = %entry.operation,
                            request_id = %request_id,
                            timeout_ms = self.timeout.as_millis() as u64,
                            "Request timed out"
                        );
                        let err = SdkError::timeout(&entry.operation);
                        self.emit_error(&entry.operation, &err);
                        Envelope::error_response(response_kind, Some(request_id.clone()), &err)
                    }
                    // A response claimed the entry just as the deadline hit.
                    None => rx.await.unwrap_or_else(|_| {
                        let err = SdkError::network("request was dropped before a response arrived");
                        Envelope::error_response(response_kind, Some(request_id.clone()), &err)
                    }),
                }
            }
        }
    }

    /// Resolve the pending request `request_id` with `response`.
    ///
    /// Returns `false` for unknown ids (late, duplicate or unsolicited).
    pub fn resolve(&self, request_id: &str, response: Envelope) -> bool {
        let Some(entry) = self.pending.lock().remove(request_id) else {
            debug!(request_id = %request_id, "Dropping response for unknown request");
            return false;
        };

        let remaining = entry.deadline.saturating_duration_since(Instant::now());
        debug!(
            operation = %entry.operation,
            request_id = %request_id,
            remaining_ms = remaining.as_millis() as u64,
            "Request resolved"
        );
        // Receiver gone means the caller stopped waiting; nothing to do.
        let _ = entry.resolver.send(response);
        true
    }

    fn emit_error(&self, operation: &str, err: &SdkError) {
        self.events.emit(&BridgeEvent::Error {
            operation: operation.to_string(),
            code: err.code,
            message: err.message.clone(),
        });
    }
}
