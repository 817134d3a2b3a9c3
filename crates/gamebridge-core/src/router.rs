//! Inbound message router
//!
//! The router is the single consumer of messages arriving from the host (or
//! the local simulator). It demultiplexes them:
//!
//! ```text
//! inbound ──> MessageRouter ──┬── init ─────────────> Session::initialize + Init event
//!                             ├── error ────────────> Error event (+ resolve if correlated)
//!                             ├── *:response ───────> RequestCorrelator::resolve
//!                             └── anything else ────> dropped
//! ```

use std::sync::Arc;

use parking_lot::Mutex;
use serde_json::Value;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::correlator::RequestCorrelator;
use crate::events::{BridgeEvent, EventRegistry};
use crate::error::SdkError;
use crate::protocol::{Envelope, MessageType};
use crate::session::{Environment, InitPayload, SharedSession};

/// Demultiplexes inbound messages.
pub struct MessageRouter {
    environment: Environment,
    source: String,
    session: SharedSession,
    correlator: Arc<RequestCorrelator>,
    events: Arc<EventRegistry>,
    handshake: Mutex<Option<oneshot::Sender<()>>>,
}

impl MessageRouter {
    /// `source` is our own outbound source tag; messages carrying it are
    /// echoes and are ignored.
    pub fn new(
        environment: Environment,
        source: impl Into<String>,
        session: SharedSession,
        correlator: Arc<RequestCorrelator>,
        events: Arc<EventRegistry>,
    ) -> Self {
        Self {
            environment,
            source: source.into(),
            session,
            correlator,
            events,
            handshake: Mutex::new(None),
        }
    }

    /// Wait for the next `init` message to be applied.
    ///
    /// Replaces any earlier waiter.
    pub fn expect_handshake(&self) -> oneshot::Receiver<()> {
        let (tx, rx) = oneshot::channel();
        *self.handshake.lock() = Some(tx);
        rx
    }

    /// Drain `inbound` on a background task until every sender is gone.
    pub fn spawn(self: Arc<Self>, mut inbound: mpsc::UnboundedReceiver<Envelope>) -> JoinHandle<()> {
        tokio::spawn(async move {
            while let Some(envelope) = inbound.recv().await {
                self.route(envelope);
            }
            debug!("Inbound channel closed, router stopping");
        })
    }

    /// Handle one inbound message.
    pub fn route(&self, envelope: Envelope) {
        if envelope.source.as_deref() == Some(self.source.as_str()) {
            return;
        }

        match envelope.message_type() {
            Some(MessageType::Init) => self.on_init(&envelope),
            Some(MessageType::Error) => self.on_error(envelope),
            Some(MessageType::DataResponse) | Some(MessageType::LeaderboardResponse) => {
                match envelope.request_id.clone() {
                    Some(id) => {
                        self.correlator.resolve(&id, envelope);
                    }
                    None => debug!(kind = %envelope.kind, "Response without requestId dropped"),
                }
            }
            _ => debug!(kind = %envelope.kind, "Ignoring unexpected inbound message"),
        }
    }

    fn on_init(&self, envelope: &Envelope) {
        let init: InitPayload = match envelope.decode() {
            Ok(init) => init,
            Err(e) => {
                warn!(error = %e, "Malformed init message");
                return;
            }
        };
        let user = init.user.clone();

        if let Err(e) = self.session.write().initialize(self.environment, init) {
            warn!(error = %e, "Ignoring repeated handshake");
            return;
        }

        info!(
            environment = %self.environment,
            user_id = user.as_ref().map(|u| u.id.as_str()).unwrap_or("<none>"),
            "Session initialized"
        );

        self.events.emit(&BridgeEvent::Init {
            environment: self.environment,
            user,
        });

        if let Some(waiter) = self.handshake.lock().take() {
            let _ = waiter.send(());
        }
    }

    fn on_error(&self, envelope: Envelope) {
        let operation = envelope.field::<String>("operation").unwrap_or_default();
        let error = envelope
            .error()
            .unwrap_or_else(|| SdkError::from_host(&Value::Object(envelope.payload.clone())));

        warn!(
            operation = %operation,
            code = %error.code,
            message = %error.message,
            "Host reported an error"
        );
        self.events.emit(&BridgeEvent::Error {
            operation,
            code: error.code,
            message: error.message.clone(),
        });

        // A correlated error also answers its request.
        if let Some(id) = envelope.request_id.clone() {
            let mut response = envelope;
            response.payload.remove("code");
            response.payload.remove("message");
            response.insert(
                "error",
                serde_json::json!({ "code": error.code, "message": error.message }),
            );
            self.correlator.resolve(&id, response);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::correlator::DEFAULT_REQUEST_TIMEOUT;
    use crate::events::EventKind;
    use crate::protocol::{ErrorCode, SDK_SOURCE};
    use crate::session::{Session, User};
    use parking_lot::RwLock;

    fn router(environment: Environment) -> (MessageRouter, SharedSession, Arc<EventRegistry>) {
        let session = Arc::new(RwLock::new(Session::new()));
        let events = Arc::new(EventRegistry::new());
        let correlator = Arc::new(RequestCorrelator::new(events.clone(), DEFAULT_REQUEST_TIMEOUT));
        let router = MessageRouter::new(
            environment,
            SDK_SOURCE,
            session.clone(),
            correlator,
            events.clone(),
        );
        (router, session, events)
    }

    fn init_message(user_id: &str) -> Envelope {
        let init = InitPayload {
            user: Some(User {
                id: user_id.to_string(),
                ..User::local()
            }),
            config: Default::default(),
            nonce: Some("nonce-1".to_string()),
        };
        Envelope::with_body(MessageType::Init, &init).unwrap()
    }

    #[tokio::test]
    async fn test_init_applies_session_once() {
        let (router, session, events) = router(Environment::Remote);
        let inits = Arc::new(Mutex::new(0));
        let i = inits.clone();
        events.on(EventKind::Init, move |_| *i.lock() += 1);

        let waiter = router.expect_handshake();
        router.route(init_message("u-1"));
        waiter.await.unwrap();

        router.route(init_message("u-2"));

        let session = session.read();
        assert!(session.initialized);
        assert_eq!(session.environment, Environment::Remote);
        assert_eq!(session.user.as_ref().unwrap().id, "u-1");
        assert_eq!(session.nonce.as_deref(), Some("nonce-1"));
        assert_eq!(*inits.lock(), 1);
    }

    #[test]
    fn test_error_push_emits_event() {
        let (router, _, events) = router(Environment::Remote);
        let seen = Arc::new(Mutex::new(Vec::new()));
        let s = seen.clone();
        events.on(EventKind::Error, move |ev| s.lock().push(ev.clone()));

        let mut message = Envelope::new(MessageType::Error);
        message.insert("operation", "leaderboard:submit");
        message.insert("code", "rate_limited");
        message.insert("message", "slow down");
        router.route(message);

        assert_eq!(
            *seen.lock(),
            vec![BridgeEvent::Error {
                operation: "leaderboard:submit".to_string(),
                code: ErrorCode::RateLimited,
                message: "slow down".to_string(),
            }]
        );
    }

    #[test]
    fn test_error_push_without_known_code_still_emits() {
        let (router, _, events) = router(Environment::Remote);
        let seen = Arc::new(Mutex::new(Vec::new()));
        let s = seen.clone();
        events.on(EventKind::Error, move |ev| s.lock().push(ev.clone()));

        let mut missing = Envelope::new(MessageType::Error);
        missing.insert("message", "host exploded");
        router.route(missing);

        let mut upper = Envelope::new(MessageType::Error);
        upper.insert("operation", "data:set");
        upper.insert("code", "QUOTA_EXCEEDED");
        router.route(upper);

        let seen = seen.lock();
        assert_eq!(seen.len(), 2);
        assert!(matches!(
            &seen[0],
            BridgeEvent::Error { code: ErrorCode::NetworkError, message, .. }
                if message.contains("host exploded")
        ));
        assert!(matches!(
            &seen[1],
            BridgeEvent::Error { code: ErrorCode::QuotaExceeded, operation, .. }
                if operation == "data:set"
        ));
    }

    #[test]
    fn test_echoes_are_ignored() {
        let (router, session, _) = router(Environment::Remote);
        let mut echo = init_message("u-1");
        echo.source = Some(SDK_SOURCE.to_string());

        router.route(echo);
        assert!(!session.read().initialized);
    }

    #[test]
    fn test_unknown_and_uncorrelated_messages_are_dropped() {
        let (router, session, _) = router(Environment::Local);
        router.route(Envelope::new(MessageType::DataResponse));
        router.route(Envelope::from_json(r#"{"type":"host:mystery"}"#).unwrap());
        assert!(!session.read().initialized);
    }
}
