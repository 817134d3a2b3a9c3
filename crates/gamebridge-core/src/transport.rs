//! Outbound message transports
//!
//! A transport is fire-and-forget: it delivers one envelope and returns.
//! Correlation is layered on top through the envelope's `requestId`.
//!
//! ```text
//! ┌────────────┐  RemoteTransport   ┌──────────────────────┐
//! │ Correlator │ ─────────────────> │ host (HostConnection) │
//! │   / SDK    │                    └──────────────────────┘
//! │            │  LocalTransport    ┌──────────────────────┐   responses
//! │            │ ─────────────────> │ LocalSimulator (+50ms)│ ──────────> router inbox
//! └────────────┘                    └──────────────────────┘
//! ```
//!
//! The variant is chosen once, at `init()`, and never mixed afterwards.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tracing::{debug, trace, warn};

use crate::error::BridgeError;
use crate::protocol::{Envelope, PROTOCOL_VERSION};
use crate::session::{Environment, SharedSession};
use crate::simulator::LocalSimulator;

/// Artificial latency of the local simulator
pub const DEFAULT_LOCAL_DELAY: Duration = Duration::from_millis(50);

/// Delivers envelopes to whatever answers them.
pub trait Transport: Send + Sync {
    /// Which environment this transport serves
    fn environment(&self) -> Environment;

    /// Deliver one envelope. Errors only when the channel is known to be closed.
    fn send(&self, envelope: Envelope) -> Result<(), BridgeError>;
}

/// The game side of a cross-context channel to a host.
pub struct HostConnection {
    /// Messages posted to the host
    pub outbound: mpsc::UnboundedSender<Envelope>,
    /// Messages posted by the host
    pub inbound: mpsc::UnboundedReceiver<Envelope>,
}

/// The host side of a [`HostConnection`].
pub struct HostEndpoint {
    /// Messages the game posted
    pub incoming: mpsc::UnboundedReceiver<Envelope>,
    /// Post a message to the game
    pub outgoing: mpsc::UnboundedSender<Envelope>,
}

impl HostConnection {
    /// Create a connected game/host channel pair.
    pub fn pair() -> (HostConnection, HostEndpoint) {
        let (to_host, from_game) = mpsc::unbounded_channel();
        let (to_game, from_host) = mpsc::unbounded_channel();
        (
            HostConnection {
                outbound: to_host,
                inbound: from_host,
            },
            HostEndpoint {
                incoming: from_game,
                outgoing: to_game,
            },
        )
    }
}

/// Transport to a real host.
pub struct RemoteTransport {
    host: Option<mpsc::UnboundedSender<Envelope>>,
    session: SharedSession,
    source: String,
}

impl RemoteTransport {
    pub fn new(
        host: Option<mpsc::UnboundedSender<Envelope>>,
        session: SharedSession,
        source: impl Into<String>,
    ) -> Self {
        Self {
            host,
            session,
            source: source.into(),
        }
    }
}

impl Transport for RemoteTransport {
    fn environment(&self) -> Environment {
        Environment::Remote
    }

    fn send(&self, mut envelope: Envelope) -> Result<(), BridgeError> {
        let Some(host) = &self.host else {
            warn!(kind = %envelope.kind, "No host channel, dropping message");
            return Ok(());
        };

        envelope.source = Some(self.source.clone());
        envelope.version = Some(PROTOCOL_VERSION.to_string());
        envelope.nonce = self.session.read().nonce.clone();

        trace!(kind = %envelope.kind, request_id = ?envelope.request_id, "Posting to host");
        host.send(envelope)
            .map_err(|e| BridgeError::TransportClosed(format!("host channel closed ({})", e.0.kind)))
    }
}

/// Transport that loops requests back through the [`LocalSimulator`].
pub struct LocalTransport {
    simulator: Arc<LocalSimulator>,
    inbox: mpsc::UnboundedSender<Envelope>,
    delay: Duration,
}

impl LocalTransport {
    /// `inbox` is the router's inbound channel.
    pub fn new(
        simulator: Arc<LocalSimulator>,
        inbox: mpsc::UnboundedSender<Envelope>,
        delay: Duration,
    ) -> Self {
        Self {
            simulator,
            inbox,
            delay,
        }
    }
}

impl Transport for LocalTransport {
    fn environment(&self) -> Environment {
        Environment::Local
    }

    fn send(&self, envelope: Envelope) -> Result<(), BridgeError> {
        if self.inbox.is_closed() {
            return Err(BridgeError::TransportClosed("router stopped".to_string()));
        }

        let simulator = self.simulator.clone();
        let inbox = self.inbox.clone();
        let delay = self.delay;

        // Never answer synchronously, even with a zero delay.
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            tokio::task::yield_now().await;

            if let Some(response) = simulator.handle(&envelope) {
                if inbox.send(response).is_err() {
                    debug!(kind = %envelope.kind, "Router gone, dropping simulated response");
                }
            }
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::MessageType;
    use crate::session::Session;
    use crate::simulator::SimulatorConfig;
    use crate::storage::MemoryStore;
    use parking_lot::RwLock;

    #[test]
    fn test_remote_stamps_envelope() {
        let (conn, mut host) = HostConnection::pair();
        let session = Arc::new(RwLock::new(Session {
            nonce: Some("n-123".to_string()),
            ..Session::default()
        }));
        let transport = RemoteTransport::new(Some(conn.outbound), session, "gamebridge-sdk");

        transport
            .send(Envelope::new(MessageType::DataGet).with_request_id("r1"))
            .unwrap();

        let posted = host.incoming.try_recv().unwrap();
        assert_eq!(posted.source.as_deref(), Some("gamebridge-sdk"));
        assert_eq!(posted.version.as_deref(), Some(PROTOCOL_VERSION));
        assert_eq!(posted.nonce.as_deref(), Some("n-123"));
        assert_eq!(posted.request_id.as_deref(), Some("r1"));
    }

    #[test]
    fn test_remote_without_host_drops_silently() {
        let session = Arc::new(RwLock::new(Session::default()));
        let transport = RemoteTransport::new(None, session, "gamebridge-sdk");
        assert!(transport.send(Envelope::new(MessageType::Ready)).is_ok());
    }

    #[test]
    fn test_remote_closed_host_is_an_error() {
        let (conn, host) = HostConnection::pair();
        drop(host);
        let session = Arc::new(RwLock::new(Session::default()));
        let transport = RemoteTransport::new(Some(conn.outbound), session, "gamebridge-sdk");

        let err = transport.send(Envelope::new(MessageType::Ready)).unwrap_err();
        assert!(matches!(err, BridgeError::TransportClosed(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_local_answers_after_delay() {
        let simulator = Arc::new(LocalSimulator::new(
            Arc::new(MemoryStore::new()),
            SimulatorConfig::default(),
        ));
        let (tx, mut rx) = mpsc::unbounded_channel();
        let transport = LocalTransport::new(simulator, tx, DEFAULT_LOCAL_DELAY);

        let started = tokio::time::Instant::now();
        transport.send(Envelope::new(MessageType::Ready)).unwrap();

        // Nothing is delivered synchronously
        assert!(rx.try_recv().is_err());

        let response = rx.recv().await.unwrap();
        assert_eq!(response.message_type(), Some(MessageType::Init));
        assert!(started.elapsed() >= DEFAULT_LOCAL_DELAY);
    }
}
