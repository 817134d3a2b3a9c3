//! Public facade
//!
//! [`GameBridge`] is the only type game code needs. It validates input,
//! checks that the session is initialized, and delegates to the correlator,
//! the debounce queue, or the transport. It owns no protocol logic itself.
//!
//! ## Example
//!
//! ```ignore
//! use gamebridge_core::{GameBridge, Submission};
//!
//! let bridge = GameBridge::builder().build();
//! bridge.init().await?;
//!
//! bridge.data().set_item("level", "3").await?;
//! let level = bridge.data().get_item("level").await?;
//!
//! if bridge.user().is_logged_in() {
//!     let outcome = bridge
//!         .leaderboard()
//!         .submit(Submission::new("Ada", "18.5s", 18.5).with_key("speed"))
//!         .await?;
//!     println!("rank: {:?}", outcome.rank);
//! }
//! ```

use std::mem;
use std::sync::{Arc, OnceLock};

use parking_lot::{Mutex, RwLock};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::BridgeConfig;
use crate::correlator::RequestCorrelator;
use crate::debounce::{DebounceQueue, SetOutcome};
use crate::error::{SdkError, SdkResult};
use crate::events::{BridgeEvent, EventKind, EventRegistry, ListenerId};
use crate::leaderboard::{clamp_limit, LeaderboardPage, RankedEntry, Submission, SubmitOutcome};
use crate::protocol::{DataRequest, Envelope, GameEventKind, GameEventPayload, MessageType};
use crate::router::MessageRouter;
use crate::session::{ContainerSize, Environment, Languages, Session, SharedSession, User};
use crate::simulator::{LocalSimulator, SimulatorConfig};
use crate::storage::{LocalStore, MemoryStore};
use crate::transport::{HostConnection, LocalTransport, RemoteTransport, Transport};

/// Builder for [`GameBridge`].
#[derive(Default)]
pub struct GameBridgeBuilder {
    config: BridgeConfig,
    host: Option<HostConnection>,
    store: Option<Arc<dyn LocalStore>>,
    simulator: SimulatorConfig,
}

impl GameBridgeBuilder {
    pub fn config(mut self, config: BridgeConfig) -> Self {
        self.config = config;
        self
    }

    /// Talk to a real host. Without one, `init()` falls back to the local simulator.
    pub fn host(mut self, host: HostConnection) -> Self {
        self.host = Some(host);
        self
    }

    /// Storage for the local simulator (defaults to an in-memory store).
    pub fn store(mut self, store: Arc<dyn LocalStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn simulator(mut self, simulator: SimulatorConfig) -> Self {
        self.simulator = simulator;
        self
    }

    pub fn build(self) -> GameBridge {
        let events = Arc::new(EventRegistry::new());
        let correlator = Arc::new(RequestCorrelator::new(
            events.clone(),
            self.config.request_timeout(),
        ));
        let debounce = DebounceQueue::new(correlator.clone(), self.config.debounce_window());
        let store = self
            .store
            .unwrap_or_else(|| Arc::new(MemoryStore::new()));

        GameBridge {
            inner: Arc::new(Inner {
                session: Arc::new(RwLock::new(Session::new())),
                simulator: Arc::new(LocalSimulator::new(store, self.simulator)),
                host: Mutex::new(self.host),
                router: OnceLock::new(),
                router_task: Mutex::new(None),
                init_lock: tokio::sync::Mutex::new(()),
                game: Mutex::new(GameState::default()),
                config: self.config,
                events,
                correlator,
                debounce,
            }),
        }
    }
}

/// Lifecycle flags reported through `game:event`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameState {
    pub gameplay_active: bool,
    pub loading: bool,
}

struct Inner {
    config: BridgeConfig,
    session: SharedSession,
    events: Arc<EventRegistry>,
    correlator: Arc<RequestCorrelator>,
    debounce: DebounceQueue,
    simulator: Arc<LocalSimulator>,
    host: Mutex<Option<HostConnection>>,
    router: OnceLock<Arc<MessageRouter>>,
    router_task: Mutex<Option<JoinHandle<()>>>,
    init_lock: tokio::sync::Mutex<()>,
    game: Mutex<GameState>,
}

impl Drop for Inner {
    fn drop(&mut self) {
        if let Some(task) = self.router_task.lock().take() {
            task.abort();
        }
    }
}

/// Handle to the SDK. Cheap to clone; clones share one session.
#[derive(Clone)]
pub struct GameBridge {
    inner: Arc<Inner>,
}

impl GameBridge {
    pub fn builder() -> GameBridgeBuilder {
        GameBridgeBuilder::default()
    }

    /// Perform the handshake with the host (or the local simulator).
    ///
    /// The transport is chosen on the first call. Once the session is
    /// initialized further calls return immediately.
    pub async fn init(&self) -> SdkResult<Environment> {
        let _guard = self.inner.init_lock.lock().await;
        if let Some(environment) = self.initialized_environment() {
            return Ok(environment);
        }

        let router = self.ensure_router();
        let Some(transport) = self.inner.correlator.transport().cloned() else {
            return Err(SdkError::not_initialized());
        };
        let environment = transport.environment();

        let handshake = router.expect_handshake();
        // An unsolicited init may have been routed before the waiter existed.
        if let Some(environment) = self.initialized_environment() {
            return Ok(environment);
        }

        info!(environment = %environment, "Starting handshake");
        if let Err(e) = transport.send(Envelope::new(MessageType::Ready)) {
            let err = SdkError::from(e);
            self.emit_error("init", &err);
            return Err(err);
        }

        match tokio::time::timeout(self.inner.config.request_timeout(), handshake).await {
            Ok(Ok(())) => Ok(environment),
            Ok(Err(_)) => Err(SdkError::network("handshake abandoned")),
            Err(_) => {
                warn!(environment = %environment, "Handshake timed out");
                let err = SdkError::timeout("init");
                self.emit_error("init", &err);
                Err(err)
            }
        }
    }

    /// Current environment (`Uninitialized` until `init()` completes).
    pub fn environment(&self) -> Environment {
        self.inner.session.read().environment
    }

    pub fn is_initialized(&self) -> bool {
        self.inner.session.read().initialized
    }

    /// Snapshot of the session state.
    pub fn session(&self) -> Session {
        self.inner.session.read().clone()
    }

    pub fn config(&self) -> &BridgeConfig {
        &self.inner.config
    }

    /// Register an event callback.
    pub fn on<F>(&self, kind: EventKind, callback: F) -> ListenerId
    where
        F: Fn(&BridgeEvent) + Send + Sync + 'static,
    {
        self.inner.events.on(kind, callback)
    }

    /// Unregister an event callback.
    pub fn off(&self, kind: EventKind, id: ListenerId) -> bool {
        self.inner.events.off(kind, id)
    }

    /// Receive every event on a broadcast channel.
    pub fn subscribe(&self) -> tokio::sync::broadcast::Receiver<BridgeEvent> {
        self.inner.events.subscribe()
    }

    pub fn user(&self) -> UserApi<'_> {
        UserApi { bridge: self }
    }

    pub fn data(&self) -> DataApi<'_> {
        DataApi { bridge: self }
    }

    pub fn leaderboard(&self) -> LeaderboardApi<'_> {
        LeaderboardApi { bridge: self }
    }

    pub fn game(&self) -> GameApi<'_> {
        GameApi { bridge: self }
    }

    pub fn log(&self) -> LogApi {
        LogApi
    }

    fn initialized_environment(&self) -> Option<Environment> {
        let session = self.inner.session.read();
        session.initialized.then_some(session.environment)
    }

    /// Select the transport and start the router, once.
    fn ensure_router(&self) -> Arc<MessageRouter> {
        let inner = &self.inner;
        if let Some(router) = inner.router.get() {
            return router.clone();
        }

        let host = inner.host.lock().take();
        let (transport, inbound): (Arc<dyn Transport>, _) = match host {
            Some(conn) => (
                Arc::new(RemoteTransport::new(
                    Some(conn.outbound),
                    inner.session.clone(),
                    inner.config.source.clone(),
                )),
                conn.inbound,
            ),
            None => {
                let (tx, rx) = mpsc::unbounded_channel();
                (
                    Arc::new(LocalTransport::new(
                        inner.simulator.clone(),
                        tx,
                        inner.config.local_delay(),
                    )),
                    rx,
                )
            }
        };

        let environment = transport.environment();
        inner.correlator.attach(transport);

        let router = Arc::new(MessageRouter::new(
            environment,
            inner.config.source.clone(),
            inner.session.clone(),
            inner.correlator.clone(),
            inner.events.clone(),
        ));
        *inner.router_task.lock() = Some(router.clone().spawn(inbound));
        let _ = inner.router.set(router.clone());

        debug!(environment = %environment, "Transport selected");
        router
    }

    fn require_initialized(&self) -> SdkResult<()> {
        if self.is_initialized() {
            Ok(())
        } else {
            Err(SdkError::not_initialized())
        }
    }

    /// Dispatch a correlated request; host-reported errors become `Err`.
    async fn request<T: Serialize>(&self, kind: MessageType, body: &T) -> SdkResult<Envelope> {
        let envelope = Envelope::with_body(kind, body)?;
        let response = self.inner.correlator.dispatch(envelope).await;
        match response.error() {
            Some(err) => Err(err),
            None => Ok(response),
        }
    }

    fn emit_error(&self, operation: &str, err: &SdkError) {
        self.inner.events.emit(&BridgeEvent::Error {
            operation: operation.to_string(),
            code: err.code,
            message: err.message.clone(),
        });
    }
}

fn validate_key(key: &str) -> SdkResult<()> {
    if key.is_empty() {
        return Err(SdkError::invalid_input("key must be a non-empty string"));
    }
    Ok(())
}

fn decode_response<T: DeserializeOwned>(response: &Envelope) -> SdkResult<T> {
    response
        .decode()
        .map_err(|e| SdkError::network(format!("Malformed host response: {}", e)))
}

/// User and session metadata.
pub struct UserApi<'a> {
    bridge: &'a GameBridge,
}

impl UserApi<'_> {
    pub fn get(&self) -> Option<User> {
        self.bridge.inner.session.read().user.clone()
    }

    pub fn is_logged_in(&self) -> bool {
        self.bridge.inner.session.read().is_logged_in()
    }

    pub fn languages(&self) -> Languages {
        self.get().map(|u| u.languages).unwrap_or_default()
    }

    /// Distinct non-empty language tags, most preferred first.
    pub fn locales(&self) -> Vec<String> {
        let languages = self.languages();
        let mut locales = Vec::with_capacity(2);
        for tag in [languages.primary, languages.secondary] {
            if !tag.is_empty() && !locales.contains(&tag) {
                locales.push(tag);
            }
        }
        locales
    }

    pub fn container_size(&self) -> ContainerSize {
        self.bridge
            .inner
            .session
            .read()
            .config
            .container_size()
            .unwrap_or_default()
    }
}

/// Key/value persistence.
pub struct DataApi<'a> {
    bridge: &'a GameBridge,
}

impl DataApi<'_> {
    pub async fn get_item(&self, key: &str) -> SdkResult<Option<String>> {
        self.bridge.require_initialized()?;
        validate_key(key)?;

        let request = DataRequest {
            key: Some(key.to_string()),
            value: None,
        };
        let response = self.bridge.request(MessageType::DataGet, &request).await?;
        Ok(response.field::<String>("value"))
    }

    /// Debounced write. Resolves `Superseded` if a later write to the same
    /// key replaces this one before it is sent.
    pub async fn set_item(&self, key: &str, value: impl Into<String>) -> SdkResult<SetOutcome> {
        self.bridge.require_initialized()?;
        validate_key(key)?;

        self.bridge
            .inner
            .debounce
            .set_item(key.to_string(), value.into())
            .await
    }

    pub async fn remove_item(&self, key: &str) -> SdkResult<()> {
        self.bridge.require_initialized()?;
        validate_key(key)?;

        let request = DataRequest {
            key: Some(key.to_string()),
            value: None,
        };
        self.bridge.request(MessageType::DataRemove, &request).await?;
        Ok(())
    }

    pub async fn clear(&self) -> SdkResult<()> {
        self.bridge.require_initialized()?;
        self.bridge
            .request(MessageType::DataClear, &DataRequest::default())
            .await?;
        Ok(())
    }

    /// Keys with a debounced write still waiting to be sent.
    pub fn pending_writes(&self) -> Vec<String> {
        self.bridge.inner.debounce.pending_keys()
    }
}

#[derive(Serialize)]
struct LeaderboardQuery<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    key: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    limit: Option<usize>,
}

/// Leaderboard submission and queries.
pub struct LeaderboardApi<'a> {
    bridge: &'a GameBridge,
}

impl LeaderboardApi<'_> {
    pub async fn submit(&self, submission: Submission) -> SdkResult<SubmitOutcome> {
        self.bridge.require_initialized()?;
        if !self.bridge.user().is_logged_in() {
            return Err(SdkError::not_logged_in());
        }
        submission.validate()?;
        if let Some(key) = &submission.key {
            validate_key(key)?;
        }

        let response = self
            .bridge
            .request(MessageType::LeaderboardSubmit, &submission)
            .await?;
        decode_response(&response)
    }

    /// Entries around the caller's rank (top entries when unranked).
    pub async fn get(&self, key: Option<&str>) -> SdkResult<LeaderboardPage> {
        self.bridge.require_initialized()?;
        if let Some(key) = key {
            validate_key(key)?;
        }

        let query = LeaderboardQuery { key, limit: None };
        let response = self
            .bridge
            .request(MessageType::LeaderboardGet, &query)
            .await?;
        decode_response(&response)
    }

    /// The first `limit` entries; `limit` is clamped to `[1, 100]`.
    pub async fn get_top(&self, key: Option<&str>, limit: i64) -> SdkResult<Vec<RankedEntry>> {
        self.bridge.require_initialized()?;
        if let Some(key) = key {
            validate_key(key)?;
        }

        let query = LeaderboardQuery {
            key,
            limit: Some(clamp_limit(limit)),
        };
        let response = self
            .bridge
            .request(MessageType::LeaderboardGetTop, &query)
            .await?;
        response
            .field("entries")
            .ok_or_else(|| SdkError::network("Malformed host response: missing entries"))
    }
}

/// Gameplay and loading lifecycle telemetry.
pub struct GameApi<'a> {
    bridge: &'a GameBridge,
}

impl GameApi<'_> {
    pub fn gameplay_start(&self) {
        self.report(GameEventKind::GameplayStart);
    }

    pub fn gameplay_stop(&self) {
        self.report(GameEventKind::GameplayStop);
    }

    pub fn loading_start(&self) {
        self.report(GameEventKind::LoadingStart);
    }

    pub fn loading_end(&self) {
        self.report(GameEventKind::LoadingEnd);
    }

    pub fn state(&self) -> GameState {
        *self.bridge.inner.game.lock()
    }

    /// Fire-and-forget; repeated starts or stops are not re-sent.
    fn report(&self, event: GameEventKind) {
        if !self.bridge.is_initialized() {
            warn!(event = ?event, "Game event before init, ignoring");
            return;
        }

        let changed = {
            let mut state = self.bridge.inner.game.lock();
            match event {
                GameEventKind::GameplayStart => !mem::replace(&mut state.gameplay_active, true),
                GameEventKind::GameplayStop => mem::replace(&mut state.gameplay_active, false),
                GameEventKind::LoadingStart => !mem::replace(&mut state.loading, true),
                GameEventKind::LoadingEnd => mem::replace(&mut state.loading, false),
            }
        };
        if !changed {
            debug!(event = ?event, "Game state unchanged, not reporting");
            return;
        }

        let Some(transport) = self.bridge.inner.correlator.transport() else {
            return;
        };
        let sent = Envelope::with_body(MessageType::GameEvent, &GameEventPayload { event })
            .and_then(|envelope| transport.send(envelope));
        if let Err(e) = sent {
            warn!(event = ?event, error = %e, "Failed to report game event");
        }
    }
}

/// Game-side logging routed through `tracing` (target `gamebridge::game`).
#[derive(Debug, Clone, Copy)]
pub struct LogApi;

impl LogApi {
    pub fn info(&self, message: impl AsRef<str>) {
        info!(target: "gamebridge::game", "{}", message.as_ref());
    }

    pub fn warn(&self, message: impl AsRef<str>) {
        warn!(target: "gamebridge::game", "{}", message.as_ref());
    }

    pub fn error(&self, message: impl AsRef<str>) {
        tracing::error!(target: "gamebridge::game", "{}", message.as_ref());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::ErrorCode;

    #[tokio::test]
    async fn test_operations_before_init_are_not_initialized() {
        let bridge = GameBridge::builder().build();

        assert_eq!(bridge.environment(), Environment::Uninitialized);
        let err = bridge.data().get_item("x").await.unwrap_err();
        assert_eq!(err.code, ErrorCode::NotInitialized);
        let err = bridge.data().set_item("x", "1").await.unwrap_err();
        assert_eq!(err.code, ErrorCode::NotInitialized);
        let err = bridge.leaderboard().get(None).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::NotInitialized);
        let err = bridge
            .leaderboard()
            .submit(Submission::new("Ada", "1", 1.0))
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::NotInitialized);

        // Nothing was dispatched
        assert!(bridge.inner.correlator.transport().is_none());
        assert!(bridge.data().pending_writes().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_local_init() {
        let bridge = GameBridge::builder().build();

        assert_eq!(bridge.init().await, Ok(Environment::Local));
        assert!(bridge.is_initialized());
        assert!(!bridge.user().is_logged_in());
        assert_eq!(bridge.user().get().unwrap().id, crate::session::LOCAL_USER_ID);
        assert_eq!(bridge.user().locales(), vec!["en".to_string()]);
        assert_eq!(bridge.user().container_size(), ContainerSize::default());

        // Idempotent
        assert_eq!(bridge.init().await, Ok(Environment::Local));
    }

    #[tokio::test(start_paused = true)]
    async fn test_game_state_dedupes() {
        let bridge = GameBridge::builder().build();
        bridge.game().gameplay_start();
        assert_eq!(bridge.game().state(), GameState::default());

        bridge.init().await.unwrap();
        bridge.game().loading_start();
        bridge.game().loading_end();
        bridge.game().gameplay_start();
        bridge.game().gameplay_start();
        assert_eq!(
            bridge.game().state(),
            GameState {
                gameplay_active: true,
                loading: false
            }
        );
        bridge.game().gameplay_stop();
        assert!(!bridge.game().state().gameplay_active);
    }

    #[tokio::test(start_paused = true)]
    async fn test_invalid_key_rejected() {
        let bridge = GameBridge::builder().build();
        bridge.init().await.unwrap();

        let err = bridge.data().get_item("").await.unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidInput);

        let err = bridge.leaderboard().get(Some("")).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidInput);
        let err = bridge.leaderboard().get_top(Some(""), 5).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidInput);

        // No key still means the default board
        assert!(bridge.leaderboard().get(None).await.is_ok());
    }
}
