//! GameBridge Core Library
//!
//! Messaging SDK for games embedded in a host page or app.
//!
//! ## Overview
//!
//! A game talks to its host through asynchronous messages: it asks for the
//! current user, persists key/value data, submits leaderboard scores and
//! reports lifecycle events. When no host is present the same API runs
//! against a local simulator backed by a device store, so a game behaves the
//! same in development as in production.
//!
//! ## Architecture
//!
//! ```text
//! GameBridge ──> DebounceQueue ──┐
//!      │                         ├──> RequestCorrelator ──> Transport ──> host / LocalSimulator
//!      └─────────────────────────┘            ▲                                   │
//!                                             └──────── MessageRouter <───────────┘
//! ```
//!
//! - **Correlated requests**: every request carries a ULID `requestId` and
//!   resolves exactly once, with a response or a timeout
//! - **Debounced writes**: rapid `set_item` calls to one key collapse into
//!   a single write
//! - **Local simulation**: data and leaderboards persist to a [`LocalStore`]
//!
//! ## Quick Start
//!
//! ```ignore
//! use gamebridge_core::{EventKind, GameBridge, Submission};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let bridge = GameBridge::builder().build();
//!     bridge.on(EventKind::Error, |event| eprintln!("{:?}", event));
//!
//!     let environment = bridge.init().await?;
//!     println!("running in {environment} mode");
//!
//!     bridge.game().loading_start();
//!     let best = bridge.data().get_item("best").await?;
//!     bridge.game().loading_end();
//!
//!     bridge.game().gameplay_start();
//!     bridge.data().set_item("best", "18.5").await?;
//!     if bridge.user().is_logged_in() {
//!         bridge
//!             .leaderboard()
//!             .submit(Submission::new("Ada", "18.5s", 18.5).with_key("speed"))
//!             .await?;
//!     }
//!
//!     Ok(())
//! }
//! ```

pub mod bridge;
pub mod config;
pub mod correlator;
pub mod debounce;
pub mod error;
pub mod events;
pub mod leaderboard;
pub mod protocol;
pub mod router;
pub mod session;
pub mod simulator;
pub mod storage;
pub mod transport;

// Re-exports
pub use bridge::{
    DataApi, GameApi, GameBridge, GameBridgeBuilder, GameState, LeaderboardApi, LogApi, UserApi,
};
pub use config::BridgeConfig;
pub use correlator::{RequestCorrelator, DEFAULT_REQUEST_TIMEOUT};
pub use debounce::{DebounceQueue, SetOutcome, DEFAULT_DEBOUNCE_WINDOW};
pub use error::{BridgeError, BridgeResult, SdkError, SdkResult};
pub use events::{BridgeEvent, EventKind, EventRegistry, ListenerId};
pub use leaderboard::{
    Board, LeaderboardEntry, LeaderboardPage, RankedEntry, Submission, SubmitOutcome,
    DEFAULT_LEADERBOARD,
};
pub use protocol::{Envelope, ErrorCode, GameEventKind, MessageType, PROTOCOL_VERSION, SDK_SOURCE};
pub use session::{ContainerSize, Environment, Languages, Session, User, LOCAL_USER_ID};
pub use simulator::{LocalSimulator, SimulatorConfig};
pub use storage::{LocalStore, MemoryStore, RedbStore};
pub use transport::{HostConnection, HostEndpoint, LocalTransport, RemoteTransport, Transport};
