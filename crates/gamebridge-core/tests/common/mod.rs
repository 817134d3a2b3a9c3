//! Shared fixtures for integration tests: players, seeded boards and a fake host.

#![allow(dead_code)]

use std::sync::Arc;

use gamebridge_core::simulator::LEADERBOARD_PREFIX;
use gamebridge_core::{
    Envelope, HostEndpoint, Languages, LeaderboardEntry, LocalSimulator, LocalStore, MemoryStore,
    SimulatorConfig, User,
};
use parking_lot::Mutex;

pub type Received = Arc<Mutex<Vec<Envelope>>>;

/// Route SDK logs to the test harness; safe to call from every test.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("gamebridge_core=debug,gamebridge=info")
        .with_test_writer()
        .try_init();
}

pub fn player(id: &str, name: &str) -> User {
    User {
        id: id.to_string(),
        display_name: name.to_string(),
        avatar: None,
        languages: Languages::default(),
    }
}

pub fn entry(user_id: &str, name: &str, score: f64) -> LeaderboardEntry {
    LeaderboardEntry {
        user_id: user_id.to_string(),
        player_name: name.to_string(),
        display_value: format!("{}", score),
        sort_value: score,
        submitted_at: 0,
    }
}

/// Write `entries` as the stored board `key`.
pub fn seed_board(store: &MemoryStore, key: &str, entries: &[LeaderboardEntry]) {
    let raw = serde_json::to_string(entries).unwrap();
    store
        .set(&format!("{}{}", LEADERBOARD_PREFIX, key), &raw)
        .unwrap();
}

/// Run a host task that records every message and answers with `respond`.
pub fn spawn_host<F>(mut endpoint: HostEndpoint, mut respond: F) -> Received
where
    F: FnMut(&Envelope) -> Option<Envelope> + Send + 'static,
{
    let received: Received = Arc::new(Mutex::new(Vec::new()));
    let log = received.clone();
    tokio::spawn(async move {
        while let Some(message) = endpoint.incoming.recv().await {
            log.lock().push(message.clone());
            if let Some(reply) = respond(&message) {
                if endpoint.outgoing.send(reply).is_err() {
                    break;
                }
            }
        }
    });
    received
}

/// A host that behaves exactly like the local simulator, for `user`.
pub fn simulator_host(endpoint: HostEndpoint, store: MemoryStore, user: User) -> Received {
    let simulator = LocalSimulator::new(
        Arc::new(store),
        SimulatorConfig::default().with_user(user),
    );
    spawn_host(endpoint, move |message| simulator.handle(message))
}
