//! In-process stand-in for the host.
//!
//! The simulator answers the same requests a real host does, with the same
//! response shapes, backed by a [`LocalStore`]. It lets every facade code path
//! run identically whether or not a host exists.
//!
//! ## Storage Layout
//!
//! ```text
//! gamebridge:data:<key>           → opaque string value
//! gamebridge:leaderboard:<board>  → JSON array of LeaderboardEntry
//! ```

use std::sync::Arc;

use parking_lot::Mutex;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::SdkError;
use crate::leaderboard::{Board, LeaderboardEntry, Submission, DEFAULT_LEADERBOARD};
use crate::protocol::{DataRequest, Envelope, GameEventPayload, MessageType};
use crate::session::{InitPayload, SessionConfig, User};
use crate::storage::LocalStore;

/// Namespace for game key/value data
pub const DATA_PREFIX: &str = "gamebridge:data:";

/// Namespace for leaderboard boards
pub const LEADERBOARD_PREFIX: &str = "gamebridge:leaderboard:";

/// Default `getTop` limit when the request omits one
const DEFAULT_TOP_LIMIT: i64 = 10;

/// What the simulator reports during the handshake.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulatorConfig {
    pub user: User,
    pub config: SessionConfig,
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        Self {
            user: User::local(),
            config: SessionConfig::local_default(),
        }
    }
}

impl SimulatorConfig {
    /// Simulate a logged-in player, e.g. to exercise leaderboards offline.
    pub fn with_user(mut self, user: User) -> Self {
        self.user = user;
        self
    }
}

/// Local host simulator
pub struct LocalSimulator {
    store: Arc<dyn LocalStore>,
    config: SimulatorConfig,
    /// Serializes leaderboard load/modify/store cycles
    board_lock: Mutex<()>,
}

impl LocalSimulator {
    pub fn new(store: Arc<dyn LocalStore>, config: SimulatorConfig) -> Self {
        Self {
            store,
            config,
            board_lock: Mutex::new(()),
        }
    }

    pub fn config(&self) -> &SimulatorConfig {
        &self.config
    }

    /// Answer one request. `None` for messages that have no response.
    pub fn handle(&self, request: &Envelope) -> Option<Envelope> {
        let Some(kind) = request.message_type() else {
            warn!(kind = %request.kind, "Simulator ignoring unknown message type");
            return None;
        };

        debug!(kind = %kind, request_id = ?request.request_id, "Simulator handling request");

        let result = match kind {
            MessageType::Ready => return Some(self.handshake()),
            MessageType::DataGet => self.data_get(request),
            MessageType::DataSet => self.data_set(request),
            MessageType::DataRemove => self.data_remove(request),
            MessageType::DataClear => self.data_clear(),
            MessageType::LeaderboardSubmit => self.leaderboard_submit(request),
            MessageType::LeaderboardGet => self.leaderboard_get(request),
            MessageType::LeaderboardGetTop => self.leaderboard_get_top(request),
            MessageType::GameEvent => {
                match request.decode::<GameEventPayload>() {
                    Ok(payload) => info!(event = ?payload.event, "Game lifecycle event"),
                    Err(e) => warn!(error = %e, "Malformed game event"),
                }
                return None;
            }
            other => {
                warn!(kind = %other, "Simulator received a host-bound message type");
                return None;
            }
        };

        let response_kind = kind.response_type()?;
        let response = match result {
            Ok(mut envelope) => {
                envelope.kind = response_kind.as_str().to_string();
                envelope.request_id = request.request_id.clone();
                envelope
            }
            Err(err) => {
                debug!(kind = %kind, code = %err.code, "Simulator request failed");
                Envelope::error_response(response_kind, request.request_id.clone(), &err)
            }
        };
        Some(response)
    }

    fn handshake(&self) -> Envelope {
        let mut nonce = [0u8; 16];
        rand::rng().fill_bytes(&mut nonce);

        let init = InitPayload {
            user: Some(self.config.user.clone()),
            config: self.config.config.clone(),
            nonce: Some(hex::encode(nonce)),
        };

        // InitPayload always serializes to an object
        Envelope::with_body(MessageType::Init, &init).unwrap_or_else(|e| {
            warn!(error = %e, "Failed to encode init payload");
            Envelope::new(MessageType::Init)
        })
    }

    fn data_get(&self, request: &Envelope) -> Result<Envelope, SdkError> {
        let key = required_key(request)?;
        let value = self
            .store
            .get(&data_key(&key))
            .unwrap_or_else(|e| {
                warn!(key = %key, error = %e, "Read failed, treating as missing");
                None
            });

        let mut response = Envelope::new(MessageType::DataResponse);
        response.insert("value", value);
        Ok(response)
    }

    fn data_set(&self, request: &Envelope) -> Result<Envelope, SdkError> {
        let key = required_key(request)?;
        let value = request
            .field::<String>("value")
            .ok_or_else(|| SdkError::invalid_input("value must be a string"))?;

        self.store.set(&data_key(&key), &value)?;
        Ok(success())
    }

    fn data_remove(&self, request: &Envelope) -> Result<Envelope, SdkError> {
        let key = required_key(request)?;
        self.store.remove(&data_key(&key))?;
        Ok(success())
    }

    fn data_clear(&self) -> Result<Envelope, SdkError> {
        let removed = self.store.remove_prefix(DATA_PREFIX)?;
        debug!(removed, "Cleared game data");
        Ok(success())
    }

    fn leaderboard_submit(&self, request: &Envelope) -> Result<Envelope, SdkError> {
        if !self.config.user.is_logged_in() {
            return Err(SdkError::not_logged_in());
        }
        let submission: Submission = request
            .decode()
            .map_err(|e| SdkError::invalid_input(e.to_string()))?;
        submission.validate()?;
        let board_key = board_key(submission.key.as_deref());

        let _guard = self.board_lock.lock();
        let mut board = self.load_board(&board_key);
        let now = chrono::Utc::now().timestamp_millis();
        let outcome = board.submit(&self.config.user.id, &submission, now);
        self.save_board(&board_key, &board)?;

        debug!(
            board = %board_key,
            rank = ?outcome.rank,
            is_new_best = outcome.is_new_best,
            "Score submitted"
        );
        Ok(Envelope::with_body(MessageType::LeaderboardResponse, &outcome)?)
    }

    fn leaderboard_get(&self, request: &Envelope) -> Result<Envelope, SdkError> {
        let board_key = board_key(request.field::<String>("key").as_deref());

        let _guard = self.board_lock.lock();
        let board = self.load_board(&board_key);
        let page = board.window(self.ranked_user());

        Ok(Envelope::with_body(MessageType::LeaderboardResponse, &page)?)
    }

    fn leaderboard_get_top(&self, request: &Envelope) -> Result<Envelope, SdkError> {
        let board_key = board_key(request.field::<String>("key").as_deref());
        let limit = request
            .field::<f64>("limit")
            .map(|l| l as i64)
            .unwrap_or(DEFAULT_TOP_LIMIT);

        let _guard = self.board_lock.lock();
        let board = self.load_board(&board_key);
        let entries = board.top(limit, self.ranked_user());

        let mut response = Envelope::new(MessageType::LeaderboardResponse);
        response.insert(
            "entries",
            serde_json::to_value(entries).map_err(crate::error::BridgeError::from)?,
        );
        Ok(response)
    }

    fn ranked_user(&self) -> Option<&str> {
        self.config
            .user
            .is_logged_in()
            .then_some(self.config.user.id.as_str())
    }

    /// Load a board. Missing or unreadable boards are empty.
    fn load_board(&self, board_key: &str) -> Board {
        let raw = match self.store.get(board_key) {
            Ok(Some(raw)) => raw,
            Ok(None) => return Board::new(),
            Err(e) => {
                warn!(board = %board_key, error = %e, "Board read failed, starting empty");
                return Board::new();
            }
        };

        match serde_json::from_str::<Vec<LeaderboardEntry>>(&raw) {
            Ok(entries) => Board::from_entries(entries),
            Err(e) => {
                warn!(board = %board_key, error = %e, "Corrupt board, starting empty");
                Board::new()
            }
        }
    }

    fn save_board(&self, board_key: &str, board: &Board) -> Result<(), SdkError> {
        let raw = serde_json::to_string(board.entries()).map_err(crate::error::BridgeError::from)?;
        self.store.set(board_key, &raw)?;
        Ok(())
    }
}

fn required_key(request: &Envelope) -> Result<String, SdkError> {
    let data: DataRequest = request
        .decode()
        .map_err(|e| SdkError::invalid_input(e.to_string()))?;
    match data.key {
        Some(key) if !key.is_empty() => Ok(key),
        _ => Err(SdkError::invalid_input("key must be a non-empty string")),
    }
}

fn success() -> Envelope {
    let mut response = Envelope::new(MessageType::DataResponse);
    response.insert("success", true);
    response
}

fn data_key(key: &str) -> String {
    format!("{}{}", DATA_PREFIX, key)
}

fn board_key(key: Option<&str>) -> String {
    let key = key.filter(|k| !k.is_empty()).unwrap_or(DEFAULT_LEADERBOARD);
    format!("{}{}", LEADERBOARD_PREFIX, key)
}
