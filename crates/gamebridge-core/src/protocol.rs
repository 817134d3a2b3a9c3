//! Wire protocol between the game and its host
//!
//! Every message in either direction is a JSON object:
//!
//! ```text
//! { "type": "data:get", "requestId": "01J...", "nonce": "9f2c...", ...payload }
//! ```
//!
//! ## Message Flow
//!
//! ```text
//! Game (SDK)                         Host / LocalSimulator
//!   |                                    |
//!   |--- ready ------------------------->|
//!   |<-- init (user, config, nonce) -----|
//!   |                                    |
//!   |--- data:get {requestId} ---------->|
//!   |<-- data:response {requestId} ------|
//!   |                                    |
//!   |--- leaderboard:submit ------------>|
//!   |<-- leaderboard:response -----------|
//!   |                                    |
//!   |--- game:event (no response) ------>|
//!   |<-- error (operation, code) --------|   (push, any time)
//! ```

use std::fmt;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{BridgeError, SdkError};

/// Protocol version stamped on outbound remote envelopes
pub const PROTOCOL_VERSION: &str = "1";

/// Source tag stamped on outbound remote envelopes
pub const SDK_SOURCE: &str = "gamebridge-sdk";

/// Every message type understood by the SDK or its host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageType {
    Ready,
    DataGet,
    DataSet,
    DataRemove,
    DataClear,
    LeaderboardSubmit,
    LeaderboardGet,
    LeaderboardGetTop,
    GameEvent,
    Init,
    Error,
    DataResponse,
    LeaderboardResponse,
}

impl MessageType {
    pub const fn as_str(self) -> &'static str {
        match self {
            MessageType::Ready => "ready",
            MessageType::DataGet => "data:get",
            MessageType::DataSet => "data:set",
            MessageType::DataRemove => "data:remove",
            MessageType::DataClear => "data:clear",
            MessageType::LeaderboardSubmit => "leaderboard:submit",
            MessageType::LeaderboardGet => "leaderboard:get",
            MessageType::LeaderboardGetTop => "leaderboard:getTop",
            MessageType::GameEvent => "game:event",
            MessageType::Init => "init",
            MessageType::Error => "error",
            MessageType::DataResponse => "data:response",
            MessageType::LeaderboardResponse => "leaderboard:response",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        let kind = match s {
            "ready" => MessageType::Ready,
            "data:get" => MessageType::DataGet,
            "data:set" => MessageType::DataSet,
            "data:remove" => MessageType::DataRemove,
            "data:clear" => MessageType::DataClear,
            "leaderboard:submit" => MessageType::LeaderboardSubmit,
            "leaderboard:get" => MessageType::LeaderboardGet,
            "leaderboard:getTop" => MessageType::LeaderboardGetTop,
            "game:event" => MessageType::GameEvent,
            "init" => MessageType::Init,
            "error" => MessageType::Error,
            "data:response" => MessageType::DataResponse,
            "leaderboard:response" => MessageType::LeaderboardResponse,
            _ => return None,
        };
        Some(kind)
    }

    /// The response type a host answers this request with, if any.
    pub fn response_type(self) -> Option<MessageType> {
        match self {
            MessageType::Ready => Some(MessageType::Init),
            MessageType::DataGet
            | MessageType::DataSet
            | MessageType::DataRemove
            | MessageType::DataClear => Some(MessageType::DataResponse),
            MessageType::LeaderboardSubmit
            | MessageType::LeaderboardGet
            | MessageType::LeaderboardGetTop => Some(MessageType::LeaderboardResponse),
            _ => None,
        }
    }
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Stable error codes shared with the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    Timeout,
    QuotaExceeded,
    NotInitialized,
    InvalidInput,
    RateLimited,
    NetworkError,
    NotFound,
    Unauthorized,
    NotLoggedIn,
}

impl ErrorCode {
    pub const fn as_str(self) -> &'static str {
        match self {
            ErrorCode::Timeout => "timeout",
            ErrorCode::QuotaExceeded => "quota_exceeded",
            ErrorCode::NotInitialized => "not_initialized",
            ErrorCode::InvalidInput => "invalid_input",
            ErrorCode::RateLimited => "rate_limited",
            ErrorCode::NetworkError => "network_error",
            ErrorCode::NotFound => "not_found",
            ErrorCode::Unauthorized => "unauthorized",
            ErrorCode::NotLoggedIn => "not_logged_in",
        }
    }

    /// Parse a wire code, ignoring ASCII case.
    pub fn parse(s: &str) -> Option<Self> {
        const ALL: [ErrorCode; 9] = [
            ErrorCode::Timeout,
            ErrorCode::QuotaExceeded,
            ErrorCode::NotInitialized,
            ErrorCode::InvalidInput,
            ErrorCode::RateLimited,
            ErrorCode::NetworkError,
            ErrorCode::NotFound,
            ErrorCode::Unauthorized,
            ErrorCode::NotLoggedIn,
        ];
        ALL.into_iter().find(|code| code.as_str().eq_ignore_ascii_case(s))
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A message crossing the game/host boundary.
///
/// Envelope fields are explicit; everything else lives in `payload` and is
/// flattened into the same JSON object on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    #[serde(rename = "type")]
    pub kind: String,

    #[serde(rename = "requestId", default, skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nonce: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,

    #[serde(flatten)]
    pub payload: Map<String, Value>,
}

impl Envelope {
    pub fn new(kind: MessageType) -> Self {
        Self {
            kind: kind.as_str().to_string(),
            request_id: None,
            nonce: None,
            source: None,
            version: None,
            payload: Map::new(),
        }
    }

    /// Build an envelope whose payload is the serialized form of `body`.
    ///
    /// `body` must serialize to a JSON object.
    pub fn with_body<T: Serialize>(kind: MessageType, body: &T) -> Result<Self, BridgeError> {
        let mut envelope = Self::new(kind);
        match serde_json::to_value(body)? {
            Value::Object(map) => envelope.payload = map,
            Value::Null => {}
            other => {
                return Err(BridgeError::InvalidMessage(format!(
                    "envelope body must be an object, got {}",
                    other
                )))
            }
        }
        Ok(envelope)
    }

    pub fn with_request_id(mut self, request_id: impl Into<String>) -> Self {
        self.request_id = Some(request_id.into());
        self
    }

    pub fn insert(&mut self, field: &str, value: impl Into<Value>) {
        self.payload.insert(field.to_string(), value.into());
    }

    pub fn message_type(&self) -> Option<MessageType> {
        MessageType::parse(&self.kind)
    }

    /// Read a single payload field, `None` when absent or mistyped.
    pub fn field<T: DeserializeOwned>(&self, name: &str) -> Option<T> {
        self.payload
            .get(name)
            .and_then(|v| serde_json::from_value(v.clone()).ok())
    }

    /// Decode the whole payload as `T`.
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T, BridgeError> {
        Ok(serde_json::from_value(Value::Object(self.payload.clone()))?)
    }

    /// The `error` field of a response, if the host reported one.
    ///
    /// Any non-null `error` is a failure, even when its code is unknown.
    pub fn error(&self) -> Option<SdkError> {
        match self.payload.get("error") {
            None | Some(Value::Null) => None,
            Some(raw) => Some(SdkError::from_host(raw)),
        }
    }

    /// Synthetic response carrying only an error.
    pub fn error_response(kind: MessageType, request_id: Option<String>, error: &SdkError) -> Self {
        let mut envelope = Self::new(kind);
        envelope.request_id = request_id;
        envelope.insert(
            "error",
            serde_json::json!({ "code": error.code, "message": error.message }),
        );
        envelope
    }

    pub fn to_json(&self) -> Result<String, BridgeError> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_json(s: &str) -> Result<Self, BridgeError> {
        Ok(serde_json::from_str(s)?)
    }
}

/// Payload of `data:*` requests.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DataRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
}

/// Lifecycle telemetry carried by `game:event`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum GameEventKind {
    GameplayStart,
    GameplayStop,
    LoadingStart,
    LoadingEnd,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameEventPayload {
    pub event: GameEventKind,
}
