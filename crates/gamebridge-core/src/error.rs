//! Error types for GameBridge
//!
//! Two layers of errors exist:
//!
//! - [`BridgeError`]: internal failures (storage, serialization, transport).
//!   These never reach game code directly.
//! - [`SdkError`]: the tagged `{code, message}` value every public operation
//!   resolves to on failure. Host hiccups degrade to an `SdkError`, never a
//!   panic in the caller.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::protocol::ErrorCode;

/// Internal error type for GameBridge operations
#[derive(Error, Debug)]
pub enum BridgeError {
    /// Database creation/opening error
    #[error("Database error: {0}")]
    Database(#[from] redb::DatabaseError),

    /// Transaction error
    #[error("Transaction error: {0}")]
    Transaction(#[from] redb::TransactionError),

    /// Table error
    #[error("Table error: {0}")]
    Table(#[from] redb::TableError),

    /// Storage operation error
    #[error("Storage operation error: {0}")]
    StorageOp(#[from] redb::StorageError),

    /// Commit error
    #[error("Commit error: {0}")]
    Commit(#[from] redb::CommitError),

    /// Error during serialization/deserialization
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Malformed or unexpected protocol message
    #[error("Invalid message: {0}")]
    InvalidMessage(String),

    /// The host channel is gone
    #[error("Transport closed: {0}")]
    TransportClosed(String),

    /// General I/O error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Session already went through its initialization transition
    #[error("Session already initialized")]
    AlreadyInitialized,
}

/// Result type alias using BridgeError
pub type BridgeResult<T> = Result<T, BridgeError>;

/// Tagged failure returned by every public SDK operation.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[error("{code}: {message}")]
pub struct SdkError {
    pub code: ErrorCode,
    #[serde(default)]
    pub message: String,
}

impl SdkError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn not_initialized() -> Self {
        Self::new(ErrorCode::NotInitialized, "SDK not initialized, call init() first")
    }

    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidInput, message)
    }

    pub fn not_logged_in() -> Self {
        Self::new(ErrorCode::NotLoggedIn, "User must be logged in")
    }

    pub fn timeout(operation: &str) -> Self {
        Self::new(ErrorCode::Timeout, format!("Request timed out: {}", operation))
    }

    pub fn network(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::NetworkError, message)
    }

    /// Interpret an error value reported by the host.
    ///
    /// Codes match case-insensitively. A missing or unrecognized code becomes
    /// `network_error` with the raw code kept in the message.
    pub fn from_host(raw: &Value) -> Self {
        let (code, message) = match raw {
            Value::Object(map) => (
                map.get("code").and_then(Value::as_str),
                map.get("message").and_then(Value::as_str).unwrap_or_default(),
            ),
            Value::String(message) => (None, message.as_str()),
            _ => (None, ""),
        };

        match code.and_then(ErrorCode::parse) {
            Some(code) => Self::new(code, message),
            None => {
                let raw_code = code.unwrap_or("unknown");
                if message.is_empty() {
                    Self::network(format!("Host error {}", raw_code))
                } else {
                    Self::network(format!("Host error {}: {}", raw_code, message))
                }
            }
        }
    }
}

impl From<BridgeError> for SdkError {
    fn from(err: BridgeError) -> Self {
        match err {
            BridgeError::TransportClosed(msg) => SdkError::network(msg),
            BridgeError::AlreadyInitialized
            | BridgeError::InvalidMessage(_)
            | BridgeError::Serialization(_) => {
                SdkError::invalid_input(err.to_string())
            }
            // Failed writes on the device store surface as quota exhaustion.
            other => SdkError::new(ErrorCode::QuotaExceeded, other.to_string()),
        }
    }
}

/// Result type for public SDK operations
pub type SdkResult<T> = Result<T, SdkError>;
