//! Session state established by the host handshake.
//!
//! A `Session` starts `Uninitialized` and makes exactly one transition, to
//! `Local` or `Remote`, when the `init` message arrives. It is shared by the
//! router (the only writer) and the facade (readers).

use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::BridgeError;

/// User id the local simulator assigns. Treated as "not logged in".
pub const LOCAL_USER_ID: &str = "local-user";

/// Where the session's host lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    Uninitialized,
    Local,
    Remote,
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Environment::Uninitialized => write!(f, "uninitialized"),
            Environment::Local => write!(f, "local"),
            Environment::Remote => write!(f, "remote"),
        }
    }
}

/// Preferred UI languages of the user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Languages {
    pub primary: String,
    #[serde(default)]
    pub secondary: String,
}

impl Default for Languages {
    fn default() -> Self {
        Self {
            primary: "en".to_string(),
            secondary: "en".to_string(),
        }
    }
}

/// The player as reported by the host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    #[serde(default)]
    pub display_name: String,
    #[serde(default)]
    pub avatar: Option<String>,
    #[serde(default)]
    pub languages: Languages,
}

impl User {
    /// The placeholder user the local simulator reports.
    pub fn local() -> Self {
        Self {
            id: LOCAL_USER_ID.to_string(),
            display_name: "Local Player".to_string(),
            avatar: None,
            languages: Languages::default(),
        }
    }

    pub fn is_logged_in(&self) -> bool {
        !self.id.is_empty() && self.id != LOCAL_USER_ID
    }
}

/// Size of the frame the game is rendered into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerSize {
    pub width: u32,
    pub height: u32,
}

impl Default for ContainerSize {
    fn default() -> Self {
        Self {
            width: 800,
            height: 600,
        }
    }
}

/// Host-provided configuration. Opaque apart from the typed accessors.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionConfig(pub Map<String, Value>);

impl SessionConfig {
    /// Config the local simulator hands out.
    pub fn local_default() -> Self {
        let mut map = Map::new();
        map.insert(
            "containerSize".to_string(),
            serde_json::json!(ContainerSize::default()),
        );
        Self(map)
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// Container size if the host supplied a well-formed one.
    pub fn container_size(&self) -> Option<ContainerSize> {
        self.0
            .get("containerSize")
            .and_then(|v| serde_json::from_value(v.clone()).ok())
    }
}

/// Payload of the `init` handshake message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InitPayload {
    #[serde(default)]
    pub user: Option<User>,
    #[serde(default)]
    pub config: SessionConfig,
    #[serde(default)]
    pub nonce: Option<String>,
}

/// Process-wide session state.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Session {
    pub environment: Environment,
    pub user: Option<User>,
    pub config: SessionConfig,
    pub nonce: Option<String>,
    pub initialized: bool,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply the handshake. Only the first call takes effect.
    pub fn initialize(
        &mut self,
        environment: Environment,
        init: InitPayload,
    ) -> Result<(), BridgeError> {
        if self.initialized {
            return Err(BridgeError::AlreadyInitialized);
        }

        self.environment = environment;
        self.user = init.user;
        self.config = init.config;
        self.nonce = init.nonce;
        self.initialized = true;
        Ok(())
    }

    pub fn is_logged_in(&self) -> bool {
        self.user.as_ref().is_some_and(User::is_logged_in)
    }
}

/// Shared handle to the session.
pub type SharedSession = Arc<RwLock<Session>>;
