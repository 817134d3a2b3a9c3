//! SDK configuration

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::correlator::DEFAULT_REQUEST_TIMEOUT;
use crate::debounce::DEFAULT_DEBOUNCE_WINDOW;
use crate::protocol::SDK_SOURCE;
use crate::transport::DEFAULT_LOCAL_DELAY;

/// Tunables for a [`crate::GameBridge`].
///
/// Serialized with millisecond integers so hosts can ship it as JSON:
///
/// ```text
/// { "requestTimeoutMs": 5000, "debounceWindowMs": 1000, "localDelayMs": 50, "source": "gamebridge-sdk" }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BridgeConfig {
    /// Deadline for correlated requests and the handshake
    pub request_timeout_ms: u64,
    /// Quiet period before a `setItem` is written
    pub debounce_window_ms: u64,
    /// Artificial latency of the local simulator
    pub local_delay_ms: u64,
    /// Source tag stamped on outbound remote messages
    pub source: String,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            request_timeout_ms: DEFAULT_REQUEST_TIMEOUT.as_millis() as u64,
            debounce_window_ms: DEFAULT_DEBOUNCE_WINDOW.as_millis() as u64,
            local_delay_ms: DEFAULT_LOCAL_DELAY.as_millis() as u64,
            source: SDK_SOURCE.to_string(),
        }
    }
}

impl BridgeConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn debounce_window(&self) -> Duration {
        Duration::from_millis(self.debounce_window_ms)
    }

    pub fn local_delay(&self) -> Duration {
        Duration::from_millis(self.local_delay_ms)
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout_ms = timeout.as_millis() as u64;
        self
    }

    pub fn with_debounce_window(mut self, window: Duration) -> Self {
        self.debounce_window_ms = window.as_millis() as u64;
        self
    }

    pub fn with_local_delay(mut self, delay: Duration) -> Self {
        self.local_delay_ms = delay.as_millis() as u64;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = BridgeConfig::default();
        assert_eq!(config.request_timeout(), Duration::from_millis(5000));
        assert_eq!(config.debounce_window(), Duration::from_millis(1000));
        assert_eq!(config.local_delay(), Duration::from_millis(50));
        assert_eq!(config.source, "gamebridge-sdk");
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: BridgeConfig = serde_json::from_str(r#"{"debounceWindowMs": 250}"#).unwrap();
        assert_eq!(config.debounce_window(), Duration::from_millis(250));
        assert_eq!(config.request_timeout(), Duration::from_millis(5000));
    }
}
