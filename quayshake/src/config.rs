//! Driver configuration.

use serde::{Deserialize, Serialize};

/// Configuration for a server handshake driver.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HandshakeConfig {
    /// Maximum number of unprocessed bytes buffered per encryption level.
    /// Exceeding it fails the handshake with CRYPTO_BUFFER_EXCEEDED.
    pub max_crypto_buffer: usize,
    /// Deliver one crypto-event notification when a transport entry point
    /// returns, if notifications were held back while it was running.
    pub notify_after_entry: bool,
}

impl Default for HandshakeConfig {
    fn default() -> Self {
        Self {
            max_crypto_buffer: 64 * 1024,
            notify_after_entry: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_fields_use_defaults() {
        let config: HandshakeConfig = serde_json::from_str(r#"{"max_crypto_buffer": 4096}"#).unwrap();
        assert_eq!(config.max_crypto_buffer, 4096);
        assert!(config.notify_after_entry);
    }

    #[test]
    fn roundtrips_through_json() {
        let config = HandshakeConfig {
            max_crypto_buffer: 1200,
            notify_after_entry: false,
        };
        let json = serde_json::to_string(&config).unwrap();
        assert_eq!(serde_json::from_str::<HandshakeConfig>(&json).unwrap(), config);
    }
}
