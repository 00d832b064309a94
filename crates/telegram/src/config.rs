use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Bot API client settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BotConnectorConfig {
    /// HTTP client timeout. Must exceed `poll_timeout_secs` so the client
    /// doesn't abort a long poll before Telegram answers.
    pub request_timeout_secs: u64,

    /// Long-polling timeout passed to `getUpdates`.
    pub poll_timeout_secs: u32,

    /// Pause after a failed `getUpdates` before trying again.
    pub retry_delay_ms: u64,

    /// Consecutive `getUpdates` failures before the session is reported
    /// disconnected and the restart timer takes over.
    pub max_poll_failures: u32,

    /// Bot API base URL; the public endpoint when unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_url: Option<String>,
}

impl Default for BotConnectorConfig {
    fn default() -> Self {
        Self {
            request_timeout_secs: 45,
            poll_timeout_secs: 30,
            retry_delay_ms: 5_000,
            max_poll_failures: 3,
            api_url: None,
        }
    }
}

impl BotConnectorConfig {
    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    #[must_use]
    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_leave_room_for_long_poll() {
        let cfg = BotConnectorConfig::default();
        assert!(cfg.request_timeout() > Duration::from_secs(u64::from(cfg.poll_timeout_secs)));
        assert_eq!(cfg.max_poll_failures, 3);
        assert!(cfg.api_url.is_none());
    }

    #[test]
    fn partial_json_fills_defaults() {
        let cfg: BotConnectorConfig = serde_json::from_value(serde_json::json!({
            "api_url": "http://127.0.0.1:8081/",
            "retry_delay_ms": 250,
        }))
        .unwrap();
        assert_eq!(cfg.api_url.as_deref(), Some("http://127.0.0.1:8081/"));
        assert_eq!(cfg.retry_delay(), Duration::from_millis(250));
        assert_eq!(cfg.poll_timeout_secs, 30);
    }
}
