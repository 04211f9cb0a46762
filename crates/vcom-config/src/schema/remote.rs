use std::time::Duration;

use serde::{Deserialize, Serialize};

/// `[remote]` section: the TCP peer and the reconnection policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RemoteConfig {
    /// Numeric address or resolvable host name.
    pub host: String,
    pub port: u16,
    /// Connection attempts per reconnect round (valid range: 1-100).
    pub max_reconnect_attempts: u32,
    /// Pause between attempts in seconds (valid range: 0-3600).
    pub reconnect_backoff_secs: u64,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".into(),
            port: 8080,
            max_reconnect_attempts: 5,
            reconnect_backoff_secs: 5,
        }
    }
}

impl RemoteConfig {
    pub fn reconnect_backoff(&self) -> Duration {
        Duration::from_secs(self.reconnect_backoff_secs)
    }

    /// `host:port` for log lines.
    pub fn endpoint(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
