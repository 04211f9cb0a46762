use serde::{Deserialize, Serialize};

/// `[logging]` section.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log every forwarded chunk with a hex preview.
    pub debug: bool,
}
