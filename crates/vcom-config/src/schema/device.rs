use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Default location of the published device link.
pub const DEFAULT_DEVICE_PATH: &str = "/tmp/vcom0";

/// `[device]` section: where the pseudo-terminal slave is published.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceConfig {
    /// Symbolic link created to the pty slave. Any existing file here is replaced.
    pub path: PathBuf,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from(DEFAULT_DEVICE_PATH),
        }
    }
}
