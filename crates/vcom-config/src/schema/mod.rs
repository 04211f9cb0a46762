//! Configuration schema types for the tunnel.
//!
//! All structs use `serde(default)` so partial configs work correctly.
//! Missing fields are filled with the defaults the tunnel has always used:
//! `/tmp/vcom0`, `127.0.0.1:8080`, 115200 8N1, five reconnect attempts
//! five seconds apart.

mod device;
mod logging;
mod remote;
mod serial;

pub use device::*;
pub use logging::*;
pub use remote::*;
pub use serial::*;

use serde::{Deserialize, Serialize};

/// Root configuration.
///
/// Built once at startup from the file (or defaults) plus CLI overrides and
/// treated as immutable afterwards.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct TunnelConfig {
    pub device: DeviceConfig,
    pub serial: SerialConfig,
    pub remote: RemoteConfig,
    pub logging: LoggingConfig,
}

// =============================================================================
// Tests
// =============================================================================
