//! Virtual serial port over TCP.
//!
//! Publishes a pseudo-terminal slave under a stable path and bridges its
//! master to a remote TCP endpoint. Bytes pass through unchanged in both
//! directions; the network side reconnects on its own after peer loss.
//!
//! Key modules:
//! - [`line_config`]: serial parameters to termios on the pty master
//! - [`device`]: pty allocation, publishing and teardown
//! - [`network`]: resolve and connect with keep-alive
//! - [`bridge`]: the two forwarding loops and their shared state
//! - [`tunnel`]: start/stop ordering over all of the above

pub mod bridge;
pub mod constants;
pub mod device;
pub mod error;
pub mod line_config;
pub mod network;
pub mod tunnel;

pub use bridge::{BridgeState, ConnectionState, StatsSnapshot};
pub use device::PseudoDevice;
pub use error::TunnelError;
pub use tunnel::{Tunnel, TunnelPhase};
