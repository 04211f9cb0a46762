//! Timing and sizing constants shared by the forwarding loops.
//!
//! Shutdown latency is bounded by the larger of the two readiness waits plus
//! one [`SLEEP_SLICE`].

use std::time::Duration;

/// Largest chunk moved per read, in either direction.
pub const BUFFER_SIZE: usize = 4096;

/// Readiness wait on the pty master (device → network).
pub const DEVICE_POLL_TIMEOUT: Duration = Duration::from_millis(100);

/// Readiness wait on the socket (network → device).
pub const NETWORK_POLL_TIMEOUT: Duration = Duration::from_secs(1);

/// Upper bound on one blocked socket send. The connection lock is held for
/// the send, so a peer that stops reading must not hold it longer than this.
pub const SEND_TIMEOUT: Duration = DEVICE_POLL_TIMEOUT;

/// Pause of the device → network loop while the link is down.
pub const DISCONNECTED_IDLE: Duration = Duration::from_millis(100);

/// Pause after a reconnect round that ended without a connection.
pub const RECONNECT_COOLDOWN: Duration = Duration::from_secs(1);

/// Granularity at which long sleeps re-check the `running` flag.
pub const SLEEP_SLICE: Duration = Duration::from_millis(100);

/// Inter-byte read timeout applied to the pty, in deciseconds (`VTIME`).
pub const READ_TIMEOUT_DECISECONDS: u8 = 10;
