//! Device → network loop.

use std::fs::File;
use std::io::{self, Read};
use std::os::fd::AsFd;

use vcom_common::hex_preview;

use super::{wait_readable, BridgeState};
use crate::constants::{BUFFER_SIZE, DEVICE_POLL_TIMEOUT, DISCONNECTED_IDLE};

pub(super) fn run(master: &File, state: &BridgeState, debug: bool) {
    let mut buf = [0u8; BUFFER_SIZE];

    while state.is_running() {
        // While the link is down the wait doubles as the idle pause, and
        // whatever the application writes meanwhile is read and dropped.
        let timeout = if state.is_connected() {
            DEVICE_POLL_TIMEOUT
        } else {
            DISCONNECTED_IDLE
        };

        match wait_readable(master.as_fd(), timeout) {
            Ok(true) => {}
            Ok(false) => continue,
            Err(e) => {
                tracing::error!(error = %e, "poll on pseudo-device failed");
                state.mark_device_lost();
                break;
            }
        }

        let n = match (&*master).read(&mut buf) {
            Ok(0) => continue,
            Ok(n) => n,
            Err(e) if is_transient(&e) => continue,
            Err(e) => {
                tracing::error!(error = %e, "pseudo-device read failed, stopping tunnel");
                state.mark_device_lost();
                break;
            }
        };
        let chunk = &buf[..n];

        if debug {
            tracing::debug!(bytes = n, data = %hex_preview(chunk), "received from application");
        }

        forward(state, chunk, debug);
    }
}

/// Write one chunk to the socket under the connection lock. A chunk that
/// cannot be written is dropped; peer loss takes the link down.
///
/// A peer that stops reading stalls the send for at most `SEND_TIMEOUT`;
/// whatever part of the chunk did not fit is dropped.
fn forward(state: &BridgeState, chunk: &[u8], debug: bool) {
    let mut conn = state.connection();
    if !conn.is_connected() {
        state.stats().add_dropped(chunk.len());
        if debug {
            tracing::debug!(bytes = chunk.len(), "link down, chunk dropped");
        }
        return;
    }

    match conn.write_all(chunk) {
        Ok(()) => {
            state.stats().add_to_network(chunk.len());
            if debug {
                tracing::debug!(bytes = chunk.len(), "forwarded to network");
            }
        }
        Err(e) if is_stalled(&e) => {
            tracing::debug!(bytes = chunk.len(), "remote not reading, chunk dropped");
            state.stats().add_dropped(chunk.len());
        }
        Err(e) if is_peer_loss(&e) => {
            tracing::warn!(error = %e, "network connection lost");
            conn.disconnect();
            state.stats().add_dropped(chunk.len());
        }
        Err(e) => {
            tracing::warn!(error = %e, bytes = chunk.len(), "send to network failed, chunk dropped");
            state.stats().add_dropped(chunk.len());
        }
    }
}

fn is_transient(e: &io::Error) -> bool {
    matches!(
        e.kind(),
        io::ErrorKind::WouldBlock | io::ErrorKind::Interrupted
    )
}

fn is_stalled(e: &io::Error) -> bool {
    matches!(
        e.kind(),
        io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut
    )
}

fn is_peer_loss(e: &io::Error) -> bool {
    matches!(
        e.kind(),
        io::ErrorKind::BrokenPipe | io::ErrorKind::ConnectionReset | io::ErrorKind::NotConnected
    )
}
