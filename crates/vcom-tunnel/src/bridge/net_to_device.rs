//! Network → device loop. Also the only place that reconnects.

use std::fs::File;
use std::io::{self, Read, Write};
use std::net::TcpStream;
use std::os::fd::AsFd;

use vcom_common::hex_preview;

use super::{sleep_while_running, wait_readable, BridgeOptions, BridgeState};
use crate::constants::{BUFFER_SIZE, NETWORK_POLL_TIMEOUT, RECONNECT_COOLDOWN};
use crate::network;

pub(super) fn run(master: &File, state: &BridgeState, options: &BridgeOptions) {
    let mut buf = [0u8; BUFFER_SIZE];
    // Read handle cloned from the live connection, tagged with its generation.
    let mut reader: Option<(u64, TcpStream)> = None;

    while state.is_running() {
        {
            let mut conn = state.connection();
            if conn.is_connected() {
                let current = conn.generation();
                if reader.as_ref().map(|(g, _)| *g) != Some(current) {
                    reader = conn.reader();
                    if reader.is_none() {
                        conn.disconnect();
                    }
                }
            } else {
                reader = None;
            }
        }

        let Some((generation, stream)) = reader.as_ref() else {
            if !reconnect(state, options) {
                sleep_while_running(state, RECONNECT_COOLDOWN);
            }
            continue;
        };
        let generation = *generation;

        match wait_readable(stream.as_fd(), NETWORK_POLL_TIMEOUT) {
            Ok(true) => {}
            Ok(false) => continue,
            Err(e) => {
                tracing::warn!(error = %e, "poll on socket failed");
                state.connection().disconnect_generation(generation);
                reader = None;
                continue;
            }
        }

        let n = match (&*stream).read(&mut buf) {
            Ok(0) => {
                tracing::info!("remote endpoint closed the connection");
                state.connection().disconnect_generation(generation);
                reader = None;
                continue;
            }
            Ok(n) => n,
            Err(e) if matches!(e.kind(), io::ErrorKind::WouldBlock | io::ErrorKind::Interrupted) => {
                continue
            }
            Err(e) => {
                tracing::warn!(error = %e, "receive from network failed, assuming peer is gone");
                state.connection().disconnect_generation(generation);
                reader = None;
                continue;
            }
        };
        let chunk = &buf[..n];

        if options.debug {
            tracing::debug!(bytes = n, data = %hex_preview(chunk), "received from network");
        }

        let _conn = state.connection();
        match (&*master).write_all(chunk) {
            Ok(()) => {
                state.stats().add_to_device(n);
                if options.debug {
                    tracing::debug!(bytes = n, "forwarded to application");
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, bytes = n, "write to pseudo-device failed");
                state.stats().add_dropped(n);
            }
        }
    }
}

/// One reconnect round: up to `max_reconnect_attempts` tries, pausing
/// `reconnect_backoff` between them. The lock is held only to flip state and
/// install the stream, never across a connect or a pause.
fn reconnect(state: &BridgeState, options: &BridgeOptions) -> bool {
    state.connection().begin_connecting();
    let max = options.max_reconnect_attempts.max(1);

    for attempt in 1..=max {
        if !state.is_running() {
            break;
        }

        tracing::info!(
            attempt,
            max,
            remote = %format_args!("{}:{}", options.host, options.port),
            "reconnecting"
        );
        match network::connect(&options.host, options.port) {
            Ok(stream) => {
                state.connection().attach(stream);
                state.stats().add_reconnect();
                tracing::info!(attempt, "reconnected");
                return true;
            }
            Err(e) => {
                tracing::warn!(attempt, max, error = %e, "reconnect attempt failed");
            }
        }

        if attempt < max && !sleep_while_running(state, options.reconnect_backoff) {
            break;
        }
    }

    state.connection().end_connecting();
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::TcpListener;
    use std::time::Duration;

    fn options(port: u16, attempts: u32) -> BridgeOptions {
        BridgeOptions {
            host: "127.0.0.1".into(),
            port,
            max_reconnect_attempts: attempts,
            reconnect_backoff: Duration::from_millis(10),
            debug: false,
        }
    }

    #[test]
    fn reconnect_installs_stream() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        let state = BridgeState::new(None);

        assert!(reconnect(&state, &options(port, 3)));
        assert!(state.is_connected());
        assert_eq!(state.stats().snapshot().reconnects, 1);
    }

    #[test]
    fn reconnect_gives_up_after_attempts() {
        let port = {
            let listener = TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap().port()
        };
        let state = BridgeState::new(None);

        assert!(!reconnect(&state, &options(port, 2)));
        assert!(!state.is_connected());
        assert_eq!(
            state.connection().state(),
            super::super::ConnectionState::Disconnected
        );
    }

    #[test]
    fn reconnect_skipped_once_stopped() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        let state = BridgeState::new(None);
        state.stop();

        assert!(!reconnect(&state, &options(port, 3)));
        assert!(!state.is_connected());
    }
}
