//! Bridge engine: two forwarding loops over a shared [`BridgeState`].
//!
//! - `vcom-dev2net` drains the pty master into the socket. It never
//!   reconnects; while the link is down it idles and drops what it reads.
//! - `vcom-net2dev` drains the socket into the pty master and owns
//!   reconnection, so only one thread ever moves the link from down to up.
//!
//! Either loop may take the link down on its own I/O failure; that
//! transition is idempotent and happens under the connection mutex.

mod device_to_net;
mod net_to_device;
mod state;

pub use state::{BridgeState, BridgeStats, ConnectionState, NetworkConnection, StatsSnapshot};

use std::fs::File;
use std::os::fd::BorrowedFd;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use nix::poll::{poll, PollFd, PollFlags, PollTimeout};

use crate::constants::SLEEP_SLICE;
use crate::error::TunnelError;

/// Remote endpoint and reconnection policy used by `vcom-net2dev`.
#[derive(Debug, Clone)]
pub struct BridgeOptions {
    pub host: String,
    pub port: u16,
    pub max_reconnect_attempts: u32,
    pub reconnect_backoff: Duration,
    /// Log every forwarded chunk with a hex preview.
    pub debug: bool,
}

/// Handles to the two running forwarding threads.
#[derive(Debug)]
pub struct Bridge {
    dev2net: Option<JoinHandle<()>>,
    net2dev: Option<JoinHandle<()>>,
}

impl Bridge {
    /// Start both loops. If the second thread cannot be created the first is
    /// stopped and joined before the error is returned.
    pub fn spawn(
        master: Arc<File>,
        state: Arc<BridgeState>,
        options: BridgeOptions,
    ) -> Result<Self, TunnelError> {
        let dev2net = {
            let master = Arc::clone(&master);
            let state = Arc::clone(&state);
            let debug = options.debug;
            spawn_named("vcom-dev2net", move || {
                device_to_net::run(&master, &state, debug)
            })?
        };

        let net2dev = {
            let state = Arc::clone(&state);
            spawn_named("vcom-net2dev", move || {
                net_to_device::run(&master, &state, &options)
            })
        };

        match net2dev {
            Ok(net2dev) => Ok(Self {
                dev2net: Some(dev2net),
                net2dev: Some(net2dev),
            }),
            Err(e) => {
                state.stop();
                let _ = dev2net.join();
                Err(e)
            }
        }
    }

    /// Wait for both loops to exit. Call after clearing `running`.
    pub fn join(&mut self) {
        for (name, handle) in [
            ("vcom-dev2net", self.dev2net.take()),
            ("vcom-net2dev", self.net2dev.take()),
        ] {
            if let Some(handle) = handle {
                if handle.join().is_err() {
                    tracing::error!(thread = name, "forwarding thread panicked");
                }
            }
        }
    }
}

fn spawn_named<F>(name: &'static str, f: F) -> Result<JoinHandle<()>, TunnelError>
where
    F: FnOnce() + Send + 'static,
{
    thread::Builder::new()
        .name(name.into())
        .spawn(move || {
            tracing::debug!("forwarding loop started");
            f();
            tracing::debug!("forwarding loop finished");
        })
        .map_err(|source| TunnelError::Thread { name, source })
}

// =============================================================================
// WAIT HELPERS
// =============================================================================

/// Wait up to `timeout` for `fd` to become readable (or report hang-up/error,
/// which the following read will surface). `EINTR` counts as "not ready".
fn wait_readable(fd: BorrowedFd<'_>, timeout: Duration) -> nix::Result<bool> {
    let millis = u16::try_from(timeout.as_millis()).unwrap_or(u16::MAX);
    let mut fds = [PollFd::new(fd, PollFlags::POLLIN)];
    match poll(&mut fds, PollTimeout::from(millis)) {
        Ok(0) => Ok(false),
        Ok(_) => Ok(fds[0].revents().is_some_and(|r| !r.is_empty())),
        Err(nix::Error::EINTR) => Ok(false),
        Err(e) => Err(e),
    }
}

/// Sleep for `duration` in slices, returning early once `running` clears.
/// Returns whether the bridge is still running.
fn sleep_while_running(state: &BridgeState, duration: Duration) -> bool {
    let deadline = Instant::now() + duration;
    while state.is_running() {
        let now = Instant::now();
        if now >= deadline {
            break;
        }
        thread::sleep(SLEEP_SLICE.min(deadline - now));
    }
    state.is_running()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sleep_returns_early_when_stopped() {
        let state = Arc::new(BridgeState::new(None));
        let stopper = Arc::clone(&state);
        let handle = thread::spawn(move || {
            thread::sleep(Duration::from_millis(50));
            stopper.stop();
        });

        let started = Instant::now();
        let still_running = sleep_while_running(&state, Duration::from_secs(30));
        handle.join().unwrap();

        assert!(!still_running);
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[test]
    fn sleep_completes_while_running() {
        let state = BridgeState::new(None);
        assert!(sleep_while_running(&state, Duration::from_millis(20)));
    }

    #[test]
    fn wait_readable_times_out_on_idle_socket() {
        use std::os::fd::AsFd;
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let client = std::net::TcpStream::connect(listener.local_addr().unwrap()).unwrap();
        let _server = listener.accept().unwrap();
        assert!(!wait_readable(client.as_fd(), Duration::from_millis(20)).unwrap());
    }
}
