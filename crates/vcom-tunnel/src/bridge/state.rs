//! State shared by the two forwarding loops.

use std::io::{self, Write};
use std::net::{Shutdown, TcpStream};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::constants::SEND_TIMEOUT;

// =============================================================================
// CONNECTION
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
}

/// The socket plus its state. Only ever touched through [`BridgeState::connection`].
#[derive(Debug)]
pub struct NetworkConnection {
    state: ConnectionState,
    stream: Option<TcpStream>,
    /// Bumped on every successful attach; lets a reader tell whether its
    /// cloned handle still belongs to the live connection.
    generation: u64,
}

impl NetworkConnection {
    fn new(stream: Option<TcpStream>) -> Self {
        let mut conn = Self {
            state: ConnectionState::Disconnected,
            stream: None,
            generation: 0,
        };
        if let Some(stream) = stream {
            conn.attach(stream);
        }
        conn
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn is_connected(&self) -> bool {
        self.state == ConnectionState::Connected
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Install a freshly connected stream. Sends on it give up after
    /// [`SEND_TIMEOUT`].
    pub fn attach(&mut self, stream: TcpStream) {
        if let Err(e) = stream.set_write_timeout(Some(SEND_TIMEOUT)) {
            tracing::warn!(error = %e, "failed to bound socket send time");
        }
        self.stream = Some(stream);
        self.generation += 1;
        self.state = ConnectionState::Connected;
    }

    /// Mark a reconnect round in progress.
    pub fn begin_connecting(&mut self) {
        if !self.is_connected() {
            self.state = ConnectionState::Connecting;
        }
    }

    /// Reconnect round ended without a stream.
    pub fn end_connecting(&mut self) {
        if self.state == ConnectionState::Connecting {
            self.state = ConnectionState::Disconnected;
        }
    }

    /// Drop the current stream. Returns `false` if it was already gone.
    ///
    /// The socket is shut down in both directions first so any cloned
    /// handle blocked in a read observes end-of-stream.
    pub fn disconnect(&mut self) -> bool {
        let had_stream = match self.stream.take() {
            Some(stream) => {
                let _ = stream.shutdown(Shutdown::Both);
                true
            }
            None => false,
        };
        self.state = ConnectionState::Disconnected;
        had_stream
    }

    /// Disconnect only if `generation` is still the live connection.
    pub fn disconnect_generation(&mut self, generation: u64) -> bool {
        if self.generation == generation {
            self.disconnect()
        } else {
            false
        }
    }

    /// Clone a read handle for the live connection, tagged with its generation.
    pub fn reader(&self) -> Option<(u64, TcpStream)> {
        if !self.is_connected() {
            return None;
        }
        let stream = self.stream.as_ref()?;
        match stream.try_clone() {
            Ok(clone) => Some((self.generation, clone)),
            Err(e) => {
                tracing::warn!(error = %e, "failed to clone socket for reading");
                None
            }
        }
    }

    /// Write the whole buffer to the socket.
    pub fn write_all(&mut self, data: &[u8]) -> io::Result<()> {
        match self.stream.as_mut() {
            Some(stream) => stream.write_all(data),
            None => Err(io::Error::from(io::ErrorKind::NotConnected)),
        }
    }
}

// =============================================================================
// STATS
// =============================================================================

/// Traffic counters, updated lock-free by both loops.
#[derive(Debug, Default)]
pub struct BridgeStats {
    to_network: AtomicU64,
    to_device: AtomicU64,
    dropped: AtomicU64,
    reconnects: AtomicU64,
}

/// Point-in-time copy of [`BridgeStats`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StatsSnapshot {
    pub to_network: u64,
    pub to_device: u64,
    pub dropped: u64,
    pub reconnects: u64,
}

impl BridgeStats {
    pub fn add_to_network(&self, n: usize) {
        self.to_network.fetch_add(n as u64, Ordering::Relaxed);
    }

    pub fn add_to_device(&self, n: usize) {
        self.to_device.fetch_add(n as u64, Ordering::Relaxed);
    }

    pub fn add_dropped(&self, n: usize) {
        self.dropped.fetch_add(n as u64, Ordering::Relaxed);
    }

    pub fn add_reconnect(&self) {
        self.reconnects.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            to_network: self.to_network.load(Ordering::Relaxed),
            to_device: self.to_device.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
            reconnects: self.reconnects.load(Ordering::Relaxed),
        }
    }
}

// =============================================================================
// BRIDGE STATE
// =============================================================================

/// Aggregate shared by both loops and the lifecycle controller.
///
/// `running` only ever goes from `true` to `false`.
#[derive(Debug)]
pub struct BridgeState {
    running: AtomicBool,
    device_lost: AtomicBool,
    connection: Mutex<NetworkConnection>,
    stats: BridgeStats,
}

impl BridgeState {
    /// Running state around an optional already-connected stream.
    pub fn new(stream: Option<TcpStream>) -> Self {
        Self {
            running: AtomicBool::new(true),
            device_lost: AtomicBool::new(false),
            connection: Mutex::new(NetworkConnection::new(stream)),
            stats: BridgeStats::default(),
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Request shutdown. Returns `true` only for the call that flipped the flag.
    pub fn stop(&self) -> bool {
        self.running.swap(false, Ordering::SeqCst)
    }

    /// The local pty is gone; record it and stop the tunnel.
    pub fn mark_device_lost(&self) {
        self.device_lost.store(true, Ordering::SeqCst);
        self.stop();
    }

    pub fn device_lost(&self) -> bool {
        self.device_lost.load(Ordering::SeqCst)
    }

    /// Lock the connection. A poisoned lock is recovered: the guarded data is
    /// plain state that stays consistent between statements.
    pub fn connection(&self) -> MutexGuard<'_, NetworkConnection> {
        self.connection
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    pub fn is_connected(&self) -> bool {
        self.connection().is_connected()
    }

    pub fn stats(&self) -> &BridgeStats {
        &self.stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;
    use std::net::TcpListener;

    fn pair() -> (TcpStream, TcpStream) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let client = TcpStream::connect(listener.local_addr().unwrap()).unwrap();
        let (server, _) = listener.accept().unwrap();
        (client, server)
    }

    #[test]
    fn starts_running_and_stop_is_monotonic() {
        let state = BridgeState::new(None);
        assert!(state.is_running());
        assert!(state.stop());
        assert!(!state.stop());
        assert!(!state.is_running());
    }

    #[test]
    fn device_lost_also_stops() {
        let state = BridgeState::new(None);
        state.mark_device_lost();
        assert!(state.device_lost());
        assert!(!state.is_running());
    }

    #[test]
    fn new_with_stream_is_connected() {
        let (client, _server) = pair();
        let state = BridgeState::new(Some(client));
        assert!(state.is_connected());
        assert_eq!(state.connection().generation(), 1);
    }

    #[test]
    fn attached_stream_has_bounded_sends() {
        let (client, _server) = pair();
        let state = BridgeState::new(Some(client));
        let conn = state.connection();
        let stream = conn.stream.as_ref().unwrap();
        assert_eq!(stream.write_timeout().unwrap(), Some(SEND_TIMEOUT));
    }

    #[test]
    fn disconnect_is_idempotent() {
        let (client, _server) = pair();
        let state = BridgeState::new(Some(client));
        let mut conn = state.connection();
        assert!(conn.disconnect());
        assert!(!conn.disconnect());
        assert_eq!(conn.state(), ConnectionState::Disconnected);
    }

    #[test]
    fn disconnect_wakes_cloned_reader_with_eof() {
        let (client, _server) = pair();
        let state = BridgeState::new(Some(client));
        let (_, mut reader) = state.connection().reader().unwrap();

        state.connection().disconnect();

        let mut buf = [0u8; 8];
        assert_eq!(reader.read(&mut buf).unwrap(), 0);
    }

    #[test]
    fn stale_generation_does_not_disconnect_new_stream() {
        let (first, _s1) = pair();
        let (second, _s2) = pair();
        let state = BridgeState::new(Some(first));
        let old_gen = state.connection().generation();

        {
            let mut conn = state.connection();
            conn.disconnect();
            conn.attach(second);
        }

        assert!(!state.connection().disconnect_generation(old_gen));
        assert!(state.is_connected());
    }

    #[test]
    fn connecting_round_is_not_connected() {
        let state = BridgeState::new(None);
        let mut conn = state.connection();
        conn.begin_connecting();
        assert_eq!(conn.state(), ConnectionState::Connecting);
        assert!(!conn.is_connected());
        conn.end_connecting();
        assert_eq!(conn.state(), ConnectionState::Disconnected);
    }

    #[test]
    fn write_without_stream_is_not_connected_error() {
        let state = BridgeState::new(None);
        let err = state.connection().write_all(b"x").unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotConnected);
    }

    #[test]
    fn stats_accumulate() {
        let stats = BridgeStats::default();
        stats.add_to_network(12);
        stats.add_to_network(3);
        stats.add_to_device(3);
        stats.add_dropped(7);
        stats.add_reconnect();
        assert_eq!(
            stats.snapshot(),
            StatsSnapshot {
                to_network: 15,
                to_device: 3,
                dropped: 7,
                reconnects: 1,
            }
        );
    }
}
