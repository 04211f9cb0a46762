//! Tunnel lifecycle core: bring the device and link up in order, run the
//! bridge, tear everything down exactly once.
//!
//! The signal side of the lifecycle lives in the binary; this type only
//! knows how to start and how to stop.

use std::io;
use std::net::TcpStream;
use std::path::Path;
use std::sync::Arc;

use vcom_config::{SerialSettings, TunnelConfig};

use crate::bridge::{Bridge, BridgeOptions, BridgeState, StatsSnapshot};
use crate::device::PseudoDevice;
use crate::error::TunnelError;
use crate::network;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TunnelPhase {
    Init,
    DeviceReady,
    NetworkReady,
    Running,
    ShuttingDown,
    Stopped,
}

/// A running tunnel. Dropping it shuts it down.
#[derive(Debug)]
pub struct Tunnel {
    phase: TunnelPhase,
    device: PseudoDevice,
    state: Arc<BridgeState>,
    bridge: Option<Bridge>,
    settings: SerialSettings,
    endpoint: String,
}

impl Tunnel {
    /// Open and publish the device, connect, start both forwarding loops.
    ///
    /// The initial connection is mandatory. On any failure everything
    /// acquired so far is released (including the published link) and no
    /// loop is left running.
    pub fn start(config: &TunnelConfig) -> Result<Self, TunnelError> {
        let device = Self::open_device(config)?;
        let stream = network::connect(&config.remote.host, config.remote.port)?;
        Self::launch(device, stream, config)
    }

    /// First startup step: open the pty, apply the line settings and publish
    /// the link. Dropping the returned device removes the link again.
    pub fn open_device(config: &TunnelConfig) -> Result<PseudoDevice, TunnelError> {
        let mut device = PseudoDevice::open(&config.serial.settings())?;
        device.publish(&config.device.path)?;
        advance(&mut TunnelPhase::Init, TunnelPhase::DeviceReady);
        Ok(device)
    }

    /// Last startup step: hand an opened device and a connected stream to
    /// the forwarding loops.
    pub fn launch(
        device: PseudoDevice,
        stream: TcpStream,
        config: &TunnelConfig,
    ) -> Result<Self, TunnelError> {
        let mut phase = TunnelPhase::DeviceReady;
        advance(&mut phase, TunnelPhase::NetworkReady);

        let state = Arc::new(BridgeState::new(Some(stream)));
        let master = device.master().ok_or_else(|| {
            TunnelError::device("bridge start", io::Error::from(io::ErrorKind::NotFound))
        })?;
        let options = BridgeOptions {
            host: config.remote.host.clone(),
            port: config.remote.port,
            max_reconnect_attempts: config.remote.max_reconnect_attempts,
            reconnect_backoff: config.remote.reconnect_backoff(),
            debug: config.logging.debug,
        };
        let bridge = Bridge::spawn(master, Arc::clone(&state), options)?;
        advance(&mut phase, TunnelPhase::Running);

        Ok(Self {
            phase,
            device,
            state,
            bridge: Some(bridge),
            settings: config.serial.settings(),
            endpoint: config.remote.endpoint(),
        })
    }

    pub fn phase(&self) -> TunnelPhase {
        self.phase
    }

    /// Shared state, for observing `running` and the connection.
    pub fn state(&self) -> &Arc<BridgeState> {
        &self.state
    }

    pub fn settings(&self) -> &SerialSettings {
        &self.settings
    }

    /// Remote endpoint as `host:port`.
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn slave_path(&self) -> &Path {
        self.device.slave_path()
    }

    pub fn link_path(&self) -> Option<&Path> {
        self.device.link_path()
    }

    /// Whether the tunnel stopped because the local device died.
    pub fn device_lost(&self) -> bool {
        self.state.device_lost()
    }

    /// Stop the loops, join them, close the socket and the device, remove the
    /// link. Safe to call more than once; later calls only return the stats.
    pub fn shutdown(&mut self) -> StatsSnapshot {
        if self.phase == TunnelPhase::Stopped {
            return self.state.stats().snapshot();
        }
        advance(&mut self.phase, TunnelPhase::ShuttingDown);

        self.state.stop();
        if let Some(mut bridge) = self.bridge.take() {
            bridge.join();
        }
        self.state.connection().disconnect();
        self.device.teardown();

        let stats = self.state.stats().snapshot();
        tracing::info!(
            to_network = stats.to_network,
            to_device = stats.to_device,
            dropped = stats.dropped,
            reconnects = stats.reconnects,
            "tunnel stopped"
        );
        advance(&mut self.phase, TunnelPhase::Stopped);
        stats
    }
}

impl Drop for Tunnel {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn advance(phase: &mut TunnelPhase, next: TunnelPhase) {
    tracing::debug!(from = ?*phase, to = ?next, "tunnel phase");
    *phase = next;
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::TcpListener;

    fn config(dir: &Path, port: u16) -> TunnelConfig {
        let mut config = TunnelConfig::default();
        config.device.path = dir.join("vcom0");
        config.remote.port = port;
        config.remote.reconnect_backoff_secs = 0;
        config
    }

    fn closed_port() -> u16 {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().port()
    }

    #[test]
    fn start_without_listener_fails_and_leaves_no_link() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(dir.path(), closed_port());

        let err = Tunnel::start(&config).unwrap_err();

        assert!(matches!(err, TunnelError::Connect { .. }));
        assert!(std::fs::symlink_metadata(&config.device.path).is_err());
    }

    #[test]
    fn start_with_unpublishable_path_fails() {
        let dir = tempfile::tempdir().unwrap();
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let mut config = config(dir.path(), listener.local_addr().unwrap().port());
        config.device.path = dir.path().join("missing").join("vcom0");

        let err = Tunnel::start(&config).unwrap_err();
        assert!(matches!(err, TunnelError::Publish { .. }));
    }

    #[test]
    fn running_tunnel_publishes_link() {
        let dir = tempfile::tempdir().unwrap();
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let config = config(dir.path(), listener.local_addr().unwrap().port());

        let tunnel = Tunnel::start(&config).expect("start");

        assert_eq!(tunnel.phase(), TunnelPhase::Running);
        assert_eq!(tunnel.link_path(), Some(config.device.path.as_path()));
        assert_eq!(
            std::fs::read_link(&config.device.path).unwrap(),
            tunnel.slave_path()
        );
        assert!(tunnel.state().is_connected());
        assert_eq!(tunnel.endpoint(), format!("127.0.0.1:{}", config.remote.port));
    }

    #[test]
    fn shutdown_is_idempotent_and_removes_link() {
        let dir = tempfile::tempdir().unwrap();
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let config = config(dir.path(), listener.local_addr().unwrap().port());
        let mut tunnel = Tunnel::start(&config).unwrap();

        tunnel.shutdown();
        assert_eq!(tunnel.phase(), TunnelPhase::Stopped);
        assert!(std::fs::symlink_metadata(&config.device.path).is_err());
        assert!(!tunnel.state().is_running());
        assert!(!tunnel.state().is_connected());

        tunnel.shutdown();
        assert_eq!(tunnel.phase(), TunnelPhase::Stopped);
        assert!(!tunnel.device_lost());
    }

    #[test]
    fn dropping_an_unlaunched_device_removes_link() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(dir.path(), closed_port());

        let device = Tunnel::open_device(&config).unwrap();
        assert!(std::fs::symlink_metadata(&config.device.path).is_ok());

        drop(device);
        assert!(std::fs::symlink_metadata(&config.device.path).is_err());
    }

    #[test]
    fn drop_removes_link() {
        let dir = tempfile::tempdir().unwrap();
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let config = config(dir.path(), listener.local_addr().unwrap().port());

        drop(Tunnel::start(&config).unwrap());

        assert!(std::fs::symlink_metadata(&config.device.path).is_err());
    }
}
