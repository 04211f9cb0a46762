//! Lifecycle controller: start the tunnel, wait for a reason to stop, tear
//! it down.
//!
//! Blocking work (device setup, connect, joins) runs on the blocking pool;
//! the async side only waits on signals and on the shared `running` flag.
//! A signal during the initial connect abandons the connect attempt rather
//! than waiting out the OS connect timeout.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::signal::unix::{signal, Signal, SignalKind};
use vcom_common::VcomError;
use vcom_config::TunnelConfig;
use vcom_tunnel::{network, BridgeState, Tunnel, TunnelError};

/// How often the controller checks whether a forwarding loop stopped the tunnel.
const STATE_CHECK_INTERVAL: Duration = Duration::from_millis(200);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownReason {
    Interrupt,
    Terminate,
    /// A forwarding loop cleared `running` (local device lost).
    Stopped,
}

impl ShutdownReason {
    fn as_str(self) -> &'static str {
        match self {
            ShutdownReason::Interrupt => "SIGINT",
            ShutdownReason::Terminate => "SIGTERM",
            ShutdownReason::Stopped => "tunnel stopped itself",
        }
    }
}

/// Signal streams installed before startup, so a signal that arrives while
/// the device is being set up still leads to a clean teardown.
pub struct Signals {
    interrupt: Signal,
    terminate: Signal,
}

impl Signals {
    pub fn install() -> Result<Self, VcomError> {
        Ok(Self {
            interrupt: signal(SignalKind::interrupt())?,
            terminate: signal(SignalKind::terminate())?,
        })
    }

    /// Wait for the next SIGINT or SIGTERM.
    pub async fn recv(&mut self) -> ShutdownReason {
        tokio::select! {
            _ = self.interrupt.recv() => ShutdownReason::Interrupt,
            _ = self.terminate.recv() => ShutdownReason::Terminate,
        }
    }
}

/// Run one tunnel from startup to teardown.
pub async fn run(config: TunnelConfig) -> Result<(), VcomError> {
    let mut signals = Signals::install()?;

    let Some(tunnel) = start(config, signals.recv()).await? else {
        return Ok(());
    };

    log_banner(&tunnel);
    supervise(tunnel, &mut signals).await
}

/// Bring the tunnel up, or give up cleanly once `cancel` resolves.
///
/// Device setup is quick and runs to completion. The initial connect can
/// take as long as the OS connect timeout, so it is raced against `cancel`;
/// when `cancel` wins the published link is removed and the pending connect
/// is left to finish on its own. Returns `None` when cancelled.
async fn start<C>(config: TunnelConfig, cancel: C) -> Result<Option<Tunnel>, VcomError>
where
    C: Future<Output = ShutdownReason>,
{
    let device = {
        let config = config.clone();
        blocking("device setup", move || Tunnel::open_device(&config)).await?
    };

    let (host, port) = (config.remote.host.clone(), config.remote.port);
    let connect = blocking("connect", move || network::connect(&host, port));

    let stream = tokio::select! {
        biased;
        reason = cancel => {
            tracing::info!(reason = reason.as_str(), "interrupted during startup");
            drop(device);
            return Ok(None);
        }
        stream = connect => stream?,
    };

    let tunnel = blocking("bridge start", move || Tunnel::launch(device, stream, &config)).await?;
    Ok(Some(tunnel))
}

/// Run a fallible startup step on the blocking pool.
async fn blocking<T, F>(what: &'static str, step: F) -> Result<T, VcomError>
where
    F: FnOnce() -> Result<T, TunnelError> + Send + 'static,
    T: Send + 'static,
{
    let result = tokio::task::spawn_blocking(step)
        .await
        .map_err(|e| VcomError::Setup(format!("{what} task failed: {e}")))?;
    Ok(result?)
}

/// Wait for shutdown, then tear `tunnel` down off the async thread.
pub async fn supervise(mut tunnel: Tunnel, signals: &mut Signals) -> Result<(), VcomError> {
    let state = Arc::clone(tunnel.state());
    let reason = wait_for_shutdown(&state, signals).await;
    tracing::info!(reason = reason.as_str(), "shutting down");

    let device_lost = tokio::task::spawn_blocking(move || {
        tunnel.shutdown();
        tunnel.device_lost()
    })
    .await
    .map_err(|e| VcomError::Setup(format!("teardown task failed: {e}")))?;

    if device_lost {
        Err(VcomError::DeviceLost)
    } else {
        Ok(())
    }
}

/// Resolve on the first of SIGINT, SIGTERM or `running` going false. Later
/// signals are absorbed by the installed handlers and change nothing.
async fn wait_for_shutdown(state: &BridgeState, signals: &mut Signals) -> ShutdownReason {
    let mut tick = tokio::time::interval(STATE_CHECK_INTERVAL);
    loop {
        tokio::select! {
            reason = signals.recv() => return reason,
            _ = tick.tick() => {
                if !state.is_running() {
                    return ShutdownReason::Stopped;
                }
            }
        }
    }
}

fn log_banner(tunnel: &Tunnel) {
    let link = tunnel
        .link_path()
        .map(|p| p.display().to_string())
        .unwrap_or_default();

    tracing::info!(
        path = %link,
        slave = %tunnel.slave_path().display(),
        remote = %tunnel.endpoint(),
        settings = %tunnel.settings(),
        "virtual serial tunnel running"
    );
    tracing::info!("send:    echo 'hello' > {link}");
    tracing::info!("receive: cat {link}");
    tracing::info!("inspect: stty -F {link}");
    tracing::info!("press Ctrl+C to stop");
}
