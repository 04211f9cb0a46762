//! Tunnel error types. Every variant names the phase that failed and keeps
//! the OS reason as its source.

use std::path::PathBuf;

use vcom_common::VcomError;

#[derive(Debug, thiserror::Error)]
pub enum TunnelError {
    #[error("line configuration error during {phase}: {source}")]
    LineConfig {
        phase: &'static str,
        #[source]
        source: nix::Error,
    },

    #[error("device error during {phase}: {source}")]
    Device {
        phase: &'static str,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to publish {path}: {source}")]
    Publish {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to resolve {host}:{port}: {source}")]
    Resolve {
        host: String,
        port: u16,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to connect to {addr}: {source}")]
    Connect {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to spawn thread {name}: {source}")]
    Thread {
        name: &'static str,
        #[source]
        source: std::io::Error,
    },
}

impl TunnelError {
    pub(crate) fn device(phase: &'static str, source: impl Into<std::io::Error>) -> Self {
        TunnelError::Device {
            phase,
            source: source.into(),
        }
    }
}

impl From<TunnelError> for VcomError {
    fn from(err: TunnelError) -> Self {
        match err {
            TunnelError::LineConfig { .. }
            | TunnelError::Device { .. }
            | TunnelError::Publish { .. } => VcomError::Device(err.to_string()),
            TunnelError::Resolve { .. } | TunnelError::Connect { .. } => {
                VcomError::Network(err.to_string())
            }
            TunnelError::Thread { .. } => VcomError::Setup(err.to_string()),
        }
    }
}
