//! Network endpoint: resolve the remote peer and open a keep-alive TCP stream.

use std::net::{TcpStream, ToSocketAddrs};

use nix::sys::socket::{setsockopt, sockopt};

use crate::error::TunnelError;

/// Resolve `host` (numeric or symbolic) and connect to the first address that
/// accepts. Uses the OS default connect timeout.
pub fn connect(host: &str, port: u16) -> Result<TcpStream, TunnelError> {
    let addrs: Vec<_> = (host, port)
        .to_socket_addrs()
        .map_err(|source| TunnelError::Resolve {
            host: host.to_string(),
            port,
            source,
        })?
        .collect();

    let mut last_err = None;
    for addr in addrs {
        match TcpStream::connect(addr) {
            Ok(stream) => {
                enable_keepalive(&stream);
                tracing::info!(peer = %addr, "connected to remote endpoint");
                return Ok(stream);
            }
            Err(e) => {
                tracing::debug!(peer = %addr, error = %e, "connect attempt failed");
                last_err = Some((addr, e));
            }
        }
    }

    match last_err {
        Some((addr, source)) => Err(TunnelError::Connect {
            addr: addr.to_string(),
            source,
        }),
        None => Err(TunnelError::Resolve {
            host: host.to_string(),
            port,
            source: std::io::Error::new(
                std::io::ErrorKind::NotFound,
                "no addresses returned",
            ),
        }),
    }
}

fn enable_keepalive(stream: &TcpStream) {
    if let Err(e) = setsockopt(stream, sockopt::KeepAlive, &true) {
        tracing::warn!(error = %e, "failed to enable TCP keep-alive");
    }
}
