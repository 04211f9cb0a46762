use std::path::PathBuf;

use clap::Parser;
use vcom_config::TunnelConfig;

/// vcom: publish a virtual serial port and tunnel it over TCP.
#[derive(Parser, Debug)]
#[command(name = "vcom", version, about)]
pub struct Args {
    /// Path at which the virtual port is published.
    #[arg(short = 'p', long, value_name = "PATH")]
    pub port_path: Option<PathBuf>,

    /// Remote endpoint; without a port the configured one is kept.
    #[arg(short = 's', long, value_name = "HOST[:PORT]", value_parser = parse_server)]
    pub server: Option<ServerAddr>,

    /// Baud rate (9600 .. 921600).
    #[arg(short = 'b', long)]
    pub baudrate: Option<u32>,

    /// Data bits (5-8).
    #[arg(short = 'd', long)]
    pub data_bits: Option<u8>,

    /// Stop bits (1 or 2).
    #[arg(short = 't', long)]
    pub stop_bits: Option<u8>,

    /// Parity: none, odd, even (or N, O, E).
    #[arg(short = 'y', long)]
    pub parity: Option<String>,

    /// Enable RTS/CTS flow control.
    #[arg(short = 'f', long)]
    pub flow_control: bool,

    /// Debug logging, including a hex preview of forwarded traffic.
    #[arg(short = 'v', long)]
    pub verbose: bool,

    /// Reconnect attempts per round after the link drops.
    #[arg(long, value_name = "N")]
    pub retries: Option<u32>,

    /// Seconds between reconnect attempts.
    #[arg(long, value_name = "SECS")]
    pub reconnect_delay: Option<u64>,

    /// Config file path override.
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Log filter directive override (e.g. "vcom_tunnel=trace").
    #[arg(long)]
    pub log_level: Option<String>,

    /// Print the effective configuration as JSON and exit.
    #[arg(long)]
    pub print_config: bool,
}

/// `-s` value: a host plus an optional port.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerAddr {
    pub host: String,
    pub port: Option<u16>,
}

/// Accepts `host`, `host:port`, `[v6]` and `[v6]:port`. A bare IPv6
/// address without brackets is taken as a host.
fn parse_server(value: &str) -> Result<ServerAddr, String> {
    let (host, port) = if let Some(rest) = value.strip_prefix('[') {
        let (host, tail) = rest
            .split_once(']')
            .ok_or_else(|| format!("missing ']' in '{value}'"))?;
        match tail {
            "" => (host, None),
            _ => match tail.strip_prefix(':') {
                Some(port) => (host, Some(port)),
                None => return Err(format!("unexpected '{tail}' after ']'")),
            },
        }
    } else {
        match value.split_once(':') {
            Some((host, port)) if !port.contains(':') => (host, Some(port)),
            _ => (value, None),
        }
    };

    if host.is_empty() {
        return Err("host must not be empty".into());
    }
    let port = port
        .map(|p| p.parse::<u16>().map_err(|_| format!("invalid port '{p}'")))
        .transpose()?;

    Ok(ServerAddr {
        host: host.to_string(),
        port,
    })
}

impl Args {
    /// Layer the command-line overrides on top of a loaded config.
    pub fn apply(&self, config: &mut TunnelConfig) {
        if let Some(ref path) = self.port_path {
            config.device.path = path.clone();
        }
        if let Some(ref server) = self.server {
            config.remote.host = server.host.clone();
            if let Some(port) = server.port {
                config.remote.port = port;
            }
        }
        if let Some(baud) = self.baudrate {
            config.serial.baudrate = baud;
        }
        if let Some(bits) = self.data_bits {
            config.serial.data_bits = bits;
        }
        if let Some(bits) = self.stop_bits {
            config.serial.stop_bits = bits;
        }
        if let Some(ref parity) = self.parity {
            config.serial.parity = parity.clone();
        }
        if self.flow_control {
            config.serial.flow_control = true;
        }
        if self.verbose {
            config.logging.debug = true;
        }
        if let Some(retries) = self.retries {
            config.remote.max_reconnect_attempts = retries;
        }
        if let Some(delay) = self.reconnect_delay {
            config.remote.reconnect_backoff_secs = delay;
        }
    }
}

pub fn parse() -> Args {
    Args::parse()
}
