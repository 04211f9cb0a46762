//! vcom-peer: a single-client TCP endpoint for exercising a vcom tunnel.
//!
//! Logs every chunk the tunnel sends, can echo it back, and can greet each
//! client (and hang up right after) to test the device-bound direction.
//! Clients are served one at a time; the next is accepted when the current
//! one disconnects.

mod connection;

use std::process::ExitCode;

use clap::Parser;
use tokio::net::TcpListener;

use crate::connection::{handle_connection, SessionOptions};

#[derive(Parser)]
#[command(name = "vcom-peer", version, about = "TCP peer for testing vcom tunnels")]
struct Args {
    /// Port to listen on.
    #[arg(short, long, default_value_t = 8080)]
    port: u16,

    /// Address to bind.
    #[arg(long, default_value = "0.0.0.0")]
    bind: String,

    /// Echo received bytes back to the client.
    #[arg(long)]
    echo: bool,

    /// Text written to each client right after it connects.
    #[arg(long, value_name = "TEXT")]
    greeting: Option<String>,

    /// Close each client right after the greeting.
    #[arg(long, requires = "greeting")]
    close_after_greeting: bool,
}

impl Args {
    fn session_options(&self) -> SessionOptions {
        SessionOptions {
            echo: self.echo,
            greeting: self.greeting.clone(),
            close_after_greeting: self.close_after_greeting,
        }
    }
}

async fn serve(listener: TcpListener, options: SessionOptions) {
    loop {
        match listener.accept().await {
            Ok((stream, addr)) => {
                tracing::info!(peer = %addr, "client connected");
                match handle_connection(stream, addr, &options).await {
                    Ok(total) => tracing::info!(peer = %addr, total, "client disconnected"),
                    Err(e) => tracing::warn!(peer = %addr, error = %e, "client connection failed"),
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, "TCP accept error");
            }
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "vcom_peer=info".into()),
        )
        .init();

    let args = Args::parse();
    let options = args.session_options();

    let addr = format!("{}:{}", args.bind, args.port);
    let listener = match TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(e) => {
            tracing::error!(addr = %addr, error = %e, "failed to bind TCP listener");
            return ExitCode::FAILURE;
        }
    };

    tracing::info!("vcom-peer listening on {}", addr);

    tokio::select! {
        _ = serve(listener, options) => {}
        result = tokio::signal::ctrl_c() => {
            if let Err(e) = result {
                tracing::error!(error = %e, "failed to wait for Ctrl+C");
                return ExitCode::FAILURE;
            }
            tracing::info!("interrupted, exiting");
        }
    }
    ExitCode::SUCCESS
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let args = Args::try_parse_from(["vcom-peer"]).unwrap();
        assert_eq!(args.port, 8080);
        assert_eq!(args.bind, "0.0.0.0");
        let options = args.session_options();
        assert!(!options.echo);
        assert!(options.greeting.is_none());
    }

    #[test]
    fn close_after_greeting_requires_greeting() {
        assert!(Args::try_parse_from(["vcom-peer", "--close-after-greeting"]).is_err());
        let args = Args::try_parse_from([
            "vcom-peer",
            "--greeting",
            "ACK",
            "--close-after-greeting",
        ])
        .unwrap();
        assert!(args.session_options().close_after_greeting);
    }
}
