//! Per-client handler: optional greeting, then log (and optionally echo)
//! everything the client sends until it hangs up.

use std::net::SocketAddr;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use vcom_common::hex_preview;

const READ_BUFFER: usize = 4096;

#[derive(Debug, Clone, Default)]
pub struct SessionOptions {
    /// Send every received chunk straight back.
    pub echo: bool,
    /// Written once right after accept.
    pub greeting: Option<String>,
    /// Close the connection as soon as the greeting is out.
    pub close_after_greeting: bool,
}

/// Serve one client to completion. Returns the number of bytes received.
pub async fn handle_connection(
    mut stream: TcpStream,
    addr: SocketAddr,
    options: &SessionOptions,
) -> std::io::Result<u64> {
    if let Some(ref greeting) = options.greeting {
        stream.write_all(greeting.as_bytes()).await?;
        tracing::info!(peer = %addr, bytes = greeting.len(), "greeting sent");

        if options.close_after_greeting {
            stream.shutdown().await?;
            return Ok(0);
        }
    }

    let mut buf = vec![0u8; READ_BUFFER];
    let mut total = 0u64;
    loop {
        let n = stream.read(&mut buf).await?;
        if n == 0 {
            break;
        }
        let chunk = &buf[..n];
        total += n as u64;

        tracing::info!(
            peer = %addr,
            bytes = n,
            data = %hex_preview(chunk),
            text = %String::from_utf8_lossy(chunk).escape_debug(),
            "received"
        );

        if options.echo {
            stream.write_all(chunk).await?;
        }
    }
    Ok(total)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    async fn pair() -> (TcpStream, TcpStream, SocketAddr) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let client = TcpStream::connect(listener.local_addr().unwrap())
            .await
            .unwrap();
        let (server, addr) = listener.accept().await.unwrap();
        (client, server, addr)
    }

    #[tokio::test]
    async fn counts_bytes_until_client_hangs_up() {
        let (mut client, server, addr) = pair().await;
        let options = SessionOptions::default();
        let handler = tokio::spawn(async move { handle_connection(server, addr, &options).await });

        client.write_all(b"Hello World\n").await.unwrap();
        client.shutdown().await.unwrap();

        assert_eq!(handler.await.unwrap().unwrap(), 12);
    }

    #[tokio::test]
    async fn echo_sends_bytes_back() {
        let (mut client, server, addr) = pair().await;
        let options = SessionOptions {
            echo: true,
            ..Default::default()
        };
        let handler = tokio::spawn(async move { handle_connection(server, addr, &options).await });

        client.write_all(b"ping").await.unwrap();
        let mut buf = [0u8; 4];
        client.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf, b"ping");

        drop(client);
        assert_eq!(handler.await.unwrap().unwrap(), 4);
    }

    #[tokio::test]
    async fn greeting_then_close() {
        let (mut client, server, addr) = pair().await;
        let options = SessionOptions {
            greeting: Some("ACK".into()),
            close_after_greeting: true,
            ..Default::default()
        };
        let handler = tokio::spawn(async move { handle_connection(server, addr, &options).await });

        let mut received = Vec::new();
        client.read_to_end(&mut received).await.unwrap();

        assert_eq!(received, b"ACK");
        assert_eq!(handler.await.unwrap().unwrap(), 0);
    }
}
