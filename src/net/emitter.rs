//! Blind one-shot client: connect, send one payload, close.

use std::io;
use std::net::SocketAddr;

use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;

/// Payload sent when none is given.
pub const DEFAULT_PAYLOAD: &str = "Hello, Server!";

/// Address targeted when none is given.
pub const DEFAULT_ADDRESS: &str = "127.0.0.1:8080";

/// Error type for the emitter.
#[derive(Debug, Error)]
pub enum EmitError {
    #[error("Failed to connect to {addr}: {source}")]
    Connect {
        addr: SocketAddr,
        #[source]
        source: io::Error,
    },

    #[error("Failed to send: {0}")]
    Send(#[source] io::Error),
}

/// Connect to `addr`, write `payload` once and close.
///
/// Returns the number of bytes sent.
pub async fn emit(addr: SocketAddr, payload: &[u8]) -> Result<usize, EmitError> {
    let mut stream = TcpStream::connect(addr)
        .await
        .map_err(|source| EmitError::Connect { addr, source })?;

    tracing::info!(server = %addr, "Connected to server");

    stream.write_all(payload).await.map_err(EmitError::Send)?;
    tracing::info!(bytes = payload.len(), "Sent bytes");

    // The server never writes back; a failed half-close changes nothing for it.
    if let Err(e) = stream.shutdown().await {
        tracing::debug!(error = %e, "Shutdown after send failed");
    }

    Ok(payload.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncReadExt;
    use tokio::net::TcpListener;

    #[tokio::test]
    async fn delivers_payload_then_closes() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let server = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut received = Vec::new();
            socket.read_to_end(&mut received).await.unwrap();
            received
        });

        let sent = emit(addr, DEFAULT_PAYLOAD.as_bytes()).await.unwrap();
        assert_eq!(sent, DEFAULT_PAYLOAD.len());
        assert_eq!(server.await.unwrap(), DEFAULT_PAYLOAD.as_bytes());
    }

    #[tokio::test]
    async fn refused_connection_is_reported() {
        let addr = {
            let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
            listener.local_addr().unwrap()
        };

        let err = emit(addr, b"x").await.unwrap_err();
        assert!(matches!(err, EmitError::Connect { .. }));
    }
}
