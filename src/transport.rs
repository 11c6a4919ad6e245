//! Transport layer: one blocking-style TCP connection to the directory
//! server. No reconnection, no retry, no per-read timeout; a caller that
//! needs a deadline wraps the engine and closes the connection from outside.

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tracing::{debug, info};

use crate::{GatewayError, Result};

const READ_CHUNK: usize = 4096;

/// The engine's view of a connected transport. Implemented by
/// [`TcpTransport`] for real connections and by scripted fakes in tests.
#[allow(async_fn_in_trait)]
pub trait Transport {
    /// Write the whole buffer, blocking until it is flushed.
    async fn send(&mut self, buf: &[u8]) -> Result<()>;

    /// One blocking read; returns whatever bytes arrived. A closed or reset
    /// connection is a `Connection` error.
    async fn receive_more(&mut self) -> Result<Vec<u8>>;
}

#[derive(Debug)]
pub struct TcpTransport {
    stream: TcpStream,
}

impl TcpTransport {
    pub async fn connect(host: &str, port: u16) -> Result<Self> {
        let address = format!("{}:{}", host, port);
        let stream = TcpStream::connect(&address)
            .await
            .map_err(|e| GatewayError::Connect(format!("{}: {}", address, e)))?;
        info!("connected to {}", address);
        Ok(Self { stream })
    }
}

impl Transport for TcpTransport {
    async fn send(&mut self, buf: &[u8]) -> Result<()> {
        self.stream
            .write_all(buf)
            .await
            .map_err(|e| GatewayError::Connection(format!("write failed: {}", e)))?;
        debug!("sent {} bytes", buf.len());
        Ok(())
    }

    async fn receive_more(&mut self) -> Result<Vec<u8>> {
        let mut buf = vec![0u8; READ_CHUNK];
        let n = self
            .stream
            .read(&mut buf)
            .await
            .map_err(|e| GatewayError::Connection(format!("read failed: {}", e)))?;
        if n == 0 {
            return Err(GatewayError::Connection(
                "connection closed by peer".to_string(),
            ));
        }
        debug!("received {} bytes", n);
        buf.truncate(n);
        Ok(buf)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_connect_refused_maps_to_connect_error() {
        // Bind a listener to grab a free port, then close it so the port
        // refuses connections.
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let err = TcpTransport::connect("127.0.0.1", port).await.unwrap_err();
        assert!(matches!(err, GatewayError::Connect(_)));
    }

    #[tokio::test]
    async fn test_zero_length_read_is_connection_error() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let server = tokio::spawn(async move {
            let (socket, _) = listener.accept().await.unwrap();
            drop(socket);
        });

        let mut transport = TcpTransport::connect("127.0.0.1", addr.port()).await.unwrap();
        server.await.unwrap();

        let err = transport.receive_more().await.unwrap_err();
        assert!(matches!(err, GatewayError::Connection(_)));
    }

    #[tokio::test]
    async fn test_send_and_receive() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let server = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = [0u8; 5];
            socket.read_exact(&mut buf).await.unwrap();
            assert_eq!(&buf, b"hello");
            socket.write_all(b"world").await.unwrap();
        });

        let mut transport = TcpTransport::connect("127.0.0.1", addr.port()).await.unwrap();
        transport.send(b"hello").await.unwrap();
        let reply = transport.receive_more().await.unwrap();
        assert_eq!(reply, b"world");
        server.await.unwrap();
    }
}
