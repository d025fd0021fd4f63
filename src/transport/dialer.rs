//! Connection establishment
//!
//! The transport is generic over how a byte stream is obtained so tests can
//! hand it in-memory duplex pipes instead of sockets.

use async_trait::async_trait;
use std::io;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;

/// Source of backend connections
#[async_trait]
pub trait Dialer: Send + Sync + 'static {
    type Stream: AsyncRead + AsyncWrite + Unpin + Send + 'static;

    /// Open a new connection, bounded by the dialer's own timeout
    async fn dial(&self) -> io::Result<Self::Stream>;
}

/// Dials the backend over TCP
#[derive(Debug, Clone)]
pub struct TcpDialer {
    addr: String,
    timeout: Duration,
}

impl TcpDialer {
    pub fn new(addr: impl Into<String>, timeout: Duration) -> Self {
        Self {
            addr: addr.into(),
            timeout,
        }
    }

    pub fn addr(&self) -> &str {
        &self.addr
    }
}

#[async_trait]
impl Dialer for TcpDialer {
    type Stream = TcpStream;

    async fn dial(&self) -> io::Result<TcpStream> {
        let stream = tokio::time::timeout(self.timeout, TcpStream::connect(&self.addr))
            .await
            .map_err(|_| {
                io::Error::new(
                    io::ErrorKind::TimedOut,
                    format!("connect to {} timed out after {:?}", self.addr, self.timeout),
                )
            })??;

        // Small JSON frames: latency matters more than packet count
        stream.set_nodelay(true)?;
        // Detect a backend that vanished without a FIN (killed process, sleep)
        socket2::SockRef::from(&stream).set_keepalive(true)?;
        Ok(stream)
    }
}
