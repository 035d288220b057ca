//! Byte-stream transport abstraction.

use crate::error::ClientError;
use async_trait::async_trait;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;

/// An ordered byte stream with explicit flush and close.
///
/// `read` blocks until at least one byte is available and never reports a
/// silent zero-length read: a closed or reset stream surfaces as
/// `ConnectionClosed`. `close` is idempotent and safe to call from a
/// different logical caller than the one reading, since deliberate
/// shutdown and call failure both route through it.
#[async_trait]
pub trait Transport: Send {
    /// Reads up to `buf.len()` bytes, returning how many were read (> 0).
    async fn read(&mut self, buf: &mut [u8]) -> Result<usize, ClientError>;

    /// Writes all of `buf`.
    async fn write(&mut self, buf: &[u8]) -> Result<(), ClientError>;

    /// Pushes buffered bytes to the peer.
    async fn flush(&mut self) -> Result<(), ClientError>;

    /// Shuts the stream down. Idempotent.
    async fn close(&mut self) -> Result<(), ClientError>;
}

/// Fills `buf` completely, looping over partial reads.
pub async fn read_exact<T: Transport + ?Sized>(
    transport: &mut T,
    buf: &mut [u8],
) -> Result<(), ClientError> {
    let mut filled = 0;
    while filled < buf.len() {
        let n = transport.read(&mut buf[filled..]).await?;
        filled += n;
    }
    Ok(())
}

/// Transport over any async byte stream, with an optional read deadline.
pub struct StreamTransport<S> {
    stream: S,
    read_timeout: Option<Duration>,
    closed: bool,
}

impl<S: AsyncRead + AsyncWrite + Unpin + Send> StreamTransport<S> {
    pub fn new(stream: S) -> Self {
        Self {
            stream,
            read_timeout: None,
            closed: false,
        }
    }

    pub fn with_read_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.read_timeout = timeout;
        self
    }
}

/// TCP transport.
pub type TcpTransport = StreamTransport<TcpStream>;

impl TcpTransport {
    /// Connects to `addr` within `connect_timeout`.
    pub async fn connect(
        addr: SocketAddr,
        connect_timeout: Duration,
        read_timeout: Option<Duration>,
    ) -> Result<Self, ClientError> {
        tracing::debug!("connecting to {}", addr);
        let stream = tokio::time::timeout(connect_timeout, TcpStream::connect(addr))
            .await
            .map_err(|_| ClientError::ConnectTimeout)??;
        stream.set_nodelay(true).ok();
        Ok(Self::new(stream).with_read_timeout(read_timeout))
    }
}

#[async_trait]
impl<S: AsyncRead + AsyncWrite + Unpin + Send> Transport for StreamTransport<S> {
    async fn read(&mut self, buf: &mut [u8]) -> Result<usize, ClientError> {
        if self.closed {
            return Err(ClientError::ConnectionClosed);
        }
        let n = match self.read_timeout {
            Some(timeout) => tokio::time::timeout(timeout, self.stream.read(buf))
                .await
                .map_err(|_| ClientError::Timeout)??,
            None => self.stream.read(buf).await?,
        };
        if n == 0 {
            return Err(ClientError::ConnectionClosed);
        }
        Ok(n)
    }

    async fn write(&mut self, buf: &[u8]) -> Result<(), ClientError> {
        if self.closed {
            return Err(ClientError::ConnectionClosed);
        }
        self.stream.write_all(buf).await?;
        Ok(())
    }

    async fn flush(&mut self) -> Result<(), ClientError> {
        if self.closed {
            return Err(ClientError::ConnectionClosed);
        }
        self.stream.flush().await?;
        Ok(())
    }

    async fn close(&mut self) -> Result<(), ClientError> {
        if !self.closed {
            self.closed = true;
            let _ = self.stream.shutdown().await;
        }
        Ok(())
    }
}
