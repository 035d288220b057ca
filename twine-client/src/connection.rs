//! Connection management and call dispatch.
//!
//! A [`Connection`] owns one protocol/transport pair and serializes
//! concurrently issued calls onto it: the pair is a single ordered
//! resource, so at most one call runs its write-then-read exchange at a
//! time. Waiting callers suspend on the connection lock (acquired in
//! first-come order) rather than blocking their own task, and a queued
//! call that is dropped before acquiring the lock leaves no trace on the
//! wire. Once a call has begun writing there is no clean cancellation:
//! it runs to completion or failure.

use crate::error::ClientError;
use crate::framed::FramedTransport;
use crate::listener::ConnectionListener;
use crate::transport::{TcpTransport, Transport};
use bytes::{Buf, BytesMut};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicI32, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use twine_protocol::{
    ApplicationException, MessageHeader, MessageKind, ProtocolError, ProtocolKind, WireRead,
    WireWrite, MAX_MESSAGE_SIZE,
};

/// Default read buffer size (8 KiB).
pub const DEFAULT_READ_BUFFER_SIZE: usize = 8 * 1024;

/// Minimum read buffer size (1 KiB).
pub const MIN_READ_BUFFER_SIZE: usize = 1024;

/// Maximum read buffer size (1 MiB).
pub const MAX_READ_BUFFER_SIZE: usize = 1024 * 1024;

/// Connection configuration.
#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    /// Server address.
    pub addr: SocketAddr,
    /// Connection timeout.
    pub connect_timeout: Duration,
    /// Read deadline for replies; `None` waits indefinitely.
    pub read_timeout: Option<Duration>,
    /// Wire encoding spoken on this connection.
    pub protocol: ProtocolKind,
    /// Whether messages travel as length-prefixed frames.
    pub framed: bool,
    /// Maximum accepted frame size when framing is enabled.
    pub max_frame_size: usize,
    /// Read buffer size for socket reads.
    pub read_buffer_size: usize,
}

impl ConnectionConfig {
    pub fn new(addr: SocketAddr) -> Self {
        Self {
            addr,
            connect_timeout: Duration::from_secs(10),
            read_timeout: Some(Duration::from_secs(30)),
            protocol: ProtocolKind::Binary,
            framed: true,
            max_frame_size: MAX_MESSAGE_SIZE,
            read_buffer_size: DEFAULT_READ_BUFFER_SIZE,
        }
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn with_read_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.read_timeout = timeout;
        self
    }

    pub fn with_protocol(mut self, protocol: ProtocolKind) -> Self {
        self.protocol = protocol;
        self
    }

    pub fn with_framing(mut self, framed: bool) -> Self {
        self.framed = framed;
        self
    }

    pub fn with_max_frame_size(mut self, max: usize) -> Self {
        self.max_frame_size = max;
        self
    }

    pub fn with_read_buffer_size(mut self, size: usize) -> Self {
        self.read_buffer_size = size.clamp(MIN_READ_BUFFER_SIZE, MAX_READ_BUFFER_SIZE);
        self
    }
}

struct Io {
    transport: Box<dyn Transport>,
    read_buf: BytesMut,
}

enum IoState {
    Open(Io),
    /// Poisoned by a transport or decode failure; queued callers observe
    /// this when they acquire the lock and fail without touching I/O.
    Broken,
    Closed,
}

/// A connection to a twine server: the client-side call dispatcher.
pub struct Connection {
    protocol: ProtocolKind,
    read_buffer_size: usize,
    io: Mutex<IoState>,
    next_sequence_id: AtomicI32,
    listener: Arc<dyn ConnectionListener>,
}

impl Connection {
    /// Connects over TCP with the given configuration.
    pub async fn connect(
        config: &ConnectionConfig,
        listener: Arc<dyn ConnectionListener>,
    ) -> Result<Self, ClientError> {
        let tcp =
            TcpTransport::connect(config.addr, config.connect_timeout, config.read_timeout).await?;
        let transport: Box<dyn Transport> = if config.framed {
            Box::new(FramedTransport::with_max_frame_size(
                tcp,
                config.max_frame_size,
            ))
        } else {
            Box::new(tcp)
        };
        Ok(Self::build(
            transport,
            config.protocol,
            config.read_buffer_size,
            listener,
        ))
    }

    /// Wraps an already-established transport, for callers that build
    /// their own byte streams.
    pub fn with_transport(
        transport: Box<dyn Transport>,
        protocol: ProtocolKind,
        listener: Arc<dyn ConnectionListener>,
    ) -> Self {
        Self::build(transport, protocol, DEFAULT_READ_BUFFER_SIZE, listener)
    }

    fn build(
        transport: Box<dyn Transport>,
        protocol: ProtocolKind,
        read_buffer_size: usize,
        listener: Arc<dyn ConnectionListener>,
    ) -> Self {
        Self {
            protocol,
            read_buffer_size,
            io: Mutex::new(IoState::Open(Io {
                transport,
                read_buf: BytesMut::with_capacity(read_buffer_size),
            })),
            next_sequence_id: AtomicI32::new(1),
            listener,
        }
    }

    /// Issues a two-way call and waits for its reply.
    ///
    /// The reply envelope must carry the sequence id just sent; calls on
    /// one connection are strictly request-then-response, so a mismatch
    /// means the stream is desynchronized and the connection is failed. A
    /// reply of kind exception decodes into an [`ApplicationException`]
    /// and does not poison the connection.
    pub async fn call<A: WireWrite, R: WireRead>(
        &self,
        method: &str,
        args: &A,
    ) -> Result<R, ClientError> {
        let sequence_id = self.next_sequence_id.fetch_add(1, Ordering::SeqCst);
        let request = self.encode(method, MessageKind::Call, sequence_id, args)?;
        tracing::debug!("issuing call method={} seq={}", method, sequence_id);

        let mut guard = self.io.lock().await;
        let io = match &mut *guard {
            IoState::Open(io) => io,
            IoState::Broken => return Err(ClientError::ConnectionBroken),
            IoState::Closed => return Err(ClientError::Closed),
        };
        let outcome =
            Self::exchange::<R>(self.protocol, self.read_buffer_size, io, &request, sequence_id)
                .await;
        match outcome {
            Err(err) if err.is_connection_fatal() => {
                self.fail_connection(&mut *guard, &err).await;
                Err(err)
            }
            other => other,
        }
    }

    /// Issues a one-way call: returns as soon as the request is written
    /// and flushed, without waiting for or expecting any reply bytes.
    pub async fn call_oneway<A: WireWrite>(
        &self,
        method: &str,
        args: &A,
    ) -> Result<(), ClientError> {
        let sequence_id = self.next_sequence_id.fetch_add(1, Ordering::SeqCst);
        let request = self.encode(method, MessageKind::Oneway, sequence_id, args)?;
        tracing::debug!("issuing oneway method={} seq={}", method, sequence_id);

        let mut guard = self.io.lock().await;
        let io = match &mut *guard {
            IoState::Open(io) => io,
            IoState::Broken => return Err(ClientError::ConnectionBroken),
            IoState::Closed => return Err(ClientError::Closed),
        };
        let outcome = Self::send(io, &request).await;
        if let Err(err) = outcome {
            self.fail_connection(&mut *guard, &err).await;
            return Err(err);
        }
        Ok(())
    }

    /// Closes the connection. Idempotent; any call issued afterward fails
    /// immediately with [`ClientError::Closed`] without attempting I/O.
    pub async fn close(&self) {
        let mut guard = self.io.lock().await;
        if let IoState::Open(mut io) = std::mem::replace(&mut *guard, IoState::Closed) {
            let _ = io.transport.close().await;
            self.listener.on_closed();
            tracing::debug!("connection closed");
        }
    }

    fn encode<A: WireWrite>(
        &self,
        method: &str,
        kind: MessageKind,
        sequence_id: i32,
        args: &A,
    ) -> Result<BytesMut, ClientError> {
        let mut writer = self.protocol.writer();
        writer.write_message_begin(&MessageHeader::new(method, kind, sequence_id))?;
        args.write(writer.as_mut())?;
        writer.write_message_end()?;
        Ok(writer.take_bytes())
    }

    async fn send(io: &mut Io, request: &[u8]) -> Result<(), ClientError> {
        io.transport.write(request).await?;
        io.transport.flush().await
    }

    async fn exchange<R: WireRead>(
        protocol: ProtocolKind,
        read_buffer_size: usize,
        io: &mut Io,
        request: &[u8],
        sequence_id: i32,
    ) -> Result<R, ClientError> {
        Self::send(io, request).await?;

        let mut chunk = vec![0u8; read_buffer_size];
        loop {
            match Self::decode_reply::<R>(protocol, &io.read_buf, sequence_id) {
                Ok((outcome, consumed)) => {
                    io.read_buf.advance(consumed);
                    tracing::debug!("reply dispatched seq={}", sequence_id);
                    return outcome;
                }
                Err(ClientError::Protocol(ref e)) if e.is_incomplete() => {
                    if io.read_buf.len() > MAX_MESSAGE_SIZE {
                        return Err(ClientError::Protocol(ProtocolError::SizeLimit {
                            size: io.read_buf.len(),
                            max: MAX_MESSAGE_SIZE,
                        }));
                    }
                    let n = io.transport.read(&mut chunk).await?;
                    io.read_buf.extend_from_slice(&chunk[..n]);
                }
                Err(err) => return Err(err),
            }
        }
    }

    /// Attempts to decode one complete reply from `buf`. On success,
    /// returns the call outcome and the encoded length so the caller can
    /// advance its receive buffer; an incomplete buffer surfaces as
    /// `ProtocolError::Incomplete` and is re-parsed once more bytes arrive.
    fn decode_reply<R: WireRead>(
        protocol: ProtocolKind,
        buf: &[u8],
        expected_sequence_id: i32,
    ) -> Result<(Result<R, ClientError>, usize), ClientError> {
        let mut reader = protocol.reader(buf);
        let header = reader.read_message_begin()?;
        if header.sequence_id != expected_sequence_id {
            return Err(ClientError::SequenceMismatch {
                expected: expected_sequence_id,
                got: header.sequence_id,
            });
        }
        match header.kind {
            MessageKind::Reply => {
                let result = R::read(reader.as_mut())?;
                reader.read_message_end()?;
                Ok((Ok(result), reader.position()))
            }
            MessageKind::Exception => {
                let exception = ApplicationException::read(reader.as_mut())?;
                reader.read_message_end()?;
                Ok((Err(ClientError::Application(exception)), reader.position()))
            }
            other => Err(ClientError::InvalidReply(other)),
        }
    }

    /// Poisons the connection after a fatal failure: the transport is
    /// closed, every queued caller will observe `Broken` when it acquires
    /// the lock, and the listener hears about the error exactly once.
    async fn fail_connection(&self, state: &mut IoState, err: &ClientError) {
        if let IoState::Open(mut io) = std::mem::replace(state, IoState::Broken) {
            let _ = io.transport.close().await;
        }
        self.listener.on_error(err);
        tracing::warn!("connection broken: {}", err);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::listener::NoopListener;
    use crate::transport::StreamTransport;
    use std::sync::atomic::AtomicUsize;
    use tokio::io::{AsyncReadExt, AsyncWriteExt, DuplexStream};
    use twine_protocol::{FieldHeader, ProtocolReader, ProtocolWriter, WireType};

    #[derive(Debug, Clone, PartialEq, Default)]
    struct Echo {
        value: String,
    }

    impl WireWrite for Echo {
        fn write(&self, out: &mut dyn ProtocolWriter) -> Result<(), ProtocolError> {
            out.write_struct_begin("Echo")?;
            out.write_field_begin(&FieldHeader::new(1, WireType::String))?;
            out.write_string(&self.value)?;
            out.write_field_end()?;
            out.write_field_stop()?;
            out.write_struct_end()
        }
    }

    impl WireRead for Echo {
        fn read(input: &mut dyn ProtocolReader) -> Result<Self, ProtocolError> {
            let mut value = String::new();
            input.read_struct_begin()?;
            while let Some(field) = input.read_field_begin()? {
                match (field.id, field.field_type) {
                    (1, WireType::String) => value = input.read_string()?,
                    _ => twine_protocol::skip(input, field.field_type)?,
                }
                input.read_field_end()?;
            }
            input.read_struct_end()?;
            Ok(Self { value })
        }
    }

    #[derive(Default)]
    struct CountingListener {
        errors: AtomicUsize,
        closes: AtomicUsize,
    }

    impl ConnectionListener for CountingListener {
        fn on_error(&self, _error: &ClientError) {
            self.errors.fetch_add(1, Ordering::SeqCst);
        }

        fn on_closed(&self) {
            self.closes.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn framed_pair(
        protocol: ProtocolKind,
    ) -> (Arc<Connection>, DuplexStream, Arc<CountingListener>) {
        let (client, server) = tokio::io::duplex(64 * 1024);
        let listener = Arc::new(CountingListener::default());
        let transport = FramedTransport::new(StreamTransport::new(client));
        let conn = Arc::new(Connection::with_transport(
            Box::new(transport),
            protocol,
            listener.clone(),
        ));
        (conn, server, listener)
    }

    async fn read_frame(stream: &mut DuplexStream) -> Option<Vec<u8>> {
        let mut header = [0u8; 4];
        stream.read_exact(&mut header).await.ok()?;
        let len = u32::from_be_bytes(header) as usize;
        let mut payload = vec![0u8; len];
        stream.read_exact(&mut payload).await.ok()?;
        Some(payload)
    }

    async fn write_frame(stream: &mut DuplexStream, payload: &[u8]) {
        stream
            .write_all(&(payload.len() as u32).to_be_bytes())
            .await
            .unwrap();
        stream.write_all(payload).await.unwrap();
        stream.flush().await.unwrap();
    }

    fn decode_call(protocol: ProtocolKind, bytes: &[u8]) -> (MessageHeader, Echo) {
        let mut reader = protocol.reader(bytes);
        let header = reader.read_message_begin().unwrap();
        let args = Echo::read(reader.as_mut()).unwrap();
        reader.read_message_end().unwrap();
        (header, args)
    }

    fn encode_reply(
        protocol: ProtocolKind,
        kind: MessageKind,
        sequence_id: i32,
        body: &impl WireWrite,
    ) -> Vec<u8> {
        let mut writer = protocol.writer();
        writer
            .write_message_begin(&MessageHeader::new("echo", kind, sequence_id))
            .unwrap();
        body.write(writer.as_mut()).unwrap();
        writer.write_message_end().unwrap();
        writer.take_bytes().to_vec()
    }

    /// Serves `count` echo requests, replying to each with "echo:" + value.
    async fn echo_server(protocol: ProtocolKind, mut stream: DuplexStream, count: usize) {
        for _ in 0..count {
            let Some(request) = read_frame(&mut stream).await else {
                return;
            };
            let (header, args) = decode_call(protocol, &request);
            assert_eq!(header.kind, MessageKind::Call);
            let reply = encode_reply(
                protocol,
                MessageKind::Reply,
                header.sequence_id,
                &Echo {
                    value: format!("echo:{}", args.value),
                },
            );
            write_frame(&mut stream, &reply).await;
        }
    }

    #[tokio::test]
    async fn test_call_roundtrip_all_protocols() {
        for protocol in [ProtocolKind::Binary, ProtocolKind::Compact, ProtocolKind::Json] {
            let (conn, server, _listener) = framed_pair(protocol);
            let server_task = tokio::spawn(echo_server(protocol, server, 1));

            let result: Echo = conn
                .call(
                    "echo",
                    &Echo {
                        value: "hi".to_string(),
                    },
                )
                .await
                .unwrap();
            assert_eq!(result.value, "echo:hi");
            server_task.await.unwrap();
        }
    }

    #[tokio::test]
    async fn test_concurrent_calls_each_get_their_own_result() {
        let (conn, server, listener) = framed_pair(ProtocolKind::Compact);
        let server_task = tokio::spawn(echo_server(ProtocolKind::Compact, server, 5));

        let mut handles = Vec::new();
        for i in 0..5 {
            let conn = conn.clone();
            handles.push(tokio::spawn(async move {
                let result: Echo = conn
                    .call(
                        "echo",
                        &Echo {
                            value: i.to_string(),
                        },
                    )
                    .await
                    .unwrap();
                (i, result.value)
            }));
        }
        for handle in handles {
            let (i, value) = handle.await.unwrap();
            assert_eq!(value, format!("echo:{}", i));
        }
        assert_eq!(listener.errors.load(Ordering::SeqCst), 0);
        server_task.await.unwrap();
    }

    #[tokio::test]
    async fn test_exception_reply_is_raised_and_not_fatal() {
        let protocol = ProtocolKind::Binary;
        let (conn, mut server, listener) = framed_pair(protocol);
        let server_task = tokio::spawn(async move {
            let request = read_frame(&mut server).await.unwrap();
            let (header, _) = decode_call(protocol, &request);
            let reply = encode_reply(
                protocol,
                MessageKind::Exception,
                header.sequence_id,
                &ApplicationException::new(
                    twine_protocol::ApplicationErrorKind::Other(1001),
                    "Xception",
                ),
            );
            write_frame(&mut server, &reply).await;
            // The connection stays usable after an application exception.
            echo_server(protocol, server, 1).await;
        });

        let err = conn
            .call::<Echo, Echo>(
                "echo",
                &Echo {
                    value: "x".to_string(),
                },
            )
            .await
            .unwrap_err();
        match err {
            ClientError::Application(exception) => {
                assert_eq!(exception.kind.code(), 1001);
                assert_eq!(exception.message, "Xception");
            }
            other => panic!("expected application exception, got {other:?}"),
        }
        assert_eq!(listener.errors.load(Ordering::SeqCst), 0);

        let result: Echo = conn
            .call(
                "echo",
                &Echo {
                    value: "again".to_string(),
                },
            )
            .await
            .unwrap();
        assert_eq!(result.value, "echo:again");
        server_task.await.unwrap();
    }

    #[tokio::test]
    async fn test_transport_failure_fails_all_waiters_and_reports_once() {
        let (conn, mut server, listener) = framed_pair(ProtocolKind::Binary);
        let server_task = tokio::spawn(async move {
            // Accept one request, then drop the connection with both
            // calls still outstanding.
            let _ = read_frame(&mut server).await;
            drop(server);
        });

        let first = {
            let conn = conn.clone();
            tokio::spawn(async move {
                conn.call::<Echo, Echo>(
                    "echo",
                    &Echo {
                        value: "a".to_string(),
                    },
                )
                .await
            })
        };
        let second = {
            let conn = conn.clone();
            tokio::spawn(async move {
                conn.call::<Echo, Echo>(
                    "echo",
                    &Echo {
                        value: "b".to_string(),
                    },
                )
                .await
            })
        };

        let first = first.await.unwrap();
        let second = second.await.unwrap();
        assert!(first.is_err());
        assert!(second.is_err());
        // One call failed on the wire; the other observed the poisoned
        // connection without touching I/O.
        assert!(
            matches!(first, Err(ClientError::ConnectionBroken))
                || matches!(second, Err(ClientError::ConnectionBroken))
        );
        assert_eq!(listener.errors.load(Ordering::SeqCst), 1);
        server_task.await.unwrap();

        // Later calls keep failing without reaching the listener again.
        let err = conn
            .call::<Echo, Echo>(
                "echo",
                &Echo {
                    value: "c".to_string(),
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ClientError::ConnectionBroken));
        assert_eq!(listener.errors.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_oneway_returns_after_flush_and_reads_nothing() {
        let protocol = ProtocolKind::Binary;
        let (conn, mut server, listener) = framed_pair(protocol);
        let server_task = tokio::spawn(async move {
            let request = read_frame(&mut server).await.unwrap();
            let (header, args) = decode_call(protocol, &request);
            assert_eq!(header.kind, MessageKind::Oneway);
            assert_eq!(args.value, "fire");
            // No reply is ever written for a one-way call; the next
            // request proves the connection is immediately reusable.
            echo_server(protocol, server, 1).await;
        });

        conn.call_oneway(
            "notify",
            &Echo {
                value: "fire".to_string(),
            },
        )
        .await
        .unwrap();

        let result: Echo = conn
            .call(
                "echo",
                &Echo {
                    value: "next".to_string(),
                },
            )
            .await
            .unwrap();
        assert_eq!(result.value, "echo:next");
        assert_eq!(listener.errors.load(Ordering::SeqCst), 0);
        server_task.await.unwrap();
    }

    #[tokio::test]
    async fn test_sequence_mismatch_is_fatal() {
        let protocol = ProtocolKind::Binary;
        let (conn, mut server, listener) = framed_pair(protocol);
        let server_task = tokio::spawn(async move {
            let request = read_frame(&mut server).await.unwrap();
            let (header, _) = decode_call(protocol, &request);
            let reply = encode_reply(
                protocol,
                MessageKind::Reply,
                header.sequence_id + 100,
                &Echo::default(),
            );
            write_frame(&mut server, &reply).await;
        });

        let err = conn
            .call::<Echo, Echo>(
                "echo",
                &Echo {
                    value: "x".to_string(),
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ClientError::SequenceMismatch { .. }));
        assert_eq!(listener.errors.load(Ordering::SeqCst), 1);
        server_task.await.unwrap();
    }

    #[tokio::test]
    async fn test_unexpected_reply_kind_is_fatal() {
        let protocol = ProtocolKind::Binary;
        let (conn, mut server, listener) = framed_pair(protocol);
        let server_task = tokio::spawn(async move {
            let request = read_frame(&mut server).await.unwrap();
            let (header, _) = decode_call(protocol, &request);
            let reply = encode_reply(
                protocol,
                MessageKind::Call,
                header.sequence_id,
                &Echo::default(),
            );
            write_frame(&mut server, &reply).await;
        });

        let err = conn
            .call::<Echo, Echo>(
                "echo",
                &Echo {
                    value: "x".to_string(),
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ClientError::InvalidReply(MessageKind::Call)));
        assert_eq!(listener.errors.load(Ordering::SeqCst), 1);
        server_task.await.unwrap();
    }

    #[tokio::test]
    async fn test_close_then_call_fails_without_io() {
        let (conn, _server, listener) = framed_pair(ProtocolKind::Binary);
        conn.close().await;
        assert_eq!(listener.closes.load(Ordering::SeqCst), 1);

        let err = conn
            .call::<Echo, Echo>(
                "echo",
                &Echo {
                    value: "x".to_string(),
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ClientError::Closed));

        // Close is idempotent and does not re-notify.
        conn.close().await;
        assert_eq!(listener.closes.load(Ordering::SeqCst), 1);
        assert_eq!(listener.errors.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_unframed_reply_arriving_in_pieces() {
        let protocol = ProtocolKind::Binary;
        let (client, mut server) = tokio::io::duplex(64 * 1024);
        let conn = Arc::new(Connection::with_transport(
            Box::new(StreamTransport::new(client)),
            protocol,
            Arc::new(NoopListener),
        ));

        let server_task = tokio::spawn(async move {
            let mut request = vec![0u8; 4096];
            let n = server.read(&mut request).await.unwrap();
            let (header, args) = decode_call(protocol, &request[..n]);
            let reply = encode_reply(
                protocol,
                MessageKind::Reply,
                header.sequence_id,
                &Echo {
                    value: format!("echo:{}", args.value),
                },
            );
            // Dribble the reply out so the dispatcher has to re-parse.
            let mid = reply.len() / 2;
            server.write_all(&reply[..mid]).await.unwrap();
            server.flush().await.unwrap();
            tokio::task::yield_now().await;
            server.write_all(&reply[mid..]).await.unwrap();
            server.flush().await.unwrap();
        });

        let result: Echo = conn
            .call(
                "echo",
                &Echo {
                    value: "piecewise".to_string(),
                },
            )
            .await
            .unwrap();
        assert_eq!(result.value, "echo:piecewise");
        server_task.await.unwrap();
    }

    #[test]
    fn test_config_defaults_and_clamping() {
        let config = ConnectionConfig::new("127.0.0.1:9590".parse().unwrap());
        assert_eq!(config.read_buffer_size, DEFAULT_READ_BUFFER_SIZE);
        assert_eq!(config.connect_timeout, Duration::from_secs(10));
        assert!(config.framed);

        let config = ConnectionConfig::new("127.0.0.1:9590".parse().unwrap())
            .with_read_buffer_size(100);
        assert_eq!(config.read_buffer_size, MIN_READ_BUFFER_SIZE);

        let config = ConnectionConfig::new("127.0.0.1:9590".parse().unwrap())
            .with_read_buffer_size(10 * 1024 * 1024);
        assert_eq!(config.read_buffer_size, MAX_READ_BUFFER_SIZE);
    }
}
