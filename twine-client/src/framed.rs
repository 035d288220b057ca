//! Length-prefixed framing decorator.

use crate::error::ClientError;
use crate::transport::{read_exact, Transport};
use async_trait::async_trait;
use bytes::{Buf, BytesMut};

/// Default maximum accepted frame size (16 MiB).
pub const DEFAULT_MAX_FRAME_SIZE: usize = 16 * 1024 * 1024;

/// Decorates a transport so each logical message travels as one frame: a
/// 4-byte big-endian unsigned length followed by the message bytes.
///
/// Writes are buffered until `flush`, which emits the length prefix and
/// payload as a single underlying write. Reads buffer exactly one frame
/// and serve it out before touching the next, so frames never interleave.
/// A frame declaring a length beyond `max_frame_size` fails closed before
/// any allocation; a zero-length frame is valid and simply empty.
pub struct FramedTransport<T> {
    inner: T,
    max_frame_size: usize,
    write_buf: BytesMut,
    read_frame: BytesMut,
}

impl<T: Transport> FramedTransport<T> {
    pub fn new(inner: T) -> Self {
        Self::with_max_frame_size(inner, DEFAULT_MAX_FRAME_SIZE)
    }

    pub fn with_max_frame_size(inner: T, max_frame_size: usize) -> Self {
        Self {
            inner,
            max_frame_size,
            write_buf: BytesMut::new(),
            read_frame: BytesMut::new(),
        }
    }

    /// Reads the next frame off the underlying transport into the frame
    /// buffer, looping over partial reads.
    async fn fill_frame(&mut self) -> Result<(), ClientError> {
        let mut header = [0u8; 4];
        read_exact(&mut self.inner, &mut header).await?;
        let len = u32::from_be_bytes(header) as usize;
        if len > self.max_frame_size {
            return Err(ClientError::FrameTooLarge {
                size: len,
                max: self.max_frame_size,
            });
        }
        let mut frame = vec![0u8; len];
        read_exact(&mut self.inner, &mut frame).await?;
        self.read_frame.extend_from_slice(&frame);
        Ok(())
    }
}

#[async_trait]
impl<T: Transport> Transport for FramedTransport<T> {
    async fn read(&mut self, buf: &mut [u8]) -> Result<usize, ClientError> {
        if buf.is_empty() {
            return Ok(0);
        }
        // Empty frames are legal; keep pulling until bytes are available.
        while self.read_frame.is_empty() {
            self.fill_frame().await?;
        }
        let n = buf.len().min(self.read_frame.len());
        buf[..n].copy_from_slice(&self.read_frame[..n]);
        self.read_frame.advance(n);
        Ok(n)
    }

    async fn write(&mut self, buf: &[u8]) -> Result<(), ClientError> {
        if self.write_buf.len() + buf.len() > self.max_frame_size {
            return Err(ClientError::FrameTooLarge {
                size: self.write_buf.len() + buf.len(),
                max: self.max_frame_size,
            });
        }
        self.write_buf.extend_from_slice(buf);
        Ok(())
    }

    async fn flush(&mut self) -> Result<(), ClientError> {
        let payload = std::mem::take(&mut self.write_buf);
        let mut frame = BytesMut::with_capacity(4 + payload.len());
        frame.extend_from_slice(&(payload.len() as u32).to_be_bytes());
        frame.extend_from_slice(&payload);
        self.inner.write(&frame).await?;
        self.inner.flush().await
    }

    async fn close(&mut self) -> Result<(), ClientError> {
        self.inner.close().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Records every write; hands back queued bytes one at a time on read,
    /// simulating a maximally fragmented peer.
    struct TrickleTransport {
        incoming: Vec<u8>,
        pos: usize,
        writes: Vec<Vec<u8>>,
        flushes: usize,
    }

    impl TrickleTransport {
        fn new(incoming: Vec<u8>) -> Self {
            Self {
                incoming,
                pos: 0,
                writes: Vec::new(),
                flushes: 0,
            }
        }
    }

    #[async_trait]
    impl Transport for TrickleTransport {
        async fn read(&mut self, buf: &mut [u8]) -> Result<usize, ClientError> {
            if self.pos >= self.incoming.len() {
                return Err(ClientError::ConnectionClosed);
            }
            buf[0] = self.incoming[self.pos];
            self.pos += 1;
            Ok(1)
        }

        async fn write(&mut self, buf: &[u8]) -> Result<(), ClientError> {
            self.writes.push(buf.to_vec());
            Ok(())
        }

        async fn flush(&mut self) -> Result<(), ClientError> {
            self.flushes += 1;
            Ok(())
        }

        async fn close(&mut self) -> Result<(), ClientError> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_flush_emits_one_length_prefixed_write() {
        let mut framed = FramedTransport::new(TrickleTransport::new(Vec::new()));
        framed.write(b"hel").await.unwrap();
        framed.write(b"lo").await.unwrap();
        framed.flush().await.unwrap();

        assert_eq!(framed.inner.writes.len(), 1);
        assert_eq!(framed.inner.writes[0], b"\x00\x00\x00\x05hello");
        assert_eq!(framed.inner.flushes, 1);
    }

    #[tokio::test]
    async fn test_message_survives_one_byte_reads() {
        let message = b"a message of modest size".to_vec();
        let mut wire = (message.len() as u32).to_be_bytes().to_vec();
        wire.extend_from_slice(&message);

        let mut framed = FramedTransport::new(TrickleTransport::new(wire));
        let mut out = vec![0u8; message.len()];
        read_exact(&mut framed, &mut out).await.unwrap();
        assert_eq!(out, message);
    }

    #[tokio::test]
    async fn test_oversized_frame_fails_closed() {
        // Declares a 2 GiB frame; must fail before allocating it.
        let wire = 0x8000_0000u32.to_be_bytes().to_vec();
        let mut framed = FramedTransport::new(TrickleTransport::new(wire));
        let mut out = [0u8; 1];
        assert!(matches!(
            framed.read(&mut out).await,
            Err(ClientError::FrameTooLarge {
                size: 0x8000_0000,
                ..
            })
        ));
    }

    #[tokio::test]
    async fn test_empty_frame_is_skipped_not_an_error() {
        let mut wire = 0u32.to_be_bytes().to_vec();
        wire.extend_from_slice(&2u32.to_be_bytes());
        wire.extend_from_slice(b"ok");

        let mut framed = FramedTransport::new(TrickleTransport::new(wire));
        let mut out = [0u8; 2];
        read_exact(&mut framed, &mut out).await.unwrap();
        assert_eq!(&out, b"ok");
    }

    #[tokio::test]
    async fn test_frames_do_not_interleave() {
        let mut wire = Vec::new();
        for frame in [&b"first"[..], &b"second"[..]] {
            wire.extend_from_slice(&(frame.len() as u32).to_be_bytes());
            wire.extend_from_slice(frame);
        }

        let mut framed = FramedTransport::new(TrickleTransport::new(wire));
        // A short read drains only part of the first frame; the rest of
        // that frame must be served before the second frame begins.
        let mut out = [0u8; 3];
        read_exact(&mut framed, &mut out).await.unwrap();
        assert_eq!(&out, b"fir");
        let mut rest = [0u8; 2];
        read_exact(&mut framed, &mut rest).await.unwrap();
        assert_eq!(&rest, b"st");
        let mut second = [0u8; 6];
        read_exact(&mut framed, &mut second).await.unwrap();
        assert_eq!(&second, b"second");
    }

    #[tokio::test]
    async fn test_oversized_write_rejected() {
        let mut framed =
            FramedTransport::with_max_frame_size(TrickleTransport::new(Vec::new()), 8);
        framed.write(b"12345").await.unwrap();
        assert!(matches!(
            framed.write(b"6789A").await,
            Err(ClientError::FrameTooLarge { .. })
        ));
    }
}
