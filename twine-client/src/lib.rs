//! # twine-client
//!
//! Client runtime for twine.
//!
//! This crate provides:
//! - The async byte-stream [`Transport`] abstraction with TCP and
//!   length-prefixed framed implementations
//! - The call dispatcher: one [`Connection`] serializes concurrently
//!   issued calls onto a shared protocol/transport pair, matches replies
//!   to callers by sequence id, and fans failures out to every waiter
//! - Required connection-health listeners and client error types
//!
//! Wire encoding lives in `twine-protocol`; this crate moves encoded
//! messages over byte streams and drives calls to completion.

pub mod connection;
pub mod error;
pub mod framed;
pub mod listener;
pub mod transport;

pub use connection::{Connection, ConnectionConfig, DEFAULT_READ_BUFFER_SIZE};
pub use error::ClientError;
pub use framed::{FramedTransport, DEFAULT_MAX_FRAME_SIZE};
pub use listener::{ConnectionListener, NoopListener};
pub use transport::{read_exact, StreamTransport, TcpTransport, Transport};
