//! The structured codec contract shared by all three wire encodings.
//!
//! Callers (generated stub code and the dispatcher) are encoding-agnostic:
//! they drive `ProtocolWriter`/`ProtocolReader` through balanced
//! begin/end markers and primitive operations, and `ProtocolKind` selects
//! the byte-level encoding at construction time.
//!
//! Writers serialize into an owned buffer handed out by `take_bytes`.
//! Readers parse from a caller-supplied byte slice and report how far they
//! got via `position`; input that ends mid-message surfaces as
//! `ProtocolError::Incomplete`, and the caller re-parses from the message
//! start once more bytes have arrived.

use crate::binary::{BinaryReader, BinaryWriter};
use crate::compact::{CompactReader, CompactWriter};
use crate::error::ProtocolError;
use crate::json::{JsonReader, JsonWriter};
use crate::types::{FieldHeader, ListHeader, MapHeader, MessageHeader, SetHeader};
use bytes::BytesMut;

/// Maximum struct/container nesting depth accepted by every codec.
pub const MAX_NESTING_DEPTH: usize = 64;

/// Maximum size accepted for a single decoded message, string, or
/// container (16 MiB). Guards against corrupt or hostile length fields.
pub const MAX_MESSAGE_SIZE: usize = 16 * 1024 * 1024;

/// Structured writer over one wire encoding.
pub trait ProtocolWriter: Send {
    fn write_message_begin(&mut self, header: &MessageHeader) -> Result<(), ProtocolError>;
    fn write_message_end(&mut self) -> Result<(), ProtocolError>;

    fn write_struct_begin(&mut self, name: &str) -> Result<(), ProtocolError>;
    fn write_struct_end(&mut self) -> Result<(), ProtocolError>;

    fn write_field_begin(&mut self, field: &FieldHeader) -> Result<(), ProtocolError>;
    fn write_field_end(&mut self) -> Result<(), ProtocolError>;
    fn write_field_stop(&mut self) -> Result<(), ProtocolError>;

    fn write_list_begin(&mut self, header: &ListHeader) -> Result<(), ProtocolError>;
    fn write_list_end(&mut self) -> Result<(), ProtocolError>;
    fn write_set_begin(&mut self, header: &SetHeader) -> Result<(), ProtocolError>;
    fn write_set_end(&mut self) -> Result<(), ProtocolError>;
    fn write_map_begin(&mut self, header: &MapHeader) -> Result<(), ProtocolError>;
    fn write_map_end(&mut self) -> Result<(), ProtocolError>;

    fn write_bool(&mut self, value: bool) -> Result<(), ProtocolError>;
    fn write_i8(&mut self, value: i8) -> Result<(), ProtocolError>;
    fn write_i16(&mut self, value: i16) -> Result<(), ProtocolError>;
    fn write_i32(&mut self, value: i32) -> Result<(), ProtocolError>;
    fn write_i64(&mut self, value: i64) -> Result<(), ProtocolError>;
    fn write_double(&mut self, value: f64) -> Result<(), ProtocolError>;
    fn write_string(&mut self, value: &str) -> Result<(), ProtocolError>;
    fn write_binary(&mut self, value: &[u8]) -> Result<(), ProtocolError>;

    /// Takes the serialized message bytes, leaving the writer empty.
    /// Valid only after `write_message_end`.
    fn take_bytes(&mut self) -> BytesMut;
}

/// Structured reader over one wire encoding.
pub trait ProtocolReader: Send {
    fn read_message_begin(&mut self) -> Result<MessageHeader, ProtocolError>;
    fn read_message_end(&mut self) -> Result<(), ProtocolError>;

    fn read_struct_begin(&mut self) -> Result<(), ProtocolError>;
    fn read_struct_end(&mut self) -> Result<(), ProtocolError>;

    /// Reads the next field header, or `None` at the struct's stop marker.
    fn read_field_begin(&mut self) -> Result<Option<FieldHeader>, ProtocolError>;
    fn read_field_end(&mut self) -> Result<(), ProtocolError>;

    fn read_list_begin(&mut self) -> Result<ListHeader, ProtocolError>;
    fn read_list_end(&mut self) -> Result<(), ProtocolError>;
    fn read_set_begin(&mut self) -> Result<SetHeader, ProtocolError>;
    fn read_set_end(&mut self) -> Result<(), ProtocolError>;
    fn read_map_begin(&mut self) -> Result<MapHeader, ProtocolError>;
    fn read_map_end(&mut self) -> Result<(), ProtocolError>;

    fn read_bool(&mut self) -> Result<bool, ProtocolError>;
    fn read_i8(&mut self) -> Result<i8, ProtocolError>;
    fn read_i16(&mut self) -> Result<i16, ProtocolError>;
    fn read_i32(&mut self) -> Result<i32, ProtocolError>;
    fn read_i64(&mut self) -> Result<i64, ProtocolError>;
    fn read_double(&mut self) -> Result<f64, ProtocolError>;
    fn read_string(&mut self) -> Result<String, ProtocolError>;
    fn read_binary(&mut self) -> Result<Vec<u8>, ProtocolError>;

    /// Bytes consumed from the input so far. After `read_message_end` this
    /// is the full encoded length of the message, which the transport layer
    /// uses to advance its receive buffer.
    fn position(&self) -> usize;
}

/// Selects one of the three interchangeable wire encodings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProtocolKind {
    /// Fixed-width big-endian encoding.
    #[default]
    Binary,
    /// Variable-length zig-zag/varint encoding with field-id deltas.
    Compact,
    /// JSON text encoding.
    Json,
}

impl ProtocolKind {
    /// Creates a writer for one message in this encoding.
    pub fn writer(self) -> Box<dyn ProtocolWriter> {
        match self {
            ProtocolKind::Binary => Box::new(BinaryWriter::new()),
            ProtocolKind::Compact => Box::new(CompactWriter::new()),
            ProtocolKind::Json => Box::new(JsonWriter::new()),
        }
    }

    /// Creates a reader over `input` in this encoding.
    pub fn reader(self, input: &[u8]) -> Box<dyn ProtocolReader + '_> {
        match self {
            ProtocolKind::Binary => Box::new(BinaryReader::new(input)),
            ProtocolKind::Compact => Box::new(CompactReader::new(input)),
            ProtocolKind::Json => Box::new(JsonReader::new(input)),
        }
    }
}

/// Kinds of open begin/end scopes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ScopeKind {
    Struct,
    List,
    Set,
    Map,
}

/// One open scope. Struct scopes carry the compact encoding's last-written
/// field id, since field-id deltas are scoped per struct, not per message.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Scope {
    pub kind: ScopeKind,
    pub last_field_id: i16,
}

/// Explicit stack of open struct/container scopes.
///
/// Pushed on every begin, popped and kind-checked on every end, asserted
/// empty at message end. Reset when a new message begins, so no state
/// leaks across messages.
#[derive(Debug, Default)]
pub(crate) struct NestingStack {
    scopes: Vec<Scope>,
}

impl NestingStack {
    pub fn new() -> Self {
        Self { scopes: Vec::new() }
    }

    pub fn push(&mut self, kind: ScopeKind) -> Result<(), ProtocolError> {
        if self.scopes.len() >= MAX_NESTING_DEPTH {
            return Err(ProtocolError::DepthLimit);
        }
        self.scopes.push(Scope {
            kind,
            last_field_id: 0,
        });
        Ok(())
    }

    pub fn pop(&mut self, kind: ScopeKind) -> Result<Scope, ProtocolError> {
        match self.scopes.pop() {
            Some(scope) if scope.kind == kind => Ok(scope),
            Some(_) => Err(ProtocolError::UnbalancedNesting(
                "end marker does not match open scope",
            )),
            None => Err(ProtocolError::UnbalancedNesting("end marker without begin")),
        }
    }

    /// The innermost open struct scope; field operations are only legal
    /// inside one.
    pub fn current_struct(&mut self) -> Result<&mut Scope, ProtocolError> {
        match self.scopes.last_mut() {
            Some(scope) if scope.kind == ScopeKind::Struct => Ok(scope),
            _ => Err(ProtocolError::UnbalancedNesting(
                "field marker outside an open struct",
            )),
        }
    }

    pub fn ensure_empty(&self) -> Result<(), ProtocolError> {
        if self.scopes.is_empty() {
            Ok(())
        } else {
            Err(ProtocolError::UnbalancedNesting(
                "message end with open scopes",
            ))
        }
    }

    pub fn clear(&mut self) {
        self.scopes.clear();
    }
}
