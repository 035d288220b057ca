//! Shared wire type model.
//!
//! These types are the vocabulary every codec and the dispatcher agree on:
//! the closed set of wire types, the four message kinds, and the headers
//! written at message, field, and container boundaries.

use crate::error::ProtocolError;
use std::fmt;

/// The closed set of value shapes on the wire.
///
/// Enum values travel as `I32`; `Void` never appears inside a serialized
/// value and exists only as the absence of a result field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WireType {
    Void,
    Bool,
    Byte,
    I16,
    I32,
    I64,
    Double,
    /// Strings and raw byte blobs share one wire type; strings are UTF-8.
    String,
    Struct,
    Map,
    Set,
    List,
}

impl fmt::Display for WireType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            WireType::Void => "void",
            WireType::Bool => "bool",
            WireType::Byte => "byte",
            WireType::I16 => "i16",
            WireType::I32 => "i32",
            WireType::I64 => "i64",
            WireType::Double => "double",
            WireType::String => "string",
            WireType::Struct => "struct",
            WireType::Map => "map",
            WireType::Set => "set",
            WireType::List => "list",
        };
        write!(f, "{}", name)
    }
}

/// Message kinds in the TWP envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageKind {
    Call = 1,
    Reply = 2,
    Exception = 3,
    Oneway = 4,
}

impl MessageKind {
    pub fn code(self) -> u8 {
        self as u8
    }

    pub fn from_code(code: u8) -> Result<Self, ProtocolError> {
        match code {
            1 => Ok(MessageKind::Call),
            2 => Ok(MessageKind::Reply),
            3 => Ok(MessageKind::Exception),
            4 => Ok(MessageKind::Oneway),
            other => Err(ProtocolError::UnknownMessageKind(other)),
        }
    }
}

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            MessageKind::Call => "call",
            MessageKind::Reply => "reply",
            MessageKind::Exception => "exception",
            MessageKind::Oneway => "oneway",
        };
        write!(f, "{}", name)
    }
}

/// Message envelope: method name, kind, and the caller-assigned sequence id
/// correlating a request with its reply on a shared connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageHeader {
    pub name: String,
    pub kind: MessageKind,
    pub sequence_id: i32,
}

impl MessageHeader {
    pub fn new(name: impl Into<String>, kind: MessageKind, sequence_id: i32) -> Self {
        Self {
            name: name.into(),
            kind,
            sequence_id,
        }
    }
}

/// Header written before every struct field; absence (a stop marker on the
/// wire) signals the end of the struct.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldHeader {
    pub id: i16,
    pub field_type: WireType,
}

impl FieldHeader {
    pub fn new(id: i16, field_type: WireType) -> Self {
        Self { id, field_type }
    }
}

/// List header: element type and element count, declared up front.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ListHeader {
    pub element_type: WireType,
    pub size: usize,
}

impl ListHeader {
    pub fn new(element_type: WireType, size: usize) -> Self {
        Self { element_type, size }
    }
}

/// Set header: element type and element count, declared up front.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SetHeader {
    pub element_type: WireType,
    pub size: usize,
}

impl SetHeader {
    pub fn new(element_type: WireType, size: usize) -> Self {
        Self { element_type, size }
    }
}

/// Map header: key type, value type, and entry count, declared up front.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MapHeader {
    pub key_type: WireType,
    pub value_type: WireType,
    pub size: usize,
}

impl MapHeader {
    pub fn new(key_type: WireType, value_type: WireType, size: usize) -> Self {
        Self {
            key_type,
            value_type,
            size,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_kind_roundtrip() {
        for kind in [
            MessageKind::Call,
            MessageKind::Reply,
            MessageKind::Exception,
            MessageKind::Oneway,
        ] {
            assert_eq!(MessageKind::from_code(kind.code()).unwrap(), kind);
        }
    }

    #[test]
    fn test_message_kind_unknown() {
        assert!(matches!(
            MessageKind::from_code(0),
            Err(ProtocolError::UnknownMessageKind(0))
        ));
        assert!(matches!(
            MessageKind::from_code(9),
            Err(ProtocolError::UnknownMessageKind(9))
        ));
    }

    #[test]
    fn test_header_construction() {
        let header = MessageHeader::new("ping", MessageKind::Call, 7);
        assert_eq!(header.name, "ping");
        assert_eq!(header.sequence_id, 7);

        let field = FieldHeader::new(3, WireType::I64);
        assert_eq!(field.id, 3);
        assert_eq!(field.field_type, WireType::I64);
    }
}
