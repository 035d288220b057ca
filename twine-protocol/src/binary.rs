//! Fixed-width big-endian encoding.
//!
//! Every integer is fixed-width big-endian; strings and binary are a
//! 4-byte length followed by raw bytes; field headers are a type byte and
//! a 2-byte field id, with a single zero byte as the struct stop marker.
//! Message headers carry a version tag for compatibility with the older
//! header-less layout, which readers reject with `BadVersion`.

use crate::error::ProtocolError;
use crate::protocol::{
    NestingStack, ProtocolReader, ProtocolWriter, ScopeKind, MAX_MESSAGE_SIZE,
};
use crate::types::{
    FieldHeader, ListHeader, MapHeader, MessageHeader, MessageKind, SetHeader, WireType,
};
use bytes::{BufMut, BytesMut};

/// Version tag carried in the high 16 bits of every message header.
pub const BINARY_VERSION_1: u32 = 0x8001_0000;

const VERSION_MASK: u32 = 0xFFFF_0000;

const STOP: u8 = 0;

fn type_code(value_type: WireType) -> u8 {
    match value_type {
        WireType::Void => 1,
        WireType::Bool => 2,
        WireType::Byte => 3,
        WireType::Double => 4,
        WireType::I16 => 6,
        WireType::I32 => 8,
        WireType::I64 => 10,
        WireType::String => 11,
        WireType::Struct => 12,
        WireType::Map => 13,
        WireType::Set => 14,
        WireType::List => 15,
    }
}

fn type_from_code(code: u8) -> Result<WireType, ProtocolError> {
    match code {
        1 => Ok(WireType::Void),
        2 => Ok(WireType::Bool),
        3 => Ok(WireType::Byte),
        4 => Ok(WireType::Double),
        6 => Ok(WireType::I16),
        8 => Ok(WireType::I32),
        10 => Ok(WireType::I64),
        11 => Ok(WireType::String),
        12 => Ok(WireType::Struct),
        13 => Ok(WireType::Map),
        14 => Ok(WireType::Set),
        15 => Ok(WireType::List),
        other => Err(ProtocolError::UnknownTypeCode(other)),
    }
}

fn check_write_size(size: usize) -> Result<i32, ProtocolError> {
    if size > MAX_MESSAGE_SIZE {
        return Err(ProtocolError::SizeLimit {
            size,
            max: MAX_MESSAGE_SIZE,
        });
    }
    Ok(size as i32)
}

/// Writer for the binary encoding.
pub struct BinaryWriter {
    buf: BytesMut,
    stack: NestingStack,
}

impl BinaryWriter {
    pub fn new() -> Self {
        Self {
            buf: BytesMut::with_capacity(256),
            stack: NestingStack::new(),
        }
    }

    fn put_len_prefixed(&mut self, bytes: &[u8]) -> Result<(), ProtocolError> {
        let len = check_write_size(bytes.len())?;
        self.buf.put_i32(len);
        self.buf.put_slice(bytes);
        Ok(())
    }
}

impl Default for BinaryWriter {
    fn default() -> Self {
        Self::new()
    }
}

impl ProtocolWriter for BinaryWriter {
    fn write_message_begin(&mut self, header: &MessageHeader) -> Result<(), ProtocolError> {
        self.stack.clear();
        self.buf
            .put_u32(BINARY_VERSION_1 | u32::from(header.kind.code()));
        self.put_len_prefixed(header.name.as_bytes())?;
        self.buf.put_i32(header.sequence_id);
        Ok(())
    }

    fn write_message_end(&mut self) -> Result<(), ProtocolError> {
        self.stack.ensure_empty()
    }

    fn write_struct_begin(&mut self, _name: &str) -> Result<(), ProtocolError> {
        self.stack.push(ScopeKind::Struct)
    }

    fn write_struct_end(&mut self) -> Result<(), ProtocolError> {
        self.stack.pop(ScopeKind::Struct)?;
        Ok(())
    }

    fn write_field_begin(&mut self, field: &FieldHeader) -> Result<(), ProtocolError> {
        self.stack.current_struct()?;
        self.buf.put_u8(type_code(field.field_type));
        self.buf.put_i16(field.id);
        Ok(())
    }

    fn write_field_end(&mut self) -> Result<(), ProtocolError> {
        Ok(())
    }

    fn write_field_stop(&mut self) -> Result<(), ProtocolError> {
        self.stack.current_struct()?;
        self.buf.put_u8(STOP);
        Ok(())
    }

    fn write_list_begin(&mut self, header: &ListHeader) -> Result<(), ProtocolError> {
        self.stack.push(ScopeKind::List)?;
        self.buf.put_u8(type_code(header.element_type));
        self.buf.put_i32(check_write_size(header.size)?);
        Ok(())
    }

    fn write_list_end(&mut self) -> Result<(), ProtocolError> {
        self.stack.pop(ScopeKind::List)?;
        Ok(())
    }

    fn write_set_begin(&mut self, header: &SetHeader) -> Result<(), ProtocolError> {
        self.stack.push(ScopeKind::Set)?;
        self.buf.put_u8(type_code(header.element_type));
        self.buf.put_i32(check_write_size(header.size)?);
        Ok(())
    }

    fn write_set_end(&mut self) -> Result<(), ProtocolError> {
        self.stack.pop(ScopeKind::Set)?;
        Ok(())
    }

    fn write_map_begin(&mut self, header: &MapHeader) -> Result<(), ProtocolError> {
        self.stack.push(ScopeKind::Map)?;
        self.buf.put_u8(type_code(header.key_type));
        self.buf.put_u8(type_code(header.value_type));
        self.buf.put_i32(check_write_size(header.size)?);
        Ok(())
    }

    fn write_map_end(&mut self) -> Result<(), ProtocolError> {
        self.stack.pop(ScopeKind::Map)?;
        Ok(())
    }

    fn write_bool(&mut self, value: bool) -> Result<(), ProtocolError> {
        self.buf.put_u8(u8::from(value));
        Ok(())
    }

    fn write_i8(&mut self, value: i8) -> Result<(), ProtocolError> {
        self.buf.put_i8(value);
        Ok(())
    }

    fn write_i16(&mut self, value: i16) -> Result<(), ProtocolError> {
        self.buf.put_i16(value);
        Ok(())
    }

    fn write_i32(&mut self, value: i32) -> Result<(), ProtocolError> {
        self.buf.put_i32(value);
        Ok(())
    }

    fn write_i64(&mut self, value: i64) -> Result<(), ProtocolError> {
        self.buf.put_i64(value);
        Ok(())
    }

    fn write_double(&mut self, value: f64) -> Result<(), ProtocolError> {
        self.buf.put_u64(value.to_bits());
        Ok(())
    }

    fn write_string(&mut self, value: &str) -> Result<(), ProtocolError> {
        self.put_len_prefixed(value.as_bytes())
    }

    fn write_binary(&mut self, value: &[u8]) -> Result<(), ProtocolError> {
        self.put_len_prefixed(value)
    }

    fn take_bytes(&mut self) -> BytesMut {
        std::mem::take(&mut self.buf)
    }
}

/// Reader for the binary encoding.
pub struct BinaryReader<'a> {
    input: &'a [u8],
    pos: usize,
    stack: NestingStack,
}

impl<'a> BinaryReader<'a> {
    pub fn new(input: &'a [u8]) -> Self {
        Self {
            input,
            pos: 0,
            stack: NestingStack::new(),
        }
    }

    fn remaining(&self) -> usize {
        self.input.len() - self.pos
    }

    fn need(&self, n: usize) -> Result<(), ProtocolError> {
        if self.remaining() < n {
            Err(ProtocolError::Incomplete {
                needed: n - self.remaining(),
            })
        } else {
            Ok(())
        }
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8], ProtocolError> {
        self.need(n)?;
        let bytes = &self.input[self.pos..self.pos + n];
        self.pos += n;
        Ok(bytes)
    }

    fn take_u8(&mut self) -> Result<u8, ProtocolError> {
        Ok(self.take(1)?[0])
    }

    fn take_u32(&mut self) -> Result<u32, ProtocolError> {
        let bytes = self.take(4)?;
        Ok(u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    /// Reads a 4-byte length and validates it before any allocation.
    fn take_len(&mut self) -> Result<usize, ProtocolError> {
        let len = self.take_u32()? as i32;
        if len < 0 {
            return Err(ProtocolError::NegativeSize(i64::from(len)));
        }
        let len = len as usize;
        if len > MAX_MESSAGE_SIZE {
            return Err(ProtocolError::SizeLimit {
                size: len,
                max: MAX_MESSAGE_SIZE,
            });
        }
        Ok(len)
    }
}

impl ProtocolReader for BinaryReader<'_> {
    fn read_message_begin(&mut self) -> Result<MessageHeader, ProtocolError> {
        self.stack.clear();
        let first = self.take_u32()?;
        if first & 0x8000_0000 == 0 {
            // Legacy header-less layout starts with the name length.
            return Err(ProtocolError::BadVersion(first));
        }
        if first & VERSION_MASK != BINARY_VERSION_1 {
            return Err(ProtocolError::BadVersion(first));
        }
        let kind = MessageKind::from_code((first & 0xFF) as u8)?;
        let name = self.read_string()?;
        let sequence_id = self.read_i32()?;
        Ok(MessageHeader {
            name,
            kind,
            sequence_id,
        })
    }

    fn read_message_end(&mut self) -> Result<(), ProtocolError> {
        self.stack.ensure_empty()
    }

    fn read_struct_begin(&mut self) -> Result<(), ProtocolError> {
        self.stack.push(ScopeKind::Struct)
    }

    fn read_struct_end(&mut self) -> Result<(), ProtocolError> {
        self.stack.pop(ScopeKind::Struct)?;
        Ok(())
    }

    fn read_field_begin(&mut self) -> Result<Option<FieldHeader>, ProtocolError> {
        self.stack.current_struct()?;
        let code = self.take_u8()?;
        if code == STOP {
            return Ok(None);
        }
        let field_type = type_from_code(code)?;
        let bytes = self.take(2)?;
        let id = i16::from_be_bytes([bytes[0], bytes[1]]);
        Ok(Some(FieldHeader { id, field_type }))
    }

    fn read_field_end(&mut self) -> Result<(), ProtocolError> {
        Ok(())
    }

    fn read_list_begin(&mut self) -> Result<ListHeader, ProtocolError> {
        self.stack.push(ScopeKind::List)?;
        let element_type = type_from_code(self.take_u8()?)?;
        let size = self.take_len()?;
        Ok(ListHeader { element_type, size })
    }

    fn read_list_end(&mut self) -> Result<(), ProtocolError> {
        self.stack.pop(ScopeKind::List)?;
        Ok(())
    }

    fn read_set_begin(&mut self) -> Result<SetHeader, ProtocolError> {
        self.stack.push(ScopeKind::Set)?;
        let element_type = type_from_code(self.take_u8()?)?;
        let size = self.take_len()?;
        Ok(SetHeader { element_type, size })
    }

    fn read_set_end(&mut self) -> Result<(), ProtocolError> {
        self.stack.pop(ScopeKind::Set)?;
        Ok(())
    }

    fn read_map_begin(&mut self) -> Result<MapHeader, ProtocolError> {
        self.stack.push(ScopeKind::Map)?;
        let key_type = type_from_code(self.take_u8()?)?;
        let value_type = type_from_code(self.take_u8()?)?;
        let size = self.take_len()?;
        Ok(MapHeader {
            key_type,
            value_type,
            size,
        })
    }

    fn read_map_end(&mut self) -> Result<(), ProtocolError> {
        self.stack.pop(ScopeKind::Map)?;
        Ok(())
    }

    fn read_bool(&mut self) -> Result<bool, ProtocolError> {
        Ok(self.take_u8()? != 0)
    }

    fn read_i8(&mut self) -> Result<i8, ProtocolError> {
        Ok(self.take_u8()? as i8)
    }

    fn read_i16(&mut self) -> Result<i16, ProtocolError> {
        let bytes = self.take(2)?;
        Ok(i16::from_be_bytes([bytes[0], bytes[1]]))
    }

    fn read_i32(&mut self) -> Result<i32, ProtocolError> {
        Ok(self.take_u32()? as i32)
    }

    fn read_i64(&mut self) -> Result<i64, ProtocolError> {
        let bytes = self.take(8)?;
        let mut raw = [0u8; 8];
        raw.copy_from_slice(bytes);
        Ok(i64::from_be_bytes(raw))
    }

    fn read_double(&mut self) -> Result<f64, ProtocolError> {
        let bytes = self.take(8)?;
        let mut raw = [0u8; 8];
        raw.copy_from_slice(bytes);
        Ok(f64::from_bits(u64::from_be_bytes(raw)))
    }

    fn read_string(&mut self) -> Result<String, ProtocolError> {
        let len = self.take_len()?;
        let bytes = self.take(len)?;
        String::from_utf8(bytes.to_vec()).map_err(|_| ProtocolError::InvalidUtf8)
    }

    fn read_binary(&mut self) -> Result<Vec<u8>, ProtocolError> {
        let len = self.take_len()?;
        Ok(self.take(len)?.to_vec())
    }

    fn position(&self) -> usize {
        self.pos
    }
}
