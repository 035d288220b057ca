//! Variable-length compact encoding.
//!
//! Integers are zig-zag transformed and written as base-128 varints.
//! Field headers carry a 4-bit delta from the previously written field id
//! when it fits, and boolean fields fold their value into the header's
//! type nibble instead of writing a value byte. The delta cursor is scoped
//! per open struct: nested structs start their own cursor and the
//! enclosing struct's cursor is restored when they end.

use crate::error::ProtocolError;
use crate::protocol::{
    NestingStack, ProtocolReader, ProtocolWriter, ScopeKind, MAX_MESSAGE_SIZE,
};
use crate::types::{
    FieldHeader, ListHeader, MapHeader, MessageHeader, MessageKind, SetHeader, WireType,
};
use crate::varint::{
    read_varint_u32, read_varint_u64, write_varint_u32, write_varint_u64, zigzag_decode_i32,
    zigzag_decode_i64, zigzag_encode_i16, zigzag_encode_i32, zigzag_encode_i64,
};
use bytes::{BufMut, BytesMut};

/// Leading byte identifying a compact-encoded message.
pub const COMPACT_PROTOCOL_ID: u8 = 0x82;

/// Compact encoding version, carried in the low 5 bits of the second byte.
pub const COMPACT_VERSION: u8 = 1;

const STOP: u8 = 0;
const BOOL_TRUE: u8 = 1;
const BOOL_FALSE: u8 = 2;

/// Compact type codes. Distinct from the binary table; booleans use two
/// codes so field headers can carry the value.
fn type_code(value_type: WireType) -> Result<u8, ProtocolError> {
    match value_type {
        WireType::Bool => Ok(BOOL_TRUE),
        WireType::Byte => Ok(3),
        WireType::I16 => Ok(4),
        WireType::I32 => Ok(5),
        WireType::I64 => Ok(6),
        WireType::Double => Ok(7),
        WireType::String => Ok(8),
        WireType::List => Ok(9),
        WireType::Set => Ok(10),
        WireType::Map => Ok(11),
        WireType::Struct => Ok(12),
        WireType::Void => Err(ProtocolError::UnsupportedType("void")),
    }
}

fn type_from_code(code: u8) -> Result<WireType, ProtocolError> {
    match code {
        BOOL_TRUE | BOOL_FALSE => Ok(WireType::Bool),
        3 => Ok(WireType::Byte),
        4 => Ok(WireType::I16),
        5 => Ok(WireType::I32),
        6 => Ok(WireType::I64),
        7 => Ok(WireType::Double),
        8 => Ok(WireType::String),
        9 => Ok(WireType::List),
        10 => Ok(WireType::Set),
        11 => Ok(WireType::Map),
        12 => Ok(WireType::Struct),
        other => Err(ProtocolError::UnknownTypeCode(other)),
    }
}

fn check_size(size: usize) -> Result<(), ProtocolError> {
    if size > MAX_MESSAGE_SIZE {
        return Err(ProtocolError::SizeLimit {
            size,
            max: MAX_MESSAGE_SIZE,
        });
    }
    Ok(())
}

/// Writer for the compact encoding.
pub struct CompactWriter {
    buf: BytesMut,
    stack: NestingStack,
    /// Field header deferred by `write_field_begin` for a boolean field,
    /// emitted by `write_bool` with the value folded in.
    pending_bool_field: Option<FieldHeader>,
}

impl CompactWriter {
    pub fn new() -> Self {
        Self {
            buf: BytesMut::with_capacity(256),
            stack: NestingStack::new(),
            pending_bool_field: None,
        }
    }

    fn write_field_header(&mut self, code: u8, id: i16) -> Result<(), ProtocolError> {
        let scope = self.stack.current_struct()?;
        let delta = i32::from(id) - i32::from(scope.last_field_id);
        scope.last_field_id = id;
        if (1..=15).contains(&delta) {
            self.buf.put_u8(((delta as u8) << 4) | code);
        } else {
            self.buf.put_u8(code);
            write_varint_u32(&mut self.buf, u32::from(zigzag_encode_i16(id)));
        }
        Ok(())
    }

    fn put_len_prefixed(&mut self, bytes: &[u8]) -> Result<(), ProtocolError> {
        check_size(bytes.len())?;
        write_varint_u32(&mut self.buf, bytes.len() as u32);
        self.buf.put_slice(bytes);
        Ok(())
    }
}

impl Default for CompactWriter {
    fn default() -> Self {
        Self::new()
    }
}

impl ProtocolWriter for CompactWriter {
    fn write_message_begin(&mut self, header: &MessageHeader) -> Result<(), ProtocolError> {
        self.stack.clear();
        self.pending_bool_field = None;
        self.buf.put_u8(COMPACT_PROTOCOL_ID);
        self.buf
            .put_u8((header.kind.code() << 5) | (COMPACT_VERSION & 0x1F));
        write_varint_u32(&mut self.buf, header.sequence_id as u32);
        self.put_len_prefixed(header.name.as_bytes())
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
        if field.field_type == WireType::Bool {
            // Header deferred until the value is known.
            self.pending_bool_field = Some(*field);
            return Ok(());
        }
        let code = type_code(field.field_type)?;
        self.write_field_header(code, field.id)
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
        check_size(header.size)?;
        self.stack.push(ScopeKind::List)?;
        let code = type_code(header.element_type)?;
        if header.size < 15 {
            self.buf.put_u8(((header.size as u8) << 4) | code);
        } else {
            self.buf.put_u8(0xF0 | code);
            write_varint_u32(&mut self.buf, header.size as u32);
        }
        Ok(())
    }

    fn write_list_end(&mut self) -> Result<(), ProtocolError> {
        self.stack.pop(ScopeKind::List)?;
        Ok(())
    }

    fn write_set_begin(&mut self, header: &SetHeader) -> Result<(), ProtocolError> {
        check_size(header.size)?;
        self.stack.push(ScopeKind::Set)?;
        let code = type_code(header.element_type)?;
        if header.size < 15 {
            self.buf.put_u8(((header.size as u8) << 4) | code);
        } else {
            self.buf.put_u8(0xF0 | code);
            write_varint_u32(&mut self.buf, header.size as u32);
        }
        Ok(())
    }

    fn write_set_end(&mut self) -> Result<(), ProtocolError> {
        self.stack.pop(ScopeKind::Set)?;
        Ok(())
    }

    fn write_map_begin(&mut self, header: &MapHeader) -> Result<(), ProtocolError> {
        check_size(header.size)?;
        self.stack.push(ScopeKind::Map)?;
        if header.size == 0 {
            self.buf.put_u8(0);
            return Ok(());
        }
        write_varint_u32(&mut self.buf, header.size as u32);
        let key_code = type_code(header.key_type)?;
        let value_code = type_code(header.value_type)?;
        self.buf.put_u8((key_code << 4) | value_code);
        Ok(())
    }

    fn write_map_end(&mut self) -> Result<(), ProtocolError> {
        self.stack.pop(ScopeKind::Map)?;
        Ok(())
    }

    fn write_bool(&mut self, value: bool) -> Result<(), ProtocolError> {
        let code = if value { BOOL_TRUE } else { BOOL_FALSE };
        if let Some(field) = self.pending_bool_field.take() {
            self.write_field_header(code, field.id)
        } else {
            self.buf.put_u8(code);
            Ok(())
        }
    }

    fn write_i8(&mut self, value: i8) -> Result<(), ProtocolError> {
        self.buf.put_i8(value);
        Ok(())
    }

    fn write_i16(&mut self, value: i16) -> Result<(), ProtocolError> {
        write_varint_u32(&mut self.buf, zigzag_encode_i32(i32::from(value)));
        Ok(())
    }

    fn write_i32(&mut self, value: i32) -> Result<(), ProtocolError> {
        write_varint_u32(&mut self.buf, zigzag_encode_i32(value));
        Ok(())
    }

    fn write_i64(&mut self, value: i64) -> Result<(), ProtocolError> {
        write_varint_u64(&mut self.buf, zigzag_encode_i64(value));
        Ok(())
    }

    fn write_double(&mut self, value: f64) -> Result<(), ProtocolError> {
        self.buf.put_f64_le(value);
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

/// Reader for the compact encoding.
pub struct CompactReader<'a> {
    input: &'a [u8],
    pos: usize,
    stack: NestingStack,
    /// Boolean value recovered from a folded field header, consumed by the
    /// next `read_bool`.
    pending_bool: Option<bool>,
}

impl<'a> CompactReader<'a> {
    pub fn new(input: &'a [u8]) -> Self {
        Self {
            input,
            pos: 0,
            stack: NestingStack::new(),
            pending_bool: None,
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

    fn take_varint_u32(&mut self) -> Result<u32, ProtocolError> {
        let (value, consumed) = read_varint_u32(&self.input[self.pos..])?;
        self.pos += consumed;
        Ok(value)
    }

    fn take_varint_u64(&mut self) -> Result<u64, ProtocolError> {
        let (value, consumed) = read_varint_u64(&self.input[self.pos..])?;
        self.pos += consumed;
        Ok(value)
    }

    fn take_len(&mut self) -> Result<usize, ProtocolError> {
        let len = self.take_varint_u32()? as usize;
        check_size(len)?;
        Ok(len)
    }
}

impl ProtocolReader for CompactReader<'_> {
    fn read_message_begin(&mut self) -> Result<MessageHeader, ProtocolError> {
        self.stack.clear();
        self.pending_bool = None;
        let id = self.take_u8()?;
        if id != COMPACT_PROTOCOL_ID {
            return Err(ProtocolError::BadProtocolId(id));
        }
        let meta = self.take_u8()?;
        let version = meta & 0x1F;
        if version != COMPACT_VERSION {
            return Err(ProtocolError::BadVersion(u32::from(meta)));
        }
        let kind = MessageKind::from_code((meta >> 5) & 0x07)?;
        let sequence_id = self.take_varint_u32()? as i32;
        let len = self.take_len()?;
        let bytes = self.take(len)?;
        let name = String::from_utf8(bytes.to_vec()).map_err(|_| ProtocolError::InvalidUtf8)?;
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
        let byte = self.take_u8()?;
        if byte == STOP {
            return Ok(None);
        }
        let code = byte & 0x0F;
        let delta = byte >> 4;
        let field_type = type_from_code(code)?;
        let id = if delta == 0 {
            zigzag_decode_i32(self.take_varint_u32()?) as i16
        } else {
            let scope = self.stack.current_struct()?;
            scope.last_field_id.wrapping_add(i16::from(delta))
        };
        self.stack.current_struct()?.last_field_id = id;
        if code == BOOL_TRUE {
            self.pending_bool = Some(true);
        } else if code == BOOL_FALSE {
            self.pending_bool = Some(false);
        }
        Ok(Some(FieldHeader { id, field_type }))
    }

    fn read_field_end(&mut self) -> Result<(), ProtocolError> {
        Ok(())
    }

    fn read_list_begin(&mut self) -> Result<ListHeader, ProtocolError> {
        self.stack.push(ScopeKind::List)?;
        let byte = self.take_u8()?;
        let element_type = type_from_code(byte & 0x0F)?;
        let nibble = byte >> 4;
        let size = if nibble == 0xF {
            self.take_len()?
        } else {
            usize::from(nibble)
        };
        check_size(size)?;
        Ok(ListHeader { element_type, size })
    }

    fn read_list_end(&mut self) -> Result<(), ProtocolError> {
        self.stack.pop(ScopeKind::List)?;
        Ok(())
    }

    fn read_set_begin(&mut self) -> Result<SetHeader, ProtocolError> {
        self.stack.push(ScopeKind::Set)?;
        let byte = self.take_u8()?;
        let element_type = type_from_code(byte & 0x0F)?;
        let nibble = byte >> 4;
        let size = if nibble == 0xF {
            self.take_len()?
        } else {
            usize::from(nibble)
        };
        check_size(size)?;
        Ok(SetHeader { element_type, size })
    }

    fn read_set_end(&mut self) -> Result<(), ProtocolError> {
        self.stack.pop(ScopeKind::Set)?;
        Ok(())
    }

    fn read_map_begin(&mut self) -> Result<MapHeader, ProtocolError> {
        self.stack.push(ScopeKind::Map)?;
        let size = self.take_len()?;
        if size == 0 {
            // Empty maps carry no type byte; the placeholder types are
            // never consulted since there are no entries to read.
            return Ok(MapHeader {
                key_type: WireType::Void,
                value_type: WireType::Void,
                size: 0,
            });
        }
        let types = self.take_u8()?;
        let key_type = type_from_code(types >> 4)?;
        let value_type = type_from_code(types & 0x0F)?;
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
        if let Some(value) = self.pending_bool.take() {
            return Ok(value);
        }
        match self.take_u8()? {
            BOOL_TRUE => Ok(true),
            BOOL_FALSE => Ok(false),
            other => Err(ProtocolError::InvalidBool(other)),
        }
    }

    fn read_i8(&mut self) -> Result<i8, ProtocolError> {
        Ok(self.take_u8()? as i8)
    }

    fn read_i16(&mut self) -> Result<i16, ProtocolError> {
        Ok(zigzag_decode_i32(self.take_varint_u32()?) as i16)
    }

    fn read_i32(&mut self) -> Result<i32, ProtocolError> {
        Ok(zigzag_decode_i32(self.take_varint_u32()?))
    }

    fn read_i64(&mut self) -> Result<i64, ProtocolError> {
        Ok(zigzag_decode_i64(self.take_varint_u64()?))
    }

    fn read_double(&mut self) -> Result<f64, ProtocolError> {
        let bytes = self.take(8)?;
        let mut raw = [0u8; 8];
        raw.copy_from_slice(bytes);
        Ok(f64::from_bits(u64::from_le_bytes(raw)))
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
