//! The value read/write contract implemented by generated types.
//!
//! A declared struct/enum/union/exception type is *writable* if it can
//! serialize itself field-by-field through any [`ProtocolWriter`], and
//! *readable* if it can reconstruct itself from any [`ProtocolReader`].
//! The dispatcher depends only on these traits, never on concrete
//! generated types.

use crate::error::ProtocolError;
use crate::protocol::{ProtocolReader, ProtocolWriter, MAX_NESTING_DEPTH};
use crate::types::WireType;

/// A value that can serialize itself through any protocol implementation.
pub trait WireWrite {
    fn write(&self, out: &mut dyn ProtocolWriter) -> Result<(), ProtocolError>;
}

/// A value that can reconstruct itself from any protocol implementation.
pub trait WireRead: Sized {
    fn read(input: &mut dyn ProtocolReader) -> Result<Self, ProtocolError>;
}

/// The empty argument list / void result: a struct with no fields.
impl WireWrite for () {
    fn write(&self, out: &mut dyn ProtocolWriter) -> Result<(), ProtocolError> {
        out.write_struct_begin("void")?;
        out.write_field_stop()?;
        out.write_struct_end()
    }
}

impl WireRead for () {
    fn read(input: &mut dyn ProtocolReader) -> Result<Self, ProtocolError> {
        input.read_struct_begin()?;
        while let Some(field) = input.read_field_begin()? {
            skip(input, field.field_type)?;
            input.read_field_end()?;
        }
        input.read_struct_end()
    }
}

/// Consumes and discards one value of the given type.
///
/// Readers of generated structs call this for field ids they do not know,
/// so a newer peer can add fields without breaking older readers.
pub fn skip(input: &mut dyn ProtocolReader, value_type: WireType) -> Result<(), ProtocolError> {
    skip_depth(input, value_type, MAX_NESTING_DEPTH)
}

fn skip_depth(
    input: &mut dyn ProtocolReader,
    value_type: WireType,
    depth: usize,
) -> Result<(), ProtocolError> {
    if depth == 0 {
        return Err(ProtocolError::DepthLimit);
    }
    match value_type {
        WireType::Void => Ok(()),
        WireType::Bool => input.read_bool().map(|_| ()),
        WireType::Byte => input.read_i8().map(|_| ()),
        WireType::I16 => input.read_i16().map(|_| ()),
        WireType::I32 => input.read_i32().map(|_| ()),
        WireType::I64 => input.read_i64().map(|_| ()),
        WireType::Double => input.read_double().map(|_| ()),
        WireType::String => input.read_binary().map(|_| ()),
        WireType::Struct => {
            input.read_struct_begin()?;
            while let Some(field) = input.read_field_begin()? {
                skip_depth(input, field.field_type, depth - 1)?;
                input.read_field_end()?;
            }
            input.read_struct_end()
        }
        WireType::List => {
            let header = input.read_list_begin()?;
            for _ in 0..header.size {
                skip_depth(input, header.element_type, depth - 1)?;
            }
            input.read_list_end()
        }
        WireType::Set => {
            let header = input.read_set_begin()?;
            for _ in 0..header.size {
                skip_depth(input, header.element_type, depth - 1)?;
            }
            input.read_set_end()
        }
        WireType::Map => {
            let header = input.read_map_begin()?;
            for _ in 0..header.size {
                skip_depth(input, header.key_type, depth - 1)?;
                skip_depth(input, header.value_type, depth - 1)?;
            }
            input.read_map_end()
        }
    }
}
