//! JSON text encoding.
//!
//! Every value travels as a two-element array `[tag, payload]` with a short
//! type-tag string; struct payloads are objects keyed by decimal field id,
//! containers carry their element tags and count once in a header and list
//! their element payloads untagged. A message is
//! `[1, name, kind, sequence id, body]`. Doubles that JSON numbers cannot
//! express (NaN, the infinities) are quoted sentinel strings, and binary is
//! base64 text.
//!
//! The writer builds a `serde_json::Value` tree through the structured
//! contract and serializes it at message end; the reader parses exactly one
//! top-level JSON value (trailing bytes belong to the next message) and
//! walks it, treating any tag or arity mismatch as a decode error rather
//! than a silent default.

use crate::error::ProtocolError;
use crate::protocol::{ProtocolReader, ProtocolWriter, MAX_NESTING_DEPTH};
use crate::types::{
    FieldHeader, ListHeader, MapHeader, MessageHeader, MessageKind, SetHeader, WireType,
};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use bytes::{BufMut, BytesMut};
use serde_json::{Map, Value};

/// Message grammar version, the first element of every message array.
pub const JSON_VERSION: i64 = 1;

fn tag(value_type: WireType) -> Result<&'static str, ProtocolError> {
    match value_type {
        WireType::Bool => Ok("tf"),
        WireType::Byte => Ok("i8"),
        WireType::I16 => Ok("i16"),
        WireType::I32 => Ok("i32"),
        WireType::I64 => Ok("i64"),
        WireType::Double => Ok("dbl"),
        WireType::String => Ok("str"),
        WireType::Struct => Ok("rec"),
        WireType::Map => Ok("map"),
        WireType::Set => Ok("set"),
        WireType::List => Ok("lst"),
        WireType::Void => Err(ProtocolError::UnsupportedType("void")),
    }
}

fn type_from_tag(tag: &str) -> Result<WireType, ProtocolError> {
    match tag {
        "tf" => Ok(WireType::Bool),
        "i8" => Ok(WireType::Byte),
        "i16" => Ok(WireType::I16),
        "i32" => Ok(WireType::I32),
        "i64" => Ok(WireType::I64),
        "dbl" => Ok(WireType::Double),
        "str" | "bin" => Ok(WireType::String),
        "rec" => Ok(WireType::Struct),
        "map" => Ok(WireType::Map),
        "set" => Ok(WireType::Set),
        "lst" => Ok(WireType::List),
        other => Err(ProtocolError::UnexpectedJson {
            expected: "type tag",
            got: other.to_string(),
        }),
    }
}

fn kind_tag(kind: MessageKind) -> &'static str {
    match kind {
        MessageKind::Call => "call",
        MessageKind::Reply => "reply",
        MessageKind::Exception => "exception",
        MessageKind::Oneway => "oneway",
    }
}

fn kind_from_tag(tag: &str) -> Result<MessageKind, ProtocolError> {
    match tag {
        "call" => Ok(MessageKind::Call),
        "reply" => Ok(MessageKind::Reply),
        "exception" => Ok(MessageKind::Exception),
        "oneway" => Ok(MessageKind::Oneway),
        other => Err(ProtocolError::UnexpectedJson {
            expected: "message kind tag",
            got: other.to_string(),
        }),
    }
}

fn unexpected(expected: &'static str, got: &Value) -> ProtocolError {
    ProtocolError::UnexpectedJson {
        expected,
        got: got.to_string(),
    }
}

enum WriteScope {
    Message {
        items: Vec<Value>,
    },
    Struct {
        fields: Map<String, Value>,
        pending: Option<FieldHeader>,
    },
    List {
        header: ListHeader,
        items: Vec<Value>,
    },
    Set {
        header: SetHeader,
        items: Vec<Value>,
    },
    Map {
        header: MapHeader,
        items: Vec<Value>,
    },
}

/// Writer for the JSON encoding.
pub struct JsonWriter {
    buf: BytesMut,
    scopes: Vec<WriteScope>,
}

impl JsonWriter {
    pub fn new() -> Self {
        Self {
            buf: BytesMut::with_capacity(256),
            scopes: Vec::new(),
        }
    }

    fn push_scope(&mut self, scope: WriteScope) -> Result<(), ProtocolError> {
        if self.scopes.len() >= MAX_NESTING_DEPTH {
            return Err(ProtocolError::DepthLimit);
        }
        self.scopes.push(scope);
        Ok(())
    }

    /// Attaches one finished value payload to the enclosing scope. Struct
    /// fields become `[tag, payload]` under their field id; container
    /// elements and the message body stay untagged, typed by their header.
    fn attach(&mut self, value_tag: &'static str, payload: Value) -> Result<(), ProtocolError> {
        match self.scopes.last_mut() {
            Some(WriteScope::Message { items }) => {
                if items.len() != 4 {
                    return Err(ProtocolError::UnbalancedNesting(
                        "message body already written",
                    ));
                }
                items.push(payload);
                Ok(())
            }
            Some(WriteScope::Struct { fields, pending }) => {
                let field = pending.take().ok_or(ProtocolError::UnbalancedNesting(
                    "value without an open field",
                ))?;
                fields.insert(
                    field.id.to_string(),
                    Value::Array(vec![Value::String(value_tag.to_string()), payload]),
                );
                Ok(())
            }
            Some(WriteScope::List { items, .. })
            | Some(WriteScope::Set { items, .. })
            | Some(WriteScope::Map { items, .. }) => {
                items.push(payload);
                Ok(())
            }
            None => Err(ProtocolError::UnbalancedNesting("value outside a message")),
        }
    }
}

impl Default for JsonWriter {
    fn default() -> Self {
        Self::new()
    }
}

impl ProtocolWriter for JsonWriter {
    fn write_message_begin(&mut self, header: &MessageHeader) -> Result<(), ProtocolError> {
        self.scopes.clear();
        self.push_scope(WriteScope::Message {
            items: vec![
                Value::from(JSON_VERSION),
                Value::String(header.name.clone()),
                Value::String(kind_tag(header.kind).to_string()),
                Value::from(header.sequence_id),
            ],
        })
    }

    fn write_message_end(&mut self) -> Result<(), ProtocolError> {
        match self.scopes.pop() {
            Some(WriteScope::Message { items }) if self.scopes.is_empty() => {
                if items.len() != 5 {
                    return Err(ProtocolError::UnbalancedNesting("message body missing"));
                }
                serde_json::to_writer((&mut self.buf).writer(), &Value::Array(items))?;
                Ok(())
            }
            _ => Err(ProtocolError::UnbalancedNesting(
                "message end with open scopes",
            )),
        }
    }

    fn write_struct_begin(&mut self, _name: &str) -> Result<(), ProtocolError> {
        self.push_scope(WriteScope::Struct {
            fields: Map::new(),
            pending: None,
        })
    }

    fn write_struct_end(&mut self) -> Result<(), ProtocolError> {
        match self.scopes.pop() {
            Some(WriteScope::Struct { fields, pending }) => {
                if pending.is_some() {
                    return Err(ProtocolError::UnbalancedNesting(
                        "struct end with an open field",
                    ));
                }
                self.attach("rec", Value::Object(fields))
            }
            _ => Err(ProtocolError::UnbalancedNesting(
                "struct end does not match open scope",
            )),
        }
    }

    fn write_field_begin(&mut self, field: &FieldHeader) -> Result<(), ProtocolError> {
        match self.scopes.last_mut() {
            Some(WriteScope::Struct { pending, .. }) => {
                if pending.is_some() {
                    return Err(ProtocolError::UnbalancedNesting(
                        "field begin with an open field",
                    ));
                }
                *pending = Some(*field);
                Ok(())
            }
            _ => Err(ProtocolError::UnbalancedNesting(
                "field marker outside an open struct",
            )),
        }
    }

    fn write_field_end(&mut self) -> Result<(), ProtocolError> {
        Ok(())
    }

    fn write_field_stop(&mut self) -> Result<(), ProtocolError> {
        match self.scopes.last() {
            Some(WriteScope::Struct { .. }) => Ok(()),
            _ => Err(ProtocolError::UnbalancedNesting(
                "field marker outside an open struct",
            )),
        }
    }

    fn write_list_begin(&mut self, header: &ListHeader) -> Result<(), ProtocolError> {
        self.push_scope(WriteScope::List {
            header: *header,
            items: Vec::with_capacity(header.size),
        })
    }

    fn write_list_end(&mut self) -> Result<(), ProtocolError> {
        match self.scopes.pop() {
            Some(WriteScope::List { header, items }) => {
                if items.len() != header.size {
                    return Err(ProtocolError::UnbalancedNesting(
                        "list element count does not match header",
                    ));
                }
                let mut payload = vec![
                    Value::String(tag(header.element_type)?.to_string()),
                    Value::from(header.size),
                ];
                payload.extend(items);
                self.attach("lst", Value::Array(payload))
            }
            _ => Err(ProtocolError::UnbalancedNesting(
                "list end does not match open scope",
            )),
        }
    }

    fn write_set_begin(&mut self, header: &SetHeader) -> Result<(), ProtocolError> {
        self.push_scope(WriteScope::Set {
            header: *header,
            items: Vec::with_capacity(header.size),
        })
    }

    fn write_set_end(&mut self) -> Result<(), ProtocolError> {
        match self.scopes.pop() {
            Some(WriteScope::Set { header, items }) => {
                if items.len() != header.size {
                    return Err(ProtocolError::UnbalancedNesting(
                        "set element count does not match header",
                    ));
                }
                let mut payload = vec![
                    Value::String(tag(header.element_type)?.to_string()),
                    Value::from(header.size),
                ];
                payload.extend(items);
                self.attach("set", Value::Array(payload))
            }
            _ => Err(ProtocolError::UnbalancedNesting(
                "set end does not match open scope",
            )),
        }
    }

    fn write_map_begin(&mut self, header: &MapHeader) -> Result<(), ProtocolError> {
        self.push_scope(WriteScope::Map {
            header: *header,
            items: Vec::with_capacity(header.size * 2),
        })
    }

    fn write_map_end(&mut self) -> Result<(), ProtocolError> {
        match self.scopes.pop() {
            Some(WriteScope::Map { header, items }) => {
                if items.len() != header.size * 2 {
                    return Err(ProtocolError::UnbalancedNesting(
                        "map entry count does not match header",
                    ));
                }
                let mut payload = vec![
                    Value::String(tag(header.key_type)?.to_string()),
                    Value::String(tag(header.value_type)?.to_string()),
                    Value::from(header.size),
                ];
                payload.extend(items);
                self.attach("map", Value::Array(payload))
            }
            _ => Err(ProtocolError::UnbalancedNesting(
                "map end does not match open scope",
            )),
        }
    }

    fn write_bool(&mut self, value: bool) -> Result<(), ProtocolError> {
        self.attach("tf", Value::Bool(value))
    }

    fn write_i8(&mut self, value: i8) -> Result<(), ProtocolError> {
        self.attach("i8", Value::from(value))
    }

    fn write_i16(&mut self, value: i16) -> Result<(), ProtocolError> {
        self.attach("i16", Value::from(value))
    }

    fn write_i32(&mut self, value: i32) -> Result<(), ProtocolError> {
        self.attach("i32", Value::from(value))
    }

    fn write_i64(&mut self, value: i64) -> Result<(), ProtocolError> {
        self.attach("i64", Value::from(value))
    }

    fn write_double(&mut self, value: f64) -> Result<(), ProtocolError> {
        let payload = if value.is_nan() {
            Value::String("NaN".to_string())
        } else if value == f64::INFINITY {
            Value::String("Infinity".to_string())
        } else if value == f64::NEG_INFINITY {
            Value::String("-Infinity".to_string())
        } else {
            Value::from(value)
        };
        self.attach("dbl", payload)
    }

    fn write_string(&mut self, value: &str) -> Result<(), ProtocolError> {
        self.attach("str", Value::String(value.to_string()))
    }

    fn write_binary(&mut self, value: &[u8]) -> Result<(), ProtocolError> {
        self.attach("bin", Value::String(BASE64.encode(value)))
    }

    fn take_bytes(&mut self) -> BytesMut {
        std::mem::take(&mut self.buf)
    }
}

enum ReadScope {
    Struct {
        entries: std::vec::IntoIter<(String, Value)>,
        pending: Option<Value>,
    },
    List {
        items: std::vec::IntoIter<Value>,
    },
    Set {
        items: std::vec::IntoIter<Value>,
    },
    Map {
        items: std::vec::IntoIter<Value>,
    },
}

/// Reader for the JSON encoding.
pub struct JsonReader<'a> {
    input: &'a [u8],
    consumed: usize,
    body: Option<Value>,
    scopes: Vec<ReadScope>,
}

impl<'a> JsonReader<'a> {
    pub fn new(input: &'a [u8]) -> Self {
        Self {
            input,
            consumed: 0,
            body: None,
            scopes: Vec::new(),
        }
    }

    fn push_scope(&mut self, scope: ReadScope) -> Result<(), ProtocolError> {
        if self.scopes.len() >= MAX_NESTING_DEPTH {
            return Err(ProtocolError::DepthLimit);
        }
        self.scopes.push(scope);
        Ok(())
    }

    /// The next value payload in document order: a pending field value, the
    /// next container element, or the message body.
    fn next_payload(&mut self) -> Result<Value, ProtocolError> {
        match self.scopes.last_mut() {
            Some(ReadScope::Struct { pending, .. }) => {
                pending.take().ok_or(ProtocolError::UnbalancedNesting(
                    "value read without an open field",
                ))
            }
            Some(ReadScope::List { items })
            | Some(ReadScope::Set { items })
            | Some(ReadScope::Map { items }) => items.next().ok_or_else(|| {
                ProtocolError::UnexpectedJson {
                    expected: "another container element",
                    got: "end of array".to_string(),
                }
            }),
            None => self.body.take().ok_or(ProtocolError::UnbalancedNesting(
                "value read outside a message",
            )),
        }
    }

    fn next_i64(&mut self, expected: &'static str) -> Result<i64, ProtocolError> {
        let payload = self.next_payload()?;
        payload
            .as_i64()
            .ok_or_else(|| unexpected(expected, &payload))
    }

    /// Parses a container payload `[tag..., size, elements...]` with
    /// `tag_count` leading tag strings, checking the declared count against
    /// the actual element count.
    fn parse_container(
        payload: Value,
        tag_count: usize,
        per_entry: usize,
    ) -> Result<(Vec<WireType>, usize, std::vec::IntoIter<Value>), ProtocolError> {
        let items = match payload {
            Value::Array(items) => items,
            other => return Err(unexpected("container array", &other)),
        };
        if items.len() < tag_count + 1 {
            return Err(ProtocolError::UnexpectedJson {
                expected: "container header",
                got: format!("array of {} elements", items.len()),
            });
        }
        let mut iter = items.into_iter();
        let mut types = Vec::with_capacity(tag_count);
        for _ in 0..tag_count {
            let tag_value = iter.next().unwrap_or(Value::Null);
            let tag_str = tag_value
                .as_str()
                .ok_or_else(|| unexpected("type tag", &tag_value))?;
            types.push(type_from_tag(tag_str)?);
        }
        let size_value = iter.next().unwrap_or(Value::Null);
        let size = size_value
            .as_i64()
            .ok_or_else(|| unexpected("element count", &size_value))?;
        if size < 0 {
            return Err(ProtocolError::NegativeSize(size));
        }
        let size = size as usize;
        let rest: Vec<Value> = iter.collect();
        if rest.len() != size * per_entry {
            return Err(ProtocolError::UnexpectedJson {
                expected: "element count matching header",
                got: format!("{} elements for declared size {}", rest.len(), size),
            });
        }
        Ok((types, size, rest.into_iter()))
    }
}

impl ProtocolReader for JsonReader<'_> {
    fn read_message_begin(&mut self) -> Result<MessageHeader, ProtocolError> {
        self.scopes.clear();
        self.body = None;
        let mut stream = serde_json::Deserializer::from_slice(self.input).into_iter::<Value>();
        let value = match stream.next() {
            None => return Err(ProtocolError::Incomplete { needed: 1 }),
            Some(Err(e)) if e.is_eof() => return Err(ProtocolError::Incomplete { needed: 1 }),
            Some(Err(e)) => return Err(ProtocolError::Json(e)),
            Some(Ok(value)) => value,
        };
        self.consumed = stream.byte_offset();

        let items = match value {
            Value::Array(items) if items.len() == 5 => items,
            other => return Err(unexpected("five-element message array", &other)),
        };
        let mut iter = items.into_iter();
        let version = iter.next().unwrap_or(Value::Null);
        match version.as_i64() {
            Some(JSON_VERSION) => {}
            Some(other) => return Err(ProtocolError::BadVersion(other as u32)),
            None => return Err(unexpected("message version", &version)),
        }
        let name_value = iter.next().unwrap_or(Value::Null);
        let name = name_value
            .as_str()
            .ok_or_else(|| unexpected("method name", &name_value))?
            .to_string();
        let kind_value = iter.next().unwrap_or(Value::Null);
        let kind = kind_from_tag(
            kind_value
                .as_str()
                .ok_or_else(|| unexpected("message kind tag", &kind_value))?,
        )?;
        let seq_value = iter.next().unwrap_or(Value::Null);
        let sequence_id = seq_value
            .as_i64()
            .and_then(|n| i32::try_from(n).ok())
            .ok_or_else(|| unexpected("sequence id", &seq_value))?;
        self.body = iter.next();
        Ok(MessageHeader {
            name,
            kind,
            sequence_id,
        })
    }

    fn read_message_end(&mut self) -> Result<(), ProtocolError> {
        if !self.scopes.is_empty() {
            return Err(ProtocolError::UnbalancedNesting(
                "message end with open scopes",
            ));
        }
        Ok(())
    }

    fn read_struct_begin(&mut self) -> Result<(), ProtocolError> {
        let payload = self.next_payload()?;
        let fields = match payload {
            Value::Object(fields) => fields,
            other => return Err(unexpected("struct object", &other)),
        };
        let entries: Vec<(String, Value)> = fields.into_iter().collect();
        self.push_scope(ReadScope::Struct {
            entries: entries.into_iter(),
            pending: None,
        })
    }

    fn read_struct_end(&mut self) -> Result<(), ProtocolError> {
        match self.scopes.pop() {
            Some(ReadScope::Struct {
                mut entries,
                pending,
            }) => {
                if pending.is_some() || entries.next().is_some() {
                    return Err(ProtocolError::UnbalancedNesting(
                        "struct end before all fields were read",
                    ));
                }
                Ok(())
            }
            _ => Err(ProtocolError::UnbalancedNesting(
                "struct end does not match open scope",
            )),
        }
    }

    fn read_field_begin(&mut self) -> Result<Option<FieldHeader>, ProtocolError> {
        match self.scopes.last_mut() {
            Some(ReadScope::Struct { entries, pending }) => {
                let Some((key, value)) = entries.next() else {
                    return Ok(None);
                };
                let id: i16 = key.parse().map_err(|_| ProtocolError::UnexpectedJson {
                    expected: "numeric field id",
                    got: key.clone(),
                })?;
                let (tag_value, payload) = match value {
                    Value::Array(mut pair) if pair.len() == 2 => {
                        let payload = pair.pop().unwrap_or(Value::Null);
                        let tag_value = pair.pop().unwrap_or(Value::Null);
                        (tag_value, payload)
                    }
                    other => return Err(unexpected("tagged field value", &other)),
                };
                let field_type = type_from_tag(
                    tag_value
                        .as_str()
                        .ok_or_else(|| unexpected("type tag", &tag_value))?,
                )?;
                *pending = Some(payload);
                Ok(Some(FieldHeader { id, field_type }))
            }
            _ => Err(ProtocolError::UnbalancedNesting(
                "field marker outside an open struct",
            )),
        }
    }

    fn read_field_end(&mut self) -> Result<(), ProtocolError> {
        Ok(())
    }

    fn read_list_begin(&mut self) -> Result<ListHeader, ProtocolError> {
        let payload = self.next_payload()?;
        let (types, size, items) = Self::parse_container(payload, 1, 1)?;
        self.push_scope(ReadScope::List { items })?;
        Ok(ListHeader {
            element_type: types[0],
            size,
        })
    }

    fn read_list_end(&mut self) -> Result<(), ProtocolError> {
        match self.scopes.pop() {
            Some(ReadScope::List { mut items }) => {
                if items.next().is_some() {
                    return Err(ProtocolError::UnbalancedNesting(
                        "list end before all elements were read",
                    ));
                }
                Ok(())
            }
            _ => Err(ProtocolError::UnbalancedNesting(
                "list end does not match open scope",
            )),
        }
    }

    fn read_set_begin(&mut self) -> Result<SetHeader, ProtocolError> {
        let payload = self.next_payload()?;
        let (types, size, items) = Self::parse_container(payload, 1, 1)?;
        self.push_scope(ReadScope::Set { items })?;
        Ok(SetHeader {
            element_type: types[0],
            size,
        })
    }

    fn read_set_end(&mut self) -> Result<(), ProtocolError> {
        match self.scopes.pop() {
            Some(ReadScope::Set { mut items }) => {
                if items.next().is_some() {
                    return Err(ProtocolError::UnbalancedNesting(
                        "set end before all elements were read",
                    ));
                }
                Ok(())
            }
            _ => Err(ProtocolError::UnbalancedNesting(
                "set end does not match open scope",
            )),
        }
    }

    fn read_map_begin(&mut self) -> Result<MapHeader, ProtocolError> {
        let payload = self.next_payload()?;
        let (types, size, items) = Self::parse_container(payload, 2, 2)?;
        self.push_scope(ReadScope::Map { items })?;
        Ok(MapHeader {
            key_type: types[0],
            value_type: types[1],
            size,
        })
    }

    fn read_map_end(&mut self) -> Result<(), ProtocolError> {
        match self.scopes.pop() {
            Some(ReadScope::Map { mut items }) => {
                if items.next().is_some() {
                    return Err(ProtocolError::UnbalancedNesting(
                        "map end before all entries were read",
                    ));
                }
                Ok(())
            }
            _ => Err(ProtocolError::UnbalancedNesting(
                "map end does not match open scope",
            )),
        }
    }

    fn read_bool(&mut self) -> Result<bool, ProtocolError> {
        let payload = self.next_payload()?;
        payload
            .as_bool()
            .ok_or_else(|| unexpected("boolean", &payload))
    }

    fn read_i8(&mut self) -> Result<i8, ProtocolError> {
        let n = self.next_i64("8-bit integer")?;
        i8::try_from(n).map_err(|_| ProtocolError::UnexpectedJson {
            expected: "8-bit integer",
            got: n.to_string(),
        })
    }

    fn read_i16(&mut self) -> Result<i16, ProtocolError> {
        let n = self.next_i64("16-bit integer")?;
        i16::try_from(n).map_err(|_| ProtocolError::UnexpectedJson {
            expected: "16-bit integer",
            got: n.to_string(),
        })
    }

    fn read_i32(&mut self) -> Result<i32, ProtocolError> {
        let n = self.next_i64("32-bit integer")?;
        i32::try_from(n).map_err(|_| ProtocolError::UnexpectedJson {
            expected: "32-bit integer",
            got: n.to_string(),
        })
    }

    fn read_i64(&mut self) -> Result<i64, ProtocolError> {
        self.next_i64("64-bit integer")
    }

    fn read_double(&mut self) -> Result<f64, ProtocolError> {
        let payload = self.next_payload()?;
        match &payload {
            Value::Number(n) => n
                .as_f64()
                .ok_or_else(|| unexpected("double", &payload)),
            Value::String(s) => match s.as_str() {
                "NaN" => Ok(f64::NAN),
                "Infinity" => Ok(f64::INFINITY),
                "-Infinity" => Ok(f64::NEG_INFINITY),
                _ => Err(unexpected("double sentinel", &payload)),
            },
            _ => Err(unexpected("double", &payload)),
        }
    }

    fn read_string(&mut self) -> Result<String, ProtocolError> {
        let payload = self.next_payload()?;
        match payload {
            Value::String(s) => Ok(s),
            other => Err(unexpected("string", &other)),
        }
    }

    fn read_binary(&mut self) -> Result<Vec<u8>, ProtocolError> {
        let payload = self.next_payload()?;
        match payload {
            // "str" and "bin" share one wire type, so a reader discarding
            // an unknown field cannot know which form it holds; text that
            // is not valid base64 is handed back verbatim.
            Value::String(s) => Ok(BASE64
                .decode(s.as_bytes())
                .unwrap_or_else(|_| s.into_bytes())),
            other => Err(unexpected("base64 string", &other)),
        }
    }

    fn position(&self) -> usize {
        self.consumed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_message(body: impl FnOnce(&mut JsonWriter)) -> BytesMut {
        let mut writer = JsonWriter::new();
        writer
            .write_message_begin(&MessageHeader::new("ping", MessageKind::Call, 1))
            .unwrap();
        body(&mut writer);
        writer.write_message_end().unwrap();
        writer.take_bytes()
    }

    fn write_empty_struct(writer: &mut JsonWriter) {
        writer.write_struct_begin("args").unwrap();
        writer.write_field_stop().unwrap();
        writer.write_struct_end().unwrap();
    }

    #[test]
    fn test_message_layout() {
        let bytes = write_message(|w| {
            w.write_struct_begin("args").unwrap();
            w.write_field_begin(&FieldHeader::new(1, WireType::I32))
                .unwrap();
            w.write_i32(42).unwrap();
            w.write_field_end().unwrap();
            w.write_field_stop().unwrap();
            w.write_struct_end().unwrap();
        });
        assert_eq!(
            std::str::from_utf8(&bytes).unwrap(),
            r#"[1,"ping","call",1,{"1":["i32",42]}]"#
        );
    }

    #[test]
    fn test_message_roundtrip() {
        let bytes = write_message(write_empty_struct);
        let mut reader = JsonReader::new(&bytes);
        let header = reader.read_message_begin().unwrap();
        assert_eq!(header.name, "ping");
        assert_eq!(header.kind, MessageKind::Call);
        assert_eq!(header.sequence_id, 1);
        reader.read_struct_begin().unwrap();
        assert!(reader.read_field_begin().unwrap().is_none());
        reader.read_struct_end().unwrap();
        reader.read_message_end().unwrap();
        assert_eq!(reader.position(), bytes.len());
    }

    #[test]
    fn test_struct_field_roundtrip() {
        let bytes = write_message(|w| {
            w.write_struct_begin("args").unwrap();
            w.write_field_begin(&FieldHeader::new(1, WireType::String))
                .unwrap();
            w.write_string("hello").unwrap();
            w.write_field_end().unwrap();
            w.write_field_begin(&FieldHeader::new(2, WireType::Bool))
                .unwrap();
            w.write_bool(true).unwrap();
            w.write_field_end().unwrap();
            w.write_field_stop().unwrap();
            w.write_struct_end().unwrap();
        });

        let mut reader = JsonReader::new(&bytes);
        reader.read_message_begin().unwrap();
        reader.read_struct_begin().unwrap();
        let f1 = reader.read_field_begin().unwrap().unwrap();
        assert_eq!((f1.id, f1.field_type), (1, WireType::String));
        assert_eq!(reader.read_string().unwrap(), "hello");
        let f2 = reader.read_field_begin().unwrap().unwrap();
        assert_eq!((f2.id, f2.field_type), (2, WireType::Bool));
        assert!(reader.read_bool().unwrap());
        assert!(reader.read_field_begin().unwrap().is_none());
        reader.read_struct_end().unwrap();
        reader.read_message_end().unwrap();
    }

    #[test]
    fn test_map_is_flattened_alternating() {
        let bytes = write_message(|w| {
            w.write_struct_begin("args").unwrap();
            w.write_field_begin(&FieldHeader::new(1, WireType::Map))
                .unwrap();
            w.write_map_begin(&MapHeader::new(WireType::String, WireType::I32, 2))
                .unwrap();
            w.write_string("a").unwrap();
            w.write_i32(1).unwrap();
            w.write_string("b").unwrap();
            w.write_i32(2).unwrap();
            w.write_map_end().unwrap();
            w.write_field_end().unwrap();
            w.write_field_stop().unwrap();
            w.write_struct_end().unwrap();
        });
        assert_eq!(
            std::str::from_utf8(&bytes).unwrap(),
            r#"[1,"ping","call",1,{"1":["map",["str","i32",2,"a",1,"b",2]]}]"#
        );

        let mut reader = JsonReader::new(&bytes);
        reader.read_message_begin().unwrap();
        reader.read_struct_begin().unwrap();
        reader.read_field_begin().unwrap().unwrap();
        let header = reader.read_map_begin().unwrap();
        assert_eq!(header.key_type, WireType::String);
        assert_eq!(header.value_type, WireType::I32);
        assert_eq!(header.size, 2);
        assert_eq!(reader.read_string().unwrap(), "a");
        assert_eq!(reader.read_i32().unwrap(), 1);
        assert_eq!(reader.read_string().unwrap(), "b");
        assert_eq!(reader.read_i32().unwrap(), 2);
        reader.read_map_end().unwrap();
    }

    #[test]
    fn test_double_sentinels() {
        let bytes = write_message(|w| {
            w.write_struct_begin("args").unwrap();
            for (id, v) in [
                (1i16, f64::NAN),
                (2, f64::INFINITY),
                (3, f64::NEG_INFINITY),
                (4, 0.5),
            ] {
                w.write_field_begin(&FieldHeader::new(id, WireType::Double))
                    .unwrap();
                w.write_double(v).unwrap();
                w.write_field_end().unwrap();
            }
            w.write_field_stop().unwrap();
            w.write_struct_end().unwrap();
        });
        assert!(std::str::from_utf8(&bytes).unwrap().contains("\"NaN\""));

        let mut reader = JsonReader::new(&bytes);
        reader.read_message_begin().unwrap();
        reader.read_struct_begin().unwrap();
        reader.read_field_begin().unwrap().unwrap();
        assert!(reader.read_double().unwrap().is_nan());
        reader.read_field_begin().unwrap().unwrap();
        assert_eq!(reader.read_double().unwrap(), f64::INFINITY);
        reader.read_field_begin().unwrap().unwrap();
        assert_eq!(reader.read_double().unwrap(), f64::NEG_INFINITY);
        reader.read_field_begin().unwrap().unwrap();
        assert_eq!(reader.read_double().unwrap(), 0.5);
        assert!(reader.read_field_begin().unwrap().is_none());
        reader.read_struct_end().unwrap();
    }

    #[test]
    fn test_binary_is_base64() {
        let bytes = write_message(|w| {
            w.write_struct_begin("args").unwrap();
            w.write_field_begin(&FieldHeader::new(1, WireType::String))
                .unwrap();
            w.write_binary(&[0xDE, 0xAD, 0xBE, 0xEF]).unwrap();
            w.write_field_end().unwrap();
            w.write_field_stop().unwrap();
            w.write_struct_end().unwrap();
        });
        assert!(std::str::from_utf8(&bytes).unwrap().contains("3q2+7w=="));

        let mut reader = JsonReader::new(&bytes);
        reader.read_message_begin().unwrap();
        reader.read_struct_begin().unwrap();
        reader.read_field_begin().unwrap().unwrap();
        assert_eq!(reader.read_binary().unwrap(), vec![0xDE, 0xAD, 0xBE, 0xEF]);
    }

    #[test]
    fn test_truncated_json_is_incomplete() {
        let bytes = write_message(write_empty_struct);
        let mut reader = JsonReader::new(&bytes[..bytes.len() - 3]);
        assert!(reader.read_message_begin().unwrap_err().is_incomplete());
    }

    #[test]
    fn test_trailing_bytes_belong_to_next_message() {
        let mut bytes = write_message(write_empty_struct);
        let first_len = bytes.len();
        bytes.extend_from_slice(&write_message(write_empty_struct));

        let mut reader = JsonReader::new(&bytes);
        reader.read_message_begin().unwrap();
        assert_eq!(reader.position(), first_len);
    }

    #[test]
    fn test_wrong_tag_is_decode_error() {
        let bytes = br#"[1,"ping","call",1,{"1":["zzz",42]}]"#;
        let mut reader = JsonReader::new(bytes);
        reader.read_message_begin().unwrap();
        reader.read_struct_begin().unwrap();
        assert!(matches!(
            reader.read_field_begin(),
            Err(ProtocolError::UnexpectedJson { .. })
        ));
    }

    #[test]
    fn test_container_arity_mismatch_is_decode_error() {
        // Declares 3 elements but carries 2.
        let bytes = br#"[1,"ping","call",1,{"1":["lst",["i32",3,1,2]]}]"#;
        let mut reader = JsonReader::new(bytes);
        reader.read_message_begin().unwrap();
        reader.read_struct_begin().unwrap();
        reader.read_field_begin().unwrap().unwrap();
        assert!(matches!(
            reader.read_list_begin(),
            Err(ProtocolError::UnexpectedJson { .. })
        ));
    }

    #[test]
    fn test_unknown_message_kind_tag() {
        let bytes = br#"[1,"ping","cast",1,{}]"#;
        let mut reader = JsonReader::new(bytes);
        assert!(matches!(
            reader.read_message_begin(),
            Err(ProtocolError::UnexpectedJson { .. })
        ));
    }

    #[test]
    fn test_out_of_range_integer_rejected() {
        let bytes = br#"[1,"ping","call",1,{"1":["i8",4000]}]"#;
        let mut reader = JsonReader::new(bytes);
        reader.read_message_begin().unwrap();
        reader.read_struct_begin().unwrap();
        reader.read_field_begin().unwrap().unwrap();
        assert!(matches!(
            reader.read_i8(),
            Err(ProtocolError::UnexpectedJson { .. })
        ));
    }
}
