//! Application-level exceptions carried in place of a normal reply.

use crate::error::ProtocolError;
use crate::protocol::{ProtocolReader, ProtocolWriter};
use crate::types::{FieldHeader, WireType};
use crate::value::{skip, WireRead, WireWrite};
use std::fmt;

/// Error kinds declared by the protocol family.
///
/// These codes are part of the wire contract and must remain stable.
/// Codes outside the declared set round-trip exactly through `Other`,
/// since the remote side may be newer than this runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ApplicationErrorKind {
    Unknown,
    UnknownMethod,
    InvalidMessageType,
    WrongMethodName,
    BadSequenceId,
    MissingResult,
    InternalError,
    ProtocolError,
    Other(i32),
}

impl ApplicationErrorKind {
    pub fn code(self) -> i32 {
        match self {
            ApplicationErrorKind::Unknown => 0,
            ApplicationErrorKind::UnknownMethod => 1,
            ApplicationErrorKind::InvalidMessageType => 2,
            ApplicationErrorKind::WrongMethodName => 3,
            ApplicationErrorKind::BadSequenceId => 4,
            ApplicationErrorKind::MissingResult => 5,
            ApplicationErrorKind::InternalError => 6,
            ApplicationErrorKind::ProtocolError => 7,
            ApplicationErrorKind::Other(code) => code,
        }
    }

    pub fn from_code(code: i32) -> Self {
        match code {
            0 => ApplicationErrorKind::Unknown,
            1 => ApplicationErrorKind::UnknownMethod,
            2 => ApplicationErrorKind::InvalidMessageType,
            3 => ApplicationErrorKind::WrongMethodName,
            4 => ApplicationErrorKind::BadSequenceId,
            5 => ApplicationErrorKind::MissingResult,
            6 => ApplicationErrorKind::InternalError,
            7 => ApplicationErrorKind::ProtocolError,
            other => ApplicationErrorKind::Other(other),
        }
    }
}

impl fmt::Display for ApplicationErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApplicationErrorKind::Unknown => write!(f, "unknown"),
            ApplicationErrorKind::UnknownMethod => write!(f, "unknown method"),
            ApplicationErrorKind::InvalidMessageType => write!(f, "invalid message type"),
            ApplicationErrorKind::WrongMethodName => write!(f, "wrong method name"),
            ApplicationErrorKind::BadSequenceId => write!(f, "bad sequence id"),
            ApplicationErrorKind::MissingResult => write!(f, "missing result"),
            ApplicationErrorKind::InternalError => write!(f, "internal error"),
            ApplicationErrorKind::ProtocolError => write!(f, "protocol error"),
            ApplicationErrorKind::Other(code) => write!(f, "application error {}", code),
        }
    }
}

/// A declared error value returned by the remote side as an alternate
/// reply, distinct from a connection-level transport failure.
///
/// Wire shape: a struct with field 1 (message string) and field 2
/// (kind i32); unknown fields are skipped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApplicationException {
    pub kind: ApplicationErrorKind,
    pub message: String,
}

impl ApplicationException {
    pub fn new(kind: ApplicationErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

impl fmt::Display for ApplicationException {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

impl std::error::Error for ApplicationException {}

impl WireWrite for ApplicationException {
    fn write(&self, out: &mut dyn ProtocolWriter) -> Result<(), ProtocolError> {
        out.write_struct_begin("ApplicationException")?;
        out.write_field_begin(&FieldHeader::new(1, WireType::String))?;
        out.write_string(&self.message)?;
        out.write_field_end()?;
        out.write_field_begin(&FieldHeader::new(2, WireType::I32))?;
        out.write_i32(self.kind.code())?;
        out.write_field_end()?;
        out.write_field_stop()?;
        out.write_struct_end()
    }
}

impl WireRead for ApplicationException {
    fn read(input: &mut dyn ProtocolReader) -> Result<Self, ProtocolError> {
        let mut message = String::new();
        let mut kind = ApplicationErrorKind::Unknown;
        input.read_struct_begin()?;
        while let Some(field) = input.read_field_begin()? {
            match (field.id, field.field_type) {
                (1, WireType::String) => message = input.read_string()?,
                (2, WireType::I32) => kind = ApplicationErrorKind::from_code(input.read_i32()?),
                _ => skip(input, field.field_type)?,
            }
            input.read_field_end()?;
        }
        input.read_struct_end()?;
        Ok(Self { kind, message })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::ProtocolKind;
    use crate::types::{MessageHeader, MessageKind};

    fn roundtrip(kind: ProtocolKind, ex: &ApplicationException) -> ApplicationException {
        let mut writer = kind.writer();
        writer
            .write_message_begin(&MessageHeader::new("fail", MessageKind::Exception, 9))
            .unwrap();
        ex.write(writer.as_mut()).unwrap();
        writer.write_message_end().unwrap();
        let bytes = writer.take_bytes();

        let mut reader = kind.reader(&bytes);
        let header = reader.read_message_begin().unwrap();
        assert_eq!(header.kind, MessageKind::Exception);
        let decoded = ApplicationException::read(reader.as_mut()).unwrap();
        reader.read_message_end().unwrap();
        decoded
    }

    #[test]
    fn test_roundtrip_all_protocols() {
        let ex = ApplicationException::new(ApplicationErrorKind::UnknownMethod, "no such method");
        for kind in [ProtocolKind::Binary, ProtocolKind::Compact, ProtocolKind::Json] {
            assert_eq!(roundtrip(kind, &ex), ex);
        }
    }

    #[test]
    fn test_undeclared_code_roundtrips_exactly() {
        let ex = ApplicationException::new(ApplicationErrorKind::Other(1001), "Xception");
        for kind in [ProtocolKind::Binary, ProtocolKind::Compact, ProtocolKind::Json] {
            let decoded = roundtrip(kind, &ex);
            assert_eq!(decoded.kind.code(), 1001);
            assert_eq!(decoded.message, "Xception");
        }
    }

    #[test]
    fn test_kind_codes_stable() {
        assert_eq!(ApplicationErrorKind::Unknown.code(), 0);
        assert_eq!(ApplicationErrorKind::UnknownMethod.code(), 1);
        assert_eq!(ApplicationErrorKind::ProtocolError.code(), 7);
        assert_eq!(
            ApplicationErrorKind::from_code(4),
            ApplicationErrorKind::BadSequenceId
        );
        assert_eq!(
            ApplicationErrorKind::from_code(99),
            ApplicationErrorKind::Other(99)
        );
    }
}
