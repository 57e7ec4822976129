// UASC for Rust
// SPDX-License-Identifier: MPL-2.0
// Copyright (C) 2026 UASC contributors

//! Contains the implementation of `Variant`, the discriminated union over the
//! built-in scalar types that application payloads are expressed in.

use std::io::{Read, Write};

use crate::byte_string::ByteString;
use crate::date_time::DateTime;
use crate::encoding::{
    read_i32, read_u8, write_i32, write_u8, BinaryDecodable, BinaryEncodable, DecodingOptions,
    EncodingResult, Error,
};
use crate::guid::Guid;
use crate::node_id::NodeId;
use crate::status_code::StatusCode;
use crate::string::UAString;

// Data type ids used in the variant encoding mask.
const TYPE_BOOLEAN: u8 = 1;
const TYPE_SBYTE: u8 = 2;
const TYPE_BYTE: u8 = 3;
const TYPE_INT16: u8 = 4;
const TYPE_UINT16: u8 = 5;
const TYPE_INT32: u8 = 6;
const TYPE_UINT32: u8 = 7;
const TYPE_INT64: u8 = 8;
const TYPE_UINT64: u8 = 9;
const TYPE_FLOAT: u8 = 10;
const TYPE_DOUBLE: u8 = 11;
const TYPE_STRING: u8 = 12;
const TYPE_DATE_TIME: u8 = 13;
const TYPE_GUID: u8 = 14;
const TYPE_BYTE_STRING: u8 = 15;
const TYPE_NODE_ID: u8 = 17;
const TYPE_STATUS_CODE: u8 = 19;

/// Set when the value is a single-dimension array of the masked type.
const ARRAY_VALUES_BIT: u8 = 0x80;

/// A value of one of the built-in types, scalar or single-dimension array.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Variant {
    /// Empty variant, mask byte 0.
    #[default]
    Empty,
    /// Boolean value.
    Boolean(bool),
    /// Signed byte.
    SByte(i8),
    /// Unsigned byte.
    Byte(u8),
    /// 16 bit signed integer.
    Int16(i16),
    /// 16 bit unsigned integer.
    UInt16(u16),
    /// 32 bit signed integer.
    Int32(i32),
    /// 32 bit unsigned integer.
    UInt32(u32),
    /// 64 bit signed integer.
    Int64(i64),
    /// 64 bit unsigned integer.
    UInt64(u64),
    /// IEEE single precision float.
    Float(f32),
    /// IEEE double precision float.
    Double(f64),
    /// String value.
    String(UAString),
    /// Timestamp value.
    DateTime(Box<DateTime>),
    /// Guid value.
    Guid(Box<Guid>),
    /// Status code value.
    StatusCode(StatusCode),
    /// Byte string value.
    ByteString(ByteString),
    /// Node id value.
    NodeId(Box<NodeId>),
    /// Single-dimension array of variants of one scalar type.
    Array(Vec<Variant>),
}

impl Variant {
    fn scalar_type_id(&self) -> Option<u8> {
        Some(match self {
            Variant::Empty | Variant::Array(_) => return None,
            Variant::Boolean(_) => TYPE_BOOLEAN,
            Variant::SByte(_) => TYPE_SBYTE,
            Variant::Byte(_) => TYPE_BYTE,
            Variant::Int16(_) => TYPE_INT16,
            Variant::UInt16(_) => TYPE_UINT16,
            Variant::Int32(_) => TYPE_INT32,
            Variant::UInt32(_) => TYPE_UINT32,
            Variant::Int64(_) => TYPE_INT64,
            Variant::UInt64(_) => TYPE_UINT64,
            Variant::Float(_) => TYPE_FLOAT,
            Variant::Double(_) => TYPE_DOUBLE,
            Variant::String(_) => TYPE_STRING,
            Variant::DateTime(_) => TYPE_DATE_TIME,
            Variant::Guid(_) => TYPE_GUID,
            Variant::StatusCode(_) => TYPE_STATUS_CODE,
            Variant::ByteString(_) => TYPE_BYTE_STRING,
            Variant::NodeId(_) => TYPE_NODE_ID,
        })
    }

    fn scalar_byte_len(&self) -> usize {
        match self {
            Variant::Empty | Variant::Array(_) => 0,
            Variant::Boolean(_) | Variant::SByte(_) | Variant::Byte(_) => 1,
            Variant::Int16(_) | Variant::UInt16(_) => 2,
            Variant::Int32(_) | Variant::UInt32(_) | Variant::Float(_) => 4,
            Variant::Int64(_) | Variant::UInt64(_) | Variant::Double(_) => 8,
            Variant::StatusCode(_) => 4,
            Variant::DateTime(_) => 8,
            Variant::Guid(v) => v.byte_len(),
            Variant::String(v) => v.byte_len(),
            Variant::ByteString(v) => v.byte_len(),
            Variant::NodeId(v) => v.byte_len(),
        }
    }

    fn encode_scalar_value<S: Write + ?Sized>(&self, stream: &mut S) -> EncodingResult<()> {
        match self {
            Variant::Empty | Variant::Array(_) => {
                Err(Error::encoding("not a scalar variant"))
            }
            Variant::Boolean(v) => v.encode(stream),
            Variant::SByte(v) => v.encode(stream),
            Variant::Byte(v) => v.encode(stream),
            Variant::Int16(v) => v.encode(stream),
            Variant::UInt16(v) => v.encode(stream),
            Variant::Int32(v) => v.encode(stream),
            Variant::UInt32(v) => v.encode(stream),
            Variant::Int64(v) => v.encode(stream),
            Variant::UInt64(v) => v.encode(stream),
            Variant::Float(v) => v.encode(stream),
            Variant::Double(v) => v.encode(stream),
            Variant::String(v) => v.encode(stream),
            Variant::DateTime(v) => v.encode(stream),
            Variant::Guid(v) => v.encode(stream),
            Variant::StatusCode(v) => v.encode(stream),
            Variant::ByteString(v) => v.encode(stream),
            Variant::NodeId(v) => v.encode(stream),
        }
    }

    fn decode_scalar_value<S: Read + ?Sized>(
        type_id: u8,
        stream: &mut S,
        options: &DecodingOptions,
    ) -> EncodingResult<Variant> {
        Ok(match type_id {
            TYPE_BOOLEAN => Variant::Boolean(bool::decode(stream, options)?),
            TYPE_SBYTE => Variant::SByte(i8::decode(stream, options)?),
            TYPE_BYTE => Variant::Byte(u8::decode(stream, options)?),
            TYPE_INT16 => Variant::Int16(i16::decode(stream, options)?),
            TYPE_UINT16 => Variant::UInt16(u16::decode(stream, options)?),
            TYPE_INT32 => Variant::Int32(i32::decode(stream, options)?),
            TYPE_UINT32 => Variant::UInt32(u32::decode(stream, options)?),
            TYPE_INT64 => Variant::Int64(i64::decode(stream, options)?),
            TYPE_UINT64 => Variant::UInt64(u64::decode(stream, options)?),
            TYPE_FLOAT => Variant::Float(f32::decode(stream, options)?),
            TYPE_DOUBLE => Variant::Double(f64::decode(stream, options)?),
            TYPE_STRING => Variant::String(UAString::decode(stream, options)?),
            TYPE_DATE_TIME => Variant::DateTime(Box::new(DateTime::decode(stream, options)?)),
            TYPE_GUID => Variant::Guid(Box::new(Guid::decode(stream, options)?)),
            TYPE_STATUS_CODE => Variant::StatusCode(StatusCode::decode(stream, options)?),
            TYPE_BYTE_STRING => Variant::ByteString(ByteString::decode(stream, options)?),
            TYPE_NODE_ID => Variant::NodeId(Box::new(NodeId::decode(stream, options)?)),
            v => {
                return Err(Error::decoding(format!(
                    "unsupported variant type id {v}"
                )))
            }
        })
    }

    /// The element type id of an array variant, checking that the array is
    /// homogeneous. Empty arrays encode as byte arrays.
    fn array_type_id(values: &[Variant]) -> EncodingResult<u8> {
        let Some(first) = values.first() else {
            return Ok(TYPE_BYTE);
        };
        let type_id = first
            .scalar_type_id()
            .ok_or_else(|| Error::encoding("array of non-scalar variants"))?;
        if values.iter().any(|v| v.scalar_type_id() != Some(type_id)) {
            return Err(Error::encoding("array of mixed variant types"));
        }
        Ok(type_id)
    }
}

impl BinaryEncodable for Variant {
    fn byte_len(&self) -> usize {
        match self {
            Variant::Empty => 1,
            Variant::Array(values) => {
                1 + 4 + values.iter().map(|v| v.scalar_byte_len()).sum::<usize>()
            }
            scalar => 1 + scalar.scalar_byte_len(),
        }
    }

    fn encode<S: Write + ?Sized>(&self, stream: &mut S) -> EncodingResult<()> {
        match self {
            Variant::Empty => write_u8(stream, 0),
            Variant::Array(values) => {
                let type_id = Self::array_type_id(values)?;
                write_u8(stream, type_id | ARRAY_VALUES_BIT)?;
                write_i32(stream, values.len() as i32)?;
                for value in values {
                    value.encode_scalar_value(stream)?;
                }
                Ok(())
            }
            scalar => {
                // Checked to be a scalar by the match above.
                let type_id = scalar
                    .scalar_type_id()
                    .ok_or_else(|| Error::encoding("unencodable variant"))?;
                write_u8(stream, type_id)?;
                scalar.encode_scalar_value(stream)
            }
        }
    }
}

impl BinaryDecodable for Variant {
    fn decode<S: Read + ?Sized>(stream: &mut S, options: &DecodingOptions) -> EncodingResult<Self> {
        let mask = read_u8(stream)?;
        if mask == 0 {
            return Ok(Variant::Empty);
        }
        let type_id = mask & 0x3f;
        if mask & ARRAY_VALUES_BIT == 0 {
            return Self::decode_scalar_value(type_id, stream, options);
        }
        let len = read_i32(stream)?;
        if len < 0 {
            return Ok(Variant::Array(Vec::new()));
        }
        let len = len as usize;
        if options.max_array_length > 0 && len > options.max_array_length {
            return Err(Error::new(
                StatusCode::BadEncodingLimitsExceeded,
                format!(
                    "variant array length {} exceeds decoding limit {}",
                    len, options.max_array_length
                ),
            ));
        }
        let mut values = Vec::with_capacity(len);
        for _ in 0..len {
            values.push(Self::decode_scalar_value(type_id, stream, options)?);
        }
        Ok(Variant::Array(values))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn round_trip(v: Variant) {
        let mut buf = Vec::new();
        v.encode(&mut buf).unwrap();
        assert_eq!(buf.len(), v.byte_len());
        let decoded = Variant::decode(&mut Cursor::new(buf), &DecodingOptions::minimal()).unwrap();
        assert_eq!(decoded, v);
    }

    #[test]
    fn scalars() {
        round_trip(Variant::Empty);
        round_trip(Variant::Boolean(true));
        round_trip(Variant::UInt32(1234));
        round_trip(Variant::Double(0.5));
        round_trip(Variant::String(UAString::from("hello")));
        round_trip(Variant::NodeId(Box::new(NodeId::new(1, 42u32))));
        round_trip(Variant::StatusCode(StatusCode::BadTimeout));
    }

    #[test]
    fn arrays() {
        round_trip(Variant::Array(vec![
            Variant::Int32(1),
            Variant::Int32(2),
            Variant::Int32(3),
        ]));
    }

    #[test]
    fn mixed_array_is_rejected() {
        let v = Variant::Array(vec![Variant::Int32(1), Variant::Boolean(false)]);
        let mut buf = Vec::new();
        assert!(v.encode(&mut buf).is_err());
    }
}
