// UASC for Rust
// SPDX-License-Identifier: MPL-2.0
// Copyright (C) 2026 UASC contributors

//! Contains the implementation of `ExtensionObject`.

use std::io::{Read, Write};

use crate::byte_string::ByteString;
use crate::encoding::{
    read_u8, write_u8, BinaryDecodable, BinaryEncodable, DecodingOptions, EncodingResult, Error,
};
use crate::node_id::NodeId;

const BODY_NONE: u8 = 0x00;
const BODY_BYTE_STRING: u8 = 0x01;
const BODY_XML: u8 = 0x02;

/// A type id plus an opaque encoded body. The channel layer never interprets
/// extension object bodies; they ride through as bytes.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ExtensionObject {
    /// Encoding id of the contained type.
    pub type_id: NodeId,
    /// The encoded body, `None` when the object has no body.
    pub body: Option<ByteString>,
}

impl ExtensionObject {
    /// An extension object with a null type id and no body.
    pub fn null() -> Self {
        Self::default()
    }

    /// `true` if the object has a null type id and no body.
    pub fn is_null(&self) -> bool {
        self.type_id.is_null() && self.body.is_none()
    }
}

impl BinaryEncodable for ExtensionObject {
    fn byte_len(&self) -> usize {
        self.type_id.byte_len() + 1 + self.body.as_ref().map_or(0, |b| b.byte_len())
    }

    fn encode<S: Write + ?Sized>(&self, stream: &mut S) -> EncodingResult<()> {
        self.type_id.encode(stream)?;
        match &self.body {
            None => write_u8(stream, BODY_NONE),
            Some(body) => {
                write_u8(stream, BODY_BYTE_STRING)?;
                body.encode(stream)
            }
        }
    }
}

impl BinaryDecodable for ExtensionObject {
    fn decode<S: Read + ?Sized>(stream: &mut S, options: &DecodingOptions) -> EncodingResult<Self> {
        let type_id = NodeId::decode(stream, options)?;
        let encoding = read_u8(stream)?;
        let body = match encoding {
            BODY_NONE => None,
            // An XML body has the same wire shape as a byte string and is
            // kept opaque just the same.
            BODY_BYTE_STRING | BODY_XML => Some(ByteString::decode(stream, options)?),
            v => {
                return Err(Error::decoding(format!(
                    "invalid extension object encoding {v:#04x}"
                )))
            }
        };
        Ok(ExtensionObject { type_id, body })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn null_round_trip() {
        let obj = ExtensionObject::null();
        let mut buf = Vec::new();
        obj.encode(&mut buf).unwrap();
        assert_eq!(buf.len(), obj.byte_len());
        let decoded =
            ExtensionObject::decode(&mut Cursor::new(buf), &DecodingOptions::minimal()).unwrap();
        assert!(decoded.is_null());
    }

    #[test]
    fn body_round_trip() {
        let obj = ExtensionObject {
            type_id: NodeId::new(0, 12345u32),
            body: Some(ByteString::from(vec![1u8, 2, 3])),
        };
        let mut buf = Vec::new();
        obj.encode(&mut buf).unwrap();
        let decoded =
            ExtensionObject::decode(&mut Cursor::new(buf), &DecodingOptions::minimal()).unwrap();
        assert_eq!(decoded, obj);
    }
}
