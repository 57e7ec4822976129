// UASC for Rust
// SPDX-License-Identifier: MPL-2.0
// Copyright (C) 2026 UASC contributors

//! Contains the implementation of `NodeId`.

use std::fmt;
use std::io::{Read, Write};

use crate::byte_string::ByteString;
use crate::encoding::{
    read_u16, read_u32, read_u8, write_u16, write_u32, write_u8, BinaryDecodable, BinaryEncodable,
    DecodingOptions, EncodingResult, Error,
};
use crate::guid::Guid;
use crate::string::UAString;

/// The identifier part of a node id.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Identifier {
    /// Numeric identifier.
    Numeric(u32),
    /// String identifier.
    String(UAString),
    /// Guid identifier.
    Guid(Guid),
    /// Opaque identifier.
    ByteString(ByteString),
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Identifier::Numeric(v) => write!(f, "i={v}"),
            Identifier::String(v) => write!(f, "s={v}"),
            Identifier::Guid(v) => write!(f, "g={v}"),
            Identifier::ByteString(v) => write!(f, "b={}b", v.len()),
        }
    }
}

/// An OPC UA node id: a namespace index and an identifier. The binary
/// encoding selects the shortest representation via a leading variant byte.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NodeId {
    /// Namespace index.
    pub namespace: u16,
    /// Identifier within the namespace.
    pub identifier: Identifier,
}

// Encoding variant bytes.
const TWO_BYTE: u8 = 0x00;
const FOUR_BYTE: u8 = 0x01;
const NUMERIC: u8 = 0x02;
const STRING: u8 = 0x03;
const GUID: u8 = 0x04;
const OPAQUE: u8 = 0x05;

impl Default for NodeId {
    fn default() -> Self {
        Self::null()
    }
}

impl NodeId {
    /// Construct a node id from a namespace and anything convertible to an
    /// identifier.
    pub fn new(namespace: u16, identifier: impl Into<Identifier>) -> Self {
        Self {
            namespace,
            identifier: identifier.into(),
        }
    }

    /// The null node id, `ns=0;i=0`.
    pub fn null() -> Self {
        Self {
            namespace: 0,
            identifier: Identifier::Numeric(0),
        }
    }

    /// `true` if this is the null node id.
    pub fn is_null(&self) -> bool {
        self.namespace == 0 && self.identifier == Identifier::Numeric(0)
    }

    /// The numeric identifier if this is a namespace-zero numeric node id.
    pub fn as_object_id(&self) -> Option<u32> {
        match (&self.identifier, self.namespace) {
            (Identifier::Numeric(id), 0) => Some(*id),
            _ => None,
        }
    }
}

impl From<u32> for Identifier {
    fn from(v: u32) -> Self {
        Identifier::Numeric(v)
    }
}

impl From<&str> for Identifier {
    fn from(v: &str) -> Self {
        Identifier::String(UAString::from(v))
    }
}

impl From<Guid> for Identifier {
    fn from(v: Guid) -> Self {
        Identifier::Guid(v)
    }
}

impl From<ByteString> for Identifier {
    fn from(v: ByteString) -> Self {
        Identifier::ByteString(v)
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.namespace == 0 {
            write!(f, "{}", self.identifier)
        } else {
            write!(f, "ns={};{}", self.namespace, self.identifier)
        }
    }
}

impl BinaryEncodable for NodeId {
    fn byte_len(&self) -> usize {
        match &self.identifier {
            Identifier::Numeric(id) => {
                if self.namespace == 0 && *id <= 255 {
                    2
                } else if self.namespace <= 255 && *id <= 65_535 {
                    4
                } else {
                    7
                }
            }
            Identifier::String(s) => 3 + s.byte_len(),
            Identifier::Guid(g) => 3 + g.byte_len(),
            Identifier::ByteString(b) => 3 + b.byte_len(),
        }
    }

    fn encode<S: Write + ?Sized>(&self, stream: &mut S) -> EncodingResult<()> {
        match &self.identifier {
            Identifier::Numeric(id) => {
                if self.namespace == 0 && *id <= 255 {
                    write_u8(stream, TWO_BYTE)?;
                    write_u8(stream, *id as u8)
                } else if self.namespace <= 255 && *id <= 65_535 {
                    write_u8(stream, FOUR_BYTE)?;
                    write_u8(stream, self.namespace as u8)?;
                    write_u16(stream, *id as u16)
                } else {
                    write_u8(stream, NUMERIC)?;
                    write_u16(stream, self.namespace)?;
                    write_u32(stream, *id)
                }
            }
            Identifier::String(s) => {
                write_u8(stream, STRING)?;
                write_u16(stream, self.namespace)?;
                s.encode(stream)
            }
            Identifier::Guid(g) => {
                write_u8(stream, GUID)?;
                write_u16(stream, self.namespace)?;
                g.encode(stream)
            }
            Identifier::ByteString(b) => {
                write_u8(stream, OPAQUE)?;
                write_u16(stream, self.namespace)?;
                b.encode(stream)
            }
        }
    }
}

impl BinaryDecodable for NodeId {
    fn decode<S: Read + ?Sized>(stream: &mut S, options: &DecodingOptions) -> EncodingResult<Self> {
        let variant = read_u8(stream)?;
        // High bits of the variant byte carry the expanded-node-id flags,
        // which must not appear on a plain node id.
        match variant & 0x3f {
            TWO_BYTE => Ok(NodeId::new(0, u32::from(read_u8(stream)?))),
            FOUR_BYTE => {
                let namespace = u16::from(read_u8(stream)?);
                let id = u32::from(read_u16(stream)?);
                Ok(NodeId::new(namespace, id))
            }
            NUMERIC => {
                let namespace = read_u16(stream)?;
                let id = read_u32(stream)?;
                Ok(NodeId::new(namespace, id))
            }
            STRING => {
                let namespace = read_u16(stream)?;
                let s = UAString::decode(stream, options)?;
                Ok(NodeId::new(namespace, Identifier::String(s)))
            }
            GUID => {
                let namespace = read_u16(stream)?;
                let g = Guid::decode(stream, options)?;
                Ok(NodeId::new(namespace, g))
            }
            OPAQUE => {
                let namespace = read_u16(stream)?;
                let b = ByteString::decode(stream, options)?;
                Ok(NodeId::new(namespace, Identifier::ByteString(b)))
            }
            v => Err(Error::decoding(format!("invalid node id variant {v:#04x}"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn round_trip(id: NodeId) {
        let mut buf = Vec::new();
        id.encode(&mut buf).unwrap();
        assert_eq!(buf.len(), id.byte_len());
        let decoded = NodeId::decode(&mut Cursor::new(buf), &DecodingOptions::minimal()).unwrap();
        assert_eq!(decoded, id);
    }

    #[test]
    fn two_byte_form() {
        let id = NodeId::new(0, 255u32);
        assert_eq!(id.byte_len(), 2);
        round_trip(id);
    }

    #[test]
    fn four_byte_form() {
        let id = NodeId::new(3, 1024u32);
        assert_eq!(id.byte_len(), 4);
        round_trip(id);
    }

    #[test]
    fn full_numeric_form() {
        round_trip(NodeId::new(300, 70_000u32));
    }

    #[test]
    fn string_guid_and_opaque_forms() {
        round_trip(NodeId::new(2, "some node"));
        round_trip(NodeId::new(2, Guid::new()));
        round_trip(NodeId::new(2, ByteString::from(vec![9u8, 8, 7])));
    }
}
