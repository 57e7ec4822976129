// UASC for Rust
// SPDX-License-Identifier: MPL-2.0
// Copyright (C) 2026 UASC contributors

//! Contains the implementation of `Guid`.

use std::fmt;
use std::io::{Read, Write};
use std::str::FromStr;

use uuid::Uuid;

use crate::encoding::{
    process_decode_io_result, process_encode_io_result, read_u16, read_u32, write_u16, write_u32,
    BinaryDecodable, BinaryEncodable, DecodingOptions, EncodingResult,
};

/// A 16 byte globally unique identifier. The OPC UA binary layout stores the
/// first three fields little-endian, unlike the RFC 4122 string form.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct Guid {
    uuid: Uuid,
}

impl Guid {
    /// The all-zero guid.
    pub fn null() -> Self {
        Self { uuid: Uuid::nil() }
    }

    /// A fresh random (v4) guid.
    pub fn new() -> Self {
        Self {
            uuid: Uuid::new_v4(),
        }
    }

    /// `true` if this is the all-zero guid.
    pub fn is_null(&self) -> bool {
        self.uuid.is_nil()
    }
}

impl From<Uuid> for Guid {
    fn from(uuid: Uuid) -> Self {
        Self { uuid }
    }
}

impl FromStr for Guid {
    type Err = ();
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(|uuid| Guid { uuid }).map_err(|_| ())
    }
}

impl fmt::Display for Guid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.uuid)
    }
}

impl BinaryEncodable for Guid {
    fn byte_len(&self) -> usize {
        16
    }

    fn encode<S: Write + ?Sized>(&self, stream: &mut S) -> EncodingResult<()> {
        let (data1, data2, data3, data4) = self.uuid.as_fields();
        write_u32(stream, data1)?;
        write_u16(stream, data2)?;
        write_u16(stream, data3)?;
        process_encode_io_result(stream.write_all(data4))
    }
}

impl BinaryDecodable for Guid {
    fn decode<S: Read + ?Sized>(stream: &mut S, _: &DecodingOptions) -> EncodingResult<Self> {
        let data1 = read_u32(stream)?;
        let data2 = read_u16(stream)?;
        let data3 = read_u16(stream)?;
        let mut data4 = [0u8; 8];
        process_decode_io_result(stream.read_exact(&mut data4))?;
        Ok(Guid {
            uuid: Uuid::from_fields(data1, data2, data3, &data4),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn round_trip() {
        let guid = Guid::new();
        let mut buf = Vec::new();
        guid.encode(&mut buf).unwrap();
        assert_eq!(buf.len(), 16);
        let decoded = Guid::decode(&mut Cursor::new(buf), &DecodingOptions::minimal()).unwrap();
        assert_eq!(decoded, guid);
    }

    #[test]
    fn known_layout() {
        let guid = Guid::from_str("72962b91-fa75-4ae6-8d28-b404dc7daf63").unwrap();
        let mut buf = Vec::new();
        guid.encode(&mut buf).unwrap();
        // First three fields are little-endian on the wire.
        assert_eq!(&buf[..4], &[0x91, 0x2b, 0x96, 0x72]);
        assert_eq!(&buf[4..6], &[0x75, 0xfa]);
        assert_eq!(&buf[6..8], &[0xe6, 0x4a]);
        assert_eq!(&buf[8..], &[0x8d, 0x28, 0xb4, 0x04, 0xdc, 0x7d, 0xaf, 0x63]);
    }
}
