// UASC for Rust
// SPDX-License-Identifier: MPL-2.0
// Copyright (C) 2026 UASC contributors

//! Contains the implementation of `ByteString`.

use std::io::{Read, Write};

use crate::encoding::{
    process_decode_io_result, process_encode_io_result, read_i32, write_i32, BinaryDecodable,
    BinaryEncodable, DecodingOptions, EncodingResult, Error,
};
use crate::status_code::StatusCode;

/// An OPC UA byte string: raw bytes with an `i32` length prefix where `-1`
/// denotes the null byte string.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct ByteString {
    value: Option<Vec<u8>>,
}

impl ByteString {
    /// The null byte string.
    pub fn null() -> Self {
        Self { value: None }
    }

    /// `true` if this is the null byte string.
    pub fn is_null(&self) -> bool {
        self.value.is_none()
    }

    /// `true` if this is null or has zero length.
    pub fn is_null_or_empty(&self) -> bool {
        self.value.as_ref().map(|v| v.is_empty()).unwrap_or(true)
    }

    /// Length in bytes, 0 for null.
    pub fn len(&self) -> usize {
        self.value.as_ref().map(|v| v.len()).unwrap_or(0)
    }

    /// `true` if the byte string is null or empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The inner bytes, if any.
    pub fn value(&self) -> Option<&[u8]> {
        self.value.as_deref()
    }
}

impl AsRef<[u8]> for ByteString {
    fn as_ref(&self) -> &[u8] {
        self.value.as_deref().unwrap_or(&[])
    }
}

impl From<&[u8]> for ByteString {
    fn from(value: &[u8]) -> Self {
        Self {
            value: Some(value.to_vec()),
        }
    }
}

impl From<Vec<u8>> for ByteString {
    fn from(value: Vec<u8>) -> Self {
        Self { value: Some(value) }
    }
}

impl<const N: usize> From<[u8; N]> for ByteString {
    fn from(value: [u8; N]) -> Self {
        Self {
            value: Some(value.to_vec()),
        }
    }
}

impl BinaryEncodable for ByteString {
    fn byte_len(&self) -> usize {
        4 + self.len()
    }

    fn encode<S: Write + ?Sized>(&self, stream: &mut S) -> EncodingResult<()> {
        match &self.value {
            None => write_i32(stream, -1),
            Some(value) => {
                write_i32(stream, value.len() as i32)?;
                process_encode_io_result(stream.write_all(value))
            }
        }
    }
}

impl BinaryDecodable for ByteString {
    fn decode<S: Read + ?Sized>(stream: &mut S, options: &DecodingOptions) -> EncodingResult<Self> {
        let len = read_i32(stream)?;
        if len < 0 {
            return Ok(ByteString::null());
        }
        let len = len as usize;
        if options.max_byte_string_length > 0 && len > options.max_byte_string_length {
            return Err(Error::new(
                StatusCode::BadEncodingLimitsExceeded,
                format!(
                    "byte string length {} exceeds decoding limit {}",
                    len, options.max_byte_string_length
                ),
            ));
        }
        let mut value = vec![0u8; len];
        process_decode_io_result(stream.read_exact(&mut value))?;
        Ok(ByteString { value: Some(value) })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn round_trip() {
        let b = ByteString::from(vec![1u8, 2, 3, 4]);
        let mut buf = Vec::new();
        b.encode(&mut buf).unwrap();
        assert_eq!(buf.len(), b.byte_len());
        let decoded =
            ByteString::decode(&mut Cursor::new(buf), &DecodingOptions::minimal()).unwrap();
        assert_eq!(decoded, b);
    }

    #[test]
    fn null_and_empty_are_distinct() {
        assert!(ByteString::null().is_null());
        assert!(!ByteString::from(vec![]).is_null());
        assert!(ByteString::from(vec![]).is_null_or_empty());
    }
}
