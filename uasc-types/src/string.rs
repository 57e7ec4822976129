// UASC for Rust
// SPDX-License-Identifier: MPL-2.0
// Copyright (C) 2026 UASC contributors

//! Contains the implementation of `UAString`.

use std::fmt;
use std::io::{Read, Write};

use crate::encoding::{
    process_decode_io_result, read_i32, write_i32, BinaryDecodable, BinaryEncodable,
    DecodingOptions, EncodingResult, Error,
};
use crate::status_code::StatusCode;

/// An OPC UA string: UTF-8 bytes with an `i32` length prefix where `-1`
/// denotes the null string, which is distinct from the empty string.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct UAString {
    value: Option<String>,
}

impl UAString {
    /// The null string.
    pub fn null() -> Self {
        Self { value: None }
    }

    /// `true` if this is the null string.
    pub fn is_null(&self) -> bool {
        self.value.is_none()
    }

    /// `true` if this is null or has zero length.
    pub fn is_empty(&self) -> bool {
        self.value.as_ref().map(|v| v.is_empty()).unwrap_or(true)
    }

    /// Length in bytes, `-1` for null.
    pub fn len(&self) -> isize {
        self.value.as_ref().map(|v| v.len() as isize).unwrap_or(-1)
    }

    /// The inner value, if any.
    pub fn value(&self) -> Option<&str> {
        self.value.as_deref()
    }
}

impl AsRef<str> for UAString {
    fn as_ref(&self) -> &str {
        self.value.as_deref().unwrap_or("")
    }
}

impl From<&str> for UAString {
    fn from(value: &str) -> Self {
        Self {
            value: Some(value.to_string()),
        }
    }
}

impl From<String> for UAString {
    fn from(value: String) -> Self {
        Self { value: Some(value) }
    }
}

impl fmt::Display for UAString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.value {
            Some(value) => f.write_str(value),
            None => f.write_str("[null]"),
        }
    }
}

impl BinaryEncodable for UAString {
    fn byte_len(&self) -> usize {
        4 + self.value.as_ref().map(|v| v.len()).unwrap_or(0)
    }

    fn encode<S: Write + ?Sized>(&self, stream: &mut S) -> EncodingResult<()> {
        match &self.value {
            None => write_i32(stream, -1),
            Some(value) => {
                write_i32(stream, value.len() as i32)?;
                crate::encoding::process_encode_io_result(stream.write_all(value.as_bytes()))
            }
        }
    }
}

impl BinaryDecodable for UAString {
    fn decode<S: Read + ?Sized>(stream: &mut S, options: &DecodingOptions) -> EncodingResult<Self> {
        let len = read_i32(stream)?;
        if len < 0 {
            return Ok(UAString::null());
        }
        let len = len as usize;
        if options.max_string_length > 0 && len > options.max_string_length {
            return Err(Error::new(
                StatusCode::BadEncodingLimitsExceeded,
                format!(
                    "string length {} exceeds decoding limit {}",
                    len, options.max_string_length
                ),
            ));
        }
        let mut buf = vec![0u8; len];
        process_decode_io_result(stream.read_exact(&mut buf))?;
        let value = String::from_utf8(buf)
            .map_err(|_| Error::decoding("string contains invalid utf-8"))?;
        Ok(UAString { value: Some(value) })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn null_is_minus_one() {
        let mut buf = Vec::new();
        UAString::null().encode(&mut buf).unwrap();
        assert_eq!(buf, [0xff, 0xff, 0xff, 0xff]);
    }

    #[test]
    fn round_trip() {
        let s = UAString::from("opc.tcp://localhost:4840/");
        let mut buf = Vec::new();
        s.encode(&mut buf).unwrap();
        assert_eq!(buf.len(), s.byte_len());
        let decoded =
            UAString::decode(&mut Cursor::new(buf), &DecodingOptions::minimal()).unwrap();
        assert_eq!(decoded, s);
    }

    #[test]
    fn length_limit() {
        let s = UAString::from("a long enough string");
        let mut buf = Vec::new();
        s.encode(&mut buf).unwrap();
        let options = DecodingOptions {
            max_string_length: 4,
            ..Default::default()
        };
        let err = UAString::decode(&mut Cursor::new(buf), &options).unwrap_err();
        assert_eq!(err.status(), StatusCode::BadEncodingLimitsExceeded);
    }
}
