// UASC for Rust
// SPDX-License-Identifier: MPL-2.0
// Copyright (C) 2026 UASC contributors

//! Binary encoding traits, the codec error type, and the little-endian
//! read/write helpers every built-in type is written in terms of.

use std::io::{Read, Write};

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};

use crate::status_code::StatusCode;

/// Result of any encode or decode operation.
pub type EncodingResult<T> = std::result::Result<T, Error>;

/// Codec-level error: a status code plus enough context to log.
///
/// Converting to a bare [`StatusCode`] drops the context, which is what
/// happens when an error crosses the wire - the peer only ever sees the code.
#[derive(Debug, Clone, thiserror::Error)]
#[error("{status}: {context}")]
pub struct Error {
    status: StatusCode,
    context: String,
}

impl Error {
    /// Create an error with an explicit status code.
    pub fn new(status: StatusCode, context: impl Into<String>) -> Self {
        Self {
            status,
            context: context.into(),
        }
    }

    /// Create a `BadDecodingError`.
    pub fn decoding(context: impl Into<String>) -> Self {
        Self::new(StatusCode::BadDecodingError, context)
    }

    /// Create a `BadEncodingError`.
    pub fn encoding(context: impl Into<String>) -> Self {
        Self::new(StatusCode::BadEncodingError, context)
    }

    /// The status code carried by this error.
    pub fn status(&self) -> StatusCode {
        self.status
    }
}

impl From<StatusCode> for Error {
    fn from(status: StatusCode) -> Self {
        Self::new(status, status.name())
    }
}

impl From<Error> for StatusCode {
    fn from(e: Error) -> Self {
        e.status
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Self::new(
            StatusCode::BadCommunicationError,
            format!("i/o error: {e}"),
        )
    }
}

/// Decoding limits and context, carried per endpoint.
///
/// A limit of zero means no limit was negotiated for that dimension.
#[derive(Debug, Clone)]
pub struct DecodingOptions {
    /// Maximum size of a reassembled message in bytes.
    pub max_message_size: usize,
    /// Maximum number of chunks in one message.
    pub max_chunk_count: usize,
    /// Maximum length of a decoded string in bytes.
    pub max_string_length: usize,
    /// Maximum length of a decoded byte string.
    pub max_byte_string_length: usize,
    /// Maximum number of elements in a decoded array.
    pub max_array_length: usize,
    /// Offset applied to decoded timestamps to compensate clock skew
    /// between the two ends of a channel.
    pub client_offset: chrono::Duration,
}

impl Default for DecodingOptions {
    fn default() -> Self {
        Self {
            max_message_size: 2 * 1024 * 1024,
            max_chunk_count: 64,
            max_string_length: 65_535,
            max_byte_string_length: 65_535,
            max_array_length: 65_535,
            client_offset: chrono::Duration::zero(),
        }
    }
}

impl DecodingOptions {
    /// For tests and trivial decoding work where limits don't matter.
    pub fn minimal() -> Self {
        Self::default()
    }

    /// This decoding options with the client offset zeroed.
    pub fn with_zero_offset(&self) -> Self {
        Self {
            client_offset: chrono::Duration::zero(),
            ..self.clone()
        }
    }
}

/// A type that can be serialized to the OPC UA binary encoding.
pub trait BinaryEncodable {
    /// Number of bytes `encode` will write.
    fn byte_len(&self) -> usize;
    /// Write the value to the stream.
    fn encode<S: Write + ?Sized>(&self, stream: &mut S) -> EncodingResult<()>;
}

/// A type that can be deserialized from the OPC UA binary encoding.
pub trait BinaryDecodable: Sized {
    /// Read a value from the stream, honoring the limits in `options`.
    fn decode<S: Read + ?Sized>(stream: &mut S, options: &DecodingOptions) -> EncodingResult<Self>;
}

/// Converts an io write result to an `EncodingResult`.
pub fn process_encode_io_result(result: std::io::Result<()>) -> EncodingResult<()> {
    result.map_err(|e| Error::encoding(format!("i/o error while encoding: {e}")))
}

/// Converts an io read result to an `EncodingResult`.
pub fn process_decode_io_result(result: std::io::Result<()>) -> EncodingResult<()> {
    result.map_err(|e| Error::decoding(format!("i/o error while decoding: {e}")))
}

macro_rules! rw_fns {
    ($read_fn:ident, $write_fn:ident, $ty:ty, $read_call:ident, $write_call:ident) => {
        /// Read one value from the stream.
        pub fn $read_fn<S: Read + ?Sized>(stream: &mut S) -> EncodingResult<$ty> {
            stream
                .$read_call::<LittleEndian>()
                .map_err(|e| Error::decoding(format!("i/o error while decoding: {e}")))
        }

        /// Write one value to the stream.
        pub fn $write_fn<S: Write + ?Sized>(stream: &mut S, value: $ty) -> EncodingResult<()> {
            process_encode_io_result(stream.$write_call::<LittleEndian>(value))
        }
    };
}

rw_fns!(read_u16, write_u16, u16, read_u16, write_u16);
rw_fns!(read_i16, write_i16, i16, read_i16, write_i16);
rw_fns!(read_u32, write_u32, u32, read_u32, write_u32);
rw_fns!(read_i32, write_i32, i32, read_i32, write_i32);
rw_fns!(read_u64, write_u64, u64, read_u64, write_u64);
rw_fns!(read_i64, write_i64, i64, read_i64, write_i64);

/// Read one byte from the stream.
pub fn read_u8<S: Read + ?Sized>(stream: &mut S) -> EncodingResult<u8> {
    stream
        .read_u8()
        .map_err(|e| Error::decoding(format!("i/o error while decoding: {e}")))
}

/// Write one byte to the stream.
pub fn write_u8<S: Write + ?Sized>(stream: &mut S, value: u8) -> EncodingResult<()> {
    process_encode_io_result(stream.write_u8(value))
}

/// Read one signed byte from the stream.
pub fn read_i8<S: Read + ?Sized>(stream: &mut S) -> EncodingResult<i8> {
    stream
        .read_i8()
        .map_err(|e| Error::decoding(format!("i/o error while decoding: {e}")))
}

/// Write one signed byte to the stream.
pub fn write_i8<S: Write + ?Sized>(stream: &mut S, value: i8) -> EncodingResult<()> {
    process_encode_io_result(stream.write_i8(value))
}

impl BinaryEncodable for bool {
    fn byte_len(&self) -> usize {
        1
    }
    fn encode<S: Write + ?Sized>(&self, stream: &mut S) -> EncodingResult<()> {
        write_u8(stream, u8::from(*self))
    }
}

impl BinaryDecodable for bool {
    fn decode<S: Read + ?Sized>(stream: &mut S, _: &DecodingOptions) -> EncodingResult<Self> {
        Ok(read_u8(stream)? == 1)
    }
}

macro_rules! scalar_codec {
    ($ty:ty, $len:expr, $read_fn:ident, $write_fn:ident) => {
        impl BinaryEncodable for $ty {
            fn byte_len(&self) -> usize {
                $len
            }
            fn encode<S: Write + ?Sized>(&self, stream: &mut S) -> EncodingResult<()> {
                $write_fn(stream, *self)
            }
        }
        impl BinaryDecodable for $ty {
            fn decode<S: Read + ?Sized>(
                stream: &mut S,
                _: &DecodingOptions,
            ) -> EncodingResult<Self> {
                $read_fn(stream)
            }
        }
    };
}

scalar_codec!(u8, 1, read_u8, write_u8);
scalar_codec!(i8, 1, read_i8, write_i8);
scalar_codec!(u16, 2, read_u16, write_u16);
scalar_codec!(i16, 2, read_i16, write_i16);
scalar_codec!(u32, 4, read_u32, write_u32);
scalar_codec!(i32, 4, read_i32, write_i32);
scalar_codec!(u64, 8, read_u64, write_u64);
scalar_codec!(i64, 8, read_i64, write_i64);

impl BinaryEncodable for f32 {
    fn byte_len(&self) -> usize {
        4
    }
    fn encode<S: Write + ?Sized>(&self, stream: &mut S) -> EncodingResult<()> {
        process_encode_io_result(stream.write_f32::<LittleEndian>(*self))
    }
}

impl BinaryDecodable for f32 {
    fn decode<S: Read + ?Sized>(stream: &mut S, _: &DecodingOptions) -> EncodingResult<Self> {
        stream
            .read_f32::<LittleEndian>()
            .map_err(|e| Error::decoding(format!("i/o error while decoding: {e}")))
    }
}

impl BinaryEncodable for f64 {
    fn byte_len(&self) -> usize {
        8
    }
    fn encode<S: Write + ?Sized>(&self, stream: &mut S) -> EncodingResult<()> {
        process_encode_io_result(stream.write_f64::<LittleEndian>(*self))
    }
}

impl BinaryDecodable for f64 {
    fn decode<S: Read + ?Sized>(stream: &mut S, _: &DecodingOptions) -> EncodingResult<Self> {
        stream
            .read_f64::<LittleEndian>()
            .map_err(|e| Error::decoding(format!("i/o error while decoding: {e}")))
    }
}

/// Byte length of an optional array with the standard `i32` length prefix.
pub fn array_byte_len<T: BinaryEncodable>(values: &Option<Vec<T>>) -> usize {
    4 + values
        .as_ref()
        .map(|v| v.iter().map(|x| x.byte_len()).sum())
        .unwrap_or(0)
}

/// Write an optional array with the standard `i32` length prefix, `-1` for null.
pub fn write_array<S: Write + ?Sized, T: BinaryEncodable>(
    stream: &mut S,
    values: &Option<Vec<T>>,
) -> EncodingResult<()> {
    match values {
        None => write_i32(stream, -1),
        Some(values) => {
            write_i32(stream, values.len() as i32)?;
            for value in values {
                value.encode(stream)?;
            }
            Ok(())
        }
    }
}

/// Read an optional array with the standard `i32` length prefix.
pub fn read_array<S: Read + ?Sized, T: BinaryDecodable>(
    stream: &mut S,
    options: &DecodingOptions,
) -> EncodingResult<Option<Vec<T>>> {
    let len = read_i32(stream)?;
    if len < 0 {
        return Ok(None);
    }
    let len = len as usize;
    if options.max_array_length > 0 && len > options.max_array_length {
        return Err(Error::new(
            StatusCode::BadEncodingLimitsExceeded,
            format!(
                "array length {} exceeds decoding limit {}",
                len, options.max_array_length
            ),
        ));
    }
    let mut values = Vec::with_capacity(len);
    for _ in 0..len {
        values.push(T::decode(stream, options)?);
    }
    Ok(Some(values))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn scalars_are_little_endian() {
        let mut buf = Vec::new();
        0x0102_0304u32.encode(&mut buf).unwrap();
        assert_eq!(buf, [0x04, 0x03, 0x02, 0x01]);

        let mut stream = Cursor::new(buf);
        let v = u32::decode(&mut stream, &DecodingOptions::minimal()).unwrap();
        assert_eq!(v, 0x0102_0304);
    }

    #[test]
    fn array_null_and_roundtrip() {
        let mut buf = Vec::new();
        write_array::<_, u32>(&mut buf, &None).unwrap();
        assert_eq!(buf, [0xff, 0xff, 0xff, 0xff]);

        let mut buf = Vec::new();
        write_array(&mut buf, &Some(vec![1u16, 2, 3])).unwrap();
        let mut stream = Cursor::new(buf);
        let v: Option<Vec<u16>> = read_array(&mut stream, &DecodingOptions::minimal()).unwrap();
        assert_eq!(v, Some(vec![1, 2, 3]));
    }

    #[test]
    fn array_limit_is_enforced() {
        let mut buf = Vec::new();
        write_i32(&mut buf, 1_000_000).unwrap();
        let mut stream = Cursor::new(buf);
        let options = DecodingOptions {
            max_array_length: 16,
            ..Default::default()
        };
        let err = read_array::<_, u8>(&mut stream, &options).unwrap_err();
        assert_eq!(err.status(), StatusCode::BadEncodingLimitsExceeded);
    }
}
