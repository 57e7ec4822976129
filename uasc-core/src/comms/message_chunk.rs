// UASC for Rust
// SPDX-License-Identifier: MPL-2.0
// Copyright (C) 2026 UASC contributors

//! A message chunk is a message or a portion of a message, optionally
//! encrypted & signed, which has been split for transmission.

use std::io::{Cursor, Read, Write};

use tracing::error;

use uasc_types::{
    process_decode_io_result, read_u32, read_u8, write_u32, write_u8, BinaryDecodable,
    BinaryEncodable, DecodingOptions, EncodingResult, Error, StatusCode,
};

use super::secure_channel::SecureChannel;
use super::security_header::{SecurityHeader, SequenceHeader};
use super::tcp_types::{
    CHUNK_FINAL, CHUNK_FINAL_ERROR, CHUNK_INTERMEDIATE, CHUNK_MESSAGE,
    CLOSE_SECURE_CHANNEL_MESSAGE, MIN_CHUNK_SIZE, OPEN_SECURE_CHANNEL_MESSAGE,
};

/// The size of a chunk header: type, final flag, size, secure channel id.
pub const MESSAGE_CHUNK_HEADER_SIZE: usize = 3 + 1 + 4 + 4;
/// Offset of the message size within a chunk header.
pub const MESSAGE_SIZE_OFFSET: usize = 3 + 1;

/// Type of message chunk.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MessageChunkType {
    /// Chunk is part of a normal service message.
    Message,
    /// Chunk is an open secure channel message.
    OpenSecureChannel,
    /// Chunk is a close secure channel message.
    CloseSecureChannel,
}

impl MessageChunkType {
    /// `true` if this is an `OpenSecureChannel` message.
    pub fn is_open_secure_channel(&self) -> bool {
        *self == MessageChunkType::OpenSecureChannel
    }
}

/// Whether a chunk ends its message, continues it, or aborts it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MessageIsFinalType {
    /// More chunks follow.
    Intermediate,
    /// Final chunk of the message.
    Final,
    /// The sender aborted the message; the body carries a status and reason.
    FinalError,
}

/// Message chunk header.
#[derive(Debug, Clone, PartialEq)]
pub struct MessageChunkHeader {
    /// The kind of chunk - message, open or close.
    pub message_type: MessageChunkType,
    /// `C` intermediate, `F` final, `A` final-with-abort.
    pub is_final: MessageIsFinalType,
    /// The size of the whole chunk including this header.
    pub message_size: u32,
    /// Secure channel id.
    pub secure_channel_id: u32,
}

impl BinaryEncodable for MessageChunkHeader {
    fn byte_len(&self) -> usize {
        MESSAGE_CHUNK_HEADER_SIZE
    }

    fn encode<S: Write + ?Sized>(&self, stream: &mut S) -> EncodingResult<()> {
        let message_type = match self.message_type {
            MessageChunkType::Message => CHUNK_MESSAGE,
            MessageChunkType::OpenSecureChannel => OPEN_SECURE_CHANNEL_MESSAGE,
            MessageChunkType::CloseSecureChannel => CLOSE_SECURE_CHANNEL_MESSAGE,
        };
        let is_final = match self.is_final {
            MessageIsFinalType::Intermediate => CHUNK_INTERMEDIATE,
            MessageIsFinalType::Final => CHUNK_FINAL,
            MessageIsFinalType::FinalError => CHUNK_FINAL_ERROR,
        };
        uasc_types::process_encode_io_result(stream.write_all(message_type))?;
        write_u8(stream, is_final)?;
        write_u32(stream, self.message_size)?;
        write_u32(stream, self.secure_channel_id)
    }
}

impl BinaryDecodable for MessageChunkHeader {
    fn decode<S: Read + ?Sized>(stream: &mut S, _: &DecodingOptions) -> EncodingResult<Self> {
        let mut message_type_code = [0u8; 3];
        process_decode_io_result(stream.read_exact(&mut message_type_code))?;
        let message_type = match &message_type_code as &[u8] {
            CHUNK_MESSAGE => MessageChunkType::Message,
            OPEN_SECURE_CHANNEL_MESSAGE => MessageChunkType::OpenSecureChannel,
            CLOSE_SECURE_CHANNEL_MESSAGE => MessageChunkType::CloseSecureChannel,
            r => {
                return Err(Error::new(
                    StatusCode::BadTcpMessageTypeInvalid,
                    format!("invalid message chunk type: {r:?}"),
                ));
            }
        };

        let chunk_type_code = read_u8(stream)?;
        let is_final = match chunk_type_code {
            CHUNK_FINAL => MessageIsFinalType::Final,
            CHUNK_INTERMEDIATE => MessageIsFinalType::Intermediate,
            CHUNK_FINAL_ERROR => MessageIsFinalType::FinalError,
            r => {
                return Err(Error::new(
                    StatusCode::BadTcpMessageTypeInvalid,
                    format!("invalid message final type: {r}"),
                ));
            }
        };

        Ok(MessageChunkHeader {
            message_type,
            is_final,
            message_size: read_u32(stream)?,
            secure_channel_id: read_u32(stream)?,
        })
    }
}

/// A chunk holds a message or a portion of a message. The data may be signed
/// and encrypted; extracting the message requires all chunks in sequence.
#[derive(Debug, Clone, PartialEq)]
pub struct MessageChunk {
    /// All of the chunk's data including headers, payload, padding and
    /// signature.
    pub data: Vec<u8>,
}

impl BinaryEncodable for MessageChunk {
    fn byte_len(&self) -> usize {
        self.data.len()
    }

    fn encode<S: Write + ?Sized>(&self, stream: &mut S) -> EncodingResult<()> {
        uasc_types::process_encode_io_result(stream.write_all(&self.data))
    }
}

impl BinaryDecodable for MessageChunk {
    fn decode<S: Read + ?Sized>(
        in_stream: &mut S,
        options: &DecodingOptions,
    ) -> EncodingResult<Self> {
        let chunk_header = MessageChunkHeader::decode(in_stream, options)?;

        let message_size = chunk_header.message_size as usize;
        if message_size < MESSAGE_CHUNK_HEADER_SIZE {
            return Err(Error::decoding(format!(
                "chunk size {message_size} is shorter than its own header"
            )));
        }
        if options.max_message_size > 0 && message_size > options.max_message_size {
            return Err(Error::new(
                StatusCode::BadTcpMessageTooLarge,
                format!(
                    "chunk size {} exceeds maximum message size {}",
                    message_size, options.max_message_size
                ),
            ));
        }

        // Write the header back into a buffer, then read the remainder of
        // the chunk into it.
        let data = vec![0u8; message_size];
        let mut stream = Cursor::new(data);
        chunk_header.encode(&mut stream)?;
        let mut data = stream.into_inner();
        process_decode_io_result(in_stream.read_exact(&mut data[MESSAGE_CHUNK_HEADER_SIZE..]))?;

        Ok(MessageChunk { data })
    }
}

impl MessageChunk {
    /// Build an unprotected chunk: headers plus cleartext body. Protection
    /// is applied by the secure channel before the chunk hits the wire.
    pub fn new(
        sequence_number: u32,
        request_id: u32,
        message_type: MessageChunkType,
        is_final: MessageIsFinalType,
        secure_channel: &SecureChannel,
        data: &[u8],
    ) -> EncodingResult<MessageChunk> {
        let security_header = secure_channel.make_security_header(message_type);
        let sequence_header = SequenceHeader {
            sequence_number,
            request_id,
        };

        let message_size = MESSAGE_CHUNK_HEADER_SIZE
            + security_header.byte_len()
            + sequence_header.byte_len()
            + data.len();

        let chunk_header = MessageChunkHeader {
            message_type,
            is_final,
            message_size: message_size as u32,
            secure_channel_id: secure_channel.secure_channel_id(),
        };

        let mut stream = Cursor::new(vec![0u8; message_size]);
        chunk_header.encode(&mut stream)?;
        security_header.encode(&mut stream)?;
        sequence_header.encode(&mut stream)?;
        uasc_types::process_encode_io_result(stream.write_all(data))?;

        Ok(MessageChunk {
            data: stream.into_inner(),
        })
    }

    /// The largest cleartext body that fits in a chunk of `max_chunk_size`
    /// bytes once headers, signature and worst-case padding are accounted
    /// for.
    pub fn body_size_from_message_size(
        message_type: MessageChunkType,
        secure_channel: &SecureChannel,
        max_chunk_size: usize,
    ) -> EncodingResult<usize> {
        if max_chunk_size < MIN_CHUNK_SIZE {
            error!(
                "chunk size {} is less than the minimum allowed by the spec",
                max_chunk_size
            );
            return Err(Error::new(
                StatusCode::BadTcpMessageTooLarge,
                "max chunk size below protocol floor",
            ));
        }

        let security_header = secure_channel.make_security_header(message_type);
        let sequence_header_size = SequenceHeader::default().byte_len();
        let base = MESSAGE_CHUNK_HEADER_SIZE + security_header.byte_len();
        let signature_size = secure_channel.signature_size(&security_header);

        let too_small = || {
            Error::new(
                StatusCode::BadTcpMessageTooLarge,
                "negotiated chunk size cannot fit a single body byte",
            )
        };

        if message_type.is_open_secure_channel() {
            if let Some((plain_block, cipher_block)) = secure_channel.asymmetric_block_sizes() {
                // RSA expands every plaintext block to a full key-size
                // block; budget in plaintext terms what the expanded chunk
                // may occupy, with one spare block for padding growth.
                let minimum_padding = if plain_block > 256 { 2 } else { 1 };
                let blocks = max_chunk_size.checked_sub(base).ok_or_else(too_small)? / cipher_block;
                return (blocks * plain_block)
                    .checked_sub(
                        sequence_header_size + signature_size + minimum_padding + plain_block,
                    )
                    .ok_or_else(too_small);
            }
        }

        let (plain_text_block_size, minimum_padding) =
            secure_channel.padding_block_sizes(&security_header, message_type);
        if plain_text_block_size > 1 {
            // The encrypted region must be a whole number of cipher blocks;
            // round down and keep one block spare for padding growth.
            let usable = max_chunk_size
                .checked_sub(base + signature_size)
                .ok_or_else(too_small)?;
            let aligned = usable - (usable % plain_text_block_size);
            aligned
                .checked_sub(sequence_header_size + minimum_padding + plain_text_block_size)
                .ok_or_else(too_small)
        } else {
            max_chunk_size
                .checked_sub(base + sequence_header_size + signature_size + minimum_padding)
                .ok_or_else(too_small)
        }
    }

    /// Decode the chunk header from the inner data.
    pub fn message_header(&self, options: &DecodingOptions) -> EncodingResult<MessageChunkHeader> {
        MessageChunkHeader::decode(&mut Cursor::new(&self.data), options)
    }

    /// Check if this chunk belongs to an OpenSecureChannel message.
    pub fn is_open_secure_channel(&self, options: &DecodingOptions) -> bool {
        self.message_header(options)
            .map(|h| h.message_type.is_open_secure_channel())
            .unwrap_or(false)
    }

    /// Offset of the sequence header, i.e. where encryption begins.
    pub(crate) fn encrypted_data_offset(
        &self,
        options: &DecodingOptions,
    ) -> EncodingResult<usize> {
        let mut stream = Cursor::new(&self.data);
        let message_header = MessageChunkHeader::decode(&mut stream, options)?;
        SecurityHeader::decode_from_stream(
            &mut stream,
            message_header.message_type.is_open_secure_channel(),
            options,
        )?;
        Ok(stream.position() as usize)
    }
}

/// Patch the size field of an already encoded chunk, used after protection
/// changes its length.
pub(crate) fn update_message_size(data: &mut [u8]) -> EncodingResult<()> {
    if data.len() < MESSAGE_CHUNK_HEADER_SIZE {
        return Err(Error::encoding("chunk too small to carry a header"));
    }
    let size = (data.len() as u32).to_le_bytes();
    data[MESSAGE_SIZE_OFFSET..MESSAGE_SIZE_OFFSET + 4].copy_from_slice(&size);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn header_round_trip() {
        let header = MessageChunkHeader {
            message_type: MessageChunkType::Message,
            is_final: MessageIsFinalType::Intermediate,
            message_size: 64,
            secure_channel_id: 7,
        };
        let mut buf = Vec::new();
        header.encode(&mut buf).unwrap();
        assert_eq!(&buf[0..3], CHUNK_MESSAGE);
        assert_eq!(buf[3], CHUNK_INTERMEDIATE);
        let decoded =
            MessageChunkHeader::decode(&mut Cursor::new(buf), &DecodingOptions::minimal())
                .unwrap();
        assert_eq!(decoded, header);
    }

    #[test]
    fn oversize_chunk_is_rejected() {
        let header = MessageChunkHeader {
            message_type: MessageChunkType::Message,
            is_final: MessageIsFinalType::Final,
            message_size: 1_000_000,
            secure_channel_id: 1,
        };
        let mut buf = Vec::new();
        header.encode(&mut buf).unwrap();
        buf.resize(1_000_000, 0);

        let options = DecodingOptions {
            max_message_size: 65_535,
            ..Default::default()
        };
        let err = MessageChunk::decode(&mut Cursor::new(buf), &options).unwrap_err();
        assert_eq!(err.status(), StatusCode::BadTcpMessageTooLarge);
    }

    #[test]
    fn size_patching() {
        let mut data = vec![0u8; 32];
        data[0..3].copy_from_slice(CHUNK_MESSAGE);
        data[3] = CHUNK_FINAL;
        update_message_size(&mut data).unwrap();
        assert_eq!(&data[4..8], &32u32.to_le_bytes());
    }
}
