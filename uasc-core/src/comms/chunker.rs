// UASC for Rust
// SPDX-License-Identifier: MPL-2.0
// Copyright (C) 2026 UASC contributors

//! Splits outgoing messages into chunks and reassembles verified incoming
//! chunks, enforcing the negotiated size and count bounds and the sequence
//! number discipline.

use std::io::Cursor;

use tracing::{error, trace};

use uasc_types::{BinaryDecodable, BinaryEncodable, EncodingResult, Error, NodeId, StatusCode};

use crate::messages::DecodableMessage;

use super::message_chunk::{MessageChunk, MessageChunkType, MessageIsFinalType};
use super::message_chunk_info::ChunkInfo;
use super::secure_channel::{SecureChannel, MAX_SEQUENCE_NUMBER};

/// A message that can be chunked for transmission.
pub trait ChunkableMessage: BinaryEncodable {
    /// Which chunk type carries this message.
    fn chunk_type(&self) -> MessageChunkType;
}

impl ChunkableMessage for crate::messages::RequestMessage {
    fn chunk_type(&self) -> MessageChunkType {
        match self {
            crate::messages::RequestMessage::OpenSecureChannel(_) => {
                MessageChunkType::OpenSecureChannel
            }
            crate::messages::RequestMessage::CloseSecureChannel(_) => {
                MessageChunkType::CloseSecureChannel
            }
            crate::messages::RequestMessage::Service(_) => MessageChunkType::Message,
        }
    }
}

impl ChunkableMessage for crate::messages::ResponseMessage {
    fn chunk_type(&self) -> MessageChunkType {
        match self {
            crate::messages::ResponseMessage::OpenSecureChannel(_) => {
                MessageChunkType::OpenSecureChannel
            }
            _ => MessageChunkType::Message,
        }
    }
}

/// The sequence number following `sequence_number`, honoring the wrap.
pub fn next_sequence_number(sequence_number: u32) -> u32 {
    if sequence_number >= MAX_SEQUENCE_NUMBER {
        1
    } else {
        sequence_number + 1
    }
}

/// Chunk encoder / decoder.
pub struct Chunker;

impl Chunker {
    /// Validate that `chunks` form one message: a strictly incrementing
    /// sequence starting at `starting_sequence_number` (with wrap), one
    /// request id throughout, and a consistent channel id. Returns the last
    /// sequence number consumed.
    pub fn validate_chunks(
        starting_sequence_number: u32,
        secure_channel: &SecureChannel,
        chunks: &[MessageChunk],
    ) -> EncodingResult<u32> {
        let mut expected = starting_sequence_number;
        let mut request_id = None;
        let mut last = starting_sequence_number;

        for chunk in chunks {
            let info = ChunkInfo::new(chunk, secure_channel)?;
            let sequence_number = info.sequence_header.sequence_number;
            if sequence_number != expected {
                error!(
                    "Chunk sequence number {} but expected {}",
                    sequence_number, expected
                );
                return Err(Error::new(
                    StatusCode::BadSecurityChecksFailed,
                    "chunk sequence number is not contiguous",
                ));
            }
            match request_id {
                None => request_id = Some(info.sequence_header.request_id),
                Some(id) if id != info.sequence_header.request_id => {
                    error!(
                        "Chunk request id {} differs from the message's id {}",
                        info.sequence_header.request_id, id
                    );
                    return Err(Error::new(
                        StatusCode::BadSecurityChecksFailed,
                        "chunk request id changed mid-message",
                    ));
                }
                _ => {}
            }
            last = sequence_number;
            expected = next_sequence_number(sequence_number);
        }
        Ok(last)
    }

    /// Encode `message` into one or more cleartext chunks, starting at
    /// `sequence_number`. Bounds are enforced before any chunk is built.
    pub fn encode<T: ChunkableMessage>(
        sequence_number: u32,
        request_id: u32,
        max_message_size: usize,
        max_chunk_size: usize,
        max_chunk_count: usize,
        secure_channel: &SecureChannel,
        message: &T,
    ) -> EncodingResult<Vec<MessageChunk>> {
        let message_size = message.byte_len();
        if max_message_size > 0 && message_size > max_message_size {
            error!(
                "Message of {} bytes exceeds the negotiated maximum {}",
                message_size, max_message_size
            );
            return Err(Error::new(
                StatusCode::BadTcpMessageTooLarge,
                "message exceeds negotiated maximum size",
            ));
        }

        let message_type = message.chunk_type();
        let mut stream = Cursor::new(Vec::with_capacity(message_size));
        message.encode(&mut stream)?;
        let data = stream.into_inner();

        let body_per_chunk =
            MessageChunk::body_size_from_message_size(message_type, secure_channel, max_chunk_size)?;
        if body_per_chunk == 0 {
            return Err(Error::new(
                StatusCode::BadTcpMessageTooLarge,
                "negotiated chunk size cannot fit a single body byte",
            ));
        }
        let chunk_count = data.len().div_ceil(body_per_chunk).max(1);
        if max_chunk_count > 0 && chunk_count > max_chunk_count {
            error!(
                "Message would need {} chunks but the negotiated maximum is {}",
                chunk_count, max_chunk_count
            );
            return Err(Error::new(
                StatusCode::BadTcpMessageTooLarge,
                "message exceeds negotiated chunk count",
            ));
        }
        trace!("Chunking a {} byte message into {} chunks", data.len(), chunk_count);

        let mut chunks = Vec::with_capacity(chunk_count);
        let mut sequence_number = sequence_number;
        for (index, body) in data.chunks(body_per_chunk).enumerate() {
            let is_final = if index + 1 == chunk_count {
                MessageIsFinalType::Final
            } else {
                MessageIsFinalType::Intermediate
            };
            chunks.push(MessageChunk::new(
                sequence_number,
                request_id,
                message_type,
                is_final,
                secure_channel,
                body,
            )?);
            sequence_number = next_sequence_number(sequence_number);
        }
        Ok(chunks)
    }

    /// Reassemble cleartext chunks into a message. The chunks must already
    /// be validated with [`Chunker::validate_chunks`].
    pub fn decode<T: DecodableMessage>(
        chunks: &[MessageChunk],
        secure_channel: &SecureChannel,
    ) -> EncodingResult<T> {
        let options = secure_channel.decoding_options();
        let mut data = Vec::new();
        for chunk in chunks {
            let info = ChunkInfo::new(chunk, secure_channel)?;
            data.extend_from_slice(&chunk.data[info.body_offset..]);
            if options.max_message_size > 0 && data.len() > options.max_message_size {
                error!(
                    "Reassembled message exceeds the negotiated maximum {}",
                    options.max_message_size
                );
                return Err(Error::new(
                    StatusCode::BadTcpMessageTooLarge,
                    "reassembled message exceeds negotiated maximum size",
                ));
            }
        }

        let mut stream = Cursor::new(&data[..]);
        let object_id = NodeId::decode(&mut stream, options)?;
        T::decode_by_object_id(&mut stream, object_id, options)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sequence_number_wraps_to_one() {
        assert_eq!(next_sequence_number(1), 2);
        assert_eq!(next_sequence_number(MAX_SEQUENCE_NUMBER - 1), MAX_SEQUENCE_NUMBER);
        assert_eq!(next_sequence_number(MAX_SEQUENCE_NUMBER), 1);
    }
}
