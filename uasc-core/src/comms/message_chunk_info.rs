// UASC for Rust
// SPDX-License-Identifier: MPL-2.0
// Copyright (C) 2026 UASC contributors

//! Decoded view of one cleartext chunk: its headers and where the body
//! starts.

use std::io::Cursor;

use uasc_types::{BinaryDecodable, EncodingResult, Error, StatusCode};

use super::message_chunk::{MessageChunk, MessageChunkHeader};
use super::secure_channel::SecureChannel;
use super::security_header::{SecurityHeader, SequenceHeader};

/// Headers and offsets of a cleartext chunk.
#[derive(Debug, Clone)]
pub struct ChunkInfo {
    /// The chunk header.
    pub message_header: MessageChunkHeader,
    /// The asymmetric or symmetric security header.
    pub security_header: SecurityHeader,
    /// The sequence header.
    pub sequence_header: SequenceHeader,
    /// Offset of the message body within the chunk data.
    pub body_offset: usize,
    /// Length of the message body.
    pub body_length: usize,
}

impl ChunkInfo {
    /// Decode the headers of `chunk`, which must already be cleartext.
    pub fn new(chunk: &MessageChunk, secure_channel: &SecureChannel) -> EncodingResult<ChunkInfo> {
        let options = secure_channel.decoding_options();
        let mut stream = Cursor::new(&chunk.data);

        let message_header = MessageChunkHeader::decode(&mut stream, options)?;
        let security_header = SecurityHeader::decode_from_stream(
            &mut stream,
            message_header.message_type.is_open_secure_channel(),
            options,
        )?;

        if let SecurityHeader::Asymmetric(security_header) = &security_header {
            if security_header.security_policy_uri.is_empty() {
                return Err(Error::new(
                    StatusCode::BadSecurityPolicyRejected,
                    "open secure channel chunk names no security policy",
                ));
            }
        }

        let sequence_header = SequenceHeader::decode(&mut stream, options)?;
        let body_offset = stream.position() as usize;
        if chunk.data.len() < body_offset {
            return Err(Error::decoding("chunk is shorter than its headers"));
        }
        let body_length = chunk.data.len() - body_offset;

        Ok(ChunkInfo {
            message_header,
            security_header,
            sequence_header,
            body_offset,
            body_length,
        })
    }
}
