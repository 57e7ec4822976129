// UASC for Rust
// SPDX-License-Identifier: MPL-2.0
// Copyright (C) 2026 UASC contributors

//! Turns outgoing messages into protected wire chunks, owning the send-side
//! sequence number.

use tracing::trace;

use uasc_types::EncodingResult;

use super::chunker::{next_sequence_number, ChunkableMessage, Chunker};
use super::message_chunk::MessageChunk;
use super::secure_channel::SecureChannel;

/// Send-side chunking state: negotiated limits plus the last sequence number
/// put on the wire.
#[derive(Debug)]
pub struct MessageWriter {
    last_sequence_number: u32,
    send_buffer_size: usize,
    max_message_size: usize,
    max_chunk_count: usize,
}

impl MessageWriter {
    /// A writer for the given negotiated limits.
    pub fn new(send_buffer_size: usize, max_message_size: usize, max_chunk_count: usize) -> Self {
        Self {
            last_sequence_number: 0,
            send_buffer_size,
            max_message_size,
            max_chunk_count,
        }
    }

    /// The sequence number of the last chunk written.
    pub fn last_sequence_number(&self) -> u32 {
        self.last_sequence_number
    }

    /// Chunk `message` and apply channel protection to every chunk,
    /// returning the wire-ready chunks. Fails before producing anything if
    /// the message violates a negotiated bound.
    pub fn prepare_message<T: ChunkableMessage>(
        &mut self,
        request_id: u32,
        message: &T,
        secure_channel: &SecureChannel,
    ) -> EncodingResult<Vec<MessageChunk>> {
        let starting = next_sequence_number(self.last_sequence_number);
        let chunks = Chunker::encode(
            starting,
            request_id,
            self.max_message_size,
            self.send_buffer_size,
            self.max_chunk_count,
            secure_channel,
            message,
        )?;

        let mut out = Vec::with_capacity(chunks.len());
        for (index, chunk) in chunks.iter().enumerate() {
            out.push(MessageChunk {
                data: secure_channel.apply_security(chunk, index as u32)?,
            });
        }

        // Only commit the sequence numbers once protection succeeded.
        let mut last = self.last_sequence_number;
        for _ in 0..out.len() {
            last = next_sequence_number(last);
        }
        trace!(
            "Prepared request {} as {} chunks, sequence numbers up to {}",
            request_id,
            out.len(),
            last
        );
        self.last_sequence_number = last;
        Ok(out)
    }
}
