// UASC for Rust
// SPDX-License-Identifier: MPL-2.0
// Copyright (C) 2026 UASC contributors

//! Receive-side reassembly: verified cleartext chunks accumulate here until
//! a final or abort chunk closes the message.

use std::io::Cursor;

use tracing::{debug, error};

use uasc_types::{read_u32, BinaryDecodable, EncodingResult, Error, StatusCode, UAString};

use crate::messages::DecodableMessage;

use super::chunker::{next_sequence_number, Chunker};
use super::message_chunk::{MessageChunk, MessageIsFinalType};
use super::message_chunk_info::ChunkInfo;
use super::secure_channel::SecureChannel;

/// Outcome of feeding one chunk to the receiver.
#[derive(Debug)]
pub enum ReceivedMessage<T> {
    /// The message is not complete yet.
    Pending,
    /// A complete message was reassembled.
    Message {
        /// Request id every chunk of the message carried.
        request_id: u32,
        /// Headers of the first chunk, carrying the security header.
        chunk_info: ChunkInfo,
        /// The decoded message.
        message: T,
    },
    /// The sender aborted the message; the partial reassembly was dropped
    /// and the channel stays up.
    Abort {
        /// Request id of the aborted message.
        request_id: u32,
        /// Status the sender supplied.
        status: StatusCode,
        /// Human readable reason.
        reason: UAString,
    },
    /// The message reassembled and verified but its body did not decode.
    /// Local to the one request; the channel stays up.
    DecodeFailure {
        /// Request id of the undecodable message.
        request_id: u32,
        /// The decoding status.
        status: StatusCode,
    },
}

/// Reassembles one message at a time from verified chunks.
#[derive(Debug)]
pub struct MessageReceiver {
    chunks: Vec<MessageChunk>,
    accumulated_bytes: usize,
    last_received_sequence_number: u32,
}

impl MessageReceiver {
    /// A receiver with no chunks pending.
    pub fn new() -> Self {
        Self {
            chunks: Vec::new(),
            accumulated_bytes: 0,
            last_received_sequence_number: 0,
        }
    }

    /// Number of chunks of the in-progress message.
    pub fn pending_chunks(&self) -> usize {
        self.chunks.len()
    }

    /// Drop any partial message, e.g. on channel teardown.
    pub fn clear(&mut self) {
        self.chunks.clear();
        self.accumulated_bytes = 0;
    }

    /// Feed one protected chunk. Verification, decryption, bounds and
    /// sequence checks all happen here; any error is fatal to the channel.
    pub fn push_chunk<T: DecodableMessage>(
        &mut self,
        data: &[u8],
        secure_channel: &mut SecureChannel,
    ) -> EncodingResult<ReceivedMessage<T>> {
        let options = secure_channel.decoding_options().clone();

        let chunk_index = self.chunks.len() as u32;
        if options.max_chunk_count > 0 && self.chunks.len() + 1 > options.max_chunk_count {
            error!(
                "Message exceeds the negotiated chunk count {}",
                options.max_chunk_count
            );
            return Err(Error::new(
                StatusCode::BadTcpMessageTooLarge,
                "message exceeds negotiated chunk count",
            ));
        }

        let chunk = secure_channel.verify_and_remove_security(data, chunk_index)?;
        self.accumulated_bytes += chunk.data.len();
        if options.max_message_size > 0 && self.accumulated_bytes > options.max_message_size {
            error!(
                "Message exceeds the negotiated message size {}",
                options.max_message_size
            );
            return Err(Error::new(
                StatusCode::BadTcpMessageTooLarge,
                "message exceeds negotiated maximum size",
            ));
        }

        let info = ChunkInfo::new(&chunk, secure_channel)?;
        match info.message_header.is_final {
            MessageIsFinalType::Intermediate => {
                self.chunks.push(chunk);
                Ok(ReceivedMessage::Pending)
            }
            MessageIsFinalType::FinalError => {
                debug!("Received an abort chunk, dropping the partial message");
                let abort = Self::decode_abort_body(&chunk, &info)?;
                self.clear();
                // The abort chunk still consumes its sequence number.
                self.last_received_sequence_number = info.sequence_header.sequence_number;
                Ok(abort)
            }
            MessageIsFinalType::Final => {
                self.chunks.push(chunk);
                let starting = next_sequence_number(self.last_received_sequence_number);
                self.last_received_sequence_number =
                    Chunker::validate_chunks(starting, secure_channel, &self.chunks)?;

                let chunk_info = ChunkInfo::new(&self.chunks[0], secure_channel)?;
                let request_id = chunk_info.sequence_header.request_id;
                let message = match Chunker::decode(&self.chunks, secure_channel) {
                    Ok(message) => message,
                    // A body that does not decode fails only its own
                    // request; anything else is a protocol violation.
                    Err(e) if e.status() == StatusCode::BadDecodingError => {
                        error!("Message body of request {request_id} does not decode: {e}");
                        self.clear();
                        return Ok(ReceivedMessage::DecodeFailure {
                            request_id,
                            status: StatusCode::BadDecodingError,
                        });
                    }
                    Err(e) => return Err(e),
                };
                self.clear();
                Ok(ReceivedMessage::Message {
                    request_id,
                    chunk_info,
                    message,
                })
            }
        }
    }

    fn decode_abort_body<T>(
        chunk: &MessageChunk,
        info: &ChunkInfo,
    ) -> EncodingResult<ReceivedMessage<T>> {
        let mut stream = Cursor::new(&chunk.data[info.body_offset..]);
        let status = StatusCode::from(read_u32(&mut stream)?);
        let reason = UAString::decode(&mut stream, &Default::default()).unwrap_or_default();
        Ok(ReceivedMessage::Abort {
            request_id: info.sequence_header.request_id,
            status,
            reason,
        })
    }
}

impl Default for MessageReceiver {
    fn default() -> Self {
        Self::new()
    }
}
