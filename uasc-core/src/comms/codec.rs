// UASC for Rust
// SPDX-License-Identifier: MPL-2.0
// Copyright (C) 2026 UASC contributors

//! tokio codec turning the byte stream into framed transport messages and
//! back. Chunks come out still protected; the secure channel strips them.

use std::io::Cursor;

use bytes::{Buf, BufMut, BytesMut};
use tokio_util::codec::{Decoder, Encoder};
use tracing::error;

use uasc_types::{BinaryDecodable, BinaryEncodable, DecodingOptions, Error, StatusCode};

use super::message_chunk::MessageChunk;
use super::tcp_types::{
    AcknowledgeMessage, ErrorMessage, HelloMessage, MessageHeader, MessageType,
    ReverseHelloMessage, MESSAGE_HEADER_LEN,
};

/// One framed transport message.
#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    /// Client hello.
    Hello(HelloMessage),
    /// Server acknowledge.
    Acknowledge(AcknowledgeMessage),
    /// Fatal error notification.
    Error(ErrorMessage),
    /// Reverse hello.
    ReverseHello(ReverseHelloMessage),
    /// A secure-channel chunk, still protected.
    Chunk(MessageChunk),
}

/// Framing codec for the OPC UA TCP transport.
#[derive(Debug)]
pub struct TcpCodec {
    /// Largest frame accepted, the negotiated receive buffer size.
    max_chunk_size: usize,
    decoding_options: DecodingOptions,
}

impl TcpCodec {
    /// A codec bounded by `max_chunk_size`, zero meaning unbounded.
    pub fn new(max_chunk_size: usize, decoding_options: DecodingOptions) -> Self {
        Self {
            max_chunk_size,
            decoding_options,
        }
    }

    /// Tighten the frame bound after hello negotiation.
    pub fn set_max_chunk_size(&mut self, max_chunk_size: usize) {
        self.max_chunk_size = max_chunk_size;
    }
}

impl Decoder for TcpCodec {
    type Item = Message;
    type Error = Error;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Message>, Error> {
        if src.len() < MESSAGE_HEADER_LEN {
            return Ok(None);
        }

        let (message_type, message_size) = MessageHeader::peek(src)?;
        if message_size < MESSAGE_HEADER_LEN {
            return Err(Error::decoding(format!(
                "frame size {message_size} is shorter than the header"
            )));
        }
        if self.max_chunk_size > 0 && message_size > self.max_chunk_size {
            error!(
                "Frame of {} bytes exceeds the negotiated receive buffer {}",
                message_size, self.max_chunk_size
            );
            return Err(Error::new(
                StatusCode::BadTcpMessageTooLarge,
                "frame exceeds negotiated receive buffer size",
            ));
        }
        if src.len() < message_size {
            src.reserve(message_size - src.len());
            return Ok(None);
        }

        let frame = src.copy_to_bytes(message_size);
        let mut stream = Cursor::new(&frame[..]);
        let message = match message_type {
            MessageType::Hello => {
                Message::Hello(HelloMessage::decode(&mut stream, &self.decoding_options)?)
            }
            MessageType::Acknowledge => Message::Acknowledge(AcknowledgeMessage::decode(
                &mut stream,
                &self.decoding_options,
            )?),
            MessageType::Error => {
                Message::Error(ErrorMessage::decode(&mut stream, &self.decoding_options)?)
            }
            MessageType::ReverseHello => Message::ReverseHello(ReverseHelloMessage::decode(
                &mut stream,
                &self.decoding_options,
            )?),
            MessageType::Chunk => Message::Chunk(MessageChunk {
                data: frame.to_vec(),
            }),
        };
        Ok(Some(message))
    }
}

impl Encoder<Message> for TcpCodec {
    type Error = Error;

    fn encode(&mut self, item: Message, dst: &mut BytesMut) -> Result<(), Error> {
        let mut writer = dst.writer();
        match item {
            Message::Hello(m) => m.encode(&mut writer),
            Message::Acknowledge(m) => m.encode(&mut writer),
            Message::Error(m) => m.encode(&mut writer),
            Message::ReverseHello(m) => m.encode(&mut writer),
            Message::Chunk(m) => m.encode(&mut writer),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_frames_wait_for_more() {
        let mut codec = TcpCodec::new(0, DecodingOptions::minimal());
        let hello = HelloMessage::new("opc.tcp://localhost:4840/", 65_535, 65_535, 0, 0);
        let mut encoded = BytesMut::new();
        codec.encode(Message::Hello(hello.clone()), &mut encoded).unwrap();

        let mut partial = BytesMut::from(&encoded[..10]);
        assert!(codec.decode(&mut partial).unwrap().is_none());

        partial.extend_from_slice(&encoded[10..]);
        let decoded = codec.decode(&mut partial).unwrap().unwrap();
        assert_eq!(decoded, Message::Hello(hello));
    }

    #[test]
    fn oversize_frame_is_fatal() {
        let mut codec = TcpCodec::new(8192, DecodingOptions::minimal());
        let mut src = BytesMut::new();
        src.extend_from_slice(b"MSGF");
        src.extend_from_slice(&100_000u32.to_le_bytes());
        let err = codec.decode(&mut src).unwrap_err();
        assert_eq!(err.status(), StatusCode::BadTcpMessageTooLarge);
    }

    #[test]
    fn garbage_type_is_fatal() {
        let mut codec = TcpCodec::new(0, DecodingOptions::minimal());
        let mut src = BytesMut::new();
        src.extend_from_slice(b"ZZZF");
        src.extend_from_slice(&8u32.to_le_bytes());
        let err = codec.decode(&mut src).unwrap_err();
        assert_eq!(err.status(), StatusCode::BadTcpMessageTypeInvalid);
    }
}
