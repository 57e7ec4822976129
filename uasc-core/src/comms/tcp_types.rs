// UASC for Rust
// SPDX-License-Identifier: MPL-2.0
// Copyright (C) 2026 UASC contributors

//! The OPC UA TCP control messages: hello, acknowledge, error and reverse
//! hello, plus the common message header every frame starts with.

use std::io::{Read, Write};

use uasc_types::{
    process_decode_io_result, read_u32, read_u8, write_u32, write_u8, BinaryDecodable,
    BinaryEncodable, DecodingOptions, EncodingResult, Error, StatusCode, UAString,
};

/// Hello message type bytes.
pub const HELLO_MESSAGE: &[u8] = b"HEL";
/// Acknowledge message type bytes.
pub const ACKNOWLEDGE_MESSAGE: &[u8] = b"ACK";
/// Error message type bytes.
pub const ERROR_MESSAGE: &[u8] = b"ERR";
/// Reverse hello message type bytes.
pub const REVERSE_HELLO_MESSAGE: &[u8] = b"RHE";
/// Service message chunk type bytes.
pub const CHUNK_MESSAGE: &[u8] = b"MSG";
/// Open secure channel chunk type bytes.
pub const OPEN_SECURE_CHANNEL_MESSAGE: &[u8] = b"OPN";
/// Close secure channel chunk type bytes.
pub const CLOSE_SECURE_CHANNEL_MESSAGE: &[u8] = b"CLO";

/// Final-flag byte of an intermediate chunk.
pub const CHUNK_INTERMEDIATE: u8 = b'C';
/// Final-flag byte of the last chunk of a message.
pub const CHUNK_FINAL: u8 = b'F';
/// Final-flag byte of an abort chunk.
pub const CHUNK_FINAL_ERROR: u8 = b'A';

/// Length of the common message header: type, final flag, size.
pub const MESSAGE_HEADER_LEN: usize = 8;
/// Smallest receive/send buffer either peer may propose.
pub const MIN_CHUNK_SIZE: usize = 8192;
/// Longest endpoint URL accepted in a hello message.
pub const MAX_URL_LENGTH: usize = 4096;

/// The kind of message a frame carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageType {
    /// Client hello.
    Hello,
    /// Server acknowledge.
    Acknowledge,
    /// Fatal error notification.
    Error,
    /// Reverse hello, sent by a server that dials out.
    ReverseHello,
    /// A secure-channel chunk (`MSG`, `OPN` or `CLO`).
    Chunk,
}

/// The 8 byte header common to every frame on the wire.
#[derive(Debug, Clone, PartialEq)]
pub struct MessageHeader {
    /// Message kind.
    pub message_type: MessageType,
    /// Total frame size in bytes, header included.
    pub message_size: u32,
}

impl MessageHeader {
    /// A header for the given type; the size is filled in when the body is
    /// known.
    pub fn new(message_type: MessageType) -> Self {
        Self {
            message_type,
            message_size: 0,
        }
    }

    /// Peek at the first bytes of `data` and classify the frame. Returns the
    /// type and total size.
    pub fn peek(data: &[u8]) -> EncodingResult<(MessageType, usize)> {
        if data.len() < MESSAGE_HEADER_LEN {
            return Err(Error::decoding("message header is truncated"));
        }
        let message_type = match &data[0..3] {
            HELLO_MESSAGE => MessageType::Hello,
            ACKNOWLEDGE_MESSAGE => MessageType::Acknowledge,
            ERROR_MESSAGE => MessageType::Error,
            REVERSE_HELLO_MESSAGE => MessageType::ReverseHello,
            CHUNK_MESSAGE | OPEN_SECURE_CHANNEL_MESSAGE | CLOSE_SECURE_CHANNEL_MESSAGE => {
                MessageType::Chunk
            }
            r => {
                return Err(Error::new(
                    StatusCode::BadTcpMessageTypeInvalid,
                    format!("invalid message type {r:?}"),
                ))
            }
        };
        let message_size = u32::from_le_bytes([data[4], data[5], data[6], data[7]]) as usize;
        Ok((message_type, message_size))
    }
}

impl BinaryEncodable for MessageHeader {
    fn byte_len(&self) -> usize {
        MESSAGE_HEADER_LEN
    }

    fn encode<S: Write + ?Sized>(&self, stream: &mut S) -> EncodingResult<()> {
        let message_type: &[u8] = match self.message_type {
            MessageType::Hello => HELLO_MESSAGE,
            MessageType::Acknowledge => ACKNOWLEDGE_MESSAGE,
            MessageType::Error => ERROR_MESSAGE,
            MessageType::ReverseHello => REVERSE_HELLO_MESSAGE,
            MessageType::Chunk => {
                return Err(Error::encoding(
                    "chunks are framed by the chunk layer, not the message header",
                ))
            }
        };
        uasc_types::process_encode_io_result(stream.write_all(message_type))?;
        // Control messages are always final.
        write_u8(stream, CHUNK_FINAL)?;
        write_u32(stream, self.message_size)
    }
}

impl BinaryDecodable for MessageHeader {
    fn decode<S: Read + ?Sized>(stream: &mut S, _: &DecodingOptions) -> EncodingResult<Self> {
        let mut header = [0u8; MESSAGE_HEADER_LEN];
        process_decode_io_result(stream.read_exact(&mut header))?;
        let (message_type, message_size) = MessageHeader::peek(&header)?;
        Ok(MessageHeader {
            message_type,
            message_size: message_size as u32,
        })
    }
}

/// The value both sides settle on when one proposes `a` and the other is
/// bounded by `b`, zero meaning unbounded.
pub fn negotiate_value(a: u32, b: u32) -> u32 {
    match (a, b) {
        (0, b) => b,
        (a, 0) => a,
        (a, b) => a.min(b),
    }
}

/// Client hello: proposes buffer sizes and limits and names the endpoint.
#[derive(Debug, Clone, PartialEq)]
pub struct HelloMessage {
    /// Common header.
    pub message_header: MessageHeader,
    /// Transport protocol version.
    pub protocol_version: u32,
    /// Largest chunk the sender is willing to receive.
    pub receive_buffer_size: u32,
    /// Largest chunk the sender will emit.
    pub send_buffer_size: u32,
    /// Largest reassembled message the sender will accept, 0 for no limit.
    pub max_message_size: u32,
    /// Largest chunk count per message the sender will accept, 0 for no
    /// limit.
    pub max_chunk_count: u32,
    /// URL of the endpoint being contacted.
    pub endpoint_url: UAString,
}

impl HelloMessage {
    /// A hello proposing the given limits.
    pub fn new(
        endpoint_url: &str,
        receive_buffer_size: u32,
        send_buffer_size: u32,
        max_message_size: u32,
        max_chunk_count: u32,
    ) -> Self {
        let mut hello = Self {
            message_header: MessageHeader::new(MessageType::Hello),
            protocol_version: crate::PROTOCOL_VERSION,
            receive_buffer_size,
            send_buffer_size,
            max_message_size,
            max_chunk_count,
            endpoint_url: UAString::from(endpoint_url),
        };
        hello.message_header.message_size = hello.byte_len() as u32;
        hello
    }

    /// Both proposed buffer sizes honor the protocol floor.
    pub fn is_valid_buffer_sizes(&self) -> bool {
        self.receive_buffer_size as usize >= MIN_CHUNK_SIZE
            && self.send_buffer_size as usize >= MIN_CHUNK_SIZE
    }

    /// The endpoint URL is present, within bounds and `opc.tcp`.
    pub fn is_endpoint_url_valid(&self) -> bool {
        !self.endpoint_url.is_empty()
            && self.endpoint_url.as_ref().len() <= MAX_URL_LENGTH
            && super::url::is_opc_ua_binary_url(self.endpoint_url.as_ref())
    }
}

impl BinaryEncodable for HelloMessage {
    fn byte_len(&self) -> usize {
        MESSAGE_HEADER_LEN + 4 * 5 + self.endpoint_url.byte_len()
    }

    fn encode<S: Write + ?Sized>(&self, stream: &mut S) -> EncodingResult<()> {
        self.message_header.encode(stream)?;
        write_u32(stream, self.protocol_version)?;
        write_u32(stream, self.receive_buffer_size)?;
        write_u32(stream, self.send_buffer_size)?;
        write_u32(stream, self.max_message_size)?;
        write_u32(stream, self.max_chunk_count)?;
        self.endpoint_url.encode(stream)
    }
}

impl BinaryDecodable for HelloMessage {
    fn decode<S: Read + ?Sized>(stream: &mut S, options: &DecodingOptions) -> EncodingResult<Self> {
        Ok(Self {
            message_header: MessageHeader::decode(stream, options)?,
            protocol_version: read_u32(stream)?,
            receive_buffer_size: read_u32(stream)?,
            send_buffer_size: read_u32(stream)?,
            max_message_size: read_u32(stream)?,
            max_chunk_count: read_u32(stream)?,
            endpoint_url: UAString::decode(stream, options)?,
        })
    }
}

/// Server acknowledge: the revised limits after negotiation.
#[derive(Debug, Clone, PartialEq)]
pub struct AcknowledgeMessage {
    /// Common header.
    pub message_header: MessageHeader,
    /// Transport protocol version.
    pub protocol_version: u32,
    /// Largest chunk the server will receive.
    pub receive_buffer_size: u32,
    /// Largest chunk the server will send.
    pub send_buffer_size: u32,
    /// Largest reassembled message the server accepts, 0 for no limit.
    pub max_message_size: u32,
    /// Largest chunk count the server accepts, 0 for no limit.
    pub max_chunk_count: u32,
}

impl AcknowledgeMessage {
    /// The acknowledge answering `hello`, clamping each proposal to the
    /// server's own limits.
    pub fn negotiate(
        hello: &HelloMessage,
        receive_buffer_size: u32,
        send_buffer_size: u32,
        max_message_size: u32,
        max_chunk_count: u32,
    ) -> Self {
        let mut ack = Self {
            message_header: MessageHeader::new(MessageType::Acknowledge),
            protocol_version: crate::PROTOCOL_VERSION,
            // The server's receive buffer bounds what the client sends.
            receive_buffer_size: hello.send_buffer_size.min(receive_buffer_size),
            // And the server never sends more than the client can take.
            send_buffer_size: hello.receive_buffer_size.min(send_buffer_size),
            max_message_size: negotiate_value(hello.max_message_size, max_message_size),
            max_chunk_count: negotiate_value(hello.max_chunk_count, max_chunk_count),
        };
        ack.message_header.message_size = ack.byte_len() as u32;
        ack
    }
}

impl BinaryEncodable for AcknowledgeMessage {
    fn byte_len(&self) -> usize {
        MESSAGE_HEADER_LEN + 4 * 5
    }

    fn encode<S: Write + ?Sized>(&self, stream: &mut S) -> EncodingResult<()> {
        self.message_header.encode(stream)?;
        write_u32(stream, self.protocol_version)?;
        write_u32(stream, self.receive_buffer_size)?;
        write_u32(stream, self.send_buffer_size)?;
        write_u32(stream, self.max_message_size)?;
        write_u32(stream, self.max_chunk_count)
    }
}

impl BinaryDecodable for AcknowledgeMessage {
    fn decode<S: Read + ?Sized>(stream: &mut S, options: &DecodingOptions) -> EncodingResult<Self> {
        Ok(Self {
            message_header: MessageHeader::decode(stream, options)?,
            protocol_version: read_u32(stream)?,
            receive_buffer_size: read_u32(stream)?,
            send_buffer_size: read_u32(stream)?,
            max_message_size: read_u32(stream)?,
            max_chunk_count: read_u32(stream)?,
        })
    }
}

/// Fatal error notification. Carries a status code and a reason, after which
/// the sender closes the transport.
#[derive(Debug, Clone, PartialEq)]
pub struct ErrorMessage {
    /// Common header.
    pub message_header: MessageHeader,
    /// The error status code.
    pub error: u32,
    /// Human readable reason.
    pub reason: UAString,
}

impl ErrorMessage {
    /// An error message for the given status.
    pub fn new(status_code: StatusCode, reason: &str) -> Self {
        let mut error = Self {
            message_header: MessageHeader::new(MessageType::Error),
            error: status_code.bits(),
            reason: UAString::from(reason),
        };
        error.message_header.message_size = error.byte_len() as u32;
        error
    }

    /// The status code carried by the message.
    pub fn status_code(&self) -> StatusCode {
        StatusCode::from(self.error)
    }
}

impl BinaryEncodable for ErrorMessage {
    fn byte_len(&self) -> usize {
        MESSAGE_HEADER_LEN + 4 + self.reason.byte_len()
    }

    fn encode<S: Write + ?Sized>(&self, stream: &mut S) -> EncodingResult<()> {
        self.message_header.encode(stream)?;
        write_u32(stream, self.error)?;
        self.reason.encode(stream)
    }
}

impl BinaryDecodable for ErrorMessage {
    fn decode<S: Read + ?Sized>(stream: &mut S, options: &DecodingOptions) -> EncodingResult<Self> {
        Ok(Self {
            message_header: MessageHeader::decode(stream, options)?,
            error: read_u32(stream)?,
            reason: UAString::decode(stream, options)?,
        })
    }
}

/// Reverse hello: sent by a server that establishes the TCP connection
/// itself, inviting the client to proceed with an ordinary hello exchange.
#[derive(Debug, Clone, PartialEq)]
pub struct ReverseHelloMessage {
    /// Common header.
    pub message_header: MessageHeader,
    /// Application URI of the dialing server.
    pub server_uri: UAString,
    /// Endpoint URL the client should open a channel to.
    pub endpoint_url: UAString,
}

impl ReverseHelloMessage {
    /// A reverse hello naming the dialing server and its endpoint.
    pub fn new(server_uri: &str, endpoint_url: &str) -> Self {
        let mut message = Self {
            message_header: MessageHeader::new(MessageType::ReverseHello),
            server_uri: UAString::from(server_uri),
            endpoint_url: UAString::from(endpoint_url),
        };
        message.message_header.message_size = message.byte_len() as u32;
        message
    }
}

impl BinaryEncodable for ReverseHelloMessage {
    fn byte_len(&self) -> usize {
        MESSAGE_HEADER_LEN + self.server_uri.byte_len() + self.endpoint_url.byte_len()
    }

    fn encode<S: Write + ?Sized>(&self, stream: &mut S) -> EncodingResult<()> {
        self.message_header.encode(stream)?;
        self.server_uri.encode(stream)?;
        self.endpoint_url.encode(stream)
    }
}

impl BinaryDecodable for ReverseHelloMessage {
    fn decode<S: Read + ?Sized>(stream: &mut S, options: &DecodingOptions) -> EncodingResult<Self> {
        Ok(Self {
            message_header: MessageHeader::decode(stream, options)?,
            server_uri: UAString::decode(stream, options)?,
            endpoint_url: UAString::decode(stream, options)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn hello_round_trip() {
        let hello = HelloMessage::new("opc.tcp://localhost:4840/", 65_535, 65_535, 0, 0);
        assert!(hello.is_valid_buffer_sizes());
        assert!(hello.is_endpoint_url_valid());

        let mut buf = Vec::new();
        hello.encode(&mut buf).unwrap();
        assert_eq!(buf.len(), hello.message_header.message_size as usize);
        assert_eq!(&buf[0..3], HELLO_MESSAGE);
        assert_eq!(buf[3], CHUNK_FINAL);

        let decoded =
            HelloMessage::decode(&mut Cursor::new(buf), &DecodingOptions::minimal()).unwrap();
        assert_eq!(decoded, hello);
    }

    #[test]
    fn negotiation_minimum_wins() {
        // Client proposes 65535 both ways, no message or chunk limits.
        let hello = HelloMessage::new("opc.tcp://localhost:4840/", 65_535, 65_535, 0, 0);
        // Server is configured for 131072 buffers, 1 MiB messages, 16 chunks.
        let ack = AcknowledgeMessage::negotiate(&hello, 131_072, 131_072, 1_048_576, 16);
        assert_eq!(ack.receive_buffer_size, 65_535);
        assert_eq!(ack.send_buffer_size, 65_535);
        assert_eq!(ack.max_message_size, 1_048_576);
        assert_eq!(ack.max_chunk_count, 16);
    }

    #[test]
    fn small_buffers_are_invalid() {
        let hello = HelloMessage::new("opc.tcp://localhost:4840/", 4096, 65_535, 0, 0);
        assert!(!hello.is_valid_buffer_sizes());
    }

    #[test]
    fn error_message_round_trip() {
        let error = ErrorMessage::new(StatusCode::BadTcpNotEnoughResources, "too many connections");
        let mut buf = Vec::new();
        error.encode(&mut buf).unwrap();
        let decoded =
            ErrorMessage::decode(&mut Cursor::new(buf), &DecodingOptions::minimal()).unwrap();
        assert_eq!(decoded.status_code(), StatusCode::BadTcpNotEnoughResources);
    }

    #[test]
    fn unknown_type_is_rejected() {
        let err = MessageHeader::peek(b"XXXF\x08\x00\x00\x00").unwrap_err();
        assert_eq!(err.status(), StatusCode::BadTcpMessageTypeInvalid);
    }
}
