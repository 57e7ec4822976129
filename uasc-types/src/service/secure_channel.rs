// UASC for Rust
// SPDX-License-Identifier: MPL-2.0
// Copyright (C) 2026 UASC contributors

use std::fmt;
use std::io::{Read, Write};

use crate::byte_string::ByteString;
use crate::date_time::DateTime;
use crate::encoding::{
    read_i32, read_u32, write_i32, write_u32, BinaryDecodable, BinaryEncodable, DecodingOptions,
    EncodingResult, Error,
};
use crate::status_code::StatusCode;

use super::{MessageInfo, ObjectId, RequestHeader, ResponseHeader};

/// Whether an open secure channel request issues a new token or renews the
/// existing one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum SecurityTokenRequestType {
    /// Create a new secure channel token.
    Issue = 0,
    /// Renew the token of an established channel.
    Renew = 1,
}

impl BinaryEncodable for SecurityTokenRequestType {
    fn byte_len(&self) -> usize {
        4
    }
    fn encode<S: Write + ?Sized>(&self, stream: &mut S) -> EncodingResult<()> {
        write_i32(stream, *self as i32)
    }
}

impl BinaryDecodable for SecurityTokenRequestType {
    fn decode<S: Read + ?Sized>(stream: &mut S, _: &DecodingOptions) -> EncodingResult<Self> {
        match read_i32(stream)? {
            0 => Ok(SecurityTokenRequestType::Issue),
            1 => Ok(SecurityTokenRequestType::Renew),
            v => Err(Error::decoding(format!(
                "invalid security token request type {v}"
            ))),
        }
    }
}

/// The protections applied to messages on a channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(i32)]
pub enum MessageSecurityMode {
    /// Not a valid mode; produced only by decoding a bad value.
    #[default]
    Invalid = 0,
    /// Messages are neither signed nor encrypted.
    None = 1,
    /// Messages are signed but not encrypted.
    Sign = 2,
    /// Messages are signed and encrypted.
    SignAndEncrypt = 3,
}

impl fmt::Display for MessageSecurityMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            MessageSecurityMode::Invalid => "Invalid",
            MessageSecurityMode::None => "None",
            MessageSecurityMode::Sign => "Sign",
            MessageSecurityMode::SignAndEncrypt => "SignAndEncrypt",
        };
        f.write_str(s)
    }
}

impl From<i32> for MessageSecurityMode {
    fn from(v: i32) -> Self {
        match v {
            1 => MessageSecurityMode::None,
            2 => MessageSecurityMode::Sign,
            3 => MessageSecurityMode::SignAndEncrypt,
            _ => MessageSecurityMode::Invalid,
        }
    }
}

impl BinaryEncodable for MessageSecurityMode {
    fn byte_len(&self) -> usize {
        4
    }
    fn encode<S: Write + ?Sized>(&self, stream: &mut S) -> EncodingResult<()> {
        write_i32(stream, *self as i32)
    }
}

impl BinaryDecodable for MessageSecurityMode {
    fn decode<S: Read + ?Sized>(stream: &mut S, _: &DecodingOptions) -> EncodingResult<Self> {
        Ok(MessageSecurityMode::from(read_i32(stream)?))
    }
}

/// The security token minted by the server at open or renew time.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ChannelSecurityToken {
    /// Server-assigned channel id.
    pub channel_id: u32,
    /// Token id, monotonic per channel.
    pub token_id: u32,
    /// Server time the token was created.
    pub created_at: DateTime,
    /// Revised token lifetime in milliseconds.
    pub revised_lifetime: u32,
}

impl BinaryEncodable for ChannelSecurityToken {
    fn byte_len(&self) -> usize {
        4 + 4 + self.created_at.byte_len() + 4
    }

    fn encode<S: Write + ?Sized>(&self, stream: &mut S) -> EncodingResult<()> {
        write_u32(stream, self.channel_id)?;
        write_u32(stream, self.token_id)?;
        self.created_at.encode(stream)?;
        write_u32(stream, self.revised_lifetime)
    }
}

impl BinaryDecodable for ChannelSecurityToken {
    fn decode<S: Read + ?Sized>(stream: &mut S, options: &DecodingOptions) -> EncodingResult<Self> {
        Ok(Self {
            channel_id: read_u32(stream)?,
            token_id: read_u32(stream)?,
            created_at: DateTime::decode(stream, options)?,
            revised_lifetime: read_u32(stream)?,
        })
    }
}

/// OpenSecureChannel service request.
#[derive(Debug, Clone, PartialEq)]
pub struct OpenSecureChannelRequest {
    /// Common request header.
    pub request_header: RequestHeader,
    /// Protocol version, must match the hello exchange.
    pub client_protocol_version: u32,
    /// Issue or renew.
    pub request_type: SecurityTokenRequestType,
    /// Requested security mode.
    pub security_mode: MessageSecurityMode,
    /// Client key-derivation nonce.
    pub client_nonce: ByteString,
    /// Requested token lifetime in milliseconds.
    pub requested_lifetime: u32,
}

impl MessageInfo for OpenSecureChannelRequest {
    fn type_id(&self) -> ObjectId {
        ObjectId::OpenSecureChannelRequest_Encoding_DefaultBinary
    }
}

impl BinaryEncodable for OpenSecureChannelRequest {
    fn byte_len(&self) -> usize {
        self.request_header.byte_len()
            + 4
            + self.request_type.byte_len()
            + self.security_mode.byte_len()
            + self.client_nonce.byte_len()
            + 4
    }

    fn encode<S: Write + ?Sized>(&self, stream: &mut S) -> EncodingResult<()> {
        self.request_header.encode(stream)?;
        write_u32(stream, self.client_protocol_version)?;
        self.request_type.encode(stream)?;
        self.security_mode.encode(stream)?;
        self.client_nonce.encode(stream)?;
        write_u32(stream, self.requested_lifetime)
    }
}

impl BinaryDecodable for OpenSecureChannelRequest {
    fn decode<S: Read + ?Sized>(stream: &mut S, options: &DecodingOptions) -> EncodingResult<Self> {
        Ok(Self {
            request_header: RequestHeader::decode(stream, options)?,
            client_protocol_version: read_u32(stream)?,
            request_type: SecurityTokenRequestType::decode(stream, options)?,
            security_mode: MessageSecurityMode::decode(stream, options)?,
            client_nonce: ByteString::decode(stream, options)?,
            requested_lifetime: read_u32(stream)?,
        })
    }
}

/// OpenSecureChannel service response.
#[derive(Debug, Clone, PartialEq)]
pub struct OpenSecureChannelResponse {
    /// Common response header.
    pub response_header: ResponseHeader,
    /// Protocol version the server speaks.
    pub server_protocol_version: u32,
    /// The issued or renewed token.
    pub security_token: ChannelSecurityToken,
    /// Server key-derivation nonce.
    pub server_nonce: ByteString,
}

impl MessageInfo for OpenSecureChannelResponse {
    fn type_id(&self) -> ObjectId {
        ObjectId::OpenSecureChannelResponse_Encoding_DefaultBinary
    }
}

impl BinaryEncodable for OpenSecureChannelResponse {
    fn byte_len(&self) -> usize {
        self.response_header.byte_len()
            + 4
            + self.security_token.byte_len()
            + self.server_nonce.byte_len()
    }

    fn encode<S: Write + ?Sized>(&self, stream: &mut S) -> EncodingResult<()> {
        self.response_header.encode(stream)?;
        write_u32(stream, self.server_protocol_version)?;
        self.security_token.encode(stream)?;
        self.server_nonce.encode(stream)
    }
}

impl BinaryDecodable for OpenSecureChannelResponse {
    fn decode<S: Read + ?Sized>(stream: &mut S, options: &DecodingOptions) -> EncodingResult<Self> {
        Ok(Self {
            response_header: ResponseHeader::decode(stream, options)?,
            server_protocol_version: read_u32(stream)?,
            security_token: ChannelSecurityToken::decode(stream, options)?,
            server_nonce: ByteString::decode(stream, options)?,
        })
    }
}

/// CloseSecureChannel service request. Never answered; the channel just goes
/// down.
#[derive(Debug, Clone, PartialEq)]
pub struct CloseSecureChannelRequest {
    /// Common request header.
    pub request_header: RequestHeader,
}

impl MessageInfo for CloseSecureChannelRequest {
    fn type_id(&self) -> ObjectId {
        ObjectId::CloseSecureChannelRequest_Encoding_DefaultBinary
    }
}

impl BinaryEncodable for CloseSecureChannelRequest {
    fn byte_len(&self) -> usize {
        self.request_header.byte_len()
    }
    fn encode<S: Write + ?Sized>(&self, stream: &mut S) -> EncodingResult<()> {
        self.request_header.encode(stream)
    }
}

impl BinaryDecodable for CloseSecureChannelRequest {
    fn decode<S: Read + ?Sized>(stream: &mut S, options: &DecodingOptions) -> EncodingResult<Self> {
        Ok(Self {
            request_header: RequestHeader::decode(stream, options)?,
        })
    }
}

/// CloseSecureChannel service response. Defined by the standard but never
/// sent; decoded for completeness.
#[derive(Debug, Clone, PartialEq)]
pub struct CloseSecureChannelResponse {
    /// Common response header.
    pub response_header: ResponseHeader,
}

impl MessageInfo for CloseSecureChannelResponse {
    fn type_id(&self) -> ObjectId {
        ObjectId::CloseSecureChannelResponse_Encoding_DefaultBinary
    }
}

impl BinaryEncodable for CloseSecureChannelResponse {
    fn byte_len(&self) -> usize {
        self.response_header.byte_len()
    }
    fn encode<S: Write + ?Sized>(&self, stream: &mut S) -> EncodingResult<()> {
        self.response_header.encode(stream)
    }
}

impl BinaryDecodable for CloseSecureChannelResponse {
    fn decode<S: Read + ?Sized>(stream: &mut S, options: &DecodingOptions) -> EncodingResult<Self> {
        Ok(Self {
            response_header: ResponseHeader::decode(stream, options)?,
        })
    }
}

/// A service-level failure response carrying only a header.
#[derive(Debug, Clone, PartialEq)]
pub struct ServiceFault {
    /// Common response header with the failing status.
    pub response_header: ResponseHeader,
}

impl ServiceFault {
    /// A fault for the given request handle and status.
    pub fn new(request_handle: u32, service_result: StatusCode) -> Self {
        Self {
            response_header: ResponseHeader::new_service_result(request_handle, service_result),
        }
    }
}

impl MessageInfo for ServiceFault {
    fn type_id(&self) -> ObjectId {
        ObjectId::ServiceFault_Encoding_DefaultBinary
    }
}

impl BinaryEncodable for ServiceFault {
    fn byte_len(&self) -> usize {
        self.response_header.byte_len()
    }
    fn encode<S: Write + ?Sized>(&self, stream: &mut S) -> EncodingResult<()> {
        self.response_header.encode(stream)
    }
}

impl BinaryDecodable for ServiceFault {
    fn decode<S: Read + ?Sized>(stream: &mut S, options: &DecodingOptions) -> EncodingResult<Self> {
        Ok(Self {
            response_header: ResponseHeader::decode(stream, options)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encoding::DecodingOptions;
    use std::io::Cursor;

    #[test]
    fn open_request_round_trip() {
        let request = OpenSecureChannelRequest {
            request_header: RequestHeader::new(1, 30_000),
            client_protocol_version: 0,
            request_type: SecurityTokenRequestType::Issue,
            security_mode: MessageSecurityMode::SignAndEncrypt,
            client_nonce: ByteString::from(vec![0u8; 32]),
            requested_lifetime: 600_000,
        };
        let mut buf = Vec::new();
        request.encode(&mut buf).unwrap();
        assert_eq!(buf.len(), request.byte_len());
        let decoded =
            OpenSecureChannelRequest::decode(&mut Cursor::new(buf), &DecodingOptions::minimal())
                .unwrap();
        assert_eq!(decoded, request);
    }

    #[test]
    fn open_response_round_trip() {
        let response = OpenSecureChannelResponse {
            response_header: ResponseHeader::new_service_result(1, StatusCode::Good),
            server_protocol_version: 0,
            security_token: ChannelSecurityToken {
                channel_id: 12,
                token_id: 1,
                created_at: DateTime::now(),
                revised_lifetime: 600_000,
            },
            server_nonce: ByteString::from(vec![1u8; 32]),
        };
        let mut buf = Vec::new();
        response.encode(&mut buf).unwrap();
        assert_eq!(buf.len(), response.byte_len());
        let decoded =
            OpenSecureChannelResponse::decode(&mut Cursor::new(buf), &DecodingOptions::minimal())
                .unwrap();
        assert_eq!(decoded, response);
    }

    #[test]
    fn bad_request_type_is_rejected() {
        let mut buf = Vec::new();
        write_i32(&mut buf, 9).unwrap();
        let err = SecurityTokenRequestType::decode(
            &mut Cursor::new(buf),
            &DecodingOptions::minimal(),
        )
        .unwrap_err();
        assert_eq!(err.status(), StatusCode::BadDecodingError);
    }
}
