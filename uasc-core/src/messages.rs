// UASC for Rust
// SPDX-License-Identifier: MPL-2.0
// Copyright (C) 2026 UASC contributors

//! The messages flowing over a secure channel. The channel layer decodes the
//! handful of messages it handles itself (open, close, fault) and carries
//! everything else as an opaque [`ServiceMessage`]: a type id, the raw
//! encoded body, and the request handle fished out of the body's header.

use std::io::{Cursor, Read, Write};

use uasc_types::{
    BinaryDecodable, BinaryEncodable, CloseSecureChannelRequest, DecodingOptions, EncodingResult,
    Error, MessageInfo, NodeId, ObjectId, OpenSecureChannelRequest, OpenSecureChannelResponse,
    RequestHeader, ResponseHeader, ServiceFault, StatusCode,
};

/// An application service message the channel layer does not interpret:
/// bytes in, bytes out.
#[derive(Debug, Clone, PartialEq)]
pub struct ServiceMessage {
    /// Binary encoding id of the message type.
    pub type_id: NodeId,
    /// Handle from the request or response header inside `body`.
    pub request_handle: u32,
    /// The complete encoded message body, starting at the request or
    /// response header.
    pub body: Vec<u8>,
}

impl ServiceMessage {
    fn decode_request<S: Read + ?Sized>(
        type_id: NodeId,
        stream: &mut S,
        options: &DecodingOptions,
    ) -> EncodingResult<Self> {
        let mut body = Vec::new();
        stream
            .read_to_end(&mut body)
            .map_err(|e| Error::decoding(format!("i/o error while decoding: {e}")))?;
        let header = RequestHeader::decode(&mut Cursor::new(&body), options)?;
        Ok(Self {
            type_id,
            request_handle: header.request_handle,
            body,
        })
    }

    fn decode_response<S: Read + ?Sized>(
        type_id: NodeId,
        stream: &mut S,
        options: &DecodingOptions,
    ) -> EncodingResult<Self> {
        let mut body = Vec::new();
        stream
            .read_to_end(&mut body)
            .map_err(|e| Error::decoding(format!("i/o error while decoding: {e}")))?;
        let header = ResponseHeader::decode(&mut Cursor::new(&body), options)?;
        Ok(Self {
            type_id,
            request_handle: header.request_handle,
            body,
        })
    }
}

/// Decode dispatch by node id, implemented by the two message directions.
pub trait DecodableMessage: Sized {
    /// Decode a message given its already decoded type id.
    fn decode_by_object_id<S: Read + ?Sized>(
        stream: &mut S,
        object_id: NodeId,
        options: &DecodingOptions,
    ) -> EncodingResult<Self>;
}

/// A message sent from client to server.
#[derive(Debug, Clone, PartialEq)]
pub enum RequestMessage {
    /// Open or renew the secure channel.
    OpenSecureChannel(Box<OpenSecureChannelRequest>),
    /// Close the secure channel.
    CloseSecureChannel(Box<CloseSecureChannelRequest>),
    /// Opaque application request.
    Service(ServiceMessage),
}

impl RequestMessage {
    /// Short name of the message kind, for logging.
    pub fn type_name(&self) -> &'static str {
        match self {
            RequestMessage::OpenSecureChannel(_) => "OpenSecureChannel",
            RequestMessage::CloseSecureChannel(_) => "CloseSecureChannel",
            RequestMessage::Service(_) => "Service",
        }
    }

    /// The request handle from the message's request header.
    pub fn request_handle(&self) -> u32 {
        match self {
            RequestMessage::OpenSecureChannel(r) => r.request_header.request_handle,
            RequestMessage::CloseSecureChannel(r) => r.request_header.request_handle,
            RequestMessage::Service(r) => r.request_handle,
        }
    }

    /// The binary encoding id written ahead of the body.
    pub fn type_id(&self) -> NodeId {
        match self {
            RequestMessage::OpenSecureChannel(r) => r.type_id().as_node_id(),
            RequestMessage::CloseSecureChannel(r) => r.type_id().as_node_id(),
            RequestMessage::Service(r) => r.type_id.clone(),
        }
    }
}

impl From<OpenSecureChannelRequest> for RequestMessage {
    fn from(value: OpenSecureChannelRequest) -> Self {
        RequestMessage::OpenSecureChannel(Box::new(value))
    }
}

impl From<CloseSecureChannelRequest> for RequestMessage {
    fn from(value: CloseSecureChannelRequest) -> Self {
        RequestMessage::CloseSecureChannel(Box::new(value))
    }
}

impl From<ServiceMessage> for RequestMessage {
    fn from(value: ServiceMessage) -> Self {
        RequestMessage::Service(value)
    }
}

impl BinaryEncodable for RequestMessage {
    fn byte_len(&self) -> usize {
        self.type_id().byte_len()
            + match self {
                RequestMessage::OpenSecureChannel(r) => r.byte_len(),
                RequestMessage::CloseSecureChannel(r) => r.byte_len(),
                RequestMessage::Service(r) => r.body.len(),
            }
    }

    fn encode<S: Write + ?Sized>(&self, stream: &mut S) -> EncodingResult<()> {
        self.type_id().encode(stream)?;
        match self {
            RequestMessage::OpenSecureChannel(r) => r.encode(stream),
            RequestMessage::CloseSecureChannel(r) => r.encode(stream),
            RequestMessage::Service(r) => uasc_types::process_encode_io_result(
                stream.write_all(&r.body),
            ),
        }
    }
}

impl DecodableMessage for RequestMessage {
    fn decode_by_object_id<S: Read + ?Sized>(
        stream: &mut S,
        object_id: NodeId,
        options: &DecodingOptions,
    ) -> EncodingResult<Self> {
        match ObjectId::try_from(&object_id) {
            Ok(ObjectId::OpenSecureChannelRequest_Encoding_DefaultBinary) => Ok(
                OpenSecureChannelRequest::decode(stream, options)?.into(),
            ),
            Ok(ObjectId::CloseSecureChannelRequest_Encoding_DefaultBinary) => Ok(
                CloseSecureChannelRequest::decode(stream, options)?.into(),
            ),
            _ => Ok(RequestMessage::Service(ServiceMessage::decode_request(
                object_id, stream, options,
            )?)),
        }
    }
}

/// A message sent from server to client.
#[derive(Debug, Clone, PartialEq)]
pub enum ResponseMessage {
    /// Answer to an open or renew request.
    OpenSecureChannel(Box<OpenSecureChannelResponse>),
    /// A service-level failure.
    ServiceFault(Box<ServiceFault>),
    /// Opaque application response.
    Service(ServiceMessage),
}

impl ResponseMessage {
    /// Short name of the message kind, for logging.
    pub fn type_name(&self) -> &'static str {
        match self {
            ResponseMessage::OpenSecureChannel(_) => "OpenSecureChannel",
            ResponseMessage::ServiceFault(_) => "ServiceFault",
            ResponseMessage::Service(_) => "Service",
        }
    }

    /// The request handle from the message's response header.
    pub fn request_handle(&self) -> u32 {
        match self {
            ResponseMessage::OpenSecureChannel(r) => r.response_header.request_handle,
            ResponseMessage::ServiceFault(r) => r.response_header.request_handle,
            ResponseMessage::Service(r) => r.request_handle,
        }
    }

    /// The service result if this message carries one at a known offset.
    pub fn service_result(&self) -> Option<StatusCode> {
        match self {
            ResponseMessage::OpenSecureChannel(r) => Some(r.response_header.service_result),
            ResponseMessage::ServiceFault(r) => Some(r.response_header.service_result),
            ResponseMessage::Service(_) => None,
        }
    }

    /// The binary encoding id written ahead of the body.
    pub fn type_id(&self) -> NodeId {
        match self {
            ResponseMessage::OpenSecureChannel(r) => r.type_id().as_node_id(),
            ResponseMessage::ServiceFault(r) => r.type_id().as_node_id(),
            ResponseMessage::Service(r) => r.type_id.clone(),
        }
    }
}

impl From<OpenSecureChannelResponse> for ResponseMessage {
    fn from(value: OpenSecureChannelResponse) -> Self {
        ResponseMessage::OpenSecureChannel(Box::new(value))
    }
}

impl From<ServiceFault> for ResponseMessage {
    fn from(value: ServiceFault) -> Self {
        ResponseMessage::ServiceFault(Box::new(value))
    }
}

impl From<ServiceMessage> for ResponseMessage {
    fn from(value: ServiceMessage) -> Self {
        ResponseMessage::Service(value)
    }
}

impl BinaryEncodable for ResponseMessage {
    fn byte_len(&self) -> usize {
        self.type_id().byte_len()
            + match self {
                ResponseMessage::OpenSecureChannel(r) => r.byte_len(),
                ResponseMessage::ServiceFault(r) => r.byte_len(),
                ResponseMessage::Service(r) => r.body.len(),
            }
    }

    fn encode<S: Write + ?Sized>(&self, stream: &mut S) -> EncodingResult<()> {
        self.type_id().encode(stream)?;
        match self {
            ResponseMessage::OpenSecureChannel(r) => r.encode(stream),
            ResponseMessage::ServiceFault(r) => r.encode(stream),
            ResponseMessage::Service(r) => uasc_types::process_encode_io_result(
                stream.write_all(&r.body),
            ),
        }
    }
}

impl DecodableMessage for ResponseMessage {
    fn decode_by_object_id<S: Read + ?Sized>(
        stream: &mut S,
        object_id: NodeId,
        options: &DecodingOptions,
    ) -> EncodingResult<Self> {
        match ObjectId::try_from(&object_id) {
            Ok(ObjectId::OpenSecureChannelResponse_Encoding_DefaultBinary) => Ok(
                OpenSecureChannelResponse::decode(stream, options)?.into(),
            ),
            Ok(ObjectId::ServiceFault_Encoding_DefaultBinary) => {
                Ok(ServiceFault::decode(stream, options)?.into())
            }
            _ => Ok(ResponseMessage::Service(ServiceMessage::decode_response(
                object_id, stream, options,
            )?)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uasc_types::SecurityTokenRequestType;

    #[test]
    fn request_round_trip() {
        let request: RequestMessage = OpenSecureChannelRequest {
            request_header: RequestHeader::new(9, 30_000),
            client_protocol_version: 0,
            request_type: SecurityTokenRequestType::Issue,
            security_mode: uasc_types::MessageSecurityMode::None,
            client_nonce: uasc_types::ByteString::null(),
            requested_lifetime: 600_000,
        }
        .into();

        let mut buf = Vec::new();
        request.encode(&mut buf).unwrap();
        assert_eq!(buf.len(), request.byte_len());

        let mut stream = Cursor::new(&buf[..]);
        let options = DecodingOptions::minimal();
        let object_id = NodeId::decode(&mut stream, &options).unwrap();
        let decoded =
            RequestMessage::decode_by_object_id(&mut stream, object_id, &options).unwrap();
        assert_eq!(decoded, request);
        assert_eq!(decoded.request_handle(), 9);
    }

    #[test]
    fn unknown_type_id_becomes_service_message() {
        // A read request is not interpreted by the channel layer; its body
        // must survive untouched.
        let header = RequestHeader::new(77, 5_000);
        let mut body = Vec::new();
        header.encode(&mut body).unwrap();
        body.extend_from_slice(&[0xde, 0xad, 0xbe, 0xef]);

        let type_id = NodeId::new(0, 631u32);
        let mut buf = Vec::new();
        type_id.encode(&mut buf).unwrap();
        buf.extend_from_slice(&body);

        let mut stream = Cursor::new(&buf[..]);
        let options = DecodingOptions::minimal();
        let object_id = NodeId::decode(&mut stream, &options).unwrap();
        let decoded =
            RequestMessage::decode_by_object_id(&mut stream, object_id, &options).unwrap();
        let RequestMessage::Service(service) = decoded else {
            panic!("expected a service message");
        };
        assert_eq!(service.request_handle, 77);
        assert_eq!(service.type_id, type_id);
        assert_eq!(service.body, body);
    }
}
