// UASC for Rust
// SPDX-License-Identifier: MPL-2.0
// Copyright (C) 2026 UASC contributors

use std::io::{Read, Write};

use crate::date_time::DateTime;
use crate::diagnostic_info::DiagnosticInfo;
use crate::encoding::{
    read_array, read_u32, write_array, write_u32, BinaryDecodable, BinaryEncodable,
    DecodingOptions, EncodingResult,
};
use crate::extension_object::ExtensionObject;
use crate::node_id::NodeId;
use crate::status_code::StatusCode;
use crate::string::UAString;

/// Common header on every service request.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RequestHeader {
    /// Session authentication token; null until a session is activated.
    pub authentication_token: NodeId,
    /// Time the request was sent.
    pub timestamp: DateTime,
    /// Client-assigned handle echoed back in the response header.
    pub request_handle: u32,
    /// Requested diagnostics mask.
    pub return_diagnostics: u32,
    /// Audit log correlation id.
    pub audit_entry_id: UAString,
    /// Hint in milliseconds after which the client no longer cares about the
    /// response. Zero means no hint.
    pub timeout_hint: u32,
    /// Reserved extension point.
    pub additional_header: ExtensionObject,
}

impl RequestHeader {
    /// A header carrying just a handle and timeout, the way the channel
    /// layer issues its own requests.
    pub fn new(request_handle: u32, timeout_hint: u32) -> Self {
        Self {
            authentication_token: NodeId::null(),
            timestamp: DateTime::now(),
            request_handle,
            return_diagnostics: 0,
            audit_entry_id: UAString::null(),
            timeout_hint,
            additional_header: ExtensionObject::null(),
        }
    }
}

impl BinaryEncodable for RequestHeader {
    fn byte_len(&self) -> usize {
        self.authentication_token.byte_len()
            + self.timestamp.byte_len()
            + 4
            + 4
            + self.audit_entry_id.byte_len()
            + 4
            + self.additional_header.byte_len()
    }

    fn encode<S: Write + ?Sized>(&self, stream: &mut S) -> EncodingResult<()> {
        self.authentication_token.encode(stream)?;
        self.timestamp.encode(stream)?;
        write_u32(stream, self.request_handle)?;
        write_u32(stream, self.return_diagnostics)?;
        self.audit_entry_id.encode(stream)?;
        write_u32(stream, self.timeout_hint)?;
        self.additional_header.encode(stream)
    }
}

impl BinaryDecodable for RequestHeader {
    fn decode<S: Read + ?Sized>(stream: &mut S, options: &DecodingOptions) -> EncodingResult<Self> {
        Ok(Self {
            authentication_token: NodeId::decode(stream, options)?,
            timestamp: DateTime::decode(stream, options)?,
            request_handle: read_u32(stream)?,
            return_diagnostics: read_u32(stream)?,
            audit_entry_id: UAString::decode(stream, options)?,
            timeout_hint: read_u32(stream)?,
            additional_header: ExtensionObject::decode(stream, options)?,
        })
    }
}

/// Common header on every service response.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ResponseHeader {
    /// Time the response was sent.
    pub timestamp: DateTime,
    /// The handle from the matching request.
    pub request_handle: u32,
    /// Overall service result.
    pub service_result: StatusCode,
    /// Diagnostics for the service result.
    pub service_diagnostics: DiagnosticInfo,
    /// Strings referenced by the diagnostics.
    pub string_table: Option<Vec<UAString>>,
    /// Reserved extension point.
    pub additional_header: ExtensionObject,
}

impl ResponseHeader {
    /// A good response to the given request header.
    pub fn new_good(request_header: &RequestHeader) -> Self {
        Self::new_service_result(request_header.request_handle, StatusCode::Good)
    }

    /// A response with an explicit service result.
    pub fn new_service_result(request_handle: u32, service_result: StatusCode) -> Self {
        Self {
            timestamp: DateTime::now(),
            request_handle,
            service_result,
            service_diagnostics: DiagnosticInfo::null(),
            string_table: None,
            additional_header: ExtensionObject::null(),
        }
    }
}

impl BinaryEncodable for ResponseHeader {
    fn byte_len(&self) -> usize {
        self.timestamp.byte_len()
            + 4
            + self.service_result.byte_len()
            + self.service_diagnostics.byte_len()
            + crate::encoding::array_byte_len(&self.string_table)
            + self.additional_header.byte_len()
    }

    fn encode<S: Write + ?Sized>(&self, stream: &mut S) -> EncodingResult<()> {
        self.timestamp.encode(stream)?;
        write_u32(stream, self.request_handle)?;
        self.service_result.encode(stream)?;
        self.service_diagnostics.encode(stream)?;
        write_array(stream, &self.string_table)?;
        self.additional_header.encode(stream)
    }
}

impl BinaryDecodable for ResponseHeader {
    fn decode<S: Read + ?Sized>(stream: &mut S, options: &DecodingOptions) -> EncodingResult<Self> {
        Ok(Self {
            timestamp: DateTime::decode(stream, options)?,
            request_handle: read_u32(stream)?,
            service_result: StatusCode::decode(stream, options)?,
            service_diagnostics: DiagnosticInfo::decode(stream, options)?,
            string_table: read_array(stream, options)?,
            additional_header: ExtensionObject::decode(stream, options)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn request_header_round_trip() {
        let header = RequestHeader::new(42, 30_000);
        let mut buf = Vec::new();
        header.encode(&mut buf).unwrap();
        assert_eq!(buf.len(), header.byte_len());
        let decoded =
            RequestHeader::decode(&mut Cursor::new(buf), &DecodingOptions::minimal()).unwrap();
        assert_eq!(decoded, header);
    }

    #[test]
    fn response_header_round_trip() {
        let header = ResponseHeader::new_service_result(7, StatusCode::BadServiceUnsupported);
        let mut buf = Vec::new();
        header.encode(&mut buf).unwrap();
        assert_eq!(buf.len(), header.byte_len());
        let decoded =
            ResponseHeader::decode(&mut Cursor::new(buf), &DecodingOptions::minimal()).unwrap();
        assert_eq!(decoded, header);
    }
}
