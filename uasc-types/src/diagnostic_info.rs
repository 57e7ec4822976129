// UASC for Rust
// SPDX-License-Identifier: MPL-2.0
// Copyright (C) 2026 UASC contributors

//! Contains the implementation of `DiagnosticInfo`.

use std::io::{Read, Write};

use bitflags::bitflags;

use crate::encoding::{
    read_i32, read_u8, write_i32, write_u8, BinaryDecodable, BinaryEncodable, DecodingOptions,
    EncodingResult,
};
use crate::status_code::StatusCode;
use crate::string::UAString;

bitflags! {
    struct DiagnosticInfoMask: u8 {
        const HAS_SYMBOLIC_ID = 0x01;
        const HAS_NAMESPACE = 0x02;
        const HAS_LOCALIZED_TEXT = 0x04;
        const HAS_LOCALE = 0x08;
        const HAS_ADDITIONAL_INFO = 0x10;
        const HAS_INNER_STATUS_CODE = 0x20;
        const HAS_INNER_DIAGNOSTIC_INFO = 0x40;
    }
}

/// Vendor-specific diagnostics for a service result. The channel layer only
/// ever produces the empty value; it decodes whatever a peer sends.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DiagnosticInfo {
    /// Index into the string table for the symbolic id.
    pub symbolic_id: Option<i32>,
    /// Index into the string table for the namespace uri.
    pub namespace_uri: Option<i32>,
    /// Index into the string table for the locale.
    pub locale: Option<i32>,
    /// Index into the string table for the localized text.
    pub localized_text: Option<i32>,
    /// Vendor-specific detail.
    pub additional_info: Option<UAString>,
    /// Status code of an inner operation.
    pub inner_status_code: Option<StatusCode>,
    /// Nested diagnostics.
    pub inner_diagnostic_info: Option<Box<DiagnosticInfo>>,
}

impl DiagnosticInfo {
    /// The empty diagnostic info, a single zero mask byte on the wire.
    pub fn null() -> Self {
        Self::default()
    }

    fn encoding_mask(&self) -> DiagnosticInfoMask {
        let mut mask = DiagnosticInfoMask::empty();
        mask.set(DiagnosticInfoMask::HAS_SYMBOLIC_ID, self.symbolic_id.is_some());
        mask.set(DiagnosticInfoMask::HAS_NAMESPACE, self.namespace_uri.is_some());
        mask.set(DiagnosticInfoMask::HAS_LOCALIZED_TEXT, self.localized_text.is_some());
        mask.set(DiagnosticInfoMask::HAS_LOCALE, self.locale.is_some());
        mask.set(
            DiagnosticInfoMask::HAS_ADDITIONAL_INFO,
            self.additional_info.is_some(),
        );
        mask.set(
            DiagnosticInfoMask::HAS_INNER_STATUS_CODE,
            self.inner_status_code.is_some(),
        );
        mask.set(
            DiagnosticInfoMask::HAS_INNER_DIAGNOSTIC_INFO,
            self.inner_diagnostic_info.is_some(),
        );
        mask
    }
}

impl BinaryEncodable for DiagnosticInfo {
    fn byte_len(&self) -> usize {
        let mut size = 1;
        size += self.symbolic_id.map_or(0, |_| 4);
        size += self.namespace_uri.map_or(0, |_| 4);
        size += self.localized_text.map_or(0, |_| 4);
        size += self.locale.map_or(0, |_| 4);
        size += self.additional_info.as_ref().map_or(0, |v| v.byte_len());
        size += self.inner_status_code.map_or(0, |_| 4);
        size += self
            .inner_diagnostic_info
            .as_ref()
            .map_or(0, |v| v.byte_len());
        size
    }

    fn encode<S: Write + ?Sized>(&self, stream: &mut S) -> EncodingResult<()> {
        write_u8(stream, self.encoding_mask().bits())?;
        if let Some(v) = self.symbolic_id {
            write_i32(stream, v)?;
        }
        if let Some(v) = self.namespace_uri {
            write_i32(stream, v)?;
        }
        if let Some(v) = self.localized_text {
            write_i32(stream, v)?;
        }
        if let Some(v) = self.locale {
            write_i32(stream, v)?;
        }
        if let Some(v) = &self.additional_info {
            v.encode(stream)?;
        }
        if let Some(v) = self.inner_status_code {
            v.encode(stream)?;
        }
        if let Some(v) = &self.inner_diagnostic_info {
            v.encode(stream)?;
        }
        Ok(())
    }
}

impl BinaryDecodable for DiagnosticInfo {
    fn decode<S: Read + ?Sized>(stream: &mut S, options: &DecodingOptions) -> EncodingResult<Self> {
        let mask = DiagnosticInfoMask::from_bits_truncate(read_u8(stream)?);
        let mut info = DiagnosticInfo::null();
        if mask.contains(DiagnosticInfoMask::HAS_SYMBOLIC_ID) {
            info.symbolic_id = Some(read_i32(stream)?);
        }
        if mask.contains(DiagnosticInfoMask::HAS_NAMESPACE) {
            info.namespace_uri = Some(read_i32(stream)?);
        }
        if mask.contains(DiagnosticInfoMask::HAS_LOCALIZED_TEXT) {
            info.localized_text = Some(read_i32(stream)?);
        }
        if mask.contains(DiagnosticInfoMask::HAS_LOCALE) {
            info.locale = Some(read_i32(stream)?);
        }
        if mask.contains(DiagnosticInfoMask::HAS_ADDITIONAL_INFO) {
            info.additional_info = Some(UAString::decode(stream, options)?);
        }
        if mask.contains(DiagnosticInfoMask::HAS_INNER_STATUS_CODE) {
            info.inner_status_code = Some(StatusCode::decode(stream, options)?);
        }
        if mask.contains(DiagnosticInfoMask::HAS_INNER_DIAGNOSTIC_INFO) {
            info.inner_diagnostic_info = Some(Box::new(DiagnosticInfo::decode(stream, options)?));
        }
        Ok(info)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn null_is_one_byte() {
        let mut buf = Vec::new();
        DiagnosticInfo::null().encode(&mut buf).unwrap();
        assert_eq!(buf, [0]);
    }

    #[test]
    fn nested_round_trip() {
        let info = DiagnosticInfo {
            symbolic_id: Some(3),
            additional_info: Some(UAString::from("detail")),
            inner_status_code: Some(StatusCode::BadInternalError),
            inner_diagnostic_info: Some(Box::new(DiagnosticInfo {
                locale: Some(1),
                ..Default::default()
            })),
            ..Default::default()
        };
        let mut buf = Vec::new();
        info.encode(&mut buf).unwrap();
        assert_eq!(buf.len(), info.byte_len());
        let decoded =
            DiagnosticInfo::decode(&mut Cursor::new(buf), &DecodingOptions::minimal()).unwrap();
        assert_eq!(decoded, info);
    }
}
