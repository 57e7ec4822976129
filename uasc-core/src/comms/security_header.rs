// UASC for Rust
// SPDX-License-Identifier: MPL-2.0
// Copyright (C) 2026 UASC contributors

//! The security headers that follow the chunk header: asymmetric on open
//! secure channel chunks, symmetric everywhere else, plus the sequence
//! header that both kinds are followed by.

use std::io::{Read, Write};

use uasc_types::{
    read_u32, write_u32, BinaryDecodable, BinaryEncodable, ByteString, DecodingOptions,
    EncodingResult, UAString,
};

/// Security header of an `OPN` chunk: names the policy and binds both
/// certificates before any symmetric key exists.
#[derive(Debug, Clone, PartialEq)]
pub struct AsymmetricSecurityHeader {
    /// URI of the security policy protecting the chunk.
    pub security_policy_uri: UAString,
    /// DER certificate of the sender, null when the policy is `None`.
    pub sender_certificate: ByteString,
    /// SHA-1 thumbprint of the receiver's certificate, null when the policy
    /// is `None`.
    pub receiver_certificate_thumbprint: ByteString,
}

impl AsymmetricSecurityHeader {
    /// Header for an unsecured open.
    pub fn none(policy_uri: &str) -> Self {
        Self {
            security_policy_uri: UAString::from(policy_uri),
            sender_certificate: ByteString::null(),
            receiver_certificate_thumbprint: ByteString::null(),
        }
    }

    /// Header binding sender certificate and receiver thumbprint.
    pub fn new(
        policy_uri: &str,
        sender_certificate: ByteString,
        receiver_certificate_thumbprint: ByteString,
    ) -> Self {
        Self {
            security_policy_uri: UAString::from(policy_uri),
            sender_certificate,
            receiver_certificate_thumbprint,
        }
    }
}

impl BinaryEncodable for AsymmetricSecurityHeader {
    fn byte_len(&self) -> usize {
        self.security_policy_uri.byte_len()
            + self.sender_certificate.byte_len()
            + self.receiver_certificate_thumbprint.byte_len()
    }

    fn encode<S: Write + ?Sized>(&self, stream: &mut S) -> EncodingResult<()> {
        self.security_policy_uri.encode(stream)?;
        self.sender_certificate.encode(stream)?;
        self.receiver_certificate_thumbprint.encode(stream)
    }
}

impl BinaryDecodable for AsymmetricSecurityHeader {
    fn decode<S: Read + ?Sized>(stream: &mut S, options: &DecodingOptions) -> EncodingResult<Self> {
        Ok(Self {
            security_policy_uri: UAString::decode(stream, options)?,
            sender_certificate: ByteString::decode(stream, options)?,
            receiver_certificate_thumbprint: ByteString::decode(stream, options)?,
        })
    }
}

/// Security header of `MSG` and `CLO` chunks: the token whose keys protect
/// the chunk.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct SymmetricSecurityHeader {
    /// Id of the token the chunk is protected under.
    pub token_id: u32,
}

impl BinaryEncodable for SymmetricSecurityHeader {
    fn byte_len(&self) -> usize {
        4
    }

    fn encode<S: Write + ?Sized>(&self, stream: &mut S) -> EncodingResult<()> {
        write_u32(stream, self.token_id)
    }
}

impl BinaryDecodable for SymmetricSecurityHeader {
    fn decode<S: Read + ?Sized>(stream: &mut S, _: &DecodingOptions) -> EncodingResult<Self> {
        Ok(Self {
            token_id: read_u32(stream)?,
        })
    }
}

/// Either kind of security header.
#[derive(Debug, Clone, PartialEq)]
pub enum SecurityHeader {
    /// Asymmetric header on `OPN` chunks.
    Asymmetric(AsymmetricSecurityHeader),
    /// Symmetric header on `MSG` and `CLO` chunks.
    Symmetric(SymmetricSecurityHeader),
}

impl SecurityHeader {
    /// Decode the appropriate kind for the chunk type.
    pub fn decode_from_stream<S: Read + ?Sized>(
        stream: &mut S,
        is_open_secure_channel: bool,
        options: &DecodingOptions,
    ) -> EncodingResult<Self> {
        if is_open_secure_channel {
            Ok(SecurityHeader::Asymmetric(
                AsymmetricSecurityHeader::decode(stream, options)?,
            ))
        } else {
            Ok(SecurityHeader::Symmetric(SymmetricSecurityHeader::decode(
                stream, options,
            )?))
        }
    }
}

impl BinaryEncodable for SecurityHeader {
    fn byte_len(&self) -> usize {
        match self {
            SecurityHeader::Asymmetric(h) => h.byte_len(),
            SecurityHeader::Symmetric(h) => h.byte_len(),
        }
    }

    fn encode<S: Write + ?Sized>(&self, stream: &mut S) -> EncodingResult<()> {
        match self {
            SecurityHeader::Asymmetric(h) => h.encode(stream),
            SecurityHeader::Symmetric(h) => h.encode(stream),
        }
    }
}

/// The sequence header ahead of every chunk body: the per-chunk sequence
/// number and the request the chunk belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct SequenceHeader {
    /// Monotonic per-channel chunk counter.
    pub sequence_number: u32,
    /// Request id pairing requests with responses.
    pub request_id: u32,
}

impl BinaryEncodable for SequenceHeader {
    fn byte_len(&self) -> usize {
        8
    }

    fn encode<S: Write + ?Sized>(&self, stream: &mut S) -> EncodingResult<()> {
        write_u32(stream, self.sequence_number)?;
        write_u32(stream, self.request_id)
    }
}

impl BinaryDecodable for SequenceHeader {
    fn decode<S: Read + ?Sized>(stream: &mut S, _: &DecodingOptions) -> EncodingResult<Self> {
        Ok(Self {
            sequence_number: read_u32(stream)?,
            request_id: read_u32(stream)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn asymmetric_round_trip() {
        let header = AsymmetricSecurityHeader::new(
            "http://opcfoundation.org/UA/SecurityPolicy#Basic256Sha256",
            ByteString::from(vec![1u8; 40]),
            ByteString::from(vec![2u8; 20]),
        );
        let mut buf = Vec::new();
        header.encode(&mut buf).unwrap();
        assert_eq!(buf.len(), header.byte_len());
        let decoded = AsymmetricSecurityHeader::decode(
            &mut Cursor::new(buf),
            &DecodingOptions::minimal(),
        )
        .unwrap();
        assert_eq!(decoded, header);
    }

    #[test]
    fn symmetric_round_trip() {
        let header = SymmetricSecurityHeader { token_id: 3 };
        let mut buf = Vec::new();
        header.encode(&mut buf).unwrap();
        assert_eq!(buf, [3, 0, 0, 0]);
    }
}
