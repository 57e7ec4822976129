// UASC for Rust
// SPDX-License-Identifier: MPL-2.0
// Copyright (C) 2026 UASC contributors

//! OPC UA status codes. Only the subset the channel layer emits or honors is
//! named; any other `u32` still round-trips unchanged.

use std::fmt;
use std::io::{Read, Write};

use crate::encoding::{
    read_u32, write_u32, BinaryDecodable, BinaryEncodable, DecodingOptions, EncodingResult,
};

/// A 32 bit status code. The two high bits encode severity: `00` good,
/// `01` uncertain, `10` bad.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct StatusCode(u32);

const SEVERITY_MASK: u32 = 0xc000_0000;
const SEVERITY_GOOD: u32 = 0x0000_0000;
const SEVERITY_UNCERTAIN: u32 = 0x4000_0000;
const SEVERITY_BAD: u32 = 0x8000_0000;

#[allow(non_upper_case_globals, missing_docs)]
impl StatusCode {
    pub const Good: StatusCode = StatusCode(0x0000_0000);

    pub const BadUnexpectedError: StatusCode = StatusCode(0x8001_0000);
    pub const BadInternalError: StatusCode = StatusCode(0x8002_0000);
    pub const BadOutOfMemory: StatusCode = StatusCode(0x8003_0000);
    pub const BadResourceUnavailable: StatusCode = StatusCode(0x8004_0000);
    pub const BadCommunicationError: StatusCode = StatusCode(0x8005_0000);
    pub const BadEncodingError: StatusCode = StatusCode(0x8006_0000);
    pub const BadDecodingError: StatusCode = StatusCode(0x8007_0000);
    pub const BadEncodingLimitsExceeded: StatusCode = StatusCode(0x8008_0000);
    pub const BadTimeout: StatusCode = StatusCode(0x800a_0000);
    pub const BadServiceUnsupported: StatusCode = StatusCode(0x800b_0000);
    pub const BadShutdown: StatusCode = StatusCode(0x800c_0000);
    pub const BadServerHalted: StatusCode = StatusCode(0x800e_0000);
    pub const BadNothingToDo: StatusCode = StatusCode(0x800f_0000);
    pub const BadCertificateInvalid: StatusCode = StatusCode(0x8012_0000);
    pub const BadSecurityChecksFailed: StatusCode = StatusCode(0x8013_0000);
    pub const BadCertificateTimeInvalid: StatusCode = StatusCode(0x8014_0000);
    pub const BadCertificateUntrusted: StatusCode = StatusCode(0x801a_0000);
    pub const BadSecureChannelIdInvalid: StatusCode = StatusCode(0x8022_0000);
    pub const BadInvalidTimestamp: StatusCode = StatusCode(0x8023_0000);
    pub const BadNonceInvalid: StatusCode = StatusCode(0x8024_0000);
    pub const BadRequestHeaderInvalid: StatusCode = StatusCode(0x802a_0000);
    pub const BadSecurityModeRejected: StatusCode = StatusCode(0x8054_0000);
    pub const BadSecurityPolicyRejected: StatusCode = StatusCode(0x8055_0000);
    pub const BadSequenceNumberUnknown: StatusCode = StatusCode(0x807a_0000);
    pub const BadTcpServerTooBusy: StatusCode = StatusCode(0x807d_0000);
    pub const BadTcpMessageTypeInvalid: StatusCode = StatusCode(0x807e_0000);
    pub const BadTcpSecureChannelUnknown: StatusCode = StatusCode(0x807f_0000);
    pub const BadTcpMessageTooLarge: StatusCode = StatusCode(0x8080_0000);
    pub const BadTcpNotEnoughResources: StatusCode = StatusCode(0x8081_0000);
    pub const BadTcpInternalError: StatusCode = StatusCode(0x8082_0000);
    pub const BadTcpEndpointUrlInvalid: StatusCode = StatusCode(0x8083_0000);
    pub const BadRequestInterrupted: StatusCode = StatusCode(0x8084_0000);
    pub const BadRequestTimeout: StatusCode = StatusCode(0x8085_0000);
    pub const BadSecureChannelClosed: StatusCode = StatusCode(0x8086_0000);
    pub const BadSecureChannelTokenUnknown: StatusCode = StatusCode(0x8087_0000);
    pub const BadSequenceNumberInvalid: StatusCode = StatusCode(0x8088_0000);
    pub const BadNotConnected: StatusCode = StatusCode(0x808a_0000);
    pub const BadInvalidArgument: StatusCode = StatusCode(0x80ab_0000);
    pub const BadConnectionRejected: StatusCode = StatusCode(0x80ac_0000);
    pub const BadDisconnect: StatusCode = StatusCode(0x80ad_0000);
    pub const BadConnectionClosed: StatusCode = StatusCode(0x80ae_0000);
    pub const BadInvalidState: StatusCode = StatusCode(0x80af_0000);
    pub const BadEndOfStream: StatusCode = StatusCode(0x80b0_0000);
    pub const BadProtocolVersionUnsupported: StatusCode = StatusCode(0x80be_0000);
}

impl StatusCode {
    /// The raw `u32` value.
    pub fn bits(&self) -> u32 {
        self.0
    }

    /// Severity is good.
    pub fn is_good(&self) -> bool {
        self.0 & SEVERITY_MASK == SEVERITY_GOOD
    }

    /// Severity is uncertain.
    pub fn is_uncertain(&self) -> bool {
        self.0 & SEVERITY_MASK == SEVERITY_UNCERTAIN
    }

    /// Severity is bad.
    pub fn is_bad(&self) -> bool {
        self.0 & SEVERITY_MASK == SEVERITY_BAD
    }

    /// Symbolic name of the code, or `"Unknown"` for codes this stack does
    /// not name.
    pub fn name(&self) -> &'static str {
        match *self {
            StatusCode::Good => "Good",
            StatusCode::BadUnexpectedError => "BadUnexpectedError",
            StatusCode::BadInternalError => "BadInternalError",
            StatusCode::BadOutOfMemory => "BadOutOfMemory",
            StatusCode::BadResourceUnavailable => "BadResourceUnavailable",
            StatusCode::BadCommunicationError => "BadCommunicationError",
            StatusCode::BadEncodingError => "BadEncodingError",
            StatusCode::BadDecodingError => "BadDecodingError",
            StatusCode::BadEncodingLimitsExceeded => "BadEncodingLimitsExceeded",
            StatusCode::BadTimeout => "BadTimeout",
            StatusCode::BadServiceUnsupported => "BadServiceUnsupported",
            StatusCode::BadShutdown => "BadShutdown",
            StatusCode::BadServerHalted => "BadServerHalted",
            StatusCode::BadNothingToDo => "BadNothingToDo",
            StatusCode::BadCertificateInvalid => "BadCertificateInvalid",
            StatusCode::BadSecurityChecksFailed => "BadSecurityChecksFailed",
            StatusCode::BadCertificateTimeInvalid => "BadCertificateTimeInvalid",
            StatusCode::BadCertificateUntrusted => "BadCertificateUntrusted",
            StatusCode::BadSecureChannelIdInvalid => "BadSecureChannelIdInvalid",
            StatusCode::BadInvalidTimestamp => "BadInvalidTimestamp",
            StatusCode::BadNonceInvalid => "BadNonceInvalid",
            StatusCode::BadRequestHeaderInvalid => "BadRequestHeaderInvalid",
            StatusCode::BadSecurityModeRejected => "BadSecurityModeRejected",
            StatusCode::BadSecurityPolicyRejected => "BadSecurityPolicyRejected",
            StatusCode::BadSequenceNumberUnknown => "BadSequenceNumberUnknown",
            StatusCode::BadTcpServerTooBusy => "BadTcpServerTooBusy",
            StatusCode::BadTcpMessageTypeInvalid => "BadTcpMessageTypeInvalid",
            StatusCode::BadTcpSecureChannelUnknown => "BadTcpSecureChannelUnknown",
            StatusCode::BadTcpMessageTooLarge => "BadTcpMessageTooLarge",
            StatusCode::BadTcpNotEnoughResources => "BadTcpNotEnoughResources",
            StatusCode::BadTcpInternalError => "BadTcpInternalError",
            StatusCode::BadTcpEndpointUrlInvalid => "BadTcpEndpointUrlInvalid",
            StatusCode::BadRequestInterrupted => "BadRequestInterrupted",
            StatusCode::BadRequestTimeout => "BadRequestTimeout",
            StatusCode::BadSecureChannelClosed => "BadSecureChannelClosed",
            StatusCode::BadSecureChannelTokenUnknown => "BadSecureChannelTokenUnknown",
            StatusCode::BadSequenceNumberInvalid => "BadSequenceNumberInvalid",
            StatusCode::BadNotConnected => "BadNotConnected",
            StatusCode::BadInvalidArgument => "BadInvalidArgument",
            StatusCode::BadConnectionRejected => "BadConnectionRejected",
            StatusCode::BadDisconnect => "BadDisconnect",
            StatusCode::BadConnectionClosed => "BadConnectionClosed",
            StatusCode::BadInvalidState => "BadInvalidState",
            StatusCode::BadEndOfStream => "BadEndOfStream",
            StatusCode::BadProtocolVersionUnsupported => "BadProtocolVersionUnsupported",
            _ => "Unknown",
        }
    }
}

impl From<u32> for StatusCode {
    fn from(value: u32) -> Self {
        StatusCode(value)
    }
}

impl fmt::Display for StatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = self.name();
        if name == "Unknown" {
            write!(f, "StatusCode({:#010x})", self.0)
        } else {
            f.write_str(name)
        }
    }
}

impl BinaryEncodable for StatusCode {
    fn byte_len(&self) -> usize {
        4
    }
    fn encode<S: Write + ?Sized>(&self, stream: &mut S) -> EncodingResult<()> {
        write_u32(stream, self.0)
    }
}

impl BinaryDecodable for StatusCode {
    fn decode<S: Read + ?Sized>(stream: &mut S, _: &DecodingOptions) -> EncodingResult<Self> {
        Ok(StatusCode(read_u32(stream)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn severity() {
        assert!(StatusCode::Good.is_good());
        assert!(!StatusCode::Good.is_bad());
        assert!(StatusCode::BadTimeout.is_bad());
        assert!(StatusCode::from(0x4000_0000).is_uncertain());
    }

    #[test]
    fn unknown_codes_round_trip() {
        let code = StatusCode::from(0x80de_0000);
        assert_eq!(code.name(), "Unknown");
        assert_eq!(code.bits(), 0x80de_0000);
    }
}
