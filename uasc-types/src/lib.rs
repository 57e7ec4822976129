// UASC for Rust
// SPDX-License-Identifier: MPL-2.0
// Copyright (C) 2026 UASC contributors

//! Built-in OPC UA types and the little-endian binary codec used by the
//! UASC secure-channel stack.
//!
//! The codec is stream oriented: every type implements [`BinaryEncodable`]
//! and/or [`BinaryDecodable`] over `std::io` streams, and decoding is always
//! bounded by a [`DecodingOptions`] carried per endpoint. There is no global
//! configuration.

mod encoding;

pub mod byte_string;
pub mod date_time;
pub mod diagnostic_info;
pub mod extension_object;
pub mod guid;
pub mod node_id;
pub mod service;
pub mod status_code;
pub mod string;
pub mod variant;

pub use byte_string::ByteString;
pub use date_time::DateTime;
pub use diagnostic_info::DiagnosticInfo;
pub use encoding::{
    process_decode_io_result, process_encode_io_result, read_array, read_i16, read_i32, read_i64,
    read_i8, read_u16, read_u32, read_u64, read_u8, write_array, write_i16, write_i32, write_i64,
    write_i8, write_u16, write_u32, write_u64, write_u8, BinaryDecodable, BinaryEncodable,
    DecodingOptions, EncodingResult, Error,
};
pub use extension_object::ExtensionObject;
pub use guid::Guid;
pub use node_id::{Identifier, NodeId};
pub use service::{
    ChannelSecurityToken, CloseSecureChannelRequest, CloseSecureChannelResponse, MessageInfo,
    MessageSecurityMode, ObjectId, OpenSecureChannelRequest, OpenSecureChannelResponse,
    RequestHeader, ResponseHeader, SecurityTokenRequestType, ServiceFault,
};
pub use status_code::StatusCode;
pub use string::UAString;
pub use variant::Variant;

/// Handle identifying a request within a session or channel.
pub type IntegerId = u32;
