// UASC for Rust
// SPDX-License-Identifier: MPL-2.0
// Copyright (C) 2026 UASC contributors

//! OPC UA TCP framing, chunking and the secure-channel state machine.
//!
//! This crate owns everything between a reliable byte stream and cleartext
//! service messages: the `HEL`/`ACK`/`ERR`/`RHE` transport handshake, message
//! chunks and their cryptographic envelope, reassembly, and the
//! [`comms::secure_channel::SecureChannel`] type that both the client and the
//! server facades drive.

pub mod comms;
pub mod handle;
pub mod hexlify;
pub mod messages;
pub mod sync;

pub use messages::{DecodableMessage, RequestMessage, ResponseMessage, ServiceMessage};

/// The transport protocol version sent in hello and acknowledge messages.
pub const PROTOCOL_VERSION: u32 = 0;
