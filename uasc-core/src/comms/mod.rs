// UASC for Rust
// SPDX-License-Identifier: MPL-2.0
// Copyright (C) 2026 UASC contributors

//! Transport framing, chunking and the secure-channel envelope.

pub mod chunker;
pub mod codec;
pub mod message_chunk;
pub mod message_chunk_info;
pub mod message_reader;
pub mod message_writer;
pub mod secure_channel;
pub mod security_header;
pub mod tcp_types;
pub mod url;
