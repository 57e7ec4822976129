// UASC for Rust
// SPDX-License-Identifier: MPL-2.0
// Copyright (C) 2026 UASC contributors

//! The service messages the channel layer itself speaks: request/response
//! headers, the open/close secure channel exchange, and service faults.
//! Application service bodies are carried opaquely and are out of scope here.

mod header;
mod secure_channel;

pub use header::{RequestHeader, ResponseHeader};
pub use secure_channel::{
    ChannelSecurityToken, CloseSecureChannelRequest, CloseSecureChannelResponse,
    MessageSecurityMode, OpenSecureChannelRequest, OpenSecureChannelResponse,
    SecurityTokenRequestType, ServiceFault,
};

use crate::node_id::NodeId;

/// Binary encoding ids for the messages the channel layer constructs itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[allow(non_camel_case_types, missing_docs)]
#[repr(u32)]
pub enum ObjectId {
    ServiceFault_Encoding_DefaultBinary = 397,
    OpenSecureChannelRequest_Encoding_DefaultBinary = 446,
    OpenSecureChannelResponse_Encoding_DefaultBinary = 449,
    CloseSecureChannelRequest_Encoding_DefaultBinary = 452,
    CloseSecureChannelResponse_Encoding_DefaultBinary = 455,
}

impl ObjectId {
    /// The namespace-zero numeric node id for this encoding id.
    pub fn as_node_id(&self) -> NodeId {
        NodeId::new(0, *self as u32)
    }
}

impl TryFrom<&NodeId> for ObjectId {
    type Error = ();

    fn try_from(id: &NodeId) -> Result<Self, Self::Error> {
        match id.as_object_id() {
            Some(397) => Ok(ObjectId::ServiceFault_Encoding_DefaultBinary),
            Some(446) => Ok(ObjectId::OpenSecureChannelRequest_Encoding_DefaultBinary),
            Some(449) => Ok(ObjectId::OpenSecureChannelResponse_Encoding_DefaultBinary),
            Some(452) => Ok(ObjectId::CloseSecureChannelRequest_Encoding_DefaultBinary),
            Some(455) => Ok(ObjectId::CloseSecureChannelResponse_Encoding_DefaultBinary),
            _ => Err(()),
        }
    }
}

/// Implemented by messages that know their binary encoding id.
pub trait MessageInfo {
    /// The encoding id of this message.
    fn type_id(&self) -> ObjectId;
}
