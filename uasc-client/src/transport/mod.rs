//! The client transport: framed TCP IO, the pending-request table and the
//! connector port that builds transports.

mod connect;
pub(crate) mod state;
pub(crate) mod tcp;

pub use connect::{Connector, ReverseConnector, TcpConnector};
pub use tcp::{TcpTransport, TransportPollResult};

use std::time::{Duration, Instant};

use uasc_core::messages::{RequestMessage, ResponseMessage};
use uasc_types::StatusCode;

/// A request on its way out, with the callback the response resolves.
pub struct OutgoingMessage {
    /// The request to send.
    pub request: RequestMessage,
    /// Where to deliver the response; `None` for fire-and-forget messages
    /// like close secure channel.
    pub callback: Option<tokio::sync::oneshot::Sender<Result<ResponseMessage, StatusCode>>>,
    /// When the requester stops caring. Firing the deadline is local only,
    /// no wire traffic results.
    pub deadline: Instant,
}

/// Transport tuning and negotiation proposals.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct TransportConfiguration {
    /// Largest chunk we are willing to receive.
    pub recv_buffer_size: usize,
    /// Largest chunk we propose to send.
    pub send_buffer_size: usize,
    /// Largest reassembled message we accept, 0 for no limit.
    pub max_message_size: usize,
    /// Largest chunk count per message we accept, 0 for no limit.
    pub max_chunk_count: usize,
    /// Ceiling on the hello/acknowledge exchange.
    pub hello_timeout: Duration,
}

impl Default for TransportConfiguration {
    fn default() -> Self {
        Self {
            recv_buffer_size: 65_535,
            send_buffer_size: 65_535,
            max_message_size: 2 * 1024 * 1024,
            max_chunk_count: 64,
            hello_timeout: Duration::from_secs(10),
        }
    }
}
