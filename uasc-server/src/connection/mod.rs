//! Per-connection machinery: the server transport and the channel
//! controller driving it.

mod controller;
mod transport;

pub use controller::ChannelController;
pub(crate) use transport::{Request, TcpTransport, TransportPollResult};
