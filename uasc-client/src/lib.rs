//! Client half of the UASC secure-channel stack.
//!
//! [`AsyncSecureChannel`] owns one secure conversation with a server: it
//! dials the transport (or accepts a reverse hello), runs the hello and open
//! exchanges, renews the token before it expires, pairs responses to pending
//! requests, and tears everything down on close. Application payloads are
//! opaque: callers hand in a type id and encoded body and get the response
//! body back.

pub mod channel;
pub mod retry;
pub mod transport;

pub use channel::{AsyncSecureChannel, EndpointInfo, SecureChannelEventLoop};
pub use retry::SessionRetryPolicy;
pub use transport::{Connector, ReverseConnector, TcpConnector, TransportConfiguration};
