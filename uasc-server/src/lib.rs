//! Server half of the UASC secure-channel stack.
//!
//! [`Listener`] accepts transports (or dials out with a reverse hello),
//! keeps the connection pool bounded, and runs one
//! [`connection::ChannelController`] per transport: hello negotiation, the
//! open/renew exchange, symmetric message verification, and dispatch of
//! opaque service messages to the application's [`ServiceHandler`].

pub mod config;
pub mod connection;
pub mod listener;
pub mod service;

pub use config::{ServerConfig, ServerLimits, TcpConfig};
pub use listener::Listener;
pub use service::ServiceHandler;
