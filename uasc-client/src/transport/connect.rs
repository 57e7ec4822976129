//! Connector port: something that can produce a connected, hello-negotiated
//! transport. The default dials TCP; the reverse connector waits for a
//! server that dials us.

use std::sync::Arc;

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio_util::codec::Framed;
use tracing::{debug, error};

use uasc_core::comms::codec::{Message, TcpCodec};
use uasc_core::comms::secure_channel::SecureChannel;
use uasc_core::comms::tcp_types::HelloMessage;
use uasc_core::comms::url::is_opc_ua_binary_url;
use uasc_core::sync::RwLock;
use uasc_core::trace_write_lock;
use uasc_types::{DecodingOptions, StatusCode};

use super::tcp::TcpTransport;
use super::{OutgoingMessage, TransportConfiguration};

/// Builds a connected transport for a channel.
#[async_trait]
pub trait Connector: Send + Sync {
    /// Establish the transport and run the hello exchange.
    async fn connect(
        &self,
        secure_channel: Arc<RwLock<SecureChannel>>,
        outgoing: tokio::sync::mpsc::Receiver<OutgoingMessage>,
        config: TransportConfiguration,
        endpoint_url: &str,
    ) -> Result<TcpTransport, StatusCode>;
}

/// The ordinary connector: dial TCP, send hello, await acknowledge.
#[derive(Debug, Default)]
pub struct TcpConnector;

#[async_trait]
impl Connector for TcpConnector {
    async fn connect(
        &self,
        secure_channel: Arc<RwLock<SecureChannel>>,
        outgoing: tokio::sync::mpsc::Receiver<OutgoingMessage>,
        config: TransportConfiguration,
        endpoint_url: &str,
    ) -> Result<TcpTransport, StatusCode> {
        let stream = connect_stream(endpoint_url).await?;
        let hello_timeout = config.hello_timeout;
        tokio::time::timeout(
            hello_timeout,
            hello_handshake(stream, secure_channel, outgoing, config, endpoint_url),
        )
        .await
        .map_err(|_| {
            error!("Timed out waiting for the hello exchange");
            StatusCode::BadTimeout
        })?
    }
}

/// Reverse-hello ingress: listen for a server that dials out, read its
/// `RHE`, then proceed exactly as the connecting role.
#[derive(Debug)]
pub struct ReverseConnector {
    listen_address: String,
}

impl ReverseConnector {
    /// A connector awaiting a reverse hello on `listen_address`.
    pub fn new(listen_address: impl Into<String>) -> Self {
        Self {
            listen_address: listen_address.into(),
        }
    }
}

#[async_trait]
impl Connector for ReverseConnector {
    async fn connect(
        &self,
        secure_channel: Arc<RwLock<SecureChannel>>,
        outgoing: tokio::sync::mpsc::Receiver<OutgoingMessage>,
        config: TransportConfiguration,
        endpoint_url: &str,
    ) -> Result<TcpTransport, StatusCode> {
        let listener = TcpListener::bind(&self.listen_address).await.map_err(|e| {
            error!("Cannot listen on {}: {e}", self.listen_address);
            StatusCode::BadConnectionRejected
        })?;
        let hello_timeout = config.hello_timeout;
        tokio::time::timeout(hello_timeout, async move {
            let (stream, peer) = listener.accept().await.map_err(|e| {
                error!("Reverse hello accept failed: {e}");
                StatusCode::BadConnectionRejected
            })?;
            debug!("Reverse hello connection from {peer}");

            // The server speaks first with an RHE; everything after is the
            // ordinary hello exchange with the roles back to normal.
            let mut framed = Framed::new(
                stream,
                TcpCodec::new(0, DecodingOptions::default()),
            );
            let reverse_hello = match framed.next().await {
                Some(Ok(Message::ReverseHello(m))) => m,
                Some(Ok(_)) => {
                    error!("Peer did not open with a reverse hello");
                    return Err(StatusCode::BadTcpMessageTypeInvalid);
                }
                Some(Err(e)) => return Err(e.status()),
                None => return Err(StatusCode::BadConnectionClosed),
            };
            let endpoint_url = if endpoint_url.is_empty() {
                reverse_hello.endpoint_url.as_ref().to_string()
            } else {
                endpoint_url.to_string()
            };
            hello_handshake_framed(framed, secure_channel, outgoing, config, &endpoint_url).await
        })
        .await
        .map_err(|_| StatusCode::BadTimeout)?
    }
}

async fn connect_stream(endpoint_url: &str) -> Result<TcpStream, StatusCode> {
    if !is_opc_ua_binary_url(endpoint_url) {
        error!("Endpoint url {endpoint_url} is not opc.tcp");
        return Err(StatusCode::BadTcpEndpointUrlInvalid);
    }
    let url = url::Url::parse(endpoint_url).map_err(|_| StatusCode::BadTcpEndpointUrlInvalid)?;
    let host = url
        .host_str()
        .ok_or(StatusCode::BadTcpEndpointUrlInvalid)?
        .to_string();
    let port = url.port().unwrap_or(4840);

    debug!("Connecting to {host}:{port}");
    TcpStream::connect((host.as_str(), port)).await.map_err(|e| {
        error!("Could not connect to {host}:{port}: {e}");
        StatusCode::BadConnectionRejected
    })
}

async fn hello_handshake(
    stream: TcpStream,
    secure_channel: Arc<RwLock<SecureChannel>>,
    outgoing: tokio::sync::mpsc::Receiver<OutgoingMessage>,
    config: TransportConfiguration,
    endpoint_url: &str,
) -> Result<TcpTransport, StatusCode> {
    let framed = Framed::new(stream, TcpCodec::new(0, DecodingOptions::default()));
    hello_handshake_framed(framed, secure_channel, outgoing, config, endpoint_url).await
}

async fn hello_handshake_framed(
    mut framed: Framed<TcpStream, TcpCodec>,
    secure_channel: Arc<RwLock<SecureChannel>>,
    outgoing: tokio::sync::mpsc::Receiver<OutgoingMessage>,
    config: TransportConfiguration,
    endpoint_url: &str,
) -> Result<TcpTransport, StatusCode> {
    let hello = HelloMessage::new(
        endpoint_url,
        config.recv_buffer_size as u32,
        config.send_buffer_size as u32,
        config.max_message_size as u32,
        config.max_chunk_count as u32,
    );
    framed.send(Message::Hello(hello)).await.map_err(|e| {
        error!("Failed to send hello: {e}");
        StatusCode::BadCommunicationError
    })?;

    let ack = match framed.next().await {
        Some(Ok(Message::Acknowledge(ack))) => ack,
        Some(Ok(Message::Error(e))) => {
            error!("Server rejected the hello: {}", e.status_code());
            return Err(e.status_code());
        }
        Some(Ok(_)) => {
            error!("Server answered the hello with an unexpected message type");
            return Err(StatusCode::BadTcpMessageTypeInvalid);
        }
        Some(Err(e)) => return Err(e.status()),
        None => return Err(StatusCode::BadConnectionClosed),
    };
    debug!(
        "Negotiated limits: send {} recv {} max_message {} max_chunks {}",
        ack.receive_buffer_size, ack.send_buffer_size, ack.max_message_size, ack.max_chunk_count
    );

    // The server's receive buffer bounds our sends; its send buffer bounds
    // what we must accept.
    let send_buffer_size = ack.receive_buffer_size as usize;
    let recv_buffer_size = ack.send_buffer_size as usize;
    let max_message_size = ack.max_message_size as usize;
    let max_chunk_count = ack.max_chunk_count as usize;

    {
        let mut secure_channel = trace_write_lock!(secure_channel);
        let mut options = secure_channel.decoding_options().clone();
        options.max_message_size = max_message_size;
        options.max_chunk_count = max_chunk_count;
        secure_channel.set_decoding_options(options);
    }
    framed.codec_mut().set_max_chunk_size(recv_buffer_size);

    Ok(TcpTransport::new(
        framed,
        secure_channel,
        outgoing,
        send_buffer_size,
        max_message_size,
        max_chunk_count,
    ))
}
