//! Accepts transports, bounds the connection pool, and attaches a channel
//! controller to every connection. Also able to dial out with a reverse
//! hello for clients that cannot connect in.

use std::sync::Arc;

use futures::SinkExt;
use tokio::net::{TcpListener, TcpStream};
use tokio_util::codec::Framed;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use uasc_core::comms::codec::{Message, TcpCodec};
use uasc_core::comms::tcp_types::{ErrorMessage, ReverseHelloMessage};
use uasc_core::handle::AtomicHandle;
use uasc_core::sync::RwLock;
use uasc_crypto::CertificateStore;
use uasc_types::StatusCode;

use crate::config::ServerConfig;
use crate::connection::ChannelController;
use crate::service::ServiceHandler;

/// The server listener: owns the bounded connection pool and the channel id
/// allocator shared by all connections.
pub struct Listener<H> {
    config: Arc<ServerConfig>,
    certificate_store: Arc<RwLock<CertificateStore>>,
    handler: Arc<H>,
    secure_channel_ids: Arc<AtomicHandle>,
    connection_permits: Arc<tokio::sync::Semaphore>,
}

impl<H: ServiceHandler> Listener<H> {
    /// Build a listener from its configuration. Identity material is loaded
    /// here, once.
    pub fn new(config: ServerConfig, handler: H) -> Result<Self, StatusCode> {
        config.validate().map_err(|e| {
            error!("Invalid server configuration: {e}");
            StatusCode::BadInvalidArgument
        })?;

        let mut certificate_store = CertificateStore::new();
        certificate_store.set_trust_unknown_certs(config.trust_unknown_certs);
        if let (Some(cert), Some(key)) = (&config.certificate_path, &config.private_key_path) {
            certificate_store.load_identity(cert, key).map_err(|e| {
                error!("Cannot load server identity: {e}");
                StatusCode::BadSecurityChecksFailed
            })?;
        }

        let max_connections = config.limits.max_connections.max(1);
        Ok(Self {
            config: Arc::new(config),
            certificate_store: Arc::new(RwLock::new(certificate_store)),
            handler: Arc::new(handler),
            secure_channel_ids: Arc::new(AtomicHandle::new(1)),
            connection_permits: Arc::new(tokio::sync::Semaphore::new(max_connections)),
        })
    }

    /// The address the listener binds.
    pub fn listen_address(&self) -> String {
        format!(
            "{}:{}",
            self.config.tcp_config.host, self.config.tcp_config.port
        )
    }

    /// Bind the configured address and accept connections until `token` is
    /// cancelled.
    pub async fn run(self, token: CancellationToken) -> Result<(), StatusCode> {
        let address = self.listen_address();
        let listener = TcpListener::bind(&address).await.map_err(|e| {
            error!("Cannot listen on {address}: {e}");
            StatusCode::BadResourceUnavailable
        })?;
        info!("Listening on {address}");
        self.run_with(listener, token).await
    }

    /// Accept connections on an already bound socket until `token` is
    /// cancelled. Every accepted transport runs on its own task;
    /// over-capacity connections are answered with
    /// `BadTcpNotEnoughResources` and dropped.
    pub async fn run_with(
        self,
        listener: TcpListener,
        token: CancellationToken,
    ) -> Result<(), StatusCode> {
        loop {
            tokio::select! {
                _ = token.cancelled() => {
                    info!("Listener stopping");
                    break;
                }
                accepted = listener.accept() => {
                    match accepted {
                        Ok((stream, peer)) => {
                            debug!("Accepted connection from {peer}");
                            self.spawn_connection(stream, token.child_token());
                        }
                        Err(e) => {
                            warn!("Accept failed: {e}");
                        }
                    }
                }
            }
        }
        Ok(())
    }

    /// Dial out to a client, announce ourselves with a reverse hello, then
    /// serve the connection exactly as an accepted one.
    pub async fn reverse_connect(
        &self,
        client_address: &str,
        endpoint_url: &str,
        token: CancellationToken,
    ) -> Result<(), StatusCode> {
        let stream = TcpStream::connect(client_address).await.map_err(|e| {
            error!("Reverse connect to {client_address} failed: {e}");
            StatusCode::BadConnectionRejected
        })?;

        let mut framed = Framed::new(
            stream,
            TcpCodec::new(0, self.config.decoding_options()),
        );
        let reverse_hello =
            ReverseHelloMessage::new(&self.config.application_uri, endpoint_url);
        framed
            .send(Message::ReverseHello(reverse_hello))
            .await
            .map_err(|e| {
                error!("Failed to send reverse hello: {e}");
                StatusCode::BadCommunicationError
            })?;

        let stream = framed.into_inner();
        self.spawn_connection(stream, token);
        Ok(())
    }

    fn spawn_connection(&self, stream: TcpStream, token: CancellationToken) {
        let permit = match self.connection_permits.clone().try_acquire_owned() {
            Ok(permit) => permit,
            Err(_) => {
                warn!("Connection pool exhausted, refusing connection");
                tokio::spawn(refuse_connection(stream, self.config.clone()));
                return;
            }
        };

        let controller = ChannelController::new(
            stream,
            self.config.clone(),
            self.certificate_store.clone(),
            self.secure_channel_ids.clone(),
            self.handler.clone(),
        );
        tokio::spawn(async move {
            controller.run(token).await;
            drop(permit);
        });
    }
}

/// Tell an over-capacity peer why it is being dropped, then drop it.
async fn refuse_connection(stream: TcpStream, config: Arc<ServerConfig>) {
    let mut framed = Framed::new(stream, TcpCodec::new(0, config.decoding_options()));
    let error = ErrorMessage::new(
        StatusCode::BadTcpNotEnoughResources,
        "server has no connections left",
    );
    if let Err(e) = framed.send(Message::Error(error)).await {
        debug!("Failed to send refusal: {e}");
    }
    let _ = framed.close().await;
}
