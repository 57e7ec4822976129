//! Wrapper around an open secure channel.

use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwapOption;
use tracing::{debug, error};

use uasc_core::comms::secure_channel::{Role, SecureChannel};
use uasc_core::messages::{RequestMessage, ResponseMessage, ServiceMessage};
use uasc_core::sync::RwLock;
use uasc_core::{trace_read_lock, trace_write_lock};
use uasc_crypto::{CertificateStore, SecurityPolicy};
use uasc_types::{
    ByteString, CloseSecureChannelRequest, DecodingOptions, MessageSecurityMode, NodeId,
    SecurityTokenRequestType, StatusCode,
};

use crate::retry::SessionRetryPolicy;
use crate::transport::state::SecureChannelState;
use crate::transport::tcp::{Request, RequestSend};
use crate::transport::{Connector, OutgoingMessage, TcpTransport, TransportConfiguration};
use crate::transport::TransportPollResult;

// An arbitrary safety net against a stuck event loop filling the queue.
const MAX_INFLIGHT_MESSAGES: usize = 65_536;

/// What the channel needs to know about the endpoint it opens against.
#[derive(Debug, Clone)]
pub struct EndpointInfo {
    /// URL the channel dials.
    pub endpoint_url: String,
    /// Security policy URI to open with.
    pub security_policy_uri: String,
    /// Security mode to open with.
    pub security_mode: MessageSecurityMode,
    /// The server certificate in DER, if known up front. Required for any
    /// policy but `None`.
    pub server_certificate: ByteString,
}

/// Wrapper around an open secure channel.
pub struct AsyncSecureChannel {
    endpoint: EndpointInfo,
    session_retry_policy: SessionRetryPolicy,
    secure_channel: Arc<RwLock<SecureChannel>>,
    certificate_store: Arc<RwLock<CertificateStore>>,
    transport_config: TransportConfiguration,
    state: SecureChannelState,
    issue_channel_lock: tokio::sync::Mutex<()>,
    connector: Box<dyn Connector>,
    channel_lifetime: u32,

    request_send: ArcSwapOption<RequestSend>,
}

/// Polls the transport of a connected channel.
pub struct SecureChannelEventLoop {
    transport: TcpTransport,
}

impl std::fmt::Debug for SecureChannelEventLoop {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SecureChannelEventLoop").finish()
    }
}

impl SecureChannelEventLoop {
    /// Drive the connection one step.
    pub async fn poll(&mut self) -> TransportPollResult {
        self.transport.poll().await
    }

    /// Poll until the transport closes, returning the final status.
    pub async fn run(&mut self) -> StatusCode {
        loop {
            if let TransportPollResult::Closed(status) = self.poll().await {
                return status;
            }
        }
    }
}

impl AsyncSecureChannel {
    /// Create a new client secure channel.
    pub fn new(
        certificate_store: Arc<RwLock<CertificateStore>>,
        endpoint: EndpointInfo,
        session_retry_policy: SessionRetryPolicy,
        transport_config: TransportConfiguration,
        connector: Box<dyn Connector>,
        channel_lifetime: u32,
        lifetime_bounds: (u32, u32),
        ignore_clock_skew: bool,
    ) -> Self {
        let secure_channel = Arc::new(RwLock::new(SecureChannel::new(
            Role::Client,
            DecodingOptions::default(),
        )));

        Self {
            endpoint,
            session_retry_policy,
            state: SecureChannelState::new(
                ignore_clock_skew,
                secure_channel.clone(),
                lifetime_bounds,
            ),
            secure_channel,
            certificate_store,
            transport_config,
            issue_channel_lock: tokio::sync::Mutex::new(()),
            connector,
            channel_lifetime,
            request_send: Default::default(),
        }
    }

    /// The security policy of the channel.
    pub fn security_policy(&self) -> SecurityPolicy {
        let secure_channel = trace_read_lock!(self.secure_channel);
        secure_channel.security_policy()
    }

    /// The server-assigned channel id, zero before connect.
    pub fn secure_channel_id(&self) -> u32 {
        let secure_channel = trace_read_lock!(self.secure_channel);
        secure_channel.secure_channel_id()
    }

    /// The next request handle on the channel.
    pub fn request_handle(&self) -> u32 {
        self.state.request_handle()
    }

    /// Send a message on the secure channel and wait for the response,
    /// renewing the security token first if it is due.
    pub async fn send(
        &self,
        request: impl Into<RequestMessage>,
        timeout: Duration,
    ) -> Result<ResponseMessage, StatusCode> {
        let Some(send) = self.request_send.load().as_deref().cloned() else {
            return Err(StatusCode::BadNotConnected);
        };

        if self.state.should_renew_security_token() {
            // Take the lock, then check again; this avoids renewing more
            // than once when many requests race past the deadline.
            let guard = self.issue_channel_lock.lock().await;
            if self.state.should_renew_security_token() {
                let request = self.state.begin_issue_or_renew_secure_channel(
                    SecurityTokenRequestType::Renew,
                    self.channel_lifetime,
                    Duration::from_secs(30),
                    send.clone(),
                );
                let response = request.send().await?;
                self.state.end_issue_or_renew_secure_channel(response)?;
            }
            drop(guard);
        }

        Request::new(request, send, timeout).send().await
    }

    /// The service-layer egress: send an opaque request body and return the
    /// opaque response. A service fault resolves to its carried status.
    pub async fn send_service(
        &self,
        type_id: NodeId,
        body: Vec<u8>,
        request_handle: u32,
        timeout: Duration,
    ) -> Result<ServiceMessage, StatusCode> {
        let message = ServiceMessage {
            type_id,
            request_handle,
            body,
        };
        match self.send(RequestMessage::Service(message), timeout).await? {
            ResponseMessage::Service(response) => Ok(response),
            ResponseMessage::ServiceFault(fault) => {
                Err(fault.response_header.service_result)
            }
            other => {
                error!("Service request got a {} response", other.type_name());
                Err(StatusCode::BadUnexpectedError)
            }
        }
    }

    /// Attempt to establish a connection, retrying per the session retry
    /// policy, returning an event loop for polling the connection.
    pub async fn connect(&self) -> Result<SecureChannelEventLoop, StatusCode> {
        self.request_send.store(None);
        let mut backoff = self.session_retry_policy.new_backoff();
        loop {
            match self.connect_no_retry().await {
                Ok(event_loop) => break Ok(event_loop),
                Err(s) => {
                    let Some(delay) = backoff.next() else {
                        break Err(s);
                    };
                    debug!("Connect failed with {s}, retrying in {delay:?}");
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }

    /// Connect to the server without attempting to retry if it fails.
    pub async fn connect_no_retry(&self) -> Result<SecureChannelEventLoop, StatusCode> {
        {
            let mut secure_channel = trace_write_lock!(self.secure_channel);
            secure_channel.clear_security_token();
        }

        let (mut transport, send) = self.create_transport().await?;

        let request = self.state.begin_issue_or_renew_secure_channel(
            SecurityTokenRequestType::Issue,
            self.channel_lifetime,
            self.transport_config.hello_timeout,
            send.clone(),
        );

        let request_fut = request.send();
        tokio::pin!(request_fut);

        // Poll the transport ourselves while waiting for the open response.
        let response = loop {
            tokio::select! {
                r = &mut request_fut => break r?,
                r = transport.poll() => {
                    if let TransportPollResult::Closed(e) = r {
                        return Err(e);
                    }
                }
            }
        };

        self.request_send.store(Some(Arc::new(send)));
        self.state.end_issue_or_renew_secure_channel(response)?;

        Ok(SecureChannelEventLoop { transport })
    }

    async fn create_transport(
        &self,
    ) -> Result<(TcpTransport, tokio::sync::mpsc::Sender<OutgoingMessage>), StatusCode> {
        let security_policy = SecurityPolicy::from_str(&self.endpoint.security_policy_uri)
            .unwrap_or(SecurityPolicy::Unknown);
        if security_policy == SecurityPolicy::Unknown {
            error!(
                "Security policy \"{}\" is unknown",
                self.endpoint.security_policy_uri
            );
            return Err(StatusCode::BadSecurityPolicyRejected);
        }

        let (cert, key) = {
            let certificate_store = trace_read_lock!(self.certificate_store);
            (
                certificate_store.read_own_cert().cloned(),
                certificate_store.read_own_pkey().cloned(),
            )
        };

        {
            let mut secure_channel = trace_write_lock!(self.secure_channel);
            secure_channel.set_private_key(key);
            secure_channel.set_cert(cert);
            secure_channel.set_security_policy(security_policy);
            secure_channel.set_security_mode(self.endpoint.security_mode);
            if security_policy != SecurityPolicy::None {
                secure_channel
                    .set_remote_cert_from_byte_string(&self.endpoint.server_certificate)?;
            }
            debug!("Security policy = {:?}", security_policy);
            debug!("Security mode = {:?}", self.endpoint.security_mode);
        }

        let (send, recv) = tokio::sync::mpsc::channel(MAX_INFLIGHT_MESSAGES);
        let transport = self
            .connector
            .connect(
                self.secure_channel.clone(),
                recv,
                self.transport_config.clone(),
                &self.endpoint.endpoint_url,
            )
            .await?;

        Ok((transport, send))
    }

    /// Close the secure channel; the server tears the connection down
    /// without answering.
    pub async fn close_channel(&self) {
        let request = CloseSecureChannelRequest {
            request_header: self.state.make_request_header(Duration::from_secs(60)),
        };

        let sender = self.request_send.load().as_deref().cloned();
        if let Some(sender) = sender {
            let request = Request::new(request, sender, Duration::from_secs(60));
            if let Err(e) = request.send_no_response().await {
                error!("Failed to send close secure channel request: {e}");
            }
        }
        self.request_send.store(None);
    }
}
