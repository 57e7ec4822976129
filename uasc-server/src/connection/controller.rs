use std::pin::Pin;
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::future::Either;
use futures::stream::FuturesUnordered;
use futures::{Future, StreamExt};
use tokio::net::TcpStream;
use tokio_util::sync::CancellationToken;
use tracing::{debug, debug_span, error, trace, warn};
use tracing_futures::Instrument;

use uasc_core::comms::secure_channel::{Role, SecureChannel};
use uasc_core::comms::security_header::SecurityHeader;
use uasc_core::comms::tcp_types::ErrorMessage;
use uasc_core::handle::AtomicHandle;
use uasc_core::messages::{RequestMessage, ResponseMessage};
use uasc_core::sync::RwLock;
use uasc_core::trace_read_lock;
use uasc_crypto::{CertificateStore, SecurityPolicy};
use uasc_types::{
    ChannelSecurityToken, DateTime, MessageSecurityMode, OpenSecureChannelRequest,
    OpenSecureChannelResponse, ResponseHeader, SecurityTokenRequestType, ServiceFault, StatusCode,
};

use crate::config::ServerConfig;
use crate::service::ServiceHandler;

use super::transport::{Request, TcpTransport, TransportPollResult};

/// A response paired with the request id its chunks must echo.
pub(crate) struct Response {
    pub message: ResponseMessage,
    pub request_id: u32,
}

type PendingMessageResponse = dyn Future<Output = Result<Response, StatusCode>> + Send + 'static;

enum RequestProcessResult {
    Ok,
    Close,
}

/// Master type managing a single connection: the transport below, the
/// secure-channel state in the middle, and the service handler above.
pub struct ChannelController<H> {
    secure_channel: SecureChannel,
    transport: TcpTransport,
    channel_state: SecureChannelState,
    certificate_store: Arc<RwLock<CertificateStore>>,
    handler: Arc<H>,
    config: Arc<ServerConfig>,
    pending_messages: FuturesUnordered<Pin<Box<PendingMessageResponse>>>,
    /// Hello deadline at first, then the token renewal deadline.
    deadline: Instant,
    /// Set once the channel reported `on_open`.
    opened: bool,
    close_status: StatusCode,
}

impl<H: ServiceHandler> ChannelController<H> {
    pub(crate) fn new(
        stream: TcpStream,
        config: Arc<ServerConfig>,
        certificate_store: Arc<RwLock<CertificateStore>>,
        secure_channel_ids: Arc<AtomicHandle>,
        handler: Arc<H>,
    ) -> Self {
        let mut secure_channel = SecureChannel::new(Role::Server, config.decoding_options());
        {
            let store = trace_read_lock!(certificate_store);
            secure_channel.set_cert(store.read_own_cert().cloned());
            secure_channel.set_private_key(store.read_own_pkey().cloned());
        }

        Self {
            secure_channel,
            transport: TcpTransport::new(stream, config.clone()),
            channel_state: SecureChannelState::new(secure_channel_ids),
            certificate_store,
            handler,
            pending_messages: FuturesUnordered::new(),
            deadline: Instant::now()
                + Duration::from_secs(u64::from(config.tcp_config.hello_timeout)),
            config,
            opened: false,
            close_status: StatusCode::Good,
        }
    }

    /// Run the connection to completion.
    pub async fn run(mut self, token: CancellationToken) {
        loop {
            let resp_fut = if self.pending_messages.is_empty() {
                Either::Left(futures::future::pending::<Option<Result<Response, StatusCode>>>())
            } else {
                Either::Right(self.pending_messages.next())
            };

            tokio::select! {
                _ = tokio::time::sleep_until(self.deadline.into()) => {
                    warn!("Channel deadline elapsed, closing");
                    self.fatal_error(StatusCode::BadTimeout, "Timeout");
                }
                _ = token.cancelled() => {
                    self.fatal_error(StatusCode::BadServerHalted, "Server stopped");
                }
                msg = resp_fut => {
                    let msg = match msg {
                        Some(Ok(x)) => x,
                        Some(Err(e)) => {
                            error!("Service handler failed: {e}");
                            self.fatal_error(StatusCode::BadInternalError, "Internal error");
                            continue;
                        }
                        // Cannot happen, pending_messages is non-empty or
                        // this future never resolves.
                        None => unreachable!(),
                    };
                    if let Err(e) = self.transport.enqueue_message_for_send(
                        &mut self.secure_channel,
                        msg.message,
                        msg.request_id,
                    ) {
                        error!("Failed to send response: {e}");
                        self.fatal_error(e, "Encoding error");
                    }
                }
                res = self.transport.poll(&mut self.secure_channel) => {
                    match res {
                        TransportPollResult::IncomingMessage(req) => {
                            if matches!(
                                self.process_request(req).await,
                                RequestProcessResult::Close
                            ) {
                                self.transport.set_closing();
                            }
                        }
                        TransportPollResult::MessageAborted { request_id, status, reason } => {
                            debug!(
                                "Request {request_id} aborted by the client: {status} {reason}"
                            );
                            self.handler
                                .on_abort(self.secure_channel.secure_channel_id(), request_id, status)
                                .await;
                        }
                        TransportPollResult::RecoverableError { request_id, status } => {
                            warn!("Request {request_id} failed to decode: {status}");
                            // The request handle is unknowable here; the
                            // client pairs the fault by request id.
                            let fault = ServiceFault::new(0, status).into();
                            if let Err(e) = self.transport.enqueue_message_for_send(
                                &mut self.secure_channel,
                                fault,
                                request_id,
                            ) {
                                error!("Failed to send fault: {e}");
                                self.fatal_error(e, "Encoding error");
                            }
                        }
                        TransportPollResult::Error(status) => {
                            error!("Fatal transport error: {status}");
                            self.close_status = StatusCode::BadSecureChannelClosed;
                            self.fatal_error(status, "Transport error");
                        }
                        TransportPollResult::Closed => break,
                        TransportPollResult::Continue => (),
                    }
                }
            }
        }

        if self.opened {
            let status = if self.close_status.is_good() {
                StatusCode::BadSecureChannelClosed
            } else {
                self.close_status
            };
            self.handler
                .on_close(self.secure_channel.secure_channel_id(), status)
                .await;
        }
    }

    /// Queue an error for the peer and begin teardown. The error carries no
    /// cryptographic detail.
    fn fatal_error(&mut self, status: StatusCode, reason: &str) {
        if self.close_status.is_good() {
            self.close_status = status;
        }
        if !self.transport.is_closing() {
            self.transport.enqueue_error(ErrorMessage::new(status, reason));
        }
        self.transport.set_closing();
    }

    async fn process_request(&mut self, req: Request) -> RequestProcessResult {
        let span = debug_span!(
            "Incoming request",
            request_id = req.request_id,
            request_type = %req.message.type_name(),
            request_handle = req.message.request_handle(),
        );

        let id = req.request_id;
        match req.message {
            RequestMessage::OpenSecureChannel(r) => {
                let _h = span.enter();
                let res = self.open_secure_channel(
                    &req.chunk_info.security_header,
                    self.transport.client_protocol_version,
                    &r,
                );
                if res.is_ok() {
                    self.deadline = self.secure_channel.token_renewal_deadline();
                }
                match res {
                    Ok(response) => {
                        let was_open = self.opened;
                        match self.transport.enqueue_message_for_send(
                            &mut self.secure_channel,
                            response,
                            id,
                        ) {
                            Ok(_) => {
                                if !was_open {
                                    self.opened = true;
                                    self.handler
                                        .on_open(self.secure_channel.secure_channel_id())
                                        .await;
                                }
                                RequestProcessResult::Ok
                            }
                            Err(e) => {
                                error!("Failed to send open secure channel response: {e}");
                                RequestProcessResult::Close
                            }
                        }
                    }
                    Err(e) => {
                        let _ = self.transport.enqueue_message_for_send(
                            &mut self.secure_channel,
                            ServiceFault::new(r.request_header.request_handle, e).into(),
                            id,
                        );
                        RequestProcessResult::Close
                    }
                }
            }

            RequestMessage::CloseSecureChannel(_r) => {
                debug!("Close secure channel");
                // A close request is never answered.
                RequestProcessResult::Close
            }

            RequestMessage::Service(message) => {
                if !self.opened {
                    error!("Service request before the channel was opened");
                    return RequestProcessResult::Close;
                }
                let channel_id = self.secure_channel.secure_channel_id();
                let request_handle = message.request_handle;
                let handler = self.handler.clone();
                self.pending_messages.push(Box::pin(
                    async move {
                        match handler.handle(channel_id, message).await {
                            Ok(response) => Ok(Response {
                                message: ResponseMessage::Service(response),
                                request_id: id,
                            }),
                            Err(status) => {
                                // A service error is local to this request.
                                debug!("Service handler returned {status}");
                                Ok(Response {
                                    message: ServiceFault::new(request_handle, status).into(),
                                    request_id: id,
                                })
                            }
                        }
                    }
                    .instrument(span.clone()),
                ));
                RequestProcessResult::Ok
            }
        }
    }

    fn open_secure_channel(
        &mut self,
        security_header: &SecurityHeader,
        client_protocol_version: u32,
        request: &OpenSecureChannelRequest,
    ) -> Result<ResponseMessage, StatusCode> {
        let SecurityHeader::Asymmetric(_security_header) = security_header else {
            error!("Open secure channel request does not have an asymmetric security header");
            return Err(StatusCode::BadUnexpectedError);
        };

        // Must match the version from the hello.
        if request.client_protocol_version != client_protocol_version {
            error!(
                "Client sent a different protocol version than it did in the HELLO - {} vs {}",
                request.client_protocol_version, client_protocol_version
            );
            return Err(StatusCode::BadProtocolVersionUnsupported);
        }

        // The policy was adopted from the chunk header when it was verified;
        // here the endpoint decides whether it is acceptable.
        let security_policy = self.secure_channel.security_policy();
        let security_mode = request.security_mode;
        if !self.config.is_policy_allowed(security_policy, security_mode) {
            error!(
                "Endpoint does not allow policy {security_policy} with mode {security_mode}"
            );
            return Err(StatusCode::BadSecurityPolicyRejected);
        }

        // For a secured channel the client certificate must pass the store's
        // checks before any token is issued.
        if security_policy != SecurityPolicy::None {
            let Some(remote_cert) = self.secure_channel.remote_cert() else {
                error!("Secured open without a client certificate");
                return Err(StatusCode::BadCertificateInvalid);
            };
            let store = trace_read_lock!(self.certificate_store);
            let verdict = store.validate_peer_cert(remote_cert);
            if verdict.is_bad() {
                error!("Client certificate rejected: {verdict}");
                return Err(verdict);
            }
        }

        let secure_channel_id = match request.request_type {
            SecurityTokenRequestType::Issue => {
                trace!("Request type == Issue");
                if self.channel_state.issued {
                    error!("Asked to issue a token on a channel that already has one");
                    return Err(StatusCode::BadInvalidState);
                }
                self.channel_state.create_secure_channel_id()
            }
            SecurityTokenRequestType::Renew => {
                trace!("Request type == Renew");

                // A renew must not reuse the nonce of the previous open.
                if security_policy != SecurityPolicy::None
                    && request.client_nonce.as_ref() == self.secure_channel.remote_nonce()
                {
                    error!("Client reused a nonce for a renew");
                    return Err(StatusCode::BadNonceInvalid);
                }
                if !self.channel_state.issued {
                    error!("Asked to renew a token on a channel that never had one");
                    return Err(StatusCode::BadInvalidState);
                }
                // Mode and policy are fixed at issue time.
                if security_mode != self.secure_channel.security_mode() {
                    error!("Renew attempted to change the security mode");
                    return Err(StatusCode::BadSecurityModeRejected);
                }
                self.secure_channel.secure_channel_id()
            }
        };

        debug!("Message security mode == {:?}", security_mode);
        if security_mode == MessageSecurityMode::Invalid {
            error!("Security mode is invalid");
            return Err(StatusCode::BadSecurityModeRejected);
        }

        let token_id = self.channel_state.create_token_id();
        self.secure_channel.set_security_mode(security_mode);
        self.secure_channel.set_secure_channel_id(secure_channel_id);

        let revised_lifetime = self.config.revise_lifetime(request.requested_lifetime);

        self.secure_channel
            .set_remote_nonce_from_byte_string(&request.client_nonce)?;
        self.secure_channel.create_random_nonce();
        self.secure_channel.issue_token(token_id, revised_lifetime);
        if security_policy != SecurityPolicy::None
            && (security_mode == MessageSecurityMode::Sign
                || security_mode == MessageSecurityMode::SignAndEncrypt)
        {
            self.secure_channel.derive_keys();
        }
        self.channel_state.issued = true;

        let response = OpenSecureChannelResponse {
            response_header: ResponseHeader::new_good(&request.request_header),
            server_protocol_version: uasc_core::PROTOCOL_VERSION,
            security_token: ChannelSecurityToken {
                channel_id: secure_channel_id,
                token_id,
                created_at: DateTime::now(),
                revised_lifetime,
            },
            server_nonce: self.secure_channel.local_nonce_as_byte_string(),
        };
        Ok(response.into())
    }
}

/// Book-keeping for token issue and renew on one channel.
struct SecureChannelState {
    /// Whether a token was ever issued on this channel.
    issued: bool,
    /// Channel id allocator shared across the listener.
    secure_channel_ids: Arc<AtomicHandle>,
    /// Last token id handed out; token ids are monotonic per channel and
    /// never reused.
    last_token_id: u32,
}

impl SecureChannelState {
    fn new(secure_channel_ids: Arc<AtomicHandle>) -> Self {
        Self {
            issued: false,
            secure_channel_ids,
            last_token_id: 0,
        }
    }

    fn create_secure_channel_id(&mut self) -> u32 {
        self.secure_channel_ids.next()
    }

    fn create_token_id(&mut self) -> u32 {
        self.last_token_id += 1;
        self.last_token_id
    }
}
