use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwap;
use tracing::{debug, error, trace};

use uasc_core::comms::secure_channel::SecureChannel;
use uasc_core::handle::AtomicHandle;
use uasc_core::messages::ResponseMessage;
use uasc_core::sync::RwLock;
use uasc_core::{trace_read_lock, trace_write_lock};
use uasc_crypto::SecurityPolicy;
use uasc_types::{
    DateTime, MessageSecurityMode, OpenSecureChannelRequest, RequestHeader,
    SecurityTokenRequestType, StatusCode,
};

use super::tcp::{Request, RequestSend};

/// The issue/renew state of a client channel: request handles, clock offset
/// and the logic that turns open secure channel responses into installed
/// tokens.
pub(crate) struct SecureChannelState {
    /// Time offset between the client and the server.
    client_offset: ArcSwap<chrono::Duration>,
    /// Ignore clock skew between the client and the server.
    ignore_clock_skew: bool,
    /// Secure channel information.
    secure_channel: Arc<RwLock<SecureChannel>>,
    /// Bounds the revised lifetime must fall into.
    lifetime_bounds: (u32, u32),
    /// The next handle to assign to a request.
    request_handle: AtomicHandle,
}

impl SecureChannelState {
    const FIRST_REQUEST_HANDLE: u32 = 1;

    pub(crate) fn new(
        ignore_clock_skew: bool,
        secure_channel: Arc<RwLock<SecureChannel>>,
        lifetime_bounds: (u32, u32),
    ) -> Self {
        SecureChannelState {
            client_offset: ArcSwap::new(Arc::new(chrono::Duration::zero())),
            ignore_clock_skew,
            secure_channel,
            lifetime_bounds,
            request_handle: AtomicHandle::new(Self::FIRST_REQUEST_HANDLE),
        }
    }

    pub(crate) fn begin_issue_or_renew_secure_channel(
        &self,
        request_type: SecurityTokenRequestType,
        requested_lifetime: u32,
        timeout: Duration,
        sender: RequestSend,
    ) -> Request {
        trace!("issue_or_renew_secure_channel({:?})", request_type);

        let (security_mode, security_policy, client_nonce) = {
            let mut secure_channel = trace_write_lock!(self.secure_channel);
            let client_nonce = secure_channel.security_policy().random_nonce();
            secure_channel.set_local_nonce(client_nonce.as_ref());
            (
                secure_channel.security_mode(),
                secure_channel.security_policy(),
                client_nonce,
            )
        };

        debug!("Making secure channel request");
        debug!("security_mode = {:?}", security_mode);
        debug!("security_policy = {:?}", security_policy);

        let request = OpenSecureChannelRequest {
            request_header: self.make_request_header(timeout),
            client_protocol_version: uasc_core::PROTOCOL_VERSION,
            request_type,
            security_mode,
            client_nonce,
            requested_lifetime,
        };

        Request::new(request, sender, timeout)
    }

    pub(crate) fn set_client_offset(&self, offset: chrono::Duration) {
        // Not strictly thread safe, but only ever called from one task.
        self.client_offset
            .store(Arc::new(**self.client_offset.load() + offset));
        debug!("Client offset set to {}", **self.client_offset.load());
    }

    pub(crate) fn end_issue_or_renew_secure_channel(
        &self,
        response: ResponseMessage,
    ) -> Result<(), StatusCode> {
        let ResponseMessage::OpenSecureChannel(response) = response else {
            error!(
                "Expected an open secure channel response, got {}",
                response.type_name()
            );
            return Err(process_unexpected_response(response));
        };

        let mut security_token = response.security_token.clone();

        // The server clamps the lifetime to its own policy; the client still
        // refuses values outside its configured bounds.
        let (min_lifetime, max_lifetime) = self.lifetime_bounds;
        if security_token.revised_lifetime < min_lifetime
            || (max_lifetime > 0 && security_token.revised_lifetime > max_lifetime)
        {
            error!(
                "Server revised the token lifetime to {} ms, outside [{}, {}]",
                security_token.revised_lifetime, min_lifetime, max_lifetime
            );
            return Err(StatusCode::BadSecurityPolicyRejected);
        }

        // When ignoring clock skew, compute the offset between the client
        // and the server and compensate timestamps both ways with it.
        if self.ignore_clock_skew && !response.response_header.timestamp.is_null() {
            let offset = response.response_header.timestamp - DateTime::now();
            security_token.created_at = security_token.created_at - offset;
            self.set_client_offset(offset);
        }

        debug!("Setting transport's security token");
        {
            let mut secure_channel = trace_write_lock!(self.secure_channel);
            secure_channel.set_client_offset(**self.client_offset.load());
            secure_channel.set_security_token(security_token);

            if secure_channel.security_policy() != SecurityPolicy::None
                && (secure_channel.security_mode() == MessageSecurityMode::Sign
                    || secure_channel.security_mode() == MessageSecurityMode::SignAndEncrypt)
            {
                secure_channel.set_remote_nonce_from_byte_string(&response.server_nonce)?;
                secure_channel.derive_keys();
            }
        }
        Ok(())
    }

    /// Construct a request header for a channel-level request.
    pub(crate) fn make_request_header(&self, timeout: Duration) -> RequestHeader {
        let mut header = RequestHeader::new(
            self.request_handle.next(),
            timeout.as_millis().min(u32::MAX as u128) as u32,
        );
        header.timestamp = DateTime::now_with_offset(**self.client_offset.load());
        header
    }

    pub(crate) fn request_handle(&self) -> u32 {
        self.request_handle.next()
    }

    pub(crate) fn should_renew_security_token(&self) -> bool {
        let secure_channel = trace_read_lock!(self.secure_channel);
        secure_channel.should_renew_security_token()
    }
}

/// A response arrived that no code path expected; map it to the status it
/// carries, or a generic failure.
pub(crate) fn process_unexpected_response(response: ResponseMessage) -> StatusCode {
    match response.service_result() {
        Some(result) if result.is_bad() => result,
        _ => StatusCode::BadUnexpectedError,
    }
}
