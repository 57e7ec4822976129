//! The client transport event loop: one poll call makes one unit of
//! progress, whether that is writing an outgoing request, handling an
//! incoming frame, or expiring a pending request.

use std::sync::Arc;
use std::time::Instant;

use futures::{SinkExt, StreamExt};
use hashbrown::HashMap;
use tokio::net::TcpStream;
use tokio_util::codec::Framed;
use tracing::{debug, error, warn};

use uasc_core::comms::codec::{Message, TcpCodec};
use uasc_core::comms::message_reader::{MessageReceiver, ReceivedMessage};
use uasc_core::comms::message_writer::MessageWriter;
use uasc_core::comms::secure_channel::SecureChannel;
use uasc_core::messages::{RequestMessage, ResponseMessage};
use uasc_core::sync::RwLock;
use uasc_core::{trace_read_lock, trace_write_lock};
use uasc_types::StatusCode;

use super::OutgoingMessage;

/// What one call to [`TcpTransport::poll`] accomplished.
#[derive(Debug)]
pub enum TransportPollResult {
    /// An outgoing message went onto the wire.
    OutgoingMessageSent,
    /// An incoming message was delivered to its pending request.
    IncomingMessage,
    /// One or more pending requests timed out locally.
    RequestTimedOut,
    /// The transport is closed; all pending requests have been failed.
    Closed(StatusCode),
}

struct PendingRequest {
    callback: Option<tokio::sync::oneshot::Sender<Result<ResponseMessage, StatusCode>>>,
    deadline: Instant,
}

/// Client side transport over one TCP connection.
pub struct TcpTransport {
    framed: Framed<TcpStream, TcpCodec>,
    secure_channel: Arc<RwLock<SecureChannel>>,
    outgoing: tokio::sync::mpsc::Receiver<OutgoingMessage>,
    writer: MessageWriter,
    receiver: MessageReceiver,
    /// Requests awaiting their response, keyed by request id.
    pending: HashMap<u32, PendingRequest>,
    next_request_id: u32,
    closed: Option<StatusCode>,
}

impl TcpTransport {
    pub(crate) fn new(
        framed: Framed<TcpStream, TcpCodec>,
        secure_channel: Arc<RwLock<SecureChannel>>,
        outgoing: tokio::sync::mpsc::Receiver<OutgoingMessage>,
        send_buffer_size: usize,
        max_message_size: usize,
        max_chunk_count: usize,
    ) -> Self {
        Self {
            framed,
            secure_channel,
            outgoing,
            writer: MessageWriter::new(send_buffer_size, max_message_size, max_chunk_count),
            receiver: MessageReceiver::new(),
            pending: HashMap::new(),
            next_request_id: 1,
            closed: None,
        }
    }

    /// Drive the transport one step.
    pub async fn poll(&mut self) -> TransportPollResult {
        if let Some(status) = self.closed {
            return TransportPollResult::Closed(status);
        }

        let request_deadline = self
            .pending
            .values()
            .map(|r| r.deadline)
            .min();
        let token_deadline = {
            let secure_channel = trace_read_lock!(self.secure_channel);
            if secure_channel.has_security_token() {
                Some(secure_channel.token_renewal_deadline())
            } else {
                None
            }
        };

        tokio::select! {
            outgoing = self.outgoing.recv() => {
                match outgoing {
                    Some(message) => self.handle_outgoing(message).await,
                    // All senders dropped; close gracefully.
                    None => self.fatal(StatusCode::BadConnectionClosed),
                }
            }
            frame = self.framed.next() => {
                match frame {
                    Some(Ok(message)) => self.handle_incoming(message),
                    Some(Err(e)) => {
                        error!("Transport framing error: {e}");
                        self.fatal(e.status())
                    }
                    None => {
                        debug!("Transport closed by peer");
                        self.fatal(StatusCode::BadSecureChannelClosed)
                    }
                }
            }
            _ = sleep_until_maybe(request_deadline) => self.expire_pending_requests(),
            _ = sleep_until_maybe(token_deadline) => {
                // Token lifetime elapsed without a completed renew.
                error!("Security token expired without renewal, closing channel");
                self.fatal(StatusCode::BadSecureChannelClosed)
            }
        }
    }

    async fn handle_outgoing(&mut self, message: OutgoingMessage) -> TransportPollResult {
        let request_id = self.next_request_id;
        self.next_request_id = self.next_request_id.wrapping_add(1).max(1);

        let chunks = {
            let secure_channel = trace_read_lock!(self.secure_channel);
            self.writer
                .prepare_message(request_id, &message.request, &secure_channel)
        };
        let chunks = match chunks {
            Ok(chunks) => chunks,
            Err(e) => {
                warn!("Failed to prepare outgoing request: {e}");
                if let Some(callback) = message.callback {
                    let _ = callback.send(Err(e.status()));
                }
                return TransportPollResult::OutgoingMessageSent;
            }
        };

        if let Some(callback) = message.callback {
            self.pending.insert(
                request_id,
                PendingRequest {
                    callback: Some(callback),
                    deadline: message.deadline,
                },
            );
        }

        for chunk in chunks {
            if let Err(e) = self.framed.send(Message::Chunk(chunk)).await {
                error!("Failed to write chunk: {e}");
                return self.fatal(e.status());
            }
        }
        TransportPollResult::OutgoingMessageSent
    }

    fn handle_incoming(&mut self, message: Message) -> TransportPollResult {
        match message {
            Message::Chunk(chunk) => {
                let received = {
                    let mut secure_channel = trace_write_lock!(self.secure_channel);
                    self.receiver
                        .push_chunk::<ResponseMessage>(&chunk.data, &mut secure_channel)
                };
                match received {
                    Ok(ReceivedMessage::Pending) => TransportPollResult::IncomingMessage,
                    Ok(ReceivedMessage::Message {
                        request_id,
                        message,
                        ..
                    }) => {
                        self.deliver_response(request_id, Ok(message));
                        TransportPollResult::IncomingMessage
                    }
                    Ok(ReceivedMessage::Abort {
                        request_id, status, ..
                    }) => {
                        warn!("Server aborted response {request_id} with {status}");
                        self.deliver_response(request_id, Err(status));
                        TransportPollResult::IncomingMessage
                    }
                    Ok(ReceivedMessage::DecodeFailure { request_id, status }) => {
                        warn!("Response {request_id} failed to decode: {status}");
                        self.deliver_response(request_id, Err(status));
                        TransportPollResult::IncomingMessage
                    }
                    Err(e) => {
                        error!("Failed to process incoming chunk: {e}");
                        self.fatal(e.status())
                    }
                }
            }
            Message::Error(e) => {
                error!("Server sent an error message: {}", e.status_code());
                self.fatal(e.status_code())
            }
            _ => {
                error!("Unexpected control message after the hello exchange");
                self.fatal(StatusCode::BadTcpMessageTypeInvalid)
            }
        }
    }

    fn deliver_response(&mut self, request_id: u32, response: Result<ResponseMessage, StatusCode>) {
        match self.pending.remove(&request_id) {
            Some(mut request) => {
                if let Some(callback) = request.callback.take() {
                    let _ = callback.send(response);
                }
            }
            // Unmatched or late; the request already timed out.
            None => debug!("Discarding response for unknown request id {request_id}"),
        }
    }

    fn expire_pending_requests(&mut self) -> TransportPollResult {
        let now = Instant::now();
        let expired: Vec<u32> = self
            .pending
            .iter()
            .filter(|(_, r)| r.deadline <= now)
            .map(|(id, _)| *id)
            .collect();
        for request_id in expired {
            warn!("Request {request_id} timed out locally");
            self.deliver_response(request_id, Err(StatusCode::BadTimeout));
        }
        TransportPollResult::RequestTimedOut
    }

    fn fatal(&mut self, status: StatusCode) -> TransportPollResult {
        // Pending requests die with the channel.
        for (_, mut request) in self.pending.drain() {
            if let Some(callback) = request.callback.take() {
                let _ = callback.send(Err(StatusCode::BadSecureChannelClosed));
            }
        }
        self.receiver.clear();
        self.closed = Some(status);
        TransportPollResult::Closed(status)
    }
}

/// Sleep until the instant, or forever when there is none. Keeps the select
/// arms uniform.
async fn sleep_until_maybe(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline.into()).await,
        None => std::future::pending().await,
    }
}

/// Send half for the transport's outgoing queue.
pub(crate) type RequestSend = tokio::sync::mpsc::Sender<OutgoingMessage>;

/// Convenience wrapper used by the channel for issuing requests.
pub(crate) struct Request {
    payload: RequestMessage,
    sender: RequestSend,
    timeout: std::time::Duration,
}

impl Request {
    pub(crate) fn new(
        payload: impl Into<RequestMessage>,
        sender: RequestSend,
        timeout: std::time::Duration,
    ) -> Self {
        Self {
            payload: payload.into(),
            sender,
            timeout,
        }
    }

    /// Send without waiting for any response.
    pub(crate) async fn send_no_response(self) -> Result<(), StatusCode> {
        let message = OutgoingMessage {
            request: self.payload,
            callback: None,
            deadline: Instant::now() + self.timeout,
        };
        match self.sender.send_timeout(message, self.timeout).await {
            Ok(()) => Ok(()),
            Err(tokio::sync::mpsc::error::SendTimeoutError::Closed(_)) => {
                Err(StatusCode::BadConnectionClosed)
            }
            Err(tokio::sync::mpsc::error::SendTimeoutError::Timeout(_)) => {
                Err(StatusCode::BadTimeout)
            }
        }
    }

    /// Send and wait for the matching response.
    pub(crate) async fn send(self) -> Result<ResponseMessage, StatusCode> {
        let (cb_send, cb_recv) = tokio::sync::oneshot::channel();
        let message = OutgoingMessage {
            request: self.payload,
            callback: Some(cb_send),
            deadline: Instant::now() + self.timeout,
        };
        match self.sender.send_timeout(message, self.timeout).await {
            Ok(()) => (),
            Err(tokio::sync::mpsc::error::SendTimeoutError::Closed(_)) => {
                return Err(StatusCode::BadConnectionClosed)
            }
            Err(tokio::sync::mpsc::error::SendTimeoutError::Timeout(_)) => {
                return Err(StatusCode::BadTimeout)
            }
        }

        match cb_recv.await {
            Ok(r) => r,
            // Should not really happen, would mean the transport dropped the
            // callback without failing it.
            Err(_) => Err(StatusCode::BadConnectionClosed),
        }
    }
}
