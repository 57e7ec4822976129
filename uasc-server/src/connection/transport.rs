//! Server side of the transport: hello negotiation, chunk verification and
//! reassembly, and a write queue the controller feeds responses into.

use std::collections::VecDeque;
use std::io::Cursor;
use std::sync::Arc;

use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_util::codec::Framed;
use tracing::{debug, error, trace, warn};

use uasc_core::comms::codec::{Message, TcpCodec};
use uasc_core::comms::message_chunk::MessageChunkHeader;
use uasc_core::comms::message_chunk_info::ChunkInfo;
use uasc_core::comms::message_reader::{MessageReceiver, ReceivedMessage};
use uasc_core::comms::message_writer::MessageWriter;
use uasc_core::comms::secure_channel::SecureChannel;
use uasc_core::comms::security_header::AsymmetricSecurityHeader;
use uasc_core::comms::tcp_types::{AcknowledgeMessage, ErrorMessage, HelloMessage};
use uasc_core::messages::{RequestMessage, ResponseMessage};
use uasc_types::{BinaryDecodable, StatusCode, UAString};

use crate::config::ServerConfig;

/// One fully reassembled request, ready for the controller.
#[derive(Debug)]
pub(crate) struct Request {
    /// The decoded message.
    pub message: RequestMessage,
    /// The request id every chunk carried.
    pub request_id: u32,
    /// Headers of the first chunk, carrying the security header.
    pub chunk_info: ChunkInfo,
}

/// What one transport poll produced.
#[derive(Debug)]
pub(crate) enum TransportPollResult {
    /// A complete request arrived.
    IncomingMessage(Request),
    /// The peer aborted an in-progress request; the channel stays up.
    MessageAborted {
        /// Request id of the aborted message.
        request_id: u32,
        /// Status the peer supplied.
        status: StatusCode,
        /// Human readable reason.
        reason: UAString,
    },
    /// A request arrived whose body does not decode; only that request
    /// fails.
    RecoverableError {
        /// Request id of the failed request.
        request_id: u32,
        /// The failure to report.
        status: StatusCode,
    },
    /// Progress without a message: a write flushed, hello handled, or an
    /// intermediate chunk stored.
    Continue,
    /// Fatal error; the controller reports it and tears down.
    Error(StatusCode),
    /// The transport is done, either cleanly or after an error was sent.
    Closed,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum TransportState {
    WaitingHello,
    ProcessMessages,
    Closing,
    Closed,
}

/// Server side transport over one accepted TCP connection.
pub(crate) struct TcpTransport {
    framed: Framed<TcpStream, TcpCodec>,
    config: Arc<ServerConfig>,
    state: TransportState,
    writer: MessageWriter,
    receiver: MessageReceiver,
    write_queue: VecDeque<Message>,
    /// Client protocol version from the hello, checked again at open.
    pub(crate) client_protocol_version: u32,
}

impl TcpTransport {
    pub(crate) fn new(stream: TcpStream, config: Arc<ServerConfig>) -> Self {
        let decoding_options = config.decoding_options();
        let framed = Framed::new(
            stream,
            TcpCodec::new(
                config.limits.receive_buffer_size as usize,
                decoding_options,
            ),
        );
        Self {
            framed,
            state: TransportState::WaitingHello,
            writer: MessageWriter::new(
                config.limits.send_buffer_size as usize,
                config.limits.max_message_size as usize,
                config.limits.max_chunk_count as usize,
            ),
            receiver: MessageReceiver::new(),
            write_queue: VecDeque::new(),
            client_protocol_version: 0,
            config,
        }
    }

    /// `true` once the transport is shutting down and takes no more input.
    pub(crate) fn is_closing(&self) -> bool {
        matches!(self.state, TransportState::Closing | TransportState::Closed)
    }

    /// Begin shutdown: pending writes flush, then the transport closes.
    pub(crate) fn set_closing(&mut self) {
        if self.state != TransportState::Closed {
            self.state = TransportState::Closing;
        }
    }

    /// Queue an error message for the peer, then shut down. Crypto detail
    /// never leaves the process; the reason is a generic phrase.
    pub(crate) fn enqueue_error(&mut self, message: ErrorMessage) {
        self.write_queue.push_back(Message::Error(message));
        self.set_closing();
    }

    /// Chunk, protect and queue a response.
    pub(crate) fn enqueue_message_for_send(
        &mut self,
        secure_channel: &mut SecureChannel,
        message: ResponseMessage,
        request_id: u32,
    ) -> Result<(), StatusCode> {
        let chunks = self
            .writer
            .prepare_message(request_id, &message, secure_channel)
            .map_err(|e| {
                error!("Failed to prepare response: {e}");
                e.status()
            })?;
        for chunk in chunks {
            self.write_queue.push_back(Message::Chunk(chunk));
        }
        Ok(())
    }

    /// Drive the transport one step: flush a pending write or take one
    /// frame from the wire.
    pub(crate) async fn poll(
        &mut self,
        secure_channel: &mut SecureChannel,
    ) -> TransportPollResult {
        if self.state == TransportState::Closed {
            return TransportPollResult::Closed;
        }

        // Writes drain before anything else; an error message must reach
        // the peer before the socket goes away.
        if let Some(message) = self.write_queue.pop_front() {
            if let Err(e) = self.framed.send(message).await {
                warn!("Failed to write to transport: {e}");
                self.state = TransportState::Closed;
                return TransportPollResult::Error(StatusCode::BadSecureChannelClosed);
            }
            return TransportPollResult::Continue;
        }

        if self.state == TransportState::Closing {
            let _ = self.framed.close().await;
            self.state = TransportState::Closed;
            return TransportPollResult::Closed;
        }

        match self.framed.next().await {
            Some(Ok(message)) => self.handle_message(message, secure_channel),
            Some(Err(e)) => {
                warn!("Transport framing error: {e}");
                self.state = TransportState::Closed;
                TransportPollResult::Error(e.status())
            }
            None => {
                debug!("Transport closed by peer");
                self.state = TransportState::Closed;
                if self.is_closing() {
                    TransportPollResult::Closed
                } else {
                    TransportPollResult::Error(StatusCode::BadSecureChannelClosed)
                }
            }
        }
    }

    fn handle_message(
        &mut self,
        message: Message,
        secure_channel: &mut SecureChannel,
    ) -> TransportPollResult {
        match (self.state, message) {
            (TransportState::WaitingHello, Message::Hello(hello)) => {
                self.process_hello(hello, secure_channel)
            }
            (TransportState::WaitingHello, _) => {
                error!("Client spoke before the hello exchange completed");
                TransportPollResult::Error(StatusCode::BadCommunicationError)
            }
            (TransportState::ProcessMessages, Message::Chunk(chunk)) => {
                self.process_chunk(chunk.data, secure_channel)
            }
            (TransportState::ProcessMessages, Message::Error(e)) => {
                warn!("Client sent an error message: {}", e.status_code());
                self.state = TransportState::Closed;
                TransportPollResult::Error(e.status_code())
            }
            _ => {
                error!("Unexpected message for the transport state");
                TransportPollResult::Error(StatusCode::BadTcpMessageTypeInvalid)
            }
        }
    }

    fn process_hello(
        &mut self,
        hello: HelloMessage,
        secure_channel: &mut SecureChannel,
    ) -> TransportPollResult {
        trace!("Server received HELLO {:?}", hello);
        if !hello.is_endpoint_url_valid() {
            return TransportPollResult::Error(StatusCode::BadTcpEndpointUrlInvalid);
        }
        if !hello.is_valid_buffer_sizes() {
            error!("HELLO buffer sizes are invalid");
            return TransportPollResult::Error(StatusCode::BadCommunicationError);
        }
        if hello.protocol_version > uasc_core::PROTOCOL_VERSION {
            return TransportPollResult::Error(StatusCode::BadProtocolVersionUnsupported);
        }
        self.client_protocol_version = hello.protocol_version;

        let limits = &self.config.limits;
        let ack = AcknowledgeMessage::negotiate(
            &hello,
            limits.receive_buffer_size,
            limits.send_buffer_size,
            limits.max_message_size,
            limits.max_chunk_count,
        );

        // Negotiated values bound everything from here on.
        self.framed
            .codec_mut()
            .set_max_chunk_size(ack.receive_buffer_size as usize);
        self.writer = MessageWriter::new(
            ack.send_buffer_size as usize,
            ack.max_message_size as usize,
            ack.max_chunk_count as usize,
        );
        let mut options = secure_channel.decoding_options().clone();
        options.max_message_size = ack.max_message_size as usize;
        options.max_chunk_count = ack.max_chunk_count as usize;
        secure_channel.set_decoding_options(options);

        debug!("Sending ACK");
        self.state = TransportState::ProcessMessages;
        self.write_queue.push_back(Message::Acknowledge(ack));
        TransportPollResult::Continue
    }

    fn process_chunk(
        &mut self,
        data: Vec<u8>,
        secure_channel: &mut SecureChannel,
    ) -> TransportPollResult {
        // The first open secure channel chunk names the policy and carries
        // the client certificate; the channel adopts them before verifying.
        let mut stream = Cursor::new(&data[..]);
        let header =
            match MessageChunkHeader::decode(&mut stream, secure_channel.decoding_options()) {
                Ok(header) => header,
                Err(e) => return TransportPollResult::Error(e.status()),
            };
        if header.message_type.is_open_secure_channel() {
            let security_header = match AsymmetricSecurityHeader::decode(
                &mut stream,
                secure_channel.decoding_options(),
            ) {
                Ok(h) => h,
                Err(e) => return TransportPollResult::Error(e.status()),
            };
            if let Err(e) = secure_channel.update_from_asymmetric_header(&security_header) {
                return TransportPollResult::Error(e.status());
            }
        }

        match self
            .receiver
            .push_chunk::<RequestMessage>(&data, secure_channel)
        {
            Ok(ReceivedMessage::Pending) => TransportPollResult::Continue,
            Ok(ReceivedMessage::Message {
                request_id,
                chunk_info,
                message,
            }) => TransportPollResult::IncomingMessage(Request {
                message,
                request_id,
                chunk_info,
            }),
            Ok(ReceivedMessage::Abort {
                request_id,
                status,
                reason,
            }) => TransportPollResult::MessageAborted {
                request_id,
                status,
                reason,
            },
            Ok(ReceivedMessage::DecodeFailure { request_id, status }) => {
                TransportPollResult::RecoverableError { request_id, status }
            }
            Err(e) => {
                error!("Failed to process incoming chunk: {e}");
                TransportPollResult::Error(e.status())
            }
        }
    }
}
