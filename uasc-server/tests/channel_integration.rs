//! Full-stack exercise: a listener and a client channel talk over loopback
//! TCP with policy `None` - hello negotiation, open, opaque service
//! round-trip, close.

use std::io::Cursor;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use uasc_client::{
    AsyncSecureChannel, EndpointInfo, SessionRetryPolicy, TcpConnector, TransportConfiguration,
};
use uasc_core::messages::ServiceMessage;
use uasc_core::sync::RwLock;
use uasc_crypto::{CertificateStore, SecurityPolicy};
use uasc_server::{Listener, ServerConfig, ServiceHandler};
use uasc_types::{
    BinaryDecodable, BinaryEncodable, ByteString, DecodingOptions, MessageSecurityMode, NodeId,
    RequestHeader, ResponseHeader, StatusCode,
};

#[derive(Default)]
struct Counters {
    opened: AtomicU32,
    closed: AtomicU32,
    requests: AtomicU32,
}

struct EchoHandler {
    counters: Arc<Counters>,
}

#[async_trait]
impl ServiceHandler for EchoHandler {
    async fn on_open(&self, _channel_id: u32) {
        self.counters.opened.fetch_add(1, Ordering::SeqCst);
    }

    async fn handle(
        &self,
        _channel_id: u32,
        request: ServiceMessage,
    ) -> Result<ServiceMessage, StatusCode> {
        self.counters.requests.fetch_add(1, Ordering::SeqCst);

        // Echo the payload after the request header back behind a good
        // response header.
        let mut stream = Cursor::new(&request.body[..]);
        let header = RequestHeader::decode(&mut stream, &DecodingOptions::minimal())
            .map_err(|_| StatusCode::BadDecodingError)?;
        let payload_offset = stream.position() as usize;

        let mut body = Vec::new();
        ResponseHeader::new_service_result(header.request_handle, StatusCode::Good)
            .encode(&mut body)
            .map_err(|_| StatusCode::BadEncodingError)?;
        body.extend_from_slice(&request.body[payload_offset..]);

        Ok(ServiceMessage {
            type_id: NodeId::new(0, 634u32),
            request_handle: header.request_handle,
            body,
        })
    }

    async fn on_close(&self, _channel_id: u32, _status: StatusCode) {
        self.counters.closed.fetch_add(1, Ordering::SeqCst);
    }
}

#[tokio::test]
async fn open_service_round_trip_and_close() {
    let counters = Arc::new(Counters::default());

    let socket = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = socket.local_addr().unwrap().port();

    let listener = Listener::new(
        ServerConfig::default(),
        EchoHandler {
            counters: counters.clone(),
        },
    )
    .unwrap();
    let token = CancellationToken::new();
    tokio::spawn(listener.run_with(socket, token.clone()));

    let channel = Arc::new(AsyncSecureChannel::new(
        Arc::new(RwLock::new(CertificateStore::new())),
        EndpointInfo {
            endpoint_url: format!("opc.tcp://127.0.0.1:{port}/"),
            security_policy_uri: SecurityPolicy::None.to_uri().to_string(),
            security_mode: MessageSecurityMode::None,
            server_certificate: ByteString::null(),
        },
        SessionRetryPolicy::never(),
        TransportConfiguration::default(),
        Box::new(TcpConnector),
        600_000,
        (0, 3_600_000),
        false,
    ));

    let mut event_loop = channel.connect().await.unwrap();
    tokio::spawn(async move { event_loop.run().await });

    assert_ne!(channel.secure_channel_id(), 0);

    // One opaque request, echoed back.
    let request_handle = channel.request_handle();
    let payload = b"the quick brown fox";
    let body = {
        let mut body = Vec::new();
        RequestHeader::new(request_handle, 5_000)
            .encode(&mut body)
            .unwrap();
        body.extend_from_slice(payload);
        body
    };
    let response = channel
        .send_service(
            NodeId::new(0, 631u32),
            body,
            request_handle,
            Duration::from_secs(5),
        )
        .await
        .unwrap();
    assert!(response.body.ends_with(payload));
    assert_eq!(response.request_handle, request_handle);

    channel.close_channel().await;

    // The server notices the close shortly after.
    for _ in 0..50 {
        if counters.closed.load(Ordering::SeqCst) > 0 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    assert_eq!(counters.opened.load(Ordering::SeqCst), 1);
    assert_eq!(counters.requests.load(Ordering::SeqCst), 1);
    assert_eq!(counters.closed.load(Ordering::SeqCst), 1);

    token.cancel();
}

#[tokio::test]
async fn pool_exhaustion_is_refused() {
    let socket = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = socket.local_addr().unwrap().port();

    let mut config = ServerConfig::default();
    config.limits.max_connections = 1;
    let listener = Listener::new(
        config,
        EchoHandler {
            counters: Arc::new(Counters::default()),
        },
    )
    .unwrap();
    let token = CancellationToken::new();
    tokio::spawn(listener.run_with(socket, token.clone()));

    let make_channel = || {
        Arc::new(AsyncSecureChannel::new(
            Arc::new(RwLock::new(CertificateStore::new())),
            EndpointInfo {
                endpoint_url: format!("opc.tcp://127.0.0.1:{port}/"),
                security_policy_uri: SecurityPolicy::None.to_uri().to_string(),
                security_mode: MessageSecurityMode::None,
                server_certificate: ByteString::null(),
            },
            SessionRetryPolicy::never(),
            TransportConfiguration::default(),
            Box::new(TcpConnector),
            600_000,
            (0, 3_600_000),
            false,
        ))
    };

    // First connection occupies the single slot.
    let first = make_channel();
    let mut first_loop = first.connect().await.unwrap();
    tokio::spawn(async move { first_loop.run().await });

    // The second is turned away before any hello exchange.
    let second = make_channel();
    let err = second.connect().await.unwrap_err();
    assert_eq!(err, StatusCode::BadTcpNotEnoughResources);

    token.cancel();
}
