//! The asymmetric open exchange: a client and a server with their own
//! certificates run the OPN handshake over raw chunks, derive keys, and then
//! exchange symmetrically protected messages in both directions.

use std::io::Cursor;

use uasc_core::comms::message_chunk::MessageChunkHeader;
use uasc_core::comms::message_reader::{MessageReceiver, ReceivedMessage};
use uasc_core::comms::message_writer::MessageWriter;
use uasc_core::comms::secure_channel::{Role, SecureChannel};
use uasc_core::comms::security_header::AsymmetricSecurityHeader;
use uasc_core::messages::{RequestMessage, ResponseMessage, ServiceMessage};
use uasc_crypto::{create_self_signed, PrivateKey, SecurityPolicy};
use uasc_types::{
    BinaryDecodable, BinaryEncodable, ChannelSecurityToken, DateTime, DecodingOptions,
    MessageSecurityMode, NodeId, OpenSecureChannelRequest, OpenSecureChannelResponse,
    RequestHeader, ResponseHeader, SecurityTokenRequestType, StatusCode,
};

const POLICY: SecurityPolicy = SecurityPolicy::Basic256Sha256;
const LIFETIME_MS: u32 = 600_000;

#[test]
fn asymmetric_open_and_symmetric_traffic() {
    let client_key = PrivateKey::new(2048).unwrap();
    let client_cert = create_self_signed(&client_key, "UASC test client", 30).unwrap();
    let server_key = PrivateKey::new(2048).unwrap();
    let server_cert = create_self_signed(&server_key, "UASC test server", 30).unwrap();

    // Client side setup: it knows the server certificate up front.
    let mut client = SecureChannel::new(Role::Client, DecodingOptions::minimal());
    client.set_security_policy(POLICY);
    client.set_security_mode(MessageSecurityMode::SignAndEncrypt);
    client.set_cert(Some(client_cert.clone()));
    client.set_private_key(Some(client_key));
    client.set_remote_cert(Some(server_cert.clone()));

    // Server side setup: it learns the client certificate from the chunk.
    let mut server = SecureChannel::new(Role::Server, DecodingOptions::minimal());
    server.set_cert(Some(server_cert.clone()));
    server.set_private_key(Some(server_key));

    // --- Client builds the OPN request chunk. ---
    client.create_random_nonce();
    let request: RequestMessage = OpenSecureChannelRequest {
        request_header: RequestHeader::new(1, 30_000),
        client_protocol_version: 0,
        request_type: SecurityTokenRequestType::Issue,
        security_mode: MessageSecurityMode::SignAndEncrypt,
        client_nonce: client.local_nonce_as_byte_string(),
        requested_lifetime: LIFETIME_MS,
    }
    .into();
    let mut client_writer = MessageWriter::new(65_535, 0, 0);
    let opn_chunks = client_writer.prepare_message(1, &request, &client).unwrap();
    assert_eq!(opn_chunks.len(), 1, "an OPN request is a single chunk");
    let wire = &opn_chunks[0].data;

    // The channel id and headers stay readable on the wire, the rest is
    // ciphertext.
    assert_eq!(&wire[0..3], b"OPN");

    // --- Server adopts policy and certificate from the header, then
    // verifies and decodes. ---
    let mut stream = Cursor::new(&wire[..]);
    let _header = MessageChunkHeader::decode(&mut stream, server.decoding_options()).unwrap();
    let security_header =
        AsymmetricSecurityHeader::decode(&mut stream, server.decoding_options()).unwrap();
    assert_eq!(security_header.security_policy_uri.as_ref(), POLICY.to_uri());
    server.update_from_asymmetric_header(&security_header).unwrap();
    assert_eq!(server.security_policy(), POLICY);
    server.set_security_mode(MessageSecurityMode::SignAndEncrypt);

    let mut server_receiver = MessageReceiver::new();
    let received = server_receiver
        .push_chunk::<RequestMessage>(wire, &mut server)
        .unwrap();
    let ReceivedMessage::Message {
        request_id,
        message: RequestMessage::OpenSecureChannel(received_request),
        ..
    } = received
    else {
        panic!("expected the OPN request");
    };
    assert_eq!(request_id, 1);
    assert_eq!(
        received_request.client_nonce,
        client.local_nonce_as_byte_string()
    );

    // --- Server issues the token and answers. ---
    server
        .set_remote_nonce_from_byte_string(&received_request.client_nonce)
        .unwrap();
    server.create_random_nonce();
    server.set_secure_channel_id(99);
    server.issue_token(1, LIFETIME_MS);
    server.derive_keys();

    let response: ResponseMessage = OpenSecureChannelResponse {
        response_header: ResponseHeader::new_good(&received_request.request_header),
        server_protocol_version: 0,
        security_token: ChannelSecurityToken {
            channel_id: 99,
            token_id: 1,
            created_at: DateTime::now(),
            revised_lifetime: LIFETIME_MS,
        },
        server_nonce: server.local_nonce_as_byte_string(),
    }
    .into();
    let mut server_writer = MessageWriter::new(65_535, 0, 0);
    let response_chunks = server_writer
        .prepare_message(1, &response, &server)
        .unwrap();
    assert_eq!(response_chunks.len(), 1);

    // --- Client verifies the response and installs the token. ---
    let mut client_receiver = MessageReceiver::new();
    let received = client_receiver
        .push_chunk::<ResponseMessage>(&response_chunks[0].data, &mut client)
        .unwrap();
    let ReceivedMessage::Message {
        message: ResponseMessage::OpenSecureChannel(received_response),
        ..
    } = received
    else {
        panic!("expected the OPN response");
    };
    assert_eq!(
        received_response.response_header.service_result,
        StatusCode::Good
    );
    client
        .set_remote_nonce_from_byte_string(&received_response.server_nonce)
        .unwrap();
    client.set_security_token(received_response.security_token.clone());
    client.derive_keys();
    assert_eq!(client.secure_channel_id(), 99);
    assert_eq!(client.token_id(), 1);

    // --- Symmetric traffic both ways proves the derived key sets pair up:
    // client sender keys == server receiver keys and vice versa. ---
    let request = {
        let header = RequestHeader::new(5, 10_000);
        let mut body = Vec::new();
        header.encode(&mut body).unwrap();
        body.extend_from_slice(b"read the temperature");
        RequestMessage::Service(ServiceMessage {
            type_id: NodeId::new(0, 631u32),
            request_handle: 5,
            body,
        })
    };
    let chunks = client_writer.prepare_message(2, &request, &client).unwrap();
    let mut outcome = ReceivedMessage::Pending;
    for chunk in &chunks {
        outcome = server_receiver
            .push_chunk::<RequestMessage>(&chunk.data, &mut server)
            .unwrap();
    }
    let ReceivedMessage::Message {
        message: received_request,
        ..
    } = outcome
    else {
        panic!("expected the service request");
    };
    assert_eq!(received_request, request);

    let reply = {
        let header = ResponseHeader::new_service_result(5, StatusCode::Good);
        let mut body = Vec::new();
        header.encode(&mut body).unwrap();
        body.extend_from_slice(&21.5f64.to_le_bytes());
        ResponseMessage::Service(ServiceMessage {
            type_id: NodeId::new(0, 634u32),
            request_handle: 5,
            body,
        })
    };
    let chunks = server_writer.prepare_message(2, &reply, &server).unwrap();
    let mut outcome = ReceivedMessage::Pending;
    for chunk in &chunks {
        outcome = client_receiver
            .push_chunk::<ResponseMessage>(&chunk.data, &mut client)
            .unwrap();
    }
    let ReceivedMessage::Message {
        message: received_reply,
        ..
    } = outcome
    else {
        panic!("expected the service reply");
    };
    assert_eq!(received_reply, reply);
}

#[test]
fn opn_with_policy_none_is_cleartext() {
    let client = SecureChannel::new(Role::Client, DecodingOptions::minimal());
    let mut server = SecureChannel::new(Role::Server, DecodingOptions::minimal());

    let request: RequestMessage = OpenSecureChannelRequest {
        request_header: RequestHeader::new(1, 30_000),
        client_protocol_version: 0,
        request_type: SecurityTokenRequestType::Issue,
        security_mode: MessageSecurityMode::None,
        client_nonce: uasc_types::ByteString::null(),
        requested_lifetime: LIFETIME_MS,
    }
    .into();
    let mut writer = MessageWriter::new(65_535, 0, 0);
    let chunks = writer.prepare_message(1, &request, &client).unwrap();

    let mut receiver = MessageReceiver::new();
    let received = receiver
        .push_chunk::<RequestMessage>(&chunks[0].data, &mut server)
        .unwrap();
    assert!(matches!(
        received,
        ReceivedMessage::Message {
            message: RequestMessage::OpenSecureChannel(_),
            ..
        }
    ));
}
