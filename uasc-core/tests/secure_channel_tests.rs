//! End-to-end exercises of the chunking and protection layers with a pair of
//! channels, one per role, sharing nothing but wire bytes.

use uasc_core::comms::chunker::Chunker;
use uasc_core::comms::message_chunk::{MessageChunk, MessageChunkType, MessageIsFinalType};
use uasc_core::comms::message_reader::{MessageReceiver, ReceivedMessage};
use uasc_core::comms::message_writer::MessageWriter;
use uasc_core::comms::secure_channel::{Role, SecureChannel};
use uasc_core::messages::{RequestMessage, ServiceMessage};
use uasc_crypto::SecurityPolicy;
use uasc_types::{
    BinaryEncodable, ChannelSecurityToken, DateTime, DecodingOptions, MessageSecurityMode, NodeId,
    RequestHeader, StatusCode, UAString,
};

const LIFETIME_MS: u32 = 600_000;

/// A pair of channels that completed an open with the given policy and mode:
/// nonces exchanged, token 1 installed, keys derived.
fn secured_pair(
    policy: SecurityPolicy,
    mode: MessageSecurityMode,
) -> (SecureChannel, SecureChannel) {
    let mut client = SecureChannel::new(Role::Client, DecodingOptions::minimal());
    let mut server = SecureChannel::new(Role::Server, DecodingOptions::minimal());
    for channel in [&mut client, &mut server] {
        channel.set_security_policy(policy);
        channel.set_security_mode(mode);
    }

    exchange_token(&mut client, &mut server, 1);
    (client, server)
}

/// Run the nonce + token exchange installing `token_id` on both sides.
fn exchange_token(client: &mut SecureChannel, server: &mut SecureChannel, token_id: u32) {
    client.create_random_nonce();
    server
        .set_remote_nonce_from_byte_string(&client.local_nonce_as_byte_string())
        .unwrap();
    server.create_random_nonce();
    client
        .set_remote_nonce_from_byte_string(&server.local_nonce_as_byte_string())
        .unwrap();

    server.set_secure_channel_id(1);
    server.issue_token(token_id, LIFETIME_MS);
    client.set_security_token(ChannelSecurityToken {
        channel_id: 1,
        token_id,
        created_at: DateTime::now(),
        revised_lifetime: LIFETIME_MS,
    });
    client.derive_keys();
    server.derive_keys();
}

/// An opaque service request with `payload_len` bytes of body after the
/// request header.
fn service_request(request_handle: u32, payload_len: usize) -> RequestMessage {
    let header = RequestHeader::new(request_handle, 30_000);
    let mut body = Vec::new();
    header.encode(&mut body).unwrap();
    body.extend((0..payload_len).map(|i| i as u8));
    RequestMessage::Service(ServiceMessage {
        type_id: NodeId::new(0, 631u32),
        request_handle,
        body,
    })
}

fn push_all(
    receiver: &mut MessageReceiver,
    server: &mut SecureChannel,
    chunks: &[MessageChunk],
) -> ReceivedMessage<RequestMessage> {
    let mut last = ReceivedMessage::Pending;
    for chunk in chunks {
        last = receiver.push_chunk(&chunk.data, server).unwrap();
    }
    last
}

#[test]
fn multi_chunk_round_trip_sign_and_encrypt() {
    let (client, mut server) =
        secured_pair(SecurityPolicy::Basic256Sha256, MessageSecurityMode::SignAndEncrypt);

    let message = service_request(7, 20_000);
    let mut writer = MessageWriter::new(8192, 0, 0);
    let chunks = writer.prepare_message(42, &message, &client).unwrap();
    assert!(chunks.len() > 1, "20k body must not fit one 8k chunk");
    for chunk in &chunks {
        assert!(chunk.data.len() <= 8192);
    }

    let mut receiver = MessageReceiver::new();
    match push_all(&mut receiver, &mut server, &chunks) {
        ReceivedMessage::Message {
            request_id,
            message: received,
            ..
        } => {
            assert_eq!(request_id, 42);
            assert_eq!(received, message);
        }
        other => panic!("expected a reassembled message, got {other:?}"),
    }
    assert_eq!(receiver.pending_chunks(), 0);
}

#[test]
fn sign_only_round_trip() {
    let (client, mut server) =
        secured_pair(SecurityPolicy::Aes128Sha256RsaOaep, MessageSecurityMode::Sign);

    let message = service_request(1, 256);
    let mut writer = MessageWriter::new(8192, 0, 0);
    let chunks = writer.prepare_message(9, &message, &client).unwrap();

    let mut receiver = MessageReceiver::new();
    match push_all(&mut receiver, &mut server, &chunks) {
        ReceivedMessage::Message { message: received, .. } => assert_eq!(received, message),
        other => panic!("expected a reassembled message, got {other:?}"),
    }
}

#[test]
fn tampered_chunk_fails_the_signature() {
    let (client, mut server) =
        secured_pair(SecurityPolicy::Basic256Sha256, MessageSecurityMode::SignAndEncrypt);

    let message = service_request(1, 64);
    let mut writer = MessageWriter::new(8192, 0, 0);
    let mut chunks = writer.prepare_message(3, &message, &client).unwrap();
    let tamper_at = chunks[0].data.len() / 2;
    chunks[0].data[tamper_at] ^= 0x01;

    let mut receiver = MessageReceiver::new();
    let err = receiver
        .push_chunk::<RequestMessage>(&chunks[0].data, &mut server)
        .unwrap_err();
    assert_eq!(err.status(), StatusCode::BadSecurityChecksFailed);
}

#[test]
fn renewal_keeps_previous_token_in_drain_window() {
    let (mut client, mut server) =
        secured_pair(SecurityPolicy::Basic256Sha256, MessageSecurityMode::SignAndEncrypt);

    // A message protected under token 1, not yet delivered.
    let stale = {
        let mut writer = MessageWriter::new(8192, 0, 0);
        writer
            .prepare_message(10, &service_request(10, 32), &client)
            .unwrap()
    };

    // Renew with fresh nonces; token 2 becomes current on both sides.
    exchange_token(&mut client, &mut server, 2);
    assert_eq!(client.token_id(), 2);
    assert_eq!(server.token_id(), 2);

    // The stray chunk under token 1 still decrypts and is delivered.
    let mut receiver = MessageReceiver::new();
    match push_all(&mut receiver, &mut server, &stale) {
        ReceivedMessage::Message { request_id, .. } => assert_eq!(request_id, 10),
        other => panic!("expected the stale message to decrypt, got {other:?}"),
    }

    // A chunk claiming token 3 is rejected outright.
    let mut forged = {
        let mut writer = MessageWriter::new(8192, 0, 0);
        let mut chunks = writer
            .prepare_message(11, &service_request(11, 32), &client)
            .unwrap();
        chunks.remove(0)
    };
    forged.data[12..16].copy_from_slice(&3u32.to_le_bytes());
    let err = receiver
        .push_chunk::<RequestMessage>(&forged.data, &mut server)
        .unwrap_err();
    assert_eq!(err.status(), StatusCode::BadSecureChannelTokenUnknown);
}

#[test]
fn first_chunk_under_new_token_retires_the_old_one() {
    let (mut client, mut server) =
        secured_pair(SecurityPolicy::Basic256Sha256, MessageSecurityMode::SignAndEncrypt);

    // Keep a token 1 protected message aside, then renew.
    let stale = {
        let mut writer = MessageWriter::new(8192, 0, 0);
        writer
            .prepare_message(20, &service_request(20, 16), &client)
            .unwrap()
    };
    exchange_token(&mut client, &mut server, 2);

    // Deliver a message under token 2 first.
    let mut writer = MessageWriter::new(8192, 0, 0);
    let fresh = writer
        .prepare_message(21, &service_request(21, 16), &client)
        .unwrap();
    let mut receiver = MessageReceiver::new();
    assert!(matches!(
        push_all(&mut receiver, &mut server, &fresh),
        ReceivedMessage::Message { .. }
    ));

    // Token 1 is gone now; the stale chunk must be rejected.
    let err = receiver
        .push_chunk::<RequestMessage>(&stale[0].data, &mut server)
        .unwrap_err();
    assert_eq!(err.status(), StatusCode::BadSecureChannelTokenUnknown);
}

#[test]
fn abort_chunk_drops_reassembly_and_keeps_channel_alive() {
    let (client, mut server) =
        secured_pair(SecurityPolicy::Basic256Sha256, MessageSecurityMode::SignAndEncrypt);

    // Two intermediate chunks of a message that will never finish.
    let part = vec![0x55u8; 512];
    let chunk1 = MessageChunk::new(
        1,
        30,
        MessageChunkType::Message,
        MessageIsFinalType::Intermediate,
        &client,
        &part,
    )
    .unwrap();
    let chunk2 = MessageChunk::new(
        2,
        30,
        MessageChunkType::Message,
        MessageIsFinalType::Intermediate,
        &client,
        &part,
    )
    .unwrap();

    // The abort chunk carries a status and a reason in its body.
    let abort_body = {
        let mut body = Vec::new();
        uasc_types::write_u32(&mut body, StatusCode::BadEncodingLimitsExceeded.bits()).unwrap();
        UAString::from("request too large").encode(&mut body).unwrap();
        body
    };
    let chunk3 = MessageChunk::new(
        3,
        30,
        MessageChunkType::Message,
        MessageIsFinalType::FinalError,
        &client,
        &abort_body,
    )
    .unwrap();

    let mut receiver = MessageReceiver::new();
    for (index, chunk) in [&chunk1, &chunk2].into_iter().enumerate() {
        let protected = client.apply_security(chunk, index as u32).unwrap();
        assert!(matches!(
            receiver
                .push_chunk::<RequestMessage>(&protected, &mut server)
                .unwrap(),
            ReceivedMessage::Pending
        ));
    }
    assert_eq!(receiver.pending_chunks(), 2);

    let protected = client.apply_security(&chunk3, 2).unwrap();
    match receiver
        .push_chunk::<RequestMessage>(&protected, &mut server)
        .unwrap()
    {
        ReceivedMessage::Abort {
            request_id, status, ..
        } => {
            assert_eq!(request_id, 30);
            assert_eq!(status, StatusCode::BadEncodingLimitsExceeded);
        }
        other => panic!("expected an abort, got {other:?}"),
    }
    assert_eq!(receiver.pending_chunks(), 0);

    // The channel itself stays usable: the next message goes through.
    let next = Chunker::encode(4, 31, 0, 8192, 0, &client, &service_request(31, 16)).unwrap();
    let protected: Vec<_> = next
        .iter()
        .enumerate()
        .map(|(i, c)| client.apply_security(c, i as u32).unwrap())
        .collect();
    let mut outcome = ReceivedMessage::Pending;
    for data in &protected {
        outcome = receiver
            .push_chunk::<RequestMessage>(data, &mut server)
            .unwrap();
    }
    assert!(matches!(outcome, ReceivedMessage::Message { .. }));
}

#[test]
fn sequence_gap_is_fatal() {
    let (client, mut server) =
        secured_pair(SecurityPolicy::Basic256Sha256, MessageSecurityMode::SignAndEncrypt);

    let part = vec![1u8; 64];
    let chunk1 = MessageChunk::new(
        1,
        5,
        MessageChunkType::Message,
        MessageIsFinalType::Intermediate,
        &client,
        &part,
    )
    .unwrap();
    // Sequence number skips ahead.
    let chunk3 = MessageChunk::new(
        3,
        5,
        MessageChunkType::Message,
        MessageIsFinalType::Final,
        &client,
        &part,
    )
    .unwrap();

    let mut receiver = MessageReceiver::new();
    let protected = client.apply_security(&chunk1, 0).unwrap();
    receiver
        .push_chunk::<RequestMessage>(&protected, &mut server)
        .unwrap();
    let protected = client.apply_security(&chunk3, 1).unwrap();
    let err = receiver
        .push_chunk::<RequestMessage>(&protected, &mut server)
        .unwrap_err();
    assert_eq!(err.status(), StatusCode::BadSecurityChecksFailed);
}

#[test]
fn oversize_message_fails_before_any_chunk_is_built() {
    let (client, _server) =
        secured_pair(SecurityPolicy::Basic256Sha256, MessageSecurityMode::SignAndEncrypt);

    // 10 MiB body against an 8 KiB send buffer and a 2 chunk budget.
    let message = service_request(1, 10 * 1024 * 1024);
    let mut writer = MessageWriter::new(8192, 0, 2);
    let err = writer.prepare_message(1, &message, &client).unwrap_err();
    assert_eq!(err.status(), StatusCode::BadTcpMessageTooLarge);
    assert_eq!(writer.last_sequence_number(), 0, "nothing may be emitted");
}

#[test]
fn chunk_count_bound_on_receive_is_fatal() {
    let (client, mut server) =
        secured_pair(SecurityPolicy::Basic256Sha256, MessageSecurityMode::SignAndEncrypt);
    let mut options = DecodingOptions::minimal();
    options.max_chunk_count = 2;
    server.set_decoding_options(options);

    let part = vec![0u8; 32];
    let mut receiver = MessageReceiver::new();
    for seq in 1..=2u32 {
        let chunk = MessageChunk::new(
            seq,
            8,
            MessageChunkType::Message,
            MessageIsFinalType::Intermediate,
            &client,
            &part,
        )
        .unwrap();
        let protected = client.apply_security(&chunk, seq - 1).unwrap();
        receiver
            .push_chunk::<RequestMessage>(&protected, &mut server)
            .unwrap();
    }
    let chunk = MessageChunk::new(
        3,
        8,
        MessageChunkType::Message,
        MessageIsFinalType::Final,
        &client,
        &part,
    )
    .unwrap();
    let protected = client.apply_security(&chunk, 2).unwrap();
    let err = receiver
        .push_chunk::<RequestMessage>(&protected, &mut server)
        .unwrap_err();
    assert_eq!(err.status(), StatusCode::BadTcpMessageTooLarge);
}

#[test]
fn policy_none_passes_chunks_through() {
    let (client, mut server) = secured_pair(SecurityPolicy::None, MessageSecurityMode::None);

    let message = service_request(2, 128);
    let mut writer = MessageWriter::new(8192, 0, 0);
    let chunks = writer.prepare_message(6, &message, &client).unwrap();

    let mut receiver = MessageReceiver::new();
    match push_all(&mut receiver, &mut server, &chunks) {
        ReceivedMessage::Message { message: received, .. } => assert_eq!(received, message),
        other => panic!("expected a message, got {other:?}"),
    }
}

#[test]
fn expired_token_refuses_to_send() {
    let (mut client, _server) =
        secured_pair(SecurityPolicy::Basic256Sha256, MessageSecurityMode::SignAndEncrypt);

    // Install a zero-lifetime token; anything sent under it must fail.
    client.set_security_token(ChannelSecurityToken {
        channel_id: 1,
        token_id: 3,
        created_at: DateTime::now(),
        revised_lifetime: 0,
    });
    client.derive_keys();
    std::thread::sleep(std::time::Duration::from_millis(5));
    assert!(client.token_has_expired());

    let mut writer = MessageWriter::new(8192, 0, 0);
    let err = writer
        .prepare_message(1, &service_request(1, 16), &client)
        .unwrap_err();
    assert_eq!(err.status(), StatusCode::BadSecureChannelClosed);
}

#[test]
fn reassembled_cleartext_matches_chunk_bodies() {
    // The total cleartext byte count equals the sum of per-chunk bodies.
    let (client, mut server) =
        secured_pair(SecurityPolicy::Basic128Rsa15, MessageSecurityMode::SignAndEncrypt);

    let message = service_request(4, 5000);
    let mut writer = MessageWriter::new(8192, 0, 0);
    let chunks = writer.prepare_message(12, &message, &client).unwrap();

    let mut receiver = MessageReceiver::new();
    match push_all(&mut receiver, &mut server, &chunks) {
        ReceivedMessage::Message { message: received, .. } => {
            let RequestMessage::Service(received) = received else {
                panic!("expected a service message");
            };
            let RequestMessage::Service(sent) = message else {
                unreachable!();
            };
            assert_eq!(received.body.len(), sent.body.len());
            assert_eq!(received.body, sent.body);
        }
        other => panic!("expected a message, got {other:?}"),
    }
}
