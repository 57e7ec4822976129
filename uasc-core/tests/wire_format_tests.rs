//! Golden wire-format assertions: identical inputs must produce
//! bit-identical frames.

use uasc_core::comms::tcp_types::{AcknowledgeMessage, ErrorMessage, HelloMessage};
use uasc_core::hexlify::{hexlify, unhexlify};
use uasc_types::{BinaryDecodable, BinaryEncodable, DecodingOptions, StatusCode};

#[test]
fn hello_frame_is_bit_identical() {
    let hello = HelloMessage::new("opc.tcp://A:1", 8192, 8192, 0, 0);
    let mut buf = Vec::new();
    hello.encode(&mut buf).unwrap();

    let expected = concat!(
        "48454c46",                   // "HEL" final
        "2d000000",                   // total size 45
        "00000000",                   // protocol version 0
        "00200000",                   // receive buffer 8192
        "00200000",                   // send buffer 8192
        "00000000",                   // max message size, no limit
        "00000000",                   // max chunk count, no limit
        "0d000000",                   // url length 13
        "6f70632e7463703a2f2f413a31", // "opc.tcp://A:1"
    );
    assert_eq!(hexlify(&buf), expected);

    // And it reparses to the same value.
    let bytes = unhexlify(expected).unwrap();
    let decoded = HelloMessage::decode(
        &mut std::io::Cursor::new(bytes),
        &DecodingOptions::minimal(),
    )
    .unwrap();
    assert_eq!(decoded, hello);
}

#[test]
fn acknowledge_frame_is_bit_identical() {
    let hello = HelloMessage::new("opc.tcp://A:1", 65_535, 65_535, 0, 0);
    let ack = AcknowledgeMessage::negotiate(&hello, 131_072, 131_072, 1_048_576, 16);
    let mut buf = Vec::new();
    ack.encode(&mut buf).unwrap();

    let expected = concat!(
        "41434b46", // "ACK" final
        "1c000000", // total size 28
        "00000000", // protocol version 0
        "ffff0000", // receive buffer 65535
        "ffff0000", // send buffer 65535
        "00001000", // max message size 1048576
        "10000000", // max chunk count 16
    );
    assert_eq!(hexlify(&buf), expected);
}

#[test]
fn error_frame_layout() {
    let error = ErrorMessage::new(StatusCode::BadTcpMessageTooLarge, "x");
    let mut buf = Vec::new();
    error.encode(&mut buf).unwrap();

    assert_eq!(
        hexlify(&buf),
        concat!(
            "45525246", // "ERR" final
            "11000000", // total size 17
            "00008080", // BadTcpMessageTooLarge 0x80800000
            "01000000", // reason length 1
            "78",       // "x"
        )
    );
}
