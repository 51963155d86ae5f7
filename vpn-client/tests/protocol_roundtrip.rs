//! Exercises the wire/crypto layers the client engine relies on end to end:
//! an auth handshake followed by a data record, exactly as they'd appear
//! interleaved on a real socket.

use vpn_core::control;
use vpn_core::wire::{frame_record, MessageType, StreamBuffer, StreamItem};
use vpn_crypto::kdf::{generate_master_key, master_key_from_hex, master_key_to_hex};
use vpn_crypto::session::AeadSession;

#[test]
fn auth_success_then_data_record_round_trips_through_stream_buffer() {
    let master_key = generate_master_key();

    let auth_req = control::encode_auth_request("alice", "hunter2", "1.0.0").unwrap();
    let mut server_side = StreamBuffer::new();
    server_side.push(&auth_req);
    let msg = server_side.extract_control_message().unwrap().unwrap();
    assert_eq!(msg.message_type, MessageType::AuthRequest);
    let req = control::decode_auth_request(&msg).unwrap();
    assert_eq!(req.username, "alice");

    let success = control::encode_auth_success(
        "tok-123",
        "10.8.0.2",
        &master_key_to_hex(&master_key),
    )
    .unwrap();

    let mut server_session = AeadSession::new(&master_key).unwrap();
    let packet = b"fake-ip-packet-payload";
    let record = server_session.seal_next(packet, b"").unwrap();
    let framed_record = frame_record(&record).unwrap();

    let mut client_side = StreamBuffer::new();
    client_side.push(&success);
    client_side.push(&framed_record);

    let item = client_side.extract_next().unwrap().unwrap();
    let decoded_success = match item {
        StreamItem::Control(msg) => {
            assert_eq!(msg.message_type, MessageType::AuthSuccess);
            control::decode_auth_success(&msg).unwrap()
        }
        StreamItem::Record(_) => panic!("expected the AuthSuccess control message first"),
    };
    assert_eq!(decoded_success.session_token, "tok-123");
    assert_eq!(decoded_success.assigned_ip, "10.8.0.2");

    let client_master_key = master_key_from_hex(&decoded_success.master_key_hex).unwrap();
    assert_eq!(client_master_key, master_key);
    let mut client_session = AeadSession::new(&client_master_key).unwrap();

    let item = client_side.extract_next().unwrap().unwrap();
    let plaintext = match item {
        StreamItem::Record(record) => client_session.open_checked(&record, b"").unwrap(),
        StreamItem::Control(_) => panic!("expected a data record second"),
    };
    assert_eq!(plaintext, packet);
}

#[test]
fn disconnect_message_is_recognized_in_band() {
    let mut buf = StreamBuffer::new();
    buf.push(&control::encode_disconnect("user requested").unwrap());
    match buf.extract_next().unwrap().unwrap() {
        StreamItem::Control(msg) => {
            assert_eq!(msg.message_type, MessageType::Disconnect);
            assert_eq!(control::decode_disconnect(&msg).unwrap().reason, "user requested");
        }
        StreamItem::Record(_) => panic!("expected a control message"),
    }
}
