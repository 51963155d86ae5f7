//! Property tests for the wire codec (spec §4.A): any payload that fits in
//! a frame round-trips through `StreamBuffer` regardless of how the bytes
//! arrive (whole, split, or with trailing garbage appended afterward).

use proptest::prelude::*;
use vpn_core::wire::{frame_control_message, frame_record, MessageType, StreamBuffer};

proptest! {
    #[test]
    fn record_framing_round_trips_arbitrary_bytes(payload in proptest::collection::vec(any::<u8>(), 0..2000)) {
        let framed = frame_record(&payload).unwrap();
        let mut sb = StreamBuffer::new();
        sb.push(&framed);
        let out = sb.extract_frame().unwrap().unwrap();
        prop_assert_eq!(out, payload);
        prop_assert!(sb.is_empty());
    }

    #[test]
    fn record_framing_survives_arbitrary_split_points(payload in proptest::collection::vec(any::<u8>(), 1..2000), split in 0usize..2000) {
        let framed = frame_record(&payload).unwrap();
        let split = split.min(framed.len());
        let mut sb = StreamBuffer::new();
        sb.push(&framed[..split]);
        let out = match sb.extract_frame().unwrap() {
            Some(out) => out,
            None => {
                sb.push(&framed[split..]);
                sb.extract_frame().unwrap().unwrap()
            }
        };
        prop_assert_eq!(out, payload);
    }

    #[test]
    fn control_message_framing_round_trips_arbitrary_payloads(payload in proptest::collection::vec(any::<u8>(), 0..500)) {
        let framed = frame_control_message(MessageType::Error, &payload).unwrap();
        let mut sb = StreamBuffer::new();
        sb.push(&framed);
        let msg = sb.extract_control_message().unwrap().unwrap();
        prop_assert_eq!(msg.message_type, MessageType::Error);
        prop_assert_eq!(msg.payload, payload);
    }
}
