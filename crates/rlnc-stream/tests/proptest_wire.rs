//! Property-based tests for the wire format.
//!
//! Any well-formed packet survives encode/decode with its header intact, and
//! arbitrary bytes either parse or fail with a `WireError`, never panic.

use proptest::prelude::*;
use rlnc_stream::wire::{Packet, PacketKind, HEADER_LEN, MAX_ID};

// ─── Strategies ──────────────────────────────────────────────────────────────

fn wire_id() -> impl Strategy<Value = u32> {
    prop_oneof![Just(0u32), Just(MAX_ID), 0..=MAX_ID]
}

fn packet(packet_size: usize) -> impl Strategy<Value = Packet> {
    let symbols = prop::collection::vec(any::<u8>(), packet_size);
    prop_oneof![
        (wire_id(), symbols.clone()).prop_map(|(id, s)| Packet::source(id, s)),
        (wire_id(), wire_id(), 0u32..1000, symbols).prop_map(|(id, start, len, s)| {
            let start = start.min(MAX_ID - len);
            Packet::repair(id, start, start + len, vec![1; len as usize + 1], s)
        }),
    ]
}

proptest! {
    #[test]
    fn header_survives_round_trip(pkt in packet(32)) {
        let bytes = pkt.encode();
        prop_assert_eq!(bytes.len(), pkt.encoded_len());
        prop_assert_eq!(bytes.len(), HEADER_LEN + 32);

        let decoded = Packet::decode(&bytes, 32).unwrap();
        prop_assert_eq!(decoded.kind, pkt.kind);
        prop_assert_eq!(&decoded.symbols, &pkt.symbols);
        prop_assert!(decoded.coefficients.is_none());
    }

    #[test]
    fn arbitrary_bytes_never_panic(data in prop::collection::vec(any::<u8>(), 0..64)) {
        if let Ok(pkt) = Packet::decode(&data, data.len().saturating_sub(HEADER_LEN)) {
            if let PacketKind::Repair { window_start, window_end, .. } = pkt.kind {
                prop_assert!(window_start <= window_end);
            }
            prop_assert!(pkt.source_id().is_some() != pkt.repair_id().is_some());
        }
    }

    #[test]
    fn payload_length_is_enforced(pkt in packet(16), expected in 0usize..32) {
        let bytes = pkt.encode();
        let result = Packet::decode(&bytes, expected);
        prop_assert_eq!(result.is_ok(), expected == 16);
    }
}
