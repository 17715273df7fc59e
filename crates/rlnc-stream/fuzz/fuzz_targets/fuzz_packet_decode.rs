#![no_main]

use libfuzzer_sys::fuzz_target;
use rlnc_stream::wire::{Packet, HEADER_LEN};

/// Fuzz the datagram parser.
///
/// Any input must either parse or return a `WireError`, and whatever parses
/// must re-encode to the same bytes.
fuzz_target!(|data: &[u8]| {
    let packet_size = data.len().saturating_sub(HEADER_LEN);
    if let Ok(pkt) = Packet::decode(data, packet_size) {
        // Negative header fields other than -1 are normalized on re-encode.
        let reparsed = Packet::decode(&pkt.encode(), packet_size).unwrap();
        assert_eq!(reparsed, pkt);
    }
    let _ = Packet::decode(data, 8);
});
