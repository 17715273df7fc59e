#![no_main]

use libfuzzer_sys::fuzz_target;
use rlnc_stream::config::RepairSchedule;
use rlnc_stream::wire::{Packet, HEADER_LEN};
use rlnc_stream::{CodecConfig, Decoder, NoMetrics};

const PACKET_SIZE: usize = 8;
const MAX_WINDOW_WIDTH: usize = 4096;

/// Fuzz the decoder state machine with a stream of arbitrary datagrams.
///
/// The input is split into fixed-size datagrams. The decoder must never
/// panic, and `in_order` must never move backwards.
fuzz_target!(|data: &[u8]| {
    let Some((&width, rest)) = data.split_first() else {
        return;
    };
    let field_width = [1u8, 2, 4, 8][(width % 4) as usize];
    let config = CodecConfig::default()
        .with_field_width(field_width)
        .with_packet_size(PACKET_SIZE)
        .with_window_capacity(16)
        .with_max_window_width(MAX_WINDOW_WIDTH)
        .with_repair(RepairSchedule::Periodic { period: 3 });
    let mut dec = Decoder::new(config).unwrap();

    let mut in_order = None;
    for datagram in rest.chunks_exact(HEADER_LEN + PACKET_SIZE) {
        let Ok(pkt) = Packet::decode(datagram, PACKET_SIZE) else {
            continue;
        };
        dec.receive(pkt, &mut NoMetrics);
        assert!(dec.in_order() >= in_order);
        if let Some((start, end)) = dec.window() {
            assert!((end - start) as usize + 1 <= MAX_WINDOW_WIDTH);
        }
        in_order = dec.in_order();
    }
});
