//! # Integration tests: Encoder ↔ Decoder through the wire format
//!
//! Encoder → wire encode → (impairment) → wire decode → Decoder, with the
//! decoder's in-order id fed back to the encoder as the acknowledgment.
//!
//! No actual network I/O; the "network" is a loop over transmission slots.

use rand::rngs::StdRng;
use rand::{RngExt as _, SeedableRng};

use rlnc_stream::config::RepairSchedule;
use rlnc_stream::{CodecConfig, Decoder, Encoder, NoMetrics, Reception};

// ─── Helpers ────────────────────────────────────────────────────────────────

const SOURCES: u32 = 1000;
const PACKET_SIZE: usize = 200;

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_test_writer()
        .try_init();
}

/// Deterministic pseudo-random source data.
fn source_data(n: u32, seed: u64) -> Vec<Vec<u8>> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..n)
        .map(|_| (0..PACKET_SIZE).map(|_| rng.random::<u8>()).collect())
        .collect()
}

fn scenario_config() -> CodecConfig {
    CodecConfig::default()
        .with_packet_size(PACKET_SIZE)
        .with_field_width(8)
        .with_repair(RepairSchedule::Periodic { period: 5 })
}

fn loaded_encoder(config: CodecConfig, data: &[Vec<u8>]) -> Encoder {
    let mut enc = Encoder::new(config).unwrap();
    for (id, symbols) in data.iter().enumerate() {
        enc.enqueue(id as u32, symbols).unwrap();
    }
    enc
}

#[derive(Debug, Default)]
struct Transfer {
    slots: u32,
    lost: u32,
    activations: u32,
}

/// Run slots until every id is delivered in order or `max_slots` pass.
/// Each packet is lost independently with probability `loss`; the decoder's
/// in-order id is acknowledged after every slot.
fn transfer(
    enc: &mut Encoder,
    dec: &mut Decoder,
    n: u32,
    loss: f64,
    seed: u64,
    max_slots: u32,
) -> Transfer {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut t = Transfer::default();
    while dec.in_order() != Some(n - 1) && t.slots < max_slots {
        t.slots += 1;
        let Some(packet) = enc.next_packet(&mut NoMetrics) else {
            break;
        };
        let datagram = packet.encode();
        if rng.random::<f64>() < loss {
            t.lost += 1;
            continue;
        }
        let was_active = dec.is_active();
        dec.receive_bytes(&datagram, &mut NoMetrics).unwrap();
        if !was_active && dec.is_active() {
            t.activations += 1;
        }
        if let Some(ack) = dec.in_order() {
            enc.flush(ack);
        }
    }
    t
}

// ─── Lossless ───────────────────────────────────────────────────────────────

#[test]
fn lossless_stream_never_activates() {
    let data = source_data(SOURCES, 1);
    let mut enc = loaded_encoder(scenario_config(), &data);
    let mut dec = Decoder::new(scenario_config()).unwrap();

    // Acknowledge every 10 slots so repairs have something to cover.
    let mut delivered = Vec::new();
    let mut slot = 0u32;
    while dec.in_order() != Some(SOURCES - 1) {
        slot += 1;
        let packet = enc.next_packet(&mut NoMetrics).unwrap();
        let datagram = packet.encode();
        match dec.receive_bytes(&datagram, &mut NoMetrics).unwrap() {
            Reception::Delivered(id) => delivered.push(id),
            Reception::Redundant => {}
            other => panic!("unexpected {other:?}"),
        }
        assert!(!dec.is_active());
        if slot % 10 == 0 {
            if let Some(ack) = dec.in_order() {
                enc.flush(ack);
            }
        }
    }

    assert_eq!(delivered, (0..SOURCES).collect::<Vec<_>>());
    for (id, symbols) in data.iter().enumerate() {
        assert_eq!(dec.recovered(id as u32), Some(symbols.as_slice()));
    }
    assert_eq!(dec.stats().windows_activated, 0);
    assert_eq!(enc.stats().source_sent, SOURCES as u64);
    assert!(enc.stats().repairs_sent > 0);
}

// ─── Random Loss ────────────────────────────────────────────────────────────

#[test]
fn ten_percent_loss_recovers_everything() {
    let data = source_data(SOURCES, 2);
    let mut enc = loaded_encoder(scenario_config(), &data);
    let mut dec = Decoder::new(scenario_config()).unwrap();

    let t = transfer(&mut enc, &mut dec, SOURCES, 0.10, 42, 20_000);

    assert_eq!(dec.in_order(), Some(SOURCES - 1), "{t:?}");
    for (id, symbols) in data.iter().enumerate() {
        assert_eq!(dec.recovered(id as u32), Some(symbols.as_slice()), "id {id}");
    }
    assert!(t.lost > 0);
    assert!(t.activations > 0);
    assert!(dec.stats().delivered_by_decoding > 0);
    assert_eq!(
        dec.stats().delivered(),
        SOURCES as u64,
        "every id delivered exactly once"
    );
}

#[test]
fn small_fields_converge_under_loss() {
    for (w, loss, period) in [(1u8, 0.05, 1), (4, 0.20, 2)] {
        let n = 200;
        let config = scenario_config()
            .with_field_width(w)
            .with_repair(RepairSchedule::Periodic { period });
        let data = source_data(n, 3);
        let mut enc = loaded_encoder(config.clone(), &data);
        let mut dec = Decoder::new(config).unwrap();

        let t = transfer(&mut enc, &mut dec, n, loss, 7, 50_000);
        assert_eq!(dec.in_order(), Some(n - 1), "w={w} {t:?}");
        for (id, symbols) in data.iter().enumerate() {
            assert_eq!(dec.recovered(id as u32), Some(symbols.as_slice()));
        }
    }
}

#[test]
fn random_policy_transfer() {
    let n = 300;
    let config = scenario_config().with_repair(RepairSchedule::Random {
        probability: 0.2,
        seed: 11,
    });
    let data = source_data(n, 4);
    let mut enc = loaded_encoder(config.clone(), &data);
    let mut dec = Decoder::new(config).unwrap();

    transfer(&mut enc, &mut dec, n, 0.05, 5, 20_000);
    assert_eq!(dec.in_order(), Some(n - 1));
    assert_eq!(dec.recovered(n - 1), Some(data[n as usize - 1].as_slice()));
}

#[test]
fn irregular_policy_transfer() {
    let n = 300;
    let config = scenario_config()
        .with_repair(RepairSchedule::irregular(10, vec![0, 1, 2, 4, 5, 7, 8]).unwrap());
    let data = source_data(n, 5);
    let mut enc = loaded_encoder(config.clone(), &data);
    let mut dec = Decoder::new(config).unwrap();

    transfer(&mut enc, &mut dec, n, 0.10, 9, 20_000);
    assert_eq!(dec.in_order(), Some(n - 1));
    assert!(enc.stats().repairs_sent > 0);
}

// ─── Capacity Hazard ────────────────────────────────────────────────────────

#[test]
fn window_wider_than_budget_warns_and_decodes_without_repair_loss() {
    init_tracing();
    let config = scenario_config().with_window_capacity(5);
    let data = source_data(20, 6);
    let mut enc = loaded_encoder(config.clone(), &data);
    let mut dec = Decoder::new(config).unwrap();

    // No acknowledgments: the coding window spans everything sent.
    for id in 0..20 {
        let packet = enc.source_packet(&mut NoMetrics).unwrap();
        if id != 2 {
            dec.receive(packet, &mut NoMetrics);
        }
    }
    assert_eq!(dec.window(), Some((2, 19)));

    let mut repairs = 0;
    while dec.is_active() {
        let packet = enc.repair_packet(&mut NoMetrics).unwrap();
        dec.receive(packet, &mut NoMetrics);
        repairs += 1;
        assert!(repairs < 10);
    }

    assert!(enc.stats().window_overflows > 0);
    assert_eq!(dec.stats().window_overflows, 1);
    assert_eq!(dec.recovered(2), Some(data[2].as_slice()));
}

#[test]
fn window_wider_than_budget_survives_lost_repairs() {
    init_tracing();
    let config = scenario_config().with_window_capacity(4);
    let data = source_data(40, 8);
    let mut enc = loaded_encoder(config.clone(), &data);
    let mut dec = Decoder::new(config).unwrap();

    for id in 0..40 {
        let packet = enc.source_packet(&mut NoMetrics).unwrap();
        if id % 7 != 3 {
            dec.receive(packet, &mut NoMetrics);
        }
    }
    // Losing an oversized repair breaks coefficient agreement; the decoder
    // must keep going regardless of what it ends up delivering.
    for i in 0..60 {
        let packet = enc.repair_packet(&mut NoMetrics).unwrap();
        if i % 3 != 0 {
            dec.receive(packet, &mut NoMetrics);
        }
    }
    assert!(enc.stats().window_overflows > 0);
    assert!(dec.stats().window_overflows >= 1);
    assert!(dec.stats().repairs_skipped > 0);
}

// ─── Acknowledgment ─────────────────────────────────────────────────────────

#[test]
fn acknowledgments_bound_the_buffer() {
    let data = source_data(500, 9);
    let mut enc = loaded_encoder(scenario_config(), &data);
    let mut dec = Decoder::new(scenario_config()).unwrap();

    assert_eq!(enc.buffered(), 500);
    let t = transfer(&mut enc, &mut dec, 500, 0.0, 1, 10_000);
    assert_eq!(enc.buffered(), 0);
    assert_eq!(enc.stats().flushed, 500);
    assert_eq!(t.lost, 0);
}

#[test]
fn streaming_enqueue_interleaved_with_sending() {
    let config = scenario_config();
    let data = source_data(100, 10);
    let mut enc = Encoder::new(config.clone()).unwrap();
    let mut dec = Decoder::new(config).unwrap();
    let mut rng = StdRng::seed_from_u64(12);

    let mut next = 0u32;
    for _ in 0..5_000 {
        if next < 100 && rng.random::<f64>() < 0.5 {
            enc.enqueue(next, &data[next as usize]).unwrap();
            next += 1;
        }
        if let Some(packet) = enc.next_packet(&mut NoMetrics) {
            if rng.random::<f64>() >= 0.1 {
                dec.receive(packet, &mut NoMetrics);
            }
        }
        if let Some(ack) = dec.in_order() {
            enc.flush(ack);
        }
        if dec.in_order() == Some(99) {
            break;
        }
    }
    assert_eq!(dec.in_order(), Some(99));
    for id in 0..100u32 {
        assert_eq!(dec.recovered(id), Some(data[id as usize].as_slice()));
    }
}
