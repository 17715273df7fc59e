//! # Sliding-Window Encoder
//!
//! Pure logic, no I/O. Buffers source symbols until the receiver
//! acknowledges them and, slot by slot, emits either the next source packet
//! or a repair packet: a random linear combination of every buffered symbol
//! that has already been sent, `[head_id, next_source_id - 1]`.
//!
//! Repair coefficients come from the shared coefficient stream and are never
//! transmitted; see [`crate::coeff`].

use std::fmt;

use bytes::Bytes;
use tracing::{debug, warn};

use crate::buffer::SymbolBuffer;
use crate::coeff::CoefficientStream;
use crate::config::CodecConfig;
use crate::error::CodecError;
use crate::gf::Field;
use crate::metrics::Metrics;
use crate::policy::{self, SlotState, TransmissionPolicy};
use crate::stats::EncoderStats;
use crate::wire::{Packet, MAX_ID};

/// Encoder state machine.
pub struct Encoder {
    config: CodecConfig,
    field: Field,
    buffer: SymbolBuffer,
    /// Id the next `enqueue` must carry.
    next_enqueue_id: u32,
    /// Id of the next source packet to send.
    next_source_id: u32,
    repairs_sent: u32,
    stream: CoefficientStream,
    policy: Box<dyn TransmissionPolicy>,
    stats: EncoderStats,
}

impl Encoder {
    /// Create an encoder with an empty buffer.
    pub fn new(config: CodecConfig) -> Result<Self, CodecError> {
        config.validate()?;
        let field = Field::new(config.field_width)?;
        let stream =
            CoefficientStream::new(config.seed, config.field_width, config.window_capacity);
        let policy = policy::from_schedule(&config.repair);
        Ok(Encoder {
            config,
            field,
            buffer: SymbolBuffer::new(),
            next_enqueue_id: 0,
            next_source_id: 0,
            repairs_sent: 0,
            stream,
            policy,
            stats: EncoderStats::default(),
        })
    }

    /// Create an encoder preloaded with `data`, split into `packet_size`
    /// symbols (the last one zero-padded) with ids `0..n`.
    pub fn with_data(config: CodecConfig, data: &[u8]) -> Result<Self, CodecError> {
        let mut encoder = Self::new(config)?;
        let packet_size = encoder.config.packet_size;
        for chunk in data.chunks(packet_size) {
            encoder.enqueue(encoder.next_enqueue_id, chunk)?;
        }
        Ok(encoder)
    }

    /// Replace the transmission policy derived from the configuration.
    pub fn with_policy(mut self, policy: Box<dyn TransmissionPolicy>) -> Self {
        self.policy = policy;
        self
    }

    /// Append a source symbol. Ids must be contiguous starting at 0; shorter
    /// symbols are zero-padded to `packet_size`.
    pub fn enqueue(&mut self, id: u32, symbols: &[u8]) -> Result<(), CodecError> {
        if id != self.next_enqueue_id {
            return Err(CodecError::OutOfSequence {
                expected: self.next_enqueue_id,
                got: id,
            });
        }
        if id > MAX_ID {
            return Err(CodecError::IdSpaceExhausted(id));
        }
        let packet_size = self.config.packet_size;
        if symbols.len() > packet_size {
            return Err(CodecError::SymbolTooLong {
                actual: symbols.len(),
                max: packet_size,
            });
        }

        let data = if symbols.len() == packet_size {
            Bytes::copy_from_slice(symbols)
        } else {
            let mut padded = vec![0u8; packet_size];
            padded[..symbols.len()].copy_from_slice(symbols);
            Bytes::from(padded)
        };

        if self.buffer.push(id, data) {
            self.stats.buffer_grows += 1;
            debug!(capacity = self.buffer.capacity(), "encoder buffer grown");
        }
        self.next_enqueue_id = id + 1;
        self.stats.enqueued += 1;
        Ok(())
    }

    /// Produce the packet for the next transmission slot, or `None` if
    /// nothing is buffered.
    ///
    /// A repair is sent when every buffered symbol has already gone out, or
    /// when the policy asks for one and at least one sent symbol is still
    /// unacknowledged. Otherwise the next source packet is sent.
    pub fn next_packet(&mut self, metrics: &mut impl Metrics) -> Option<Packet> {
        if self.repair_due() {
            self.repair_packet(metrics)
        } else {
            self.source_packet(metrics)
        }
    }

    /// Decide whether this slot carries a repair. Consults the policy (which
    /// may advance its state) only when both kinds of packet are possible.
    pub fn repair_due(&mut self) -> bool {
        let (Some(head_id), Some(tail_id)) = (self.buffer.head_id(), self.buffer.tail_id()) else {
            return false;
        };
        if self.next_source_id > tail_id {
            return true;
        }
        let slot = self.slot_state();
        self.next_source_id > head_id && self.policy.repair_due(&slot)
    }

    /// Send the next unsent source symbol uncoded.
    pub fn source_packet(&mut self, metrics: &mut impl Metrics) -> Option<Packet> {
        let id = self.next_source_id;
        let symbols = self.buffer.get(id)?.to_vec();
        self.next_source_id += 1;
        self.stats.source_sent += 1;
        metrics.source_sent(id);
        debug!(id, "source packet");
        Some(Packet::source(id, symbols))
    }

    /// Code across every sent, unacknowledged symbol.
    pub fn repair_packet(&mut self, metrics: &mut impl Metrics) -> Option<Packet> {
        let head_id = self.buffer.head_id()?;
        if self.next_source_id <= head_id {
            return None;
        }
        self.build_repair(head_id, self.next_source_id - 1, metrics)
    }

    /// Code across at most the `max_width` most recently sent symbols.
    pub fn repair_packet_limited(
        &mut self,
        max_width: u32,
        metrics: &mut impl Metrics,
    ) -> Option<Packet> {
        let head_id = self.buffer.head_id()?;
        if max_width == 0 || self.next_source_id <= head_id {
            return None;
        }
        let start = head_id.max(self.next_source_id.saturating_sub(max_width));
        self.build_repair(start, self.next_source_id - 1, metrics)
    }

    fn build_repair(&mut self, start: u32, end: u32, metrics: &mut impl Metrics) -> Option<Packet> {
        let width = (end - start) as usize + 1;
        let capacity = self.config.window_capacity;
        if width > capacity {
            warn!(
                width,
                capacity, "encoding window exceeds the coefficient budget; a lost repair will desynchronise the decoder"
            );
            self.stats.window_overflows += 1;
            metrics.capacity_exceeded(width, capacity);
        }

        let coefficients = self.stream.draw_repair(width);
        let mut symbols = vec![0u8; self.config.packet_size];
        for (&c, source) in coefficients.iter().zip(self.buffer.range(start, end)) {
            self.field.mul_add_region(&mut symbols, source, c);
        }

        let id = self.repairs_sent;
        self.repairs_sent += 1;
        self.stats.repairs_sent += 1;
        self.stats.max_window_width = self.stats.max_window_width.max(width);
        metrics.repair_sent(id, start, end);
        debug!(repair_id = id, start, end, "repair packet");
        Some(Packet::repair(id, start, end, coefficients, symbols))
    }

    /// Release every buffered symbol up to and including `ack_id`, the
    /// receiver's last in-order id. Returns the number of slots freed.
    pub fn flush(&mut self, ack_id: u32) -> usize {
        self.stats.acks += 1;
        let Some(tail_id) = self.buffer.tail_id() else {
            return 0;
        };
        let released = self.buffer.release_through(ack_id);
        if released > 0 {
            self.next_source_id = self.next_source_id.max(ack_id.min(tail_id) + 1);
            self.stats.flushed += released as u64;
            debug!(ack_id, released, head = ?self.buffer.head_id(), "flushed acknowledged symbols");
        }
        released
    }

    fn slot_state(&self) -> SlotState {
        SlotState {
            packets_sent: self.stats.packets_sent(),
            repairs_sent: self.repairs_sent as u64,
            next_source_id: self.next_source_id,
        }
    }

    /// Oldest unacknowledged id.
    pub fn head_id(&self) -> Option<u32> {
        self.buffer.head_id()
    }

    /// Newest buffered id.
    pub fn tail_id(&self) -> Option<u32> {
        self.buffer.tail_id()
    }

    /// Id of the next source packet to send.
    pub fn next_source_id(&self) -> u32 {
        self.next_source_id
    }

    /// Number of buffered (unacknowledged) symbols.
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    /// Current buffer capacity in slots.
    pub fn capacity(&self) -> usize {
        self.buffer.capacity()
    }

    /// Whether `id` still has a live buffer slot.
    pub fn is_buffered(&self, id: u32) -> bool {
        self.buffer.get(id).is_some()
    }

    pub fn stats(&self) -> &EncoderStats {
        &self.stats
    }

    pub fn config(&self) -> &CodecConfig {
        &self.config
    }
}

impl fmt::Debug for Encoder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Encoder")
            .field("enqueued", &self.next_enqueue_id)
            .field("capacity", &self.buffer.capacity())
            .field("next_source_id", &self.next_source_id)
            .field("head_id", &self.buffer.head_id())
            .field("tail_id", &self.buffer.tail_id())
            .field("buffered", &self.buffer.len())
            .field("policy", &self.policy)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RepairSchedule;
    use crate::error::ConfigError;
    use crate::metrics::NoMetrics;
    use crate::wire::PacketKind;

    fn config(packet_size: usize, period: u32) -> CodecConfig {
        CodecConfig::default()
            .with_packet_size(packet_size)
            .with_repair(RepairSchedule::Periodic { period })
    }

    fn filled(n: u32, packet_size: usize, period: u32) -> Encoder {
        let mut enc = Encoder::new(config(packet_size, period)).unwrap();
        for id in 0..n {
            let sym: Vec<u8> = (0..packet_size).map(|j| (id as usize * 31 + j) as u8).collect();
            enc.enqueue(id, &sym).unwrap();
        }
        enc
    }

    #[test]
    fn new_rejects_invalid_schedule_instead_of_panicking() {
        let cfg = config(4, 5).with_repair(RepairSchedule::Irregular {
            range: 0,
            source_positions: vec![0],
        });
        let err = Encoder::new(cfg).unwrap_err();
        assert!(matches!(err, CodecError::Config(ConfigError::Irregular(_))));

        let cfg = config(4, 5).with_repair(RepairSchedule::Random {
            probability: f64::NAN,
            seed: 1,
        });
        assert!(matches!(
            Encoder::new(cfg),
            Err(CodecError::Config(ConfigError::RepairRate(_)))
        ));
    }

    // ─── Enqueue ────────────────────────────────────────────────────────

    #[test]
    fn enqueue_requires_contiguous_ids() {
        let mut enc = Encoder::new(config(4, 5)).unwrap();
        enc.enqueue(0, &[1, 2, 3, 4]).unwrap();
        let err = enc.enqueue(2, &[0; 4]).unwrap_err();
        assert!(matches!(err, CodecError::OutOfSequence { expected: 1, got: 2 }));
    }

    #[test]
    fn enqueue_pads_short_and_rejects_long_symbols() {
        let mut enc = Encoder::new(config(4, 5)).unwrap();
        enc.enqueue(0, &[7, 7]).unwrap();
        let pkt = enc.source_packet(&mut NoMetrics).unwrap();
        assert_eq!(pkt.symbols, vec![7, 7, 0, 0]);

        let err = enc.enqueue(1, &[0; 5]).unwrap_err();
        assert!(matches!(err, CodecError::SymbolTooLong { actual: 5, max: 4 }));
    }

    #[test]
    fn buffer_grows_past_initial_capacity() {
        let enc = filled(120, 2, 5);
        assert_eq!(enc.buffered(), 120);
        assert_eq!(enc.capacity(), 200);
        assert_eq!(enc.stats().buffer_grows, 2);
    }

    #[test]
    fn with_data_splits_and_pads() {
        let data: Vec<u8> = (0..10).collect();
        let mut enc = Encoder::with_data(config(4, 5), &data).unwrap();
        assert_eq!(enc.tail_id(), Some(2));
        let pkts: Vec<Packet> = (0..3)
            .map(|_| enc.source_packet(&mut NoMetrics).unwrap())
            .collect();
        assert_eq!(pkts[0].symbols, vec![0, 1, 2, 3]);
        assert_eq!(pkts[2].symbols, vec![8, 9, 0, 0]);
    }

    // ─── Scheduling ─────────────────────────────────────────────────────

    #[test]
    fn empty_encoder_sends_nothing() {
        let mut enc = Encoder::new(config(4, 5)).unwrap();
        assert!(enc.next_packet(&mut NoMetrics).is_none());
        assert!(enc.repair_packet(&mut NoMetrics).is_none());
    }

    #[test]
    fn periodic_schedule_interleaves_repairs() {
        let mut enc = filled(20, 8, 5);
        let kinds: Vec<bool> = (0..12)
            .map(|_| enc.next_packet(&mut NoMetrics).unwrap().is_repair())
            .collect();
        let expected: Vec<bool> = (0..12).map(|i| i % 6 == 5).collect();
        assert_eq!(kinds, expected);
        assert_eq!(enc.stats().source_sent, 10);
        assert_eq!(enc.stats().repairs_sent, 2);
    }

    #[test]
    fn repairs_only_once_everything_is_sent() {
        let mut enc = filled(2, 8, 1000);
        assert!(!enc.next_packet(&mut NoMetrics).unwrap().is_repair());
        assert!(!enc.next_packet(&mut NoMetrics).unwrap().is_repair());
        for _ in 0..3 {
            let pkt = enc.next_packet(&mut NoMetrics).unwrap();
            assert_eq!(pkt.window(), Some((0, 1)));
        }
    }

    #[test]
    fn first_slot_is_never_a_repair() {
        let mut enc = filled(4, 8, 0).with_policy(Box::new(policy::RandomRate::new(1.0, 0)));
        assert!(!enc.next_packet(&mut NoMetrics).unwrap().is_repair());
        assert!(enc.next_packet(&mut NoMetrics).unwrap().is_repair());
    }

    // ─── Repair Construction ────────────────────────────────────────────

    #[test]
    fn repair_is_linear_combination_of_window() {
        let mut enc = filled(5, 16, 1000);
        let sources: Vec<Packet> = (0..4)
            .map(|_| enc.source_packet(&mut NoMetrics).unwrap())
            .collect();
        let repair = enc.repair_packet(&mut NoMetrics).unwrap();
        assert_eq!(
            repair.kind,
            PacketKind::Repair {
                id: 0,
                window_start: 0,
                window_end: 3
            }
        );

        let coefficients = repair.coefficients.as_ref().unwrap();
        assert_eq!(coefficients.len(), 4);
        let field = Field::new(8).unwrap();
        let mut expected = vec![0u8; 16];
        for (c, src) in coefficients.iter().zip(&sources) {
            field.mul_add_region(&mut expected, &src.symbols, *c);
        }
        assert_eq!(repair.symbols, expected);
    }

    #[test]
    fn repair_coefficients_follow_shared_stream() {
        let mut enc = filled(6, 4, 1000);
        for _ in 0..3 {
            enc.source_packet(&mut NoMetrics);
        }
        let r0 = enc.repair_packet(&mut NoMetrics).unwrap();
        enc.source_packet(&mut NoMetrics);
        let r1 = enc.repair_packet(&mut NoMetrics).unwrap();

        let mut stream = CoefficientStream::new(crate::config::DEFAULT_SEED, 8, 100);
        assert_eq!(r0.coefficients.unwrap(), stream.draw_repair(3));
        assert_eq!(r1.coefficients.clone().unwrap(), stream.draw_repair(4));
        assert_eq!(r1.repair_id(), Some(1));
    }

    #[test]
    fn limited_repair_covers_recent_symbols() {
        let mut enc = filled(8, 4, 1000);
        for _ in 0..6 {
            enc.source_packet(&mut NoMetrics);
        }
        let pkt = enc.repair_packet_limited(2, &mut NoMetrics).unwrap();
        assert_eq!(pkt.window(), Some((4, 5)));
        let pkt = enc.repair_packet_limited(50, &mut NoMetrics).unwrap();
        assert_eq!(pkt.window(), Some((0, 5)));
    }

    #[test]
    fn oversized_window_is_flagged_but_sent() {
        let cfg = config(4, 1000).with_window_capacity(3);
        let mut enc = Encoder::new(cfg).unwrap();
        for id in 0..5 {
            enc.enqueue(id, &[id as u8; 4]).unwrap();
        }
        for _ in 0..5 {
            enc.source_packet(&mut NoMetrics);
        }
        let pkt = enc.repair_packet(&mut NoMetrics).unwrap();
        assert_eq!(pkt.coefficients.as_ref().unwrap().len(), 5);
        assert_eq!(enc.stats().window_overflows, 1);
        assert_eq!(enc.stats().max_window_width, 5);
    }

    // ─── Flush ──────────────────────────────────────────────────────────

    #[test]
    fn flush_releases_acknowledged_prefix() {
        let mut enc = filled(10, 4, 1000);
        for _ in 0..6 {
            enc.source_packet(&mut NoMetrics);
        }
        assert_eq!(enc.flush(3), 4);
        assert_eq!(enc.head_id(), Some(4));
        for id in 0..=3 {
            assert!(!enc.is_buffered(id));
        }
        for id in 4..10 {
            assert!(enc.is_buffered(id));
        }
        let pkt = enc.repair_packet(&mut NoMetrics).unwrap();
        assert_eq!(pkt.window(), Some((4, 5)));
    }

    #[test]
    fn flush_below_head_is_noop() {
        let mut enc = filled(10, 4, 1000);
        enc.source_packet(&mut NoMetrics);
        enc.flush(4);
        assert_eq!(enc.flush(2), 0);
        assert_eq!(enc.head_id(), Some(5));
    }

    #[test]
    fn flush_of_tail_empties_buffer() {
        let mut enc = filled(3, 4, 1000);
        for _ in 0..3 {
            enc.source_packet(&mut NoMetrics);
        }
        assert_eq!(enc.flush(2), 3);
        assert_eq!(enc.buffered(), 0);
        assert!(enc.next_packet(&mut NoMetrics).is_none());

        enc.enqueue(3, &[1; 4]).unwrap();
        let pkt = enc.next_packet(&mut NoMetrics).unwrap();
        assert_eq!(pkt.source_id(), Some(3));
    }

    #[test]
    fn debug_shows_buffer_occupancy() {
        let enc = filled(3, 4, 5);
        let s = format!("{enc:?}");
        assert!(s.contains("buffered: 3"), "{s}");
        assert!(s.contains("tail_id: Some(2)"), "{s}");
    }
}
