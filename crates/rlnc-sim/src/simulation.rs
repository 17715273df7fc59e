//! Slotted encoder → channel → decoder simulation.
//!
//! One packet per slot at most. A packet sent in slot `t` that survives the
//! channel reaches the decoder in slot `t + propagation_delay`; the decoder's
//! in-order id is fed back every `ack_period` slots over a lossless link with
//! the same delay.

use std::fmt;

use anyhow::Context;
use bytes::Bytes;
use rand::rngs::StdRng;
use rand::RngExt as _;
use rand::SeedableRng;
use serde::Serialize;
use tracing::{debug, info};

use rlnc_stream::stats::{DecoderStats, EncoderStats};
use rlnc_stream::{CodecConfig, Decoder, Encoder, Packet};

use crate::channel::{Channel, ChannelModel};
use crate::timeline::{summarize, Timeline};

/// Repair packets restricted to the most recent symbols.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ShortRepair {
    /// Chance that a repair slot sends a short repair.
    pub probability: f64,
    /// Window width of a short repair.
    pub width: u32,
}

#[derive(Debug, Clone)]
pub struct SimConfig {
    pub codec: CodecConfig,
    pub sources: u32,
    /// Per-slot arrival probability; 0 enqueues everything before slot 0.
    pub arrival_rate: f64,
    pub channel: ChannelModel,
    /// Slots between sending and reception (`T_P`).
    pub propagation_delay: u32,
    pub ack_period: u32,
    /// Per-slot chance of swapping two in-flight packets.
    pub reorder_probability: f64,
    pub short_repair: Option<ShortRepair>,
    /// Seeds the source data, arrivals, reordering and short repairs.
    pub seed: u64,
    /// Seeds the channel.
    pub channel_seed: u64,
    pub max_slots: u64,
}

impl Default for SimConfig {
    fn default() -> Self {
        SimConfig {
            codec: CodecConfig::default(),
            sources: 1000,
            arrival_rate: 0.0,
            channel: ChannelModel::Lossless,
            propagation_delay: 0,
            ack_period: 1,
            reorder_probability: 0.0,
            short_repair: None,
            seed: 1,
            channel_seed: 2,
            max_slots: 1_000_000,
        }
    }
}

impl SimConfig {
    pub fn validate(&self) -> anyhow::Result<()> {
        self.codec.validate().context("codec configuration")?;
        self.channel.validate()?;
        anyhow::ensure!(self.sources > 0, "at least one source packet is required");
        anyhow::ensure!(
            (0.0..1.0).contains(&self.arrival_rate),
            "arrival rate must be in [0, 1)"
        );
        anyhow::ensure!(self.ack_period > 0, "ack period must be positive");
        anyhow::ensure!(
            (0.0..=1.0).contains(&self.reorder_probability),
            "reorder probability must be in [0, 1]"
        );
        if let Some(short) = self.short_repair {
            anyhow::ensure!(short.width > 0, "short repair width must be positive");
            anyhow::ensure!(
                (0.0..=1.0).contains(&short.probability),
                "short repair probability must be in [0, 1]"
            );
        }
        Ok(())
    }
}

/// Outcome of one run.
#[derive(Debug, Clone, Serialize)]
pub struct SimReport {
    pub sources: u32,
    pub slots: u64,
    /// Packets put on the channel.
    pub channel_uses: u64,
    pub erasures: u64,
    pub erasure_rate: f64,
    /// Ids delivered in order by the end of the run.
    pub delivered: u32,
    /// Every id delivered and byte-identical to the source.
    pub all_correct: bool,
    pub mean_in_order_delay: f64,
    pub max_in_order_delay: u64,
    pub mean_queueing_delay: f64,
    pub windows_solved: u64,
    pub capacity_warnings: u64,
    pub encoder: EncoderStats,
    pub decoder: DecoderStats,
}

impl fmt::Display for SimReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "sources={} delivered={} correct={} slots={} uses={} erasure={:.3} \
             repairs={} delay(mean={:.2}, max={}) windows={}",
            self.sources,
            self.delivered,
            self.all_correct,
            self.slots,
            self.channel_uses,
            self.erasure_rate,
            self.encoder.repairs_sent,
            self.mean_in_order_delay,
            self.max_in_order_delay,
            self.windows_solved,
        )
    }
}

pub struct Simulation {
    config: SimConfig,
    encoder: Encoder,
    decoder: Decoder,
    channel: Box<dyn Channel>,
    rng: StdRng,
    data: Vec<Vec<u8>>,
    timeline: Timeline,
    /// Packets in flight, indexed by send slot modulo `T_P + 1`.
    in_flight: Vec<Option<Bytes>>,
    /// Acknowledgments in flight, same indexing.
    feedback: Vec<Option<u32>>,
    next_enqueue: u32,
    channel_uses: u64,
    erasures: u64,
}

impl Simulation {
    pub fn new(config: SimConfig) -> anyhow::Result<Self> {
        config.validate()?;
        let encoder = Encoder::new(config.codec.clone())?;
        let decoder = Decoder::new(config.codec.clone())?;
        let channel = config.channel.build(config.channel_seed);

        let mut rng = StdRng::seed_from_u64(config.seed);
        let data = (0..config.sources)
            .map(|_| {
                (0..config.codec.packet_size)
                    .map(|_| rng.random::<u8>())
                    .collect()
            })
            .collect();

        let lanes = config.propagation_delay as usize + 1;
        Ok(Simulation {
            encoder,
            decoder,
            channel,
            rng,
            data,
            timeline: Timeline::new(),
            in_flight: vec![None; lanes],
            feedback: vec![None; lanes],
            next_enqueue: 0,
            channel_uses: 0,
            erasures: 0,
            config,
        })
    }

    /// Run until every id is delivered in order or `max_slots` elapse.
    pub fn run(mut self) -> anyhow::Result<SimReport> {
        info!(
            sources = self.config.sources,
            channel = ?self.config.channel,
            repair = ?self.config.codec.repair,
            delay = self.config.propagation_delay,
            "simulation starting"
        );

        if self.config.arrival_rate == 0.0 {
            while self.next_enqueue < self.config.sources {
                self.enqueue_next()?;
            }
        }

        let last = self.config.sources - 1;
        let mut slot = 0u64;
        while slot < self.config.max_slots && self.decoder.in_order() != Some(last) {
            self.step(slot)?;
            slot += 1;
        }

        let report = self.report(slot);
        info!(%report, "simulation finished");
        Ok(report)
    }

    fn enqueue_next(&mut self) -> anyhow::Result<()> {
        let id = self.next_enqueue;
        self.encoder.enqueue(id, &self.data[id as usize])?;
        self.timeline.arrived(id);
        self.next_enqueue += 1;
        Ok(())
    }

    fn step(&mut self, slot: u64) -> anyhow::Result<()> {
        self.timeline.set_slot(slot);
        let lanes = self.in_flight.len() as u64;
        let delay = self.config.propagation_delay as u64;
        let send_lane = (slot % lanes) as usize;

        if self.config.arrival_rate > 0.0
            && self.next_enqueue < self.config.sources
            && self.rng.random::<f64>() < self.config.arrival_rate
        {
            self.enqueue_next()?;
        }

        if let Some(packet) = self.next_packet() {
            self.channel_uses += 1;
            if self.channel.erased() {
                self.erasures += 1;
                debug!(slot, kind = ?packet.kind, "packet erased");
            } else {
                self.in_flight[send_lane] = Some(packet.encode().freeze());
            }
        }

        if lanes > 1 && self.rng.random::<f64>() < self.config.reorder_probability {
            let a = self.rng.random_range(0..lanes as usize);
            let b = self.rng.random_range(0..lanes as usize);
            self.in_flight.swap(a, b);
        }

        if slot >= delay {
            let receive_lane = ((slot - delay) % lanes) as usize;
            if let Some(datagram) = self.in_flight[receive_lane].take() {
                self.decoder.receive_bytes(&datagram, &mut self.timeline)?;
            }

            if slot % self.config.ack_period as u64 == 0 {
                if let Some(ack) = self.decoder.in_order() {
                    self.feedback[send_lane] = Some(ack);
                }
            }
            if let Some(ack) = self.feedback[receive_lane].take() {
                self.encoder.flush(ack);
            }
        }
        Ok(())
    }

    fn next_packet(&mut self) -> Option<Packet> {
        if !self.encoder.repair_due() {
            return self.encoder.source_packet(&mut self.timeline);
        }
        match self.config.short_repair {
            Some(short) if self.rng.random::<f64>() < short.probability => self
                .encoder
                .repair_packet_limited(short.width, &mut self.timeline),
            _ => self.encoder.repair_packet(&mut self.timeline),
        }
    }

    fn report(&self, slots: u64) -> SimReport {
        let delivered = self.decoder.in_order().map_or(0, |id| id + 1);
        let all_correct = delivered == self.config.sources
            && self
                .data
                .iter()
                .enumerate()
                .all(|(id, symbols)| self.decoder.recovered(id as u32) == Some(symbols.as_slice()));
        let (mean_in_order_delay, max_in_order_delay) = summarize(self.timeline.in_order_delays());
        let (mean_queueing_delay, _) = summarize(self.timeline.queueing_delays());

        SimReport {
            sources: self.config.sources,
            slots,
            channel_uses: self.channel_uses,
            erasures: self.erasures,
            erasure_rate: if self.channel_uses == 0 {
                0.0
            } else {
                self.erasures as f64 / self.channel_uses as f64
            },
            delivered,
            all_correct,
            mean_in_order_delay,
            max_in_order_delay,
            mean_queueing_delay,
            windows_solved: self.timeline.windows_solved(),
            capacity_warnings: self.timeline.capacity_warnings(),
            encoder: self.encoder.stats().clone(),
            decoder: self.decoder.stats().clone(),
        }
    }

    pub fn timeline(&self) -> &Timeline {
        &self.timeline
    }
}
