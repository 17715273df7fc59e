//! # Coefficient Stream Synchronization
//!
//! Coding coefficients never travel on the wire. Both sides replay the same
//! MT19937 stream, and every repair packet consumes a fixed budget of `W`
//! draws: `width` real coefficients followed by `W - width` discards. A
//! decoder that sees repair id `r` after `last` therefore knows exactly how
//! far to fast-forward: `(r - last - 1) * W` draws for the lost packets.
//!
//! A repair window wider than `W` consumes `width` draws instead. The
//! receiver mirrors that when it gets the packet, but cannot account for it
//! when the packet is lost, so such windows are flagged as a capacity hazard
//! by the encoder and decoder.

use tracing::debug;

use crate::prng::Mt19937;

/// Field-element view of the shared generator.
#[derive(Debug, Clone)]
pub struct CoefficientStream {
    rng: Mt19937,
    mask: u32,
    /// Draws per repair slot (`W`).
    budget: usize,
    draws: u64,
}

impl CoefficientStream {
    pub fn new(seed: u32, field_width: u8, budget: usize) -> Self {
        CoefficientStream {
            rng: Mt19937::new(seed),
            mask: (1u32 << field_width) - 1,
            budget,
            draws: 0,
        }
    }

    /// Next element in `[0, 2^w)`.
    pub fn next_element(&mut self) -> u8 {
        self.draws += 1;
        (self.rng.next_u32() & self.mask) as u8
    }

    /// Coefficients for one repair packet of the given width; advances the
    /// stream by `max(width, W)` draws.
    pub fn draw_repair(&mut self, width: usize) -> Vec<u8> {
        let coefficients = (0..width).map(|_| self.next_element()).collect();
        self.discard(self.budget.saturating_sub(width));
        coefficients
    }

    /// Burn the draws of `count` repair packets that will never be seen.
    pub fn skip_repairs(&mut self, count: u64) {
        for _ in 0..count {
            self.discard(self.budget);
        }
    }

    fn discard(&mut self, n: usize) {
        for _ in 0..n {
            self.rng.next_u32();
        }
        self.draws += n as u64;
    }

    /// Draws consumed so far.
    pub fn draws(&self) -> u64 {
        self.draws
    }

    /// Draws per repair slot (`W`).
    pub fn budget(&self) -> usize {
        self.budget
    }
}

/// Decoder-side replay of the encoder's coefficient stream.
#[derive(Debug, Clone)]
pub struct RepairSync {
    stream: CoefficientStream,
    last_repair: Option<u32>,
    skipped: u64,
}

impl RepairSync {
    pub fn new(stream: CoefficientStream) -> Self {
        RepairSync {
            stream,
            last_repair: None,
            skipped: 0,
        }
    }

    /// Regenerate the coefficients the encoder used for `repair_id`.
    ///
    /// Returns `None` if `repair_id` is not newer than the last processed
    /// repair: the stream cannot rewind, so such a packet is unusable.
    pub fn coefficients(&mut self, repair_id: u32, width: usize) -> Option<Vec<u8>> {
        let gap = self.gap(repair_id)?;
        if gap > 0 {
            debug!(repair_id, gap, "skipping coefficients of lost repair packets");
            self.stream.skip_repairs(gap);
            self.skipped += gap;
        }
        self.last_repair = Some(repair_id);
        Some(self.stream.draw_repair(width))
    }

    /// Repair packets lost between the last processed one and `repair_id`,
    /// or `None` if `repair_id` is stale.
    pub fn gap(&self, repair_id: u32) -> Option<u64> {
        match self.last_repair {
            None => Some(repair_id as u64),
            Some(last) if repair_id > last => Some((repair_id - last - 1) as u64),
            Some(_) => None,
        }
    }

    /// Id of the last repair packet whose coefficients were regenerated.
    pub fn last_repair(&self) -> Option<u32> {
        self.last_repair
    }

    /// Repair packets skipped so far (never received).
    pub fn skipped(&self) -> u64 {
        self.skipped
    }
}
