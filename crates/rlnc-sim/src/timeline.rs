//! Per-id timing, recorded through the codec's metrics hooks.

use rlnc_stream::Metrics;
use tracing::debug;

/// Slot-stamped history of every source id.
#[derive(Debug, Default)]
pub struct Timeline {
    slot: u64,
    arrived: Vec<Option<u64>>,
    sent: Vec<Option<u64>>,
    delivered: Vec<Option<u64>>,
    windows_solved: u64,
    capacity_warnings: u64,
}

fn stamp(column: &mut Vec<Option<u64>>, id: u32, slot: u64) {
    let idx = id as usize;
    if column.len() <= idx {
        column.resize(idx + 1, None);
    }
    column[idx].get_or_insert(slot);
}

fn get(column: &[Option<u64>], id: u32) -> Option<u64> {
    column.get(id as usize).copied().flatten()
}

impl Timeline {
    pub fn new() -> Self {
        Self::default()
    }

    /// Advance the clock; later events are stamped with `slot`.
    pub fn set_slot(&mut self, slot: u64) {
        self.slot = slot;
    }

    pub fn slot(&self) -> u64 {
        self.slot
    }

    /// Source id entered the encoder's queue.
    pub fn arrived(&mut self, id: u32) {
        stamp(&mut self.arrived, id, self.slot);
    }

    pub fn sent_at(&self, id: u32) -> Option<u64> {
        get(&self.sent, id)
    }

    pub fn delivered_at(&self, id: u32) -> Option<u64> {
        get(&self.delivered, id)
    }

    /// In-order delay of every delivered id: delivery slot minus the slot
    /// its source packet was first sent.
    pub fn in_order_delays(&self) -> impl Iterator<Item = u64> + '_ {
        self.delivered.iter().enumerate().filter_map(|(id, d)| {
            let sent = get(&self.sent, id as u32)?;
            Some((*d)?.saturating_sub(sent))
        })
    }

    /// Slots each id waited in the encoder queue before its first send.
    pub fn queueing_delays(&self) -> impl Iterator<Item = u64> + '_ {
        self.sent.iter().enumerate().filter_map(|(id, s)| {
            let arrived = get(&self.arrived, id as u32)?;
            Some((*s)?.saturating_sub(arrived))
        })
    }

    pub fn windows_solved(&self) -> u64 {
        self.windows_solved
    }

    pub fn capacity_warnings(&self) -> u64 {
        self.capacity_warnings
    }
}

impl Metrics for Timeline {
    fn source_sent(&mut self, id: u32) {
        stamp(&mut self.sent, id, self.slot);
    }

    fn delivered(&mut self, id: u32) {
        stamp(&mut self.delivered, id, self.slot);
    }

    fn window_solved(&mut self, window_start: u32, window_end: u32) {
        self.windows_solved += 1;
        debug!(slot = self.slot, window_start, window_end, "window decoded");
    }

    fn capacity_exceeded(&mut self, _width: usize, _capacity: usize) {
        self.capacity_warnings += 1;
    }
}

/// Mean and maximum of a delay sample; zeros when empty.
pub fn summarize(delays: impl Iterator<Item = u64>) -> (f64, u64) {
    let (mut n, mut sum, mut max) = (0u64, 0u64, 0u64);
    for d in delays {
        n += 1;
        sum += d;
        max = max.max(d);
    }
    if n == 0 {
        (0.0, 0)
    } else {
        (sum as f64 / n as f64, max)
    }
}
