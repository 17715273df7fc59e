//! # Sliding-Window Decoder
//!
//! Pure logic, no I/O. Two states:
//!
//! - **Inactive**: everything up to `in_order` has been delivered and no
//!   coding is pending. The next in-order source packet is delivered
//!   directly; anything else opens a decoding window.
//! - **Active**: a window `[in_order + 1, end]` of unknown ids is being
//!   solved by on-the-fly Gaussian elimination. Each packet becomes a row
//!   over the window's columns and is reduced against the pivot rows already
//!   held. A row that survives with a non-zero entry becomes the pivot of its
//!   leading column. Once every column has a pivot, back-substitution yields
//!   the whole window, which is delivered and the decoder goes inactive.
//!
//! A packet that would widen the window past `max_window_width`, or whose
//! repair id jumps more than `max_window_width` repairs ahead, is rejected
//! before any coefficients are drawn or rows allocated. So is an in-memory
//! packet whose payload is not `packet_size` bytes.
//!
//! Pivot rows live in a banded arena: the row for column `c` starts at `c`
//! and only stores up to its last non-zero coefficient.

use bytes::Bytes;
use tracing::{debug, warn};

use crate::coeff::{CoefficientStream, RepairSync};
use crate::config::CodecConfig;
use crate::error::CodecError;
use crate::gf::Field;
use crate::metrics::Metrics;
use crate::stats::DecoderStats;
use crate::wire::{Packet, PacketKind};

/// Outcome of feeding one packet to the decoder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reception {
    /// Source packet delivered directly, in order.
    Delivered(u32),
    /// Absorbed into the active window; not yet solvable.
    Pending {
        degrees_of_freedom: usize,
        width: usize,
    },
    /// The window `start..=end` was solved and delivered.
    Recovered { start: u32, end: u32 },
    /// Carried no new information.
    Redundant,
    /// Repair id not newer than the last one processed; its coefficients
    /// can no longer be regenerated.
    Stale,
    /// Dropped unprocessed: wrong payload size, or beyond the window limit.
    Rejected,
}

// ─── Pivot Arena ────────────────────────────────────────────────────────────

/// Pivot row for one window column. Empty `coeffs` means no pivot.
#[derive(Debug, Clone, Default)]
struct RowSlot {
    /// `coeffs[k]` is the coefficient of column `col + k`; `coeffs[0] != 0`.
    coeffs: Vec<u8>,
    message: Vec<u8>,
}

impl RowSlot {
    fn is_pivot(&self) -> bool {
        !self.coeffs.is_empty()
    }
}

/// Column-indexed pivot rows. Slot allocations are kept across windows.
#[derive(Debug)]
struct PivotArena {
    slots: Vec<RowSlot>,
    row_capacity: usize,
}

impl PivotArena {
    fn new(row_capacity: usize) -> Self {
        PivotArena {
            slots: Vec::new(),
            row_capacity,
        }
    }

    fn ensure_columns(&mut self, width: usize) {
        if self.slots.len() < width {
            let row_capacity = self.row_capacity;
            self.slots.resize_with(width, || RowSlot {
                coeffs: Vec::with_capacity(row_capacity),
                message: Vec::new(),
            });
        }
    }

    fn install(&mut self, col: usize, coeffs: &[u8], message: Vec<u8>) {
        let slot = &mut self.slots[col];
        slot.coeffs.clear();
        slot.coeffs.extend_from_slice(coeffs);
        slot.message = message;
    }

    /// Drop the pivots of columns `0..width`.
    fn release(&mut self, width: usize) {
        for slot in &mut self.slots[..width] {
            slot.coeffs.clear();
        }
    }
}

// ─── Decoder ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy)]
struct Window {
    start: u32,
    end: u32,
    degrees_of_freedom: usize,
    overflow_reported: bool,
}

impl Window {
    fn width(&self) -> usize {
        (self.end - self.start) as usize + 1
    }
}

/// Decoder state machine.
#[derive(Debug)]
pub struct Decoder {
    config: CodecConfig,
    field: Field,
    sync: RepairSync,
    /// `None` while inactive.
    window: Option<Window>,
    arena: PivotArena,
    /// Delivered symbols, indexed by source id. Only ever appended to.
    recovered: Vec<Bytes>,
    stats: DecoderStats,
}

impl Decoder {
    pub fn new(config: CodecConfig) -> Result<Self, CodecError> {
        config.validate()?;
        let field = Field::new(config.field_width)?;
        let stream =
            CoefficientStream::new(config.seed, config.field_width, config.window_capacity);
        let arena = PivotArena::new(config.window_capacity);
        Ok(Decoder {
            config,
            field,
            sync: RepairSync::new(stream),
            window: None,
            arena,
            recovered: Vec::new(),
            stats: DecoderStats::default(),
        })
    }

    /// Parse a datagram and feed it to the decoder.
    pub fn receive_bytes(
        &mut self,
        datagram: &[u8],
        metrics: &mut impl Metrics,
    ) -> Result<Reception, CodecError> {
        let packet = Packet::decode(datagram, self.config.packet_size)?;
        Ok(self.receive(packet, metrics))
    }

    /// Feed one packet to the decoder.
    pub fn receive(&mut self, packet: Packet, metrics: &mut impl Metrics) -> Reception {
        let Packet {
            kind,
            coefficients: _,
            symbols,
        } = packet;
        if symbols.len() != self.config.packet_size {
            self.stats.rejected += 1;
            debug!(
                len = symbols.len(),
                packet_size = self.config.packet_size,
                "packet with wrong payload size rejected"
            );
            return Reception::Rejected;
        }

        match kind {
            PacketKind::Source { id } => {
                self.stats.source_received += 1;
                if self.beyond_limit(id, id) {
                    return self.reject(id);
                }
                self.receive_source(id, symbols, metrics)
            }
            PacketKind::Repair {
                id,
                window_start,
                window_end,
            } => {
                self.stats.repairs_received += 1;
                let width = (window_end - window_start) as usize + 1;
                let gap = self.sync.gap(id).unwrap_or(0);
                if self.beyond_limit(window_start, window_end)
                    || gap > self.config.max_window_width as u64
                {
                    return self.reject(window_end);
                }
                // Draw first: even a useless repair advances the stream.
                let Some(coefficients) = self.sync.coefficients(id, width) else {
                    self.stats.stale_repairs += 1;
                    debug!(repair_id = id, last = ?self.sync.last_repair(), "stale repair packet");
                    return Reception::Stale;
                };
                self.stats.repairs_skipped = self.sync.skipped();
                self.receive_repair(window_start, window_end, &coefficients, symbols, metrics)
            }
        }
    }

    fn receive_source(&mut self, id: u32, symbols: Vec<u8>, metrics: &mut impl Metrics) -> Reception {
        let next = self.next_expected();
        if id < next {
            self.stats.redundant += 1;
            return Reception::Redundant;
        }
        if self.window.is_none() {
            if id == next {
                self.recovered.push(Bytes::from(symbols));
                self.stats.delivered_in_order += 1;
                metrics.delivered(id);
                return Reception::Delivered(id);
            }
            self.activate(id);
        }

        let (start, width) = self.extend_window(id);
        let mut row = vec![0u8; width];
        row[(id - start) as usize] = 1;
        self.absorb(row, symbols, metrics)
    }

    fn receive_repair(
        &mut self,
        window_start: u32,
        window_end: u32,
        coefficients: &[u8],
        mut symbols: Vec<u8>,
        metrics: &mut impl Metrics,
    ) -> Reception {
        let next = self.next_expected();
        if window_end < next {
            self.stats.redundant += 1;
            return Reception::Redundant;
        }
        if self.window.is_none() {
            self.activate(window_end);
        }

        // Cancel the contribution of ids that are already known.
        for id in window_start..next {
            let c = coefficients[(id - window_start) as usize];
            self.field
                .mul_add_region(&mut symbols, &self.recovered[id as usize], c);
        }

        let (start, width) = self.extend_window(window_end);
        let mut row = vec![0u8; width];
        let first = window_start.max(start);
        for id in first..=window_end {
            row[(id - start) as usize] = coefficients[(id - window_start) as usize];
        }
        self.absorb(row, symbols, metrics)
    }

    /// Whether a packet spanning `first..=last` would need a window wider
    /// than `max_window_width`, counting ids already delivered in a repair's
    /// span and the active window's current end.
    fn beyond_limit(&self, first: u32, last: u32) -> bool {
        let next = self.next_expected();
        if last < next {
            return false;
        }
        let start = first.min(next);
        let end = self.window.map_or(last, |w| w.end.max(last));
        (end - start) as usize + 1 > self.config.max_window_width
    }

    fn reject(&mut self, end: u32) -> Reception {
        self.stats.rejected += 1;
        debug!(
            end,
            limit = self.config.max_window_width,
            "packet beyond the window limit rejected"
        );
        Reception::Rejected
    }

    fn activate(&mut self, end: u32) {
        let start = self.next_expected();
        self.window = Some(Window {
            start,
            end,
            degrees_of_freedom: 0,
            overflow_reported: false,
        });
        self.stats.windows_activated += 1;
        debug!(start, end, "decoding window opened");
    }

    /// Grow the active window to cover `id`; returns its start and width.
    fn extend_window(&mut self, id: u32) -> (u32, usize) {
        let Some(window) = self.window.as_mut() else {
            return (self.next_expected(), 0);
        };
        window.end = window.end.max(id);
        let width = window.width();
        self.arena.ensure_columns(width);
        (window.start, width)
    }

    /// Reduce a row against the pivots held, install it if anything is left,
    /// and solve the window once it is full rank.
    fn absorb(&mut self, row: Vec<u8>, message: Vec<u8>, metrics: &mut impl Metrics) -> Reception {
        if !self.eliminate(row, message) {
            self.stats.redundant += 1;
            return Reception::Redundant;
        }
        let Some(window) = self.window.as_mut() else {
            return Reception::Redundant;
        };
        window.degrees_of_freedom += 1;

        let width = window.width();
        self.stats.max_window_width = self.stats.max_window_width.max(width);
        let capacity = self.config.window_capacity;
        if width > capacity && !window.overflow_reported {
            window.overflow_reported = true;
            self.stats.window_overflows += 1;
            warn!(
                width,
                capacity, "decoding window exceeds the coefficient budget; lost repairs may desynchronise the stream"
            );
            metrics.capacity_exceeded(width, capacity);
        }

        if window.degrees_of_freedom == width {
            self.solve(metrics)
        } else {
            Reception::Pending {
                degrees_of_freedom: window.degrees_of_freedom,
                width,
            }
        }
    }

    /// Forward elimination. Returns `true` if the row was installed as a new
    /// pivot.
    fn eliminate(&mut self, mut row: Vec<u8>, mut message: Vec<u8>) -> bool {
        for col in 0..row.len() {
            let c = row[col];
            if c == 0 {
                continue;
            }
            let pivot = &self.arena.slots[col];
            if pivot.is_pivot() {
                let q = self.field.div(c, pivot.coeffs[0]);
                self.field.mul_add_region(&mut row[col..], &pivot.coeffs, q);
                self.field.mul_add_region(&mut message, &pivot.message, q);
            } else {
                let last = row.iter().rposition(|&x| x != 0).unwrap_or(col);
                self.arena.install(col, &row[col..=last], message);
                return true;
            }
        }
        false
    }

    /// Back-substitution over a full-rank window, then delivery.
    fn solve(&mut self, metrics: &mut impl Metrics) -> Reception {
        let Some(window) = self.window.take() else {
            return Reception::Redundant;
        };
        let width = window.width();

        for i in (0..width).rev() {
            let (lower, upper) = self.arena.slots.split_at_mut(i);
            let pivot = &mut upper[0];
            debug_assert!(pivot.is_pivot());
            let lead = pivot.coeffs[0];
            for (j, row) in lower.iter_mut().enumerate() {
                let offset = i - j;
                let Some(&c) = row.coeffs.get(offset) else {
                    continue;
                };
                if c == 0 {
                    continue;
                }
                let q = self.field.div(c, lead);
                self.field.mul_add_region(&mut row.message, &pivot.message, q);
                row.coeffs[offset] = 0;
            }
            if lead != 1 {
                self.field.scale_region(&mut pivot.message, self.field.inv(lead));
                pivot.coeffs[0] = 1;
            }
        }

        for slot in &mut self.arena.slots[..width] {
            self.recovered
                .push(Bytes::from(std::mem::take(&mut slot.message)));
        }
        self.arena.release(width);

        for id in window.start..=window.end {
            metrics.delivered(id);
        }
        metrics.window_solved(window.start, window.end);
        self.stats.windows_solved += 1;
        self.stats.delivered_by_decoding += width as u64;
        debug!(
            start = window.start,
            end = window.end,
            "decoding window solved"
        );
        Reception::Recovered {
            start: window.start,
            end: window.end,
        }
    }

    fn next_expected(&self) -> u32 {
        self.recovered.len() as u32
    }

    /// Last id delivered in order, if any.
    pub fn in_order(&self) -> Option<u32> {
        self.next_expected().checked_sub(1)
    }

    /// Delivered symbols for `id`.
    pub fn recovered(&self, id: u32) -> Option<&[u8]> {
        self.recovered.get(id as usize).map(|b| b.as_ref())
    }

    /// Delivered symbols for `start..=end`, stopping at the first id not yet
    /// delivered.
    pub fn recovered_range(&self, start: u32, end: u32) -> impl Iterator<Item = (u32, &[u8])> + '_ {
        (start..=end).map_while(move |id| self.recovered(id).map(|s| (id, s)))
    }

    /// All delivered symbols concatenated in id order.
    pub fn recovered_bytes(&self) -> Vec<u8> {
        self.recovered.iter().flat_map(|b| b.iter().copied()).collect()
    }

    pub fn is_active(&self) -> bool {
        self.window.is_some()
    }

    /// Active window bounds.
    pub fn window(&self) -> Option<(u32, u32)> {
        self.window.map(|w| (w.start, w.end))
    }

    /// Pivots held in the active window (0 when inactive).
    pub fn degrees_of_freedom(&self) -> usize {
        self.window.map_or(0, |w| w.degrees_of_freedom)
    }

    /// Id of the last repair packet used.
    pub fn last_repair_id(&self) -> Option<u32> {
        self.sync.last_repair()
    }

    pub fn stats(&self) -> &DecoderStats {
        &self.stats
    }

    pub fn config(&self) -> &CodecConfig {
        &self.config
    }
}
