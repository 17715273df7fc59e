//! # Codec Statistics
//!
//! Encoder- and decoder-side counters. Serializable for JSON reports.

use serde::Serialize;

// ─── Encoder Stats ──────────────────────────────────────────────────────────

/// Aggregate encoder-side statistics.
#[derive(Debug, Clone, Default, Serialize)]
pub struct EncoderStats {
    /// Source symbols enqueued.
    pub enqueued: u64,
    /// Source packets sent.
    pub source_sent: u64,
    /// Repair packets sent.
    pub repairs_sent: u64,
    /// Buffer slots released by acknowledgments.
    pub flushed: u64,
    /// Acknowledgments processed (including no-ops).
    pub acks: u64,
    /// Times the symbol buffer doubled.
    pub buffer_grows: u64,
    /// Repair packets whose window exceeded the draw budget.
    pub window_overflows: u64,
    /// Widest repair window used.
    pub max_window_width: usize,
}

impl EncoderStats {
    pub fn packets_sent(&self) -> u64 {
        self.source_sent + self.repairs_sent
    }

    /// Repair packets as a fraction of all packets sent.
    pub fn repair_ratio(&self) -> f64 {
        let total = self.packets_sent();
        if total == 0 {
            0.0
        } else {
            self.repairs_sent as f64 / total as f64
        }
    }
}

// ─── Decoder Stats ──────────────────────────────────────────────────────────

/// Aggregate decoder-side statistics.
#[derive(Debug, Clone, Default, Serialize)]
pub struct DecoderStats {
    pub source_received: u64,
    pub repairs_received: u64,
    /// Source packets delivered directly while inactive.
    pub delivered_in_order: u64,
    /// Source ids delivered by solving a window.
    pub delivered_by_decoding: u64,
    /// Packets that carried nothing new (duplicates, covered repairs,
    /// non-innovative combinations).
    pub redundant: u64,
    /// Repair packets whose coefficients could not be regenerated.
    pub stale_repairs: u64,
    /// Repair ids never seen (coefficients skipped).
    pub repairs_skipped: u64,
    /// Packets dropped for a wrong payload size or for exceeding the window
    /// limit.
    pub rejected: u64,
    pub windows_activated: u64,
    pub windows_solved: u64,
    /// Windows that grew beyond the draw budget.
    pub window_overflows: u64,
    /// Widest decoding window seen.
    pub max_window_width: usize,
}

impl DecoderStats {
    pub fn packets_received(&self) -> u64 {
        self.source_received + self.repairs_received
    }

    pub fn delivered(&self) -> u64 {
        self.delivered_in_order + self.delivered_by_decoding
    }

    /// Fraction of received packets that moved decoding forward.
    pub fn useful_ratio(&self) -> f64 {
        let received = self.packets_received();
        if received == 0 {
            0.0
        } else {
            received.saturating_sub(self.redundant + self.stale_repairs + self.rejected) as f64 / received as f64
        }
    }
}
