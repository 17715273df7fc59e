//! Metrics context.
//!
//! Timing and delivery instrumentation is not kept inside the codec. Callers
//! pass a `Metrics` implementation into each encoder/decoder operation and
//! attach whatever clock they own (simulation slot, wall time, ...).

/// Hooks invoked by the encoder and decoder. All default to no-ops.
pub trait Metrics {
    /// A source packet left the encoder.
    fn source_sent(&mut self, _id: u32) {}

    /// A repair packet covering `window_start..=window_end` left the encoder.
    fn repair_sent(&mut self, _repair_id: u32, _window_start: u32, _window_end: u32) {}

    /// Source id `id` became available in order at the decoder.
    fn delivered(&mut self, _id: u32) {}

    /// A decoding window was solved.
    fn window_solved(&mut self, _window_start: u32, _window_end: u32) {}

    /// A coding or decoding window grew beyond the per-repair draw budget.
    fn capacity_exceeded(&mut self, _width: usize, _capacity: usize) {}
}

/// Discards every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoMetrics;

impl Metrics for NoMetrics {}
