//! # rlnc-stream
//!
//! Sliding-window random linear network coding for in-order delivery over
//! lossy datagram links.
//!
//! The encoder interleaves uncoded source packets with repair packets that
//! combine every sent, unacknowledged symbol; the decoder delivers in-order
//! packets directly and solves the gap left by losses with on-the-fly
//! Gaussian elimination. Coefficients are never transmitted: both sides
//! replay the same seeded MT19937 stream.
//!
//! ## Crate structure
//!
//! - [`gf`]: GF(2^w) scalar and region arithmetic
//! - [`prng`]: MT19937 generator
//! - [`coeff`]: Shared coefficient stream and lost-repair skipping
//! - [`wire`]: Fixed 16-byte header packet format
//! - [`buffer`]: Growable circular buffer of unacknowledged symbols
//! - [`policy`]: When to send a repair packet
//! - [`encoder`]: Encoder state machine
//! - [`decoder`]: Decoder state machine
//! - [`config`]: TOML-backed codec configuration
//! - [`metrics`]: Caller-supplied instrumentation hooks
//! - [`stats`]: Encoder and decoder counters

pub mod buffer;
pub mod coeff;
pub mod config;
pub mod decoder;
pub mod encoder;
pub mod error;
pub mod gf;
pub mod metrics;
pub mod policy;
pub mod prng;
pub mod stats;
pub mod wire;

pub use config::{CodecConfig, RepairSchedule};
pub use decoder::{Decoder, Reception};
pub use encoder::Encoder;
pub use error::{CodecError, ConfigError, WireError};
pub use metrics::{Metrics, NoMetrics};
pub use wire::{Packet, PacketKind};
