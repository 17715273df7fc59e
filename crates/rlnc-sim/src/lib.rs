//! Erasure-channel simulation for the sliding-window codec.
//!
//! Drives an [`rlnc_stream::Encoder`] and [`rlnc_stream::Decoder`] through a
//! slotted channel with configurable loss models, propagation delay and
//! delayed acknowledgments, and reports delivery delay and correctness.

pub mod channel;
pub mod simulation;
pub mod timeline;

pub use channel::{Channel, ChannelModel};
pub use simulation::{ShortRepair, SimConfig, SimReport, Simulation};
pub use timeline::Timeline;
