//! Transmission policies: when the encoder spends a slot on a repair packet.
//!
//! The encoder only consults the policy when a repair would be useful (some
//! sent source id is still unacknowledged) and a source packet is available;
//! once every buffered id has been sent it always emits repairs.

use std::fmt;

use rand::rngs::StdRng;
use rand::RngExt as _;
use rand::SeedableRng;

use crate::config::RepairSchedule;

/// Encoder counters visible to a policy.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SlotState {
    /// Source and repair packets sent so far.
    pub packets_sent: u64,
    pub repairs_sent: u64,
    /// Id of the next source packet to send.
    pub next_source_id: u32,
}

pub trait TransmissionPolicy: fmt::Debug + Send {
    /// Whether this slot should carry a repair packet.
    fn repair_due(&mut self, slot: &SlotState) -> bool;
}

/// One repair after every `period` packets.
#[derive(Debug, Clone)]
pub struct Periodic {
    period: u32,
}

impl Periodic {
    pub fn new(period: u32) -> Self {
        Periodic { period }
    }
}

impl TransmissionPolicy for Periodic {
    fn repair_due(&mut self, slot: &SlotState) -> bool {
        (slot.packets_sent + 1) % (self.period as u64 + 1) == 0
    }
}

/// Coin toss per eligible slot.
#[derive(Debug)]
pub struct RandomRate {
    probability: f64,
    rng: StdRng,
}

impl RandomRate {
    pub fn new(probability: f64, seed: u64) -> Self {
        RandomRate {
            probability,
            rng: StdRng::seed_from_u64(seed),
        }
    }
}

impl TransmissionPolicy for RandomRate {
    fn repair_due(&mut self, _slot: &SlotState) -> bool {
        self.rng.random::<f64>() < self.probability
    }
}

/// Fixed pattern over a period of `range` packets: source packets at the
/// listed positions, repairs everywhere else.
#[derive(Debug, Clone)]
pub struct Irregular {
    range: u32,
    source_positions: Vec<u32>,
}

impl Irregular {
    pub fn new(range: u32, source_positions: Vec<u32>) -> Self {
        assert!(range > 0);
        Irregular {
            range,
            source_positions,
        }
    }
}

impl TransmissionPolicy for Irregular {
    fn repair_due(&mut self, slot: &SlotState) -> bool {
        let sent = slot.next_source_id as u64 + slot.repairs_sent;
        let position = (sent % self.range as u64) as u32;
        !self.source_positions.contains(&position)
    }
}

/// Build the policy for a schedule.
pub fn from_schedule(schedule: &RepairSchedule) -> Box<dyn TransmissionPolicy> {
    match schedule {
        RepairSchedule::Periodic { period } => Box::new(Periodic::new(*period)),
        RepairSchedule::Random { probability, seed } => {
            Box::new(RandomRate::new(*probability, *seed))
        }
        RepairSchedule::Irregular {
            range,
            source_positions,
        } => Box::new(Irregular::new(*range, source_positions.clone())),
    }
}
