//! Erasure channel models.
//!
//! Each model decides, once per transmitted packet, whether the packet is
//! erased. All randomness comes from a seeded `StdRng`, so a run is fully
//! reproducible from its seed.

use rand::rngs::StdRng;
use rand::RngExt as _;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};

pub trait Channel: std::fmt::Debug + Send {
    /// Whether the packet sent in this slot is lost.
    fn erased(&mut self) -> bool;
}

/// Never loses anything.
#[derive(Debug, Clone, Copy, Default)]
pub struct Lossless;

impl Channel for Lossless {
    fn erased(&mut self) -> bool {
        false
    }
}

/// Independent losses with probability `p`.
#[derive(Debug)]
pub struct Bernoulli {
    p: f64,
    rng: StdRng,
}

impl Bernoulli {
    pub fn new(p: f64, seed: u64) -> Self {
        Bernoulli {
            p,
            rng: StdRng::seed_from_u64(seed),
        }
    }
}

impl Channel for Bernoulli {
    fn erased(&mut self) -> bool {
        self.rng.random::<f64>() < self.p
    }
}

/// Batched bursts: in every loss-free slot a burst of `burst_len`
/// consecutive erasures starts with probability `p`.
#[derive(Debug)]
pub struct BurstChannel {
    p: f64,
    burst_len: u32,
    remaining: u32,
    rng: StdRng,
}

impl BurstChannel {
    pub fn new(p: f64, burst_len: u32, seed: u64) -> Self {
        BurstChannel {
            p,
            burst_len: burst_len.max(1),
            remaining: 0,
            rng: StdRng::seed_from_u64(seed),
        }
    }
}

impl Channel for BurstChannel {
    fn erased(&mut self) -> bool {
        if self.remaining > 0 {
            self.remaining -= 1;
            return true;
        }
        if self.rng.random::<f64>() < self.p {
            self.remaining = self.burst_len - 1;
            return true;
        }
        false
    }
}

/// Two-state Markov channel. The state transitions first, then the packet
/// is lost with the loss probability of the new state.
#[derive(Debug)]
pub struct GilbertElliott {
    p_gb: f64,
    p_bg: f64,
    loss_good: f64,
    loss_bad: f64,
    bad: bool,
    rng: StdRng,
}

impl GilbertElliott {
    pub fn new(p_gb: f64, p_bg: f64, loss_good: f64, loss_bad: f64, seed: u64) -> Self {
        GilbertElliott {
            p_gb,
            p_bg,
            loss_good,
            loss_bad,
            bad: false,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Long-run fraction of erased packets.
    pub fn stationary_loss(&self) -> f64 {
        let total = self.p_gb + self.p_bg;
        if total == 0.0 {
            return self.loss_good;
        }
        let pi_bad = self.p_gb / total;
        pi_bad * self.loss_bad + (1.0 - pi_bad) * self.loss_good
    }
}

impl Channel for GilbertElliott {
    fn erased(&mut self) -> bool {
        let flip = if self.bad { self.p_bg } else { self.p_gb };
        if self.rng.random::<f64>() < flip {
            self.bad = !self.bad;
        }
        let loss = if self.bad {
            self.loss_bad
        } else {
            self.loss_good
        };
        self.rng.random::<f64>() < loss
    }
}

/// Serializable channel description.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "model", rename_all = "snake_case")]
pub enum ChannelModel {
    #[default]
    Lossless,
    Bernoulli {
        p: f64,
    },
    Burst {
        p: f64,
        burst_len: u32,
    },
    GilbertElliott {
        p_gb: f64,
        p_bg: f64,
        loss_good: f64,
        loss_bad: f64,
    },
}

impl ChannelModel {
    pub fn validate(&self) -> anyhow::Result<()> {
        let probabilities = match *self {
            ChannelModel::Lossless => vec![],
            ChannelModel::Bernoulli { p } => vec![("p", p)],
            ChannelModel::Burst { p, burst_len } => {
                anyhow::ensure!(burst_len > 0, "burst length must be positive");
                vec![("p", p)]
            }
            ChannelModel::GilbertElliott {
                p_gb,
                p_bg,
                loss_good,
                loss_bad,
            } => vec![
                ("p_gb", p_gb),
                ("p_bg", p_bg),
                ("loss_good", loss_good),
                ("loss_bad", loss_bad),
            ],
        };
        for (name, p) in probabilities {
            anyhow::ensure!(
                (0.0..=1.0).contains(&p),
                "channel parameter {name} = {p} is not a probability"
            );
        }
        Ok(())
    }

    pub fn build(&self, seed: u64) -> Box<dyn Channel> {
        match *self {
            ChannelModel::Lossless => Box::new(Lossless),
            ChannelModel::Bernoulli { p } => Box::new(Bernoulli::new(p, seed)),
            ChannelModel::Burst { p, burst_len } => Box::new(BurstChannel::new(p, burst_len, seed)),
            ChannelModel::GilbertElliott {
                p_gb,
                p_bg,
                loss_good,
                loss_bad,
            } => Box::new(GilbertElliott::new(p_gb, p_bg, loss_good, loss_bad, seed)),
        }
    }
}
