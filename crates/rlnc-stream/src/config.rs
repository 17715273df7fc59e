//! Codec configuration.
//!
//! `CodecConfigInput` mirrors the TOML file (every key optional);
//! `resolve()` applies defaults and validates into a `CodecConfig`.
//!
//! ```toml
//! field_width = 8
//! packet_size = 200
//! repair_rate = 5        # < 1: probability, >= 1: period
//! seed = 5489
//! window_capacity = 100
//! max_window_width = 100000
//!
//! [irregular]
//! range = 10
//! source_positions = [0, 1, 2, 4, 5, 7]
//! ```

use serde::Deserialize;

use crate::error::ConfigError;

pub const DEFAULT_FIELD_WIDTH: u8 = 8;
pub const DEFAULT_PACKET_SIZE: usize = 200;
pub const DEFAULT_REPAIR_RATE: f64 = 5.0;
/// Reference seed of MT19937.
pub const DEFAULT_SEED: u32 = 5489;
pub const DEFAULT_WINDOW_CAPACITY: usize = 100;
pub const DEFAULT_MAX_WINDOW_WIDTH: usize = 100_000;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct CodecConfigInput {
    pub field_width: Option<u8>,
    pub packet_size: Option<usize>,
    pub repair_rate: Option<f64>,
    pub seed: Option<u32>,
    pub window_capacity: Option<usize>,
    pub max_window_width: Option<usize>,
    pub policy_seed: Option<u64>,
    pub irregular: Option<IrregularInput>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct IrregularInput {
    pub range: u32,
    pub source_positions: Vec<u32>,
}

/// When the encoder inserts repair packets between source packets.
#[derive(Debug, Clone, PartialEq)]
pub enum RepairSchedule {
    /// One repair after every `period` packets.
    Periodic { period: u32 },
    /// A repair in each eligible slot with the given probability.
    Random { probability: f64, seed: u64 },
    /// Source packets at `source_positions` within every `range` slots,
    /// repairs elsewhere.
    Irregular { range: u32, source_positions: Vec<u32> },
}

impl RepairSchedule {
    /// Interpret a repair rate: below 1 it is a probability, otherwise an
    /// integer period.
    pub fn from_rate(rate: f64, seed: u64) -> Result<Self, ConfigError> {
        if !rate.is_finite() || rate < 0.0 {
            return Err(ConfigError::RepairRate(rate));
        }
        if rate < 1.0 {
            return Ok(RepairSchedule::Random {
                probability: rate,
                seed,
            });
        }
        if rate.fract() != 0.0 || rate > u32::MAX as f64 {
            return Err(ConfigError::RepairRate(rate));
        }
        Ok(RepairSchedule::Periodic {
            period: rate as u32,
        })
    }

    pub fn irregular(range: u32, mut source_positions: Vec<u32>) -> Result<Self, ConfigError> {
        check_irregular(range, &source_positions)?;
        source_positions.sort_unstable();
        source_positions.dedup();
        Ok(RepairSchedule::Irregular {
            range,
            source_positions,
        })
    }

    /// Check a schedule built directly from its variants.
    pub fn validate(&self) -> Result<(), ConfigError> {
        match self {
            RepairSchedule::Periodic { .. } => Ok(()),
            RepairSchedule::Random { probability, .. } => {
                if (0.0..=1.0).contains(probability) {
                    Ok(())
                } else {
                    Err(ConfigError::RepairRate(*probability))
                }
            }
            RepairSchedule::Irregular {
                range,
                source_positions,
            } => check_irregular(*range, source_positions),
        }
    }
}

fn check_irregular(range: u32, source_positions: &[u32]) -> Result<(), ConfigError> {
    if range == 0 {
        return Err(ConfigError::Irregular("range must be non-zero".into()));
    }
    if let Some(p) = source_positions.iter().find(|&&p| p >= range) {
        return Err(ConfigError::Irregular(format!(
            "position {p} outside range {range}"
        )));
    }
    Ok(())
}

#[derive(Debug, Clone, PartialEq)]
pub struct CodecConfig {
    /// Bits per field element.
    pub field_width: u8,
    /// Bytes per symbol vector.
    pub packet_size: usize,
    pub repair: RepairSchedule,
    /// Coefficient stream seed; must match between encoder and decoder.
    pub seed: u32,
    /// Coefficient draws per repair packet (`W`).
    pub window_capacity: usize,
    /// Widest decoding window the decoder will open. Packets that would
    /// exceed it are dropped before any coefficients are drawn.
    pub max_window_width: usize,
}

impl Default for CodecConfig {
    fn default() -> Self {
        CodecConfig {
            field_width: DEFAULT_FIELD_WIDTH,
            packet_size: DEFAULT_PACKET_SIZE,
            repair: RepairSchedule::Periodic {
                period: DEFAULT_REPAIR_RATE as u32,
            },
            seed: DEFAULT_SEED,
            window_capacity: DEFAULT_WINDOW_CAPACITY,
            max_window_width: DEFAULT_MAX_WINDOW_WIDTH,
        }
    }
}

impl CodecConfigInput {
    pub fn resolve(self) -> Result<CodecConfig, ConfigError> {
        let repair = match self.irregular {
            Some(irr) => RepairSchedule::irregular(irr.range, irr.source_positions)?,
            None => RepairSchedule::from_rate(
                self.repair_rate.unwrap_or(DEFAULT_REPAIR_RATE),
                self.policy_seed.unwrap_or_default(),
            )?,
        };
        let config = CodecConfig {
            field_width: self.field_width.unwrap_or(DEFAULT_FIELD_WIDTH),
            packet_size: self.packet_size.unwrap_or(DEFAULT_PACKET_SIZE),
            repair,
            seed: self.seed.unwrap_or(DEFAULT_SEED),
            window_capacity: self.window_capacity.unwrap_or(DEFAULT_WINDOW_CAPACITY),
            max_window_width: self.max_window_width.unwrap_or(DEFAULT_MAX_WINDOW_WIDTH),
        };
        config.validate()?;
        Ok(config)
    }
}

impl CodecConfig {
    pub fn from_toml_str(input: &str) -> Result<Self, ConfigError> {
        if input.trim().is_empty() {
            return Ok(CodecConfig::default());
        }
        let parsed: CodecConfigInput = toml::from_str(input)?;
        parsed.resolve()
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !matches!(self.field_width, 1 | 2 | 4 | 8) {
            return Err(ConfigError::FieldWidth(self.field_width));
        }
        if self.packet_size == 0 {
            return Err(ConfigError::PacketSize);
        }
        if self.window_capacity == 0 {
            return Err(ConfigError::WindowCapacity);
        }
        if self.max_window_width == 0 {
            return Err(ConfigError::MaxWindowWidth);
        }
        self.repair.validate()
    }

    pub fn with_packet_size(mut self, packet_size: usize) -> Self {
        self.packet_size = packet_size;
        self
    }

    pub fn with_field_width(mut self, field_width: u8) -> Self {
        self.field_width = field_width;
        self
    }

    pub fn with_seed(mut self, seed: u32) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_window_capacity(mut self, window_capacity: usize) -> Self {
        self.window_capacity = window_capacity;
        self
    }

    pub fn with_max_window_width(mut self, max_window_width: usize) -> Self {
        self.max_window_width = max_window_width;
        self
    }

    pub fn with_repair(mut self, repair: RepairSchedule) -> Self {
        self.repair = repair;
        self
    }
}
