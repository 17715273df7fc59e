//! Error types for the codec, its wire format, and its configuration.

use thiserror::Error;

// ── Codec ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum CodecError {
    #[error("unsupported field width {0} (supported: 1, 2, 4, 8)")]
    FieldWidth(u8),
    #[error("packet size must be non-zero")]
    PacketSize,
    #[error("symbol of {actual} bytes exceeds packet size {max}")]
    SymbolTooLong { actual: usize, max: usize },
    #[error("source id {got} out of sequence, expected {expected}")]
    OutOfSequence { expected: u32, got: u32 },
    #[error("source id {0} exceeds the wire id space")]
    IdSpaceExhausted(u32),
    #[error(transparent)]
    Wire(#[from] WireError),
    #[error(transparent)]
    Config(#[from] ConfigError),
}

// ── Wire ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WireError {
    #[error("packet truncated: need {needed} header bytes, have {available}")]
    Truncated { needed: usize, available: usize },
    #[error("payload is {actual} bytes, expected {expected}")]
    PayloadLength { expected: usize, actual: usize },
    #[error("header must carry exactly one of source id ({source_id}) and repair id ({repair_id})")]
    Header { source_id: i32, repair_id: i32 },
    #[error("invalid repair window [{start}, {end}]")]
    Window { start: i32, end: i32 },
}

// ── Configuration ───────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("invalid config TOML: {0}")]
    Toml(String),
    #[error("repair rate {0} must be a probability below 1 or an integer period")]
    RepairRate(f64),
    #[error("unsupported field width {0} (supported: 1, 2, 4, 8)")]
    FieldWidth(u8),
    #[error("packet size must be non-zero")]
    PacketSize,
    #[error("window capacity must be non-zero")]
    WindowCapacity,
    #[error("maximum window width must be non-zero")]
    MaxWindowWidth,
    #[error("irregular pattern: {0}")]
    Irregular(String),
}

impl From<toml::de::Error> for ConfigError {
    fn from(e: toml::de::Error) -> Self {
        ConfigError::Toml(e.to_string())
    }
}
