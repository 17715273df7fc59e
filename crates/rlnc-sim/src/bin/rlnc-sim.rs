//! rlnc-sim
//!
//! Runs one encoder → erasure channel → decoder simulation and prints a
//! summary, or the full report as JSON with `--json`.

use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, ValueEnum};
use tracing_subscriber::EnvFilter;

use rlnc_sim::{ChannelModel, ShortRepair, SimConfig, Simulation};
use rlnc_stream::config::{CodecConfigInput, IrregularInput};

#[derive(Debug, Clone, Copy, ValueEnum)]
enum ChannelKind {
    Lossless,
    Bernoulli,
    Burst,
    Gilbert,
}

/// Sliding-window RLNC simulator.
#[derive(Parser, Debug)]
#[command(name = "rlnc-sim", about = "Simulate sliding-window RLNC over an erasure channel")]
struct Cli {
    /// Number of source packets to deliver.
    #[arg(long, default_value_t = 1000)]
    sources: u32,

    /// Per-slot Bernoulli arrival rate in [0, 1); 0 queues everything up front.
    #[arg(long, default_value_t = 0.0)]
    arrival: f64,

    /// Codec TOML file; command-line codec options override its values.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Repair rate: below 1 a probability, otherwise an integer period.
    #[arg(long)]
    repair_rate: Option<f64>,

    #[arg(long)]
    field_width: Option<u8>,

    #[arg(long)]
    packet_size: Option<usize>,

    /// Coefficient draws per repair packet.
    #[arg(long)]
    window_capacity: Option<usize>,

    /// Widest decoding window the decoder accepts.
    #[arg(long)]
    max_window_width: Option<usize>,

    /// Coefficient stream seed.
    #[arg(long)]
    codec_seed: Option<u32>,

    /// Irregular pattern period; requires --source-positions.
    #[arg(long, requires = "source_positions")]
    irregular_range: Option<u32>,

    /// Slots within the irregular period that carry source packets.
    #[arg(long, value_delimiter = ',', requires = "irregular_range")]
    source_positions: Vec<u32>,

    #[arg(long, value_enum, default_value = "bernoulli")]
    channel: ChannelKind,

    /// Erasure probability (bernoulli) or burst start probability (burst).
    #[arg(long, default_value_t = 0.1)]
    loss: f64,

    #[arg(long, default_value_t = 4)]
    burst_len: u32,

    /// Gilbert-Elliott good → bad transition probability.
    #[arg(long, default_value_t = 0.01)]
    p_gb: f64,

    /// Gilbert-Elliott bad → good transition probability.
    #[arg(long, default_value_t = 0.2)]
    p_bg: f64,

    #[arg(long, default_value_t = 0.0)]
    loss_good: f64,

    #[arg(long, default_value_t = 1.0)]
    loss_bad: f64,

    /// Propagation delay in slots.
    #[arg(long, default_value_t = 0)]
    delay: u32,

    /// Acknowledge the in-order id every N slots.
    #[arg(long, default_value_t = 1)]
    ack_period: u32,

    /// Per-slot probability of reordering two in-flight packets.
    #[arg(long, default_value_t = 0.0)]
    reorder: f64,

    /// Probability that a repair covers only the most recent symbols.
    #[arg(long, requires = "short_repair_width")]
    short_repair_prob: Option<f64>,

    #[arg(long)]
    short_repair_width: Option<u32>,

    /// Seed for source data, arrivals and reordering.
    #[arg(long, default_value_t = 1)]
    seed: u64,

    #[arg(long, default_value_t = 2)]
    channel_seed: u64,

    #[arg(long, default_value_t = 1_000_000)]
    max_slots: u64,

    /// Print the full report as JSON.
    #[arg(long, default_value_t = false)]
    json: bool,
}

impl Cli {
    fn codec_input(&self) -> anyhow::Result<CodecConfigInput> {
        let mut input = match &self.config {
            Some(path) => {
                let text = std::fs::read_to_string(path)
                    .with_context(|| format!("reading {}", path.display()))?;
                toml::from_str::<CodecConfigInput>(&text)
                    .with_context(|| format!("parsing {}", path.display()))?
            }
            None => CodecConfigInput::default(),
        };
        input.repair_rate = self.repair_rate.or(input.repair_rate);
        input.field_width = self.field_width.or(input.field_width);
        input.packet_size = self.packet_size.or(input.packet_size);
        input.window_capacity = self.window_capacity.or(input.window_capacity);
        input.max_window_width = self.max_window_width.or(input.max_window_width);
        input.seed = self.codec_seed.or(input.seed);
        input.policy_seed = input.policy_seed.or(Some(self.seed));
        if let Some(range) = self.irregular_range {
            input.irregular = Some(IrregularInput {
                range,
                source_positions: self.source_positions.clone(),
            });
        }
        Ok(input)
    }

    fn channel_model(&self) -> ChannelModel {
        match self.channel {
            ChannelKind::Lossless => ChannelModel::Lossless,
            ChannelKind::Bernoulli => ChannelModel::Bernoulli { p: self.loss },
            ChannelKind::Burst => ChannelModel::Burst {
                p: self.loss,
                burst_len: self.burst_len,
            },
            ChannelKind::Gilbert => ChannelModel::GilbertElliott {
                p_gb: self.p_gb,
                p_bg: self.p_bg,
                loss_good: self.loss_good,
                loss_bad: self.loss_bad,
            },
        }
    }

    fn sim_config(&self) -> anyhow::Result<SimConfig> {
        let codec = self.codec_input()?.resolve().context("codec configuration")?;
        let short_repair = match (self.short_repair_prob, self.short_repair_width) {
            (Some(probability), Some(width)) => Some(ShortRepair { probability, width }),
            _ => None,
        };
        Ok(SimConfig {
            codec,
            sources: self.sources,
            arrival_rate: self.arrival,
            channel: self.channel_model(),
            propagation_delay: self.delay,
            ack_period: self.ack_period,
            reorder_probability: self.reorder,
            short_repair,
            seed: self.seed,
            channel_seed: self.channel_seed,
            max_slots: self.max_slots,
        })
    }
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(true)
        .compact()
        .init();

    let cli = Cli::parse();
    let config = cli.sim_config()?;
    let report = Simulation::new(config)?.run()?;

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("{report}");
    }
    if !report.all_correct {
        tracing::warn!(
            delivered = report.delivered,
            sources = report.sources,
            "not every source packet was recovered correctly"
        );
    }
    Ok(())
}
