use anyhow::bail;
use clap::{Parser, ValueEnum};
use core::time::Duration;
use shardline::{IdlePolicy, PipelineConfig};

/// How the workers behave when their input shard runs dry.
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Drain the pre-submitted batch, then exit.
    Wait,
    /// Poll until stopped.
    Spin,
    /// Sleep between polls until stopped.
    Sleep,
}

/// What each input is and what it converts into.
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Workload {
    /// Integers rendered as decimal strings.
    Int,
    /// Random sample events rendered as ILF records.
    Ilf,
}

/// Command-line arguments for the `shardline` binary.
///
/// Every flag can also be set through its `SHARDLINE_*` environment variable,
/// including from a `.env` file.
#[derive(Parser, Debug, Clone)]
#[command(
    name = "shardline",
    version,
    about = "Measures order-preserving pipeline throughput"
)]
pub struct CliArgs {
    /// Number of inputs submitted before the workers start.
    ///
    /// Environment variable: `SHARDLINE_INPUTS`
    #[arg(long, env = "SHARDLINE_INPUTS", default_value_t = 1_000_000)]
    pub inputs: usize,

    /// Number of worker threads. Must be a power of two. Defaults to the
    /// detected core count rounded down to a power of two.
    ///
    /// Environment variable: `SHARDLINE_WORKERS`
    #[arg(long, env = "SHARDLINE_WORKERS")]
    pub workers: Option<usize>,

    /// Initial slots per shard queue.
    ///
    /// Environment variable: `SHARDLINE_CAPACITY`
    #[arg(long, env = "SHARDLINE_CAPACITY", default_value_t = shardline::DEFAULT_CAPACITY)]
    pub capacity: usize,

    /// Worker idle behavior.
    ///
    /// Environment variable: `SHARDLINE_MODE`
    #[arg(long, env = "SHARDLINE_MODE", value_enum, default_value_t = Mode::Wait)]
    pub mode: Mode,

    /// Sleep interval in microseconds for `--mode sleep`.
    ///
    /// Environment variable: `SHARDLINE_SLEEP_MICROS`
    #[arg(long, env = "SHARDLINE_SLEEP_MICROS", default_value_t = 100)]
    pub sleep_micros: u64,

    /// Conversion workload.
    ///
    /// Environment variable: `SHARDLINE_WORKLOAD`
    #[arg(long, env = "SHARDLINE_WORKLOAD", value_enum, default_value_t = Workload::Int)]
    pub workload: Workload,
}

/// Validated run settings.
#[derive(Debug, Clone)]
pub struct BenchConfig {
    pub inputs: usize,
    pub pipeline: PipelineConfig,
    pub idle: IdlePolicy,
    pub workload: Workload,
}

impl TryFrom<CliArgs> for BenchConfig {
    type Error = anyhow::Error;

    fn try_from(args: CliArgs) -> Result<Self, Self::Error> {
        let pipeline = PipelineConfig {
            workers: args.workers.unwrap_or_else(shardline::default_workers),
            capacity: args.capacity,
            ..PipelineConfig::default()
        };
        if let Err(e) = pipeline.validate() {
            bail!("SHARDLINE_WORKERS ({}) rejected: {e}", pipeline.workers);
        }

        let idle = match args.mode {
            Mode::Wait => IdlePolicy::Exit,
            Mode::Spin => IdlePolicy::Spin,
            Mode::Sleep if args.sleep_micros == 0 => {
                bail!("SHARDLINE_SLEEP_MICROS must be greater than 0 in sleep mode")
            }
            Mode::Sleep => IdlePolicy::Sleep(Duration::from_micros(args.sleep_micros)),
        };

        Ok(Self {
            inputs: args.inputs,
            pipeline,
            idle,
            workload: args.workload,
        })
    }
}
