#![doc = include_str!("../README.md")]

mod config;
mod telemetry;
mod workload;

use clap::Parser;
use config::{BenchConfig, CliArgs, Workload};
use telemetry::init_tracing;

// Workers allocate every output and grow queues under load; mimalloc keeps
// that off the system allocator's locks.
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

fn main() -> anyhow::Result<()> {
    // Load from .env
    let _ = dotenvy::dotenv();
    let args = CliArgs::parse();
    let config = BenchConfig::try_from(args)?;

    init_tracing()?;

    if cfg!(debug_assertions) {
        tracing::info!("Starting run with full config: {:#?}", config);
    } else {
        tracing::info!(
            "Starting run: {} inputs, {} workers ({:?})",
            config.inputs,
            config.pipeline.workers,
            config.idle
        );
    }

    let report = workload::run(&config).inspect_err(|e| tracing::error!("Run failed: {e:#}"))?;

    let unit = match config.workload {
        Workload::Int => "integers",
        Workload::Ilf => "ILF records",
    };
    println!(
        "Processed {} {unit} in {:.6} seconds using {} threads",
        report.inputs,
        report.elapsed.as_secs_f64(),
        report.workers
    );
    println!("Throughput: {:.0} {unit} per second", report.throughput());
    Ok(())
}
