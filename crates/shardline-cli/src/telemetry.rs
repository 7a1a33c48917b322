//! Console logging for the `shardline` binary.
//!
//! Verbosity follows `RUST_LOG` and defaults to `info`. Logs go to stderr so
//! the throughput report on stdout stays machine-readable. Worker lifecycle
//! events from the `shardline` crate show up at `debug` and `trace`.

use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

pub fn init_tracing() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_thread_names(true)
                .with_line_number(true)
                .with_target(false)
                .with_timer(tracing_subscriber::fmt::time::ChronoLocal::rfc_3339())
                .with_file(true),
        )
        .try_init()?;
    Ok(())
}
