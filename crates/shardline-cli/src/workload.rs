use crate::config::{BenchConfig, Workload};
use anyhow::{anyhow, bail};
use core::fmt::Debug;
use core::time::Duration;
use shardline::Pipeline;
use shardline_ilf::{Event, Ilf};
use std::thread;
use std::time::{Instant, SystemTime, UNIX_EPOCH};

/// Outcome of one verified run.
#[derive(Debug, Clone, Copy)]
pub struct Report {
    pub inputs: usize,
    pub workers: usize,
    /// From the first worker start until every output was produced.
    pub elapsed: Duration,
}

impl Report {
    /// Converted items per second.
    pub fn throughput(&self) -> f64 {
        self.inputs as f64 / self.elapsed.as_secs_f64().max(f64::EPSILON)
    }
}

fn int_to_string(n: u64) -> String {
    n.to_string()
}

fn event_to_ilf(event: Event) -> Ilf {
    event.to_ilf()
}

/// Builds the inputs for `config.workload` and runs them through a pipeline.
pub fn run(config: &BenchConfig) -> anyhow::Result<Report> {
    match config.workload {
        Workload::Int => {
            let inputs = (0..config.inputs as u64).collect();
            measure(config, inputs, int_to_string)
        }
        Workload::Ilf => {
            let time = SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .map(|d| d.as_secs() as i64)
                .unwrap_or_default();
            let mut rng = rand::rng();
            let inputs = (0..config.inputs)
                .map(|_| Event::random(&mut rng, time))
                .collect();
            measure(config, inputs, event_to_ilf)
        }
    }
}

/// Pre-submits `inputs`, times the workers until all outputs exist, then
/// checks every output against `convert` applied sequentially.
///
/// # Errors
/// Fails if the pipeline cannot be built or started, if a worker dies or
/// drops an output, and on the first output that is missing or differs from
/// its sequential counterpart.
pub fn measure<I, O, F>(config: &BenchConfig, inputs: Vec<I>, convert: F) -> anyhow::Result<Report>
where
    I: Clone + Send + 'static,
    O: Debug + PartialEq + Send + 'static,
    F: Fn(I) -> O + Clone + Send + Sync + 'static,
{
    let total = inputs.len();
    let mut pipeline: Pipeline<I, O, F> = Pipeline::with_config(convert.clone(), config.pipeline)?;

    for input in &inputs {
        pipeline
            .submit(input.clone())
            .map_err(shardline::Error::from)?;
    }
    tracing::debug!("Submitted {total} inputs");

    let start = Instant::now();
    pipeline.start_with(config.idle)?;
    while pipeline.pending_output_count() < total && pipeline.is_running() {
        thread::yield_now();
    }
    let elapsed = start.elapsed();
    pipeline.stop()?;

    if pipeline.dropped_outputs() > 0 {
        bail!("{} outputs were dropped", pipeline.dropped_outputs());
    }

    for (i, input) in inputs.into_iter().enumerate() {
        let output = pipeline
            .retrieve()
            .ok_or_else(|| anyhow!("output {i} of {total} is missing"))?;
        let expected = convert(input);
        if output != expected {
            bail!("output {i} is out of order: expected {expected:?}, got {output:?}");
        }
    }

    let (pending_inputs, pending_outputs) =
        (pipeline.pending_input_count(), pipeline.pending_output_count());
    if pending_inputs != 0 || pending_outputs != 0 {
        bail!("pipeline not empty after run: {pending_inputs} inputs, {pending_outputs} outputs");
    }

    Ok(Report {
        inputs: total,
        workers: pipeline.workers(),
        elapsed,
    })
}
