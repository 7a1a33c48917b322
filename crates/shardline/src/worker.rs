//! The per-shard worker loop.
//!
//! Every worker runs the same loop; the [`IdlePolicy`] chosen at start time
//! decides what happens when its input shard is momentarily empty. A worker
//! takes its [`Lane`] by value and returns it when the loop ends, so joining
//! the thread hands the lane back to the pipeline for the next start.

use crate::{
    Converter, IdlePolicy, OverflowPolicy,
    queue::{Consumer, Producer},
};
use crossbeam_utils::{Backoff, CachePadded};
use portable_atomic::{AtomicBool, AtomicU64, Ordering};
use std::thread;

/// The worker side of one shard: it reads `input` and writes `output`.
pub(crate) struct Lane<I, O> {
    pub(crate) shard: usize,
    pub(crate) input: Consumer<I>,
    pub(crate) output: Producer<O>,
}

/// State shared by the pipeline and all of its workers.
pub(crate) struct Control<C> {
    pub(crate) converter: C,
    pub(crate) overflow: OverflowPolicy,
    /// Advisory shutdown signal. Relaxed loads mean a worker may finish a few
    /// more items before it notices; in-flight data does not depend on it.
    active: CachePadded<AtomicBool>,
    dropped: CachePadded<AtomicU64>,
}

impl<C> Control<C> {
    pub(crate) fn new(converter: C, overflow: OverflowPolicy) -> Self {
        Self {
            converter,
            overflow,
            active: CachePadded::new(AtomicBool::new(false)),
            dropped: CachePadded::new(AtomicU64::new(0)),
        }
    }

    #[inline]
    pub(crate) fn is_active(&self) -> bool {
        self.active.load(Ordering::Relaxed)
    }

    pub(crate) fn set_active(&self, active: bool) {
        self.active.store(active, Ordering::Relaxed);
    }

    pub(crate) fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

/// Drains `lane.input` through the converter into `lane.output` until the
/// idle policy says to stop, then returns the lane.
pub(crate) fn run<I, O, C>(
    mut lane: Lane<I, O>,
    control: &Control<C>,
    idle: IdlePolicy,
) -> Lane<I, O>
where
    C: Converter<I, O>,
{
    #[cfg(feature = "tracing")]
    tracing::trace!("Worker {} started ({idle:?})", lane.shard);

    let backoff = Backoff::new();
    while !idle.observes_stop() || control.is_active() {
        let Some(input) = lane.input.pop() else {
            match idle {
                IdlePolicy::Exit => break,
                IdlePolicy::Spin => backoff.snooze(),
                IdlePolicy::Sleep(interval) => thread::sleep(interval),
            }
            continue;
        };
        backoff.reset();

        let output = control.converter.convert(input);
        deliver(&mut lane, control, output);
    }

    #[cfg(feature = "tracing")]
    tracing::trace!("Worker {} stopped", lane.shard);
    lane
}

fn deliver<I, O, C>(lane: &mut Lane<I, O>, control: &Control<C>, mut output: O) {
    let backoff = Backoff::new();
    loop {
        let rejected = match lane.output.push(output) {
            Ok(()) => return,
            Err(rejected) => rejected,
        };

        if control.overflow == OverflowPolicy::Retry && control.is_active() {
            output = rejected.into_inner();
            backoff.snooze();
            continue;
        }

        #[cfg(feature = "tracing")]
        tracing::warn!(
            "Worker {} failed to push onto its output shard ({rejected}); value dropped",
            lane.shard
        );
        drop(rejected);
        control.dropped.fetch_add(1, Ordering::Relaxed);
        return;
    }
}
