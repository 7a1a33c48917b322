//! Construction-time settings for a [`Pipeline`](crate::Pipeline).
//!
//! ## Key Concepts
//! - **Workers**: one thread per shard. Must be a power of two so shard
//!   selection is a bitmask.
//! - **Capacity**: initial slots per shard queue. Queues grow past it on
//!   demand, so it only sets the allocation-free working size.
//! - **Overflow**: what a worker does if an output queue cannot grow.

use crate::{Error, OverflowPolicy, Result};

/// Initial number of slots in each shard queue.
pub const DEFAULT_CAPACITY: usize = 4096;

/// Settings used to build a [`Pipeline`](crate::Pipeline).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PipelineConfig {
    /// Number of shards, and so of worker threads.
    pub workers: usize,
    /// Initial capacity of every input and output shard queue.
    pub capacity: usize,
    /// Output-enqueue failure handling.
    pub overflow: OverflowPolicy,
}

impl Default for PipelineConfig {
    /// Uses [`default_workers`] and [`DEFAULT_CAPACITY`], dropping outputs
    /// that cannot be enqueued.
    fn default() -> Self {
        Self {
            workers: default_workers(),
            capacity: DEFAULT_CAPACITY,
            overflow: OverflowPolicy::Drop,
        }
    }
}

impl PipelineConfig {
    /// A config with `workers` shards and the default capacity and overflow
    /// policy.
    pub fn with_workers(workers: usize) -> Self {
        Self {
            workers,
            ..Self::default()
        }
    }

    /// Checks that the worker count is nonzero and a power of two.
    ///
    /// # Errors
    /// Returns [`Error::InvalidConfiguration`] otherwise.
    pub fn validate(&self) -> Result<()> {
        if self.workers == 0 {
            return Err(Error::InvalidConfiguration {
                reason: "number of workers must be greater than 0".into(),
            });
        }
        if !self.workers.is_power_of_two() {
            return Err(Error::InvalidConfiguration {
                reason: format!(
                    "number of workers must be a power of 2 (got {})",
                    self.workers
                ),
            });
        }
        Ok(())
    }
}

/// The host's available parallelism, rounded down to a power of two.
///
/// A six-core host yields 4 workers; a host whose parallelism cannot be
/// detected yields 1.
pub fn default_workers() -> usize {
    let cpus = num_cpus::get().max(1);
    1 << cpus.ilog2()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_zero_and_non_powers_of_two() {
        for workers in [0, 3, 5, 6, 12, 100] {
            let err = PipelineConfig::with_workers(workers).validate().unwrap_err();
            assert!(
                matches!(err, Error::InvalidConfiguration { .. }),
                "{workers} workers: {err:?}"
            );
        }
    }

    #[test]
    fn accepts_powers_of_two() {
        for workers in [1, 2, 4, 8, 64] {
            PipelineConfig::with_workers(workers).validate().unwrap();
        }
    }

    #[test]
    fn default_is_valid() {
        let config = PipelineConfig::default();
        config.validate().unwrap();
        assert!(config.workers <= num_cpus::get().max(1));
        assert_eq!(config.capacity, DEFAULT_CAPACITY);
        assert_eq!(config.overflow, OverflowPolicy::Drop);
    }
}
