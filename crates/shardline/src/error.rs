//! Error types for the pipeline.
//!
//! Configuration and allocation errors are returned synchronously to the
//! caller of the operation that triggered them. A worker that cannot enqueue a
//! converted value never surfaces an error here; it is reported through
//! `tracing` and [`Pipeline::dropped_outputs`] instead.
//!
//! [`Pipeline::dropped_outputs`]: crate::Pipeline::dropped_outputs

use core::fmt;

pub type Result<T, E = Error> = core::result::Result<T, E>;

/// All errors that `shardline` can produce.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// The worker count was zero or not a power of two.
    #[error("Invalid configuration: {reason}")]
    InvalidConfiguration { reason: String },

    /// Shard storage could not be reserved for the requested number of slots.
    #[error("Failed to allocate shard storage for {capacity} slots")]
    AllocationFailure { capacity: usize },

    /// `start` was called while workers from a previous `start` are live.
    #[error("Pipeline workers are already running")]
    AlreadyRunning,

    /// A worker thread panicked. Its shard's queues went down with it.
    #[error("Worker for shard {shard} panicked")]
    WorkerPanicked { shard: usize },

    /// The OS refused to spawn a worker thread.
    #[error("Failed to spawn worker for shard {shard}: {reason}")]
    WorkerSpawn { shard: usize, reason: String },

    /// A shard was lost to an earlier worker failure, so the pipeline can no
    /// longer be started.
    #[error("Shard {shard} was lost to an earlier worker failure")]
    ShardLost { shard: usize },
}

/// A value that a shard queue could not accept.
///
/// Returned when growing the queue's storage fails. The value is handed back
/// untouched and the dispatch cursor has not moved, so the caller may retry.
#[derive(Clone, PartialEq, Eq, thiserror::Error)]
#[error("Allocation failure: could not grow shard to {capacity} slots")]
pub struct SubmitError<T> {
    value: T,
    capacity: usize,
}

impl<T> SubmitError<T> {
    pub(crate) const fn new(value: T, capacity: usize) -> Self {
        Self { value, capacity }
    }

    /// The number of slots the queue tried to grow to.
    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    /// Returns the rejected value.
    pub fn into_inner(self) -> T {
        self.value
    }
}

impl<T> fmt::Debug for SubmitError<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SubmitError")
            .field("capacity", &self.capacity)
            .finish_non_exhaustive()
    }
}

impl<T> From<SubmitError<T>> for Error {
    fn from(err: SubmitError<T>) -> Self {
        Self::AllocationFailure {
            capacity: err.capacity,
        }
    }
}
