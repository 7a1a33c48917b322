use crate::{
    Converter, Error, IdlePolicy, OverflowPolicy, PipelineConfig, Result, SubmitError,
    cursor::Cursor,
    queue::{self, Consumer, Producer},
    worker::{self, Control, Lane},
};
use core::time::Duration;
use crossbeam_utils::Backoff;
use std::{
    sync::Arc,
    thread::{self, JoinHandle},
};

/// An order-preserving parallel pipeline.
///
/// Inputs are dealt round robin onto `workers` input shards. Worker `i`
/// converts everything on input shard `i` and writes the results, in order,
/// to output shard `i`. Retrieval walks the output shards in the same
/// round-robin order, so outputs come back in submission order with no
/// sequence numbers and no locks.
///
/// That guarantee holds only if a miss on the current output shard is retried
/// against the same shard. [`Pipeline::retrieve`] never skips ahead: it
/// returns `None` and leaves the cursor where it is.
///
/// ## Features
/// - ✅ Strict submission-order output
/// - ✅ Lock-free: each shard queue has exactly one writer and one reader
/// - ❌ Not for concurrent producers or concurrent consumers (use
///   [`Pipeline::split`] for one producer thread plus one consumer thread)
///
/// # Example
/// ```
/// use shardline::{Pipeline, PipelineConfig};
///
/// let config = PipelineConfig::with_workers(2);
/// let mut pipeline: Pipeline<u32, String, _> =
///     Pipeline::with_config(|n: u32| n.to_string(), config).unwrap();
///
/// for n in 0..4 {
///     pipeline.submit(n).unwrap();
/// }
/// pipeline.start_wait().unwrap();
/// pipeline.stop_wait().unwrap();
///
/// let outputs: Vec<_> = std::iter::from_fn(|| pipeline.retrieve()).collect();
/// assert_eq!(outputs, ["0", "1", "2", "3"]);
/// ```
pub struct Pipeline<I, O, C> {
    control: Arc<Control<C>>,
    inputs: Vec<Producer<I>>,
    outputs: Vec<Consumer<O>>,
    submit_cursor: Cursor,
    retrieve_cursor: Cursor,
    /// Worker-side halves, present while no worker is running.
    lanes: Vec<Lane<I, O>>,
    running: Vec<(usize, JoinHandle<Lane<I, O>>)>,
    /// The first shard whose lane was lost to a worker panic or spawn failure.
    lost: Option<usize>,
}

impl<I, O, C> Pipeline<I, O, C>
where
    I: Send + 'static,
    O: Send + 'static,
    C: Converter<I, O>,
{
    /// Creates a stopped pipeline with [`PipelineConfig::default`]: one worker
    /// per detected core (rounded down to a power of two) and
    /// [`DEFAULT_CAPACITY`](crate::DEFAULT_CAPACITY) slots per shard.
    ///
    /// # Errors
    /// See [`Pipeline::with_config`].
    pub fn new(converter: C) -> Result<Self> {
        Self::with_config(converter, PipelineConfig::default())
    }

    /// Creates a stopped pipeline with every shard queue allocated.
    ///
    /// # Errors
    /// - [`Error::InvalidConfiguration`] if `config.workers` is zero or not a
    ///   power of two.
    /// - [`Error::AllocationFailure`] if a shard queue cannot be allocated at
    ///   `config.capacity`.
    pub fn with_config(converter: C, config: PipelineConfig) -> Result<Self> {
        config.validate()?;

        let workers = config.workers;
        let mut inputs = Vec::with_capacity(workers);
        let mut outputs = Vec::with_capacity(workers);
        let mut lanes = Vec::with_capacity(workers);
        for shard in 0..workers {
            let (input_tx, input_rx) = queue::channel(config.capacity)?;
            let (output_tx, output_rx) = queue::channel(config.capacity)?;
            inputs.push(input_tx);
            outputs.push(output_rx);
            lanes.push(Lane {
                shard,
                input: input_rx,
                output: output_tx,
            });
        }

        Ok(Self {
            control: Arc::new(Control::new(converter, config.overflow)),
            inputs,
            outputs,
            submit_cursor: Cursor::new(workers),
            retrieve_cursor: Cursor::new(workers),
            lanes,
            running: Vec::with_capacity(workers),
            lost: None,
        })
    }

    /// Starts one worker per shard that polls until [`Pipeline::stop`].
    ///
    /// # Errors
    /// See [`Pipeline::start_with`].
    pub fn start(&mut self) -> Result<()> {
        self.start_with(IdlePolicy::Spin)
    }

    /// Starts one worker per shard that exits once its input shard is empty.
    ///
    /// Submit everything first: a worker that finds its shard empty is gone,
    /// and later submissions to that shard wait for the next start.
    ///
    /// # Errors
    /// See [`Pipeline::start_with`].
    pub fn start_wait(&mut self) -> Result<()> {
        self.start_with(IdlePolicy::Exit)
    }

    /// Starts one worker per shard that sleeps for `interval` whenever its
    /// input shard is empty. Stop it with [`Pipeline::stop`] or
    /// [`Pipeline::stop_sleep`].
    ///
    /// # Errors
    /// See [`Pipeline::start_with`].
    pub fn start_sleep(&mut self, interval: Duration) -> Result<()> {
        self.start_with(IdlePolicy::Sleep(interval))
    }

    /// Sets the active flag and launches one worker thread per shard, each
    /// running `idle` when its input is empty.
    ///
    /// # Errors
    /// - [`Error::AlreadyRunning`] if workers from an earlier start have not
    ///   been stopped.
    /// - [`Error::ShardLost`] if an earlier worker failure took a shard down.
    /// - [`Error::WorkerSpawn`] if a thread cannot be spawned. Workers that
    ///   did start are stopped again before returning.
    #[cfg_attr(feature = "tracing", tracing::instrument(level = "debug", skip(self)))]
    pub fn start_with(&mut self, idle: IdlePolicy) -> Result<()> {
        if !self.running.is_empty() {
            return Err(Error::AlreadyRunning);
        }
        if let Some(shard) = self.lost {
            return Err(Error::ShardLost { shard });
        }

        #[cfg(feature = "tracing")]
        tracing::debug!("Starting {} workers ({idle:?})", self.lanes.len());

        self.control.set_active(true);
        while let Some(lane) = self.lanes.pop() {
            let shard = lane.shard;
            let control = Arc::clone(&self.control);
            let spawned = thread::Builder::new()
                .name(format!("shardline-worker-{shard}"))
                .spawn(move || worker::run(lane, &control, idle));

            match spawned {
                Ok(handle) => self.running.push((shard, handle)),
                Err(e) => {
                    #[cfg(feature = "tracing")]
                    tracing::error!("Failed to spawn worker {shard}: {e}");
                    self.lost.get_or_insert(shard);
                    // A panic report from the rollback would hide the cause.
                    let _ = self.stop();
                    return Err(Error::WorkerSpawn {
                        shard,
                        reason: e.to_string(),
                    });
                }
            }
        }
        Ok(())
    }

    /// Clears the active flag and joins every worker.
    ///
    /// Spinning and sleeping workers finish their current conversion and exit,
    /// leaving any unread input in place. Draining workers exit once their
    /// input is empty. Stopping a stopped pipeline does nothing.
    ///
    /// # Errors
    /// Returns [`Error::WorkerPanicked`] for the first worker that panicked,
    /// after every other worker has been joined. The worker took its ends of
    /// the shard's queues down with it, so the pipeline cannot be started
    /// again; outputs it had already produced can still be retrieved.
    #[cfg_attr(feature = "tracing", tracing::instrument(level = "debug", skip_all))]
    pub fn stop(&mut self) -> Result<()> {
        self.control.set_active(false);

        let mut panicked = None;
        for (shard, handle) in self.running.drain(..) {
            match handle.join() {
                Ok(lane) => self.lanes.push(lane),
                Err(_) => {
                    #[cfg(feature = "tracing")]
                    tracing::error!("Worker {shard} panicked");
                    panicked.get_or_insert(shard);
                    self.lost.get_or_insert(shard);
                }
            }
        }

        #[cfg(feature = "tracing")]
        tracing::debug!("Stopped workers ({} lanes idle)", self.lanes.len());

        match panicked {
            Some(shard) => Err(Error::WorkerPanicked { shard }),
            None => Ok(()),
        }
    }

    /// Waits for draining workers to finish. Identical to [`Pipeline::stop`].
    ///
    /// # Errors
    /// See [`Pipeline::stop`].
    pub fn stop_wait(&mut self) -> Result<()> {
        self.stop()
    }

    /// Stops sleeping workers. Identical to [`Pipeline::stop`].
    ///
    /// # Errors
    /// See [`Pipeline::stop`].
    pub fn stop_sleep(&mut self) -> Result<()> {
        self.stop()
    }
}

impl<I, O, C> Pipeline<I, O, C> {
    /// Submits `value` to the current input shard and advances the
    /// submission cursor.
    ///
    /// # Errors
    /// Returns the value inside a [`SubmitError`] if the shard could not grow
    /// to hold it. The cursor does not move, so retrying keeps the order.
    ///
    /// # Example
    /// ```
    /// use shardline::{Pipeline, PipelineConfig};
    ///
    /// let mut pipeline: Pipeline<u8, u8, _> =
    ///     Pipeline::with_config(|n: u8| n, PipelineConfig::with_workers(4)).unwrap();
    ///
    /// pipeline.submit(1).unwrap();
    /// pipeline.submit(2).unwrap();
    /// assert_eq!(pipeline.next_submit_shard(), 2);
    /// assert_eq!(pipeline.pending_input_count(), 2);
    /// ```
    pub fn submit(&mut self, value: I) -> Result<(), SubmitError<I>> {
        self.split().0.submit(value)
    }

    /// Takes the next output, in submission order, if it is ready.
    ///
    /// Only the current output shard is checked. On a miss the cursor stays
    /// put and `None` is returned even if other shards hold later outputs;
    /// keep calling until it succeeds to preserve order.
    pub fn retrieve(&mut self) -> Option<O> {
        self.split().1.retrieve()
    }

    /// Like [`Pipeline::retrieve`], but backs off and retries the current
    /// shard until its next output arrives.
    ///
    /// Never returns if the matching input was not submitted, was lost to a
    /// stop, or if no workers are running to convert it.
    pub fn retrieve_blocking(&mut self) -> O {
        self.split().1.retrieve_blocking()
    }

    /// Borrows the submission side and the retrieval side separately, so one
    /// thread can submit while another retrieves.
    ///
    /// # Example
    /// ```
    /// use shardline::{Pipeline, PipelineConfig};
    ///
    /// let mut pipeline: Pipeline<u64, u64, _> =
    ///     Pipeline::with_config(|n: u64| n * n, PipelineConfig::with_workers(2)).unwrap();
    /// pipeline.start().unwrap();
    ///
    /// let (mut submitter, mut retriever) = pipeline.split();
    /// std::thread::scope(|s| {
    ///     s.spawn(move || {
    ///         for n in 0..1000 {
    ///             submitter.submit(n).unwrap();
    ///         }
    ///     });
    ///     for n in 0..1000 {
    ///         assert_eq!(retriever.retrieve_blocking(), n * n);
    ///     }
    /// });
    ///
    /// pipeline.stop().unwrap();
    /// ```
    pub fn split(&mut self) -> (Submitter<'_, I>, Retriever<'_, O>) {
        (
            Submitter {
                shards: &mut self.inputs,
                cursor: &mut self.submit_cursor,
            },
            Retriever {
                shards: &mut self.outputs,
                cursor: &mut self.retrieve_cursor,
            },
        )
    }

    /// Approximate number of inputs not yet taken by a worker.
    ///
    /// Sums every input shard, so it costs O(workers). There is no global
    /// counter; keep your own if you need an exact, cheap count.
    pub fn pending_input_count(&self) -> usize {
        self.inputs.iter().map(Producer::len).sum()
    }

    /// Approximate number of converted outputs not yet retrieved.
    ///
    /// Sums every output shard, so it costs O(workers).
    pub fn pending_output_count(&self) -> usize {
        self.outputs.iter().map(Consumer::len).sum()
    }

    /// Number of converted values discarded because an output shard could not
    /// grow. Each one shifts its shard's outputs relative to its inputs.
    pub fn dropped_outputs(&self) -> u64 {
        self.control.dropped()
    }

    /// The shard the next [`Pipeline::submit`] writes to.
    pub fn next_submit_shard(&self) -> usize {
        self.submit_cursor.get()
    }

    /// The shard the next [`Pipeline::retrieve`] reads from.
    pub fn next_retrieve_shard(&self) -> usize {
        self.retrieve_cursor.get()
    }

    /// Number of shards (and worker threads per start).
    pub fn workers(&self) -> usize {
        self.inputs.len()
    }

    /// The policy applied when an output shard cannot grow.
    pub fn overflow_policy(&self) -> OverflowPolicy {
        self.control.overflow
    }

    /// Whether any worker thread is still executing.
    ///
    /// Draining workers finish on their own, so this turns false before
    /// [`Pipeline::stop_wait`] is called once every input shard is empty.
    pub fn is_running(&self) -> bool {
        self.running.iter().any(|(_, handle)| !handle.is_finished())
    }
}

impl<I, O, C> Drop for Pipeline<I, O, C> {
    fn drop(&mut self) {
        if self.running.is_empty() {
            return;
        }
        self.control.set_active(false);
        for (_shard, handle) in self.running.drain(..) {
            if handle.join().is_err() {
                #[cfg(feature = "tracing")]
                tracing::error!("Worker {_shard} panicked");
            }
        }
    }
}

impl<I, O, C> core::fmt::Debug for Pipeline<I, O, C> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Pipeline")
            .field("workers", &self.workers())
            .field("running", &self.running.len())
            .field("pending_inputs", &self.pending_input_count())
            .field("pending_outputs", &self.pending_output_count())
            .field("dropped_outputs", &self.dropped_outputs())
            .finish_non_exhaustive()
    }
}

/// The submission side of a [`Pipeline`], from [`Pipeline::split`].
#[derive(Debug)]
pub struct Submitter<'a, I> {
    shards: &'a mut [Producer<I>],
    cursor: &'a mut Cursor,
}

impl<I> Submitter<'_, I> {
    /// See [`Pipeline::submit`].
    ///
    /// # Errors
    /// See [`Pipeline::submit`].
    pub fn submit(&mut self, value: I) -> Result<(), SubmitError<I>> {
        self.shards[self.cursor.get()].push(value)?;
        self.cursor.advance();
        Ok(())
    }

    /// See [`Pipeline::pending_input_count`].
    pub fn pending(&self) -> usize {
        self.shards.iter().map(Producer::len).sum()
    }

    /// See [`Pipeline::next_submit_shard`].
    pub fn next_shard(&self) -> usize {
        self.cursor.get()
    }
}

/// The retrieval side of a [`Pipeline`], from [`Pipeline::split`].
#[derive(Debug)]
pub struct Retriever<'a, O> {
    shards: &'a mut [Consumer<O>],
    cursor: &'a mut Cursor,
}

impl<O> Retriever<'_, O> {
    /// See [`Pipeline::retrieve`].
    pub fn retrieve(&mut self) -> Option<O> {
        let value = self.shards[self.cursor.get()].pop()?;
        self.cursor.advance();
        Some(value)
    }

    /// See [`Pipeline::retrieve_blocking`].
    pub fn retrieve_blocking(&mut self) -> O {
        let backoff = Backoff::new();
        loop {
            if let Some(value) = self.retrieve() {
                return value;
            }
            backoff.snooze();
        }
    }

    /// See [`Pipeline::pending_output_count`].
    pub fn pending(&self) -> usize {
        self.shards.iter().map(Consumer::len).sum()
    }

    /// See [`Pipeline::next_retrieve_shard`].
    pub fn next_shard(&self) -> usize {
        self.cursor.get()
    }
}

/// Builder for [`Pipeline`].
///
/// # Example
/// ```
/// use shardline::{OverflowPolicy, Pipeline, PipelineBuilder};
///
/// let pipeline: Pipeline<i32, i32, _> = PipelineBuilder::new(|n: i32| -n)
///     .workers(8)
///     .capacity(256)
///     .overflow(OverflowPolicy::Retry)
///     .build()
///     .unwrap();
/// assert_eq!(pipeline.workers(), 8);
/// ```
#[derive(Debug)]
#[must_use]
pub struct PipelineBuilder<C> {
    converter: C,
    config: PipelineConfig,
}

impl<C> PipelineBuilder<C> {
    /// Starts from [`PipelineConfig::default`].
    pub fn new(converter: C) -> Self {
        Self {
            converter,
            config: PipelineConfig::default(),
        }
    }

    /// Number of shards and worker threads. Must be a power of two.
    pub fn workers(mut self, workers: usize) -> Self {
        self.config.workers = workers;
        self
    }

    /// Initial slots per shard queue.
    pub fn capacity(mut self, capacity: usize) -> Self {
        self.config.capacity = capacity;
        self
    }

    /// Output-enqueue failure handling.
    pub fn overflow(mut self, overflow: OverflowPolicy) -> Self {
        self.config.overflow = overflow;
        self
    }

    /// Builds the pipeline.
    ///
    /// # Errors
    /// See [`Pipeline::with_config`].
    pub fn build<I, O>(self) -> Result<Pipeline<I, O, C>>
    where
        I: Send + 'static,
        O: Send + 'static,
        C: Converter<I, O>,
    {
        Pipeline::with_config(self.converter, self.config)
    }
}
