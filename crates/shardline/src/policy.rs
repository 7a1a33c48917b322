use core::time::Duration;

/// What a worker does when its input shard is momentarily empty.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum IdlePolicy {
    /// Keep polling until the pipeline is stopped. Intended for long-lived
    /// services. Started by [`Pipeline::start`].
    ///
    /// [`Pipeline::start`]: crate::Pipeline::start
    #[default]
    Spin,

    /// Exit as soon as the input shard is observed empty. Intended for
    /// throughput runs where every input was submitted before starting.
    /// Started by [`Pipeline::start_wait`].
    ///
    /// [`Pipeline::start_wait`]: crate::Pipeline::start_wait
    Exit,

    /// Sleep for the given interval before polling again, trading latency for
    /// CPU time. Started by [`Pipeline::start_sleep`].
    ///
    /// [`Pipeline::start_sleep`]: crate::Pipeline::start_sleep
    Sleep(Duration),
}

impl IdlePolicy {
    /// Whether workers running this policy stop when the pipeline's active
    /// flag is cleared. [`IdlePolicy::Exit`] workers run until their input is
    /// empty regardless.
    pub const fn observes_stop(&self) -> bool {
        !matches!(self, Self::Exit)
    }
}

/// What a worker does when it cannot enqueue a converted value because the
/// output shard failed to grow.
///
/// Under either policy a dropped value shifts that shard's outputs relative
/// to its inputs. A retrieval loop cannot detect the gap: the next value it
/// reads from the shard belongs to a later input.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum OverflowPolicy {
    /// Log a warning, count the drop, and discard the value.
    #[default]
    Drop,

    /// Back off and retry until the enqueue succeeds. If the pipeline is
    /// stopped first, fall back to [`OverflowPolicy::Drop`].
    Retry,
}
