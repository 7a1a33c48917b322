use crate::{Error, IdlePolicy, OverflowPolicy, Pipeline, PipelineBuilder, PipelineConfig};
use core::time::Duration;
use std::thread::scope;
use std::time::Instant;

fn pipeline<I, O, F>(workers: usize, convert: F) -> Pipeline<I, O, F>
where
    I: Send + 'static,
    O: Send + 'static,
    F: Fn(I) -> O + Send + Sync + 'static,
{
    Pipeline::with_config(convert, PipelineConfig::with_workers(workers)).unwrap()
}

fn wait_until(mut done: impl FnMut() -> bool) {
    let deadline = Instant::now() + Duration::from_secs(10);
    while !done() {
        assert!(Instant::now() < deadline, "timed out waiting for workers");
        std::thread::sleep(Duration::from_millis(1));
    }
}

#[test]
fn rejects_worker_counts_that_are_not_powers_of_two() {
    for workers in [0, 3, 6] {
        let result = Pipeline::<u32, u32, _>::with_config(
            |n: u32| n,
            PipelineConfig::with_workers(workers),
        );
        assert!(
            matches!(result, Err(Error::InvalidConfiguration { .. })),
            "{workers} workers should be rejected"
        );
    }
}

#[test]
fn accepts_power_of_two_worker_counts() {
    for workers in [1, 2, 4, 8] {
        let pipeline = pipeline(workers, |n: u32| n);
        assert_eq!(pipeline.workers(), workers);
        assert!(!pipeline.is_running());
    }
}

#[test]
fn unallocatable_capacity_fails_construction() {
    let result: Result<Pipeline<u64, u64, _>, _> = PipelineBuilder::new(|n: u64| n)
        .workers(2)
        .capacity(usize::MAX)
        .build();
    assert!(matches!(result, Err(Error::AllocationFailure { .. })));
}

#[test]
fn default_pipeline_uses_detected_parallelism() {
    let pipeline: Pipeline<u8, u8, _> = Pipeline::new(|n: u8| n).unwrap();
    assert!(pipeline.workers().is_power_of_two());
    assert_eq!(pipeline.overflow_policy(), OverflowPolicy::Drop);
}

#[test]
fn single_worker_preserves_fifo() {
    let mut pipeline = pipeline(1, |n: i32| n * 10);
    for n in 1..=5 {
        pipeline.submit(n).unwrap();
    }
    pipeline.start_wait().unwrap();
    pipeline.stop_wait().unwrap();

    let outputs: Vec<_> = (0..5).map(|_| pipeline.retrieve().unwrap()).collect();
    assert_eq!(outputs, [10, 20, 30, 40, 50]);
    assert_eq!(pipeline.retrieve(), None);
}

#[test]
fn integers_come_back_as_strings_in_order() {
    let mut pipeline = pipeline(2, |n: u32| n.to_string());
    for n in 0..4 {
        pipeline.submit(n).unwrap();
    }
    pipeline.start_wait().unwrap();
    pipeline.stop_wait().unwrap();

    let outputs: Vec<_> = std::iter::from_fn(|| pipeline.retrieve()).collect();
    assert_eq!(outputs, ["0", "1", "2", "3"]);
}

#[test]
fn multi_worker_preserves_order_under_spin() {
    const TOTAL: u64 = 100_000;
    let mut pipeline = pipeline(4, |n: u64| n.wrapping_mul(0x9E37_79B9_7F4A_7C15));
    pipeline.start().unwrap();
    for n in 0..TOTAL {
        pipeline.submit(n).unwrap();
    }
    for n in 0..TOTAL {
        assert_eq!(
            pipeline.retrieve_blocking(),
            n.wrapping_mul(0x9E37_79B9_7F4A_7C15)
        );
    }
    pipeline.stop().unwrap();
    assert_eq!(pipeline.pending_input_count(), 0);
    assert_eq!(pipeline.pending_output_count(), 0);
    assert_eq!(pipeline.dropped_outputs(), 0);
}

#[test]
fn concurrent_submit_and_retrieve_through_split() {
    const TOTAL: usize = 50_000;
    let mut pipeline = pipeline(8, |n: usize| format!("#{n}"));
    pipeline.start().unwrap();

    let (mut submitter, mut retriever) = pipeline.split();
    scope(|s| {
        s.spawn(move || {
            for n in 0..TOTAL {
                submitter.submit(n).unwrap();
            }
        });
        s.spawn(move || {
            for n in 0..TOTAL {
                assert_eq!(retriever.retrieve_blocking(), format!("#{n}"));
            }
        });
    });

    pipeline.stop().unwrap();
    assert_eq!(pipeline.next_submit_shard(), TOTAL % 8);
    assert_eq!(pipeline.next_retrieve_shard(), TOTAL % 8);
}

#[test]
fn sleeping_workers_convert_and_stop() {
    let mut pipeline = pipeline(2, |n: u16| u32::from(n) + 1);
    pipeline.start_sleep(Duration::from_micros(200)).unwrap();
    for n in 0..1000 {
        pipeline.submit(n).unwrap();
    }
    for n in 0..1000u16 {
        assert_eq!(pipeline.retrieve_blocking(), u32::from(n) + 1);
    }
    pipeline.stop_sleep().unwrap();
    assert!(!pipeline.is_running());
}

#[test]
fn submissions_and_retrievals_rotate_round_robin() {
    let mut pipeline = pipeline(4, |n: usize| n);
    for i in 0..10 {
        assert_eq!(pipeline.next_submit_shard(), i % 4);
        pipeline.submit(i).unwrap();
    }
    assert_eq!(pipeline.next_submit_shard(), 10 % 4);

    pipeline.start_wait().unwrap();
    pipeline.stop_wait().unwrap();

    for i in 0..10 {
        assert_eq!(pipeline.next_retrieve_shard(), i % 4);
        // Each shard converted only its own inputs, so the value read from
        // shard `i % 4` identifies where item `i` was routed.
        assert_eq!(pipeline.retrieve(), Some(i));
    }
    assert_eq!(pipeline.next_retrieve_shard(), 10 % 4);
}

#[test]
fn retrieve_miss_does_not_advance_or_skip() {
    let mut pipeline = pipeline(2, |n: u8| n);
    pipeline.submit(0).unwrap();
    pipeline.submit(1).unwrap();
    pipeline.submit(2).unwrap();

    // Nothing converted yet: the miss leaves the cursor on shard 0.
    assert_eq!(pipeline.retrieve(), None);
    assert_eq!(pipeline.next_retrieve_shard(), 0);

    pipeline.start_wait().unwrap();
    pipeline.stop_wait().unwrap();
    assert_eq!(pipeline.retrieve(), Some(0));
    assert_eq!(pipeline.retrieve(), Some(1));
    assert_eq!(pipeline.retrieve(), Some(2));

    // Shard 1 is now current and empty even though nothing else is pending.
    assert_eq!(pipeline.retrieve(), None);
    assert_eq!(pipeline.next_retrieve_shard(), 1);
}

#[test]
fn draining_workers_terminate_without_stop() {
    const TOTAL: u32 = 10_000;
    let mut pipeline = pipeline(4, |n: u32| n);
    for n in 0..TOTAL {
        pipeline.submit(n).unwrap();
    }
    pipeline.start_wait().unwrap();

    wait_until(|| !pipeline.is_running());
    assert_eq!(pipeline.pending_input_count(), 0);
    assert_eq!(pipeline.pending_output_count(), TOTAL as usize);

    pipeline.stop_wait().unwrap();
}

#[test]
fn pending_counts_track_submission_conversion_and_retrieval() {
    let mut pipeline = pipeline(4, |n: u32| n);
    for n in 0..100 {
        pipeline.submit(n).unwrap();
    }
    assert_eq!(pipeline.pending_input_count(), 100);
    assert_eq!(pipeline.pending_output_count(), 0);

    pipeline.start_wait().unwrap();
    pipeline.stop_wait().unwrap();
    assert_eq!(pipeline.pending_input_count(), 0);
    assert_eq!(pipeline.pending_output_count(), 100);

    for _ in 0..30 {
        pipeline.retrieve().unwrap();
    }
    assert_eq!(pipeline.pending_output_count(), 70);

    while pipeline.retrieve().is_some() {}
    assert_eq!(pipeline.pending_input_count(), 0);
    assert_eq!(pipeline.pending_output_count(), 0);
}

#[test]
fn stop_leaves_unreached_input_in_place() {
    let mut pipeline = pipeline(1, |n: u32| n);
    pipeline.start().unwrap();
    pipeline.stop().unwrap();

    // Submitted after stop: nobody is reading, so it stays queued.
    pipeline.submit(1).unwrap();
    assert_eq!(pipeline.pending_input_count(), 1);
    assert_eq!(pipeline.retrieve(), None);
}

#[test]
fn restart_continues_in_order() {
    let mut pipeline = pipeline(2, |n: u32| n + 1);
    for n in 0..5 {
        pipeline.submit(n).unwrap();
    }
    pipeline.start_wait().unwrap();
    pipeline.stop_wait().unwrap();

    for n in 5..9 {
        pipeline.submit(n).unwrap();
    }
    pipeline.start_with(IdlePolicy::Exit).unwrap();
    pipeline.stop().unwrap();

    let outputs: Vec<_> = std::iter::from_fn(|| pipeline.retrieve()).collect();
    assert_eq!(outputs, (1..10).collect::<Vec<_>>());
}

#[test]
fn starting_twice_is_rejected() {
    let mut pipeline = pipeline(2, |n: u32| n);
    pipeline.start().unwrap();
    assert_eq!(pipeline.start(), Err(Error::AlreadyRunning));
    assert_eq!(pipeline.start_wait(), Err(Error::AlreadyRunning));
    pipeline.stop().unwrap();
    pipeline.start().unwrap();
    pipeline.stop().unwrap();
}

#[test]
fn stopping_a_stopped_pipeline_is_a_no_op() {
    let mut pipeline = pipeline(2, |n: u32| n);
    pipeline.stop().unwrap();
    pipeline.stop_wait().unwrap();
    pipeline.stop_sleep().unwrap();
}

#[test]
fn worker_panic_is_reported_and_poisons_restart() {
    let mut pipeline = pipeline(2, |n: u32| {
        assert_ne!(n, 1, "refusing to convert 1");
        n
    });
    for n in 0..4 {
        pipeline.submit(n).unwrap();
    }
    pipeline.start_wait().unwrap();

    // Input 1 lands on shard 1.
    assert_eq!(pipeline.stop_wait(), Err(Error::WorkerPanicked { shard: 1 }));
    assert_eq!(pipeline.start(), Err(Error::ShardLost { shard: 1 }));

    // Shard 0 converted everything it was given.
    assert_eq!(pipeline.retrieve(), Some(0));
}

#[test]
fn dropping_a_running_pipeline_joins_workers() {
    let mut pipeline = pipeline(4, |n: u32| n);
    pipeline.start().unwrap();
    for n in 0..100 {
        pipeline.submit(n).unwrap();
    }
    drop(pipeline);
}

#[test]
fn retry_policy_converts_normally() {
    let mut pipeline: Pipeline<u32, u32, _> = PipelineBuilder::new(|n: u32| n * 2)
        .workers(2)
        .capacity(1)
        .overflow(OverflowPolicy::Retry)
        .build()
        .unwrap();
    assert_eq!(pipeline.overflow_policy(), OverflowPolicy::Retry);

    for n in 0..500 {
        pipeline.submit(n).unwrap();
    }
    pipeline.start_wait().unwrap();
    pipeline.stop_wait().unwrap();
    for n in 0..500 {
        assert_eq!(pipeline.retrieve(), Some(n * 2));
    }
    assert_eq!(pipeline.dropped_outputs(), 0);
}

#[test]
fn submit_error_converts_into_allocation_failure() {
    let err: Error = crate::SubmitError::new(7u8, 64).into();
    assert_eq!(err, Error::AllocationFailure { capacity: 64 });
}
