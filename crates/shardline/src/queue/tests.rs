use super::channel;
use crate::Error;
use std::sync::Arc;
use std::thread::scope;

#[test]
fn pop_on_empty_queue_returns_none() {
    let (_tx, mut rx) = channel::<u32>(8).unwrap();
    assert_eq!(rx.pop(), None);
    assert!(rx.is_empty());
}

#[test]
fn preserves_fifo_order_across_growth() {
    // A two-slot first block forces several links before the first pop.
    let (mut tx, mut rx) = channel::<usize>(2).unwrap();
    for i in 0..1000 {
        tx.push(i).unwrap();
    }
    assert_eq!(tx.len(), 1000);

    for expected in 0..1000 {
        assert_eq!(rx.pop(), Some(expected));
    }
    assert_eq!(rx.pop(), None);
    assert_eq!(rx.len(), 0);
}

#[test]
fn interleaved_push_pop_reuses_the_ring() {
    let (mut tx, mut rx) = channel::<u64>(4).unwrap();
    for round in 0..100u64 {
        for i in 0..3 {
            tx.push(round * 3 + i).unwrap();
        }
        for i in 0..3 {
            assert_eq!(rx.pop(), Some(round * 3 + i));
        }
    }
    assert!(tx.is_empty());
}

#[test]
fn zero_capacity_still_accepts_values() {
    let (mut tx, mut rx) = channel::<&str>(0).unwrap();
    tx.push("a").unwrap();
    tx.push("b").unwrap();
    assert_eq!(rx.pop(), Some("a"));
    assert_eq!(rx.pop(), Some("b"));
}

#[test]
fn unallocatable_capacity_fails() {
    let err = channel::<u64>(usize::MAX).unwrap_err();
    assert!(matches!(err, Error::AllocationFailure { .. }));

    let err = channel::<u64>(1 << (usize::BITS - 2)).unwrap_err();
    assert_eq!(
        err,
        Error::AllocationFailure {
            capacity: 1 << (usize::BITS - 2)
        }
    );
}

#[test]
fn dropping_both_halves_drops_queued_values() {
    let token = Arc::new(());
    {
        let (mut tx, mut rx) = channel::<Arc<()>>(2).unwrap();
        for _ in 0..10 {
            tx.push(Arc::clone(&token)).unwrap();
        }
        drop(rx.pop());
        assert_eq!(Arc::strong_count(&token), 10);
    }
    assert_eq!(Arc::strong_count(&token), 1);
}

#[test]
fn producer_outlives_consumer() {
    let token = Arc::new(());
    let (mut tx, rx) = channel::<Arc<()>>(1).unwrap();
    drop(rx);
    for _ in 0..5 {
        tx.push(Arc::clone(&token)).unwrap();
    }
    drop(tx);
    assert_eq!(Arc::strong_count(&token), 1);
}

#[test]
fn threaded_fifo_order() {
    const TOTAL: usize = 200_000;
    let (mut tx, mut rx) = channel::<usize>(16).unwrap();

    scope(|s| {
        s.spawn(move || {
            for i in 0..TOTAL {
                tx.push(i).unwrap();
            }
        });
        s.spawn(move || {
            let mut expected = 0;
            while expected < TOTAL {
                if let Some(value) = rx.pop() {
                    assert_eq!(value, expected, "out of order at {expected}");
                    expected += 1;
                } else {
                    core::hint::spin_loop();
                }
            }
            assert_eq!(rx.pop(), None);
        });
    });
}
