//! Growable, lock-free single-producer/single-consumer queue.
//!
//! Each pipeline shard is built from two of these: one carrying inputs to its
//! worker, one carrying outputs back. The queue is split into a [`Producer`]
//! and a [`Consumer`] half, neither of which is `Clone`, so the one-writer,
//! one-reader contract is enforced by ownership rather than by convention.
//!
//! Storage is a chain of power-of-two ring blocks. The producer writes into
//! the newest block and, when it fills, links a block twice its size. The
//! consumer drains the oldest block and frees it once the producer has moved
//! on. In steady state nothing is allocated.

mod block;
#[cfg(test)]
mod tests;

use crate::{Result, SubmitError};
use block::Block;
use core::ptr::NonNull;
use crossbeam_utils::CachePadded;
use portable_atomic::{AtomicPtr, AtomicUsize, Ordering};
use std::sync::Arc;

/// State shared by both halves.
struct Shared<T> {
    /// Oldest live block. Written by the consumer as it frees blocks, read
    /// only on drop.
    front: AtomicPtr<Block<T>>,
    pushed: CachePadded<AtomicUsize>,
    popped: CachePadded<AtomicUsize>,
}

impl<T> Shared<T> {
    fn len(&self) -> usize {
        let popped = self.popped.load(Ordering::Relaxed);
        let pushed = self.pushed.load(Ordering::Relaxed);
        pushed.saturating_sub(popped)
    }
}

impl<T> Drop for Shared<T> {
    fn drop(&mut self) {
        let mut cursor = *self.front.get_mut();
        while let Some(block) = NonNull::new(cursor) {
            // SAFETY: both halves are gone, so every block from `front` onward
            // is owned solely by us. Each was leaked from a `Box` exactly once.
            let block = unsafe { Box::from_raw(block.as_ptr()) };
            cursor = block.next();
        }
    }
}

/// Creates a queue whose first block holds at least `capacity` values.
///
/// # Errors
/// Returns [`Error::AllocationFailure`](crate::Error::AllocationFailure) if
/// the initial block cannot be allocated.
///
/// # Example
/// ```
/// let (mut tx, mut rx) = shardline::queue::channel::<u32>(4).unwrap();
///
/// for i in 0..10 {
///     tx.push(i).unwrap();
/// }
/// assert_eq!(rx.len(), 10);
/// assert_eq!(rx.pop(), Some(0));
/// ```
pub fn channel<T>(capacity: usize) -> Result<(Producer<T>, Consumer<T>)> {
    let first = NonNull::from(Box::leak(Block::<T>::try_new(capacity)?));
    let shared = Arc::new(Shared {
        front: AtomicPtr::new(first.as_ptr()),
        pushed: CachePadded::new(AtomicUsize::new(0)),
        popped: CachePadded::new(AtomicUsize::new(0)),
    });

    let producer = Producer {
        shared: Arc::clone(&shared),
        tail: first,
    };
    let consumer = Consumer {
        shared,
        front: first,
    };
    Ok((producer, consumer))
}

/// The writing half of a shard queue.
pub struct Producer<T> {
    shared: Arc<Shared<T>>,
    /// Newest block; the only one this half ever writes to.
    tail: NonNull<Block<T>>,
}

// SAFETY: the producer is the sole writer of its tail block and gives up all
// access to a block once it links a successor. Moving it to another thread
// moves `T` values with it.
unsafe impl<T: Send> Send for Producer<T> {}

impl<T> Producer<T> {
    /// Appends `value` to the back of the queue.
    ///
    /// Never blocks. When the newest block is full a block of twice the
    /// capacity is linked behind it.
    ///
    /// # Errors
    /// Returns the value inside a [`SubmitError`] if the new block cannot be
    /// allocated. Nothing is enqueued in that case.
    pub fn push(&mut self, value: T) -> Result<(), SubmitError<T>> {
        // SAFETY: `tail` is always live: the consumer only frees blocks that
        // have a successor, and `tail` never does.
        let block = unsafe { self.tail.as_ref() };

        // SAFETY: we are the single producer and `block` has no successor.
        let value = match unsafe { block.try_push(value) } {
            Ok(()) => {
                self.record_push();
                return Ok(());
            }
            Err(value) => value,
        };

        let capacity = block.capacity().saturating_mul(2);
        let next = match Block::try_new(capacity) {
            Ok(next) => NonNull::from(Box::leak(next)),
            Err(_) => return Err(SubmitError::new(value, capacity)),
        };

        // SAFETY: `next` is not yet visible to the consumer and has room for
        // at least one value, so this cannot fail.
        let pushed = unsafe { next.as_ref().try_push(value) };
        debug_assert!(pushed.is_ok());

        block.link(next.as_ptr());
        self.tail = next;
        self.record_push();
        Ok(())
    }

    fn record_push(&self) {
        let pushed = self.shared.pushed.load(Ordering::Relaxed);
        self.shared
            .pushed
            .store(pushed.wrapping_add(1), Ordering::Relaxed);
    }

    /// Approximate number of values in the queue.
    pub fn len(&self) -> usize {
        self.shared.len()
    }

    /// Whether the queue appears empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// The reading half of a shard queue.
pub struct Consumer<T> {
    shared: Arc<Shared<T>>,
    /// Oldest live block; owned by this half once the producer links past it.
    front: NonNull<Block<T>>,
}

// SAFETY: the consumer is the sole reader of the chain and the sole freer of
// drained blocks.
unsafe impl<T: Send> Send for Consumer<T> {}

impl<T> Consumer<T> {
    /// Removes the value at the front of the queue, or returns `None` if no
    /// value is visible yet.
    pub fn pop(&mut self) -> Option<T> {
        loop {
            // SAFETY: `front` is live until we free it below.
            let block = unsafe { self.front.as_ref() };

            // SAFETY: we are the single consumer.
            if let Some(value) = unsafe { block.try_pop() } {
                self.record_pop();
                return Some(value);
            }

            let next = NonNull::new(block.next())?;

            // The producer links `next` only after its last write to `block`.
            // Having seen the link, one more pass sees everything left here.
            // SAFETY: as above.
            if let Some(value) = unsafe { block.try_pop() } {
                self.record_pop();
                return Some(value);
            }

            let drained = core::mem::replace(&mut self.front, next);
            self.shared.front.store(next.as_ptr(), Ordering::Release);
            // SAFETY: `drained` is empty, has a successor (so the producer is
            // done with it), and is no longer reachable from `front`.
            drop(unsafe { Box::from_raw(drained.as_ptr()) });
        }
    }

    fn record_pop(&self) {
        let popped = self.shared.popped.load(Ordering::Relaxed);
        self.shared
            .popped
            .store(popped.wrapping_add(1), Ordering::Relaxed);
    }

    /// Approximate number of values in the queue.
    pub fn len(&self) -> usize {
        self.shared.len()
    }

    /// Whether the queue appears empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<T> core::fmt::Debug for Producer<T> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Producer").field("len", &self.len()).finish()
    }
}

impl<T> core::fmt::Debug for Consumer<T> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Consumer").field("len", &self.len()).finish()
    }
}
