use crate::{Error, Result};
use core::{cell::UnsafeCell, mem::MaybeUninit, ptr};
use crossbeam_utils::CachePadded;
use portable_atomic::{AtomicPtr, AtomicUsize, Ordering};

/// One storage slot. Initialized iff its index lies in `head..tail`.
#[repr(transparent)]
struct Slot<T>(UnsafeCell<MaybeUninit<T>>);

impl<T> Slot<T> {
    const fn new() -> Self {
        Self(UnsafeCell::new(MaybeUninit::uninit()))
    }
}

/// A fixed-capacity ring that forms one link of a [`super::Producer`] /
/// [`super::Consumer`] chain.
///
/// The producer exclusively writes `tail` and `next`; the consumer exclusively
/// writes `head`. Indices grow without bound and are masked on access.
/// Once `next` is non-null the producer will never write to this block again.
pub(super) struct Block<T> {
    head: CachePadded<AtomicUsize>,
    tail: CachePadded<AtomicUsize>,
    next: AtomicPtr<Block<T>>,
    mask: usize,
    slots: Box<[Slot<T>]>,
}

impl<T> Block<T> {
    /// Allocates a block of at least `capacity` slots (rounded up to a power
    /// of two, minimum one).
    ///
    /// # Errors
    /// Returns [`Error::AllocationFailure`] if the slot storage cannot be
    /// reserved. The global allocator is never asked to abort.
    pub(super) fn try_new(capacity: usize) -> Result<Box<Self>> {
        let slots = capacity
            .max(1)
            .checked_next_power_of_two()
            .ok_or(Error::AllocationFailure { capacity })?;

        let mut storage = Vec::new();
        storage
            .try_reserve_exact(slots)
            .map_err(|_| Error::AllocationFailure { capacity: slots })?;
        storage.resize_with(slots, Slot::new);

        Ok(Box::new(Self {
            head: CachePadded::new(AtomicUsize::new(0)),
            tail: CachePadded::new(AtomicUsize::new(0)),
            next: AtomicPtr::new(ptr::null_mut()),
            mask: slots - 1,
            slots: storage.into_boxed_slice(),
        }))
    }

    pub(super) const fn capacity(&self) -> usize {
        self.mask + 1
    }

    /// Writes `value` into the next free slot, or hands it back if the block
    /// is full.
    ///
    /// # Safety
    /// Only the single producer of the chain may call this, and only while
    /// `next` is still null.
    pub(super) unsafe fn try_push(&self, value: T) -> Result<(), T> {
        let tail = self.tail.load(Ordering::Relaxed);
        let head = self.head.load(Ordering::Acquire);
        if tail.wrapping_sub(head) > self.mask {
            return Err(value);
        }

        // SAFETY: the slot lies outside `head..tail`, so the consumer is not
        // reading it, and we are the only writer.
        unsafe { (*self.slots[tail & self.mask].0.get()).write(value) };
        self.tail.store(tail.wrapping_add(1), Ordering::Release);
        Ok(())
    }

    /// Takes the oldest value out of this block, if one is visible.
    ///
    /// # Safety
    /// Only the single consumer of the chain may call this.
    pub(super) unsafe fn try_pop(&self) -> Option<T> {
        let head = self.head.load(Ordering::Relaxed);
        let tail = self.tail.load(Ordering::Acquire);
        if head == tail {
            return None;
        }

        // SAFETY: `head < tail`, so the producer published this slot with the
        // Release store we just synchronized with, and will not touch it again
        // until we advance `head`.
        let value = unsafe { (*self.slots[head & self.mask].0.get()).assume_init_read() };
        self.head.store(head.wrapping_add(1), Ordering::Release);
        Some(value)
    }

    /// The block linked after this one, or null while the producer is still
    /// writing here.
    pub(super) fn next(&self) -> *mut Self {
        self.next.load(Ordering::Acquire)
    }

    /// Publishes `next` as the successor. Every value written to this block
    /// happens-before the link is observed.
    pub(super) fn link(&self, next: *mut Self) {
        debug_assert!(self.next.load(Ordering::Relaxed).is_null());
        self.next.store(next, Ordering::Release);
    }
}

impl<T> Drop for Block<T> {
    fn drop(&mut self) {
        let tail = *self.tail.get_mut();
        let mut head = *self.head.get_mut();
        while head != tail {
            // SAFETY: `&mut self` is exclusive and every index in `head..tail`
            // holds an initialized value that nobody else will read.
            unsafe { self.slots[head & self.mask].0.get_mut().assume_init_drop() };
            head = head.wrapping_add(1);
        }
    }
}
