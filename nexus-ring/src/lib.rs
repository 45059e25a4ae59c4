//! # nexus-ring
//!
//! Bounded multi-producer single-consumer ring with burst operations,
//! built as the backing store for dataplane queue stages.
//!
//! ## Features
//!
//! - **Burst enqueue**: producers insert a batch in one call and keep
//!   ownership of whatever did not fit (partial success)
//! - **Burst dequeue**: the consumer drains up to `max` elements per call
//! - **Runtime single-consumer claim**: [`Ring::consumer`] hands out at most
//!   one [`Consumer`] at a time, so the ring itself can be shared freely
//! - **Exclusive draining**: [`Ring::drain`] empties the ring in FIFO order
//!   when the caller holds `&mut Ring`, used for migration and teardown
//!
//! ## Design Goals
//!
//! - No allocations after construction
//! - Fallible construction: bad sizes and allocation failure are errors,
//!   not aborts
//! - Cache-line isolation of the head and tail indices
//!
//! ## Example
//!
//! ```
//! use nexus_ring::Ring;
//!
//! let ring = Ring::<u64>::with_capacity(4).unwrap();
//!
//! let mut batch = vec![1, 2, 3, 4, 5, 6];
//! let accepted = ring.enqueue_burst(&mut batch);
//!
//! // The first four went in, the tail stayed with us
//! assert_eq!(accepted, 4);
//! assert_eq!(batch, vec![5, 6]);
//!
//! let mut out = Vec::new();
//! let mut consumer = ring.consumer().unwrap();
//! assert_eq!(consumer.dequeue_burst(&mut out, 3), 3);
//! assert_eq!(out, vec![1, 2, 3]);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![allow(clippy::module_name_repetitions)]

mod buffer;
mod error;

use std::fmt;
use std::iter::FusedIterator;
use std::sync::atomic::{AtomicBool, Ordering};

use buffer::RingBuffer;

pub use error::RingError;

/// A bounded MPSC ring of owned values.
///
/// Any number of threads may push through a shared reference. Popping
/// requires either the [`Consumer`] claim or exclusive access.
pub struct Ring<T> {
    inner: RingBuffer<T>,
    /// Set while a [`Consumer`] is alive.
    consumer_claimed: AtomicBool,
}

impl<T> Ring<T> {
    /// Creates a ring with exactly `slots` slots.
    ///
    /// # Errors
    ///
    /// Returns [`RingError::InvalidCapacity`] if `slots` is not a power of
    /// two or is below 2, and [`RingError::AllocFailed`] if the slot array
    /// cannot be allocated.
    ///
    /// # Example
    ///
    /// ```
    /// use nexus_ring::{Ring, RingError};
    ///
    /// assert_eq!(Ring::<u32>::with_capacity(1024).unwrap().capacity(), 1024);
    /// assert!(matches!(
    ///     Ring::<u32>::with_capacity(100),
    ///     Err(RingError::InvalidCapacity(100))
    /// ));
    /// ```
    pub fn with_capacity(slots: usize) -> Result<Self, RingError> {
        Ok(Self {
            inner: RingBuffer::allocate(slots)?,
            consumer_claimed: AtomicBool::new(false),
        })
    }

    /// Returns the number of slots.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.inner.capacity()
    }

    /// Returns the number of occupied slots.
    ///
    /// Under concurrent use this is a snapshot; slots claimed by a producer
    /// that has not finished publishing are counted as occupied.
    #[inline]
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    /// Returns `true` if no slot is occupied.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns `true` if every slot is occupied.
    #[inline]
    pub fn is_full(&self) -> bool {
        self.len() == self.capacity()
    }

    /// Attempts to push a single value.
    ///
    /// # Errors
    ///
    /// Hands `value` back if the ring is full.
    #[inline]
    pub fn try_push(&self, value: T) -> Result<(), T> {
        self.inner.try_push(value)
    }

    /// Pushes values from the front of `items` until the ring is full.
    ///
    /// Returns how many were accepted. Accepted values are removed from
    /// `items`; the rejected suffix is left in `items` in its original order
    /// and remains owned by the caller.
    ///
    /// Safe to call from many producers at once. Values from one call keep
    /// their relative order, but may interleave with other producers.
    pub fn enqueue_burst(&self, items: &mut Vec<T>) -> usize {
        let mut accepted = 0;
        let mut rest = std::mem::take(items).into_iter();

        for item in rest.by_ref() {
            if let Err(item) = self.inner.try_push(item) {
                items.push(item);
                break;
            }
            accepted += 1;
        }

        items.extend(rest);
        accepted
    }

    /// Claims the consumer side of the ring.
    ///
    /// Returns `None` if another [`Consumer`] is currently alive. The claim
    /// is released when the returned handle is dropped.
    pub fn consumer(&self) -> Option<Consumer<'_, T>> {
        self.consumer_claimed
            .compare_exchange(false, true, Ordering::Acquire, Ordering::Relaxed)
            .ok()?;

        Some(Consumer {
            ring: self,
            local_head: self.inner.load_head(),
        })
    }

    /// Pops the oldest value.
    pub fn pop(&mut self) -> Option<T> {
        self.inner.pop_exclusive()
    }

    /// Removes every value in FIFO order.
    ///
    /// Values not consumed by the caller are dropped when the iterator is.
    pub fn drain(&mut self) -> Drain<'_, T> {
        Drain { ring: self }
    }
}

impl<T> fmt::Debug for Ring<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Ring")
            .field("len", &self.len())
            .field("capacity", &self.capacity())
            .finish_non_exhaustive()
    }
}

/// The consumer side of a [`Ring`].
///
/// At most one exists per ring at any time. Obtained from
/// [`Ring::consumer`].
pub struct Consumer<'a, T> {
    ring: &'a Ring<T>,

    /// Our read position. We're the only reader, so no atomic needed.
    local_head: usize,
}

impl<T> Consumer<'_, T> {
    /// Attempts to pop the oldest value.
    ///
    /// Returns `None` if the ring is empty or the next producer has not
    /// finished publishing.
    #[inline]
    pub fn try_pop(&mut self) -> Option<T> {
        // Safety: the claim makes us the only consumer.
        let value = unsafe { self.ring.inner.try_read(self.local_head) }?;
        self.local_head = self.local_head.wrapping_add(1);
        self.ring.inner.store_head(self.local_head);
        Some(value)
    }

    /// Pops up to `max` values onto the end of `out`, oldest first.
    ///
    /// Returns how many were moved. Zero is a normal result.
    pub fn dequeue_burst(&mut self, out: &mut Vec<T>, max: usize) -> usize {
        let start = self.local_head;
        let mut count = 0;

        while count < max {
            // Safety: the claim makes us the only consumer.
            match unsafe { self.ring.inner.try_read(self.local_head) } {
                Some(value) => {
                    out.push(value);
                    self.local_head = self.local_head.wrapping_add(1);
                    count += 1;
                }
                None => break,
            }
        }

        if self.local_head != start {
            self.ring.inner.store_head(self.local_head);
        }
        count
    }

    /// Returns the capacity of the ring.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.ring.capacity()
    }
}

impl<T> Drop for Consumer<'_, T> {
    fn drop(&mut self) {
        self.ring.inner.store_head(self.local_head);
        self.ring.consumer_claimed.store(false, Ordering::Release);
    }
}

impl<T> fmt::Debug for Consumer<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Consumer")
            .field("capacity", &self.capacity())
            .finish_non_exhaustive()
    }
}

/// Draining iterator returned by [`Ring::drain`].
pub struct Drain<'a, T> {
    ring: &'a mut Ring<T>,
}

impl<T> Iterator for Drain<'_, T> {
    type Item = T;

    #[inline]
    fn next(&mut self) -> Option<T> {
        self.ring.pop()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        // Exact: nobody else can touch the ring while we hold `&mut`.
        let len = self.ring.len();
        (len, Some(len))
    }
}

impl<T> ExactSizeIterator for Drain<'_, T> {}

impl<T> FusedIterator for Drain<'_, T> {}

impl<T> Drop for Drain<'_, T> {
    fn drop(&mut self) {
        self.for_each(drop);
    }
}
