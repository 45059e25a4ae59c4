//! The underlying slot storage for [`Ring`](crate::Ring).
//!
//! This uses per-slot sequence numbers to coordinate multiple producers
//! and handle out-of-order completion.

use std::cell::UnsafeCell;
use std::mem::MaybeUninit;
use std::sync::atomic::{AtomicUsize, Ordering};

use crossbeam_utils::{Backoff, CachePadded};

use crate::error::RingError;

/// A slot in the sequenced ring buffer.
///
/// The sequence number indicates the slot's state:
/// - `sequence == index`: slot is empty/writable
/// - `sequence == index + 1`: slot contains data, readable
/// - `sequence == index + capacity`: slot recycled, writable next lap
struct Slot<T> {
    sequence: AtomicUsize,
    data: UnsafeCell<MaybeUninit<T>>,
}

/// The backing storage for a ring.
///
/// Memory layout:
/// ```text
/// ┌───────────────────────────────────────────────────────┐
/// │ head (cache-line padded) - consumer read position     │
/// ├───────────────────────────────────────────────────────┤
/// │ tail (cache-line padded) - producer claim position    │
/// ├───────────────────────────────────────────────────────┤
/// │ slots ──► [ { sequence, data }, … ]                   │
/// │ capacity, mask                                        │
/// └───────────────────────────────────────────────────────┘
/// ```
///
/// Buffer contains elements in range [head, tail).
/// - Producers claim at tail (via CAS), then write and publish
/// - Consumer reads at head, then publishes the new head
pub(crate) struct RingBuffer<T> {
    // === Hot path - cache-line padded indices ===
    /// Consumer's read position. Only written by the consumer.
    head: CachePadded<AtomicUsize>,
    /// Producer's claim position (multiple producers CAS on this).
    tail: CachePadded<AtomicUsize>,

    slots: Box<[Slot<T>]>,

    // === Immutable configuration ===
    capacity: usize,
    mask: usize,
}

// Safety: values of T are moved between threads through the slots, never
// shared; slot access is serialized by the sequence protocol.
unsafe impl<T: Send> Send for RingBuffer<T> {}
unsafe impl<T: Send> Sync for RingBuffer<T> {}

impl<T> RingBuffer<T> {
    /// Allocates and initializes the slot array.
    ///
    /// Never rounds up: `capacity` must already be a power of two
    /// (minimum 2). Allocation failure is reported instead of aborting.
    pub(crate) fn allocate(capacity: usize) -> Result<Self, RingError> {
        if capacity < 2 || !capacity.is_power_of_two() {
            return Err(RingError::InvalidCapacity(capacity));
        }

        let mut slots = Vec::new();
        slots
            .try_reserve_exact(capacity)
            .map_err(|_| RingError::AllocFailed(capacity))?;

        // slot[i].sequence = i (empty/writable), data left uninitialized
        slots.extend((0..capacity).map(|i| Slot {
            sequence: AtomicUsize::new(i),
            data: UnsafeCell::new(MaybeUninit::uninit()),
        }));

        Ok(Self {
            head: CachePadded::new(AtomicUsize::new(0)),
            tail: CachePadded::new(AtomicUsize::new(0)),
            slots: slots.into_boxed_slice(),
            capacity,
            mask: capacity - 1,
        })
    }

    // === Accessors ===

    #[inline]
    fn slot(&self, index: usize) -> &Slot<T> {
        // Safety: mask keeps the index within the slot array.
        unsafe { self.slots.get_unchecked(index & self.mask) }
    }

    #[inline]
    pub(crate) fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of claimed slots not yet consumed.
    ///
    /// Claimed-but-unpublished slots count as occupied. While a consumer is
    /// mid-burst the published head may lag, so this is a snapshot that can
    /// overestimate, never exceeding capacity.
    #[inline]
    pub(crate) fn len(&self) -> usize {
        let head = self.head.load(Ordering::Acquire);
        let tail = self.tail.load(Ordering::Acquire);
        tail.wrapping_sub(head).min(self.capacity)
    }

    // === Producer operations (tail) ===

    /// Attempts to claim, write, and publish one slot.
    ///
    /// Hands the value back if the buffer is full.
    #[inline]
    #[allow(clippy::cast_possible_wrap)]
    pub(crate) fn try_push(&self, value: T) -> Result<(), T> {
        let backoff = Backoff::new();
        let mut tail = self.tail.load(Ordering::Relaxed);

        loop {
            let slot = self.slot(tail);
            let seq = slot.sequence.load(Ordering::Acquire);
            let diff = seq.wrapping_sub(tail) as isize;

            if diff == 0 {
                match self.tail.compare_exchange_weak(
                    tail,
                    tail.wrapping_add(1),
                    Ordering::Relaxed,
                    Ordering::Relaxed,
                ) {
                    Ok(_) => {
                        // Safety: the CAS gave us exclusive ownership of this slot
                        // until we publish it.
                        unsafe {
                            slot.data.get().cast::<T>().write(value);
                        }
                        slot.sequence
                            .store(tail.wrapping_add(1), Ordering::Release);
                        return Ok(());
                    }
                    Err(t) => {
                        tail = t;
                        backoff.spin();
                    }
                }
            } else if diff < 0 {
                // Slot not yet recycled by consumer - buffer is full
                return Err(value);
            } else {
                // Another producer claimed this slot, reload tail
                tail = self.tail.load(Ordering::Relaxed);
                backoff.spin();
            }
        }
    }

    // === Consumer operations (head) ===

    /// Loads the published head position.
    #[inline]
    pub(crate) fn load_head(&self) -> usize {
        self.head.load(Ordering::Acquire)
    }

    /// Publishes the consumer's head position.
    #[inline]
    pub(crate) fn store_head(&self, head: usize) {
        self.head.store(head, Ordering::Release);
    }

    /// Attempts to read from the slot at `head`.
    ///
    /// Returns `Some(value)` if data was published there, `None` if the
    /// buffer is empty or the producer has not finished publishing.
    ///
    /// # Safety
    ///
    /// Must only be called by the single consumer, with `head` being that
    /// consumer's current read position.
    #[inline]
    pub(crate) unsafe fn try_read(&self, head: usize) -> Option<T> {
        let slot = self.slot(head);
        let seq = slot.sequence.load(Ordering::Acquire);

        if seq == head.wrapping_add(1) {
            // Safety: published slot, and we are the only reader.
            let value = unsafe { (*slot.data.get()).assume_init_read() };

            // Recycle the slot: sequence = head + capacity
            slot.sequence
                .store(head.wrapping_add(self.capacity), Ordering::Release);

            Some(value)
        } else {
            None
        }
    }

    /// Pops the oldest element with exclusive access.
    pub(crate) fn pop_exclusive(&mut self) -> Option<T> {
        let head = *self.head.get_mut();
        // Safety: `&mut self` rules out any other consumer.
        let value = unsafe { self.try_read(head) }?;
        *self.head.get_mut() = head.wrapping_add(1);
        Some(value)
    }
}

impl<T> Drop for RingBuffer<T> {
    fn drop(&mut self) {
        let head = *self.head.get_mut();
        let tail = *self.tail.get_mut();

        // Only drop slots whose sequence says they were written
        let mut i = head;
        while i != tail {
            let idx = i & self.mask;
            let slot = &mut self.slots[idx];
            if *slot.sequence.get_mut() == i.wrapping_add(1) {
                // Safety: published and never read.
                unsafe {
                    slot.data.get_mut().assume_init_drop();
                }
            }
            i = i.wrapping_add(1);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slot_sequence_initialization() {
        let rb = RingBuffer::<u64>::allocate(8).unwrap();

        // All slots should start with sequence == index
        for i in 0..8 {
            assert_eq!(rb.slot(i).sequence.load(Ordering::Relaxed), i);
        }
    }

    #[test]
    fn rejects_non_power_of_two() {
        assert!(matches!(
            RingBuffer::<u64>::allocate(6),
            Err(RingError::InvalidCapacity(6))
        ));
        assert!(matches!(
            RingBuffer::<u64>::allocate(1),
            Err(RingError::InvalidCapacity(1))
        ));
        assert!(matches!(
            RingBuffer::<u64>::allocate(0),
            Err(RingError::InvalidCapacity(0))
        ));
    }

    #[test]
    fn absurd_capacity_fails_allocation() {
        let huge = 1usize << (usize::BITS - 2);
        assert!(matches!(
            RingBuffer::<[u64; 8]>::allocate(huge),
            Err(RingError::AllocFailed(_))
        ));
    }

    #[test]
    fn push_read_recycles_sequence() {
        let rb = RingBuffer::<u64>::allocate(4).unwrap();

        rb.try_push(7).unwrap();
        assert_eq!(rb.slot(0).sequence.load(Ordering::Relaxed), 1);

        let val = unsafe { rb.try_read(0) }.unwrap();
        assert_eq!(val, 7);
        assert_eq!(rb.slot(0).sequence.load(Ordering::Relaxed), 4);
    }

    #[test]
    fn full_buffer_hands_value_back() {
        let rb = RingBuffer::<u64>::allocate(2).unwrap();

        rb.try_push(1).unwrap();
        rb.try_push(2).unwrap();
        assert_eq!(rb.try_push(3), Err(3));
        assert_eq!(rb.len(), 2);
    }
}
