//! Packet handles moved through stages.
//!
//! A packet is an owned value. Releasing it to its pool is its `Drop`, so
//! every code path that discards a packet releases it exactly once.

/// An owned handle to a packet buffer.
pub trait Packet: Send + 'static {
    /// Total payload length in bytes, across all segments.
    fn total_len(&self) -> usize;

    /// The first segment of the payload.
    fn head_data(&self) -> &[u8];
}

impl Packet for Vec<u8> {
    #[inline]
    fn total_len(&self) -> usize {
        self.len()
    }

    #[inline]
    fn head_data(&self) -> &[u8] {
        self
    }
}

impl Packet for Box<[u8]> {
    #[inline]
    fn total_len(&self) -> usize {
        self.len()
    }

    #[inline]
    fn head_data(&self) -> &[u8] {
        self
    }
}

/// Hints the CPU to pull `data` into all cache levels.
///
/// Has no observable effect besides timing.
#[cfg(target_arch = "x86_64")]
#[inline(always)]
#[allow(unused_unsafe)]
pub fn prefetch(data: &[u8]) {
    use std::arch::x86_64::{_MM_HINT_T0, _mm_prefetch};

    // Safety: prefetch never faults, even on an invalid address.
    unsafe { _mm_prefetch::<_MM_HINT_T0>(data.as_ptr().cast()) }
}

/// Hints the CPU to pull `data` into all cache levels.
///
/// No-op on this architecture.
#[cfg(not(target_arch = "x86_64"))]
#[inline(always)]
pub const fn prefetch(_data: &[u8]) {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn byte_buffers_are_packets() {
        let v = vec![0u8; 60];
        assert_eq!(v.total_len(), 60);
        assert_eq!(v.head_data().len(), 60);

        let b: Box<[u8]> = vec![1u8; 1500].into_boxed_slice();
        assert_eq!(b.total_len(), 1500);
        assert_eq!(b.head_data()[0], 1);
    }

    #[test]
    fn prefetch_empty_is_harmless() {
        prefetch(&[]);
        prefetch(&[1, 2, 3]);
    }
}
