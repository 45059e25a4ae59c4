//! Error types for ring construction.

use std::fmt;

/// Error returned by [`Ring::with_capacity`](crate::Ring::with_capacity).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RingError {
    /// Slot count is not a power of two, or is below 2.
    InvalidCapacity(usize),
    /// The slot array for this many slots could not be allocated.
    AllocFailed(usize),
}

impl RingError {
    /// Returns `true` if this error is the `InvalidCapacity` variant.
    pub fn is_invalid_capacity(&self) -> bool {
        matches!(self, Self::InvalidCapacity(_))
    }

    /// Returns `true` if this error is the `AllocFailed` variant.
    pub fn is_alloc_failed(&self) -> bool {
        matches!(self, Self::AllocFailed(_))
    }
}

impl fmt::Display for RingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidCapacity(slots) => {
                write!(f, "ring capacity {slots} is not a power of two >= 2")
            }
            Self::AllocFailed(slots) => write!(f, "failed to allocate ring with {slots} slots"),
        }
    }
}

impl std::error::Error for RingError {}
