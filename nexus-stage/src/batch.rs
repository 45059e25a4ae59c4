//! Ordered batches of packets passed between stages.

use std::fmt;

use crate::MAX_BURST;
use crate::packet::Packet;

/// An ordered batch of at most [`MAX_BURST`] packets.
///
/// Dropping a batch releases every packet still in it.
pub struct Batch<P> {
    packets: Vec<P>,
}

impl<P> Batch<P> {
    /// Creates an empty batch with room for [`MAX_BURST`] packets.
    pub fn new() -> Self {
        Self {
            packets: Vec::with_capacity(MAX_BURST),
        }
    }

    /// Appends a packet.
    ///
    /// # Errors
    ///
    /// Hands the packet back if the batch already holds [`MAX_BURST`].
    #[inline]
    pub fn push(&mut self, packet: P) -> Result<(), P> {
        if self.is_full() {
            return Err(packet);
        }
        self.packets.push(packet);
        Ok(())
    }

    /// Returns the number of packets.
    #[inline]
    pub fn len(&self) -> usize {
        self.packets.len()
    }

    /// Returns `true` if the batch holds no packets.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.packets.is_empty()
    }

    /// Returns `true` if the batch holds [`MAX_BURST`] packets.
    #[inline]
    pub fn is_full(&self) -> bool {
        self.packets.len() >= MAX_BURST
    }

    /// Returns the packets in order.
    #[inline]
    pub fn as_slice(&self) -> &[P] {
        &self.packets
    }

    /// Iterates over the packets in order.
    #[inline]
    pub fn iter(&self) -> std::slice::Iter<'_, P> {
        self.packets.iter()
    }

    /// Consumes the batch, returning its packets.
    pub fn into_vec(self) -> Vec<P> {
        self.packets
    }

    #[inline]
    pub(crate) const fn packets_mut(&mut self) -> &mut Vec<P> {
        &mut self.packets
    }
}

impl<P: Packet> Batch<P> {
    /// Sum of [`Packet::total_len`] over the batch.
    pub fn total_bytes(&self) -> u64 {
        self.packets.iter().map(|p| p.total_len() as u64).sum()
    }
}

impl<P> Default for Batch<P> {
    fn default() -> Self {
        Self::new()
    }
}

impl<P> TryFrom<Vec<P>> for Batch<P> {
    type Error = Vec<P>;

    /// Wraps `packets`, handing them back if there are more than
    /// [`MAX_BURST`].
    fn try_from(packets: Vec<P>) -> Result<Self, Self::Error> {
        if packets.len() > MAX_BURST {
            return Err(packets);
        }
        Ok(Self { packets })
    }
}

impl<P> IntoIterator for Batch<P> {
    type Item = P;
    type IntoIter = std::vec::IntoIter<P>;

    fn into_iter(self) -> Self::IntoIter {
        self.packets.into_iter()
    }
}

impl<'a, P> IntoIterator for &'a Batch<P> {
    type Item = &'a P;
    type IntoIter = std::slice::Iter<'a, P>;

    fn into_iter(self) -> Self::IntoIter {
        self.packets.iter()
    }
}

impl<P> fmt::Debug for Batch<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Batch")
            .field("len", &self.len())
            .finish_non_exhaustive()
    }
}
