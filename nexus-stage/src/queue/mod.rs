//! Queue stage: ends the upstream task and hands packets to a new one.
//!
//! Upstream stages push batches in from any thread through
//! [`Sink::process_batch`]. The stage owns a [`Task`] that the scheduler
//! runs on every round, moving up to `burst` packets downstream.
//!
//! ```text
//!  producer ─┐
//!  producer ─┼─► enqueue ──► Ring ──► run_task ──► downstream
//!  producer ─┘   (drop-tail)          (≤ burst)
//! ```
//!
//! # Overload
//!
//! Packets that do not fit are released on the spot. Producers never wait
//! and get no signal; the drop is only counted in [`QueueStats`].
//!
//! # Resizing
//!
//! `set_size` builds a new ring, then migrates queued packets in FIFO
//! order behind the exclusive side of a [`ShardedLock`]. Enqueue and the
//! consumption step hold the shared side, so the old ring is quiescent for
//! the whole migration. When shrinking, the oldest excess packets are
//! released and the newest are kept. The consumption step only *tries* the
//! lock, so a resize in progress shows up as an idle round rather than a
//! stall.

mod config;

use std::fmt;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, PoisonError, TryLockError};

use crossbeam_utils::sync::{ShardedLock, ShardedLockReadGuard};
use nexus_ring::Ring;
use serde_json::Value;
use tracing::{debug, info};

use crate::MAX_BURST;
use crate::batch::Batch;
use crate::error::StageError;
use crate::packet::{Packet, prefetch};
use crate::registry::StageClass;
use crate::stage::{Sink, Stage, StageContext};
use crate::task::{Task, TaskResult};

pub use config::{
    DEFAULT_QUEUE_SIZE, MAX_QUEUE_SIZE, MIN_QUEUE_SIZE, QueueCommand, QueueConfig,
    validate_burst, validate_size,
};

/// Registry name of the queue class.
pub const CLASS_NAME: &str = "queue";

const HELP: &str = "terminates current task and enqueue packets for new task";

/// Drop counters of a queue stage.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueueStats {
    /// Packets released because the ring was full on enqueue.
    pub overload_drops: u64,
    /// Packets released because a resize shrank the ring below occupancy.
    pub resize_drops: u64,
}

impl QueueStats {
    /// Sum of every drop counter.
    pub const fn total_drops(&self) -> u64 {
        self.overload_drops + self.resize_drops
    }
}

/// Bounded MPSC packet queue stage.
pub struct QueueStage<P> {
    ring: ShardedLock<Ring<P>>,
    burst: AtomicUsize,
    prefetch: bool,
    downstream: Option<Arc<dyn Sink<P>>>,

    overload_drops: AtomicU64,
    resize_drops: AtomicU64,
}

impl<P: Packet> QueueStage<P> {
    /// Registry name of this class.
    pub const CLASS_NAME: &'static str = CLASS_NAME;

    /// Returns the registry entry for this class.
    pub fn class() -> StageClass<P> {
        StageClass {
            name: CLASS_NAME,
            help: HELP,
            factory: Self::create,
        }
    }

    fn create(ctx: &mut StageContext<'_, P>, args: &Value) -> Result<Arc<dyn Stage<P>>, StageError> {
        let config = QueueConfig::from_value(args)?;
        let stage = Arc::new(Self::new(&config, ctx.downstream.clone())?);
        ctx.scheduler.register(Arc::clone(&stage) as Arc<dyn Task>)?;
        Ok(stage)
    }

    /// Builds a queue from `config`, forwarding to `downstream`.
    ///
    /// With no downstream, dequeued packets are released.
    ///
    /// # Errors
    ///
    /// [`StageError::InvalidArgument`] if `burst` or `size` fail the same
    /// checks as `set_burst` and `set_size`; [`StageError::ResourceExhausted`]
    /// if the ring cannot be allocated.
    pub fn new(
        config: &QueueConfig,
        downstream: Option<Arc<dyn Sink<P>>>,
    ) -> Result<Self, StageError> {
        let burst = config.burst.map_or(Ok(MAX_BURST), validate_burst)?;
        let slots = config
            .size
            .map_or(Ok(DEFAULT_QUEUE_SIZE), validate_size)?;
        let ring = Ring::with_capacity(slots)?;

        info!(
            capacity = slots,
            burst,
            prefetch = config.prefetch,
            "queue created"
        );

        Ok(Self {
            ring: ShardedLock::new(ring),
            burst: AtomicUsize::new(burst),
            prefetch: config.prefetch,
            downstream,
            overload_drops: AtomicU64::new(0),
            resize_drops: AtomicU64::new(0),
        })
    }

    /// Returns the current burst limit.
    pub fn burst(&self) -> usize {
        self.burst.load(Ordering::Relaxed)
    }

    /// Returns `true` if payload prefetch is on.
    pub const fn prefetch(&self) -> bool {
        self.prefetch
    }

    /// Returns the ring capacity.
    pub fn capacity(&self) -> usize {
        self.read_ring().capacity()
    }

    /// Returns the number of queued packets.
    pub fn len(&self) -> usize {
        self.read_ring().len()
    }

    /// Returns `true` if nothing is queued.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns the drop counters.
    pub fn stats(&self) -> QueueStats {
        QueueStats {
            overload_drops: self.overload_drops.load(Ordering::Relaxed),
            resize_drops: self.resize_drops.load(Ordering::Relaxed),
        }
    }

    /// Sets the burst limit. Queued packets are unaffected.
    ///
    /// # Errors
    ///
    /// [`StageError::InvalidArgument`] unless `1 <= burst <= MAX_BURST`.
    pub fn set_burst(&self, burst: u64) -> Result<(), StageError> {
        let burst = validate_burst(burst)?;
        self.burst.store(burst, Ordering::Relaxed);
        Ok(())
    }

    /// Validates `size`, then resizes the ring to it.
    ///
    /// # Errors
    ///
    /// [`StageError::InvalidArgument`] unless `size` is a power of two in
    /// `[MIN_QUEUE_SIZE, MAX_QUEUE_SIZE]`; otherwise whatever
    /// [`resize`](Self::resize) returns.
    pub fn set_size(&self, size: u64) -> Result<(), StageError> {
        let slots = validate_size(size)?;
        self.resize(slots)
    }

    /// Replaces the ring with one of `slots` slots, migrating queued
    /// packets in FIFO order.
    ///
    /// If more packets are queued than fit, the oldest excess is released
    /// and counted in [`QueueStats::resize_drops`].
    ///
    /// # Errors
    ///
    /// [`StageError::InvalidArgument`] for a bad size and
    /// [`StageError::ResourceExhausted`] if the new ring cannot be
    /// allocated. Either way the current ring is left untouched.
    pub fn resize(&self, slots: usize) -> Result<(), StageError> {
        let slots = validate_size(slots as u64)?;

        // Allocate before taking the barrier: failure must not touch the old ring
        let next = Ring::with_capacity(slots)?;

        let mut current = self.ring.write().unwrap_or_else(PoisonError::into_inner);
        let old_capacity = current.capacity();
        let excess = current.len().saturating_sub(slots);

        let mut queued = current.drain();
        queued.by_ref().take(excess).for_each(drop);

        let mut dropped = excess;
        for packet in queued {
            if next.try_push(packet).is_err() {
                dropped += 1;
            }
        }
        let migrated = next.len();

        let old = std::mem::replace(&mut *current, next);
        drop(current);
        drop(old);

        self.resize_drops
            .fetch_add(dropped as u64, Ordering::Relaxed);

        info!(
            from = old_capacity,
            to = slots,
            migrated,
            dropped,
            "queue resized"
        );
        Ok(())
    }

    /// Pushes a batch into the ring; whatever does not fit is released.
    pub fn enqueue(&self, mut batch: Batch<P>) {
        let packets = batch.packets_mut();
        self.read_ring().enqueue_burst(packets);

        if !packets.is_empty() {
            self.overload_drops
                .fetch_add(packets.len() as u64, Ordering::Relaxed);
            packets.clear();
        }
    }

    /// One consumption step: moves up to `burst` packets downstream.
    ///
    /// Never blocks. Returns [`TaskResult::idle`] if the ring is empty,
    /// another consumer is active, or a resize holds the ring.
    pub fn consume(&self) -> TaskResult {
        // Single snapshot; a concurrent set_burst applies from the next step
        let burst = self.burst.load(Ordering::Relaxed);

        let ring = match self.ring.try_read() {
            Ok(ring) => ring,
            Err(TryLockError::Poisoned(poisoned)) => poisoned.into_inner(),
            Err(TryLockError::WouldBlock) => return TaskResult::idle(),
        };
        if ring.is_empty() {
            return TaskResult::idle();
        }
        let Some(mut consumer) = ring.consumer() else {
            return TaskResult::idle();
        };

        // Fresh per step: the batch is handed off to the downstream stage
        let mut batch = Batch::new();
        let count = consumer.dequeue_burst(batch.packets_mut(), burst);
        drop(consumer);
        drop(ring);

        if count == 0 {
            return TaskResult::idle();
        }

        // Bytes are summed before the handoff: forwarding moves the packets
        let total_bytes = if self.prefetch {
            batch
                .iter()
                .map(|p| {
                    prefetch(p.head_data());
                    p.total_len() as u64
                })
                .sum()
        } else {
            batch.total_bytes()
        };

        if let Some(downstream) = &self.downstream {
            downstream.process_batch(batch);
        }

        TaskResult::from_burst(count as u64, total_bytes)
    }

    /// Utilization as `"<queued>/<capacity>"`.
    pub fn describe(&self) -> String {
        let ring = self.read_ring();
        format!("{}/{}", ring.len(), ring.capacity())
    }

    /// Applies a parsed command.
    ///
    /// # Errors
    ///
    /// Whatever [`set_burst`](Self::set_burst) or
    /// [`set_size`](Self::set_size) return.
    pub fn apply(&self, command: QueueCommand) -> Result<(), StageError> {
        match command {
            QueueCommand::SetBurst(burst) => self.set_burst(burst),
            QueueCommand::SetSize(size) => self.set_size(size),
        }
    }

    fn read_ring(&self) -> ShardedLockReadGuard<'_, Ring<P>> {
        self.ring.read().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<P: Packet> Sink<P> for QueueStage<P> {
    fn process_batch(&self, batch: Batch<P>) {
        self.enqueue(batch);
    }
}

impl<P: Packet> Task for QueueStage<P> {
    fn run_task(&self) -> TaskResult {
        self.consume()
    }
}

impl<P: Packet> Stage<P> for QueueStage<P> {
    fn class_name(&self) -> &'static str {
        CLASS_NAME
    }

    fn describe(&self) -> String {
        Self::describe(self)
    }

    fn command(&self, name: &str, arg: &Value) -> Result<(), StageError> {
        let result = QueueCommand::parse(name, arg).and_then(|command| self.apply(command));
        if let Err(err) = &result {
            debug!(command = name, %err, "queue command rejected");
        }
        result
    }
}

impl<P> Drop for QueueStage<P> {
    fn drop(&mut self) {
        let ring = self
            .ring
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner);
        let released = ring.drain().count();
        debug!(released, "queue drained");
    }
}

impl<P> fmt::Debug for QueueStage<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let ring = self.ring.read().unwrap_or_else(PoisonError::into_inner);
        f.debug_struct("QueueStage")
            .field("len", &ring.len())
            .field("capacity", &ring.capacity())
            .field("burst", &self.burst.load(Ordering::Relaxed))
            .field("prefetch", &self.prefetch)
            .finish_non_exhaustive()
    }
}
