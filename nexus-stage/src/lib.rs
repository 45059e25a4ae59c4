//! # nexus-stage
//!
//! Packet pipeline stages built on [`nexus_ring`].
//!
//! The crate provides the `queue` stage: it terminates the upstream task,
//! buffers packets in a bounded MPSC ring, and forwards them downstream
//! from a task of its own. Around it sit the pieces a pipeline needs to
//! host it:
//!
//! - [`Batch`] and the [`Packet`] trait for what flows between stages
//! - [`Sink`] and [`Stage`] for how stages connect and are controlled
//! - [`Scheduler`] and [`Task`] for cooperative, pull-based execution
//! - [`StageRegistry`] for creating stages by class name
//!
//! ## Example
//!
//! ```
//! use nexus_stage::{Batch, Scheduler, Sink, Stage, StageContext, StageRegistry};
//! use serde_json::json;
//!
//! let registry = StageRegistry::<Vec<u8>>::with_builtin_classes();
//! let mut scheduler = Scheduler::new();
//!
//! let queue = {
//!     let mut ctx = StageContext::new(&mut scheduler);
//!     registry.create("queue", &mut ctx, &json!({"size": 16})).unwrap()
//! };
//!
//! let batch = Batch::try_from(vec![vec![0u8; 100]; 3]).unwrap();
//! queue.process_batch(batch);
//! assert_eq!(queue.describe(), "3/16");
//!
//! let round = scheduler.run_once();
//! assert_eq!(round.packets, 3);
//! assert_eq!(round.bits, 2976);
//! assert_eq!(queue.describe(), "0/16");
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![allow(clippy::module_name_repetitions)]

mod batch;
mod error;
mod packet;
pub mod queue;
mod registry;
mod stage;
mod task;

/// Largest number of packets in one [`Batch`].
pub const MAX_BURST: usize = 32;

pub use batch::Batch;
pub use error::StageError;
pub use packet::{Packet, prefetch};
pub use queue::{
    DEFAULT_QUEUE_SIZE, MAX_QUEUE_SIZE, MIN_QUEUE_SIZE, QueueCommand, QueueConfig, QueueStage,
    QueueStats, validate_burst, validate_size,
};
pub use registry::{StageClass, StageFactory, StageRegistry};
pub use stage::{Sink, Stage, StageContext};
pub use task::{DEFAULT_MAX_TASKS, PKT_OVERHEAD, Scheduler, Task, TaskId, TaskResult};
