//! The interfaces stages expose to the pipeline.

use std::fmt;
use std::sync::Arc;

use serde_json::Value;

use crate::batch::Batch;
use crate::error::StageError;
use crate::task::Scheduler;

/// Anything that accepts batches from an upstream stage.
///
/// Implementations take ownership of every packet in the batch.
pub trait Sink<P>: Send + Sync {
    /// Accepts a batch. Never blocks and never reports failure; packets
    /// that cannot be kept are released.
    fn process_batch(&self, batch: Batch<P>);
}

/// A pipeline stage instance.
pub trait Stage<P>: Sink<P> {
    /// Name of the class this stage was created from.
    fn class_name(&self) -> &'static str;

    /// Short human-readable status line.
    fn describe(&self) -> String;

    /// Runs a named control command.
    ///
    /// # Errors
    ///
    /// [`StageError::UnknownCommand`] for names the stage does not know,
    /// otherwise whatever the command itself rejects.
    fn command(&self, name: &str, arg: &Value) -> Result<(), StageError>;
}

/// What a stage factory gets to work with besides its arguments.
pub struct StageContext<'a, P> {
    /// Scheduler that task-owning stages register with.
    pub scheduler: &'a mut Scheduler,
    /// Where the new stage forwards its output, if anywhere.
    pub downstream: Option<Arc<dyn Sink<P>>>,
}

impl<'a, P> StageContext<'a, P> {
    /// Creates a context with no downstream.
    pub const fn new(scheduler: &'a mut Scheduler) -> Self {
        Self {
            scheduler,
            downstream: None,
        }
    }

    /// Sets the downstream sink.
    #[must_use]
    pub fn with_downstream(mut self, downstream: Arc<dyn Sink<P>>) -> Self {
        self.downstream = Some(downstream);
        self
    }
}

impl<P> fmt::Debug for StageContext<'_, P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StageContext")
            .field("scheduler", &self.scheduler)
            .field("downstream", &self.downstream.is_some())
            .finish()
    }
}
