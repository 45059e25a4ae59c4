//! Explicit registry of stage classes.
//!
//! Classes are registered once at startup and looked up by name when the
//! pipeline is built.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use serde_json::Value;

use crate::error::StageError;
use crate::packet::Packet;
use crate::queue::QueueStage;
use crate::stage::{Stage, StageContext};

/// Builds a stage instance from its arguments.
pub type StageFactory<P> =
    fn(&mut StageContext<'_, P>, &Value) -> Result<Arc<dyn Stage<P>>, StageError>;

/// A named kind of stage.
pub struct StageClass<P> {
    /// Name the class is registered under.
    pub name: &'static str,
    /// One-line description.
    pub help: &'static str,
    /// Constructor.
    pub factory: StageFactory<P>,
}

impl<P> Clone for StageClass<P> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<P> Copy for StageClass<P> {}

impl<P> fmt::Debug for StageClass<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StageClass")
            .field("name", &self.name)
            .field("help", &self.help)
            .finish_non_exhaustive()
    }
}

/// Maps class names to factories.
pub struct StageRegistry<P> {
    classes: HashMap<&'static str, StageClass<P>>,
}

impl<P> StageRegistry<P> {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self {
            classes: HashMap::new(),
        }
    }

    /// Adds a class.
    ///
    /// # Errors
    ///
    /// Returns [`StageError::DuplicateClass`] if the name is taken.
    pub fn register(&mut self, class: StageClass<P>) -> Result<(), StageError> {
        if self.classes.contains_key(class.name) {
            return Err(StageError::DuplicateClass(class.name));
        }
        self.classes.insert(class.name, class);
        Ok(())
    }

    /// Looks up a class by name.
    pub fn get(&self, name: &str) -> Option<&StageClass<P>> {
        self.classes.get(name)
    }

    /// Builds a stage of class `name`.
    ///
    /// # Errors
    ///
    /// Returns [`StageError::UnknownClass`] if nothing is registered under
    /// `name`, otherwise whatever the factory returns.
    pub fn create(
        &self,
        name: &str,
        ctx: &mut StageContext<'_, P>,
        args: &Value,
    ) -> Result<Arc<dyn Stage<P>>, StageError> {
        let class = self
            .get(name)
            .ok_or_else(|| StageError::UnknownClass(name.to_owned()))?;
        (class.factory)(ctx, args)
    }

    /// Returns the registered class names, sorted.
    pub fn class_names(&self) -> Vec<&'static str> {
        let mut names: Vec<_> = self.classes.keys().copied().collect();
        names.sort_unstable();
        names
    }
}

impl<P: Packet> StageRegistry<P> {
    /// Creates a registry holding every class this crate provides.
    pub fn with_builtin_classes() -> Self {
        let mut registry = Self::new();
        let queue = QueueStage::<P>::class();
        registry.classes.insert(queue.name, queue);
        registry
    }
}

impl<P> Default for StageRegistry<P> {
    fn default() -> Self {
        Self::new()
    }
}

impl<P> fmt::Debug for StageRegistry<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StageRegistry")
            .field("classes", &self.class_names())
            .finish()
    }
}
