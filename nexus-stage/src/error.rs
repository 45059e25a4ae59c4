//! Error types for stage construction and control commands.

use nexus_ring::RingError;
use thiserror::Error;

const ENOENT: i32 = 2;
const ENOMEM: i32 = 12;
const EEXIST: i32 = 17;
const EINVAL: i32 = 22;

/// Error returned by stage constructors, commands, and the registry.
///
/// Every variant is raised before any state is mutated, so a failed call
/// never needs rolling back.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StageError {
    /// An argument was out of range or of the wrong type.
    #[error("{0}")]
    InvalidArgument(String),
    /// Memory or a scheduler slot could not be obtained.
    #[error("{0}")]
    ResourceExhausted(String),
    /// The stage does not recognize the command.
    #[error("unknown command `{command}` for class `{class}`")]
    UnknownCommand {
        /// Class of the stage that received the command.
        class: &'static str,
        /// The command name as given.
        command: String,
    },
    /// No stage class is registered under this name.
    #[error("unknown stage class `{0}`")]
    UnknownClass(String),
    /// A stage class with this name is already registered.
    #[error("stage class `{0}` is already registered")]
    DuplicateClass(&'static str),
}

impl StageError {
    pub(crate) fn invalid(msg: impl Into<String>) -> Self {
        Self::InvalidArgument(msg.into())
    }

    /// Returns the errno-style code reported on the control channel.
    pub const fn code(&self) -> i32 {
        match self {
            Self::InvalidArgument(_) => EINVAL,
            Self::ResourceExhausted(_) => ENOMEM,
            Self::UnknownCommand { .. } | Self::UnknownClass(_) => ENOENT,
            Self::DuplicateClass(_) => EEXIST,
        }
    }

    /// Returns `true` if this error is the `InvalidArgument` variant.
    pub const fn is_invalid_argument(&self) -> bool {
        matches!(self, Self::InvalidArgument(_))
    }

    /// Returns `true` if this error is the `ResourceExhausted` variant.
    pub const fn is_resource_exhausted(&self) -> bool {
        matches!(self, Self::ResourceExhausted(_))
    }
}

impl From<RingError> for StageError {
    fn from(err: RingError) -> Self {
        match err {
            RingError::InvalidCapacity(_) => Self::InvalidArgument(err.to_string()),
            RingError::AllocFailed(_) => Self::ResourceExhausted(err.to_string()),
        }
    }
}
