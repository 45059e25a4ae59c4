//! Queue construction config, control commands, and their validation.

use serde::de::{self, Deserializer};
use serde::Deserialize;
use serde_json::Value;

use crate::MAX_BURST;
use crate::error::StageError;

/// Ring size used when the config does not name one.
pub const DEFAULT_QUEUE_SIZE: usize = 1024;
/// Smallest accepted ring size.
pub const MIN_QUEUE_SIZE: usize = 4;
/// Largest accepted ring size.
pub const MAX_QUEUE_SIZE: usize = 16384;

/// Construction arguments of a queue stage.
///
/// Every field is optional. Unrecognized fields are ignored. Negative
/// `burst` or `size` values parse as 0 and fail validation when the queue
/// is built. `prefetch` takes a boolean or an integer, non-zero meaning on.
///
/// ```
/// use nexus_stage::QueueConfig;
/// use serde_json::json;
///
/// let config = QueueConfig::from_value(&json!({"size": 256, "prefetch": true})).unwrap();
/// assert_eq!(config.size, Some(256));
/// assert_eq!(config.burst, None);
/// assert!(config.prefetch);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct QueueConfig {
    /// Initial burst limit, validated like `set_burst`.
    #[serde(deserialize_with = "integer_field")]
    pub burst: Option<u64>,
    /// Initial ring size, validated like `set_size`.
    #[serde(deserialize_with = "integer_field")]
    pub size: Option<u64>,
    /// Prefetch payloads in the consumption step.
    #[serde(deserialize_with = "truthy_field")]
    pub prefetch: bool,
}

impl QueueConfig {
    /// Parses a config object. `null` means all defaults.
    ///
    /// # Errors
    ///
    /// Returns [`StageError::InvalidArgument`] if a field has the wrong type
    /// or `value` is not an object.
    pub fn from_value(value: &Value) -> Result<Self, StageError> {
        if value.is_null() {
            return Ok(Self::default());
        }
        if !value.is_object() {
            return Err(StageError::invalid("queue config must be an object"));
        }
        Self::deserialize(value)
            .map_err(|err| StageError::invalid(format!("invalid queue config: {err}")))
    }

    /// Sets the initial burst limit.
    #[must_use]
    pub const fn with_burst(mut self, burst: u64) -> Self {
        self.burst = Some(burst);
        self
    }

    /// Sets the initial ring size.
    #[must_use]
    pub const fn with_size(mut self, size: u64) -> Self {
        self.size = Some(size);
        self
    }

    /// Enables or disables payload prefetch.
    #[must_use]
    pub const fn with_prefetch(mut self, prefetch: bool) -> Self {
        self.prefetch = prefetch;
        self
    }
}

/// A control command understood by the queue stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueCommand {
    /// `set_burst`: change the per-step dequeue limit.
    SetBurst(u64),
    /// `set_size`: resize the ring, migrating queued packets.
    SetSize(u64),
}

impl QueueCommand {
    /// Command names, in dispatch order.
    pub const NAMES: [&'static str; 2] = ["set_burst", "set_size"];

    /// Checks the argument type for command `name`.
    ///
    /// Only the type is checked here; ranges are checked when the command
    /// is applied.
    ///
    /// # Errors
    ///
    /// [`StageError::InvalidArgument`] for a non-integer argument,
    /// [`StageError::UnknownCommand`] for any other name.
    pub fn parse(name: &str, arg: &Value) -> Result<Self, StageError> {
        match name {
            "set_burst" => integer_arg(arg, "burst must be an integer").map(Self::SetBurst),
            "set_size" => integer_arg(arg, "argument must be an integer").map(Self::SetSize),
            _ => Err(StageError::UnknownCommand {
                class: super::CLASS_NAME,
                command: name.to_owned(),
            }),
        }
    }
}

// Negative integers map to 0 so they fail the range check, not the type check
fn clamped_integer(arg: &Value) -> Option<u64> {
    arg.as_u64().or_else(|| arg.as_i64().map(|_| 0))
}

fn integer_arg(arg: &Value, type_msg: &str) -> Result<u64, StageError> {
    clamped_integer(arg).ok_or_else(|| StageError::invalid(type_msg))
}

fn integer_field<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<u64>, D::Error> {
    Option::<Value>::deserialize(deserializer)?
        .map(|value| {
            clamped_integer(&value)
                .ok_or_else(|| de::Error::custom(format!("expected an integer, got {value}")))
        })
        .transpose()
}

fn truthy_field<'de, D: Deserializer<'de>>(deserializer: D) -> Result<bool, D::Error> {
    match Value::deserialize(deserializer)? {
        Value::Null => Ok(false),
        Value::Bool(flag) => Ok(flag),
        Value::Number(n) if n.is_i64() || n.is_u64() => Ok(n.as_i64() != Some(0)),
        other => Err(de::Error::custom(format!(
            "expected a boolean or an integer, got {other}"
        ))),
    }
}

/// Checks a burst limit against `[1, MAX_BURST]`.
///
/// # Errors
///
/// [`StageError::InvalidArgument`] when out of range.
pub fn validate_burst(burst: u64) -> Result<usize, StageError> {
    match usize::try_from(burst) {
        Ok(burst @ 1..=MAX_BURST) => Ok(burst),
        _ => Err(StageError::invalid(format!(
            "burst size must be [1,{MAX_BURST}]"
        ))),
    }
}

/// Checks a ring size: within `[MIN_QUEUE_SIZE, MAX_QUEUE_SIZE]` and a
/// power of two.
///
/// # Errors
///
/// [`StageError::InvalidArgument`] naming whichever check failed.
pub fn validate_size(size: u64) -> Result<usize, StageError> {
    let size = match usize::try_from(size) {
        Ok(size @ MIN_QUEUE_SIZE..=MAX_QUEUE_SIZE) => size,
        _ => {
            return Err(StageError::invalid(format!(
                "must be in [{MIN_QUEUE_SIZE}, {MAX_QUEUE_SIZE}]"
            )));
        }
    };

    if size & (size - 1) != 0 {
        return Err(StageError::invalid("must be a power of 2"));
    }
    Ok(size)
}
