//! Error types for collections, configuration and the entity loop.

use thiserror::Error;

/// Errors raised by [`EntityCollection`](crate::EntityCollection).
///
/// Benign outcomes (adding a duplicate, removing an absent value, clearing
/// an empty collection) are reported through `bool` returns and never
/// surface here.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CollectionError {
    /// Requested capacity is larger than the largest supported table.
    #[error("requested capacity {requested} exceeds the maximum of {max}")]
    CapacityOverflow {
        /// Capacity that was asked for.
        requested: usize,
        /// Largest capacity a table may have.
        max: usize,
    },

    /// `copy_to` was given a start index past the end of the destination.
    #[error("start index {index} is out of range for a destination of length {len}")]
    IndexOutOfRange {
        /// Start index passed by the caller.
        index: usize,
        /// Length of the destination slice.
        len: usize,
    },

    /// `copy_to` destination cannot hold every element from `index` on.
    #[error("destination too small: need {required} slots from index {index}, have {available}")]
    DestinationTooSmall {
        /// Number of elements to copy.
        required: usize,
        /// Start index passed by the caller.
        index: usize,
        /// Slots available from `index` to the end of the destination.
        available: usize,
    },
}

/// Errors raised while loading or validating a [`RuntimeConfig`](crate::RuntimeConfig).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// The TOML document could not be parsed into the config structs.
    #[error("failed to parse config: {0}")]
    Parse(String),

    /// A field holds a value outside its allowed range.
    #[error("invalid config field `{field}`: {reason}")]
    Invalid {
        /// Dotted path of the offending field.
        field: &'static str,
        /// Human-readable description of the constraint.
        reason: String,
    },
}

impl From<toml::de::Error> for ConfigError {
    fn from(err: toml::de::Error) -> Self {
        ConfigError::Parse(err.message().to_string())
    }
}

/// Errors raised by [`EntityLoop`](crate::EntityLoop).
#[derive(Error, Debug, Clone, PartialEq)]
pub enum LoopError {
    /// A frame delta was negative, NaN or infinite.
    #[error("invalid frame delta: {0}")]
    InvalidDelta(f32),
}
