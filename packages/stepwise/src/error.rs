use std::error::Error as StdError;
use std::{io, result};

use thiserror::Error;

/// Errors that can occur when reporting, reading or scheduling metrics.
///
/// Configuration problems are raised when a component is built or registered, value problems
/// are raised by the call that encountered the offending value and resource problems are raised
/// by the backend that owns the resource (typically from `close()`).
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// A measurement was registered with an interval that is not a positive integer.
    #[error("measurement '{name}' has interval {interval} but the interval must be greater than zero")]
    InvalidInterval {
        /// Name of the rejected measurement.
        name: String,

        /// The interval that was supplied.
        interval: i64,
    },

    /// A closure-backed component was built without any of the closures it needs to operate.
    #[error("{component} requires at least one of {required}")]
    MissingDelegate {
        /// The type of component that could not be built.
        component: &'static str,

        /// Human-readable list of the closures that would satisfy the requirement.
        required: &'static str,
    },

    /// A measurement was requested by name but no measurement with that name is registered.
    #[error("no measurement named '{name}' is registered")]
    UnknownMeasurement {
        /// The requested name.
        name: String,
    },

    /// Two different nested paths collapsed into the same flattened key.
    #[error("flattening produced the key '{key}' from more than one path")]
    KeyCollision {
        /// The flattened key that was produced more than once.
        key: String,
    },

    /// A value could not be accepted by the component it was passed to.
    #[error("invalid metric value '{value}': {problem}")]
    InvalidValue {
        /// String form of the offending value.
        value: String,

        /// A human-readable description of the problem.
        problem: String,
    },

    /// A measurement function asked for a state entry that neither the static nor the
    /// dynamic state contains.
    #[error("state entry '{key}' is not present in the static or dynamic state")]
    MissingState {
        /// The state entry that was requested.
        key: String,
    },

    /// An I/O operation performed by a backend failed.
    #[error(transparent)]
    Io(#[from] io::Error),

    /// A backend-specific failure, for adapters that have their own error types.
    #[error(transparent)]
    Backend(Box<dyn StdError + Send + Sync>),
}

impl Error {
    /// Wraps an arbitrary backend error.
    ///
    /// Adapters that persist metrics into external systems use this to surface their own
    /// error types through the [`Reporter`][crate::Reporter] and [`Reader`][crate::Reader] traits.
    pub fn backend(error: impl Into<Box<dyn StdError + Send + Sync>>) -> Self {
        Self::Backend(error.into())
    }
}

/// A specialized `Result` type for metric operations, returning the crate's
/// [`Error`] type as the error value.
pub type Result<T> = result::Result<T, Error>;
