//! Error types for the discovery engine.
//!
//! Only errors that are surfaced synchronously to the caller live in `DiscoveryError`. Failures during the
//! background enumeration never travel back to the caller: per-type failures are reported as diagnostics and
//! the run still completes.

use miette::Diagnostic;
use thiserror::Error;

use testscan_core::SerializationError;

/// Errors surfaced by the public discoverer API.
#[derive(Debug, Error, Diagnostic)]
pub enum DiscoveryError {
    #[error("invalid argument `{name}`: {reason}")]
    #[diagnostic(code(testscan::invalid_argument))]
    InvalidArgument { name: &'static str, reason: &'static str },

    #[error("the discoverer has already been disposed")]
    #[diagnostic(
        code(testscan::already_disposed),
        help("create a new discoverer; a disposed one cannot be reused")
    )]
    AlreadyDisposed,

    #[error("no async runtime is available to schedule discovery on")]
    #[diagnostic(
        code(testscan::no_runtime),
        help("call from within a tokio runtime or pass a handle with `DiscovererBuilder::runtime`")
    )]
    NoRuntime,

    #[error(transparent)]
    #[diagnostic(code(testscan::serialization))]
    Serialization(#[from] SerializationError),
}

impl DiscoveryError {
    pub(crate) fn empty(name: &'static str) -> Self {
        Self::InvalidArgument {
            name,
            reason: "must not be empty",
        }
    }
}

pub type DiscoveryResult<T> = Result<T, DiscoveryError>;

/// A failure raised while a strategy discovers tests for one type.
///
/// The engine contains these: they become diagnostic messages and enumeration moves on to the next type.
#[derive(Debug, Error)]
pub enum StrategyError {
    #[error("malformed attribute `{attribute}` on {member}: {reason}")]
    MalformedAttribute {
        attribute: String,
        member: String,
        reason: String,
    },

    #[error("{0}")]
    Other(String),
}

impl StrategyError {
    pub fn other(message: impl Into<String>) -> Self {
        Self::Other(message.into())
    }
}

/// A failure while releasing a tracked resource. Contained by the disposal tracker.
#[derive(Debug, Error)]
#[error("failed to release `{resource}`: {reason}")]
pub struct DisposeError {
    pub resource: String,
    pub reason: String,
}

impl DisposeError {
    pub fn new(resource: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            resource: resource.into(),
            reason: reason.into(),
        }
    }
}
