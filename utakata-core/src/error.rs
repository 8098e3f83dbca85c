//! Error types for the reactive core.
//!
//! Almost nothing in the core fails in a way the caller must handle. Usage
//! errors (observing a primitive, writing an unsupported key, an unknown
//! flush mode) are logged and turned into no-ops by the convenience APIs;
//! the `try_*` variants surface them as [`ReactiveError`] instead.

use crate::value::ContainerKind;

/// Errors reported by the reactive core.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ReactiveError {
    /// Only containers can be observed.
    #[error("cannot observe a {kind} value; expected an object, array, map or set")]
    NotAnObject {
        /// Kind of the rejected value
        kind: &'static str,
    },

    /// A watcher flush mode that is neither `sync` nor `async`.
    #[error("unrecognized flush mode `{0}`; expected one of: sync, async")]
    InvalidFlush(String),

    /// The key cannot be written on this kind of container.
    #[error("key `{key}` cannot be written on a {kind}")]
    InvalidKey {
        /// Container kind the write was attempted on
        kind: ContainerKind,
        /// Display form of the rejected key
        key: String,
    },

    /// The value graph refers back to itself and has no tree representation.
    #[error("value graph contains a cycle")]
    CyclicValue,
}

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, ReactiveError>;
