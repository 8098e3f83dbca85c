//! Subscriber types for the reactive system.
//!
//! A subscriber is any effect that can be notified when a location it read
//! changes. The runtime only ever sees subscribers through the type-erased
//! [`Subscriber`] trait, which lets effects with different return types
//! share one registry.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::graph::{PropKey, TargetId};

/// Unique identifier for an effect.
///
/// Each effect (plain, computed or watcher) gets a unique ID when created.
/// The dependency graph stores these IDs rather than the effects themselves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EffectId(u64);

impl EffectId {
    /// Generate a new unique effect ID.
    ///
    /// Uses an atomic counter so IDs stay unique across runtimes.
    pub fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

impl Default for EffectId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for EffectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "effect#{}", self.0)
    }
}

/// An effect as seen by the runtime.
pub(crate) trait Subscriber {
    /// Get the subscriber's ID.
    fn id(&self) -> EffectId;

    /// React to a dependency change: invoke the scheduler if there is one,
    /// otherwise re-run.
    fn notify(&self);

    /// Remember that this subscriber joined the set of `(target, key)`.
    fn record_dependency(&self, target: TargetId, key: PropKey);

    /// Leave every set this subscriber joined.
    fn stop(&self);
}
