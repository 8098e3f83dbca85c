//! Observed containers.
//!
//! [`Observed`] is the interception layer for dynamic values: every read goes
//! through [`Runtime::track`] and every write that changes something goes
//! through [`Runtime::trigger`]. Adding or removing entries also triggers
//! [`PropKey::Length`], which is what enumerations track.

use std::fmt;

use tracing::warn;

use super::{Container, ContainerKind, SameValue, Value};
use crate::error::{ReactiveError, Result};
use crate::graph::{PropKey, TargetId};
use crate::reactive::Runtime;

/// Wrap a container for observation.
///
/// Wrapping is idempotent: wrapping the same container twice yields equal
/// handles. Non-container values are rejected with a warning.
pub fn reactive(runtime: &Runtime, value: impl Into<Value>) -> Option<Observed> {
    match try_reactive(runtime, value) {
        Ok(observed) => Some(observed),
        Err(err) => {
            warn!(%err, "reactive() called with a non-object value");
            None
        }
    }
}

/// Like [`reactive`], but returns the usage error instead of logging it.
pub fn try_reactive(runtime: &Runtime, value: impl Into<Value>) -> Result<Observed> {
    match value.into() {
        Value::Object(container) => Ok(Observed::wrap(runtime, container)),
        other => Err(ReactiveError::NotAnObject {
            kind: other.kind_name(),
        }),
    }
}

/// Whether `value` is a container wrapped for observation in `runtime`.
pub fn is_observed(runtime: &Runtime, value: &Value) -> bool {
    match value {
        Value::Object(container) => runtime.is_observed(container.id()),
        _ => false,
    }
}

/// A container whose reads are tracked and whose writes trigger.
#[derive(Clone)]
pub struct Observed {
    container: Container,
    runtime: Runtime,
}

impl Observed {
    fn wrap(runtime: &Runtime, container: Container) -> Self {
        runtime.mark_observed(container.id());
        Self {
            container,
            runtime: runtime.clone(),
        }
    }

    /// Containers reached through an observed one are observed too.
    fn observe_child(&self, value: Value) -> Value {
        if let Value::Object(container) = &value {
            self.runtime.mark_observed(container.id());
        }
        value
    }

    pub fn id(&self) -> TargetId {
        self.container.id()
    }

    pub fn kind(&self) -> ContainerKind {
        self.container.kind()
    }

    /// The underlying storage. Access through it is not tracked.
    pub fn container(&self) -> &Container {
        &self.container
    }

    pub fn runtime(&self) -> &Runtime {
        &self.runtime
    }

    /// Tracked read of `key`.
    pub fn get(&self, key: impl Into<PropKey>) -> Value {
        let key = key.into();
        let value = self.container.get(&key);
        self.runtime.track(self.id(), key);
        self.observe_child(value)
    }

    /// Tracked read of a nested container.
    pub fn child(&self, key: impl Into<PropKey>) -> Option<Observed> {
        match self.get(key) {
            Value::Object(container) => Some(Observed::wrap(&self.runtime, container)),
            _ => None,
        }
    }

    /// Write `value` at `key`, triggering subscribers if it changed.
    ///
    /// Returns `false` if the key cannot be written on this container.
    pub fn set(&self, key: impl Into<PropKey>, value: impl Into<Value>) -> bool {
        match self.try_set(key, value) {
            Ok(()) => true,
            Err(err) => {
                warn!(target_id = %self.id(), %err, "rejected write");
                false
            }
        }
    }

    /// Like [`set`](Self::set), but returns the usage error.
    pub fn try_set(&self, key: impl Into<PropKey>, value: impl Into<Value>) -> Result<()> {
        let key = key.into();
        let value = value.into();

        let current = self.container.get(&key);
        if current.same_value(&value) && self.container.contains_key(&key) {
            return Ok(());
        }

        let write = self.container.insert(key.clone(), value.clone())?;
        self.runtime
            .trigger(self.id(), key, &value, &write.old_value);
        self.trigger_length(write.new_len, write.old_len);
        Ok(())
    }

    /// Remove an entry from an object or map. Returns `false` if there was
    /// nothing to remove.
    pub fn remove(&self, key: impl Into<PropKey>) -> bool {
        let key = key.into();
        let Some(write) = self.container.remove(&key) else {
            return false;
        };
        self.runtime
            .trigger(self.id(), key, &Value::Undefined, &write.old_value);
        self.trigger_length(write.new_len, write.old_len);
        true
    }

    /// Remove every entry, triggering each removed key and the entry count.
    /// Returns the number of entries removed.
    pub fn clear(&self) -> usize {
        let removed = self.container.clear();
        if removed.is_empty() {
            return 0;
        }
        if self.container.kind() != ContainerKind::Set {
            for (key, old_value) in &removed {
                self.runtime
                    .trigger(self.id(), key.clone(), &Value::Undefined, old_value);
            }
        }
        self.trigger_length(0, removed.len());
        removed.len()
    }

    /// Clear the container and forget its dependency entries and observed
    /// mark. Breaks any reference cycle the container took part in.
    pub fn dispose(self) {
        self.clear();
        self.runtime.release(self.id());
    }

    /// Append to an array.
    pub fn push(&self, value: impl Into<Value>) -> bool {
        let index = self.container.len();
        self.set(index, value)
    }

    /// Add a member to a set.
    pub fn add(&self, value: impl Into<Value>) -> bool {
        let old_len = self.container.len();
        let added = self.container.add(value.into());
        if added {
            self.trigger_length(old_len + 1, old_len);
        }
        added
    }

    /// Remove a member from a set.
    pub fn delete(&self, value: impl Into<Value>) -> bool {
        let old_len = self.container.len();
        let deleted = self.container.delete(&value.into());
        if deleted {
            self.trigger_length(old_len - 1, old_len);
        }
        deleted
    }

    /// Tracked membership test for sets and arrays.
    pub fn has(&self, value: impl Into<Value>) -> bool {
        self.runtime.track(self.id(), PropKey::Length);
        self.container.has(&value.into())
    }

    /// Tracked entry count.
    pub fn len(&self) -> usize {
        self.runtime.track(self.id(), PropKey::Length);
        self.container.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Tracked key enumeration.
    pub fn keys(&self) -> Vec<PropKey> {
        self.runtime.track(self.id(), PropKey::Length);
        self.container.keys()
    }

    /// Tracked read of every child value.
    ///
    /// Tracks the entry count and every key; set members are covered by the
    /// entry count alone.
    pub fn values(&self) -> Vec<Value> {
        let keys = self.keys();
        if self.container.kind() == ContainerKind::Set {
            return self
                .container
                .values()
                .into_iter()
                .map(|value| self.observe_child(value))
                .collect();
        }
        keys.into_iter().map(|key| self.get(key)).collect()
    }

    fn trigger_length(&self, new_len: usize, old_len: usize) {
        self.runtime
            .trigger(self.id(), PropKey::Length, &new_len, &old_len);
    }
}

impl PartialEq for Observed {
    fn eq(&self, other: &Self) -> bool {
        self.id() == other.id() && self.runtime.ptr_eq(&other.runtime)
    }
}

impl SameValue for Observed {
    fn same_value(&self, other: &Self) -> bool {
        self.id() == other.id()
    }
}

impl From<Observed> for Value {
    fn from(observed: Observed) -> Self {
        Value::Object(observed.container)
    }
}

impl From<&Observed> for Value {
    fn from(observed: &Observed) -> Self {
        Value::Object(observed.container.clone())
    }
}

impl fmt::Debug for Observed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Observed")
            .field("container", &self.container)
            .finish()
    }
}
