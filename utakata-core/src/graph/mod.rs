//! Dependency Graph
//!
//! This module implements the structure that records which effects read
//! which tracked locations.
//!
//! # Overview
//!
//! The graph maps a target handle to a map from property key to the set of
//! effects subscribed to that location:
//!
//! ```text
//! TargetId ──► PropKey ──► { EffectId, EffectId, ... }
//! ```
//!
//! Subscriber sets are insertion ordered and never hold the same effect
//! twice, so re-reading a property during one run is free and trigger order
//! is the order in which effects first read the location.
//!
//! # Ownership
//!
//! The graph stores effect ids only. Effects own their own lifetime and keep
//! a back-reference list of the locations they joined, which is what
//! [`DependencyGraph::unsubscribe`] is driven from when an effect stops.
//! Sets are pruned when their last subscriber leaves, so an entry exists
//! exactly as long as somebody is listening.

mod key;

pub use key::{PropKey, Symbol, TargetId};

use std::collections::HashMap;

use indexmap::IndexSet;
use smallvec::SmallVec;

use crate::reactive::EffectId;

/// Ordered, duplicate free set of subscribers of one location.
pub type Dep = IndexSet<EffectId>;

/// Snapshot of a subscriber set taken before notifying it.
pub type Subscribers = SmallVec<[EffectId; 8]>;

/// Target → key → subscribers.
#[derive(Debug, Default)]
pub struct DependencyGraph {
    targets: HashMap<TargetId, HashMap<PropKey, Dep>>,
}

impl DependencyGraph {
    /// Create an empty graph.
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe `effect` to `(target, key)`.
    ///
    /// Returns `false` when the effect was already subscribed, in which case
    /// nothing changes.
    pub fn subscribe(&mut self, target: TargetId, key: PropKey, effect: EffectId) -> bool {
        self.targets
            .entry(target)
            .or_default()
            .entry(key)
            .or_default()
            .insert(effect)
    }

    /// Remove `effect` from `(target, key)`, pruning emptied entries.
    pub fn unsubscribe(&mut self, target: TargetId, key: &PropKey, effect: EffectId) {
        let Some(keys) = self.targets.get_mut(&target) else {
            return;
        };
        if let Some(dep) = keys.get_mut(key) {
            dep.shift_remove(&effect);
            if dep.is_empty() {
                keys.remove(key);
            }
        }
        if keys.is_empty() {
            self.targets.remove(&target);
        }
    }

    /// Copy the subscribers of `(target, key)` in insertion order.
    ///
    /// Returns `None` when nothing ever subscribed to the location.
    pub fn subscribers(&self, target: TargetId, key: &PropKey) -> Option<Subscribers> {
        self.targets
            .get(&target)
            .and_then(|keys| keys.get(key))
            .map(|dep| dep.iter().copied().collect())
    }

    /// Whether `(target, key)` has at least one subscriber.
    pub fn contains(&self, target: TargetId, key: &PropKey) -> bool {
        self.targets
            .get(&target)
            .is_some_and(|keys| keys.contains_key(key))
    }

    /// Number of subscribers of `(target, key)`.
    pub fn subscriber_count(&self, target: TargetId, key: &PropKey) -> usize {
        self.targets
            .get(&target)
            .and_then(|keys| keys.get(key))
            .map_or(0, Dep::len)
    }

    /// Drop every entry of `target`. Returns the number of keys removed.
    ///
    /// Effects still list the removed locations in their back-references;
    /// unsubscribing from a missing location is a no-op.
    pub fn release(&mut self, target: TargetId) -> usize {
        self.targets.remove(&target).map_or(0, |keys| keys.len())
    }

    /// Number of targets with at least one subscribed key.
    pub fn target_count(&self) -> usize {
        self.targets.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn subscribe_is_idempotent() {
        let mut graph = DependencyGraph::new();
        let target = TargetId::new();
        let effect = EffectId::new();

        assert!(graph.subscribe(target, "count".into(), effect));
        assert!(!graph.subscribe(target, "count".into(), effect));
        assert_eq!(graph.subscriber_count(target, &"count".into()), 1);
    }

    #[test]
    fn subscribers_keep_insertion_order() {
        let mut graph = DependencyGraph::new();
        let target = TargetId::new();
        let ids: Vec<EffectId> = (0..3).map(|_| EffectId::new()).collect();

        for id in ids.iter().rev() {
            graph.subscribe(target, PropKey::Length, *id);
        }

        let snapshot = graph.subscribers(target, &PropKey::Length).unwrap();
        let expected: Vec<EffectId> = ids.iter().rev().copied().collect();
        assert_eq!(snapshot.as_slice(), expected.as_slice());
    }

    #[test]
    fn unsubscribe_prunes_empty_entries() {
        let mut graph = DependencyGraph::new();
        let target = TargetId::new();
        let effect = EffectId::new();

        graph.subscribe(target, "a".into(), effect);
        assert!(graph.contains(target, &"a".into()));
        assert_eq!(graph.target_count(), 1);

        graph.unsubscribe(target, &"a".into(), effect);
        assert!(!graph.contains(target, &"a".into()));
        assert!(graph.subscribers(target, &"a".into()).is_none());
        assert_eq!(graph.target_count(), 0);

        // Missing entries are ignored.
        graph.unsubscribe(target, &"a".into(), effect);
    }

    #[test]
    fn release_drops_all_keys_of_a_target() {
        let mut graph = DependencyGraph::new();
        let target = TargetId::new();
        let other = TargetId::new();
        let effect = EffectId::new();

        graph.subscribe(target, "a".into(), effect);
        graph.subscribe(target, "b".into(), effect);
        graph.subscribe(other, "a".into(), effect);

        assert_eq!(graph.release(target), 2);
        assert!(!graph.contains(target, &"a".into()));
        assert!(graph.contains(other, &"a".into()));
        assert_eq!(graph.release(target), 0);
    }
}
