//! Reactive Runtime
//!
//! The runtime is the central coordinator that connects observed values,
//! effects, computed values and watchers. It owns the dependency graph, the
//! execution context and the task queue.
//!
//! # How It Works
//!
//! 1. When an effect is created, it registers a weak reference to itself
//!    with the runtime.
//!
//! 2. When a tracked location is read while an effect runs, [`Runtime::track`]
//!    subscribes the active effect to that location and the effect records
//!    the location in its back-reference list.
//!
//! 3. When a tracked location is written, [`Runtime::trigger`]:
//!    a. Returns early if nobody listens or the value did not change
//!    b. Copies the subscriber set
//!    c. Calls each subscriber's scheduler, or re-runs it
//!
//! # Threading
//!
//! A runtime is a single-threaded, cheaply cloneable handle. Every runtime
//! is an independent reactive universe: effects only ever see reads made
//! through their own runtime.

use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::rc::{Rc, Weak};

use tracing::trace;

use super::context::{ExecutionContext, PauseGuard};
use super::queue::{Job, MicrotaskQueue, TaskQueue};
use super::subscriber::{EffectId, Subscriber};
use crate::graph::{DependencyGraph, PropKey, TargetId};
use crate::value::SameValue;

/// Handle to a reactive universe.
#[derive(Clone)]
pub struct Runtime {
    inner: Rc<RuntimeInner>,
}

struct RuntimeInner {
    graph: RefCell<DependencyGraph>,
    context: ExecutionContext,
    /// Live effects by ID. Weak so the runtime never keeps an effect alive.
    registry: RefCell<HashMap<EffectId, Weak<dyn Subscriber>>>,
    /// Containers that have been wrapped for observation.
    observed: RefCell<HashSet<TargetId>>,
    queue: Box<dyn TaskQueue>,
}

impl Runtime {
    /// Create a runtime whose async jobs wait for [`flush`](Self::flush).
    pub fn new() -> Self {
        Self::with_queue(MicrotaskQueue::new())
    }

    /// Create a runtime that defers async jobs to `queue`.
    pub fn with_queue(queue: impl TaskQueue + 'static) -> Self {
        Self {
            inner: Rc::new(RuntimeInner {
                graph: RefCell::new(DependencyGraph::new()),
                context: ExecutionContext::new(),
                registry: RefCell::new(HashMap::new()),
                observed: RefCell::new(HashSet::new()),
                queue: Box::new(queue),
            }),
        }
    }

    /// Whether two handles refer to the same runtime.
    pub fn ptr_eq(&self, other: &Runtime) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    pub(crate) fn context(&self) -> &ExecutionContext {
        &self.inner.context
    }

    // ------------------------------------------------------------------
    // Registry
    // ------------------------------------------------------------------

    pub(crate) fn register(&self, id: EffectId, subscriber: Weak<dyn Subscriber>) {
        self.inner.registry.borrow_mut().insert(id, subscriber);
    }

    pub(crate) fn unregister(&self, id: EffectId) {
        self.inner.registry.borrow_mut().remove(&id);
    }

    fn subscriber(&self, id: EffectId) -> Option<Rc<dyn Subscriber>> {
        self.inner.registry.borrow().get(&id).and_then(Weak::upgrade)
    }

    /// Number of effects currently alive in this runtime.
    pub fn effect_count(&self) -> usize {
        self.inner.registry.borrow().len()
    }

    // ------------------------------------------------------------------
    // Tracking
    // ------------------------------------------------------------------

    /// Record that the active effect read `(target, key)`.
    ///
    /// Does nothing when tracking is paused or the effect is already
    /// subscribed to the location.
    pub fn track(&self, target: TargetId, key: impl Into<PropKey>) {
        if self.inner.context.is_tracking_paused() {
            return;
        }
        let Some(active) = self.inner.context.active() else {
            return;
        };
        let key = key.into();

        let inserted = self
            .inner
            .graph
            .borrow_mut()
            .subscribe(target, key.clone(), active);

        if inserted {
            trace!(%target, %key, effect = %active, "track");
            if let Some(subscriber) = self.subscriber(active) {
                subscriber.record_dependency(target, key);
            }
        }
    }

    /// Notify the subscribers of `(target, key)` that its value changed
    /// from `old_value` to `new_value`.
    ///
    /// Nothing happens if the two values are the same under same-value
    /// semantics.
    pub fn trigger<V>(&self, target: TargetId, key: impl Into<PropKey>, new_value: &V, old_value: &V)
    where
        V: SameValue + ?Sized,
    {
        if new_value.same_value(old_value) {
            return;
        }
        self.trigger_dep(target, &key.into());
    }

    /// Notify the subscribers of `(target, key)` unconditionally.
    pub(crate) fn trigger_dep(&self, target: TargetId, key: &PropKey) {
        // Effects re-running below may leave and rejoin this very set, so
        // iterate a copy.
        let Some(snapshot) = self.inner.graph.borrow().subscribers(target, key) else {
            return;
        };
        trace!(%target, %key, subscribers = snapshot.len(), "trigger");

        for id in snapshot {
            match self.subscriber(id) {
                Some(subscriber) => subscriber.notify(),
                None => self.unsubscribe(target, key, id),
            }
        }
    }

    pub(crate) fn unsubscribe(&self, target: TargetId, key: &PropKey, effect: EffectId) {
        self.inner.graph.borrow_mut().unsubscribe(target, key, effect);
    }

    /// Whether reads are currently not recorded.
    ///
    /// Tracking is paused when no effect is running or when tracking has
    /// been suppressed with [`untracked`](Self::untracked). A suppression
    /// covers the current effect only; an effect started inside it tracks
    /// its own reads.
    pub fn is_tracking_paused(&self) -> bool {
        self.inner.context.is_tracking_paused()
    }

    /// Run `f` without recording any reads.
    pub fn untracked<R>(&self, f: impl FnOnce() -> R) -> R {
        let _pause = self.inner.context.pause();
        f()
    }

    /// Suppress tracking until the returned guard is dropped.
    pub fn pause_tracking(&self) -> PauseGuard<'_> {
        self.inner.context.pause()
    }

    /// The effect reads are currently attributed to.
    pub fn active_effect(&self) -> Option<EffectId> {
        self.inner.context.active()
    }

    // ------------------------------------------------------------------
    // Observation marker
    // ------------------------------------------------------------------

    /// Mark a container as observed. Returns `false` if it already was.
    pub(crate) fn mark_observed(&self, target: TargetId) -> bool {
        self.inner.observed.borrow_mut().insert(target)
    }

    /// Whether `target` has been wrapped for observation in this runtime.
    pub fn is_observed(&self, target: TargetId) -> bool {
        self.inner.observed.borrow().contains(&target)
    }

    /// Forget `target`: drop its dependency entries and its observation
    /// mark. Returns the number of dependency entries dropped.
    pub fn release(&self, target: TargetId) -> usize {
        self.inner.observed.borrow_mut().remove(&target);
        let released = self.inner.graph.borrow_mut().release(target);
        trace!(%target, released, "release");
        released
    }

    // ------------------------------------------------------------------
    // Introspection
    // ------------------------------------------------------------------

    /// Number of effects subscribed to `(target, key)`.
    pub fn subscriber_count(&self, target: TargetId, key: impl Into<PropKey>) -> usize {
        self.inner.graph.borrow().subscriber_count(target, &key.into())
    }

    /// Whether any effect is subscribed to `(target, key)`.
    pub fn has_dependency(&self, target: TargetId, key: impl Into<PropKey>) -> bool {
        self.inner.graph.borrow().contains(target, &key.into())
    }

    /// Number of targets with at least one subscriber.
    pub fn tracked_target_count(&self) -> usize {
        self.inner.graph.borrow().target_count()
    }

    // ------------------------------------------------------------------
    // Deferred work
    // ------------------------------------------------------------------

    /// Defer `job` to the task queue.
    pub fn schedule(&self, job: Job) {
        self.inner.queue.schedule(job);
    }

    /// Run the queued jobs. Returns the number of jobs run.
    pub fn flush(&self) -> usize {
        self.inner.queue.flush()
    }

    /// Number of queued jobs.
    pub fn pending_jobs(&self) -> usize {
        self.inner.queue.pending()
    }
}

impl Default for Runtime {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Runtime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Runtime")
            .field("effects", &self.effect_count())
            .field("tracked_targets", &self.tracked_target_count())
            .field("depth", &self.inner.context.depth())
            .field("pending_jobs", &self.pending_jobs())
            .finish()
    }
}
