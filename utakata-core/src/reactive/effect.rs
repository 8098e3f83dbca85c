//! Effect Implementation
//!
//! An Effect is a re-runnable computation whose reads are tracked.
//!
//! # How Effects Work
//!
//! 1. When created (unless lazy), the effect runs its function immediately
//!    to establish initial dependencies.
//!
//! 2. Every tracked read made while the effect is on top of the execution
//!    stack subscribes it to that location. The effect remembers each
//!    location it joined in a back-reference list.
//!
//! 3. When any dependency changes, the effect's scheduler runs if it has
//!    one; otherwise the effect re-runs directly.
//!
//! 4. [`ReactiveEffect::stop`] walks the back-reference list and leaves every
//!    set, so the effect receives no further triggers.
//!
//! # Re-entrancy
//!
//! An effect that is already running is not run again: `run` returns `None`
//! instead. This is what keeps an effect that writes a location it reads
//! from looping forever.
//!
//! # Ownership
//!
//! The runtime holds effects weakly. Whoever created the effect (a
//! [`Runner`], a computed value, a watch handle) owns it; dropping the last
//! owner stops the effect.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};

use smallvec::SmallVec;
use tracing::{debug, trace};

use super::runtime::Runtime;
use super::subscriber::{EffectId, Subscriber};
use crate::graph::{PropKey, TargetId};

/// Function wrapped by an effect, shareable between effects.
type SharedFn<T> = Rc<RefCell<Box<dyn FnMut() -> T>>>;

/// Called instead of re-running when a dependency changes.
pub type Scheduler = Box<dyn Fn()>;

/// A re-runnable computation that can be the target of dependency tracking.
pub struct ReactiveEffect<T: 'static> {
    id: EffectId,
    runtime: Runtime,
    func: SharedFn<T>,
    scheduler: Option<Scheduler>,
    /// Locations this effect is subscribed to.
    deps: RefCell<SmallVec<[(TargetId, PropKey); 4]>>,
    /// Cleared by `stop`.
    active: Cell<bool>,
    run_count: Cell<usize>,
}

impl<T: 'static> ReactiveEffect<T> {
    /// Create an effect without running it.
    pub fn new<F>(runtime: &Runtime, func: F) -> Rc<Self>
    where
        F: FnMut() -> T + 'static,
    {
        Self::build(runtime, Rc::new(RefCell::new(Box::new(func))), |_| None)
    }

    /// Create an effect with a scheduler, without running it.
    ///
    /// `make_scheduler` receives a weak handle to the effect being built, so
    /// the scheduler can re-run it when it decides to.
    pub fn with_scheduler<F, S>(runtime: &Runtime, func: F, make_scheduler: S) -> Rc<Self>
    where
        F: FnMut() -> T + 'static,
        S: FnOnce(Weak<Self>) -> Scheduler,
    {
        Self::build(runtime, Rc::new(RefCell::new(Box::new(func))), |weak| {
            Some(make_scheduler(weak))
        })
    }

    fn build<S>(runtime: &Runtime, func: SharedFn<T>, make_scheduler: S) -> Rc<Self>
    where
        S: FnOnce(Weak<Self>) -> Option<Scheduler>,
    {
        let effect = Rc::new_cyclic(|weak| Self {
            id: EffectId::new(),
            runtime: runtime.clone(),
            func,
            scheduler: make_scheduler(weak.clone()),
            deps: RefCell::new(SmallVec::new()),
            active: Cell::new(true),
            run_count: Cell::new(0),
        });

        let subscriber: Weak<dyn Subscriber> = Rc::downgrade(&effect) as Weak<dyn Subscriber>;
        runtime.register(effect.id, subscriber);
        effect
    }

    /// Get the effect's unique ID.
    pub fn id(&self) -> EffectId {
        self.id
    }

    pub fn runtime(&self) -> &Runtime {
        &self.runtime
    }

    /// Execute the effect function with this effect as the active effect.
    ///
    /// Returns `None` without executing if the effect is already running.
    /// A stopped effect still executes, but untracked.
    pub fn run(&self) -> Option<T> {
        if !self.active.get() {
            let mut func = self.func.try_borrow_mut().ok()?;
            return Some(self.runtime.untracked(|| (*func)()));
        }

        let Some(_guard) = self.runtime.context().enter(self.id) else {
            trace!(effect = %self.id, "re-entrant run suppressed");
            return None;
        };
        // Another effect sharing this function may be mid-run.
        let Ok(mut func) = self.func.try_borrow_mut() else {
            trace!(effect = %self.id, "shared function busy");
            return None;
        };

        self.run_count.set(self.run_count.get() + 1);
        Some((*func)())
    }

    /// Unsubscribe from every dependency.
    ///
    /// The effect can still be run manually afterwards, but it no longer
    /// records dependencies or receives triggers.
    pub fn stop(&self) {
        let deps = std::mem::take(&mut *self.deps.borrow_mut());
        for (target, key) in &deps {
            self.runtime.unsubscribe(*target, key, self.id);
        }
        if self.active.replace(false) {
            debug!(effect = %self.id, dependencies = deps.len(), "effect stopped");
        }
    }

    /// Whether the effect still receives triggers.
    pub fn is_active(&self) -> bool {
        self.active.get()
    }

    /// Whether the effect has a scheduler.
    pub fn has_scheduler(&self) -> bool {
        self.scheduler.is_some()
    }

    /// Whether the effect is on the execution stack.
    pub fn is_running(&self) -> bool {
        self.runtime.context().is_running(self.id)
    }

    /// Get the number of times the effect function has run tracked.
    pub fn run_count(&self) -> usize {
        self.run_count.get()
    }

    /// Get the number of locations the effect is subscribed to.
    pub fn dependency_count(&self) -> usize {
        self.deps.borrow().len()
    }
}

impl<T: 'static> Subscriber for ReactiveEffect<T> {
    fn id(&self) -> EffectId {
        self.id
    }

    fn notify(&self) {
        match &self.scheduler {
            Some(scheduler) => scheduler(),
            None => {
                self.run();
            }
        }
    }

    fn record_dependency(&self, target: TargetId, key: PropKey) {
        self.deps.borrow_mut().push((target, key));
    }

    fn stop(&self) {
        ReactiveEffect::stop(self);
    }
}

impl<T: 'static> Drop for ReactiveEffect<T> {
    fn drop(&mut self) {
        self.stop();
        self.runtime.unregister(self.id);
    }
}

impl<T: 'static> fmt::Debug for ReactiveEffect<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReactiveEffect")
            .field("id", &self.id)
            .field("active", &self.is_active())
            .field("run_count", &self.run_count())
            .field("dependency_count", &self.dependency_count())
            .field("has_scheduler", &self.has_scheduler())
            .finish()
    }
}

// ----------------------------------------------------------------------------
// effect()
// ----------------------------------------------------------------------------

/// Options for [`effect`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EffectOptions {
    /// Do not run on creation.
    pub lazy: bool,
}

impl EffectOptions {
    pub fn lazy() -> Self {
        Self { lazy: true }
    }
}

/// Callable handle returned by [`effect`]. Owns the effect: the effect stops
/// when the last clone of its runner is dropped.
pub struct Runner<T: 'static> {
    effect: Rc<ReactiveEffect<T>>,
}

impl<T: 'static> Runner<T> {
    /// Run the effect. See [`ReactiveEffect::run`].
    pub fn run(&self) -> Option<T> {
        self.effect.run()
    }

    /// Stop the effect. See [`ReactiveEffect::stop`].
    pub fn stop(&self) {
        self.effect.stop();
    }

    /// The effect behind this runner.
    pub fn effect(&self) -> &Rc<ReactiveEffect<T>> {
        &self.effect
    }
}

impl<T: 'static> Clone for Runner<T> {
    fn clone(&self) -> Self {
        Self {
            effect: Rc::clone(&self.effect),
        }
    }
}

impl<T: 'static> fmt::Debug for Runner<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Runner").field(&self.effect).finish()
    }
}

/// Things [`effect`] can wrap: a closure, or an existing runner whose
/// underlying function is reused rather than wrapped again.
pub trait IntoEffectFn<T> {
    #[doc(hidden)]
    fn into_effect_fn(self) -> SharedFn<T>;
}

impl<T, F> IntoEffectFn<T> for F
where
    F: FnMut() -> T + 'static,
{
    fn into_effect_fn(self) -> SharedFn<T> {
        Rc::new(RefCell::new(Box::new(self)))
    }
}

impl<T: 'static> IntoEffectFn<T> for Runner<T> {
    fn into_effect_fn(self) -> SharedFn<T> {
        Rc::clone(&self.effect.func)
    }
}

impl<T: 'static> IntoEffectFn<T> for &Runner<T> {
    fn into_effect_fn(self) -> SharedFn<T> {
        Rc::clone(&self.effect.func)
    }
}

/// Create an effect around `func` and run it unless `options.lazy` is set.
///
/// # Example
///
/// ```
/// use std::cell::RefCell;
/// use std::rc::Rc;
/// use utakata_core::{effect, reactive, EffectOptions, Runtime, Value};
///
/// let rt = Runtime::new();
/// let state = reactive(&rt, Value::object([("count", 0)])).unwrap();
/// let log = Rc::new(RefCell::new(Vec::new()));
///
/// let _runner = effect(&rt, {
///     let state = state.clone();
///     let log = log.clone();
///     move || log.borrow_mut().push(state.get("count").as_f64())
/// }, EffectOptions::default());
///
/// state.set("count", 1);
/// assert_eq!(*log.borrow(), vec![Some(0.0), Some(1.0)]);
/// ```
pub fn effect<T, F>(runtime: &Runtime, func: F, options: EffectOptions) -> Runner<T>
where
    T: 'static,
    F: IntoEffectFn<T>,
{
    let effect = ReactiveEffect::build(runtime, func.into_effect_fn(), |_| None);
    if !options.lazy {
        effect.run();
    }
    Runner { effect }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
