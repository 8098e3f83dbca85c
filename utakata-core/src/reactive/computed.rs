//! Computed Implementation
//!
//! A Computed is a cached derived value that re-evaluates only when read
//! after one of its dependencies changed.
//!
//! # How Computed Values Work
//!
//! 1. The getter is wrapped in a lazy effect. Nothing runs on creation.
//!
//! 2. On read, a stale computed re-runs its getter and caches the result.
//!    A fresh one returns the cache.
//!
//! 3. When a dependency changes, the effect's scheduler marks the computed
//!    stale and notifies whoever read the computed. Further upstream
//!    changes while stale are absorbed: readers were already notified.
//!
//! This keeps unread computed values free: a change upstream costs one
//! flag flip until somebody asks for the value again.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

use tracing::debug;

use super::effect::ReactiveEffect;
use super::runtime::Runtime;
use crate::graph::{PropKey, TargetId};
use crate::value::{RefLike, Value};

type Getter<T> = Box<dyn FnMut() -> T>;
type Setter<T> = Box<dyn Fn(T)>;

/// Getter and optional setter for [`computed`].
pub struct ComputedOptions<T> {
    get: Getter<T>,
    set: Option<Setter<T>>,
}

impl<T> ComputedOptions<T> {
    pub fn new<G>(get: G) -> Self
    where
        G: FnMut() -> T + 'static,
    {
        Self {
            get: Box::new(get),
            set: None,
        }
    }

    /// Make the computed writable. Writes are forwarded to `set`.
    pub fn setter<S>(mut self, set: S) -> Self
    where
        S: Fn(T) + 'static,
    {
        self.set = Some(Box::new(set));
        self
    }
}

impl<T> fmt::Debug for ComputedOptions<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComputedOptions")
            .field("writable", &self.set.is_some())
            .finish()
    }
}

/// Things [`computed`] accepts: a getter closure or full [`ComputedOptions`].
pub trait IntoComputedOptions<T> {
    fn into_computed_options(self) -> ComputedOptions<T>;
}

impl<T, G> IntoComputedOptions<T> for G
where
    G: FnMut() -> T + 'static,
{
    fn into_computed_options(self) -> ComputedOptions<T> {
        ComputedOptions::new(self)
    }
}

impl<T> IntoComputedOptions<T> for ComputedOptions<T> {
    fn into_computed_options(self) -> ComputedOptions<T> {
        self
    }
}

/// A lazily evaluated, cached derived value.
///
/// Cloning yields another handle to the same computed value.
pub struct Computed<T: 'static> {
    inner: Rc<ComputedInner<T>>,
}

struct ComputedInner<T: 'static> {
    id: TargetId,
    runtime: Runtime,
    effect: Rc<ReactiveEffect<T>>,
    /// Set when a dependency changed since the cached value was computed.
    stale: Rc<Cell<bool>>,
    value: RefCell<Option<T>>,
    setter: Option<Setter<T>>,
}

/// Create a computed value from a getter or [`ComputedOptions`].
///
/// # Example
///
/// ```
/// use utakata_core::{computed, reactive, Runtime, Value};
///
/// let rt = Runtime::new();
/// let state = reactive(&rt, Value::object([("count", 2)])).unwrap();
///
/// let doubled = computed(&rt, {
///     let state = state.clone();
///     move || state.get("count").as_f64().unwrap_or(0.0) * 2.0
/// });
///
/// assert_eq!(doubled.get(), 4.0);
/// state.set("count", 5);
/// assert_eq!(doubled.get(), 10.0);
/// ```
pub fn computed<T, O>(runtime: &Runtime, options: O) -> Computed<T>
where
    T: 'static,
    O: IntoComputedOptions<T>,
{
    let ComputedOptions { get, set } = options.into_computed_options();

    let id = TargetId::new();
    let stale = Rc::new(Cell::new(true));

    let effect = ReactiveEffect::with_scheduler(runtime, get, |_| {
        let stale = Rc::clone(&stale);
        let runtime = runtime.clone();
        Box::new(move || {
            if !stale.get() {
                stale.set(true);
                runtime.trigger_dep(id, &PropKey::Value);
            }
        })
    });

    Computed {
        inner: Rc::new(ComputedInner {
            id,
            runtime: runtime.clone(),
            effect,
            stale,
            value: RefCell::new(None),
            setter: set,
        }),
    }
}

/// Marks the computed stale again if the getter unwinds.
struct RestoreOnPanic<'a>(&'a Cell<bool>);

impl Drop for RestoreOnPanic<'_> {
    fn drop(&mut self) {
        if std::thread::panicking() {
            self.0.set(true);
        }
    }
}

impl<T: Clone + 'static> Computed<T> {
    /// Tracked read, recomputing first if stale.
    ///
    /// # Panics
    ///
    /// Panics if the getter reads this computed value before it ever
    /// produced one. Use [`try_get`](Self::try_get) for getters that may.
    pub fn get(&self) -> T {
        self.try_get()
            .expect("computed value read by its own getter before its first evaluation")
    }

    /// Like [`get`](Self::get), but returns `None` for a self-read with no
    /// cached value.
    pub fn try_get(&self) -> Option<T> {
        let inner = &self.inner;
        inner.runtime.track(inner.id, PropKey::Value);

        if inner.stale.replace(false) {
            let _restore = RestoreOnPanic(&inner.stale);
            if let Some(value) = inner.effect.run() {
                *inner.value.borrow_mut() = Some(value);
            }
        }
        inner.value.borrow().clone()
    }
}

impl<T: 'static> Computed<T> {
    /// Forward a write to the setter. Read-only computed values ignore it.
    pub fn set(&self, value: T) {
        match &self.inner.setter {
            Some(setter) => setter(value),
            None => debug!(computed = %self.inner.id, "write to read-only computed ignored"),
        }
    }

    pub fn id(&self) -> TargetId {
        self.inner.id
    }

    /// Whether the next read recomputes.
    pub fn is_stale(&self) -> bool {
        self.inner.stale.get()
    }

    pub fn is_writable(&self) -> bool {
        self.inner.setter.is_some()
    }

    /// The effect wrapping the getter.
    pub fn effect(&self) -> &Rc<ReactiveEffect<T>> {
        &self.inner.effect
    }
}

impl<T: 'static> Clone for Computed<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<T: fmt::Debug + 'static> fmt::Debug for Computed<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Computed")
            .field("id", &self.inner.id)
            .field("stale", &self.inner.stale.get())
            .field("value", &self.inner.value.borrow())
            .finish()
    }
}

impl<T> RefLike for Computed<T>
where
    T: Clone + Into<Value> + 'static,
{
    fn target_id(&self) -> TargetId {
        self.id()
    }

    fn read_value(&self) -> Value {
        self.try_get().map(Into::into).unwrap_or_default()
    }

    fn peek_value(&self) -> Value {
        self.inner.runtime.untracked(|| self.read_value())
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
