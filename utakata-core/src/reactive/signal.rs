//! Signal Implementation
//!
//! A Signal is a typed tracked cell: the statically typed counterpart of a
//! property on an observed container.
//!
//! # How Signals Work
//!
//! 1. When a signal is read while an effect runs, the effect subscribes to
//!    the signal's `(id, Value)` location.
//!
//! 2. When a signal is written with a value that differs under same-value
//!    semantics, every subscriber is notified.
//!
//! 3. Writes of an equal value (including `NaN` over `NaN`) are silent.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use super::runtime::Runtime;
use crate::graph::{PropKey, TargetId};
use crate::value::{RefLike, SameValue, Value};

/// A reactive cell holding a value of type `T`.
///
/// Cloning yields another handle to the same cell.
///
/// # Example
///
/// ```
/// use utakata_core::{Runtime, Signal};
///
/// let rt = Runtime::new();
/// let count = Signal::new(&rt, 0);
///
/// count.set(5);
/// assert_eq!(count.get(), 5);
///
/// count.update(|n| n + 1);
/// assert_eq!(count.get(), 6);
/// ```
pub struct Signal<T: 'static> {
    inner: Rc<SignalInner<T>>,
}

struct SignalInner<T> {
    id: TargetId,
    runtime: Runtime,
    value: RefCell<T>,
}

impl<T> Signal<T>
where
    T: Clone + SameValue + 'static,
{
    pub fn new(runtime: &Runtime, value: T) -> Self {
        Self {
            inner: Rc::new(SignalInner {
                id: TargetId::new(),
                runtime: runtime.clone(),
                value: RefCell::new(value),
            }),
        }
    }

    pub fn id(&self) -> TargetId {
        self.inner.id
    }

    /// Tracked read.
    pub fn get(&self) -> T {
        self.with(T::clone)
    }

    /// Tracked read by reference.
    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        self.track();
        f(&self.inner.value.borrow())
    }

    /// Read without subscribing the active effect.
    pub fn get_untracked(&self) -> T {
        self.inner.value.borrow().clone()
    }

    /// Replace the value, notifying subscribers if it changed.
    pub fn set(&self, value: T) {
        if self.inner.value.borrow().same_value(&value) {
            return;
        }
        *self.inner.value.borrow_mut() = value;
        self.inner
            .runtime
            .trigger_dep(self.inner.id, &PropKey::Value);
    }

    /// Compute a new value from the current one.
    pub fn update<F>(&self, f: F)
    where
        F: FnOnce(&T) -> T,
    {
        let next = f(&self.inner.value.borrow());
        self.set(next);
    }

    /// Number of effects subscribed to this signal.
    pub fn subscriber_count(&self) -> usize {
        self.inner
            .runtime
            .subscriber_count(self.inner.id, PropKey::Value)
    }

    fn track(&self) {
        self.inner.runtime.track(self.inner.id, PropKey::Value);
    }
}

impl<T: 'static> Clone for Signal<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<T: fmt::Debug + 'static> fmt::Debug for Signal<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Signal")
            .field("id", &self.inner.id)
            .field("value", &*self.inner.value.borrow())
            .finish()
    }
}

impl<T> RefLike for Signal<T>
where
    T: Clone + SameValue + Into<Value> + 'static,
{
    fn target_id(&self) -> TargetId {
        self.id()
    }

    fn read_value(&self) -> Value {
        self.get().into()
    }

    fn peek_value(&self) -> Value {
        self.get_untracked().into()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
