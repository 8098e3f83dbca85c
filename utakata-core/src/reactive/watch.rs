//! Watchers
//!
//! A watcher runs a callback with the new and previous value of a source
//! whenever the source changes.
//!
//! # How Watchers Work
//!
//! 1. The source is turned into a getter. Signals and computed values are
//!    read directly. Closures are called and, when `deep` is set, their
//!    result is walked with [`Traverse`] so every nested property read is
//!    tracked.
//!
//! 2. The getter runs inside an effect whose scheduler queues a job: either
//!    inline from `trigger` (`sync`) or on the runtime's task queue
//!    (`async`).
//!
//! 3. The job re-runs the getter and calls back if the value changed. Deep
//!    watchers always call back, since nested changes leave the root the
//!    same.

use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize};
use tracing::{debug, warn};

use super::computed::Computed;
use super::effect::ReactiveEffect;
use super::runtime::Runtime;
use super::signal::Signal;
use super::subscriber::{EffectId, Subscriber};
use super::traverse::{Traversable, Traverse};
use crate::error::ReactiveError;
use crate::value::SameValue;

// ----------------------------------------------------------------------------
// Options
// ----------------------------------------------------------------------------

/// When watcher callbacks run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum WatcherFlush {
    /// Queued on the runtime's task queue.
    #[default]
    Async,
    /// Inline, from the write that triggered it.
    Sync,
}

impl WatcherFlush {
    /// Parse a flush name, falling back to [`WatcherFlush::Async`] with a
    /// warning when it is not recognized.
    pub fn parse_or_default(name: &str) -> Self {
        name.parse().unwrap_or_else(|err: ReactiveError| {
            warn!(%err, "falling back to async flush");
            Self::default()
        })
    }
}

impl FromStr for WatcherFlush {
    type Err = ReactiveError;

    fn from_str(name: &str) -> Result<Self, Self::Err> {
        match name {
            "async" => Ok(Self::Async),
            "sync" => Ok(Self::Sync),
            other => Err(ReactiveError::InvalidFlush(other.to_string())),
        }
    }
}

impl<'de> Deserialize<'de> for WatcherFlush {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let name = String::deserialize(deserializer)?;
        Ok(Self::parse_or_default(&name))
    }
}

/// How far below the source value reads are tracked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum WatcherDeep {
    /// `true` walks the whole structure, `false` tracks nothing extra.
    Enabled(bool),
    /// Walk this many levels. Zero is the same as shallow.
    Depth(usize),
}

impl Default for WatcherDeep {
    fn default() -> Self {
        Self::Enabled(false)
    }
}

impl From<bool> for WatcherDeep {
    fn from(enabled: bool) -> Self {
        Self::Enabled(enabled)
    }
}

impl From<usize> for WatcherDeep {
    fn from(depth: usize) -> Self {
        Self::Depth(depth)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Traversal {
    Shallow,
    Breadth(usize),
    Unbounded,
}

impl From<WatcherDeep> for Traversal {
    fn from(deep: WatcherDeep) -> Self {
        match deep {
            WatcherDeep::Enabled(false) | WatcherDeep::Depth(0) => Self::Shallow,
            WatcherDeep::Enabled(true) => Self::Unbounded,
            WatcherDeep::Depth(depth) => Self::Breadth(depth),
        }
    }
}

/// Options for [`watch`].
///
/// Loadable from JSON:
///
/// ```
/// use utakata_core::{WatcherDeep, WatcherFlush, WatcherOptions};
///
/// let options = WatcherOptions::from_json(r#"{"flush": "sync", "deep": 2}"#).unwrap();
/// assert_eq!(options.flush, WatcherFlush::Sync);
/// assert_eq!(options.deep, WatcherDeep::Depth(2));
/// assert!(!options.immediate);
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WatcherOptions {
    pub flush: WatcherFlush,
    /// Call back once on creation, with no previous value.
    pub immediate: bool,
    pub deep: WatcherDeep,
}

impl WatcherOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn flush(mut self, flush: WatcherFlush) -> Self {
        self.flush = flush;
        self
    }

    pub fn immediate(mut self, immediate: bool) -> Self {
        self.immediate = immediate;
        self
    }

    pub fn deep(mut self, deep: impl Into<WatcherDeep>) -> Self {
        self.deep = deep.into();
        self
    }

    /// Parse options from JSON. Missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

// ----------------------------------------------------------------------------
// Sources
// ----------------------------------------------------------------------------

/// Getter built from a watch source.
#[doc(hidden)]
pub struct WatchGetter<T> {
    get: Box<dyn FnMut() -> T>,
    deep: bool,
}

/// Things [`watch`] can observe: a closure, a [`Signal`] or a [`Computed`].
///
/// Signals and computed values are read directly and never traversed. A
/// closure's result is traversed according to [`WatcherOptions::deep`].
pub trait IntoWatchSource<T> {
    #[doc(hidden)]
    fn into_getter(self, runtime: &Runtime, deep: WatcherDeep) -> WatchGetter<T>;
}

impl<T, F> IntoWatchSource<T> for F
where
    T: Traversable + 'static,
    F: FnMut() -> T + 'static,
{
    fn into_getter(mut self, runtime: &Runtime, deep: WatcherDeep) -> WatchGetter<T> {
        let traversal = Traversal::from(deep);
        if traversal == Traversal::Shallow {
            return WatchGetter {
                get: Box::new(self),
                deep: false,
            };
        }

        // An unbounded walk shares one visited set across all roots. A
        // depth-limited walk starts fresh per root, so a container already
        // reached near the edge of one root's budget is still walked to full
        // depth as another root.
        let runtime = runtime.clone();
        WatchGetter {
            get: Box::new(move || {
                let value = self();
                let roots = value.traversal_roots();
                match traversal {
                    Traversal::Breadth(depth) => {
                        for root in &roots {
                            Traverse::new(&runtime).bfs(root, depth);
                        }
                    }
                    Traversal::Unbounded => {
                        let mut traverse = Traverse::new(&runtime);
                        for root in &roots {
                            traverse.dfs(root);
                        }
                    }
                    Traversal::Shallow => {}
                }
                value
            }),
            deep: true,
        }
    }
}

impl<T> IntoWatchSource<T> for Signal<T>
where
    T: Clone + SameValue + 'static,
{
    fn into_getter(self, _runtime: &Runtime, _deep: WatcherDeep) -> WatchGetter<T> {
        WatchGetter {
            get: Box::new(move || self.get()),
            deep: false,
        }
    }
}

impl<T> IntoWatchSource<T> for &Signal<T>
where
    T: Clone + SameValue + 'static,
{
    fn into_getter(self, runtime: &Runtime, deep: WatcherDeep) -> WatchGetter<T> {
        self.clone().into_getter(runtime, deep)
    }
}

impl<T> IntoWatchSource<T> for Computed<T>
where
    T: Clone + 'static,
{
    fn into_getter(self, _runtime: &Runtime, _deep: WatcherDeep) -> WatchGetter<T> {
        WatchGetter {
            get: Box::new(move || self.get()),
            deep: false,
        }
    }
}

impl<T> IntoWatchSource<T> for &Computed<T>
where
    T: Clone + 'static,
{
    fn into_getter(self, runtime: &Runtime, deep: WatcherDeep) -> WatchGetter<T> {
        self.clone().into_getter(runtime, deep)
    }
}

// ----------------------------------------------------------------------------
// watch()
// ----------------------------------------------------------------------------

type Callback<T> = Box<dyn FnMut(T, Option<T>)>;

struct WatchState<T> {
    /// Value passed as `old` to the next callback.
    old: RefCell<Option<T>>,
    callback: RefCell<Callback<T>>,
    deep: bool,
}

impl<T: Clone + SameValue + 'static> WatchState<T> {
    fn run_job(&self, effect: &ReactiveEffect<T>) {
        let Some(value) = effect.run() else {
            return;
        };

        let changed = self.deep
            || match &*self.old.borrow() {
                Some(old) => !value.same_value(old),
                None => true,
            };
        if !changed {
            return;
        }

        let Ok(mut callback) = self.callback.try_borrow_mut() else {
            debug!(effect = %effect.id(), "re-entrant watch notification dropped");
            return;
        };
        let old = self.old.replace(Some(value.clone()));
        callback(value, old);
    }
}

/// Call `callback(new, old)` whenever `source` changes.
///
/// `old` is `None` on the first call of an `immediate` watcher.
///
/// # Example
///
/// ```
/// use std::cell::RefCell;
/// use std::rc::Rc;
/// use utakata_core::{watch, Runtime, Signal, WatcherFlush, WatcherOptions};
///
/// let rt = Runtime::new();
/// let count = Signal::new(&rt, 0);
/// let calls = Rc::new(RefCell::new(Vec::new()));
///
/// let _handle = watch(&rt, &count, {
///     let calls = calls.clone();
///     move |new, old| calls.borrow_mut().push((new, old))
/// }, WatcherOptions::new().flush(WatcherFlush::Sync).immediate(true));
///
/// count.set(5);
/// assert_eq!(*calls.borrow(), vec![(0, None), (5, Some(0))]);
/// ```
pub fn watch<T, S, C>(runtime: &Runtime, source: S, callback: C, options: WatcherOptions) -> WatchHandle
where
    T: Clone + SameValue + 'static,
    S: IntoWatchSource<T>,
    C: FnMut(T, Option<T>) + 'static,
{
    let WatchGetter { get, deep } = source.into_getter(runtime, options.deep);
    let state = Rc::new(WatchState {
        old: RefCell::new(None),
        callback: RefCell::new(Box::new(callback)),
        deep,
    });

    let flush = options.flush;
    let effect = ReactiveEffect::with_scheduler(runtime, get, |weak: Weak<ReactiveEffect<T>>| {
        let state = Rc::clone(&state);
        let runtime = runtime.clone();
        Box::new(move || match flush {
            WatcherFlush::Sync => {
                if let Some(effect) = weak.upgrade() {
                    state.run_job(&effect);
                }
            }
            WatcherFlush::Async => {
                let weak = weak.clone();
                let state = Rc::clone(&state);
                runtime.schedule(Box::new(move || {
                    if let Some(effect) = weak.upgrade() {
                        state.run_job(&effect);
                    }
                }));
            }
        })
    });

    if options.immediate {
        effect.notify();
    } else {
        *state.old.borrow_mut() = effect.run();
    }

    WatchHandle { effect }
}

/// Owns a watcher. Dropping the handle ends the watch.
pub struct WatchHandle {
    effect: Rc<dyn Subscriber>,
}

impl WatchHandle {
    /// Stop watching. Jobs already queued still run.
    pub fn stop(&self) {
        self.effect.stop();
    }

    pub fn id(&self) -> EffectId {
        self.effect.id()
    }
}

impl fmt::Debug for WatchHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WatchHandle")
            .field("effect", &self.effect.id())
            .finish()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::{reactive, Observed, Value};

    type Log<T> = Rc<RefCell<Vec<(T, Option<T>)>>>;

    fn recorder<T: 'static>() -> (Log<T>, impl FnMut(T, Option<T>) + 'static) {
        let log: Log<T> = Rc::new(RefCell::new(Vec::new()));
        let sink = log.clone();
        (log, move |new: T, old: Option<T>| sink.borrow_mut().push((new, old)))
    }

    fn sync() -> WatcherOptions {
        WatcherOptions::new().flush(WatcherFlush::Sync)
    }

    #[test]
    fn flush_names_parse() {
        assert_eq!("sync".parse::<WatcherFlush>(), Ok(WatcherFlush::Sync));
        assert_eq!("async".parse::<WatcherFlush>(), Ok(WatcherFlush::Async));
        assert_eq!(
            "post".parse::<WatcherFlush>(),
            Err(ReactiveError::InvalidFlush("post".into()))
        );
        assert_eq!(WatcherFlush::parse_or_default("post"), WatcherFlush::Async);
    }

    #[test]
    fn options_from_json() {
        let options = WatcherOptions::from_json(r#"{"immediate": true, "deep": true}"#).unwrap();
        assert_eq!(options.flush, WatcherFlush::Async);
        assert!(options.immediate);
        assert_eq!(options.deep, WatcherDeep::Enabled(true));

        let options = WatcherOptions::from_json(r#"{"flush": "later"}"#).unwrap();
        assert_eq!(options.flush, WatcherFlush::Async);

        assert_eq!(WatcherOptions::from_json("{}").unwrap(), WatcherOptions::default());
        assert!(WatcherOptions::from_json(r#"{"deep": "yes"}"#).is_err());
    }

    #[test]
    fn options_serialize_lowercase() {
        let json = serde_json::to_value(sync().deep(3usize)).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"flush": "sync", "immediate": false, "deep": 3})
        );
    }

    #[test]
    fn immediate_sync_watch() {
        let runtime = Runtime::new();
        let count = Signal::new(&runtime, 0);
        let (log, callback) = recorder();

        let _handle = watch(&runtime, &count, callback, sync().immediate(true));
        count.set(5);

        assert_eq!(*log.borrow(), vec![(0, None), (5, Some(0))]);
    }

    #[test]
    fn lazy_watch_waits_for_change() {
        let runtime = Runtime::new();
        let count = Signal::new(&runtime, 1);
        let (log, callback) = recorder();

        let _handle = watch(&runtime, &count, callback, sync());
        assert!(log.borrow().is_empty());

        count.set(1);
        assert!(log.borrow().is_empty());

        count.set(2);
        assert_eq!(*log.borrow(), vec![(2, Some(1))]);
    }

    #[test]
    fn closure_source_with_multiple_values() {
        let runtime = Runtime::new();
        let a = Signal::new(&runtime, 1);
        let b = Signal::new(&runtime, 10);
        let (log, callback) = recorder();

        let _handle = watch(
            &runtime,
            {
                let a = a.clone();
                let b = b.clone();
                move || vec![a.get(), b.get()]
            },
            callback,
            sync(),
        );

        b.set(11);
        assert_eq!(*log.borrow(), vec![(vec![1, 11], Some(vec![1, 10]))]);
    }

    #[test]
    fn computed_source() {
        let runtime = Runtime::new();
        let count = Signal::new(&runtime, 1);
        let parity = crate::reactive::computed(&runtime, {
            let count = count.clone();
            move || count.get() % 2
        });
        let (log, callback) = recorder();

        let _handle = watch(&runtime, &parity, callback, sync());
        count.set(3);
        count.set(4);

        assert_eq!(*log.borrow(), vec![(0, Some(1))]);
    }

    #[test]
    fn async_watch_waits_for_flush() {
        let runtime = Runtime::new();
        let count = Signal::new(&runtime, 0);
        let (log, callback) = recorder();

        let _handle = watch(&runtime, &count, callback, WatcherOptions::new());
        count.set(1);
        count.set(2);
        assert!(log.borrow().is_empty());
        assert_eq!(runtime.pending_jobs(), 2);

        assert_eq!(runtime.flush(), 2);
        // Both jobs read the latest value; only the first sees a change.
        assert_eq!(*log.borrow(), vec![(2, Some(0))]);
    }

    #[test]
    fn shallow_watch_ignores_nested_writes() {
        let runtime = Runtime::new();
        let state = reactive(&runtime, Value::object([("inner", Value::object([("n", 1)]))])).unwrap();
        let (log, callback) = recorder::<Observed>();

        let _handle = watch(
            &runtime,
            {
                let state = state.clone();
                move || state.clone()
            },
            callback,
            sync(),
        );

        state.child("inner").unwrap().set("n", 2);
        assert!(log.borrow().is_empty());
    }

    #[test]
    fn deep_watch_sees_nested_writes() {
        let runtime = Runtime::new();
        let state = reactive(&runtime, Value::object([("inner", Value::object([("n", 1)]))])).unwrap();
        let inner = state.child("inner").unwrap();
        let (log, callback) = recorder::<Observed>();

        let _handle = watch(
            &runtime,
            {
                let state = state.clone();
                move || state.clone()
            },
            callback,
            sync().deep(true),
        );

        inner.set("n", 2);
        assert_eq!(log.borrow().len(), 1);
        let log = log.borrow();
        let (new, old) = &log[0];
        assert_eq!(new, &state);
        assert_eq!(old.as_ref(), Some(&state));
    }

    #[test]
    fn depth_limited_watch() {
        let runtime = Runtime::new();
        let state = reactive(
            &runtime,
            Value::object([("a", Value::object([("b", Value::object([("c", 1)]))]))]),
        )
        .unwrap();
        let a = state.child("a").unwrap();
        let b = a.child("b").unwrap();
        let (log, callback) = recorder::<Observed>();

        let _handle = watch(
            &runtime,
            {
                let state = state.clone();
                move || state.clone()
            },
            callback,
            sync().deep(2usize),
        );

        b.set("c", 2);
        assert!(log.borrow().is_empty());

        a.set("b", 0);
        assert_eq!(log.borrow().len(), 1);
    }

    #[test]
    fn depth_budget_is_per_root() {
        let runtime = Runtime::new();
        let inner = Value::object([("t", Value::object([("v", 1)]))]);
        let outer = reactive(&runtime, Value::object([("s", inner)])).unwrap();
        let shared = outer.child("s").unwrap();
        let leaf = shared.child("t").unwrap();
        let (log, callback) = recorder::<Vec<Observed>>();

        let _handle = watch(
            &runtime,
            {
                let outer = outer.clone();
                let shared = shared.clone();
                move || vec![outer.clone(), shared.clone()]
            },
            callback,
            sync().deep(2usize),
        );

        // Two levels below `shared` as its own root.
        leaf.set("v", 2);
        assert_eq!(log.borrow().len(), 1);
    }

    #[test]
    fn stopped_watch_stays_quiet() {
        let runtime = Runtime::new();
        let count = Signal::new(&runtime, 0);
        let (log, callback) = recorder();

        let handle = watch(&runtime, &count, callback, sync());
        handle.stop();
        handle.stop();

        count.set(1);
        assert!(log.borrow().is_empty());
        assert_eq!(count.subscriber_count(), 0);
    }

    #[test]
    fn job_queued_before_stop_still_runs() {
        let runtime = Runtime::new();
        let count = Signal::new(&runtime, 0);
        let (log, callback) = recorder();

        let handle = watch(&runtime, &count, callback, WatcherOptions::new());
        count.set(1);
        handle.stop();

        runtime.flush();
        assert_eq!(*log.borrow(), vec![(1, Some(0))]);
    }

    #[test]
    fn dropping_handle_ends_watch() {
        let runtime = Runtime::new();
        let count = Signal::new(&runtime, 0);
        let (log, callback) = recorder();

        let handle = watch(&runtime, &count, callback, sync());
        drop(handle);

        count.set(1);
        assert!(log.borrow().is_empty());
        assert_eq!(runtime.effect_count(), 0);
    }

    #[test]
    fn callback_is_not_reentered() {
        let runtime = Runtime::new();
        let count = Signal::new(&runtime, 0);
        let calls = Rc::new(RefCell::new(Vec::new()));

        let _handle = watch(
            &runtime,
            &count,
            {
                let count = count.clone();
                let calls = calls.clone();
                move |new: i32, _old| {
                    calls.borrow_mut().push(new);
                    count.set(new + 1);
                }
            },
            sync(),
        );

        count.set(1);
        assert_eq!(*calls.borrow(), vec![1]);
        assert_eq!(count.get_untracked(), 2);
    }
}
