//! Reactive Primitives
//!
//! This module implements the dependency-tracking engine: effects, computed
//! values, watchers and the runtime that connects them.
//!
//! # Concepts
//!
//! ## Effects
//!
//! An Effect is a re-runnable computation. While it runs, every tracked read
//! subscribes it to the location read. When one of those locations is
//! written, the effect re-runs, or hands off to its scheduler if it has one.
//!
//! ## Computed
//!
//! A Computed is a derived value that caches its result. It re-evaluates
//! only when read after one of its dependencies changed.
//!
//! ## Watchers
//!
//! A Watcher calls back with the new and old value of a source when it
//! changes, either inline or through the runtime's task queue. Deep watchers
//! walk nested structures so changes anywhere inside are seen.
//!
//! ## Signals
//!
//! A Signal is a typed single-value cell whose reads are tracked.
//!
//! # Implementation Notes
//!
//! All state lives in an explicit [`Runtime`]: the dependency graph, the
//! stack of running effects and the task queue. Effects are keyed by
//! [`EffectId`] and held weakly by the runtime, so the graph never keeps a
//! dropped effect alive.

mod computed;
mod context;
mod effect;
mod queue;
mod runtime;
mod signal;
mod subscriber;
mod traverse;
mod watch;

pub use computed::{computed, Computed, ComputedOptions, IntoComputedOptions};
pub use context::{ContextGuard, ExecutionContext, PauseGuard};
pub use effect::{effect, EffectOptions, IntoEffectFn, ReactiveEffect, Runner, Scheduler};
pub use queue::{Job, MicrotaskQueue, TaskQueue, TokioLocalQueue};
pub use runtime::Runtime;
pub use signal::Signal;
pub use subscriber::EffectId;
pub use traverse::{Traversable, Traverse};
pub use watch::{
    watch, IntoWatchSource, WatchGetter, WatchHandle, WatcherDeep, WatcherFlush, WatcherOptions,
};
