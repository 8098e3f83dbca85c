//! Utakata Core
//!
//! This crate provides a fine-grained reactive dependency-tracking runtime.
//! It implements:
//!
//! - Effects that re-run when the values they read change
//! - Lazily evaluated, cached computed values
//! - Watchers with synchronous or queued callbacks and deep traversal
//! - Observed containers and typed signals as the tracked data
//!
//! # Architecture
//!
//! The crate is organized into several modules:
//!
//! - `graph`: The dependency graph mapping tracked locations to effects
//! - `reactive`: The runtime, effects, computed values and watchers
//! - `value`: Dynamic values and the observed containers that track them
//! - `error`: Usage errors
//!
//! # Example
//!
//! ```rust
//! use std::cell::RefCell;
//! use std::rc::Rc;
//! use utakata_core::{computed, effect, reactive, EffectOptions, Runtime, Value};
//!
//! let rt = Runtime::new();
//! let state = reactive(&rt, Value::object([("count", 1)])).unwrap();
//!
//! // Create a derived value
//! let doubled = computed(&rt, {
//!     let state = state.clone();
//!     move || state.get("count").as_f64().unwrap_or_default() * 2.0
//! });
//!
//! // Create an effect
//! let printed = Rc::new(RefCell::new(Vec::new()));
//! let _runner = effect(&rt, {
//!     let doubled = doubled.clone();
//!     let printed = printed.clone();
//!     move || printed.borrow_mut().push(doubled.get())
//! }, EffectOptions::default());
//!
//! // Update the state; the effect runs again through the computed value
//! state.set("count", 5);
//! assert_eq!(*printed.borrow(), vec![2.0, 10.0]);
//! ```

pub mod error;
pub mod graph;
pub mod reactive;
pub mod value;

pub use error::{ReactiveError, Result};
pub use graph::{PropKey, Symbol, TargetId};
pub use reactive::{
    computed, effect, watch, Computed, ComputedOptions, EffectId, EffectOptions, MicrotaskQueue,
    ReactiveEffect, Runner, Runtime, Signal, TaskQueue, TokioLocalQueue, Traversable, Traverse,
    WatchHandle, WatcherDeep, WatcherFlush, WatcherOptions,
};
pub use value::{
    is_observed, reactive, try_reactive, Container, ContainerKind, Observed, RefLike, SameValue,
    Value,
};
