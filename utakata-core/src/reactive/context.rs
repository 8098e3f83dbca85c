//! Execution Context
//!
//! The execution context tracks which effect is currently running. This
//! enables automatic dependency tracking: when a tracked location is read,
//! the runtime registers the effect on top of the stack as a subscriber.
//!
//! # Implementation
//!
//! Each [`Runtime`](super::Runtime) owns one context: a stack of effect IDs
//! plus a pause counter. Running an effect pushes its ID and the returned
//! guard pops it again, also when the effect panics.
//!
//! A pause applies to the frame that raised it. Entering an effect starts
//! with tracking resumed and leaving it restores the outer pause count, so
//! an effect first run inside an untracked scope still records its reads.
//!
//! An effect that is already on the stack is never pushed a second time.
//! This is what stops an effect that writes a location it also reads from
//! re-running itself forever.

use std::cell::{Cell, RefCell};

use super::EffectId;

/// Stack of running effects and the tracking pause flag.
#[derive(Debug, Default)]
pub struct ExecutionContext {
    stack: RefCell<Vec<EffectId>>,
    paused: Cell<usize>,
}

impl ExecutionContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `effect` the active effect until the guard drops. Any pause in
    /// force is lifted for the effect's frame and restored by the guard.
    ///
    /// Returns `None` when the effect is already running somewhere up the
    /// stack.
    pub fn enter(&self, effect: EffectId) -> Option<ContextGuard<'_>> {
        let mut stack = self.stack.borrow_mut();
        if stack.contains(&effect) {
            return None;
        }
        stack.push(effect);
        Some(ContextGuard {
            context: self,
            effect,
            outer_paused: self.paused.replace(0),
        })
    }

    /// The effect reads are currently attributed to.
    pub fn active(&self) -> Option<EffectId> {
        self.stack.borrow().last().copied()
    }

    /// Whether `effect` is anywhere on the stack.
    pub fn is_running(&self, effect: EffectId) -> bool {
        self.stack.borrow().contains(&effect)
    }

    /// Number of nested running effects.
    pub fn depth(&self) -> usize {
        self.stack.borrow().len()
    }

    /// Whether reads are currently not recorded.
    ///
    /// Tracking is paused when no effect is running, or when it has been
    /// suppressed explicitly with [`pause`](Self::pause), whichever holds.
    pub fn is_tracking_paused(&self) -> bool {
        self.paused.get() > 0 || self.active().is_none()
    }

    /// Suppress tracking in the current frame until the guard drops. Pauses
    /// nest.
    pub fn pause(&self) -> PauseGuard<'_> {
        self.paused.set(self.paused.get() + 1);
        PauseGuard { context: self }
    }
}

/// Pops the running effect and restores the outer pause count when
/// dropped.
pub struct ContextGuard<'a> {
    context: &'a ExecutionContext,
    effect: EffectId,
    outer_paused: usize,
}

impl Drop for ContextGuard<'_> {
    fn drop(&mut self) {
        let popped = self.context.stack.borrow_mut().pop();
        self.context.paused.set(self.outer_paused);

        // Guards are strictly nested, so the top must be ours.
        debug_assert_eq!(
            popped,
            Some(self.effect),
            "ExecutionContext mismatch: expected {:?}, got {:?}",
            self.effect,
            popped
        );
    }
}

/// Resumes tracking when dropped.
pub struct PauseGuard<'a> {
    context: &'a ExecutionContext,
}

impl Drop for PauseGuard<'_> {
    fn drop(&mut self) {
        let paused = self.context.paused.get();
        self.context.paused.set(paused.saturating_sub(1));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn context_tracks_active_effect() {
        let context = ExecutionContext::new();
        let id = EffectId::new();

        assert!(context.active().is_none());
        assert!(context.is_tracking_paused());

        {
            let _guard = context.enter(id).unwrap();
            assert_eq!(context.active(), Some(id));
            assert!(!context.is_tracking_paused());
        }

        // Context should be cleaned up after drop
        assert!(context.active().is_none());
        assert_eq!(context.depth(), 0);
    }

    #[test]
    fn nested_contexts_restore_outer_effect() {
        let context = ExecutionContext::new();
        let id1 = EffectId::new();
        let id2 = EffectId::new();

        {
            let _outer = context.enter(id1).unwrap();
            {
                let _inner = context.enter(id2).unwrap();
                assert_eq!(context.active(), Some(id2));
                assert_eq!(context.depth(), 2);
            }
            // After inner guard drops, outer should be active
            assert_eq!(context.active(), Some(id1));
        }

        assert!(context.active().is_none());
    }

    #[test]
    fn effect_already_on_stack_is_not_reentered() {
        let context = ExecutionContext::new();
        let id = EffectId::new();
        let other = EffectId::new();

        let _outer = context.enter(id).unwrap();
        let _inner = context.enter(other).unwrap();

        assert!(context.enter(id).is_none());
        assert!(context.is_running(id));
        assert_eq!(context.depth(), 2);
    }

    #[test]
    fn pause_suppresses_tracking_and_nests() {
        let context = ExecutionContext::new();
        let _guard = context.enter(EffectId::new()).unwrap();

        {
            let _p1 = context.pause();
            {
                let _p2 = context.pause();
                assert!(context.is_tracking_paused());
            }
            assert!(context.is_tracking_paused());
        }

        assert!(!context.is_tracking_paused());
    }

    #[test]
    fn pause_is_scoped_to_its_frame() {
        let context = ExecutionContext::new();
        let outer = EffectId::new();
        let inner = EffectId::new();

        let _outer = context.enter(outer).unwrap();
        let _pause = context.pause();
        assert!(context.is_tracking_paused());

        {
            let _inner = context.enter(inner).unwrap();
            assert!(!context.is_tracking_paused());
        }

        // Back in the outer frame the pause holds again.
        assert!(context.is_tracking_paused());
    }

    #[test]
    fn guard_pops_during_unwind() {
        let context = ExecutionContext::new();
        let id = EffectId::new();

        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let _guard = context.enter(id).unwrap();
            panic!("boom");
        }));

        assert!(result.is_err());
        assert_eq!(context.depth(), 0);
    }
}
