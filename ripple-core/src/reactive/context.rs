//! Reactive Context
//!
//! The reactive context tracks which effect is currently running and whether
//! reads should be recorded at all.
//!
//! # Implementation
//!
//! Each [`Runtime`] owns one [`ContextState`]:
//!
//! - an *effect stack*; its top is the active effect. Nested runs push and pop
//!   in strict LIFO order, so the outer effect becomes active again once an
//!   inner one finishes.
//! - a *tracking flag* plus a stack of previous flag values, so pause and
//!   enable calls nest and [`ContextState::reset_tracking`] restores whatever
//!   was in force before.
//!
//! Both stacks are only ever modified through the RAII guards in this module
//! (or the public pause/enable/reset calls), so they are restored even if an
//! effect body panics.

use tracing::trace;

use super::effect::{Effect, SubscriberId};
use super::runtime::Runtime;

/// Per-runtime context: effect stack and tracking toggle.
#[derive(Debug)]
pub(crate) struct ContextState {
    effect_stack: Vec<Effect>,
    should_track: bool,
    track_stack: Vec<bool>,
}

impl Default for ContextState {
    fn default() -> Self {
        Self {
            effect_stack: Vec::new(),
            should_track: true,
            track_stack: Vec::new(),
        }
    }
}

impl ContextState {
    /// The effect currently running, if any.
    pub(crate) fn active_effect(&self) -> Option<&Effect> {
        self.effect_stack.last()
    }

    /// Whether the effect is anywhere on the stack.
    pub(crate) fn is_running(&self, id: SubscriberId) -> bool {
        self.effect_stack.iter().any(|effect| effect.id() == id)
    }

    pub(crate) fn should_track(&self) -> bool {
        self.should_track
    }

    pub(crate) fn depth(&self) -> usize {
        self.effect_stack.len()
    }

    pub(crate) fn pause_tracking(&mut self) {
        self.track_stack.push(self.should_track);
        self.should_track = false;
    }

    pub(crate) fn enable_tracking(&mut self) {
        self.track_stack.push(self.should_track);
        self.should_track = true;
    }

    /// Restore the tracking flag saved by the matching pause or enable. With
    /// nothing saved, tracking is on.
    pub(crate) fn reset_tracking(&mut self) {
        self.should_track = self.track_stack.pop().unwrap_or(true);
    }

    fn push_effect(&mut self, effect: Effect) {
        self.effect_stack.push(effect);
    }

    fn pop_effect(&mut self) -> Option<Effect> {
        self.effect_stack.pop()
    }
}

/// Guard that keeps an effect on the stack while it runs.
///
/// Entering pushes the effect and enables tracking; dropping pops the effect
/// and restores the previous tracking flag.
pub(crate) struct EffectScope {
    runtime: Runtime,
    id: SubscriberId,
}

impl EffectScope {
    pub(crate) fn enter(runtime: &Runtime, effect: Effect) -> Self {
        let id = effect.id();
        {
            let mut ctx = runtime.context().lock();
            ctx.push_effect(effect);
            ctx.enable_tracking();
            trace!(effect = id.raw(), depth = ctx.depth(), "effect scope entered");
        }
        Self {
            runtime: runtime.clone(),
            id,
        }
    }
}

impl Drop for EffectScope {
    fn drop(&mut self) {
        let mut ctx = self.runtime.context().lock();
        let popped = ctx.pop_effect();
        ctx.reset_tracking();

        // Catches scopes dropped out of order.
        if let Some(effect) = popped {
            debug_assert_eq!(
                effect.id(),
                self.id,
                "EffectScope mismatch: expected {:?}, got {:?}",
                self.id,
                effect.id()
            );
        }
    }
}

/// Guard returned by [`Runtime::pause_scope`]: tracking stays paused until
/// it is dropped.
#[must_use = "tracking resumes as soon as the guard is dropped"]
pub struct TrackingGuard {
    runtime: Runtime,
}

impl TrackingGuard {
    pub(crate) fn pause(runtime: &Runtime) -> Self {
        runtime.context().lock().pause_tracking();
        Self {
            runtime: runtime.clone(),
        }
    }
}

impl Drop for TrackingGuard {
    fn drop(&mut self) {
        self.runtime.context().lock().reset_tracking();
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reactive::EffectOptions;

    fn lazy_effect(rt: &Runtime) -> Effect {
        rt.effect_with(|| (), EffectOptions::default().lazy())
    }

    #[test]
    fn scope_tracks_active_effect() {
        let rt = Runtime::new();
        let effect = lazy_effect(&rt);

        assert!(rt.active_effect().is_none());
        {
            let _scope = EffectScope::enter(&rt, effect.clone());
            assert_eq!(rt.active_effect(), Some(effect.clone()));
            assert!(rt.is_tracking());
        }

        // Scope should be cleaned up after drop
        assert!(rt.active_effect().is_none());
        assert!(!rt.is_tracking());
    }

    #[test]
    fn nested_scopes() {
        let rt = Runtime::new();
        let outer = lazy_effect(&rt);
        let inner = lazy_effect(&rt);

        {
            let _outer = EffectScope::enter(&rt, outer.clone());
            {
                let _inner = EffectScope::enter(&rt, inner.clone());
                assert_eq!(rt.active_effect(), Some(inner.clone()));
                assert!(rt.context().lock().is_running(outer.id()));
            }

            // After the inner scope drops, the outer effect is active again
            assert_eq!(rt.active_effect(), Some(outer.clone()));
        }

        assert!(rt.active_effect().is_none());
    }

    #[test]
    fn tracking_toggles_nest() {
        let mut ctx = ContextState::default();
        assert!(ctx.should_track());

        ctx.pause_tracking();
        ctx.enable_tracking();
        assert!(ctx.should_track());

        ctx.reset_tracking();
        assert!(!ctx.should_track());

        ctx.reset_tracking();
        assert!(ctx.should_track());

        // Unbalanced reset falls back to tracking.
        ctx.pause_tracking();
        ctx.reset_tracking();
        ctx.reset_tracking();
        assert!(ctx.should_track());
    }

    #[test]
    fn scope_restores_paused_tracking() {
        let rt = Runtime::new();
        let effect = lazy_effect(&rt);

        let _paused = rt.pause_scope();
        {
            let _scope = EffectScope::enter(&rt, effect);
            assert!(rt.context().lock().should_track());
        }
        assert!(!rt.context().lock().should_track());
    }

    #[test]
    fn guard_restores_after_panic() {
        let rt = Runtime::new();
        let effect = lazy_effect(&rt);

        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let _scope = EffectScope::enter(&rt, effect.clone());
            let _paused = TrackingGuard::pause(&rt);
            panic!("effect body failed");
        }));

        assert!(result.is_err());
        assert!(rt.active_effect().is_none());
        assert!(rt.context().lock().should_track());
    }
}
