//! Reactive Runtime
//!
//! The runtime is the explicit context that everything reactive is created
//! from. It owns the dependency graph, the effect stack and tracking toggle,
//! the wrapper registry and the configuration.
//!
//! # How It Works
//!
//! 1. Reading through a view, signal or computed calls [`Runtime::track`],
//!    which subscribes the active effect to `(source, key)` and remembers the
//!    reverse edge on the effect.
//!
//! 2. Writing calls [`Runtime::trigger`], which:
//!    a. resolves the affected subscriber sets,
//!    b. drops the active effect while it is tracking (no self-trigger),
//!    c. deduplicates, putting computed effects before plain ones,
//!    d. hands each effect to its scheduler or runs it synchronously.
//!
//! # Thread Safety
//!
//! The runtime is `Send + Sync` and cheap to clone. Internal locks are never
//! held while user code runs: `track` and `trigger` take snapshots, release
//! their locks, then call hooks, schedulers and effects. Effects running on
//! several threads at once share a single effect stack, so hosts that
//! multi-thread should give each thread its own runtime.
//!
//! Views, signals and computeds only hold a weak reference to their runtime.
//! Once every [`Runtime`] handle is dropped they keep working as plain,
//! untracked data.

use std::collections::HashSet;
use std::fmt;
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use smallvec::SmallVec;
use tracing::trace;

use super::computed::Computed;
use super::context::{ContextState, TrackingGuard};
use super::effect::{DebugOp, DebuggerEvent, Effect, EffectOptions};
use super::signal::Signal;
use crate::config::RuntimeConfig;
use crate::graph::{Dep, TargetMap, TrackKey, TrackOp, TriggerOp};
use crate::proxy::Mode;
use crate::registry::Registry;
use crate::value::{ObjectId, TargetKind, Value};

/// A write announced to [`Runtime::trigger`].
#[derive(Debug, Clone)]
pub struct Change {
    pub op: TriggerOp,
    pub key: Option<TrackKey>,
    pub new_value: Option<Value>,
    pub old_value: Option<Value>,
    /// Collections only: a snapshot taken before `clear`.
    pub old_target: Option<Value>,
}

impl Change {
    fn new(op: TriggerOp, key: Option<TrackKey>) -> Self {
        Self {
            op,
            key,
            new_value: None,
            old_value: None,
            old_target: None,
        }
    }

    pub fn set(key: TrackKey, new_value: Value, old_value: Value) -> Self {
        Self {
            new_value: Some(new_value),
            old_value: Some(old_value),
            ..Self::new(TriggerOp::Set, Some(key))
        }
    }

    pub fn add(key: TrackKey, new_value: Value) -> Self {
        Self {
            new_value: Some(new_value),
            ..Self::new(TriggerOp::Add, Some(key))
        }
    }

    pub fn delete(key: TrackKey, old_value: Option<Value>) -> Self {
        Self {
            old_value,
            ..Self::new(TriggerOp::Delete, Some(key))
        }
    }

    pub fn clear(old_target: Option<Value>) -> Self {
        Self {
            old_target,
            ..Self::new(TriggerOp::Clear, None)
        }
    }

    /// A `Set` on `key` with no recorded values.
    pub fn touch(key: TrackKey) -> Self {
        Self::new(TriggerOp::Set, Some(key))
    }
}

pub(crate) struct RuntimeInner {
    config: RuntimeConfig,
    targets: Mutex<TargetMap>,
    context: Mutex<ContextState>,
    registry: Registry,
}

/// Handle to a reactivity runtime. Clones share the same runtime.
#[derive(Clone)]
pub struct Runtime {
    inner: Arc<RuntimeInner>,
}

impl Default for Runtime {
    fn default() -> Self {
        Self::new()
    }
}

impl Runtime {
    pub fn new() -> Self {
        Self::with_config(RuntimeConfig::default())
    }

    pub fn with_config(config: RuntimeConfig) -> Self {
        Self {
            inner: Arc::new(RuntimeInner {
                config,
                targets: Mutex::new(TargetMap::new()),
                context: Mutex::new(ContextState::default()),
                registry: Registry::default(),
            }),
        }
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.inner.config
    }

    pub(crate) fn warnings_enabled(&self) -> bool {
        self.inner.config.dev_warnings
    }

    pub(crate) fn context(&self) -> &Mutex<ContextState> {
        &self.inner.context
    }

    pub(crate) fn registry(&self) -> &Registry {
        &self.inner.registry
    }

    pub(crate) fn downgrade(&self) -> WeakRuntime {
        WeakRuntime(Arc::downgrade(&self.inner))
    }

    // ------------------------------------------------------------------
    // Dependency graph
    // ------------------------------------------------------------------

    /// Subscribe the active effect to `(target, key)`.
    ///
    /// Does nothing while tracking is paused or no effect is running.
    /// `TrackOp::Iterate` always records the synthetic `ITERATE` key, except
    /// for key-only map iteration.
    pub fn track(&self, target: ObjectId, op: TrackOp, key: TrackKey) {
        let effect = {
            let ctx = self.inner.context.lock();
            if !ctx.should_track() {
                return;
            }
            match ctx.active_effect() {
                Some(effect) if effect.is_active() => effect.clone(),
                _ => return,
            }
        };

        let key = match (op, key) {
            (TrackOp::Iterate, TrackKey::MapKeyIterate) => TrackKey::MapKeyIterate,
            (TrackOp::Iterate, _) => TrackKey::Iterate,
            (_, key) => key,
        };

        let dep = self.inner.targets.lock().dep(target, key.clone());
        if dep.insert(&effect) {
            effect.add_dep(dep);
            trace!(effect = effect.id().raw(), target = target.raw(), ?op, ?key, "tracked");
            effect.notify_track(|| DebuggerEvent {
                effect: effect.clone(),
                target,
                op: DebugOp::Track(op),
                key: Some(key.clone()),
                new_value: None,
                old_value: None,
                old_target: None,
            });
        }
    }

    /// Notify every effect depending on the slots a write affects.
    ///
    /// `kind` is the structural family of the raw source, or `None` for
    /// single-value cells.
    pub fn trigger(&self, target: ObjectId, kind: Option<TargetKind>, change: Change) {
        let deps = self.inner.targets.lock().collect(
            target,
            kind,
            change.op,
            change.key.as_ref(),
            change.new_value.as_ref(),
        );
        if deps.is_empty() {
            return;
        }

        let (active, tracking) = {
            let ctx = self.inner.context.lock();
            (ctx.active_effect().map(Effect::id), ctx.should_track())
        };

        let mut seen = HashSet::new();
        let mut computed: SmallVec<[Effect; 4]> = SmallVec::new();
        // Plain effects carry their run count at collection time.
        let mut plain: SmallVec<[(Effect, usize); 8]> = SmallVec::new();
        for dep in &deps {
            for effect in dep.subscribers() {
                if tracking && Some(effect.id()) == active {
                    continue;
                }
                if !seen.insert(effect.id()) {
                    continue;
                }
                if effect.is_computed() {
                    computed.push(effect);
                } else {
                    let runs = effect.run_count();
                    plain.push((effect, runs));
                }
            }
        }

        trace!(
            target = target.raw(),
            op = ?change.op,
            key = ?change.key,
            computed = computed.len(),
            effects = plain.len(),
            "triggered"
        );

        let dispatch = |effect: &Effect| {
            effect.notify_trigger(|| DebuggerEvent {
                effect: effect.clone(),
                target,
                op: DebugOp::Trigger(change.op),
                key: change.key.clone(),
                new_value: change.new_value.clone(),
                old_value: change.old_value.clone(),
                old_target: change.old_target.clone(),
            });
            effect.schedule();
        };

        for effect in &computed {
            dispatch(effect);
        }
        // A plain effect reading an invalidated computed has already re-run
        // through that computed; it sees this write and is not run again.
        for (effect, runs) in &plain {
            if effect.run_count() == *runs {
                dispatch(effect);
            }
        }
    }

    /// Number of effects subscribed to `(target, key)`.
    pub fn subscriber_count(&self, target: ObjectId, key: &TrackKey) -> usize {
        self.inner
            .targets
            .lock()
            .get(target, key)
            .map_or(0, |dep| dep.len())
    }

    /// Whether any effect is currently subscribed to the source.
    pub fn is_tracked(&self, target: ObjectId) -> bool {
        self.inner.targets.lock().is_tracked(target)
    }

    /// Remove emptied subscriber sets from the graph.
    pub(crate) fn prune(&self, deps: &[Dep]) {
        let mut targets = self.inner.targets.lock();
        for dep in deps {
            targets.prune(dep);
        }
    }

    // ------------------------------------------------------------------
    // Effects and tracking control
    // ------------------------------------------------------------------

    /// Create an effect and run it once.
    pub fn effect<F, R>(&self, func: F) -> Effect
    where
        F: Fn() -> R + Send + Sync + 'static,
        R: Into<Value>,
    {
        self.effect_with(func, EffectOptions::default())
    }

    /// Create an effect with options; it runs once unless `lazy` is set.
    pub fn effect_with<F, R>(&self, func: F, options: EffectOptions) -> Effect
    where
        F: Fn() -> R + Send + Sync + 'static,
        R: Into<Value>,
    {
        let lazy = options.lazy;
        let effect = Effect::new(self, func, options);
        if !lazy {
            effect.run();
        }
        effect
    }

    /// The effect currently running, if any.
    pub fn active_effect(&self) -> Option<Effect> {
        self.inner.context.lock().active_effect().cloned()
    }

    /// Whether a read right now would be recorded.
    pub fn is_tracking(&self) -> bool {
        let ctx = self.inner.context.lock();
        ctx.should_track() && ctx.active_effect().is_some()
    }

    pub fn pause_tracking(&self) {
        self.inner.context.lock().pause_tracking();
    }

    pub fn enable_tracking(&self) {
        self.inner.context.lock().enable_tracking();
    }

    /// Undo the most recent unmatched pause or enable.
    pub fn reset_tracking(&self) {
        self.inner.context.lock().reset_tracking();
    }

    /// Pause tracking until the returned guard is dropped.
    pub fn pause_scope(&self) -> TrackingGuard {
        TrackingGuard::pause(self)
    }

    /// Run `f` with tracking paused.
    pub fn untracked<R>(&self, f: impl FnOnce() -> R) -> R {
        let _paused = self.pause_scope();
        f()
    }

    // ------------------------------------------------------------------
    // Cells
    // ------------------------------------------------------------------

    /// A deep signal: composite values are stored as reactive views.
    pub fn signal(&self, value: impl Into<Value>) -> Signal {
        Signal::new(self, value.into(), false)
    }

    /// A signal that stores its value as-is.
    pub fn shallow_signal(&self, value: impl Into<Value>) -> Signal {
        Signal::new(self, value.into(), true)
    }

    /// A readonly computed value.
    pub fn computed<G, R>(&self, getter: G) -> Computed
    where
        G: Fn() -> R + Send + Sync + 'static,
        R: Into<Value>,
    {
        Computed::new(self, getter, None)
    }

    /// A computed value whose writes go to `setter`.
    pub fn writable_computed<G, R, S>(&self, getter: G, setter: S) -> Computed
    where
        G: Fn() -> R + Send + Sync + 'static,
        R: Into<Value>,
        S: Fn(Value) + Send + Sync + 'static,
    {
        Computed::new(self, getter, Some(Box::new(setter)))
    }
}

impl fmt::Debug for Runtime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let ctx = self.inner.context.lock();
        f.debug_struct("Runtime")
            .field("config", &self.inner.config)
            .field("effect_depth", &ctx.depth())
            .field("should_track", &ctx.should_track())
            .finish()
    }
}

/// Non-owning runtime reference held by views and cells.
///
/// Every operation degrades to plain, untracked behavior once the runtime is
/// gone.
#[derive(Clone, Default)]
pub(crate) struct WeakRuntime(Weak<RuntimeInner>);

impl WeakRuntime {
    pub(crate) fn upgrade(&self) -> Option<Runtime> {
        self.0.upgrade().map(|inner| Runtime { inner })
    }

    pub(crate) fn track(&self, target: ObjectId, op: TrackOp, key: TrackKey) {
        if let Some(runtime) = self.upgrade() {
            runtime.track(target, op, key);
        }
    }

    pub(crate) fn trigger(&self, target: ObjectId, kind: Option<TargetKind>, change: Change) {
        if let Some(runtime) = self.upgrade() {
            runtime.trigger(target, kind, change);
        }
    }

    /// Wrap a composite value in `mode`; anything else, or anything
    /// ineligible, comes back unchanged.
    pub(crate) fn convert(&self, value: Value, mode: Mode) -> Value {
        match self.upgrade() {
            Some(runtime) if value.is_composite() => match runtime.try_wrap(&value, mode) {
                Ok(view) => Value::Reactive(view),
                Err(_) => value,
            },
            _ => value,
        }
    }

    pub(crate) fn pause_scope(&self) -> Option<TrackingGuard> {
        self.upgrade().map(|runtime| runtime.pause_scope())
    }

    pub(crate) fn warnings_enabled(&self) -> bool {
        self.upgrade()
            .is_some_and(|runtime| runtime.warnings_enabled())
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicI32, Ordering};

    fn counter() -> (Arc<AtomicI32>, Arc<AtomicI32>) {
        let count = Arc::new(AtomicI32::new(0));
        (count.clone(), count)
    }

    #[test]
    fn track_outside_effect_is_a_no_op() {
        let rt = Runtime::new();
        let target = ObjectId::new();
        rt.track(target, TrackOp::Get, TrackKey::value());
        assert!(!rt.is_tracked(target));
    }

    #[test]
    fn trigger_runs_subscribers_once() {
        let rt = Runtime::new();
        let target = ObjectId::new();
        let (runs, runs_clone) = counter();

        let rt_clone = rt.clone();
        rt.effect(move || {
            runs_clone.fetch_add(1, Ordering::SeqCst);
            rt_clone.track(target, TrackOp::Get, TrackKey::Prop("a".into()));
            rt_clone.track(target, TrackOp::Iterate, TrackKey::Prop("ignored".into()));
        });
        assert_eq!(runs.load(Ordering::SeqCst), 1);
        assert_eq!(rt.subscriber_count(target, &TrackKey::Iterate), 1);

        // `a` and ITERATE both match an ADD of `a`; the effect runs once.
        rt.trigger(
            target,
            Some(TargetKind::Record),
            Change::add(TrackKey::Prop("a".into()), Value::from(1)),
        );
        assert_eq!(runs.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn paused_tracking_records_nothing() {
        let rt = Runtime::new();
        let target = ObjectId::new();

        let rt_clone = rt.clone();
        let effect = rt.effect(move || {
            rt_clone.untracked(|| rt_clone.track(target, TrackOp::Get, TrackKey::value()));
            rt_clone.pause_tracking();
            rt_clone.enable_tracking();
            rt_clone.track(target, TrackOp::Has, TrackKey::Prop("b".into()));
            rt_clone.reset_tracking();
            rt_clone.reset_tracking();
        });

        assert_eq!(effect.dependency_count(), 1);
        assert_eq!(rt.subscriber_count(target, &TrackKey::value()), 0);
        assert!(rt.context().lock().should_track());
    }

    #[test]
    fn computed_effects_run_first() {
        let rt = Runtime::new();
        let target = ObjectId::new();
        let order = Arc::new(Mutex::new(Vec::new()));

        let make = |label: &'static str, options: EffectOptions| {
            let rt_clone = rt.clone();
            let order = order.clone();
            rt.effect_with(
                move || {
                    rt_clone.track(target, TrackOp::Get, TrackKey::value());
                    order.lock().push(label);
                },
                options,
            )
        };
        make("plain", EffectOptions::default());
        make("computed", EffectOptions::default().computed());
        order.lock().clear();

        rt.trigger(target, None, Change::touch(TrackKey::value()));
        assert_eq!(*order.lock(), vec!["computed", "plain"]);
    }

    #[test]
    fn plain_effect_reading_a_computed_reruns_once() {
        let rt = Runtime::new();
        let source = rt.signal(1);
        let doubled = {
            let source = source.clone();
            rt.computed(move || source.get().as_number().unwrap_or(0.0) * 2.0)
        };

        let (runs, runs_clone) = counter();
        let (src, comp) = (source.clone(), doubled.clone());
        rt.effect(move || {
            src.get();
            comp.get();
            runs_clone.fetch_add(1, Ordering::SeqCst);
        });
        assert_eq!(runs.load(Ordering::SeqCst), 1);

        source.set(5);
        assert_eq!(runs.load(Ordering::SeqCst), 2);
        assert_eq!(doubled.get(), Value::from(10));
    }

    #[test]
    fn emptied_sources_leave_the_graph() {
        let rt = Runtime::new();
        let target = ObjectId::new();
        let rt_clone = rt.clone();
        let effect = rt.effect(move || {
            rt_clone.track(target, TrackOp::Get, TrackKey::Prop("a".into()));
            rt_clone.track(target, TrackOp::Iterate, TrackKey::Iterate);
        });
        assert!(rt.is_tracked(target));

        effect.stop();
        assert!(!rt.is_tracked(target));
        assert_eq!(rt.subscriber_count(target, &TrackKey::Iterate), 0);
    }

    #[test]
    fn shared_slots_survive_until_the_last_subscriber_leaves() {
        let rt = Runtime::new();
        let target = ObjectId::new();
        let subscribe = || {
            let rt_clone = rt.clone();
            rt.effect(move || rt_clone.track(target, TrackOp::Get, TrackKey::value()))
        };
        let first = subscribe();
        let second = subscribe();

        first.stop();
        assert_eq!(rt.subscriber_count(target, &TrackKey::value()), 1);
        second.stop();
        assert!(!rt.is_tracked(target));
    }

    #[test]
    fn debug_hooks_receive_events() {
        let rt = Runtime::new();
        let target = ObjectId::new();
        let events = Arc::new(Mutex::new(Vec::new()));

        let rt_clone = rt.clone();
        let (tracked, triggered) = (events.clone(), events.clone());
        rt.effect_with(
            move || rt_clone.track(target, TrackOp::Get, TrackKey::value()),
            EffectOptions::default()
                .on_track(move |e| tracked.lock().push((e.op, e.new_value.clone())))
                .on_trigger(move |e| triggered.lock().push((e.op, e.new_value.clone()))),
        );
        rt.trigger(
            target,
            None,
            Change::set(TrackKey::value(), Value::from(2), Value::from(1)),
        );

        let events = events.lock();
        assert_eq!(events[0], (DebugOp::Track(TrackOp::Get), None));
        assert_eq!(
            events[1],
            (DebugOp::Trigger(TriggerOp::Set), Some(Value::from(2)))
        );
        // The re-run left and re-joined the slot.
        assert_eq!(events[2], (DebugOp::Track(TrackOp::Get), None));
        assert_eq!(events.len(), 3);
    }

    #[test]
    fn weak_runtime_degrades_after_drop() {
        let rt = Runtime::new();
        let weak = rt.downgrade();
        assert!(weak.upgrade().is_some());
        drop(rt);

        assert!(weak.upgrade().is_none());
        assert!(!weak.warnings_enabled());
        assert!(weak.pause_scope().is_none());
        let value = weak.convert(Value::from(crate::value::Obj::record()), Mode::Reactive);
        assert!(value.as_object().is_some());
    }
}
