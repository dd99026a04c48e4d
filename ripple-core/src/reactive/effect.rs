//! Effect Implementation
//!
//! An Effect is a computation that re-runs whenever the reactive data it read
//! during its last run changes.
//!
//! # How Effects Work
//!
//! 1. Unless created lazy, the effect runs once immediately to establish its
//!    initial dependencies.
//!
//! 2. Before every run the effect leaves all subscriber sets it joined, then
//!    re-subscribes to whatever the new run reads. Dependencies that are no
//!    longer read stop triggering it.
//!
//! 3. When a dependency is written, the effect is handed to its scheduler if
//!    it has one, and run synchronously otherwise.
//!
//! # Reentrancy
//!
//! An effect that is already on the effect stack does not run again; the
//! nested call returns `undefined`. Together with the trigger-side exclusion
//! of the active effect this keeps `count += 1` inside an effect from
//! recursing.
//!
//! # Stopping
//!
//! [`Effect::stop`] removes the effect from every subscriber set and calls
//! `on_stop` once. A stopped effect is never triggered again; running it by
//! hand calls the function untracked (or does nothing when a scheduler is
//! set).

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::debug;

use super::context::EffectScope;
use super::runtime::{Runtime, WeakRuntime};
use crate::graph::{Dep, TrackKey, TrackOp, TriggerOp};
use crate::value::{ObjectId, Value};

/// Unique identifier for an effect.
///
/// Used as the membership key of subscriber sets, so an effect subscribes at
/// most once per `(source, key)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriberId(u64);

impl SubscriberId {
    /// Generate a new unique subscriber ID.
    pub fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl Default for SubscriberId {
    fn default() -> Self {
        Self::new()
    }
}

/// Called instead of running the effect when it is triggered.
pub type Scheduler = Arc<dyn Fn(&Effect) + Send + Sync>;

/// Debug hook for track and trigger events.
pub type DebugHook = Arc<dyn Fn(&DebuggerEvent) + Send + Sync>;

/// Called once when an effect is stopped.
pub type StopHook = Arc<dyn Fn() + Send + Sync>;

/// Which operation a [`DebuggerEvent`] reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DebugOp {
    Track(TrackOp),
    Trigger(TriggerOp),
}

/// Payload of the `on_track` and `on_trigger` hooks.
#[derive(Debug, Clone)]
pub struct DebuggerEvent {
    pub effect: Effect,
    /// Identity of the raw source.
    pub target: ObjectId,
    pub op: DebugOp,
    pub key: Option<TrackKey>,
    pub new_value: Option<Value>,
    pub old_value: Option<Value>,
    /// Snapshot of a collection taken before it was cleared.
    pub old_target: Option<Value>,
}

/// Options accepted by [`Runtime::effect_with`].
#[derive(Clone, Default)]
pub struct EffectOptions {
    /// Do not run on creation.
    pub lazy: bool,
    /// Runs before plain effects in a trigger batch.
    pub computed: bool,
    pub scheduler: Option<Scheduler>,
    pub on_track: Option<DebugHook>,
    pub on_trigger: Option<DebugHook>,
    pub on_stop: Option<StopHook>,
}

impl EffectOptions {
    pub fn lazy(mut self) -> Self {
        self.lazy = true;
        self
    }

    pub fn computed(mut self) -> Self {
        self.computed = true;
        self
    }

    pub fn scheduler(mut self, scheduler: impl Fn(&Effect) + Send + Sync + 'static) -> Self {
        self.scheduler = Some(Arc::new(scheduler));
        self
    }

    pub fn on_track(mut self, hook: impl Fn(&DebuggerEvent) + Send + Sync + 'static) -> Self {
        self.on_track = Some(Arc::new(hook));
        self
    }

    pub fn on_trigger(mut self, hook: impl Fn(&DebuggerEvent) + Send + Sync + 'static) -> Self {
        self.on_trigger = Some(Arc::new(hook));
        self
    }

    pub fn on_stop(mut self, hook: impl Fn() + Send + Sync + 'static) -> Self {
        self.on_stop = Some(Arc::new(hook));
        self
    }
}

impl fmt::Debug for EffectOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EffectOptions")
            .field("lazy", &self.lazy)
            .field("computed", &self.computed)
            .field("scheduler", &self.scheduler.is_some())
            .field("on_track", &self.on_track.is_some())
            .field("on_trigger", &self.on_trigger.is_some())
            .field("on_stop", &self.on_stop.is_some())
            .finish()
    }
}

struct EffectInner {
    id: SubscriberId,
    runtime: WeakRuntime,
    func: Box<dyn Fn() -> Value + Send + Sync>,
    active: AtomicBool,
    deps: Mutex<Vec<Dep>>,
    run_count: AtomicUsize,
    options: EffectOptions,
}

/// A reactive computation. Cloning shares the same effect.
#[derive(Clone)]
pub struct Effect {
    inner: Arc<EffectInner>,
}

impl Effect {
    /// Create an effect bound to `runtime` without running it.
    pub(crate) fn new<F, R>(runtime: &Runtime, func: F, options: EffectOptions) -> Self
    where
        F: Fn() -> R + Send + Sync + 'static,
        R: Into<Value>,
    {
        Self {
            inner: Arc::new(EffectInner {
                id: SubscriberId::new(),
                runtime: runtime.downgrade(),
                func: Box::new(move || func().into()),
                active: AtomicBool::new(true),
                deps: Mutex::new(Vec::new()),
                run_count: AtomicUsize::new(0),
                options,
            }),
        }
    }

    pub fn id(&self) -> SubscriberId {
        self.inner.id
    }

    /// `false` once stopped.
    pub fn is_active(&self) -> bool {
        self.inner.active.load(Ordering::SeqCst)
    }

    pub fn is_computed(&self) -> bool {
        self.inner.options.computed
    }

    pub fn options(&self) -> &EffectOptions {
        &self.inner.options
    }

    /// Number of completed tracked runs.
    pub fn run_count(&self) -> usize {
        self.inner.run_count.load(Ordering::SeqCst)
    }

    /// Number of subscriber sets the effect currently belongs to.
    pub fn dependency_count(&self) -> usize {
        self.inner.deps.lock().len()
    }

    /// Run the function, re-collecting dependencies, and return its result.
    pub fn run(&self) -> Value {
        if !self.is_active() {
            return if self.inner.options.scheduler.is_some() {
                Value::Undefined
            } else {
                (self.inner.func)()
            };
        }
        let Some(runtime) = self.inner.runtime.upgrade() else {
            return (self.inner.func)();
        };
        if runtime.context().lock().is_running(self.id()) {
            return Value::Undefined;
        }

        self.cleanup();
        let _scope = EffectScope::enter(&runtime, self.clone());
        let value = (self.inner.func)();
        self.inner.run_count.fetch_add(1, Ordering::SeqCst);
        value
    }

    /// Permanently deactivate the effect. Idempotent.
    pub fn stop(&self) {
        if self.inner.active.swap(false, Ordering::SeqCst) {
            self.cleanup();
            debug!(effect = self.id().raw(), "effect stopped");
            if let Some(on_stop) = &self.inner.options.on_stop {
                on_stop();
            }
        }
    }

    /// React to a trigger: hand off to the scheduler, or run now.
    pub(crate) fn schedule(&self) {
        if !self.is_active() {
            return;
        }
        match &self.inner.options.scheduler {
            Some(scheduler) => scheduler(self),
            None => {
                self.run();
            }
        }
    }

    /// Remember a subscriber set the effect joined.
    pub(crate) fn add_dep(&self, dep: Dep) {
        self.inner.deps.lock().push(dep);
    }

    /// Leave every subscriber set; sets left empty are pruned from the graph.
    fn cleanup(&self) {
        let deps = std::mem::take(&mut *self.inner.deps.lock());
        let emptied: Vec<Dep> = deps
            .into_iter()
            .filter(|dep| dep.remove(self.id()))
            .collect();
        if emptied.is_empty() {
            return;
        }
        if let Some(runtime) = self.inner.runtime.upgrade() {
            runtime.prune(&emptied);
        }
    }

    pub(crate) fn notify_track(&self, event: impl FnOnce() -> DebuggerEvent) {
        if let Some(hook) = &self.inner.options.on_track {
            hook(&event());
        }
    }

    pub(crate) fn notify_trigger(&self, event: impl FnOnce() -> DebuggerEvent) {
        if let Some(hook) = &self.inner.options.on_trigger {
            hook(&event());
        }
    }
}

impl PartialEq for Effect {
    fn eq(&self, other: &Self) -> bool {
        self.id() == other.id()
    }
}

impl Eq for Effect {}

impl fmt::Debug for Effect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Effect")
            .field("id", &self.id().raw())
            .field("run_count", &self.run_count())
            .field("dependency_count", &self.dependency_count())
            .field("active", &self.is_active())
            .finish()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicI32;

    #[test]
    fn subscriber_ids_are_unique() {
        let id1 = SubscriberId::new();
        let id2 = SubscriberId::new();
        assert_ne!(id1, id2);
    }

    #[test]
    fn effect_runs_on_creation() {
        let rt = Runtime::new();
        let run_count = Arc::new(AtomicI32::new(0));
        let run_count_clone = run_count.clone();

        let effect = rt.effect(move || {
            run_count_clone.fetch_add(1, Ordering::SeqCst);
        });

        assert_eq!(run_count.load(Ordering::SeqCst), 1);
        assert_eq!(effect.run_count(), 1);
    }

    #[test]
    fn lazy_effect_waits_for_run() {
        let rt = Runtime::new();
        let effect = rt.effect_with(|| 42, EffectOptions::default().lazy());

        assert_eq!(effect.run_count(), 0);
        assert_eq!(effect.run(), Value::from(42));
        assert_eq!(effect.run_count(), 1);
    }

    #[test]
    fn effect_reruns_on_dependency_change() {
        let rt = Runtime::new();
        let count = rt.signal(0);
        let seen = Arc::new(AtomicI32::new(-1));

        let count_clone = count.clone();
        let seen_clone = seen.clone();
        let effect = rt.effect(move || {
            let n = count_clone.get().as_number().unwrap_or(-1.0);
            seen_clone.store(n as i32, Ordering::SeqCst);
        });

        count.set(5);
        assert_eq!(seen.load(Ordering::SeqCst), 5);
        assert_eq!(effect.run_count(), 2);
        assert_eq!(effect.dependency_count(), 1);
    }

    #[test]
    fn stale_dependencies_are_dropped() {
        let rt = Runtime::new();
        let flag = rt.signal(true);
        let a = rt.signal("a");
        let b = rt.signal("b");

        let (flag_c, a_c, b_c) = (flag.clone(), a.clone(), b.clone());
        let effect = rt.effect(move || {
            if flag_c.get() == Value::from(true) {
                a_c.get()
            } else {
                b_c.get()
            }
        });
        assert_eq!(effect.run_count(), 1);

        flag.set(false);
        assert_eq!(effect.run_count(), 2);

        // `a` is no longer read.
        a.set("changed");
        assert_eq!(effect.run_count(), 2);

        b.set("changed");
        assert_eq!(effect.run_count(), 3);
    }

    #[test]
    fn stopped_effect_is_never_triggered() {
        let rt = Runtime::new();
        let count = rt.signal(0);
        let stops = Arc::new(AtomicI32::new(0));

        let count_clone = count.clone();
        let stops_clone = stops.clone();
        let effect = rt.effect_with(
            move || count_clone.get(),
            EffectOptions::default().on_stop(move || {
                stops_clone.fetch_add(1, Ordering::SeqCst);
            }),
        );

        effect.stop();
        effect.stop();
        assert!(!effect.is_active());
        assert_eq!(stops.load(Ordering::SeqCst), 1);
        assert_eq!(effect.dependency_count(), 0);

        count.set(1);
        assert_eq!(effect.run_count(), 1);

        // Manual runs call the function without subscribing.
        assert_eq!(effect.run(), Value::from(1));
        assert_eq!(effect.dependency_count(), 0);
    }

    #[test]
    fn stopped_effect_with_scheduler_runs_nothing() {
        let rt = Runtime::new();
        let effect = rt.effect_with(|| 1, EffectOptions::default().scheduler(|_| {}));
        effect.stop();
        assert_eq!(effect.run(), Value::Undefined);
    }

    #[test]
    fn scheduler_replaces_synchronous_run() {
        let rt = Runtime::new();
        let count = rt.signal(0);
        let scheduled = Arc::new(AtomicI32::new(0));

        let count_clone = count.clone();
        let scheduled_clone = scheduled.clone();
        let effect = rt.effect_with(
            move || count_clone.get(),
            EffectOptions::default().scheduler(move |_| {
                scheduled_clone.fetch_add(1, Ordering::SeqCst);
            }),
        );

        count.set(1);
        count.set(2);
        assert_eq!(scheduled.load(Ordering::SeqCst), 2);
        assert_eq!(effect.run_count(), 1);

        effect.run();
        assert_eq!(effect.run_count(), 2);
    }

    #[test]
    fn effect_clone_shares_state() {
        let rt = Runtime::new();
        let effect1 = rt.effect(|| ());
        let effect2 = effect1.clone();

        assert_eq!(effect1, effect2);
        effect1.run();
        assert_eq!(effect2.run_count(), 2);

        effect1.stop();
        assert!(!effect2.is_active());
    }

    #[test]
    fn effect_outlives_runtime() {
        let rt = Runtime::new();
        let effect = rt.effect_with(|| "still runs", EffectOptions::default().lazy());
        drop(rt);
        assert_eq!(effect.run(), Value::from("still runs"));
        assert_eq!(effect.run_count(), 0);
    }
}
