//! Computed Implementation
//!
//! A Computed is a cached derived value that re-evaluates only when one of
//! the values it read changes.
//!
//! # How Computeds Work
//!
//! 1. The getter runs inside a lazy effect flagged `computed`. Nothing runs
//!    until the first [`Computed::get`].
//!
//! 2. `get` on a dirty computed runs the effect, caches the result and marks
//!    it clean. `get` on a clean computed returns the cache.
//!
//! 3. When a dependency changes, the effect's scheduler does not recompute.
//!    It marks the computed dirty and triggers the computed's own `value`
//!    slot, so effects reading the computed re-run and pull the new value.
//!    A computed that is already dirty does not notify again.
//!
//! Because computed effects run before plain effects in a trigger batch, a
//! plain effect that reads a computed always sees it already invalidated.
//!
//! # States
//!
//! ```text
//!   Dirty --get()--> Clean --dependency changed--> Dirty
//! ```

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::RwLock;
use tracing::trace;

use super::effect::{Effect, EffectOptions};
use super::runtime::{Change, Runtime, WeakRuntime};
use crate::error::ReactivityError;
use crate::graph::{TrackKey, TrackOp};
use crate::value::{ObjectId, Value};

/// Setter of a writable computed.
pub type ComputedSetter = Box<dyn Fn(Value) + Send + Sync>;

/// Cache state of a computed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComputedState {
    /// The cached value is up-to-date.
    Clean,
    /// The next read recomputes.
    Dirty,
}

struct ComputedInner {
    id: ObjectId,
    runtime: WeakRuntime,
    dirty: AtomicBool,
    value: RwLock<Value>,
    effect: Effect,
    setter: Option<ComputedSetter>,
}

impl ComputedInner {
    fn invalidate(&self) {
        if !self.dirty.swap(true, Ordering::SeqCst) {
            trace!(computed = self.id.raw(), "computed invalidated");
            self.runtime
                .trigger(self.id, None, Change::touch(TrackKey::value()));
        }
    }
}

/// A cached derived value. Cloning shares the cache.
///
/// # Example
///
/// ```rust,ignore
/// let rt = Runtime::new();
/// let count = rt.signal(1);
/// let doubled = rt.computed({
///     let count = count.clone();
///     move || count.get().as_number().unwrap_or(0.0) * 2.0
/// });
///
/// assert_eq!(doubled.get(), Value::from(2));
/// count.set(5);
/// assert_eq!(doubled.get(), Value::from(10));
/// ```
#[derive(Clone)]
pub struct Computed {
    inner: Arc<ComputedInner>,
}

impl Computed {
    pub(crate) fn new<G, R>(runtime: &Runtime, getter: G, setter: Option<ComputedSetter>) -> Self
    where
        G: Fn() -> R + Send + Sync + 'static,
        R: Into<Value>,
    {
        let inner = Arc::new_cyclic(|this: &Weak<ComputedInner>| {
            let this = this.clone();
            let options = EffectOptions::default()
                .lazy()
                .computed()
                .scheduler(move |_| {
                    if let Some(inner) = this.upgrade() {
                        inner.invalidate();
                    }
                });
            ComputedInner {
                id: ObjectId::new(),
                runtime: runtime.downgrade(),
                dirty: AtomicBool::new(true),
                value: RwLock::new(Value::Undefined),
                effect: Effect::new(runtime, getter, options),
                setter,
            }
        });
        Self { inner }
    }

    /// Identity of the computed's `value` slot in the dependency graph.
    pub fn id(&self) -> ObjectId {
        self.inner.id
    }

    /// Current value, recomputing first if dirty. Subscribes the running
    /// effect.
    pub fn get(&self) -> Value {
        if self.inner.dirty.load(Ordering::SeqCst) {
            let value = self.inner.effect.run();
            *self.inner.value.write() = value;
            self.inner.dirty.store(false, Ordering::SeqCst);
        }
        self.inner
            .runtime
            .track(self.inner.id, TrackOp::Get, TrackKey::value());
        self.inner.value.read().clone()
    }

    /// Forward a write to the setter. Readonly computeds warn and ignore it.
    pub fn set(&self, value: impl Into<Value>) {
        if let Err(err) = self.try_set(value) {
            crate::dev_warn!(self.inner.runtime, computed = self.inner.id.raw(), "{err}");
        }
    }

    pub fn try_set(&self, value: impl Into<Value>) -> Result<(), ReactivityError> {
        match &self.inner.setter {
            Some(setter) => {
                setter(value.into());
                Ok(())
            }
            None => Err(ReactivityError::ReadonlyComputed),
        }
    }

    pub fn state(&self) -> ComputedState {
        if self.is_dirty() {
            ComputedState::Dirty
        } else {
            ComputedState::Clean
        }
    }

    pub fn is_dirty(&self) -> bool {
        self.inner.dirty.load(Ordering::SeqCst)
    }

    /// A computed without a setter is readonly.
    pub fn is_readonly(&self) -> bool {
        self.inner.setter.is_none()
    }

    /// The effect evaluating the getter.
    pub fn effect(&self) -> &Effect {
        &self.inner.effect
    }

    /// Stop recomputing. The last cached value is kept.
    pub fn stop(&self) {
        self.inner.effect.stop();
    }
}

impl PartialEq for Computed {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl fmt::Debug for Computed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Computed")
            .field("id", &self.inner.id.raw())
            .field("state", &self.state())
            .field("readonly", &self.is_readonly())
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

    fn number(value: Value) -> f64 {
        value.as_number().unwrap_or(f64::NAN)
    }

    #[test]
    fn computed_is_lazy_and_cached() {
        let rt = Runtime::new();
        let count = rt.signal(1);
        let evaluations = Arc::new(AtomicI32::new(0));

        let (count_c, evals_c) = (count.clone(), evaluations.clone());
        let doubled = rt.computed(move || {
            evals_c.fetch_add(1, Ordering::SeqCst);
            number(count_c.get()) * 2.0
        });

        // Not computed until accessed
        assert_eq!(evaluations.load(Ordering::SeqCst), 0);
        assert_eq!(doubled.state(), ComputedState::Dirty);

        assert_eq!(doubled.get(), Value::from(2));
        assert_eq!(doubled.get(), Value::from(2));
        assert_eq!(evaluations.load(Ordering::SeqCst), 1);
        assert_eq!(doubled.state(), ComputedState::Clean);
    }

    #[test]
    fn dependency_change_marks_dirty_without_recomputing() {
        let rt = Runtime::new();
        let count = rt.signal(1);
        let evaluations = Arc::new(AtomicI32::new(0));

        let (count_c, evals_c) = (count.clone(), evaluations.clone());
        let doubled = rt.computed(move || {
            evals_c.fetch_add(1, Ordering::SeqCst);
            number(count_c.get()) * 2.0
        });
        doubled.get();

        count.set(5);
        count.set(6);
        assert!(doubled.is_dirty());
        assert_eq!(evaluations.load(Ordering::SeqCst), 1);

        assert_eq!(doubled.get(), Value::from(12));
        assert_eq!(evaluations.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn effects_reading_computed_rerun() {
        let rt = Runtime::new();
        let count = rt.signal(1);
        let count_c = count.clone();
        let doubled = rt.computed(move || number(count_c.get()) * 2.0);

        let seen = Arc::new(AtomicI32::new(0));
        let (doubled_c, seen_c) = (doubled.clone(), seen.clone());
        rt.effect(move || {
            seen_c.store(number(doubled_c.get()) as i32, Ordering::SeqCst);
        });
        assert_eq!(seen.load(Ordering::SeqCst), 2);

        count.set(4);
        assert_eq!(seen.load(Ordering::SeqCst), 8);
    }

    #[test]
    fn computed_chain() {
        let rt = Runtime::new();
        let base = rt.signal(2);
        let base_c = base.clone();
        let squared = rt.computed(move || number(base_c.get()).powi(2));
        let squared_c = squared.clone();
        let plus_one = rt.computed(move || number(squared_c.get()) + 1.0);

        assert_eq!(plus_one.get(), Value::from(5));
        base.set(3);
        assert!(plus_one.is_dirty());
        assert_eq!(plus_one.get(), Value::from(10));
    }

    #[test]
    fn readonly_computed_rejects_writes() {
        let rt = Runtime::new();
        let constant = rt.computed(|| 1);
        assert!(constant.is_readonly());
        assert!(matches!(
            constant.try_set(2),
            Err(ReactivityError::ReadonlyComputed)
        ));
        constant.set(2);
        assert_eq!(constant.get(), Value::from(1));
    }

    #[test]
    fn writable_computed_forwards_to_setter() {
        let rt = Runtime::new();
        let first = rt.signal("Ada");
        let (get_first, set_first) = (first.clone(), first.clone());
        let name = rt.writable_computed(
            move || get_first.get(),
            move |value| set_first.set(value),
        );

        assert_eq!(name.get(), Value::from("Ada"));
        name.set("Grace");
        assert_eq!(first.get_untracked(), Value::from("Grace"));
        assert_eq!(name.get(), Value::from("Grace"));
    }

    #[test]
    fn stopped_computed_keeps_last_value() {
        let rt = Runtime::new();
        let count = rt.signal(1);
        let count_c = count.clone();
        let doubled = rt.computed(move || number(count_c.get()) * 2.0);
        assert_eq!(doubled.get(), Value::from(2));

        doubled.stop();
        count.set(10);
        assert!(!doubled.is_dirty());
        assert_eq!(doubled.get(), Value::from(2));
    }
}
