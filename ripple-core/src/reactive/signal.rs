//! Signal Implementation
//!
//! A Signal is a single-value reactive cell: reads track its `value` slot and
//! writes trigger it.
//!
//! # How Signals Work
//!
//! 1. Reading with [`Signal::get`] inside a running effect subscribes that
//!    effect to the signal.
//!
//! 2. [`Signal::set`] compares the new value's raw form with the stored raw
//!    form (NaN equals NaN) and only triggers when they differ.
//!
//! 3. A deep signal stores composite values as reactive views, so nested
//!    reads through `get()` are tracked as well. A shallow signal stores its
//!    value as-is; use [`Signal::trigger`] after mutating it in place.
//!
//! Signals stored inside a deep reactive record are unwrapped on read; see
//! [`crate::proxy`].

use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;

use super::runtime::{Change, Runtime, WeakRuntime};
use crate::graph::{TrackKey, TrackOp};
use crate::proxy::Mode;
use crate::registry::to_raw;
use crate::value::{has_changed, ObjectId, Value};

struct SignalState {
    /// Raw form, used for change detection.
    raw: Value,
    /// Value handed out by `get`.
    value: Value,
}

struct SignalInner {
    id: ObjectId,
    runtime: WeakRuntime,
    shallow: bool,
    state: RwLock<SignalState>,
}

/// A reactive value cell. Cloning shares the cell.
///
/// # Example
///
/// ```rust,ignore
/// let rt = Runtime::new();
/// let count = rt.signal(0);
///
/// rt.effect({
///     let count = count.clone();
///     move || println!("count is {:?}", count.get())
/// });
///
/// count.set(5); // prints "count is 5"
/// ```
#[derive(Clone)]
pub struct Signal {
    inner: Arc<SignalInner>,
}

impl Signal {
    pub(crate) fn new(runtime: &Runtime, value: Value, shallow: bool) -> Self {
        let weak = runtime.downgrade();
        let state = Self::state_for(&weak, shallow, value);
        Self {
            inner: Arc::new(SignalInner {
                id: ObjectId::new(),
                runtime: weak,
                shallow,
                state: RwLock::new(state),
            }),
        }
    }

    fn state_for(runtime: &WeakRuntime, shallow: bool, value: Value) -> SignalState {
        if shallow {
            SignalState {
                raw: value.clone(),
                value,
            }
        } else {
            SignalState {
                raw: to_raw(&value),
                value: runtime.convert(value, Mode::Reactive),
            }
        }
    }

    /// Identity of the cell in the dependency graph.
    pub fn id(&self) -> ObjectId {
        self.inner.id
    }

    pub fn is_shallow(&self) -> bool {
        self.inner.shallow
    }

    /// Read the value, subscribing the running effect.
    pub fn get(&self) -> Value {
        self.inner
            .runtime
            .track(self.inner.id, TrackOp::Get, TrackKey::value());
        self.get_untracked()
    }

    /// Read the value without subscribing.
    pub fn get_untracked(&self) -> Value {
        self.inner.state.read().value.clone()
    }

    /// Replace the value. Triggers only when the raw form changed.
    pub fn set(&self, value: impl Into<Value>) {
        let value = value.into();
        let new_raw = if self.inner.shallow {
            value.clone()
        } else {
            to_raw(&value)
        };

        let old = {
            let mut state = self.inner.state.write();
            if !has_changed(&new_raw, &state.raw) {
                return;
            }
            let next = Self::state_for(&self.inner.runtime, self.inner.shallow, value);
            std::mem::replace(&mut *state, next)
        };

        self.inner.runtime.trigger(
            self.inner.id,
            None,
            Change::set(TrackKey::value(), new_raw, old.raw),
        );
    }

    /// Compute the next value from the current one (untracked).
    pub fn update(&self, f: impl FnOnce(&Value) -> Value) {
        let next = f(&self.get_untracked());
        self.set(next);
    }

    /// Notify subscribers without changing the value.
    pub fn trigger(&self) {
        let value = self.get_untracked();
        self.inner.runtime.trigger(
            self.inner.id,
            None,
            Change::set(TrackKey::value(), value.clone(), value),
        );
    }

    /// Number of effects currently subscribed to the cell.
    pub fn subscriber_count(&self) -> usize {
        self.inner.runtime.upgrade().map_or(0, |rt| {
            rt.subscriber_count(self.inner.id, &TrackKey::value())
        })
    }
}

impl PartialEq for Signal {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl fmt::Debug for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Signal")
            .field("id", &self.inner.id.raw())
            .field("shallow", &self.inner.shallow)
            .field("value", &self.get_untracked())
            .finish()
    }
}

/// Whether the value is a single-value cell (signal or computed).
pub fn is_ref(value: &Value) -> bool {
    value.is_ref()
}

/// Read through a cell; any other value is returned unchanged.
pub fn unref(value: &Value) -> Value {
    match value {
        Value::Signal(signal) => signal.get(),
        Value::Computed(computed) => computed.get(),
        other => other.clone(),
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Obj;
    use std::sync::atomic::{AtomicI32, Ordering};

    #[test]
    fn signal_get_set() {
        let rt = Runtime::new();
        let signal = rt.signal(42);
        assert_eq!(signal.get(), Value::from(42));

        signal.set(100);
        assert_eq!(signal.get(), Value::from(100));
    }

    #[test]
    fn signal_update() {
        let rt = Runtime::new();
        let signal = rt.signal(10);
        signal.update(|v| Value::from(v.as_number().unwrap_or(0.0) * 2.0));
        assert_eq!(signal.get(), Value::from(20));
    }

    #[test]
    fn unchanged_write_does_not_trigger() {
        let rt = Runtime::new();
        let signal = rt.signal(f64::NAN);
        let runs = Arc::new(AtomicI32::new(0));

        let (signal_c, runs_c) = (signal.clone(), runs.clone());
        rt.effect(move || {
            signal_c.get();
            runs_c.fetch_add(1, Ordering::SeqCst);
        });

        signal.set(f64::NAN);
        assert_eq!(runs.load(Ordering::SeqCst), 1);

        signal.set(1);
        assert_eq!(runs.load(Ordering::SeqCst), 2);
        assert_eq!(signal.subscriber_count(), 1);
    }

    #[test]
    fn deep_signal_wraps_composites() {
        let rt = Runtime::new();
        let obj = Obj::record_from([("a", 1)]);
        let signal = rt.signal(obj.clone());

        let view = signal.get_untracked();
        let view = view.as_reactive().unwrap();
        assert_eq!(view.raw(), &obj);
        assert_eq!(view.mode(), Mode::Reactive);

        // Writing the view back is not a change.
        let runs = Arc::new(AtomicI32::new(0));
        let (signal_c, runs_c) = (signal.clone(), runs.clone());
        rt.effect(move || {
            signal_c.get();
            runs_c.fetch_add(1, Ordering::SeqCst);
        });
        signal.set(view.clone());
        signal.set(obj);
        assert_eq!(runs.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn shallow_signal_needs_manual_trigger() {
        let rt = Runtime::new();
        let obj = Obj::record_from([("a", 1)]);
        let signal = rt.shallow_signal(obj.clone());
        assert!(signal.get_untracked().as_object().is_some());

        let seen = Arc::new(AtomicI32::new(0));
        let (signal_c, seen_c) = (signal.clone(), seen.clone());
        rt.effect(move || {
            let obj = signal_c.get();
            let a = obj.as_object().unwrap().get(&"a".into());
            seen_c.store(a.as_number().unwrap_or(-1.0) as i32, Ordering::SeqCst);
        });

        obj.set("a".into(), Value::from(2));
        assert_eq!(seen.load(Ordering::SeqCst), 1);

        signal.trigger();
        assert_eq!(seen.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn unref_reads_through_cells() {
        let rt = Runtime::new();
        let signal = rt.signal("x");
        let value = Value::from(signal);
        assert!(is_ref(&value));
        assert_eq!(unref(&value), Value::from("x"));
        assert_eq!(unref(&Value::from(3)), Value::from(3));
    }
}
