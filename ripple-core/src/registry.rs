//! Wrapper Registry
//!
//! Creates views and answers identity questions about them.
//!
//! A view's identity is `(raw object, mode)`, so wrapping the same object
//! twice in one mode yields equal views without storing the views
//! themselves. The registry only remembers *which* variants were ever
//! created per raw object, held weakly, so [`is_reactive`] can tell whether a
//! readonly view sits over something that is also mutably reactive.
//!
//! # Eligibility
//!
//! A raw object can be wrapped unless it is marked raw, its structural
//! family is outside the runtime's allow-list, or it is frozen while
//! `skip_frozen` is set. Ineligible objects are returned unchanged by
//! [`Runtime::wrap`]; [`Runtime::try_wrap`] reports why.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Weak;

use dashmap::DashMap;
use tracing::debug;

use crate::error::ReactivityError;
use crate::proxy::{Mode, Reactive, ReactiveFlag};
use crate::reactive::Runtime;
use crate::value::{Obj, ObjectCell, ObjectId, Value};

/// Dead entries are swept after this many new registrations.
const SWEEP_INTERVAL: usize = 256;

struct ViewEntry {
    raw: Weak<ObjectCell>,
    modes: u8,
}

/// Variants created per raw object.
#[derive(Default)]
pub(crate) struct Registry {
    views: DashMap<ObjectId, ViewEntry>,
    inserts: AtomicUsize,
}

impl Registry {
    fn record(&self, raw: &Obj, mode: Mode) {
        let mut fresh = false;
        self.views
            .entry(raw.id())
            .and_modify(|entry| entry.modes |= mode.bit())
            .or_insert_with(|| {
                fresh = true;
                ViewEntry {
                    raw: raw.downgrade(),
                    modes: mode.bit(),
                }
            });
        if fresh && self.inserts.fetch_add(1, Ordering::Relaxed) % SWEEP_INTERVAL == SWEEP_INTERVAL - 1 {
            self.sweep();
        }
    }

    pub(crate) fn has_view(&self, raw: ObjectId, mode: Mode) -> bool {
        self.views
            .get(&raw)
            .is_some_and(|entry| entry.modes & mode.bit() != 0 && entry.raw.strong_count() > 0)
    }

    fn sweep(&self) {
        let before = self.views.len();
        self.views.retain(|_, entry| entry.raw.strong_count() > 0);
        debug!(removed = before - self.views.len(), "swept wrapper registry");
    }

    pub(crate) fn len(&self) -> usize {
        self.views.len()
    }
}

impl Runtime {
    /// Wrap a value in `mode`. Values that cannot be wrapped are returned
    /// unchanged; non-composites also produce a warning.
    pub fn wrap(&self, value: impl Into<Value>, mode: Mode) -> Value {
        let value = value.into();
        match self.try_wrap(&value, mode) {
            Ok(view) => Value::Reactive(view),
            Err(err @ ReactivityError::NotComposite(_)) => {
                crate::dev_warn!(self, ?mode, "{err}");
                value
            }
            Err(_) => value,
        }
    }

    /// Wrap a value in `mode`, reporting why it could not be wrapped.
    ///
    /// An existing view is returned as-is, except that a readonly request
    /// over a mutable view yields a readonly view of the same raw object.
    pub fn try_wrap(&self, value: &Value, mode: Mode) -> Result<Reactive, ReactivityError> {
        match value {
            Value::Reactive(view) => {
                if mode.is_readonly() && !view.is_readonly() {
                    Ok(self.view_of(view.raw(), mode))
                } else {
                    Ok(view.clone())
                }
            }
            Value::Object(obj) => {
                self.check_eligible(obj)?;
                Ok(self.view_of(obj, mode))
            }
            other => Err(ReactivityError::NotComposite(other.type_name())),
        }
    }

    fn check_eligible(&self, obj: &Obj) -> Result<(), ReactivityError> {
        if obj.is_marked_raw() {
            return Err(ReactivityError::MarkedRaw(obj.id().raw()));
        }
        if !self.config().allows(obj.kind()) {
            return Err(ReactivityError::KindNotAllowed(obj.kind()));
        }
        if self.config().skip_frozen && obj.is_frozen() {
            return Err(ReactivityError::Frozen(obj.id().raw()));
        }
        Ok(())
    }

    fn view_of(&self, raw: &Obj, mode: Mode) -> Reactive {
        self.registry().record(raw, mode);
        Reactive::new(raw.clone(), mode, self.downgrade())
    }

    /// Deep mutable view.
    pub fn reactive(&self, value: impl Into<Value>) -> Value {
        self.wrap(value, Mode::Reactive)
    }

    /// Deep readonly view.
    pub fn readonly(&self, value: impl Into<Value>) -> Value {
        self.wrap(value, Mode::Readonly)
    }

    /// Mutable view that does not wrap nested values.
    pub fn shallow_reactive(&self, value: impl Into<Value>) -> Value {
        self.wrap(value, Mode::ShallowReactive)
    }

    /// Readonly view that does not wrap nested values.
    pub fn shallow_readonly(&self, value: impl Into<Value>) -> Value {
        self.wrap(value, Mode::ShallowReadonly)
    }
}

/// The raw value behind a view; anything else is returned unchanged.
pub fn to_raw(value: &Value) -> Value {
    match value {
        Value::Reactive(view) => view.flag(ReactiveFlag::Raw),
        other => other.clone(),
    }
}

/// Whether the value is a mutable view, or a readonly view over an object
/// that also has a mutable view.
pub fn is_reactive(value: &Value) -> bool {
    let Value::Reactive(view) = value else {
        return false;
    };
    if view.flag(ReactiveFlag::IsReactive) == Value::Bool(true) {
        return true;
    }
    view.runtime().upgrade().is_some_and(|rt| {
        let id = view.raw().id();
        rt.registry().has_view(id, Mode::Reactive) || rt.registry().has_view(id, Mode::ShallowReactive)
    })
}

/// Whether the value is a readonly view or a computed without a setter.
pub fn is_readonly(value: &Value) -> bool {
    match value {
        Value::Reactive(view) => view.flag(ReactiveFlag::IsReadonly) == Value::Bool(true),
        Value::Computed(computed) => computed.is_readonly(),
        _ => false,
    }
}

pub fn is_shallow(value: &Value) -> bool {
    match value {
        Value::Reactive(view) => view.flag(ReactiveFlag::IsShallow) == Value::Bool(true),
        Value::Signal(signal) => signal.is_shallow(),
        _ => false,
    }
}

/// Whether the value is any kind of view.
pub fn is_proxy(value: &Value) -> bool {
    matches!(value, Value::Reactive(_))
}

/// Permanently opt an object out of wrapping. Views created earlier keep
/// working.
pub fn mark_raw(value: impl Into<Value>) -> Value {
    let value = value.into();
    if let Some(obj) = value.raw_object() {
        obj.mark_raw();
    }
    value
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RuntimeConfig;
    use crate::value::TargetKind;

    #[test]
    fn wrapping_twice_yields_equal_views() {
        let rt = Runtime::new();
        let obj = Obj::record();
        let a = rt.reactive(obj.clone());
        let b = rt.reactive(obj.clone());
        assert_eq!(a, b);
        assert_eq!(rt.reactive(a.clone()), a);
        assert_ne!(rt.readonly(obj), a);
    }

    #[test]
    fn readonly_over_reactive_wraps_the_raw_object() {
        let rt = Runtime::new();
        let obj = Obj::record();
        let view = rt.reactive(obj.clone());
        let ro = rt.readonly(view.clone());

        let ro_view = ro.as_reactive().unwrap();
        assert_eq!(ro_view.raw(), &obj);
        assert!(is_readonly(&ro));
        assert!(is_reactive(&ro));

        // A readonly view stays readonly under a mutable request.
        assert_eq!(rt.reactive(ro.clone()), ro);
    }

    #[test]
    fn readonly_of_plain_object_is_not_reactive() {
        let rt = Runtime::new();
        let ro = rt.readonly(Obj::record());
        assert!(is_readonly(&ro));
        assert!(!is_reactive(&ro));
        assert!(is_proxy(&ro));
    }

    #[test]
    fn ineligible_values_pass_through() {
        let rt = Runtime::with_config(RuntimeConfig::default().dev_warnings(false));

        assert_eq!(rt.reactive(1), Value::from(1));
        assert!(matches!(
            rt.try_wrap(&Value::from("s"), Mode::Reactive),
            Err(ReactivityError::NotComposite("string"))
        ));

        let marked = mark_raw(Obj::record());
        assert!(!is_proxy(&rt.reactive(marked.clone())));
        assert!(matches!(
            rt.try_wrap(&marked, Mode::Reactive),
            Err(ReactivityError::MarkedRaw(_))
        ));

        let frozen = Obj::record();
        frozen.freeze();
        assert!(matches!(
            rt.try_wrap(&Value::from(frozen), Mode::Readonly),
            Err(ReactivityError::Frozen(_))
        ));
    }

    #[test]
    fn allow_list_restricts_kinds() {
        let rt = Runtime::with_config(
            RuntimeConfig::default().allow_kinds([TargetKind::Record, TargetKind::Array]),
        );
        assert!(is_proxy(&rt.reactive(Obj::array([1]))));
        assert!(matches!(
            rt.try_wrap(&Value::from(Obj::map()), Mode::Reactive),
            Err(ReactivityError::KindNotAllowed(TargetKind::Map))
        ));
    }

    #[test]
    fn frozen_objects_wrap_when_not_skipped() {
        let rt = Runtime::with_config(RuntimeConfig::default().skip_frozen(false));
        let frozen = Obj::record();
        frozen.freeze();
        assert!(is_proxy(&rt.readonly(frozen)));
    }

    #[test]
    fn to_raw_unwraps_views() {
        let rt = Runtime::new();
        let obj = Obj::record();
        let view = rt.shallow_readonly(obj.clone());
        assert!(is_shallow(&view));
        assert_eq!(to_raw(&view), Value::from(obj.clone()));
        assert_eq!(to_raw(&Value::from(obj.clone())), Value::from(obj));
        assert_eq!(to_raw(&Value::Null), Value::Null);
    }

    #[test]
    fn registry_forgets_dropped_objects() {
        let rt = Runtime::new();
        let obj = Obj::record();
        let id = obj.id();
        let view = rt.reactive(obj.clone());
        assert!(rt.registry().has_view(id, Mode::Reactive));

        drop(view);
        drop(obj);
        assert!(!rt.registry().has_view(id, Mode::Reactive));
        rt.registry().sweep();
        assert_eq!(rt.registry().len(), 0);
    }
}
