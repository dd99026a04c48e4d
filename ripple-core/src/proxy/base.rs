//! Base traps: property access on records and arrays.
//!
//! `view` is the view whose raw object is being accessed; `receiver` is the
//! view the operation was started on. They differ only while a write is
//! delegated up a reactive prototype chain, in which case the write lands on
//! the receiver's raw object and the prototype does not trigger.

use super::Reactive;
use crate::graph::{TrackKey, TrackOp};
use crate::reactive::Change;
use crate::registry::to_raw;
use crate::value::{has_changed, PropKey, TargetKind, Value};

pub(super) fn get(view: &Reactive, key: &PropKey) -> Value {
    let raw = view.raw();
    if key.is_builtin_symbol() {
        return raw.get(key);
    }

    let value = match raw.get_own(key) {
        Some(value) => value,
        None => match raw.proto() {
            Some(Value::Reactive(proto)) => proto.get_prop(key),
            Some(_) => raw.get(key),
            None => Value::Undefined,
        },
    };

    view.runtime()
        .track(raw.id(), TrackOp::Get, TrackKey::Prop(key.clone()));

    if view.is_shallow() {
        return value;
    }
    match value {
        Value::Signal(signal) => {
            if raw.kind() == TargetKind::Array && key.as_index().is_some() {
                Value::Signal(signal)
            } else {
                signal.get()
            }
        }
        Value::Computed(computed) => {
            if raw.kind() == TargetKind::Array && key.as_index().is_some() {
                Value::Computed(computed)
            } else {
                computed.get()
            }
        }
        value => view.convert(value),
    }
}

pub(super) fn set(view: &Reactive, key: PropKey, value: Value, receiver: &Reactive) -> bool {
    let raw = view.raw();
    // Readonly writes are swallowed and still report success.
    if view.is_readonly() {
        crate::dev_warn!(
            view.runtime(),
            key = ?key,
            "set operation failed: target is readonly"
        );
        return true;
    }

    let old = raw.get(&key);
    let mut value = value;
    if !view.is_shallow() {
        value = to_raw(&value);
        // A cell stored in a record is updated in place.
        if raw.kind() != TargetKind::Array && !value.is_ref() {
            match &old {
                Value::Signal(cell) => {
                    cell.set(value);
                    return true;
                }
                Value::Computed(cell) => {
                    cell.set(value);
                    return true;
                }
                _ => {}
            }
        }
    }

    let is_array = raw.kind() == TargetKind::Array;
    let had_key = match key.as_index() {
        Some(index) if is_array => index < raw.len(),
        _ => raw.has_own(&key),
    };

    let applied = match raw.proto() {
        Some(Value::Reactive(proto)) if !had_key => set(&proto, key.clone(), value.clone(), receiver),
        _ => receiver.raw().set(key.clone(), value.clone()),
    };

    if !applied {
        crate::dev_warn!(
            view.runtime(),
            key = ?key,
            "set operation failed: rejected by target (frozen, or index out of range)"
        );
    }

    // Only the view the write was started on reports it.
    if applied && raw.id() == receiver.raw().id() {
        let target = raw.id();
        let kind = Some(raw.kind());
        if !had_key {
            view.runtime()
                .trigger(target, kind, Change::add(TrackKey::Prop(key), value));
        } else if has_changed(&value, &old) {
            view.runtime()
                .trigger(target, kind, Change::set(TrackKey::Prop(key), value, old));
        }
    }
    applied
}

pub(super) fn delete(view: &Reactive, key: &PropKey) -> bool {
    let raw = view.raw();
    if view.is_readonly() {
        crate::dev_warn!(
            view.runtime(),
            key = ?key,
            "delete operation failed: target is readonly"
        );
        return false;
    }

    let had_key = raw.has_own(key);
    let old = raw.get_own(key);
    let deleted = raw.delete(key);
    if deleted && had_key {
        view.runtime().trigger(
            raw.id(),
            Some(raw.kind()),
            Change::delete(TrackKey::Prop(key.clone()), old),
        );
    }
    deleted
}

pub(super) fn has(view: &Reactive, key: &PropKey) -> bool {
    let raw = view.raw();
    let found = raw.has_own(key)
        || match raw.proto() {
            Some(Value::Reactive(proto)) => proto.has(key.to_value()),
            _ => raw.has(key),
        };
    if !key.is_builtin_symbol() {
        view.runtime()
            .track(raw.id(), TrackOp::Has, TrackKey::Prop(key.clone()));
    }
    found
}

pub(super) fn own_keys(view: &Reactive) -> Vec<PropKey> {
    let raw = view.raw();
    view.runtime()
        .track(raw.id(), TrackOp::Iterate, TrackKey::Iterate);
    if raw.kind() == TargetKind::Array {
        view.runtime()
            .track(raw.id(), TrackOp::Get, TrackKey::length());
    }
    raw.own_keys()
}
