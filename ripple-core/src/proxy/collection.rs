//! Collection traps: maps, sets and their weak variants.
//!
//! Collections are keyed by value identity, and a key may be given as a view
//! or as its raw object. Lookups check both forms and track both, while new
//! entries are always stored under the raw form. If a collection ends up
//! holding both forms of one object as separate keys, the raw form wins and
//! a warning is emitted.
//!
//! Values read out of a deep view are wrapped in the view's mode; values
//! written are unwrapped to raw first.

use super::{Mode, Reactive};
use crate::graph::{TrackKey, TrackOp};
use crate::reactive::{Change, WeakRuntime};
use crate::registry::to_raw;
use crate::value::{has_changed, TargetKind, Value};

/// Resolve which stored form of `key` an operation addresses.
///
/// Returns the key to use and whether an entry exists under it.
fn resolve_key(view: &Reactive, key: Value) -> (Value, bool) {
    let raw = view.raw();
    let raw_key = to_raw(&key);
    if raw.entry_has(&raw_key) {
        if raw_key != key && raw.entry_has(&key) {
            crate::dev_warn!(
                view.runtime(),
                kind = ?raw.kind(),
                "collection holds both the raw and reactive form of the same key; the raw form is used"
            );
        }
        (raw_key, true)
    } else if raw_key != key && raw.entry_has(&key) {
        (key, true)
    } else {
        (raw_key, false)
    }
}

/// Subscribe to `key` under both of its identities.
fn track_key(view: &Reactive, op: TrackOp, key: &Value) {
    let raw = view.raw();
    let raw_key = to_raw(key);
    if raw_key != *key {
        view.runtime()
            .track(raw.id(), op, TrackKey::Entry(key.identity()));
    }
    view.runtime()
        .track(raw.id(), op, TrackKey::Entry(raw_key.identity()));
}

fn readonly_rejects(view: &Reactive, op: &'static str) -> bool {
    if view.is_readonly() {
        crate::dev_warn!(
            view.runtime(),
            op,
            "collection mutation failed: target is readonly"
        );
        return true;
    }
    false
}

pub(super) fn get(view: &Reactive, key: &Value) -> Value {
    track_key(view, TrackOp::Get, key);
    let raw = view.raw();
    let raw_key = to_raw(key);
    raw.entry_get(&raw_key)
        .or_else(|| raw.entry_get(key))
        .map_or(Value::Undefined, |value| view.convert(value))
}

pub(super) fn has(view: &Reactive, key: &Value) -> bool {
    track_key(view, TrackOp::Has, key);
    let raw = view.raw();
    raw.entry_has(&to_raw(key)) || raw.entry_has(key)
}

pub(super) fn size(view: &Reactive) -> usize {
    let raw = view.raw();
    view.runtime()
        .track(raw.id(), TrackOp::Iterate, TrackKey::Iterate);
    raw.len()
}

pub(super) fn add(view: &Reactive, value: Value) -> bool {
    if readonly_rejects(view, "add") {
        return true;
    }
    let raw = view.raw();
    let value = to_raw(&value);
    if raw.entry_has(&value) {
        return false;
    }
    let added = raw.entry_add(value.clone());
    if added {
        view.runtime().trigger(
            raw.id(),
            Some(raw.kind()),
            Change::add(TrackKey::Entry(value.identity()), value),
        );
    }
    added
}

pub(super) fn set(view: &Reactive, key: Value, value: Value) -> bool {
    if readonly_rejects(view, "set") {
        return true;
    }
    let raw = view.raw();
    let value = to_raw(&value);
    let (key, had_key) = resolve_key(view, key);
    let old = raw.entry_get(&key);
    if !raw.entry_set(key.clone(), value.clone()) {
        return false;
    }

    let entry = TrackKey::Entry(key.identity());
    match old {
        Some(old) if had_key => {
            if has_changed(&value, &old) {
                view.runtime()
                    .trigger(raw.id(), Some(raw.kind()), Change::set(entry, value, old));
            }
        }
        _ => view
            .runtime()
            .trigger(raw.id(), Some(raw.kind()), Change::add(entry, value)),
    }
    true
}

pub(super) fn delete(view: &Reactive, key: Value) -> bool {
    if readonly_rejects(view, "delete") {
        return false;
    }
    let raw = view.raw();
    let (key, had_key) = resolve_key(view, key);
    let old = raw.entry_get(&key);
    let deleted = raw.entry_delete(&key);
    if deleted && had_key {
        view.runtime().trigger(
            raw.id(),
            Some(raw.kind()),
            Change::delete(TrackKey::Entry(key.identity()), old),
        );
    }
    deleted
}

pub(super) fn clear(view: &Reactive) -> bool {
    if readonly_rejects(view, "clear") {
        return false;
    }
    let raw = view.raw();
    let had_entries = !raw.is_empty();
    let old_target = view
        .runtime()
        .warnings_enabled()
        .then(|| Value::Object(raw.snapshot()));
    let cleared = raw.clear();
    if cleared && had_entries {
        view.runtime()
            .trigger(raw.id(), Some(raw.kind()), Change::clear(old_target));
    }
    cleared
}

pub(super) fn for_each(view: &Reactive, mut f: impl FnMut(Value, Value)) {
    let raw = view.raw();
    view.runtime()
        .track(raw.id(), TrackOp::Iterate, TrackKey::Iterate);
    for (key, value) in raw.entries() {
        f(view.convert(value), view.convert(key));
    }
}

fn snapshot(view: &Reactive, keys_only: bool) -> Converter {
    let raw = view.raw();
    let key = if keys_only && raw.kind() == TargetKind::Map {
        TrackKey::MapKeyIterate
    } else {
        TrackKey::Iterate
    };
    view.runtime().track(raw.id(), TrackOp::Iterate, key);
    Converter {
        runtime: view.runtime().clone(),
        mode: (!view.is_shallow()).then(|| view.mode().child()),
    }
}

pub(super) fn keys(view: &Reactive) -> ReactiveIter {
    let converter = snapshot(view, true);
    let keys = view.raw().entries().into_iter().map(|(k, _)| k).collect();
    ReactiveIter::new(keys, converter)
}

pub(super) fn values(view: &Reactive) -> ReactiveIter {
    let converter = snapshot(view, false);
    let values = view.raw().entries().into_iter().map(|(_, v)| v).collect();
    ReactiveIter::new(values, converter)
}

pub(super) fn entries(view: &Reactive) -> ReactiveEntries {
    let converter = snapshot(view, false);
    ReactiveEntries {
        items: view.raw().entries().into_iter(),
        converter,
    }
}

/// Wraps yielded items lazily, one at a time.
#[derive(Clone, Default)]
struct Converter {
    runtime: WeakRuntime,
    /// `None` for shallow views and for already-converted items.
    mode: Option<Mode>,
}

impl Converter {
    fn convert(&self, value: Value) -> Value {
        match self.mode {
            Some(mode) => self.runtime.convert(value, mode),
            None => value,
        }
    }
}

/// Iterator over keys or values of a view. Items are wrapped as they are
/// yielded.
pub struct ReactiveIter {
    items: std::vec::IntoIter<Value>,
    converter: Converter,
}

impl ReactiveIter {
    fn new(items: Vec<Value>, converter: Converter) -> Self {
        Self {
            items: items.into_iter(),
            converter,
        }
    }

    /// Items that need no further conversion.
    pub(super) fn ready(items: Vec<Value>) -> Self {
        Self::new(items, Converter::default())
    }
}

impl Iterator for ReactiveIter {
    type Item = Value;

    fn next(&mut self) -> Option<Value> {
        self.items.next().map(|item| self.converter.convert(item))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.items.size_hint()
    }
}

impl ExactSizeIterator for ReactiveIter {}

/// Iterator over `(key, value)` pairs of a view.
pub struct ReactiveEntries {
    items: std::vec::IntoIter<(Value, Value)>,
    converter: Converter,
}

impl ReactiveEntries {
    pub(super) fn ready(items: Vec<(Value, Value)>) -> Self {
        Self {
            items: items.into_iter(),
            converter: Converter::default(),
        }
    }
}

impl Iterator for ReactiveEntries {
    type Item = (Value, Value);

    fn next(&mut self) -> Option<(Value, Value)> {
        self.items
            .next()
            .map(|(k, v)| (self.converter.convert(k), self.converter.convert(v)))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.items.size_hint()
    }
}

impl ExactSizeIterator for ReactiveEntries {}

#[cfg(test)]
mod tests {
    use crate::reactive::Runtime;
    use crate::registry::{is_reactive, to_raw};
    use crate::value::{Obj, Value};
    use std::sync::atomic::{AtomicI32, Ordering};
    use std::sync::Arc;

    fn observe(rt: &Runtime, f: impl Fn() + Send + Sync + 'static) -> Arc<AtomicI32> {
        let runs = Arc::new(AtomicI32::new(0));
        let runs_c = runs.clone();
        rt.effect(move || {
            f();
            runs_c.fetch_add(1, Ordering::SeqCst);
        });
        runs
    }

    #[test]
    fn map_get_tracks_the_key() {
        let rt = Runtime::new();
        let map = rt.reactive(Obj::map_from([("a", 1), ("b", 2)]));
        let view = map.as_reactive().unwrap().clone();

        let reader = view.clone();
        let runs = observe(&rt, move || {
            reader.get("a");
        });

        view.set("b", 3);
        assert_eq!(runs.load(Ordering::SeqCst), 1);
        view.set("a", 1);
        assert_eq!(runs.load(Ordering::SeqCst), 1);
        view.set("a", 5);
        assert_eq!(runs.load(Ordering::SeqCst), 2);
        view.delete("a");
        assert_eq!(runs.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn map_key_iteration_ignores_value_updates() {
        let rt = Runtime::new();
        let map = rt.reactive(Obj::map_from([("a", 1)]));
        let view = map.as_reactive().unwrap().clone();

        let reader = view.clone();
        let key_runs = observe(&rt, move || {
            reader.keys().count();
        });
        let reader = view.clone();
        let value_runs = observe(&rt, move || {
            reader.values().count();
        });

        view.set("a", 2);
        assert_eq!(key_runs.load(Ordering::SeqCst), 1);
        assert_eq!(value_runs.load(Ordering::SeqCst), 2);

        view.set("b", 1);
        assert_eq!(key_runs.load(Ordering::SeqCst), 2);
        assert_eq!(value_runs.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn view_and_raw_keys_address_the_same_entry() {
        let rt = Runtime::new();
        let key = Obj::record();
        let key_view = rt.reactive(key.clone());
        let map = rt.reactive(Obj::map());
        let view = map.as_reactive().unwrap();

        assert!(view.set(key_view.clone(), "v"));
        assert!(view.raw().entry_has(&Value::from(key.clone())));
        assert_eq!(view.get(key.clone()), Value::from("v"));
        assert_eq!(view.get(key_view.clone()), Value::from("v"));
        assert!(view.has(key_view.clone()));
        assert_eq!(view.size(), 1);

        assert!(view.delete(key_view));
        assert!(!view.has(key));
    }

    #[test]
    fn set_members_are_stored_raw_and_yielded_wrapped() {
        let rt = Runtime::new();
        let member = Obj::record();
        let set = rt.reactive(Obj::new_set());
        let view = set.as_reactive().unwrap();

        assert!(view.add(rt.reactive(member.clone())));
        assert!(!view.add(member.clone()));
        let yielded: Vec<Value> = view.values().collect();
        assert_eq!(yielded.len(), 1);
        assert!(is_reactive(&yielded[0]));
        assert_eq!(to_raw(&yielded[0]), Value::from(member));
    }

    #[test]
    fn clear_triggers_only_when_non_empty() {
        let rt = Runtime::new();
        let set = rt.reactive(Obj::set_from([1, 2]));
        let view = set.as_reactive().unwrap().clone();

        let reader = view.clone();
        let runs = observe(&rt, move || {
            reader.has(1);
        });

        assert!(view.clear());
        assert_eq!(runs.load(Ordering::SeqCst), 2);
        assert!(!view.clear());
        assert_eq!(runs.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn for_each_wraps_per_mode() {
        let rt = Runtime::new();
        let inner = Obj::record();
        let map = rt.readonly(Obj::map_from([(Value::from("k"), Value::from(inner))]));
        let view = map.as_reactive().unwrap();

        let mut seen = Vec::new();
        view.for_each(|value, key| seen.push((key, value)));
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].0, Value::from("k"));
        assert!(crate::registry::is_readonly(&seen[0].1));
    }

    #[test]
    fn readonly_collections_reject_mutation() {
        let rt = Runtime::new();
        let map = rt.readonly(Obj::map_from([("a", 1)]));
        let view = map.as_reactive().unwrap();

        // Swallowed writes report success; removals report failure.
        assert!(view.set("a", 2));
        assert!(!view.delete("a"));
        assert!(!view.clear());
        assert_eq!(view.get("a"), Value::from(1));

        let set = rt.readonly(Obj::set_from([1]));
        let set = set.as_reactive().unwrap();
        assert!(set.add(2));
        assert_eq!(set.size(), 1);
    }

    #[test]
    fn weak_collections_have_no_iteration() {
        let rt = Runtime::with_config(crate::RuntimeConfig::default().dev_warnings(false));
        let key = Obj::record();
        let weak = rt.reactive(Obj::weak_map());
        let view = weak.as_reactive().unwrap();

        assert!(view.set(key.clone(), 1));
        assert!(!view.set("primitive", 1));
        assert_eq!(view.get(key), Value::from(1));
        assert_eq!(view.size(), 0);
        assert_eq!(view.keys().count(), 0);
    }
}
