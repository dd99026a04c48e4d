//! Target Map
//!
//! The two-level store `source -> key -> subscriber set`. Sources are keyed by
//! the identity of the *raw* object (or cell), never by a wrapper, so every
//! view over one object shares a single set of dependencies.
//!
//! # Trigger resolution
//!
//! [`TargetMap::collect`] decides which subscriber sets a write affects:
//!
//! - `Clear` affects every key of the source.
//! - Writing an array's `length` affects `length` and every index at or past
//!   the new length.
//! - Otherwise the written key is affected, plus:
//!   - `Add`: `ITERATE` for every kind, `MAP_KEY_ITERATE` for maps, and
//!     `length` when an array grows through an index write.
//!   - `Delete` on a non-array: `ITERATE`, and `MAP_KEY_ITERATE` for maps.
//!   - `Set` on a map: `ITERATE` (value iteration sees the new value).

use std::collections::HashMap;

use indexmap::IndexMap;
use smallvec::SmallVec;

use super::dep::Dep;
use super::op::{TrackKey, TriggerOp};
use crate::value::{ObjectId, TargetKind, Value};

pub(crate) type DepBatch = SmallVec<[Dep; 4]>;

#[derive(Debug, Default)]
pub(crate) struct TargetMap {
    targets: HashMap<ObjectId, IndexMap<TrackKey, Dep>>,
}

impl TargetMap {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Get or create the subscriber set for a slot.
    pub(crate) fn dep(&mut self, target: ObjectId, key: TrackKey) -> Dep {
        self.targets
            .entry(target)
            .or_default()
            .entry(key.clone())
            .or_insert_with(|| Dep::new(target, key))
            .clone()
    }

    /// Drop `dep` from its slot if it is still the registered set and has no
    /// members, then drop the source once it has no slots left.
    pub(crate) fn prune(&mut self, dep: &Dep) {
        let target = dep.target();
        let Some(keys) = self.targets.get_mut(&target) else {
            return;
        };
        if keys.get(dep.key()).is_some_and(|d| d.ptr_eq(dep) && d.is_empty()) {
            keys.shift_remove(dep.key());
        }
        if keys.is_empty() {
            self.targets.remove(&target);
        }
    }

    /// Look up an existing subscriber set without creating it.
    pub(crate) fn get(&self, target: ObjectId, key: &TrackKey) -> Option<Dep> {
        self.targets.get(&target)?.get(key).cloned()
    }

    pub(crate) fn is_tracked(&self, target: ObjectId) -> bool {
        self.targets.contains_key(&target)
    }

    /// Number of keys with a subscriber set on a source.
    #[cfg(test)]
    pub(crate) fn key_count(&self, target: ObjectId) -> usize {
        self.targets.get(&target).map_or(0, IndexMap::len)
    }

    /// Resolve the subscriber sets affected by a write.
    ///
    /// `kind` is `None` for single-value cells. Returns an empty batch for
    /// sources that were never tracked.
    pub(crate) fn collect(
        &self,
        target: ObjectId,
        kind: Option<TargetKind>,
        op: TriggerOp,
        key: Option<&TrackKey>,
        new_value: Option<&Value>,
    ) -> DepBatch {
        let mut batch = DepBatch::new();
        let Some(deps) = self.targets.get(&target) else {
            return batch;
        };

        let is_array = kind == Some(TargetKind::Array);
        let is_map = kind.is_some_and(TargetKind::is_map);

        if op == TriggerOp::Clear {
            batch.extend(deps.values().cloned());
        } else if is_array && key.is_some_and(TrackKey::is_length) {
            let new_len = new_value.and_then(Value::as_index).unwrap_or(0);
            for (k, dep) in deps {
                if k.is_length() || k.index().is_some_and(|i| i >= new_len) {
                    batch.push(dep.clone());
                }
            }
        } else {
            let mut add = |k: &TrackKey| {
                if let Some(dep) = deps.get(k) {
                    batch.push(dep.clone());
                }
            };
            if let Some(k) = key {
                add(k);
            }
            match op {
                TriggerOp::Add => {
                    add(&TrackKey::Iterate);
                    if is_map {
                        add(&TrackKey::MapKeyIterate);
                    }
                    if is_array && key.and_then(TrackKey::index).is_some() {
                        add(&TrackKey::length());
                    }
                }
                TriggerOp::Delete if !is_array => {
                    add(&TrackKey::Iterate);
                    if is_map {
                        add(&TrackKey::MapKeyIterate);
                    }
                }
                TriggerOp::Set if is_map => add(&TrackKey::Iterate),
                _ => {}
            }
        }
        batch
    }
}
