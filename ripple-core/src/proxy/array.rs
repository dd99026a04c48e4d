//! Array instrumentations.
//!
//! Identity searches (`includes`, `index_of`, `last_index_of`) subscribe to
//! every index and to `length`, then search the raw items. A failed search is
//! retried with the argument's raw form, so searching for a view finds the
//! raw object stored in the array.
//!
//! Length-altering mutators run with tracking paused. They still go through
//! the base traps of the view they are called on, so every index write and
//! the final `length` write trigger as usual, but the effect calling them
//! does not subscribe to the `length` it reads along the way. Otherwise two
//! effects pushing to the same array would re-trigger each other forever.

use super::{Reactive, ReactiveIter};
use crate::graph::{TrackKey, TrackOp};
use crate::registry::to_raw;
use crate::value::{PropKey, TargetKind, Value};

#[derive(Clone, Copy)]
enum Search {
    Includes,
    First,
    Last,
}

impl Reactive {
    fn array_op<T>(&self, op: &'static str, fallback: T) -> Result<(), T> {
        if self.kind() != TargetKind::Array {
            return Err(self.unsupported(op, fallback));
        }
        if self.is_readonly() {
            crate::dev_warn!(self.runtime(), op, "array mutation failed: target is readonly");
            return Err(fallback);
        }
        Ok(())
    }

    /// Append items; returns the new length.
    pub fn push<I, V>(&self, items: I) -> usize
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        let current = self.raw().len();
        if let Err(len) = self.array_op("push", current) {
            return len;
        }
        let _paused = self.runtime().pause_scope();
        let mut len = self.len();
        for item in items {
            self.set_prop(PropKey::Index(len), item.into());
            len += 1;
        }
        self.set_prop(PropKey::length(), Value::from(len));
        len
    }

    /// Remove and return the last item.
    pub fn pop(&self) -> Value {
        if let Err(value) = self.array_op("pop", Value::Undefined) {
            return value;
        }
        let _paused = self.runtime().pause_scope();
        let len = self.len();
        if len == 0 {
            self.set_prop(PropKey::length(), Value::from(0));
            return Value::Undefined;
        }
        let last = PropKey::Index(len - 1);
        let value = self.get_prop(&last);
        self.delete(last.to_value());
        self.set_prop(PropKey::length(), Value::from(len - 1));
        value
    }

    /// Remove and return the first item, moving the rest down.
    pub fn shift(&self) -> Value {
        if let Err(value) = self.array_op("shift", Value::Undefined) {
            return value;
        }
        let _paused = self.runtime().pause_scope();
        let len = self.len();
        if len == 0 {
            self.set_prop(PropKey::length(), Value::from(0));
            return Value::Undefined;
        }
        let first = self.get_prop(&PropKey::Index(0));
        for k in 1..len {
            let moved = self.get_prop(&PropKey::Index(k));
            self.set_prop(PropKey::Index(k - 1), moved);
        }
        self.delete(len - 1);
        self.set_prop(PropKey::length(), Value::from(len - 1));
        first
    }

    /// Insert items at the front; returns the new length.
    pub fn unshift<I, V>(&self, items: I) -> usize
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        let current = self.raw().len();
        if let Err(len) = self.array_op("unshift", current) {
            return len;
        }
        let items: Vec<Value> = items.into_iter().map(Into::into).collect();
        let _paused = self.runtime().pause_scope();
        let len = self.len();
        let count = items.len();
        if count > 0 {
            for k in (0..len).rev() {
                let moved = self.get_prop(&PropKey::Index(k));
                self.set_prop(PropKey::Index(k + count), moved);
            }
            for (j, item) in items.into_iter().enumerate() {
                self.set_prop(PropKey::Index(j), item);
            }
        }
        self.set_prop(PropKey::length(), Value::from(len + count));
        len + count
    }

    /// Remove `delete_count` items at `start`, insert `items` there, and
    /// return the removed items.
    pub fn splice<I, V>(&self, start: usize, delete_count: usize, items: I) -> Vec<Value>
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        if let Err(removed) = self.array_op("splice", Vec::new()) {
            return removed;
        }
        let items: Vec<Value> = items.into_iter().map(Into::into).collect();
        let _paused = self.runtime().pause_scope();
        let len = self.len();
        let start = start.min(len);
        let delete_count = delete_count.min(len - start);
        let count = items.len();

        let removed = (start..start + delete_count)
            .map(|k| self.get_prop(&PropKey::Index(k)))
            .collect();

        if count < delete_count {
            for k in start..len - delete_count {
                let moved = self.get_prop(&PropKey::Index(k + delete_count));
                self.set_prop(PropKey::Index(k + count), moved);
            }
            for k in (len - delete_count + count..len).rev() {
                self.delete(k);
            }
        } else if count > delete_count {
            for k in (start..len - delete_count).rev() {
                let moved = self.get_prop(&PropKey::Index(k + delete_count));
                self.set_prop(PropKey::Index(k + count), moved);
            }
        }
        for (j, item) in items.into_iter().enumerate() {
            self.set_prop(PropKey::Index(start + j), item);
        }
        self.set_prop(PropKey::length(), Value::from(len - delete_count + count));
        removed
    }

    /// Write `length` directly, truncating or padding.
    pub fn set_len(&self, len: usize) -> bool {
        if self.kind() != TargetKind::Array {
            return self.unsupported("set_len", false);
        }
        self.set_prop(PropKey::length(), Value::from(len))
    }

    /// Items in order; tracks `length` and every index read.
    pub fn iter(&self) -> ReactiveIter {
        if self.kind() != TargetKind::Array {
            return self.unsupported("iter", ReactiveIter::ready(Vec::new()));
        }
        self.values()
    }

    /// SameValueZero membership: `NaN` is found.
    pub fn includes(&self, value: impl Into<Value>) -> bool {
        self.search(Search::Includes, &value.into()).is_some()
    }

    /// Strict-equality position of the first match: `NaN` is never found.
    pub fn index_of(&self, value: impl Into<Value>) -> Option<usize> {
        self.search(Search::First, &value.into())
    }

    pub fn last_index_of(&self, value: impl Into<Value>) -> Option<usize> {
        self.search(Search::Last, &value.into())
    }

    fn search(&self, search: Search, value: &Value) -> Option<usize> {
        if self.kind() != TargetKind::Array {
            return self.unsupported("search", None);
        }
        let raw = self.raw();
        let runtime = self.runtime();
        let len = raw.len();
        runtime.track(raw.id(), TrackOp::Get, TrackKey::length());
        for i in 0..len {
            runtime.track(raw.id(), TrackOp::Get, TrackKey::Prop(PropKey::Index(i)));
        }

        let items: Vec<Value> = (0..len).map(|i| raw.get(&PropKey::Index(i))).collect();
        let find = |needle: &Value| -> Option<usize> {
            if matches!(search, Search::First | Search::Last)
                && needle.as_number().is_some_and(f64::is_nan)
            {
                return None;
            }
            let mut positions = items.iter().enumerate().filter(|(_, item)| *item == needle);
            match search {
                Search::Last => positions.last().map(|(i, _)| i),
                _ => positions.next().map(|(i, _)| i),
            }
        };

        find(value).or_else(|| {
            let raw_value = to_raw(value);
            if raw_value == *value {
                None
            } else {
                find(&raw_value)
            }
        })
    }
}
