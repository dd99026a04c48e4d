//! Interception Layer
//!
//! A [`Reactive`] is an explicit capability wrapper over a raw [`Obj`]. Every
//! read goes through `track` and every write through `trigger`, so effects
//! reading a view re-run when the data behind it changes.
//!
//! Rust has no transparent property interception, so consumers call accessor
//! methods (`get`, `set`, `has`, `delete`, `push`, `add`, ...) instead of
//! native field or index syntax. The accessors are uniform across structural
//! families and dispatch on [`TargetKind`]:
//!
//! - records and arrays use the *base traps* ([`base`], [`array`]);
//! - maps, sets and their weak variants use the *collection traps*
//!   ([`collection`]), keyed by arbitrary values.
//!
//! Operations a family does not support warn and return a neutral value.
//!
//! # Variants
//!
//! A view has a [`Mode`]: mutable or readonly, deep or shallow. Deep views
//! wrap nested composites lazily on read, matching their own readonly-ness.
//! Readonly views reject writes softly: the write is dropped, a warning is
//! emitted, and the operation reports `false`.

mod array;
mod base;
mod collection;

pub use collection::{ReactiveEntries, ReactiveIter};

use std::fmt;

use crate::reactive::WeakRuntime;
use crate::value::{Obj, PropKey, TargetKind, Value};

/// Wrapper variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Mode {
    /// Deep, mutable.
    Reactive,
    /// Deep, readonly.
    Readonly,
    /// Root-level only, mutable.
    ShallowReactive,
    /// Root-level only, readonly.
    ShallowReadonly,
}

impl Mode {
    pub fn is_readonly(self) -> bool {
        matches!(self, Self::Readonly | Self::ShallowReadonly)
    }

    pub fn is_shallow(self) -> bool {
        matches!(self, Self::ShallowReactive | Self::ShallowReadonly)
    }

    /// Mode used for nested composites read through a deep view.
    pub(crate) fn child(self) -> Mode {
        if self.is_readonly() {
            Self::Readonly
        } else {
            Self::Reactive
        }
    }

    pub(crate) fn bit(self) -> u8 {
        match self {
            Self::Reactive => 1,
            Self::Readonly => 2,
            Self::ShallowReactive => 4,
            Self::ShallowReadonly => 8,
        }
    }
}

/// Metadata keys answered by a view itself instead of the raw object.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReactiveFlag {
    /// The raw object was marked raw.
    Skip,
    IsReactive,
    IsReadonly,
    IsShallow,
    /// The raw object itself.
    Raw,
}

/// A tracked view over a raw composite object.
///
/// Two views are equal when they cover the same raw object with the same
/// [`Mode`]; wrapping twice yields equal views.
#[derive(Clone)]
pub struct Reactive {
    raw: Obj,
    mode: Mode,
    runtime: WeakRuntime,
}

impl Reactive {
    pub(crate) fn new(raw: Obj, mode: Mode, runtime: WeakRuntime) -> Self {
        Self { raw, mode, runtime }
    }

    /// The raw object behind this view.
    pub fn raw(&self) -> &Obj {
        &self.raw
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn kind(&self) -> TargetKind {
        self.raw.kind()
    }

    pub fn is_readonly(&self) -> bool {
        self.mode.is_readonly()
    }

    pub fn is_shallow(&self) -> bool {
        self.mode.is_shallow()
    }

    pub(crate) fn runtime(&self) -> &WeakRuntime {
        &self.runtime
    }

    /// Answer a metadata query without touching the raw object's data.
    pub fn flag(&self, flag: ReactiveFlag) -> Value {
        match flag {
            ReactiveFlag::Skip => Value::Bool(self.raw.is_marked_raw()),
            ReactiveFlag::IsReactive => Value::Bool(!self.mode.is_readonly()),
            ReactiveFlag::IsReadonly => Value::Bool(self.mode.is_readonly()),
            ReactiveFlag::IsShallow => Value::Bool(self.mode.is_shallow()),
            ReactiveFlag::Raw => Value::Object(self.raw.clone()),
        }
    }

    /// Wrap a value read from this view according to the view's mode.
    pub(crate) fn convert(&self, value: Value) -> Value {
        if self.mode.is_shallow() {
            value
        } else {
            self.runtime.convert(value, self.mode.child())
        }
    }

    fn unsupported<T>(&self, op: &'static str, fallback: T) -> T {
        crate::dev_warn!(
            self.runtime,
            op,
            kind = ?self.kind(),
            "operation is not supported by this structural family"
        );
        fallback
    }

    // ------------------------------------------------------------------
    // Uniform accessors
    // ------------------------------------------------------------------

    /// Read a property (records, arrays) or a map entry (maps).
    pub fn get(&self, key: impl Into<Value>) -> Value {
        let key = key.into();
        match self.kind() {
            TargetKind::Record | TargetKind::Array => self.get_prop(&PropKey::from_value(&key)),
            TargetKind::Map | TargetKind::WeakMap => collection::get(self, &key),
            TargetKind::Set | TargetKind::WeakSet => self.unsupported("get", Value::Undefined),
        }
    }

    /// Read a property by key.
    pub fn get_prop(&self, key: &PropKey) -> Value {
        match self.kind() {
            TargetKind::Record | TargetKind::Array => base::get(self, key),
            _ => self.unsupported("get", Value::Undefined),
        }
    }

    /// Write a property (records, arrays) or a map entry (maps). Returns
    /// whether the write was applied. A readonly view swallows the write and
    /// reports `true`.
    pub fn set(&self, key: impl Into<Value>, value: impl Into<Value>) -> bool {
        let key = key.into();
        match self.kind() {
            TargetKind::Record | TargetKind::Array => {
                self.set_prop(PropKey::from_value(&key), value.into())
            }
            TargetKind::Map | TargetKind::WeakMap => collection::set(self, key, value.into()),
            TargetKind::Set | TargetKind::WeakSet => self.unsupported("set", false),
        }
    }

    /// Write a property by key.
    pub fn set_prop(&self, key: PropKey, value: Value) -> bool {
        match self.kind() {
            TargetKind::Record | TargetKind::Array => base::set(self, key, value, self),
            _ => self.unsupported("set", false),
        }
    }

    /// Property membership (records, arrays) or entry membership
    /// (collections).
    pub fn has(&self, key: impl Into<Value>) -> bool {
        let key = key.into();
        if self.kind().is_collection() {
            collection::has(self, &key)
        } else {
            base::has(self, &PropKey::from_value(&key))
        }
    }

    /// Delete a property or entry. Returns whether the deletion was applied,
    /// so readonly views always report `false`.
    pub fn delete(&self, key: impl Into<Value>) -> bool {
        let key = key.into();
        if self.kind().is_collection() {
            collection::delete(self, key)
        } else {
            base::delete(self, &PropKey::from_value(&key))
        }
    }

    /// Own keys of a record or array. Tracks structural changes.
    pub fn own_keys(&self) -> Vec<PropKey> {
        if self.kind().is_collection() {
            return self.unsupported("own_keys", Vec::new());
        }
        base::own_keys(self)
    }

    /// Array length, record key count or collection size.
    pub fn len(&self) -> usize {
        match self.kind() {
            TargetKind::Record => self.own_keys().len(),
            TargetKind::Array => self.get_prop(&PropKey::length()).as_index().unwrap_or(0),
            _ => self.size(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Keys: record keys, array indices, map keys or set members.
    pub fn keys(&self) -> ReactiveIter {
        match self.kind() {
            TargetKind::Record => ReactiveIter::ready(
                self.own_keys().iter().map(PropKey::to_value).collect(),
            ),
            TargetKind::Array => ReactiveIter::ready((0..self.len()).map(Value::from).collect()),
            TargetKind::Map | TargetKind::Set => collection::keys(self),
            _ => self.unsupported("keys", ReactiveIter::ready(Vec::new())),
        }
    }

    /// Values: record values, array items, map values or set members.
    pub fn values(&self) -> ReactiveIter {
        match self.kind() {
            TargetKind::Record | TargetKind::Array => {
                ReactiveIter::ready(self.base_entries().into_iter().map(|(_, v)| v).collect())
            }
            TargetKind::Map | TargetKind::Set => collection::values(self),
            _ => self.unsupported("values", ReactiveIter::ready(Vec::new())),
        }
    }

    /// `(key, value)` pairs; sets yield `(member, member)`.
    pub fn entries(&self) -> ReactiveEntries {
        match self.kind() {
            TargetKind::Record | TargetKind::Array => ReactiveEntries::ready(self.base_entries()),
            TargetKind::Map | TargetKind::Set => collection::entries(self),
            _ => self.unsupported("entries", ReactiveEntries::ready(Vec::new())),
        }
    }

    /// Call `f(value, key)` for every entry.
    pub fn for_each(&self, mut f: impl FnMut(Value, Value)) {
        match self.kind() {
            TargetKind::Map | TargetKind::Set => collection::for_each(self, f),
            TargetKind::Record | TargetKind::Array => {
                for (key, value) in self.base_entries() {
                    f(value, key);
                }
            }
            _ => self.unsupported("for_each", ()),
        }
    }

    fn base_entries(&self) -> Vec<(Value, Value)> {
        let keys = match self.kind() {
            TargetKind::Array => (0..self.len()).map(PropKey::Index).collect(),
            _ => self.own_keys(),
        };
        keys.into_iter()
            .map(|key| {
                let value = self.get_prop(&key);
                (key.to_value(), value)
            })
            .collect()
    }

    // ------------------------------------------------------------------
    // Collection methods
    // ------------------------------------------------------------------

    /// Add a member to a set. Returns whether it was newly added; a readonly
    /// view swallows the call and reports `true`.
    pub fn add(&self, value: impl Into<Value>) -> bool {
        match self.kind() {
            TargetKind::Set | TargetKind::WeakSet => collection::add(self, value.into()),
            _ => self.unsupported("add", false),
        }
    }

    /// Remove every entry of a map or set. Returns whether anything was
    /// removed.
    pub fn clear(&self) -> bool {
        match self.kind() {
            TargetKind::Map | TargetKind::Set => collection::clear(self),
            _ => self.unsupported("clear", false),
        }
    }

    /// Number of entries of a map or set. Tracks structural changes.
    pub fn size(&self) -> usize {
        match self.kind() {
            TargetKind::Map | TargetKind::Set => collection::size(self),
            _ => self.unsupported("size", 0),
        }
    }
}

impl PartialEq for Reactive {
    fn eq(&self, other: &Self) -> bool {
        self.raw == other.raw && self.mode == other.mode
    }
}

impl Eq for Reactive {}

impl fmt::Debug for Reactive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Reactive(#{} {:?} {:?})",
            self.raw.id().raw(),
            self.raw.kind(),
            self.mode
        )
    }
}
