//! Raw Objects
//!
//! An [`Obj`] is a shared handle to plain, untracked data. The operations here
//! implement ordinary read/write semantics; the interception layer in
//! [`crate::proxy`] calls them after (or before) recording dependencies.
//!
//! # Weak collections
//!
//! `WeakMap` and `WeakSet` only accept composite keys. Entries hold their key
//! object weakly and are dropped once the key object is gone.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use indexmap::IndexMap;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use super::{PropKey, Value, ValueKey};

/// Largest array length. Valid indices run strictly below it.
pub const MAX_ARRAY_LENGTH: usize = u32::MAX as usize;

/// Process-unique identity of a trackable source (object, signal or computed).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ObjectId(u64);

impl ObjectId {
    /// Generate a new unique id.
    pub fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the raw id value.
    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl Default for ObjectId {
    fn default() -> Self {
        Self::new()
    }
}

/// Structural family of a raw object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TargetKind {
    /// Keyed record.
    Record,
    /// Array-like sequence.
    Array,
    Map,
    Set,
    WeakMap,
    WeakSet,
}

impl TargetKind {
    pub const ALL: [TargetKind; 6] = [
        Self::Record,
        Self::Array,
        Self::Map,
        Self::Set,
        Self::WeakMap,
        Self::WeakSet,
    ];

    /// Collections are intercepted through their methods rather than
    /// property access.
    pub fn is_collection(self) -> bool {
        !matches!(self, Self::Record | Self::Array)
    }

    /// Map and WeakMap.
    pub fn is_map(self) -> bool {
        matches!(self, Self::Map | Self::WeakMap)
    }

    /// Weak collections are neither iterable nor sized.
    pub fn is_weak(self) -> bool {
        matches!(self, Self::WeakMap | Self::WeakSet)
    }
}

pub(crate) struct Record {
    props: IndexMap<PropKey, Value>,
    proto: Option<Value>,
}

pub(crate) enum ObjectData {
    Record(Record),
    Array(Vec<Value>),
    Map(IndexMap<ValueKey, (Value, Value)>),
    Set(IndexMap<ValueKey, Value>),
    WeakMap(HashMap<ValueKey, (Weak<ObjectCell>, Value)>),
    WeakSet(HashMap<ValueKey, Weak<ObjectCell>>),
}

impl ObjectData {
    fn kind(&self) -> TargetKind {
        match self {
            Self::Record(_) => TargetKind::Record,
            Self::Array(_) => TargetKind::Array,
            Self::Map(_) => TargetKind::Map,
            Self::Set(_) => TargetKind::Set,
            Self::WeakMap(_) => TargetKind::WeakMap,
            Self::WeakSet(_) => TargetKind::WeakSet,
        }
    }
}

pub(crate) struct ObjectCell {
    id: ObjectId,
    kind: TargetKind,
    data: RwLock<ObjectData>,
    frozen: AtomicBool,
    skip: AtomicBool,
}

/// Shared handle to a raw composite object.
///
/// Cloning the handle shares the object; identity is preserved.
#[derive(Clone)]
pub struct Obj(Arc<ObjectCell>);

impl Obj {
    fn from_data(data: ObjectData) -> Self {
        Self(Arc::new(ObjectCell {
            id: ObjectId::new(),
            kind: data.kind(),
            data: RwLock::new(data),
            frozen: AtomicBool::new(false),
            skip: AtomicBool::new(false),
        }))
    }

    /// An empty record.
    pub fn record() -> Self {
        Self::record_from(std::iter::empty::<(PropKey, Value)>())
    }

    /// A record with the given properties, in order.
    pub fn record_from<K, V, I>(props: I) -> Self
    where
        K: Into<PropKey>,
        V: Into<Value>,
        I: IntoIterator<Item = (K, V)>,
    {
        Self::from_data(ObjectData::Record(Record {
            props: props.into_iter().map(|(k, v)| (k.into(), v.into())).collect(),
            proto: None,
        }))
    }

    /// An array with the given items.
    pub fn array<V, I>(items: I) -> Self
    where
        V: Into<Value>,
        I: IntoIterator<Item = V>,
    {
        Self::from_data(ObjectData::Array(items.into_iter().map(Into::into).collect()))
    }

    pub fn map() -> Self {
        Self::from_data(ObjectData::Map(IndexMap::new()))
    }

    /// A map with the given entries. Later duplicates overwrite earlier ones.
    pub fn map_from<K, V, I>(entries: I) -> Self
    where
        K: Into<Value>,
        V: Into<Value>,
        I: IntoIterator<Item = (K, V)>,
    {
        let map = Self::map();
        for (k, v) in entries {
            map.entry_set(k.into(), v.into());
        }
        map
    }

    pub fn new_set() -> Self {
        Self::from_data(ObjectData::Set(IndexMap::new()))
    }

    pub fn set_from<V, I>(values: I) -> Self
    where
        V: Into<Value>,
        I: IntoIterator<Item = V>,
    {
        let set = Self::new_set();
        for v in values {
            set.entry_add(v.into());
        }
        set
    }

    pub fn weak_map() -> Self {
        Self::from_data(ObjectData::WeakMap(HashMap::new()))
    }

    pub fn weak_set() -> Self {
        Self::from_data(ObjectData::WeakSet(HashMap::new()))
    }

    /// Set the prototype of a record. Ignored for other kinds.
    pub fn with_proto(self, proto: impl Into<Value>) -> Self {
        if let ObjectData::Record(record) = &mut *self.0.data.write() {
            record.proto = Some(proto.into());
        }
        self
    }

    pub fn id(&self) -> ObjectId {
        self.0.id
    }

    pub fn kind(&self) -> TargetKind {
        self.0.kind
    }

    /// Prevent all further writes. Writes to a frozen object report `false`.
    pub fn freeze(&self) {
        self.0.frozen.store(true, Ordering::SeqCst);
    }

    pub fn is_frozen(&self) -> bool {
        self.0.frozen.load(Ordering::SeqCst)
    }

    pub(crate) fn mark_raw(&self) {
        self.0.skip.store(true, Ordering::SeqCst);
    }

    /// Whether the object has been opted out of wrapping.
    pub fn is_marked_raw(&self) -> bool {
        self.0.skip.load(Ordering::SeqCst)
    }

    pub(crate) fn downgrade(&self) -> Weak<ObjectCell> {
        Arc::downgrade(&self.0)
    }

    // ------------------------------------------------------------------
    // Property access (records and arrays)
    // ------------------------------------------------------------------

    /// Read a property, walking the prototype chain of records.
    pub fn get(&self, key: &PropKey) -> Value {
        let proto = match &*self.0.data.read() {
            ObjectData::Record(record) => match record.props.get(key) {
                Some(value) => return value.clone(),
                None => record.proto.clone(),
            },
            ObjectData::Array(items) => return array_get(items, key),
            _ => return Value::Undefined,
        };
        proto
            .and_then(|proto| proto.raw_object())
            .map_or(Value::Undefined, |proto| proto.get(key))
    }

    /// Read an own property without consulting the prototype.
    pub fn get_own(&self, key: &PropKey) -> Option<Value> {
        match &*self.0.data.read() {
            ObjectData::Record(record) => record.props.get(key).cloned(),
            ObjectData::Array(items) => match key {
                PropKey::Index(i) => items.get(*i).cloned(),
                k if k.is_length() => Some(Value::from(items.len())),
                _ => None,
            },
            _ => None,
        }
    }

    pub fn has_own(&self, key: &PropKey) -> bool {
        match &*self.0.data.read() {
            ObjectData::Record(record) => record.props.contains_key(key),
            ObjectData::Array(items) => match key {
                PropKey::Index(i) => *i < items.len(),
                k => k.is_length(),
            },
            _ => false,
        }
    }

    /// Whether the key exists on the object or its prototype chain.
    pub fn has(&self, key: &PropKey) -> bool {
        if self.has_own(key) {
            return true;
        }
        self.proto()
            .and_then(|proto| proto.raw_object())
            .is_some_and(|proto| proto.has(key))
    }

    pub fn proto(&self) -> Option<Value> {
        match &*self.0.data.read() {
            ObjectData::Record(record) => record.proto.clone(),
            _ => None,
        }
    }

    /// Write an own property.
    ///
    /// Writing an array index past the end pads with `undefined`; writing
    /// `length` truncates or pads.
    pub fn set(&self, key: PropKey, value: Value) -> bool {
        if self.is_frozen() {
            return false;
        }
        match &mut *self.0.data.write() {
            ObjectData::Record(record) => {
                record.props.insert(key, value);
                true
            }
            ObjectData::Array(items) => match key {
                PropKey::Index(i) if i < MAX_ARRAY_LENGTH => {
                    if i >= items.len() && !resize_items(items, i + 1) {
                        return false;
                    }
                    items[i] = value;
                    true
                }
                k if k.is_length() => value
                    .as_index()
                    .is_some_and(|len| resize_items(items, len)),
                _ => false,
            },
            _ => false,
        }
    }

    /// Delete an own property. Deleting an array slot leaves a hole.
    pub fn delete(&self, key: &PropKey) -> bool {
        if self.is_frozen() {
            return false;
        }
        match &mut *self.0.data.write() {
            ObjectData::Record(record) => {
                record.props.shift_remove(key);
                true
            }
            ObjectData::Array(items) => match key {
                PropKey::Index(i) => {
                    if let Some(slot) = items.get_mut(*i) {
                        *slot = Value::Undefined;
                    }
                    true
                }
                k => !k.is_length(),
            },
            _ => false,
        }
    }

    /// Own enumerable keys: integer keys ascending, then names in insertion
    /// order, then symbols.
    pub fn own_keys(&self) -> Vec<PropKey> {
        match &*self.0.data.read() {
            ObjectData::Record(record) => {
                let mut indices: Vec<usize> =
                    record.props.keys().filter_map(PropKey::as_index).collect();
                indices.sort_unstable();
                let names = record
                    .props
                    .keys()
                    .filter(|k| matches!(k, PropKey::Name(_)))
                    .cloned();
                let symbols = record
                    .props
                    .keys()
                    .filter(|k| matches!(k, PropKey::Symbol(_)))
                    .cloned();
                indices
                    .into_iter()
                    .map(PropKey::Index)
                    .chain(names)
                    .chain(symbols)
                    .collect()
            }
            ObjectData::Array(items) => (0..items.len()).map(PropKey::Index).collect(),
            _ => Vec::new(),
        }
    }

    /// Array length, record key count, or collection size.
    pub fn len(&self) -> usize {
        match &*self.0.data.read() {
            ObjectData::Record(record) => record.props.len(),
            ObjectData::Array(items) => items.len(),
            ObjectData::Map(map) => map.len(),
            ObjectData::Set(set) => set.len(),
            ObjectData::WeakMap(map) => map.values().filter(|(k, _)| k.strong_count() > 0).count(),
            ObjectData::WeakSet(set) => set.values().filter(|k| k.strong_count() > 0).count(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    // ------------------------------------------------------------------
    // Collection access (maps and sets)
    // ------------------------------------------------------------------

    /// Look up a map entry by key identity.
    pub fn entry_get(&self, key: &Value) -> Option<Value> {
        let id = key.identity();
        match &*self.0.data.read() {
            ObjectData::Map(map) => map.get(&id).map(|(_, v)| v.clone()),
            ObjectData::WeakMap(map) => map
                .get(&id)
                .filter(|(k, _)| k.strong_count() > 0)
                .map(|(_, v)| v.clone()),
            _ => None,
        }
    }

    /// Membership by key identity for all four collection kinds.
    pub fn entry_has(&self, key: &Value) -> bool {
        let id = key.identity();
        match &*self.0.data.read() {
            ObjectData::Map(map) => map.contains_key(&id),
            ObjectData::Set(set) => set.contains_key(&id),
            ObjectData::WeakMap(map) => map.get(&id).is_some_and(|(k, _)| k.strong_count() > 0),
            ObjectData::WeakSet(set) => set.get(&id).is_some_and(|k| k.strong_count() > 0),
            _ => false,
        }
    }

    /// Insert or update a map entry. An existing entry keeps its position and
    /// its original key.
    pub fn entry_set(&self, key: Value, value: Value) -> bool {
        if self.is_frozen() {
            return false;
        }
        let id = key.identity();
        match &mut *self.0.data.write() {
            ObjectData::Map(map) => {
                match map.get_mut(&id) {
                    Some(entry) => entry.1 = value,
                    None => {
                        map.insert(id, (key, value));
                    }
                }
                true
            }
            ObjectData::WeakMap(map) => match key.raw_object() {
                Some(target) => {
                    map.retain(|_, (k, _)| k.strong_count() > 0);
                    map.insert(id, (target.downgrade(), value));
                    true
                }
                None => false,
            },
            _ => false,
        }
    }

    /// Add a set member. Returns whether it was newly inserted.
    pub fn entry_add(&self, value: Value) -> bool {
        if self.is_frozen() {
            return false;
        }
        let id = value.identity();
        match &mut *self.0.data.write() {
            ObjectData::Set(set) => {
                if set.contains_key(&id) {
                    return false;
                }
                set.insert(id, value);
                true
            }
            ObjectData::WeakSet(set) => match value.raw_object() {
                Some(target) => {
                    set.retain(|_, k| k.strong_count() > 0);
                    set.insert(id, target.downgrade()).is_none()
                }
                None => false,
            },
            _ => false,
        }
    }

    /// Remove an entry. Returns whether something was removed.
    pub fn entry_delete(&self, key: &Value) -> bool {
        if self.is_frozen() {
            return false;
        }
        let id = key.identity();
        match &mut *self.0.data.write() {
            ObjectData::Map(map) => map.shift_remove(&id).is_some(),
            ObjectData::Set(set) => set.shift_remove(&id).is_some(),
            ObjectData::WeakMap(map) => map.remove(&id).is_some_and(|(k, _)| k.strong_count() > 0),
            ObjectData::WeakSet(set) => set.remove(&id).is_some_and(|k| k.strong_count() > 0),
            _ => false,
        }
    }

    /// Remove every entry of a map or set. Returns whether anything was
    /// removed.
    pub fn clear(&self) -> bool {
        if self.is_frozen() {
            return false;
        }
        match &mut *self.0.data.write() {
            ObjectData::Map(map) => {
                let had = !map.is_empty();
                map.clear();
                had
            }
            ObjectData::Set(set) => {
                let had = !set.is_empty();
                set.clear();
                had
            }
            _ => false,
        }
    }

    /// Entries in insertion order: `(key, value)` for maps, `(value, value)`
    /// for sets. Weak collections yield nothing.
    pub fn entries(&self) -> Vec<(Value, Value)> {
        match &*self.0.data.read() {
            ObjectData::Map(map) => map.values().cloned().collect(),
            ObjectData::Set(set) => set.values().map(|v| (v.clone(), v.clone())).collect(),
            ObjectData::Array(items) => items
                .iter()
                .enumerate()
                .map(|(i, v)| (Value::from(i), v.clone()))
                .collect(),
            _ => Vec::new(),
        }
    }

    /// A shallow copy with a fresh identity.
    pub fn snapshot(&self) -> Obj {
        let data = match &*self.0.data.read() {
            ObjectData::Record(record) => ObjectData::Record(Record {
                props: record.props.clone(),
                proto: record.proto.clone(),
            }),
            ObjectData::Array(items) => ObjectData::Array(items.clone()),
            ObjectData::Map(map) => ObjectData::Map(map.clone()),
            ObjectData::Set(set) => ObjectData::Set(set.clone()),
            ObjectData::WeakMap(map) => ObjectData::WeakMap(map.clone()),
            ObjectData::WeakSet(set) => ObjectData::WeakSet(set.clone()),
        };
        Self::from_data(data)
    }
}

/// Truncate or pad to `len`. Fails without touching `items` when `len` is
/// out of range or the storage cannot be allocated.
fn resize_items(items: &mut Vec<Value>, len: usize) -> bool {
    if len > MAX_ARRAY_LENGTH {
        return false;
    }
    if len > items.len() && items.try_reserve_exact(len - items.len()).is_err() {
        return false;
    }
    items.resize(len, Value::Undefined);
    true
}

fn array_get(items: &[Value], key: &PropKey) -> Value {
    match key {
        PropKey::Index(i) => items.get(*i).cloned().unwrap_or_default(),
        k if k.is_length() => Value::from(items.len()),
        _ => Value::Undefined,
    }
}

impl PartialEq for Obj {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl Eq for Obj {}

impl fmt::Debug for Obj {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Obj(#{} {:?})", self.0.id.raw(), self.0.kind)
    }
}
