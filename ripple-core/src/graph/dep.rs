//! Subscriber Sets
//!
//! A [`Dep`] is the set of effects interested in one `(source, key)` slot.
//! The same `Dep` is shared by the target map and by every subscribed
//! effect's dependency list, so an effect can leave all of its sets in time
//! proportional to the number of sets it joined. A set that loses its last
//! member is pruned from the target map.

use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;
use parking_lot::Mutex;

use super::op::TrackKey;
use crate::reactive::{Effect, SubscriberId};
use crate::value::ObjectId;

/// Insertion-ordered set of subscribed effects, tagged with the slot it
/// belongs to so an emptied set can be removed from the target map.
#[derive(Clone)]
pub(crate) struct Dep(Arc<DepInner>);

struct DepInner {
    target: ObjectId,
    key: TrackKey,
    subscribers: Mutex<IndexMap<SubscriberId, Effect>>,
}

impl Dep {
    pub(crate) fn new(target: ObjectId, key: TrackKey) -> Self {
        Self(Arc::new(DepInner {
            target,
            key,
            subscribers: Mutex::new(IndexMap::new()),
        }))
    }

    pub(crate) fn target(&self) -> ObjectId {
        self.0.target
    }

    pub(crate) fn key(&self) -> &TrackKey {
        &self.0.key
    }

    /// Add an effect. Returns `false` if it was already a member.
    pub(crate) fn insert(&self, effect: &Effect) -> bool {
        let mut subscribers = self.0.subscribers.lock();
        if subscribers.contains_key(&effect.id()) {
            return false;
        }
        subscribers.insert(effect.id(), effect.clone());
        true
    }

    /// Remove an effect. Returns `true` if the set is now empty.
    pub(crate) fn remove(&self, id: SubscriberId) -> bool {
        let mut subscribers = self.0.subscribers.lock();
        subscribers.shift_remove(&id);
        subscribers.is_empty()
    }

    /// Snapshot of the members, in subscription order.
    pub(crate) fn subscribers(&self) -> Vec<Effect> {
        self.0.subscribers.lock().values().cloned().collect()
    }

    pub(crate) fn len(&self) -> usize {
        self.0.subscribers.lock().len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.0.subscribers.lock().is_empty()
    }

    pub(crate) fn ptr_eq(&self, other: &Dep) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for Dep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dep")
            .field("target", &self.0.target)
            .field("key", &self.0.key)
            .field("subscribers", &self.len())
            .finish()
    }
}
