//! Operation Taxonomy
//!
//! Reads are recorded with a [`TrackOp`], writes announced with a
//! [`TriggerOp`]. Both name the affected slot with a [`TrackKey`].

use std::fmt;
use std::sync::Arc;

use crate::value::{PropKey, ValueKey};

/// Kind of read being tracked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TrackOp {
    Get,
    Has,
    Iterate,
}

/// Kind of write being triggered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TriggerOp {
    Set,
    Add,
    Delete,
    Clear,
}

/// The slot of a source that a dependency refers to.
#[derive(Clone, PartialEq, Eq, Hash)]
pub enum TrackKey {
    /// A record property, array index or the array `length`.
    Prop(PropKey),
    /// A map key or set member, by identity.
    Entry(ValueKey),
    /// Structural interest: membership or order changed.
    Iterate,
    /// Key-only iteration of a map; unaffected by value updates.
    MapKeyIterate,
}

impl TrackKey {
    /// The `value` slot of single-value cells.
    pub fn value() -> Self {
        Self::Prop(PropKey::Name(Arc::from("value")))
    }

    pub fn length() -> Self {
        Self::Prop(PropKey::length())
    }

    pub fn is_length(&self) -> bool {
        matches!(self, Self::Prop(key) if key.is_length())
    }

    /// The array index this key addresses, if any.
    pub fn index(&self) -> Option<usize> {
        match self {
            Self::Prop(key) => key.as_index(),
            _ => None,
        }
    }
}

impl From<PropKey> for TrackKey {
    fn from(key: PropKey) -> Self {
        Self::Prop(key)
    }
}

impl fmt::Debug for TrackKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Prop(PropKey::Index(i)) => write!(f, "{i}"),
            Self::Prop(PropKey::Name(name)) => write!(f, "{name:?}"),
            Self::Prop(PropKey::Symbol(sym)) => write!(f, "{sym:?}"),
            Self::Entry(key) => write!(f, "entry({key:?})"),
            Self::Iterate => f.write_str("ITERATE"),
            Self::MapKeyIterate => f.write_str("MAP_KEY_ITERATE"),
        }
    }
}
