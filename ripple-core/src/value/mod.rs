//! Value Model
//!
//! The engine observes plain data described by a closed set of structural
//! families rather than arbitrary host objects. A [`Value`] is either a
//! primitive, a raw composite ([`Obj`]), a reactive view over a composite
//! ([`Reactive`]), or a single-value cell ([`Signal`], [`Computed`]).
//!
//! # Identity
//!
//! Composite values compare by identity, primitives by SameValueZero. The
//! same rules drive collection key lookup and change detection, see
//! [`ValueKey`] and [`has_changed`].

mod key;
mod object;

pub use key::{PropKey, Symbol, ValueKey, WellKnownSymbol};
pub use object::{Obj, ObjectId, TargetKind, MAX_ARRAY_LENGTH};
pub(crate) use object::ObjectCell;

use std::fmt;
use std::sync::Arc;

use crate::proxy::Reactive;
use crate::reactive::{Computed, Signal};

/// A dynamically typed value.
#[derive(Clone, Default)]
pub enum Value {
    #[default]
    Undefined,
    Null,
    Bool(bool),
    Number(f64),
    Str(Arc<str>),
    Symbol(Symbol),
    /// A raw composite object.
    Object(Obj),
    /// A tracked view over a raw composite object.
    Reactive(Reactive),
    Signal(Signal),
    Computed(Computed),
}

impl Value {
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Undefined => "undefined",
            Self::Null => "null",
            Self::Bool(_) => "boolean",
            Self::Number(_) => "number",
            Self::Str(_) => "string",
            Self::Symbol(_) => "symbol",
            Self::Object(_) => "object",
            Self::Reactive(_) => "reactive",
            Self::Signal(_) => "signal",
            Self::Computed(_) => "computed",
        }
    }

    pub fn is_undefined(&self) -> bool {
        matches!(self, Self::Undefined)
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Self::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(s) => Some(s),
            _ => None,
        }
    }

    /// A non-negative integral number usable as an array index or length,
    /// at most [`MAX_ARRAY_LENGTH`].
    pub fn as_index(&self) -> Option<usize> {
        match self {
            Self::Number(n)
                if *n >= 0.0 && *n <= MAX_ARRAY_LENGTH as f64 && n.fract() == 0.0 =>
            {
                Some(*n as usize)
            }
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&Obj> {
        match self {
            Self::Object(obj) => Some(obj),
            _ => None,
        }
    }

    pub fn as_reactive(&self) -> Option<&Reactive> {
        match self {
            Self::Reactive(view) => Some(view),
            _ => None,
        }
    }

    /// Raw objects and reactive views.
    pub fn is_composite(&self) -> bool {
        matches!(self, Self::Object(_) | Self::Reactive(_))
    }

    /// Single-value cells.
    pub fn is_ref(&self) -> bool {
        matches!(self, Self::Signal(_) | Self::Computed(_))
    }

    /// The raw object behind a composite value.
    pub(crate) fn raw_object(&self) -> Option<Obj> {
        match self {
            Self::Object(obj) => Some(obj.clone()),
            Self::Reactive(view) => Some(view.raw().clone()),
            _ => None,
        }
    }

    /// Identity used for collection keys and change detection.
    pub fn identity(&self) -> ValueKey {
        match self {
            Self::Undefined => ValueKey::Undefined,
            Self::Null => ValueKey::Null,
            Self::Bool(b) => ValueKey::Bool(*b),
            Self::Number(n) => ValueKey::number(*n),
            Self::Str(s) => ValueKey::Str(s.clone()),
            Self::Symbol(sym) => ValueKey::Symbol(sym.id()),
            Self::Object(obj) => ValueKey::Object(obj.id()),
            Self::Reactive(view) => ValueKey::Reactive(view.raw().id(), view.mode()),
            Self::Signal(signal) => ValueKey::Signal(signal.id()),
            Self::Computed(computed) => ValueKey::Computed(computed.id()),
        }
    }
}

/// NaN-aware change check: `true` unless both values have the same identity.
pub fn has_changed(value: &Value, old: &Value) -> bool {
    value.identity() != old.identity()
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        !has_changed(self, other)
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Undefined => f.write_str("undefined"),
            Self::Null => f.write_str("null"),
            Self::Bool(b) => write!(f, "{b}"),
            Self::Number(n) => write!(f, "{n}"),
            Self::Str(s) => write!(f, "{s:?}"),
            Self::Symbol(sym) => write!(f, "{sym:?}"),
            Self::Object(obj) => write!(f, "{obj:?}"),
            Self::Reactive(view) => write!(f, "{view:?}"),
            Self::Signal(signal) => write!(f, "Signal(#{})", signal.id().raw()),
            Self::Computed(computed) => write!(f, "Computed(#{})", computed.id().raw()),
        }
    }
}

impl From<()> for Value {
    fn from(_: ()) -> Self {
        Self::Undefined
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

macro_rules! number_from {
    ($($ty:ty),*) => {
        $(
            impl From<$ty> for Value {
                fn from(n: $ty) -> Self {
                    Self::Number(n as f64)
                }
            }
        )*
    };
}

number_from!(i32, i64, u32, u64, usize, f32, f64);

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::Str(Arc::from(s))
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::Str(Arc::from(s))
    }
}

impl From<Symbol> for Value {
    fn from(sym: Symbol) -> Self {
        Self::Symbol(sym)
    }
}

impl From<Obj> for Value {
    fn from(obj: Obj) -> Self {
        Self::Object(obj)
    }
}

impl From<Reactive> for Value {
    fn from(view: Reactive) -> Self {
        Self::Reactive(view)
    }
}

impl From<Signal> for Value {
    fn from(signal: Signal) -> Self {
        Self::Signal(signal)
    }
}

impl From<Computed> for Value {
    fn from(computed: Computed) -> Self {
        Self::Computed(computed)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::Undefined, Into::into)
    }
}
