//! Property keys, symbols and value identity.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use super::{ObjectId, Value};
use crate::proxy::Mode;

/// Well-known symbols. Reads keyed by these bypass dependency tracking.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WellKnownSymbol {
    Iterator,
    AsyncIterator,
    HasInstance,
    ToPrimitive,
    ToStringTag,
}

impl WellKnownSymbol {
    fn id(self) -> u64 {
        self as u64
    }

    fn description(self) -> &'static str {
        match self {
            Self::Iterator => "Symbol.iterator",
            Self::AsyncIterator => "Symbol.asyncIterator",
            Self::HasInstance => "Symbol.hasInstance",
            Self::ToPrimitive => "Symbol.toPrimitive",
            Self::ToStringTag => "Symbol.toStringTag",
        }
    }
}

/// Ids below this are reserved for well-known symbols.
const FIRST_USER_SYMBOL: u64 = 16;

/// A unique symbol usable as a property or collection key.
///
/// Two symbols are equal only if they came from the same constructor call;
/// the description is informational.
#[derive(Clone)]
pub struct Symbol(Arc<SymbolInner>);

struct SymbolInner {
    id: u64,
    description: Arc<str>,
    builtin: bool,
}

impl Symbol {
    /// Create a fresh, unique symbol.
    pub fn new(description: impl Into<Arc<str>>) -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(FIRST_USER_SYMBOL);
        Self(Arc::new(SymbolInner {
            id: COUNTER.fetch_add(1, Ordering::Relaxed),
            description: description.into(),
            builtin: false,
        }))
    }

    /// Get one of the well-known symbols.
    pub fn well_known(which: WellKnownSymbol) -> Self {
        Self(Arc::new(SymbolInner {
            id: which.id(),
            description: which.description().into(),
            builtin: true,
        }))
    }

    pub fn id(&self) -> u64 {
        self.0.id
    }

    pub fn description(&self) -> &str {
        &self.0.description
    }

    /// Whether this is a well-known symbol.
    pub fn is_builtin(&self) -> bool {
        self.0.builtin
    }
}

impl PartialEq for Symbol {
    fn eq(&self, other: &Self) -> bool {
        self.0.id == other.0.id
    }
}

impl Eq for Symbol {}

impl Hash for Symbol {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.0.id.hash(state);
    }
}

impl fmt::Debug for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Symbol({})", self.0.description)
    }
}

/// Key of a record property or array slot.
///
/// Canonical non-negative integer strings normalize to [`PropKey::Index`], so
/// `PropKey::from("2")` and `PropKey::from(2)` address the same slot.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PropKey {
    Index(usize),
    Name(Arc<str>),
    Symbol(Symbol),
}

impl PropKey {
    /// The `length` key of arrays.
    pub fn length() -> Self {
        Self::Name(Arc::from("length"))
    }

    pub fn is_length(&self) -> bool {
        matches!(self, Self::Name(name) if &**name == "length")
    }

    pub fn as_index(&self) -> Option<usize> {
        match self {
            Self::Index(i) => Some(*i),
            _ => None,
        }
    }

    /// Well-known symbol keys are never tracked.
    pub fn is_builtin_symbol(&self) -> bool {
        matches!(self, Self::Symbol(sym) if sym.is_builtin())
    }

    /// Convert an arbitrary value to a property key the way property access
    /// coerces it.
    pub fn from_value(value: &Value) -> Self {
        match value {
            Value::Str(s) => Self::from(&**s),
            Value::Number(n) => match value.as_index() {
                Some(i) => Self::Index(i),
                None => Self::Name(Arc::from(format_number(*n))),
            },
            Value::Symbol(sym) => Self::Symbol(sym.clone()),
            Value::Bool(b) => Self::Name(Arc::from(if *b { "true" } else { "false" })),
            Value::Null => Self::Name(Arc::from("null")),
            Value::Undefined => Self::Name(Arc::from("undefined")),
            other => Self::Name(Arc::from(other.type_name())),
        }
    }

    /// The key as a value (indices become numbers).
    pub fn to_value(&self) -> Value {
        match self {
            Self::Index(i) => Value::Number(*i as f64),
            Self::Name(name) => Value::Str(name.clone()),
            Self::Symbol(sym) => Value::Symbol(sym.clone()),
        }
    }
}

fn parse_index(s: &str) -> Option<usize> {
    let canonical = !s.is_empty()
        && s.bytes().all(|b| b.is_ascii_digit())
        && (s == "0" || !s.starts_with('0'));
    if canonical {
        s.parse().ok()
    } else {
        None
    }
}

fn format_number(n: f64) -> String {
    if n.is_nan() {
        "NaN".to_string()
    } else if n == f64::INFINITY {
        "Infinity".to_string()
    } else if n == f64::NEG_INFINITY {
        "-Infinity".to_string()
    } else {
        n.to_string()
    }
}

impl From<&str> for PropKey {
    fn from(s: &str) -> Self {
        match parse_index(s) {
            Some(i) => Self::Index(i),
            None => Self::Name(Arc::from(s)),
        }
    }
}

impl From<String> for PropKey {
    fn from(s: String) -> Self {
        Self::from(s.as_str())
    }
}

impl From<usize> for PropKey {
    fn from(i: usize) -> Self {
        Self::Index(i)
    }
}

impl From<Symbol> for PropKey {
    fn from(sym: Symbol) -> Self {
        Self::Symbol(sym)
    }
}

impl From<&PropKey> for PropKey {
    fn from(key: &PropKey) -> Self {
        key.clone()
    }
}

/// Hashable identity of a [`Value`].
///
/// Primitives compare by SameValueZero (`NaN` equals `NaN`, `-0` equals `0`),
/// composites by identity. A wrapper and its raw object have distinct
/// identities, as do two wrapper variants over the same raw object.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ValueKey {
    Undefined,
    Null,
    Bool(bool),
    Number(u64),
    Str(Arc<str>),
    Symbol(u64),
    Object(ObjectId),
    Reactive(ObjectId, Mode),
    Signal(ObjectId),
    Computed(ObjectId),
}

impl ValueKey {
    pub(crate) fn number(n: f64) -> Self {
        let normalized = if n.is_nan() {
            f64::NAN
        } else if n == 0.0 {
            0.0
        } else {
            n
        };
        Self::Number(normalized.to_bits())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numeric_strings_normalize_to_index() {
        assert_eq!(PropKey::from("0"), PropKey::Index(0));
        assert_eq!(PropKey::from("42"), PropKey::Index(42));
        assert_eq!(PropKey::from("042"), PropKey::Name(Arc::from("042")));
        assert_eq!(PropKey::from("-1"), PropKey::Name(Arc::from("-1")));
        assert_eq!(PropKey::from(""), PropKey::Name(Arc::from("")));
    }

    #[test]
    fn number_values_become_index_keys() {
        assert_eq!(PropKey::from_value(&Value::from(3)), PropKey::Index(3));
        assert_eq!(
            PropKey::from_value(&Value::from(1.5)),
            PropKey::Name(Arc::from("1.5"))
        );
    }

    #[test]
    fn symbols_are_unique() {
        let a = Symbol::new("a");
        let b = Symbol::new("a");
        assert_ne!(a, b);
        assert_eq!(a, a.clone());
        assert!(!a.is_builtin());
    }

    #[test]
    fn well_known_symbols_are_stable() {
        let a = Symbol::well_known(WellKnownSymbol::Iterator);
        let b = Symbol::well_known(WellKnownSymbol::Iterator);
        assert_eq!(a, b);
        assert!(PropKey::from(a).is_builtin_symbol());
    }

    #[test]
    fn nan_and_signed_zero_identity() {
        assert_eq!(ValueKey::number(f64::NAN), ValueKey::number(-f64::NAN));
        assert_eq!(ValueKey::number(0.0), ValueKey::number(-0.0));
        assert_ne!(ValueKey::number(1.0), ValueKey::number(2.0));
    }
}
