//! Graph Keys
//!
//! Every tracked location is a `(TargetId, PropKey)` pair. Targets are
//! observed containers, signals and computed values; each gets a stable
//! integer handle when it is created.

use std::fmt;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

/// Stable handle for anything reads can be tracked against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TargetId(u64);

impl TargetId {
    /// Allocate a new unique target handle.
    pub fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the raw handle value.
    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl Default for TargetId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TargetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A unique property key. Two symbols are equal only if one is a clone of
/// the other, whatever their descriptions.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Symbol {
    id: u64,
    description: Rc<str>,
}

impl Symbol {
    /// Create a new symbol.
    pub fn new(description: &str) -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self {
            id: COUNTER.fetch_add(1, Ordering::Relaxed),
            description: description.into(),
        }
    }

    pub fn description(&self) -> &str {
        &self.description
    }
}

/// Key of a tracked location within a target.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PropKey {
    /// Named property of an object or map.
    Name(Rc<str>),
    /// Array element.
    Index(usize),
    /// Symbol-keyed property.
    Symbol(Symbol),
    /// Number of entries. Triggered whenever an entry is added or removed,
    /// which is how key enumeration gets tracked.
    Length,
    /// The single slot of a signal or computed value.
    Value,
}

impl PropKey {
    /// Whether this key can address an entry stored in an object or map.
    pub fn is_entry_key(&self) -> bool {
        matches!(self, PropKey::Name(_) | PropKey::Index(_) | PropKey::Symbol(_))
    }
}

impl From<&str> for PropKey {
    fn from(name: &str) -> Self {
        PropKey::Name(name.into())
    }
}

impl From<String> for PropKey {
    fn from(name: String) -> Self {
        PropKey::Name(name.into())
    }
}

impl From<Rc<str>> for PropKey {
    fn from(name: Rc<str>) -> Self {
        PropKey::Name(name)
    }
}

impl From<usize> for PropKey {
    fn from(index: usize) -> Self {
        PropKey::Index(index)
    }
}

impl From<Symbol> for PropKey {
    fn from(symbol: Symbol) -> Self {
        PropKey::Symbol(symbol)
    }
}

impl From<&PropKey> for PropKey {
    fn from(key: &PropKey) -> Self {
        key.clone()
    }
}

impl fmt::Display for PropKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PropKey::Name(name) => f.write_str(name),
            PropKey::Index(index) => write!(f, "{index}"),
            PropKey::Symbol(symbol) => write!(f, "Symbol({})", symbol.description),
            PropKey::Length => f.write_str("length"),
            PropKey::Value => f.write_str("value"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn target_ids_are_unique() {
        let a = TargetId::new();
        let b = TargetId::new();
        assert_ne!(a, b);
        assert!(b.raw() > a.raw());
    }

    #[test]
    fn symbols_with_same_description_differ() {
        let a = Symbol::new("marker");
        let b = Symbol::new("marker");
        assert_ne!(a, b);
        assert_eq!(a, a.clone());
        assert_ne!(PropKey::from(a), PropKey::from(b));
    }

    #[test]
    fn keys_display_like_property_names() {
        assert_eq!(PropKey::from("count").to_string(), "count");
        assert_eq!(PropKey::from(3).to_string(), "3");
        assert_eq!(PropKey::from(Symbol::new("id")).to_string(), "Symbol(id)");
        assert_eq!(PropKey::Length.to_string(), "length");
    }
}
