//! Dynamic Values
//!
//! Typed reactive state lives in [`Signal`](crate::reactive::Signal)s and
//! [`Computed`](crate::reactive::Computed) values. For untyped state whose
//! shape is only known at runtime this module provides [`Value`], a small
//! dynamic data model of primitives, shared containers and references to
//! signals or computed values.
//!
//! Containers are shared and compared by identity. They are plain data
//! until wrapped by [`reactive`], after which reads and writes made through
//! the returned [`Observed`] handle are tracked and triggered.
//!
//! # Same-value semantics
//!
//! Change detection everywhere in the crate goes through [`SameValue`]:
//! `NaN` equals itself, `+0.0` and `-0.0` differ, containers and references
//! compare by identity, and sequences compare piecewise.

mod container;
mod observed;

pub use container::{Container, ContainerKind, WriteOutcome, MAX_ARRAY_GAP};
pub use observed::{is_observed, reactive, try_reactive, Observed};

use std::collections::HashSet;
use std::fmt;
use std::rc::Rc;

use crate::error::{ReactiveError, Result};
use crate::graph::TargetId;

/// Same-value equality used to decide whether a write is a change.
pub trait SameValue {
    /// Whether `self` and `other` are the same value.
    fn same_value(&self, other: &Self) -> bool;
}

impl SameValue for f64 {
    fn same_value(&self, other: &Self) -> bool {
        (self.is_nan() && other.is_nan()) || self.to_bits() == other.to_bits()
    }
}

impl SameValue for f32 {
    fn same_value(&self, other: &Self) -> bool {
        (self.is_nan() && other.is_nan()) || self.to_bits() == other.to_bits()
    }
}

macro_rules! same_value_by_eq {
    ($($ty:ty),* $(,)?) => {
        $(
            impl SameValue for $ty {
                fn same_value(&self, other: &Self) -> bool {
                    self == other
                }
            }
        )*
    };
}

same_value_by_eq!(
    i8, i16, i32, i64, i128, isize, u8, u16, u32, u64, u128, usize, bool, char, (), str, String,
    Rc<str>
);

impl<T: SameValue> SameValue for [T] {
    fn same_value(&self, other: &Self) -> bool {
        self.len() == other.len() && self.iter().zip(other).all(|(a, b)| a.same_value(b))
    }
}

impl<T: SameValue> SameValue for Vec<T> {
    fn same_value(&self, other: &Self) -> bool {
        self.as_slice().same_value(other.as_slice())
    }
}

impl<T: SameValue> SameValue for Option<T> {
    fn same_value(&self, other: &Self) -> bool {
        match (self, other) {
            (Some(a), Some(b)) => a.same_value(b),
            (None, None) => true,
            _ => false,
        }
    }
}

impl<T: SameValue + ?Sized> SameValue for &T {
    fn same_value(&self, other: &Self) -> bool {
        (**self).same_value(*other)
    }
}

macro_rules! same_value_tuple {
    ($(($($name:ident $idx:tt),+)),* $(,)?) => {
        $(
            impl<$($name: SameValue),+> SameValue for ($($name,)+) {
                fn same_value(&self, other: &Self) -> bool {
                    $(self.$idx.same_value(&other.$idx))&&+
                }
            }
        )*
    };
}

same_value_tuple!((A 0, B 1), (A 0, B 1, C 2), (A 0, B 1, C 2, D 3));

/// A reference-like value: a signal or computed that holds one value and
/// tracks reads of it on its own.
pub trait RefLike {
    /// Handle the value's reads are tracked against.
    fn target_id(&self) -> TargetId;

    /// Read the current value, tracking the read.
    fn read_value(&self) -> Value;

    /// Read the current value without tracking.
    fn peek_value(&self) -> Value;
}

/// A dynamically typed value.
#[derive(Clone, Default)]
pub enum Value {
    #[default]
    Undefined,
    Null,
    Bool(bool),
    Number(f64),
    String(Rc<str>),
    /// Shared container, compared by identity.
    Object(Container),
    /// Signal or computed value, compared by identity.
    Ref(Rc<dyn RefLike>),
}

impl Value {
    /// Build an object from key/value pairs.
    pub fn object<K, V>(entries: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<crate::graph::PropKey>,
        V: Into<Value>,
    {
        Value::Object(Container::object_from(entries))
    }

    /// Build an array.
    pub fn array<V: Into<Value>>(items: impl IntoIterator<Item = V>) -> Self {
        Value::Object(Container::array_from(items))
    }

    /// Wrap a signal or computed value.
    pub fn reference(value: impl RefLike + 'static) -> Self {
        Value::Ref(Rc::new(value))
    }

    /// Name of the value's kind, for diagnostics.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Value::Undefined => "undefined",
            Value::Null => "null",
            Value::Bool(_) => "boolean",
            Value::Number(_) => "number",
            Value::String(_) => "string",
            Value::Object(container) => container.kind().name(),
            Value::Ref(_) => "ref",
        }
    }

    /// Whether the value is shared by reference (a container or a ref).
    pub fn is_reference_type(&self) -> bool {
        matches!(self, Value::Object(_) | Value::Ref(_))
    }

    pub fn is_undefined(&self) -> bool {
        matches!(self, Value::Undefined)
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_container(&self) -> Option<&Container> {
        match self {
            Value::Object(container) => Some(container),
            _ => None,
        }
    }

    /// Convert to JSON without tracking.
    ///
    /// `undefined` and non-finite numbers become `null`, sets become arrays,
    /// refs are replaced by their current value. Shared sub-containers are
    /// duplicated; a container that contains itself is an error.
    pub fn to_json(&self) -> Result<serde_json::Value> {
        let mut in_progress = HashSet::new();
        self.to_json_inner(&mut in_progress)
    }

    fn to_json_inner(&self, in_progress: &mut HashSet<TargetId>) -> Result<serde_json::Value> {
        use serde_json::Value as Json;

        Ok(match self {
            Value::Undefined | Value::Null => Json::Null,
            Value::Bool(b) => Json::Bool(*b),
            Value::Number(n) => serde_json::Number::from_f64(*n).map_or(Json::Null, Json::Number),
            Value::String(s) => Json::String(s.to_string()),
            Value::Ref(reference) => {
                if !in_progress.insert(reference.target_id()) {
                    return Err(ReactiveError::CyclicValue);
                }
                let json = reference.peek_value().to_json_inner(in_progress)?;
                in_progress.remove(&reference.target_id());
                json
            }
            Value::Object(container) => {
                if !in_progress.insert(container.id()) {
                    return Err(ReactiveError::CyclicValue);
                }
                let json = match container.kind() {
                    ContainerKind::Object | ContainerKind::Map => {
                        let mut map = serde_json::Map::new();
                        for (key, value) in container.entries() {
                            map.insert(key.to_string(), value.to_json_inner(in_progress)?);
                        }
                        Json::Object(map)
                    }
                    ContainerKind::Array | ContainerKind::Set => Json::Array(
                        container
                            .values()
                            .iter()
                            .map(|value| value.to_json_inner(in_progress))
                            .collect::<Result<_>>()?,
                    ),
                };
                in_progress.remove(&container.id());
                json
            }
        })
    }
}

impl SameValue for Value {
    fn same_value(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Undefined, Value::Undefined) | (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Number(a), Value::Number(b)) => a.same_value(b),
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Object(a), Value::Object(b)) => a.id() == b.id(),
            (Value::Ref(a), Value::Ref(b)) => a.target_id() == b.target_id(),
            _ => false,
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Containers print shallowly; the graph may be cyclic.
        match self {
            Value::Undefined => f.write_str("undefined"),
            Value::Null => f.write_str("null"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Number(n) => write!(f, "{n}"),
            Value::String(s) => write!(f, "{s:?}"),
            Value::Object(container) => fmt::Debug::fmt(container, f),
            Value::Ref(reference) => write!(f, "Ref({})", reference.target_id()),
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

macro_rules! value_from_number {
    ($($ty:ty),*) => {
        $(
            impl From<$ty> for Value {
                fn from(n: $ty) -> Self {
                    Value::Number(n as f64)
                }
            }
        )*
    };
}

value_from_number!(f32, i8, i16, i32, i64, isize, u8, u16, u32, u64, usize);

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.into())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s.into())
    }
}

impl From<Rc<str>> for Value {
    fn from(s: Rc<str>) -> Self {
        Value::String(s)
    }
}

impl From<Container> for Value {
    fn from(container: Container) -> Self {
        Value::Object(container)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map_or(Value::Undefined, Into::into)
    }
}

impl From<serde_json::Value> for Value {
    fn from(json: serde_json::Value) -> Self {
        use serde_json::Value as Json;

        match json {
            Json::Null => Value::Null,
            Json::Bool(b) => Value::Bool(b),
            Json::Number(n) => Value::Number(n.as_f64().unwrap_or(f64::NAN)),
            Json::String(s) => Value::String(s.into()),
            Json::Array(items) => Value::array(items),
            Json::Object(map) => Value::object(map),
        }
    }
}
