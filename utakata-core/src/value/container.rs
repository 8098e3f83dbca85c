//! Container storage.
//!
//! A [`Container`] is the shared, untracked storage behind objects, arrays,
//! maps and sets. Tracking is layered on top by
//! [`Observed`](super::Observed); nothing here talks to a runtime.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use indexmap::IndexMap;

use super::{SameValue, Value};
use crate::error::{ReactiveError, Result};
use crate::graph::{PropKey, TargetId};

/// Shape of a container.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContainerKind {
    Object,
    Array,
    Map,
    Set,
}

impl ContainerKind {
    pub fn name(&self) -> &'static str {
        match self {
            ContainerKind::Object => "object",
            ContainerKind::Array => "array",
            ContainerKind::Map => "map",
            ContainerKind::Set => "set",
        }
    }
}

impl fmt::Display for ContainerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

enum Storage {
    Object(IndexMap<PropKey, Value>),
    Array(Vec<Value>),
    Map(IndexMap<PropKey, Value>),
    /// Members are unique under same-value equality.
    Set(Vec<Value>),
}

/// How far past the end of an array a write may land. Writes further out
/// are rejected instead of allocating the gap.
pub const MAX_ARRAY_GAP: usize = 4096;

/// What a write changed.
#[derive(Debug, Clone)]
pub struct WriteOutcome {
    pub old_value: Value,
    pub old_len: usize,
    pub new_len: usize,
}

/// Shared container with a stable identity.
///
/// Clones share storage. A container that holds itself, directly or through
/// other containers, is an `Rc` cycle and is only freed once
/// [`clear`](Self::clear) breaks it.
#[derive(Clone)]
pub struct Container {
    id: TargetId,
    storage: Rc<RefCell<Storage>>,
}

impl Container {
    fn with_storage(storage: Storage) -> Self {
        Self {
            id: TargetId::new(),
            storage: Rc::new(RefCell::new(storage)),
        }
    }

    /// Create an empty container of the given kind.
    pub fn new(kind: ContainerKind) -> Self {
        Self::with_storage(match kind {
            ContainerKind::Object => Storage::Object(IndexMap::new()),
            ContainerKind::Array => Storage::Array(Vec::new()),
            ContainerKind::Map => Storage::Map(IndexMap::new()),
            ContainerKind::Set => Storage::Set(Vec::new()),
        })
    }

    pub fn object_from<K, V>(entries: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<PropKey>,
        V: Into<Value>,
    {
        Self::with_storage(Storage::Object(
            entries
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        ))
    }

    pub fn map_from<K, V>(entries: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<PropKey>,
        V: Into<Value>,
    {
        Self::with_storage(Storage::Map(
            entries
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        ))
    }

    pub fn array_from<V: Into<Value>>(items: impl IntoIterator<Item = V>) -> Self {
        Self::with_storage(Storage::Array(items.into_iter().map(Into::into).collect()))
    }

    pub fn set_from<V: Into<Value>>(items: impl IntoIterator<Item = V>) -> Self {
        let container = Self::new(ContainerKind::Set);
        for item in items {
            container.add(item.into());
        }
        container
    }

    /// Identity handle, shared by every clone.
    pub fn id(&self) -> TargetId {
        self.id
    }

    pub fn kind(&self) -> ContainerKind {
        match &*self.storage.borrow() {
            Storage::Object(_) => ContainerKind::Object,
            Storage::Array(_) => ContainerKind::Array,
            Storage::Map(_) => ContainerKind::Map,
            Storage::Set(_) => ContainerKind::Set,
        }
    }

    pub fn len(&self) -> usize {
        match &*self.storage.borrow() {
            Storage::Object(entries) | Storage::Map(entries) => entries.len(),
            Storage::Array(items) | Storage::Set(items) => items.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Read the value at `key`; missing entries read as `undefined` and
    /// [`PropKey::Length`] reads the entry count.
    pub fn get(&self, key: &PropKey) -> Value {
        if *key == PropKey::Length {
            return Value::from(self.len());
        }
        match (&*self.storage.borrow(), key) {
            (Storage::Object(entries) | Storage::Map(entries), key) => {
                entries.get(key).cloned().unwrap_or_default()
            }
            (Storage::Array(items), PropKey::Index(index)) => {
                items.get(*index).cloned().unwrap_or_default()
            }
            _ => Value::Undefined,
        }
    }

    /// Whether an entry exists at `key`.
    pub fn contains_key(&self, key: &PropKey) -> bool {
        match (&*self.storage.borrow(), key) {
            (Storage::Object(entries) | Storage::Map(entries), key) => entries.contains_key(key),
            (Storage::Array(items), PropKey::Index(index)) => *index < items.len(),
            _ => false,
        }
    }

    /// Store `value` at `key`.
    ///
    /// Writing past the end of an array pads it with `undefined`, up to
    /// [`MAX_ARRAY_GAP`] slots; an index beyond that is an invalid key.
    /// Sets have no keys; use [`add`](Self::add).
    pub fn insert(&self, key: PropKey, value: Value) -> Result<WriteOutcome> {
        let kind = self.kind();
        let old_len = self.len();
        let mut storage = self.storage.borrow_mut();
        let old_value = match &mut *storage {
            Storage::Object(entries) | Storage::Map(entries) if key.is_entry_key() => {
                entries.insert(key, value).unwrap_or_default()
            }
            Storage::Array(items) => {
                let PropKey::Index(index) = key else {
                    return Err(invalid_key(kind, &key));
                };
                if index >= items.len() {
                    let new_len = index
                        .checked_add(1)
                        .filter(|len| len - items.len() <= MAX_ARRAY_GAP)
                        .ok_or_else(|| invalid_key(kind, &key))?;
                    items.resize(new_len, Value::Undefined);
                }
                std::mem::replace(&mut items[index], value)
            }
            _ => return Err(invalid_key(kind, &key)),
        };
        drop(storage);

        Ok(WriteOutcome {
            old_value,
            old_len,
            new_len: self.len(),
        })
    }

    /// Remove the entry at `key` from an object or map, preserving the
    /// order of the remaining entries.
    pub fn remove(&self, key: &PropKey) -> Option<WriteOutcome> {
        let old_len = self.len();
        let removed = match &mut *self.storage.borrow_mut() {
            Storage::Object(entries) | Storage::Map(entries) => entries.shift_remove(key),
            _ => None,
        }?;

        Some(WriteOutcome {
            old_value: removed,
            old_len,
            new_len: old_len - 1,
        })
    }

    /// Drop every entry, returning the removed entries in order.
    ///
    /// Nothing is freed while the storage is borrowed: the returned entries
    /// hold the last references until the caller drops them.
    pub fn clear(&self) -> Vec<(PropKey, Value)> {
        let removed = self.entries();
        match &mut *self.storage.borrow_mut() {
            Storage::Object(entries) | Storage::Map(entries) => entries.clear(),
            Storage::Array(items) | Storage::Set(items) => items.clear(),
        }
        removed
    }

    /// Add a member to a set. Returns `false` if it was already present or
    /// the container is not a set.
    pub fn add(&self, value: Value) -> bool {
        match &mut *self.storage.borrow_mut() {
            Storage::Set(members) => {
                if members.iter().any(|member| member.same_value(&value)) {
                    false
                } else {
                    members.push(value);
                    true
                }
            }
            _ => false,
        }
    }

    /// Remove a member from a set.
    pub fn delete(&self, value: &Value) -> bool {
        match &mut *self.storage.borrow_mut() {
            Storage::Set(members) => {
                let before = members.len();
                members.retain(|member| !member.same_value(value));
                members.len() != before
            }
            _ => false,
        }
    }

    /// Whether a set holds `value`, or an array contains it.
    pub fn has(&self, value: &Value) -> bool {
        match &*self.storage.borrow() {
            Storage::Set(items) | Storage::Array(items) => {
                items.iter().any(|item| item.same_value(value))
            }
            _ => false,
        }
    }

    /// Keys in order: entry keys of objects and maps, indices of arrays,
    /// nothing for sets.
    pub fn keys(&self) -> Vec<PropKey> {
        match &*self.storage.borrow() {
            Storage::Object(entries) | Storage::Map(entries) => entries.keys().cloned().collect(),
            Storage::Array(items) => (0..items.len()).map(PropKey::Index).collect(),
            Storage::Set(_) => Vec::new(),
        }
    }

    /// Child values in order.
    pub fn values(&self) -> Vec<Value> {
        match &*self.storage.borrow() {
            Storage::Object(entries) | Storage::Map(entries) => entries.values().cloned().collect(),
            Storage::Array(items) | Storage::Set(items) => items.clone(),
        }
    }

    /// Keyed entries in order. Set members are keyed by position.
    pub fn entries(&self) -> Vec<(PropKey, Value)> {
        match &*self.storage.borrow() {
            Storage::Object(entries) | Storage::Map(entries) => entries
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
            Storage::Array(items) | Storage::Set(items) => items
                .iter()
                .enumerate()
                .map(|(i, v)| (PropKey::Index(i), v.clone()))
                .collect(),
        }
    }
}

fn invalid_key(kind: ContainerKind, key: &PropKey) -> ReactiveError {
    ReactiveError::InvalidKey {
        kind,
        key: key.to_string(),
    }
}

impl PartialEq for Container {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Container {}

impl fmt::Debug for Container {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Shallow on purpose: containers may contain themselves.
        f.debug_struct("Container")
            .field("id", &self.id)
            .field("kind", &self.kind())
            .field("len", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn object_insert_reports_old_value_and_length() {
        let object = Container::object_from([("a", 1)]);

        let write = object.insert("a".into(), Value::from(2)).unwrap();
        assert_eq!(write.old_value.as_f64(), Some(1.0));
        assert_eq!((write.old_len, write.new_len), (1, 1));

        let write = object.insert("b".into(), Value::from(3)).unwrap();
        assert!(write.old_value.is_undefined());
        assert_eq!((write.old_len, write.new_len), (1, 2));

        assert_eq!(object.keys(), vec![PropKey::from("a"), PropKey::from("b")]);
    }

    #[test]
    fn array_writes_past_end_pad_with_undefined() {
        let array = Container::array_from([1]);
        array.insert(PropKey::Index(3), Value::from(4)).unwrap();

        assert_eq!(array.len(), 4);
        assert!(array.get(&PropKey::Index(1)).is_undefined());
        assert_eq!(array.get(&PropKey::Length).as_f64(), Some(4.0));
    }

    #[test]
    fn array_writes_far_past_end_are_rejected() {
        let array = Container::array_from([1]);

        let err = array
            .insert(PropKey::Index(usize::MAX), Value::from(2))
            .unwrap_err();
        assert!(matches!(err, ReactiveError::InvalidKey { .. }));
        assert!(array
            .insert(PropKey::Index(1 + MAX_ARRAY_GAP), Value::from(2))
            .is_err());
        assert_eq!(array.len(), 1);

        array
            .insert(PropKey::Index(MAX_ARRAY_GAP), Value::from(2))
            .unwrap();
        assert_eq!(array.len(), MAX_ARRAY_GAP + 1);
    }

    #[test]
    fn clear_breaks_self_reference() {
        let object = Container::object_from([("a", 1)]);
        object
            .insert("self".into(), Value::Object(object.clone()))
            .unwrap();
        assert_eq!(Rc::strong_count(&object.storage), 2);

        let removed = object.clear();
        assert_eq!(removed.len(), 2);
        assert_eq!(removed[0].0, PropKey::from("a"));
        drop(removed);

        assert!(object.is_empty());
        assert_eq!(object.kind(), ContainerKind::Object);
        assert_eq!(Rc::strong_count(&object.storage), 1);
    }

    #[test]
    fn invalid_keys_are_rejected() {
        let array = Container::array_from([1]);
        let err = array.insert("name".into(), Value::Null).unwrap_err();
        assert_eq!(
            err,
            ReactiveError::InvalidKey {
                kind: ContainerKind::Array,
                key: "name".into()
            }
        );

        let set = Container::set_from([1]);
        assert!(set.insert(PropKey::Index(0), Value::Null).is_err());

        let object = Container::new(ContainerKind::Object);
        assert!(object.insert(PropKey::Length, Value::Null).is_err());
    }

    #[test]
    fn set_members_are_unique_under_same_value() {
        let set = Container::set_from([Value::from(f64::NAN), Value::from(f64::NAN)]);
        assert_eq!(set.len(), 1);
        assert!(set.has(&Value::from(f64::NAN)));

        assert!(set.add(Value::from(0.0)));
        assert!(set.add(Value::from(-0.0)));
        assert!(!set.add(Value::from(0.0)));
        assert_eq!(set.len(), 3);

        assert!(set.delete(&Value::from(-0.0)));
        assert!(!set.delete(&Value::from(-0.0)));
    }

    #[test]
    fn remove_preserves_order() {
        let map = Container::map_from([("a", 1), ("b", 2), ("c", 3)]);
        let write = map.remove(&"b".into()).unwrap();

        assert_eq!(write.old_value.as_f64(), Some(2.0));
        assert_eq!(write.new_len, 2);
        assert_eq!(map.keys(), vec![PropKey::from("a"), PropKey::from("c")]);
        assert!(map.remove(&"b".into()).is_none());
    }

    #[test]
    fn clones_share_identity_and_storage() {
        let a = Container::object_from([("n", 1)]);
        let b = a.clone();
        b.insert("n".into(), Value::from(2)).unwrap();

        assert_eq!(a, b);
        assert_eq!(a.get(&"n".into()).as_f64(), Some(2.0));
        assert_ne!(a, Container::object_from([("n", 2)]));
    }
}
