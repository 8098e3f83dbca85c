//! Deep traversal.
//!
//! Walking a value graph through tracked reads subscribes the active effect
//! to every property it passes. Watchers use this to react to changes
//! anywhere inside a nested structure.
//!
//! Each traversal keeps a visited set of [`TargetId`]s, so shared and
//! self-referential structures are enumerated once and the walk always
//! terminates.

use std::collections::{HashSet, VecDeque};
use std::rc::Rc;

use super::runtime::Runtime;
use crate::graph::TargetId;
use crate::value::{try_reactive, Observed, Value};

/// One cycle-safe walk over a value graph.
#[derive(Debug)]
pub struct Traverse<'a> {
    runtime: &'a Runtime,
    visited: HashSet<TargetId>,
}

impl<'a> Traverse<'a> {
    pub fn new(runtime: &'a Runtime) -> Self {
        Self {
            runtime,
            visited: HashSet::new(),
        }
    }

    /// Breadth-first walk enumerating values up to `depth` levels below
    /// `root`. A depth of zero enumerates nothing.
    pub fn bfs(&mut self, root: &Value, depth: usize) {
        let mut queue = VecDeque::from([(root.clone(), 0usize)]);

        while let Some((value, level)) = queue.pop_front() {
            if level >= depth || !self.visit(&value) {
                continue;
            }
            queue.extend(self.children(&value).into_iter().map(|child| (child, level + 1)));
        }
    }

    /// Unbounded depth-first walk.
    pub fn dfs(&mut self, value: &Value) {
        if !self.visit(value) {
            return;
        }
        for child in self.children(value) {
            self.dfs(&child);
        }
    }

    /// Number of distinct containers and refs enumerated so far.
    pub fn visited_count(&self) -> usize {
        self.visited.len()
    }

    /// Returns `false` for primitives and for values already enumerated.
    fn visit(&mut self, value: &Value) -> bool {
        let id = match value {
            Value::Object(container) => container.id(),
            Value::Ref(reference) => reference.target_id(),
            _ => return false,
        };
        self.visited.insert(id)
    }

    fn children(&self, value: &Value) -> Vec<Value> {
        match value {
            Value::Ref(reference) => vec![reference.read_value()],
            Value::Object(container) if self.runtime.is_observed(container.id()) => {
                match try_reactive(self.runtime, value.clone()) {
                    Ok(observed) => observed.values(),
                    Err(_) => Vec::new(),
                }
            }
            Value::Object(container) => container.values(),
            _ => Vec::new(),
        }
    }
}

/// Values a watch source can return and have deeply traversed.
///
/// `traversal_roots` lists the reference-typed values to walk; collections
/// of sources flatten into their members.
pub trait Traversable {
    fn traversal_roots(&self) -> Vec<Value>;
}

impl Traversable for Value {
    fn traversal_roots(&self) -> Vec<Value> {
        if self.is_reference_type() {
            vec![self.clone()]
        } else {
            Vec::new()
        }
    }
}

impl Traversable for Observed {
    fn traversal_roots(&self) -> Vec<Value> {
        vec![Value::from(self)]
    }
}

impl<T: Traversable> Traversable for Vec<T> {
    fn traversal_roots(&self) -> Vec<Value> {
        self.iter().flat_map(Traversable::traversal_roots).collect()
    }
}

impl<T: Traversable> Traversable for Option<T> {
    fn traversal_roots(&self) -> Vec<Value> {
        self.as_ref()
            .map(Traversable::traversal_roots)
            .unwrap_or_default()
    }
}

macro_rules! opaque_traversable {
    ($($ty:ty),* $(,)?) => {
        $(
            impl Traversable for $ty {
                fn traversal_roots(&self) -> Vec<Value> {
                    Vec::new()
                }
            }
        )*
    };
}

opaque_traversable!(
    (), bool, char, f32, f64, i8, i16, i32, i64, isize, u8, u16, u32, u64, usize, String, Rc<str>,
    &'static str,
);

macro_rules! tuple_traversable {
    ($(($($name:ident $idx:tt),+)),*) => {
        $(
            impl<$($name: Traversable),+> Traversable for ($($name,)+) {
                fn traversal_roots(&self) -> Vec<Value> {
                    let mut roots = Vec::new();
                    $(roots.extend(self.$idx.traversal_roots());)+
                    roots
                }
            }
        )*
    };
}

tuple_traversable!((A 0, B 1), (A 0, B 1, C 2), (A 0, B 1, C 2, D 3));
