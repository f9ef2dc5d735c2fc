use std::collections::HashMap;

use super::path::{FieldPath, Segment};
use super::value::{Value, NULL};

/// The working document being edited by one form session.
///
/// A tree of nested maps and lists with [`Value`] leaves, addressed by
/// [`FieldPath`]. Mutations happen only through the rule engine or direct
/// user input; external reference data never flows back into it except by
/// being copied.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
pub struct FormState {
    root: Node,
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(untagged))]
enum Node {
    Leaf(Value),
    List(Vec<Node>),
    Map(HashMap<String, Node>),
}

impl Default for FormState {
    fn default() -> Self {
        Self {
            root: Node::Map(HashMap::new()),
        }
    }
}

impl FormState {
    /// Create an empty document.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a value at a dotted path, builder style. Creates intermediate maps
    /// and lists as needed; list indices past the end pad with `Null`.
    ///
    /// # Panics
    ///
    /// Panics if `path` is malformed. Intended for statically-known paths
    /// when seeding a form; use [`insert`](Self::insert) with a parsed
    /// [`FieldPath`] for dynamic input.
    #[must_use]
    pub fn set(mut self, path: &str, value: impl Into<Value>) -> Self {
        match FieldPath::parse(path) {
            Ok(parsed) => self.insert(&parsed, value.into()),
            Err(e) => panic!("{e}"),
        }
        self
    }

    /// Insert a value at a parsed path.
    ///
    /// Intermediate nodes are created to match the path's shape; a node of
    /// the wrong shape (leaf where a map is needed, map where a list is
    /// needed) is replaced.
    pub fn insert(&mut self, path: &FieldPath, value: Value) {
        let mut node = &mut self.root;
        for seg in path.segments() {
            node = child_slot(node, seg);
        }
        *node = Node::Leaf(value);
    }

    /// Look up a value by parsed path.
    ///
    /// Returns `None` if the path does not exist or points at an interior
    /// map or list.
    #[must_use]
    pub fn get(&self, path: &FieldPath) -> Option<&Value> {
        let mut node = &self.root;
        for seg in path.segments() {
            node = match (node, seg) {
                (Node::Map(map), Segment::Key(k)) => map.get(k)?,
                (Node::List(list), Segment::Index(i)) => list.get(*i)?,
                _ => return None,
            };
        }
        match node {
            Node::Leaf(v) => Some(v),
            _ => None,
        }
    }

    /// Look up a value by dotted path string, treating anything missing or
    /// malformed as `Null`. The convenient form for derivation closures.
    #[must_use]
    pub fn value(&self, path: &str) -> &Value {
        FieldPath::parse(path)
            .ok()
            .and_then(|p| self.get(&p))
            .unwrap_or(&NULL)
    }
}

/// Walk one segment down, coercing the node to the container shape the
/// segment requires and creating the child slot if absent.
fn child_slot<'a>(node: &'a mut Node, seg: &Segment) -> &'a mut Node {
    match seg {
        Segment::Key(k) => {
            if !matches!(node, Node::Map(_)) {
                *node = Node::Map(HashMap::new());
            }
            match node {
                Node::Map(map) => map
                    .entry(k.clone())
                    .or_insert_with(|| Node::Leaf(Value::Null)),
                _ => unreachable!(),
            }
        }
        Segment::Index(i) => {
            if !matches!(node, Node::List(_)) {
                *node = Node::List(Vec::new());
            }
            match node {
                Node::List(list) => {
                    if list.len() <= *i {
                        list.resize(*i + 1, Node::Leaf(Value::Null));
                    }
                    &mut list[*i]
                }
                _ => unreachable!(),
            }
        }
    }
}
