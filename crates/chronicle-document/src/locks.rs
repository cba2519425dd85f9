//! Lock registry: which fields are protected from generator overwrite
//!
//! A sparse tree mirroring the document's nesting. A node is either
//! [`LockNode::Locked`] (the whole subtree is protected) or a
//! [`LockNode::Branch`] continuing the tree. The persisted JSON form is the
//! historical one — `true` for a locked node, a nested object for a branch —
//! so registries written by older releases load unchanged.
//!
//! No validation against the live document is performed: lock state and
//! document state are allowed to diverge harmlessly, and a dangling lock is
//! inert rather than an error.

use indexmap::IndexMap;
use serde::de::{self, Deserializer, MapAccess, Visitor};
use serde::ser::{SerializeMap, Serializer};
use serde::{Deserialize, Serialize};

use crate::matcher;
use crate::path::{FieldPath, PathError, PathSegment, Section};

/// One node of the lock tree
#[derive(Debug, Clone, PartialEq)]
pub enum LockNode {
    /// This node and every descendant is protected
    Locked,
    /// Protection continues further down
    Branch(IndexMap<String, LockNode>),
}

impl LockNode {
    /// Empty branch node
    #[inline]
    #[must_use]
    pub fn branch() -> Self {
        LockNode::Branch(IndexMap::new())
    }

    /// Whether this node fully locks its subtree
    #[inline]
    #[must_use]
    pub fn is_locked(&self) -> bool {
        matches!(self, LockNode::Locked)
    }

    /// Child entries of a branch node; empty for a locked node
    pub fn children(&self) -> impl Iterator<Item = (&str, &LockNode)> + '_ {
        let map = match self {
            LockNode::Locked => None,
            LockNode::Branch(map) => Some(map),
        };
        map.into_iter()
            .flat_map(|m| m.iter().map(|(k, v)| (k.as_str(), v)))
    }

    /// Look up a child under drift-tolerant key matching
    #[must_use]
    pub fn child(&self, name: &str) -> Option<&LockNode> {
        match self {
            LockNode::Locked => None,
            LockNode::Branch(map) => map
                .iter()
                .find(|(k, _)| matcher::keys_match(k, name))
                .map(|(_, v)| v),
        }
    }

    fn prune(&mut self) -> bool {
        match self {
            LockNode::Locked => false,
            LockNode::Branch(map) => {
                map.retain(|_, child| !child.prune());
                map.is_empty()
            }
        }
    }
}

impl Serialize for LockNode {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            LockNode::Locked => serializer.serialize_bool(true),
            LockNode::Branch(map) => {
                let mut state = serializer.serialize_map(Some(map.len()))?;
                for (key, child) in map {
                    state.serialize_entry(key, child)?;
                }
                state.end()
            }
        }
    }
}

impl<'de> Deserialize<'de> for LockNode {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct NodeVisitor;

        impl<'de> Visitor<'de> for NodeVisitor {
            type Value = LockNode;

            fn expecting(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str("a boolean or a nested lock object")
            }

            fn visit_bool<E: de::Error>(self, v: bool) -> Result<LockNode, E> {
                // A persisted `false` leaf is inert, same as absence.
                if v {
                    Ok(LockNode::Locked)
                } else {
                    Ok(LockNode::branch())
                }
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<LockNode, A::Error> {
                let mut map = IndexMap::new();
                while let Some((key, value)) = access.next_entry::<String, LockNode>()? {
                    map.insert(key, value);
                }
                Ok(LockNode::Branch(map))
            }
        }

        deserializer.deserialize_any(NodeVisitor)
    }
}

/// The full lock tree, keyed by section
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LockRegistry {
    root: IndexMap<String, LockNode>,
}

impl LockRegistry {
    /// Empty registry
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether no locks are set
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.root.is_empty()
    }

    /// Lock tree for one section, if any lock exists under it
    #[must_use]
    pub fn section_node(&self, section: Section) -> Option<&LockNode> {
        self.root
            .iter()
            .find(|(k, _)| matcher::keys_match(k, section.as_str()))
            .map(|(_, v)| v)
    }

    /// Whether the whole section is locked
    #[inline]
    #[must_use]
    pub fn section_locked(&self, section: Section) -> bool {
        self.section_node(section).is_some_and(LockNode::is_locked)
    }

    /// Whether the field at `path` is protected
    ///
    /// True when any ancestor node is locked, or the leaf itself is. For a
    /// bracket segment the bare key counts as an ancestor: a lock on
    /// `optional` covers `optional[2]`.
    #[must_use]
    pub fn is_locked(&self, section: Section, path: &FieldPath) -> bool {
        let Some(mut node) = self.section_node(section) else {
            return false;
        };
        for segment in path.iter() {
            if node.is_locked() {
                return true;
            }
            if segment.index().is_some()
                && node.child(segment.name()).is_some_and(LockNode::is_locked)
            {
                return true;
            }
            match node.child(&segment.to_string()) {
                Some(child) => node = child,
                None => return false,
            }
        }
        node.is_locked()
    }

    /// Set or clear the lock at `path`
    ///
    /// Locking creates intermediate branches as needed and replaces any
    /// finer-grained locks below the path. Unlocking deletes the leaf and
    /// prunes branches left empty.
    pub fn set_lock(&mut self, section: Section, path: &FieldPath, locked: bool) {
        if locked {
            let node = self
                .root
                .entry(section.as_str().to_string())
                .or_insert_with(LockNode::branch);
            Self::insert(node, path.segments());
        } else {
            let emptied = self.root.iter_mut().find_map(|(key, node)| {
                if !matcher::keys_match(key, section.as_str()) {
                    return None;
                }
                Self::remove(node, path.segments());
                node.prune().then(|| key.clone())
            });
            if let Some(key) = emptied {
                self.root.shift_remove(&key);
            }
        }
    }

    fn insert(node: &mut LockNode, segments: &[PathSegment]) {
        let Some((head, rest)) = segments.split_first() else {
            *node = LockNode::Locked;
            return;
        };
        let LockNode::Branch(map) = node else {
            // An ancestor already locks this subtree; nothing finer to add.
            return;
        };
        let key = map
            .keys()
            .find(|k| matcher::keys_match(k, &head.to_string()))
            .cloned()
            .unwrap_or_else(|| head.to_string());
        let child = map.entry(key).or_insert_with(LockNode::branch);
        Self::insert(child, rest);
    }

    fn remove(node: &mut LockNode, segments: &[PathSegment]) {
        let Some((head, rest)) = segments.split_first() else {
            *node = LockNode::branch();
            return;
        };
        let LockNode::Branch(map) = node else {
            // Unlocking below a section-wide lock is a no-op by design of
            // the dual representation: the caller clears the section lock
            // first.
            return;
        };
        let Some(key) = map
            .keys()
            .find(|k| matcher::keys_match(k, &head.to_string()))
            .cloned()
        else {
            return;
        };
        if rest.is_empty() {
            map.shift_remove(&key);
        } else if let Some(child) = map.get_mut(&key) {
            Self::remove(child, rest);
        }
    }

    /// Raw string surface used by the host's lock-toggle UI
    ///
    /// # Errors
    /// Returns [`PathError`] when `path` fails to parse; an unknown or
    /// dangling path that parses is accepted and simply has no effect.
    pub fn set_item_lock(
        &mut self,
        section: Section,
        path: &str,
        locked: bool,
    ) -> Result<(), PathError> {
        let parsed: FieldPath = path.parse()?;
        self.set_lock(section, &parsed, locked);
        Ok(())
    }

    /// Raw string lookup counterpart of [`LockRegistry::set_item_lock`]
    ///
    /// # Errors
    /// Returns [`PathError`] when `path` fails to parse.
    pub fn is_item_locked(&self, section: Section, path: &str) -> Result<bool, PathError> {
        let parsed: FieldPath = path.parse()?;
        Ok(self.is_locked(section, &parsed))
    }
}
