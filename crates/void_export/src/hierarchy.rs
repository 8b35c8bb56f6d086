//! Collection tree walking
//!
//! Collections form a DAG under a scene root: a child may sit under several
//! parents. The walker flattens that DAG into name tables the export
//! pipeline consumes, so later stages never have to hold borrows into the
//! source document.

use std::collections::HashSet;
use std::hash::Hash;

use indexmap::IndexMap;
use log::trace;
use void_document::{CollectionId, Document};

/// A tree of named nodes with ordered children
pub trait CollectionTree {
    type Node: Copy + Eq + Hash;

    fn node_name(&self, node: Self::Node) -> Option<&str>;

    fn node_children(&self, node: Self::Node) -> &[Self::Node];
}

impl CollectionTree for Document {
    type Node = CollectionId;

    fn node_name(&self, node: CollectionId) -> Option<&str> {
        self.collection(node).ok().map(|c| c.name())
    }

    fn node_children(&self, node: CollectionId) -> &[CollectionId] {
        self.collection(node).map(|c| c.children()).unwrap_or(&[])
    }
}

/// Child name -> parent names, in discovery order
pub type ParentLookup = IndexMap<String, Vec<String>>;

/// Collection name -> child names, for every named collection of a tree
pub type CollectionSet = IndexMap<String, Vec<String>>;

/// Pre-order iterator over a collection tree
///
/// A node reached a second time (second parent, or a cycle) is not yielded
/// again.
pub struct Traverse<'a, T: CollectionTree> {
    tree: &'a T,
    stack: Vec<T::Node>,
    visited: HashSet<T::Node>,
}

impl<'a, T: CollectionTree> Iterator for Traverse<'a, T> {
    type Item = T::Node;

    fn next(&mut self) -> Option<T::Node> {
        let node = self.stack.pop()?;
        for child in self.tree.node_children(node).iter().rev() {
            if self.visited.insert(*child) {
                self.stack.push(*child);
            }
        }
        Some(node)
    }
}

/// Walks the collection tree under one root
pub struct HierarchyWalker<'a, T: CollectionTree> {
    tree: &'a T,
    root: T::Node,
}

impl<'a, T: CollectionTree> HierarchyWalker<'a, T> {
    pub fn new(tree: &'a T, root: T::Node) -> Self {
        Self { tree, root }
    }

    pub fn root_name(&self) -> &'a str {
        self.tree.node_name(self.root).unwrap_or_default()
    }

    /// Root first, then every reachable node once
    pub fn traverse(&self) -> Traverse<'a, T> {
        Traverse {
            tree: self.tree,
            stack: vec![self.root],
            visited: std::iter::once(self.root).collect(),
        }
    }

    /// Parents of every named child, recorded from each parent's side
    ///
    /// A child under several parents lists all of them; the root appears as
    /// a parent of the top-level collections.
    pub fn parent_lookup(&self) -> ParentLookup {
        let mut lookup = ParentLookup::new();
        for node in self.traverse() {
            let Some(parent) = self.tree.node_name(node) else {
                continue;
            };
            for child in self.tree.node_children(node) {
                let Some(child) = self.tree.node_name(*child) else {
                    continue;
                };
                let parents = lookup.entry(child.to_string()).or_default();
                if !parents.iter().any(|p| p == parent) {
                    parents.push(parent.to_string());
                }
            }
        }
        trace!("parent lookup: {:?}", lookup);
        lookup
    }

    /// Child names of every collection below the root
    pub fn collection_set(&self) -> CollectionSet {
        self.traverse()
            .filter(|node| *node != self.root)
            .filter_map(|node| {
                let name = self.tree.node_name(node)?;
                let children = self
                    .tree
                    .node_children(node)
                    .iter()
                    .filter_map(|c| self.tree.node_name(*c))
                    .map(str::to_string)
                    .collect();
                Some((name.to_string(), children))
            })
            .collect()
    }

    /// Names of every collection below the root, in traversal order
    pub fn collection_names(&self) -> Vec<String> {
        self.traverse()
            .filter(|node| *node != self.root)
            .filter_map(|node| self.tree.node_name(node))
            .map(str::to_string)
            .collect()
    }
}

/// Append `start` and its ancestors to `chain`, leaf first
///
/// Only the first collection of `collections` that holds the current node
/// is followed, so a node with several parents yields one path. The walk
/// also stops at a parent already in `chain`.
pub fn ancestor_chain(start: &str, chain: &mut Vec<String>, collections: &CollectionSet) {
    let mut current = start.to_string();
    loop {
        if !chain.contains(&current) {
            chain.push(current.clone());
        }
        let parent = collections
            .iter()
            .find(|(_, children)| children.contains(&current))
            .map(|(name, _)| name);
        match parent {
            Some(parent) if !chain.contains(parent) => current = parent.clone(),
            _ => return,
        }
    }
}

/// Ancestor chain of each object's first in-scope membership
///
/// `memberships` maps an object name to the collections it belongs to.
/// Objects without an in-scope membership are left out.
pub fn objects_collection_hierarchy(
    memberships: &IndexMap<String, Vec<String>>,
    in_scope: &[String],
    collections: &CollectionSet,
) -> IndexMap<String, Vec<String>> {
    let mut hierarchy = IndexMap::new();
    for (object, users) in memberships {
        let Some(first) = users.iter().find(|c| in_scope.contains(c)) else {
            continue;
        };
        let mut chain = Vec::new();
        ancestor_chain(first, &mut chain, collections);
        hierarchy.entry(object.clone()).or_insert(chain);
    }
    hierarchy
}

/// One ancestor chain per in-scope membership of each object
pub fn all_collection_hierarchies(
    memberships: &IndexMap<String, Vec<String>>,
    in_scope: &[String],
    collections: &CollectionSet,
) -> IndexMap<String, Vec<Vec<String>>> {
    memberships
        .iter()
        .map(|(object, users)| {
            let chains = users
                .iter()
                .filter(|c| in_scope.contains(c))
                .map(|c| {
                    let mut chain = Vec::new();
                    ancestor_chain(c, &mut chain, collections);
                    chain
                })
                .collect();
            (object.clone(), chains)
        })
        .collect()
}
