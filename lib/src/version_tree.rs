// Copyright 2025 The Strata Authors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
// https://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Spanning-tree bookkeeping for stored versions.
//!
//! Every stored version is a node; a node's parent is the version whose
//! content its patch is applied against, so the path from a root to a node
//! is exactly the patch chain that reconstructs it. Each node keeps two
//! child slots, its subtree height and size, and its insertion order. The
//! store uses the metrics to pick a *split* — a node roughly mid-height on
//! the longest descendant chain — and reattaches it directly under each new
//! head, which keeps reconstruction paths short (around `√n` for `n`
//! versions) while storage stays linear.

use std::collections::HashMap;
use std::hash::Hash;

#[derive(Clone, Debug)]
struct Node<K> {
    /// Insertion order; breaks height ties in favor of recent versions.
    order_id: u64,
    parent: Option<K>,
    /// Slot 0 holds a reattached former head, slot 1 a reattached split.
    children: [Option<K>; 2],
    /// Longest downward path including self; leaves have 1.
    height: usize,
    /// Nodes in the subtree including self.
    size: usize,
    /// The version this one was declared to derive from. Informational;
    /// unlike `parent` it never changes.
    base_version: Option<K>,
}

/// Spanning tree over version tags.
#[derive(Clone, Debug, Default)]
pub struct VersionTree<K> {
    nodes: HashMap<K, Node<K>>,
    next_order_id: u64,
}

impl<K: Clone + Eq + Hash> VersionTree<K> {
    pub fn new() -> Self {
        Self {
            nodes: HashMap::new(),
            next_order_id: 0,
        }
    }

    pub fn contains(&self, tag: &K) -> bool {
        self.nodes.contains_key(tag)
    }

    /// The version `tag` was derived from when it was added.
    pub fn base_version(&self, tag: &K) -> Option<&K> {
        self.nodes.get(tag)?.base_version.as_ref()
    }

    /// Inserts `tag` with no connections yet, recording its base version.
    pub fn add(&mut self, tag: K, base_version: Option<&K>) {
        let order_id = self.next_order_id;
        self.next_order_id += 1;
        self.nodes.insert(
            tag,
            Node {
                order_id,
                parent: None,
                children: [None, None],
                height: 1,
                size: 1,
                base_version: base_version.cloned(),
            },
        );
    }

    /// Path from `tag` up to its root, starting at `tag`.
    pub fn reverse_path_to(&self, tag: &K) -> Option<Vec<K>> {
        if !self.nodes.contains_key(tag) {
            return None;
        }
        let mut path = vec![tag.clone()];
        let mut current = tag;
        while let Some(parent) = &self.nodes[current].parent {
            path.push(parent.clone());
            current = parent;
        }
        Some(path)
    }

    /// Path from the root down to `tag`, ending at `tag`.
    pub fn path_to(&self, tag: &K) -> Option<Vec<K>> {
        let mut path = self.reverse_path_to(tag)?;
        path.reverse();
        Some(path)
    }

    /// Moves `tag` under `new_parent`: into child slot 0 if `tag` had no
    /// parent before (it was a head), slot 1 otherwise (it is a split).
    /// Metrics are recomputed for the new parent's ancestor chain first,
    /// then the old parent's.
    pub fn change_parent(&mut self, tag: &K, new_parent: &K) {
        let old_parent = self.nodes[tag].parent.clone();
        if let Some(old_parent) = &old_parent {
            let node = self.nodes.get_mut(old_parent).expect("parent must exist");
            for slot in &mut node.children {
                if slot.as_ref() == Some(tag) {
                    *slot = None;
                }
            }
        }

        // Former heads prefer slot 0, splits slot 1; fall back to whichever
        // slot is free.
        let preferred = usize::from(old_parent.is_some());
        self.nodes.get_mut(tag).expect("tag must exist").parent = Some(new_parent.clone());
        let parent_node = self
            .nodes
            .get_mut(new_parent)
            .expect("new parent must exist");
        let slot = if parent_node.children[preferred].is_none() {
            preferred
        } else {
            1 - preferred
        };
        debug_assert!(parent_node.children[slot].is_none());
        parent_node.children[slot] = Some(tag.clone());

        self.update_metrics(Some(new_parent.clone()));
        self.update_metrics(old_parent);
    }

    /// Recomputes height and size bottom-up from `start` to its root.
    fn update_metrics(&mut self, start: Option<K>) {
        let mut cursor = start;
        while let Some(tag) = cursor {
            let node = &self.nodes[&tag];
            let mut height = 0;
            let mut size = 0;
            for child in node.children.iter().flatten() {
                let child_node = &self.nodes[child];
                height = height.max(child_node.height);
                size += child_node.size;
            }
            let parent = node.parent.clone();
            let node = self.nodes.get_mut(&tag).expect("node must exist");
            node.height = height + 1;
            node.size = size + 1;
            cursor = parent;
        }
    }

    /// Walks the longest descendant chain from `tag` (ties to the most
    /// recently inserted child) down to its end, returning the reached tag
    /// and the full path from `tag` to it. The reached tag is the node
    /// promoted when the tree is reshaped around a new head.
    pub fn get_split(&self, tag: &K) -> Option<(K, Vec<K>)> {
        let mut node = self.nodes.get(tag)?;
        let mut current = tag.clone();
        let mut path = vec![current.clone()];
        let mut depth = 1;
        while depth < node.height {
            // A node of height > depth always has a child below.
            let next = node
                .children
                .iter()
                .flatten()
                .max_by_key(|child| {
                    let child_node = &self.nodes[*child];
                    (child_node.height, child_node.order_id)
                })
                .expect("interior node must have a child");
            current = next.clone();
            node = &self.nodes[&current];
            path.push(current.clone());
            depth += 1;
        }
        Some((current, path))
    }

    #[cfg(test)]
    fn metrics(&self, tag: &K) -> (usize, usize) {
        let node = &self.nodes[tag];
        (node.height, node.size)
    }
}
