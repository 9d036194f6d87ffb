//! Arena-backed navigation tree.
//!
//! Nodes live in a map keyed by id; parent and child links are ids, so there
//! are no back-references to keep alive. Every mutation takes `&mut self`,
//! which makes each call atomic with respect to readers of the model.

use std::collections::HashMap;

use tracing::warn;

use crate::nav::node::{NodeId, NodeKind};

/// A node in the navigation tree.
#[derive(Debug, Clone, PartialEq)]
pub struct TreeNode<T> {
    id: NodeId,
    pub label: String,
    pub kind: NodeKind,
    pub is_expandable: bool,
    pub is_expanded: bool,
    /// A listing for this node is in flight; `children` is not authoritative.
    pub loading: bool,
    /// Message of the last failed listing, cleared by the next expand.
    pub error: Option<String>,
    pub data: T,
    parent: Option<NodeId>,
    children: Option<Vec<NodeId>>,
}

impl<T> TreeNode<T> {
    /// Create a collapsed node; directory-like kinds are expandable.
    pub fn new(id: impl Into<NodeId>, label: impl Into<String>, kind: NodeKind, data: T) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
            kind,
            is_expandable: kind.is_directory_like(),
            is_expanded: false,
            loading: false,
            error: None,
            data,
            parent: None,
            children: None,
        }
    }

    pub fn expanded(mut self, is_expanded: bool) -> Self {
        self.is_expanded = is_expanded;
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn parent(&self) -> Option<&str> {
        self.parent.as_deref()
    }

    /// Child ids from the last applied listing, `None` until the first one.
    #[cfg(test)]
    pub fn children(&self) -> Option<&[NodeId]> {
        self.children.as_deref()
    }
}

/// A row of the flattened, visible part of the tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VisibleRow {
    pub id: NodeId,
    pub depth: usize,
    pub is_last_sibling: bool,
}

/// The navigation forest.
#[derive(Debug, Clone)]
pub struct TreeModel<T> {
    nodes: HashMap<NodeId, TreeNode<T>>,
    roots: Vec<NodeId>,
}

impl<T> Default for TreeModel<T> {
    fn default() -> Self {
        Self {
            nodes: HashMap::new(),
            roots: Vec::new(),
        }
    }
}

impl<T> TreeModel<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the whole forest with `roots`. Later duplicates of an id are dropped.
    pub fn initialize(&mut self, roots: Vec<TreeNode<T>>) {
        self.nodes.clear();
        self.roots.clear();
        for mut root in roots {
            if self.nodes.contains_key(&root.id) {
                warn!(id = %root.id, "dropping duplicate root node");
                continue;
            }
            root.parent = None;
            root.children = None;
            self.roots.push(root.id.clone());
            self.nodes.insert(root.id.clone(), root);
        }
    }

    pub fn find(&self, id: &str) -> Option<&TreeNode<T>> {
        self.nodes.get(id)
    }

    /// Apply `mutator` to the node and return the updated node.
    ///
    /// Returns `None` when no node has this id.
    pub fn modify<F>(&mut self, id: &str, mutator: F) -> Option<&TreeNode<T>>
    where
        F: FnOnce(&mut TreeNode<T>),
    {
        let node = self.nodes.get_mut(id)?;
        mutator(node);
        Some(&*node)
    }

    /// Replace the children of `id` wholesale and apply `mutator` in the same step.
    ///
    /// The previous descendants are removed from the arena. An incoming child
    /// whose id already exists elsewhere in the tree is dropped.
    pub fn replace_children<F>(
        &mut self,
        id: &str,
        children: Vec<TreeNode<T>>,
        mutator: F,
    ) -> Option<&TreeNode<T>>
    where
        F: FnOnce(&mut TreeNode<T>),
    {
        if !self.nodes.contains_key(id) {
            return None;
        }
        self.remove_descendants(id);

        let mut child_ids = Vec::with_capacity(children.len());
        for mut child in children {
            if self.nodes.contains_key(&child.id) {
                warn!(parent = %id, child = %child.id, "dropping child with duplicate id");
                continue;
            }
            child.parent = Some(id.to_string());
            child.children = None;
            child_ids.push(child.id.clone());
            self.nodes.insert(child.id.clone(), child);
        }

        let node = self.nodes.get_mut(id)?;
        node.children = Some(child_ids);
        mutator(node);
        Some(&*node)
    }

    fn remove_descendants(&mut self, id: &str) {
        let mut stack: Vec<NodeId> = self
            .nodes
            .get_mut(id)
            .and_then(|node| node.children.take())
            .unwrap_or_default();
        while let Some(child_id) = stack.pop() {
            if let Some(child) = self.nodes.remove(&child_id) {
                stack.extend(child.children.unwrap_or_default());
            }
        }
    }

    pub fn roots(&self) -> impl Iterator<Item = &TreeNode<T>> {
        self.roots.iter().filter_map(|id| self.nodes.get(id))
    }

    /// Loaded children of `id`, in listing order.
    #[cfg(test)]
    pub fn children_of(&self, id: &str) -> Vec<&TreeNode<T>> {
        self.nodes
            .get(id)
            .and_then(|node| node.children.as_ref())
            .map(|ids| ids.iter().filter_map(|c| self.nodes.get(c)).collect())
            .unwrap_or_default()
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Depth of a node, counting roots as depth 0.
    #[cfg(test)]
    pub fn depth_of(&self, id: &str) -> Option<usize> {
        let mut node = self.nodes.get(id)?;
        let mut depth = 0;
        while let Some(parent) = node.parent.as_deref().and_then(|p| self.nodes.get(p)) {
            depth += 1;
            node = parent;
        }
        Some(depth)
    }

    /// Flatten the visible tree in display order. Collapsed nodes show no children.
    pub fn visible_rows(&self) -> Vec<VisibleRow> {
        let mut rows = Vec::new();
        let count = self.roots.len();
        for (i, id) in self.roots.iter().enumerate() {
            self.flatten_node(id, 0, i + 1 == count, &mut rows);
        }
        rows
    }

    fn flatten_node(&self, id: &str, depth: usize, is_last: bool, rows: &mut Vec<VisibleRow>) {
        let Some(node) = self.nodes.get(id) else {
            return;
        };
        rows.push(VisibleRow {
            id: node.id.clone(),
            depth,
            is_last_sibling: is_last,
        });
        if !node.is_expanded {
            return;
        }
        if let Some(children) = &node.children {
            for (i, child) in children.iter().enumerate() {
                self.flatten_node(child, depth + 1, i + 1 == children.len(), rows);
            }
        }
    }
}
