pub mod io;
pub mod ops;
pub mod query;
pub mod stat;
pub mod traversal;

use super::error::TreeError;
use super::node::{Node, NodeId};
use std::collections::BTreeMap;

/// Rooted, ordered phylogenetic tree stored as an arena of nodes.
///
/// `Clone` is a full copy of the arena, so a cloned tree is an independent
/// working copy whose `NodeId`s match the original's.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct Tree {
    /// Arena storage for all nodes
    pub(super) nodes: Vec<Node>,

    /// Optional root ID (a tree might be empty or in construction)
    pub(super) root: Option<NodeId>,
}

impl Tree {
    /// Create a new empty tree
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a new detached node to the tree. Returns the new node's ID.
    pub fn add_node(&mut self) -> NodeId {
        let id = self.nodes.len();
        self.nodes.push(Node::new(id));
        id
    }

    /// Number of nodes. Valid ids are `0..len()`.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn get_root(&self) -> Option<NodeId> {
        self.root
    }

    pub fn get_node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id)
    }

    pub fn get_node_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        self.nodes.get_mut(id)
    }

    /// Like `get_node`, but a missing node is an error
    pub fn node(&self, id: NodeId) -> Result<&Node, TreeError> {
        self.get_node(id).ok_or(TreeError::NodeNotFound(id))
    }

    pub fn set_root(&mut self, id: NodeId) {
        if self.get_node(id).is_some() {
            self.root = Some(id);
        }
    }

    // --- Delegation to ops ---

    pub fn add_child(&mut self, parent_id: NodeId, child_id: NodeId) -> Result<(), TreeError> {
        ops::add_child(self, parent_id, child_id)
    }

    pub(crate) fn link(&mut self, parent_id: NodeId, child_id: NodeId) {
        ops::link(self, parent_id, child_id)
    }

    pub fn restrict_to_tips(&self, keep: &[NodeId]) -> Result<Tree, TreeError> {
        ops::restrict_to_tips(self, keep)
    }

    pub fn floor_branch_lengths(&mut self, min_length: f64) {
        ops::floor_branch_lengths(self, min_length)
    }

    // --- Delegation to traversal ---

    pub fn preorder(&self, start_node: NodeId) -> Vec<NodeId> {
        traversal::preorder(self, start_node)
    }

    pub fn postorder(&self, start_node: NodeId) -> Vec<NodeId> {
        traversal::postorder(self, start_node)
    }

    // --- Delegation to query ---

    pub fn get_path_from_root(&self, id: NodeId) -> Result<Vec<NodeId>, TreeError> {
        query::get_path_from_root(self, id)
    }

    pub fn get_ancestors(&self, id: NodeId) -> Result<Vec<NodeId>, TreeError> {
        query::get_ancestors(self, id)
    }

    pub fn get_siblings(&self, id: NodeId) -> Result<Vec<NodeId>, TreeError> {
        query::get_siblings(self, id)
    }

    pub fn get_common_ancestor(&self, a: NodeId, b: NodeId) -> Result<NodeId, TreeError> {
        query::get_common_ancestor(self, a, b)
    }

    /// Patristic distance between two nodes
    pub fn get_distance(&self, a: NodeId, b: NodeId) -> Result<f64, TreeError> {
        query::get_distance(self, a, b)
    }

    pub fn get_node_by_name(&self, name: &str) -> Option<NodeId> {
        query::get_node_by_name(self, name)
    }

    // --- Delegation to stat ---

    pub fn get_leaves(&self) -> Vec<NodeId> {
        match self.root {
            Some(root) => stat::get_leaves(self, root),
            None => Vec::new(),
        }
    }

    pub fn get_leaf_names(&self) -> Vec<String> {
        self.get_leaves()
            .into_iter()
            .filter_map(|id| self.get_node(id).and_then(|n| n.name.clone()))
            .collect()
    }

    pub fn get_name_id(&self) -> BTreeMap<String, NodeId> {
        stat::get_name_id(self)
    }

    pub fn distances_from(&self, start: NodeId) -> Vec<Option<f64>> {
        stat::distances_from(self, start)
    }

    pub fn max_tip_distance(&self) -> f64 {
        stat::max_tip_distance(self)
    }

    // --- Delegation to io ---

    pub fn from_file(infile: &str) -> anyhow::Result<Vec<Tree>> {
        io::from_file(infile)
    }

    pub fn to_newick(&self) -> String {
        io::to_newick(self)
    }
}
