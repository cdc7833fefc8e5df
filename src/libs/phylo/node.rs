/// NodeId is an index into the Tree's node vector.
/// It is lightweight (Copy) and stays valid across a `Clone` of the tree.
pub type NodeId = usize;

#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    /// Unique identifier for the node (index in the arena)
    pub id: NodeId,

    /// Parent node ID (None for root)
    pub parent: Option<NodeId>,

    /// List of child node IDs, in input order
    pub children: Vec<NodeId>,

    // --- Payload ---
    /// Node name/label (organism id for tips, optional for internals)
    pub name: Option<String>,

    /// Branch length to parent.
    /// In rooted trees, edge length is an attribute of the child node.
    pub length: Option<f64>,
}

impl Node {
    /// Create a new empty node with a specific ID
    pub fn new(id: NodeId) -> Self {
        Self {
            id,
            parent: None,
            children: Vec::new(),
            name: None,
            length: None,
        }
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = Some(name.into());
    }

    /// Branch length with missing lengths read as 0.0
    pub fn edge(&self) -> f64 {
        self.length.unwrap_or(0.0)
    }

    /// A node is a tip if it has no children
    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }
}
