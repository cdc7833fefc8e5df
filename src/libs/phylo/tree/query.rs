use super::Tree;
use crate::libs::phylo::error::TreeError;
use crate::libs::phylo::node::NodeId;

pub fn get_path_from_root(tree: &Tree, id: NodeId) -> Result<Vec<NodeId>, TreeError> {
    tree.node(id)?;

    let mut path = vec![id];
    path.extend(get_ancestors(tree, id)?);
    path.reverse();

    if let Some(root) = tree.get_root() {
        if path[0] != root {
            return Err(TreeError::LogicError(format!(
                "Node {} is detached from root",
                id
            )));
        }
    }

    Ok(path)
}

/// Ancestors of a node, nearest first. The node itself is not included.
pub fn get_ancestors(tree: &Tree, id: NodeId) -> Result<Vec<NodeId>, TreeError> {
    let mut ancestors = Vec::new();
    let mut current = tree.node(id)?.parent;

    while let Some(p) = current {
        ancestors.push(p);
        current = tree.node(p)?.parent;
    }

    Ok(ancestors)
}

/// Other children of the node's parent. The root has no siblings.
pub fn get_siblings(tree: &Tree, id: NodeId) -> Result<Vec<NodeId>, TreeError> {
    let siblings = match tree.node(id)?.parent {
        Some(p) => tree
            .node(p)?
            .children
            .iter()
            .copied()
            .filter(|&c| c != id)
            .collect(),
        None => Vec::new(),
    };
    Ok(siblings)
}

/// Find Lowest Common Ancestor (LCA) of two nodes.
pub fn get_common_ancestor(tree: &Tree, a: NodeId, b: NodeId) -> Result<NodeId, TreeError> {
    let path_a = get_path_from_root(tree, a)?;
    let path_b = get_path_from_root(tree, b)?;

    path_a
        .iter()
        .zip(path_b.iter())
        .take_while(|(u, v)| u == v)
        .last()
        .map(|(u, _)| *u)
        .ok_or_else(|| TreeError::LogicError("Nodes have no common ancestor".to_string()))
}

/// Patristic distance: sum of branch lengths on the path between two nodes.
/// Missing lengths count as 0.
pub fn get_distance(tree: &Tree, a: NodeId, b: NodeId) -> Result<f64, TreeError> {
    let lca = get_common_ancestor(tree, a, b)?;

    let dist_to_lca = |start: NodeId| -> Result<f64, TreeError> {
        let mut weighted = 0.0;
        let mut curr = start;
        while curr != lca {
            let node = tree.node(curr)?;
            weighted += node.edge();
            curr = node.parent.ok_or(TreeError::NodeNotFound(lca))?;
        }
        Ok(weighted)
    };

    Ok(dist_to_lca(a)? + dist_to_lca(b)?)
}

/// Get node ID by name. Returns first match.
pub fn get_node_by_name(tree: &Tree, name: &str) -> Option<NodeId> {
    tree.nodes
        .iter()
        .find(|n| n.name.as_deref() == Some(name))
        .map(|n| n.id)
}
