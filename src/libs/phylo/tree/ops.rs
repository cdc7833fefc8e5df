use super::Tree;
use crate::libs::phylo::error::TreeError;
use crate::libs::phylo::node::NodeId;

/// Add a child to a parent node.
/// Updates both parent's `children` list and child's `parent` field.
pub fn add_child(tree: &mut Tree, parent_id: NodeId, child_id: NodeId) -> Result<(), TreeError> {
    if parent_id == child_id {
        return Err(TreeError::LogicError(
            "Cannot add node as child of itself".to_string(),
        ));
    }
    tree.node(parent_id)?;
    let child = tree.node(child_id)?;

    if let Some(old_parent) = child.parent {
        return Err(TreeError::LogicError(format!(
            "Node {} already has parent {}",
            child_id, old_parent
        )));
    }

    link(tree, parent_id, child_id);
    Ok(())
}

/// Link without validation; callers own both ids.
pub(crate) fn link(tree: &mut Tree, parent_id: NodeId, child_id: NodeId) {
    tree.nodes[child_id].parent = Some(parent_id);
    tree.nodes[parent_id].children.push(child_id);
}

fn sum_lengths(a: Option<f64>, b: Option<f64>) -> Option<f64> {
    match (a, b) {
        (Some(p), Some(c)) => Some(p + c),
        (Some(p), None) => Some(p),
        (None, Some(c)) => Some(c),
        (None, None) => None,
    }
}

/// Build a new tree holding only the tips in `keep` and the nodes needed to connect them.
///
/// The result is rebuilt from scratch rather than pruned in place:
/// * internal nodes left with a single kept child are spliced out, their
///   branch length added to the child's;
/// * a root left with a single kept child hands the root role to that child,
///   which takes over the old root's (usually absent) branch length.
///
/// Every id in `keep` must be a tip. The ids of the new tree are fresh.
pub fn restrict_to_tips(tree: &Tree, keep: &[NodeId]) -> Result<Tree, TreeError> {
    let root = tree
        .get_root()
        .ok_or_else(|| TreeError::LogicError("Tree has no root".to_string()))?;

    // Number of kept tips below each node
    let mut kept = vec![0usize; tree.len()];
    for &id in keep {
        if !tree.node(id)?.is_leaf() {
            return Err(TreeError::LogicError(format!(
                "Node {} is not a tip",
                id
            )));
        }
        kept[id] = 1;
    }
    for id in tree.postorder(root) {
        let below: usize = tree.nodes[id].children.iter().map(|&c| kept[c]).sum();
        kept[id] += below;
    }
    if kept[root] == 0 {
        return Err(TreeError::LogicError(
            "Restriction would leave no tips".to_string(),
        ));
    }

    let mut new_tree = Tree::new();

    // (old id, new parent, length accumulated from spliced ancestors)
    let mut stack: Vec<(NodeId, Option<NodeId>, Option<f64>)> = vec![(root, None, None)];
    while let Some((old_id, new_parent, acc)) = stack.pop() {
        let old = &tree.nodes[old_id];
        let kept_children: Vec<NodeId> = old
            .children
            .iter()
            .copied()
            .filter(|&c| kept[c] > 0)
            .collect();

        let length = if new_parent.is_none() && old_id != root {
            // promoted to root; keeps the old root's branch
            tree.nodes[root].length
        } else {
            sum_lengths(acc, old.length)
        };

        if kept_children.len() == 1 {
            let acc = if old_id == root { None } else { length };
            stack.push((kept_children[0], new_parent, acc));
            continue;
        }

        let new_id = new_tree.add_node();
        if let Some(node) = new_tree.get_node_mut(new_id) {
            node.name = old.name.clone();
            node.length = length;
        }
        match new_parent {
            Some(p) => link(&mut new_tree, p, new_id),
            None => new_tree.set_root(new_id),
        }

        for &child in kept_children.iter().rev() {
            stack.push((child, Some(new_id), None));
        }
    }

    Ok(new_tree)
}

/// Raise every branch length below `min_length` (missing lengths included) to `min_length`.
/// The root's branch is left alone.
pub fn floor_branch_lengths(tree: &mut Tree, min_length: f64) {
    for node in tree.nodes.iter_mut() {
        if node.parent.is_none() {
            continue;
        }
        if node.length.map_or(true, |l| l < min_length) {
            node.length = Some(min_length);
        }
    }
}
