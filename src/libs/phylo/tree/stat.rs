use super::Tree;
use crate::libs::phylo::node::NodeId;
use std::collections::{BTreeMap, VecDeque};

/// IDs of all tips in the subtree rooted at `id`, left to right.
pub fn get_leaves(tree: &Tree, id: NodeId) -> Vec<NodeId> {
    tree.preorder(id)
        .into_iter()
        .filter(|&n| tree.nodes[n].is_leaf())
        .collect()
}

/// Map of node name to NodeId. Unnamed nodes are skipped.
pub fn get_name_id(tree: &Tree) -> BTreeMap<String, NodeId> {
    let mut map = BTreeMap::new();
    for node in &tree.nodes {
        if let Some(name) = &node.name {
            map.insert(name.clone(), node.id);
        }
    }
    map
}

/// Patristic distances from `start` to every node, indexed by NodeId.
/// Nodes not connected to `start` are `None`.
pub fn distances_from(tree: &Tree, start: NodeId) -> Vec<Option<f64>> {
    let mut dist = vec![None; tree.len()];
    if tree.get_node(start).is_none() {
        return dist;
    }

    let mut queue = VecDeque::new();
    dist[start] = Some(0.0);
    queue.push_back(start);

    while let Some(u) = queue.pop_front() {
        let d = dist[u].unwrap_or(0.0);
        let node = &tree.nodes[u];

        // Neighbors: children (edge on child) + parent (edge on self)
        let mut neighbors: Vec<(NodeId, f64)> = node
            .children
            .iter()
            .map(|&c| (c, tree.nodes[c].edge()))
            .collect();
        if let Some(p) = node.parent {
            neighbors.push((p, node.edge()));
        }

        for (v, w) in neighbors {
            if dist[v].is_none() {
                dist[v] = Some(d + w);
                queue.push_back(v);
            }
        }
    }

    dist
}

/// Largest patristic distance between any two tips.
///
/// Two sweeps: the tip furthest from an arbitrary tip is one end of a
/// longest tip-to-tip path.
pub fn max_tip_distance(tree: &Tree) -> f64 {
    let tips = tree.get_leaves();
    let Some(&first) = tips.first() else {
        return 0.0;
    };

    let furthest = |from: NodeId| -> (NodeId, f64) {
        let dist = distances_from(tree, from);
        tips.iter()
            .filter_map(|&t| dist[t].map(|d| (t, d)))
            .fold((from, 0.0), |acc, cur| if cur.1 > acc.1 { cur } else { acc })
    };

    let (end, _) = furthest(first);
    furthest(end).1
}
