//! Trait prediction from the nearest informative nodes of a tree.
//!
//! Observed tip traits and externally reconstructed ancestral traits are both
//! held in [`Annotations`], a sparse map beside the tree. The tree itself is
//! only read.

use crate::libs::error::{Result, TraitError};
use crate::libs::phylo::{NodeId, Tree};
use crate::libs::table::{TraitTable, TraitVector};
use indexmap::IndexMap;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rayon::prelude::*;
use std::collections::BTreeMap;

/// Trait vectors attached to tree nodes, keyed by `NodeId`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Annotations {
    values: BTreeMap<NodeId, TraitVector>,
}

impl Annotations {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach every row of `tables` to the tree node of the same name.
    /// Rows naming no node are skipped with a warning. Columns are aligned by
    /// trait name to the first table; every table must carry the same trait set.
    pub fn from_tables(tree: &Tree, tables: &[&TraitTable]) -> Result<Self> {
        let name_id = tree.get_name_id();
        let mut annotations = Self::new();

        let Some(first) = tables.first() else {
            return Ok(annotations);
        };
        let traits = first.trait_names();

        for table in tables {
            if table.arity() != traits.len() {
                return Err(TraitError::ArityMismatch(table.arity(), traits.len()));
            }
            // order[k] is this table's column of the first table's k-th trait
            let order = traits
                .iter()
                .map(|name| {
                    table
                        .trait_names()
                        .iter()
                        .position(|n| n == name)
                        .ok_or_else(|| TraitError::TraitMismatch(format!("missing '{}'", name)))
                })
                .collect::<Result<Vec<usize>>>()?;

            let mut unmatched = 0;
            for (id, values) in table.iter() {
                match name_id.get(id) {
                    Some(&node) => {
                        annotations.insert(node, order.iter().map(|&j| values[j]).collect())
                    }
                    None => unmatched += 1,
                }
            }
            if unmatched > 0 {
                log::warn!("{} trait rows match no node in the tree", unmatched);
            }
        }

        Ok(annotations)
    }

    pub fn insert(&mut self, node: NodeId, values: TraitVector) {
        self.values.insert(node, values);
    }

    pub fn get(&self, node: NodeId) -> Option<&TraitVector> {
        self.values.get(&node)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// A node is informative if it carries at least one known value.
    /// `masked` is treated as carrying nothing.
    fn informative(&self, node: NodeId, masked: Option<NodeId>) -> Option<&TraitVector> {
        if masked == Some(node) {
            return None;
        }
        self.values
            .get(&node)
            .filter(|v| v.iter().any(|x| x.is_some()))
    }
}

//----------------------------
// Weights
//----------------------------

/// Distance weighting of neighbor contributions.
/// All variants are non-increasing in distance and equal 1.0 at distance 0.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Weight {
    /// `(max_d - d) / max_d`, floored at 0
    Linear { max_d: f64 },
    /// `base ^ -d`
    NegExponential { base: f64 },
    /// 1.0 everywhere
    Equal,
}

impl Weight {
    pub fn weight(&self, d: f64) -> f64 {
        match *self {
            Weight::Linear { max_d } => ((max_d - d) / max_d).max(0.0),
            Weight::NegExponential { base } => base.powf(-d),
            Weight::Equal => 1.0,
        }
    }

    /// `(max_d - d) / max_d`; `max_d` must be positive.
    pub fn linear(max_d: f64) -> Result<Self> {
        if !(max_d > 0.0 && max_d.is_finite()) {
            return Err(TraitError::InvalidWeight(format!(
                "max_d must be positive, got {}",
                max_d
            )));
        }
        Ok(Weight::Linear { max_d })
    }

    /// `base ^ -d`; a base below 1 would grow with distance.
    pub fn neg_exponential(base: f64) -> Result<Self> {
        if !(base >= 1.0 && base.is_finite()) {
            return Err(TraitError::InvalidWeight(format!(
                "base must be at least 1, got {}",
                base
            )));
        }
        Ok(Weight::NegExponential { base })
    }

    pub fn from_name(name: &str, max_d: f64, base: f64) -> Result<Self> {
        match name {
            "linear" => Self::linear(max_d),
            "exponential" => Self::neg_exponential(base),
            "equal" => Ok(Weight::Equal),
            _ => Err(TraitError::UnknownWeight(name.to_string())),
        }
    }
}

impl Default for Weight {
    fn default() -> Self {
        Weight::Linear { max_d: 1.0 }
    }
}

//----------------------------
// Weighted average prediction
//----------------------------

fn node_name(tree: &Tree, id: NodeId) -> String {
    tree.get_node(id)
        .and_then(|n| n.name.clone())
        .unwrap_or_else(|| format!("#{}", id))
}

/// First informative node at or above the parent of `node`.
pub fn nearest_informative_ancestor(
    tree: &Tree,
    annotations: &Annotations,
    node: NodeId,
) -> Result<Option<NodeId>> {
    Ok(tree
        .get_ancestors(node)?
        .into_iter()
        .find(|&a| annotations.informative(a, None).is_some()))
}

/// Weighted average of the nearest informative ancestor and of the informative
/// children of `node`'s parent (`node` included unless masked).
pub fn weighted_prediction(
    tree: &Tree,
    annotations: &Annotations,
    node: NodeId,
    weight: &Weight,
) -> Result<TraitVector> {
    weighted_prediction_masked(tree, annotations, node, weight, None)
}

fn weighted_prediction_masked(
    tree: &Tree,
    annotations: &Annotations,
    node: NodeId,
    weight: &Weight,
    masked: Option<NodeId>,
) -> Result<TraitVector> {
    let parent = tree
        .node(node)?
        .parent
        .ok_or_else(|| TraitError::NoInformativeNeighbors(node_name(tree, node)))?;

    let mut sources: Vec<(f64, &TraitVector)> = Vec::new();

    if let Some(ancestor) = nearest_informative_ancestor(tree, annotations, node)? {
        let d = tree.get_distance(ancestor, parent)?;
        if let Some(values) = annotations.informative(ancestor, masked) {
            sources.push((weight.weight(d), values));
        }
    }
    for &child in &tree.node(parent)?.children {
        if let Some(values) = annotations.informative(child, masked) {
            let d = tree.node(child)?.edge();
            sources.push((weight.weight(d), values));
        }
    }

    if sources.is_empty() {
        return Err(TraitError::NoInformativeNeighbors(node_name(tree, node)));
    }
    let arity = sources[0].1.len();
    if let Some((_, v)) = sources.iter().find(|(_, v)| v.len() != arity) {
        return Err(TraitError::ArityMismatch(v.len(), arity));
    }
    let total: f64 = sources.iter().map(|(w, _)| w).sum();
    if total <= 0.0 {
        return Err(TraitError::ZeroTotalWeight(node_name(tree, node)));
    }

    // An unknown value in any source leaves that element unknown
    let prediction = (0..arity)
        .map(|j| {
            sources
                .iter()
                .map(|(w, v)| v[j].map(|x| w * x))
                .sum::<Option<f64>>()
                .map(|s| s / total)
        })
        .collect();

    Ok(prediction)
}

/// Replace unknown entries of `values` with those of `fallback`.
/// Absent `values` yields `fallback` itself.
pub fn fill_missing(values: Option<&TraitVector>, fallback: &TraitVector) -> Result<TraitVector> {
    let Some(values) = values else {
        return Ok(fallback.clone());
    };
    if values.len() != fallback.len() {
        return Err(TraitError::ArityMismatch(values.len(), fallback.len()));
    }
    Ok(values
        .iter()
        .zip(fallback)
        .map(|(v, f)| v.or(*f))
        .collect())
}

/// Predict one node: weighted average, then gaps backfilled from the nearest
/// informative ancestor's own values.
pub fn predict_node(
    tree: &Tree,
    annotations: &Annotations,
    node: NodeId,
    weight: &Weight,
    use_self: bool,
) -> Result<TraitVector> {
    let masked = if use_self { None } else { Some(node) };
    let prediction = weighted_prediction_masked(tree, annotations, node, weight, masked)?;

    match nearest_informative_ancestor(tree, annotations, node)?
        .and_then(|a| annotations.get(a))
    {
        Some(ancestral) => fill_missing(Some(&prediction), ancestral),
        None => Ok(prediction),
    }
}

/// Predict every id. With `use_self == false` each node's own annotation is
/// ignored while predicting it, so observed organisms can be validated honestly.
pub fn predict_many(
    tree: &Tree,
    annotations: &Annotations,
    ids: &[String],
    weight: &Weight,
    use_self: bool,
) -> Result<IndexMap<String, TraitVector>> {
    let name_id = tree.get_name_id();

    let predictions = ids
        .par_iter()
        .map(|id| {
            let node = *name_id
                .get(id)
                .ok_or_else(|| TraitError::NodeNotFound(id.clone()))?;
            let prediction = predict_node(tree, annotations, node, weight, use_self)?;
            Ok((id.clone(), prediction))
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(predictions.into_iter().collect())
}

/// Round count traits to whole numbers, never below `min`.
pub fn round_prediction(values: &TraitVector, min: f64) -> TraitVector {
    values.iter().map(|v| v.map(|x| x.round().max(min))).collect()
}

//----------------------------
// Neighbor-based predictors and NSTI
//----------------------------

/// Informative tips sorted by distance from `node`, nearest first (ties in tree order).
fn annotated_tips_by_distance(
    tree: &Tree,
    annotations: &Annotations,
    node: NodeId,
    masked: Option<NodeId>,
) -> Vec<(NodeId, f64)> {
    let dist = tree.distances_from(node);
    let mut tips: Vec<(NodeId, f64)> = tree
        .get_leaves()
        .into_iter()
        .filter(|&t| annotations.informative(t, masked).is_some())
        .filter_map(|t| dist[t].map(|d| (t, d)))
        .collect();
    tips.sort_by(|a, b| a.1.total_cmp(&b.1));
    tips
}

fn lookup(tree: &Tree, id: &str) -> Result<NodeId> {
    tree.get_node_by_name(id)
        .ok_or_else(|| TraitError::NodeNotFound(id.to_string()))
}

/// Nearest Sequenced Taxon Index of the requested ids and their mean.
#[derive(Debug, Clone, PartialEq)]
pub struct Nsti {
    pub values: IndexMap<String, f64>,
    pub mean: f64,
}

/// Distance from each id to the nearest annotated tip.
/// With `use_self`, an annotated id scores 0.
pub fn nsti(
    tree: &Tree,
    annotations: &Annotations,
    ids: &[String],
    use_self: bool,
) -> Result<Nsti> {
    let mut values = IndexMap::new();
    for id in ids {
        let node = lookup(tree, id)?;
        let masked = if use_self { None } else { Some(node) };
        let (_, d) = annotated_tips_by_distance(tree, annotations, node, masked)
            .first()
            .copied()
            .ok_or_else(|| TraitError::NoInformativeNeighbors(id.clone()))?;
        values.insert(id.clone(), d);
    }

    let mean = if values.is_empty() {
        0.0
    } else {
        values.values().sum::<f64>() / values.len() as f64
    };
    Ok(Nsti { values, mean })
}

/// Copy the traits of the nearest other annotated tip.
pub fn predict_nearest_neighbor(
    tree: &Tree,
    annotations: &Annotations,
    ids: &[String],
) -> Result<IndexMap<String, TraitVector>> {
    let mut predictions = IndexMap::new();
    for id in ids {
        let node = lookup(tree, id)?;
        let (nearest, _) = annotated_tips_by_distance(tree, annotations, node, Some(node))
            .first()
            .copied()
            .ok_or_else(|| TraitError::NoInformativeNeighbors(id.clone()))?;
        if let Some(values) = annotations.get(nearest) {
            predictions.insert(id.clone(), values.clone());
        }
    }
    Ok(predictions)
}

/// Copy the traits of a uniformly random other annotated tip. Used as a negative control.
pub fn predict_random_neighbor(
    tree: &Tree,
    annotations: &Annotations,
    ids: &[String],
    seed: u64,
) -> Result<IndexMap<String, TraitVector>> {
    let mut predictions = IndexMap::new();
    for (i, id) in ids.iter().enumerate() {
        let node = lookup(tree, id)?;
        let candidates = annotated_tips_by_distance(tree, annotations, node, Some(node));
        let mut rng = StdRng::seed_from_u64(seed.wrapping_add(i as u64));
        let (pick, _) = candidates
            .choose(&mut rng)
            .copied()
            .ok_or_else(|| TraitError::NoInformativeNeighbors(id.clone()))?;
        if let Some(values) = annotations.get(pick) {
            predictions.insert(id.clone(), values.clone());
        }
    }
    Ok(predictions)
}
