//! Test-dataset generation: hide organisms from a reference tree at growing
//! phylogenetic distances so that predictions for them can be scored.

use crate::libs::error::{Result, TraitError};
use crate::libs::phylo::{NodeId, Tree};
use crate::libs::table::{TraitTable, TraitVector};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rayon::prelude::*;
use std::collections::HashSet;
use std::str::FromStr;

/// Remove one tip, returning the minimal tree over the remaining tips.
pub fn exclude_tip(tip: NodeId, tree: &Tree) -> Result<Tree> {
    let node = tree.node(tip)?;
    if !node.is_leaf() {
        return Err(TraitError::NotATip(display_name(tree, tip)));
    }

    let keep: Vec<NodeId> = tree.get_leaves().into_iter().filter(|&t| t != tip).collect();
    if keep.is_empty() {
        return Err(TraitError::NoTipsLeft);
    }

    Ok(tree.restrict_to_tips(&keep)?)
}

/// Remove a tip and every other tip within `distance` of it.
pub fn exclude_neighbors(tip: NodeId, tree: &Tree, distance: f64) -> Result<Tree> {
    let max = tree.max_tip_distance();
    if distance > max {
        return Err(TraitError::DistanceTooLarge { distance, max });
    }

    let excluded: HashSet<NodeId> = neighbors_within(tree, tip, distance)?.into_iter().collect();
    let keep: Vec<NodeId> = tree
        .get_leaves()
        .into_iter()
        .filter(|t| !excluded.contains(t))
        .collect();
    if keep.is_empty() {
        return Err(TraitError::NoTipsLeft);
    }

    Ok(tree.restrict_to_tips(&keep)?)
}

/// Shuffle the names of a tip and its neighbors within `distance`.
/// Topology and branch lengths are untouched.
pub fn randomize_neighbors(
    tip: NodeId,
    tree: &Tree,
    distance: f64,
    rng: &mut StdRng,
) -> Result<Tree> {
    let group = neighbors_within(tree, tip, distance)?;

    let mut names: Vec<Option<String>> = group
        .iter()
        .map(|&id| tree.get_node(id).and_then(|n| n.name.clone()))
        .collect();
    names.shuffle(rng);

    let mut shuffled = tree.clone();
    for (&id, name) in group.iter().zip(names) {
        if let Some(node) = shuffled.get_node_mut(id) {
            node.name = name;
        }
    }

    Ok(shuffled)
}

/// The tip itself and all other tips within `distance` of it (inclusive).
pub fn neighbors_within(tree: &Tree, tip: NodeId, distance: f64) -> Result<Vec<NodeId>> {
    if !tree.node(tip)?.is_leaf() {
        return Err(TraitError::NotATip(display_name(tree, tip)));
    }

    let dist = tree.distances_from(tip);
    Ok(tree
        .get_leaves()
        .into_iter()
        .filter(|&t| t == tip || dist[t].is_some_and(|d| d <= distance))
        .collect())
}

fn display_name(tree: &Tree, id: NodeId) -> String {
    tree.get_node(id)
        .and_then(|n| n.name.clone())
        .unwrap_or_else(|| format!("#{}", id))
}

//----------------------------
// Methods
//----------------------------

/// One way of hiding an organism, with its parameter bound.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Holdout {
    ExcludeTip,
    ExcludeNeighbors { distance: f64 },
    RandomizeNeighbors { distance: f64 },
}

impl Holdout {
    /// `rng` is only drawn from by `RandomizeNeighbors`.
    pub fn apply(&self, tip: NodeId, tree: &Tree, rng: &mut StdRng) -> Result<Tree> {
        match *self {
            Holdout::ExcludeTip => exclude_tip(tip, tree),
            Holdout::ExcludeNeighbors { distance } => exclude_neighbors(tip, tree, distance),
            Holdout::RandomizeNeighbors { distance } => {
                randomize_neighbors(tip, tree, distance, rng)
            }
        }
    }
}

/// Distance-parameterized families of `Holdout`s swept by `sweep`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HoldoutKind {
    ExcludeByDistance,
    RandomizeByDistance,
}

impl HoldoutKind {
    pub fn name(&self) -> &'static str {
        match self {
            HoldoutKind::ExcludeByDistance => "exclude_tips_by_distance",
            HoldoutKind::RandomizeByDistance => "randomize_tip_labels_by_distance",
        }
    }

    pub fn at(&self, distance: f64) -> Holdout {
        match self {
            HoldoutKind::ExcludeByDistance => Holdout::ExcludeNeighbors { distance },
            HoldoutKind::RandomizeByDistance => Holdout::RandomizeNeighbors { distance },
        }
    }
}

impl FromStr for HoldoutKind {
    type Err = TraitError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "exclude_tips_by_distance" | "exclude" => Ok(HoldoutKind::ExcludeByDistance),
            "randomize_tip_labels_by_distance" | "randomize" => {
                Ok(HoldoutKind::RandomizeByDistance)
            }
            _ => Err(TraitError::UnknownMethod(s.to_string())),
        }
    }
}

//----------------------------
// Sweep
//----------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct SweepOpt {
    pub min_dist: f64,
    pub max_dist: f64,
    pub increment: f64,
    pub seed: u64,
    /// Floor every branch of the test trees to this length
    pub min_branch_length: Option<f64>,
}

impl Default for SweepOpt {
    fn default() -> Self {
        Self {
            min_dist: 0.0,
            max_dist: 0.4,
            increment: 0.02,
            seed: 42,
            min_branch_length: None,
        }
    }
}

/// One hidden organism at one distance.
#[derive(Debug, Clone, PartialEq)]
pub struct TestCase {
    pub method: &'static str,
    pub distance: f64,
    pub organism: String,
    /// Reference tree after the holdout method was applied
    pub tree: Tree,
    /// The organism's traits before it was hidden
    pub expected: TraitVector,
    /// Trait table restricted to the tips of `tree`
    pub table: TraitTable,
}

impl TestCase {
    pub fn label(&self) -> String {
        format!("{}--{}--{}", self.method, self.distance, self.organism)
    }

    /// `expected` as a one-row table with the reduced table's header
    pub fn expected_table(&self) -> Result<TraitTable> {
        let mut table = self.table.empty_like();
        table.insert(self.organism.clone(), self.expected.clone())?;
        Ok(table)
    }
}

/// Distances are rounded to `1 / DISTANCE_SCALE` so labels stay readable.
pub const DISTANCE_SCALE: f64 = 1e10;

/// Upper bound on the number of distances in one sweep.
pub const MAX_STEPS: f64 = 1e7;

/// `min, min + inc, ...` strictly below `max`, rounded to 10 decimals.
/// Callers must keep `increment` at or above that resolution, as `sweep` does.
pub fn step_distances(min: f64, max: f64, increment: f64) -> Vec<f64> {
    let mut distances = Vec::new();
    let mut i = 0u64;
    loop {
        let d = ((min + increment * i as f64) * DISTANCE_SCALE).round() / DISTANCE_SCALE;
        if d >= max {
            break;
        }
        distances.push(d);
        i += 1;
    }
    distances
}

/// Generate test cases for every distance in `[min_dist, max_dist)` and every
/// organism present in both the tree and the table (or only those in `limit_to`).
///
/// Each case works on its own copy of `tree`. A case whose method fails is
/// logged and skipped; invalid parameters fail the whole sweep.
pub fn sweep(
    tree: &Tree,
    table: &TraitTable,
    kind: HoldoutKind,
    opt: &SweepOpt,
    limit_to: Option<&[String]>,
) -> Result<Vec<TestCase>> {
    if !(opt.increment > 0.0) || opt.min_dist < 0.0 {
        return Err(TraitError::InvalidRange(format!(
            "min {} / increment {}",
            opt.min_dist, opt.increment
        )));
    }
    // Smaller steps would round onto each other
    if opt.increment * DISTANCE_SCALE < 1.0 {
        return Err(TraitError::InvalidRange(format!(
            "increment {} is below the distance resolution {}",
            opt.increment,
            1.0 / DISTANCE_SCALE
        )));
    }
    let steps = (opt.max_dist - opt.min_dist) / opt.increment;
    if !steps.is_finite() || steps > MAX_STEPS {
        return Err(TraitError::InvalidRange(format!(
            "[{}, {}) by {} gives more than {} distances",
            opt.min_dist, opt.max_dist, opt.increment, MAX_STEPS
        )));
    }
    if !(opt.max_dist - opt.min_dist > opt.increment) {
        log::warn!(
            "Distance range [{}, {}) does not exceed increment {}; no test cases generated",
            opt.min_dist,
            opt.max_dist,
            opt.increment
        );
        return Ok(Vec::new());
    }

    // Organisms in both tree and table, in tree order
    let shared: Vec<String> = tree
        .get_leaf_names()
        .into_iter()
        .filter(|name| table.contains(name))
        .collect();
    let organisms: Vec<String> = match limit_to {
        Some(ids) => {
            let shared_set: HashSet<&String> = shared.iter().collect();
            if let Some(missing) = ids.iter().find(|id| !shared_set.contains(id)) {
                return Err(TraitError::UnknownOrganism(missing.clone()));
            }
            ids.to_vec()
        }
        None => shared,
    };

    let tasks: Vec<(f64, &String)> = step_distances(opt.min_dist, opt.max_dist, opt.increment)
        .into_iter()
        .flat_map(|d| organisms.iter().map(move |o| (d, o)))
        .collect();
    log::info!(
        "{}: {} organisms x {} distances",
        kind.name(),
        organisms.len(),
        tasks.len() / organisms.len().max(1)
    );

    let cases: Vec<TestCase> = tasks
        .par_iter()
        .enumerate()
        .filter_map(|(i, &(distance, organism))| {
            let mut rng = StdRng::seed_from_u64(opt.seed.wrapping_add(i as u64));
            match make_case(tree, table, kind, distance, organism, opt, &mut rng) {
                Ok(case) => Some(case),
                Err(e) => {
                    log::warn!("Skip {}--{}--{}: {}", kind.name(), distance, organism, e);
                    None
                }
            }
        })
        .collect();

    Ok(cases)
}

fn make_case(
    tree: &Tree,
    table: &TraitTable,
    kind: HoldoutKind,
    distance: f64,
    organism: &str,
    opt: &SweepOpt,
    rng: &mut StdRng,
) -> Result<TestCase> {
    let working = tree.clone();
    let tip = working
        .get_node_by_name(organism)
        .ok_or_else(|| TraitError::NodeNotFound(organism.to_string()))?;
    let expected = table
        .get(organism)
        .cloned()
        .ok_or_else(|| TraitError::UnknownOrganism(organism.to_string()))?;

    let mut test_tree = kind.at(distance).apply(tip, &working, rng)?;
    if let Some(min) = opt.min_branch_length {
        test_tree.floor_branch_lengths(min);
    }

    let surviving: HashSet<String> = test_tree.get_leaf_names().into_iter().collect();
    let reduced = table.filter_ids(&surviving);

    log::debug!(
        "{}--{}--{}: {} tips left",
        kind.name(),
        distance,
        organism,
        surviving.len()
    );

    Ok(TestCase {
        method: kind.name(),
        distance,
        organism: organism.to_string(),
        tree: test_tree,
        expected,
        table: reduced,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const ABCD: &str = "((A:1,B:1)E:1,(C:1,D:1)F:1)root;";

    fn abcd() -> Tree {
        Tree::from_newick(ABCD).unwrap()
    }

    fn tip(tree: &Tree, name: &str) -> NodeId {
        tree.get_node_by_name(name).unwrap()
    }

    fn table() -> TraitTable {
        TraitTable::parse("id\tK1\tK2\nA\t1\t0\nB\t2\t0\nC\t3\t1\nD\t4\t1\nZ\t9\t9\n").unwrap()
    }

    fn sorted_tips(tree: &Tree) -> Vec<String> {
        let mut names = tree.get_leaf_names();
        names.sort();
        names
    }

    #[test]
    fn test_exclude_tip() {
        let tree = abcd();
        let out = exclude_tip(tip(&tree, "B"), &tree).unwrap();
        assert_eq!(out.to_newick(), "(A:2,(C:1,D:1)F:1)root;");
        assert_eq!(sorted_tips(&out), vec!["A", "C", "D"]);
    }

    #[test]
    fn test_exclude_tip_errors() {
        let tree = abcd();
        assert_eq!(
            exclude_tip(tip(&tree, "E"), &tree),
            Err(TraitError::NotATip("E".to_string()))
        );

        let single = Tree::from_newick("A;").unwrap();
        assert_eq!(
            exclude_tip(tip(&single, "A"), &single),
            Err(TraitError::NoTipsLeft)
        );
    }

    #[test]
    fn test_exclude_neighbors() {
        let tree = abcd();
        let a = tip(&tree, "A");

        let out = exclude_neighbors(a, &tree, 0.0).unwrap();
        assert_eq!(out, exclude_tip(a, &tree).unwrap());

        let out = exclude_neighbors(a, &tree, 2.0).unwrap();
        assert_eq!(out.to_newick(), "(C:1,D:1)F;");

        assert!(matches!(
            exclude_neighbors(a, &tree, 5.0),
            Err(TraitError::DistanceTooLarge { .. })
        ));
        assert_eq!(
            exclude_neighbors(a, &tree, 4.0),
            Err(TraitError::NoTipsLeft)
        );
    }

    #[test]
    fn test_exclusion_set_grows_with_distance() {
        let tree = abcd();
        let a = tip(&tree, "A");

        let mut previous: HashSet<NodeId> = HashSet::new();
        for d in [0.0, 1.0, 2.0, 3.0, 4.0] {
            let current: HashSet<NodeId> =
                neighbors_within(&tree, a, d).unwrap().into_iter().collect();
            assert!(previous.is_subset(&current));
            previous = current;
        }
        assert_eq!(previous.len(), 4);
    }

    #[test]
    fn test_randomize_neighbors() {
        let tree = abcd();
        let a = tip(&tree, "A");

        let mut rng = StdRng::seed_from_u64(7);
        let out = randomize_neighbors(a, &tree, 4.0, &mut rng).unwrap();

        // Same arena layout: topology and lengths preserved
        assert_eq!(out.len(), tree.len());
        for id in 0..tree.len() {
            let (n0, n1) = (tree.get_node(id).unwrap(), out.get_node(id).unwrap());
            assert_eq!(n0.parent, n1.parent);
            assert_eq!(n0.children, n1.children);
            assert_eq!(n0.length, n1.length);
        }
        assert_eq!(sorted_tips(&out), vec!["A", "B", "C", "D"]);

        // Internal labels are never shuffled
        assert_eq!(out.get_node(tip(&tree, "E")).unwrap().name.as_deref(), Some("E"));

        // Same seed, same permutation
        let mut rng = StdRng::seed_from_u64(7);
        assert_eq!(randomize_neighbors(a, &tree, 4.0, &mut rng).unwrap(), out);

        // Nothing within distance 0 but the tip itself
        let out = randomize_neighbors(a, &tree, 0.0, &mut rng).unwrap();
        assert_eq!(out, tree);
    }

    #[test]
    fn test_step_distances() {
        assert_eq!(step_distances(0.0, 0.3, 0.1), vec![0.0, 0.1, 0.2]);
        assert_eq!(step_distances(0.0, 1.0, 0.5), vec![0.0, 0.5]);
    }

    #[test]
    fn test_sweep() {
        let tree = abcd();
        let table = table();
        let opt = SweepOpt {
            min_dist: 0.0,
            max_dist: 1.0,
            increment: 0.5,
            ..Default::default()
        };

        let cases = sweep(&tree, &table, HoldoutKind::ExcludeByDistance, &opt, None).unwrap();
        assert_eq!(cases.len(), 8);

        let first = &cases[0];
        assert_eq!(first.label(), "exclude_tips_by_distance--0--A");
        assert_eq!(first.expected, vec![Some(1.0), Some(0.0)]);
        assert!(!first.table.contains("A"));
        assert!(!first.table.contains("Z"));
        assert_eq!(first.table.len(), 3);
        assert_eq!(first.expected_table().unwrap().len(), 1);

        assert_eq!(cases[4].label(), "exclude_tips_by_distance--0.5--A");

        // The reference tree is never modified
        assert_eq!(tree.to_newick(), ABCD);
    }

    #[test]
    fn test_sweep_randomize_is_reproducible() {
        let tree = abcd();
        let table = table();
        let opt = SweepOpt {
            min_dist: 0.0,
            max_dist: 3.0,
            increment: 1.0,
            seed: 11,
            min_branch_length: None,
        };

        let c1 = sweep(&tree, &table, HoldoutKind::RandomizeByDistance, &opt, None).unwrap();
        let c2 = sweep(&tree, &table, HoldoutKind::RandomizeByDistance, &opt, None).unwrap();
        assert_eq!(c1.len(), 12);
        assert_eq!(c1, c2);
        for case in &c1 {
            assert_eq!(case.table.len(), 4);
        }
    }

    #[test]
    fn test_sweep_limits_and_ranges() {
        let tree = abcd();
        let table = table();
        let opt = SweepOpt {
            min_dist: 0.0,
            max_dist: 1.0,
            increment: 0.5,
            ..Default::default()
        };

        let limit = vec!["C".to_string()];
        let cases =
            sweep(&tree, &table, HoldoutKind::ExcludeByDistance, &opt, Some(&limit)).unwrap();
        assert_eq!(cases.len(), 2);
        assert!(cases.iter().all(|c| c.organism == "C"));

        let limit = vec!["Z".to_string()];
        assert_eq!(
            sweep(&tree, &table, HoldoutKind::ExcludeByDistance, &opt, Some(&limit)),
            Err(TraitError::UnknownOrganism("Z".to_string()))
        );

        let narrow = SweepOpt {
            max_dist: 0.5,
            ..opt.clone()
        };
        assert!(sweep(&tree, &table, HoldoutKind::ExcludeByDistance, &narrow, None)
            .unwrap()
            .is_empty());

        let bad = SweepOpt {
            increment: 0.0,
            ..opt.clone()
        };
        assert!(matches!(
            sweep(&tree, &table, HoldoutKind::ExcludeByDistance, &bad, None),
            Err(TraitError::InvalidRange(_))
        ));
    }

    #[test]
    fn test_sweep_rejects_unresolvable_steps() {
        let tree = abcd();
        let table = table();

        // Consecutive distances would round to the same label
        let tiny = SweepOpt {
            min_dist: 0.0,
            max_dist: 1e-9,
            increment: 1e-12,
            ..Default::default()
        };
        assert!(matches!(
            sweep(&tree, &table, HoldoutKind::ExcludeByDistance, &tiny, None),
            Err(TraitError::InvalidRange(_))
        ));

        let huge = SweepOpt {
            min_dist: 0.0,
            max_dist: 1e12,
            increment: 1e-3,
            ..Default::default()
        };
        assert!(matches!(
            sweep(&tree, &table, HoldoutKind::ExcludeByDistance, &huge, None),
            Err(TraitError::InvalidRange(_))
        ));

        let unbounded = SweepOpt {
            max_dist: f64::INFINITY,
            ..Default::default()
        };
        assert!(matches!(
            sweep(&tree, &table, HoldoutKind::ExcludeByDistance, &unbounded, None),
            Err(TraitError::InvalidRange(_))
        ));
    }

    #[test]
    fn test_holdout_kind_from_str() {
        assert_eq!(
            "exclude".parse::<HoldoutKind>(),
            Ok(HoldoutKind::ExcludeByDistance)
        );
        assert_eq!(
            "randomize_tip_labels_by_distance".parse::<HoldoutKind>(),
            Ok(HoldoutKind::RandomizeByDistance)
        );
        assert_eq!(
            "shuffle".parse::<HoldoutKind>(),
            Err(TraitError::UnknownMethod("shuffle".to_string()))
        );
    }

    #[test]
    fn test_sweep_skips_failed_cases() {
        let tree = abcd();
        let table = table();
        let opt = SweepOpt {
            min_dist: 4.0,
            max_dist: 6.0,
            increment: 1.0,
            ..Default::default()
        };

        // 4.0 removes every tip, 5.0 exceeds the tree's span
        let cases = sweep(&tree, &table, HoldoutKind::ExcludeByDistance, &opt, None).unwrap();
        assert!(cases.is_empty());
    }
}
