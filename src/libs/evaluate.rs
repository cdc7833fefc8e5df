//! Scoring predicted trait tables against expected ones.
//!
//! Tables are first flattened into parallel value series ([`Paired`]) over
//! shared ids and shared trait columns. Everything downstream works on these.

use crate::libs::error::{Result, TraitError};
use crate::libs::stats::{self, Correlation};
use crate::libs::table::TraitTable;
use indexmap::IndexMap;
use itertools::Itertools;
use std::str::FromStr;

/// Added to every confusion category before a rate is formed.
pub const PSEUDOCOUNT: f64 = 1e-4;

/// Decides whether a predicted value counts as a hit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Criterion {
    /// Presence means a value of at least 1
    Binary,
    Exact,
    /// Both sides rounded to the nearest integer, then exact
    IntExact,
}

impl Criterion {
    pub fn name(&self) -> &'static str {
        match self {
            Criterion::Binary => "binary",
            Criterion::Exact => "exact",
            Criterion::IntExact => "int_exact",
        }
    }
}

impl FromStr for Criterion {
    type Err = TraitError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "binary" => Ok(Criterion::Binary),
            "exact" => Ok(Criterion::Exact),
            "int_exact" => Ok(Criterion::IntExact),
            _ => Err(TraitError::UnknownCriterion(s.to_string())),
        }
    }
}

//----------------------------
// Pairing
//----------------------------

/// Parallel observed/expected value series.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Paired {
    pub observed: Vec<f64>,
    pub expected: Vec<f64>,
}

impl Paired {
    pub fn new(observed: Vec<f64>, expected: Vec<f64>) -> Result<Self> {
        if observed.len() != expected.len() {
            return Err(TraitError::ArityMismatch(observed.len(), expected.len()));
        }
        Ok(Self { observed, expected })
    }

    /// Flatten two tables over their shared ids (observed order) and shared
    /// trait names. Cells unknown on either side are skipped.
    pub fn from_tables(observed: &TraitTable, expected: &TraitTable) -> Result<Self> {
        let ids = observed
            .ids()
            .filter(|id| expected.contains(id))
            .collect::<Vec<_>>();
        if ids.is_empty() {
            return Err(TraitError::NoSharedIds);
        }

        let columns = observed
            .trait_names()
            .iter()
            .enumerate()
            .filter_map(|(i, name)| {
                expected
                    .trait_names()
                    .iter()
                    .position(|e| e == name)
                    .map(|j| (i, j))
            })
            .collect::<Vec<_>>();
        if columns.is_empty() {
            return Err(TraitError::NoSharedTraits);
        }

        let mut paired = Self::default();
        for id in ids {
            let (Some(obs), Some(exp)) = (observed.get(id), expected.get(id)) else {
                continue;
            };
            for &(i, j) in &columns {
                if let (Some(o), Some(e)) = (obs[i], exp[j]) {
                    paired.observed.push(o);
                    paired.expected.push(e);
                }
            }
        }
        Ok(paired)
    }

    pub fn len(&self) -> usize {
        self.observed.len()
    }

    pub fn is_empty(&self) -> bool {
        self.observed.is_empty()
    }

    pub fn extend(&mut self, other: &Paired) {
        self.observed.extend_from_slice(&other.observed);
        self.expected.extend_from_slice(&other.expected);
    }

    pub fn iter(&self) -> impl Iterator<Item = (f64, f64)> + '_ {
        self.observed.iter().copied().zip(self.expected.iter().copied())
    }
}

//----------------------------
// Correlation
//----------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct CorrelationReport {
    pub paired: Paired,
    pub pearson: Option<Correlation>,
    pub spearman: Option<Correlation>,
}

/// Pearson and Spearman correlation of two tables over their shared cells.
/// Either coefficient is `None` when undefined (too few points or a constant series).
pub fn correlate(observed: &TraitTable, expected: &TraitTable) -> Result<CorrelationReport> {
    Ok(correlate_paired(Paired::from_tables(observed, expected)?))
}

pub fn correlate_paired(paired: Paired) -> CorrelationReport {
    let pearson = stats::pearson(&paired.observed, &paired.expected);
    let spearman = stats::spearman(&paired.observed, &paired.expected);
    CorrelationReport {
        paired,
        pearson,
        spearman,
    }
}

//----------------------------
// Confusion matrix
//----------------------------

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Confusion {
    pub tp: usize,
    pub fp: usize,
    pub fn_: usize,
    pub tn: usize,
}

/// Classify every observed/expected value pair.
///
/// With exact criteria a match is a true negative if the expected value is 0 and
/// a true positive otherwise; over-prediction is a false positive, under-prediction
/// a false negative.
pub fn confusion(paired: &Paired, criterion: Criterion) -> Confusion {
    let mut c = Confusion::default();
    for (o, e) in paired.iter() {
        match criterion {
            Criterion::Binary => match (o >= 1.0, e >= 1.0) {
                (true, true) => c.tp += 1,
                (true, false) => c.fp += 1,
                (false, true) => c.fn_ += 1,
                (false, false) => c.tn += 1,
            },
            Criterion::Exact => c.classify_exact(o, e),
            Criterion::IntExact => c.classify_exact(o.round(), e.round()),
        }
    }
    c
}

impl Confusion {
    fn classify_exact(&mut self, o: f64, e: f64) {
        if o == e {
            if e == 0.0 {
                self.tn += 1;
            } else {
                self.tp += 1;
            }
        } else if o > e {
            self.fp += 1;
        } else {
            self.fn_ += 1;
        }
    }
}

/// Classification rates, each within [0, 1].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rates {
    pub accuracy: f64,
    pub sensitivity: f64,
    pub specificity: f64,
    pub positive_predictive_value: f64,
    pub negative_predictive_value: f64,
    pub false_positive_rate: f64,
    pub balanced_accuracy: f64,
}

/// Rates from pseudo-counted categories, so empty categories never divide by zero.
pub fn rates_from_confusion(c: &Confusion) -> Rates {
    let tp = c.tp as f64 + PSEUDOCOUNT;
    let fp = c.fp as f64 + PSEUDOCOUNT;
    let fn_ = c.fn_ as f64 + PSEUDOCOUNT;
    let tn = c.tn as f64 + PSEUDOCOUNT;

    let sensitivity = tp / (tp + fn_);
    let specificity = tn / (tn + fp);
    Rates {
        accuracy: (tp + tn) / (tp + fp + fn_ + tn),
        sensitivity,
        specificity,
        positive_predictive_value: tp / (tp + fp),
        negative_predictive_value: tn / (tn + fn_),
        false_positive_rate: fp / (fp + tn),
        balanced_accuracy: (sensitivity + specificity) / 2.0,
    }
}

//----------------------------
// ROC
//----------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct Roc {
    /// (FPR, TPR), sorted by FPR, one point per FPR
    pub points: Vec<(f64, f64)>,
    pub auc: f64,
}

/// One ROC point per trial, then the curve and its area.
pub fn roc(trials: &[Paired], criterion: Criterion) -> Roc {
    let points = trials
        .iter()
        .map(|t| {
            let rates = rates_from_confusion(&confusion(t, criterion));
            (rates.false_positive_rate, rates.sensitivity)
        })
        .collect::<Vec<_>>();
    roc_from_points(&points)
}

/// Merge points sharing an FPR by averaging their TPR, anchor the curve at
/// (0,0) and (1,1) when it falls short of either edge, and integrate.
pub fn roc_from_points(points: &[(f64, f64)]) -> Roc {
    let mut sorted = points.to_vec();
    sorted.sort_by(|a, b| a.0.total_cmp(&b.0));

    let mut merged: Vec<(f64, f64)> = Vec::with_capacity(sorted.len() + 2);
    let mut i = 0;
    while i < sorted.len() {
        let x = sorted[i].0;
        let mut j = i;
        while j < sorted.len() && sorted[j].0 == x {
            j += 1;
        }
        let mean_y = sorted[i..j].iter().map(|p| p.1).sum::<f64>() / (j - i) as f64;
        merged.push((x, mean_y));
        i = j;
    }

    if merged.first().map_or(true, |p| p.0 > 0.0) {
        merged.insert(0, (0.0, 0.0));
    }
    if merged.last().map_or(true, |p| p.0 < 1.0) {
        merged.push((1.0, 1.0));
    }

    let auc = merged
        .iter()
        .tuple_windows()
        .map(|(a, b)| (b.0 - a.0) * (a.1 + b.1) / 2.0)
        .sum::<f64>();

    Roc {
        points: merged,
        auc,
    }
}

//----------------------------
// Pooling
//----------------------------

/// Trials grouped under string keys, e.g. `all` or `method\tdistance`.
#[derive(Debug, Clone, Default)]
pub struct Pool {
    groups: IndexMap<String, Vec<Paired>>,
}

impl Pool {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, key: &str, trial: Paired) {
        self.groups.entry(key.to_string()).or_default().push(trial);
    }

    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.groups.keys()
    }

    pub fn trials(&self, key: &str) -> &[Paired] {
        self.groups.get(key).map(|v| v.as_slice()).unwrap_or_default()
    }

    /// All trials of a group concatenated into one series.
    pub fn pooled(&self, key: &str) -> Paired {
        let mut all = Paired::default();
        for trial in self.trials(key) {
            all.extend(trial);
        }
        all
    }

    pub fn correlation_lines(&self) -> Vec<String> {
        self.keys()
            .flat_map(|key| {
                let report = correlate_paired(self.pooled(key));
                correlation_lines(&[key.as_str()], &report)
            })
            .collect()
    }

    pub fn roc_lines(&self, criterion: Criterion) -> Vec<String> {
        self.keys()
            .flat_map(|key| roc_lines(&[key.as_str()], &roc(self.trials(key), criterion)))
            .collect()
    }

    pub fn auc_lines(&self, criterion: Criterion) -> Vec<String> {
        self.keys()
            .map(|key| auc_line(key, roc(self.trials(key), criterion).auc))
            .collect()
    }
}

//----------------------------
// Report lines
//----------------------------

fn with_meta(meta: &[&str], fields: &[String]) -> String {
    meta.iter()
        .map(|s| s.to_string())
        .chain(fields.iter().cloned())
        .join("\t")
}

fn format_correlation(c: &Option<Correlation>) -> [String; 2] {
    match c {
        Some(c) => [c.r.to_string(), c.p.to_string()],
        None => ["NA".to_string(), "NA".to_string()],
    }
}

/// `meta... observed expected`
pub fn scatter_lines(meta: &[&str], paired: &Paired) -> Vec<String> {
    paired
        .iter()
        .map(|(o, e)| with_meta(meta, &[o.to_string(), e.to_string()]))
        .collect()
}

/// `meta... method r p`, one line each for pearson and spearman
pub fn correlation_lines(meta: &[&str], report: &CorrelationReport) -> Vec<String> {
    [("pearson", &report.pearson), ("spearman", &report.spearman)]
        .iter()
        .map(|(method, c)| {
            let [r, p] = format_correlation(c);
            with_meta(meta, &[method.to_string(), r, p])
        })
        .collect()
}

/// `meta... FPR TPR`
pub fn roc_lines(meta: &[&str], roc: &Roc) -> Vec<String> {
    roc.points
        .iter()
        .map(|(x, y)| with_meta(meta, &[x.to_string(), y.to_string()]))
        .collect()
}

/// `key AUC`
pub fn auc_line(key: &str, auc: f64) -> String {
    format!("{}\t{}", key, auc)
}

/// `meta... criterion accuracy sensitivity specificity ppv npv fpr balanced_accuracy`
pub fn rates_line(meta: &[&str], criterion: Criterion, rates: &Rates) -> String {
    let fields = [
        rates.accuracy,
        rates.sensitivity,
        rates.specificity,
        rates.positive_predictive_value,
        rates.negative_predictive_value,
        rates.false_positive_rate,
        rates.balanced_accuracy,
    ];
    let mut all = vec![criterion.name().to_string()];
    all.extend(fields.iter().map(|f| format!("{:.4}", f)));
    with_meta(meta, &all)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn paired(o: &[f64], e: &[f64]) -> Paired {
        Paired::new(o.to_vec(), e.to_vec()).unwrap()
    }

    #[test]
    fn test_criterion_from_str() {
        assert_eq!("binary".parse::<Criterion>().unwrap(), Criterion::Binary);
        assert_eq!("int_exact".parse::<Criterion>().unwrap(), Criterion::IntExact);
        assert_eq!(
            "fuzzy".parse::<Criterion>(),
            Err(TraitError::UnknownCriterion("fuzzy".to_string()))
        );
    }

    #[test]
    fn test_confusion_binary() {
        let p = paired(&[1.0, 0.0, 1.0, 1.0], &[1.0, 0.0, 0.0, 1.0]);
        assert_eq!(
            confusion(&p, Criterion::Binary),
            Confusion {
                tp: 2,
                fp: 1,
                fn_: 0,
                tn: 1
            }
        );
    }

    #[test]
    fn test_confusion_exact() {
        let p = paired(&[2.0, 0.0, 3.0, 1.0, 2.4], &[2.0, 0.0, 1.0, 2.0, 2.0]);
        assert_eq!(
            confusion(&p, Criterion::Exact),
            Confusion {
                tp: 1,
                fp: 2,
                fn_: 1,
                tn: 1
            }
        );
        // 2.4 rounds to 2
        assert_eq!(
            confusion(&p, Criterion::IntExact),
            Confusion {
                tp: 2,
                fp: 1,
                fn_: 1,
                tn: 1
            }
        );
    }

    #[test]
    fn test_rates_bounded() {
        let rates = rates_from_confusion(&Confusion::default());
        for r in [
            rates.accuracy,
            rates.sensitivity,
            rates.specificity,
            rates.positive_predictive_value,
            rates.negative_predictive_value,
            rates.false_positive_rate,
            rates.balanced_accuracy,
        ] {
            assert!(r.is_finite());
            assert!((0.0..=1.0).contains(&r));
        }

        let rates = rates_from_confusion(&Confusion {
            tp: 2,
            fp: 1,
            fn_: 0,
            tn: 1,
        });
        assert_abs_diff_eq!(rates.accuracy, 0.75, epsilon = 1e-3);
        assert_abs_diff_eq!(rates.sensitivity, 1.0, epsilon = 1e-3);
        assert_abs_diff_eq!(rates.specificity, 0.5, epsilon = 1e-3);
        assert_abs_diff_eq!(rates.false_positive_rate, 0.5, epsilon = 1e-3);
        assert_abs_diff_eq!(rates.positive_predictive_value, 2.0 / 3.0, epsilon = 1e-3);
    }

    #[test]
    fn test_roc_trivial_curve() {
        let roc = roc_from_points(&[(0.0, 0.0), (1.0, 1.0)]);
        assert_eq!(roc.auc, 0.5);

        let roc = roc_from_points(&[]);
        assert_eq!(roc.points, vec![(0.0, 0.0), (1.0, 1.0)]);
        assert_eq!(roc.auc, 0.5);
    }

    #[test]
    fn test_roc_merges_and_anchors() {
        let roc = roc_from_points(&[(0.5, 1.0), (0.5, 0.5), (0.0, 0.5)]);
        assert_eq!(roc.points, vec![(0.0, 0.5), (0.5, 0.75), (1.0, 1.0)]);
        // 0.5 * (0.5 + 0.75) / 2 + 0.5 * (0.75 + 1.0) / 2
        assert_abs_diff_eq!(roc.auc, 0.75, epsilon = 1e-12);
    }

    #[test]
    fn test_roc_from_trials() {
        let perfect = paired(&[1.0, 0.0, 1.0, 0.0], &[1.0, 0.0, 1.0, 0.0]);
        let roc = roc(&[perfect], Criterion::Binary);
        assert_eq!(roc.points.first(), Some(&(0.0, 0.0)));
        assert_eq!(roc.points.last(), Some(&(1.0, 1.0)));
        assert!(roc.auc > 0.99);
    }

    #[test]
    fn test_paired_from_tables() {
        let obs = TraitTable::parse("id\tK1\tK2\tK3\nA\t1\t2\t9\nB\t3\tNA\t9\nZ\t0\t0\t0\n").unwrap();
        let exp = TraitTable::parse("id\tK2\tK1\nB\t4\t5\nA\t6\t7\n").unwrap();

        let p = Paired::from_tables(&obs, &exp).unwrap();
        assert_eq!(p.observed, vec![1.0, 2.0, 3.0]);
        assert_eq!(p.expected, vec![7.0, 6.0, 5.0]);

        let other = TraitTable::parse("id\tK1\nQ\t1\n").unwrap();
        assert_eq!(
            Paired::from_tables(&obs, &other),
            Err(TraitError::NoSharedIds)
        );
        let other = TraitTable::parse("id\tK9\nA\t1\n").unwrap();
        assert_eq!(
            Paired::from_tables(&obs, &other),
            Err(TraitError::NoSharedTraits)
        );
    }

    #[test]
    fn test_correlate() {
        let obs = TraitTable::parse("id\tK1\tK2\nA\t1\t2\nB\t3\t4\n").unwrap();
        let exp = TraitTable::parse("id\tK1\tK2\nA\t2\t4\nB\t6\t8\n").unwrap();
        let report = correlate(&obs, &exp).unwrap();
        assert_abs_diff_eq!(report.pearson.unwrap().r, 1.0, epsilon = 1e-12);
        assert!(report.spearman.unwrap().r < 1.0);

        let exp = TraitTable::parse("id\tK1\nA\t1\nB\t2\n").unwrap();
        let report = correlate(&obs, &exp).unwrap();
        assert!(report.pearson.is_none());
        assert_eq!(
            correlation_lines(&["m", "0.1"], &report),
            vec!["m\t0.1\tpearson\tNA\tNA", "m\t0.1\tspearman\tNA\tNA"]
        );
    }

    #[test]
    fn test_pool() {
        let mut pool = Pool::new();
        pool.add("all", paired(&[1.0, 0.0], &[1.0, 0.0]));
        pool.add("all", paired(&[1.0, 1.0], &[1.0, 0.0]));
        pool.add("other", paired(&[0.0], &[0.0]));

        assert_eq!(pool.keys().collect::<Vec<_>>(), vec!["all", "other"]);
        assert_eq!(pool.trials("all").len(), 2);
        assert_eq!(pool.pooled("all").len(), 4);
        assert!(pool.trials("missing").is_empty());

        let auc = pool.auc_lines(Criterion::Binary);
        assert_eq!(auc.len(), 2);
        assert!(auc[0].starts_with("all\t"));

        assert_eq!(pool.correlation_lines().len(), 4);
    }

    #[test]
    fn test_report_lines() {
        let p = paired(&[1.0, 2.5], &[1.0, 3.0]);
        assert_eq!(
            scatter_lines(&["exclude", "0.1"], &p),
            vec!["exclude\t0.1\t1\t1", "exclude\t0.1\t2.5\t3"]
        );
        assert_eq!(auc_line("all", 0.5), "all\t0.5");

        let roc = roc_from_points(&[]);
        assert_eq!(roc_lines(&["all"], &roc), vec!["all\t0\t0", "all\t1\t1"]);
    }
}
