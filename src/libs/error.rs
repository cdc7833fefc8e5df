use crate::libs::phylo::TreeError;
use thiserror::Error;

/// Errors raised by the trait prediction and evaluation layers.
///
/// Degenerate-but-valid inputs (empty confusion categories, correlations over
/// too few points) are not errors; they produce sentinel results instead.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TraitError {
    #[error(transparent)]
    Tree(#[from] TreeError),

    // --- parameterization ---
    #[error("Node '{0}' is not a tip")]
    NotATip(String),

    #[error("Removing the requested tips would leave an empty tree")]
    NoTipsLeft,

    #[error("Exclusion distance {distance} exceeds the maximum tip-to-tip distance {max}")]
    DistanceTooLarge { distance: f64, max: f64 },

    #[error("Invalid distance range: {0}")]
    InvalidRange(String),

    #[error("Organism '{0}' is not present in both the tree and the trait table")]
    UnknownOrganism(String),

    #[error("Invalid weight parameter: {0}")]
    InvalidWeight(String),

    #[error("Unknown holdout method '{0}', expected one of: exclude, randomize")]
    UnknownMethod(String),

    #[error("No shared ids between observed and expected tables")]
    NoSharedIds,

    #[error("No shared trait columns between observed and expected tables")]
    NoSharedTraits,

    // --- data inconsistency ---
    #[error("Trait vectors differ in length: {0} vs {1}")]
    ArityMismatch(usize, usize),

    #[error("Unknown success criterion '{0}', expected one of: binary, exact, int_exact")]
    UnknownCriterion(String),

    #[error("Unknown weight function '{0}', expected one of: linear, exponential, equal")]
    UnknownWeight(String),

    #[error("Trait columns differ between tables: {0}")]
    TraitMismatch(String),

    #[error("Node '{0}' not found in tree")]
    NodeNotFound(String),

    #[error("Trait table line {line}: {message}")]
    Table { line: usize, message: String },

    // --- prediction ---
    #[error("No informative neighbors for node '{0}'")]
    NoInformativeNeighbors(String),

    #[error("Weights of all informative neighbors of node '{0}' sum to zero")]
    ZeroTotalWeight(String),
}

pub type Result<T, E = TraitError> = std::result::Result<T, E>;
