pub mod error;
pub mod evaluate;
pub mod holdout;
pub mod phylo;
pub mod predict;
pub mod stats;
pub mod table;
