//! Subcommand implementation modules

pub mod evaluate;
pub mod holdout;
pub mod nsti;
pub mod predict;

use ptrait::libs::phylo::Tree;

/// The first tree of a Newick file
pub fn read_tree(infile: &str) -> anyhow::Result<Tree> {
    let mut trees = Tree::from_file(infile)?;
    if trees.is_empty() {
        anyhow::bail!("No tree found in {}", infile);
    }
    if trees.len() > 1 {
        log::warn!("{} holds {} trees, only the first is used", infile, trees.len());
    }
    Ok(trees.swap_remove(0))
}

/// Set the number of threads for rayon
pub fn init_threads(parallel: usize) -> anyhow::Result<()> {
    rayon::ThreadPoolBuilder::new()
        .num_threads(parallel)
        .build_global()?;
    Ok(())
}
