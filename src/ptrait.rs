extern crate clap;
use clap::*;

mod cmd_ptrait;

fn main() -> anyhow::Result<()> {
    let app = Command::new("ptrait")
        .version(crate_version!())
        .author(crate_authors!())
        .about("`ptrait` - Phylogenetic trait prediction and accuracy evaluation")
        .propagate_version(true)
        .arg_required_else_help(true)
        .color(ColorChoice::Auto)
        .arg(
            Arg::new("verbose")
                .long("verbose")
                .short('v')
                .global(true)
                .action(ArgAction::Count)
                .help("Increase log verbosity (-v info, -vv debug)"),
        )
        .subcommand(cmd_ptrait::holdout::make_subcommand())
        .subcommand(cmd_ptrait::predict::make_subcommand())
        .subcommand(cmd_ptrait::evaluate::make_subcommand())
        .subcommand(cmd_ptrait::nsti::make_subcommand())
        .after_help(
            r###"Subcommands:

* holdout  - Generate test datasets by hiding organisms from a reference tree
* predict  - Predict trait vectors from the nearest informative nodes
* evaluate - Score predicted traits against expected ones
* nsti     - Nearest Sequenced Taxon Index

A typical validation run:
    ptrait holdout tree.nwk traits.tsv --outdir cases
    ptrait predict cases/test_tree--L.nwk cases/test_trait_table--L.tsv -i ORG -o predict--L.tsv
    ptrait evaluate predict--L.tsv cases/exp_traits--L.tsv

"###,
        );

    let matches = app.get_matches();

    let level = match matches.get_count("verbose") {
        0 => log::LevelFilter::Warn,
        1 => log::LevelFilter::Info,
        _ => log::LevelFilter::Debug,
    };
    env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .init();

    match matches.subcommand() {
        Some(("holdout", sub_matches)) => cmd_ptrait::holdout::execute(sub_matches),
        Some(("predict", sub_matches)) => cmd_ptrait::predict::execute(sub_matches),
        Some(("evaluate", sub_matches)) => cmd_ptrait::evaluate::execute(sub_matches),
        Some(("nsti", sub_matches)) => cmd_ptrait::nsti::execute(sub_matches),
        _ => unreachable!(),
    }?;

    Ok(())
}
