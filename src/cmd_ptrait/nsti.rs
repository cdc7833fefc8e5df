use clap::*;
use ptrait::libs::predict::{self, Annotations};
use ptrait::libs::table::TraitTable;
use std::io::Write;

// Create clap subcommand arguments
pub fn make_subcommand() -> Command {
    Command::new("nsti")
        .about("Nearest Sequenced Taxon Index")
        .after_help(
            r###"
For each tip, the patristic distance to the nearest tip with observed traits.
An annotated tip scores 0 unless --no-self is given.

Output is `id<TAB>NSTI` per tip, followed by a `#mean` line.

Examples:
1. All tips:
   $ ptrait nsti tree.nwk traits.tsv

2. Selected tips, each ignoring its own traits:
   $ ptrait nsti tree.nwk traits.tsv -i Homo -i Pan --no-self

"###,
        )
        .arg(
            Arg::new("tree")
                .required(true)
                .num_args(1)
                .index(1)
                .help("Tree in Newick format. [stdin] for standard input"),
        )
        .arg(
            Arg::new("traits")
                .required(true)
                .num_args(1)
                .index(2)
                .help("Tab-delimited trait table of observed tips"),
        )
        .arg(
            Arg::new("id")
                .long("id")
                .short('i')
                .num_args(1)
                .action(ArgAction::Append)
                .help("Tip to score. Can be given multiple times"),
        )
        .arg(
            Arg::new("no_self")
                .long("no-self")
                .action(ArgAction::SetTrue)
                .help("Ignore each tip's own traits"),
        )
        .arg(
            Arg::new("outfile")
                .short('o')
                .long("outfile")
                .num_args(1)
                .default_value("stdout")
                .help("Output filename. [stdout] for screen"),
        )
}

// command implementation
pub fn execute(args: &ArgMatches) -> anyhow::Result<()> {
    let mut writer = intspan::writer(args.get_one::<String>("outfile").unwrap());

    let tree = super::read_tree(args.get_one::<String>("tree").unwrap())?;
    let observed = TraitTable::from_file(args.get_one::<String>("traits").unwrap())?;
    let annotations = Annotations::from_tables(&tree, &[&observed])?;

    let ids: Vec<String> = match args.get_many::<String>("id") {
        Some(ids) => ids.cloned().collect(),
        None => tree.get_leaf_names(),
    };

    let result = predict::nsti(&tree, &annotations, &ids, !args.get_flag("no_self"))?;

    for (id, value) in &result.values {
        writer.write_fmt(format_args!("{}\t{}\n", id, value))?;
    }
    writer.write_fmt(format_args!("#mean\t{}\n", result.mean))?;

    Ok(())
}
