use clap::*;
use ptrait::libs::holdout::{self, HoldoutKind, SweepOpt};
use ptrait::libs::table::TraitTable;
use std::io::Write;
use std::path::Path;

// Create clap subcommand arguments
pub fn make_subcommand() -> Command {
    Command::new("holdout")
        .about("Generate test datasets by hiding organisms from a reference tree")
        .after_help(
            r###"
Every organism present in both the tree and the trait table is hidden in turn,
at every distance in [min-dist, max-dist) stepped by increment.

Methods:
* exclude   - remove the organism and every tip within the distance
              (at distance 0 only the organism itself is removed)
* randomize - shuffle the labels of the organism and its neighbors within the distance

Three files are written into --outdir per test case, where LABEL is
`method--distance--organism`:
* test_tree--LABEL.nwk          the altered tree
* test_trait_table--LABEL.tsv   traits of the tips left in the altered tree
* exp_traits--LABEL.tsv         the hidden organism's own traits

Case labels are printed to --outfile.

Examples:
1. Exclusion sweep over all organisms:
   $ ptrait holdout tree.nwk traits.tsv --outdir cases

2. Randomization of two organisms at coarse steps:
   $ ptrait holdout tree.nwk traits.tsv -m randomize --increment 0.1 -i Homo -i Pan

"###,
        )
        .arg(
            Arg::new("tree")
                .required(true)
                .num_args(1)
                .index(1)
                .help("Reference tree in Newick format. [stdin] for standard input"),
        )
        .arg(
            Arg::new("traits")
                .required(true)
                .num_args(1)
                .index(2)
                .help("Tab-delimited trait table of the tips"),
        )
        .arg(
            Arg::new("method")
                .long("method")
                .short('m')
                .num_args(1)
                .default_value("exclude")
                .value_parser([
                    builder::PossibleValue::new("exclude"),
                    builder::PossibleValue::new("randomize"),
                ])
                .help("How organisms are hidden"),
        )
        .arg(
            Arg::new("min_dist")
                .long("min-dist")
                .num_args(1)
                .default_value("0")
                .value_parser(value_parser!(f64))
                .help("First distance of the sweep"),
        )
        .arg(
            Arg::new("max_dist")
                .long("max-dist")
                .num_args(1)
                .default_value("0.4")
                .value_parser(value_parser!(f64))
                .help("Distances stay below this value"),
        )
        .arg(
            Arg::new("increment")
                .long("increment")
                .num_args(1)
                .default_value("0.02")
                .value_parser(value_parser!(f64))
                .help("Step between distances"),
        )
        .arg(
            Arg::new("id")
                .long("id")
                .short('i')
                .num_args(1)
                .action(ArgAction::Append)
                .help("Only hide this organism. Can be given multiple times"),
        )
        .arg(
            Arg::new("min_branch_length")
                .long("min-branch-length")
                .num_args(1)
                .value_parser(value_parser!(f64))
                .help("Floor every branch of the test trees to this length"),
        )
        .arg(
            Arg::new("seed")
                .long("seed")
                .num_args(1)
                .default_value("42")
                .value_parser(value_parser!(u64))
                .help("Random seed for label shuffling"),
        )
        .arg(
            Arg::new("outdir")
                .long("outdir")
                .short('d')
                .num_args(1)
                .default_value(".")
                .help("Output directory"),
        )
        .arg(
            Arg::new("parallel")
                .long("parallel")
                .short('p')
                .num_args(1)
                .default_value("1")
                .value_parser(value_parser!(usize))
                .help("Number of threads for parallel processing"),
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
    //----------------------------
    // Args
    //----------------------------
    let kind: HoldoutKind = args.get_one::<String>("method").unwrap().parse()?;
    let opt = SweepOpt {
        min_dist: *args.get_one::<f64>("min_dist").unwrap(),
        max_dist: *args.get_one::<f64>("max_dist").unwrap(),
        increment: *args.get_one::<f64>("increment").unwrap(),
        seed: *args.get_one::<u64>("seed").unwrap(),
        min_branch_length: args.get_one::<f64>("min_branch_length").copied(),
    };
    let limit_to: Option<Vec<String>> = args
        .get_many::<String>("id")
        .map(|ids| ids.cloned().collect());

    let outdir = Path::new(args.get_one::<String>("outdir").unwrap());
    super::init_threads(*args.get_one::<usize>("parallel").unwrap())?;

    let tree = super::read_tree(args.get_one::<String>("tree").unwrap())?;
    let table = TraitTable::from_file(args.get_one::<String>("traits").unwrap())?;

    //----------------------------
    // Operating
    //----------------------------
    let cases = holdout::sweep(&tree, &table, kind, &opt, limit_to.as_deref())?;

    //----------------------------
    // Output
    //----------------------------
    std::fs::create_dir_all(outdir)?;
    let mut writer = intspan::writer(args.get_one::<String>("outfile").unwrap());

    for case in &cases {
        let label = case.label();
        let path = |prefix: &str, ext: &str| {
            outdir
                .join(format!("{}--{}.{}", prefix, label, ext))
                .to_string_lossy()
                .to_string()
        };

        let mut tree_writer = intspan::writer(&path("test_tree", "nwk"));
        tree_writer.write_fmt(format_args!("{}\n", case.tree.to_newick()))?;
        case.table.write(&path("test_trait_table", "tsv"))?;
        case.expected_table()?.write(&path("exp_traits", "tsv"))?;

        writer.write_fmt(format_args!("{}\n", label))?;
    }
    log::info!("{} test cases written to {}", cases.len(), outdir.display());

    Ok(())
}
