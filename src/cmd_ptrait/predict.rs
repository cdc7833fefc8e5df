use clap::*;
use indexmap::IndexMap;
use ptrait::libs::predict::{self, Annotations, Weight};
use ptrait::libs::table::{format_value, TraitTable, TraitVector};
use std::io::Write;

// Create clap subcommand arguments
pub fn make_subcommand() -> Command {
    Command::new("predict")
        .about("Predict trait vectors from the nearest informative nodes")
        .after_help(
            r###"
Observed tip traits come from <traits>. Traits of internal nodes, as produced by
an ancestral state reconstruction tool, can be supplied with --reconstruction.
Rows are matched to tree nodes by name.

Methods:
* weighted - average of the nearest informative ancestor and the informative
             siblings, weighted by branch distance (default)
* nearest  - copy the nearest other annotated tip
* random   - copy a random other annotated tip (negative control)

Weights (weighted method only):
* linear      - (max_d - d) / max_d, floored at 0; max_d > 0
* exponential - base ^ -d; base >= 1
* equal       - 1

Without --id, every tip lacking observed traits is predicted.

Examples:
1. Predict unannotated tips:
   $ ptrait predict tree.nwk traits.tsv -r ancestors.tsv

2. Validate one hidden organism, ignoring its own values:
   $ ptrait predict tree.nwk traits.tsv -i Homo --no-self --round

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
            Arg::new("reconstruction")
                .long("reconstruction")
                .short('r')
                .num_args(1)
                .help("Tab-delimited trait table of internal nodes"),
        )
        .arg(
            Arg::new("id")
                .long("id")
                .short('i')
                .num_args(1)
                .action(ArgAction::Append)
                .help("Node to predict. Can be given multiple times"),
        )
        .arg(
            Arg::new("method")
                .long("method")
                .num_args(1)
                .default_value("weighted")
                .value_parser([
                    builder::PossibleValue::new("weighted"),
                    builder::PossibleValue::new("nearest"),
                    builder::PossibleValue::new("random"),
                ])
                .help("Prediction method"),
        )
        .arg(
            Arg::new("weight")
                .long("weight")
                .short('w')
                .num_args(1)
                .default_value("exponential")
                .value_parser([
                    builder::PossibleValue::new("linear"),
                    builder::PossibleValue::new("exponential"),
                    builder::PossibleValue::new("equal"),
                ])
                .help("Weight function of the weighted method"),
        )
        .arg(
            Arg::new("max_d")
                .long("max-d")
                .num_args(1)
                .default_value("1.0")
                .value_parser(value_parser!(f64))
                .help("Distance at which the linear weight drops to 0"),
        )
        .arg(
            Arg::new("base")
                .long("base")
                .num_args(1)
                .default_value("2.0")
                .value_parser(value_parser!(f64))
                .help("Base of the exponential weight"),
        )
        .arg(
            Arg::new("no_self")
                .long("no-self")
                .action(ArgAction::SetTrue)
                .help("Ignore each node's own annotation while predicting it"),
        )
        .arg(
            Arg::new("round")
                .long("round")
                .action(ArgAction::SetTrue)
                .help("Round predictions to non-negative integers"),
        )
        .arg(
            Arg::new("nsti")
                .long("nsti")
                .action(ArgAction::SetTrue)
                .help("Append an NSTI column"),
        )
        .arg(
            Arg::new("seed")
                .long("seed")
                .num_args(1)
                .default_value("42")
                .value_parser(value_parser!(u64))
                .help("Random seed of the random method"),
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
    let weight = Weight::from_name(
        args.get_one::<String>("weight").unwrap(),
        *args.get_one::<f64>("max_d").unwrap(),
        *args.get_one::<f64>("base").unwrap(),
    )?;
    let method = args.get_one::<String>("method").unwrap().as_str();
    let use_self = !args.get_flag("no_self");
    let is_round = args.get_flag("round");
    let is_nsti = args.get_flag("nsti");
    let seed = *args.get_one::<u64>("seed").unwrap();

    super::init_threads(*args.get_one::<usize>("parallel").unwrap())?;

    let tree = super::read_tree(args.get_one::<String>("tree").unwrap())?;
    let observed = TraitTable::from_file(args.get_one::<String>("traits").unwrap())?;
    let reconstruction = match args.get_one::<String>("reconstruction") {
        Some(file) => Some(TraitTable::from_file(file)?),
        None => None,
    };

    let mut tables = vec![&observed];
    if let Some(r) = reconstruction.as_ref() {
        tables.push(r);
    }
    let annotations = Annotations::from_tables(&tree, &tables)?;

    let ids: Vec<String> = match args.get_many::<String>("id") {
        Some(ids) => ids.cloned().collect(),
        None => tree
            .get_leaf_names()
            .into_iter()
            .filter(|name| !observed.contains(name))
            .collect(),
    };
    log::info!(
        "{} annotated nodes, {} nodes to predict",
        annotations.len(),
        ids.len()
    );

    //----------------------------
    // Operating
    //----------------------------
    let predictions: IndexMap<String, TraitVector> = match method {
        "nearest" => predict::predict_nearest_neighbor(&tree, &annotations, &ids)?,
        "random" => predict::predict_random_neighbor(&tree, &annotations, &ids, seed)?,
        _ => predict::predict_many(&tree, &annotations, &ids, &weight, use_self)?,
    };

    let nsti = if is_nsti {
        Some(predict::nsti(&tree, &annotations, &ids, use_self)?)
    } else {
        None
    };

    //----------------------------
    // Output
    //----------------------------
    let mut writer = intspan::writer(args.get_one::<String>("outfile").unwrap());

    let mut header = observed.header().to_vec();
    if is_nsti {
        header.push("NSTI".to_string());
    }
    writer.write_fmt(format_args!("{}\n", header.join("\t")))?;

    for (id, values) in &predictions {
        let values = if is_round {
            predict::round_prediction(values, 0.0)
        } else {
            values.clone()
        };
        let mut fields: Vec<String> = vec![id.clone()];
        fields.extend(values.iter().map(|v| format_value(*v)));
        if let Some(n) = nsti.as_ref() {
            fields.push(format_value(n.values.get(id).copied()));
        }
        writer.write_fmt(format_args!("{}\n", fields.join("\t")))?;
    }

    if let Some(n) = nsti.as_ref() {
        log::info!("Mean NSTI: {}", n.mean);
    }

    Ok(())
}
