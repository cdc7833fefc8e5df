use clap::*;
use ptrait::libs::evaluate::{self, Criterion, Paired, Pool};
use ptrait::libs::table::TraitTable;
use std::io::Write;
use std::path::Path;

// Create clap subcommand arguments
pub fn make_subcommand() -> Command {
    Command::new("evaluate")
        .about("Score predicted traits against expected ones")
        .after_help(
            r###"
Input files come in pairs: a table of predicted (observed) traits followed by
the table of expected traits. Each pair is one trial; values are matched over
shared ids and shared trait names.

Trials are pooled under the key `all`. With --by-distance, trials whose expected
file is named `exp_traits--METHOD--DISTANCE--ORGANISM.tsv` are also pooled under
`METHOD<TAB>DISTANCE`.

Reports (tab-delimited, --tag fields first):
* scatter     - TAG.. KEY observed expected
* correlation - TAG.. KEY method r p
* rates       - TAG.. KEY criterion accuracy sensitivity specificity ppv npv fpr balanced_accuracy
* roc         - TAG.. KEY FPR TPR
* auc         - TAG.. KEY AUC

Undefined correlations are written as NA.

Examples:
1. Correlation of one prediction:
   $ ptrait evaluate predict.tsv expected.tsv

2. ROC curves of a whole sweep:
   $ ptrait evaluate p1.tsv cases/exp_traits--exclude_tips_by_distance--0.1--A.tsv \
       p2.tsv cases/exp_traits--exclude_tips_by_distance--0.1--B.tsv \
       --by-distance --report roc

"###,
        )
        .arg(
            Arg::new("infiles")
                .required(true)
                .num_args(2..)
                .index(1)
                .help("Pairs of predicted and expected trait tables"),
        )
        .arg(
            Arg::new("report")
                .long("report")
                .num_args(1)
                .default_value("correlation")
                .value_parser([
                    builder::PossibleValue::new("scatter"),
                    builder::PossibleValue::new("correlation"),
                    builder::PossibleValue::new("rates"),
                    builder::PossibleValue::new("roc"),
                    builder::PossibleValue::new("auc"),
                ])
                .help("Which lines to write"),
        )
        .arg(
            Arg::new("criterion")
                .long("criterion")
                .short('c')
                .num_args(1)
                .default_value("binary")
                .help("Success criterion: binary, exact or int_exact"),
        )
        .arg(
            Arg::new("by_distance")
                .long("by-distance")
                .action(ArgAction::SetTrue)
                .help("Also pool trials by method and distance parsed from file names"),
        )
        .arg(
            Arg::new("tag")
                .long("tag")
                .short('t')
                .num_args(1)
                .action(ArgAction::Append)
                .help("Metadata field prefixed to every line. Can be given multiple times"),
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
    let infiles: Vec<&String> = args.get_many::<String>("infiles").unwrap().collect();
    if infiles.len() % 2 != 0 {
        anyhow::bail!("Input files must come in predicted/expected pairs");
    }

    let report = args.get_one::<String>("report").unwrap().as_str();
    let criterion: Criterion = args.get_one::<String>("criterion").unwrap().parse()?;
    let is_by_distance = args.get_flag("by_distance");
    let tags: Vec<String> = args
        .get_many::<String>("tag")
        .map(|t| t.cloned().collect())
        .unwrap_or_default();

    //----------------------------
    // Load trials
    //----------------------------
    let mut pool = Pool::new();
    let mut scatter: Vec<(String, Paired)> = vec![];

    let mut trials = 0;
    for pair in infiles.chunks(2) {
        let observed = TraitTable::from_file(pair[0])?;
        let expected = TraitTable::from_file(pair[1])?;
        // Unpairable trials are skipped
        let paired = match Paired::from_tables(&observed, &expected) {
            Ok(paired) => paired,
            Err(e) => {
                log::warn!("Skip {} vs {}: {}", pair[0], pair[1], e);
                continue;
            }
        };
        trials += 1;
        log::debug!("{} vs {}: {} values", pair[0], pair[1], paired.len());

        if is_by_distance {
            if let Some(key) = distance_key(pair[1]) {
                pool.add(&key, paired.clone());
            }
        }
        if report == "scatter" {
            scatter.push(("all".to_string(), paired.clone()));
        }
        pool.add("all", paired);
    }
    if trials == 0 {
        anyhow::bail!("No predicted/expected pair shares ids and trait names");
    }

    //----------------------------
    // Output
    //----------------------------
    let mut writer = intspan::writer(args.get_one::<String>("outfile").unwrap());

    let lines: Vec<String> = match report {
        "scatter" => scatter
            .iter()
            .flat_map(|(key, paired)| evaluate::scatter_lines(&[key.as_str()], paired))
            .collect(),
        "rates" => pool
            .keys()
            .map(|key| {
                let confusion = evaluate::confusion(&pool.pooled(key), criterion);
                let rates = evaluate::rates_from_confusion(&confusion);
                evaluate::rates_line(&[key.as_str()], criterion, &rates)
            })
            .collect(),
        "roc" => pool.roc_lines(criterion),
        "auc" => pool.auc_lines(criterion),
        _ => pool.correlation_lines(),
    };

    for line in lines {
        if tags.is_empty() {
            writer.write_fmt(format_args!("{}\n", line))?;
        } else {
            writer.write_fmt(format_args!("{}\t{}\n", tags.join("\t"), line))?;
        }
    }

    Ok(())
}

/// `exp_traits--METHOD--DISTANCE--ORGANISM.tsv` => `METHOD\tDISTANCE`
fn distance_key(file: &str) -> Option<String> {
    let stem = Path::new(file).file_stem()?.to_str()?;
    let parts: Vec<&str> = stem.split("--").collect();
    match parts.as_slice() {
        [_, method, distance, _] => Some(format!("{}\t{}", method, distance)),
        _ => None,
    }
}
