use anyhow::Context;
use carprice::alias_table::AliasTable;
use carprice::log_sink::init_tracing;
use carprice::training::{load_csv, train, ForestParams, TrainingOptions};
use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[clap(author, version, about = "Fit the price model from a CSV and write the artifact bundle")]
struct Args {
    #[clap(short, long)]
    csv: PathBuf,

    /// Target column; detected from price/selling_price/Price when omitted
    #[clap(short, long)]
    target: Option<String>,

    #[clap(short, long, default_value = "models")]
    out: PathBuf,

    #[clap(long, default_value_t = 0.2)]
    test_size: f64,

    #[clap(long, default_value_t = 42)]
    seed: u64,

    #[clap(long, default_value_t = 100)]
    trees: usize,

    #[clap(long, default_value_t = 12)]
    max_depth: usize,

    #[clap(long, default_value = "info")]
    log_level: String,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_tracing(&args.log_level);

    let aliases = AliasTable::default();
    let data = load_csv(&args.csv, args.target.as_deref(), &aliases)
        .with_context(|| format!("failed to read {}", args.csv.display()))?;

    let options = TrainingOptions {
        test_size: args.test_size,
        seed: args.seed,
        forest: ForestParams {
            n_trees: args.trees,
            max_depth: args.max_depth,
        },
    };
    let bundle = train(&data, &options).context("training failed")?;
    bundle
        .write_to(&args.out)
        .with_context(|| format!("failed to write artifacts to {}", args.out.display()))?;

    let summary = serde_json::json!({
        "rows": data.len(),
        "best_model": bundle.metadata.best_model,
        "metrics": bundle.metadata.metrics,
        "out": args.out.display().to_string(),
    });
    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}
