use carprice::cli::{run, Cli};
use clap::Parser;
use std::process::exit;

fn main() {
    let cli = Cli::parse();
    if let Err(e) = run(cli) {
        eprintln!("Error: {e:#}");
        exit(1);
    }
}
