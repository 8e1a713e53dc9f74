//! # stockbatch CLI

use std::env;

use clap::Parser;

use crate::cli::Commands;

mod cli;

#[derive(Parser)]
#[command(version = env!("CARGO_PKG_VERSION"))]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[tokio::main]
async fn main() {
    stockbatch::init().await;

    // `@news` is shorthand for `--analyst news`
    let args = env::args().flat_map(|arg| match arg.strip_prefix('@') {
        Some(analyst) => vec!["--analyst".to_string(), analyst.to_string()],
        None => vec![arg],
    });

    let cli = Cli::parse_from(args);
    match &cli.command {
        Commands::Batch(cmd) => {
            cmd.exec().await;
        }
        Commands::Analysts(cmd) => {
            cmd.exec().await;
        }
        Commands::Llm(cmd) => {
            cmd.exec().await;
        }
        Commands::Info(cmd) => {
            cmd.exec().await;
        }
    }
}
