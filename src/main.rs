#![recursion_limit = "256"]

mod application;
mod cli;
mod domain;
mod infra;
mod ml;

use anyhow::Result;
use clap::Parser;
use cli::Cli;
use tracing_subscriber::EnvFilter;

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive("bert_intermediate_bench=info".parse()?),
        )
        .init();

    let cli = Cli::parse();
    cli.run()
}
