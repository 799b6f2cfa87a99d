// ============================================================
// Layer 1 — CLI / Presentation Layer
// ============================================================
// Parses arguments with clap and routes each subcommand to
// Layer 2. Nothing here touches tensors.
//
// Exit status: `run` returns an error (non-zero exit) when any
// case failed, after every case has had its turn.

pub mod commands;

use std::path::PathBuf;

use anyhow::{Context, Result};
use burn::config::Config;
use clap::Parser;
use commands::{Commands, ConfigArgs, ExportArgs, RunArgs};

use crate::application::{bench_case::BenchCase, bench_config::BenchConfig, suite::BenchSuite};
use crate::domain::shape::ShapeCase;

#[derive(Parser, Debug)]
#[command(
    name = "bert-intermediate-bench",
    version,
    about = "Benchmark and verify four implementations of the BERT intermediate sublayer."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    pub fn run(self) -> Result<()> {
        match self.command {
            Commands::Run(args)    => run_suite(args),
            Commands::Export(args) => run_export(args),
            Commands::Config(args) => run_config(args),
        }
    }
}

fn run_suite(args: RunArgs) -> Result<()> {
    let suite   = BenchSuite::build(args.into())?;
    let summary = suite.run()?;

    for (_, outcome) in &summary.outcomes {
        if let Ok(report) = outcome {
            println!("PASSED {report}");
        }
    }

    if !summary.all_passed() {
        for e in summary.failures() {
            let tag = if e.is_assertion() { "FAILED" } else { "ERROR" };
            eprintln!("{tag} [{}] {}", e.kind(), e);
        }
        anyhow::bail!("{} of {} cases failed", summary.failed(), summary.outcomes.len());
    }
    println!("All {} cases passed.", summary.passed());
    Ok(())
}

fn run_export(args: ExportArgs) -> Result<()> {
    let shape = ShapeCase::new(args.batch, args.seq_len);
    anyhow::ensure!(shape.is_valid(), "shape {} has a zero dimension", shape);

    let config = BenchConfig {
        export_dir: args.export_dir,
        ..BenchConfig::from(args.layer)
    };
    let path = BenchCase::new(shape, config).export_graph(args.out.map(PathBuf::from))?;
    println!("Graph for {} written to {}", shape, path.display());
    Ok(())
}

fn run_config(args: ConfigArgs) -> Result<()> {
    let layer = BenchConfig::from(args.layer).layer_config()?;
    println!("{}", serde_json::to_string_pretty(&layer)?);

    if let Some(path) = args.save {
        layer
            .save(&path)
            .map_err(|e| anyhow::anyhow!("{e}"))
            .with_context(|| format!("Cannot save layer config to '{path}'"))?;
        tracing::info!("Layer config saved to '{}'", path);
    }
    Ok(())
}
