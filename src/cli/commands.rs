// ============================================================
// Layer 1 — CLI Commands and Arguments
// ============================================================
// Three subcommands:
//
//   run     — benchmark and verify the shape grid (or a subset)
//   export  — write the traced graph file for one shape
//   config  — print (and optionally save) the derived BERT
//             layer configuration
//
// All of them share the layer flags in `LayerArgs`.

use clap::{Args, Subcommand};

use crate::application::bench_config::BenchConfig;

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Benchmark the four variants and verify the fused kernel
    Run(RunArgs),

    /// Trace the reference layer for one shape and write the graph file
    Export(ExportArgs),

    /// Print the BERT layer configuration the benchmark would use
    Config(ConfigArgs),
}

/// Where the layer configuration comes from.
#[derive(Args, Debug, Clone)]
pub struct LayerArgs {
    /// Model identifier; its tokenizer supplies the vocabulary size
    #[arg(long, default_value = "bert-base-chinese")]
    pub model_id: String,

    /// Directory holding <model-id>/tokenizer.json
    #[arg(long, default_value = "models")]
    pub tokenizer_dir: String,

    /// Saved BertConfig JSON; when given, no tokenizer is read
    #[arg(long)]
    pub config: Option<String>,

    /// Override the hidden size (must stay divisible by the head count)
    #[arg(long)]
    pub hidden_size: Option<usize>,

    /// Override the intermediate size
    #[arg(long)]
    pub intermediate_size: Option<usize>,
}

#[derive(Args, Debug)]
pub struct RunArgs {
    /// Batch size to run; repeat for several. Default: 1 and 2
    #[arg(long = "batch")]
    pub batch: Vec<usize>,

    /// Sequence length to run; repeat for several.
    /// Default: 10 20 40 60 80 100 120
    #[arg(long = "seq-len")]
    pub seq_len: Vec<usize>,

    /// Timed calls per variant
    #[arg(long, default_value_t = 100)]
    pub iterations: usize,

    /// Maximum allowed |reference - fused|
    #[arg(long, default_value_t = 1e-5)]
    pub tolerance: f32,

    /// Directory the graph files are written to
    #[arg(long, default_value = ".")]
    pub export_dir: String,

    /// Append throughput rows to <results-dir>/results.csv
    #[arg(long)]
    pub results_dir: Option<String>,

    #[command(flatten)]
    pub layer: LayerArgs,
}

/// Application config from the layer flags alone, every run
/// parameter left at its default.
impl From<LayerArgs> for BenchConfig {
    fn from(a: LayerArgs) -> Self {
        BenchConfig {
            model_id:          a.model_id,
            tokenizer_dir:     a.tokenizer_dir,
            config_path:       a.config,
            hidden_size:       a.hidden_size,
            intermediate_size: a.intermediate_size,
            ..BenchConfig::default()
        }
    }
}

impl From<RunArgs> for BenchConfig {
    fn from(a: RunArgs) -> Self {
        let defaults = BenchConfig::from(a.layer);
        BenchConfig {
            batch_sizes: if a.batch.is_empty()   { defaults.batch_sizes.clone() } else { a.batch },
            seq_lens:    if a.seq_len.is_empty() { defaults.seq_lens.clone() }    else { a.seq_len },
            iterations:  a.iterations,
            tolerance:   a.tolerance,
            export_dir:  a.export_dir,
            results_dir: a.results_dir,
            ..defaults
        }
    }
}

#[derive(Args, Debug)]
pub struct ExportArgs {
    #[arg(long)]
    pub batch: usize,

    #[arg(long = "seq-len")]
    pub seq_len: usize,

    /// Output file. Default: <export-dir>/bert-intermediate-<b>-<seq>.graph
    #[arg(long)]
    pub out: Option<String>,

    #[arg(long, default_value = ".")]
    pub export_dir: String,

    #[command(flatten)]
    pub layer: LayerArgs,
}

#[derive(Args, Debug)]
pub struct ConfigArgs {
    /// Also write the configuration to this JSON file
    #[arg(long)]
    pub save: Option<String>,

    #[command(flatten)]
    pub layer: LayerArgs,
}
