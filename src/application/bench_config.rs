// ============================================================
// Layer 2 — Benchmark Configuration
// ============================================================
// Everything a run needs, independent of how it was requested
// (CLI flags, a saved JSON file, or a test).
//
// The layer configuration is resolved in this order:
//   1. config_path set → BertConfig::load(config_path)
//   2. otherwise       → vocab size of the tokenizer for model_id
//   then hidden_size / intermediate_size overrides are applied
//   and the result is validated.

use anyhow::{ensure, Context, Result};
use burn::config::Config;
use serde::{Deserialize, Serialize};

use crate::domain::shape::{ShapeCase, DEFAULT_BATCH_SIZES, DEFAULT_SEQ_LENS};
use crate::infra::tokenizer_store::TokenizerStore;
use crate::ml::config::BertConfig;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BenchConfig {
    /// Model identifier, e.g. "bert-base-chinese"
    /// Its tokenizer supplies the vocabulary size
    pub model_id: String,

    /// Directory holding <model_id>/tokenizer.json
    pub tokenizer_dir: String,

    /// Saved BertConfig JSON. When set, no tokenizer is read
    pub config_path: Option<String>,

    /// Override for hidden_size (768 for BERT-base)
    pub hidden_size: Option<usize>,

    /// Override for intermediate_size (3072 for BERT-base)
    pub intermediate_size: Option<usize>,

    /// Batch sizes, crossed with seq_lens batch-major
    pub batch_sizes: Vec<usize>,

    pub seq_lens: Vec<usize>,

    /// Timed calls per variant, after one warm-up call
    pub iterations: usize,

    /// Upper bound (exclusive) on max |reference - fused|
    pub tolerance: f32,

    /// Where the shape-keyed graph files are written
    pub export_dir: String,

    /// Where results.csv is appended; no CSV when None
    pub results_dir: Option<String>,
}

impl Default for BenchConfig {
    fn default() -> Self {
        Self {
            model_id:          "bert-base-chinese".to_string(),
            tokenizer_dir:     "models".to_string(),
            config_path:       None,
            hidden_size:       None,
            intermediate_size: None,
            batch_sizes:       DEFAULT_BATCH_SIZES.to_vec(),
            seq_lens:          DEFAULT_SEQ_LENS.to_vec(),
            iterations:        100,
            tolerance:         1e-5,
            export_dir:        ".".to_string(),
            results_dir:       None,
        }
    }
}

impl BenchConfig {
    /// Check the run parameters themselves (not the layer config).
    pub fn validate(&self) -> Result<()> {
        ensure!(self.iterations > 0, "iterations must be at least 1");
        ensure!(
            self.tolerance.is_finite() && self.tolerance > 0.0,
            "tolerance must be a positive finite number, got {}",
            self.tolerance,
        );
        ensure!(!self.batch_sizes.is_empty(), "no batch sizes given");
        ensure!(!self.seq_lens.is_empty(), "no sequence lengths given");
        if let Some(bad) = self.shapes().into_iter().find(|s| !s.is_valid()) {
            anyhow::bail!("shape {} has a zero dimension", bad);
        }
        Ok(())
    }

    /// Batch-major cartesian product of the configured sizes.
    pub fn shapes(&self) -> Vec<ShapeCase> {
        ShapeCase::grid(&self.batch_sizes, &self.seq_lens)
    }

    /// Resolve and validate the BERT layer configuration.
    pub fn layer_config(&self) -> Result<BertConfig> {
        let base = match &self.config_path {
            Some(path) => BertConfig::load(path)
                .map_err(|e| anyhow::anyhow!("{e}"))
                .with_context(|| format!("Cannot load layer config '{path}'"))?,
            None => {
                let vocab_size = TokenizerStore::new(&self.tokenizer_dir)
                    .vocab_size(&self.model_id)?;
                BertConfig::new(vocab_size)
            }
        };

        let mut cfg = base;
        if let Some(h) = self.hidden_size {
            cfg = cfg.with_hidden_size(h);
        }
        if let Some(i) = self.intermediate_size {
            cfg = cfg.with_intermediate_size(i);
        }
        cfg.validate()?;
        Ok(cfg)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_covers_the_fixed_grid() {
        let cfg = BenchConfig::default();
        assert_eq!(cfg.shapes().len(), 14);
        assert_eq!(cfg.iterations, 100);
        assert_eq!(cfg.tolerance, 1e-5);
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_bad_parameters() {
        let cfg = BenchConfig { iterations: 0, ..BenchConfig::default() };
        assert!(cfg.validate().is_err());

        let cfg = BenchConfig { tolerance: f32::NAN, ..BenchConfig::default() };
        assert!(cfg.validate().is_err());

        let cfg = BenchConfig { seq_lens: vec![10, 0], ..BenchConfig::default() };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_layer_config_from_tokenizer_with_overrides() {
        let dir   = tempfile::tempdir().unwrap();
        let store = TokenizerStore::new(dir.path());
        store.write_word_level("tiny", &["a", "b", "c", "d"]).unwrap();

        let cfg = BenchConfig {
            model_id:          "tiny".into(),
            tokenizer_dir:     dir.path().display().to_string(),
            hidden_size:       Some(48),
            intermediate_size: Some(192),
            ..BenchConfig::default()
        };
        let layer = cfg.layer_config().unwrap();
        assert_eq!(layer.vocab_size, 9);
        assert_eq!(layer.hidden_size, 48);
        assert_eq!(layer.intermediate_size, 192);
    }

    #[test]
    fn test_layer_config_from_file_skips_tokenizer() {
        let dir  = tempfile::tempdir().unwrap();
        let path = dir.path().join("bert.json");
        BertConfig::new(321).save(&path).unwrap();

        let cfg = BenchConfig {
            tokenizer_dir: dir.path().join("does-not-exist").display().to_string(),
            config_path:   Some(path.display().to_string()),
            ..BenchConfig::default()
        };
        assert_eq!(cfg.layer_config().unwrap().vocab_size, 321);
    }

    #[test]
    fn test_missing_tokenizer_fails_layer_config() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = BenchConfig {
            tokenizer_dir: dir.path().display().to_string(),
            ..BenchConfig::default()
        };
        assert!(cfg.layer_config().is_err());
    }
}
