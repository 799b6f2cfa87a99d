// ============================================================
// Layer 4 — BERT Layer Configuration
// ============================================================
// Immutable sizing record for the sublayer, derived from a
// tokenizer's vocabulary size. Only hidden_size and
// intermediate_size shape the intermediate layer; the other
// fields are carried so the record round-trips as a complete
// BERT configuration (Burn's Config derive gives us JSON
// save/load and the with_* builders for free).
//
// Defaults are the BERT-base values.

use anyhow::{bail, Result};
use burn::{
    nn::{Linear, LinearConfig},
    prelude::*,
};
use serde::{Deserialize, Serialize};

use crate::ml::intermediate::BertIntermediate;

/// Activation used by the intermediate layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HiddenAct {
    Gelu,
}

// NOTE: #[derive(Config)] already generates Clone and Serialize/Deserialize.
#[derive(Config, Debug, PartialEq)]
pub struct BertConfig {
    pub vocab_size: usize,
    #[config(default = 768)]
    pub hidden_size: usize,
    #[config(default = 12)]
    pub num_hidden_layers: usize,
    #[config(default = 12)]
    pub num_attention_heads: usize,
    #[config(default = 3072)]
    pub intermediate_size: usize,
    #[config(default = "HiddenAct::Gelu")]
    pub hidden_act: HiddenAct,
    #[config(default = 0.1)]
    pub hidden_dropout_prob: f64,
    #[config(default = 0.1)]
    pub attention_probs_dropout_prob: f64,
    #[config(default = 512)]
    pub max_position_embeddings: usize,
    #[config(default = 2)]
    pub type_vocab_size: usize,
    #[config(default = 0.02)]
    pub initializer_range: f64,
    #[config(default = 1e-12)]
    pub layer_norm_eps: f64,
}

impl BertConfig {
    /// Reject configurations no BERT layer could be built from.
    pub fn validate(&self) -> Result<()> {
        if self.vocab_size == 0 {
            bail!("vocab_size must be positive");
        }
        if self.hidden_size == 0 || self.intermediate_size == 0 {
            bail!(
                "hidden_size ({}) and intermediate_size ({}) must be positive",
                self.hidden_size,
                self.intermediate_size,
            );
        }
        if self.num_attention_heads == 0 || self.hidden_size % self.num_attention_heads != 0 {
            bail!(
                "hidden_size ({}) must be divisible by num_attention_heads ({})",
                self.hidden_size,
                self.num_attention_heads,
            );
        }
        Ok(())
    }

    /// Build the reference intermediate sublayer with freshly
    /// initialised weights.
    pub fn init_intermediate<B: Backend>(&self, device: &B::Device) -> BertIntermediate<B> {
        let dense: Linear<B> = LinearConfig::new(self.hidden_size, self.intermediate_size)
            .with_bias(true)
            .init(device);
        BertIntermediate { dense }
    }
}
