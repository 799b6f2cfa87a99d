// ============================================================
// Layer 5 — Tokenizer Store
// ============================================================
// Resolves a model identifier (e.g. "bert-base-chinese") to a
// HuggingFace tokenizer.json on disk and reports its vocabulary
// size, which is all the layer configuration needs.
//
// Layout:
//   <root>/<model_id>/tokenizer.json
//
// A missing or unreadable tokenizer is a hard error; the caller
// turns it into a setup failure for the case.

use anyhow::{Context, Result};
use std::path::PathBuf;
use tokenizers::Tokenizer;

pub struct TokenizerStore {
    dir: PathBuf,
}

impl TokenizerStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Path the tokenizer for `model_id` is expected at.
    pub fn path_for(&self, model_id: &str) -> PathBuf {
        self.dir.join(model_id).join("tokenizer.json")
    }

    /// Load the tokenizer for `model_id`.
    pub fn load(&self, model_id: &str) -> Result<Tokenizer> {
        let path = self.path_for(model_id);
        Tokenizer::from_file(&path)
            .map_err(|e| anyhow::anyhow!(
                "Cannot load tokenizer from '{}': {}", path.display(), e
            ))
            .with_context(|| format!("Tokenizer for model '{model_id}' is unavailable"))
    }

    /// Vocabulary size including added special tokens.
    pub fn vocab_size(&self, model_id: &str) -> Result<usize> {
        let tokenizer = self.load(model_id)?;
        let size      = tokenizer.get_vocab_size(true);
        tracing::debug!("Tokenizer '{}' has {} tokens", model_id, size);
        Ok(size)
    }

    /// Write a minimal word-level tokenizer for `model_id` with the
    /// five BERT special tokens followed by `words`.
    #[cfg(test)]
    pub fn write_word_level(&self, model_id: &str, words: &[&str]) -> Result<PathBuf> {
        let path = self.path_for(model_id);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        // Special tokens get fixed IDs matching BERT convention
        let mut vocab = serde_json::json!({
            "[PAD]":  0,
            "[UNK]":  100,
            "[CLS]":  101,
            "[SEP]":  102,
            "[MASK]": 103,
        });
        let mut next_id = 104usize;
        for word in words {
            if vocab.get(*word).is_none() {
                vocab[*word] = serde_json::json!(next_id);
                next_id += 1;
            }
        }

        let tokenizer_json = serde_json::json!({
            "version": "1.0",
            "truncation": null,
            "padding": null,
            "added_tokens": [
                {"id": 0,   "content": "[PAD]",  "single_word": false, "lstrip": false, "rstrip": false, "normalized": false, "special": true},
                {"id": 100, "content": "[UNK]",  "single_word": false, "lstrip": false, "rstrip": false, "normalized": false, "special": true},
                {"id": 101, "content": "[CLS]",  "single_word": false, "lstrip": false, "rstrip": false, "normalized": false, "special": true},
                {"id": 102, "content": "[SEP]",  "single_word": false, "lstrip": false, "rstrip": false, "normalized": false, "special": true},
                {"id": 103, "content": "[MASK]", "single_word": false, "lstrip": false, "rstrip": false, "normalized": false, "special": true}
            ],
            "normalizer": {
                "type": "BertNormalizer",
                "clean_text": true,
                "handle_chinese_chars": true,
                "strip_accents": null,
                "lowercase": true
            },
            "pre_tokenizer": { "type": "Whitespace" },
            "post_processor": null,
            "decoder": null,
            "model": {
                "type": "WordLevel",
                "vocab": vocab,
                "unk_token": "[UNK]"
            }
        });

        std::fs::write(&path, serde_json::to_string_pretty(&tokenizer_json)?)
            .with_context(|| "Cannot write tokenizer JSON")?;
        Ok(path)
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vocab_size_counts_specials_and_words() {
        let dir   = tempfile::tempdir().unwrap();
        let store = TokenizerStore::new(dir.path());
        store.write_word_level("tiny-bert", &["hello", "world", "bert"]).unwrap();
        assert_eq!(store.vocab_size("tiny-bert").unwrap(), 8);
    }

    #[test]
    fn test_missing_tokenizer_is_an_error() {
        let dir   = tempfile::tempdir().unwrap();
        let store = TokenizerStore::new(dir.path());
        let err   = store.vocab_size("bert-base-chinese").unwrap_err();
        assert!(format!("{err:#}").contains("bert-base-chinese"));
    }

    #[test]
    fn test_path_layout() {
        let store = TokenizerStore::new("models");
        assert_eq!(
            store.path_for("bert-base-chinese"),
            PathBuf::from("models/bert-base-chinese/tokenizer.json"),
        );
    }
}
