// ============================================================
// Layer 3 — Harness Error Taxonomy
// ============================================================
// A case can fail in exactly three ways:
//
//   Setup      — missing tokenizer, bad configuration, failed
//                trace / export / graph load
//   Execution  — a variant's call failed during warm-up or
//                inside the timed loop
//   Mismatch   — the accelerated output disagrees with the
//                reference beyond the tolerance
//
// None of them is retried. Each one is terminal for its case
// and is reported individually by the suite runner.

use thiserror::Error;

use crate::domain::variant::Variant;

#[derive(Debug, Error)]
pub enum HarnessError {
    #[error("{case}: setup failed: {source:#}")]
    Setup {
        case: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("{case}: {variant} variant failed: {source:#}")]
    Execution {
        case:    String,
        variant: Variant,
        #[source]
        source:  anyhow::Error,
    },

    #[error("{case}: output shapes differ, reference {reference:?} vs accelerated {accelerated:?}")]
    ShapeMismatch {
        case:        String,
        reference:   Vec<usize>,
        accelerated: Vec<usize>,
    },

    #[error("{case}: numerical mismatch, max |reference - accelerated| = {max_diff:e} (tolerance {tolerance:e})")]
    Mismatch {
        case:      String,
        max_diff:  f32,
        tolerance: f32,
    },
}

impl HarnessError {
    /// True for the assertion-style failures, false for setup and
    /// execution errors.
    pub fn is_assertion(&self) -> bool {
        matches!(self, HarnessError::Mismatch { .. } | HarnessError::ShapeMismatch { .. })
    }

    /// Short tag used in the suite summary.
    pub fn kind(&self) -> &'static str {
        match self {
            HarnessError::Setup { .. }         => "setup",
            HarnessError::Execution { .. }     => "execution",
            HarnessError::ShapeMismatch { .. } => "shape",
            HarnessError::Mismatch { .. }      => "mismatch",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_setup_and_assertion_are_distinct() {
        let setup = HarnessError::Setup {
            case:   "BertIntermediate_1_010".into(),
            source: anyhow::anyhow!("tokenizer missing"),
        };
        let mismatch = HarnessError::Mismatch {
            case:      "BertIntermediate_1_010".into(),
            max_diff:  1e-3,
            tolerance: 1e-5,
        };
        assert!(!setup.is_assertion());
        assert!(mismatch.is_assertion());
        assert_eq!(setup.kind(), "setup");
        assert!(setup.to_string().contains("tokenizer missing"));
        assert!(mismatch.to_string().contains("numerical mismatch"));
    }
}
