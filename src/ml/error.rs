// ============================================================
// Layer 4 — Kernel Errors
// ============================================================
// Typed failures of the host tensor, graph IR, graph runtime
// and fused kernel. The application layer wraps them in
// anyhow and classifies them as setup or execution errors.

use thiserror::Error;

/// Errors raised by the host tensor type, the graph runtime and
/// the fused kernel.
#[derive(Debug, Error, PartialEq)]
pub enum KernelError {
    #[error("dimension mismatch in {context}: expected {expected}, got {actual}")]
    DimensionMismatch {
        context:  String,
        expected: String,
        actual:   String,
    },

    #[error("data type mismatch: requested {requested}, tensor holds {actual}")]
    DataTypeMismatch {
        requested: &'static str,
        actual:    &'static str,
    },

    #[error("shape list must not be empty")]
    EmptyShape,

    #[error("shape {shape:?} needs {expected} elements, buffer has {actual}")]
    BufferSize {
        shape:    Vec<usize>,
        expected: usize,
        actual:   usize,
    },

    #[error("invalid graph: {0}")]
    InvalidGraph(String),

    #[error("tensor conversion failed: {0}")]
    Conversion(String),
}

impl KernelError {
    pub fn dims(
        context:  impl Into<String>,
        expected: impl ToString,
        actual:   impl ToString,
    ) -> Self {
        KernelError::DimensionMismatch {
            context:  context.into(),
            expected: expected.to_string(),
            actual:   actual.to_string(),
        }
    }
}
