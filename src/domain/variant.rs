// ============================================================
// Layer 3 — Computation Variants
// ============================================================
// The same sublayer is built four ways from one weight set.
// They differ only in execution backend:
//
//   Reference    — Burn module (Linear + GELU), assumed correct
//   TracedGraph  — op list recorded from one reference run
//   GraphRuntime — that op list exported to disk and reloaded
//   Accelerated  — fused matmul + bias + GELU kernel

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Variant {
    Reference,
    TracedGraph,
    GraphRuntime,
    Accelerated,
}

impl Variant {
    /// Execution order inside a case.
    pub const ALL: [Variant; 4] = [
        Variant::Reference,
        Variant::TracedGraph,
        Variant::GraphRuntime,
        Variant::Accelerated,
    ];

    /// Label printed in the throughput line and written to the CSV.
    pub fn label(&self) -> &'static str {
        match self {
            Variant::Reference    => "Burn",
            Variant::TracedGraph  => "Traced",
            Variant::GraphRuntime => "Runtime",
            Variant::Accelerated  => "Fused",
        }
    }
}

impl fmt::Display for Variant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}
