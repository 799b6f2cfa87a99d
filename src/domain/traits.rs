// ============================================================
// Layer 3 — Core Traits (Abstractions)
// ============================================================
// Every computation variant is "a pure function from an input
// tensor to an output tensor". The tensor types differ between
// variants (Burn tensors for the reference and traced graph,
// host tensors for the runtime and fused kernel), so they are
// associated types rather than a fixed concrete type.
//
// The harness only talks to variants through this trait, which
// is what lets it warm up and time all four the same way.

use anyhow::Result;

use crate::domain::variant::Variant;

// ─── IntermediateLayer ───────────────────────────────────────────────────────
/// One executable rendition of the intermediate sublayer.
///
/// Implementations:
///   - ReferenceLayer      → Burn `BertIntermediate` module
///   - TracedIntermediate  → replay of a recorded op list
///   - PreparedGraph       → graph runtime over an exported file
///   - FusedIntermediate   → fused host kernel
pub trait IntermediateLayer {
    type Input;
    type Output;

    /// Which variant this is, used for labels and error context.
    fn variant(&self) -> Variant;

    /// Run the layer once. Must not mutate any shared state.
    fn call(&self, input: &Self::Input) -> Result<Self::Output>;
}
