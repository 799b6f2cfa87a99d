// ============================================================
// Layer 3 — Domain Layer
// ============================================================
// Plain Rust types that describe a benchmark run:
// which shapes we test, which variants we compare, how a
// timing measurement turns into a throughput figure, and how
// a failing case is classified.
//
// Rules for this layer:
//   - NO Burn framework types allowed here
//   - NO file I/O
//   - Only plain Rust structs, enums, and traits
//
// Everything that actually computes a tensor lives in Layer 4
// (ml) and plugs in through the IntermediateLayer trait.

/// The (batch, sequence length) table every suite is built from
pub mod shape;

/// The four computation variants and their printed labels
pub mod variant;

/// Wall-clock measurement and throughput derivation
pub mod timing;

/// Core abstraction every variant implements
pub mod traits;

/// Setup / execution / mismatch error taxonomy
pub mod error;
