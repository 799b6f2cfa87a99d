// ============================================================
// Layer 4 — ML / Kernel Layer
// ============================================================
// Everything that computes the intermediate sublayer lives here.
// Burn types stay inside this layer; the application layer only
// sees them through the IntermediateLayer trait and the type
// alias below.
//
//   config.rs       — BertConfig (Burn Config, JSON save/load)
//   intermediate.rs — reference Burn module + named weight set
//   tensor.rs       — NativeTensor host tensor and exchange handle
//   graph.rs        — op-list IR shared by trace, export, runtime
//   trace.rs        — tracer and traced-graph variant
//   runtime.rs      — graph runtime with parallel/generic executors
//   fused.rs        — fused matmul + bias + GELU kernel
//   activation.rs   — host GELU (erf form)
//   error.rs        — KernelError

pub mod activation;
pub mod config;
pub mod error;
pub mod fused;
pub mod graph;
pub mod intermediate;
pub mod runtime;
pub mod tensor;
pub mod trace;

/// Backend the reference and traced variants run on.
#[cfg(not(feature = "wgpu"))]
pub type ReferenceBackend = burn::backend::NdArray<f32>;

#[cfg(feature = "wgpu")]
pub type ReferenceBackend = burn::backend::Wgpu;
