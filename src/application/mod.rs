// ============================================================
// Layer 2 — Application
// ============================================================
// Orchestrates the other layers into a benchmark run.
//
// Rules for this layer:
//   - No ML math here (that's Layer 4)
//   - No argument parsing (that's Layer 1)
//   - Only workflow: build the cases, run them, classify
//     and summarise the outcomes
//
// The one exception to "no printing" is the throughput line,
// which is the harness's actual output and is written by
// bench_case as each variant finishes.

// Run parameters and layer config resolution
pub mod bench_config;

// One (batch, seq_len) case: setup, timing, verification
pub mod bench_case;

// The explicit case list and the failure-isolating runner
pub mod suite;
