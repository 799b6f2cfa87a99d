// ============================================================
// Layer 5 — Infrastructure Layer
// ============================================================
// File-system concerns shared by the other layers:
//
//   tokenizer_store.rs — resolves a model id to tokenizer.json
//                        and reports its vocabulary size
//
//   graph_export.rs    — writes / reads the exchange file the
//                        graph runtime executes; file names are
//                        keyed by shape
//
//   metrics.rs         — appends throughput rows to a CSV file

/// Tokenizer loading and vocabulary size lookup
pub mod tokenizer_store;

/// Graph exchange file writer / reader
pub mod graph_export;

/// Throughput CSV logger
pub mod metrics;
