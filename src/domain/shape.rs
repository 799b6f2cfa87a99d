// ============================================================
// Layer 3 — Shape Parameters
// ============================================================
// A benchmark case is identified by its input shape.
// The hidden dimension comes from the layer configuration,
// so a case only carries (batch_size, seq_len).
//
// The default grid is the cartesian product
//   batch_size ∈ {1, 2}
//   seq_len    ∈ {10, 20, 40, 60, 80, 100, 120}
// expanded batch-major, i.e. (1,10), (1,20), ... (2,120).

use serde::{Deserialize, Serialize};
use std::fmt;

pub const DEFAULT_BATCH_SIZES: [usize; 2] = [1, 2];
pub const DEFAULT_SEQ_LENS:    [usize; 7] = [10, 20, 40, 60, 80, 100, 120];

/// Input shape of one benchmark case: `[batch_size, seq_len, hidden]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ShapeCase {
    pub batch_size: usize,
    pub seq_len:    usize,
}

impl ShapeCase {
    pub fn new(batch_size: usize, seq_len: usize) -> Self {
        Self { batch_size, seq_len }
    }

    /// Both dimensions must be positive for a case to be runnable.
    pub fn is_valid(&self) -> bool {
        self.batch_size > 0 && self.seq_len > 0
    }

    /// Stable, unique name of the test unit for this shape,
    /// e.g. `BertIntermediate_2_040`.
    pub fn name(&self) -> String {
        format!("BertIntermediate_{}_{:03}", self.batch_size, self.seq_len)
    }

    /// Number of token rows the layer processes for this shape.
    pub fn rows(&self) -> usize {
        self.batch_size * self.seq_len
    }

    /// Expand two lists into the batch-major cartesian product.
    pub fn grid(batch_sizes: &[usize], seq_lens: &[usize]) -> Vec<ShapeCase> {
        batch_sizes
            .iter()
            .flat_map(|&b| seq_lens.iter().map(move |&s| ShapeCase::new(b, s)))
            .collect()
    }
}

/// Formats as `(batch,seq)` with the sequence length zero-padded,
/// which is the form used in the throughput lines.
impl fmt::Display for ShapeCase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({},{:03})", self.batch_size, self.seq_len)
    }
}
