// ============================================================
// Layer 4 — Intermediate Graph IR
// ============================================================
// The recorded form of one reference forward pass. It is what
// the tracer produces, what the traced variant replays, and
// what gets written to the exchange file for the runtime.
//
//   input ──MatMul(dense.weight)──▶ %0
//         ──AddBias(dense.bias)──▶  %1
//         ──Gelu──────────────────▶ %2 = output
//
// Values are 2-D [rows, width]; the leading dimensions of the
// input are folded into rows and restored after execution.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

use crate::ml::{error::KernelError, tensor::NativeTensor};

pub const GRAPH_FORMAT_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Op {
    /// `output = input · constants[weight]`
    MatMul { input: String, weight: String, output: String },
    /// `output = input + constants[bias]` broadcast over rows
    AddBias { input: String, bias: String, output: String },
    /// `output = gelu(input)`
    Gelu { input: String, output: String },
}

impl Op {
    pub fn input(&self) -> &str {
        match self {
            Op::MatMul { input, .. } | Op::AddBias { input, .. } | Op::Gelu { input, .. } => input,
        }
    }

    pub fn output(&self) -> &str {
        match self {
            Op::MatMul { output, .. } | Op::AddBias { output, .. } | Op::Gelu { output, .. } => output,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntermediateGraph {
    pub version:       u32,
    /// Shape of the input the graph was recorded with.
    pub example_shape: Vec<usize>,
    pub input:         String,
    pub output:        String,
    pub ops:           Vec<Op>,
    pub constants:     BTreeMap<String, NativeTensor>,
}

impl IntermediateGraph {
    pub fn new(example_shape: Vec<usize>, input: impl Into<String>) -> Self {
        let input = input.into();
        Self {
            version: GRAPH_FORMAT_VERSION,
            example_shape,
            output: input.clone(),
            input,
            ops: Vec::new(),
            constants: BTreeMap::new(),
        }
    }

    /// Width of the innermost input dimension.
    pub fn input_width(&self) -> usize {
        self.example_shape.last().copied().unwrap_or(0)
    }

    pub fn constant(&self, name: &str) -> Result<&NativeTensor, KernelError> {
        self.constants
            .get(name)
            .ok_or_else(|| KernelError::InvalidGraph(format!("constant '{name}' is missing")))
    }

    /// Check that every value is defined before use, every constant
    /// exists with a compatible shape, and the output is produced.
    /// Returns the output width.
    pub fn validate(&self) -> Result<usize, KernelError> {
        if self.version != GRAPH_FORMAT_VERSION {
            return Err(KernelError::InvalidGraph(format!(
                "unsupported format version {} (expected {})",
                self.version, GRAPH_FORMAT_VERSION,
            )));
        }
        if self.example_shape.is_empty() || self.input_width() == 0 {
            return Err(KernelError::InvalidGraph("input shape is empty".into()));
        }

        let mut widths: HashMap<&str, usize> = HashMap::new();
        widths.insert(self.input.as_str(), self.input_width());

        for op in &self.ops {
            let width = *widths.get(op.input()).ok_or_else(|| {
                KernelError::InvalidGraph(format!("value '{}' used before definition", op.input()))
            })?;
            let out_width = match op {
                Op::MatMul { weight, .. } => {
                    let w = self.constant(weight)?;
                    w.data::<f32>()?;
                    if w.n_dim() != 2 || w.shape()[0] != width || w.shape()[1] == 0 {
                        return Err(KernelError::dims(
                            format!("MatMul weight '{weight}'"),
                            format!("[{width}, _]"),
                            format!("{:?}", w.shape()),
                        ));
                    }
                    w.shape()[1]
                }
                Op::AddBias { bias, .. } => {
                    let b = self.constant(bias)?;
                    b.data::<f32>()?;
                    if b.shape() != [width] {
                        return Err(KernelError::dims(
                            format!("AddBias bias '{bias}'"),
                            format!("[{width}]"),
                            format!("{:?}", b.shape()),
                        ));
                    }
                    width
                }
                Op::Gelu { .. } => width,
            };
            widths.insert(op.output(), out_width);
        }

        widths.get(self.output.as_str()).copied().ok_or_else(|| {
            KernelError::InvalidGraph(format!("output '{}' is never produced", self.output))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tiny_graph() -> IntermediateGraph {
        let mut g = IntermediateGraph::new(vec![1, 2, 3], "input");
        g.constants.insert(
            "w".into(),
            NativeTensor::from_vec(vec![3, 4], vec![0.0f32; 12]).unwrap(),
        );
        g.constants.insert(
            "b".into(),
            NativeTensor::from_vec(vec![4], vec![0.0f32; 4]).unwrap(),
        );
        g.ops.push(Op::MatMul  { input: "input".into(), weight: "w".into(), output: "%0".into() });
        g.ops.push(Op::AddBias { input: "%0".into(),    bias:   "b".into(), output: "%1".into() });
        g.ops.push(Op::Gelu    { input: "%1".into(),    output: "%2".into() });
        g.output = "%2".into();
        g
    }

    #[test]
    fn test_valid_graph_reports_output_width() {
        assert_eq!(tiny_graph().validate().unwrap(), 4);
    }

    #[test]
    fn test_missing_constant_is_invalid() {
        let mut g = tiny_graph();
        g.constants.remove("b");
        assert!(matches!(g.validate(), Err(KernelError::InvalidGraph(_))));
    }

    #[test]
    fn test_weight_rows_must_match_input_width() {
        let mut g = tiny_graph();
        g.example_shape = vec![1, 2, 5];
        assert!(matches!(g.validate(), Err(KernelError::DimensionMismatch { .. })));
    }

    #[test]
    fn test_unknown_value_and_version_are_rejected() {
        let mut g = tiny_graph();
        g.ops[1] = Op::AddBias { input: "%9".into(), bias: "b".into(), output: "%1".into() };
        assert!(g.validate().is_err());

        let mut g = tiny_graph();
        g.version = 99;
        assert!(g.validate().is_err());
    }
}
