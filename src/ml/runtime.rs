// ============================================================
// Layer 4 — Graph Runtime
// ============================================================
// Executes an exported IntermediateGraph on host buffers,
// independent of Burn. Two executors are available:
//
//   Parallel — rows are split across the rayon thread pool
//   Generic  — plain single-threaded loops
//
// Callers ask supports_device() first and fall back to Generic,
// the same way an inference runtime is asked for an optimised
// backend before settling for the default CPU one.

use std::{fmt, path::Path};

use anyhow::{Context, Result};
use rayon::prelude::*;

use crate::domain::{traits::IntermediateLayer, variant::Variant};
use crate::infra::graph_export;
use crate::ml::{
    activation::gelu_inplace,
    error::KernelError,
    graph::{IntermediateGraph, Op},
    tensor::NativeTensor,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecDevice {
    Parallel,
    Generic,
}

impl fmt::Display for ExecDevice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExecDevice::Parallel => f.write_str("parallel"),
            ExecDevice::Generic  => f.write_str("generic"),
        }
    }
}

pub struct GraphRuntime;

impl GraphRuntime {
    /// Whether the runtime can execute on `device` in this process.
    pub fn supports_device(device: ExecDevice) -> bool {
        match device {
            ExecDevice::Parallel => rayon::current_num_threads() > 1,
            ExecDevice::Generic  => true,
        }
    }

    /// Best supported device.
    pub fn preferred_device() -> ExecDevice {
        if Self::supports_device(ExecDevice::Parallel) {
            ExecDevice::Parallel
        } else {
            ExecDevice::Generic
        }
    }

    /// Load an exported graph file and prepare it for execution.
    pub fn prepare(path: &Path, device: ExecDevice) -> Result<PreparedGraph> {
        let graph = graph_export::load(path)
            .with_context(|| format!("Cannot load graph '{}'", path.display()))?;
        let prepared = PreparedGraph::new(graph, device)?;
        tracing::debug!(
            "Prepared graph '{}' on {} executor ({} ops)",
            path.display(),
            device,
            prepared.graph.ops.len(),
        );
        Ok(prepared)
    }
}

/// A validated graph bound to one executor.
#[derive(Debug)]
pub struct PreparedGraph {
    graph:        IntermediateGraph,
    device:       ExecDevice,
    output_width: usize,
}

impl PreparedGraph {
    pub fn new(graph: IntermediateGraph, device: ExecDevice) -> Result<Self, KernelError> {
        let output_width = graph.validate()?;
        Ok(Self { graph, device, output_width })
    }

    pub fn device(&self) -> ExecDevice {
        self.device
    }

    pub fn run(&self, input: &NativeTensor) -> Result<NativeTensor, KernelError> {
        let width = input.last_dim();
        if width != self.graph.input_width() {
            return Err(KernelError::dims("graph input width", self.graph.input_width(), width));
        }
        let rows = input.numel() / width;

        let mut current_name = self.graph.input.as_str();
        let mut current      = input.data::<f32>()?.to_vec();
        let mut cur_width    = width;

        for op in &self.graph.ops {
            if op.input() != current_name {
                return Err(KernelError::InvalidGraph(format!(
                    "runtime executes straight-line graphs; '{}' expected '{}'",
                    op.input(),
                    current_name,
                )));
            }
            match op {
                Op::MatMul { weight, .. } => {
                    let w = self.graph.constant(weight)?;
                    let n = w.shape()[1];
                    current   = self.matmul(&current, rows, cur_width, w.data::<f32>()?, n);
                    cur_width = n;
                }
                Op::AddBias { bias, .. } => {
                    let b = self.graph.constant(bias)?.data::<f32>()?;
                    self.add_bias(&mut current, b);
                }
                Op::Gelu { .. } => self.gelu(&mut current, cur_width),
            }
            current_name = op.output();
        }

        let mut shape = input.shape().to_vec();
        if let Some(last) = shape.last_mut() {
            *last = self.output_width;
        }
        NativeTensor::from_vec(shape, current)
    }

    fn matmul(&self, x: &[f32], rows: usize, k: usize, w: &[f32], n: usize) -> Vec<f32> {
        let mut out = vec![0.0f32; rows * n];
        let row_kernel = |(o, xr): (&mut [f32], &[f32])| {
            for (kk, &a) in xr.iter().enumerate() {
                let wr = &w[kk * n..(kk + 1) * n];
                for (oj, &wj) in o.iter_mut().zip(wr) {
                    *oj += a * wj;
                }
            }
        };
        match self.device {
            ExecDevice::Parallel => out
                .par_chunks_mut(n)
                .zip(x.par_chunks(k))
                .for_each(row_kernel),
            ExecDevice::Generic => out
                .chunks_mut(n)
                .zip(x.chunks(k))
                .for_each(row_kernel),
        }
        out
    }

    fn add_bias(&self, x: &mut [f32], bias: &[f32]) {
        let n = bias.len();
        let add = |row: &mut [f32]| {
            for (v, &b) in row.iter_mut().zip(bias) {
                *v += b;
            }
        };
        match self.device {
            ExecDevice::Parallel => x.par_chunks_mut(n).for_each(add),
            ExecDevice::Generic  => x.chunks_mut(n).for_each(add),
        }
    }

    fn gelu(&self, x: &mut [f32], width: usize) {
        match self.device {
            ExecDevice::Parallel => x.par_chunks_mut(width).for_each(gelu_inplace),
            ExecDevice::Generic  => gelu_inplace(x),
        }
    }
}

impl IntermediateLayer for PreparedGraph {
    type Input  = NativeTensor;
    type Output = NativeTensor;

    fn variant(&self) -> Variant {
        Variant::GraphRuntime
    }

    fn call(&self, input: &NativeTensor) -> Result<NativeTensor> {
        Ok(self.run(input)?)
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::ml::{config::BertConfig, trace::trace, ReferenceBackend};
    use burn::{prelude::*, tensor::Distribution};

    type B = ReferenceBackend;

    fn traced_graph() -> (IntermediateGraph, NativeTensor, NativeTensor) {
        let device = Default::default();
        let module = BertConfig::new(100)
            .with_hidden_size(32)
            .with_num_attention_heads(4)
            .with_intermediate_size(96)
            .init_intermediate::<B>(&device);
        let input    = Tensor::<B, 3>::random([2, 9, 32], Distribution::Uniform(0.0, 1.0), &device);
        let graph    = trace(&module, input.clone()).unwrap();
        let expected = NativeTensor::from_burn(module.forward(input.clone())).unwrap();
        let native   = NativeTensor::from_burn(input).unwrap();
        (graph, native, expected)
    }

    #[test]
    fn test_generic_device_is_always_supported() {
        assert!(GraphRuntime::supports_device(ExecDevice::Generic));
        let preferred = GraphRuntime::preferred_device();
        assert!(GraphRuntime::supports_device(preferred));
    }

    #[test]
    fn test_both_executors_match_reference() {
        let (graph, input, expected) = traced_graph();
        for device in [ExecDevice::Generic, ExecDevice::Parallel] {
            let prepared = PreparedGraph::new(graph.clone(), device).unwrap();
            let output   = prepared.run(&input).unwrap();
            assert_eq!(output.shape(), &[2, 9, 96]);
            assert!(output.max_abs_diff(&expected).unwrap() < 1e-5, "{device} executor drifted");
        }
    }

    #[test]
    fn test_prepare_from_exported_file() {
        let (graph, input, expected) = traced_graph();
        let dir  = tempfile::tempdir().unwrap();
        let path = dir.path().join("layer.graph");
        graph_export::save(&graph, &path).unwrap();

        let prepared = GraphRuntime::prepare(&path, ExecDevice::Generic).unwrap();
        assert_eq!(prepared.device(), ExecDevice::Generic);
        let output = prepared.call(&input).unwrap();
        assert!(output.max_abs_diff(&expected).unwrap() < 1e-5);
    }

    #[test]
    fn test_wrong_input_width_is_rejected() {
        let (graph, _, _) = traced_graph();
        let prepared = PreparedGraph::new(graph, ExecDevice::Generic).unwrap();
        let input = NativeTensor::zeros(vec![1, 4, 31]).unwrap();
        assert!(matches!(prepared.run(&input), Err(KernelError::DimensionMismatch { .. })));
    }

    #[test]
    fn test_prepare_missing_file_fails() {
        let dir = tempfile::tempdir().unwrap();
        assert!(GraphRuntime::prepare(&dir.path().join("absent.graph"), ExecDevice::Generic).is_err());
    }
}
