// ============================================================
// Layer 4 — Tracer and Traced-Graph Variant
// ============================================================
// trace() executes the reference module once on an example
// input, recording every primitive it performs together with
// the constant tensors it reads. The result is an
// IntermediateGraph that no longer needs the module.
//
// TracedIntermediate replays that op list on Burn tensors of
// the same backend. Replay works on any [batch, seq, hidden]
// input whose hidden size matches; a shape different from the
// traced one is allowed but logged, since the recorded control
// flow is only guaranteed for the traced shape.

use std::collections::HashMap;

use anyhow::Result;
use burn::{prelude::*, tensor::activation};

use crate::domain::{traits::IntermediateLayer, variant::Variant};
use crate::ml::{
    error::KernelError,
    graph::{IntermediateGraph, Op},
    intermediate::{BertIntermediate, DENSE_BIAS, DENSE_WEIGHT},
    tensor::NativeTensor,
};

/// Records ops into a graph while executing them eagerly.
struct Recorder {
    graph: IntermediateGraph,
    next:  usize,
}

impl Recorder {
    fn new(example_shape: Vec<usize>) -> Self {
        Self { graph: IntermediateGraph::new(example_shape, "input"), next: 0 }
    }

    fn fresh(&mut self) -> String {
        let name = format!("%{}", self.next);
        self.next += 1;
        name
    }

    fn matmul<B: Backend>(
        &mut self,
        x:      Tensor<B, 2>,
        name:   &str,
        weight: Tensor<B, 2>,
    ) -> Result<Tensor<B, 2>, KernelError> {
        let output = self.fresh();
        self.graph.ops.push(Op::MatMul {
            input:  self.graph.output.clone(),
            weight: name.to_string(),
            output: output.clone(),
        });
        self.graph.constants.insert(name.to_string(), NativeTensor::from_burn(weight.clone())?);
        self.graph.output = output;
        Ok(x.matmul(weight))
    }

    fn add_bias<B: Backend>(
        &mut self,
        x:    Tensor<B, 2>,
        name: &str,
        bias: Tensor<B, 1>,
    ) -> Result<Tensor<B, 2>, KernelError> {
        let output = self.fresh();
        self.graph.ops.push(Op::AddBias {
            input:  self.graph.output.clone(),
            bias:   name.to_string(),
            output: output.clone(),
        });
        self.graph.constants.insert(name.to_string(), NativeTensor::from_burn(bias.clone())?);
        self.graph.output = output;
        Ok(x + bias.unsqueeze::<2>())
    }

    fn gelu<B: Backend>(&mut self, x: Tensor<B, 2>) -> Tensor<B, 2> {
        let output = self.fresh();
        self.graph.ops.push(Op::Gelu {
            input:  self.graph.output.clone(),
            output: output.clone(),
        });
        self.graph.output = output;
        activation::gelu(x)
    }
}

/// Record one execution of `module` on `example`.
pub fn trace<B: Backend>(
    module:  &BertIntermediate<B>,
    example: Tensor<B, 3>,
) -> Result<IntermediateGraph, KernelError> {
    let [batch, seq, hidden] = example.dims();
    let mut rec = Recorder::new(vec![batch, seq, hidden]);

    let x = example.clone().reshape([batch * seq, hidden]);
    let x = rec.matmul(x, DENSE_WEIGHT, module.weight())?;
    let x = rec.add_bias(x, DENSE_BIAS, module.bias())?;
    let x = rec.gelu(x);

    let width  = x.dims()[1];
    let traced = x.reshape([batch, seq, width]);
    let direct = module.forward(example);
    if traced.dims() != direct.dims() {
        return Err(KernelError::InvalidGraph(format!(
            "traced output {:?} differs from module output {:?}",
            traced.dims(),
            direct.dims(),
        )));
    }

    let graph = rec.graph;
    graph.validate()?;
    tracing::debug!(
        "Traced {} ops on example shape {:?}",
        graph.ops.len(),
        graph.example_shape,
    );
    Ok(graph)
}

enum Constant<B: Backend> {
    Matrix(Tensor<B, 2>),
    Vector(Tensor<B, 1>),
}

/// Replays a recorded graph on Burn tensors.
pub struct TracedIntermediate<B: Backend> {
    ops:           Vec<Op>,
    input:         String,
    output:        String,
    example_shape: Vec<usize>,
    input_width:   usize,
    output_width:  usize,
    constants:     HashMap<String, Constant<B>>,
}

impl<B: Backend> TracedIntermediate<B> {
    pub fn new(graph: &IntermediateGraph, device: &B::Device) -> Result<Self, KernelError> {
        let output_width = graph.validate()?;

        let mut constants = HashMap::new();
        for (name, tensor) in &graph.constants {
            let constant = match tensor.n_dim() {
                2 => Constant::Matrix(tensor.clone().into_burn::<B, 2>(device)?),
                1 => Constant::Vector(tensor.clone().into_burn::<B, 1>(device)?),
                n => return Err(KernelError::dims(format!("constant '{name}' rank"), "1 or 2", n)),
            };
            constants.insert(name.clone(), constant);
        }

        Ok(Self {
            ops: graph.ops.clone(),
            input: graph.input.clone(),
            output: graph.output.clone(),
            example_shape: graph.example_shape.clone(),
            input_width: graph.input_width(),
            output_width,
            constants,
        })
    }

    pub fn forward(&self, input: Tensor<B, 3>) -> Result<Tensor<B, 3>, KernelError> {
        let [batch, seq, hidden] = input.dims();
        if hidden != self.input_width {
            return Err(KernelError::dims("traced graph input width", self.input_width, hidden));
        }
        if self.example_shape != [batch, seq, hidden] {
            tracing::debug!(
                "Replaying trace of {:?} on {:?}",
                self.example_shape,
                [batch, seq, hidden],
            );
        }

        let mut values: HashMap<&str, Tensor<B, 2>> = HashMap::new();
        values.insert(self.input.as_str(), input.reshape([batch * seq, hidden]));

        for op in &self.ops {
            let x = values
                .get(op.input())
                .cloned()
                .ok_or_else(|| KernelError::InvalidGraph(format!("value '{}' undefined", op.input())))?;
            let y = match op {
                Op::MatMul { weight, .. } => match self.constants.get(weight) {
                    Some(Constant::Matrix(w)) => x.matmul(w.clone()),
                    _ => return Err(KernelError::InvalidGraph(format!("'{weight}' is not a matrix"))),
                },
                Op::AddBias { bias, .. } => match self.constants.get(bias) {
                    Some(Constant::Vector(b)) => x + b.clone().unsqueeze::<2>(),
                    _ => return Err(KernelError::InvalidGraph(format!("'{bias}' is not a vector"))),
                },
                Op::Gelu { .. } => activation::gelu(x),
            };
            values.insert(op.output(), y);
        }

        let out = values
            .remove(self.output.as_str())
            .ok_or_else(|| KernelError::InvalidGraph(format!("output '{}' undefined", self.output)))?;
        Ok(out.reshape([batch, seq, self.output_width]))
    }
}

impl<B: Backend> IntermediateLayer for TracedIntermediate<B> {
    type Input  = Tensor<B, 3>;
    type Output = Tensor<B, 3>;

    fn variant(&self) -> Variant {
        Variant::TracedGraph
    }

    fn call(&self, input: &Tensor<B, 3>) -> Result<Tensor<B, 3>> {
        Ok(self.forward(input.clone())?)
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::ml::{config::BertConfig, ReferenceBackend};
    use burn::tensor::Distribution;

    type B = ReferenceBackend;

    fn setup() -> (BertIntermediate<B>, Tensor<B, 3>) {
        let device = Default::default();
        let module = BertConfig::new(100)
            .with_hidden_size(32)
            .with_num_attention_heads(4)
            .with_intermediate_size(128)
            .init_intermediate::<B>(&device);
        let input = Tensor::<B, 3>::random([2, 7, 32], Distribution::Uniform(0.0, 1.0), &device);
        (module, input)
    }

    #[test]
    fn test_trace_records_three_ops() {
        let (module, input) = setup();
        let graph = trace(&module, input).unwrap();
        assert_eq!(graph.example_shape, vec![2, 7, 32]);
        assert_eq!(graph.ops.len(), 3);
        assert!(matches!(graph.ops[0], Op::MatMul { .. }));
        assert!(matches!(graph.ops[1], Op::AddBias { .. }));
        assert!(matches!(graph.ops[2], Op::Gelu { .. }));
        assert_eq!(graph.constants.len(), 2);
        assert_eq!(graph.output, "%2");
    }

    #[test]
    fn test_replay_matches_reference() {
        let (module, input) = setup();
        let graph  = trace(&module, input.clone()).unwrap();
        let traced = TracedIntermediate::<B>::new(&graph, &Default::default()).unwrap();

        let expected = NativeTensor::from_burn(module.forward(input.clone())).unwrap();
        let actual   = NativeTensor::from_burn(traced.forward(input).unwrap()).unwrap();
        assert!(expected.max_abs_diff(&actual).unwrap() < 1e-5);
    }

    #[test]
    fn test_replay_on_other_shape_and_wrong_width() {
        let (module, input) = setup();
        let graph  = trace(&module, input).unwrap();
        let traced = TracedIntermediate::<B>::new(&graph, &Default::default()).unwrap();

        let other = Tensor::<B, 3>::random([1, 3, 32], Distribution::Uniform(0.0, 1.0), &Default::default());
        assert_eq!(traced.forward(other).unwrap().dims(), [1, 3, 128]);

        let wrong = Tensor::<B, 3>::zeros([1, 3, 16], &Default::default());
        assert!(matches!(traced.forward(wrong), Err(KernelError::DimensionMismatch { .. })));
    }
}
