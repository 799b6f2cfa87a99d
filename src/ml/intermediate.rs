// ============================================================
// Layer 4 — Reference Intermediate Sublayer (Burn)
// ============================================================
// The framework-native implementation every other variant is
// checked against:
//
//   output = gelu(input · W + b)
//   input  [batch, seq_len, hidden_size]
//   W      [hidden_size, intermediate_size]   (Burn Linear layout)
//   b      [intermediate_size]
//   output [batch, seq_len, intermediate_size]
//
// The reference backend has no autodiff, so running it never
// records gradients: this is the "evaluation mode" of the layer.

use std::collections::BTreeMap;

use anyhow::{Context, Result};
use burn::{nn::Linear, prelude::*, tensor::activation};

use crate::domain::{traits::IntermediateLayer, variant::Variant};
use crate::ml::{error::KernelError, tensor::NativeTensor};

pub const DENSE_WEIGHT: &str = "dense.weight";
pub const DENSE_BIAS:   &str = "dense.bias";

#[derive(Module, Debug)]
pub struct BertIntermediate<B: Backend> {
    pub dense: Linear<B>,
}

impl<B: Backend> BertIntermediate<B> {
    /// [batch, seq_len, hidden] → [batch, seq_len, intermediate]
    pub fn forward(&self, input: Tensor<B, 3>) -> Tensor<B, 3> {
        activation::gelu(self.dense.forward(input))
    }

    pub fn hidden_size(&self) -> usize {
        self.dense.weight.val().dims()[0]
    }

    pub fn intermediate_size(&self) -> usize {
        self.dense.weight.val().dims()[1]
    }

    /// Dense weight `[hidden, intermediate]`.
    pub fn weight(&self) -> Tensor<B, 2> {
        self.dense.weight.val()
    }

    /// Dense bias `[intermediate]`. A layer built without bias
    /// behaves as if the bias were zero.
    pub fn bias(&self) -> Tensor<B, 1> {
        match &self.dense.bias {
            Some(bias) => bias.val(),
            None       => Tensor::zeros([self.intermediate_size()], &self.weight().device()),
        }
    }

    /// Copy every parameter into host memory, keyed by its
    /// dotted name (`dense.weight`, `dense.bias`).
    pub fn weight_set(&self) -> Result<WeightSet, KernelError> {
        let mut tensors = BTreeMap::new();
        tensors.insert(DENSE_WEIGHT.to_string(), NativeTensor::from_burn(self.weight())?);
        tensors.insert(DENSE_BIAS.to_string(),   NativeTensor::from_burn(self.bias())?);
        Ok(WeightSet { tensors })
    }
}

/// Named host copies of the layer parameters, shared read-only
/// by the traced, runtime and accelerated variants.
#[derive(Debug, Clone, PartialEq)]
pub struct WeightSet {
    tensors: BTreeMap<String, NativeTensor>,
}

impl WeightSet {
    pub fn get(&self, name: &str) -> Result<&NativeTensor> {
        self.tensors
            .get(name)
            .with_context(|| format!("weight '{name}' not found"))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.tensors.keys().map(String::as_str)
    }
}

/// The reference module as an `IntermediateLayer`.
pub struct ReferenceLayer<B: Backend> {
    module: BertIntermediate<B>,
}

impl<B: Backend> ReferenceLayer<B> {
    pub fn new(module: BertIntermediate<B>) -> Self {
        Self { module }
    }
}

impl<B: Backend> IntermediateLayer for ReferenceLayer<B> {
    type Input  = Tensor<B, 3>;
    type Output = Tensor<B, 3>;

    fn variant(&self) -> Variant {
        Variant::Reference
    }

    fn call(&self, input: &Tensor<B, 3>) -> Result<Tensor<B, 3>> {
        Ok(self.module.forward(input.clone()))
    }
}
