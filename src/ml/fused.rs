// ============================================================
// Layer 4 — Fused Intermediate Kernel (accelerated variant)
// ============================================================
// One pass per output row:
//
//   row ← bias                       (bias as the accumulator seed)
//   row += Σ_k x[k] · W[k, :]        (input-major weight rows)
//   row ← gelu(row)                  (epilogue, still in cache)
//
// Rows are independent, so they are spread over rayon. The
// kernel is constructed straight from the extracted weight set;
// no graph or Burn module is involved.

use anyhow::Result;
use rayon::prelude::*;

use crate::domain::{traits::IntermediateLayer, variant::Variant};
use crate::ml::{
    activation::gelu_inplace,
    error::KernelError,
    intermediate::{WeightSet, DENSE_BIAS, DENSE_WEIGHT},
    tensor::{ExchangeTensor, NativeTensor},
};

#[derive(Debug, Clone)]
pub struct FusedIntermediate {
    weight: Vec<f32>,
    bias:   Vec<f32>,
    /// hidden size (rows of the weight)
    k: usize,
    /// intermediate size (columns of the weight)
    n: usize,
}

impl FusedIntermediate {
    /// `weight` must be `[hidden, intermediate]` and `bias`
    /// `[intermediate]`, both f32.
    pub fn new(weight: &NativeTensor, bias: &NativeTensor) -> Result<Self, KernelError> {
        if weight.n_dim() != 2 {
            return Err(KernelError::dims("fused weight rank", 2, weight.n_dim()));
        }
        if bias.n_dim() != 1 {
            return Err(KernelError::dims("fused bias rank", 1, bias.n_dim()));
        }
        let (k, n) = (weight.shape()[0], weight.shape()[1]);
        if k == 0 || n == 0 {
            return Err(KernelError::dims("fused weight shape", "non-zero dims", format!("{:?}", weight.shape())));
        }
        if bias.shape()[0] != n {
            return Err(KernelError::dims("fused bias length", n, bias.shape()[0]));
        }
        Ok(Self {
            weight: weight.data::<f32>()?.to_vec(),
            bias:   bias.data::<f32>()?.to_vec(),
            k,
            n,
        })
    }

    /// Build from the `dense.weight` / `dense.bias` entries of a
    /// weight set.
    pub fn from_weights(weights: &WeightSet) -> Result<Self> {
        Ok(Self::new(weights.get(DENSE_WEIGHT)?, weights.get(DENSE_BIAS)?)?)
    }

    pub fn hidden_size(&self) -> usize {
        self.k
    }

    pub fn intermediate_size(&self) -> usize {
        self.n
    }

    /// `[.., hidden]` → `[.., intermediate]`.
    pub fn forward(&self, input: &NativeTensor) -> Result<NativeTensor, KernelError> {
        if input.last_dim() != self.k {
            return Err(KernelError::dims("fused input width", self.k, input.last_dim()));
        }
        let x    = input.data::<f32>()?;
        let rows = x.len() / self.k;
        let mut out = vec![0.0f32; rows * self.n];

        out.par_chunks_mut(self.n)
            .zip(x.par_chunks(self.k))
            .for_each(|(row, xr)| {
                row.copy_from_slice(&self.bias);
                for (kk, &a) in xr.iter().enumerate() {
                    let wr = &self.weight[kk * self.n..(kk + 1) * self.n];
                    for (o, &w) in row.iter_mut().zip(wr) {
                        *o += a * w;
                    }
                }
                gelu_inplace(row);
            });

        let mut shape = input.shape().to_vec();
        if let Some(last) = shape.last_mut() {
            *last = self.n;
        }
        NativeTensor::from_vec(shape, out)
    }

    /// Same as `forward`, handing the result over as an exchange
    /// tensor so it can be moved into a Burn tensor without a copy.
    pub fn forward_exchange(&self, input: &NativeTensor) -> Result<ExchangeTensor, KernelError> {
        Ok(self.forward(input)?.into_exchange())
    }
}

impl IntermediateLayer for FusedIntermediate {
    type Input  = NativeTensor;
    type Output = ExchangeTensor;

    fn variant(&self) -> Variant {
        Variant::Accelerated
    }

    fn call(&self, input: &NativeTensor) -> Result<ExchangeTensor> {
        Ok(self.forward_exchange(input)?)
    }
}
