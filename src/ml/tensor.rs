// ============================================================
// Layer 4 — Native Host Tensor
// ============================================================
// The representation the graph runtime and the fused kernel
// work on: an owned, contiguous, row-major buffer plus a shape.
//
//   NativeTensor::from_burn   Burn tensor  → host tensor (copy)
//   NativeTensor::into_burn   host tensor  → Burn tensor
//   NativeTensor::into_exchange
//                             host tensor  → ExchangeTensor, a
//                             hand-off that moves the buffer into
//                             Burn's TensorData without copying
//
// Element access is typed: asking an f32 tensor for i64 data is
// a DataTypeMismatch, never a reinterpretation.

use std::fmt;

use burn::prelude::*;
use serde::{Deserialize, Serialize};

use crate::ml::error::KernelError;

/// Typed backing buffer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Storage {
    F32(Vec<f32>),
    I32(Vec<i32>),
    I64(Vec<i64>),
}

impl Storage {
    fn dtype_name(&self) -> &'static str {
        match self {
            Storage::F32(_) => f32::NAME,
            Storage::I32(_) => i32::NAME,
            Storage::I64(_) => i64::NAME,
        }
    }
}

/// Element types a `NativeTensor` can hold.
pub trait Element: Copy + fmt::Display + Sized {
    const NAME: &'static str;

    fn slice(storage: &Storage) -> Option<&[Self]>;
    fn into_vec(storage: Storage) -> Result<Vec<Self>, Storage>;
    fn wrap(data: Vec<Self>) -> Storage;
    fn to_f64(self) -> f64;
}

macro_rules! impl_element {
    ($ty:ty, $variant:ident, $name:literal) => {
        impl Element for $ty {
            const NAME: &'static str = $name;

            fn slice(storage: &Storage) -> Option<&[Self]> {
                match storage {
                    Storage::$variant(v) => Some(v.as_slice()),
                    _ => None,
                }
            }

            fn into_vec(storage: Storage) -> Result<Vec<Self>, Storage> {
                match storage {
                    Storage::$variant(v) => Ok(v),
                    other => Err(other),
                }
            }

            fn wrap(data: Vec<Self>) -> Storage {
                Storage::$variant(data)
            }

            fn to_f64(self) -> f64 {
                self as f64
            }
        }
    };
}

impl_element!(f32, F32, "float32");
impl_element!(i32, I32, "int32");
impl_element!(i64, I64, "int64");

/// Owned host tensor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NativeTensor {
    shape:   Vec<usize>,
    storage: Storage,
}

impl NativeTensor {
    /// Wrap a buffer. The shape must be non-empty and its product
    /// must equal the buffer length.
    pub fn from_vec<T: Element>(shape: Vec<usize>, data: Vec<T>) -> Result<Self, KernelError> {
        if shape.is_empty() {
            return Err(KernelError::EmptyShape);
        }
        let expected: usize = shape.iter().product();
        if expected != data.len() {
            return Err(KernelError::BufferSize {
                shape,
                expected,
                actual: data.len(),
            });
        }
        Ok(Self { shape, storage: T::wrap(data) })
    }

    /// f32 tensor filled with zeros.
    #[cfg(test)]
    pub fn zeros(shape: Vec<usize>) -> Result<Self, KernelError> {
        let numel = shape.iter().product();
        Self::from_vec(shape, vec![0.0f32; numel])
    }

    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    pub fn n_dim(&self) -> usize {
        self.shape.len()
    }

    /// Size of the innermost dimension.
    pub fn last_dim(&self) -> usize {
        self.shape.last().copied().unwrap_or(0)
    }

    pub fn numel(&self) -> usize {
        if self.shape.is_empty() {
            return 0;
        }
        self.shape.iter().product()
    }

    pub fn dtype_name(&self) -> &'static str {
        self.storage.dtype_name()
    }

    pub fn data<T: Element>(&self) -> Result<&[T], KernelError> {
        let actual = self.storage.dtype_name();
        T::slice(&self.storage).ok_or(KernelError::DataTypeMismatch {
            requested: T::NAME,
            actual,
        })
    }

    pub fn into_vec<T: Element>(self) -> Result<Vec<T>, KernelError> {
        T::into_vec(self.storage).map_err(|other| KernelError::DataTypeMismatch {
            requested: T::NAME,
            actual:    other.dtype_name(),
        })
    }

    /// Copy a Burn float tensor into host memory as f32.
    pub fn from_burn<B: Backend, const D: usize>(tensor: Tensor<B, D>) -> Result<Self, KernelError> {
        let shape  = tensor.dims().to_vec();
        let values = tensor
            .into_data()
            .convert::<f32>()
            .to_vec::<f32>()
            .map_err(|e| KernelError::Conversion(format!("{e:?}")))?;
        Self::from_vec(shape, values)
    }

    /// Move an f32 tensor into a Burn tensor of rank `D`.
    pub fn into_burn<B: Backend, const D: usize>(
        self,
        device: &B::Device,
    ) -> Result<Tensor<B, D>, KernelError> {
        if self.n_dim() != D {
            return Err(KernelError::dims("into_burn rank", D, self.n_dim()));
        }
        let shape  = self.shape.clone();
        let values = self.into_vec::<f32>()?;
        Ok(Tensor::<B, D>::from_data(TensorData::new(values, shape), device))
    }

    pub fn into_exchange(self) -> ExchangeTensor {
        ExchangeTensor { inner: self }
    }

    /// Largest element-wise absolute difference between two f32
    /// tensors of identical shape. NaN anywhere makes the result NaN.
    pub fn max_abs_diff(&self, other: &NativeTensor) -> Result<f32, KernelError> {
        if self.shape != other.shape {
            return Err(KernelError::dims(
                "max_abs_diff",
                format!("{:?}", self.shape),
                format!("{:?}", other.shape),
            ));
        }
        let a = self.data::<f32>()?;
        let b = other.data::<f32>()?;
        Ok(a.iter()
            .zip(b)
            .map(|(x, y)| (x - y).abs())
            .fold(0.0f32, |acc, d| if d.is_nan() || d > acc { d } else { acc }))
    }

    fn write_summary<T: Element>(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "numel: {}", self.numel())?;
        writeln!(f, "n_dim: {}", self.n_dim())?;
        writeln!(f, "shape: {:?}", self.shape)?;
        let data = T::slice(&self.storage).unwrap_or(&[]);
        let head: Vec<String> = data.iter().take(10).map(|v| v.to_string()).collect();
        writeln!(f, "first 10 elems: ({})", head.join(", "))?;
        let sum: f64 = data.iter().map(|v| v.to_f64()).sum();
        write!(f, "sum is {sum}")
    }
}

impl fmt::Display for NativeTensor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "type: {}", self.dtype_name())?;
        match self.storage {
            Storage::F32(_) => self.write_summary::<f32>(f),
            Storage::I32(_) => self.write_summary::<i32>(f),
            Storage::I64(_) => self.write_summary::<i64>(f),
        }
    }
}

/// Ownership hand-off of a kernel result. The buffer is moved,
/// not copied, when it becomes a Burn tensor.
#[derive(Debug)]
pub struct ExchangeTensor {
    inner: NativeTensor,
}

impl ExchangeTensor {
    pub fn shape(&self) -> &[usize] {
        self.inner.shape()
    }

    pub fn into_burn<B: Backend, const D: usize>(
        self,
        device: &B::Device,
    ) -> Result<Tensor<B, D>, KernelError> {
        self.inner.into_burn(device)
    }
}
