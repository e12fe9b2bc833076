//! Typed tensor views exchanged between marshalling and the engine.
//!
//! Both sides of an engine call are row-major `N x H x W x C` f32. The layout
//! is checked when a view is built, so an engine never has to trust a raw
//! buffer length.

use ndarray::{ArrayD, ArrayViewD, IxDyn};

use crate::error::EvalError;
use crate::inference_runners::ElementType;
use crate::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Layout {
    Nhwc,
}

/// Borrowed f32 tensor with explicit shape and strides.
#[derive(Debug, Clone, Copy)]
pub struct TensorView<'a> {
    data: &'a [f32],
    shape: [usize; 4],
    strides: [usize; 4],
    dtype: ElementType,
    layout: Layout,
}

impl<'a> TensorView<'a> {
    /// Views `data` as a contiguous NHWC tensor of `shape`.
    pub fn nhwc(data: &'a [f32], shape: [usize; 4]) -> Result<Self> {
        let expected: usize = shape.iter().product();
        if data.len() != expected {
            return Err(EvalError::InputBindingError(format!(
                "buffer of {} values cannot be viewed as NHWC {:?} ({} values)",
                data.len(),
                shape,
                expected
            )));
        }
        Ok(Self {
            data,
            shape,
            strides: row_major_strides(shape),
            dtype: ElementType::Float32,
            layout: Layout::Nhwc,
        })
    }

    pub fn data(&self) -> &'a [f32] {
        self.data
    }

    pub fn shape(&self) -> [usize; 4] {
        self.shape
    }

    pub fn strides(&self) -> [usize; 4] {
        self.strides
    }

    pub fn dtype(&self) -> ElementType {
        self.dtype
    }

    pub fn layout(&self) -> Layout {
        self.layout
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Channel varies fastest, then width, then height, then batch.
    pub fn is_contiguous_row_major(&self) -> bool {
        self.strides == row_major_strides(self.shape)
    }

    pub fn at(&self, n: usize, h: usize, w: usize, c: usize) -> Option<f32> {
        let idx = [n, h, w, c];
        if idx.iter().zip(self.shape.iter()).any(|(i, d)| i >= d) {
            return None;
        }
        let offset: usize = idx.iter().zip(self.strides.iter()).map(|(i, s)| i * s).sum();
        self.data.get(offset).copied()
    }

    pub fn as_array(&self) -> Result<ArrayViewD<'a, f32>> {
        ArrayViewD::from_shape(IxDyn(&self.shape), self.data)
            .map_err(|e| EvalError::InputBindingError(format!("cannot view tensor as array: {e}")))
    }
}

pub fn row_major_strides(shape: [usize; 4]) -> [usize; 4] {
    let [_, h, w, c] = shape;
    [h * w * c, w * c, c, 1]
}

/// Engine output: owned f32 values with the dims the engine reported.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OwnedTensor {
    data: Vec<f32>,
    dims: Vec<usize>,
}

impl OwnedTensor {
    pub fn new(dims: Vec<usize>, data: Vec<f32>) -> Result<Self> {
        let expected: usize = dims.iter().product();
        if expected != data.len() {
            return Err(EvalError::InferenceExecutionError(format!(
                "output dims {dims:?} need {expected} values, engine returned {}",
                data.len()
            )));
        }
        Ok(Self { data, dims })
    }

    pub fn from_array(x: ArrayD<f32>) -> Self {
        let dims = x.shape().to_vec();
        let data = if x.is_standard_layout() {
            x.into_raw_vec_and_offset().0
        } else {
            x.iter().copied().collect()
        };
        Self { data, dims }
    }

    pub fn dims(&self) -> &[usize] {
        &self.dims
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.data
    }

    pub fn into_vec(self) -> Vec<f32> {
        self.data
    }

    /// Rank-4 outputs view as NHWC; lower ranks are treated as a single
    /// channel-last sample with leading dims of one.
    pub fn view_nhwc(&self) -> Result<TensorView<'_>> {
        let shape = match self.dims.as_slice() {
            &[n, h, w, c] => [n, h, w, c],
            &[h, w, c] => [1, h, w, c],
            &[h, w] => [1, h, w, 1],
            &[len] => [1, 1, len, 1],
            other => {
                return Err(EvalError::InferenceExecutionError(format!(
                    "output of rank {} cannot be viewed as NHWC",
                    other.len()
                )))
            }
        };
        TensorView::nhwc(&self.data, shape)
            .map_err(|e| EvalError::InferenceExecutionError(e.to_string()))
    }
}
