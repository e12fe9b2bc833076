use std::time::Duration;

use crate::inference_runners::{OwnedTensor, TensorView};
use crate::Result;

/// Element type a graph declares for one of its tensors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElementType {
    Float32,
    Float16,
    Float64,
    Other,
}

/// Tensor attributes composed of the names, the dtypes, and the dimensions.
/// Dynamic dimensions are reported as `-1`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TensorAttrs {
    pub names: Vec<String>,
    pub dtypes: Vec<ElementType>,
    pub dimss: Vec<Vec<i64>>,
}

impl TensorAttrs {
    pub fn push(&mut self, name: &str, dtype: ElementType, dims: Vec<i64>) {
        self.names.push(name.to_string());
        self.dtypes.push(dtype);
        self.dimss.push(dims);
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Element count of the i-th tensor, `None` if any dim is dynamic.
    pub fn static_len(&self, i: usize) -> Option<usize> {
        let dims = self.dimss.get(i)?;
        dims.iter()
            .try_fold(1usize, |acc, &d| if d > 0 { Some(acc * d as usize) } else { None })
    }
}

/// A loaded single-input computation graph plus weights, ready to execute.
///
/// `forward` is one synchronous pass. It has no interruption point, and it is
/// not retried on failure.
pub trait InferenceEngine {
    fn inputs(&self) -> &TensorAttrs;

    fn outputs(&self) -> &TensorAttrs;

    /// Runs the graph on `input` and returns the first declared output.
    fn forward(&mut self, input: TensorView<'_>) -> Result<OwnedTensor>;

    /// Duration of the backend execution inside the last `forward`, without
    /// input or output conversion. `None` when the engine does not measure it.
    fn last_run_time(&self) -> Option<Duration> {
        None
    }

    /// One-line summary for logs.
    fn describe(&self) -> String {
        format!(
            "inputs: {:?} {:?} | outputs: {:?} {:?}",
            self.inputs().names,
            self.inputs().dimss,
            self.outputs().names,
            self.outputs().dimss
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn static_len_needs_every_dim() {
        let mut attrs = TensorAttrs::default();
        attrs.push("x", ElementType::Float32, vec![1, 128, 128, 4]);
        attrs.push("y", ElementType::Float32, vec![-1, 128, 128, 1]);
        assert_eq!(attrs.len(), 2);
        assert_eq!(attrs.static_len(0), Some(128 * 128 * 4));
        assert_eq!(attrs.static_len(1), None);
        assert_eq!(attrs.static_len(2), None);
    }
}
