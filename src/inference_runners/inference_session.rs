//! A prepared engine bound to a fixed NHWC f32 input and its first output.

use std::time::{Duration, Instant};

use crate::common::Shape4D;
use crate::data::{as_millis_f64, TimeCalc};
use crate::error::EvalError;
use crate::inference_runners::{InferenceEngine, TensorView};
use crate::Result;

/// Flat prediction for one sample, in the output's row-major NHWC order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InferenceOutput {
    values: Vec<f32>,
    dims: Vec<usize>,
}

impl InferenceOutput {
    pub fn new(values: Vec<f32>, dims: Vec<usize>) -> Self {
        Self { values, dims }
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.values
    }

    pub fn dims(&self) -> &[usize] {
        &self.dims
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn into_vec(self) -> Vec<f32> {
        self.values
    }
}

impl From<Vec<f32>> for InferenceOutput {
    fn from(values: Vec<f32>) -> Self {
        let dims = vec![values.len()];
        Self { values, dims }
    }
}

/// Owned by one caller. `infer` takes `&mut self`, so sharing a session
/// across threads requires the caller to serialize access.
#[derive(Debug)]
pub struct InferenceSession<E: InferenceEngine> {
    engine: E,
    input_name: String,
    output_name: String,
    input_shape: [usize; 4],
    output_len: Option<usize>,
    infer_time: TimeCalc,
}

/// The handle a caller holds between `prepare` and `infer`.
pub type SessionHandle<E> = InferenceSession<E>;

impl<E: InferenceEngine> InferenceSession<E> {
    /// Validates the topology and binds the input to `image_shape` (one sample).
    pub fn prepare(engine: E, image_shape: Shape4D) -> Result<Self> {
        let (n_inputs, n_outputs) = (engine.inputs().len(), engine.outputs().len());
        if n_inputs != 1 || n_outputs < 1 {
            return Err(EvalError::UnsupportedTopology {
                inputs: n_inputs,
                outputs: n_outputs,
            });
        }

        log::debug!("Preparing input blobs");
        let input_name = engine.inputs().names[0].clone();
        let input_shape = bind_input_shape(&engine.inputs().dimss[0], image_shape)?;
        log::info!("** Input `{input_name}` has been configured: NHWC f32 {input_shape:?}");

        if n_outputs > 1 {
            log::warn!(
                "Graph declares {n_outputs} outputs, only `{}` is evaluated",
                engine.outputs().names[0]
            );
        }
        let output_name = engine.outputs().names[0].clone();
        let output_len = engine.outputs().static_len(0);
        log::info!(
            "** Output `{output_name}` has been configured: NHWC f32 {:?}",
            engine.outputs().dimss[0]
        );

        Ok(Self {
            engine,
            input_name,
            output_name,
            input_shape,
            output_len,
            infer_time: TimeCalc::default(),
        })
    }

    /// Copies `image` into the bound input, runs one forward pass and returns
    /// the first output. Only the backend execution is timed when the engine
    /// reports it, otherwise the whole `forward` call.
    pub fn infer(&mut self, image: &[f64]) -> Result<InferenceOutput> {
        let expected: usize = self.input_shape.iter().product();
        if image.len() != expected {
            return Err(EvalError::InputBindingError(format!(
                "`{}` expects {expected} values, image has {}",
                self.input_name,
                image.len()
            )));
        }

        let buffer: Vec<f32> = image.iter().map(|&x| x as f32).collect();
        let input = TensorView::nhwc(&buffer, self.input_shape)?;

        let t_forward = Instant::now();
        let output = self.engine.forward(input)?;
        let t_forward = t_forward.elapsed();
        let t_run = self.engine.last_run_time().unwrap_or(t_forward);
        self.infer_time.push(t_run);
        log::info!("Inference Done; inference time {:.2} msec", as_millis_f64(t_run));

        if let Some(len) = self.output_len {
            if output.len() != len {
                return Err(EvalError::InferenceExecutionError(format!(
                    "`{}` declared {len} values, engine returned {}",
                    self.output_name,
                    output.len()
                )));
            }
        }

        let view = output.view_nhwc()?;
        if !view.is_contiguous_row_major() {
            return Err(EvalError::InferenceExecutionError(format!(
                "`{}` is not contiguous NHWC",
                self.output_name
            )));
        }

        let dims = output.dims().to_vec();
        Ok(InferenceOutput::new(output.into_vec(), dims))
    }

    pub fn input_name(&self) -> &str {
        &self.input_name
    }

    pub fn output_name(&self) -> &str {
        &self.output_name
    }

    pub fn input_shape(&self) -> [usize; 4] {
        self.input_shape
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    pub fn last_inference_time(&self) -> Option<Duration> {
        self.infer_time.last()
    }

    pub fn last_inference_ms(&self) -> Option<f64> {
        self.infer_time.last().map(as_millis_f64)
    }

    pub fn average_inference_ms(&self) -> Option<f64> {
        self.infer_time.avg().map(as_millis_f64)
    }

    pub fn ts(&self) -> &TimeCalc {
        &self.infer_time
    }
}

/// Resolves the declared input dims against one NHWC sample: dynamic dims
/// take the sample's value, static dims must agree with it.
fn bind_input_shape(declared: &[i64], image_shape: Shape4D) -> Result<[usize; 4]> {
    let wanted = image_shape.single().as_nhwc();
    if declared.len() != wanted.len() {
        return Err(EvalError::InputBindingError(format!(
            "input declares rank {} ({declared:?}), NHWC needs rank 4",
            declared.len()
        )));
    }

    let mut resolved = wanted;
    for (i, &d) in declared.iter().enumerate() {
        if d > 0 {
            resolved[i] = d as usize;
        }
    }

    let expected: usize = resolved.iter().product();
    if expected != image_shape.sample_len() {
        return Err(EvalError::InputBindingError(format!(
            "input expects {expected} values ({resolved:?}), image has {} ({image_shape})",
            image_shape.sample_len()
        )));
    }
    if resolved != wanted {
        return Err(EvalError::InputBindingError(format!(
            "input dims {resolved:?} are not the sample's NHWC dims {wanted:?}"
        )));
    }
    Ok(resolved)
}
