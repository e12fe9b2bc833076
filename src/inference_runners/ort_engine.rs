//! ONNX Runtime engine. The graph's declared element type is honoured at the
//! boundary: f32 NHWC in and out, converted to and from f16/f64 as needed.

use std::path::Path;
use std::time::{Duration, Instant};

use half::f16;
use ndarray::{Array, IxDyn};
use ort::{
    execution_providers::{
        CPUExecutionProvider, CUDAExecutionProvider, CoreMLExecutionProvider, ExecutionProvider,
        TensorRTExecutionProvider,
    },
    session::builder::{GraphOptimizationLevel, SessionBuilder},
    session::{Session, SessionInputValue},
    tensor::TensorElementType,
    value::{DynValue, Tensor, ValueType},
};

use crate::common::{InferenceDevice, PrecisionTag};
use crate::data::{ConfigOrt, CROSS_MARK};
use crate::error::EvalError;
use crate::inference_runners::{ElementType, InferenceEngine, OwnedTensor, TensorAttrs, TensorView};
use crate::Result;

/// ONNXRuntime Backend
#[derive(Debug)]
pub struct OrtEngine {
    session: Session,
    device: InferenceDevice,
    precision: PrecisionTag,
    inputs_attrs: TensorAttrs,
    outputs_attrs: TensorAttrs,
    input_dtypes: Vec<Option<TensorElementType>>,
    output_dtypes: Vec<Option<TensorElementType>>,
    last_run: Option<Duration>,
}

impl OrtEngine {
    pub fn new(config: &ConfigOrt) -> Result<Self> {
        check_readable(&config.graph_path)?;
        check_readable(&config.weights_path)?;

        // build
        let ort_init = if config.ort_lib_path.is_empty() {
            ort::init()
        } else {
            ort::init_from(&config.ort_lib_path)
        };
        if let Err(e) = ort_init.commit() {
            return Err(EvalError::artifact(
                &config.ort_lib_path,
                format!("failed to commit ORT environment: {e}"),
            ));
        }

        let graph_err = |e: ort::Error| EvalError::artifact(&config.graph_path, e);
        let mut builder = Session::builder().map_err(graph_err)?;

        // No fallback to CPU: the weights on disk are tied to the requested device.
        let registered = match config.device {
            InferenceDevice::TensorRT(device_id) => Self::build_trt(
                &mut builder,
                device_id,
                config.trt_fp16_enable(),
                config.trt_engine_cache_enable,
                &config.trt_engine_cache_path,
            ),
            InferenceDevice::CUDA(device_id) => Self::build_cuda(&mut builder, device_id),
            InferenceDevice::CoreML(_) => Self::build_coreml(&mut builder),
            InferenceDevice::CPU => Self::build_cpu(&mut builder),
        };
        registered.map_err(|reason| EvalError::artifact(&config.graph_path, reason))?;

        let level = if config.optimize {
            GraphOptimizationLevel::Level3
        } else {
            GraphOptimizationLevel::Disable
        };
        let mut builder = builder.with_optimization_level(level).map_err(graph_err)?;
        if let Some(n) = config.intra_threads {
            builder = builder.with_intra_threads(n).map_err(graph_err)?;
        }

        // The graph resolves its weights blob as external data next to itself.
        let session = builder.commit_from_file(&config.graph_path).map_err(graph_err)?;
        log::info!("** Loaded pretrained network.");

        let (inputs_attrs, input_dtypes) =
            io_attrs(session.inputs.iter().map(|x| (x.name.as_str(), &x.input_type)));
        let (outputs_attrs, output_dtypes) =
            io_attrs(session.outputs.iter().map(|x| (x.name.as_str(), &x.output_type)));

        // summary
        log::info!(
            "Backend: ONNXRuntime | Device: {} | Precision: {} | Inputs: {:?} {:?} | Outputs: {:?} {:?}",
            config.device,
            config.precision,
            inputs_attrs.names,
            inputs_attrs.dimss,
            outputs_attrs.names,
            outputs_attrs.dimss,
        );

        Ok(Self {
            session,
            device: config.device,
            precision: config.precision,
            inputs_attrs,
            outputs_attrs,
            input_dtypes,
            output_dtypes,
            last_run: None,
        })
    }

    fn build_trt(
        builder: &mut SessionBuilder,
        device_id: usize,
        fp16_enable: bool,
        engine_cache_enable: bool,
        engine_cache_path: &str,
    ) -> std::result::Result<(), String> {
        let trt = TensorRTExecutionProvider::default()
            .with_device_id(device_id as i32)
            .with_fp16(fp16_enable)
            .with_engine_cache(engine_cache_enable)
            .with_engine_cache_path(engine_cache_path)
            .with_timing_cache(false);
        match trt.is_available() {
            Ok(true) => {
                trt.register(builder)
                    .map_err(|err| format!("{CROSS_MARK} TensorRT initialization failed: {err:?}"))?;
                log::info!("🐢 Initial model serialization with TensorRT may takes some time...");
                Ok(())
            }
            _ => Err(format!("{CROSS_MARK} TensorRT execution provider not available")),
        }
    }

    fn build_cuda(builder: &mut SessionBuilder, device_id: usize) -> std::result::Result<(), String> {
        let ep = CUDAExecutionProvider::default().with_device_id(device_id as i32);
        match ep.is_available() {
            Ok(true) => ep
                .register(builder)
                .map_err(|err| format!("{CROSS_MARK} CUDA initialization failed: {err:?}")),
            _ => Err(format!("{CROSS_MARK} CUDA execution provider not available")),
        }
    }

    fn build_coreml(builder: &mut SessionBuilder) -> std::result::Result<(), String> {
        let ep = CoreMLExecutionProvider::default().with_subgraphs(false);
        match ep.is_available() {
            Ok(true) => ep
                .register(builder)
                .map_err(|err| format!("{CROSS_MARK} CoreML initialization failed: {err:?}")),
            _ => Err(format!("{CROSS_MARK} CoreML execution provider not available")),
        }
    }

    fn build_cpu(builder: &mut SessionBuilder) -> std::result::Result<(), String> {
        let ep = CPUExecutionProvider::default();
        match ep.is_available() {
            Ok(true) => ep
                .register(builder)
                .map_err(|err| format!("{CROSS_MARK} CPU initialization failed: {err:?}")),
            _ => Err(format!("{CROSS_MARK} CPU execution provider not available")),
        }
    }

    fn tensor_preprocess(x: Array<f32, IxDyn>, dtype: Option<TensorElementType>) -> Result<DynValue> {
        let binding_err = |e: ort::Error| EvalError::InputBindingError(e.to_string());
        let x = match dtype {
            Some(TensorElementType::Float32) | None => {
                Tensor::from_array(x).map_err(binding_err)?.into_dyn()
            }
            Some(TensorElementType::Float16) => {
                Tensor::from_array(x.mapv(f16::from_f32)).map_err(binding_err)?.into_dyn()
            }
            Some(TensorElementType::Float64) => {
                Tensor::from_array(x.mapv(|x_| x_ as f64)).map_err(binding_err)?.into_dyn()
            }
            Some(other) => {
                return Err(EvalError::InputBindingError(format!(
                    "unsupported input element type {other:?}"
                )))
            }
        };
        Ok(x)
    }

    fn tensor_postprocess(x: &DynValue, dtype: Option<TensorElementType>) -> Result<Array<f32, IxDyn>> {
        fn _extract_and_convert<T>(x: &DynValue, map_fn: impl Fn(T) -> f32) -> Result<Array<f32, IxDyn>>
        where
            T: Clone + 'static + ort::tensor::PrimitiveTensorElementType,
        {
            x.try_extract_array::<T>()
                .map(|x| x.mapv(map_fn))
                .map_err(|e| EvalError::InferenceExecutionError(format!("failed to extract output: {e}")))
        }
        match dtype {
            Some(TensorElementType::Float32) | None => _extract_and_convert::<f32>(x, |x| x),
            Some(TensorElementType::Float16) => _extract_and_convert::<f16>(x, f16::to_f32),
            Some(TensorElementType::Float64) => _extract_and_convert::<f64>(x, |x| x as f32),
            Some(other) => Err(EvalError::InferenceExecutionError(format!(
                "unsupported output element type {other:?}"
            ))),
        }
    }

    pub fn device(&self) -> InferenceDevice {
        self.device
    }

    pub fn precision(&self) -> PrecisionTag {
        self.precision
    }
}

impl InferenceEngine for OrtEngine {
    fn inputs(&self) -> &TensorAttrs {
        &self.inputs_attrs
    }

    fn outputs(&self) -> &TensorAttrs {
        &self.outputs_attrs
    }

    fn forward(&mut self, input: TensorView<'_>) -> Result<OwnedTensor> {
        let input_dtype = self.input_dtypes.first().copied().flatten();
        let output_dtype = self.output_dtypes.first().copied().flatten();
        let output_name = self
            .outputs_attrs
            .names
            .first()
            .cloned()
            .ok_or_else(|| EvalError::InferenceExecutionError("graph has no outputs".to_string()))?;

        let x = input.as_array()?.to_owned();
        let xs_ = [SessionInputValue::from(Self::tensor_preprocess(x, input_dtype)?)];

        // run
        self.last_run = None;
        let t_run = Instant::now();
        let outputs = self
            .session
            .run(&xs_[..])
            .map_err(|e| EvalError::InferenceExecutionError(e.to_string()))?;
        self.last_run = Some(t_run.elapsed());

        // extract
        let y = Self::tensor_postprocess(&outputs[output_name.as_str()], output_dtype)?;
        Ok(OwnedTensor::from_array(y))
    }

    fn last_run_time(&self) -> Option<Duration> {
        self.last_run
    }
}

fn check_readable(path: &Path) -> Result<()> {
    match std::fs::metadata(path) {
        Ok(meta) if meta.is_file() && meta.len() > 0 => Ok(()),
        Ok(_) => Err(EvalError::artifact(path, "not a non-empty file")),
        Err(e) => Err(EvalError::artifact(path, e)),
    }
}

fn element_type(x: TensorElementType) -> ElementType {
    match x {
        TensorElementType::Float32 => ElementType::Float32,
        TensorElementType::Float16 => ElementType::Float16,
        TensorElementType::Float64 => ElementType::Float64,
        _ => ElementType::Other,
    }
}

fn io_attrs<'a>(
    value_info: impl Iterator<Item = (&'a str, &'a ValueType)>,
) -> (TensorAttrs, Vec<Option<TensorElementType>>) {
    let mut attrs = TensorAttrs::default();
    let mut dtypes = Vec::new();
    for (name, value_type) in value_info {
        match value_type {
            ValueType::Tensor { ty, shape, .. } => {
                attrs.push(name, element_type(*ty), shape.iter().copied().collect());
                dtypes.push(Some(*ty));
            }
            _ => {
                attrs.push(name, ElementType::Other, Vec::new());
                dtypes.push(None);
            }
        }
    }
    (attrs, dtypes)
}
