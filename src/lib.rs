pub mod backend_selector;
pub mod common;
pub mod data;
pub mod error;
pub mod evaluation;
pub mod inference_runners;
pub mod result_sink;
pub mod sample_loader;
mod utils;

use std::time::{Duration, Instant};

use serde::Serialize;

use crate::backend_selector::{BackendSelector, ModelPaths};
use crate::common::{InferenceDevice, PrecisionTag, Shape4D};
use crate::data::{ConfigOrt, EvalConfig};
use crate::error::EvalError;
use crate::evaluation::{ConfusionCounts, DiceScore, Evaluation, SegmentationEvaluator};
use crate::inference_runners::{InferenceEngine, InferenceSession, OrtEngine};
use crate::result_sink::ResultSink;
use crate::sample_loader::SampleLoader;
use crate::utils::trace;

pub type Result<T, E = EvalError> = std::result::Result<T, E>;

/// Resolves the device's precision and model files, loads them into ONNX
/// Runtime and binds the session to one sample of `image_shape`.
pub fn init_session(
    config: &EvalConfig,
    image_shape: Shape4D,
) -> Result<(PrecisionTag, InferenceSession<OrtEngine>)> {
    let device = config.inference_device()?;
    let selector = BackendSelector::new(&config.model_dir, &config.model_name);
    let (precision, paths) = selector.resolve(device)?;
    let ort_options = ort_options(config, device, precision, &paths)?;

    log::info!("Initializing ORT session with ({device}) execution provider");
    let engine = OrtEngine::new(&ort_options)?;
    let session = InferenceSession::prepare(engine, image_shape)?;
    Ok((precision, session))
}

/// Engine options for a resolved backend. The TensorRT engine cache directory
/// is only created when the device is TensorRT with caching enabled.
pub fn ort_options(
    config: &EvalConfig,
    device: InferenceDevice,
    precision: PrecisionTag,
    paths: &ModelPaths,
) -> Result<ConfigOrt> {
    let mut options = ConfigOrt::new()
        .with_model_paths(paths)
        .with_ort_lib_path(&config.ort_lib_path)
        .with_device(device)
        .with_precision(precision)
        .with_optimize(config.optimize)
        .with_trt_engine_cache(config.trt_engine_cache);
    if let Some(n) = config.intra_threads {
        options = options.with_intra_threads(n);
    }
    if matches!(device, InferenceDevice::TensorRT(_)) && config.trt_engine_cache {
        let dir = config.trt_cache_dir()?;
        options = options.with_trt_engine_cache_path(&dir.to_string_lossy());
    }
    Ok(options)
}

/// Result of scoring one sample.
#[derive(Debug, Clone)]
pub struct SampleEvaluation {
    pub index: usize,
    pub inference_ms: Option<f64>,
    pub evaluation: Evaluation,
}

/// Loads `index` (clamped), runs one forward pass, scores it and hands the
/// masks to `sink`.
pub fn run_evaluation<E, S>(
    session: &mut InferenceSession<E>,
    loader: &SampleLoader,
    index: i64,
    evaluator: &SegmentationEvaluator,
    sink: &S,
) -> Result<SampleEvaluation>
where
    E: InferenceEngine,
    S: ResultSink + ?Sized,
{
    let start = Instant::now();
    let sample = loader.load(index)?;
    let t = trace("eval", "load", start, Duration::ZERO);

    let prediction = session.infer(&sample.image)?;
    let t = trace("eval", "infer", start, t);

    let evaluation = evaluator.evaluate(&prediction, &sample.mask, sample.mask_shape)?;
    let t = trace("eval", "score", start, t);

    sink.present(&evaluation.masks)?;
    trace("eval", "present", start, t);

    Ok(SampleEvaluation {
        index: sample.index,
        inference_ms: session.last_inference_ms(),
        evaluation,
    })
}

/// Serializable summary of one evaluation run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EvaluationReport {
    pub index: usize,
    pub device: String,
    pub precision: PrecisionTag,
    pub inference_ms: Option<f64>,
    pub counts: ConfusionCounts,
    pub dice: Option<f64>,
    pub no_positive_prediction: bool,
}

impl EvaluationReport {
    pub fn new(device: InferenceDevice, precision: PrecisionTag, result: &SampleEvaluation) -> Self {
        let score = result.evaluation.score;
        Self {
            index: result.index,
            device: device.to_string(),
            precision,
            inference_ms: result.inference_ms,
            counts: result.evaluation.counts,
            dice: score.value(),
            no_positive_prediction: matches!(score, DiceScore::NoPositivePrediction),
        }
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(|e| EvalError::Sink(e.to_string()))
    }
}

impl std::fmt::Display for EvaluationReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Image index: {}", self.index)?;
        writeln!(f, "Device: {} | Precision: {}", self.device, self.precision)?;
        if let Some(ms) = self.inference_ms {
            writeln!(f, "Inference time: {ms:.2} msec")?;
        }
        writeln!(
            f,
            "Intersection: {} | Union: {} | Predicted: {} | Ground truth: {}",
            self.counts.intersection,
            self.counts.union,
            self.counts.predicted_positive,
            self.counts.ground_truth_positive
        )?;
        match self.dice {
            Some(x) => write!(f, "dice_coeff {x}"),
            None => write!(f, "No Tumor found"),
        }
    }
}

/// Whole pipeline from a config: load, resolve, prepare, infer, evaluate, present.
pub fn evaluate_with_config<S: ResultSink + ?Sized>(config: &EvalConfig, sink: &S) -> Result<EvaluationReport> {
    let loader = SampleLoader::open_npz(&config.data_path)?;
    let device = config.inference_device()?;
    let (precision, mut session) = init_session(config, loader.image_shape())?;
    let evaluator = SegmentationEvaluator::new(config.prediction_threshold, config.ground_truth_threshold);
    let result = run_evaluation(&mut session, &loader, config.image_index, &evaluator, sink)?;
    Ok(EvaluationReport::new(device, precision, &result))
}
