//! Options for building an ONNX Runtime engine.

use std::path::PathBuf;

use crate::backend_selector::ModelPaths;
use crate::common::{InferenceDevice, PrecisionTag};

#[derive(Debug, Clone)]
pub struct ConfigOrt {
    pub graph_path: PathBuf,
    pub weights_path: PathBuf,
    pub ort_lib_path: String,
    pub device: InferenceDevice,
    pub precision: PrecisionTag,
    pub optimize: bool,
    pub intra_threads: Option<usize>,

    // trt related
    pub trt_engine_cache_enable: bool,
    pub trt_engine_cache_path: String,
}

impl Default for ConfigOrt {
    fn default() -> Self {
        Self {
            graph_path: PathBuf::new(),
            weights_path: PathBuf::new(),
            ort_lib_path: String::new(),
            device: InferenceDevice::CPU,
            precision: PrecisionTag::FP32,
            optimize: true,
            intra_threads: None,

            trt_engine_cache_enable: true,
            trt_engine_cache_path: "trt-cache".to_string(),
        }
    }
}

impl ConfigOrt {
    pub fn new() -> Self {
        Default::default()
    }

    pub fn with_model_paths(mut self, paths: &ModelPaths) -> Self {
        self.graph_path = paths.graph_path.clone();
        self.weights_path = paths.weights_path.clone();
        self
    }

    pub fn with_ort_lib_path(mut self, ort_lib_path: &str) -> Self {
        self.ort_lib_path = ort_lib_path.to_string();
        self
    }

    pub fn with_device(mut self, device: InferenceDevice) -> Self {
        self.device = device;
        self
    }

    pub fn with_precision(mut self, precision: PrecisionTag) -> Self {
        self.precision = precision;
        self
    }

    pub fn with_optimize(mut self, x: bool) -> Self {
        self.optimize = x;
        self
    }

    pub fn with_intra_threads(mut self, n: usize) -> Self {
        self.intra_threads = Some(n);
        self
    }

    pub fn with_trt_engine_cache(mut self, x: bool) -> Self {
        self.trt_engine_cache_enable = x;
        self
    }

    pub fn with_trt_engine_cache_path(mut self, path: &str) -> Self {
        self.trt_engine_cache_path = path.to_string();
        self
    }

    /// TensorRT fp16 mode follows the resolved precision.
    pub fn trt_fp16_enable(&self) -> bool {
        self.precision.is_half()
    }
}
