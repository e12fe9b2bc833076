//! Device to precision to model-artifact resolution. Pure: touches no files.

use std::path::{Path, PathBuf};

use crate::common::{InferenceDevice, PrecisionTag};
use crate::data::{DEFAULT_MODEL_DIR, DEFAULT_MODEL_NAME};
use crate::error::EvalError;
use crate::Result;

pub const GRAPH_EXTENSION: &str = "onnx";
pub const WEIGHTS_EXTENSION: &str = "bin";

/// Graph description and the weights blob it references.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelPaths {
    pub graph_path: PathBuf,
    pub weights_path: PathBuf,
}

#[derive(Debug, Clone)]
pub struct BackendSelector {
    model_dir: PathBuf,
    model_name: String,
}

impl Default for BackendSelector {
    fn default() -> Self {
        Self::new(DEFAULT_MODEL_DIR, DEFAULT_MODEL_NAME)
    }
}

impl BackendSelector {
    pub fn new<P: AsRef<Path>>(model_dir: P, model_name: &str) -> Self {
        Self {
            model_dir: model_dir.as_ref().to_path_buf(),
            model_name: model_name.to_string(),
        }
    }

    /// Weight precision each device requires.
    pub fn precision_for(device: InferenceDevice) -> Result<PrecisionTag> {
        match device {
            InferenceDevice::CPU => Ok(PrecisionTag::FP32),
            InferenceDevice::TensorRT(_) => Ok(PrecisionTag::FP16),
            InferenceDevice::CUDA(_) | InferenceDevice::CoreML(_) => {
                Err(EvalError::UnsupportedDevice(device.to_string()))
            }
        }
    }

    /// `<model_dir>/<precision>/<model_name>.{onnx,bin}`
    pub fn model_paths(&self, precision: PrecisionTag) -> ModelPaths {
        let dir = self.model_dir.join(precision.as_str());
        ModelPaths {
            graph_path: dir.join(format!("{}.{GRAPH_EXTENSION}", self.model_name)),
            weights_path: dir.join(format!("{}.{WEIGHTS_EXTENSION}", self.model_name)),
        }
    }

    pub fn resolve(&self, device: InferenceDevice) -> Result<(PrecisionTag, ModelPaths)> {
        let precision = Self::precision_for(device)?;
        let paths = self.model_paths(precision);
        log::info!(
            "Device: {device} | Precision: {precision} | Graph: {} | Weights: {}",
            paths.graph_path.display(),
            paths.weights_path.display()
        );
        Ok((precision, paths))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cpu_resolves_fp32() {
        let selector = BackendSelector::new("models", "unet");
        let (precision, paths) = selector.resolve(InferenceDevice::CPU).unwrap();
        assert_eq!(precision, PrecisionTag::FP32);
        assert_eq!(paths.graph_path, PathBuf::from("models/FP32/unet.onnx"));
        assert_eq!(paths.weights_path, PathBuf::from("models/FP32/unet.bin"));
    }

    #[test]
    fn accelerator_resolves_fp16() {
        let selector = BackendSelector::new("models", "unet");
        let (precision, paths) = selector.resolve(InferenceDevice::TensorRT(1)).unwrap();
        assert_eq!(precision, PrecisionTag::FP16);
        assert!(paths.graph_path.starts_with("models/FP16"));
        assert!(paths.weights_path.starts_with("models/FP16"));
    }

    #[test]
    fn each_device_keeps_its_own_precision() {
        let cpu = BackendSelector::precision_for(InferenceDevice::CPU).unwrap();
        let trt = BackendSelector::precision_for(InferenceDevice::TensorRT(0)).unwrap();
        assert_ne!(cpu, trt);
    }

    #[test]
    fn unmapped_devices_are_unsupported() {
        // A model directory that does not exist proves nothing is read.
        let selector = BackendSelector::new("/nonexistent/models", "unet");
        for device in [InferenceDevice::CUDA(0), InferenceDevice::CoreML(0)] {
            assert!(matches!(
                selector.resolve(device),
                Err(EvalError::UnsupportedDevice(_))
            ));
        }
    }
}
