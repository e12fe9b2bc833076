use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::common::InferenceDevice;
use crate::data::{create_directory, FsAccess};
use crate::error::EvalError;
use crate::Result;

pub const DEFAULT_DATA_PATH: &str = "../data/decathlon.npz";
pub const DEFAULT_MODEL_DIR: &str = "../models";
pub const DEFAULT_MODEL_NAME: &str = "saved_model";

/// Settings for one evaluation run, loadable from a JSON file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EvalConfig {
    pub data_path: PathBuf,
    pub model_dir: PathBuf,
    pub model_name: String,
    pub ort_lib_path: String,
    pub device: String,
    pub device_id: usize,
    pub image_index: i64,
    pub output_dir: Option<PathBuf>,
    pub save_masks: bool,
    pub prediction_threshold: f64,
    pub ground_truth_threshold: f64,
    /// Full graph optimization when building the session.
    pub optimize: bool,
    pub intra_threads: Option<usize>,
    pub trt_engine_cache: bool,
    /// Defaults to `<cache dir>/unet_eval/trt-cache`.
    pub trt_engine_cache_path: Option<PathBuf>,
}

impl Default for EvalConfig {
    fn default() -> Self {
        Self {
            data_path: PathBuf::from(DEFAULT_DATA_PATH),
            model_dir: PathBuf::from(DEFAULT_MODEL_DIR),
            model_name: DEFAULT_MODEL_NAME.to_string(),
            ort_lib_path: String::new(),
            device: InferenceDevice::CPU.str_lowercase().to_string(),
            device_id: 0,
            image_index: 0,
            output_dir: None,
            save_masks: true,
            prediction_threshold: 0.5,
            ground_truth_threshold: 0.0,
            optimize: true,
            intra_threads: None,
            trt_engine_cache: true,
            trt_engine_cache_path: None,
        }
    }
}

impl EvalConfig {
    pub fn from_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("cannot read config {}: {e}", path.display()))?;
        Self::from_json(&text)
    }

    pub fn from_json(text: &str) -> anyhow::Result<Self> {
        Ok(serde_json::from_str(text)?)
    }

    /// Parses `device`/`device_id`. An unknown name is an unsupported device.
    pub fn inference_device(&self) -> Result<InferenceDevice> {
        InferenceDevice::from_str(&self.device, self.device_id)
            .ok_or_else(|| EvalError::UnsupportedDevice(self.device.clone()))
    }

    /// Directory TensorRT serializes its engines into, created if missing.
    pub fn trt_cache_dir(&self) -> Result<PathBuf> {
        match &self.trt_engine_cache_path {
            Some(path) => {
                create_directory(path)?;
                Ok(path.clone())
            }
            None => FsAccess::Cache.path_with_subs(&["trt-cache"]),
        }
    }

    pub fn to_string(&self) -> String {
        format!("Dataset Path: {}\n\
        Model Directory: {}\n\
        Model Name: {}\n\
        OnnxRuntime Lib Path: {}\n\
        Inference Device: {} ({})\n\
        Image Index: {}\n\
        Thresholds: prediction > {}, ground truth > {}",
                self.data_path.display(), self.model_dir.display(), self.model_name,
                self.ort_lib_path, self.device, self.device_id, self.image_index,
                self.prediction_threshold, self.ground_truth_threshold)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_fields_take_defaults() {
        let config = EvalConfig::from_json(r#"{ "device": "tensorrt", "image_index": -3 }"#).unwrap();
        assert_eq!(config.device, "tensorrt");
        assert_eq!(config.image_index, -3);
        assert_eq!(config.model_name, DEFAULT_MODEL_NAME);
        assert_eq!(config.prediction_threshold, 0.5);
        assert_eq!(config.ground_truth_threshold, 0.0);
        assert_eq!(config.inference_device().unwrap(), InferenceDevice::TensorRT(0));
    }

    #[test]
    fn unknown_device_is_unsupported() {
        let config = EvalConfig {
            device: "myriad".to_string(),
            ..Default::default()
        };
        assert!(matches!(config.inference_device(), Err(EvalError::UnsupportedDevice(name)) if name == "myriad"));
    }

    #[test]
    fn explicit_trt_cache_dir_is_created() {
        let dir = std::env::temp_dir().join(format!("unet_eval_trt_{}", std::process::id()));
        let config = EvalConfig {
            trt_engine_cache_path: Some(dir.join("engines")),
            ..Default::default()
        };
        assert_eq!(config.trt_cache_dir().unwrap(), dir.join("engines"));
        assert!(dir.join("engines").is_dir());
        std::fs::remove_dir_all(dir).unwrap();
    }

    #[test]
    fn session_options_read_from_json() {
        let config = EvalConfig::from_json(r#"{ "optimize": false, "intra_threads": 2, "trt_engine_cache": false }"#).unwrap();
        assert!(!config.optimize);
        assert_eq!(config.intra_threads, Some(2));
        assert!(!config.trt_engine_cache);
        assert_eq!(config.trt_engine_cache_path, None);
    }

    #[test]
    fn round_trips_through_json() {
        let config = EvalConfig {
            output_dir: Some(PathBuf::from("out")),
            ..Default::default()
        };
        let text = serde_json::to_string(&config).unwrap();
        assert_eq!(EvalConfig::from_json(&text).unwrap(), config);
    }
}
