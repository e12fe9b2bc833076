use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::filter::LevelFilter;

use unet_eval::common::InferenceDevice;
use unet_eval::data::EvalConfig;
use unet_eval::evaluate_with_config;
use unet_eval::result_sink::{NullSink, PngMaskSink, ResultSink};

/// Evaluate a U-Net segmentation model on one validation sample.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// JSON config file; flags override its values
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,
    /// Validation archive holding `imgs_validation` and `msks_validation`
    #[arg(long, value_name = "FILE")]
    pub data: Option<PathBuf>,
    /// Directory with one subdirectory per precision (FP32, FP16)
    #[arg(long, value_name = "DIR")]
    pub model_dir: Option<PathBuf>,
    /// Model file stem, without extension
    #[arg(long, value_name = "NAME")]
    pub model_name: Option<String>,
    /// ONNX Runtime shared library
    #[arg(long, value_name = "FILE")]
    pub ort_lib: Option<String>,
    /// Inference device
    #[arg(long, value_name = "DEVICE")]
    pub device: Option<String>,
    #[arg(long, value_name = "N")]
    pub device_id: Option<usize>,
    /// Sample index; clamped into range
    #[arg(long, value_name = "N", allow_negative_numbers = true)]
    pub index: Option<i64>,
    /// Directory for the PNG masks (default: ./results/masks)
    #[arg(long, value_name = "DIR")]
    pub output: Option<PathBuf>,
    /// Do not write the masks
    #[arg(long)]
    pub no_save: bool,
    /// Skip ONNX Runtime graph optimization
    #[arg(long)]
    pub no_optimize: bool,
    #[arg(long, value_name = "N")]
    pub intra_threads: Option<usize>,
    /// TensorRT engine cache (default: <cache dir>/unet_eval/trt-cache)
    #[arg(long, value_name = "DIR")]
    pub trt_cache: Option<PathBuf>,
    /// Rebuild TensorRT engines on every run
    #[arg(long)]
    pub no_trt_cache: bool,
    /// Print the report as JSON
    #[arg(long)]
    pub json: bool,
    #[arg(short, long)]
    pub verbose: bool,
}

impl Args {
    fn into_config(self) -> Result<EvalConfig> {
        let mut config = match &self.config {
            Some(path) => EvalConfig::from_file(path)?,
            None => EvalConfig::default(),
        };
        if let Some(x) = self.data {
            config.data_path = x;
        }
        if let Some(x) = self.model_dir {
            config.model_dir = x;
        }
        if let Some(x) = self.model_name {
            config.model_name = x;
        }
        if let Some(x) = self.ort_lib {
            config.ort_lib_path = x;
        }
        if let Some(x) = self.device {
            config.device = x;
        }
        if let Some(x) = self.device_id {
            config.device_id = x;
        }
        if let Some(x) = self.index {
            config.image_index = x;
        }
        if let Some(x) = self.output {
            config.output_dir = Some(x);
        }
        if self.no_save {
            config.save_masks = false;
        }
        if self.no_optimize {
            config.optimize = false;
        }
        if let Some(n) = self.intra_threads {
            config.intra_threads = Some(n);
        }
        if let Some(x) = self.trt_cache {
            config.trt_engine_cache_path = Some(x);
        }
        if self.no_trt_cache {
            config.trt_engine_cache = false;
        }
        Ok(config)
    }
}

fn main() -> Result<()> {
    let args = Args::parse();
    let level = if args.verbose { LevelFilter::DEBUG } else { LevelFilter::INFO };
    tracing_subscriber::fmt().with_max_level(level).init();

    let json = args.json;
    let config = args.into_config()?;
    if !InferenceDevice::is_valid_inference_device(&config.device) {
        log::warn!(
            "Unknown device `{}`, expected one of {:?}",
            config.device,
            InferenceDevice::all_inference_devices()
        );
    }
    log::debug!("\n{}", config.to_string());

    let sink: Box<dyn ResultSink> = match (&config.output_dir, config.save_masks) {
        (_, false) => Box::new(NullSink),
        (Some(dir), true) => Box::new(PngMaskSink::new(dir)),
        (None, true) => Box::new(PngMaskSink::in_results(&["masks"])?),
    };

    let report = evaluate_with_config(&config, sink.as_ref())
        .with_context(|| format!("evaluation of {} failed", config.data_path.display()))?;

    if json {
        println!("{}", report.to_json()?);
    } else {
        println!("{report}");
    }
    Ok(())
}
