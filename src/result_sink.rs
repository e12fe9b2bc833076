//! Where the binary masks of an evaluation end up.

use std::path::{Path, PathBuf};

use image::GrayImage;

use crate::data::{create_directory, FsAccess};
use crate::error::EvalError;
use crate::evaluation::BinaryMasks;
use crate::Result;

pub const PREDICTED_MASK_FILE: &str = "predicted_mask.png";
pub const GROUND_TRUTH_MASK_FILE: &str = "ground_truth_mask.png";

/// Consumes the masks once scoring is complete. Implementations may block.
pub trait ResultSink {
    fn present(&self, masks: &BinaryMasks) -> Result<()>;
}

/// Discards every result.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl ResultSink for NullSink {
    fn present(&self, _masks: &BinaryMasks) -> Result<()> {
        Ok(())
    }
}

/// Writes both masks as 8-bit grayscale PNGs side by side in one directory.
#[derive(Debug, Clone)]
pub struct PngMaskSink {
    dir: PathBuf,
}

impl PngMaskSink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// `./results/<subs..>` under the working directory.
    pub fn in_results(subs: &[&str]) -> Result<Self> {
        Ok(Self::new(FsAccess::save_out(subs)?))
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn predicted_path(&self) -> PathBuf {
        self.dir.join(PREDICTED_MASK_FILE)
    }

    pub fn ground_truth_path(&self) -> PathBuf {
        self.dir.join(GROUND_TRUTH_MASK_FILE)
    }
}

impl ResultSink for PngMaskSink {
    fn present(&self, masks: &BinaryMasks) -> Result<()> {
        create_directory(&self.dir)?;
        save_gray(masks.width, masks.height, &masks.predicted, &self.predicted_path())?;
        save_gray(masks.width, masks.height, &masks.ground_truth, &self.ground_truth_path())?;
        log::info!("Saved masks to {}", self.dir.display());
        Ok(())
    }
}

fn save_gray(width: usize, height: usize, pixels: &[u8], path: &Path) -> Result<()> {
    let img = GrayImage::from_raw(width as u32, height as u32, pixels.to_vec()).ok_or_else(|| {
        EvalError::Sink(format!(
            "{} pixels do not fill a {width}x{height} image",
            pixels.len()
        ))
    })?;
    img.save(path)
        .map_err(|e| EvalError::Sink(format!("cannot write {}: {e}", path.display())))
}
