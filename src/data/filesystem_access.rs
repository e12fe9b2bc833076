//! Base directories the evaluator writes results into.

use std::path::{Path, PathBuf};

use crate::error::EvalError;
use crate::Result;

const APP_DIR: &str = "unet_eval";

#[derive(Debug, Clone, Copy)]
pub enum FsAccess {
    Cache,
    Current,
}

impl FsAccess {
    /// `./results/<subs..>` relative to the working directory, created on demand.
    pub fn save_out(subs: &[&str]) -> Result<PathBuf> {
        let mut all = vec!["results"];
        all.extend_from_slice(subs);
        Self::Current.raw_path_with_subs(&all)
    }

    /// Retrieves the base path for the specified directory type, optionally appending the
    /// `unet_eval` application subdirectory.
    fn get_path(&self, raw: bool) -> Result<PathBuf> {
        let base_path = match self {
            FsAccess::Cache => dirs::cache_dir(),
            FsAccess::Current => std::env::current_dir().ok(),
        };

        let mut path = base_path.ok_or_else(|| {
            EvalError::Sink(format!("cannot resolve the {:?} directory on this system", self))
        })?;

        if !raw {
            path.push(APP_DIR);
        }
        Ok(path)
    }

    /// Application directory with `subs` appended, e.g. `~/.cache/unet_eval/trt-cache`,
    /// created if missing.
    pub fn path_with_subs(&self, subs: &[&str]) -> Result<PathBuf> {
        let mut d = self.get_path(false)?;
        append_subs(&mut d, subs)?;
        Ok(d)
    }

    /// Base directory (no application subdirectory) with `subs` appended, created if missing.
    pub fn raw_path_with_subs(&self, subs: &[&str]) -> Result<PathBuf> {
        let mut d = self.get_path(true)?;
        append_subs(&mut d, subs)?;
        Ok(d)
    }
}

fn append_subs(path: &mut PathBuf, subs: &[&str]) -> Result<()> {
    for sub in subs {
        path.push(sub);
    }
    create_directory(path)
}

/// Creates `path` and its parents if they do not exist.
pub fn create_directory(path: &Path) -> Result<()> {
    if !path.exists() {
        std::fs::create_dir_all(path)
            .map_err(|e| EvalError::Sink(format!("cannot create {}: {e}", path.display())))?;
    }
    Ok(())
}
