mod config_ort;
mod eval_config;
mod filesystem_access;
mod time_calc;

pub use config_ort::ConfigOrt;
pub use eval_config::{EvalConfig, DEFAULT_DATA_PATH, DEFAULT_MODEL_DIR, DEFAULT_MODEL_NAME};
pub use filesystem_access::{create_directory, FsAccess};
pub use time_calc::{as_millis_f64, TimeCalc};

pub(crate) const CROSS_MARK: &str = "❌";
