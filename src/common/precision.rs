use serde::{Deserialize, Serialize};

/// Numeric precision the model weights are stored in. Doubles as the name of
/// the per-precision model subdirectory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PrecisionTag {
    FP32,
    FP16,
}

impl PrecisionTag {
    pub fn as_str(&self) -> &'static str {
        match self {
            PrecisionTag::FP32 => "FP32",
            PrecisionTag::FP16 => "FP16",
        }
    }

    pub fn is_half(&self) -> bool {
        matches!(self, PrecisionTag::FP16)
    }
}

impl std::fmt::Display for PrecisionTag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
