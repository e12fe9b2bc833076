mod inference_engine;
mod inference_session;
mod ort_engine;
mod tensor_view;

pub use inference_engine::{ElementType, InferenceEngine, TensorAttrs};
pub use inference_session::{InferenceOutput, InferenceSession, SessionHandle};
pub use ort_engine::OrtEngine;
pub use tensor_view::{row_major_strides, Layout, OwnedTensor, TensorView};
