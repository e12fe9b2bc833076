mod inference_device;
mod precision;
mod sample;
mod shape;

pub use inference_device::*;
pub use precision::*;
pub use sample::*;
pub use shape::*;
