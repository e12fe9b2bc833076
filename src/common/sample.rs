use crate::common::Shape4D;

/// One validation pair, both buffers flattened row-major as `H x W x C`.
#[derive(Debug, Clone, Default)]
pub struct Sample {
    pub index: usize,
    pub image: Vec<f64>,
    pub mask: Vec<f64>,
    pub image_shape: Shape4D,
    pub mask_shape: Shape4D,
}
