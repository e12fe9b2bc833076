use serde::Serialize;

/// Dimensions of a batch stored as `count x height x width x channels`.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Shape4D {
    pub count: usize,
    pub height: usize,
    pub width: usize,
    pub channels: usize,
}

impl Shape4D {
    pub fn new(count: usize, height: usize, width: usize, channels: usize) -> Self {
        Self {
            count,
            height,
            width,
            channels,
        }
    }

    /// Builds a shape from the dims of a 4-D array, or `None` for any other rank.
    pub fn from_dims(dims: &[usize]) -> Option<Self> {
        match dims {
            &[count, height, width, channels] => Some(Self::new(count, height, width, channels)),
            _ => None,
        }
    }

    /// Number of elements in a single sample (`H*W*C`).
    pub fn sample_len(&self) -> usize {
        self.height * self.width * self.channels
    }

    /// Number of elements in the whole batch.
    pub fn total_len(&self) -> usize {
        self.count * self.sample_len()
    }

    /// `sample_len`, or `None` when it does not fit in `usize`.
    pub fn checked_sample_len(&self) -> Option<usize> {
        self.height.checked_mul(self.width)?.checked_mul(self.channels)
    }

    /// `total_len`, or `None` when it does not fit in `usize`.
    pub fn checked_total_len(&self) -> Option<usize> {
        self.count.checked_mul(self.checked_sample_len()?)
    }

    /// The same per-sample dims with a batch of one.
    pub fn single(&self) -> Self {
        Self { count: 1, ..*self }
    }

    pub fn as_nhwc(&self) -> [usize; 4] {
        [self.count, self.height, self.width, self.channels]
    }
}

impl std::fmt::Display for Shape4D {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "H={}, W={}, C={}, N={}",
            self.height, self.width, self.channels, self.count
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_rank_four_is_accepted() {
        assert_eq!(Shape4D::from_dims(&[2, 4, 4, 1]), Some(Shape4D::new(2, 4, 4, 1)));
        assert_eq!(Shape4D::from_dims(&[4, 4, 1]), None);
        assert_eq!(Shape4D::from_dims(&[1, 2, 4, 4, 1]), None);
    }

    #[test]
    fn lengths() {
        let shape = Shape4D::new(3, 128, 128, 4);
        assert_eq!(shape.sample_len(), 128 * 128 * 4);
        assert_eq!(shape.total_len(), 3 * 128 * 128 * 4);
        assert_eq!(shape.single().as_nhwc(), [1, 128, 128, 4]);
        assert_eq!(shape.checked_total_len(), Some(shape.total_len()));
    }

    #[test]
    fn oversized_dims_have_no_length() {
        assert_eq!(Shape4D::new(usize::MAX, 2, 1, 1).checked_total_len(), None);
        assert_eq!(Shape4D::new(0, usize::MAX, 2, 1).checked_sample_len(), None);
        assert_eq!(Shape4D::new(0, usize::MAX, 2, 1).checked_total_len(), None);
        assert_eq!(Shape4D::new(0, 4, 4, 1).checked_total_len(), Some(0));
    }
}
