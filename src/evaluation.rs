//! Thresholding, confusion counts and the smoothed Dice coefficient.

use serde::Serialize;

use crate::common::Shape4D;
use crate::error::EvalError;
use crate::inference_runners::InferenceOutput;
use crate::Result;

/// A prediction counts as positive strictly above this confidence.
pub const PREDICTION_THRESHOLD: f64 = 0.5;
/// A ground-truth pixel counts as positive strictly above this value.
pub const GROUND_TRUTH_THRESHOLD: f64 = 0.0;

pub const MASK_POSITIVE: u8 = 255;
pub const MASK_NEGATIVE: u8 = 0;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ConfusionCounts {
    pub intersection: u64,
    /// Positives in exactly one of the two masks.
    pub union: u64,
    pub predicted_positive: u64,
    pub ground_truth_positive: u64,
}

impl ConfusionCounts {
    /// `(2*|A∩B| + 1) / (|A| + |B| + 1)`, or no score when nothing was predicted.
    pub fn dice(&self) -> DiceScore {
        if self.predicted_positive == 0 {
            return DiceScore::NoPositivePrediction;
        }
        let numerator = 2.0 * self.intersection as f64 + 1.0;
        let denominator = (self.ground_truth_positive + self.predicted_positive) as f64 + 1.0;
        DiceScore::Coefficient(numerator / denominator)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DiceScore {
    Coefficient(f64),
    /// No pixel crossed the prediction threshold. A valid outcome, not an error.
    NoPositivePrediction,
}

impl DiceScore {
    pub fn value(&self) -> Option<f64> {
        match self {
            DiceScore::Coefficient(x) => Some(*x),
            DiceScore::NoPositivePrediction => None,
        }
    }
}

impl std::fmt::Display for DiceScore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DiceScore::Coefficient(x) => write!(f, "dice_coeff {x:.6}"),
            DiceScore::NoPositivePrediction => f.write_str("No Tumor found"),
        }
    }
}

/// Two `height x width` grids of [`MASK_POSITIVE`] / [`MASK_NEGATIVE`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BinaryMasks {
    pub height: usize,
    pub width: usize,
    pub predicted: Vec<u8>,
    pub ground_truth: Vec<u8>,
}

impl BinaryMasks {
    pub fn predicted_at(&self, h: usize, w: usize) -> Option<u8> {
        self.predicted.get(h * self.width + w).copied()
    }

    pub fn ground_truth_at(&self, h: usize, w: usize) -> Option<u8> {
        self.ground_truth.get(h * self.width + w).copied()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Evaluation {
    pub counts: ConfusionCounts,
    pub score: DiceScore,
    pub masks: BinaryMasks,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SegmentationEvaluator {
    prediction_threshold: f64,
    ground_truth_threshold: f64,
}

impl Default for SegmentationEvaluator {
    fn default() -> Self {
        Self::new(PREDICTION_THRESHOLD, GROUND_TRUTH_THRESHOLD)
    }
}

impl SegmentationEvaluator {
    pub fn new(prediction_threshold: f64, ground_truth_threshold: f64) -> Self {
        Self {
            prediction_threshold,
            ground_truth_threshold,
        }
    }

    pub fn prediction_threshold(&self) -> f64 {
        self.prediction_threshold
    }

    pub fn ground_truth_threshold(&self) -> f64 {
        self.ground_truth_threshold
    }

    #[inline]
    fn is_predicted(&self, x: f32) -> bool {
        f64::from(x) > self.prediction_threshold
    }

    #[inline]
    fn is_ground_truth(&self, x: f64) -> bool {
        x > self.ground_truth_threshold
    }

    /// One pass over every element of both buffers.
    pub fn counts(&self, prediction: &[f32], ground_truth: &[f64]) -> Result<ConfusionCounts> {
        check_lengths(prediction.len(), ground_truth.len())?;

        let mut counts = ConfusionCounts::default();
        for (&p, &g) in prediction.iter().zip(ground_truth) {
            match (self.is_predicted(p), self.is_ground_truth(g)) {
                (true, true) => {
                    counts.intersection += 1;
                    counts.predicted_positive += 1;
                    counts.ground_truth_positive += 1;
                }
                (true, false) => {
                    counts.predicted_positive += 1;
                    counts.union += 1;
                }
                (false, true) => {
                    counts.ground_truth_positive += 1;
                    counts.union += 1;
                }
                (false, false) => {}
            }
        }
        Ok(counts)
    }

    pub fn score(&self, prediction: &InferenceOutput, ground_truth: &[f64]) -> Result<DiceScore> {
        Ok(self.counts(prediction.as_slice(), ground_truth)?.dice())
    }

    /// Displayable masks from channel 0 of every pixel of `shape`. A pixel
    /// without channels is negative in both grids.
    pub fn masks(&self, prediction: &[f32], ground_truth: &[f64], shape: Shape4D) -> Result<BinaryMasks> {
        check_lengths(prediction.len(), ground_truth.len())?;
        check_lengths(shape.sample_len(), ground_truth.len())?;

        let (height, width, channels) = (shape.height, shape.width, shape.channels);
        let mut predicted = Vec::with_capacity(height * width);
        let mut truth = Vec::with_capacity(height * width);
        for px in 0..height * width {
            let idx = px * channels;
            let p = prediction.get(idx).is_some_and(|&x| self.is_predicted(x));
            let g = ground_truth.get(idx).is_some_and(|&x| self.is_ground_truth(x));
            predicted.push(binary(p));
            truth.push(binary(g));
        }

        Ok(BinaryMasks {
            height,
            width,
            predicted,
            ground_truth: truth,
        })
    }

    pub fn evaluate(
        &self,
        prediction: &InferenceOutput,
        ground_truth: &[f64],
        mask_shape: Shape4D,
    ) -> Result<Evaluation> {
        let counts = self.counts(prediction.as_slice(), ground_truth)?;
        let masks = self.masks(prediction.as_slice(), ground_truth, mask_shape)?;
        let score = counts.dice();
        match score {
            DiceScore::Coefficient(x) => log::info!("dice_coeff {x}"),
            DiceScore::NoPositivePrediction => log::info!("No Tumor found"),
        }
        Ok(Evaluation { counts, score, masks })
    }
}

fn binary(positive: bool) -> u8 {
    if positive {
        MASK_POSITIVE
    } else {
        MASK_NEGATIVE
    }
}

fn check_lengths(expected: usize, actual: usize) -> Result<()> {
    if expected == actual {
        Ok(())
    } else {
        Err(EvalError::ShapeMismatch { expected, actual })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn perfect_match_scores_one() {
        let gt = [0.0, 1.0, 1.0, 0.0, 1.0];
        let pred = [0.1, 0.9, 0.6, 0.5, 0.51];
        let counts = SegmentationEvaluator::default().counts(&pred, &gt).unwrap();
        assert_eq!(counts.intersection, 3);
        assert_eq!(counts.union, 0);
        assert_eq!(counts.dice(), DiceScore::Coefficient(1.0));
    }

    #[test]
    fn exactly_half_is_not_positive() {
        let counts = SegmentationEvaluator::default().counts(&[0.5], &[1.0]).unwrap();
        assert_eq!(counts.predicted_positive, 0);
        assert_eq!(counts.dice(), DiceScore::NoPositivePrediction);
    }

    #[test]
    fn any_positive_ground_truth_counts() {
        let counts = SegmentationEvaluator::default().counts(&[0.9, 0.9], &[1e-9, 0.0]).unwrap();
        assert_eq!(counts.ground_truth_positive, 1);
        assert_eq!(counts.intersection, 1);
        assert_eq!(counts.union, 1);
    }

    #[test]
    fn disjoint_masks() {
        let pred = [0.9, 0.9, 0.0, 0.0, 0.0];
        let gt = [0.0, 0.0, 1.0, 1.0, 1.0];
        let counts = SegmentationEvaluator::default().counts(&pred, &gt).unwrap();
        assert_eq!(counts.intersection, 0);
        assert_eq!(counts.union, 5);
        assert_eq!(counts.dice(), DiceScore::Coefficient(1.0 / 6.0));
    }

    #[test]
    fn empty_ground_truth_with_prediction() {
        let counts = SegmentationEvaluator::default().counts(&[0.9, 0.1], &[0.0, 0.0]).unwrap();
        // (0 + 1) / (0 + 1 + 1)
        assert_eq!(counts.dice(), DiceScore::Coefficient(0.5));
    }

    #[test]
    fn partial_overlap_uses_smoothed_formula() {
        let pred = [0.9, 0.9, 0.9, 0.0];
        let gt = [1.0, 1.0, 0.0, 1.0];
        let counts = SegmentationEvaluator::default().counts(&pred, &gt).unwrap();
        assert_eq!(
            counts,
            ConfusionCounts {
                intersection: 2,
                union: 2,
                predicted_positive: 3,
                ground_truth_positive: 3,
            }
        );
        assert_eq!(counts.dice().value(), Some(5.0 / 7.0));
    }

    #[test]
    fn length_mismatch_is_reported() {
        let err = SegmentationEvaluator::default().counts(&[0.9; 3], &[1.0; 4]).unwrap_err();
        assert!(matches!(err, EvalError::ShapeMismatch { expected: 3, actual: 4 }));
    }

    #[test]
    fn custom_thresholds_apply() {
        let evaluator = SegmentationEvaluator::new(0.8, 0.5);
        let counts = evaluator.counts(&[0.7, 0.9], &[0.4, 0.6]).unwrap();
        assert_eq!(counts.predicted_positive, 1);
        assert_eq!(counts.ground_truth_positive, 1);
        assert_eq!(counts.intersection, 1);
    }

    #[test]
    fn masks_follow_pixel_classification() {
        let shape = Shape4D::new(1, 2, 2, 1);
        let pred = [0.9, 0.2, 0.7, 0.0];
        let gt = [1.0, 1.0, 0.0, 0.0];
        let masks = SegmentationEvaluator::default().masks(&pred, &gt, shape).unwrap();
        assert_eq!(masks.predicted, vec![255, 0, 255, 0]);
        assert_eq!(masks.ground_truth, vec![255, 255, 0, 0]);
        assert_eq!(masks.predicted_at(1, 0), Some(255));
        assert_eq!(masks.ground_truth_at(0, 1), Some(255));
    }

    #[test]
    fn channelless_mask_yields_negative_grids() {
        let shape = Shape4D::new(1, 4, 4, 0);
        let evaluation = SegmentationEvaluator::default()
            .evaluate(&InferenceOutput::from(Vec::new()), &[], shape)
            .unwrap();
        assert_eq!(evaluation.score, DiceScore::NoPositivePrediction);
        assert_eq!(evaluation.masks.predicted, vec![0; 16]);
        assert_eq!(evaluation.masks.ground_truth, vec![0; 16]);
    }

    #[test]
    fn masks_read_first_channel() {
        let shape = Shape4D::new(1, 1, 2, 2);
        let pred = [0.9, 0.0, 0.0, 0.9];
        let gt = [0.0, 1.0, 1.0, 0.0];
        let masks = SegmentationEvaluator::default().masks(&pred, &gt, shape).unwrap();
        assert_eq!(masks.predicted, vec![255, 0]);
        assert_eq!(masks.ground_truth, vec![0, 255]);
    }
}
