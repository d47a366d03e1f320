//! # segeval-metric
//!
//! Streaming semantic-segmentation metrics implemented with the Burn framework.
//!
//! Each metric turns one batch of model output and ground-truth labels into a
//! detached per-batch statistic ([`RunningMetric::calculate`]), folds it into
//! running per-class sums ([`RunningMetric::update`]) and reports a scalar at
//! any point ([`RunningMetric::value`]).
//!
//! ## Implemented Metrics
//!
//! - [`DiceScore`]: mean per-class Dice, binary or multi-class
//! - [`MeanIoU`]: mean IoU from accumulated intersections and unions
//! - [`ModifiedMeanIoU`]: mean IoU on the last stage of a multi-stage output
//! - [`PixelAccuracy`]: share of correctly labelled pixels
//!
//! With the `train` feature (on by default) each metric also plugs into
//! burn's `Learner` through [`TrainMetric`].
//!
//! ## Usage
//!
//! ```rust,ignore
//! use segeval_metric::{Evaluator, EvaluatorConfig, SegmentationInput};
//!
//! let mut evaluator = Evaluator::from_config(&EvaluatorConfig::new(21).with_ignore_index(Some(0)))?;
//! for (output, target) in batches {
//!     evaluator.process(&SegmentationInput::new_single(output, target))?;
//! }
//! println!("{}", evaluator.epoch_end()?);
//! ```
//!
//! ## Tensor layout
//!
//! - output: `[batch_size, classes, height, width]` class scores; a single
//!   channel selects binary mode for Dice and pixel accuracy
//! - target: `[batch_size, height, width]` integer labels

pub mod accumulator;
pub mod config;
pub mod decode;
pub mod dice;
pub mod error;
pub mod evaluator;
pub mod input;
pub mod iou;
pub mod metric;
pub mod one_hot;
pub mod pixel_accuracy;
pub mod stats;
pub mod summary;
#[cfg(feature = "train")]
pub mod train;

pub use config::{EvaluatorConfig, MetricKind};
pub use decode::PredictionMode;
pub use dice::{DiceScore, DiceScoreConfig};
pub use error::{MetricError, MetricResult};
pub use evaluator::{EpochReport, Evaluator, MetricBatch, SegmentationMetric};
pub use input::SegmentationInput;
pub use iou::{IoUBatch, MeanIoU, MeanIoUConfig, ModifiedMeanIoU};
pub use metric::RunningMetric;
pub use pixel_accuracy::{PixelAccuracy, PixelAccuracyConfig};
pub use summary::MetricSummary;
#[cfg(feature = "train")]
pub use train::{
    DiceMetric, MeanIoUMetric, PixelAccuracyMetric, SegmentationMetricInput, TrainMetric,
};

#[cfg(test)]
pub(crate) mod tests {
    use burn::{
        backend::NdArray,
        tensor::{Int, Tensor},
    };

    use crate::one_hot::one_hot;

    pub type TestBackend = NdArray;

    pub fn assert_close(actual: f64, expected: f64) {
        assert!(
            (actual - expected).abs() < 1e-6,
            "expected {expected}, got {actual}"
        );
    }

    /// Class scores whose arg-max is `labels`.
    pub fn scores_from_labels(
        labels: Tensor<TestBackend, 3, Int>,
        nclasses: usize,
    ) -> Tensor<TestBackend, 4> {
        one_hot(labels, nclasses).unwrap().float()
    }
}
