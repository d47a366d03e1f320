//! Adapters that plug the running metrics into burn's `Learner`.
//!
//! ```rust,ignore
//! let dice = DiceMetric::from(DiceScoreConfig::new(21).with_verbose_on_update(false).init()?);
//! let learner = LearnerBuilder::new(artifact_dir).metric_valid_numeric(dice);
//! ```

use core::marker::PhantomData;

use burn::{
    prelude::*,
    tensor::backend::Backend,
    train::metric::{Metric, MetricEntry, MetricMetadata, Numeric},
};
use derive_new::new;

use crate::{dice::DiceScore, iou::MeanIoU, metric::RunningMetric, pixel_accuracy::PixelAccuracy};

/// Model output and labels handed to the training-loop metrics.
#[derive(new, Debug, Clone)]
pub struct SegmentationMetricInput<B: Backend> {
    /// Class scores with shape `[batch_size, classes, height, width]`.
    pub output: Tensor<B, 4>,
    /// Labels with shape `[batch_size, height, width]`.
    pub target: Tensor<B, 3, Int>,
}

/// A [`RunningMetric`] exposed as a burn [`Metric`] and [`Numeric`].
///
/// `Metric::update` cannot fail, so a batch the metric rejects is logged and
/// skipped; the entry then repeats the value accumulated so far.
#[derive(Debug, Clone)]
pub struct TrainMetric<B: Backend, M> {
    metric: M,
    _b: PhantomData<B>,
}

pub type DiceMetric<B> = TrainMetric<B, DiceScore>;
pub type MeanIoUMetric<B> = TrainMetric<B, MeanIoU>;
pub type PixelAccuracyMetric<B> = TrainMetric<B, PixelAccuracy>;

impl<B: Backend, M: RunningMetric> TrainMetric<B, M> {
    pub const fn new(metric: M) -> Self {
        Self {
            metric,
            _b: PhantomData,
        }
    }

    pub const fn inner(&self) -> &M {
        &self.metric
    }

    pub fn into_inner(self) -> M {
        self.metric
    }

    /// The running value, or 0 before the first accepted batch.
    fn current(&self) -> f64 {
        self.metric.value().unwrap_or(0.0)
    }
}

impl<B: Backend, M: RunningMetric> From<M> for TrainMetric<B, M> {
    fn from(metric: M) -> Self {
        Self::new(metric)
    }
}

impl<B, M> Metric for TrainMetric<B, M>
where
    B: Backend,
    M: RunningMetric + Send + Sync,
{
    type Input = SegmentationMetricInput<B>;

    fn name(&self) -> String {
        self.metric.name().to_owned()
    }

    fn update(&mut self, item: &Self::Input, _metadata: &MetricMetadata) -> MetricEntry {
        if let Err(err) = self
            .metric
            .process(item.output.clone(), item.target.clone())
        {
            log::error!("{}: skipping batch: {err}", self.metric.name());
        }
        let value = self.current();
        MetricEntry::new(self.name(), format!("{value:.5}"), format!("{value:.5}"))
    }

    fn clear(&mut self) {
        self.metric.reset();
    }
}

impl<B, M> Numeric for TrainMetric<B, M>
where
    B: Backend,
    M: RunningMetric,
{
    fn value(&self) -> f64 {
        self.current()
    }
}

#[cfg(test)]
mod tests {
    use burn::{data::dataloader::Progress, tensor::TensorData};

    use super::*;
    use crate::{
        dice::DiceScoreConfig,
        iou::{MeanIoUConfig, ModifiedMeanIoU},
        pixel_accuracy::PixelAccuracyConfig,
        tests::{assert_close, scores_from_labels, TestBackend},
    };

    fn metadata() -> MetricMetadata {
        MetricMetadata {
            progress: Progress {
                items_processed: 1,
                items_total: 1,
            },
            epoch: 0,
            epoch_total: 1,
            iteration: 0,
            lr: None,
        }
    }

    fn input(
        prediction: [[[i64; 2]; 2]; 1],
        target: [[[i64; 2]; 2]; 1],
    ) -> SegmentationMetricInput<TestBackend> {
        let device = Default::default();
        let prediction =
            Tensor::<TestBackend, 3, Int>::from_data(TensorData::from(prediction), &device);
        let target = Tensor::from_data(TensorData::from(target), &device);
        SegmentationMetricInput::new(scores_from_labels(prediction, 2), target)
    }

    fn dice() -> DiceMetric<TestBackend> {
        DiceScoreConfig::new(2)
            .with_verbose_on_update(false)
            .init()
            .unwrap()
            .into()
    }

    #[test]
    fn entry_carries_the_running_value() {
        let mut metric = dice();

        let entry = metric.update(
            &input([[[0, 0], [1, 1]]], [[[0, 0], [1, 1]]]),
            &metadata(),
        );

        assert_eq!(entry.name, DiceScore::NAME);
        assert_eq!(entry.formatted, "1.00000");
        assert_eq!(entry.serialize, "1.00000");
        assert_close(Numeric::value(&metric), 1.0);
        assert_eq!(metric.inner().sample_size(), 1);
    }

    #[test]
    fn clear_returns_to_a_fresh_metric() {
        let mut metric = dice();
        metric.update(
            &input([[[0, 0], [1, 1]]], [[[0, 0], [1, 1]]]),
            &metadata(),
        );

        metric.clear();

        assert_eq!(metric.inner().sample_size(), 0);
        assert_close(Numeric::value(&metric), 0.0);
    }

    #[test]
    fn rejected_batch_is_skipped() {
        let mut metric: MeanIoUMetric<TestBackend> = MeanIoUConfig::new(2)
            .with_verbose_on_update(false)
            .init()
            .unwrap()
            .into();
        metric.update(
            &input([[[0, 0], [1, 1]]], [[[0, 0], [1, 1]]]),
            &metadata(),
        );

        let entry = metric.update(
            &input([[[0, 0], [1, 1]]], [[[0, 7], [1, 1]]]),
            &metadata(),
        );

        assert_eq!(entry.formatted, "1.00000");
        assert_eq!(metric.inner().sample_size(), 1);
    }

    #[test]
    fn accumulates_across_training_iterations() {
        let mut metric: PixelAccuracyMetric<TestBackend> = PixelAccuracyConfig::new(2)
            .with_verbose_on_update(false)
            .init()
            .unwrap()
            .into();

        metric.update(
            &input([[[0, 0], [1, 1]]], [[[0, 0], [1, 1]]]),
            &metadata(),
        );
        let entry = metric.update(
            &input([[[1, 1], [0, 0]]], [[[0, 0], [1, 1]]]),
            &metadata(),
        );

        assert_eq!(entry.name, PixelAccuracy::NAME);
        assert_close(Numeric::value(&metric), 0.5);
        assert_eq!(metric.into_inner().sample_size(), 2);
    }

    #[test]
    fn any_running_metric_can_be_wrapped() {
        let mut metric = TrainMetric::<TestBackend, _>::new(ModifiedMeanIoU::from(
            MeanIoUConfig::new(2)
                .with_verbose_on_update(false)
                .init()
                .unwrap(),
        ));

        metric.update(
            &input([[[0, 0], [1, 1]]], [[[0, 0], [1, 1]]]),
            &metadata(),
        );

        assert_eq!(Metric::name(&metric), ModifiedMeanIoU::NAME);
        assert_close(Numeric::value(&metric), 1.0);
    }
}
