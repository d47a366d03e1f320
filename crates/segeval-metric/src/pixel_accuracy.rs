//! Pixel accuracy.
//!
//! Per sample, the share of scored pixels whose predicted label equals the
//! target label. Pixels labelled with the ignore index are removed from both
//! the numerator and the denominator.

use burn::{
    config::Config,
    tensor::{backend::Backend, Int, Tensor},
};

use crate::{
    accumulator::ScalarSum,
    config::{check_eps, check_nclasses},
    decode::PredictionMode,
    error::{MetricError, MetricResult},
    metric::{summarize_after_update, RunningMetric},
    stats::{check_shapes, sample_counts, SampleVector},
    summary::MetricSummary,
};

/// Configuration for creating a [pixel accuracy](PixelAccuracy) accumulator.
#[derive(Config, Debug)]
pub struct PixelAccuracyConfig {
    /// Number of classes. A value of 1 selects binary mode.
    pub nclasses: usize,
    /// Target label whose pixels are not scored.
    #[config(default = "None")]
    pub ignore_index: Option<i64>,
    /// Smoothing constant. Default: 1e-6
    #[config(default = 1e-6)]
    pub eps: f64,
    /// Binary mode only: read the output channel as a logit.
    #[config(default = true)]
    pub apply_sigmoid: bool,
    /// Print a summary after every update.
    #[config(default = false)]
    pub verbose_on_update: bool,
}

impl PixelAccuracyConfig {
    /// Initialize a [pixel accuracy](PixelAccuracy) accumulator.
    pub fn init(&self) -> MetricResult<PixelAccuracy> {
        check_nclasses(self.nclasses)?;
        check_eps(self.eps)?;

        Ok(PixelAccuracy {
            nclasses: self.nclasses,
            mode: PredictionMode::from_nclasses(self.nclasses, self.apply_sigmoid),
            ignore_index: self.ignore_index,
            eps: self.eps,
            verbose_on_update: self.verbose_on_update,
            state: ScalarSum::new(),
        })
    }
}

/// Running pixel accuracy over streamed batches.
#[derive(Debug, Clone)]
pub struct PixelAccuracy {
    nclasses: usize,
    mode: PredictionMode,
    ignore_index: Option<i64>,
    eps: f64,
    verbose_on_update: bool,
    state: ScalarSum,
}

impl PixelAccuracy {
    pub const NAME: &'static str = "Pixel Accuracy";

    /// Create a pixel accuracy with the default configuration.
    pub fn new(nclasses: usize) -> MetricResult<Self> {
        PixelAccuracyConfig::new(nclasses).init()
    }

    pub const fn mode(&self) -> PredictionMode {
        self.mode
    }

    pub const fn ignore_index(&self) -> Option<i64> {
        self.ignore_index
    }
}

impl RunningMetric for PixelAccuracy {
    type Batch = SampleVector;

    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn calculate<B: Backend>(
        &self,
        output: Tensor<B, 4>,
        target: Tensor<B, 3, Int>,
    ) -> MetricResult<SampleVector> {
        let channels = self.mode.expected_channels(self.nclasses);
        let [_, height, width] = check_shapes(&output, &target, channels)?;
        let total = (height * width) as f64;

        let prediction = self.mode.decode(output)?;
        let matches = prediction.equal(target.clone()).int();

        let (matches, ignored) = match self.ignore_index {
            Some(ignore_index) => {
                let ignored = target.equal_elem(ignore_index);
                let ignored_counts = sample_counts(ignored.clone().int());
                (
                    sample_counts(matches.mask_fill(ignored, 0)),
                    ignored_counts,
                )
            }
            None => {
                let matches = sample_counts(matches);
                let ignored = vec![0.0; matches.len()];
                (matches, ignored)
            }
        };

        let eps = self.eps;
        Ok(SampleVector::new(
            matches
                .iter()
                .zip(&ignored)
                .map(|(matched, ignored)| (matched + eps) / (total - ignored + eps))
                .collect(),
        ))
    }

    fn update(&mut self, batch: SampleVector) -> MetricResult<()> {
        self.state.add(batch.sum(), batch.batch_size());
        log::debug!(
            "{}: accumulated {} samples",
            Self::NAME,
            self.state.sample_size()
        );

        summarize_after_update(&*self, self.verbose_on_update);
        Ok(())
    }

    fn value(&self) -> MetricResult<f64> {
        self.state.mean(Self::NAME)
    }

    fn report(&self) -> MetricResult<MetricSummary> {
        Ok(MetricSummary::new(
            Self::NAME,
            self.value()?,
            self.sample_size(),
        ))
    }

    fn sample_size(&self) -> usize {
        self.state.sample_size()
    }

    fn reset(&mut self) {
        self.state.reset();
    }

    fn merge(&mut self, other: Self) -> MetricResult<()> {
        if self.mode != other.mode {
            return Err(MetricError::InvalidConfiguration {
                reason: format!(
                    "cannot merge pixel accuracies decoded as {:?} and {:?}",
                    self.mode, other.mode
                ),
            });
        }
        self.state.merge(other.state);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use burn::tensor::TensorData;

    use super::*;
    use crate::tests::{assert_close, scores_from_labels, TestBackend};

    fn labels(data: [[[i64; 2]; 2]; 1]) -> Tensor<TestBackend, 3, Int> {
        Tensor::from_data(TensorData::from(data), &Default::default())
    }

    #[test]
    fn perfect_prediction_scores_one() {
        let mut accuracy = PixelAccuracy::new(2).unwrap();
        let target = labels([[[0, 0], [1, 1]]]);

        accuracy
            .process(scores_from_labels(target.clone(), 2), target)
            .unwrap();

        assert_close(accuracy.value().unwrap(), 1.0);
    }

    #[test]
    fn counts_matching_pixels() {
        let accuracy = PixelAccuracy::new(2).unwrap();
        let target = labels([[[0, 0], [1, 1]]]);
        let output = scores_from_labels(labels([[[0, 1], [1, 1]]]), 2);

        let batch = accuracy.calculate(output, target).unwrap();

        assert_eq!(batch.batch_size(), 1);
        assert_close(batch.values()[0], 0.75);
    }

    #[test]
    fn ignored_pixels_leave_numerator_and_denominator() {
        let mut accuracy = PixelAccuracyConfig::new(2)
            .with_ignore_index(Some(1))
            .init()
            .unwrap();
        let target = labels([[[0, 1], [1, 0]]]);
        let output = scores_from_labels(labels([[[0, 0], [0, 0]]]), 2);

        accuracy.process(output, target).unwrap();

        assert_close(accuracy.value().unwrap(), 1.0);
    }

    #[test]
    fn ignore_sentinel_may_lie_outside_the_classes() {
        let accuracy = PixelAccuracyConfig::new(2)
            .with_ignore_index(Some(255))
            .init()
            .unwrap();
        let target = labels([[[0, 255], [1, 0]]]);
        let output = scores_from_labels(labels([[[0, 0], [0, 0]]]), 2);

        let batch = accuracy.calculate(output, target).unwrap();

        // Two of the three scored pixels match.
        assert_close(batch.values()[0], 2.0 / 3.0);
    }

    #[test]
    fn binary_mode_thresholds_probabilities() {
        let mut accuracy = PixelAccuracyConfig::new(1)
            .with_apply_sigmoid(false)
            .init()
            .unwrap();
        let output = Tensor::<TestBackend, 4>::from_data(
            TensorData::from([[[[0.9f32, 0.1], [0.7, 0.2]]]]),
            &Default::default(),
        );
        let target = labels([[[1, 0], [0, 0]]]);

        accuracy.process(output, target).unwrap();

        assert_close(accuracy.value().unwrap(), 0.75);
    }

    #[test]
    fn value_is_mean_over_samples() {
        let device = Default::default();
        let mut accuracy = PixelAccuracy::new(2).unwrap();
        let target = Tensor::<TestBackend, 3, Int>::from_data(
            TensorData::from([[[0, 0], [1, 1]], [[0, 0], [1, 1]]]),
            &device,
        );
        let prediction = Tensor::<TestBackend, 3, Int>::from_data(
            TensorData::from([[[0, 0], [1, 1]], [[0, 1], [1, 1]]]),
            &device,
        );

        accuracy
            .process(scores_from_labels(prediction, 2), target)
            .unwrap();

        assert_eq!(accuracy.sample_size(), 2);
        assert_close(accuracy.value().unwrap(), 0.875);
        assert!(accuracy.report().unwrap().per_class.is_empty());
    }

    #[test]
    fn reset_returns_to_fresh_state() {
        let mut accuracy = PixelAccuracy::new(2).unwrap();
        let target = labels([[[0, 0], [1, 1]]]);
        accuracy
            .process(scores_from_labels(target.clone(), 2), target)
            .unwrap();

        accuracy.reset();

        assert_eq!(accuracy.sample_size(), 0);
        assert!(matches!(
            accuracy.value(),
            Err(MetricError::EmptyAccumulator { .. })
        ));
    }
}
