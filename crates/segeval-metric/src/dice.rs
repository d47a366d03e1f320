//! Dice score.
//!
//! Per class and per sample, `Dice = (2 * |P ∩ T| + eps) / (|P| + |T| + eps)`.
//! The running value is the mean over classes of the per-class mean over
//! samples.

use burn::{
    config::Config,
    tensor::{backend::Backend, Int, Tensor},
};

use crate::{
    accumulator::PerClassSum,
    config::{check_eps, check_nclasses},
    decode::PredictionMode,
    error::{MetricError, MetricResult},
    metric::{summarize_after_update, RunningMetric},
    one_hot::{one_hot, one_hot_masked},
    stats::{check_shapes, spatial_counts, ClassSampleMatrix},
    summary::MetricSummary,
};

/// Configuration for creating a [Dice score](DiceScore).
#[derive(Config, Debug)]
pub struct DiceScoreConfig {
    /// Number of classes. A value of 1 selects binary mode.
    pub nclasses: usize,
    /// Target label whose pixels are excluded from every class.
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

impl DiceScoreConfig {
    /// Initialize a [Dice score](DiceScore) accumulator.
    pub fn init(&self) -> MetricResult<DiceScore> {
        check_nclasses(self.nclasses)?;
        check_eps(self.eps)?;

        let mode = PredictionMode::from_nclasses(self.nclasses, self.apply_sigmoid);
        let nclasses = mode.effective_classes(self.nclasses);
        Ok(DiceScore {
            nclasses,
            mode,
            ignore_index: self.ignore_index,
            eps: self.eps,
            verbose_on_update: self.verbose_on_update,
            state: PerClassSum::new(nclasses),
        })
    }
}

/// Running Dice score over streamed batches.
#[derive(Debug, Clone)]
pub struct DiceScore {
    nclasses: usize,
    mode: PredictionMode,
    ignore_index: Option<i64>,
    eps: f64,
    verbose_on_update: bool,
    state: PerClassSum,
}

impl DiceScore {
    pub const NAME: &'static str = "Dice Score";

    /// Create a Dice score with the default configuration.
    pub fn new(nclasses: usize) -> MetricResult<Self> {
        DiceScoreConfig::new(nclasses).init()
    }

    /// Number of classes after decoding (2 in binary mode).
    pub const fn nclasses(&self) -> usize {
        self.nclasses
    }

    pub const fn mode(&self) -> PredictionMode {
        self.mode
    }

    pub const fn ignore_index(&self) -> Option<i64> {
        self.ignore_index
    }

    /// Mean Dice of each class over the accumulated samples.
    pub fn class_values(&self) -> MetricResult<Vec<f64>> {
        self.state.means(Self::NAME)
    }
}

impl RunningMetric for DiceScore {
    type Batch = ClassSampleMatrix;

    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn calculate<B: Backend>(
        &self,
        output: Tensor<B, 4>,
        target: Tensor<B, 3, Int>,
    ) -> MetricResult<ClassSampleMatrix> {
        let channels = self.mode.expected_channels(self.nclasses);
        let [batch_size, _, _] = check_shapes(&output, &target, channels)?;

        let prediction = self.mode.decode(output)?;
        let (prediction, target) = match self.ignore_index {
            // Ignored target pixels are dropped from both masks, so they are
            // neither a hit nor a false positive for any class.
            Some(ignore_index) => {
                let ignored = target.clone().equal_elem(ignore_index);
                (
                    one_hot_masked(prediction, self.nclasses, ignored.clone())?,
                    one_hot_masked(target, self.nclasses, ignored)?,
                )
            }
            None => (
                one_hot(prediction, self.nclasses)?,
                one_hot(target, self.nclasses)?,
            ),
        };
        let prediction = prediction.int();
        let target = target.int();

        let counts = |mask: Tensor<B, 4, Int>| {
            ClassSampleMatrix::from_sample_major(self.nclasses, batch_size, &spatial_counts(mask))
        };
        let intersection = counts(prediction.clone() * target.clone())?;
        let total = counts(prediction + target)?;

        let eps = self.eps;
        intersection.zip_with(&total, |intersection, total| {
            (2.0 * intersection + eps) / (total + eps)
        })
    }

    fn update(&mut self, batch: ClassSampleMatrix) -> MetricResult<()> {
        if batch.nclasses() != self.nclasses {
            return Err(MetricError::ClassCountMismatch {
                expected: self.nclasses,
                actual: batch.nclasses(),
            });
        }
        self.state.add(&batch.class_sums())?;
        self.state.add_samples(batch.batch_size());
        log::debug!(
            "{}: accumulated {} samples",
            Self::NAME,
            self.state.sample_size()
        );

        summarize_after_update(&*self, self.verbose_on_update);
        Ok(())
    }

    fn value(&self) -> MetricResult<f64> {
        let class_values = self.class_values()?;
        Ok(class_values.iter().sum::<f64>() / class_values.len() as f64)
    }

    fn report(&self) -> MetricResult<MetricSummary> {
        Ok(
            MetricSummary::new(Self::NAME, self.value()?, self.sample_size())
                .with_per_class(self.class_values()?),
        )
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
                    "cannot merge Dice scores decoded as {:?} and {:?}",
                    self.mode, other.mode
                ),
            });
        }
        self.state.merge(other.state)
    }
}
