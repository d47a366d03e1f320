//! Mean Intersection-over-Union.
//!
//! Intersections and unions are summed per class over every sample; the
//! per-class IoU is `(I + eps) / (U + eps)` and mIoU averages it over the
//! classes, leaving out the ignored class when one is configured.
//!
//! Decoding is always arg-max. Unlike Dice and pixel accuracy there is no
//! binary branch, so a single-channel output is scored as one class.

use burn::{
    config::Config,
    tensor::{backend::Backend, Int, Tensor},
};

use crate::{
    accumulator::PerClassSum,
    config::{check_eps, check_nclasses},
    decode::multi_class_prediction,
    error::{MetricError, MetricResult},
    metric::{summarize_after_update, RunningMetric},
    one_hot::one_hot,
    stats::{check_shapes, spatial_counts, ClassSampleMatrix},
    summary::MetricSummary,
};

/// Configuration for creating a [mean IoU](MeanIoU) accumulator.
#[derive(Config, Debug)]
pub struct MeanIoUConfig {
    /// Number of classes (output channels).
    pub nclasses: usize,
    /// Class left out of the mean. Must be below `nclasses`.
    #[config(default = "None")]
    pub ignore_index: Option<usize>,
    /// Smoothing constant. Default: 1e-9
    #[config(default = 1e-9)]
    pub eps: f64,
    /// Print a summary after every update.
    #[config(default = true)]
    pub verbose_on_update: bool,
}

impl MeanIoUConfig {
    /// Initialize a [mean IoU](MeanIoU) accumulator.
    pub fn init(&self) -> MetricResult<MeanIoU> {
        check_nclasses(self.nclasses)?;
        check_eps(self.eps)?;
        if let Some(ignore_index) = self.ignore_index {
            if ignore_index >= self.nclasses {
                return Err(MetricError::InvalidConfiguration {
                    reason: format!(
                        "ignore_index {ignore_index} must be a class below nclasses {}",
                        self.nclasses
                    ),
                });
            }
            if self.nclasses == 1 {
                return Err(MetricError::InvalidConfiguration {
                    reason: "ignoring the only class leaves nothing to average".to_owned(),
                });
            }
        }

        Ok(MeanIoU {
            nclasses: self.nclasses,
            ignore_index: self.ignore_index,
            eps: self.eps,
            verbose_on_update: self.verbose_on_update,
            intersection: PerClassSum::new(self.nclasses),
            union: PerClassSum::new(self.nclasses),
        })
    }
}

/// Per-class, per-sample intersection and union pixel counts of one batch.
#[derive(Debug, Clone, PartialEq)]
pub struct IoUBatch {
    pub intersection: ClassSampleMatrix,
    pub union: ClassSampleMatrix,
}

/// Running mean IoU over streamed batches.
#[derive(Debug, Clone)]
pub struct MeanIoU {
    nclasses: usize,
    ignore_index: Option<usize>,
    eps: f64,
    verbose_on_update: bool,
    intersection: PerClassSum,
    union: PerClassSum,
}

impl MeanIoU {
    pub const NAME: &'static str = "mIoU";

    /// Create a mean IoU with the default configuration.
    pub fn new(nclasses: usize) -> MetricResult<Self> {
        MeanIoUConfig::new(nclasses).init()
    }

    pub const fn nclasses(&self) -> usize {
        self.nclasses
    }

    pub const fn ignore_index(&self) -> Option<usize> {
        self.ignore_index
    }

    /// Cumulative per-class intersections.
    pub fn intersection(&self) -> &[f64] {
        self.intersection.sums()
    }

    /// Cumulative per-class unions.
    pub fn union(&self) -> &[f64] {
        self.union.sums()
    }

    /// IoU of every class, including the ignored one.
    pub fn class_values(&self) -> MetricResult<Vec<f64>> {
        if self.intersection.sample_size() == 0 {
            return Err(MetricError::EmptyAccumulator {
                metric: Self::NAME.to_owned(),
            });
        }
        let eps = self.eps;
        Ok(self
            .intersection
            .sums()
            .iter()
            .zip(self.union.sums())
            .map(|(intersection, union)| (intersection + eps) / (union + eps))
            .collect())
    }

    /// Adds a batch to the running sums without printing anything.
    fn accumulate(&mut self, batch: IoUBatch) -> MetricResult<()> {
        let IoUBatch {
            intersection,
            union,
        } = batch;
        if intersection.batch_size() != union.batch_size() {
            return Err(MetricError::InvalidTensorShape {
                expected: format!("{} union samples", intersection.batch_size()),
                actual: format!("{}", union.batch_size()),
            });
        }
        // Validate both before touching either sum.
        for counts in [&intersection, &union] {
            if counts.nclasses() != self.nclasses {
                return Err(MetricError::ClassCountMismatch {
                    expected: self.nclasses,
                    actual: counts.nclasses(),
                });
            }
        }

        self.intersection.add(&intersection.class_sums())?;
        self.intersection.add_samples(intersection.batch_size());
        self.union.add(&union.class_sums())?;
        self.union.add_samples(union.batch_size());
        log::debug!(
            "{}: accumulated {} samples",
            Self::NAME,
            self.intersection.sample_size()
        );
        Ok(())
    }
}

impl RunningMetric for MeanIoU {
    type Batch = IoUBatch;

    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn calculate<B: Backend>(
        &self,
        output: Tensor<B, 4>,
        target: Tensor<B, 3, Int>,
    ) -> MetricResult<IoUBatch> {
        let [batch_size, _, _] = check_shapes(&output, &target, self.nclasses)?;

        let prediction = one_hot(multi_class_prediction(output), self.nclasses)?.int();
        let target = one_hot(target, self.nclasses)?.int();

        let both = prediction.clone() * target.clone();
        let either = (prediction + target).greater_elem(0).int();

        Ok(IoUBatch {
            intersection: ClassSampleMatrix::from_sample_major(
                self.nclasses,
                batch_size,
                &spatial_counts(both),
            )?,
            union: ClassSampleMatrix::from_sample_major(
                self.nclasses,
                batch_size,
                &spatial_counts(either),
            )?,
        })
    }

    fn update(&mut self, batch: IoUBatch) -> MetricResult<()> {
        self.accumulate(batch)?;
        summarize_after_update(&*self, self.verbose_on_update);
        Ok(())
    }

    fn value(&self) -> MetricResult<f64> {
        let ious = self.class_values()?;
        let mut total = ious.iter().sum::<f64>();
        let mut nclasses = ious.len();
        if let Some(ignore_index) = self.ignore_index {
            total -= ious[ignore_index];
            nclasses -= 1;
        }
        Ok(total / nclasses as f64)
    }

    fn report(&self) -> MetricResult<MetricSummary> {
        Ok(
            MetricSummary::new(Self::NAME, self.value()?, self.sample_size())
                .with_per_class(self.class_values()?),
        )
    }

    fn sample_size(&self) -> usize {
        self.intersection.sample_size()
    }

    fn reset(&mut self) {
        self.intersection.reset();
        self.union.reset();
    }

    fn merge(&mut self, other: Self) -> MetricResult<()> {
        if self.ignore_index != other.ignore_index {
            return Err(MetricError::InvalidConfiguration {
                reason: format!(
                    "cannot merge mIoU with ignore indices {:?} and {:?}",
                    self.ignore_index, other.ignore_index
                ),
            });
        }
        if self.nclasses != other.nclasses {
            return Err(MetricError::ClassCountMismatch {
                expected: self.nclasses,
                actual: other.nclasses,
            });
        }
        self.intersection.merge(other.intersection)?;
        self.union.merge(other.union)
    }
}

/// Mean IoU scored on the final stage of a multi-stage model output.
///
/// Models with deep supervision return a sequence of predictions, with the
/// final one last. A single `(output, target)` pair is a one-stage sequence.
#[derive(Debug, Clone)]
pub struct ModifiedMeanIoU {
    inner: MeanIoU,
}

impl ModifiedMeanIoU {
    pub const NAME: &'static str = "Modified mIoU";

    pub fn new(nclasses: usize) -> MetricResult<Self> {
        MeanIoUConfig::new(nclasses).init().map(Self::from)
    }

    pub const fn inner(&self) -> &MeanIoU {
        &self.inner
    }

    /// Calculates the batch statistic on the last output and the last target.
    pub fn calculate_staged<B: Backend>(
        &self,
        outputs: &[Tensor<B, 4>],
        targets: &[Tensor<B, 3, Int>],
    ) -> MetricResult<IoUBatch> {
        let (Some(output), Some(target)) = (outputs.last(), targets.last()) else {
            return Err(MetricError::EmptyStages);
        };
        self.inner.calculate(output.clone(), target.clone())
    }

    /// `calculate_staged` followed by `update`.
    pub fn process_staged<B: Backend>(
        &mut self,
        outputs: &[Tensor<B, 4>],
        targets: &[Tensor<B, 3, Int>],
    ) -> MetricResult<()> {
        let batch = self.calculate_staged(outputs, targets)?;
        self.update(batch)
    }

    /// Accumulates the batch, then returns the summary printed under this
    /// metric's own name when `verbose_on_update` is set.
    fn update_with_summary(&mut self, batch: IoUBatch) -> MetricResult<Option<MetricSummary>> {
        self.inner.accumulate(batch)?;
        Ok(summarize_after_update(&*self, self.inner.verbose_on_update))
    }
}

impl From<MeanIoU> for ModifiedMeanIoU {
    fn from(inner: MeanIoU) -> Self {
        Self { inner }
    }
}

impl RunningMetric for ModifiedMeanIoU {
    type Batch = IoUBatch;

    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn calculate<B: Backend>(
        &self,
        output: Tensor<B, 4>,
        target: Tensor<B, 3, Int>,
    ) -> MetricResult<IoUBatch> {
        self.inner.calculate(output, target)
    }

    fn update(&mut self, batch: IoUBatch) -> MetricResult<()> {
        self.update_with_summary(batch).map(|_| ())
    }

    fn value(&self) -> MetricResult<f64> {
        self.inner.value()
    }

    fn report(&self) -> MetricResult<MetricSummary> {
        let mut summary = self.inner.report()?;
        summary.name = Self::NAME.to_owned();
        Ok(summary)
    }

    fn sample_size(&self) -> usize {
        self.inner.sample_size()
    }

    fn reset(&mut self) {
        self.inner.reset();
    }

    fn merge(&mut self, other: Self) -> MetricResult<()> {
        self.inner.merge(other.inner)
    }
}
