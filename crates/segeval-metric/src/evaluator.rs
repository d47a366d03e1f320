//! A suite of metrics driven once per batch and once per epoch.

use core::fmt;

use burn::tensor::backend::Backend;
use serde::{Deserialize, Serialize};

use crate::{
    config::{EvaluatorConfig, MetricKind},
    dice::{DiceScore, DiceScoreConfig},
    error::{MetricError, MetricResult},
    input::SegmentationInput,
    iou::{IoUBatch, MeanIoU, MeanIoUConfig, ModifiedMeanIoU},
    metric::RunningMetric,
    pixel_accuracy::{PixelAccuracy, PixelAccuracyConfig},
    stats::{ClassSampleMatrix, SampleVector},
    summary::MetricSummary,
};

/// The detached batch statistic of any [`SegmentationMetric`].
#[derive(Debug, Clone, PartialEq)]
pub enum MetricBatch {
    Dice(ClassSampleMatrix),
    IoU(IoUBatch),
    PixelAccuracy(SampleVector),
}

impl MetricBatch {
    const fn label(&self) -> &'static str {
        match self {
            Self::Dice(_) => "Dice",
            Self::IoU(_) => "IoU",
            Self::PixelAccuracy(_) => "pixel accuracy",
        }
    }
}

/// Any of the running metrics, dispatched by variant.
#[derive(Debug, Clone)]
pub enum SegmentationMetric {
    Dice(DiceScore),
    MeanIoU(MeanIoU),
    ModifiedMeanIoU(ModifiedMeanIoU),
    PixelAccuracy(PixelAccuracy),
}

impl SegmentationMetric {
    /// Builds the metric `kind` from the suite configuration.
    pub fn from_config(kind: MetricKind, config: &EvaluatorConfig) -> MetricResult<Self> {
        let metric = match kind {
            MetricKind::Dice => {
                let mut dice = DiceScoreConfig::new(config.nclasses)
                    .with_ignore_index(config.ignore_index)
                    .with_apply_sigmoid(config.apply_sigmoid);
                if let Some(verbose) = config.verbose_on_update {
                    dice = dice.with_verbose_on_update(verbose);
                }
                Self::Dice(dice.init()?)
            }
            MetricKind::MeanIoU | MetricKind::ModifiedMeanIoU => {
                let mut miou = MeanIoUConfig::new(config.nclasses)
                    .with_ignore_index(config.ignore_class()?);
                if let Some(verbose) = config.verbose_on_update {
                    miou = miou.with_verbose_on_update(verbose);
                }
                let miou = miou.init()?;
                if kind == MetricKind::MeanIoU {
                    Self::MeanIoU(miou)
                } else {
                    Self::ModifiedMeanIoU(miou.into())
                }
            }
            MetricKind::PixelAccuracy => {
                let mut accuracy = PixelAccuracyConfig::new(config.nclasses)
                    .with_ignore_index(config.ignore_index)
                    .with_apply_sigmoid(config.apply_sigmoid);
                if let Some(verbose) = config.verbose_on_update {
                    accuracy = accuracy.with_verbose_on_update(verbose);
                }
                Self::PixelAccuracy(accuracy.init()?)
            }
        };
        Ok(metric)
    }

    pub const fn kind(&self) -> MetricKind {
        match self {
            Self::Dice(_) => MetricKind::Dice,
            Self::MeanIoU(_) => MetricKind::MeanIoU,
            Self::ModifiedMeanIoU(_) => MetricKind::ModifiedMeanIoU,
            Self::PixelAccuracy(_) => MetricKind::PixelAccuracy,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Dice(metric) => metric.name(),
            Self::MeanIoU(metric) => metric.name(),
            Self::ModifiedMeanIoU(metric) => metric.name(),
            Self::PixelAccuracy(metric) => metric.name(),
        }
    }

    /// Computes the batch statistic without touching the accumulator.
    ///
    /// Only the staged mIoU accepts [`SegmentationInput::Staged`].
    pub fn calculate<B: Backend>(&self, input: &SegmentationInput<B>) -> MetricResult<MetricBatch> {
        let (output, target) = match (self, input) {
            (Self::ModifiedMeanIoU(metric), SegmentationInput::Staged { outputs, targets }) => {
                return metric
                    .calculate_staged(outputs, targets)
                    .map(MetricBatch::IoU);
            }
            (metric, SegmentationInput::Staged { .. }) => {
                return Err(MetricError::StagedInputUnsupported {
                    metric: metric.name().to_owned(),
                });
            }
            (_, SegmentationInput::Single { output, target }) => (output.clone(), target.clone()),
        };

        match self {
            Self::Dice(metric) => metric.calculate(output, target).map(MetricBatch::Dice),
            Self::MeanIoU(metric) => metric.calculate(output, target).map(MetricBatch::IoU),
            Self::ModifiedMeanIoU(metric) => metric.calculate(output, target).map(MetricBatch::IoU),
            Self::PixelAccuracy(metric) => metric
                .calculate(output, target)
                .map(MetricBatch::PixelAccuracy),
        }
    }

    /// Folds a statistic produced by [`calculate`](Self::calculate) into the running state.
    pub fn update(&mut self, batch: MetricBatch) -> MetricResult<()> {
        match (self, batch) {
            (Self::Dice(metric), MetricBatch::Dice(batch)) => metric.update(batch),
            (Self::MeanIoU(metric), MetricBatch::IoU(batch)) => metric.update(batch),
            (Self::ModifiedMeanIoU(metric), MetricBatch::IoU(batch)) => metric.update(batch),
            (Self::PixelAccuracy(metric), MetricBatch::PixelAccuracy(batch)) => {
                metric.update(batch)
            }
            (metric, batch) => Err(MetricError::InvalidConfiguration {
                reason: format!(
                    "{} cannot accumulate a {} batch",
                    metric.name(),
                    batch.label()
                ),
            }),
        }
    }

    /// Calculates and accumulates one batch.
    pub fn process<B: Backend>(&mut self, input: &SegmentationInput<B>) -> MetricResult<()> {
        let batch = self.calculate(input)?;
        self.update(batch)
    }

    pub fn value(&self) -> MetricResult<f64> {
        match self {
            Self::Dice(metric) => metric.value(),
            Self::MeanIoU(metric) => metric.value(),
            Self::ModifiedMeanIoU(metric) => metric.value(),
            Self::PixelAccuracy(metric) => metric.value(),
        }
    }

    pub fn report(&self) -> MetricResult<MetricSummary> {
        match self {
            Self::Dice(metric) => metric.report(),
            Self::MeanIoU(metric) => metric.report(),
            Self::ModifiedMeanIoU(metric) => metric.report(),
            Self::PixelAccuracy(metric) => metric.report(),
        }
    }

    pub fn summary(&self) -> MetricResult<()> {
        match self {
            Self::Dice(metric) => metric.summary(),
            Self::MeanIoU(metric) => metric.summary(),
            Self::ModifiedMeanIoU(metric) => metric.summary(),
            Self::PixelAccuracy(metric) => metric.summary(),
        }
    }

    pub fn sample_size(&self) -> usize {
        match self {
            Self::Dice(metric) => metric.sample_size(),
            Self::MeanIoU(metric) => metric.sample_size(),
            Self::ModifiedMeanIoU(metric) => metric.sample_size(),
            Self::PixelAccuracy(metric) => metric.sample_size(),
        }
    }

    pub fn reset(&mut self) {
        match self {
            Self::Dice(metric) => metric.reset(),
            Self::MeanIoU(metric) => metric.reset(),
            Self::ModifiedMeanIoU(metric) => metric.reset(),
            Self::PixelAccuracy(metric) => metric.reset(),
        }
    }

    /// Folds another metric of the same kind into this one.
    pub fn merge(&mut self, other: Self) -> MetricResult<()> {
        match (self, other) {
            (Self::Dice(metric), Self::Dice(other)) => metric.merge(other),
            (Self::MeanIoU(metric), Self::MeanIoU(other)) => metric.merge(other),
            (Self::ModifiedMeanIoU(metric), Self::ModifiedMeanIoU(other)) => metric.merge(other),
            (Self::PixelAccuracy(metric), Self::PixelAccuracy(other)) => metric.merge(other),
            (metric, other) => Err(MetricError::InvalidConfiguration {
                reason: format!("cannot merge {} into {}", other.name(), metric.name()),
            }),
        }
    }
}

/// Every metric's summary at the end of one epoch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EpochReport {
    pub epoch: usize,
    pub metrics: Vec<MetricSummary>,
}

impl EpochReport {
    /// Looks a metric up by its display name.
    pub fn get(&self, name: &str) -> Option<&MetricSummary> {
        self.metrics.iter().find(|summary| summary.name == name)
    }
}

impl fmt::Display for EpochReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Epoch {}", self.epoch)?;
        for summary in &self.metrics {
            write!(f, "\n{summary}")?;
        }
        Ok(())
    }
}

/// Owns a metric suite across epochs.
///
/// Call [`process`](Self::process) once per batch and
/// [`epoch_end`](Self::epoch_end) once per epoch.
#[derive(Debug, Clone)]
pub struct Evaluator {
    metrics: Vec<SegmentationMetric>,
    epoch: usize,
}

impl Evaluator {
    pub fn from_config(config: &EvaluatorConfig) -> MetricResult<Self> {
        config.validate()?;
        let metrics = config
            .metrics
            .iter()
            .map(|kind| SegmentationMetric::from_config(*kind, config))
            .collect::<MetricResult<Vec<_>>>()?;
        Ok(Self { metrics, epoch: 0 })
    }

    pub fn metrics(&self) -> &[SegmentationMetric] {
        &self.metrics
    }

    /// Index of the epoch currently being accumulated.
    pub const fn epoch(&self) -> usize {
        self.epoch
    }

    /// Feeds one batch to every metric.
    ///
    /// Every metric calculates first; if any calculation fails, no metric
    /// accumulates the batch.
    pub fn process<B: Backend>(&mut self, input: &SegmentationInput<B>) -> MetricResult<()> {
        let batches = self
            .metrics
            .iter()
            .map(|metric| metric.calculate(input))
            .collect::<MetricResult<Vec<_>>>()?;
        self.metrics
            .iter_mut()
            .zip(batches)
            .try_for_each(|(metric, batch)| metric.update(batch))
    }

    /// Reports every metric, then resets them for the next epoch.
    pub fn epoch_end(&mut self) -> MetricResult<EpochReport> {
        let metrics = self
            .metrics
            .iter()
            .map(SegmentationMetric::report)
            .collect::<MetricResult<Vec<_>>>()?;
        let report = EpochReport {
            epoch: self.epoch,
            metrics,
        };
        for summary in &report.metrics {
            log::info!(
                "epoch {}: {} = {:.6} over {} samples",
                report.epoch,
                summary.name,
                summary.value,
                summary.sample_size
            );
        }

        self.metrics.iter_mut().for_each(SegmentationMetric::reset);
        self.epoch += 1;
        Ok(report)
    }

    /// Processes every batch, then closes the epoch.
    pub fn run_epoch<B, I>(&mut self, batches: I) -> MetricResult<EpochReport>
    where
        B: Backend,
        I: IntoIterator<Item = SegmentationInput<B>>,
    {
        for batch in batches {
            self.process(&batch)?;
        }
        self.epoch_end()
    }

    /// Folds an evaluator that accumulated another shard of the same epoch.
    pub fn merge(&mut self, other: Self) -> MetricResult<()> {
        if self.metrics.len() != other.metrics.len() {
            return Err(MetricError::InvalidConfiguration {
                reason: format!(
                    "cannot merge a suite of {} metrics into one of {}",
                    other.metrics.len(),
                    self.metrics.len()
                ),
            });
        }
        self.metrics
            .iter_mut()
            .zip(other.metrics)
            .try_for_each(|(metric, other)| metric.merge(other))
    }
}
