//! The interface shared by every running segmentation metric.

use burn::tensor::{backend::Backend, Int, Tensor};

use crate::{error::MetricResult, summary::MetricSummary};

/// A stateful accumulator fed with one `(output, target)` batch at a time.
///
/// The lifecycle is `Fresh` (after construction or [`reset`](Self::reset)),
/// then `Accumulating` after the first [`update`](Self::update). Values can
/// be queried in both states, but a fresh accumulator reports
/// [`MetricError::EmptyAccumulator`](crate::MetricError::EmptyAccumulator).
///
/// `update` is additive: applying the same batch twice counts it twice.
pub trait RunningMetric {
    /// Detached per-batch statistic produced by [`calculate`](Self::calculate).
    type Batch;

    /// Display name used in summaries.
    fn name(&self) -> &'static str;

    /// Computes the batch statistic without touching the accumulator.
    ///
    /// # Shapes
    ///
    /// - output: `[batch_size, channels, height, width]`
    /// - target: `[batch_size, height, width]`
    fn calculate<B: Backend>(
        &self,
        output: Tensor<B, 4>,
        target: Tensor<B, 3, Int>,
    ) -> MetricResult<Self::Batch>;

    /// Folds a batch statistic into the running state.
    fn update(&mut self, batch: Self::Batch) -> MetricResult<()>;

    /// The scalar summary of everything accumulated so far.
    fn value(&self) -> MetricResult<f64>;

    /// Overall value plus per-class breakdown where the metric has one.
    fn report(&self) -> MetricResult<MetricSummary>;

    /// Number of image samples accumulated so far.
    fn sample_size(&self) -> usize;

    /// Returns to the fresh state.
    fn reset(&mut self);

    /// Folds an independently accumulated instance into this one.
    fn merge(&mut self, other: Self) -> MetricResult<()>
    where
        Self: Sized;

    /// Prints the report to standard output.
    fn summary(&self) -> MetricResult<()> {
        println!("{}", self.report()?);
        Ok(())
    }

    /// `calculate` followed by `update`.
    fn process<B: Backend>(
        &mut self,
        output: Tensor<B, 4>,
        target: Tensor<B, 3, Int>,
    ) -> MetricResult<()> {
        let batch = self.calculate(output, target)?;
        self.update(batch)
    }
}

/// Prints a summary after an update when the metric asks for it.
///
/// Returns the printed summary.
pub(crate) fn summarize_after_update<M: RunningMetric>(
    metric: &M,
    verbose: bool,
) -> Option<MetricSummary> {
    if !verbose {
        return None;
    }
    match metric.report() {
        Ok(summary) => {
            println!("{summary}");
            Some(summary)
        }
        Err(err) => {
            log::warn!("{}: skipping summary after update: {err}", metric.name());
            None
        }
    }
}
