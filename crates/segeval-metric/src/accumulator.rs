//! Running sums shared by the metric accumulators.
//!
//! Both sums are plain additive state: `merge` is commutative and
//! associative, so shards evaluated independently can be folded together.

use serde::{Deserialize, Serialize};

use crate::error::{MetricError, MetricResult};

/// Per-class running sums plus the number of contributing samples.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerClassSum {
    sums: Vec<f64>,
    sample_size: usize,
}

impl PerClassSum {
    /// Creates a zeroed accumulator for `nclasses` classes.
    pub fn new(nclasses: usize) -> Self {
        Self {
            sums: vec![0.0; nclasses],
            sample_size: 0,
        }
    }

    pub fn nclasses(&self) -> usize {
        self.sums.len()
    }

    pub const fn sample_size(&self) -> usize {
        self.sample_size
    }

    pub fn sums(&self) -> &[f64] {
        &self.sums
    }

    /// Adds per-class values without touching the sample count.
    pub fn add(&mut self, class_sums: &[f64]) -> MetricResult<()> {
        if class_sums.len() != self.sums.len() {
            return Err(MetricError::ClassCountMismatch {
                expected: self.sums.len(),
                actual: class_sums.len(),
            });
        }
        self.sums
            .iter_mut()
            .zip(class_sums)
            .for_each(|(sum, value)| *sum += value);
        Ok(())
    }

    pub fn add_samples(&mut self, samples: usize) {
        self.sample_size += samples;
    }

    /// Per-class means over the accumulated samples.
    pub fn means(&self, metric: &str) -> MetricResult<Vec<f64>> {
        let sample_size = nonzero_sample_size(self.sample_size, metric)?;
        Ok(self.sums.iter().map(|sum| sum / sample_size).collect())
    }

    pub fn merge(&mut self, other: Self) -> MetricResult<()> {
        self.add(&other.sums)?;
        self.sample_size += other.sample_size;
        Ok(())
    }

    pub fn reset(&mut self) {
        self.sums.iter_mut().for_each(|sum| *sum = 0.0);
        self.sample_size = 0;
    }
}

/// A scalar running sum plus the number of contributing samples.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScalarSum {
    total: f64,
    sample_size: usize,
}

impl ScalarSum {
    pub const fn new() -> Self {
        Self {
            total: 0.0,
            sample_size: 0,
        }
    }

    pub const fn total(&self) -> f64 {
        self.total
    }

    pub const fn sample_size(&self) -> usize {
        self.sample_size
    }

    pub fn add(&mut self, total: f64, samples: usize) {
        self.total += total;
        self.sample_size += samples;
    }

    pub fn mean(&self, metric: &str) -> MetricResult<f64> {
        Ok(self.total / nonzero_sample_size(self.sample_size, metric)?)
    }

    pub fn merge(&mut self, other: Self) {
        self.add(other.total, other.sample_size);
    }

    pub fn reset(&mut self) {
        *self = Self::new();
    }
}

pub(crate) fn nonzero_sample_size(sample_size: usize, metric: &str) -> MetricResult<f64> {
    if sample_size == 0 {
        Err(MetricError::EmptyAccumulator {
            metric: metric.to_owned(),
        })
    } else {
        Ok(sample_size as f64)
    }
}
