//! Detached per-batch statistics.
//!
//! Batch calculators reduce tensors on the device and hand back plain `f64`
//! values, so accumulators stay backend-agnostic.

use burn::tensor::{backend::Backend, Int, Tensor};
use serde::{Deserialize, Serialize};

use crate::error::{MetricError, MetricResult};

/// A `(classes, batch)` matrix of per-class, per-sample values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassSampleMatrix {
    nclasses: usize,
    batch_size: usize,
    /// Class-major storage: `values[class * batch_size + sample]`.
    values: Vec<f64>,
}

impl ClassSampleMatrix {
    /// Builds the matrix from class-major values.
    pub fn new(nclasses: usize, batch_size: usize, values: Vec<f64>) -> MetricResult<Self> {
        if values.len() != nclasses * batch_size {
            return Err(MetricError::InvalidTensorShape {
                expected: format!("[{nclasses}, {batch_size}]"),
                actual: format!("{} values", values.len()),
            });
        }
        Ok(Self {
            nclasses,
            batch_size,
            values,
        })
    }

    /// Builds the matrix from sample-major values, i.e. a flattened `[batch, classes]` tensor.
    pub fn from_sample_major(
        nclasses: usize,
        batch_size: usize,
        sample_major: &[f64],
    ) -> MetricResult<Self> {
        if sample_major.len() != nclasses * batch_size {
            return Err(MetricError::InvalidTensorShape {
                expected: format!("[{batch_size}, {nclasses}]"),
                actual: format!("{} values", sample_major.len()),
            });
        }
        let mut values = vec![0.0; sample_major.len()];
        for sample in 0..batch_size {
            for class in 0..nclasses {
                values[class * batch_size + sample] = sample_major[sample * nclasses + class];
            }
        }
        Ok(Self {
            nclasses,
            batch_size,
            values,
        })
    }

    pub const fn nclasses(&self) -> usize {
        self.nclasses
    }

    pub const fn batch_size(&self) -> usize {
        self.batch_size
    }

    pub fn get(&self, class: usize, sample: usize) -> Option<f64> {
        if class < self.nclasses && sample < self.batch_size {
            Some(self.values[class * self.batch_size + sample])
        } else {
            None
        }
    }

    /// Values of one class across the batch, or `None` past the last class.
    pub fn class_row(&self, class: usize) -> Option<&[f64]> {
        if class >= self.nclasses {
            return None;
        }
        let start = class * self.batch_size;
        self.values.get(start..start + self.batch_size)
    }

    /// Per-class sums over the sample dimension.
    pub fn class_sums(&self) -> Vec<f64> {
        if self.batch_size == 0 {
            return vec![0.0; self.nclasses];
        }
        self.values
            .chunks(self.batch_size)
            .map(|row| row.iter().sum())
            .collect()
    }

    /// Combines two matrices of identical shape entry by entry.
    pub fn zip_with(&self, other: &Self, f: impl Fn(f64, f64) -> f64) -> MetricResult<Self> {
        if self.nclasses != other.nclasses || self.batch_size != other.batch_size {
            return Err(MetricError::InvalidTensorShape {
                expected: format!("[{}, {}]", self.nclasses, self.batch_size),
                actual: format!("[{}, {}]", other.nclasses, other.batch_size),
            });
        }
        let values = self
            .values
            .iter()
            .zip(&other.values)
            .map(|(&a, &b)| f(a, b))
            .collect();
        Ok(Self {
            nclasses: self.nclasses,
            batch_size: self.batch_size,
            values,
        })
    }
}

/// One value per sample of a batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SampleVector {
    values: Vec<f64>,
}

impl SampleVector {
    pub const fn new(values: Vec<f64>) -> Self {
        Self { values }
    }

    pub fn batch_size(&self) -> usize {
        self.values.len()
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn sum(&self) -> f64 {
        self.values.iter().sum()
    }
}

/// Checks that `output` is `[b, channels, h, w]` and `target` is `[b, h, w]`.
///
/// Returns `[batch_size, height, width]` on success.
pub fn check_shapes<B: Backend>(
    output: &Tensor<B, 4>,
    target: &Tensor<B, 3, Int>,
    channels: usize,
) -> MetricResult<[usize; 3]> {
    let [batch_size, output_channels, height, width] = output.dims();
    let target_dims = target.dims();

    if output_channels != channels {
        return Err(MetricError::InvalidTensorShape {
            expected: format!("[{batch_size}, {channels}, {height}, {width}]"),
            actual: format!("{:?}", output.dims()),
        });
    }
    if target_dims != [batch_size, height, width] {
        return Err(MetricError::InvalidTensorShape {
            expected: format!("[{batch_size}, {height}, {width}]"),
            actual: format!("{target_dims:?}"),
        });
    }
    Ok([batch_size, height, width])
}

/// Counts `true` entries of an integer mask over the spatial plane.
///
/// # Shapes
///
/// - mask: `[batch_size, classes, height, width]` with values in `{0, 1}`
/// - returns: sample-major `[batch_size, classes]` counts
pub fn spatial_counts<B: Backend>(mask: Tensor<B, 4, Int>) -> Vec<f64> {
    let [batch_size, classes, _, _] = mask.dims();
    mask.sum_dim(3)
        .sum_dim(2)
        .reshape([batch_size, classes])
        .into_data()
        .iter::<f64>()
        .collect()
}

/// Counts `true` entries of a per-sample integer mask.
///
/// # Shapes
///
/// - mask: `[batch_size, height, width]` with values in `{0, 1}`
/// - returns: `[batch_size]` counts
pub fn sample_counts<B: Backend>(mask: Tensor<B, 3, Int>) -> Vec<f64> {
    let [batch_size, _, _] = mask.dims();
    mask.sum_dim(2)
        .sum_dim(1)
        .reshape([batch_size])
        .into_data()
        .iter::<f64>()
        .collect()
}
