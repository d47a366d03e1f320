//! Batch input accepted by the [`Evaluator`](crate::Evaluator).

use burn::tensor::{backend::Backend, Int, Tensor};
use derive_new::new;

use crate::error::{MetricError, MetricResult};

/// One batch of model output and ground truth.
///
/// `Staged` holds the outputs of a deep-supervision model, ordered from the
/// first intermediate prediction to the final one, with a matching target
/// per stage.
#[derive(new, Debug, Clone)]
pub enum SegmentationInput<B: Backend> {
    Single {
        /// Class scores with shape `[batch_size, classes, height, width]`.
        output: Tensor<B, 4>,
        /// Labels with shape `[batch_size, height, width]`.
        target: Tensor<B, 3, Int>,
    },
    Staged {
        outputs: Vec<Tensor<B, 4>>,
        targets: Vec<Tensor<B, 3, Int>>,
    },
}

impl<B: Backend> SegmentationInput<B> {
    pub const fn is_staged(&self) -> bool {
        matches!(self, Self::Staged { .. })
    }

    /// Number of stages; a single pair counts as one.
    pub fn stages(&self) -> usize {
        match self {
            Self::Single { .. } => 1,
            Self::Staged { outputs, .. } => outputs.len(),
        }
    }

    /// The output and target of the last stage.
    pub fn final_stage(&self) -> MetricResult<(Tensor<B, 4>, Tensor<B, 3, Int>)> {
        match self {
            Self::Single { output, target } => Ok((output.clone(), target.clone())),
            Self::Staged { outputs, targets } => match (outputs.last(), targets.last()) {
                (Some(output), Some(target)) => Ok((output.clone(), target.clone())),
                _ => Err(MetricError::EmptyStages),
            },
        }
    }
}

impl<B: Backend> From<(Tensor<B, 4>, Tensor<B, 3, Int>)> for SegmentationInput<B> {
    fn from((output, target): (Tensor<B, 4>, Tensor<B, 3, Int>)) -> Self {
        Self::new_single(output, target)
    }
}
