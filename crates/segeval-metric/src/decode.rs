//! Prediction decoding.
//!
//! Converts raw per-pixel class scores `[batch, classes, height, width]` into
//! discrete labels `[batch, height, width]`.

use burn::tensor::{activation::sigmoid, backend::Backend, Int, Tensor};
use serde::{Deserialize, Serialize};

use crate::error::{MetricError, MetricResult};

/// Decision threshold on the probability scale used by binary decoding.
pub const BINARY_THRESHOLD: f64 = 0.5;

/// How a metric turns raw scores into labels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PredictionMode {
    /// Single foreground channel thresholded at 0.5.
    Binary {
        /// Treat the channel as a logit and apply a sigmoid before thresholding.
        apply_sigmoid: bool,
    },
    /// Arg-max over the class dimension.
    MultiClass,
}

impl PredictionMode {
    /// Selects the mode from a configured class count: one class means binary.
    pub const fn from_nclasses(nclasses: usize, apply_sigmoid: bool) -> Self {
        if nclasses == 1 {
            Self::Binary { apply_sigmoid }
        } else {
            Self::MultiClass
        }
    }

    /// Number of classes after decoding.
    ///
    /// A binary output has one raw channel but yields background and foreground.
    pub const fn effective_classes(&self, nclasses: usize) -> usize {
        match self {
            Self::Binary { .. } => 2,
            Self::MultiClass => nclasses,
        }
    }

    /// Number of channels the raw output must carry.
    pub const fn expected_channels(&self, nclasses: usize) -> usize {
        match self {
            Self::Binary { .. } => 1,
            Self::MultiClass => nclasses,
        }
    }

    pub const fn is_binary(&self) -> bool {
        matches!(self, Self::Binary { .. })
    }

    /// Decodes `output` into labels according to this mode.
    pub fn decode<B: Backend>(&self, output: Tensor<B, 4>) -> MetricResult<Tensor<B, 3, Int>> {
        match *self {
            Self::Binary { apply_sigmoid } => binary_prediction(output, apply_sigmoid),
            Self::MultiClass => Ok(multi_class_prediction(output)),
        }
    }
}

/// Arg-max over the class dimension. Ties resolve to the lowest class index.
///
/// # Shapes
///
/// - output: `[batch_size, classes, height, width]`
/// - returns: `[batch_size, height, width]`
pub fn multi_class_prediction<B: Backend>(output: Tensor<B, 4>) -> Tensor<B, 3, Int> {
    let [batch_size, classes, height, width] = output.dims();
    let device = output.device();

    let channel = |class: usize| {
        output
            .clone()
            .slice([0..batch_size, class..class + 1, 0..height, 0..width])
            .reshape([batch_size, height, width])
    };

    let mut labels = Tensor::<B, 3, Int>::zeros([batch_size, height, width], &device);
    if classes == 0 {
        return labels;
    }

    let mut best = channel(0);
    for class in 1..classes {
        let scores = channel(class);
        // Strictly greater keeps the earlier class on ties.
        let better = scores.clone().greater(best.clone());
        best = best.mask_where(better.clone(), scores);
        labels = labels.mask_fill(better, class as i64);
    }
    labels
}

/// Thresholds a single-channel output at 0.5 on the probability scale.
///
/// # Shapes
///
/// - output: `[batch_size, 1, height, width]`
/// - returns: `[batch_size, height, width]` with values in `{0, 1}`
pub fn binary_prediction<B: Backend>(
    output: Tensor<B, 4>,
    apply_sigmoid: bool,
) -> MetricResult<Tensor<B, 3, Int>> {
    let [batch_size, channels, height, width] = output.dims();
    if channels != 1 {
        return Err(MetricError::UnsupportedMode {
            metric: "binary prediction".to_owned(),
            reason: format!("expected a single foreground channel, got {channels}"),
        });
    }

    let probabilities = if apply_sigmoid {
        sigmoid(output)
    } else {
        output
    };

    Ok(probabilities
        .greater_elem(BINARY_THRESHOLD)
        .int()
        .reshape([batch_size, height, width]))
}
