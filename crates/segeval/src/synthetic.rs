//! Synthetic segmentation batches.
//!
//! Labels are drawn uniformly over the classes and the model output is the
//! one-hot encoding of those labels blurred by Gaussian noise, so the noise
//! level controls how often the arg-max disagrees with the ground truth.

use anyhow::{ensure, Result};
use burn::{
    config::Config,
    tensor::{activation::sigmoid, backend::Backend, Distribution, Int, Tensor},
};
use segeval_metric::{one_hot::one_hot, EvaluatorConfig, SegmentationInput};

/// Shape and corruption settings for generated batches.
#[derive(Config, Debug)]
pub struct SyntheticConfig {
    #[config(default = 4)]
    pub batch_size: usize,
    #[config(default = 64)]
    pub height: usize,
    #[config(default = 64)]
    pub width: usize,
    /// Standard deviation of the noise added to the final-stage scores.
    #[config(default = 0.5)]
    pub noise: f64,
    /// Share of target pixels overwritten with the ignore index.
    #[config(default = 0.0)]
    pub ignore_rate: f64,
    /// Number of model stages; earlier stages are noisier.
    #[config(default = 1)]
    pub stages: usize,
}

/// Generates batches matching an evaluator's class setup.
#[derive(Debug, Clone)]
pub struct SyntheticBatches<B: Backend> {
    config: SyntheticConfig,
    nclasses: usize,
    ignore_index: Option<i64>,
    probabilities: bool,
    device: B::Device,
}

impl<B: Backend> SyntheticBatches<B> {
    pub fn new(
        config: SyntheticConfig,
        evaluator: &EvaluatorConfig,
        device: &B::Device,
    ) -> Result<Self> {
        ensure!(evaluator.nclasses > 0, "nclasses must be greater than zero");
        ensure!(
            config.batch_size > 0 && config.height > 0 && config.width > 0,
            "batch size and image size must be non-zero"
        );
        ensure!(config.stages > 0, "at least one stage is required");
        ensure!(
            config.noise.is_finite() && config.noise >= 0.0,
            "noise must be a non-negative number"
        );
        ensure!(
            (0.0..=1.0).contains(&config.ignore_rate),
            "ignore rate must lie in [0, 1]"
        );

        Ok(Self {
            config,
            nclasses: evaluator.nclasses,
            ignore_index: evaluator.ignore_index,
            probabilities: !evaluator.apply_sigmoid,
            device: device.clone(),
        })
    }

    /// Classes the labels are drawn from; a binary setup draws 0 and 1.
    fn label_classes(&self) -> usize {
        self.nclasses.max(2)
    }

    /// One batch: a single pair, or one output per stage sharing the target.
    pub fn batch(&self) -> Result<SegmentationInput<B>> {
        let SyntheticConfig {
            batch_size,
            height,
            width,
            ..
        } = self.config;
        let classes = self.label_classes();

        let labels = Tensor::<B, 3>::random(
            [batch_size, height, width],
            Distribution::Uniform(0.0, classes as f64),
            &self.device,
        )
        .int()
        .clamp(0, classes as i64 - 1);
        let target = self.sprinkle_ignored(labels.clone());

        let stages = self.config.stages;
        if stages == 1 {
            let output = self.scores(labels, self.config.noise)?;
            return Ok(SegmentationInput::new_single(output, target));
        }

        let outputs = (0..stages)
            .map(|stage| {
                let noise = self.config.noise * (stages - stage) as f64;
                self.scores(labels.clone(), noise)
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(SegmentationInput::new_staged(outputs, vec![target; stages]))
    }

    /// Model output whose noiseless arg-max is `labels`.
    fn scores(&self, labels: Tensor<B, 3, Int>, noise: f64) -> Result<Tensor<B, 4>> {
        let [batch_size, height, width] = labels.dims();

        if self.nclasses == 1 {
            let logits = labels
                .float()
                .mul_scalar(2.0)
                .sub_scalar(1.0)
                .reshape([batch_size, 1, height, width]);
            let logits = logits.clone() + self.noise(logits.dims(), noise);
            return Ok(if self.probabilities {
                sigmoid(logits)
            } else {
                logits
            });
        }

        let scores = one_hot(labels, self.nclasses)?.float();
        Ok(scores.clone() + self.noise(scores.dims(), noise))
    }

    fn noise(&self, shape: [usize; 4], std: f64) -> Tensor<B, 4> {
        if std == 0.0 {
            return Tensor::zeros(shape, &self.device);
        }
        Tensor::random(shape, Distribution::Normal(0.0, std), &self.device)
    }

    fn sprinkle_ignored(&self, labels: Tensor<B, 3, Int>) -> Tensor<B, 3, Int> {
        let Some(ignore_index) = self.ignore_index else {
            return labels;
        };
        if self.config.ignore_rate == 0.0 {
            return labels;
        }
        let ignored = Tensor::<B, 3>::random(
            labels.dims(),
            Distribution::Uniform(0.0, 1.0),
            &self.device,
        )
        .lower_elem(self.config.ignore_rate);
        labels.mask_fill(ignored, ignore_index)
    }
}
