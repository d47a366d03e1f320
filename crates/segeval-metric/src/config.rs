//! Suite-level configuration and the validation shared by metric configs.

use burn::config::Config;

use crate::error::{MetricError, MetricResult};

pub(crate) fn check_nclasses(nclasses: usize) -> MetricResult<()> {
    if nclasses == 0 {
        return Err(MetricError::InvalidConfiguration {
            reason: "nclasses must be greater than zero".to_owned(),
        });
    }
    Ok(())
}

pub(crate) fn check_eps(eps: f64) -> MetricResult<()> {
    if !eps.is_finite() || eps < 0.0 {
        return Err(MetricError::InvalidConfiguration {
            reason: format!("eps must be finite and non-negative, got {eps}"),
        });
    }
    Ok(())
}

/// The metrics an [`Evaluator`](crate::Evaluator) can run.
#[derive(Config, Debug, Copy, PartialEq, Eq)]
pub enum MetricKind {
    /// Mean per-class Dice score.
    Dice,
    /// Mean IoU over the classes.
    MeanIoU,
    /// Mean IoU on the final stage of a multi-stage output.
    ModifiedMeanIoU,
    /// Share of correctly labelled pixels.
    PixelAccuracy,
}

impl MetricKind {
    pub const ALL: [Self; 4] = [
        Self::Dice,
        Self::MeanIoU,
        Self::ModifiedMeanIoU,
        Self::PixelAccuracy,
    ];

    /// Whether the metric accepts a sequence of stage outputs.
    pub const fn accepts_stages(&self) -> bool {
        matches!(self, Self::ModifiedMeanIoU)
    }

    /// Whether the metric decodes a single output channel as binary.
    ///
    /// mIoU always takes the arg-max, so one channel is one class and the
    /// foreground label 1 is out of range.
    pub const fn supports_binary(&self) -> bool {
        matches!(self, Self::Dice | Self::PixelAccuracy)
    }

    /// Dice, mIoU and pixel accuracy, leaving mIoU out in binary mode.
    pub fn default_suite(nclasses: usize) -> Vec<Self> {
        [Self::Dice, Self::MeanIoU, Self::PixelAccuracy]
            .into_iter()
            .filter(|kind| nclasses != 1 || kind.supports_binary())
            .collect()
    }
}

/// Configuration of a whole metric suite sharing one class setup.
#[derive(Config, Debug)]
pub struct EvaluatorConfig {
    /// Number of classes. A value of 1 selects binary mode, which only Dice
    /// and pixel accuracy support.
    pub nclasses: usize,
    /// Target label excluded from scoring.
    ///
    /// Dice and pixel accuracy drop these pixels; mIoU drops the class from
    /// its mean, so for mIoU the value must name one of the classes.
    #[config(default = "None")]
    pub ignore_index: Option<i64>,
    /// Defaults to Dice, mIoU and pixel accuracy; binary setups must drop
    /// mIoU, see [`MetricKind::default_suite`].
    #[config(default = "vec![MetricKind::Dice, MetricKind::MeanIoU, MetricKind::PixelAccuracy]")]
    pub metrics: Vec<MetricKind>,
    /// Binary mode only: read the output channel as a logit.
    #[config(default = true)]
    pub apply_sigmoid: bool,
    /// Overrides every metric's own print-on-update default.
    #[config(default = "None")]
    pub verbose_on_update: Option<bool>,
}

impl EvaluatorConfig {
    /// Checks the settings every metric in the suite depends on.
    pub fn validate(&self) -> MetricResult<()> {
        check_nclasses(self.nclasses)?;
        if self.metrics.is_empty() {
            return Err(MetricError::InvalidConfiguration {
                reason: "at least one metric must be selected".to_owned(),
            });
        }
        for (position, kind) in self.metrics.iter().enumerate() {
            if self.metrics[..position].contains(kind) {
                return Err(MetricError::InvalidConfiguration {
                    reason: format!("metric {kind:?} is selected more than once"),
                });
            }
            if self.nclasses == 1 && !kind.supports_binary() {
                return Err(MetricError::InvalidConfiguration {
                    reason: format!(
                        "metric {kind:?} has no binary mode; use nclasses >= 2 with one channel per class"
                    ),
                });
            }
        }
        Ok(())
    }

    /// The ignore index as a class for mIoU, rejecting sentinels.
    pub(crate) fn ignore_class(&self) -> MetricResult<Option<usize>> {
        self.ignore_index
            .map(|ignore_index| {
                usize::try_from(ignore_index)
                    .ok()
                    .filter(|class| *class < self.nclasses)
                    .ok_or_else(|| MetricError::InvalidConfiguration {
                        reason: format!(
                            "mIoU ignore_index {ignore_index} must be a class below nclasses {}",
                            self.nclasses
                        ),
                    })
            })
            .transpose()
    }
}
