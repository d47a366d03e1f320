use std::{fs, path::Path};

use anyhow::{bail, Context, Result};
use burn::{config::Config, tensor::backend::Backend};
use segeval_metric::{EpochReport, Evaluator, EvaluatorConfig};

use crate::synthetic::{SyntheticBatches, SyntheticConfig};

/// A full evaluation run over synthetic data.
///
/// Saved and loaded as JSON via [`Config::save`] and [`Config::load`].
#[derive(Config, Debug)]
pub struct EvaluationConfig {
    /// Metric suite.
    pub evaluator: EvaluatorConfig,
    /// Generated batch settings.
    pub data: SyntheticConfig,
    #[config(default = 1)]
    pub epochs: usize,
    /// Batches per epoch.
    #[config(default = 8)]
    pub batches: usize,
    #[config(default = "None")]
    pub seed: Option<u64>,
}

impl EvaluationConfig {
    /// Rejects staged batches for metrics that only score single outputs.
    pub fn validate(&self) -> Result<()> {
        self.evaluator.validate()?;
        if self.data.stages > 1 {
            let unstaged = self
                .evaluator
                .metrics
                .iter()
                .filter(|kind| !kind.accepts_stages())
                .collect::<Vec<_>>();
            if !unstaged.is_empty() {
                bail!("{unstaged:?} cannot score multi-stage outputs; select ModifiedMeanIoU only");
            }
        }
        if self.epochs == 0 || self.batches == 0 {
            bail!("epochs and batches must be non-zero");
        }
        Ok(())
    }
}

/// Runs every epoch and returns one report per epoch.
pub fn run_evaluation<B: Backend>(
    config: &EvaluationConfig,
    device: &B::Device,
) -> Result<Vec<EpochReport>> {
    config.validate()?;
    if let Some(seed) = config.seed {
        B::seed(seed);
    }

    let batches = SyntheticBatches::<B>::new(config.data.clone(), &config.evaluator, device)?;
    let mut evaluator = Evaluator::from_config(&config.evaluator)?;

    let mut reports = Vec::with_capacity(config.epochs);
    for epoch in 0..config.epochs {
        log::info!("epoch {epoch}: evaluating {} batches", config.batches);
        let inputs = (0..config.batches)
            .map(|_| batches.batch())
            .collect::<Result<Vec<_>>>()?;
        let report = evaluator
            .run_epoch(inputs)
            .with_context(|| format!("evaluation failed in epoch {epoch}"))?;
        reports.push(report);
    }
    Ok(reports)
}

/// Writes the reports as pretty-printed JSON.
pub fn save_reports(reports: &[EpochReport], path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    let json = serde_json::to_string_pretty(reports)?;
    fs::write(path, json).with_context(|| format!("failed to write {}", path.display()))
}
