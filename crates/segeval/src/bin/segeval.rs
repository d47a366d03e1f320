use std::path::PathBuf;

use anyhow::{Context, Result};
use burn::config::Config;
use clap::{Parser, Subcommand, ValueEnum};
use segeval::{
    backend::{create_device, describe, SelectedBackend},
    evaluate::{run_evaluation, save_reports, EvaluationConfig},
    synthetic::SyntheticConfig,
};
use segeval_metric::{EvaluatorConfig, MetricKind};

#[derive(Parser)]
#[command(name = "segeval")]
#[command(about = "Streaming Dice, mIoU and pixel-accuracy evaluation for semantic segmentation")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Evaluate the metric suite on synthetic batches
    Evaluate(EvaluateArgs),

    /// Show backend information
    Info,
}

#[derive(clap::Args)]
struct EvaluateArgs {
    /// Load the whole run from a JSON config; other flags are then ignored
    #[arg(long)]
    config: Option<PathBuf>,

    /// Save the effective run config as JSON
    #[arg(long)]
    save_config: Option<PathBuf>,

    /// Write every epoch report as JSON
    #[arg(long)]
    report: Option<PathBuf>,

    /// Number of classes; 1 selects binary mode
    #[arg(short, long, default_value_t = 3)]
    nclasses: usize,

    /// Target label excluded from scoring
    #[arg(long, allow_negative_numbers = true)]
    ignore_index: Option<i64>,

    /// Metrics to run [default: dice,miou,pixel-accuracy; dice,pixel-accuracy with --nclasses 1]
    #[arg(long, value_enum, value_delimiter = ',')]
    metrics: Option<Vec<MetricArg>>,

    #[arg(long, default_value_t = 1)]
    epochs: usize,

    /// Batches per epoch
    #[arg(long, default_value_t = 8)]
    batches: usize,

    #[arg(long, default_value_t = 4)]
    batch_size: usize,

    #[arg(long, default_value_t = 64)]
    height: usize,

    #[arg(long, default_value_t = 64)]
    width: usize,

    /// Standard deviation of the score noise
    #[arg(long, default_value_t = 0.5)]
    noise: f64,

    /// Share of target pixels replaced by the ignore index
    #[arg(long, default_value_t = 0.0)]
    ignore_rate: f64,

    /// Number of model stages (requires modified-miou only)
    #[arg(long, default_value_t = 1)]
    stages: usize,

    /// Binary outputs are probabilities rather than logits
    #[arg(long)]
    probabilities: bool,

    /// Print every metric after each batch
    #[arg(long)]
    verbose_on_update: Option<bool>,

    #[arg(long)]
    seed: Option<u64>,
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
enum MetricArg {
    Dice,
    Miou,
    ModifiedMiou,
    PixelAccuracy,
}

impl From<MetricArg> for MetricKind {
    fn from(metric: MetricArg) -> Self {
        match metric {
            MetricArg::Dice => Self::Dice,
            MetricArg::Miou => Self::MeanIoU,
            MetricArg::ModifiedMiou => Self::ModifiedMeanIoU,
            MetricArg::PixelAccuracy => Self::PixelAccuracy,
        }
    }
}

impl EvaluateArgs {
    fn to_config(&self) -> Result<EvaluationConfig> {
        if let Some(path) = &self.config {
            return EvaluationConfig::load(path)
                .with_context(|| format!("failed to load config {}", path.display()));
        }

        let metrics = match &self.metrics {
            Some(metrics) => metrics.iter().copied().map(MetricKind::from).collect(),
            None => MetricKind::default_suite(self.nclasses),
        };
        let evaluator = EvaluatorConfig::new(self.nclasses)
            .with_ignore_index(self.ignore_index)
            .with_metrics(metrics)
            .with_apply_sigmoid(!self.probabilities)
            .with_verbose_on_update(self.verbose_on_update);
        let data = SyntheticConfig::new()
            .with_batch_size(self.batch_size)
            .with_height(self.height)
            .with_width(self.width)
            .with_noise(self.noise)
            .with_ignore_rate(self.ignore_rate)
            .with_stages(self.stages);

        Ok(EvaluationConfig::new(evaluator, data)
            .with_epochs(self.epochs)
            .with_batches(self.batches)
            .with_seed(self.seed))
    }
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let device = create_device();

    match cli.command {
        Commands::Evaluate(args) => {
            let config = args.to_config()?;
            if let Some(path) = &args.save_config {
                config
                    .save(path)
                    .with_context(|| format!("failed to save config {}", path.display()))?;
            }

            log::info!("Using backend: {}", describe(&device));
            let reports = run_evaluation::<SelectedBackend>(&config, &device)?;
            for report in &reports {
                println!("{report}");
            }

            if let Some(path) = &args.report {
                save_reports(&reports, path)?;
                log::info!("Wrote {} epoch reports to {}", reports.len(), path.display());
            }
            Ok(())
        }

        Commands::Info => {
            println!("segeval Information:");
            println!("  Backend: {}", describe(&device));
            Ok(())
        }
    }
}
