//! Training CLI Tool
//!
//! Command-line interface for training the U-Net segmentation model on a
//! synthetic shapes dataset or a folder of image/mask pairs.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use seg_core::cli::{load_toml_config, save_toml_config, setup_cli_logging};
use seg_core::{backend_name, default_device, DataSource, TrainingBackend, TrainingConfig};
use seg_training::run_training;
use tracing::info;

/// Epoch count used when neither the config file nor `--epochs` sets one
const DEFAULT_CLI_EPOCHS: usize = 10;

/// U-Net Segmentation Training Tool
#[derive(Parser, Debug)]
#[command(
    name = "train",
    about = "Train a U-Net semantic segmentation model",
    long_about = "Train a U-Net semantic segmentation model with a BCE + Dice loss, \
                  Adam and a step-decay learning rate schedule."
)]
struct Args {
    /// Path to training configuration file (TOML)
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Override number of epochs
    #[arg(short, long, value_name = "N")]
    epochs: Option<usize>,

    /// Override batch size
    #[arg(short, long, value_name = "SIZE")]
    batch_size: Option<usize>,

    /// Override learning rate
    #[arg(short, long, value_name = "LR")]
    lr: Option<f64>,

    /// Train on `DIR/images` and `DIR/masks` instead of synthetic shapes
    #[arg(short, long, value_name = "DIR")]
    data_dir: Option<PathBuf>,

    /// Override checkpoint path
    #[arg(long, value_name = "FILE")]
    checkpoint: Option<PathBuf>,

    /// Override random seed
    #[arg(long, value_name = "SEED")]
    seed: Option<u64>,

    /// Write the effective configuration to this file
    #[arg(long, value_name = "FILE")]
    save_config: Option<PathBuf>,

    /// Validate the configuration without training
    #[arg(long)]
    dry_run: bool,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();

    setup_cli_logging(args.verbose)?;

    info!("U-Net Segmentation - Training Tool");
    info!("==================================");

    let mut config = match &args.config {
        Some(path) => load_toml_config::<TrainingConfig>(path)
            .with_context(|| format!("Failed to load configuration file {}", path.display()))?,
        None => {
            let mut config = TrainingConfig::default();
            config.optim.num_epochs = DEFAULT_CLI_EPOCHS;
            config
        }
    };

    apply_overrides(&mut config, &args);
    config.validate().context("Invalid configuration")?;

    if let Some(path) = &args.save_config {
        save_toml_config(&config, path)
            .with_context(|| format!("Failed to save configuration to {}", path.display()))?;
        info!("Configuration saved to: {}", path.display());
    }

    print_config_summary(&config);

    if args.dry_run {
        info!("Configuration validated successfully (dry run)");
        return Ok(());
    }

    let device = default_device();
    let report = run_training::<TrainingBackend>(&config, &device).context("Training failed")?;

    if let Some(last) = report.history.last() {
        info!(
            "Final epoch: loss {:.4}, accuracy {:.2}%",
            last.train_loss, last.train_accuracy
        );
    }
    if let Some(best) = report.history.best_test_epoch() {
        info!(
            "Best test accuracy: {:.2}% (epoch {})",
            best.test_accuracy.unwrap_or_default(),
            best.epoch
        );
    }
    info!("Weights written to {}", report.checkpoint.display());

    Ok(())
}

fn apply_overrides(config: &mut TrainingConfig, args: &Args) {
    if let Some(epochs) = args.epochs {
        config.optim.num_epochs = epochs;
    }
    if let Some(batch_size) = args.batch_size {
        config.optim.batch_size = batch_size;
    }
    if let Some(lr) = args.lr {
        config.optim.learning_rate = lr;
    }
    if let Some(ref root) = args.data_dir {
        config.data.source = DataSource::Folder { root: root.clone() };
    }
    if let Some(ref checkpoint) = args.checkpoint {
        config.checkpoint_path = checkpoint.clone();
    }
    if let Some(seed) = args.seed {
        config.seed = seed;
    }
}

fn print_config_summary(config: &TrainingConfig) {
    info!("");
    info!("Configuration Summary:");
    info!("  Backend: {}", backend_name());
    info!(
        "  Model: U-Net, {} classes, {} base filters",
        config.model.num_classes, config.model.base_filters
    );
    info!("  Epochs: {}", config.optim.num_epochs);
    info!("  Batch size: {}", config.optim.batch_size);
    info!("  Learning rate: {}", config.optim.learning_rate);
    info!(
        "  LR schedule: {:?} (step {}, gamma {})",
        config.optim.lr_schedule.schedule_type,
        config.optim.lr_schedule.step_size,
        config.optim.lr_schedule.gamma
    );
    match &config.data.source {
        DataSource::Synthetic { num_samples } => {
            info!("  Data: {} synthetic samples", num_samples)
        }
        DataSource::Folder { root } => info!("  Data: {}", root.display()),
    }
    info!("  Image size: {}", config.data.image_size);
    info!("  Checkpoint: {}", config.checkpoint_path.display());
    info!("");
}
