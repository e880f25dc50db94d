//! Hand-Sign Letter Classifier CLI
//!
//! Entry point for downloading the hand-sign dataset, training the CNN with
//! the Burn framework and predicting letters for new images.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use tracing::info;

use handsign::backend::{backend_name, default_device, DefaultBackend, TrainingBackend};
use handsign::config::PipelineConfig;
use handsign::dataset::loader::list_directories;
use handsign::dataset::{ensure_dataset, resolve_split_dir, HandSignDataset};
use handsign::inference::Predictor;
use handsign::pipeline::run_pipeline;
use handsign::utils::logging::{init_logging, LogConfig, LogLevel};
use handsign::VERSION;

/// Hand-sign letter classification with Burn
///
/// Trains a three-block CNN on directory-labeled hand-sign images and
/// predicts American Sign Language letters.
#[derive(Parser, Debug)]
#[command(name = "handsign")]
#[command(version)]
#[command(about = "Hand-sign letter classification with Burn", long_about = None)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, default_value = "false")]
    verbose: bool,

    /// Only log errors
    #[arg(short, long, default_value = "false", conflicts_with = "verbose")]
    quiet: bool,

    /// Minimum log level (trace, debug, info, warn, error)
    #[arg(long, value_parser = parse_log_level)]
    log_level: Option<LogLevel>,

    /// TOML pipeline configuration (defaults are used when omitted)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Subcommand to execute
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Download, train, plot, evaluate and predict in one run
    Run {
        /// Number of training epochs
        #[arg(short, long)]
        epochs: Option<usize>,

        /// Batch size for training and validation
        #[arg(short, long)]
        batch_size: Option<usize>,

        /// Adam learning rate
        #[arg(short, long)]
        learning_rate: Option<f64>,

        /// Output directory for the model, curves and summary
        #[arg(short, long)]
        output_dir: Option<PathBuf>,

        /// Directory the dataset archive is extracted into
        #[arg(long)]
        data_root: Option<PathBuf>,

        /// Image used for the example prediction
        #[arg(long)]
        sample_image: Option<PathBuf>,

        /// Use folder names when they disagree with the label table
        #[arg(long, default_value = "false")]
        lenient_labels: bool,
    },

    /// Download and extract the dataset if it is not present yet
    Download,

    /// Show the dataset layout and per-class counts
    Stats,

    /// Predict letters for images with a saved model
    Predict {
        /// Directory holding model.mpk, model_config.json, labels.json and preprocess.json
        #[arg(short, long, default_value = "output")]
        model_dir: PathBuf,

        /// Images to classify
        #[arg(required = true)]
        images: Vec<PathBuf>,
    },

    /// Write the default configuration as TOML
    InitConfig {
        /// Destination file
        #[arg(default_value = "handsign.toml")]
        path: PathBuf,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let _ = init_logging(&log_config(&cli));

    print_banner();

    let config = load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Run {
            epochs,
            batch_size,
            learning_rate,
            output_dir,
            data_root,
            sample_image,
            lenient_labels,
        } => {
            let mut config = config;
            if let Some(epochs) = epochs {
                config.training.epochs = epochs;
            }
            if let Some(batch_size) = batch_size {
                config.training.batch_size = batch_size;
            }
            if let Some(lr) = learning_rate {
                config.training.learning_rate = lr;
            }
            if let Some(dir) = output_dir {
                config.output.dir = dir;
            }
            if let Some(root) = data_root {
                config.dataset.extract_root = root;
            }
            if sample_image.is_some() {
                config.output.sample_image = sample_image;
            }
            if lenient_labels {
                config.labels.strict = false;
            }
            cmd_run(&config)?;
        }

        Commands::Download => cmd_download(&config)?,

        Commands::Stats => cmd_stats(&config)?,

        Commands::Predict { model_dir, images } => cmd_predict(&model_dir, &images)?,

        Commands::InitConfig { path } => {
            config
                .save(&path)
                .with_context(|| format!("failed to write {}", path.display()))?;
            println!("{} Configuration written to {}", "Done!".green().bold(), path.display());
        }
    }

    Ok(())
}

fn parse_log_level(s: &str) -> std::result::Result<LogLevel, String> {
    s.parse::<LogLevel>().map_err(|e| e.to_string())
}

/// `--verbose` / `--quiet` pick a preset; `--log-level` overrides its level
fn log_config(cli: &Cli) -> LogConfig {
    let preset = if cli.verbose {
        LogConfig::verbose()
    } else if cli.quiet {
        LogConfig::quiet()
    } else {
        LogConfig::default()
    };

    match cli.log_level {
        Some(level) => LogConfig { level, ..preset },
        None => preset,
    }
}

fn load_config(path: Option<&Path>) -> Result<PipelineConfig> {
    match path {
        Some(path) => {
            info!("Loading configuration from {:?}", path);
            PipelineConfig::load(path)
                .with_context(|| format!("failed to load configuration {}", path.display()))
        }
        None => Ok(PipelineConfig::default()),
    }
}

fn print_banner() {
    println!(
        "{}",
        r#"
 ╔══════════════════════════════════════════════════════════════════╗
 ║   ✋ Hand-Sign Letter Classifier                                  ║
 ║   Convolutional network training with Burn + Rust                ║
 ╚══════════════════════════════════════════════════════════════════╝
  "#
        .green()
    );
    println!("  {} v{}", "handsign".bold(), VERSION);
    println!();
}

fn cmd_run(config: &PipelineConfig) -> Result<()> {
    println!("{}", "Run Configuration:".cyan().bold());
    println!("  🖥️  Backend:       {}", backend_name());
    println!("  📁 Dataset:       {}", config.dataset.dataset_dir().display());
    println!("  📅 Epochs:        {}", config.training.epochs);
    println!("  📦 Batch size:    {}", config.training.batch_size);
    println!("  📈 Learning rate: {}", config.training.learning_rate);
    println!("  💾 Output:        {}", config.output.dir.display());
    println!();

    let summary = run_pipeline::<TrainingBackend>(config, default_device())?;

    println!();
    println!("{}", "Run Summary:".cyan().bold());
    println!("  Epochs trained:      {}", summary.epochs);
    println!("  Classes:             {}", summary.num_classes);
    println!(
        "  Training samples:    {} / validation: {}",
        summary.train_samples, summary.validation_samples
    );
    println!(
        "  Validation accuracy: {:.2}% (loss {:.4})",
        summary.validation_accuracy * 100.0,
        summary.validation_loss
    );
    if let Some(best) = summary.best_epoch {
        println!("  Best epoch:          {}", best);
    }
    println!("  Model:               {}", summary.model_path.display());

    Ok(())
}

fn cmd_download(config: &PipelineConfig) -> Result<()> {
    println!("{}", "Dataset Source:".cyan().bold());
    println!("  🌐 URL:     {}", config.dataset.url);
    println!("  📁 Target:  {}", config.dataset.dataset_dir().display());
    println!();

    let outcome = ensure_dataset(&config.dataset)?;
    println!(
        "{} Dataset ready at {}",
        "Done!".green().bold(),
        outcome.dataset_dir().display()
    );

    Ok(())
}

fn cmd_stats(config: &PipelineConfig) -> Result<()> {
    let dataset_dir = config.dataset.dataset_dir();
    info!("Computing dataset statistics for: {:?}", dataset_dir);

    if !dataset_dir.exists() {
        anyhow::bail!(
            "dataset directory not found: {} (run `handsign download` first)",
            dataset_dir.display()
        );
    }

    println!("{}", "Directory Layout:".cyan().bold());
    for dir in list_directories(&config.dataset.extract_root, 3) {
        println!("  {}", dir.display());
    }

    let train_dir = config.dataset.train_path();
    let val_dir = resolve_split_dir(&dataset_dir, &config.dataset.validation_dirs)?;
    for split in [train_dir, val_dir] {
        let dataset = HandSignDataset::new(&split)?;
        dataset.get_stats().print();
    }

    Ok(())
}

fn cmd_predict(model_dir: &Path, images: &[PathBuf]) -> Result<()> {
    println!("{}", "Inference Configuration:".cyan().bold());
    println!("  🧠 Model:   {}", model_dir.display());
    println!("  🖥️  Backend: {}", backend_name());
    println!();

    println!("{}", "Loading model...".cyan());
    let predictor = Predictor::<DefaultBackend>::load(model_dir, default_device())
        .with_context(|| format!("failed to load model from {}", model_dir.display()))?;

    println!("{}", "Running inference...".cyan());
    println!();
    for result in predictor.predict_batch(images)? {
        println!(
            "{} {}",
            "Predicted letter:".green().bold(),
            result.label.bold()
        );
        println!("{}", result.display());
    }

    Ok(())
}
