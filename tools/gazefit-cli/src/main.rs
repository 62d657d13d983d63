//! Gazefit CLI: calibrate, train, and run webcam gaze estimation.
//!
//! Usage:
//!   gazefit calibrate <RECORDING>   Record calibration samples from a landmark stream
//!   gazefit train                   Fit a model from the sample file
//!   gazefit realtime <RECORDING>    Stream gaze estimates for a landmark stream
//!   gazefit info [PATH]             Show a model artifact or sample file
//!   gazefit grid                    Print the calibration targets
//!   gazefit simulate <OUTPUT>       Write a synthetic landmark recording
//!   gazefit config                  Show or save the effective configuration

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use gazefit_common::config::AppConfig;

mod commands;

#[derive(Parser)]
#[command(
    name = "gazefit",
    about = "Webcam gaze estimation with per-user calibration",
    version,
    author
)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Config file (default: $XDG_CONFIG_HOME/gazefit/config.json)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a calibration session over a landmark recording
    Calibrate {
        /// JSONL landmark recording
        recording: PathBuf,

        /// Sample file (default: <data_dir>/calibration_samples.csv)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Append to an existing sample file instead of replacing it
        #[arg(long)]
        append: bool,

        /// Grid columns
        #[arg(long)]
        cols: Option<usize>,

        /// Grid rows
        #[arg(long)]
        rows: Option<usize>,

        /// Feature layout: eye-centers-v1|eye-aperture-v1|iris-offset-v1
        #[arg(long)]
        layout: Option<String>,
    },

    /// Train a gaze model from calibration samples
    Train {
        /// Sample file (default: <data_dir>/calibration_samples.csv)
        #[arg(short, long)]
        samples: Option<PathBuf>,

        /// Model artifact (default: <data_dir>/gaze_ridge_xy.json)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Ridge regularization strength
        #[arg(long)]
        alpha: Option<f64>,

        /// Fit on raw features instead of standardized ones
        #[arg(long)]
        no_standardize: bool,
    },

    /// Stream gaze estimates for a landmark recording
    Realtime {
        /// JSONL landmark recording
        recording: PathBuf,

        /// Model artifact (default: <data_dir>/gaze_ridge_xy.json)
        #[arg(short, long)]
        model: Option<PathBuf>,

        /// Smoothing algorithm: ema|kalman|moving-average|none
        #[arg(long)]
        smoothing: Option<String>,

        /// Target FPS (0 = unpaced)
        #[arg(long)]
        fps: Option<u32>,

        /// Screen width for pixel output
        #[arg(long, default_value = "1920")]
        width: u32,

        /// Screen height for pixel output
        #[arg(long, default_value = "1080")]
        height: u32,

        /// Print one JSON object per frame
        #[arg(long)]
        json: bool,
    },

    /// Show a model artifact or sample file
    Info {
        /// File to inspect (default: the configured model artifact)
        path: Option<PathBuf>,
    },

    /// Print the calibration grid
    Grid {
        /// Grid columns
        #[arg(long)]
        cols: Option<usize>,

        /// Grid rows
        #[arg(long)]
        rows: Option<usize>,

        /// Screen width for pixel output
        #[arg(long, default_value = "1920")]
        width: u32,

        /// Screen height for pixel output
        #[arg(long, default_value = "1080")]
        height: u32,
    },

    /// Write a synthetic landmark recording that follows the calibration grid
    Simulate {
        /// Output JSONL file
        output: PathBuf,

        /// Frames per grid target (default: warm-up + dwell)
        #[arg(long)]
        frames_per_target: Option<usize>,

        /// Drop the face on every N-th frame (0 = never)
        #[arg(long, default_value = "0")]
        dropout: usize,
    },

    /// Show the effective configuration
    Config {
        /// Write it to the standard config location
        #[arg(long)]
        save: bool,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => AppConfig::load_from(path)
            .map_err(|e| anyhow::anyhow!("Failed to load config {}: {e}", path.display()))?,
        None => AppConfig::load(),
    };

    // Initialize logging
    if cli.verbose {
        config.logging.level = "debug".to_string();
    }
    gazefit_common::logging::init_logging(&config.logging);
    tracing::debug!(data_dir = %config.data_dir.display(), "Configuration loaded");

    match cli.command {
        Commands::Calibrate {
            recording,
            output,
            append,
            cols,
            rows,
            layout,
        } => {
            if let Some(cols) = cols {
                config.calibration.grid_cols = cols;
            }
            if let Some(rows) = rows {
                config.calibration.grid_rows = rows;
            }
            if let Some(layout) = layout {
                config.features.layout = layout;
            }
            config.calibration.append |= append;
            config.validate()?;
            commands::calibrate::run(&config, recording, output)
        }
        Commands::Train {
            samples,
            output,
            alpha,
            no_standardize,
        } => {
            if let Some(alpha) = alpha {
                config.training.alpha = alpha;
            }
            if no_standardize {
                config.training.standardize = false;
            }
            config.validate()?;
            commands::train::run(&config, samples, output)
        }
        Commands::Realtime {
            recording,
            model,
            smoothing,
            fps,
            width,
            height,
            json,
        } => {
            if let Some(smoothing) = smoothing {
                config.realtime.smoothing = smoothing;
            }
            if let Some(fps) = fps {
                config.realtime.fps_target = fps;
            }
            config.validate()?;
            commands::realtime::run(&config, recording, model, width, height, json)
        }
        Commands::Info { path } => commands::info::run(&config, path),
        Commands::Grid {
            cols,
            rows,
            width,
            height,
        } => {
            if let Some(cols) = cols {
                config.calibration.grid_cols = cols;
            }
            if let Some(rows) = rows {
                config.calibration.grid_rows = rows;
            }
            config.validate()?;
            commands::grid::run(&config, width, height)
        }
        Commands::Simulate {
            output,
            frames_per_target,
            dropout,
        } => commands::simulate::run(&config, output, frames_per_target, dropout),
        Commands::Config { save } => commands::config::run(&config, save),
    }
}
