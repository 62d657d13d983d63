//! Fit a gaze model from a calibration sample file.

use std::path::PathBuf;

use gazefit_common::config::AppConfig;
use gazefit_processing::trainer::{AxisScores, RidgeConfig};
use gazefit_session::train_to_file;

fn print_scores(label: &str, scores: &AxisScores) {
    println!(
        "  {label}: x r2={:.4} rmse={:.4} | y r2={:.4} rmse={:.4} | combined rmse={:.4}",
        scores.x.r2,
        scores.x.rmse,
        scores.y.r2,
        scores.y.rmse,
        scores.combined_rmse()
    );
}

pub fn run(
    config: &AppConfig,
    samples: Option<PathBuf>,
    output: Option<PathBuf>,
) -> anyhow::Result<()> {
    let samples = samples.unwrap_or_else(|| config.samples_path());
    let output = output.unwrap_or_else(|| config.model_path());
    let ridge = RidgeConfig::from_app(config);

    println!("Training from: {}", samples.display());
    println!("  alpha={}, standardize={}", ridge.alpha, ridge.standardize);

    let report = train_to_file(&samples, &output, &ridge)
        .map_err(|e| anyhow::anyhow!("Training failed: {e}"))?;

    println!(
        "  {} samples, {} distinct targets, layout {}",
        report.sample_count, report.distinct_targets, report.feature_layout
    );
    print_scores("Training", &report.training);
    match &report.holdout {
        Some(holdout) => print_scores(
            &format!("Holdout (every {}th, {} samples)", holdout.every, holdout.held_out),
            &holdout.scores,
        ),
        None => println!("  Holdout: skipped"),
    }
    println!("  Model saved to: {}", output.display());

    Ok(())
}
