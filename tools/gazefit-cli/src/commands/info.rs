//! Show a model artifact or calibration sample file.

use std::path::{Path, PathBuf};

use gazefit_common::config::AppConfig;
use gazefit_model::model::Normalization;
use gazefit_processing::trainer::distinct_targets;
use gazefit_session::{load_model, read_samples};

pub fn run(config: &AppConfig, path: Option<PathBuf>) -> anyhow::Result<()> {
    let path = path.unwrap_or_else(|| config.model_path());
    let is_model = path.extension().and_then(|e| e.to_str()) == Some("json");
    if is_model {
        show_model(&path)
    } else {
        show_samples(&path)
    }
}

fn show_model(path: &Path) -> anyhow::Result<()> {
    let model = load_model(path).map_err(|e| anyhow::anyhow!("Failed to load model: {e}"))?;

    println!("Model: {}", path.display());
    println!("  Schema:     v{}", model.schema_version);
    println!("  Layout:     {}", model.feature_layout.describe());
    println!("  Features:   {}", model.feature_names.join(", "));
    println!(
        "  Normalize:  {}",
        match model.normalization {
            Normalization::None => "none",
            Normalization::Standardize { .. } => "standardize",
        }
    );
    println!("  Alpha:      {}", model.alpha);
    println!("  Samples:    {}", model.sample_count);
    println!("  Trained at: {}", model.trained_at);

    Ok(())
}

fn show_samples(path: &Path) -> anyhow::Result<()> {
    let file = read_samples(path).map_err(|e| anyhow::anyhow!("Failed to read samples: {e}"))?;

    println!("Samples: {}", path.display());
    println!("  Layout:     {}", file.layout.describe());
    match &file.header {
        Some(header) => println!(
            "  Created at: {} (schema v{})",
            header.created_at, header.schema_version
        ),
        None => println!("  Created at: unknown (no header)"),
    }
    println!("  Rows:       {}", file.samples.len());
    println!("  Targets:    {}", distinct_targets(&file.samples));
    if file.truncated_tail {
        println!("  Warning: interrupted final row was ignored");
    }

    Ok(())
}
