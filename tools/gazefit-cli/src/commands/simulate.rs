//! Write a synthetic landmark recording for offline runs.

use std::path::PathBuf;

use gazefit_common::config::AppConfig;
use gazefit_model::landmark::serialize_frames;
use gazefit_processing::synthetic::SyntheticFace;
use gazefit_session::calibration::grid_points;

const RECORDING_FPS: u32 = 30;

pub fn run(
    config: &AppConfig,
    output: PathBuf,
    frames_per_target: Option<usize>,
    dropout: usize,
) -> anyhow::Result<()> {
    let c = &config.calibration;
    let grid = grid_points(c.grid_cols, c.grid_rows, c.margin);
    // Matches the calibration driver's pace when no frames are dropped.
    let per_target = frames_per_target.unwrap_or(c.warmup_frames + c.dwell_frames);

    let frames = SyntheticFace::default().recording(&grid, per_target, RECORDING_FPS, dropout);
    let body = serialize_frames(&frames)
        .map_err(|e| anyhow::anyhow!("Failed to serialize frames: {e}"))?;
    let header = serde_json::json!({
        "source": "synthetic",
        "fps": RECORDING_FPS,
        "targets": grid.len(),
        "frames_per_target": per_target,
    });

    if let Some(parent) = output.parent() {
        std::fs::create_dir_all(parent)
            .map_err(|e| anyhow::anyhow!("Failed to create {}: {e}", parent.display()))?;
    }
    std::fs::write(&output, format!("# {header}\n{body}"))
        .map_err(|e| anyhow::anyhow!("Failed to write {}: {e}", output.display()))?;

    println!(
        "Wrote {} frames ({} targets x {per_target}) to: {}",
        frames.len(),
        grid.len(),
        output.display()
    );

    Ok(())
}
