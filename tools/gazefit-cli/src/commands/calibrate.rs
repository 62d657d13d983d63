//! Run a calibration session over a recorded landmark stream.

use std::path::PathBuf;

use gazefit_common::config::AppConfig;
use gazefit_model::screen::ScreenPoint;
use gazefit_session::calibration::{
    grid_points, CalibrationConfig, CalibrationObserver, PointOutcome,
};
use gazefit_session::{run_calibration_with, ReplaySource, SampleStore, SessionControl};

/// Prints one line per finished point.
struct ProgressPrinter {
    total: usize,
}

impl CalibrationObserver for ProgressPrinter {
    fn point_finished(
        &mut self,
        index: usize,
        target: ScreenPoint,
        outcome: PointOutcome,
        samples: usize,
    ) {
        let status = match outcome {
            PointOutcome::Completed => "ok",
            PointOutcome::Skipped => "skipped",
            PointOutcome::TimedOut => "timed out",
            PointOutcome::Aborted => "aborted",
            PointOutcome::SourceExhausted => "stream ended",
        };
        println!(
            "  [{}/{}] ({:.3}, {:.3}): {samples} samples, {status}",
            index + 1,
            self.total,
            target.x,
            target.y
        );
    }
}

pub fn run(config: &AppConfig, recording: PathBuf, output: Option<PathBuf>) -> anyhow::Result<()> {
    let output = output.unwrap_or_else(|| config.samples_path());
    let calibration = CalibrationConfig::from_app(config)?;
    let layout = calibration.extractor.layout;
    let grid = grid_points(
        config.calibration.grid_cols,
        config.calibration.grid_rows,
        config.calibration.margin,
    );

    println!("Calibrating from: {}", recording.display());
    println!(
        "  Grid: {}x{} ({} points), layout: {layout}",
        config.calibration.grid_cols,
        config.calibration.grid_rows,
        grid.len()
    );

    if let Some(parent) = output.parent() {
        std::fs::create_dir_all(parent)
            .map_err(|e| anyhow::anyhow!("Failed to create {}: {e}", parent.display()))?;
    }
    let mut store = if config.calibration.append {
        SampleStore::open_append(&output, layout)
    } else {
        SampleStore::create(&output, layout)
    }
    .map_err(|e| anyhow::anyhow!("Failed to open sample file: {e}"))?;
    let existing = store.flushed();
    if existing > 0 {
        println!("  Appending to {existing} existing samples");
    }

    let control = SessionControl::new();
    super::abort_on_ctrl_c(&control)?;
    println!("  Press Ctrl+C to stop early; recorded samples are kept.\n");

    let mut source = ReplaySource::new(recording);
    let mut printer = ProgressPrinter { total: grid.len() };
    let summary = run_calibration_with(
        &mut source,
        &grid,
        &calibration,
        &control,
        &mut store,
        &mut printer,
    )
    .map_err(|e| anyhow::anyhow!("Calibration failed: {e}"))?;

    println!(
        "\n  Recorded {} samples over {} frames ({:.1}s)",
        summary.sample_count,
        summary.frames_seen,
        summary.elapsed.as_secs_f64()
    );
    println!(
        "  Points: {} completed, {} skipped",
        summary.points_completed, summary.points_skipped
    );
    if summary.aborted {
        println!("  Session ended before the grid was finished.");
    }
    println!("  Samples saved to: {}", output.display());

    Ok(())
}
