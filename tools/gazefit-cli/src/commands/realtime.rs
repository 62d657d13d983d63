//! Stream gaze estimates for a recorded landmark stream.

use std::path::PathBuf;

use gazefit_common::config::AppConfig;
use gazefit_model::estimate::{GazeOutput, TrackingState};
use gazefit_session::realtime::RealtimeConfig;
use gazefit_session::{run_realtime, ReplaySource, SessionControl};

pub fn run(
    config: &AppConfig,
    recording: PathBuf,
    model: Option<PathBuf>,
    width: u32,
    height: u32,
    json: bool,
) -> anyhow::Result<()> {
    let model = model.unwrap_or_else(|| config.model_path());
    let realtime = RealtimeConfig::from_app(config)?;
    let control = SessionControl::new();
    super::abort_on_ctrl_c(&control)?;

    let mut stream = run_realtime(&model, ReplaySource::new(&recording), &realtime, control)
        .map_err(|e| anyhow::anyhow!("Failed to start realtime session: {e}"))?;

    if !json {
        println!("Model: {}", model.display());
        println!("Landmarks: {}", recording.display());
        println!("  Screen: {width}x{height}\n");
    }

    for frame in stream.by_ref() {
        let frame = frame.map_err(|e| anyhow::anyhow!("Landmark stream failed: {e}"))?;
        if json {
            println!("{}", serde_json::to_string(&frame)?);
            continue;
        }
        match frame.output {
            GazeOutput::Estimate(estimate) => {
                let (px, py) = estimate.smoothed.to_pixels(width, height);
                let marker = match estimate.state {
                    TrackingState::Lost => " (held)",
                    _ => "",
                };
                println!("  #{:<6} {px:>5}, {py:>5}{marker}", frame.index);
            }
            GazeOutput::NoEstimate => println!("  #{:<6} no estimate", frame.index),
        }
    }

    if !json {
        println!(
            "\n  {} frames, {} estimates",
            stream.frames(),
            stream.estimates()
        );
    }

    Ok(())
}
