//! Calibration -> training -> realtime over a recorded landmark stream.

use std::path::PathBuf;

use gazefit_common::config::AppConfig;
use gazefit_model::landmark::serialize_frames;
use gazefit_model::screen::ScreenPoint;
use gazefit_processing::smoothing::SmoothingAlgorithm;
use gazefit_processing::synthetic::SyntheticFace;
use gazefit_processing::trainer::RidgeConfig;
use gazefit_session::calibration::{grid_points, CalibrationConfig};
use gazefit_session::realtime::RealtimeConfig;
use gazefit_session::{
    read_samples, run_calibration, run_realtime, train_to_file, ReplaySource, SampleStore,
    SessionControl,
};

fn workspace(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(name);
    let _ = std::fs::remove_dir_all(&dir);
    std::fs::create_dir_all(&dir).unwrap();
    dir
}

#[test]
fn recorded_session_trains_a_model_that_finds_the_targets() {
    let dir = workspace("gazefit_test_pipeline_e2e");
    let app = AppConfig::default();
    let grid = grid_points(
        app.calibration.grid_cols,
        app.calibration.grid_rows,
        app.calibration.margin,
    );

    // The recording advances to the next target exactly when the driver does.
    let face = SyntheticFace::default();
    let per_target = app.calibration.warmup_frames + app.calibration.dwell_frames;
    let recording = face.recording(&grid, per_target, 30, 0);
    let recording_path = dir.join("calibration.jsonl");
    let header = "# {\"source\":\"synthetic\"}\n";
    std::fs::write(
        &recording_path,
        format!("{header}{}", serialize_frames(&recording).unwrap()),
    )
    .unwrap();

    // Calibrate.
    let config = CalibrationConfig::from_app(&app).unwrap();
    let samples_path = dir.join("calibration_samples.csv");
    let mut store = SampleStore::create(&samples_path, config.extractor.layout).unwrap();
    let mut source = ReplaySource::new(&recording_path);
    let summary = run_calibration(
        &mut source,
        &grid,
        &config,
        &SessionControl::new(),
        &mut store,
    )
    .unwrap();
    drop(store);

    assert_eq!(summary.points_completed, grid.len());
    assert_eq!(summary.sample_count, grid.len() * app.calibration.dwell_frames);
    assert!(!summary.aborted);
    assert_eq!(
        read_samples(&samples_path).unwrap().samples.len(),
        summary.sample_count
    );

    // Train.
    let model_path = dir.join("gaze_ridge_xy.json");
    let report = train_to_file(&samples_path, &model_path, &RidgeConfig::from_app(&app)).unwrap();
    assert_eq!(report.distinct_targets, grid.len());
    assert!(report.holdout.is_some());

    // Realtime on new gaze positions.
    let checkpoints = [
        ScreenPoint::new(0.25, 0.4),
        ScreenPoint::new(0.6, 0.8),
        ScreenPoint::new(0.8, 0.3),
    ];
    let live = face.recording(&checkpoints, 20, 30, 0);
    let live_path = dir.join("live.jsonl");
    std::fs::write(&live_path, serialize_frames(&live).unwrap()).unwrap();

    let mut realtime = RealtimeConfig::from_app(&app).unwrap();
    realtime.fps_target = 0;
    realtime.engine.smoothing = SmoothingAlgorithm::Ema { strength: 0.5 };
    let stream = run_realtime(
        &model_path,
        ReplaySource::new(&live_path),
        &realtime,
        SessionControl::new(),
    )
    .unwrap();

    let outputs: Vec<_> = stream.map(Result::unwrap).collect();
    assert_eq!(outputs.len(), live.len());
    for (i, checkpoint) in checkpoints.iter().enumerate() {
        // Last frame on each checkpoint, after the smoother has settled.
        let settled = outputs[(i + 1) * 20 - 1].output.point().unwrap();
        assert!(
            settled.distance(checkpoint) < 0.05,
            "checkpoint {checkpoint:?} estimated at {settled:?}"
        );
    }

    std::fs::remove_dir_all(&dir).ok();
}

#[test]
fn appended_sessions_accumulate_samples() {
    let dir = workspace("gazefit_test_pipeline_append");
    let face = SyntheticFace::default();
    let grid = grid_points(2, 2, 0.2);
    let config = CalibrationConfig {
        warmup_frames: 2,
        dwell_frames: 5,
        ..Default::default()
    };
    let recording_path = dir.join("rec.jsonl");
    std::fs::write(
        &recording_path,
        serialize_frames(&face.recording(&grid, 7, 30, 0)).unwrap(),
    )
    .unwrap();

    let samples_path = dir.join("samples.csv");
    let mut source = ReplaySource::new(&recording_path);
    for session in 0..2 {
        let layout = config.extractor.layout;
        let mut store = if session == 0 {
            SampleStore::create(&samples_path, layout).unwrap()
        } else {
            SampleStore::open_append(&samples_path, layout).unwrap()
        };
        // The same source restarts for every session.
        run_calibration(&mut source, &grid, &config, &SessionControl::new(), &mut store).unwrap();
    }

    let file = read_samples(&samples_path).unwrap();
    assert_eq!(file.samples.len(), 2 * grid.len() * 5);

    std::fs::remove_dir_all(&dir).ok();
}
