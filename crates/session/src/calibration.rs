//! Calibration session driver.
//!
//! For every grid target the driver lets `warmup_frames` frames pass so the
//! user can settle their gaze, then records one sample per successful
//! feature extraction until `dwell_frames` samples are in. Frames without
//! features don't count. A point ends early on a skip request or when it
//! exceeds `point_timeout_frames`; the whole session ends on abort or when
//! the source runs dry. Samples are flushed after every point.

use std::time::Duration;

use serde::Serialize;
use tracing::{debug, info, trace, warn};

use gazefit_common::clock::SessionClock;
use gazefit_common::config::AppConfig;
use gazefit_common::error::{GazefitError, GazefitResult};
use gazefit_model::sample::CalibrationSample;
use gazefit_model::screen::ScreenPoint;
use gazefit_processing::features::{ExtractorConfig, FeatureExtractor};

use crate::control::SessionControl;
use crate::source::LandmarkSource;
use crate::store::SampleStore;

/// Calibration targets: `cols` x `rows` points evenly spaced between
/// `margin` and `1 - margin`, row-major from the top-left.
pub fn grid_points(cols: usize, rows: usize, margin: f64) -> Vec<ScreenPoint> {
    let axis = |n: usize| -> Vec<f64> {
        match n {
            0 => Vec::new(),
            1 => vec![0.5],
            _ => (0..n)
                .map(|i| margin + (1.0 - 2.0 * margin) * i as f64 / (n - 1) as f64)
                .collect(),
        }
    };
    let xs = axis(cols);
    axis(rows)
        .into_iter()
        .flat_map(|y| xs.iter().map(move |&x| ScreenPoint::new(x, y)))
        .collect()
}

/// Calibration session parameters.
#[derive(Debug, Clone)]
pub struct CalibrationConfig {
    pub extractor: ExtractorConfig,

    /// Frames ignored at the start of each point.
    pub warmup_frames: usize,

    /// Samples recorded per point.
    pub dwell_frames: usize,

    /// Frame budget per point including warm-up (0 = unlimited).
    pub point_timeout_frames: usize,
}

impl Default for CalibrationConfig {
    fn default() -> Self {
        Self {
            extractor: ExtractorConfig::default(),
            warmup_frames: 8,
            dwell_frames: 18,
            point_timeout_frames: 300,
        }
    }
}

impl CalibrationConfig {
    pub fn from_app(config: &AppConfig) -> GazefitResult<Self> {
        let c = &config.calibration;
        Ok(Self {
            extractor: ExtractorConfig::from_app(config)?,
            warmup_frames: c.warmup_frames,
            dwell_frames: c.dwell_frames,
            point_timeout_frames: c.point_timeout_frames,
        })
    }
}

/// How a single point ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PointOutcome {
    Completed,
    Skipped,
    TimedOut,
    Aborted,
    SourceExhausted,
}

/// Per-point progress hooks for whatever draws the targets.
pub trait CalibrationObserver {
    fn point_started(&mut self, _index: usize, _target: ScreenPoint) {}

    fn point_finished(
        &mut self,
        _index: usize,
        _target: ScreenPoint,
        _outcome: PointOutcome,
        _samples: usize,
    ) {
    }
}

/// Observer that ignores all events.
#[derive(Debug, Default)]
pub struct NoopObserver;

impl CalibrationObserver for NoopObserver {}

/// Result of a calibration session.
#[derive(Debug, Clone, Serialize)]
pub struct CalibrationSummary {
    /// Samples recorded in this session.
    pub sample_count: usize,
    pub points_completed: usize,
    /// Points skipped on request or by timeout.
    pub points_skipped: usize,
    /// Session ended before the grid was done.
    pub aborted: bool,
    pub frames_seen: u64,
    pub elapsed: Duration,
}

/// Run a calibration session over `grid`, recording into `store`.
pub fn run_calibration<S: LandmarkSource + ?Sized>(
    source: &mut S,
    grid: &[ScreenPoint],
    config: &CalibrationConfig,
    control: &SessionControl,
    store: &mut SampleStore,
) -> GazefitResult<CalibrationSummary> {
    run_calibration_with(source, grid, config, control, store, &mut NoopObserver)
}

/// [`run_calibration`] with progress callbacks.
pub fn run_calibration_with<S: LandmarkSource + ?Sized>(
    source: &mut S,
    grid: &[ScreenPoint],
    config: &CalibrationConfig,
    control: &SessionControl,
    store: &mut SampleStore,
    observer: &mut dyn CalibrationObserver,
) -> GazefitResult<CalibrationSummary> {
    if grid.is_empty() {
        return Err(GazefitError::config("calibration grid is empty"));
    }
    if config.dwell_frames == 0 {
        return Err(GazefitError::config("dwell_frames must be positive"));
    }
    let needed = config.warmup_frames + config.dwell_frames;
    if config.point_timeout_frames > 0 && config.point_timeout_frames < needed {
        return Err(GazefitError::config(format!(
            "point_timeout_frames {} is below warmup_frames + dwell_frames ({needed})",
            config.point_timeout_frames
        )));
    }
    if store.layout() != config.extractor.layout {
        return Err(GazefitError::incompatible(
            config.extractor.layout.describe(),
            store.layout().describe(),
        ));
    }

    source.start()?;
    let clock = SessionClock::start();
    let mut session = Session {
        extractor: FeatureExtractor::new(config.extractor.clone()),
        config,
        control,
        frames_seen: 0,
    };

    info!(
        source = source.name(),
        points = grid.len(),
        layout = %config.extractor.layout,
        started_at = clock.epoch_wall(),
        "Calibration started"
    );

    let mut summary = CalibrationSummary {
        sample_count: 0,
        points_completed: 0,
        points_skipped: 0,
        aborted: false,
        frames_seen: 0,
        elapsed: Duration::ZERO,
    };

    for (index, &target) in grid.iter().enumerate() {
        // A skip requested between points applies to nothing.
        control.take_skip();
        observer.point_started(index, target);
        debug!(index, x = target.x, y = target.y, "Calibration point");

        let result = session.run_point(source, target, store);
        let flushed = store.flush();
        let (outcome, samples) = result?;
        flushed?;

        observer.point_finished(index, target, outcome, samples);
        summary.sample_count += samples;
        match outcome {
            PointOutcome::Completed => summary.points_completed += 1,
            PointOutcome::Skipped => summary.points_skipped += 1,
            PointOutcome::TimedOut => {
                warn!(index, samples, "Calibration point timed out");
                summary.points_skipped += 1;
            }
            PointOutcome::Aborted | PointOutcome::SourceExhausted => {
                if outcome == PointOutcome::SourceExhausted {
                    warn!(index, "Frame source ended before calibration finished");
                }
                summary.aborted = true;
                break;
            }
        }
    }

    summary.frames_seen = session.frames_seen;
    summary.elapsed = clock.elapsed();
    info!(
        samples = summary.sample_count,
        completed = summary.points_completed,
        skipped = summary.points_skipped,
        aborted = summary.aborted,
        frames = summary.frames_seen,
        elapsed_secs = summary.elapsed.as_secs_f64(),
        "Calibration finished"
    );
    Ok(summary)
}

struct Session<'a> {
    extractor: FeatureExtractor,
    config: &'a CalibrationConfig,
    control: &'a SessionControl,
    frames_seen: u64,
}

impl Session<'_> {
    fn run_point<S: LandmarkSource + ?Sized>(
        &mut self,
        source: &mut S,
        target: ScreenPoint,
        store: &mut SampleStore,
    ) -> GazefitResult<(PointOutcome, usize)> {
        let timeout = self.config.point_timeout_frames;
        let mut frames = 0usize;
        let mut recorded = 0usize;

        loop {
            if self.control.is_aborted() {
                return Ok((PointOutcome::Aborted, recorded));
            }
            if self.control.take_skip() {
                return Ok((PointOutcome::Skipped, recorded));
            }
            if timeout > 0 && frames >= timeout {
                return Ok((PointOutcome::TimedOut, recorded));
            }

            let Some(frame) = source.next_frame()? else {
                return Ok((PointOutcome::SourceExhausted, recorded));
            };
            self.frames_seen += 1;
            frames += 1;
            if frames <= self.config.warmup_frames {
                continue;
            }

            match self.extractor.extract(frame.landmarks.as_ref()) {
                Ok(features) => {
                    store.record(CalibrationSample::new(features, target))?;
                    recorded += 1;
                    if recorded >= self.config.dwell_frames {
                        return Ok((PointOutcome::Completed, recorded));
                    }
                }
                Err(reason) => trace!(frame = frame.index, %reason, "Frame skipped"),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::{Frame, MemorySource};
    use crate::store::read_samples;
    use gazefit_model::feature::FeatureLayout;
    use gazefit_model::landmark::LandmarkSet;
    use gazefit_processing::synthetic::SyntheticFace;
    use std::path::PathBuf;

    fn temp_store(name: &str) -> (PathBuf, SampleStore) {
        let dir = std::env::temp_dir().join(name);
        let _ = std::fs::remove_dir_all(&dir);
        let path = dir.join("samples.csv");
        let store = SampleStore::create(&path, FeatureLayout::IrisOffsetV1).unwrap();
        (dir, store)
    }

    fn config(warmup: usize, dwell: usize, timeout: usize) -> CalibrationConfig {
        CalibrationConfig {
            warmup_frames: warmup,
            dwell_frames: dwell,
            point_timeout_frames: timeout,
            ..Default::default()
        }
    }

    fn face() -> Option<LandmarkSet> {
        Some(SyntheticFace::default().landmarks_for(ScreenPoint::new(0.5, 0.5)))
    }

    /// Source that runs a closure before handing out each frame.
    struct Scripted<F: FnMut(u64)> {
        inner: MemorySource,
        before_frame: F,
    }

    impl<F: FnMut(u64)> LandmarkSource for Scripted<F> {
        fn start(&mut self) -> GazefitResult<()> {
            self.inner.start()
        }

        fn next_frame(&mut self) -> GazefitResult<Option<Frame>> {
            let frame = self.inner.next_frame()?;
            if let Some(frame) = &frame {
                (self.before_frame)(frame.index);
            }
            Ok(frame)
        }

        fn name(&self) -> &str {
            "scripted"
        }
    }

    #[test]
    fn test_grid_points_row_major() {
        let grid = grid_points(3, 3, 0.15);
        assert_eq!(grid.len(), 9);
        assert_eq!(grid[0], ScreenPoint::new(0.15, 0.15));
        assert!((grid[1].x - 0.5).abs() < 1e-12);
        assert_eq!(grid[1].y, 0.15);
        assert!((grid[8].x - 0.85).abs() < 1e-12);
        assert!((grid[8].y - 0.85).abs() < 1e-12);

        assert_eq!(grid_points(1, 1, 0.1), vec![ScreenPoint::new(0.5, 0.5)]);
        assert!(grid_points(0, 3, 0.1).is_empty());
    }

    #[test]
    fn test_failed_frames_do_not_count_toward_dwell() {
        let (dir, mut store) = temp_store("gazefit_test_calib_dwell");
        // warm-up 2, then alternate face / no face.
        let mut frames = vec![face(), face()];
        for _ in 0..10 {
            frames.push(face());
            frames.push(None);
        }
        let mut source = MemorySource::from_landmarks(frames, 30);
        let grid = [ScreenPoint::new(0.2, 0.2)];

        let summary = run_calibration(
            &mut source,
            &grid,
            &config(2, 4, 0),
            &SessionControl::new(),
            &mut store,
        )
        .unwrap();

        assert_eq!(summary.sample_count, 4);
        assert_eq!(summary.points_completed, 1);
        // 2 warm-up + face, none, face, none, face, none, face
        assert_eq!(summary.frames_seen, 9);
        assert!(!summary.aborted);

        let file = read_samples(store.path()).unwrap();
        assert_eq!(file.samples.len(), 4);
        assert!(file.samples.iter().all(|s| s.target == grid[0]));

        drop(store);
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_source_exhaustion_ends_session() {
        let (dir, mut store) = temp_store("gazefit_test_calib_exhausted");
        let mut source = MemorySource::from_landmarks(vec![face(); 5], 30);
        let grid = grid_points(2, 2, 0.15);

        let summary = run_calibration(
            &mut source,
            &grid,
            &config(0, 3, 0),
            &SessionControl::new(),
            &mut store,
        )
        .unwrap();

        assert!(summary.aborted);
        assert_eq!(summary.points_completed, 1);
        assert_eq!(summary.sample_count, 5);
        assert_eq!(read_samples(store.path()).unwrap().samples.len(), 5);

        drop(store);
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_abort_flushes_partial_point() {
        let (dir, mut store) = temp_store("gazefit_test_calib_abort");
        let control = SessionControl::new();
        let remote = control.clone();
        let mut source = Scripted {
            inner: MemorySource::from_landmarks(vec![face(); 100], 30),
            before_frame: move |index| {
                if index == 25 {
                    remote.abort();
                }
            },
        };

        let summary = run_calibration(
            &mut source,
            &grid_points(3, 3, 0.15),
            &config(0, 10, 0),
            &control,
            &mut store,
        )
        .unwrap();

        // Points 0 and 1 complete (frames 0-19); frames 20-25 go to point 2.
        assert!(summary.aborted);
        assert_eq!(summary.points_completed, 2);
        assert_eq!(summary.sample_count, 26);
        assert_eq!(store.pending(), 0);
        assert_eq!(read_samples(store.path()).unwrap().samples.len(), 26);

        drop(store);
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_skip_advances_to_next_point() {
        let (dir, mut store) = temp_store("gazefit_test_calib_skip");
        let control = SessionControl::new();
        let remote = control.clone();
        let mut source = Scripted {
            inner: MemorySource::from_landmarks(vec![face(); 100], 30),
            before_frame: move |index| {
                if index == 2 {
                    remote.skip();
                }
            },
        };
        let grid = [ScreenPoint::new(0.1, 0.1), ScreenPoint::new(0.9, 0.9)];

        let summary =
            run_calibration(&mut source, &grid, &config(0, 5, 0), &control, &mut store).unwrap();

        assert_eq!(summary.points_skipped, 1);
        assert_eq!(summary.points_completed, 1);
        let samples = read_samples(store.path()).unwrap().samples;
        let first = samples.iter().filter(|s| s.target == grid[0]).count();
        let second = samples.iter().filter(|s| s.target == grid[1]).count();
        assert_eq!(first, 3);
        assert_eq!(second, 5);

        drop(store);
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_point_timeout_skips_faceless_point() {
        let (dir, mut store) = temp_store("gazefit_test_calib_timeout");
        let mut frames = vec![None; 6];
        frames.extend(vec![face(); 10]);
        let mut source = MemorySource::from_landmarks(frames, 30);
        let grid = [ScreenPoint::new(0.1, 0.1), ScreenPoint::new(0.9, 0.9)];

        let summary = run_calibration(
            &mut source,
            &grid,
            &config(1, 4, 6),
            &SessionControl::new(),
            &mut store,
        )
        .unwrap();

        assert_eq!(summary.points_skipped, 1);
        assert_eq!(summary.points_completed, 1);
        assert_eq!(summary.sample_count, 4);
        assert!(!summary.aborted);

        drop(store);
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_timeout_shorter_than_a_point_is_rejected() {
        let (dir, mut store) = temp_store("gazefit_test_calib_short_timeout");
        let mut source = MemorySource::from_landmarks(vec![face(); 1000], 30);

        let err = run_calibration(
            &mut source,
            &grid_points(3, 3, 0.15),
            &config(8, 18, 10),
            &SessionControl::new(),
            &mut store,
        )
        .unwrap_err();
        assert!(matches!(err, GazefitError::Config { .. }));
        assert_eq!(store.pending(), 0);

        // A budget of exactly warm-up + dwell is enough to finish a point.
        let summary = run_calibration(
            &mut source,
            &grid_points(1, 1, 0.15),
            &config(8, 18, 26),
            &SessionControl::new(),
            &mut store,
        )
        .unwrap();
        assert_eq!(summary.points_completed, 1);
        assert_eq!(summary.sample_count, 18);

        drop(store);
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_store_layout_must_match_extractor() {
        let dir = std::env::temp_dir().join("gazefit_test_calib_layout");
        let _ = std::fs::remove_dir_all(&dir);
        let mut store =
            SampleStore::create(dir.join("s.csv"), FeatureLayout::EyeCentersV1).unwrap();
        let mut source = MemorySource::from_landmarks(vec![face()], 30);

        let err = run_calibration(
            &mut source,
            &grid_points(1, 1, 0.1),
            &CalibrationConfig::default(),
            &SessionControl::new(),
            &mut store,
        )
        .unwrap_err();
        assert!(matches!(err, GazefitError::ModelIncompatibility { .. }));

        drop(store);
        std::fs::remove_dir_all(&dir).ok();
    }
}
