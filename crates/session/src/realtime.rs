//! Realtime inference driver.

use std::path::Path;

use serde::Serialize;
use tracing::info;

use gazefit_common::clock::{FramePacer, SessionClock};
use gazefit_common::config::AppConfig;
use gazefit_common::error::GazefitResult;
use gazefit_model::estimate::GazeOutput;
use gazefit_model::model::TrainedModel;
use gazefit_processing::engine::{EngineConfig, InferenceEngine};

use crate::control::SessionControl;
use crate::source::LandmarkSource;
use crate::training::load_model;

/// Realtime session parameters.
#[derive(Debug, Clone, Default)]
pub struct RealtimeConfig {
    pub engine: EngineConfig,

    /// Loop rate cap (0 = as fast as the source delivers).
    pub fps_target: u32,
}

impl RealtimeConfig {
    pub fn from_app(config: &AppConfig) -> GazefitResult<Self> {
        Ok(Self {
            engine: EngineConfig::from_app(config)?,
            fps_target: config.realtime.fps_target,
        })
    }
}

/// Inference output for one frame.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct GazeFrame {
    pub index: u64,
    pub timestamp_ns: u64,
    #[serde(flatten)]
    pub output: GazeOutput,
}

/// Load `model_artifact` and start streaming estimates from `source`.
pub fn run_realtime<S: LandmarkSource>(
    model_artifact: impl AsRef<Path>,
    source: S,
    config: &RealtimeConfig,
    control: SessionControl,
) -> GazefitResult<RealtimeStream<S>> {
    let model = load_model(model_artifact)?;
    RealtimeStream::start(model, source, config, control)
}

/// Iterator of per-frame gaze estimates.
///
/// Ends when the source is exhausted, on abort, or after yielding a source
/// error.
pub struct RealtimeStream<S: LandmarkSource> {
    source: S,
    engine: InferenceEngine,
    control: SessionControl,
    pacer: FramePacer,
    clock: SessionClock,
    frames: u64,
    estimates: u64,
    finished: bool,
}

impl<S: LandmarkSource> RealtimeStream<S> {
    /// Start a stream with an already-loaded model.
    pub fn start(
        model: TrainedModel,
        mut source: S,
        config: &RealtimeConfig,
        control: SessionControl,
    ) -> GazefitResult<Self> {
        let mut engine = InferenceEngine::new(config.engine.clone());
        engine.load(model)?;
        source.start()?;

        info!(
            source = source.name(),
            fps_target = config.fps_target,
            smoothing = ?config.engine.smoothing,
            "Realtime session started"
        );
        Ok(Self {
            source,
            engine,
            control,
            pacer: FramePacer::new(config.fps_target),
            clock: SessionClock::start(),
            frames: 0,
            estimates: 0,
            finished: false,
        })
    }

    pub fn engine(&self) -> &InferenceEngine {
        &self.engine
    }

    /// Frames processed so far.
    pub fn frames(&self) -> u64 {
        self.frames
    }

    /// Frames that produced an estimate.
    pub fn estimates(&self) -> u64 {
        self.estimates
    }

    fn finish(&mut self) {
        if self.finished {
            return;
        }
        self.finished = true;
        info!(
            frames = self.frames,
            estimates = self.estimates,
            elapsed_secs = self.clock.elapsed().as_secs_f64(),
            "Realtime session ended"
        );
    }
}

impl<S: LandmarkSource> Iterator for RealtimeStream<S> {
    type Item = GazefitResult<GazeFrame>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }
        if self.control.is_aborted() {
            self.finish();
            return None;
        }

        self.pacer.wait();
        let frame = match self.source.next_frame() {
            Ok(Some(frame)) => frame,
            Ok(None) => {
                self.finish();
                return None;
            }
            Err(e) => {
                self.finish();
                return Some(Err(e));
            }
        };

        let output = self.engine.infer(frame.landmarks.as_ref());
        self.frames += 1;
        if output.is_estimate() {
            self.estimates += 1;
        }
        Some(Ok(GazeFrame {
            index: frame.index,
            timestamp_ns: frame.timestamp_ns,
            output,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::MemorySource;
    use gazefit_common::error::GazefitError;
    use gazefit_model::estimate::TrackingState;
    use gazefit_model::feature::FeatureLayout;
    use gazefit_model::sample::CalibrationSample;
    use gazefit_model::screen::ScreenPoint;
    use gazefit_processing::features::FeatureExtractor;
    use gazefit_processing::smoothing::SmoothingAlgorithm;
    use gazefit_processing::synthetic::SyntheticFace;
    use gazefit_processing::trainer::ModelTrainer;

    fn model() -> TrainedModel {
        let face = SyntheticFace::default();
        let extractor = FeatureExtractor::default();
        let samples: Vec<_> = crate::calibration::grid_points(3, 3, 0.15)
            .into_iter()
            .map(|target| {
                let features = extractor.extract(Some(&face.landmarks_for(target))).unwrap();
                CalibrationSample::new(features, target)
            })
            .collect();
        ModelTrainer::default().fit(&samples).unwrap()
    }

    fn config() -> RealtimeConfig {
        RealtimeConfig {
            engine: EngineConfig {
                smoothing: SmoothingAlgorithm::None,
                max_lost_frames: 1,
                ..Default::default()
            },
            fps_target: 0,
        }
    }

    #[test]
    fn test_stream_follows_source() {
        let face = SyntheticFace::default();
        let frames = vec![
            Some(face.landmarks_for(ScreenPoint::new(0.3, 0.3))),
            None,
            None,
            Some(face.landmarks_for(ScreenPoint::new(0.7, 0.6))),
        ];
        let source = MemorySource::from_landmarks(frames, 30);
        let stream =
            RealtimeStream::start(model(), source, &config(), SessionControl::new()).unwrap();

        let outputs: Vec<GazeFrame> = stream.map(Result::unwrap).collect();
        assert_eq!(outputs.len(), 4);
        assert_eq!(
            outputs[1].output.estimate().map(|e| e.state),
            Some(TrackingState::Lost)
        );
        assert_eq!(outputs[2].output, GazeOutput::NoEstimate);
        let last = outputs[3].output.point().unwrap();
        assert!(last.distance(&ScreenPoint::new(0.7, 0.6)) < 0.05);
        assert_eq!(outputs[3].index, 3);
    }

    #[test]
    fn test_abort_ends_stream() {
        let face = SyntheticFace::default().landmarks_for(ScreenPoint::new(0.5, 0.5));
        let source = MemorySource::from_landmarks(vec![Some(face); 50], 30);
        let control = SessionControl::new();
        let mut stream =
            RealtimeStream::start(model(), source, &config(), control.clone()).unwrap();

        assert!(stream.next().is_some());
        assert!(stream.next().is_some());
        control.abort();
        assert!(stream.next().is_none());
        assert_eq!(stream.frames(), 2);
        assert_eq!(stream.estimates(), 2);
    }

    #[test]
    fn test_incompatible_model_is_rejected() {
        let mut config = config();
        config.engine.extractor.layout = FeatureLayout::EyeCentersV1;
        let source = MemorySource::from_landmarks(vec![None], 30);
        let err = RealtimeStream::start(model(), source, &config, SessionControl::new())
            .err()
            .unwrap();
        assert!(matches!(err, GazefitError::ModelIncompatibility { .. }));
    }

    #[test]
    fn test_missing_artifact() {
        let source = MemorySource::from_landmarks(vec![None], 30);
        let err = run_realtime(
            "/nonexistent/gazefit/model.json",
            source,
            &config(),
            SessionControl::new(),
        )
        .err()
        .unwrap();
        assert!(matches!(err, GazefitError::Persistence { .. }));
    }

    #[test]
    fn test_frame_json_is_flat() {
        let frame = GazeFrame {
            index: 4,
            timestamp_ns: 10,
            output: GazeOutput::NoEstimate,
        };
        let json = serde_json::to_string(&frame).unwrap();
        assert_eq!(json, r#"{"index":4,"timestamp_ns":10,"status":"no_estimate"}"#);
    }
}
