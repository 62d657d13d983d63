//! Real-time inference engine.
//!
//! ```text
//!            load()                      frame without features
//!   Idle ───────────────▶ Tracking ─────────────────────────────▶ Lost
//!    ▲                     ▲   │                                   │
//!    │      unload()       │   └────── frame with features ◀───────┘
//!    └─────────────────────┴───────────────────────────────────────┘
//! ```
//!
//! While Lost the last smoothed estimate is held for up to
//! `max_lost_frames` consecutive frames. Past that the engine reports no
//! estimate and drops the smoothing history, so a resumed track is not
//! blended with stale positions.

use tracing::{debug, info, trace};

use gazefit_common::config::AppConfig;
use gazefit_common::error::{GazefitError, GazefitResult};
use gazefit_model::estimate::{GazeEstimate, GazeOutput, TrackingState};
use gazefit_model::feature::FeatureVector;
use gazefit_model::landmark::LandmarkSet;
use gazefit_model::model::TrainedModel;
use gazefit_model::screen::ScreenPoint;

use crate::features::{ExtractorConfig, FeatureExtractor};
use crate::smoothing::{GazeSmoother, SmoothingAlgorithm};

/// Engine configuration.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub extractor: ExtractorConfig,
    pub smoothing: SmoothingAlgorithm,

    /// Consecutive lost frames during which the last estimate is held.
    pub max_lost_frames: usize,

    /// Clamp smoothed estimates into the unit square.
    pub clamp_to_screen: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            extractor: ExtractorConfig::default(),
            smoothing: SmoothingAlgorithm::default(),
            max_lost_frames: 15,
            clamp_to_screen: false,
        }
    }
}

impl EngineConfig {
    pub fn from_app(config: &AppConfig) -> GazefitResult<Self> {
        Ok(Self {
            extractor: ExtractorConfig::from_app(config)?,
            smoothing: SmoothingAlgorithm::from_app(config)?,
            max_lost_frames: config.realtime.max_lost_frames,
            clamp_to_screen: config.realtime.clamp_to_screen,
        })
    }
}

#[derive(Debug)]
enum EngineState {
    Idle,
    Tracking { model: Box<TrainedModel> },
    Lost { model: Box<TrainedModel>, frames: usize },
}

/// Applies a trained model to a stream of frames.
#[derive(Debug)]
pub struct InferenceEngine {
    config: EngineConfig,
    extractor: FeatureExtractor,
    smoother: GazeSmoother,
    state: EngineState,
}

impl InferenceEngine {
    /// Create an Idle engine.
    pub fn new(config: EngineConfig) -> Self {
        Self {
            extractor: FeatureExtractor::new(config.extractor.clone()),
            smoother: GazeSmoother::new(config.smoothing),
            state: EngineState::Idle,
            config,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Load `model`, replacing any previous one.
    ///
    /// On a layout mismatch the engine keeps its previous state.
    pub fn load(&mut self, model: TrainedModel) -> GazefitResult<()> {
        let layout = self.extractor.layout();
        model
            .check_layout(layout)
            .map_err(|_| {
                GazefitError::incompatible(
                    layout.describe(),
                    format!("{} ({} features)", model.feature_layout, model.feature_length),
                )
            })?;
        model
            .validate()
            .map_err(|e| GazefitError::config(e.to_string()))?;

        info!(
            layout = %model.feature_layout,
            samples = model.sample_count,
            trained_at = %model.trained_at,
            "Model loaded"
        );
        self.smoother.reset();
        self.state = EngineState::Tracking {
            model: Box::new(model),
        };
        Ok(())
    }

    /// Drop the model and return to Idle.
    pub fn unload(&mut self) -> Option<TrainedModel> {
        self.smoother.reset();
        match std::mem::replace(&mut self.state, EngineState::Idle) {
            EngineState::Idle => None,
            EngineState::Tracking { model } | EngineState::Lost { model, .. } => Some(*model),
        }
    }

    pub fn state(&self) -> TrackingState {
        match self.state {
            EngineState::Idle => TrackingState::Idle,
            EngineState::Tracking { .. } => TrackingState::Tracking,
            EngineState::Lost { .. } => TrackingState::Lost,
        }
    }

    /// Consecutive frames without features (0 unless Lost).
    pub fn lost_frames(&self) -> usize {
        match self.state {
            EngineState::Lost { frames, .. } => frames,
            _ => 0,
        }
    }

    pub fn model(&self) -> Option<&TrainedModel> {
        match &self.state {
            EngineState::Idle => None,
            EngineState::Tracking { model } | EngineState::Lost { model, .. } => Some(model),
        }
    }

    /// Process one frame of landmarks.
    pub fn infer(&mut self, landmarks: Option<&LandmarkSet>) -> GazeOutput {
        if matches!(self.state, EngineState::Idle) {
            return GazeOutput::NoEstimate;
        }
        match self.extractor.extract(landmarks) {
            Ok(features) => self.step(Some(&features)),
            Err(reason) => {
                trace!(%reason, "No features for frame");
                self.step(None)
            }
        }
    }

    /// Advance with already-extracted features (`None` for a lost frame).
    pub fn step(&mut self, features: Option<&FeatureVector>) -> GazeOutput {
        let state = std::mem::replace(&mut self.state, EngineState::Idle);
        let (state, output) = match state {
            EngineState::Idle => (EngineState::Idle, GazeOutput::NoEstimate),
            EngineState::Tracking { model } | EngineState::Lost { model, .. }
                if features.is_some() =>
            {
                self.track(model, features)
            }
            EngineState::Tracking { model } => self.lose(model, 1),
            EngineState::Lost { model, frames } => self.lose(model, frames + 1),
        };
        self.state = state;
        output
    }

    fn track(
        &mut self,
        model: Box<TrainedModel>,
        features: Option<&FeatureVector>,
    ) -> (EngineState, GazeOutput) {
        let raw = match features.map(|f| model.predict(f)) {
            Some(Ok(point)) if point.is_finite() => point,
            Some(Ok(point)) => {
                debug!(?point, "Discarding non-finite prediction");
                return self.lose(model, 1);
            }
            Some(Err(e)) => {
                debug!(error = %e, "Feature vector rejected by model");
                return self.lose(model, 1);
            }
            None => return self.lose(model, 1),
        };

        let smoothed = self.smoother.push(raw);
        let smoothed = self.finish(smoothed);
        let output = GazeOutput::Estimate(GazeEstimate {
            raw: Some(raw),
            smoothed,
            state: TrackingState::Tracking,
        });
        (EngineState::Tracking { model }, output)
    }

    fn lose(&mut self, model: Box<TrainedModel>, frames: usize) -> (EngineState, GazeOutput) {
        if frames == 1 {
            debug!("Tracking lost");
        }
        let held = match self.smoother.current() {
            Some(point) if frames <= self.config.max_lost_frames => point,
            Some(_) => {
                if frames == self.config.max_lost_frames + 1 {
                    debug!(frames, "Lost for too long, clearing smoothing history");
                }
                self.smoother.reset();
                return (EngineState::Lost { model, frames }, GazeOutput::NoEstimate);
            }
            None => return (EngineState::Lost { model, frames }, GazeOutput::NoEstimate),
        };

        let output = GazeOutput::Estimate(GazeEstimate {
            raw: None,
            smoothed: self.finish(held),
            state: TrackingState::Lost,
        });
        (EngineState::Lost { model, frames }, output)
    }

    fn finish(&self, point: ScreenPoint) -> ScreenPoint {
        if self.config.clamp_to_screen {
            point.clamped()
        } else {
            point
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::synthetic::SyntheticFace;
    use crate::trainer::ModelTrainer;
    use gazefit_model::feature::FeatureLayout;
    use gazefit_model::sample::CalibrationSample;

    fn train_for(layout: FeatureLayout) -> TrainedModel {
        let face = SyntheticFace::default();
        let extractor = FeatureExtractor::with_layout(layout);
        let mut samples = Vec::new();
        for &y in &[0.15, 0.5, 0.85] {
            for &x in &[0.15, 0.5, 0.85] {
                let target = ScreenPoint::new(x, y);
                for k in 0..3 {
                    let jitter = (k as f64 * 1e-4, -(k as f64) * 1e-4);
                    let features = extractor
                        .extract(Some(&face.landmarks_with_offset(target, jitter)))
                        .unwrap();
                    samples.push(CalibrationSample::new(features, target));
                }
            }
        }
        ModelTrainer::default().fit(&samples).unwrap()
    }

    fn engine(max_lost_frames: usize) -> InferenceEngine {
        InferenceEngine::new(EngineConfig {
            smoothing: SmoothingAlgorithm::None,
            max_lost_frames,
            ..Default::default()
        })
    }

    #[test]
    fn test_idle_engine_has_no_estimate() {
        let mut engine = engine(15);
        let face = SyntheticFace::default().landmarks_for(ScreenPoint::new(0.5, 0.5));
        assert_eq!(engine.state(), TrackingState::Idle);
        assert_eq!(engine.infer(Some(&face)), GazeOutput::NoEstimate);
        assert_eq!(engine.state(), TrackingState::Idle);
    }

    #[test]
    fn test_layout_mismatch_keeps_engine_idle() {
        let mut engine = engine(15);
        let model = train_for(FeatureLayout::EyeApertureV1);

        let err = engine.load(model).unwrap_err();
        match err {
            GazefitError::ModelIncompatibility { expected, found } => {
                assert_eq!(expected, "iris-offset-v1 (8 features)");
                assert_eq!(found, "eye-aperture-v1 (6 features)");
            }
            other => panic!("unexpected error {other}"),
        }
        assert_eq!(engine.state(), TrackingState::Idle);
        assert!(engine.model().is_none());
    }

    #[test]
    fn test_tracking_predicts_target() {
        let mut engine = engine(15);
        engine.load(train_for(FeatureLayout::IrisOffsetV1)).unwrap();

        let target = ScreenPoint::new(0.85, 0.15);
        let face = SyntheticFace::default().landmarks_for(target);
        let output = engine.infer(Some(&face));
        let estimate = output.estimate().unwrap();
        assert_eq!(estimate.state, TrackingState::Tracking);
        assert!(estimate.raw.unwrap().distance(&target) < 0.05);
    }

    #[test]
    fn test_lost_frames_hold_then_drop() {
        let mut engine = engine(3);
        engine.load(train_for(FeatureLayout::IrisOffsetV1)).unwrap();
        let face = SyntheticFace::default().landmarks_for(ScreenPoint::new(0.5, 0.5));

        let last = engine.infer(Some(&face)).point().unwrap();
        for i in 1..=3 {
            let output = engine.infer(None);
            let estimate = output.estimate().unwrap();
            assert_eq!(estimate.state, TrackingState::Lost);
            assert_eq!(estimate.raw, None);
            assert_eq!(estimate.smoothed, last);
            assert_eq!(engine.lost_frames(), i);
        }

        // Frames 4 and 5 exceed the hold.
        assert_eq!(engine.infer(None), GazeOutput::NoEstimate);
        assert_eq!(engine.infer(None), GazeOutput::NoEstimate);
        assert_eq!(engine.state(), TrackingState::Lost);
        assert_eq!(engine.lost_frames(), 5);

        // Resumes without blending in the stale position.
        let face = SyntheticFace::default().landmarks_for(ScreenPoint::new(0.15, 0.85));
        let estimate = *engine.infer(Some(&face)).estimate().unwrap();
        assert_eq!(estimate.state, TrackingState::Tracking);
        assert_eq!(estimate.raw, Some(estimate.smoothed));
        assert_eq!(engine.lost_frames(), 0);
    }

    #[test]
    fn test_lost_resets_smoother_only_after_hold() {
        let mut engine = InferenceEngine::new(EngineConfig {
            smoothing: SmoothingAlgorithm::Ema { strength: 0.75 },
            max_lost_frames: 5,
            ..Default::default()
        });
        engine.load(train_for(FeatureLayout::IrisOffsetV1)).unwrap();
        let left = SyntheticFace::default().landmarks_for(ScreenPoint::new(0.15, 0.5));
        let right = SyntheticFace::default().landmarks_for(ScreenPoint::new(0.85, 0.5));

        engine.infer(Some(&left));
        engine.infer(None);
        let blended = engine.infer(Some(&right)).estimate().copied().unwrap();
        assert!(blended.smoothed.x < blended.raw.unwrap().x - 0.1);
    }

    #[test]
    fn test_unload_returns_model() {
        let mut engine = engine(15);
        engine.load(train_for(FeatureLayout::IrisOffsetV1)).unwrap();
        assert!(engine.unload().is_some());
        assert_eq!(engine.state(), TrackingState::Idle);
        assert!(engine.unload().is_none());
    }

    #[test]
    fn test_clamp_to_screen() {
        let mut engine = InferenceEngine::new(EngineConfig {
            smoothing: SmoothingAlgorithm::None,
            clamp_to_screen: true,
            ..Default::default()
        });
        engine.load(train_for(FeatureLayout::IrisOffsetV1)).unwrap();
        let face = SyntheticFace::default().landmarks_for(ScreenPoint::new(1.4, -0.3));
        let estimate = *engine.infer(Some(&face)).estimate().unwrap();
        assert_eq!(estimate.smoothed.x, 1.0);
        assert_eq!(estimate.smoothed.y, 0.0);
    }
}
