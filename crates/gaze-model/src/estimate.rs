//! Per-frame inference output.

use serde::{Deserialize, Serialize};

use crate::screen::ScreenPoint;

/// Tracking state of an inference engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrackingState {
    /// No model loaded.
    Idle,
    /// The latest frame produced features.
    Tracking,
    /// The latest frame produced no features.
    Lost,
}

/// Gaze estimate for one frame.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GazeEstimate {
    /// Unsmoothed prediction for this frame; `None` while lost.
    pub raw: Option<ScreenPoint>,
    /// Smoothed prediction reported to consumers.
    pub smoothed: ScreenPoint,
    /// State after processing this frame.
    pub state: TrackingState,
}

/// Result of one inference call.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum GazeOutput {
    Estimate(GazeEstimate),
    NoEstimate,
}

impl GazeOutput {
    pub fn estimate(&self) -> Option<&GazeEstimate> {
        match self {
            Self::Estimate(estimate) => Some(estimate),
            Self::NoEstimate => None,
        }
    }

    /// Smoothed point, if an estimate is available.
    pub fn point(&self) -> Option<ScreenPoint> {
        self.estimate().map(|e| e.smoothed)
    }

    pub fn is_estimate(&self) -> bool {
        matches!(self, Self::Estimate(_))
    }
}
