//! Gaze point smoothing.
//!
//! Raw per-frame predictions jitter with detector noise. The smoother
//! filters them one point at a time, independently per axis. All
//! strength-based algorithms take `strength` in [0.0, 1.0], where larger
//! values mean more smoothing.

use std::collections::VecDeque;

use gazefit_common::config::AppConfig;
use gazefit_common::error::{GazefitError, GazefitResult};
use gazefit_model::screen::ScreenPoint;

/// Smallest EMA weight on the newest point; the filter always follows input.
const MIN_EMA_ALPHA: f64 = 0.01;

/// Available smoothing algorithms.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SmoothingAlgorithm {
    /// Exponential Moving Average.
    ///
    /// `alpha = max(1 - strength, 0.01)`, then
    /// `smoothed = alpha * current + (1 - alpha) * previous`.
    Ema { strength: f64 },

    /// 1D Kalman filter per axis.
    Kalman { strength: f64 },

    /// Mean of the last `window` points.
    MovingAverage { window: usize },

    /// Pass raw points through.
    None,
}

impl Default for SmoothingAlgorithm {
    fn default() -> Self {
        Self::Ema { strength: 0.75 }
    }
}

impl SmoothingAlgorithm {
    /// Build an algorithm from its config name.
    pub fn from_name(name: &str, strength: f64, window: usize) -> GazefitResult<Self> {
        if name == "ema" && strength >= 1.0 {
            return Err(GazefitError::config(format!(
                "ema smoothing strength {strength} would freeze the estimate (must be below 1.0)"
            )));
        }
        let strength = clamp01(strength);
        match name {
            "ema" => Ok(Self::Ema { strength }),
            "kalman" => Ok(Self::Kalman { strength }),
            "moving-average" => Ok(Self::MovingAverage {
                window: window.max(1),
            }),
            "none" => Ok(Self::None),
            other => Err(GazefitError::config(format!(
                "unknown smoothing algorithm {other:?} (expected ema, kalman, moving-average or none)"
            ))),
        }
    }

    pub fn from_app(config: &AppConfig) -> GazefitResult<Self> {
        let rt = &config.realtime;
        Self::from_name(&rt.smoothing, rt.smoothing_strength, rt.smoothing_window)
    }
}

#[derive(Debug, Clone, Copy)]
struct KalmanAxis {
    estimate: f64,
    variance: f64,
}

impl KalmanAxis {
    fn new(initial: f64) -> Self {
        Self {
            estimate: initial,
            variance: 1.0,
        }
    }

    fn update(&mut self, measurement: f64, q: f64, r: f64) -> f64 {
        self.variance += q;
        let gain = self.variance / (self.variance + r);
        self.estimate += gain * (measurement - self.estimate);
        self.variance *= 1.0 - gain;
        self.estimate
    }
}

#[derive(Debug, Clone)]
enum History {
    Empty,
    Ema(ScreenPoint),
    Kalman { x: KalmanAxis, y: KalmanAxis },
    Window(VecDeque<ScreenPoint>),
    Last(ScreenPoint),
}

/// Streaming smoother over raw gaze points.
#[derive(Debug, Clone)]
pub struct GazeSmoother {
    algorithm: SmoothingAlgorithm,
    history: History,
}

impl GazeSmoother {
    pub fn new(algorithm: SmoothingAlgorithm) -> Self {
        Self {
            algorithm,
            history: History::Empty,
        }
    }

    pub fn algorithm(&self) -> SmoothingAlgorithm {
        self.algorithm
    }

    /// Feed one raw point and return the smoothed point.
    pub fn push(&mut self, raw: ScreenPoint) -> ScreenPoint {
        let history = std::mem::replace(&mut self.history, History::Empty);
        let (history, smoothed) = match (self.algorithm, history) {
            (SmoothingAlgorithm::Ema { strength }, History::Ema(prev)) => {
                let alpha = (1.0 - strength).clamp(MIN_EMA_ALPHA, 1.0);
                let p = ScreenPoint::new(
                    alpha * raw.x + (1.0 - alpha) * prev.x,
                    alpha * raw.y + (1.0 - alpha) * prev.y,
                );
                (History::Ema(p), p)
            }
            (SmoothingAlgorithm::Ema { .. }, _) => (History::Ema(raw), raw),

            (SmoothingAlgorithm::Kalman { strength }, history) => {
                let strength = clamp01(strength);
                let q = 0.001 + (1.0 - strength) * 0.01;
                let r = 0.001 + strength * 0.04;
                let (mut x, mut y) = match history {
                    History::Kalman { x, y } => (x, y),
                    _ => (KalmanAxis::new(raw.x), KalmanAxis::new(raw.y)),
                };
                let p = ScreenPoint::new(x.update(raw.x, q, r), y.update(raw.y, q, r));
                (History::Kalman { x, y }, p)
            }

            (SmoothingAlgorithm::MovingAverage { window }, history) => {
                let mut points = match history {
                    History::Window(points) => points,
                    _ => VecDeque::with_capacity(window.max(1)),
                };
                points.push_back(raw);
                while points.len() > window.max(1) {
                    points.pop_front();
                }
                let n = points.len() as f64;
                let p = ScreenPoint::new(
                    points.iter().map(|p| p.x).sum::<f64>() / n,
                    points.iter().map(|p| p.y).sum::<f64>() / n,
                );
                (History::Window(points), p)
            }

            (SmoothingAlgorithm::None, _) => (History::Last(raw), raw),
        };
        self.history = history;
        smoothed
    }

    /// Most recent smoothed point, if any.
    pub fn current(&self) -> Option<ScreenPoint> {
        match &self.history {
            History::Empty => None,
            History::Ema(p) | History::Last(p) => Some(*p),
            History::Kalman { x, y } => Some(ScreenPoint::new(x.estimate, y.estimate)),
            History::Window(points) => {
                let n = points.len() as f64;
                (!points.is_empty()).then(|| {
                    ScreenPoint::new(
                        points.iter().map(|p| p.x).sum::<f64>() / n,
                        points.iter().map(|p| p.y).sum::<f64>() / n,
                    )
                })
            }
        }
    }

    /// Forget all history.
    pub fn reset(&mut self) {
        self.history = History::Empty;
    }

    pub fn is_empty(&self) -> bool {
        matches!(self.history, History::Empty)
    }
}

/// Smooth a whole series with a fresh smoother.
pub fn smooth_series(algorithm: SmoothingAlgorithm, points: &[ScreenPoint]) -> Vec<ScreenPoint> {
    let mut smoother = GazeSmoother::new(algorithm);
    points.iter().map(|p| smoother.push(*p)).collect()
}

fn clamp01(value: f64) -> f64 {
    value.clamp(0.0, 1.0)
}
