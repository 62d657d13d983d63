//! Normalized screen coordinates.

use serde::{Deserialize, Serialize};

/// A point on screen in normalized coordinates.
///
/// `(0.0, 0.0)` is the top-left corner and `(1.0, 1.0)` the bottom-right.
/// Gaze predictions may fall slightly outside the unit square.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScreenPoint {
    pub x: f64,
    pub y: f64,
}

impl ScreenPoint {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Denormalize to integer pixel coordinates on a `width` x `height` surface.
    pub fn to_pixels(&self, width: u32, height: u32) -> (i32, i32) {
        (
            (self.x * f64::from(width)) as i32,
            (self.y * f64::from(height)) as i32,
        )
    }

    /// Clamp into the unit square.
    pub fn clamped(&self) -> Self {
        Self {
            x: self.x.clamp(0.0, 1.0),
            y: self.y.clamp(0.0, 1.0),
        }
    }

    pub fn distance(&self, other: &ScreenPoint) -> f64 {
        (self.x - other.x).hypot(self.y - other.y)
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }
}
