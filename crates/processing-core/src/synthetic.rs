//! Synthetic face landmark generation.
//!
//! Produces FaceMesh-indexed landmark sets for a frontal face whose irises
//! point at a given screen position. Iris offsets are linear in the target,
//! so a model trained on synthetic calibration data should reproduce the
//! targets closely. Used for dry runs without a camera and in tests.

use gazefit_model::landmark::face_mesh::*;
use gazefit_model::landmark::{Landmark, LandmarkFrame, LandmarkSet};
use gazefit_model::screen::ScreenPoint;

/// Geometry of a synthetic face in image coordinates.
#[derive(Debug, Clone, Copy)]
pub struct SyntheticFace {
    /// Midpoint between the outer eye corners.
    pub center: (f64, f64),
    /// Distance between the outer eye corners.
    pub interocular: f64,
    /// Eyelid opening relative to the interocular distance.
    pub openness: f64,
}

impl Default for SyntheticFace {
    fn default() -> Self {
        Self {
            center: (640.0, 300.0),
            interocular: 120.0,
            openness: 0.12,
        }
    }
}

impl SyntheticFace {
    /// Landmarks for a user fixating `target`.
    pub fn landmarks_for(&self, target: ScreenPoint) -> LandmarkSet {
        self.landmarks_with_offset(target, (0.0, 0.0))
    }

    /// Landmarks for `target` with an extra iris displacement `jitter`
    /// (in units of the interocular distance), simulating detector noise.
    pub fn landmarks_with_offset(&self, target: ScreenPoint, jitter: (f64, f64)) -> LandmarkSet {
        let s = self.interocular;
        let (cx, cy) = self.center;
        let half_open = self.openness * s / 2.0;

        let gaze_x = (target.x - 0.5) * 2.0 + jitter.0 * 10.0;
        let gaze_y = (target.y - 0.5) * 2.0 + jitter.1 * 20.0;
        let iris_dx = gaze_x * 0.1 * s;
        let iris_dy = gaze_y * 0.05 * s;
        let iris_radius = 0.04 * s;

        let left_eye = (cx - 0.35 * s, cy);
        let right_eye = (cx + 0.35 * s, cy);
        let left_iris = (left_eye.0 + iris_dx, left_eye.1 + iris_dy);
        let right_iris = (right_eye.0 + iris_dx, right_eye.1 + iris_dy);

        let mut points = vec![
            (LEFT_EYE_OUTER, Landmark::xy(cx - 0.5 * s, cy)),
            (LEFT_EYE_INNER, Landmark::xy(cx - 0.2 * s, cy)),
            (LEFT_EYE_UPPER, Landmark::xy(left_eye.0, cy - half_open)),
            (LEFT_EYE_LOWER, Landmark::xy(left_eye.0, cy + half_open)),
            (RIGHT_EYE_OUTER, Landmark::xy(cx + 0.5 * s, cy)),
            (RIGHT_EYE_INNER, Landmark::xy(cx + 0.2 * s, cy)),
            (RIGHT_EYE_UPPER, Landmark::xy(right_eye.0, cy - half_open)),
            (RIGHT_EYE_LOWER, Landmark::xy(right_eye.0, cy + half_open)),
            (LEFT_IRIS_CENTER, Landmark::xy(left_iris.0, left_iris.1)),
            (RIGHT_IRIS_CENTER, Landmark::xy(right_iris.0, right_iris.1)),
        ];

        // Iris contour points follow each center.
        let irises = [(LEFT_IRIS_CENTER, left_iris), (RIGHT_IRIS_CENTER, right_iris)];
        for (center_index, (ix, iy)) in irises {
            let ring = [(1.0, 0.0), (0.0, -1.0), (-1.0, 0.0), (0.0, 1.0)];
            for (k, (ux, uy)) in ring.into_iter().enumerate() {
                let lm = Landmark::xy(ix + ux * iris_radius, iy + uy * iris_radius);
                points.push((center_index + 1 + k, lm));
            }
        }

        LandmarkSet::from_indexed(points)
    }

    /// A recorded calibration pass: for each target, `frames_per_target`
    /// frames fixating it, stamped at `fps`. Every `dropout`-th frame has
    /// no face (0 disables dropouts).
    pub fn recording(
        &self,
        targets: &[ScreenPoint],
        frames_per_target: usize,
        fps: u32,
        dropout: usize,
    ) -> Vec<LandmarkFrame> {
        let frame_ns = 1_000_000_000 / u64::from(fps.max(1));
        targets
            .iter()
            .flat_map(|target| std::iter::repeat(*target).take(frames_per_target))
            .enumerate()
            .map(|(i, target)| LandmarkFrame {
                timestamp_ns: i as u64 * frame_ns,
                landmarks: (dropout == 0 || (i + 1) % dropout != 0)
                    .then(|| self.landmarks_for(target)),
            })
            .collect()
    }
}
