//! Facial landmark sets and recorded landmark streams.
//!
//! Landmarks follow the MediaPipe FaceMesh indexing scheme: 468 face
//! points, plus 10 iris points (indices 468..478) when the detector runs
//! with refined landmarks. Coordinates are whatever the detector emits
//! (pixels or normalized image space); consumers only rely on ratios.
//!
//! A recorded stream is JSONL, one [`LandmarkFrame`] per line:
//!
//! ```text
//! # {"source":"webcam0","width":1280,"height":720}
//! {"t":0,"landmarks":[[412.0,233.5,-0.01],[415.2,240.1,-0.02], ...]}
//! {"t":33333333,"landmarks":null}
//! ```

use serde::{Deserialize, Serialize};

/// FaceMesh indices the eye features depend on.
pub mod face_mesh {
    pub const LEFT_EYE_OUTER: usize = 33;
    pub const LEFT_EYE_INNER: usize = 133;
    pub const LEFT_EYE_UPPER: usize = 159;
    pub const LEFT_EYE_LOWER: usize = 145;

    pub const RIGHT_EYE_OUTER: usize = 263;
    pub const RIGHT_EYE_INNER: usize = 362;
    pub const RIGHT_EYE_UPPER: usize = 386;
    pub const RIGHT_EYE_LOWER: usize = 374;

    /// Iris centers, only present with refined landmarks.
    pub const LEFT_IRIS_CENTER: usize = 468;
    pub const RIGHT_IRIS_CENTER: usize = 473;

    pub const LEFT_EYE: [usize; 4] = [
        LEFT_EYE_OUTER,
        LEFT_EYE_INNER,
        LEFT_EYE_UPPER,
        LEFT_EYE_LOWER,
    ];
    pub const RIGHT_EYE: [usize; 4] = [
        RIGHT_EYE_INNER,
        RIGHT_EYE_OUTER,
        RIGHT_EYE_UPPER,
        RIGHT_EYE_LOWER,
    ];
}

/// A single landmark. `z` is zero for 2D detectors.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "LandmarkRepr", into = "LandmarkRepr")]
pub struct Landmark {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

/// Wire form: `[x, y]` or `[x, y, z]`.
#[derive(Clone, Serialize, Deserialize)]
#[serde(untagged)]
enum LandmarkRepr {
    Xyz([f64; 3]),
    Xy([f64; 2]),
}

impl From<LandmarkRepr> for Landmark {
    fn from(repr: LandmarkRepr) -> Self {
        match repr {
            LandmarkRepr::Xyz([x, y, z]) => Self { x, y, z },
            LandmarkRepr::Xy([x, y]) => Self { x, y, z: 0.0 },
        }
    }
}

impl From<Landmark> for LandmarkRepr {
    fn from(lm: Landmark) -> Self {
        if lm.z == 0.0 {
            LandmarkRepr::Xy([lm.x, lm.y])
        } else {
            LandmarkRepr::Xyz([lm.x, lm.y, lm.z])
        }
    }
}

impl Landmark {
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    pub fn xy(x: f64, y: f64) -> Self {
        Self { x, y, z: 0.0 }
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.z.is_finite()
    }
}

/// Landmarks detected on one frame, indexed by the FaceMesh scheme.
///
/// Entries may be `null` when a detector reports only a subset of points.
/// An entry that is missing, out of range, or non-finite is *absent*.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LandmarkSet {
    points: Vec<Option<Landmark>>,
}

impl LandmarkSet {
    /// Build a dense set from detector output.
    pub fn new(points: Vec<Landmark>) -> Self {
        Self {
            points: points.into_iter().map(Some).collect(),
        }
    }

    /// Build a sparse set from `(index, landmark)` pairs; gaps are absent.
    pub fn from_indexed(points: impl IntoIterator<Item = (usize, Landmark)>) -> Self {
        let mut slots: Vec<Option<Landmark>> = Vec::new();
        for (index, landmark) in points {
            if index >= slots.len() {
                slots.resize(index + 1, None);
            }
            slots[index] = Some(landmark);
        }
        Self { points: slots }
    }

    /// Landmark at `index`, if present and finite.
    pub fn get(&self, index: usize) -> Option<Landmark> {
        self.points
            .get(index)
            .copied()
            .flatten()
            .filter(Landmark::is_finite)
    }

    /// Number of index slots (including absent ones).
    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Remove the landmark at `index`, leaving the slot absent.
    pub fn without(mut self, index: usize) -> Self {
        if let Some(slot) = self.points.get_mut(index) {
            *slot = None;
        }
        self
    }

    /// Apply `f` to every present landmark.
    pub fn map(&self, f: impl Fn(Landmark) -> Landmark) -> Self {
        Self {
            points: self.points.iter().map(|p| p.map(&f)).collect(),
        }
    }

    /// Scale all coordinates uniformly (distance-to-camera change).
    pub fn scaled(&self, k: f64) -> Self {
        self.map(|lm| Landmark::new(lm.x * k, lm.y * k, lm.z * k))
    }

    /// Convert normalized image coordinates into pixels.
    pub fn to_pixels(&self, width: u32, height: u32) -> Self {
        let (w, h) = (f64::from(width), f64::from(height));
        self.map(|lm| Landmark::new(lm.x * w, lm.y * h, lm.z * w))
    }
}

/// One recorded frame of a landmark stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LandmarkFrame {
    /// Nanoseconds since stream start.
    #[serde(rename = "t")]
    pub timestamp_ns: u64,

    /// Detected landmarks, `None` when no face was found.
    pub landmarks: Option<LandmarkSet>,
}

/// Parse landmark frames from JSONL content. Lines starting with `#` are headers.
pub fn parse_frames(jsonl: &str) -> Result<Vec<LandmarkFrame>, serde_json::Error> {
    jsonl
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(serde_json::from_str)
        .collect()
}

/// Serialize landmark frames to JSONL.
pub fn serialize_frames(frames: &[LandmarkFrame]) -> Result<String, serde_json::Error> {
    let mut output = String::new();
    for frame in frames {
        output.push_str(&serde_json::to_string(frame)?);
        output.push('\n');
    }
    Ok(output)
}
