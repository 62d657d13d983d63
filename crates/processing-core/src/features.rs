//! Feature extraction from facial landmarks.
//!
//! Eye geometry is measured relative to the midpoint between the outer eye
//! corners and divided by the interocular distance (outer corner to outer
//! corner), so vectors do not change when the user moves closer to or
//! further from the camera. Only the image-plane `x`/`y` coordinates are
//! used.
//!
//! | layout | components |
//! |---|---|
//! | `eye-centers-v1` | left/right eye center offsets from the midpoint |
//! | `eye-aperture-v1` | eye centers + upper-to-lower lid distance per eye |
//! | `iris-offset-v1` | eye centers + iris center offset within each eye |

use gazefit_common::config::AppConfig;
use gazefit_common::error::{GazefitError, GazefitResult};
use gazefit_model::feature::{FeatureLayout, FeatureVector};
use gazefit_model::landmark::face_mesh::*;
use gazefit_model::landmark::{Landmark, LandmarkSet};

/// Why a frame produced no feature vector. Recovered by skipping the frame.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ExtractionFailure {
    #[error("no face detected")]
    NoFace,

    #[error("required landmark {index} is missing")]
    MissingLandmark { index: usize },

    #[error("degenerate eye geometry (interocular distance {interocular})")]
    DegenerateGeometry { interocular: f64 },

    #[error("layout {0} cannot be derived from landmarks")]
    UnsupportedLayout(FeatureLayout),
}

/// Extractor configuration.
#[derive(Debug, Clone)]
pub struct ExtractorConfig {
    pub layout: FeatureLayout,

    /// Interocular distances at or below this are degenerate.
    pub min_interocular: f64,
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        Self {
            layout: FeatureLayout::default(),
            min_interocular: 1e-6,
        }
    }
}

impl ExtractorConfig {
    pub fn from_app(config: &AppConfig) -> GazefitResult<Self> {
        let layout: FeatureLayout = config
            .features
            .layout
            .parse()
            .map_err(|e| GazefitError::config(format!("{e}")))?;
        if !FeatureLayout::GEOMETRIC.contains(&layout) {
            return Err(GazefitError::config(format!(
                "layout {layout} cannot be extracted from landmarks"
            )));
        }
        Ok(Self {
            layout,
            min_interocular: config.features.min_interocular,
        })
    }
}

/// Stateless landmark-to-feature converter.
#[derive(Debug, Clone, Default)]
pub struct FeatureExtractor {
    config: ExtractorConfig,
}

impl FeatureExtractor {
    pub fn new(config: ExtractorConfig) -> Self {
        Self { config }
    }

    pub fn with_layout(layout: FeatureLayout) -> Self {
        Self::new(ExtractorConfig {
            layout,
            ..Default::default()
        })
    }

    pub fn layout(&self) -> FeatureLayout {
        self.config.layout
    }

    /// Landmark indices `layout` depends on.
    pub fn required_indices(layout: FeatureLayout) -> Vec<usize> {
        let mut indices = vec![
            LEFT_EYE_OUTER,
            LEFT_EYE_INNER,
            LEFT_EYE_UPPER,
            LEFT_EYE_LOWER,
            RIGHT_EYE_OUTER,
            RIGHT_EYE_INNER,
            RIGHT_EYE_UPPER,
            RIGHT_EYE_LOWER,
        ];
        match layout {
            FeatureLayout::IrisOffsetV1 => indices.extend([LEFT_IRIS_CENTER, RIGHT_IRIS_CENTER]),
            FeatureLayout::Raw(_) => indices.clear(),
            FeatureLayout::EyeCentersV1 | FeatureLayout::EyeApertureV1 => {}
        }
        indices
    }

    /// Extract a feature vector, or report why the frame must be skipped.
    pub fn extract(
        &self,
        landmarks: Option<&LandmarkSet>,
    ) -> Result<FeatureVector, ExtractionFailure> {
        let layout = self.config.layout;
        if matches!(layout, FeatureLayout::Raw(_)) {
            return Err(ExtractionFailure::UnsupportedLayout(layout));
        }
        let landmarks = landmarks.ok_or(ExtractionFailure::NoFace)?;

        let required = Self::required_indices(layout);
        if let Some(&index) = required.iter().find(|&&i| landmarks.get(i).is_none()) {
            return Err(ExtractionFailure::MissingLandmark { index });
        }
        let point = |index: usize| landmarks.get(index).map(xy).unwrap_or_default();

        let left_outer = point(LEFT_EYE_OUTER);
        let right_outer = point(RIGHT_EYE_OUTER);
        let interocular = distance(left_outer, right_outer);
        if !interocular.is_finite() || interocular <= self.config.min_interocular {
            return Err(ExtractionFailure::DegenerateGeometry { interocular });
        }

        let mid = midpoint(left_outer, right_outer);
        let left_center = mean(LEFT_EYE.iter().map(|&i| point(i)));
        let right_center = mean(RIGHT_EYE.iter().map(|&i| point(i)));
        let rel = |p: (f64, f64), origin: (f64, f64)| {
            [(p.0 - origin.0) / interocular, (p.1 - origin.1) / interocular]
        };

        let mut values = Vec::with_capacity(layout.len());
        values.extend(rel(left_center, mid));
        values.extend(rel(right_center, mid));

        match layout {
            FeatureLayout::EyeApertureV1 => {
                values.push(distance(point(LEFT_EYE_UPPER), point(LEFT_EYE_LOWER)) / interocular);
                values.push(distance(point(RIGHT_EYE_UPPER), point(RIGHT_EYE_LOWER)) / interocular);
            }
            FeatureLayout::IrisOffsetV1 => {
                values.extend(rel(point(LEFT_IRIS_CENTER), left_center));
                values.extend(rel(point(RIGHT_IRIS_CENTER), right_center));
            }
            FeatureLayout::EyeCentersV1 | FeatureLayout::Raw(_) => {}
        }

        if values.iter().any(|v| !v.is_finite()) {
            return Err(ExtractionFailure::DegenerateGeometry { interocular });
        }
        FeatureVector::new(layout, values).map_err(|_| ExtractionFailure::UnsupportedLayout(layout))
    }
}

fn xy(lm: Landmark) -> (f64, f64) {
    (lm.x, lm.y)
}

fn distance(a: (f64, f64), b: (f64, f64)) -> f64 {
    (a.0 - b.0).hypot(a.1 - b.1)
}

fn midpoint(a: (f64, f64), b: (f64, f64)) -> (f64, f64) {
    ((a.0 + b.0) / 2.0, (a.1 + b.1) / 2.0)
}

fn mean(points: impl Iterator<Item = (f64, f64)>) -> (f64, f64) {
    let (mut sx, mut sy, mut n) = (0.0, 0.0, 0usize);
    for (x, y) in points {
        sx += x;
        sy += y;
        n += 1;
    }
    if n == 0 {
        return (0.0, 0.0);
    }
    (sx / n as f64, sy / n as f64)
}
