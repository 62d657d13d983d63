//! Feature layouts and feature vectors.
//!
//! A layout fixes the length and component order of the vectors an
//! extractor produces. Samples and models record the layout they were
//! built with so that vectors from one configuration are never fed to a
//! model trained on another.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::model::ModelError;

const EYE_CENTER_NAMES: [&str; 4] = ["left_eye_x", "left_eye_y", "right_eye_x", "right_eye_y"];
const APERTURE_NAMES: [&str; 2] = ["left_aperture", "right_aperture"];
const IRIS_NAMES: [&str; 4] = [
    "left_iris_dx",
    "left_iris_dy",
    "right_iris_dx",
    "right_iris_dy",
];

/// Versioned feature layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum FeatureLayout {
    /// Eye centers relative to the interocular midpoint (4 components).
    EyeCentersV1,
    /// Eye centers plus eyelid apertures (6 components).
    EyeApertureV1,
    /// Eye centers plus iris offsets within each eye (8 components).
    #[default]
    IrisOffsetV1,
    /// Precomputed features with generic column names `f1..fN`.
    Raw(usize),
}

impl FeatureLayout {
    /// Layouts an extractor can derive from landmarks.
    pub const GEOMETRIC: [FeatureLayout; 3] = [
        FeatureLayout::EyeCentersV1,
        FeatureLayout::EyeApertureV1,
        FeatureLayout::IrisOffsetV1,
    ];

    /// Stable identifier stored in sample files and model artifacts.
    pub fn id(&self) -> String {
        match self {
            Self::EyeCentersV1 => "eye-centers-v1".to_string(),
            Self::EyeApertureV1 => "eye-aperture-v1".to_string(),
            Self::IrisOffsetV1 => "iris-offset-v1".to_string(),
            Self::Raw(n) => format!("raw-{n}"),
        }
    }

    /// Number of components.
    pub fn len(&self) -> usize {
        match self {
            Self::EyeCentersV1 => 4,
            Self::EyeApertureV1 => 6,
            Self::IrisOffsetV1 => 8,
            Self::Raw(n) => *n,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Column names in component order.
    pub fn component_names(&self) -> Vec<String> {
        let names: Vec<&str> = match self {
            Self::EyeCentersV1 => EYE_CENTER_NAMES.to_vec(),
            Self::EyeApertureV1 => [&EYE_CENTER_NAMES[..], &APERTURE_NAMES[..]].concat(),
            Self::IrisOffsetV1 => [&EYE_CENTER_NAMES[..], &IRIS_NAMES[..]].concat(),
            Self::Raw(n) => return (1..=*n).map(|i| format!("f{i}")).collect(),
        };
        names.into_iter().map(str::to_string).collect()
    }

    /// Recognize a layout from column names (files without a header comment).
    pub fn from_component_names(names: &[String]) -> Option<Self> {
        Self::GEOMETRIC
            .into_iter()
            .chain(std::iter::once(Self::Raw(names.len())))
            .find(|layout| layout.component_names() == names)
    }

    /// `id (len)` form used in compatibility messages.
    pub fn describe(&self) -> String {
        format!("{} ({} features)", self.id(), self.len())
    }
}

impl fmt::Display for FeatureLayout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.id())
    }
}

impl FromStr for FeatureLayout {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "eye-centers-v1" => Ok(Self::EyeCentersV1),
            "eye-aperture-v1" => Ok(Self::EyeApertureV1),
            "iris-offset-v1" => Ok(Self::IrisOffsetV1),
            other => other
                .strip_prefix("raw-")
                .and_then(|n| n.parse().ok())
                .map(Self::Raw)
                .ok_or_else(|| ModelError::UnknownLayout(other.to_string())),
        }
    }
}

impl TryFrom<String> for FeatureLayout {
    type Error = ModelError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<FeatureLayout> for String {
    fn from(layout: FeatureLayout) -> Self {
        layout.id()
    }
}

/// A feature vector tagged with the layout that produced it.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureVector {
    layout: FeatureLayout,
    values: Vec<f64>,
}

impl FeatureVector {
    /// Wrap `values`, checking the length against `layout`.
    pub fn new(layout: FeatureLayout, values: Vec<f64>) -> Result<Self, ModelError> {
        if values.len() != layout.len() {
            return Err(ModelError::LengthMismatch {
                layout: layout.id(),
                expected: layout.len(),
                found: values.len(),
            });
        }
        Ok(Self { layout, values })
    }

    /// Precomputed features under a [`FeatureLayout::Raw`] layout.
    pub fn raw(values: Vec<f64>) -> Self {
        Self {
            layout: FeatureLayout::Raw(values.len()),
            values,
        }
    }

    pub fn layout(&self) -> FeatureLayout {
        self.layout
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn is_finite(&self) -> bool {
        self.values.iter().all(|v| v.is_finite())
    }
}
