//! Trained model artifact.
//!
//! A trained model is two independent linear regressors, one per screen
//! axis, sharing an input normalization. The artifact is pretty JSON and
//! is replaced wholesale on retraining.

use std::io::Write;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::feature::{FeatureLayout, FeatureVector};
use crate::screen::ScreenPoint;

/// Current artifact schema version.
pub const MODEL_SCHEMA_VERSION: &str = "1.0";

/// Input normalization applied before the regressors.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Normalization {
    /// Features are used as extracted.
    None,
    /// `(value - mean) / scale` per component.
    Standardize { means: Vec<f64>, scales: Vec<f64> },
}

/// One axis regressor: `intercept + coefficients · normalized(features)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AxisModel {
    pub coefficients: Vec<f64>,
    pub intercept: f64,
}

impl AxisModel {
    pub fn predict(&self, normalized: &[f64]) -> f64 {
        self.intercept
            + self
                .coefficients
                .iter()
                .zip(normalized)
                .map(|(c, v)| c * v)
                .sum::<f64>()
    }
}

/// The trained two-axis model plus the metadata needed to validate it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainedModel {
    /// Schema version for forward compatibility.
    pub schema_version: String,

    /// Layout the model was fit on.
    pub feature_layout: FeatureLayout,

    /// Number of feature components.
    pub feature_length: usize,

    /// Component names in fit order.
    pub feature_names: Vec<String>,

    /// Input normalization.
    pub normalization: Normalization,

    /// Regressor for screen x.
    pub x: AxisModel,

    /// Regressor for screen y.
    pub y: AxisModel,

    /// Ridge regularization strength used at fit time.
    pub alpha: f64,

    /// Number of samples the model was fit on.
    pub sample_count: usize,

    /// Training timestamp (RFC 3339).
    pub trained_at: String,
}

impl TrainedModel {
    /// Map a feature vector to a raw gaze point.
    pub fn predict(&self, features: &FeatureVector) -> Result<ScreenPoint, ModelError> {
        self.check_layout(features.layout())?;
        let normalized = self.normalize(features.values());
        Ok(ScreenPoint::new(
            self.x.predict(&normalized),
            self.y.predict(&normalized),
        ))
    }

    fn normalize(&self, values: &[f64]) -> Vec<f64> {
        match &self.normalization {
            Normalization::None => values.to_vec(),
            Normalization::Standardize { means, scales } => values
                .iter()
                .zip(means.iter().zip(scales))
                .map(|(v, (m, s))| (v - m) / s)
                .collect(),
        }
    }

    /// Check that vectors from `layout` can be fed to this model.
    pub fn check_layout(&self, layout: FeatureLayout) -> Result<(), ModelError> {
        if layout != self.feature_layout || layout.len() != self.feature_length {
            return Err(ModelError::Incompatible {
                expected: layout.describe(),
                found: format!("{} ({} features)", self.feature_layout, self.feature_length),
            });
        }
        Ok(())
    }

    /// Internal consistency of a loaded artifact.
    pub fn validate(&self) -> Result<(), ModelError> {
        let n = self.feature_length;
        let invalid = |message: String| Err(ModelError::Invalid { message });

        if self.feature_layout.len() != n {
            return invalid(format!(
                "layout {} has {} features but artifact declares {n}",
                self.feature_layout,
                self.feature_layout.len()
            ));
        }
        if self.feature_names.len() != n {
            return invalid(format!("{} feature names for {n} features", self.feature_names.len()));
        }
        for (axis, model) in [("x", &self.x), ("y", &self.y)] {
            if model.coefficients.len() != n {
                return invalid(format!(
                    "{axis} model has {} coefficients for {n} features",
                    model.coefficients.len()
                ));
            }
            if !model.intercept.is_finite() || model.coefficients.iter().any(|c| !c.is_finite()) {
                return invalid(format!("{axis} model has non-finite parameters"));
            }
        }
        if let Normalization::Standardize { means, scales } = &self.normalization {
            if means.len() != n || scales.len() != n {
                return invalid("normalization length does not match feature length".into());
            }
            if scales.iter().any(|s| !s.is_finite() || *s <= 0.0) {
                return invalid("normalization scales must be positive".into());
            }
        }
        Ok(())
    }

    /// Load and validate an artifact.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ModelError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| ModelError::IoError {
            path: path.to_path_buf(),
            source: e,
        })?;
        let model: Self = serde_json::from_str(&content).map_err(|e| ModelError::ParseError {
            path: path.to_path_buf(),
            source: e,
        })?;
        model.validate()?;
        Ok(model)
    }

    /// Save the artifact, replacing any previous file atomically.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ModelError> {
        let path = path.as_ref();
        let json = serde_json::to_string_pretty(self).map_err(|e| ModelError::ParseError {
            path: path.to_path_buf(),
            source: e,
        })?;
        write_atomic(path, json.as_bytes())
    }
}

/// Write `bytes` to a sibling temp file, sync it, then rename over `path`.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), ModelError> {
    let io_err = |path: &Path| {
        let path = path.to_path_buf();
        move |source: std::io::Error| ModelError::IoError { path, source }
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(io_err(parent))?;
    }

    let tmp = temp_path(path);
    {
        let mut file = std::fs::File::create(&tmp).map_err(io_err(tmp.as_path()))?;
        file.write_all(bytes).map_err(io_err(tmp.as_path()))?;
        file.sync_all().map_err(io_err(tmp.as_path()))?;
    }
    std::fs::rename(&tmp, path).map_err(io_err(path))
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".tmp");
    path.with_file_name(name)
}

/// Errors from reading or writing model data.
#[derive(Debug, thiserror::Error)]
pub enum ModelError {
    #[error("I/O error at {path}: {source}")]
    IoError {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Parse error in {path}: {source}")]
    ParseError {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("Malformed sample data at line {line}: {message}")]
    Format { line: usize, message: String },

    #[error("Unknown feature layout: {0}")]
    UnknownLayout(String),

    #[error("Layout {layout} expects {expected} features, got {found}")]
    LengthMismatch {
        layout: String,
        expected: usize,
        found: usize,
    },

    #[error("Incompatible feature layout: expected {expected}, found {found}")]
    Incompatible { expected: String, found: String },

    #[error("Invalid model artifact: {message}")]
    Invalid { message: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_model() -> TrainedModel {
        TrainedModel {
            schema_version: MODEL_SCHEMA_VERSION.to_string(),
            feature_layout: FeatureLayout::Raw(2),
            feature_length: 2,
            feature_names: FeatureLayout::Raw(2).component_names(),
            normalization: Normalization::Standardize {
                means: vec![0.5, 0.5],
                scales: vec![0.5, 0.5],
            },
            x: AxisModel {
                coefficients: vec![0.5, 0.0],
                intercept: 0.5,
            },
            y: AxisModel {
                coefficients: vec![0.0, 0.5],
                intercept: 0.5,
            },
            alpha: 1.0,
            sample_count: 40,
            trained_at: "2026-01-01T00:00:00Z".to_string(),
        }
    }

    #[test]
    fn test_predict_applies_normalization() {
        let model = sample_model();
        let p = model.predict(&FeatureVector::raw(vec![1.0, 0.0])).unwrap();
        assert!((p.x - 1.0).abs() < 1e-12);
        assert!((p.y - 0.0).abs() < 1e-12);
    }

    #[test]
    fn test_predict_rejects_other_layout() {
        let model = sample_model();
        let err = model
            .predict(&FeatureVector::raw(vec![1.0, 0.0, 0.0]))
            .unwrap_err();
        assert!(matches!(err, ModelError::Incompatible { .. }));
    }

    #[test]
    fn test_validate_catches_coefficient_mismatch() {
        let mut model = sample_model();
        model.y.coefficients.push(1.0);
        assert!(matches!(model.validate(), Err(ModelError::Invalid { .. })));
    }

    #[test]
    fn test_save_and_load() {
        let dir = std::env::temp_dir().join("gazefit_test_model_artifact");
        let _ = std::fs::remove_dir_all(&dir);

        let path = dir.join("models").join("gaze.json");
        let model = sample_model();
        model.save(&path).unwrap();
        assert!(!dir.join("models").join("gaze.json.tmp").exists());

        let loaded = TrainedModel::load(&path).unwrap();
        assert_eq!(loaded, model);

        let json = std::fs::read_to_string(&path).unwrap();
        assert!(json.contains("\"feature_layout\": \"raw-2\""));
        assert!(json.contains("\"kind\": \"standardize\""));

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_load_rejects_garbage() {
        let dir = std::env::temp_dir().join("gazefit_test_model_garbage");
        let _ = std::fs::remove_dir_all(&dir);
        std::fs::create_dir_all(&dir).unwrap();

        let path = dir.join("gaze.json");
        std::fs::write(&path, "{ not json").unwrap();
        assert!(matches!(
            TrainedModel::load(&path),
            Err(ModelError::ParseError { .. })
        ));

        std::fs::remove_dir_all(&dir).ok();
    }
}
