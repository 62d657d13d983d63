//! Error types shared across Gazefit crates.

use std::fmt::Display;
use std::path::{Path, PathBuf};

/// Top-level error type for Gazefit operations.
#[derive(Debug, thiserror::Error)]
pub enum GazefitError {
    #[error("Insufficient calibration data: {reason}")]
    InsufficientCalibrationData { reason: String },

    #[error("Model incompatible with extractor: expected {expected}, found {found}")]
    ModelIncompatibility { expected: String, found: String },

    #[error("Capture unavailable: {message}")]
    CaptureUnavailable { message: String },

    #[error("Persistence failure at {path}: {message}")]
    Persistence { path: PathBuf, message: String },

    #[error("Training error: {message}")]
    Training { message: String },

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Result type alias using GazefitError.
pub type GazefitResult<T> = Result<T, GazefitError>;

impl GazefitError {
    pub fn insufficient_data(reason: impl Into<String>) -> Self {
        Self::InsufficientCalibrationData {
            reason: reason.into(),
        }
    }

    pub fn incompatible(expected: impl Into<String>, found: impl Into<String>) -> Self {
        Self::ModelIncompatibility {
            expected: expected.into(),
            found: found.into(),
        }
    }

    pub fn capture_unavailable(msg: impl Into<String>) -> Self {
        Self::CaptureUnavailable {
            message: msg.into(),
        }
    }

    pub fn persistence(path: impl AsRef<Path>, err: impl Display) -> Self {
        Self::Persistence {
            path: path.as_ref().to_path_buf(),
            message: err.to_string(),
        }
    }

    pub fn training(msg: impl Into<String>) -> Self {
        Self::Training {
            message: msg.into(),
        }
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }
}
