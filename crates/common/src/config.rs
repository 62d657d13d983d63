//! Application configuration.
//!
//! Every tunable of the pipeline lives here as a named value with a
//! documented default. The defaults reproduce the reference setup:
//! a 3x3 grid at 15% margin, 8 warm-up and 18 dwell frames per point,
//! ridge alpha 1.0 on standardized features, and an EMA with alpha 0.25
//! (strength 0.75) at 30 FPS.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{GazefitError, GazefitResult};

/// Global application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Directory holding sample files and model artifacts.
    pub data_dir: PathBuf,

    /// Feature extraction settings.
    pub features: FeatureSettings,

    /// Calibration session defaults.
    pub calibration: CalibrationDefaults,

    /// Model training defaults.
    pub training: TrainingDefaults,

    /// Realtime inference defaults.
    pub realtime: RealtimeDefaults,

    /// Logging configuration.
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FeatureSettings {
    /// Feature layout identifier (e.g. "iris-offset-v1").
    pub layout: String,

    /// Interocular distances below this are treated as degenerate.
    pub min_interocular: f64,
}

/// Default calibration parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CalibrationDefaults {
    /// Grid columns.
    pub grid_cols: usize,

    /// Grid rows.
    pub grid_rows: usize,

    /// Distance of the outer grid points from the screen edges (normalized).
    pub margin: f64,

    /// Frames shown per point before recording starts.
    pub warmup_frames: usize,

    /// Successful extractions recorded per point.
    pub dwell_frames: usize,

    /// Upper bound on frames spent on one point (0 = unlimited).
    pub point_timeout_frames: usize,

    /// Append to an existing sample file instead of replacing it.
    pub append: bool,
}

/// Default training parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainingDefaults {
    /// Ridge regularization strength.
    pub alpha: f64,

    /// Standardize feature columns before fitting.
    pub standardize: bool,

    /// Hold out every k-th sample for evaluation (0 = no holdout).
    pub holdout_every: usize,
}

/// Default realtime parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RealtimeDefaults {
    /// Smoothing algorithm: "ema", "moving-average", "kalman" or "none".
    pub smoothing: String,

    /// Smoothing strength in [0.0, 1.0] for "ema" and "kalman".
    pub smoothing_strength: f64,

    /// Window length for "moving-average".
    pub smoothing_window: usize,

    /// Consecutive lost frames during which the last estimate is held.
    pub max_lost_frames: usize,

    /// Clamp smoothed estimates into the unit square.
    pub clamp_to_screen: bool,

    /// Loop rate cap (0 = unpaced).
    pub fps_target: u32,
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level filter (e.g., "info", "debug", "gazefit_session=debug,warn").
    pub level: String,

    /// Whether to output structured JSON logs.
    pub json: bool,

    /// Optional log file path.
    pub file: Option<PathBuf>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            features: FeatureSettings::default(),
            calibration: CalibrationDefaults::default(),
            training: TrainingDefaults::default(),
            realtime: RealtimeDefaults::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for FeatureSettings {
    fn default() -> Self {
        Self {
            layout: "iris-offset-v1".to_string(),
            min_interocular: 1e-6,
        }
    }
}

impl Default for CalibrationDefaults {
    fn default() -> Self {
        Self {
            grid_cols: 3,
            grid_rows: 3,
            margin: 0.15,
            warmup_frames: 8,
            dwell_frames: 18,
            point_timeout_frames: 300,
            append: false,
        }
    }
}

impl Default for TrainingDefaults {
    fn default() -> Self {
        Self {
            alpha: 1.0,
            standardize: true,
            holdout_every: 5,
        }
    }
}

impl Default for RealtimeDefaults {
    fn default() -> Self {
        Self {
            smoothing: "ema".to_string(),
            smoothing_strength: 0.75,
            smoothing_window: 5,
            max_lost_frames: 15,
            clamp_to_screen: false,
            fps_target: 30,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
            file: None,
        }
    }
}

impl AppConfig {
    /// Load config from the standard location, falling back to defaults.
    pub fn load() -> Self {
        let config_path = config_file_path();
        if config_path.exists() {
            match Self::load_from(&config_path) {
                Ok(config) => return config,
                Err(e) => {
                    tracing::warn!("Failed to load config at {:?}: {}", config_path, e);
                }
            }
        }
        Self::default()
    }

    /// Load config from an explicit path. Missing sections take defaults.
    pub fn load_from(path: impl AsRef<Path>) -> GazefitResult<Self> {
        let path = path.as_ref();
        let content =
            std::fs::read_to_string(path).map_err(|e| GazefitError::persistence(path, e))?;
        let config: Self = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Save config to the standard location.
    pub fn save(&self) -> Result<(), std::io::Error> {
        let config_path = config_file_path();
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self).map_err(std::io::Error::other)?;
        std::fs::write(config_path, json)
    }

    /// Default location of the calibration sample file.
    pub fn samples_path(&self) -> PathBuf {
        self.data_dir.join("calibration_samples.csv")
    }

    /// Default location of the trained model artifact.
    pub fn model_path(&self) -> PathBuf {
        self.data_dir.join("gaze_ridge_xy.json")
    }

    /// Check value ranges that the type system cannot express.
    pub fn validate(&self) -> GazefitResult<()> {
        let c = &self.calibration;
        if c.grid_cols == 0 || c.grid_rows == 0 {
            return Err(GazefitError::config("calibration grid must be at least 1x1"));
        }
        if !(0.0..0.5).contains(&c.margin) {
            return Err(GazefitError::config(format!(
                "calibration margin {} outside [0.0, 0.5)",
                c.margin
            )));
        }
        if c.dwell_frames == 0 {
            return Err(GazefitError::config("dwell_frames must be positive"));
        }
        let needed = c.warmup_frames + c.dwell_frames;
        if c.point_timeout_frames > 0 && c.point_timeout_frames < needed {
            return Err(GazefitError::config(format!(
                "point_timeout_frames {} is below warmup_frames + dwell_frames ({needed})",
                c.point_timeout_frames
            )));
        }

        let t = &self.training;
        if !t.alpha.is_finite() || t.alpha < 0.0 {
            return Err(GazefitError::config(format!(
                "ridge alpha must be finite and non-negative, got {}",
                t.alpha
            )));
        }

        let r = &self.realtime;
        if !(0.0..=1.0).contains(&r.smoothing_strength) {
            return Err(GazefitError::config(format!(
                "smoothing strength {} outside [0.0, 1.0]",
                r.smoothing_strength
            )));
        }
        if r.smoothing == "ema" && r.smoothing_strength >= 1.0 {
            return Err(GazefitError::config("ema smoothing strength must be below 1.0"));
        }

        if !self.features.min_interocular.is_finite() || self.features.min_interocular < 0.0 {
            return Err(GazefitError::config("min_interocular must be finite and >= 0"));
        }

        Ok(())
    }
}

/// Standard config file location.
pub fn config_file_path() -> PathBuf {
    let base = std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
            PathBuf::from(home).join(".config")
        });
    base.join("gazefit").join("config.json")
}

/// Default data directory.
fn default_data_dir() -> PathBuf {
    let base = std::env::var("XDG_DATA_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
            PathBuf::from(home).join(".local").join("share")
        });
    base.join("gazefit")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = AppConfig::default();
        config.validate().unwrap();
        assert_eq!(config.calibration.dwell_frames, 18);
        assert!((config.training.alpha - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let dir = std::env::temp_dir().join("gazefit_test_config_partial");
        let _ = std::fs::remove_dir_all(&dir);
        std::fs::create_dir_all(&dir).unwrap();

        let path = dir.join("config.json");
        std::fs::write(&path, r#"{ "training": { "alpha": 0.5 } }"#).unwrap();

        let config = AppConfig::load_from(&path).unwrap();
        assert!((config.training.alpha - 0.5).abs() < 1e-12);
        assert!(config.training.standardize);
        assert_eq!(config.calibration.grid_cols, 3);

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_validate_rejects_negative_alpha() {
        let mut config = AppConfig::default();
        config.training.alpha = -1.0;
        assert!(matches!(
            config.validate(),
            Err(GazefitError::Config { .. })
        ));
    }

    #[test]
    fn test_validate_rejects_unreachable_point_timeout() {
        let mut config = AppConfig::default();
        config.calibration.point_timeout_frames = 10;
        assert!(matches!(
            config.validate(),
            Err(GazefitError::Config { .. })
        ));

        config.calibration.point_timeout_frames =
            config.calibration.warmup_frames + config.calibration.dwell_frames;
        config.validate().unwrap();

        config.calibration.point_timeout_frames = 0;
        config.validate().unwrap();
    }

    #[test]
    fn test_validate_rejects_frozen_ema() {
        let mut config = AppConfig::default();
        config.realtime.smoothing_strength = 1.0;
        assert!(config.validate().is_err());

        config.realtime.smoothing = "kalman".to_string();
        config.validate().unwrap();
    }

    #[test]
    fn test_validate_rejects_empty_grid() {
        let mut config = AppConfig::default();
        config.calibration.grid_rows = 0;
        assert!(config.validate().is_err());
    }
}
