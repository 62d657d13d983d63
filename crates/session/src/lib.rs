//! Gazefit Session
//!
//! Drives the gaze pipeline over a stream of landmark frames:
//!
//! - **Calibration:** shows a grid of targets and records labelled
//!   feature vectors into an append-only sample file
//! - **Training:** fits a model from a sample file and persists it
//! - **Realtime:** applies a persisted model to live frames
//!
//! Frame sources are pull-based and sessions are single-threaded. The only
//! state shared with other threads is [`SessionControl`], whose flags are
//! read at frame boundaries.

pub mod calibration;
pub mod control;
pub mod realtime;
pub mod source;
pub mod store;
pub mod training;

use std::path::Path;

use gazefit_common::error::GazefitError;
use gazefit_model::model::ModelError;

pub use calibration::{
    run_calibration, run_calibration_with, CalibrationConfig, CalibrationObserver,
    CalibrationSummary,
};
pub use control::SessionControl;
pub use realtime::{run_realtime, RealtimeConfig, RealtimeStream};
pub use source::{Frame, LandmarkSource, MemorySource, ReplaySource};
pub use store::{read_samples, SampleStore};
pub use training::{load_model, train, train_to_file};

/// Map a model-data error at `path` into the session error taxonomy.
pub(crate) fn model_error(path: &Path, err: ModelError) -> GazefitError {
    match err {
        ModelError::Incompatible { expected, found } => GazefitError::incompatible(expected, found),
        other => GazefitError::persistence(path, other),
    }
}
