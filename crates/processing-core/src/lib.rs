//! Gazefit Processing Core
//!
//! The computational half of the gaze pipeline:
//! - **Feature extraction:** landmarks to scale-invariant eye geometry
//! - **Training:** closed-form ridge regression per screen axis
//! - **Smoothing:** streaming filters over raw gaze points
//! - **Inference:** a stateful engine applying a trained model frame by frame
//!
//! This crate is pure computation: no I/O and no platform dependencies.
//! All inputs are data; all outputs are data.

pub mod engine;
pub mod features;
pub mod smoothing;
pub mod synthetic;
pub mod trainer;

pub use engine::{EngineConfig, InferenceEngine};
pub use features::{ExtractionFailure, ExtractorConfig, FeatureExtractor};
pub use smoothing::{GazeSmoother, SmoothingAlgorithm};
pub use synthetic::SyntheticFace;
pub use trainer::{ModelTrainer, RidgeConfig, TrainingReport};
