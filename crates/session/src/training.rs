//! Training driver: sample file in, model artifact out.

use std::path::Path;

use tracing::info;

use gazefit_common::error::{GazefitError, GazefitResult};
use gazefit_model::model::TrainedModel;
use gazefit_processing::trainer::{ModelTrainer, RidgeConfig, TrainingReport};

use crate::model_error;
use crate::store::read_samples;

/// Fit a model on every sample in `sample_file`.
pub fn train(
    sample_file: impl AsRef<Path>,
    config: &RidgeConfig,
) -> GazefitResult<(TrainedModel, TrainingReport)> {
    let sample_file = sample_file.as_ref();
    let file = read_samples(sample_file)?;
    info!(
        path = %sample_file.display(),
        layout = %file.layout,
        samples = file.samples.len(),
        "Training from sample file"
    );
    ModelTrainer::new(config.clone()).train(&file.samples)
}

/// Train and atomically replace the artifact at `model_out`.
pub fn train_to_file(
    sample_file: impl AsRef<Path>,
    model_out: impl AsRef<Path>,
    config: &RidgeConfig,
) -> GazefitResult<TrainingReport> {
    let model_out = model_out.as_ref();
    let (model, report) = train(sample_file, config)?;
    model
        .save(model_out)
        .map_err(|e| model_error(model_out, e))?;
    info!(path = %model_out.display(), "Model saved");
    Ok(report)
}

/// Load and validate a model artifact.
pub fn load_model(path: impl AsRef<Path>) -> GazefitResult<TrainedModel> {
    let path = path.as_ref();
    if !path.exists() {
        return Err(GazefitError::persistence(
            path,
            "model artifact not found; run calibration and training first",
        ));
    }
    TrainedModel::load(path).map_err(|e| model_error(path, e))
}
