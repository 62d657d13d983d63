//! Ridge regression trainer.
//!
//! Fits two independent linear regressors (screen x and screen y) on the
//! same feature matrix. Columns are optionally standardized, then both
//! the features and labels are centered so the intercept stays out of the
//! L2 penalty, and the normal equations
//!
//! ```text
//! (XcᵀXc + αI) w = Xcᵀ yc        intercept = mean(y) - mean(X)·w
//! ```
//!
//! are solved in closed form. There is no randomness anywhere: the same
//! samples always produce bit-identical coefficients.

use std::collections::BTreeSet;

use nalgebra::DMatrix;
use serde::Serialize;
use tracing::{debug, info};

use gazefit_common::config::AppConfig;
use gazefit_common::error::{GazefitError, GazefitResult};
use gazefit_model::feature::FeatureLayout;
use gazefit_model::model::{AxisModel, Normalization, TrainedModel, MODEL_SCHEMA_VERSION};
use gazefit_model::sample::CalibrationSample;

/// Trainer configuration.
#[derive(Debug, Clone)]
pub struct RidgeConfig {
    /// L2 regularization strength (>= 0).
    pub alpha: f64,

    /// Standardize columns to zero mean and unit variance before fitting.
    pub standardize: bool,

    /// Hold out every k-th sample for evaluation (0 disables).
    pub holdout_every: usize,
}

impl Default for RidgeConfig {
    fn default() -> Self {
        Self {
            alpha: 1.0,
            standardize: true,
            holdout_every: 5,
        }
    }
}

impl RidgeConfig {
    pub fn from_app(config: &AppConfig) -> Self {
        Self {
            alpha: config.training.alpha,
            standardize: config.training.standardize,
            holdout_every: config.training.holdout_every,
        }
    }
}

/// Goodness of fit for one axis.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct FitScore {
    /// Coefficient of determination. 1.0 for a perfect fit of constant
    /// labels, 0.0 for an imperfect one.
    pub r2: f64,
    /// Root mean squared error in normalized screen units.
    pub rmse: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct AxisScores {
    pub x: FitScore,
    pub y: FitScore,
}

impl AxisScores {
    /// RMSE of the 2D error.
    pub fn combined_rmse(&self) -> f64 {
        (self.x.rmse.powi(2) + self.y.rmse.powi(2)).sqrt()
    }
}

/// Scores from a fit on the non-held-out samples, evaluated on the rest.
#[derive(Debug, Clone, Serialize)]
pub struct HoldoutReport {
    pub every: usize,
    pub held_out: usize,
    pub scores: AxisScores,
}

/// Summary of a training run.
#[derive(Debug, Clone, Serialize)]
pub struct TrainingReport {
    pub feature_layout: FeatureLayout,
    pub sample_count: usize,
    pub distinct_targets: usize,
    pub alpha: f64,
    /// Scores of the final model on its own training data.
    pub training: AxisScores,
    /// Held-out scores, when enabled and the split leaves enough data.
    pub holdout: Option<HoldoutReport>,
}

/// Closed-form ridge trainer.
#[derive(Debug, Clone, Default)]
pub struct ModelTrainer {
    config: RidgeConfig,
}

impl ModelTrainer {
    pub fn new(config: RidgeConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &RidgeConfig {
        &self.config
    }

    /// Fit a model on all samples.
    pub fn fit(&self, samples: &[CalibrationSample]) -> GazefitResult<TrainedModel> {
        let alpha = self.config.alpha;
        if !alpha.is_finite() || alpha < 0.0 {
            return Err(GazefitError::config(format!(
                "ridge alpha must be finite and non-negative, got {alpha}"
            )));
        }

        let layout = check_samples(samples)?;
        let n = samples.len();
        let d = layout.len();

        let raw = DMatrix::from_fn(n, d, |i, j| samples[i].features.values()[j]);
        let labels = DMatrix::from_fn(n, 2, |i, j| {
            let target = samples[i].target;
            if j == 0 {
                target.x
            } else {
                target.y
            }
        });

        let (working, normalization) = if self.config.standardize {
            let (means, scales) = column_stats(&raw);
            let standardized =
                DMatrix::from_fn(n, d, |i, j| (raw[(i, j)] - means[j]) / scales[j]);
            (standardized, Normalization::Standardize { means, scales })
        } else {
            (raw, Normalization::None)
        };

        let x_means: Vec<f64> = (0..d).map(|j| working.column(j).mean()).collect();
        let y_means = [labels.column(0).mean(), labels.column(1).mean()];
        let xc = DMatrix::from_fn(n, d, |i, j| working[(i, j)] - x_means[j]);
        let yc = DMatrix::from_fn(n, 2, |i, j| labels[(i, j)] - y_means[j]);

        let xt = xc.transpose();
        let gram = &xt * &xc + DMatrix::<f64>::identity(d, d) * alpha;
        let rhs = &xt * &yc;

        let weights = match gram.clone().cholesky() {
            Some(chol) => chol.solve(&rhs),
            None => gram.lu().solve(&rhs).ok_or_else(|| {
                GazefitError::training(format!(
                    "singular normal equations ({n} samples, {d} features, alpha {alpha})"
                ))
            })?,
        };
        if weights.iter().any(|w| !w.is_finite()) {
            return Err(GazefitError::training("solution has non-finite coefficients"));
        }

        let axis = |k: usize| {
            let coefficients: Vec<f64> = weights.column(k).iter().copied().collect();
            let offset: f64 = coefficients.iter().zip(&x_means).map(|(w, m)| w * m).sum();
            AxisModel {
                coefficients,
                intercept: y_means[k] - offset,
            }
        };

        let model = TrainedModel {
            schema_version: MODEL_SCHEMA_VERSION.to_string(),
            feature_layout: layout,
            feature_length: d,
            feature_names: layout.component_names(),
            normalization,
            x: axis(0),
            y: axis(1),
            alpha,
            sample_count: n,
            trained_at: chrono::Utc::now().to_rfc3339(),
        };

        debug!(
            layout = %layout,
            samples = n,
            alpha,
            standardize = self.config.standardize,
            "Fitted ridge model"
        );
        Ok(model)
    }

    /// Fit the final model and report its training and held-out scores.
    pub fn train(
        &self,
        samples: &[CalibrationSample],
    ) -> GazefitResult<(TrainedModel, TrainingReport)> {
        let model = self.fit(samples)?;
        let training = evaluate(&model, samples)?;
        let holdout = self.holdout(samples);

        let report = TrainingReport {
            feature_layout: model.feature_layout,
            sample_count: samples.len(),
            distinct_targets: distinct_targets(samples),
            alpha: self.config.alpha,
            training,
            holdout,
        };

        info!(
            samples = report.sample_count,
            targets = report.distinct_targets,
            r2_x = report.training.x.r2,
            r2_y = report.training.y.r2,
            holdout_r2_x = report.holdout.as_ref().map(|h| h.scores.x.r2),
            holdout_r2_y = report.holdout.as_ref().map(|h| h.scores.y.r2),
            "Model trained"
        );
        Ok((model, report))
    }

    fn holdout(&self, samples: &[CalibrationSample]) -> Option<HoldoutReport> {
        let every = self.config.holdout_every;
        if every < 2 {
            return None;
        }

        let (held, kept): (Vec<_>, Vec<_>) = samples
            .iter()
            .enumerate()
            .partition(|(i, _)| i % every == every - 1);
        let held: Vec<CalibrationSample> = held.into_iter().map(|(_, s)| s.clone()).collect();
        let kept: Vec<CalibrationSample> = kept.into_iter().map(|(_, s)| s.clone()).collect();
        if held.is_empty() {
            return None;
        }

        let scores = self
            .fit(&kept)
            .and_then(|model| evaluate(&model, &held));
        match scores {
            Ok(scores) => Some(HoldoutReport {
                every,
                held_out: held.len(),
                scores,
            }),
            Err(e) => {
                debug!(error = %e, every, "Skipping held-out evaluation");
                None
            }
        }
    }
}

/// Score `model` on `samples`.
pub fn evaluate(model: &TrainedModel, samples: &[CalibrationSample]) -> GazefitResult<AxisScores> {
    if samples.is_empty() {
        return Err(GazefitError::insufficient_data("no samples to evaluate"));
    }
    let mut predicted = Vec::with_capacity(samples.len());
    for sample in samples {
        let p = model.predict(&sample.features).map_err(|e| {
            GazefitError::incompatible(model.feature_layout.describe(), e.to_string())
        })?;
        predicted.push(p);
    }

    let score = |truth: Vec<f64>, pred: Vec<f64>| {
        let n = truth.len() as f64;
        let mean = truth.iter().sum::<f64>() / n;
        let ss_res: f64 = truth.iter().zip(&pred).map(|(t, p)| (t - p).powi(2)).sum();
        let ss_tot: f64 = truth.iter().map(|t| (t - mean).powi(2)).sum();
        let r2 = if ss_tot > 0.0 {
            1.0 - ss_res / ss_tot
        } else if ss_res <= f64::EPSILON {
            1.0
        } else {
            0.0
        };
        FitScore {
            r2,
            rmse: (ss_res / n).sqrt(),
        }
    };

    Ok(AxisScores {
        x: score(
            samples.iter().map(|s| s.target.x).collect(),
            predicted.iter().map(|p| p.x).collect(),
        ),
        y: score(
            samples.iter().map(|s| s.target.y).collect(),
            predicted.iter().map(|p| p.y).collect(),
        ),
    })
}

/// Number of distinct target points (exact comparison).
pub fn distinct_targets(samples: &[CalibrationSample]) -> usize {
    samples
        .iter()
        .map(|s| (s.target.x.to_bits(), s.target.y.to_bits()))
        .collect::<BTreeSet<_>>()
        .len()
}

fn check_samples(samples: &[CalibrationSample]) -> GazefitResult<FeatureLayout> {
    let first = samples
        .first()
        .ok_or_else(|| GazefitError::insufficient_data("no calibration samples"))?;
    let layout = first.features.layout();

    if let Some(other) = samples.iter().find(|s| s.features.layout() != layout) {
        return Err(GazefitError::incompatible(
            layout.describe(),
            other.features.layout().describe(),
        ));
    }
    if let Some(i) = samples
        .iter()
        .position(|s| !s.features.is_finite() || !s.target.is_finite())
    {
        return Err(GazefitError::training(format!("sample {i} has non-finite values")));
    }
    if samples.len() < layout.len() {
        return Err(GazefitError::insufficient_data(format!(
            "{} samples for {} features",
            samples.len(),
            layout.len()
        )));
    }
    let targets = distinct_targets(samples);
    if targets < 2 {
        return Err(GazefitError::insufficient_data(format!(
            "only {targets} distinct target point; need at least 2"
        )));
    }
    Ok(layout)
}

/// Per-column mean and population standard deviation; zero-variance
/// columns get scale 1.
fn column_stats(x: &DMatrix<f64>) -> (Vec<f64>, Vec<f64>) {
    let n = x.nrows() as f64;
    let mut means = Vec::with_capacity(x.ncols());
    let mut scales = Vec::with_capacity(x.ncols());
    for column in x.column_iter() {
        let mean = column.sum() / n;
        let var = column.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
        let std = var.sqrt();
        means.push(mean);
        scales.push(if std > f64::EPSILON { std } else { 1.0 });
    }
    (means, scales)
}
