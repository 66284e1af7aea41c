//! Ensemble training: a roster of heterogeneous classifiers, each with its
//! own scaler and cross-validated score.
//!
//! A model that fails to fit or to cross-validate is dropped and recorded in
//! the [`TrainingReport`]; training only fails when no model survives.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::Number;
use crate::models::{
    cross_val_accuracy, BoostingParams, FittedModel, ForestParams, ModelFitError, ModelKind, ModelSpec,
    MlpParams, StandardScaler,
};
use crate::rng::RngHierarchy;

pub const RANDOM_FOREST: &str = "random_forest";
pub const GRADIENT_BOOST: &str = "gradient_boost";
pub const NEURAL_NETWORK: &str = "neural_network";

/// Vote weight for a model with no entry in [`ModelWeights`].
pub const FALLBACK_WEIGHT: f64 = 0.33;

// ─── Weights ─────────────────────────────────────────────────────────

/// Per-model vote weights. Expected to sum to about 1; not enforced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ModelWeights(BTreeMap<String, f64>);

impl Default for ModelWeights {
    fn default() -> Self {
        Self::from_pairs(&[(RANDOM_FOREST, 0.40), (GRADIENT_BOOST, 0.35), (NEURAL_NETWORK, 0.25)])
    }
}

impl ModelWeights {
    pub fn from_pairs(pairs: &[(&str, f64)]) -> Self {
        Self(pairs.iter().map(|(k, v)| (k.to_string(), *v)).collect())
    }

    pub fn get(&self, model: &str) -> f64 {
        self.0.get(model).copied().unwrap_or(FALLBACK_WEIGHT)
    }

    pub fn set(&mut self, model: impl Into<String>, weight: f64) {
        self.0.insert(model.into(), weight);
    }

    /// Overwrite entries present in `other`, keep the rest.
    pub fn update(&mut self, other: &ModelWeights) {
        for (k, v) in &other.0 {
            self.0.insert(k.clone(), *v);
        }
    }

    pub fn total(&self) -> f64 {
        self.0.values().sum()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.0.iter().map(|(k, v)| (k.as_str(), *v))
    }
}

// ─── Config ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnsembleConfig {
    pub roster: Vec<ModelSpec>,
    pub cv_folds: usize,
    pub seed: u64,
}

impl Default for EnsembleConfig {
    fn default() -> Self {
        Self {
            roster: default_roster(),
            cv_folds: 3,
            seed: 42,
        }
    }
}

/// Bagged trees, boosted trees and a small neural net.
pub fn default_roster() -> Vec<ModelSpec> {
    vec![
        ModelSpec::new(RANDOM_FOREST, ModelKind::RandomForest(ForestParams::default())),
        ModelSpec::new(GRADIENT_BOOST, ModelKind::GradientBoosting(BoostingParams::default())),
        ModelSpec::new(NEURAL_NETWORK, ModelKind::NeuralNet(MlpParams::default())),
    ]
}

// ─── Trained ensemble ────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainedModel {
    pub name: String,
    pub scaler: StandardScaler,
    pub model: FittedModel,
    pub cv_score: f64,
}

/// Surviving models in roster order.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TrainedEnsemble {
    models: Vec<TrainedModel>,
}

impl TrainedEnsemble {
    pub fn models(&self) -> &[TrainedModel] {
        &self.models
    }

    pub fn get(&self, name: &str) -> Option<&TrainedModel> {
        self.models.iter().find(|m| m.name == name)
    }

    pub fn names(&self) -> Vec<&str> {
        self.models.iter().map(|m| m.name.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.models.len()
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TrainingReport {
    pub rows: usize,
    /// `(model, cv accuracy)` for every survivor.
    pub fitted: Vec<(String, f64)>,
    pub failed: Vec<(String, ModelFitError)>,
}

#[derive(Debug, Error, PartialEq)]
pub enum TrainError {
    #[error("{rows} training rows are too few for {folds}-fold cross-validation")]
    TooFewRows { rows: usize, folds: usize },

    #[error("feature/target length mismatch: {features} rows vs {targets} targets")]
    LengthMismatch { features: usize, targets: usize },

    #[error("every model failed to train ({} attempted)", .failures.len())]
    AllModelsFailed { failures: Vec<(String, ModelFitError)> },
}

// ─── Trainer ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default)]
pub struct EnsembleTrainer {
    config: EnsembleConfig,
}

impl EnsembleTrainer {
    pub fn new(config: EnsembleConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &EnsembleConfig {
        &self.config
    }

    /// Fit every roster model from scratch.
    pub fn train(&self, x: &[Vec<f64>], y: &[Number]) -> Result<(TrainedEnsemble, TrainingReport), TrainError> {
        if x.len() != y.len() {
            return Err(TrainError::LengthMismatch {
                features: x.len(),
                targets: y.len(),
            });
        }
        let folds = self.config.cv_folds.max(2);
        if x.len() < folds {
            return Err(TrainError::TooFewRows { rows: x.len(), folds });
        }

        let seeds = RngHierarchy::new(self.config.seed);
        let mut ensemble = TrainedEnsemble::default();
        let mut report = TrainingReport {
            rows: x.len(),
            ..Default::default()
        };

        for spec in &self.config.roster {
            let seed = seeds.sub_seed(&spec.name, 0);
            match fit_one(spec, x, y, folds, seed) {
                Ok(trained) => {
                    tracing::debug!(model = %spec.name, cv_score = trained.cv_score, "model trained");
                    report.fitted.push((spec.name.clone(), trained.cv_score));
                    ensemble.models.push(trained);
                }
                Err(e) => {
                    tracing::warn!(model = %spec.name, error = %e, "model dropped from ensemble");
                    report.failed.push((spec.name.clone(), e));
                }
            }
        }

        if ensemble.is_empty() {
            return Err(TrainError::AllModelsFailed {
                failures: report.failed,
            });
        }
        Ok((ensemble, report))
    }
}

fn fit_one(
    spec: &ModelSpec,
    x: &[Vec<f64>],
    y: &[Number],
    folds: usize,
    seed: u64,
) -> Result<TrainedModel, ModelFitError> {
    let scaler = StandardScaler::fit(x);
    let scaled = scaler.transform_all(x);
    let model = spec.kind.fit(&scaled, y, seed)?;
    let cv_score = cross_val_accuracy(&spec.kind, &scaled, y, folds, seed)?;
    Ok(TrainedModel {
        name: spec.name.clone(),
        scaler,
        model,
        cv_score,
    })
}
