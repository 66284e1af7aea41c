//! Classifiers — the fitted models an ensemble is built from.
//!
//! Every model predicts "which number" from a 16-dim feature row. Models are a
//! tagged variant: [`ProbabilisticModel`]s return a class-probability
//! distribution, [`PointModel`]s return a single class which
//! [`FittedModel::predict_distribution`] turns into a one-hot distribution.
//! Callers never need to know which kind they hold.
//!
//! All fitting is deterministic given the seed passed in.

pub mod boosting;
pub mod centroid;
pub mod cv;
pub mod forest;
pub mod mlp;
pub mod scaler;
pub mod tree;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::Number;

pub use boosting::{BoostingParams, GradientBoosting};
pub use centroid::NearestCentroid;
pub use cv::{cross_val_accuracy, stratified_folds};
pub use forest::{ForestParams, RandomForest};
pub use mlp::{Mlp, MlpParams};
pub use scaler::StandardScaler;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum ModelFitError {
    #[error("no training samples")]
    EmptyInput,

    #[error("feature/target length mismatch: {features} rows vs {targets} targets")]
    LengthMismatch { features: usize, targets: usize },

    #[error("inconsistent feature width: expected {expected}, found {found}")]
    RaggedFeatures { expected: usize, found: usize },

    #[error("need at least 2 classes, found {0}")]
    SingleClass(usize),

    #[error("{samples} samples cannot be split into {folds} folds")]
    TooFewSamples { samples: usize, folds: usize },

    #[error("{model} diverged (non-finite loss)")]
    Diverged { model: &'static str },
}

/// A probability for each class the model was trained on.
#[derive(Debug, Clone, PartialEq)]
pub struct Distribution {
    pub classes: Vec<Number>,
    pub probs: Vec<f64>,
}

impl Distribution {
    pub fn one_hot(classes: &[Number], hot: Number) -> Self {
        let probs = classes
            .iter()
            .map(|&c| if c == hot { 1.0 } else { 0.0 })
            .collect();
        Self {
            classes: classes.to_vec(),
            probs,
        }
    }

    /// Class with the highest probability; first wins on ties.
    pub fn argmax(&self) -> Option<Number> {
        let mut best: Option<(Number, f64)> = None;
        for (&c, &p) in self.classes.iter().zip(&self.probs) {
            if best.map_or(true, |(_, bp)| p > bp) {
                best = Some((c, p));
            }
        }
        best.map(|(c, _)| c)
    }
}

// ─── Fitted models ───────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProbabilisticModel {
    RandomForest(RandomForest),
    GradientBoosting(GradientBoosting),
    NeuralNet(Mlp),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PointModel {
    NearestCentroid(NearestCentroid),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FittedModel {
    Probabilistic(ProbabilisticModel),
    Point(PointModel),
}

impl FittedModel {
    pub fn classes(&self) -> &[Number] {
        match self {
            FittedModel::Probabilistic(ProbabilisticModel::RandomForest(m)) => m.classes(),
            FittedModel::Probabilistic(ProbabilisticModel::GradientBoosting(m)) => m.classes(),
            FittedModel::Probabilistic(ProbabilisticModel::NeuralNet(m)) => m.classes(),
            FittedModel::Point(PointModel::NearestCentroid(m)) => m.classes(),
        }
    }

    /// Distribution over the training classes for one (already scaled) row.
    pub fn predict_distribution(&self, row: &[f64]) -> Distribution {
        match self {
            FittedModel::Probabilistic(m) => {
                let probs = match m {
                    ProbabilisticModel::RandomForest(m) => m.predict_proba(row),
                    ProbabilisticModel::GradientBoosting(m) => m.predict_proba(row),
                    ProbabilisticModel::NeuralNet(m) => m.predict_proba(row),
                };
                Distribution {
                    classes: self.classes().to_vec(),
                    probs,
                }
            }
            FittedModel::Point(PointModel::NearestCentroid(m)) => {
                Distribution::one_hot(m.classes(), m.predict(row))
            }
        }
    }

    pub fn predict(&self, row: &[f64]) -> Number {
        match self {
            FittedModel::Point(PointModel::NearestCentroid(m)) => m.predict(row),
            FittedModel::Probabilistic(_) => self
                .predict_distribution(row)
                .argmax()
                .unwrap_or_else(|| self.classes()[0]),
        }
    }

    pub fn is_probabilistic(&self) -> bool {
        matches!(self, FittedModel::Probabilistic(_))
    }
}

// ─── Model specs ─────────────────────────────────────────────────────

/// Which model to fit, with its hyper-parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ModelKind {
    RandomForest(ForestParams),
    GradientBoosting(BoostingParams),
    NeuralNet(MlpParams),
    NearestCentroid,
}

impl ModelKind {
    pub fn label(&self) -> &'static str {
        match self {
            ModelKind::RandomForest(_) => "random_forest",
            ModelKind::GradientBoosting(_) => "gradient_boosting",
            ModelKind::NeuralNet(_) => "neural_net",
            ModelKind::NearestCentroid => "nearest_centroid",
        }
    }

    /// Fit on already-scaled rows.
    pub fn fit(&self, x: &[Vec<f64>], y: &[Number], seed: u64) -> Result<FittedModel, ModelFitError> {
        Ok(match self {
            ModelKind::RandomForest(p) => FittedModel::Probabilistic(ProbabilisticModel::RandomForest(
                RandomForest::fit(x, y, p, seed)?,
            )),
            ModelKind::GradientBoosting(p) => FittedModel::Probabilistic(
                ProbabilisticModel::GradientBoosting(GradientBoosting::fit(x, y, p, seed)?),
            ),
            ModelKind::NeuralNet(p) => {
                FittedModel::Probabilistic(ProbabilisticModel::NeuralNet(Mlp::fit(x, y, p, seed)?))
            }
            ModelKind::NearestCentroid => {
                FittedModel::Point(PointModel::NearestCentroid(NearestCentroid::fit(x, y)?))
            }
        })
    }
}

/// A named roster entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelSpec {
    pub name: String,
    #[serde(flatten)]
    pub kind: ModelKind,
}

impl ModelSpec {
    pub fn new(name: impl Into<String>, kind: ModelKind) -> Self {
        Self {
            name: name.into(),
            kind,
        }
    }
}

// ─── Shared helpers ──────────────────────────────────────────────────

/// Sorted distinct labels and each target's index into them.
pub(crate) fn encode_labels(y: &[Number]) -> (Vec<Number>, Vec<usize>) {
    let mut classes: Vec<Number> = y.to_vec();
    classes.sort_unstable();
    classes.dedup();
    let encoded = y
        .iter()
        .map(|v| classes.binary_search(v).unwrap_or(0))
        .collect();
    (classes, encoded)
}

/// Shape checks every `fit` starts with. Returns the feature width.
pub(crate) fn check_input(x: &[Vec<f64>], y: &[Number]) -> Result<usize, ModelFitError> {
    if x.is_empty() {
        return Err(ModelFitError::EmptyInput);
    }
    if x.len() != y.len() {
        return Err(ModelFitError::LengthMismatch {
            features: x.len(),
            targets: y.len(),
        });
    }
    let width = x[0].len();
    if let Some(bad) = x.iter().find(|r| r.len() != width) {
        return Err(ModelFitError::RaggedFeatures {
            expected: width,
            found: bad.len(),
        });
    }
    Ok(width)
}

pub(crate) fn softmax_in_place(z: &mut [f64]) {
    let max = z.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let mut sum = 0.0;
    for v in z.iter_mut() {
        *v = (*v - max).exp();
        sum += *v;
    }
    if sum > 0.0 {
        for v in z.iter_mut() {
            *v /= sum;
        }
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_labels_sorts_and_indexes() {
        let (classes, enc) = encode_labels(&[9, 3, 9, 5]);
        assert_eq!(classes, vec![3, 5, 9]);
        assert_eq!(enc, vec![2, 0, 2, 1]);
    }

    #[test]
    fn check_input_rejects_bad_shapes() {
        assert_eq!(check_input(&[], &[]), Err(ModelFitError::EmptyInput));
        assert_eq!(
            check_input(&[vec![1.0]], &[1, 2]),
            Err(ModelFitError::LengthMismatch {
                features: 1,
                targets: 2
            })
        );
        assert_eq!(
            check_input(&[vec![1.0], vec![1.0, 2.0]], &[1, 2]),
            Err(ModelFitError::RaggedFeatures {
                expected: 1,
                found: 2
            })
        );
    }

    #[test]
    fn point_model_yields_one_hot() {
        let (x, y) = fixtures::clusters();
        let model = ModelKind::NearestCentroid.fit(&x, &y, 0).unwrap();
        assert!(!model.is_probabilistic());
        let dist = model.predict_distribution(&[5.0, 5.0]);
        assert_eq!(dist.classes, vec![3, 7, 11]);
        assert_eq!(dist.probs, vec![0.0, 1.0, 0.0]);
    }

    #[test]
    fn every_kind_separates_clusters() {
        let (x, y) = fixtures::clusters();
        let kinds = [
            ModelKind::RandomForest(ForestParams {
                n_trees: 10,
                ..Default::default()
            }),
            ModelKind::GradientBoosting(BoostingParams {
                n_rounds: 10,
                ..Default::default()
            }),
            ModelKind::NeuralNet(MlpParams {
                hidden: vec![8],
                epochs: 200,
                learning_rate: 0.01,
                patience: 200,
                ..Default::default()
            }),
            ModelKind::NearestCentroid,
        ];
        for kind in kinds {
            let model = kind.fit(&x, &y, 42).unwrap();
            assert_eq!(model.predict(&[0.0, 0.0]), 3, "{}", kind.label());
            assert_eq!(model.predict(&[5.1, 5.1]), 7, "{}", kind.label());
            assert_eq!(model.predict(&[-5.1, 4.9]), 11, "{}", kind.label());
            let dist = model.predict_distribution(&[0.0, 0.0]);
            let total: f64 = dist.probs.iter().sum();
            assert!((total - 1.0).abs() < 1e-6, "{}", kind.label());
        }
    }

    #[test]
    fn model_spec_reads_from_toml() {
        let spec: ModelSpec = toml::from_str(
            r#"
            name = "random_forest"
            kind = "random_forest"
            n_trees = 7
            "#,
        )
        .unwrap();
        assert_eq!(spec.name, "random_forest");
        match spec.kind {
            ModelKind::RandomForest(p) => assert_eq!(p.n_trees, 7),
            other => panic!("unexpected kind {other:?}"),
        }
    }
}
