//! Multi-class gradient boosting on softmax (multinomial deviance).
//!
//! Each round fits one squared-error regression tree per class to the
//! residuals `y_ik - p_ik` and takes a single Newton step in every leaf.

use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};

use super::tree::{SquaredErrorStats, Tree, TreeParams};
use super::{check_input, encode_labels, softmax_in_place, ModelFitError};
use crate::domain::Number;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BoostingParams {
    pub n_rounds: usize,
    pub max_depth: usize,
    pub learning_rate: f64,
    pub min_samples_leaf: usize,
}

impl Default for BoostingParams {
    fn default() -> Self {
        Self {
            n_rounds: 30,
            max_depth: 3,
            learning_rate: 0.1,
            min_samples_leaf: 1,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GradientBoosting {
    classes: Vec<Number>,
    /// Log class priors.
    init: Vec<f64>,
    learning_rate: f64,
    /// `rounds[r][k]` is the tree for class `k` in round `r`.
    rounds: Vec<Vec<Tree<f64>>>,
}

impl GradientBoosting {
    pub fn fit(x: &[Vec<f64>], y: &[Number], params: &BoostingParams, seed: u64) -> Result<Self, ModelFitError> {
        check_input(x, y)?;
        let (classes, labels) = encode_labels(y);
        let k = classes.len();
        if k < 2 {
            return Err(ModelFitError::SingleClass(k));
        }
        let n = x.len();

        let mut prior = vec![0.0; k];
        for &l in &labels {
            prior[l] += 1.0;
        }
        let init: Vec<f64> = prior.iter().map(|c| (c / n as f64).ln()).collect();

        let tree_params = TreeParams {
            max_depth: params.max_depth,
            min_samples_split: 2,
            min_samples_leaf: params.min_samples_leaf,
            max_features: None,
        };
        // Trees use every feature, so the RNG only satisfies the grower's signature.
        let mut rng = StdRng::seed_from_u64(seed);

        let mut scores: Vec<Vec<f64>> = vec![init.clone(); n];
        let mut rounds = Vec::with_capacity(params.n_rounds);
        let newton_scale = (k as f64 - 1.0) / k as f64;

        for _ in 0..params.n_rounds {
            let probs: Vec<Vec<f64>> = scores
                .iter()
                .map(|s| {
                    let mut p = s.clone();
                    softmax_in_place(&mut p);
                    p
                })
                .collect();

            let mut round = Vec::with_capacity(k);
            for class in 0..k {
                let residuals: Vec<f64> = (0..n)
                    .map(|i| f64::from(u8::from(labels[i] == class)) - probs[i][class])
                    .collect();
                let mut samples: Vec<usize> = (0..n).collect();
                let tree = Tree::grow(
                    x,
                    &mut samples,
                    &tree_params,
                    &SquaredErrorStats::new(&residuals),
                    |s: &[usize]| {
                        let num: f64 = s.iter().map(|&i| residuals[i]).sum();
                        let den: f64 = s
                            .iter()
                            .map(|&i| residuals[i].abs() * (1.0 - residuals[i].abs()))
                            .sum();
                        if den.abs() < 1e-12 {
                            0.0
                        } else {
                            newton_scale * num / den
                        }
                    },
                    &mut rng,
                );
                for (i, row) in x.iter().enumerate() {
                    scores[i][class] += params.learning_rate * tree.leaf(row);
                }
                round.push(tree);
            }
            if scores.iter().flatten().any(|v| !v.is_finite()) {
                return Err(ModelFitError::Diverged {
                    model: "gradient_boosting",
                });
            }
            rounds.push(round);
        }

        Ok(Self {
            classes,
            init,
            learning_rate: params.learning_rate,
            rounds,
        })
    }

    pub fn classes(&self) -> &[Number] {
        &self.classes
    }

    pub fn predict_proba(&self, row: &[f64]) -> Vec<f64> {
        let mut z = self.init.clone();
        for round in &self.rounds {
            for (v, tree) in z.iter_mut().zip(round) {
                *v += self.learning_rate * tree.leaf(row);
            }
        }
        softmax_in_place(&mut z);
        z
    }
}
