//! Random forest: bootstrap-bagged gini trees with per-split feature sampling.
//!
//! Trees are grown in parallel with rayon. Each tree draws its own RNG from the
//! seed hierarchy, so results do not depend on thread scheduling.

use rand::Rng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use super::tree::{GiniStats, Tree, TreeParams};
use super::{check_input, encode_labels, ModelFitError};
use crate::domain::Number;
use crate::rng::RngHierarchy;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ForestParams {
    pub n_trees: usize,
    pub max_depth: usize,
    pub min_samples_leaf: usize,
    /// Features per split; `None` picks the square root of the width.
    pub max_features: Option<usize>,
}

impl Default for ForestParams {
    fn default() -> Self {
        Self {
            n_trees: 100,
            max_depth: 12,
            min_samples_leaf: 1,
            max_features: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RandomForest {
    classes: Vec<Number>,
    trees: Vec<Tree<Vec<f64>>>,
}

impl RandomForest {
    pub fn fit(x: &[Vec<f64>], y: &[Number], params: &ForestParams, seed: u64) -> Result<Self, ModelFitError> {
        let width = check_input(x, y)?;
        let (classes, labels) = encode_labels(y);
        let n_classes = classes.len();
        let n = x.len();

        let tree_params = TreeParams {
            max_depth: params.max_depth,
            min_samples_split: 2,
            min_samples_leaf: params.min_samples_leaf,
            max_features: Some(
                params
                    .max_features
                    .unwrap_or_else(|| (width as f64).sqrt().round() as usize)
                    .clamp(1, width.max(1)),
            ),
        };
        let seeds = RngHierarchy::new(seed);
        let empty = GiniStats::new(&labels, n_classes);

        let trees = (0..params.n_trees.max(1))
            .into_par_iter()
            .map(|t| {
                let mut rng = seeds.rng_for("forest_tree", t as u64);
                let mut samples: Vec<usize> = (0..n).map(|_| rng.gen_range(0..n)).collect();
                Tree::grow(
                    x,
                    &mut samples,
                    &tree_params,
                    &empty,
                    |s: &[usize]| class_distribution(s, &labels, n_classes),
                    &mut rng,
                )
            })
            .collect();

        Ok(Self { classes, trees })
    }

    pub fn classes(&self) -> &[Number] {
        &self.classes
    }

    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }

    /// Mean of the trees' leaf distributions.
    pub fn predict_proba(&self, row: &[f64]) -> Vec<f64> {
        let mut probs = vec![0.0; self.classes.len()];
        for tree in &self.trees {
            for (p, v) in probs.iter_mut().zip(tree.leaf(row)) {
                *p += v;
            }
        }
        let n = self.trees.len().max(1) as f64;
        probs.iter_mut().for_each(|p| *p /= n);
        probs
    }
}

fn class_distribution(samples: &[usize], labels: &[usize], n_classes: usize) -> Vec<f64> {
    let mut dist = vec![0.0; n_classes];
    for &s in samples {
        dist[labels[s]] += 1.0;
    }
    let total = samples.len().max(1) as f64;
    dist.iter_mut().for_each(|d| *d /= total);
    dist
}
