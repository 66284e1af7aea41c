//! Nearest-centroid point classifier.

use serde::{Deserialize, Serialize};

use super::{check_input, encode_labels, ModelFitError};
use crate::domain::Number;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NearestCentroid {
    classes: Vec<Number>,
    centroids: Vec<Vec<f64>>,
}

impl NearestCentroid {
    pub fn fit(x: &[Vec<f64>], y: &[Number]) -> Result<Self, ModelFitError> {
        let width = check_input(x, y)?;
        let (classes, labels) = encode_labels(y);
        let mut centroids = vec![vec![0.0; width]; classes.len()];
        let mut counts = vec![0usize; classes.len()];
        for (row, &l) in x.iter().zip(&labels) {
            counts[l] += 1;
            for (c, v) in centroids[l].iter_mut().zip(row) {
                *c += v;
            }
        }
        for (c, &n) in centroids.iter_mut().zip(&counts) {
            c.iter_mut().for_each(|v| *v /= n.max(1) as f64);
        }
        Ok(Self { classes, centroids })
    }

    pub fn classes(&self) -> &[Number] {
        &self.classes
    }

    /// Class of the closest centroid; the lower class wins ties.
    pub fn predict(&self, row: &[f64]) -> Number {
        let mut best = (self.classes[0], f64::INFINITY);
        for (&class, c) in self.classes.iter().zip(&self.centroids) {
            let d: f64 = c.iter().zip(row).map(|(a, b)| (a - b).powi(2)).sum();
            if d < best.1 {
                best = (class, d);
            }
        }
        best.0
    }
}
