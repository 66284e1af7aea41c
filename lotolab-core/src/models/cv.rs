//! Stratified k-fold cross-validation.

use super::{ModelFitError, ModelKind};
use crate::domain::Number;

/// Test-fold indices. Each class's samples are dealt round-robin across the
/// folds in order of first appearance, continuing the deal from class to class
/// so fold sizes differ by at most one.
pub fn stratified_folds(y: &[Number], k: usize) -> Result<Vec<Vec<usize>>, ModelFitError> {
    if k < 2 || y.len() < k {
        return Err(ModelFitError::TooFewSamples {
            samples: y.len(),
            folds: k,
        });
    }
    let mut order: Vec<Number> = Vec::new();
    for &label in y {
        if !order.contains(&label) {
            order.push(label);
        }
    }
    let mut folds = vec![Vec::new(); k];
    let mut deal = 0;
    for label in order {
        for (i, _) in y.iter().enumerate().filter(|&(_, &v)| v == label) {
            folds[deal % k].push(i);
            deal += 1;
        }
    }
    for fold in &mut folds {
        fold.sort_unstable();
    }
    Ok(folds)
}

/// Mean held-out accuracy of `kind` over `k` stratified folds.
pub fn cross_val_accuracy(
    kind: &ModelKind,
    x: &[Vec<f64>],
    y: &[Number],
    k: usize,
    seed: u64,
) -> Result<f64, ModelFitError> {
    let folds = stratified_folds(y, k)?;
    let mut in_test = vec![false; y.len()];
    let mut total = 0.0;

    for (f, test) in folds.iter().enumerate() {
        in_test.iter_mut().for_each(|t| *t = false);
        test.iter().for_each(|&i| in_test[i] = true);

        let (train_x, train_y): (Vec<Vec<f64>>, Vec<Number>) = x
            .iter()
            .zip(y)
            .enumerate()
            .filter(|(i, _)| !in_test[*i])
            .map(|(_, (row, &label))| (row.clone(), label))
            .unzip();

        let model = kind.fit(&train_x, &train_y, seed.wrapping_add(f as u64))?;
        let correct = test.iter().filter(|&&i| model.predict(&x[i]) == y[i]).count();
        total += correct as f64 / test.len() as f64;
    }
    Ok(total / k as f64)
}
