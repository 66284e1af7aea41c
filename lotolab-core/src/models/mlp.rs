//! Small multilayer perceptron: ReLU hidden layers, softmax output,
//! cross-entropy loss, mini-batch Adam with L2 regularisation.

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use super::{check_input, encode_labels, softmax_in_place, ModelFitError};
use crate::domain::Number;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MlpParams {
    pub hidden: Vec<usize>,
    pub epochs: usize,
    pub batch_size: usize,
    pub learning_rate: f64,
    pub l2: f64,
    /// Stop after this many epochs without the loss improving by `tol`.
    pub patience: usize,
    pub tol: f64,
}

impl Default for MlpParams {
    fn default() -> Self {
        Self {
            hidden: vec![64, 32],
            epochs: 100,
            batch_size: 32,
            learning_rate: 0.001,
            l2: 1e-4,
            patience: 10,
            tol: 1e-4,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Dense {
    inputs: usize,
    outputs: usize,
    /// Row-major `outputs x inputs`.
    weights: Vec<f64>,
    bias: Vec<f64>,
}

impl Dense {
    fn glorot(inputs: usize, outputs: usize, rng: &mut StdRng) -> Self {
        let limit = (6.0 / (inputs + outputs) as f64).sqrt();
        Self {
            inputs,
            outputs,
            weights: (0..inputs * outputs).map(|_| rng.gen_range(-limit..limit)).collect(),
            bias: (0..outputs).map(|_| rng.gen_range(-limit..limit)).collect(),
        }
    }

    fn apply(&self, input: &[f64]) -> Vec<f64> {
        (0..self.outputs)
            .map(|o| {
                let w = &self.weights[o * self.inputs..(o + 1) * self.inputs];
                self.bias[o] + w.iter().zip(input).map(|(a, b)| a * b).sum::<f64>()
            })
            .collect()
    }
}

/// Adam moment estimates for one layer.
struct Moments {
    mw: Vec<f64>,
    vw: Vec<f64>,
    mb: Vec<f64>,
    vb: Vec<f64>,
}

struct Grads {
    w: Vec<f64>,
    b: Vec<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Mlp {
    classes: Vec<Number>,
    layers: Vec<Dense>,
    epochs_run: usize,
}

const BETA1: f64 = 0.9;
const BETA2: f64 = 0.999;
const EPS: f64 = 1e-8;

impl Mlp {
    pub fn fit(x: &[Vec<f64>], y: &[Number], params: &MlpParams, seed: u64) -> Result<Self, ModelFitError> {
        let width = check_input(x, y)?;
        let (classes, labels) = encode_labels(y);
        let mut rng = StdRng::seed_from_u64(seed);

        let mut sizes = vec![width];
        sizes.extend(params.hidden.iter().copied().filter(|&h| h > 0));
        sizes.push(classes.len());
        let mut layers: Vec<Dense> = sizes
            .windows(2)
            .map(|w| Dense::glorot(w[0], w[1], &mut rng))
            .collect();
        let mut moments: Vec<Moments> = layers
            .iter()
            .map(|l| Moments {
                mw: vec![0.0; l.weights.len()],
                vw: vec![0.0; l.weights.len()],
                mb: vec![0.0; l.bias.len()],
                vb: vec![0.0; l.bias.len()],
            })
            .collect();

        let n = x.len();
        let batch = params.batch_size.clamp(1, n);
        let mut order: Vec<usize> = (0..n).collect();
        let mut step = 0i32;
        let mut best_loss = f64::INFINITY;
        let mut stale = 0;
        let mut epochs_run = 0;

        for _ in 0..params.epochs {
            order.shuffle(&mut rng);
            let mut epoch_loss = 0.0;

            for chunk in order.chunks(batch) {
                let mut grads: Vec<Grads> = layers
                    .iter()
                    .map(|l| Grads {
                        w: vec![0.0; l.weights.len()],
                        b: vec![0.0; l.bias.len()],
                    })
                    .collect();

                for &i in chunk {
                    epoch_loss += backprop(&layers, &x[i], labels[i], &mut grads);
                }

                step += 1;
                let m = chunk.len() as f64;
                let bc1 = 1.0 - BETA1.powi(step);
                let bc2 = 1.0 - BETA2.powi(step);
                for ((layer, g), mo) in layers.iter_mut().zip(&grads).zip(moments.iter_mut()) {
                    for j in 0..layer.weights.len() {
                        let grad = g.w[j] / m + params.l2 * layer.weights[j];
                        adam(&mut layer.weights[j], &mut mo.mw[j], &mut mo.vw[j], grad, params.learning_rate, bc1, bc2);
                    }
                    for j in 0..layer.bias.len() {
                        let grad = g.b[j] / m;
                        adam(&mut layer.bias[j], &mut mo.mb[j], &mut mo.vb[j], grad, params.learning_rate, bc1, bc2);
                    }
                }
            }
            epochs_run += 1;

            let loss = epoch_loss / n as f64;
            if !loss.is_finite() {
                return Err(ModelFitError::Diverged { model: "neural_net" });
            }
            if loss < best_loss - params.tol {
                best_loss = loss;
                stale = 0;
            } else {
                stale += 1;
                if stale >= params.patience.max(1) {
                    break;
                }
            }
        }

        Ok(Self {
            classes,
            layers,
            epochs_run,
        })
    }

    pub fn classes(&self) -> &[Number] {
        &self.classes
    }

    pub fn epochs_run(&self) -> usize {
        self.epochs_run
    }

    pub fn predict_proba(&self, row: &[f64]) -> Vec<f64> {
        forward(&self.layers, row).pop().unwrap_or_default()
    }
}

/// Activations of every layer, input first. Hidden layers use ReLU, the
/// output layer softmax.
fn forward(layers: &[Dense], row: &[f64]) -> Vec<Vec<f64>> {
    let mut acts = vec![row.to_vec()];
    for (li, layer) in layers.iter().enumerate() {
        let mut z = layer.apply(&acts[acts.len() - 1]);
        if li + 1 < layers.len() {
            z.iter_mut().for_each(|v| *v = v.max(0.0));
        } else {
            softmax_in_place(&mut z);
        }
        acts.push(z);
    }
    acts
}

/// Accumulates gradients for one sample; returns its cross-entropy loss.
fn backprop(layers: &[Dense], row: &[f64], label: usize, grads: &mut [Grads]) -> f64 {
    let acts = forward(layers, row);
    let out = &acts[acts.len() - 1];
    let loss = -out[label].max(1e-12).ln();

    let mut delta: Vec<f64> = out.clone();
    delta[label] -= 1.0;

    for li in (0..layers.len()).rev() {
        let layer = &layers[li];
        let input = &acts[li];
        let g = &mut grads[li];
        for o in 0..layer.outputs {
            g.b[o] += delta[o];
            let base = o * layer.inputs;
            for i in 0..layer.inputs {
                g.w[base + i] += delta[o] * input[i];
            }
        }
        if li > 0 {
            delta = (0..layer.inputs)
                .map(|i| {
                    if input[i] <= 0.0 {
                        return 0.0;
                    }
                    (0..layer.outputs)
                        .map(|o| layer.weights[o * layer.inputs + i] * delta[o])
                        .sum()
                })
                .collect();
        }
    }
    loss
}

fn adam(param: &mut f64, m: &mut f64, v: &mut f64, grad: f64, lr: f64, bc1: f64, bc2: f64) {
    *m = BETA1 * *m + (1.0 - BETA1) * grad;
    *v = BETA2 * *v + (1.0 - BETA2) * grad * grad;
    *param -= lr * (*m / bc1) / ((*v / bc2).sqrt() + EPS);
}
