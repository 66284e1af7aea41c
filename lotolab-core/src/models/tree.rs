//! CART decision trees grown on an index arena.
//!
//! One grower serves both the classification trees of the random forest
//! (gini impurity, class-distribution leaves) and the regression trees of
//! gradient boosting (squared error, caller-computed leaf values).

use rand::rngs::StdRng;
use rand::seq::index::sample;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TreeParams {
    pub max_depth: usize,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
    /// Features considered per split; `None` means all.
    pub max_features: Option<usize>,
}

impl Default for TreeParams {
    fn default() -> Self {
        Self {
            max_depth: 12,
            min_samples_split: 2,
            min_samples_leaf: 1,
            max_features: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
enum Node<L> {
    Leaf(L),
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tree<L> {
    nodes: Vec<Node<L>>,
}

/// Running impurity of a growing sample set.
pub(crate) trait SplitStats: Clone {
    fn push(&mut self, sample: usize);
    fn pop(&mut self, sample: usize);
    /// Impurity multiplied by the number of samples.
    fn weighted_impurity(&self) -> f64;
}

#[derive(Clone)]
pub(crate) struct GiniStats<'a> {
    labels: &'a [usize],
    counts: Vec<f64>,
    sum_sq: f64,
    n: f64,
}

impl<'a> GiniStats<'a> {
    pub(crate) fn new(labels: &'a [usize], n_classes: usize) -> Self {
        Self {
            labels,
            counts: vec![0.0; n_classes],
            sum_sq: 0.0,
            n: 0.0,
        }
    }
}

impl SplitStats for GiniStats<'_> {
    fn push(&mut self, sample: usize) {
        let c = &mut self.counts[self.labels[sample]];
        self.sum_sq += 2.0 * *c + 1.0;
        *c += 1.0;
        self.n += 1.0;
    }

    fn pop(&mut self, sample: usize) {
        let c = &mut self.counts[self.labels[sample]];
        self.sum_sq -= 2.0 * *c - 1.0;
        *c -= 1.0;
        self.n -= 1.0;
    }

    fn weighted_impurity(&self) -> f64 {
        if self.n <= 0.0 {
            0.0
        } else {
            self.n - self.sum_sq / self.n
        }
    }
}

#[derive(Clone)]
pub(crate) struct SquaredErrorStats<'a> {
    targets: &'a [f64],
    sum: f64,
    sum_sq: f64,
    n: f64,
}

impl<'a> SquaredErrorStats<'a> {
    pub(crate) fn new(targets: &'a [f64]) -> Self {
        Self {
            targets,
            sum: 0.0,
            sum_sq: 0.0,
            n: 0.0,
        }
    }
}

impl SplitStats for SquaredErrorStats<'_> {
    fn push(&mut self, sample: usize) {
        let v = self.targets[sample];
        self.sum += v;
        self.sum_sq += v * v;
        self.n += 1.0;
    }

    fn pop(&mut self, sample: usize) {
        let v = self.targets[sample];
        self.sum -= v;
        self.sum_sq -= v * v;
        self.n -= 1.0;
    }

    fn weighted_impurity(&self) -> f64 {
        if self.n <= 0.0 {
            0.0
        } else {
            (self.sum_sq - self.sum * self.sum / self.n).max(0.0)
        }
    }
}

struct BestSplit {
    feature: usize,
    threshold: f64,
    score: f64,
}

struct Grower<'a, S, F> {
    x: &'a [Vec<f64>],
    params: &'a TreeParams,
    empty: &'a S,
    leaf: F,
    rng: &'a mut StdRng,
}

impl<L> Tree<L> {
    /// Grow a tree over `samples` (indices into `x`, duplicates allowed).
    pub(crate) fn grow<S, F>(
        x: &[Vec<f64>],
        samples: &mut [usize],
        params: &TreeParams,
        empty: &S,
        leaf: F,
        rng: &mut StdRng,
    ) -> Self
    where
        S: SplitStats,
        F: Fn(&[usize]) -> L,
    {
        let mut tree = Tree { nodes: Vec::new() };
        let mut grower = Grower {
            x,
            params,
            empty,
            leaf,
            rng,
        };
        grower.node(&mut tree, samples, 0);
        tree
    }

    pub fn leaf(&self, row: &[f64]) -> &L {
        let mut at = 0;
        loop {
            match &self.nodes[at] {
                Node::Leaf(value) => return value,
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    let v = row.get(*feature).copied().unwrap_or(0.0);
                    at = if v <= *threshold { *left } else { *right };
                }
            }
        }
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn depth(&self) -> usize {
        fn walk<L>(nodes: &[Node<L>], at: usize) -> usize {
            match &nodes[at] {
                Node::Leaf(_) => 0,
                Node::Split { left, right, .. } => 1 + walk(nodes, *left).max(walk(nodes, *right)),
            }
        }
        if self.nodes.is_empty() {
            0
        } else {
            walk(&self.nodes, 0)
        }
    }
}

impl<S, F, L> Grower<'_, S, F>
where
    S: SplitStats,
    F: Fn(&[usize]) -> L,
{
    fn node(&mut self, tree: &mut Tree<L>, samples: &mut [usize], depth: usize) -> usize {
        let at = tree.nodes.len();
        let n = samples.len();
        if depth >= self.params.max_depth || n < self.params.min_samples_split.max(2) {
            tree.nodes.push(Node::Leaf((self.leaf)(&*samples)));
            return at;
        }

        let mut full = self.empty.clone();
        samples.iter().for_each(|&s| full.push(s));
        let parent = full.weighted_impurity();

        let split = if parent <= 1e-12 {
            None
        } else {
            self.best_split(samples, &full)
                .filter(|b| b.score < parent - 1e-12)
        };
        let Some(split) = split else {
            tree.nodes.push(Node::Leaf((self.leaf)(&*samples)));
            return at;
        };

        let f = split.feature;
        samples.sort_by(|&a, &b| self.x[a][f].total_cmp(&self.x[b][f]));
        let pos = samples.partition_point(|&s| self.x[s][f] <= split.threshold);

        tree.nodes.push(Node::Split {
            feature: f,
            threshold: split.threshold,
            left: 0,
            right: 0,
        });
        let (l, r) = samples.split_at_mut(pos);
        let left = self.node(tree, l, depth + 1);
        let right = self.node(tree, r, depth + 1);
        if let Node::Split {
            left: lslot,
            right: rslot,
            ..
        } = &mut tree.nodes[at]
        {
            *lslot = left;
            *rslot = right;
        }
        at
    }

    fn best_split(&mut self, samples: &mut [usize], full: &S) -> Option<BestSplit> {
        let width = self.x[samples[0]].len();
        let features: Vec<usize> = match self.params.max_features {
            Some(m) if m < width => sample(&mut *self.rng, width, m.max(1)).into_vec(),
            _ => (0..width).collect(),
        };
        let min_leaf = self.params.min_samples_leaf.max(1);
        let n = samples.len();

        let mut best: Option<BestSplit> = None;
        for f in features {
            samples.sort_by(|&a, &b| self.x[a][f].total_cmp(&self.x[b][f]));
            let mut left = self.empty.clone();
            let mut right = full.clone();
            for k in 0..n - 1 {
                let s = samples[k];
                left.push(s);
                right.pop(s);
                let here = self.x[s][f];
                let next = self.x[samples[k + 1]][f];
                if here == next || k + 1 < min_leaf || n - k - 1 < min_leaf {
                    continue;
                }
                let score = left.weighted_impurity() + right.weighted_impurity();
                if best.as_ref().map_or(true, |b| score < b.score) {
                    best = Some(BestSplit {
                        feature: f,
                        threshold: (here + next) / 2.0,
                        score,
                    });
                }
            }
        }
        best
    }
}
