//! Learning from verified predictions.
//!
//! Two signals feed with-learning generation:
//! - **High-accuracy patterns:** rounds where some set reached the threshold
//!   (default 4 matches) contribute the actual draw's sum and odd count.
//! - **Frequently missed numbers:** drawn numbers the portfolio lacked, counted
//!   per round (top 5 each) and aggregated across rounds.

use std::collections::BTreeMap;

use lotolab_core::domain::Number;
use lotolab_core::engine::LearningAdjustments;
use lotolab_core::features::PatternTargets;
use serde::{Deserialize, Serialize};

use crate::history::PredictionEntry;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VerificationConfig {
    pub high_accuracy_threshold: usize,
    /// Missed numbers kept per round.
    pub missed_per_round: usize,
    /// Missed numbers kept after aggregation.
    pub missed_top_n: usize,
    /// Missed numbers turned into boosts.
    pub boost_count: usize,
}

impl Default for VerificationConfig {
    fn default() -> Self {
        Self {
            high_accuracy_threshold: 4,
            missed_per_round: 5,
            missed_top_n: 10,
            boost_count: 5,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HighAccuracyPattern {
    pub avg_sum: f64,
    pub avg_odd_count: f64,
    pub sample_size: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ImprovementMetrics {
    pub high_accuracy: Option<HighAccuracyPattern>,
    /// `(number, miss count)`, most missed first.
    pub frequently_missed: Vec<(Number, usize)>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImprovementReport {
    pub verified_rounds: usize,
    pub total_prediction_sets: usize,
    pub avg_matches: f64,
    pub max_matches: usize,
    /// matches → number of sets.
    pub match_distribution: BTreeMap<usize, usize>,
    pub metrics: ImprovementMetrics,
}

/// Counts in first-seen order, so equal counts keep that order after sorting.
#[derive(Default)]
struct OrderedCounter(Vec<(Number, usize)>);

impl OrderedCounter {
    fn add(&mut self, number: Number, by: usize) {
        match self.0.iter_mut().find(|(n, _)| *n == number) {
            Some((_, c)) => *c += by,
            None => self.0.push((number, by)),
        }
    }

    fn most_common(mut self, n: usize) -> Vec<(Number, usize)> {
        self.0.sort_by(|a, b| b.1.cmp(&a.1));
        self.0.truncate(n);
        self.0
    }
}

pub struct VerificationLearner {
    config: VerificationConfig,
}

impl VerificationLearner {
    pub fn new(config: VerificationConfig) -> Self {
        Self { config }
    }

    /// Learn from every verified entry.
    pub fn learn<'a>(&self, entries: impl IntoIterator<Item = &'a PredictionEntry>) -> ImprovementMetrics {
        let mut sums = Vec::new();
        let mut odds = Vec::new();
        let mut missed = OrderedCounter::default();

        for entry in entries.into_iter().filter(|e| e.verified) {
            let Some(actual) = entry.actual.as_deref() else {
                continue;
            };
            if entry.max_matches() >= self.config.high_accuracy_threshold {
                sums.push(actual.iter().map(|&n| n as f64).sum::<f64>());
                odds.push(actual.iter().filter(|&&n| n % 2 == 1).count() as f64);
            }

            let mut round_missed = OrderedCounter::default();
            for set in &entry.predictions {
                for &n in actual.iter().filter(|&&n| !set.contains(n)) {
                    round_missed.add(n, 1);
                }
            }
            for (n, c) in round_missed.most_common(self.config.missed_per_round) {
                missed.add(n, c);
            }
        }

        let high_accuracy = (!sums.is_empty()).then(|| HighAccuracyPattern {
            avg_sum: sums.iter().sum::<f64>() / sums.len() as f64,
            avg_odd_count: odds.iter().sum::<f64>() / odds.len() as f64,
            sample_size: sums.len(),
        });
        if let Some(p) = &high_accuracy {
            tracing::info!(
                avg_sum = format!("{:.1}", p.avg_sum),
                avg_odd = format!("{:.1}", p.avg_odd_count),
                samples = p.sample_size,
                "high-accuracy pattern learned"
            );
        }

        ImprovementMetrics {
            high_accuracy,
            frequently_missed: missed.most_common(self.config.missed_top_n),
        }
    }

    /// Boost the most missed numbers and target the high-accuracy pattern.
    pub fn adjustments(&self, metrics: &ImprovementMetrics) -> LearningAdjustments {
        LearningAdjustments {
            boost_numbers: metrics
                .frequently_missed
                .iter()
                .take(self.config.boost_count)
                .map(|&(n, _)| n)
                .collect(),
            pattern_targets: metrics.high_accuracy.as_ref().map(|p| PatternTargets {
                avg_sum: Some(p.avg_sum),
                avg_odd_count: Some(p.avg_odd_count),
            }),
        }
    }

    /// `None` until at least one entry is verified.
    pub fn report<'a>(&self, entries: impl IntoIterator<Item = &'a PredictionEntry> + Clone) -> Option<ImprovementReport> {
        let verified: Vec<&PredictionEntry> = entries.clone().into_iter().filter(|e| e.verified).collect();
        if verified.is_empty() {
            return None;
        }
        let all: Vec<usize> = verified.iter().flat_map(|e| e.matches.iter().copied()).collect();
        let mut distribution = BTreeMap::new();
        for &m in &all {
            *distribution.entry(m).or_insert(0) += 1;
        }
        Some(ImprovementReport {
            verified_rounds: verified.len(),
            total_prediction_sets: all.len(),
            avg_matches: if all.is_empty() {
                0.0
            } else {
                all.iter().sum::<usize>() as f64 / all.len() as f64
            },
            max_matches: all.iter().copied().max().unwrap_or(0),
            match_distribution: distribution,
            metrics: self.learn(entries),
        })
    }
}

impl Default for VerificationLearner {
    fn default() -> Self {
        Self::new(VerificationConfig::default())
    }
}
