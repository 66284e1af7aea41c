//! Insight extraction from backtest results.
//!
//! A backtest is **high-accuracy** when its best candidate reached the
//! configured threshold (default 4 matches). Feature weights measure how often
//! high-accuracy backtests had an actual draw inside the game's normal band:
//!
//! | key                | band (7 from 37)         | general form                  |
//! |--------------------|--------------------------|-------------------------------|
//! | `sum_importance`   | `|sum - 133| < 20`       | centre ± round(0.15 · centre) |
//! | `odd_importance`   | `3 ..= 4` odd numbers    | `floor(N/2) ..= ceil(N/2)`    |
//! | `range_importance` | `25 ..= 35`              | `K - 12 ..= K - 2`            |

use std::collections::BTreeMap;

use lotolab_core::domain::GameSpec;
use serde::{Deserialize, Serialize};

use crate::validator::BacktestResult;

pub const SUM_IMPORTANCE: &str = "sum_importance";
pub const ODD_IMPORTANCE: &str = "odd_importance";
pub const RANGE_IMPORTANCE: &str = "range_importance";

/// Half-width of the optimal sum range around the high-accuracy mean.
const SUM_RANGE_HALF_WIDTH: f64 = 10.0;

// ─── Analysis ────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StageAnalysis {
    FixedWindow {
        window_size: usize,
        avg_matches: f64,
        std_matches: f64,
        max_matches: usize,
        /// `1 / (1 + std)`.
        consistency: f64,
        total_validations: usize,
    },
    Expanding {
        avg_matches: f64,
        /// Mean change in avg-matches between consecutive backtests.
        improvement_trend: f64,
        /// `1 - std / mean`.
        stability_score: f64,
        total_validations: usize,
    },
    None,
}

impl StageAnalysis {
    pub fn avg_matches(&self) -> Option<f64> {
        match self {
            StageAnalysis::FixedWindow { avg_matches, .. } | StageAnalysis::Expanding { avg_matches, .. } => {
                Some(*avg_matches)
            }
            StageAnalysis::None => None,
        }
    }
}

fn mean_std(values: &[f64]) -> (f64, f64) {
    if values.is_empty() {
        return (0.0, 0.0);
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let var = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
    (mean, var.sqrt())
}

pub fn analyze_fixed(results: &[BacktestResult], window_size: usize) -> StageAnalysis {
    if results.is_empty() {
        return StageAnalysis::None;
    }
    let avgs: Vec<f64> = results.iter().map(|r| r.avg_matches()).collect();
    let (mean, std) = mean_std(&avgs);
    StageAnalysis::FixedWindow {
        window_size,
        avg_matches: mean,
        std_matches: std,
        max_matches: results.iter().map(|r| r.max_matches()).max().unwrap_or(0),
        consistency: 1.0 / (1.0 + std),
        total_validations: results.len(),
    }
}

pub fn analyze_expanding(results: &[BacktestResult]) -> StageAnalysis {
    if results.is_empty() {
        return StageAnalysis::None;
    }
    let avgs: Vec<f64> = results.iter().map(|r| r.avg_matches()).collect();
    let (mean, std) = mean_std(&avgs);
    let deltas: Vec<f64> = avgs.windows(2).map(|w| w[1] - w[0]).collect();
    let improvement_trend = if deltas.is_empty() {
        0.0
    } else {
        deltas.iter().sum::<f64>() / deltas.len() as f64
    };
    StageAnalysis::Expanding {
        avg_matches: mean,
        improvement_trend,
        stability_score: 1.0 - std / (mean + 1e-6),
        total_validations: results.len(),
    }
}

// ─── Feature weights ─────────────────────────────────────────────────

/// The "normal" band each feature weight counts against.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NormalBands {
    pub sum_centre: f64,
    pub sum_half_width: f64,
    pub odd_min: usize,
    pub odd_max: usize,
    pub range_min: u32,
    pub range_max: u32,
}

impl NormalBands {
    pub fn for_game(game: &GameSpec) -> Self {
        let centre = game.expected_sum();
        let k = game.max_number as u32;
        Self {
            sum_centre: centre,
            sum_half_width: (0.15 * centre).round(),
            odd_min: game.picks / 2,
            odd_max: game.picks.div_ceil(2),
            range_min: k.saturating_sub(12),
            range_max: k.saturating_sub(2),
        }
    }

    pub fn sum_in_band(&self, sum: u32) -> bool {
        (sum as f64 - self.sum_centre).abs() < self.sum_half_width
    }

    pub fn odd_in_band(&self, odd: usize) -> bool {
        (self.odd_min..=self.odd_max).contains(&odd)
    }

    pub fn range_in_band(&self, range: u32) -> bool {
        (self.range_min..=self.range_max).contains(&range)
    }
}

fn high_accuracy(results: &[BacktestResult], threshold: usize) -> Vec<&BacktestResult> {
    results.iter().filter(|r| r.max_matches() >= threshold).collect()
}

/// Empty when no backtest reached `threshold`.
pub fn extract_feature_weights(
    results: &[BacktestResult],
    game: &GameSpec,
    threshold: usize,
) -> BTreeMap<String, f64> {
    let hits = high_accuracy(results, threshold);
    if hits.is_empty() {
        return BTreeMap::new();
    }
    let bands = NormalBands::for_game(game);
    let n = hits.len() as f64;
    let share = |pred: &dyn Fn(&BacktestResult) -> bool| hits.iter().filter(|&&r| pred(r)).count() as f64 / n;

    BTreeMap::from([
        (SUM_IMPORTANCE.to_string(), share(&|r: &BacktestResult| bands.sum_in_band(r.actual_sum))),
        (ODD_IMPORTANCE.to_string(), share(&|r: &BacktestResult| bands.odd_in_band(r.actual_odd))),
        (RANGE_IMPORTANCE.to_string(), share(&|r: &BacktestResult| bands.range_in_band(r.actual_range))),
    ])
}

/// EMA merge: `new = ema_factor * old + (1 - ema_factor) * incoming`; first
/// sightings are stored as-is.
pub fn merge_feature_weights(current: &mut BTreeMap<String, f64>, incoming: &BTreeMap<String, f64>, ema_factor: f64) {
    for (key, &value) in incoming {
        current
            .entry(key.clone())
            .and_modify(|old| *old = ema_factor * *old + (1.0 - ema_factor) * value)
            .or_insert(value);
    }
}

// ─── Pattern insights ────────────────────────────────────────────────

/// Patterns of the actual draws behind high-accuracy backtests. Also used as
/// the accumulated pattern adjustments, where each field keeps its latest
/// value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PatternInsights {
    pub optimal_sum_range: Option<(f64, f64)>,
    pub optimal_odd_count: Option<usize>,
    pub success_patterns: Option<usize>,
}

impl PatternInsights {
    pub fn is_empty(&self) -> bool {
        self.optimal_sum_range.is_none() && self.optimal_odd_count.is_none() && self.success_patterns.is_none()
    }

    pub fn merge_latest(&mut self, incoming: &PatternInsights) {
        if incoming.optimal_sum_range.is_some() {
            self.optimal_sum_range = incoming.optimal_sum_range;
        }
        if incoming.optimal_odd_count.is_some() {
            self.optimal_odd_count = incoming.optimal_odd_count;
        }
        if incoming.success_patterns.is_some() {
            self.success_patterns = incoming.success_patterns;
        }
    }

    /// Midpoint of the optimal sum range.
    pub fn target_sum(&self) -> Option<f64> {
        self.optimal_sum_range.map(|(lo, hi)| (lo + hi) / 2.0)
    }
}

pub fn extract_pattern_insights(results: &[BacktestResult], threshold: usize) -> PatternInsights {
    let hits = high_accuracy(results, threshold);
    if hits.is_empty() {
        return PatternInsights::default();
    }
    let n = hits.len() as f64;
    let mean_sum = hits.iter().map(|r| r.actual_sum as f64).sum::<f64>() / n;
    let mean_odd = hits.iter().map(|r| r.actual_odd as f64).sum::<f64>() / n;
    PatternInsights {
        optimal_sum_range: Some((mean_sum - SUM_RANGE_HALF_WIDTH, mean_sum + SUM_RANGE_HALF_WIDTH)),
        optimal_odd_count: Some(mean_odd.round() as usize),
        success_patterns: Some(hits.len()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::comparison::test_support::result;
    use crate::walk_forward::WindowLabel;

    fn with_actual(max: usize, sum: u32, odd: usize, range: u32) -> BacktestResult {
        let mut r = result(WindowLabel::Fixed(10), 10, 1.0, max, 0, 0);
        r.actual_sum = sum;
        r.actual_odd = odd;
        r.actual_range = range;
        r
    }

    #[test]
    fn loto7_bands() {
        let b = NormalBands::for_game(&GameSpec::LOTO7);
        assert_eq!(b.sum_centre, 133.0);
        assert_eq!(b.sum_half_width, 20.0);
        assert!(b.sum_in_band(114) && b.sum_in_band(152));
        assert!(!b.sum_in_band(113) && !b.sum_in_band(153));
        assert_eq!((b.odd_min, b.odd_max), (3, 4));
        assert_eq!((b.range_min, b.range_max), (25, 35));
    }

    #[test]
    fn ema_merge() {
        let mut current = BTreeMap::from([(SUM_IMPORTANCE.to_string(), 0.8)]);
        let incoming = BTreeMap::from([
            (SUM_IMPORTANCE.to_string(), 0.4),
            (ODD_IMPORTANCE.to_string(), 0.5),
        ]);
        merge_feature_weights(&mut current, &incoming, 0.7);
        assert!((current[SUM_IMPORTANCE] - 0.68).abs() < 1e-12);
        assert_eq!(current[ODD_IMPORTANCE], 0.5);
    }

    #[test]
    fn feature_weights_from_high_accuracy_only() {
        let results = vec![
            with_actual(4, 130, 3, 30),  // all in band
            with_actual(5, 200, 1, 10),  // none in band
            with_actual(2, 130, 3, 30),  // ignored
        ];
        let w = extract_feature_weights(&results, &GameSpec::LOTO7, 4);
        assert_eq!(w[SUM_IMPORTANCE], 0.5);
        assert_eq!(w[ODD_IMPORTANCE], 0.5);
        assert_eq!(w[RANGE_IMPORTANCE], 0.5);

        let none = extract_feature_weights(&results[2..], &GameSpec::LOTO7, 4);
        assert!(none.is_empty());
    }

    #[test]
    fn pattern_insights_from_high_accuracy() {
        let results = vec![with_actual(4, 120, 3, 30), with_actual(4, 140, 4, 30), with_actual(1, 10, 0, 5)];
        let p = extract_pattern_insights(&results, 4);
        assert_eq!(p.optimal_sum_range, Some((120.0, 140.0)));
        assert_eq!(p.target_sum(), Some(130.0));
        assert_eq!(p.optimal_odd_count, Some(4));
        assert_eq!(p.success_patterns, Some(2));
        assert!(extract_pattern_insights(&results[2..], 4).is_empty());
    }

    #[test]
    fn latest_pattern_value_wins() {
        let mut acc = PatternInsights {
            optimal_sum_range: Some((100.0, 120.0)),
            optimal_odd_count: Some(3),
            success_patterns: Some(2),
        };
        acc.merge_latest(&PatternInsights {
            optimal_odd_count: Some(4),
            ..Default::default()
        });
        assert_eq!(acc.optimal_sum_range, Some((100.0, 120.0)));
        assert_eq!(acc.optimal_odd_count, Some(4));
    }

    #[test]
    fn analyses() {
        let results = vec![
            result(WindowLabel::Expanding, 30, 1.0, 3, 0, 0),
            result(WindowLabel::Expanding, 35, 2.0, 4, 0, 0),
            result(WindowLabel::Expanding, 40, 3.0, 2, 0, 0),
        ];
        match analyze_expanding(&results) {
            StageAnalysis::Expanding {
                avg_matches,
                improvement_trend,
                total_validations,
                ..
            } => {
                assert!((avg_matches - 2.0).abs() < 1e-12);
                assert!((improvement_trend - 1.0).abs() < 1e-12);
                assert_eq!(total_validations, 3);
            }
            other => panic!("unexpected {other:?}"),
        }
        match analyze_fixed(&results, 10) {
            StageAnalysis::FixedWindow {
                max_matches, consistency, ..
            } => {
                assert_eq!(max_matches, 4);
                assert!(consistency < 1.0 && consistency > 0.0);
            }
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(analyze_fixed(&[], 10), StageAnalysis::None);
    }
}
