//! Comparing validation strategies.
//!
//! Each configuration (one per fixed window size, plus expanding) is reduced
//! to [`ConfigStats`]. The composite score rewards portfolios that reach 4+
//! and 5+ matches on top of the mean:
//!
//! `composite = mean_avg_matches + 0.5 * mean_frac_4_plus + 1.0 * mean_frac_5_plus`

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::validator::BacktestResult;
use crate::walk_forward::WindowLabel;

const WEIGHT_4_PLUS: f64 = 0.5;
const WEIGHT_5_PLUS: f64 = 1.0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfigStats {
    pub label: WindowLabel,
    pub backtests: usize,
    pub mean_avg_matches: f64,
    pub std_avg_matches: f64,
    pub max_matches: usize,
    pub mean_frac_4_plus: f64,
    pub mean_frac_5_plus: f64,
    pub composite_score: f64,
}

impl ConfigStats {
    /// `None` for an empty result list.
    pub fn from_results(label: WindowLabel, results: &[BacktestResult]) -> Option<Self> {
        if results.is_empty() {
            return None;
        }
        let n = results.len() as f64;
        let avgs: Vec<f64> = results.iter().map(|r| r.avg_matches()).collect();
        let mean = avgs.iter().sum::<f64>() / n;
        let std = (avgs.iter().map(|a| (a - mean).powi(2)).sum::<f64>() / n).sqrt();
        let frac4 = results.iter().map(|r| r.summary.fraction_4_plus()).sum::<f64>() / n;
        let frac5 = results.iter().map(|r| r.summary.fraction_5_plus()).sum::<f64>() / n;
        Some(Self {
            label,
            backtests: results.len(),
            mean_avg_matches: mean,
            std_avg_matches: std,
            max_matches: results.iter().map(|r| r.max_matches()).max().unwrap_or(0),
            mean_frac_4_plus: frac4,
            mean_frac_5_plus: frac5,
            composite_score: composite_score(mean, frac4, frac5),
        })
    }
}

pub fn composite_score(mean_avg_matches: f64, frac_4_plus: f64, frac_5_plus: f64) -> f64 {
    mean_avg_matches + WEIGHT_4_PLUS * frac_4_plus + WEIGHT_5_PLUS * frac_5_plus
}

/// Which configuration to use going forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Recommendation {
    FixedWindow(usize),
    Expanding,
    /// Nothing was recorded.
    Undetermined,
}

impl fmt::Display for Recommendation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Recommendation::FixedWindow(w) => write!(f, "fixed window of {w} draws"),
            Recommendation::Expanding => write!(f, "expanding window"),
            Recommendation::Undetermined => write!(f, "undetermined"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComparisonReport {
    /// One entry per configuration with results, fixed windows ascending then expanding.
    pub configs: Vec<ConfigStats>,
    /// Highest composite score.
    pub best_method: Option<WindowLabel>,
    pub best_score: f64,
    pub recommendation: Recommendation,
    /// Best composite score minus the lowest mean avg-matches.
    pub improvement: f64,
}

impl ComparisonReport {
    pub fn stats(&self, label: WindowLabel) -> Option<&ConfigStats> {
        self.configs.iter().find(|c| c.label == label)
    }
}

pub fn compare_methods(fixed: &BTreeMap<usize, Vec<BacktestResult>>, expanding: &[BacktestResult]) -> ComparisonReport {
    let mut configs: Vec<ConfigStats> = fixed
        .iter()
        .filter_map(|(&w, results)| ConfigStats::from_results(WindowLabel::Fixed(w), results))
        .collect();
    let expanding_stats = ConfigStats::from_results(WindowLabel::Expanding, expanding);
    configs.extend(expanding_stats.clone());

    // First maximum wins on ties.
    let best = configs.iter().fold(None::<&ConfigStats>, |acc, c| match acc {
        Some(b) if b.composite_score >= c.composite_score => Some(b),
        _ => Some(c),
    });
    let best_method = best.map(|b| b.label);
    let best_score = best.map(|b| b.composite_score).unwrap_or(0.0);
    let lowest_avg = configs
        .iter()
        .map(|c| c.mean_avg_matches)
        .fold(None::<f64>, |acc, v| Some(acc.map_or(v, |a| a.min(v))));
    let improvement = lowest_avg.map(|low| best_score - low).unwrap_or(0.0);

    let recommendation = recommend(&configs, expanding_stats.as_ref());

    ComparisonReport {
        configs,
        best_method,
        best_score,
        recommendation,
        improvement,
    }
}

/// Largest fixed window first; expanding only when its mean avg-matches is
/// strictly higher than every fixed window's.
fn recommend(configs: &[ConfigStats], expanding: Option<&ConfigStats>) -> Recommendation {
    let mut fixed: Vec<(usize, f64)> = configs
        .iter()
        .filter_map(|c| match c.label {
            WindowLabel::Fixed(w) => Some((w, c.mean_avg_matches)),
            WindowLabel::Expanding => None,
        })
        .collect();
    fixed.sort_by(|a, b| b.0.cmp(&a.0));

    match expanding {
        None => fixed
            .first()
            .map(|&(w, _)| Recommendation::FixedWindow(w))
            .unwrap_or(Recommendation::Undetermined),
        Some(exp) => fixed
            .iter()
            .find(|&&(_, avg)| avg >= exp.mean_avg_matches)
            .map(|&(w, _)| Recommendation::FixedWindow(w))
            .unwrap_or(Recommendation::Expanding),
    }
}

// ─── Summary ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModeSummary {
    pub backtests: usize,
    pub avg_matches: f64,
    pub max_matches: usize,
    pub avg_sets_4_plus: f64,
}

impl ModeSummary {
    fn from_results<'a>(results: impl Iterator<Item = &'a BacktestResult>) -> Self {
        let mut s = ModeSummary::default();
        let mut total_avg = 0.0;
        let mut total_4 = 0usize;
        for r in results {
            s.backtests += 1;
            total_avg += r.avg_matches();
            total_4 += r.summary.sets_4_plus;
            s.max_matches = s.max_matches.max(r.max_matches());
        }
        if s.backtests > 0 {
            s.avg_matches = total_avg / s.backtests as f64;
            s.avg_sets_4_plus = total_4 as f64 / s.backtests as f64;
        }
        s
    }
}

/// Totals per mode.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ValidationSummary {
    pub fixed_window_tested: bool,
    pub expanding_tested: bool,
    pub total_validations: usize,
    pub fixed: ModeSummary,
    pub expanding: ModeSummary,
}

pub fn summarize(fixed: &BTreeMap<usize, Vec<BacktestResult>>, expanding: &[BacktestResult]) -> ValidationSummary {
    let fixed_summary = ModeSummary::from_results(fixed.values().flatten());
    let expanding_summary = ModeSummary::from_results(expanding.iter());
    ValidationSummary {
        fixed_window_tested: fixed_summary.backtests > 0,
        expanding_tested: expanding_summary.backtests > 0,
        total_validations: fixed_summary.backtests + expanding_summary.backtests,
        fixed: fixed_summary,
        expanding: expanding_summary,
    }
}
