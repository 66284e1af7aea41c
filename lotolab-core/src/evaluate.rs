//! Backtest scoring — pure functions of a portfolio and the actual draw.

use serde::{Deserialize, Serialize};

use crate::domain::{CandidateSet, Draw, Number};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateScore {
    pub candidate: CandidateSet,
    pub matches: usize,
    /// Candidate numbers that were drawn, ascending.
    pub matched: Vec<Number>,
    /// Drawn numbers the candidate lacked, ascending.
    pub missed: Vec<Number>,
    /// Candidate numbers that were not drawn, ascending.
    pub extra: Vec<Number>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PortfolioSummary {
    pub portfolio_size: usize,
    pub avg_matches: f64,
    pub min_matches: usize,
    pub max_matches: usize,
    pub std_matches: f64,
    pub sets_3_plus: usize,
    pub sets_4_plus: usize,
    pub sets_5_plus: usize,
    /// `histogram[m]` = candidates with exactly `m` matches, `m` in `0..=N`.
    pub histogram: Vec<usize>,
}

impl PortfolioSummary {
    pub fn fraction_4_plus(&self) -> f64 {
        fraction(self.sets_4_plus, self.portfolio_size)
    }

    pub fn fraction_5_plus(&self) -> f64 {
        fraction(self.sets_5_plus, self.portfolio_size)
    }
}

fn fraction(n: usize, of: usize) -> f64 {
    if of == 0 {
        0.0
    } else {
        n as f64 / of as f64
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Evaluation {
    pub scores: Vec<CandidateScore>,
    pub summary: PortfolioSummary,
}

pub fn score_candidate(candidate: &CandidateSet, actual: &Draw) -> CandidateScore {
    let (matched, extra): (Vec<Number>, Vec<Number>) =
        candidate.numbers().iter().partition(|&&n| actual.contains(n));
    let missed: Vec<Number> = actual
        .sorted()
        .into_iter()
        .filter(|&n| !candidate.contains(n))
        .collect();
    CandidateScore {
        candidate: candidate.clone(),
        matches: matched.len(),
        matched,
        missed,
        extra,
    }
}

/// Score every candidate and aggregate. An empty portfolio gives zeroed
/// aggregates and an all-zero histogram.
pub fn evaluate(portfolio: &[CandidateSet], actual: &Draw) -> Evaluation {
    let scores: Vec<CandidateScore> = portfolio.iter().map(|c| score_candidate(c, actual)).collect();
    let n = actual.numbers().len();

    let mut summary = PortfolioSummary {
        portfolio_size: scores.len(),
        histogram: vec![0; n + 1],
        ..Default::default()
    };
    if scores.is_empty() {
        return Evaluation { scores, summary };
    }

    let counts: Vec<usize> = scores.iter().map(|s| s.matches).collect();
    let mean = counts.iter().sum::<usize>() as f64 / counts.len() as f64;
    let var = counts.iter().map(|&c| (c as f64 - mean).powi(2)).sum::<f64>() / counts.len() as f64;

    for &c in &counts {
        if let Some(slot) = summary.histogram.get_mut(c) {
            *slot += 1;
        }
    }
    summary.avg_matches = mean;
    summary.std_matches = var.sqrt();
    summary.min_matches = counts.iter().copied().min().unwrap_or(0);
    summary.max_matches = counts.iter().copied().max().unwrap_or(0);
    summary.sets_3_plus = counts.iter().filter(|&&c| c >= 3).count();
    summary.sets_4_plus = counts.iter().filter(|&&c| c >= 4).count();
    summary.sets_5_plus = counts.iter().filter(|&&c| c >= 5).count();

    Evaluation { scores, summary }
}
