//! Time-series validation — repeated train-window / generate / evaluate cycles.
//!
//! Each backtest trains a fresh [`PredictionEngine`] on its window only
//! (`NextDraw` targets, so the window's last record never pairs with anything
//! outside it), generates a fixed-size portfolio, and scores it against the
//! held-out draw. Backtests run sequentially in window/offset order.
//!
//! Window planning and the sampling trade-off live in [`crate::walk_forward`].

use std::collections::BTreeMap;
use std::sync::Arc;

use lotolab_core::domain::{CandidateSet, Draw, DrawRecord, GameSpec, Number};
use lotolab_core::engine::{EngineConfig, PredictionEngine};
use lotolab_core::evaluate::{evaluate, PortfolioSummary};
use lotolab_core::features::TargetMode;
use lotolab_core::rng::RngHierarchy;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::comparison::{compare_methods, summarize, ComparisonReport, ValidationSummary};
use crate::progress::{NoProgress, ValidationProgress, PROGRESS_EVERY};
use crate::walk_forward::{plan_expanding, plan_fixed, LeakageError, SamplingPlan, WindowLabel, WindowSpec};

// ─── Config ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidationConfig {
    /// Fixed window sizes, in draws.
    pub window_sizes: Vec<usize>,
    /// Backtest cap per fixed window size.
    pub fixed_cap: usize,
    /// Backtest cap for the expanding window.
    pub expanding_cap: usize,
    /// Draws in the first expanding training set.
    pub initial_size: usize,
    /// Candidates generated per backtest.
    pub portfolio_size: usize,
    /// Minimum training rows per backtest.
    pub min_rows: usize,
    pub seed: u64,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            window_sizes: vec![10, 20, 30],
            fixed_cap: 50,
            expanding_cap: 30,
            initial_size: 30,
            portfolio_size: 20,
            min_rows: 50,
            seed: 42,
        }
    }
}

// ─── Results ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BacktestResult {
    pub label: WindowLabel,
    pub train_start: usize,
    /// Exclusive.
    pub train_end: usize,
    pub test_index: usize,
    pub test_round: u32,
    /// Actual numbers, ascending.
    pub actual: Vec<Number>,
    pub actual_sum: u32,
    pub actual_odd: usize,
    pub actual_range: u32,
    pub portfolio: Vec<CandidateSet>,
    pub match_counts: Vec<usize>,
    pub summary: PortfolioSummary,
}

impl BacktestResult {
    pub fn avg_matches(&self) -> f64 {
        self.summary.avg_matches
    }

    pub fn max_matches(&self) -> usize {
        self.summary.max_matches
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationReport {
    pub fixed: BTreeMap<usize, Vec<BacktestResult>>,
    pub expanding: Vec<BacktestResult>,
    pub comparison: ComparisonReport,
    pub summary: ValidationSummary,
}

#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("no valid draws among {records} records")]
    NoValidDraws { records: usize },

    #[error("lookahead in planned window: {0}")]
    Leakage(#[from] LeakageError),
}

// ─── Validator ───────────────────────────────────────────────────────

pub struct TimeSeriesValidator {
    engine: EngineConfig,
    config: ValidationConfig,
    rng: RngHierarchy,
    progress: Arc<dyn ValidationProgress>,
}

impl TimeSeriesValidator {
    /// `engine` supplies the game, roster and vote settings; target mode and
    /// minimum rows are overridden for validation.
    pub fn new(engine: EngineConfig, config: ValidationConfig) -> Self {
        let engine = EngineConfig {
            target_mode: TargetMode::NextDraw,
            min_rows: config.min_rows,
            ..engine
        };
        let rng = RngHierarchy::new(config.seed);
        Self {
            engine,
            config,
            rng,
            progress: Arc::new(NoProgress),
        }
    }

    pub fn with_progress(mut self, progress: Arc<dyn ValidationProgress>) -> Self {
        self.progress = progress;
        self
    }

    pub fn config(&self) -> &ValidationConfig {
        &self.config
    }

    pub fn game(&self) -> &GameSpec {
        &self.engine.game
    }

    /// Fixed-window backtests for each size in `window_sizes`.
    pub fn fixed_window_validation(
        &self,
        records: &[DrawRecord],
        window_sizes: &[usize],
    ) -> Result<BTreeMap<usize, Vec<BacktestResult>>, ValidationError> {
        self.require_valid_draws(records)?;
        let mut out = BTreeMap::new();
        for &window in window_sizes {
            let plan = plan_fixed(records.len(), window, self.config.fixed_cap);
            if plan.windows.is_empty() {
                tracing::warn!(window, records = records.len(), "history too short for window, skipped");
            }
            out.insert(window, self.run_plan(records, &plan)?);
        }
        Ok(out)
    }

    pub fn expanding_window_validation(&self, records: &[DrawRecord]) -> Result<Vec<BacktestResult>, ValidationError> {
        self.require_valid_draws(records)?;
        let plan = plan_expanding(records.len(), self.config.initial_size, self.config.expanding_cap);
        if plan.windows.is_empty() {
            tracing::warn!(
                initial_size = self.config.initial_size,
                records = records.len(),
                "history too short for expanding validation"
            );
        }
        self.run_plan(records, &plan)
    }

    /// Both modes over the configured window sizes, plus the comparison.
    pub fn run_validation(&self, records: &[DrawRecord]) -> Result<ValidationReport, ValidationError> {
        tracing::info!(
            records = records.len(),
            windows = ?self.config.window_sizes,
            "time-series validation started"
        );
        let fixed = self.fixed_window_validation(records, &self.config.window_sizes)?;
        let expanding = self.expanding_window_validation(records)?;
        let comparison = compare_methods(&fixed, &expanding);
        let summary = summarize(&fixed, &expanding);
        tracing::info!(
            total = summary.total_validations,
            recommendation = %comparison.recommendation,
            "time-series validation complete"
        );
        Ok(ValidationReport {
            fixed,
            expanding,
            comparison,
            summary,
        })
    }

    fn require_valid_draws(&self, records: &[DrawRecord]) -> Result<(), ValidationError> {
        let game = self.engine.game;
        if records.iter().any(|r| Draw::from_record(r, &game).is_ok()) {
            Ok(())
        } else {
            Err(ValidationError::NoValidDraws { records: records.len() })
        }
    }

    fn run_plan(&self, records: &[DrawRecord], plan: &SamplingPlan) -> Result<Vec<BacktestResult>, ValidationError> {
        let label = plan.label;
        let planned = plan.windows.len();
        self.progress.on_window_start(label, planned);

        let mut results: Vec<BacktestResult> = Vec::with_capacity(planned);
        let mut total_avg = 0.0;
        for spec in &plan.windows {
            spec.check_no_leakage()?;
            let Some(result) = self.backtest(records, spec) else {
                continue;
            };
            total_avg += result.avg_matches();
            results.push(result);
            if results.len() % PROGRESS_EVERY == 0 {
                self.progress
                    .on_backtest(label, results.len(), planned, total_avg / results.len() as f64);
            }
        }

        let mean = if results.is_empty() {
            0.0
        } else {
            total_avg / results.len() as f64
        };
        self.progress.on_window_complete(label, results.len(), mean);
        Ok(results)
    }

    /// One backtest, or `None` when the test draw is invalid or training fails.
    fn backtest(&self, records: &[DrawRecord], spec: &WindowSpec) -> Option<BacktestResult> {
        let game = self.engine.game;
        let test_record = records.get(spec.test_index)?;
        let actual = match Draw::from_record(test_record, &game) {
            Ok(d) => d,
            Err(e) => {
                tracing::debug!(config = %spec.label, round = test_record.round, error = %e, "invalid test draw, skipped");
                return None;
            }
        };

        let mut engine = PredictionEngine::new(self.engine.clone());
        if let Err(e) = engine.train(&records[spec.train_start..spec.train_end]) {
            tracing::debug!(config = %spec.label, test_index = spec.test_index, error = %e, "window training failed, skipped");
            return None;
        }

        let mut rng = self.rng.rng_for(&spec.label.to_string(), spec.test_index as u64);
        let prediction = match engine.predict(self.config.portfolio_size, None, &mut rng) {
            Ok(p) => p,
            Err(e) => {
                tracing::warn!(config = %spec.label, test_index = spec.test_index, error = %e, "generation failed, skipped");
                return None;
            }
        };

        let evaluation = evaluate(&prediction.candidates, &actual);
        Some(BacktestResult {
            label: spec.label,
            train_start: spec.train_start,
            train_end: spec.train_end,
            test_index: spec.test_index,
            test_round: actual.round,
            actual: actual.sorted(),
            actual_sum: actual.sum(),
            actual_odd: actual.odd_count(),
            actual_range: actual.range(),
            match_counts: evaluation.scores.iter().map(|s| s.matches).collect(),
            portfolio: prediction.candidates,
            summary: evaluation.summary,
        })
    }
}
