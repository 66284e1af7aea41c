//! Walk-forward window planning — which (train range, test index) pairs a
//! validation run backtests.
//!
//! Two policies:
//! - **Fixed window:** train on `[i, i + w)`, test on `i + w`.
//! - **Expanding window:** train on `[0, t)`, test on `t`, starting at
//!   `t = initial_size`.
//!
//! Sampling is deliberately approximate. Exhaustive leave-one-out would retrain
//! the ensemble once per historical draw; instead each configuration is capped
//! at `cap` backtests spread evenly over the history:
//! `max_tests = min(span, cap)`, `step = max(1, span / max_tests)`, offsets
//! `0, step, 2*step, ...` truncated to `max_tests`. Results are therefore a
//! sample of the possible backtests, not all of them.
//!
//! Every planned window satisfies the no-leakage invariant (all training
//! indices are strictly less than the test index). [`WindowSpec::check_no_leakage`]
//! re-checks it before each backtest.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

// ─── Window specs ────────────────────────────────────────────────────

/// Which validation configuration a window belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WindowLabel {
    Fixed(usize),
    Expanding,
}

impl fmt::Display for WindowLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WindowLabel::Fixed(w) => write!(f, "fixed_{w}"),
            WindowLabel::Expanding => write!(f, "expanding"),
        }
    }
}

/// One backtest: train on `[train_start, train_end)`, test on `test_index`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowSpec {
    pub label: WindowLabel,
    pub train_start: usize,
    /// Exclusive.
    pub train_end: usize,
    pub test_index: usize,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum LeakageError {
    #[error("{label}: training range {train_start}..{train_end} reaches test index {test_index}")]
    Lookahead {
        label: WindowLabel,
        train_start: usize,
        train_end: usize,
        test_index: usize,
    },
    #[error("{label}: empty training range at {train_start}")]
    EmptyTrainingRange { label: WindowLabel, train_start: usize },
}

impl WindowSpec {
    pub fn train_len(&self) -> usize {
        self.train_end.saturating_sub(self.train_start)
    }

    /// Every training index must be strictly below the test index.
    pub fn check_no_leakage(&self) -> Result<(), LeakageError> {
        if self.train_end <= self.train_start {
            return Err(LeakageError::EmptyTrainingRange {
                label: self.label,
                train_start: self.train_start,
            });
        }
        // Largest training index is train_end - 1.
        if self.train_end > self.test_index {
            return Err(LeakageError::Lookahead {
                label: self.label,
                train_start: self.train_start,
                train_end: self.train_end,
                test_index: self.test_index,
            });
        }
        Ok(())
    }
}

// ─── Planning ────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SamplingPlan {
    pub label: WindowLabel,
    pub max_tests: usize,
    pub step: usize,
    pub windows: Vec<WindowSpec>,
}

impl SamplingPlan {
    fn empty(label: WindowLabel) -> Self {
        Self {
            label,
            max_tests: 0,
            step: 0,
            windows: Vec::new(),
        }
    }
}

/// Offsets `0, step, ...` below `span`, at most `max_tests` of them.
fn sample_offsets(span: usize, cap: usize) -> (usize, usize, Vec<usize>) {
    let max_tests = span.min(cap);
    if max_tests == 0 {
        return (0, 0, Vec::new());
    }
    let step = (span / max_tests).max(1);
    let offsets = (0..span).step_by(step).take(max_tests).collect();
    (max_tests, step, offsets)
}

/// Fixed-window plan over `total` records. The span is `total - window - 1`,
/// so the final record is never a test target.
pub fn plan_fixed(total: usize, window: usize, cap: usize) -> SamplingPlan {
    let label = WindowLabel::Fixed(window);
    if window == 0 {
        return SamplingPlan::empty(label);
    }
    let span = total.saturating_sub(window + 1);
    let (max_tests, step, offsets) = sample_offsets(span, cap);
    let windows = offsets
        .into_iter()
        .map(|i| WindowSpec {
            label,
            train_start: i,
            train_end: i + window,
            test_index: i + window,
        })
        .filter(|w| w.test_index < total)
        .collect();
    SamplingPlan {
        label,
        max_tests,
        step,
        windows,
    }
}

/// Expanding-window plan over `total` records, first test at `initial`.
pub fn plan_expanding(total: usize, initial: usize, cap: usize) -> SamplingPlan {
    let label = WindowLabel::Expanding;
    if initial == 0 {
        return SamplingPlan::empty(label);
    }
    let span = total.saturating_sub(initial);
    let (max_tests, step, offsets) = sample_offsets(span, cap);
    let windows = offsets
        .into_iter()
        .map(|i| WindowSpec {
            label,
            train_start: 0,
            train_end: initial + i,
            test_index: initial + i,
        })
        .filter(|w| w.test_index < total)
        .collect();
    SamplingPlan {
        label,
        max_tests,
        step,
        windows,
    }
}
