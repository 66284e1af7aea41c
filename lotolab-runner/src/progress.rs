//! Progress callbacks for long validation runs.
//!
//! The validator reports at phase boundaries only: when a configuration
//! starts, every few backtests, and when it completes. Hosts relay these
//! however they like.

use crate::walk_forward::WindowLabel;

pub trait ValidationProgress: Send + Sync {
    /// Called before the first backtest of a configuration.
    fn on_window_start(&self, label: WindowLabel, planned: usize);

    /// Called every `PROGRESS_EVERY` recorded backtests.
    fn on_backtest(&self, label: WindowLabel, recorded: usize, planned: usize, mean_avg_matches: f64);

    /// Called when a configuration's backtests are done.
    fn on_window_complete(&self, label: WindowLabel, recorded: usize, mean_avg_matches: f64);
}

/// Backtests between `on_backtest` calls.
pub const PROGRESS_EVERY: usize = 10;

/// Forwards progress to `tracing` at info level.
pub struct LogProgress;

impl ValidationProgress for LogProgress {
    fn on_window_start(&self, label: WindowLabel, planned: usize) {
        tracing::info!(config = %label, planned, "validation started");
    }

    fn on_backtest(&self, label: WindowLabel, recorded: usize, planned: usize, mean_avg_matches: f64) {
        tracing::info!(
            config = %label,
            recorded,
            planned,
            avg_matches = format!("{mean_avg_matches:.2}"),
            "validation progress"
        );
    }

    fn on_window_complete(&self, label: WindowLabel, recorded: usize, mean_avg_matches: f64) {
        tracing::info!(
            config = %label,
            recorded,
            avg_matches = format!("{mean_avg_matches:.3}"),
            "validation complete"
        );
    }
}

/// Discards all progress.
pub struct NoProgress;

impl ValidationProgress for NoProgress {
    fn on_window_start(&self, _label: WindowLabel, _planned: usize) {}
    fn on_backtest(&self, _label: WindowLabel, _recorded: usize, _planned: usize, _mean: f64) {}
    fn on_window_complete(&self, _label: WindowLabel, _recorded: usize, _mean: f64) {}
}
