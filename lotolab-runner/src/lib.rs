//! LotoLab Runner — validation, strategy comparison and progressive learning.
//!
//! This crate builds on `lotolab-core` to provide:
//! - Walk-forward window planning with bounded sampling
//! - Fixed-window and expanding-window time-series validation
//! - Comparison of validation strategies
//! - The five-stage progressive learning ladder with persisted state
//! - Round-aware prediction history and learning from verified predictions
//! - `lotolab.toml` configuration

pub mod comparison;
pub mod config;
pub mod history;
pub mod learning;
pub mod progress;
pub mod validator;
pub mod verification;
pub mod walk_forward;

pub use comparison::{compare_methods, summarize, ComparisonReport, ConfigStats, Recommendation, ValidationSummary};
pub use config::{ConfigError, LotoConfig};
pub use history::{AccuracyStats, HistoryError, PredictionEntry, PredictionHistory};
pub use learning::{
    JsonStateStore, LearningConfig, LearningError, LearningProgress, LearningState, MemoryStateStore,
    ProgressiveLearningManager, StageOutcome, StateStore,
};
pub use progress::{LogProgress, NoProgress, ValidationProgress};
pub use validator::{BacktestResult, TimeSeriesValidator, ValidationConfig, ValidationError, ValidationReport};
pub use verification::{ImprovementMetrics, VerificationConfig, VerificationLearner};
pub use walk_forward::{plan_expanding, plan_fixed, LeakageError, WindowLabel, WindowSpec};

#[cfg(test)]
mod send_sync_checks {
    use super::*;

    fn assert_send<T: Send>() {}
    fn assert_sync<T: Sync>() {}

    #[test]
    fn backtest_result_is_send_sync() {
        assert_send::<BacktestResult>();
        assert_sync::<BacktestResult>();
    }

    #[test]
    fn validator_is_send_sync() {
        assert_send::<TimeSeriesValidator>();
        assert_sync::<TimeSeriesValidator>();
    }

    #[test]
    fn learning_manager_is_send_sync() {
        assert_send::<ProgressiveLearningManager>();
        assert_sync::<ProgressiveLearningManager>();
    }

    #[test]
    fn learning_state_is_send_sync() {
        assert_send::<LearningState>();
        assert_sync::<LearningState>();
    }

    #[test]
    fn config_is_send_sync() {
        assert_send::<LotoConfig>();
        assert_sync::<LotoConfig>();
    }

    #[test]
    fn history_is_send_sync() {
        assert_send::<PredictionHistory>();
        assert_sync::<PredictionHistory>();
    }
}
